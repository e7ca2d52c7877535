pub mod attendance;
pub mod cell;
pub mod member;
pub mod report;
pub mod semester;
