pub mod attendance;
pub mod cell;
pub mod member;
pub mod role;
pub mod semester;
