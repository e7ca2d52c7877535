pub mod completeness;
pub mod display_name;
pub mod window;
