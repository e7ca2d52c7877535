pub mod db_utils;
pub mod semester_cache;
