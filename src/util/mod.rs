pub mod date;
pub mod reading_time;
pub mod sanitize;
pub mod security;
