pub mod error;
pub mod http;
pub mod offline;
pub mod telemetry;
