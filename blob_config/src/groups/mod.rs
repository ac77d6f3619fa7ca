pub mod client;
pub mod log;
pub mod reader;
