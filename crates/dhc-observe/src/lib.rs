//! Process-wide logging setup for dhc services.

mod logger;
pub use logger::*;
