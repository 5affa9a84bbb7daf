//! Data model shared by the dispatch core, the executors and their callers.

mod domain;
pub use domain::*;

mod kind;
pub use kind::*;
