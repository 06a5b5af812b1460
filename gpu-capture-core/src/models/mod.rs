pub mod capture_result;
pub mod chunk;
pub mod config;
pub mod descriptors;
pub mod diagnostics;
pub mod error;
pub mod state;
