pub mod file_sink;
pub mod memory_sink;
pub mod metadata;
