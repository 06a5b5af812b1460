pub mod chunk_stream;
pub mod marshal;
pub mod registry;
pub mod serialiser;
