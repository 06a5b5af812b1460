pub mod capture_sink;
pub mod chunk_recorder;
pub mod real_api;
pub mod soft_ref;
