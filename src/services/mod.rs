pub mod analyzer;
pub mod coordinator;
pub mod image_store;
pub mod job_store;
pub mod periodic;
pub mod progress_bus;
pub mod vision;
