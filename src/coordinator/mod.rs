pub mod artifacts;
pub mod coordinator;
pub mod generation;
pub mod lock;
pub mod ollama;
pub mod result;
pub mod writer;
