pub mod fixtures;
pub mod project;
