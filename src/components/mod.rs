pub mod component_model;
pub mod registry;
pub mod render;
pub mod scanner;
