pub mod normalize;
pub mod registry;
pub mod scanner;
pub mod step_model;
