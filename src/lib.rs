pub mod cli;
pub mod components;
pub mod coordinator;
pub mod error;
pub mod export;
pub mod project;
pub mod recording;
pub mod steps;
pub mod trace;

pub use components::registry::ComponentRegistry;
pub use coordinator::coordinator::{CancellationToken, Coordinator};
pub use error::ConversionError;
pub use project::ProjectLayout;
pub use recording::python_parser::{PythonScriptParser, ScriptParser};
pub use steps::registry::StepRegistry;
