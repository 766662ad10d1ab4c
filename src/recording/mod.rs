pub mod action_model;
pub mod call_chain;
pub mod python_parser;
