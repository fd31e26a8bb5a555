//! CLI command implementations.

pub mod demo;
pub mod dump;
pub mod run;
pub mod script;
