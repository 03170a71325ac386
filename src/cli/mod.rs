//! Command Line Interface (CLI) layer for panelcal.
//!
//! This module defines argument parsing (`args`), error types (`errors`),
//! and the orchestration logic (`runner`) for single-file and batch
//! correction. It wires user-provided options to the library functionality
//! exposed via `panelcal::api`.
pub mod args;
pub mod errors;
pub mod runner;

pub use args::CliArgs;
pub use runner::run;
