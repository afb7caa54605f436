//! Core types: tracing setup and Debug Adapter Protocol vocabulary

pub mod dap;
pub mod tracing;

pub use dap::{Capabilities, EventKind, InitializeRequestArguments, LaunchRequestArguments};
pub use self::tracing::{TracingConfig, TracingError, TracingOutputFormat, init_tracing};
