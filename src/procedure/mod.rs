//! Update procedures
//!
//! This module provides:
//! - Isolated execution of a package's update procedure (`executor`)
//! - Classification of what the procedure returned (`interpreter`)

mod executor;
mod interpreter;

pub use executor::{
    ProcedureExecutor, ProcedureHost, RawProcedureOutput, ScriptExecutor,
    DEFAULT_PROCEDURE_TIMEOUT,
};
pub use interpreter::{
    describe_properties, flatten_streams, interpret, streams_of, IGNORE_SENTINEL,
};
