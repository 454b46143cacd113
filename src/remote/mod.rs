// ABOUTME: Remote command execution contract and structured step scripts.
// ABOUTME: Every remote stage is a named list of steps with explicit failure policies.

mod executor;
mod script;

pub use executor::{RemoteExecutor, quote};
pub use script::{FailurePolicy, RemoteScript, ScriptError, ScriptReport, Step, StepOutcome};
