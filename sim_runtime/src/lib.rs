//! Engine-free helpers over the simulation contracts.
//!
//! Operator command text and action scripts are parsed here into
//! [`ActionRequest`]s without depending on the engine in `core_sim`.

mod command_text;
mod script;

pub use command_text::{parse_command_line, CommandParseError, EntityToken, OperatorCommand};
pub use script::{ActionPlan, ActionScript, ScriptError};
pub use sim_schema::*;
