//! Operator action scripts.
//!
//! A script is one command per line. Action lines queue requests for the
//! current timestep; `step [n]` moves the cursor forward. Blank lines and
//! `#` comments are ignored.
//!
//! ```text
//! # first wave
//! evacuate amb-0 zone-0-0
//! ambulance amb-1 zone-1-1
//! step 2
//! open_shelter truck-0 zone-0-1
//! ```

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::command_text::{parse_command_line, CommandParseError, EntityToken, OperatorCommand};
use crate::{ActionRequest, ActionSource, ActionType, Scenario};

#[derive(Debug, Error)]
pub enum ScriptError {
    #[error("line {line}: {source}")]
    Command {
        line: usize,
        #[source]
        source: CommandParseError,
    },
    #[error("line {line}: unknown resource '{token}'")]
    UnknownResource { line: usize, token: String },
    #[error("line {line}: unknown zone '{token}'")]
    UnknownZone { line: usize, token: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ScriptLine {
    line: usize,
    timestep: u32,
    action: ActionType,
    resource: EntityToken,
    zone: EntityToken,
}

/// Parsed script whose entity names are not yet bound to a scenario.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActionScript {
    lines: Vec<ScriptLine>,
    cursor: u32,
}

impl ActionScript {
    pub fn parse(text: &str) -> Result<Self, ScriptError> {
        let mut script = ActionScript::default();
        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let content = strip_comment(raw);
            if content.trim().is_empty() {
                continue;
            }
            match parse_command_line(content)
                .map_err(|source| ScriptError::Command { line, source })?
            {
                OperatorCommand::Advance { steps } => {
                    script.cursor = script.cursor.saturating_add(steps);
                }
                OperatorCommand::Act {
                    action,
                    resource,
                    zone,
                } => script.lines.push(ScriptLine {
                    line,
                    timestep: script.cursor,
                    action,
                    resource,
                    zone,
                }),
            }
        }
        Ok(script)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Bind entity names to the scenario's indices.
    pub fn to_plan(&self, scenario: &Scenario) -> Result<ActionPlan, ScriptError> {
        let mut plan = ActionPlan {
            batches: BTreeMap::new(),
            horizon: self.cursor,
        };
        for entry in &self.lines {
            let resource = entry
                .resource
                .resolve(scenario.resources.iter().map(|r| r.id.as_str()))
                .ok_or_else(|| ScriptError::UnknownResource {
                    line: entry.line,
                    token: entry.resource.to_string(),
                })?;
            let zone = entry
                .zone
                .resolve(scenario.zones.iter().map(|z| z.id.as_str()))
                .ok_or_else(|| ScriptError::UnknownZone {
                    line: entry.line,
                    token: entry.zone.to_string(),
                })?;
            plan.push(
                entry.timestep,
                ActionRequest::new(entry.action, resource, zone).with_source(ActionSource::Human),
            );
        }
        Ok(plan)
    }
}

/// Only a `#` at the start of a word opens a comment; `#3` is an index token.
fn strip_comment(raw: &str) -> &str {
    let mut offset = 0;
    for word in raw.split_inclusive(char::is_whitespace) {
        let trimmed = word.trim();
        let is_index = trimmed
            .strip_prefix('#')
            .is_some_and(|rest| !rest.is_empty() && rest.bytes().all(|b| b.is_ascii_digit()));
        if trimmed.starts_with('#') && !is_index {
            return &raw[..offset];
        }
        offset += word.len();
    }
    raw
}

/// Action requests grouped by the timestep they are submitted at.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionPlan {
    pub batches: BTreeMap<u32, Vec<ActionRequest>>,
    /// Timestep the script's `step` commands advance to.
    #[serde(default)]
    pub horizon: u32,
}

impl ActionPlan {
    pub fn push(&mut self, timestep: u32, request: ActionRequest) {
        self.batches.entry(timestep).or_default().push(request);
    }

    pub fn requests_at(&self, timestep: u32) -> &[ActionRequest] {
        self.batches
            .get(&timestep)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.batches.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.values().all(Vec::is_empty)
    }

    /// Last timestep that needs stepping to play the whole plan.
    pub fn last_timestep(&self) -> u32 {
        let last_batch = self
            .batches
            .keys()
            .next_back()
            .map_or(0, |timestep| timestep + 1);
        last_batch.max(self.horizon)
    }

    pub fn into_batches(self) -> BTreeMap<u32, Vec<ActionRequest>> {
        self.batches
    }
}
