use std::fmt;
use std::num::ParseIntError;

use thiserror::Error;

use crate::ActionType;

/// Resource or zone reference as typed by an operator: `#3` or `3` for an
/// index, anything else for a scenario id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityToken {
    Index(u32),
    Id(String),
}

impl EntityToken {
    fn parse(token: &str) -> Self {
        let digits = token.strip_prefix('#').unwrap_or(token);
        match digits.parse::<u32>() {
            Ok(index) => EntityToken::Index(index),
            Err(_) => EntityToken::Id(token.to_string()),
        }
    }

    /// Index of this token among `ids`, given in scenario order.
    pub fn resolve<'a>(&self, ids: impl IntoIterator<Item = &'a str>) -> Option<u32> {
        match self {
            EntityToken::Index(index) => Some(*index),
            EntityToken::Id(id) => ids
                .into_iter()
                .position(|candidate| candidate == id)
                .map(|position| position as u32),
        }
    }
}

impl fmt::Display for EntityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityToken::Index(index) => write!(f, "#{index}"),
            EntityToken::Id(id) => f.write_str(id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperatorCommand {
    Act {
        action: ActionType,
        resource: EntityToken,
        zone: EntityToken,
    },
    Advance {
        steps: u32,
    },
}

#[derive(Debug, Error)]
pub enum CommandParseError {
    #[error("empty command")]
    Empty,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),
    #[error("unexpected argument '{0}'")]
    UnexpectedArgument(String),
    #[error("invalid integer '{value}' for {context}: {source}")]
    InvalidInteger {
        value: String,
        context: &'static str,
        source: ParseIntError,
    },
}

pub fn parse_command_line(input: &str) -> Result<OperatorCommand, CommandParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(CommandParseError::Empty);
    }

    let mut parts = trimmed.split_whitespace();
    let verb = parts
        .next()
        .map(|v| v.to_ascii_lowercase())
        .ok_or(CommandParseError::Empty)?;

    let command = match verb.as_str() {
        "step" | "advance" => {
            let steps_str = parts.next().unwrap_or("1");
            let steps = parse_u32(steps_str, "step count")?;
            OperatorCommand::Advance { steps }
        }
        other => {
            let action = parse_action(other)?;
            let resource = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("resource"))?;
            let zone = parts
                .next()
                .ok_or(CommandParseError::MissingArgument("zone"))?;
            OperatorCommand::Act {
                action,
                resource: EntityToken::parse(resource),
                zone: EntityToken::parse(zone),
            }
        }
    };

    match parts.next() {
        Some(extra) => Err(CommandParseError::UnexpectedArgument(extra.to_string())),
        None => Ok(command),
    }
}

fn parse_action(verb: &str) -> Result<ActionType, CommandParseError> {
    match verb {
        "ambulance" | "amb" => Ok(ActionType::DispatchAmbulance),
        "medical" | "medical_team" | "med" => Ok(ActionType::DispatchMedicalTeam),
        "supply" | "supply_truck" | "truck" => Ok(ActionType::DispatchSupplyTruck),
        "evacuate" | "evac" => Ok(ActionType::EvacuateZone),
        "open_shelter" | "shelter" => Ok(ActionType::OpenShelter),
        other => Err(CommandParseError::UnknownCommand(other.to_string())),
    }
}

fn parse_u32(value: &str, context: &'static str) -> Result<u32, CommandParseError> {
    value
        .parse::<u32>()
        .map_err(|source| CommandParseError::InvalidInteger {
            value: value.to_string(),
            context,
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_action_verbs_and_aliases() {
        assert_eq!(
            parse_command_line("evacuate 2 zone-a").expect("parses"),
            OperatorCommand::Act {
                action: ActionType::EvacuateZone,
                resource: EntityToken::Index(2),
                zone: EntityToken::Id("zone-a".into()),
            }
        );
        assert_eq!(
            parse_command_line("  TRUCK #1 #0 ").expect("parses"),
            OperatorCommand::Act {
                action: ActionType::DispatchSupplyTruck,
                resource: EntityToken::Index(1),
                zone: EntityToken::Index(0),
            }
        );
    }

    #[test]
    fn step_defaults_to_one() {
        assert_eq!(
            parse_command_line("step").expect("parses"),
            OperatorCommand::Advance { steps: 1 }
        );
        assert_eq!(
            parse_command_line("step 4").expect("parses"),
            OperatorCommand::Advance { steps: 4 }
        );
    }

    #[test]
    fn reports_malformed_commands() {
        assert!(matches!(parse_command_line("  "), Err(CommandParseError::Empty)));
        assert!(matches!(
            parse_command_line("airlift 1 2"),
            Err(CommandParseError::UnknownCommand(verb)) if verb == "airlift"
        ));
        assert!(matches!(
            parse_command_line("medical 1"),
            Err(CommandParseError::MissingArgument("zone"))
        ));
        assert!(matches!(
            parse_command_line("step -2"),
            Err(CommandParseError::InvalidInteger { context: "step count", .. })
        ));
        assert!(matches!(
            parse_command_line("ambulance 0 1 now"),
            Err(CommandParseError::UnexpectedArgument(extra)) if extra == "now"
        ));
    }

    #[test]
    fn tokens_resolve_against_scenario_ids() {
        let ids = ["north", "south"];
        assert_eq!(EntityToken::Id("south".into()).resolve(ids), Some(1));
        assert_eq!(EntityToken::Id("east".into()).resolve(ids), None);
        assert_eq!(EntityToken::Index(7).resolve(ids), Some(7));
        assert_eq!(EntityToken::Index(3).to_string(), "#3");
    }
}
