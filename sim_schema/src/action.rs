use std::fmt;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ResourceKind;

/// The five operator actions, with their stable wire codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum ActionType {
    DispatchAmbulance = 0,
    DispatchMedicalTeam = 1,
    DispatchSupplyTruck = 2,
    EvacuateZone = 3,
    OpenShelter = 4,
}

impl ActionType {
    pub const ALL: [ActionType; 5] = [
        ActionType::DispatchAmbulance,
        ActionType::DispatchMedicalTeam,
        ActionType::DispatchSupplyTruck,
        ActionType::EvacuateZone,
        ActionType::OpenShelter,
    ];

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ActionType::DispatchAmbulance),
            1 => Some(ActionType::DispatchMedicalTeam),
            2 => Some(ActionType::DispatchSupplyTruck),
            3 => Some(ActionType::EvacuateZone),
            4 => Some(ActionType::OpenShelter),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        self as u8
    }

    /// Resource kind a dispatch action requires, `None` for non-dispatch actions.
    pub fn dispatch_kind(self) -> Option<ResourceKind> {
        match self {
            ActionType::DispatchAmbulance => Some(ResourceKind::Ambulance),
            ActionType::DispatchMedicalTeam => Some(ResourceKind::MedicalTeam),
            ActionType::DispatchSupplyTruck => Some(ResourceKind::SupplyTruck),
            ActionType::EvacuateZone | ActionType::OpenShelter => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActionType::DispatchAmbulance => "Send Ambulance",
            ActionType::DispatchMedicalTeam => "Send Medical Team",
            ActionType::DispatchSupplyTruck => "Send Supply Truck",
            ActionType::EvacuateZone => "Evacuate Zone",
            ActionType::OpenShelter => "Open Shelter",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Who issued an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ActionSource {
    #[default]
    Human,
    Ai,
}

/// Action as submitted by a policy for the current timestep.
///
/// `action_type` stays a raw code so that malformed agent output is rejected
/// by the interpreter instead of failing deserialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionRequest {
    pub action_type: u8,
    pub resource_id: u32,
    pub target_zone_id: u32,
    #[serde(default)]
    pub source: ActionSource,
}

impl ActionRequest {
    pub fn new(action: ActionType, resource_id: u32, target_zone_id: u32) -> Self {
        Self {
            action_type: action.code(),
            resource_id,
            target_zone_id,
            source: ActionSource::Human,
        }
    }

    pub fn with_source(mut self, source: ActionSource) -> Self {
        self.source = source;
        self
    }

    pub fn kind(&self) -> Option<ActionType> {
        ActionType::from_code(self.action_type)
    }
}

/// Persisted action log entry. The field set is a stable contract shared
/// with storage, analytics and the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionRecord {
    pub timestep: u32,
    pub action_type: u8,
    pub resource_id: u32,
    pub target_zone_id: u32,
    pub success: bool,
    pub source: ActionSource,
}

impl ActionRecord {
    pub fn from_request(timestep: u32, request: &ActionRequest, success: bool) -> Self {
        Self {
            timestep,
            action_type: request.action_type,
            resource_id: request.resource_id,
            target_zone_id: request.target_zone_id,
            success,
            source: request.source,
        }
    }

    pub fn request(&self) -> ActionRequest {
        ActionRequest {
            action_type: self.action_type,
            resource_id: self.resource_id,
            target_zone_id: self.target_zone_id,
            source: self.source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_cover_the_closed_enumeration() {
        for action in ActionType::ALL {
            assert_eq!(ActionType::from_code(action.code()), Some(action));
        }
        assert_eq!(ActionType::from_code(5), None);
        assert_eq!(
            ActionType::DispatchSupplyTruck.dispatch_kind(),
            Some(ResourceKind::SupplyTruck)
        );
        assert_eq!(ActionType::EvacuateZone.dispatch_kind(), None);
    }

    #[test]
    fn action_record_serializes_with_stable_field_set() {
        let request =
            ActionRequest::new(ActionType::EvacuateZone, 2, 7).with_source(ActionSource::Ai);
        let record = ActionRecord::from_request(3, &request, false);
        let value = serde_json::to_value(record).expect("record serializes");
        let object = value.as_object().expect("record is an object");
        let mut keys: Vec<_> = object.keys().map(String::as_str).collect();
        keys.sort_unstable();
        assert_eq!(
            keys,
            [
                "action_type",
                "resource_id",
                "source",
                "success",
                "target_zone_id",
                "timestep"
            ]
        );
        assert_eq!(object["action_type"], 3);
        assert_eq!(object["source"], "ai");
        assert_eq!(record.request(), request);
    }

    #[test]
    fn request_source_defaults_to_human() {
        let request: ActionRequest =
            serde_json::from_str(r#"{"action_type": 9, "resource_id": 0, "target_zone_id": 1}"#)
                .expect("request parses");
        assert_eq!(request.source, ActionSource::Human);
        assert_eq!(request.kind(), None);
    }
}
