//! Fixed-order numeric encoding of a simulation state.
//!
//! Feature order: for every zone in scenario order its remaining, evacuated
//! and casualty shares of the population; every shelter's occupancy ratio;
//! every road's condition (1 operational, 0.5 degraded, 0 impassable);
//! every resource's load ratio; finally the timestep as a share of
//! `max_timesteps`. All values lie in `0..=1`.

use serde::Serialize;
use sim_schema::RoadStatus;

use crate::geography::Geography;
use crate::state::SimulationState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "feature", rename_all = "snake_case")]
pub enum FeatureKey {
    ZoneRemaining { zone: u32 },
    ZoneEvacuated { zone: u32 },
    ZoneCasualties { zone: u32 },
    ShelterOccupancy { shelter: u32 },
    RoadCondition { road: u32 },
    ResourceLoad { resource: u32 },
    Timestep,
}

/// Ordered feature list of one scenario, with a display name per feature.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObservationLayout {
    features: Vec<FeatureKey>,
    names: Vec<String>,
    zones: u32,
    resources: u32,
}

impl ObservationLayout {
    pub fn from_geography(geography: &Geography) -> Self {
        let ids = |ids: Vec<&str>| ids.into_iter().map(str::to_string).collect::<Vec<_>>();
        Self::build(
            ids(geography.zones().iter().map(|z| z.id.as_str()).collect()),
            ids(geography.shelters().iter().map(|s| s.id.as_str()).collect()),
            ids(geography.roads().iter().map(|r| r.id.as_str()).collect()),
            ids(geography.resources().iter().map(|r| r.id.as_str()).collect()),
        )
    }

    /// Layout named by entity index, for states without their geography.
    pub fn for_state(state: &SimulationState) -> Self {
        let indices = |count: usize| (0..count).map(|i| format!("#{i}")).collect::<Vec<_>>();
        Self::build(
            indices(state.zones().len()),
            indices(state.shelters().len()),
            indices(state.roads().len()),
            indices(state.resources().len()),
        )
    }

    fn build(
        zones: Vec<String>,
        shelters: Vec<String>,
        roads: Vec<String>,
        resources: Vec<String>,
    ) -> Self {
        let mut features = Vec::new();
        let mut names = Vec::new();
        for (index, id) in zones.iter().enumerate() {
            let zone = index as u32;
            features.push(FeatureKey::ZoneRemaining { zone });
            names.push(format!("zone[{id}].remaining"));
            features.push(FeatureKey::ZoneEvacuated { zone });
            names.push(format!("zone[{id}].evacuated"));
            features.push(FeatureKey::ZoneCasualties { zone });
            names.push(format!("zone[{id}].casualties"));
        }
        for (index, id) in shelters.iter().enumerate() {
            features.push(FeatureKey::ShelterOccupancy {
                shelter: index as u32,
            });
            names.push(format!("shelter[{id}].occupancy"));
        }
        for (index, id) in roads.iter().enumerate() {
            features.push(FeatureKey::RoadCondition { road: index as u32 });
            names.push(format!("road[{id}].condition"));
        }
        for (index, id) in resources.iter().enumerate() {
            features.push(FeatureKey::ResourceLoad {
                resource: index as u32,
            });
            names.push(format!("resource[{id}].load"));
        }
        features.push(FeatureKey::Timestep);
        names.push("timestep".to_string());

        Self {
            features,
            names,
            zones: zones.len() as u32,
            resources: resources.len() as u32,
        }
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn features(&self) -> &[FeatureKey] {
        &self.features
    }

    pub fn zone_count(&self) -> u32 {
        self.zones
    }

    pub fn resource_count(&self) -> u32 {
        self.resources
    }

    pub fn describe(&self) -> &[String] {
        &self.names
    }

    pub fn encode(&self, state: &SimulationState) -> Vec<f32> {
        self.features
            .iter()
            .map(|feature| feature_value(*feature, state))
            .collect()
    }
}

fn feature_value(feature: FeatureKey, state: &SimulationState) -> f32 {
    match feature {
        FeatureKey::ZoneRemaining { zone } => state
            .zones()
            .get(zone as usize)
            .map_or(0.0, |z| share(z.remaining(), z.population())),
        FeatureKey::ZoneEvacuated { zone } => state
            .zones()
            .get(zone as usize)
            .map_or(0.0, |z| share(z.evacuated(), z.population())),
        FeatureKey::ZoneCasualties { zone } => state
            .zones()
            .get(zone as usize)
            .map_or(0.0, |z| share(z.casualties(), z.population())),
        FeatureKey::ShelterOccupancy { shelter } => {
            state.shelters().get(shelter as usize).map_or(0.0, |s| {
                if s.capacity() == 0 {
                    1.0
                } else {
                    share(s.occupancy(), s.capacity())
                }
            })
        }
        FeatureKey::RoadCondition { road } => match state.roads().get(road as usize) {
            Some(RoadStatus::Operational) => 1.0,
            Some(RoadStatus::Degraded) => 0.5,
            Some(RoadStatus::Impassable) | None => 0.0,
        },
        FeatureKey::ResourceLoad { resource } => state
            .resources()
            .get(resource as usize)
            .map_or(0.0, |r| share(r.load(), r.capacity())),
        FeatureKey::Timestep => share(state.timestep(), state.max_timesteps()).min(1.0),
    }
}

fn share(part: u32, whole: u32) -> f32 {
    if whole == 0 {
        0.0
    } else {
        part as f32 / whole as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DynamicsConfig;
    use crate::test_support::{corridor_scenario, geography_for, two_zone_scenario};
    use crate::transition::{advance, HazardSchedule};
    use sim_schema::{ActionRequest, ActionType};

    #[test]
    fn layout_names_features_in_canonical_order() {
        let geo = geography_for(corridor_scenario());
        let layout = ObservationLayout::from_geography(&geo);
        insta::assert_snapshot!(layout.describe().join("\n"), @r###"
        zone[a].remaining
        zone[a].evacuated
        zone[a].casualties
        zone[b].remaining
        zone[b].evacuated
        zone[b].casualties
        zone[c].remaining
        zone[c].evacuated
        zone[c].casualties
        shelter[s0].occupancy
        road[r0].condition
        road[r1].condition
        resource[amb].load
        resource[truck].load
        timestep
        "###);
    }

    #[test]
    fn encoding_tracks_state() {
        let config = DynamicsConfig::default();
        let geo = geography_for(two_zone_scenario());
        let layout = ObservationLayout::from_geography(&geo);
        let schedule = HazardSchedule::for_geography(&geo, &config);
        let state = SimulationState::from_geography(&geo, &config);

        let initial = layout.encode(&state);
        assert_eq!(initial.len(), layout.len());
        assert_eq!(
            initial,
            vec![1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]
        );

        let step = advance(
            &geo,
            &schedule,
            &config,
            &state,
            &[ActionRequest::new(ActionType::EvacuateZone, 0, 0)],
        );
        let encoded = layout.encode(&step.state);
        assert_eq!(encoded.len(), initial.len());
        assert_eq!(&encoded[..3], &[0.2, 0.8, 0.0]);
        assert_eq!(encoded[6], 1.0);
        assert_eq!(encoded[10], 0.1);
        assert!(encoded.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn index_layout_matches_geography_layout_shape() {
        let config = DynamicsConfig::default();
        let geo = geography_for(corridor_scenario());
        let state = SimulationState::from_geography(&geo, &config);
        let by_geography = ObservationLayout::from_geography(&geo);
        let by_state = ObservationLayout::for_state(&state);
        assert_eq!(by_geography.features(), by_state.features());
        assert_eq!(by_state.describe()[0], "zone[#0].remaining");
        assert_eq!(by_geography.encode(&state), by_state.encode(&state));
        assert_eq!(by_state.zone_count(), 3);
        assert_eq!(by_state.resource_count(), 2);
    }
}
