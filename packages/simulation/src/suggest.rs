//! Placement suggestions: which ward most needs a given facility.
//!
//! A single attribute decides each intervention type. Wards without a
//! value for that attribute are skipped rather than ranked as zero.

use serde::{Deserialize, Serialize};
use urban_sim_simulation_models::InterventionType;
use urban_sim_ward::{Ward, WardRegistry};
use urban_sim_ward_models::WardAttribute;

use crate::SimulationError;

/// A suggested ward for an intervention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Suggestion {
    pub ward_code: String,
    pub ward_name: String,
    pub intervention_type: InterventionType,
    /// Human-readable ranking reason.
    pub reason: String,
    /// Ward centroid longitude.
    pub longitude: f64,
    /// Ward centroid latitude.
    pub latitude: f64,
}

#[derive(Debug, Clone, Copy)]
enum Rank {
    Highest(WardAttribute),
    Lowest(WardAttribute),
}

impl Rank {
    const fn for_intervention(intervention: InterventionType) -> Option<Self> {
        match intervention {
            InterventionType::School | InterventionType::Hospital => {
                Some(Self::Highest(WardAttribute::PopulationTotal))
            }
            InterventionType::Park => Some(Self::Lowest(WardAttribute::VegetationPct)),
            InterventionType::Mall => Some(Self::Highest(WardAttribute::GdpCrore)),
            InterventionType::Road
            | InterventionType::RoadFlyover
            | InterventionType::RoadTunnel => None,
        }
    }

    const fn attribute(self) -> WardAttribute {
        match self {
            Self::Highest(attribute) | Self::Lowest(attribute) => attribute,
        }
    }

    fn better(self, candidate: f64, best: f64) -> bool {
        match self {
            Self::Highest(_) => candidate > best,
            Self::Lowest(_) => candidate < best,
        }
    }
}

/// Picks the ward in `registry` best suited for `intervention`.
///
/// Ties go to the lowest ward code.
///
/// # Errors
///
/// Returns [`SimulationError::UnsupportedIntervention`] for intervention
/// types with no ranking rule and [`SimulationError::NoCandidate`] if no
/// ward has the ranking attribute.
pub fn suggest(
    registry: &WardRegistry,
    intervention: InterventionType,
) -> Result<Suggestion, SimulationError> {
    let rank = Rank::for_intervention(intervention).ok_or_else(|| {
        SimulationError::UnsupportedIntervention {
            intervention: intervention.to_string(),
        }
    })?;
    let attribute = rank.attribute();

    let mut best: Option<(&Ward, f64)> = None;
    for ward in registry.list() {
        let Some(value) = ward.attributes().get(attribute) else {
            continue;
        };
        if best.is_none_or(|(_, current)| rank.better(value, current)) {
            best = Some((ward, value));
        }
    }

    let (ward, value) = best.ok_or(SimulationError::NoCandidate { intervention })?;
    let direction = match rank {
        Rank::Highest(_) => "highest",
        Rank::Lowest(_) => "lowest",
    };

    log::debug!("Suggesting {} for {intervention} ({attribute} = {value})", ward.code());

    Ok(Suggestion {
        ward_code: ward.code().to_string(),
        ward_name: ward.name().to_string(),
        intervention_type: intervention,
        reason: format!("{direction} {attribute} ({value})"),
        longitude: ward.centroid().x(),
        latitude: ward.centroid().y(),
    })
}
