//! Measured quantities held by timelines.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A measured quantity. Material quantities carry the store's material id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quantity {
    /// m/s
    Velocity,
    /// m³/s
    Discharge,
    /// m above datum
    WaterLevel,
    /// m³/s leaving a node onto the surface
    Spill,
    /// m³/s of transported material
    MassFlux(u32),
    /// kg/m³
    Concentration(u32),
}

impl Quantity {
    /// Quantities filled by an edge bulk load.
    pub const EDGE_HYDRAULICS: [Quantity; 3] = [
        Quantity::Velocity,
        Quantity::Discharge,
        Quantity::WaterLevel,
    ];

    /// Quantities filled by a node bulk load.
    pub const NODE_HYDRAULICS: [Quantity; 2] = [Quantity::WaterLevel, Quantity::Spill];

    pub fn material(self) -> Option<u32> {
        match self {
            Quantity::MassFlux(m) | Quantity::Concentration(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Quantity::Velocity => write!(f, "velocity"),
            Quantity::Discharge => write!(f, "discharge"),
            Quantity::WaterLevel => write!(f, "waterlevel"),
            Quantity::Spill => write!(f, "spill"),
            Quantity::MassFlux(m) => write!(f, "massflux:{m}"),
            Quantity::Concentration(m) => write!(f, "concentration:{m}"),
        }
    }
}

impl FromStr for Quantity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        let material = |rest: &str| {
            rest.parse::<u32>()
                .map_err(|_| format!("Invalid material id in quantity: {s}"))
        };
        match lower.as_str() {
            "velocity" | "v" => Ok(Quantity::Velocity),
            "discharge" | "q" => Ok(Quantity::Discharge),
            "waterlevel" | "water_level" | "h" => Ok(Quantity::WaterLevel),
            "spill" => Ok(Quantity::Spill),
            other => {
                if let Some(rest) = other.strip_prefix("massflux:") {
                    material(rest).map(Quantity::MassFlux)
                } else if let Some(rest) = other.strip_prefix("concentration:") {
                    material(rest).map(Quantity::Concentration)
                } else {
                    Err(format!("Unknown quantity: {s}"))
                }
            }
        }
    }
}
