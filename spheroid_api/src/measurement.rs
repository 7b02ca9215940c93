use serde::{Deserialize, Serialize};

use crate::Identity;

/// Physical dimensions of one shape: micrometres, square micrometres and
/// degrees.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub area: f64,
    pub x: f64,
    pub y: f64,
    pub major: f64,
    pub minor: f64,
    pub angle: f64,
}

/// Strain of one tracked sensor between the reference timepoint and another.
/// Missing fields mean the inputs needed to derive them were not tracked.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StrainRow {
    pub identity: Identity,
    pub area_strain: Option<f64>,
    pub radial_strain: Option<f64>,
    pub circumferential_strain: Option<f64>,
}

impl StrainRow {
    pub fn empty(identity: Identity) -> Self {
        StrainRow {
            identity,
            area_strain: None,
            radial_strain: None,
            circumferential_strain: None,
        }
    }
}
