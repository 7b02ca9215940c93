use serde::{Deserialize, Serialize};

pub mod config;
pub mod identity;
pub mod measurement;
pub mod shape;

pub use config::Config;
pub use identity::Identity;
pub use measurement::{Measurement, StrainRow};
pub use shape::{Circle, Ellipse, Shape};

/// The two acquisition channels of a session.  Spheroids are imaged in bright
/// field, the embedded sensors in the Texas Red channel.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Channel {
    Spheroid,
    Sensor,
}

impl Channel {
    /// The channel whose detections feed into this one's containment pass.
    pub fn sibling(&self) -> Channel {
        match self {
            Channel::Spheroid => Channel::Sensor,
            Channel::Sensor => Channel::Spheroid,
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Channel::Spheroid => "BF".fmt(f),
            Channel::Sensor => "TR".fmt(f),
        }
    }
}

/// Which primitive the fitter produces for a detection pass.  Every shape of
/// one pass uses the same primitive.
#[derive(Serialize, Deserialize)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FitMode {
    #[default]
    Circle,
    Ellipse,
}

impl FitMode {
    pub fn is_ellipse(&self) -> bool {
        matches!(self, FitMode::Ellipse)
    }
}
