use serde::{Deserialize, Serialize};

use crate::Channel;

/// Parameters handed to the shape fitter for one image.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DetectionSettings {
    /// 8-bit intensity a pixel must exceed to belong to a blob.
    pub threshold: u8,
    /// Smallest radius a blob's area may correspond to, in pixels.
    pub min_radius: f64,
    /// Largest radius (circles) or axis (ellipses) accepted, in pixels.
    pub max_radius: f64,
}

impl DetectionSettings {
    pub fn for_channel(channel: Channel) -> Self {
        match channel {
            Channel::Spheroid => DetectionSettings {
                threshold: 120,
                min_radius: 40.0,
                max_radius: 500.0,
            },
            Channel::Sensor => DetectionSettings {
                threshold: 120,
                min_radius: 10.0,
                max_radius: 100.0,
            },
        }
    }

    pub fn min_area(&self) -> f64 {
        std::f64::consts::PI * self.min_radius * self.min_radius
    }
}

/// What to do when a reference measurement used as a strain denominator is
/// zero.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ZeroBasePolicy {
    /// Abort the tabulation with an error naming the offending identity.
    #[default]
    Fail,
    /// Leave the affected strain field empty.
    Skip,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Tracking {
    /// Largest centre distance, in pixels, at which a shape may inherit a base
    /// identity.
    pub gate: f64,
}

impl Default for Tracking {
    fn default() -> Self {
        Tracking { gate: 150.0 }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Strain {
    pub pixels_per_micron: f64,
    pub zero_base: ZeroBasePolicy,
}

impl Default for Strain {
    fn default() -> Self {
        Strain {
            pixels_per_micron: 0.638,
            zero_base: ZeroBasePolicy::Fail,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Config {
    pub spheroid: DetectionSettings,
    pub sensor: DetectionSettings,
    pub tracking: Tracking,
    pub strain: Strain,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            spheroid: DetectionSettings::for_channel(Channel::Spheroid),
            sensor: DetectionSettings::for_channel(Channel::Sensor),
            tracking: Default::default(),
            strain: Default::default(),
        }
    }
}

impl Config {
    pub fn detection(&self, channel: Channel) -> &DetectionSettings {
        match channel {
            Channel::Spheroid => &self.spheroid,
            Channel::Sensor => &self.sensor,
        }
    }

    pub fn from_json(json: &str) -> Result<Config, serde_json::Error> {
        serde_json::from_str(json)
    }
}
