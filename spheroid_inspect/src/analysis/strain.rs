use std::collections::BTreeMap;

use serde::Serialize;
use spheroid_api::{config::ZeroBasePolicy, Identity, Measurement, Shape, StrainRow};

/// Sensors whose long axis is within this many degrees of their spheroid's
/// long axis have their minor axis along the radial direction.
pub const ALIGNMENT_LIMIT: f64 = 45.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantity {
    Area,
    Major,
    Minor,
}

#[derive(Debug, PartialEq)]
pub enum StrainError {
    ZeroBase {
        identity: Identity,
        quantity: Quantity,
    },
}

/// Converts the fitter's ellipse angle to the reference convention and folds it
/// into `[0, 90]`.
pub fn adjust_angle(angle: f64) -> f64 {
    let angle = if angle > 90.0 {
        270.0 - angle
    } else {
        90.0 - angle
    };
    if angle > 90.0 {
        180.0 - angle
    } else {
        angle
    }
}

/// Physical dimensions of `shape`.  Every pixel quantity is scaled before area
/// is derived.
pub fn measure(shape: &Shape, pixels_per_micron: f64) -> Measurement {
    match shape {
        Shape::Circle(c) => {
            let (x, y, r) = (
                c.x / pixels_per_micron,
                c.y / pixels_per_micron,
                c.r / pixels_per_micron,
            );
            Measurement {
                area: std::f64::consts::PI * r * r,
                x,
                y,
                major: r,
                minor: r,
                angle: 0.0,
            }
        }
        Shape::Ellipse(e) => {
            let (x, y, w, h) = (
                e.x / pixels_per_micron,
                e.y / pixels_per_micron,
                e.w / pixels_per_micron,
                e.h / pixels_per_micron,
            );
            Measurement {
                area: w * h * std::f64::consts::PI / 4.0,
                x,
                y,
                major: w.max(h),
                minor: w.min(h),
                angle: adjust_angle(e.angle),
            }
        }
    }
}

/// Everything measured at one timepoint, keyed by tracked identity.
#[derive(Serialize, Debug, Clone, Default, PartialEq)]
pub struct Timepoint {
    pub spheroids: BTreeMap<Identity, Measurement>,
    pub sensors: BTreeMap<Identity, Measurement>,
}

impl Timepoint {
    pub fn measure<'a>(
        spheroids: impl IntoIterator<Item = &'a Shape>,
        sensors: impl IntoIterator<Item = &'a Shape>,
        pixels_per_micron: f64,
    ) -> Timepoint {
        Timepoint {
            spheroids: spheroids
                .into_iter()
                .map(|shape| (shape.identity(), measure(shape, pixels_per_micron)))
                .collect(),
            sensors: sensors
                .into_iter()
                .filter(|shape| shape.identity().is_lettered())
                .map(|shape| (shape.identity(), measure(shape, pixels_per_micron)))
                .collect(),
        }
    }
}

pub struct StrainCalculator {
    pub policy: ZeroBasePolicy,
}

impl StrainCalculator {
    pub fn new(policy: ZeroBasePolicy) -> Self {
        StrainCalculator { policy }
    }

    fn relative_change(
        &self,
        identity: Identity,
        quantity: Quantity,
        current: f64,
        base: f64,
    ) -> Result<Option<f64>, StrainError> {
        if base != 0.0 {
            return Ok(Some((current - base) / base));
        }
        match self.policy {
            ZeroBasePolicy::Fail => Err(StrainError::ZeroBase { identity, quantity }),
            ZeroBasePolicy::Skip => {
                tracing::warn!("Reference {:?} of {} is zero, leaving strain empty", quantity, identity);
                Ok(None)
            }
        }
    }

    /// Strain of `sensor` between the `reference` and `current` timepoints.
    ///
    /// Area strain needs the parent spheroid at both timepoints; radial and
    /// circumferential strain additionally need the sensor at both.  Whatever
    /// cannot be derived is left empty.
    pub fn strain(
        &self,
        sensor: Identity,
        reference: &Timepoint,
        current: &Timepoint,
    ) -> Result<StrainRow, StrainError> {
        let mut row = StrainRow::empty(sensor);
        let spheroid = sensor.parent();

        let (current_spheroid, base_spheroid) = match (
            current.spheroids.get(&spheroid),
            reference.spheroids.get(&spheroid),
        ) {
            (Some(current), Some(base)) => (current, base),
            _ => return Ok(row),
        };
        row.area_strain =
            self.relative_change(spheroid, Quantity::Area, current_spheroid.area, base_spheroid.area)?;

        let (current_sensor, base_sensor) =
            match (current.sensors.get(&sensor), reference.sensors.get(&sensor)) {
                (Some(current), Some(base)) => (current, base),
                _ => return Ok(row),
            };

        let delta_angle = current_sensor.angle - current_spheroid.angle;
        if delta_angle < ALIGNMENT_LIMIT {
            row.radial_strain =
                self.relative_change(sensor, Quantity::Major, current_sensor.minor, base_sensor.major)?;
            row.circumferential_strain =
                self.relative_change(sensor, Quantity::Minor, current_sensor.major, base_sensor.minor)?;
        } else {
            row.radial_strain =
                self.relative_change(sensor, Quantity::Minor, current_sensor.major, base_sensor.minor)?;
            row.circumferential_strain =
                self.relative_change(sensor, Quantity::Major, current_sensor.minor, base_sensor.major)?;
        }
        Ok(row)
    }
}
