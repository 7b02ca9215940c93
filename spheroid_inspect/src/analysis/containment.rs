use spheroid_api::{Circle, FitMode, Identity, Shape};

use super::geometry::is_point_inside_circle;

/// Result of a containment pass.  `sensors` is `None` when the pass did not
/// touch sensor identities, in which case the sensor image keeps its shapes.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub spheroids: Vec<Shape>,
    pub sensors: Option<Vec<Shape>>,
}

/// Runs containment for freshly fitted spheroid candidates against the sensor
/// image's current detections.
///
/// Only circle-mode spheroid passes prune and number.  Ellipse-mode passes keep
/// every candidate and leave sensor identities alone, as does any pass with no
/// sensor detections to test.
pub fn number_spheroids(mode: FitMode, candidates: Vec<Shape>, sensors: &[Shape]) -> Assignment {
    if mode.is_ellipse() || sensors.is_empty() {
        return Assignment {
            spheroids: candidates,
            sensors: None,
        };
    }

    let circles: Vec<Circle> = candidates
        .iter()
        .filter_map(|shape| shape.as_circle().cloned())
        .collect();
    if circles.len() != candidates.len() {
        tracing::warn!(
            "Containment pass got {} non-circular spheroids, keeping candidates as-is",
            candidates.len() - circles.len()
        );
        return Assignment {
            spheroids: candidates,
            sensors: None,
        };
    }

    let (spheroids, sensors) = assign_sensors(&circles, sensors);
    Assignment {
        spheroids: spheroids.into_iter().map(Shape::from).collect(),
        sensors: Some(sensors),
    }
}

/// Assigns every sensor to the first spheroid, in detection order, whose circle
/// contains the sensor's centre.  Returns the spheroids that received at least
/// one sensor and the relabelled sensor list.
///
/// Sensors are lettered per spheroid in the order they are matched.  A sensor
/// left without a spheroid is numbered by its own 1-based position in
/// `sensors`.
pub fn assign_sensors(spheroids: &[Circle], sensors: &[Shape]) -> (Vec<Circle>, Vec<Shape>) {
    let mut labeled: Vec<Shape> = sensors
        .iter()
        .enumerate()
        .map(|(index, sensor)| sensor.relabeled(Identity::numbered(index as u32 + 1)))
        .collect();
    let mut accepted = vec![false; sensors.len()];
    let mut retained = Vec::new();

    for spheroid in spheroids {
        let mut sensor_count = 0;

        for (index, sensor) in labeled.iter_mut().enumerate() {
            if accepted[index] || !is_point_inside_circle(sensor.center(), spheroid) {
                continue;
            }
            match Identity::nth_sensor(spheroid.identity.group, sensor_count) {
                Some(identity) => {
                    sensor.set_identity(identity);
                    accepted[index] = true;
                    sensor_count += 1;
                }
                None => {
                    accepted[index] = true;
                    tracing::warn!(
                        "Spheroid {} already holds {} sensors, leaving sensor at {:?} unassigned",
                        spheroid.identity,
                        sensor_count,
                        sensor.center()
                    );
                }
            }
        }

        if sensor_count > 0 {
            retained.push(spheroid.clone());
        } else {
            tracing::debug!("Dropping spheroid {} with no sensors", spheroid.identity);
        }
    }

    (retained, labeled)
}

/// True if `point` lies inside any circular spheroid of `spheroids`.
pub fn is_point_in_any_spheroid(point: [f64; 2], spheroids: &[Shape]) -> bool {
    spheroids
        .iter()
        .filter_map(Shape::as_circle)
        .any(|spheroid| is_point_inside_circle(point, spheroid))
}
