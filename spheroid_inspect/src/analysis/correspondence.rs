use std::collections::BTreeMap;

use serde::Serialize;
use spheroid_api::{Channel, Identity, Shape};

use super::geometry::distance;

/// A current shape that inherited a base identity, and how far its centre is
/// from the base shape's centre.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Matched {
    pub shape: Shape,
    pub distance: f64,
}

/// Base identity to best matching current shape, for one image.  Built whole by
/// [`resolve`] and never edited afterwards.
#[derive(Serialize, Debug, Clone, PartialEq, Default)]
#[derive(derive_more::Deref)]
pub struct Correspondence(BTreeMap<Identity, Matched>);

impl Correspondence {
    pub fn shapes(&self) -> impl Iterator<Item = &Shape> {
        self.0.values().map(|matched| &matched.shape)
    }
}

/// Whether `shape` may take part in correspondence for `channel`.  Sensors
/// that were never assigned to a spheroid are noise.
fn is_trackable(channel: Channel, shape: &Shape) -> bool {
    match channel {
        Channel::Spheroid => true,
        Channel::Sensor => shape.identity().is_lettered(),
    }
}

/// Maps each of `current` onto the nearest of `base`, keeping only the closest
/// current shape per base identity.  Matches further away than `gate` are
/// dropped.
///
/// Ties between equally distant base shapes go to the first in `base`; ties
/// between current shapes for one identity go to the first in `current`.
pub fn resolve(channel: Channel, base: &[Shape], current: &[Shape], gate: f64) -> Correspondence {
    let mut slots: BTreeMap<Identity, Matched> = BTreeMap::new();

    for shape in current.iter().filter(|shape| is_trackable(channel, shape)) {
        let mut closest: Option<(&Shape, f64)> = None;
        for candidate in base.iter().filter(|candidate| is_trackable(channel, candidate)) {
            let dist = distance(shape.center(), candidate.center());
            if closest.map_or(true, |(_, min_dist)| dist < min_dist) {
                closest = Some((candidate, dist));
            }
        }

        let Some((closest, min_dist)) = closest else {
            continue;
        };
        if min_dist > gate {
            tracing::debug!(
                "{} shape {} at {:?} is {:.1}px from base {}, beyond the {}px gate",
                channel,
                shape.identity(),
                shape.center(),
                min_dist,
                closest.identity(),
                gate
            );
            continue;
        }

        let identity = closest.identity();
        let replace = match slots.get(&identity) {
            Some(existing) => min_dist < existing.distance,
            None => true,
        };
        if replace {
            slots.insert(
                identity,
                Matched {
                    shape: shape.relabeled(identity),
                    distance: min_dist,
                },
            );
        }
    }

    Correspondence(slots)
}
