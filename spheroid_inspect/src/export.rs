use std::{
    collections::BTreeMap,
    io,
    path::{Path, PathBuf},
};

use serde::Serialize;
use spheroid_api::{config::Strain, Channel, Identity, Measurement, Shape, StrainRow};

use crate::{
    analysis::{ShapeFitter, StrainCalculator, StrainError, Timepoint},
    session::Session,
    Error,
};

#[derive(Debug)]
pub enum ExportError {
    Io(io::Error),
    Csv(csv::Error),
    Strain(StrainError),
}

impl From<io::Error> for ExportError {
    fn from(value: io::Error) -> Self {
        ExportError::Io(value)
    }
}

impl From<csv::Error> for ExportError {
    fn from(value: csv::Error) -> Self {
        ExportError::Csv(value)
    }
}

impl From<StrainError> for ExportError {
    fn from(value: StrainError) -> Self {
        ExportError::Strain(value)
    }
}

/// Measurements of every tracked identity at every exported timepoint.
///
/// The reference timepoint is measured from the base frames' own shapes;
/// every other timepoint from its correspondence against the base.
#[derive(Serialize, Debug, Clone)]
pub struct Tabulation {
    pub reference: String,
    pub timepoints: BTreeMap<String, Timepoint>,
    pub spheroid_ids: Vec<Identity>,
    pub sensor_ids: Vec<Identity>,
    #[serde(skip)]
    settings: Strain,
}

impl Tabulation {
    /// Every timepoint of the session.
    pub fn all<F: ShapeFitter>(session: &Session<F>) -> Result<Tabulation, Error> {
        Tabulation::build(session, false)
    }

    /// The base timepoint alone.
    pub fn single<F: ShapeFitter>(session: &Session<F>) -> Result<Tabulation, Error> {
        Tabulation::build(session, true)
    }

    fn build<F: ShapeFitter>(session: &Session<F>, base_only: bool) -> Result<Tabulation, Error> {
        let spheroids = session.collection(Channel::Spheroid);
        let sensors = session.collection(Channel::Sensor);
        let reference = spheroids
            .base_id()
            .or(sensors.base_id())
            .ok_or(Error::NoBaseImage)?
            .to_string();
        let settings = session.config.strain.clone();

        let base_spheroids = spheroids.base_shapes().unwrap_or_else(|| Vec::new().into());
        let base_sensors = sensors.base_shapes().unwrap_or_else(|| Vec::new().into());
        let spheroid_ids = sorted_identities(&base_spheroids, |_| true);
        let sensor_ids = sorted_identities(&base_sensors, Identity::is_lettered);

        let mut timepoints = BTreeMap::new();
        timepoints.insert(
            reference.clone(),
            Timepoint::measure(
                base_spheroids.iter(),
                base_sensors.iter(),
                settings.pixels_per_micron,
            ),
        );

        if !base_only {
            for id in session.timepoints() {
                if id == reference {
                    continue;
                }
                let spheroid = spheroids.get(&id).map(|image| image.correspondence());
                let sensor = sensors.get(&id).map(|image| image.correspondence());
                let timepoint = Timepoint::measure(
                    spheroid.iter().flat_map(|correspondence| correspondence.shapes()),
                    sensor.iter().flat_map(|correspondence| correspondence.shapes()),
                    settings.pixels_per_micron,
                );
                timepoints.insert(id, timepoint);
            }
        }

        tracing::info!(
            "Tabulated {} timepoints against {}: {} spheroids, {} sensors",
            timepoints.len(),
            reference,
            spheroid_ids.len(),
            sensor_ids.len()
        );
        Ok(Tabulation {
            reference,
            timepoints,
            spheroid_ids,
            sensor_ids,
            settings,
        })
    }

    /// Strain of every base sensor at `timepoint` relative to the reference.
    /// An unknown timepoint yields rows with every field empty.
    pub fn strain_rows(&self, timepoint: &str) -> Result<Vec<StrainRow>, StrainError> {
        let calculator = StrainCalculator::new(self.settings.zero_base);
        let empty = Timepoint::default();
        let reference = self.timepoints.get(&self.reference).unwrap_or(&empty);
        let current = self.timepoints.get(timepoint).unwrap_or(&empty);

        self.sensor_ids
            .iter()
            .map(|&sensor| calculator.strain(sensor, reference, current))
            .collect()
    }

    /// One row per timepoint, channel and base identity.  Identities missing
    /// at a timepoint get empty measurement cells.
    pub fn write_raw<W: io::Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut writer = csv::Writer::from_writer(writer);
        for (id, timepoint) in &self.timepoints {
            for (channel, identities, measurements) in [
                (Channel::Spheroid, &self.spheroid_ids, &timepoint.spheroids),
                (Channel::Sensor, &self.sensor_ids, &timepoint.sensors),
            ] {
                for identity in identities {
                    writer.serialize(RawRecord::new(
                        id,
                        channel,
                        identity,
                        measurements.get(identity),
                    ))?;
                }
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// One row per non-reference timepoint and base sensor.
    pub fn write_strain<W: io::Write>(&self, writer: W) -> Result<(), ExportError> {
        let mut writer = csv::Writer::from_writer(writer);
        for id in self.timepoints.keys().filter(|id| **id != self.reference) {
            for row in self.strain_rows(id)? {
                writer.serialize(StrainRecord {
                    timepoint: id,
                    identity: row.identity.to_string(),
                    area_strain: row.area_strain,
                    radial_strain: row.radial_strain,
                    circumferential_strain: row.circumferential_strain,
                })?;
            }
        }
        writer.flush()?;
        Ok(())
    }

    /// Writes `<name> - Raw Data.csv`, and `<name> - Calculated Data.csv` when
    /// there is more than one timepoint, into `dir`.
    #[tracing::instrument(skip(self))]
    pub fn export(&self, dir: &Path, name: &str) -> Result<Vec<PathBuf>, ExportError> {
        std::fs::create_dir_all(dir)?;
        let mut written = Vec::new();

        let raw = dir.join(format!("{} - Raw Data.csv", name));
        self.write_raw(std::fs::File::create(&raw)?)?;
        written.push(raw);

        if self.timepoints.len() >= 2 {
            let calculated = dir.join(format!("{} - Calculated Data.csv", name));
            self.write_strain(std::fs::File::create(&calculated)?)?;
            written.push(calculated);
        }

        for path in &written {
            tracing::info!("Wrote {}", path.display());
        }
        Ok(written)
    }
}

fn sorted_identities(shapes: &[Shape], keep: impl Fn(&Identity) -> bool) -> Vec<Identity> {
    let mut identities: Vec<Identity> = shapes
        .iter()
        .map(Shape::identity)
        .filter(|identity| keep(identity))
        .collect();
    identities.sort();
    identities.dedup();
    identities
}

#[derive(Serialize)]
struct RawRecord<'a> {
    timepoint: &'a str,
    channel: String,
    identity: String,
    area: Option<f64>,
    x: Option<f64>,
    y: Option<f64>,
    major: Option<f64>,
    minor: Option<f64>,
    angle: Option<f64>,
}

impl<'a> RawRecord<'a> {
    fn new(
        timepoint: &'a str,
        channel: Channel,
        identity: &Identity,
        measurement: Option<&Measurement>,
    ) -> Self {
        RawRecord {
            timepoint,
            channel: channel.to_string(),
            identity: identity.to_string(),
            area: measurement.map(|m| m.area),
            x: measurement.map(|m| m.x),
            y: measurement.map(|m| m.y),
            major: measurement.map(|m| m.major),
            minor: measurement.map(|m| m.minor),
            angle: measurement.map(|m| m.angle),
        }
    }
}

#[derive(Serialize)]
struct StrainRecord<'a> {
    timepoint: &'a str,
    identity: String,
    area_strain: Option<f64>,
    radial_strain: Option<f64>,
    circumferential_strain: Option<f64>,
}
