use spheroid_api::{Channel, Config, FitMode, Shape};

use crate::{
    analysis::{
        containment::is_point_in_any_spheroid, number_spheroids, resolve, Correspondence,
        MomentFitter, ShapeFitter,
    },
    collection::ImageCollection,
    image::ImageSource,
    Error, Result,
};

/// Both channels of one experiment.  Every mutation goes through `&mut self`,
/// so the base selection cannot change while a correspondence is rebuilt.
pub struct Session<F: ShapeFitter = MomentFitter> {
    pub config: Config,
    fitter: F,
    spheroids: ImageCollection,
    sensors: ImageCollection,
}

impl Session<MomentFitter> {
    pub fn new(config: Config) -> Self {
        Session::with_fitter(config, MomentFitter)
    }
}

impl<F: ShapeFitter> Session<F> {
    pub fn with_fitter(config: Config, fitter: F) -> Self {
        Session {
            config,
            fitter,
            spheroids: ImageCollection::new(Channel::Spheroid),
            sensors: ImageCollection::new(Channel::Sensor),
        }
    }

    /// Replaces every frame of the session, dropping all detections and the
    /// base selection.
    pub fn load(&mut self, sources: impl IntoIterator<Item = ImageSource>) {
        self.spheroids.reset();
        self.sensors.reset();
        for source in sources {
            self.collection_mut(source.channel).insert(source);
        }
        tracing::info!(
            "Loaded {} spheroid and {} sensor images",
            self.spheroids.len(),
            self.sensors.len()
        );
    }

    pub fn collection(&self, channel: Channel) -> &ImageCollection {
        match channel {
            Channel::Spheroid => &self.spheroids,
            Channel::Sensor => &self.sensors,
        }
    }

    fn collection_mut(&mut self, channel: Channel) -> &mut ImageCollection {
        match channel {
            Channel::Spheroid => &mut self.spheroids,
            Channel::Sensor => &mut self.sensors,
        }
    }

    /// Every timepoint id seen in either channel, sorted.
    pub fn timepoints(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .spheroids
            .ids()
            .chain(self.sensors.ids())
            .map(str::to_string)
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }

    fn ensure_image(&self, channel: Channel, id: &str) -> Result<()> {
        if self.collection(channel).contains(id) {
            Ok(())
        } else {
            Err(Error::UnknownImage {
                channel,
                id: id.to_string(),
            })
        }
    }

    /// Fits shapes on the frame and installs them as its detection result.
    #[tracing::instrument(skip(self))]
    pub fn detect(&mut self, channel: Channel, id: &str, mode: FitMode) -> Result<()> {
        let image = self.collection(channel).get(id).ok_or_else(|| Error::UnknownImage {
            channel,
            id: id.to_string(),
        })?;
        let data = image.load_data()?;
        let candidates = self
            .fitter
            .fit(&data.view(), self.config.detection(channel), mode);
        tracing::info!("Fitted {} shapes on {} {}", candidates.len(), channel, id);

        self.detect_with(channel, id, mode, candidates)
    }

    /// Installs externally fitted `candidates` as the frame's detection result.
    ///
    /// Spheroid candidates go through containment against the same
    /// timepoint's sensors first.  When that pass numbers sensors, the sensor
    /// frame's shapes are replaced with the relabelled list too.
    #[tracing::instrument(skip(self, candidates), fields(count = candidates.len()))]
    pub fn detect_with(
        &mut self,
        channel: Channel,
        id: &str,
        mode: FitMode,
        candidates: Vec<Shape>,
    ) -> Result<()> {
        self.ensure_image(channel, id)?;

        let shapes = match channel {
            Channel::Sensor => candidates,
            Channel::Spheroid => {
                let sibling = channel.sibling();
                let sensors = self
                    .collection(sibling)
                    .get(id)
                    .map(|image| image.shapes())
                    .unwrap_or_else(|| Vec::new().into());
                let assignment = number_spheroids(mode, candidates, &sensors);

                if let Some(relabeled) = assignment.sensors {
                    if let Some(image) = self.collection_mut(sibling).get_mut(id) {
                        image.relabel(relabeled);
                    }
                    self.refresh(sibling, id);
                }
                tracing::debug!("{} spheroids retained", assignment.spheroids.len());
                assignment.spheroids
            }
        };

        if let Some(image) = self.collection_mut(channel).get_mut(id) {
            image.replace_shapes(shapes, mode);
        }
        self.refresh(channel, id);
        Ok(())
    }

    /// Sensor shapes worth drawing on timepoint `id`.  Once a sensor base is
    /// selected these are the tracked sensors; before that, every sensor whose
    /// centre lies inside one of the timepoint's circular spheroids.
    pub fn visible_sensors(&self, id: &str) -> Result<Vec<Shape>> {
        self.ensure_image(Channel::Sensor, id)?;
        let Some(image) = self.sensors.get(id) else {
            return Ok(Vec::new());
        };
        if self.sensors.base_id().is_some() {
            return Ok(image.correspondence().shapes().cloned().collect());
        }

        let spheroids = self
            .spheroids
            .get(id)
            .map(|image| image.shapes())
            .unwrap_or_else(|| Vec::new().into());
        Ok(image
            .shapes()
            .iter()
            .filter(|sensor| is_point_in_any_spheroid(sensor.center(), &spheroids))
            .cloned()
            .collect())
    }

    /// Tracks both channels against the frames at timepoint `id`.
    #[tracing::instrument(skip(self))]
    pub fn set_base(&mut self, id: &str) -> Result<()> {
        let spheroid = self.spheroids.set_base(id);
        let sensor = self.sensors.set_base(id);
        if !spheroid && !sensor {
            return Err(Error::UnknownImage {
                channel: Channel::Spheroid,
                id: id.to_string(),
            });
        }
        if !spheroid || !sensor {
            tracing::warn!("Timepoint {} is missing a channel, that channel has no base", id);
        }
        self.redraw_all();
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub fn clear_base(&mut self) {
        self.spheroids.clear_base();
        self.sensors.clear_base();
        self.redraw_all();
    }

    /// Rebuilds one frame's correspondence against its channel's base.  With
    /// no base selected the correspondence is emptied.
    pub fn redraw(&mut self, channel: Channel, id: &str) -> Result<()> {
        self.ensure_image(channel, id)?;
        let gate = self.config.tracking.gate;
        let collection = self.collection_mut(channel);
        let base = collection.base_shapes();

        if let Some(image) = collection.get_mut(id) {
            let correspondence = match base {
                Some(base) => resolve(channel, &base, &image.shapes(), gate),
                None => Correspondence::default(),
            };
            tracing::debug!(
                "{} {} tracks {} of {} shapes",
                channel,
                id,
                correspondence.len(),
                image.shapes().len()
            );
            image.set_correspondence(correspondence);
        }
        Ok(())
    }

    pub fn redraw_all(&mut self) {
        self.redraw_channel(Channel::Spheroid);
        self.redraw_channel(Channel::Sensor);
    }

    fn redraw_channel(&mut self, channel: Channel) {
        let ids: Vec<String> = self.collection(channel).ids().map(str::to_string).collect();
        for id in ids {
            // The id was just read from the collection.
            let _ = self.redraw(channel, &id);
        }
    }

    /// Redraws after the shapes of `id` changed.  A changed base invalidates
    /// the whole channel.
    fn refresh(&mut self, channel: Channel, id: &str) {
        if self.collection(channel).is_base(id) {
            self.redraw_channel(channel);
        } else {
            let _ = self.redraw(channel, id);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use ndarray::ArrayView2;
    use spheroid_api::{config::DetectionSettings, Circle, Identity};
    use tracing_test::traced_test;

    use super::*;

    fn circle(identity: Identity, x: f64, y: f64, r: f64) -> Shape {
        Circle { x, y, r, identity }.into()
    }

    fn source(channel: Channel, id: &str) -> ImageSource {
        ImageSource {
            id: id.to_string(),
            name: format!("plate {}", id),
            channel,
            path: PathBuf::from(format!("{} {}.tif", id, channel)),
        }
    }

    fn session() -> Session {
        let mut session = Session::new(Config::default());
        session.load(
            ["p01", "p02"]
                .iter()
                .flat_map(|id| [source(Channel::Spheroid, id), source(Channel::Sensor, id)]),
        );
        session
    }

    fn sensors(offset: f64) -> Vec<Shape> {
        vec![
            circle(Identity::numbered(1), 100.0 + offset, 100.0, 10.0),
            circle(Identity::numbered(2), 120.0 + offset, 110.0, 10.0),
            circle(Identity::numbered(3), 800.0 + offset, 800.0, 10.0),
        ]
    }

    fn spheroids(offset: f64) -> Vec<Shape> {
        vec![
            circle(Identity::numbered(1), 110.0 + offset, 100.0, 60.0),
            circle(Identity::numbered(2), 500.0 + offset, 500.0, 60.0),
        ]
    }

    fn detect_timepoint(session: &mut Session, id: &str, offset: f64) {
        session
            .detect_with(Channel::Sensor, id, FitMode::Circle, sensors(offset))
            .unwrap();
        session
            .detect_with(Channel::Spheroid, id, FitMode::Circle, spheroids(offset))
            .unwrap();
    }

    #[test]
    fn test_spheroid_detection_numbers_sensors() {
        let mut session = session();
        detect_timepoint(&mut session, "p01", 0.0);

        let spheroids = session.collection(Channel::Spheroid).get("p01").unwrap().shapes();
        assert_eq!(spheroids.len(), 1);
        assert_eq!(spheroids[0].identity(), Identity::numbered(1));

        let sensors = session.collection(Channel::Sensor).get("p01").unwrap().shapes();
        let identities: Vec<Identity> = sensors.iter().map(Shape::identity).collect();
        assert_eq!(
            identities,
            vec![
                Identity::sensor(1, 'a'),
                Identity::sensor(1, 'b'),
                Identity::numbered(3)
            ]
        );
    }

    #[test]
    fn test_set_base_tracks_both_channels() {
        let mut session = session();
        detect_timepoint(&mut session, "p01", 0.0);
        detect_timepoint(&mut session, "p02", 12.0);

        session.set_base("p01").unwrap();

        let spheroids = session
            .collection(Channel::Spheroid)
            .get("p02")
            .unwrap()
            .correspondence();
        assert_eq!(spheroids.len(), 1);
        assert_eq!(spheroids[&Identity::numbered(1)].distance, 12.0);

        let sensors = session
            .collection(Channel::Sensor)
            .get("p02")
            .unwrap()
            .correspondence();
        assert_eq!(
            sensors.keys().copied().collect::<Vec<_>>(),
            vec![Identity::sensor(1, 'a'), Identity::sensor(1, 'b')]
        );
    }

    #[test]
    fn test_visible_sensors_without_base_are_inside_spheroids() {
        let mut session = session();
        detect_timepoint(&mut session, "p01", 0.0);

        let visible = session.visible_sensors("p01").unwrap();

        let identities: Vec<Identity> = visible.iter().map(Shape::identity).collect();
        assert_eq!(identities, vec![Identity::sensor(1, 'a'), Identity::sensor(1, 'b')]);
    }

    #[test]
    fn test_visible_sensors_with_base_are_tracked() {
        let mut session = session();
        detect_timepoint(&mut session, "p01", 0.0);
        session
            .detect_with(Channel::Sensor, "p02", FitMode::Circle, sensors(5.0))
            .unwrap();
        session.set_base("p01").unwrap();

        assert_eq!(session.visible_sensors("p02").unwrap(), Vec::<Shape>::new());
        assert_eq!(session.visible_sensors("p01").unwrap().len(), 2);
        assert!(session.visible_sensors("p07").is_err());
    }

    #[test]
    fn test_clear_base_empties_correspondence() {
        let mut session = session();
        detect_timepoint(&mut session, "p01", 0.0);
        detect_timepoint(&mut session, "p02", 5.0);
        session.set_base("p01").unwrap();

        session.clear_base();

        for channel in [Channel::Spheroid, Channel::Sensor] {
            for image in session.collection(channel).images() {
                assert!(image.correspondence().is_empty());
            }
        }
    }

    #[test]
    fn test_redetecting_base_redraws_channel() {
        let mut session = session();
        detect_timepoint(&mut session, "p01", 0.0);
        detect_timepoint(&mut session, "p02", 5.0);
        session.set_base("p01").unwrap();

        session
            .detect_with(
                Channel::Spheroid,
                "p01",
                FitMode::Ellipse,
                vec![circle(Identity::numbered(1), 2000.0, 2000.0, 60.0)],
            )
            .unwrap();

        let correspondence = session
            .collection(Channel::Spheroid)
            .get("p02")
            .unwrap()
            .correspondence();
        assert!(correspondence.is_empty());
    }

    #[test]
    fn test_snapshot_outlives_redraw() {
        let mut session = session();
        detect_timepoint(&mut session, "p01", 0.0);
        detect_timepoint(&mut session, "p02", 5.0);
        session.set_base("p01").unwrap();
        let before = session
            .collection(Channel::Spheroid)
            .get("p02")
            .unwrap()
            .correspondence();

        session.clear_base();

        assert_eq!(before.len(), 1);
    }

    #[test]
    fn test_unknown_image() {
        let mut session = session();
        assert!(matches!(
            session.detect_with(Channel::Sensor, "p07", FitMode::Circle, vec![]),
            Err(Error::UnknownImage { .. })
        ));
        assert!(session.set_base("p07").is_err());
    }

    #[test]
    #[traced_test]
    fn test_set_base_with_missing_channel_warns() {
        let mut session = Session::new(Config::default());
        session.load([source(Channel::Spheroid, "p01")]);

        session.set_base("p01").unwrap();

        assert!(logs_contain("missing a channel"));
        assert_eq!(session.collection(Channel::Sensor).base_id(), None);
    }

    struct FixedFitter(Vec<Shape>);

    impl ShapeFitter for FixedFitter {
        fn fit(&self, _: &ArrayView2<u16>, _: &DetectionSettings, _: FitMode) -> Vec<Shape> {
            self.0.clone()
        }
    }

    #[test]
    fn test_detect_reports_unreadable_frame() {
        let mut session = Session::with_fitter(Config::default(), FixedFitter(sensors(0.0)));
        session.load([source(Channel::Sensor, "p01")]);

        assert!(matches!(
            session.detect(Channel::Sensor, "p01", FitMode::Circle),
            Err(Error::Image(_))
        ));
    }
}
