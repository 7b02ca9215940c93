use std::{path::PathBuf, sync::Arc};

use ndarray::Array2;
use spheroid_api::{Channel, FitMode, Shape};

use crate::analysis::Correspondence;

#[derive(Debug)]
pub enum ImageError {
    Decode(image::ImageError),
    InvalidFrame(ndarray::ShapeError),
}

impl From<image::ImageError> for ImageError {
    fn from(value: image::ImageError) -> Self {
        ImageError::Decode(value)
    }
}

impl From<ndarray::ShapeError> for ImageError {
    fn from(value: ndarray::ShapeError) -> Self {
        ImageError::InvalidFrame(value)
    }
}

/// Where a frame lives on disk and which timepoint and channel it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageSource {
    pub id: String,
    pub name: String,
    pub channel: Channel,
    pub path: PathBuf,
}

/// One frame of a session and everything derived from it.
///
/// Shape lists and correspondences are immutable snapshots.  Updating either
/// swaps the whole `Arc`, so a clone taken earlier keeps observing a complete
/// earlier state.
#[derive(Debug, Clone)]
pub struct Image {
    pub source: ImageSource,
    mode: FitMode,
    shapes: Arc<[Shape]>,
    correspondence: Arc<Correspondence>,
}

impl From<ImageSource> for Image {
    fn from(source: ImageSource) -> Self {
        Image {
            source,
            mode: FitMode::default(),
            shapes: Arc::from(Vec::new()),
            correspondence: Default::default(),
        }
    }
}

impl Image {
    pub fn id(&self) -> &str {
        &self.source.id
    }

    pub fn channel(&self) -> Channel {
        self.source.channel
    }

    pub fn mode(&self) -> FitMode {
        self.mode
    }

    pub fn shapes(&self) -> Arc<[Shape]> {
        self.shapes.clone()
    }

    pub fn correspondence(&self) -> Arc<Correspondence> {
        self.correspondence.clone()
    }

    /// Installs a new detection result.  The previous correspondence no longer
    /// describes these shapes, so it is dropped.
    pub fn replace_shapes(&mut self, shapes: Vec<Shape>, mode: FitMode) {
        self.shapes = Arc::from(shapes);
        self.mode = mode;
        self.correspondence = Default::default();
    }

    /// Installs a relabelled copy of the current shapes, keeping the fit mode.
    pub fn relabel(&mut self, shapes: Vec<Shape>) {
        self.shapes = Arc::from(shapes);
        self.correspondence = Default::default();
    }

    pub fn set_correspondence(&mut self, correspondence: Correspondence) {
        self.correspondence = Arc::new(correspondence);
    }

    /// Reads the frame as 16-bit grey levels, indexed `(row, col)`.
    pub fn load_data(&self) -> Result<Array2<u16>, ImageError> {
        let frame = image::open(&self.source.path)?.into_luma16();
        let (width, height) = frame.dimensions();
        Ok(Array2::from_shape_vec(
            (height as usize, width as usize),
            frame.into_raw(),
        )?)
    }
}
