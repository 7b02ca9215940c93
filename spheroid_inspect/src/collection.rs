use std::{collections::BTreeMap, sync::Arc};

use spheroid_api::{Channel, Shape};

use crate::image::{Image, ImageSource};

/// Every frame of one channel, keyed by timepoint id, and which of them is the
/// base that other timepoints are tracked against.
#[derive(Debug, Clone)]
pub struct ImageCollection {
    pub channel: Channel,
    images: BTreeMap<String, Image>,
    base_id: Option<String>,
}

impl ImageCollection {
    pub fn new(channel: Channel) -> Self {
        ImageCollection {
            channel,
            images: BTreeMap::new(),
            base_id: None,
        }
    }

    /// Adds a frame, replacing any earlier frame with the same id.
    pub fn insert(&mut self, source: ImageSource) {
        if let Some(previous) = self.images.insert(source.id.clone(), source.into()) {
            tracing::warn!(
                "Replaced {} image {} ({})",
                self.channel,
                previous.id(),
                previous.source.path.display()
            );
        }
    }

    /// Drops every frame and the base selection.
    pub fn reset(&mut self) {
        self.images.clear();
        self.base_id = None;
    }

    pub fn get(&self, id: &str) -> Option<&Image> {
        self.images.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Image> {
        self.images.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.images.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn images(&self) -> impl Iterator<Item = &Image> {
        self.images.values()
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }

    pub fn base_id(&self) -> Option<&str> {
        self.base_id.as_deref()
    }

    pub fn is_base(&self, id: &str) -> bool {
        self.base_id() == Some(id)
    }

    /// Selects the base frame.  Returns false, leaving no base selected, when
    /// this channel has no frame with that id.
    pub fn set_base(&mut self, id: &str) -> bool {
        if self.contains(id) {
            self.base_id = Some(id.to_string());
            true
        } else {
            self.base_id = None;
            false
        }
    }

    pub fn clear_base(&mut self) {
        self.base_id = None;
    }

    pub fn base(&self) -> Option<&Image> {
        self.base_id().and_then(|id| self.get(id))
    }

    /// Snapshot of the base frame's shapes.
    pub fn base_shapes(&self) -> Option<Arc<[Shape]>> {
        self.base().map(Image::shapes)
    }
}
