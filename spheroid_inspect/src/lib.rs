pub mod analysis;
pub mod collection;
pub mod discovery;
pub mod export;
pub mod image;
pub mod session;

pub use collection::ImageCollection;
pub use discovery::{discover, DiscoveryError};
pub use export::{ExportError, Tabulation};
pub use self::image::{Image, ImageError, ImageSource};
pub use session::Session;

use analysis::StrainError;
use spheroid_api::Channel;

#[derive(Debug)]
pub enum Error {
    UnknownImage { channel: Channel, id: String },
    NoBaseImage,
    Image(ImageError),
    Discovery(DiscoveryError),
    Export(ExportError),
    Strain(StrainError),
    Config(serde_json::Error),
    Io(std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl From<ImageError> for Error {
    fn from(value: ImageError) -> Self {
        Error::Image(value)
    }
}

impl From<DiscoveryError> for Error {
    fn from(value: DiscoveryError) -> Self {
        Error::Discovery(value)
    }
}

impl From<ExportError> for Error {
    fn from(value: ExportError) -> Self {
        Error::Export(value)
    }
}

impl From<StrainError> for Error {
    fn from(value: StrainError) -> Self {
        Error::Strain(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::Config(value)
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::Io(value)
    }
}
