pub mod containment;
pub mod correspondence;
pub mod detection;
pub mod geometry;
pub mod strain;

pub use containment::{assign_sensors, number_spheroids, Assignment};
pub use correspondence::{resolve, Correspondence, Matched};
pub use detection::{MomentFitter, ShapeFitter};
pub use strain::{measure, StrainCalculator, StrainError, Timepoint};
