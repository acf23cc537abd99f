//! Analysis toolkit for comparing the ERI and the Hamamatsu X-ray sources.
//!
//! Raw ShadoBox detector frames are decoded from their headerless 16-bit
//! dumps, acquisitions are paired across datasets at equal voltage and
//! closest current, and the pairs are compared through brightness statistics
//! and the slanted-edge resolution pipeline (edge spread, line spread,
//! Gaussian fit, modulation transfer function).

pub mod acquisition;
pub mod brightness;
mod error;
pub mod fit;
pub mod image;
pub mod matching;
#[cfg(feature = "plot")]
pub mod plot;
pub mod resolution;

pub use acquisition::{AcquisitionRecord, Dataset, SourceKind};
pub use brightness::BrightnessComparison;
pub use error::Error;
pub use image::{DetectorFormat, Frame, RawImage};
pub use matching::{match_all, MatchedPair};
pub use resolution::{EdgeRegion, EdgeResponse};
