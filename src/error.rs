use crate::{
    acquisition::AcquisitionError, brightness::BrightnessError, fit::FitError, image::ImageError,
    matching::MatchingError, resolution::ResolutionError,
};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("Error in the `acquisition` module")]
    Acquisition(#[from] AcquisitionError),
    #[error("Error in the `brightness` module")]
    Brightness(#[from] BrightnessError),
    #[error("Error in the `fit` module")]
    Fit(#[from] FitError),
    #[error("Error in the `image` module")]
    Image(#[from] ImageError),
    #[error("Error in the `matching` module")]
    Matching(#[from] MatchingError),
    #[error("Error in the `resolution` module")]
    Resolution(#[from] ResolutionError),
}
