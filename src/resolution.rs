use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use crate::{fit, image::RawImage};

#[derive(thiserror::Error, Debug)]
pub enum ResolutionError {
    #[error(
        "Crop rows [{row_start}..{row_end}) / cols [{col_start}..{col_end}) \
         exceed the {width}x{height} image"
    )]
    CropOutOfBounds {
        row_start: usize,
        row_end: usize,
        col_start: usize,
        col_end: usize,
        width: usize,
        height: usize,
    },
    #[error("Cannot normalize a curve whose minimum and maximum are equal ({0})")]
    DegenerateRange(f64),
}
type Result<T> = std::result::Result<T, ResolutionError>;

/// Crop region straddling the slanted edge of the resolution phantom.
/// The default is the right-hand edge as imaged on the ShadoBox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRegion {
    pub row_start: usize,
    pub row_end: usize,
    pub col_start: usize,
    pub col_end: usize,
}
impl Default for EdgeRegion {
    fn default() -> Self {
        Self {
            row_start: 100,
            row_end: 900,
            col_start: 1600,
            col_end: 1750,
        }
    }
}

/// Averaged edge response: the column-wise mean over the cropped rows
pub fn compute_esf(image: &RawImage, region: &EdgeRegion) -> Result<Vec<f64>> {
    let (width, height) = (image.width(), image.height());
    if region.row_start >= region.row_end
        || region.row_end > height
        || region.col_start >= region.col_end
        || region.col_end > width
    {
        return Err(ResolutionError::CropOutOfBounds {
            row_start: region.row_start,
            row_end: region.row_end,
            col_start: region.col_start,
            col_end: region.col_end,
            width,
            height,
        });
    }
    let rows = (region.row_end - region.row_start) as f64;
    Ok((region.col_start..region.col_end)
        .map(|col| {
            (region.row_start..region.row_end)
                .map(|row| image.get(row, col) as f64)
                .sum::<f64>()
                / rows
        })
        .collect())
}

/// Line spread function: magnitude of the discrete first difference of the
/// edge response
pub fn compute_lsf(esf: &[f64]) -> Vec<f64> {
    esf.windows(2).map(|w| (w[1] - w[0]).abs()).collect()
}

/// Fits `A exp(-(x - mu)^2 / 2 sigma^2)` over the sample indices and returns
/// the fitted curve. A fit that does not converge yields an all-zero curve;
/// callers treat that as "no usable fit" and keep going with the batch.
pub fn fit_gaussian(samples: &[f64]) -> Vec<f64> {
    match fit::gaussian(samples) {
        Ok(bell) => (0..samples.len()).map(|x| bell.value(x as f64)).collect(),
        Err(error) => {
            log::warn!("Gaussian fit failed ({error}), returning a zero curve");
            vec![0f64; samples.len()]
        }
    }
}

/// Modulation transfer function: DFT magnitude of a line-spread-like input,
/// truncated to the non-negative frequency half
pub fn compute_mtf(lsf: &[f64]) -> Vec<f64> {
    let n = lsf.len();
    (0..n / 2)
        .map(|k| {
            let (mut re, mut im) = (0f64, 0f64);
            for (j, &x) in lsf.iter().enumerate() {
                let angle = -2.0 * PI * (k * j) as f64 / n as f64;
                re += x * angle.cos();
                im += x * angle.sin();
            }
            re.hypot(im)
        })
        .collect()
}

/// Rescales a curve to [0, 1]
pub fn normalize(curve: &[f64]) -> Result<Vec<f64>> {
    let min = curve.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = curve.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max == min {
        return Err(ResolutionError::DegenerateRange(max));
    }
    Ok(curve.iter().map(|x| (x - min) / (max - min)).collect())
}

/// Every stage of the slanted-edge pipeline for one image
#[derive(Debug, Clone)]
pub struct EdgeResponse {
    pub esf: Vec<f64>,
    pub lsf: Vec<f64>,
    pub lsf_fit: Vec<f64>,
    pub mtf: Vec<f64>,
}
impl EdgeResponse {
    pub fn evaluate(image: &RawImage, region: &EdgeRegion) -> Result<Self> {
        let esf = compute_esf(image, region)?;
        let lsf = compute_lsf(&esf);
        let lsf_fit = fit_gaussian(&lsf);
        let mtf = compute_mtf(&lsf_fit);
        Ok(Self {
            esf,
            lsf,
            lsf_fit,
            mtf,
        })
    }
    /// True when the Gaussian fit failed and the MTF carries no information
    pub fn is_degenerate(&self) -> bool {
        self.lsf_fit.iter().all(|&x| x == 0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::image::DetectorFormat;

    fn constant_image(width: usize, height: usize, value: u16) -> RawImage {
        RawImage::from_samples(
            DetectorFormat { width, height },
            vec![value; width * height],
        )
        .unwrap()
    }

    /// Left half 0, right half 4095, step at `edge_col`
    fn step_image(width: usize, height: usize, edge_col: usize) -> RawImage {
        let samples = (0..height)
            .flat_map(|_| (0..width).map(|col| if col < edge_col { 0 } else { 4095 }))
            .collect();
        RawImage::from_samples(DetectorFormat { width, height }, samples).unwrap()
    }

    #[test]
    fn esf_of_a_constant_block() {
        let image = constant_image(8, 16, 100);
        let region = EdgeRegion {
            row_start: 0,
            row_end: 10,
            col_start: 0,
            col_end: 5,
        };
        let esf = compute_esf(&image, &region).unwrap();
        assert_eq!(esf, vec![100.0; 5]);
    }

    #[test]
    fn esf_rejects_out_of_bounds_crops() {
        let image = constant_image(8, 16, 0);
        for region in [
            EdgeRegion {
                row_start: 0,
                row_end: 17,
                col_start: 0,
                col_end: 5,
            },
            EdgeRegion {
                row_start: 0,
                row_end: 10,
                col_start: 4,
                col_end: 4,
            },
            EdgeRegion {
                row_start: 0,
                row_end: 10,
                col_start: 0,
                col_end: 9,
            },
        ] {
            assert!(matches!(
                compute_esf(&image, &region),
                Err(ResolutionError::CropOutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn lsf_is_non_negative() {
        let esf = [4095.0, 4000.0, 2000.0, 100.0, 0.0, 0.0];
        let lsf = compute_lsf(&esf);
        assert_eq!(lsf.len(), esf.len() - 1);
        assert!(lsf.iter().all(|&v| v >= 0.0));
        assert_eq!(lsf[0], 95.0);
    }

    #[test]
    fn gaussian_fallback_is_zero_filled() {
        assert_eq!(fit_gaussian(&[0.0; 16]), vec![0.0; 16]);
        assert_eq!(fit_gaussian(&[3.0; 16]), vec![0.0; 16]);
    }

    #[test]
    fn mtf_length_and_flat_signal() {
        let mtf = compute_mtf(&[5.0; 32]);
        assert_eq!(mtf.len(), 16);
        assert!((mtf[0] - 32.0 * 5.0).abs() < 1e-9);
        for &bin in &mtf[1..] {
            assert!(bin.abs() < 1e-9);
        }
    }

    #[test]
    fn mtf_of_an_impulse_is_flat() {
        let mut impulse = vec![0.0; 32];
        impulse[0] = 1.0;
        let mtf = compute_mtf(&impulse);
        assert_eq!(mtf.len(), 16);
        for &bin in &mtf {
            assert!((bin - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn normalize_rescales_to_unit_range() {
        let scaled = normalize(&[2.0, 4.0, 6.0]).unwrap();
        assert_eq!(scaled, vec![0.0, 0.5, 1.0]);
        assert!(matches!(
            normalize(&[3.0; 4]),
            Err(ResolutionError::DegenerateRange(_))
        ));
    }

    #[test]
    fn step_edge_end_to_end() {
        let image = step_image(2048, 1024, 1024);
        let region = EdgeRegion {
            row_start: 100,
            row_end: 900,
            col_start: 1000,
            col_end: 1050,
        };
        let response = EdgeResponse::evaluate(&image, &region).unwrap();
        // LSF peaks right at the step
        let peak = response
            .lsf
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 1024 - region.col_start - 1);
        // contrast transfer never grows with frequency
        let tolerance = 1e-9 * response.mtf.first().copied().unwrap_or(1.0).max(1.0);
        for pair in response.mtf.windows(2) {
            assert!(pair[1] <= pair[0] + tolerance);
        }
    }
}
