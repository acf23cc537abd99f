use std::{fs, path::Path, path::PathBuf, time::Instant};

use serde::{Deserialize, Serialize};

#[derive(thiserror::Error, Debug)]
pub enum ImageError {
    #[error("Failed to read the raw image file")]
    Io(#[from] std::io::Error),
    #[error("Raw file holds {got} bytes, expected {expected} for a {width}x{height} u16 frame")]
    SizeMismatch {
        got: usize,
        expected: usize,
        width: usize,
        height: usize,
    },
    #[error("Sample buffer holds {got} samples, expected {expected}")]
    SampleCount { got: usize, expected: usize },
    #[error("Frame shapes disagree: {0}x{1} vs {2}x{3}")]
    ShapeMismatch(usize, usize, usize, usize),
    #[error("Cannot average an empty image stack")]
    EmptyStack,
    #[error("No .raw files found in {0:?}")]
    EmptyDirectory(PathBuf),
    #[error("Invalid glob pattern for the image directory")]
    Pattern(#[from] glob::PatternError),
    #[error("Failed to read a directory entry")]
    Glob(#[from] glob::GlobError),
    #[error("Flat minus dark is not positive at sample {0}")]
    DegenerateFlat(usize),
}
type Result<T> = std::result::Result<T, ImageError>;

/// Detector frame dimensions; the raw dump is headerless so they are
/// supplied out-of-band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectorFormat {
    pub width: usize,
    pub height: usize,
}
impl Default for DetectorFormat {
    /// ShadoBox frame
    fn default() -> Self {
        Self {
            width: 2048,
            height: 1024,
        }
    }
}
impl DetectorFormat {
    pub fn len(&self) -> usize {
        self.width * self.height
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// One detector frame of unsigned 16-bit samples, row major
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    width: usize,
    height: usize,
    samples: Vec<u16>,
}
impl RawImage {
    /// Decodes a headerless dump of big-endian u16 samples, then flips the
    /// frame upside-down and left-right (display orientation convention;
    /// the analysis stages never reorient)
    pub fn decode(bytes: &[u8], format: DetectorFormat) -> Result<Self> {
        let expected = 2 * format.len();
        if bytes.len() != expected {
            return Err(ImageError::SizeMismatch {
                got: bytes.len(),
                expected,
                width: format.width,
                height: format.height,
            });
        }
        let mut samples: Vec<u16> = bytes
            .chunks_exact(2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .collect();
        // flipping a row-major grid both ways is a plain reversal
        samples.reverse();
        Ok(Self {
            width: format.width,
            height: format.height,
            samples,
        })
    }
    /// Reads and decodes one raw file
    pub fn load<P: AsRef<Path>>(path: P, format: DetectorFormat) -> Result<Self> {
        log::info!("Reading image {:?}", path.as_ref());
        let bytes = fs::read(path.as_ref())?;
        Self::decode(&bytes, format)
    }
    /// Loads every `*.raw` file of a directory, in filename order
    pub fn load_dir<P: AsRef<Path>>(dir: P, format: DetectorFormat) -> Result<Vec<Self>> {
        let dir = dir.as_ref();
        let pattern = dir.join("*.raw");
        let mut paths: Vec<_> = glob::glob(pattern.to_str().unwrap())?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        paths.sort();
        if paths.is_empty() {
            return Err(ImageError::EmptyDirectory(dir.to_path_buf()));
        }
        log::info!("Reading in {} images in {:?}...", paths.len(), dir);
        let now = Instant::now();
        let images = paths
            .iter()
            .map(|p| Self::load(p, format))
            .collect::<Result<Vec<_>>>()?;
        log::info!("... loaded in {}ms", now.elapsed().as_millis());
        Ok(images)
    }
    /// Builds a frame from already decoded samples
    pub fn from_samples(format: DetectorFormat, samples: Vec<u16>) -> Result<Self> {
        if samples.len() != format.len() {
            return Err(ImageError::SampleCount {
                got: samples.len(),
                expected: format.len(),
            });
        }
        Ok(Self {
            width: format.width,
            height: format.height,
            samples,
        })
    }
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn samples(&self) -> &[u16] {
        &self.samples
    }
    pub fn get(&self, row: usize, col: usize) -> u16 {
        self.samples[row * self.width + col]
    }
    /// Mean gray value over the whole frame
    pub fn mean(&self) -> f64 {
        self.samples.iter().map(|&v| v as f64).sum::<f64>() / self.samples.len() as f64
    }
    /// Gray value standard deviation over the whole frame
    pub fn std(&self) -> f64 {
        let mean = self.mean();
        (self
            .samples
            .iter()
            .map(|&v| v as f64 - mean)
            .fold(0f64, |s, x| s + x * x)
            / self.samples.len() as f64)
            .sqrt()
    }
    pub fn to_frame(&self) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            samples: self.samples.iter().map(|&v| v as f64).collect(),
        }
    }
    /// Clips the gray values to the mean +- `n_std` standard deviations
    pub fn contrast_stretch(&self, n_std: f64) -> Frame {
        self.to_frame().contrast_stretch(n_std)
    }
}

/// A real-valued frame: the result of averaging, stretching or correcting
/// raw frames
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    width: usize,
    height: usize,
    samples: Vec<f64>,
}
impl Frame {
    /// Per-sample average of an image stack
    pub fn average(images: &[RawImage]) -> Result<Self> {
        let first = images.first().ok_or(ImageError::EmptyStack)?;
        let mut samples = vec![0f64; first.samples.len()];
        for image in images {
            if image.width != first.width || image.height != first.height {
                return Err(ImageError::ShapeMismatch(
                    first.width,
                    first.height,
                    image.width,
                    image.height,
                ));
            }
            for (acc, &v) in samples.iter_mut().zip(image.samples.iter()) {
                *acc += v as f64;
            }
        }
        let n = images.len() as f64;
        samples.iter_mut().for_each(|v| *v /= n);
        Ok(Self {
            width: first.width,
            height: first.height,
            samples,
        })
    }
    /// Flat-field correction `-ln((P - D) / (F - D))` of a projection `P`
    /// with the averaged dark `D` and flat `F` frames
    pub fn flat_correct(projection: &RawImage, dark: &Frame, flat: &Frame) -> Result<Self> {
        if dark.width != projection.width || dark.height != projection.height {
            return Err(ImageError::ShapeMismatch(
                projection.width,
                projection.height,
                dark.width,
                dark.height,
            ));
        }
        if flat.width != projection.width || flat.height != projection.height {
            return Err(ImageError::ShapeMismatch(
                projection.width,
                projection.height,
                flat.width,
                flat.height,
            ));
        }
        let samples = projection
            .samples
            .iter()
            .zip(dark.samples.iter().zip(flat.samples.iter()))
            .enumerate()
            .map(|(index, (&p, (&d, &f)))| {
                let denominator = f - d;
                if denominator <= 0.0 {
                    return Err(ImageError::DegenerateFlat(index));
                }
                // counts below the dark level clamp to the smallest positive ratio
                Ok(-((p as f64 - d).max(f64::MIN_POSITIVE) / denominator).ln())
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            width: projection.width,
            height: projection.height,
            samples,
        })
    }
    pub fn width(&self) -> usize {
        self.width
    }
    pub fn height(&self) -> usize {
        self.height
    }
    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.samples[row * self.width + col]
    }
    pub fn mean(&self) -> f64 {
        self.samples.iter().sum::<f64>() / self.samples.len() as f64
    }
    pub fn std(&self) -> f64 {
        let mean = self.mean();
        (self
            .samples
            .iter()
            .map(|v| v - mean)
            .fold(0f64, |s, x| s + x * x)
            / self.samples.len() as f64)
            .sqrt()
    }
    pub fn min_max(&self) -> (f64, f64) {
        (
            self.samples.iter().cloned().fold(f64::INFINITY, f64::min),
            self.samples
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max),
        )
    }
    /// Clips the samples to the mean +- `n_std` standard deviations
    pub fn contrast_stretch(mut self, n_std: f64) -> Self {
        let (mean, std) = (self.mean(), self.std());
        let (lo, hi) = (mean - n_std * std, mean + n_std * std);
        log::debug!("Clipping frame to [{:.1}:{:.1}]", lo, hi);
        self.samples.iter_mut().for_each(|v| *v = v.clamp(lo, hi));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn format(width: usize, height: usize) -> DetectorFormat {
        DetectorFormat { width, height }
    }

    #[test]
    fn decode_flips_both_ways() {
        // row major [[1,2,3],[4,5,6]] on disk
        let bytes: Vec<u8> = (1u16..=6).flat_map(|v| v.to_be_bytes()).collect();
        let image = RawImage::decode(&bytes, format(3, 2)).unwrap();
        assert_eq!(image.get(0, 0), 6);
        assert_eq!(image.get(0, 2), 4);
        assert_eq!(image.get(1, 0), 3);
        assert_eq!(image.get(1, 2), 1);
    }

    #[test]
    fn decode_rejects_wrong_size() {
        let bytes = vec![0u8; 10];
        assert!(matches!(
            RawImage::decode(&bytes, format(3, 2)),
            Err(ImageError::SizeMismatch { got: 10, .. })
        ));
    }

    #[test]
    fn load_roundtrip() {
        let bytes: Vec<u8> = (0u16..8).flat_map(|v| (v * 100).to_be_bytes()).collect();
        let path = std::env::temp_dir().join(format!("eri-analysis-image-{}.raw", std::process::id()));
        fs::write(&path, &bytes).unwrap();
        let image = RawImage::load(&path, format(4, 2)).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(image.get(0, 0), 700);
        assert_eq!(image.mean(), 350.0);
    }

    #[test]
    fn stats_of_constant_frame() {
        let image = RawImage::from_samples(format(4, 4), vec![100; 16]).unwrap();
        assert_eq!(image.mean(), 100.0);
        assert_eq!(image.std(), 0.0);
    }

    #[test]
    fn contrast_stretch_clips_outliers() {
        let mut samples = vec![100u16; 100];
        samples[0] = 5000;
        let image = RawImage::from_samples(format(10, 10), samples).unwrap();
        let stretched = image.contrast_stretch(3.0);
        let (_, max) = stretched.min_max();
        assert!(max < 5000.0);
        assert_eq!(stretched.get(0, 0), image.mean() + 3.0 * image.std());
        assert_eq!(stretched.get(0, 1), 100.0);
    }

    #[test]
    fn average_of_stack() {
        let a = RawImage::from_samples(format(2, 2), vec![100, 200, 300, 400]).unwrap();
        let b = RawImage::from_samples(format(2, 2), vec![300, 400, 500, 600]).unwrap();
        let mean = Frame::average(&[a, b]).unwrap();
        assert_eq!(mean.samples(), &[200.0, 300.0, 400.0, 500.0]);
    }

    #[test]
    fn average_rejects_empty_and_mismatched_stacks() {
        assert!(matches!(Frame::average(&[]), Err(ImageError::EmptyStack)));
        let a = RawImage::from_samples(format(2, 2), vec![0; 4]).unwrap();
        let b = RawImage::from_samples(format(4, 1), vec![0; 4]).unwrap();
        assert!(matches!(
            Frame::average(&[a, b]),
            Err(ImageError::ShapeMismatch(2, 2, 4, 1))
        ));
    }

    #[test]
    fn flat_correction_of_constant_frames() {
        let projection = RawImage::from_samples(format(2, 2), vec![600; 4]).unwrap();
        let dark = RawImage::from_samples(format(2, 2), vec![100; 4]).unwrap();
        let flat = RawImage::from_samples(format(2, 2), vec![1100; 4]).unwrap();
        let corrected = Frame::flat_correct(
            &projection,
            &Frame::average(&[dark]).unwrap(),
            &Frame::average(&[flat]).unwrap(),
        )
        .unwrap();
        for &v in corrected.samples() {
            assert!((v - 2f64.ln()).abs() < 1e-12);
        }
    }

    #[test]
    fn flat_correction_rejects_degenerate_flat() {
        let projection = RawImage::from_samples(format(2, 2), vec![600; 4]).unwrap();
        let level = RawImage::from_samples(format(2, 2), vec![100; 4]).unwrap();
        let same = Frame::average(&[level]).unwrap();
        assert!(matches!(
            Frame::flat_correct(&projection, &same, &same),
            Err(ImageError::DegenerateFlat(0))
        ));
    }
}
