use std::{ops::Deref, path::PathBuf, time::Instant};

use rayon::prelude::*;
use serde::Serialize;

use crate::{
    image::{DetectorFormat, ImageError, RawImage},
    matching::MatchedPair,
};

#[derive(thiserror::Error, Debug)]
pub enum BrightnessError {
    #[error("Failed to load a raw image")]
    Image(#[from] ImageError),
    #[error("Mean brightness of the reference image {0:?} is zero")]
    DivisionByZero(PathBuf),
}
type Result<T> = std::result::Result<T, BrightnessError>;

/// Brightness statistics of one matched acquisition pair
#[derive(Debug, Clone, Serialize)]
pub struct BrightnessRecord {
    pub voltage_kv: u32,
    pub reference_current_ua: u32,
    pub candidate_current_ua: u32,
    pub reference_mean: f64,
    pub reference_std: f64,
    pub candidate_mean: f64,
    pub candidate_std: f64,
    /// candidate mean over reference mean
    pub ratio: f64,
}

/// Median and maximum brightness ratio over a comparison batch
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RatioSummary {
    pub median: f64,
    pub median_index: usize,
    pub max: f64,
    pub max_index: usize,
}

/// Per-pair brightness statistics over a matched batch, in pair order
#[derive(Debug, Clone)]
pub struct BrightnessComparison(Vec<BrightnessRecord>);
impl Deref for BrightnessComparison {
    type Target = Vec<BrightnessRecord>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
impl From<Vec<BrightnessRecord>> for BrightnessComparison {
    fn from(records: Vec<BrightnessRecord>) -> Self {
        Self(records)
    }
}
impl BrightnessComparison {
    /// Loads both images of every pair and computes the per-pair statistics;
    /// pairs are independent and processed in parallel
    pub fn evaluate(pairs: &[MatchedPair], format: DetectorFormat) -> Result<Self> {
        let now = Instant::now();
        let records = pairs
            .par_iter()
            .map(|pair| {
                let reference = RawImage::load(&pair.reference.path, format)?;
                let candidate = RawImage::load(&pair.candidate.path, format)?;
                let reference_mean = reference.mean();
                if reference_mean == 0.0 {
                    return Err(BrightnessError::DivisionByZero(pair.reference.path.clone()));
                }
                Ok(BrightnessRecord {
                    voltage_kv: pair.reference.voltage_kv,
                    reference_current_ua: pair.reference.current_ua,
                    candidate_current_ua: pair.candidate.current_ua,
                    reference_mean,
                    reference_std: reference.std(),
                    candidate_mean: candidate.mean(),
                    candidate_std: candidate.std(),
                    ratio: candidate.mean() / reference_mean,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        log::info!(
            "Compared {} pairs in {}ms",
            records.len(),
            now.elapsed().as_millis()
        );
        Ok(Self(records))
    }
    /// Median-of-members and maximum ratio, with the pair indices they occur at
    pub fn ratio_summary(&self) -> Option<RatioSummary> {
        if self.0.is_empty() {
            return None;
        }
        let mut order: Vec<usize> = (0..self.0.len()).collect();
        order.sort_by(|&a, &b| self.0[a].ratio.total_cmp(&self.0[b].ratio));
        let median_index = order[self.0.len() / 2];
        let max_index = order[self.0.len() - 1];
        Some(RatioSummary {
            median: self.0[median_index].ratio,
            median_index,
            max: self.0[max_index].ratio,
            max_index,
        })
    }
    pub fn summary(&self) {
        println!("SUMMARY:");
        println!(" - # of pairs: {}", self.0.len());
        println!(
            "   {:>4} {:>8} {:>8} {:>12} {:>12} {:>8}",
            "kV", "ref uA", "cand uA", "ref mean", "cand mean", "ratio"
        );
        for record in self.0.iter() {
            println!(
                "   {:>4} {:>8} {:>8} {:>12.2} {:>12.2} {:>8.3}",
                record.voltage_kv,
                record.reference_current_ua,
                record.candidate_current_ua,
                record.reference_mean,
                record.candidate_mean,
                record.ratio
            );
        }
        if let Some(ratios) = self.ratio_summary() {
            println!(
                " - median ratio: {:.3} (pair #{}), max ratio: {:.3} (pair #{})",
                ratios.median, ratios.median_index, ratios.max, ratios.max_index
            );
        }
    }
    pub fn to_csv(&self, filename: String) -> std::result::Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_path(filename)?;
        for record in self.0.iter() {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::{acquisition::AcquisitionRecord, matching::match_all};

    fn write_raw(dir: &std::path::Path, name: &str, value: u16, format: DetectorFormat) {
        let bytes: Vec<u8> = std::iter::repeat(value)
            .take(format.len())
            .flat_map(|v| v.to_be_bytes())
            .collect();
        fs::write(dir.join(name), bytes).unwrap();
    }

    #[test]
    fn ratio_of_constant_pairs() {
        let format = DetectorFormat {
            width: 4,
            height: 2,
        };
        let dir =
            std::env::temp_dir().join(format!("eri-analysis-brightness-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        write_raw(&dir, "ERI_040kV_020uA_15sExp_01.raw", 100, format);
        write_raw(&dir, "Hamamatsu_040kV_021uA_15sExp_01.raw", 200, format);
        let reference =
            vec![AcquisitionRecord::from_path(dir.join("ERI_040kV_020uA_15sExp_01.raw")).unwrap()];
        let candidates = vec![AcquisitionRecord::from_path(
            dir.join("Hamamatsu_040kV_021uA_15sExp_01.raw"),
        )
        .unwrap()];
        let pairs = match_all(&reference, &candidates).unwrap();
        let comparison = BrightnessComparison::evaluate(&pairs, format).unwrap();
        fs::remove_dir_all(&dir).unwrap();
        assert_eq!(comparison.len(), 1);
        assert_eq!(comparison[0].ratio, 2.0);
        assert_eq!(comparison[0].reference_std, 0.0);
    }

    #[test]
    fn zero_reference_brightness_is_an_error() {
        let format = DetectorFormat {
            width: 4,
            height: 2,
        };
        let dir = std::env::temp_dir().join(format!(
            "eri-analysis-brightness-zero-{}",
            std::process::id()
        ));
        fs::create_dir_all(&dir).unwrap();
        write_raw(&dir, "ERI_040kV_020uA_15sExp_01.raw", 0, format);
        write_raw(&dir, "Hamamatsu_040kV_021uA_15sExp_01.raw", 200, format);
        let reference =
            vec![AcquisitionRecord::from_path(dir.join("ERI_040kV_020uA_15sExp_01.raw")).unwrap()];
        let candidates = vec![AcquisitionRecord::from_path(
            dir.join("Hamamatsu_040kV_021uA_15sExp_01.raw"),
        )
        .unwrap()];
        let pairs = match_all(&reference, &candidates).unwrap();
        let result = BrightnessComparison::evaluate(&pairs, format);
        fs::remove_dir_all(&dir).unwrap();
        assert!(matches!(result, Err(BrightnessError::DivisionByZero(_))));
    }

    #[test]
    fn ratio_summary_flags_median_and_max() {
        let record = |ratio: f64| BrightnessRecord {
            voltage_kv: 40,
            reference_current_ua: 20,
            candidate_current_ua: 20,
            reference_mean: 100.0,
            reference_std: 0.0,
            candidate_mean: 100.0 * ratio,
            candidate_std: 0.0,
            ratio,
        };
        let comparison =
            BrightnessComparison::from(vec![record(1.5), record(3.0), record(2.0)]);
        let summary = comparison.ratio_summary().unwrap();
        assert_eq!(summary.median, 2.0);
        assert_eq!(summary.median_index, 2);
        assert_eq!(summary.max, 3.0);
        assert_eq!(summary.max_index, 1);
        assert!(BrightnessComparison::from(vec![]).ratio_summary().is_none());
    }
}
