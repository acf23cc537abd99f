use std::{collections::BTreeMap, path::PathBuf};

use crate::acquisition::AcquisitionRecord;

#[derive(thiserror::Error, Debug)]
pub enum MatchingError {
    #[error("No candidate shares the {voltage_kv}kV setting of {reference:?}")]
    UnmatchedRecord {
        voltage_kv: u32,
        reference: PathBuf,
    },
}
type Result<T> = std::result::Result<T, MatchingError>;

/// A reference acquisition paired with the candidate acquired at the same
/// voltage whose current is closest
#[derive(Debug, Clone, Copy)]
pub struct MatchedPair<'a> {
    pub reference: &'a AcquisitionRecord,
    pub candidate: &'a AcquisitionRecord,
}
impl MatchedPair<'_> {
    /// Tube current difference between the two acquisitions [uA]
    pub fn current_offset_ua(&self) -> u32 {
        self.reference.current_ua.abs_diff(self.candidate.current_ua)
    }
}

/// Pairs every reference record with its best candidate, preserving
/// reference order.
///
/// The candidate must have the same voltage (integer equality on the parsed
/// field) and, among those, the smallest current difference; on a tie the
/// earliest candidate wins. A reference voltage absent from the candidates
/// aborts the pass.
pub fn match_all<'a>(
    reference: &'a [AcquisitionRecord],
    candidates: &'a [AcquisitionRecord],
) -> Result<Vec<MatchedPair<'a>>> {
    let mut buckets: BTreeMap<u32, Vec<&AcquisitionRecord>> = BTreeMap::new();
    for candidate in candidates {
        buckets.entry(candidate.voltage_kv).or_default().push(candidate);
    }
    reference
        .iter()
        .map(|r| {
            let bucket =
                buckets
                    .get(&r.voltage_kv)
                    .ok_or_else(|| MatchingError::UnmatchedRecord {
                        voltage_kv: r.voltage_kv,
                        reference: r.path.clone(),
                    })?;
            let mut best = bucket[0];
            for &candidate in &bucket[1..] {
                if candidate.current_ua.abs_diff(r.current_ua)
                    < best.current_ua.abs_diff(r.current_ua)
                {
                    best = candidate;
                }
            }
            log::info!(
                "Found a match for {:?} ({} kV, {} uA) in {:?}",
                r.path.file_name().unwrap_or_default(),
                r.voltage_kv,
                r.current_ua,
                best.path.file_name().unwrap_or_default()
            );
            Ok(MatchedPair {
                reference: r,
                candidate: best,
            })
        })
        .collect()
}
