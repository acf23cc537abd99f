use std::{
    fmt,
    ops::Deref,
    path::{Path, PathBuf},
};

use itertools::Itertools;
use regex::Regex;
use serde::{Deserialize, Serialize};
use strum_macros::EnumIter;

#[derive(thiserror::Error, Debug)]
pub enum AcquisitionError {
    #[error("Filename {0:?} does not match <source>_<NNN>kV_<NNN>uA_<NN>sExp_<NN>.raw")]
    MalformedFilename(String),
    #[error("No .raw files found in {0:?}")]
    EmptyDataset(PathBuf),
    #[error("Invalid glob pattern for the dataset directory")]
    Pattern(#[from] glob::PatternError),
    #[error("Failed to read a dataset entry")]
    Glob(#[from] glob::GlobError),
    #[error("Failed to compile the filename pattern")]
    Regex(#[from] regex::Error),
}
type Result<T> = std::result::Result<T, AcquisitionError>;

/// X-ray source technology under comparison
#[derive(EnumIter, Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceKind {
    Eri,
    Hamamatsu,
}
impl SourceKind {
    /// Does a filename/folder token name this source?
    pub fn matches(&self, token: &str) -> bool {
        token.to_ascii_lowercase().starts_with(match self {
            SourceKind::Eri => "eri",
            SourceKind::Hamamatsu => "hamamatsu",
        })
    }
}
impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Eri => write!(f, "ERI"),
            SourceKind::Hamamatsu => write!(f, "Hamamatsu"),
        }
    }
}

/// Acquisition parameters recovered from a raw image filename,
/// e.g. `ERI_060kV_029uA_15sExp_01.raw`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcquisitionRecord {
    pub path: PathBuf,
    pub source: String,
    pub voltage_kv: u32,
    pub current_ua: u32,
    pub exposure_s: u32,
    pub index: u32,
}
impl AcquisitionRecord {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AcquisitionError::MalformedFilename(format!("{:?}", path)))?;
        let re = Regex::new(r"^([A-Za-z0-9-]+)_(\d+)kV_(\d+)uA_(\d+)sExp_(\d+)\.raw$")?;
        let capts = re
            .captures(name)
            .ok_or_else(|| AcquisitionError::MalformedFilename(name.to_owned()))?;
        let number = |i: usize| {
            capts
                .get(i)
                .unwrap()
                .as_str()
                .parse::<u32>()
                .map_err(|_| AcquisitionError::MalformedFilename(name.to_owned()))
        };
        Ok(Self {
            path: path.to_path_buf(),
            source: capts.get(1).unwrap().as_str().to_owned(),
            voltage_kv: number(2)?,
            current_ua: number(3)?,
            exposure_s: number(4)?,
            index: number(5)?,
        })
    }
    /// Source output power [W]
    pub fn power_w(&self) -> f64 {
        self.voltage_kv as f64 * 1e3 * self.current_ua as f64 * 1e-6
    }
}

/// All acquisitions of one dataset directory, in filename order
#[derive(Debug, Clone)]
pub struct Dataset {
    path: PathBuf,
    records: Vec<AcquisitionRecord>,
}
impl Deref for Dataset {
    type Target = Vec<AcquisitionRecord>;

    fn deref(&self) -> &Self::Target {
        &self.records
    }
}
impl Dataset {
    /// Collects one record per `*.raw` file found in `dir`
    pub fn scan<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let pattern = dir.join("*.raw");
        let mut paths: Vec<_> = glob::glob(pattern.to_str().unwrap())?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        paths.sort();
        if paths.is_empty() {
            return Err(AcquisitionError::EmptyDataset(dir.to_path_buf()));
        }
        log::info!("Reading parameters from {} images in {:?}", paths.len(), dir);
        let records = paths
            .iter()
            .map(AcquisitionRecord::from_path)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            path: dir.to_path_buf(),
            records,
        })
    }
    pub fn path(&self) -> &Path {
        &self.path
    }
    /// Dataset label: the directory name
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
    /// Returns the voltage and current series, in record order
    pub fn voltage_current(&self) -> (Vec<f64>, Vec<f64>) {
        self.records
            .iter()
            .map(|r| (r.voltage_kv as f64, r.current_ua as f64))
            .unzip()
    }
    /// Records with the lowest and highest source output power
    pub fn power_extrema(&self) -> Option<(&AcquisitionRecord, &AcquisitionRecord)> {
        self.records
            .iter()
            .minmax_by(|a, b| a.power_w().total_cmp(&b.power_w()))
            .into_option()
    }
}
