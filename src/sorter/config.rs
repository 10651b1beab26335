use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    tape::compressor::Compression,
};

/// default number of records buffered before a run is spilled.
pub const DEFAULT_MAX_CACHE_RECORD_NUM: usize = 10_000;
/// default number of run files merged at once.
pub const DEFAULT_MAX_OPEN_FILE_NUM: usize = 100;

/// The configuration for a [`Sorter`](crate::Sorter).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SorterConfig {
    /// records held in memory before the buffer is sorted and spilled.
    pub max_cache_record_num: usize,

    /// run files that may be open at once. More runs than this are
    /// pre-merged in batches before the final merge starts.
    pub max_open_file_num: usize,

    /// Directory for run files. Only needed once the first run is spilled.
    pub temp_directory: Option<PathBuf>,

    /// compression applied to run files.
    pub compression: Compression,
}

impl Default for SorterConfig {
    fn default() -> Self {
        Self {
            max_cache_record_num: DEFAULT_MAX_CACHE_RECORD_NUM,
            max_open_file_num: DEFAULT_MAX_OPEN_FILE_NUM,
            temp_directory: None,
            compression: Compression::None,
        }
    }
}

impl SorterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config from environment variables, falling back to defaults.
    ///
    /// Environment variables:
    /// - `SPILLSORT_MAX_CACHE_RECORDS`: records buffered before a spill
    /// - `SPILLSORT_MAX_OPEN_FILES`: run files merged at once
    /// - `SPILLSORT_TEMP_DIR`: directory for run files
    pub fn from_env() -> Self {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// applies overrides looked up by variable name. Unparsable values are ignored.
    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(v) = lookup("SPILLSORT_MAX_CACHE_RECORDS").and_then(|s| s.parse().ok()) {
            self.max_cache_record_num = v;
        }
        if let Some(v) = lookup("SPILLSORT_MAX_OPEN_FILES").and_then(|s| s.parse().ok()) {
            self.max_open_file_num = v;
        }
        if let Some(dir) = lookup("SPILLSORT_TEMP_DIR").filter(|s| !s.is_empty()) {
            self.temp_directory = Some(PathBuf::from(dir));
        }
        self
    }

    /// Updates the max_cache_record_num attribute.
    /// Useful for fluent-style api usage.
    pub fn max_cache_record_num(self, max_cache_record_num: usize) -> Self {
        Self {
            max_cache_record_num,
            ..self
        }
    }

    /// Updates the max_open_file_num attribute.
    pub fn max_open_file_num(self, max_open_file_num: usize) -> Self {
        Self {
            max_open_file_num,
            ..self
        }
    }

    /// Updates the temp_directory attribute.
    pub fn temp_directory(self, dir: impl Into<PathBuf>) -> Self {
        Self {
            temp_directory: Some(dir.into()),
            ..self
        }
    }

    pub fn compression(self, compression: Compression) -> Self {
        Self {
            compression,
            ..self
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_cache_record_num == 0 {
            return Err(Error::InvalidConfig(
                "max_cache_record_num must be greater than zero".into(),
            ));
        }
        if self.max_open_file_num == 0 {
            return Err(Error::InvalidConfig(
                "max_open_file_num must be greater than zero".into(),
            ));
        }
        self.compression.ensure_available()
    }
}
