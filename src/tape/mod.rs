use std::{
    collections::VecDeque,
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use tracing::{trace, warn};

use crate::{
    codec::RecordCodec,
    error::{Error, Result},
    run::disk_run::DiskRunReader,
};

use self::compressor::{Compression, RunWriter};

pub mod compressor;
mod file;

pub use file::{is_run_file_name, RUN_FILE_PREFIX, RUN_FILE_SUFFIX};

/// A sealed run persisted in a spill file.
#[derive(Debug, Clone)]
pub struct RunFile {
    path: PathBuf,
    num_records: usize,
    /// 0 for runs spilled from the sort buffer,
    /// one more than the deepest input for runs produced by a merge.
    level: u32,
}

impl RunFile {
    pub fn path(&self) -> &Path {
        &self.path
    }
    pub fn num_records(&self) -> usize {
        self.num_records
    }
    pub fn level(&self) -> u32 {
        self.level
    }
}

/// Owns every spill file of one sorter: where they live, what they are
/// called, which of them are still live and how they are removed again.
pub struct RunManager {
    temp_dir: Option<PathBuf>,
    /// live runs, oldest first.
    runs: VecDeque<RunFile>,
    compression: Compression,
}

impl RunManager {
    pub fn new(compression: Compression) -> Self {
        Self {
            temp_dir: None,
            runs: VecDeque::new(),
            compression,
        }
    }

    /// Points the manager at a directory for its run files.
    /// A missing directory is created, an existing one is swept of
    /// run files left behind by another process. Runs of this process,
    /// including those of other live sorters, are kept.
    pub fn set_temp_directory(&mut self, dir: impl Into<PathBuf>) -> Result<()> {
        let dir = dir.into();
        if dir.is_dir() {
            let swept = sweep_stale_runs(&dir)?;
            if swept > 0 {
                warn!(dir = %dir.display(), swept, "removed stale run files");
            }
        } else {
            fs::create_dir_all(&dir)?;
        }
        self.temp_dir = Some(dir);
        Ok(())
    }

    pub fn temp_directory(&self) -> Option<&Path> {
        self.temp_dir.as_deref()
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn runs(&self) -> impl Iterator<Item = &RunFile> {
        self.runs.iter()
    }

    /// Creates a new run file and lets `fill` write the records into it.
    /// `fill` returns the number of records it wrote.
    /// On failure the partial file is removed and the run list is unchanged.
    pub fn write_run<F>(&mut self, level: u32, fill: F) -> Result<&RunFile>
    where
        F: FnOnce(&mut RunWriter<File>) -> Result<usize>,
    {
        let dir = self.temp_dir.as_ref().ok_or(Error::TempDirectoryUnset)?;
        let path = dir.join(file::next_run_file_name());

        let file = file::create_file(&path)?;
        let written = self.compression.writer(file).and_then(|mut writer| {
            let num_records = fill(&mut writer)?;
            writer.finish()?;
            Ok(num_records)
        });

        match written {
            Ok(num_records) => {
                trace!(path = %path.display(), num_records, level, "sealed run file");
                self.runs.push_back(RunFile {
                    path,
                    num_records,
                    level,
                });
                Ok(&self.runs[self.runs.len() - 1])
            }
            Err(e) => {
                remove_logged(&path);
                Err(e)
            }
        }
    }

    /// Appends every record yielded by `records` to a new run file.
    pub fn write_records<'a, T, C, I>(&mut self, level: u32, codec: &C, records: I) -> Result<&RunFile>
    where
        T: 'a,
        C: RecordCodec<T>,
        I: IntoIterator<Item = &'a T>,
    {
        self.write_run(level, |sink| {
            let mut count = 0;
            for record in records {
                codec.encode(record, sink)?;
                count += 1;
            }
            sink.flush()?;
            Ok(count)
        })
    }

    /// opens a reader over one of the runs
    pub fn reader<T, C>(&self, run: &RunFile, codec: C) -> DiskRunReader<T, C>
    where
        C: RecordCodec<T>,
    {
        DiskRunReader::new(run.path.clone(), codec, self.compression)
    }

    /// Removes the `count` oldest runs from the list and deletes their files.
    pub fn retire_oldest(&mut self, count: usize) {
        let count = count.min(self.runs.len());
        for run in self.runs.drain(..count) {
            remove_logged(&run.path);
        }
    }

    /// Deletes every live run file. Failures are logged, never returned.
    pub fn clear(&mut self) {
        if self.is_empty() {
            return;
        }
        trace!(runs = self.runs.len(), "clearing run files");
        for run in self.runs.drain(..) {
            remove_logged(&run.path);
        }
    }

    /// Removes the temp directory itself. Only an empty directory is removed,
    /// so foreign files in a shared directory are left alone.
    pub fn remove_temp_directory(&mut self) {
        if let Some(dir) = self.temp_dir.take() {
            if let Err(e) = fs::remove_dir(&dir) {
                warn!(dir = %dir.display(), error = %e, "could not remove temp directory");
            }
        }
    }
}

impl Drop for RunManager {
    fn drop(&mut self) {
        self.clear();
    }
}

fn remove_logged(path: &Path) {
    match file::remove_file(path) {
        Ok(()) => trace!(path = %path.display(), "removed run file"),
        Err(e) => warn!(path = %path.display(), error = %e, "could not remove run file"),
    }
}

/// deletes every run file in `dir` that was left behind by another process.
fn sweep_stale_runs(dir: &Path) -> Result<usize> {
    let mut swept = 0;
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let is_run = entry
            .file_name()
            .to_str()
            .map(file::is_stale_run_file_name)
            .unwrap_or(false);
        if is_run && entry.file_type()?.is_file() {
            remove_logged(&entry.path());
            swept += 1;
        }
    }
    Ok(swept)
}

#[cfg(test)]
mod test {
    use crate::{codec::BincodeCodec, run::RunReader};

    use super::*;

    fn run_files_in(dir: &Path) -> Vec<PathBuf> {
        fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap())
            .filter(|e| is_run_file_name(e.file_name().to_str().unwrap()))
            .map(|e| e.path())
            .collect()
    }

    #[test]
    fn spill_without_directory_fails() {
        let mut manager = RunManager::new(Compression::None);
        let err = manager
            .write_records(0, &BincodeCodec::new(), &[1u32, 2, 3])
            .unwrap_err();
        assert!(matches!(err, Error::TempDirectoryUnset));
        assert!(manager.is_empty());
    }

    #[test]
    fn creates_missing_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("nested").join("runs");
        let mut manager = RunManager::new(Compression::None);
        manager.set_temp_directory(&dir).unwrap();
        assert!(dir.is_dir());
        assert_eq!(Some(dir.as_path()), manager.temp_directory());
    }

    #[test]
    fn sweeps_stale_runs_only() {
        let root = tempfile::tempdir().unwrap();
        let other_pid = std::process::id().wrapping_add(1);
        let stale = root
            .path()
            .join(format!("{RUN_FILE_PREFIX}{other_pid}_7{RUN_FILE_SUFFIX}"));
        let foreign = root.path().join("keep_me.txt");
        fs::write(&stale, b"leftover").unwrap();
        fs::write(&foreign, b"data").unwrap();

        let mut manager = RunManager::new(Compression::None);
        manager.set_temp_directory(root.path()).unwrap();

        assert!(!stale.exists());
        assert!(foreign.exists());
    }

    #[test]
    fn keeps_live_runs_of_this_process() {
        let root = tempfile::tempdir().unwrap();
        let codec = BincodeCodec::new();
        let mut first = RunManager::new(Compression::None);
        first.set_temp_directory(root.path()).unwrap();
        first.write_records(0, &codec, &[1u8, 2]).unwrap();

        let mut second = RunManager::new(Compression::None);
        second.set_temp_directory(root.path()).unwrap();
        first.set_temp_directory(root.path()).unwrap();

        assert_eq!(1, run_files_in(root.path()).len());
        let run = first.runs().next().unwrap().clone();
        let mut reader = first.reader::<u8, _>(&run, codec);
        reader.open().unwrap();
        assert_eq!(Some(&1), reader.read().unwrap());
    }

    #[test]
    fn tracks_and_deletes_runs() {
        let root = tempfile::tempdir().unwrap();
        let codec = BincodeCodec::new();
        let mut manager = RunManager::new(Compression::None);
        manager.set_temp_directory(root.path()).unwrap();

        for chunk in [[1u64, 2], [3, 4], [5, 6]] {
            let run = manager.write_records(0, &codec, &chunk).unwrap();
            assert_eq!(2, run.num_records());
        }
        assert_eq!(3, manager.len());
        assert_eq!(3, run_files_in(root.path()).len());

        manager.retire_oldest(2);
        assert_eq!(1, manager.len());
        assert_eq!(1, run_files_in(root.path()).len());

        manager.clear();
        assert!(manager.is_empty());
        assert!(run_files_in(root.path()).is_empty());
    }

    #[test]
    fn failed_fill_leaves_no_file() {
        let root = tempfile::tempdir().unwrap();
        let mut manager = RunManager::new(Compression::None);
        manager.set_temp_directory(root.path()).unwrap();

        let err = manager
            .write_run(0, |_| Err(Error::Codec("boom".into())))
            .unwrap_err();
        assert!(matches!(err, Error::Codec(_)));
        assert!(manager.is_empty());
        assert!(run_files_in(root.path()).is_empty());
    }

    #[test]
    fn removes_empty_temp_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("runs");
        let mut manager = RunManager::new(Compression::None);
        manager.set_temp_directory(&dir).unwrap();
        manager.write_records(0, &BincodeCodec::new(), &["a".to_string()]).unwrap();

        manager.clear();
        manager.remove_temp_directory();
        assert!(!dir.exists());
        assert!(manager.temp_directory().is_none());
    }
}
