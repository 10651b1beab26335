use std::{mem, path::Path, sync::Arc};

use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, info, warn};

use crate::{
    codec::{BincodeCodec, RecordCodec},
    error::{Error, Result},
    merge::MergeScheduler,
    orderer::{OrdOrderer, Orderer},
    run::{memory_run::MemoryRunReader, SortRun},
    tape::{RunFile, RunManager},
};

use self::buffer_sort::{sequential_sort, BufferSort};

pub mod buffer_sort;
mod config;

pub use config::{SorterConfig, DEFAULT_MAX_CACHE_RECORD_NUM, DEFAULT_MAX_OPEN_FILE_NUM};

/// The phase a sorter is in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SorterState {
    /// accepting records
    Preparing,
    /// handing out records in sorted order
    Sorting,
    /// terminal, nothing is permitted anymore
    Closed,
}

/// Counters describing the work done in the current cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortStats {
    /// records accepted by `add_record`
    pub records_added: u64,
    /// runs spilled from the sort buffer
    pub runs_spilled: u64,
    /// batches merged into a larger run before the final merge
    pub premerge_batches: u64,
    /// the deepest merge level any run reached
    pub merge_levels: u32,
}

type FinalMerge<T, O, C> = MergeScheduler<T, SortRun<T, O, Arc<C>>, O>;

/// A bounded-memory sorter.
///
/// Records are pushed with [`add_record`](Sorter::add_record) and pulled back
/// in sorted order with [`get_record`](Sorter::get_record). At most
/// `max_cache_record_num` records are held in memory; everything else lives
/// in run files in the temp directory until it is merged back.
///
/// A sorter is used by a single caller; the `&mut self` receivers make
/// sharing it between threads without a lock impossible.
pub struct Sorter<T, O, C> {
    state: SorterState,
    max_cache_record_num: usize,
    max_open_file_num: usize,
    buffer: Vec<T>,
    orderer: Arc<O>,
    codec: Arc<C>,
    buffer_sort: BufferSort<T, O>,
    /// declared before `runs` so open readers are closed before their files are removed.
    merger: Option<FinalMerge<T, O, C>>,
    runs: RunManager,
    stats: SortStats,
    /// set when a fatal error hit sorting, cleared by `reset`.
    aborted: bool,
}

impl<T> Sorter<T, OrdOrderer, BincodeCodec<T>>
where
    T: Ord + Serialize + DeserializeOwned,
{
    /// A sorter using the natural order of `T` and the bincode codec.
    pub fn natural(config: SorterConfig) -> Result<Self> {
        Self::new(config, OrdOrderer::new(), BincodeCodec::new())
    }
}

impl<T, O, C> Sorter<T, O, C>
where
    O: Orderer<T>,
    C: RecordCodec<T>,
{
    /// Creates a sorter from a validated config, ordering records with
    /// `orderer` and writing run files with `codec`.
    pub fn new(config: SorterConfig, orderer: O, codec: C) -> Result<Self> {
        config.validate()?;
        let mut runs = RunManager::new(config.compression);
        if let Some(dir) = config.temp_directory {
            runs.set_temp_directory(dir)?;
        }
        Ok(Self {
            state: SorterState::Preparing,
            max_cache_record_num: config.max_cache_record_num,
            max_open_file_num: config.max_open_file_num,
            buffer: Vec::new(),
            orderer: Arc::new(orderer),
            codec: Arc::new(codec),
            buffer_sort: sequential_sort::<T, O>,
            merger: None,
            runs,
            stats: SortStats::default(),
            aborted: false,
        })
    }

    /// the phase the sorter is in
    pub fn state(&self) -> SorterState {
        self.state
    }

    /// counters for the current cycle, zeroed by `reset`
    pub fn stats(&self) -> SortStats {
        self.stats
    }

    /// the number of records currently held in the sort buffer
    pub fn buffered_records(&self) -> usize {
        self.buffer.len()
    }

    /// the number of live run files
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// where run files are written, if a directory has been set
    pub fn temp_directory(&self) -> Option<&Path> {
        self.runs.temp_directory()
    }

    /// how many records are buffered before a spill
    pub fn max_cache_record_num(&self) -> usize {
        self.max_cache_record_num
    }

    /// how many run files the final merge may hold open
    pub fn max_open_file_num(&self) -> usize {
        self.max_open_file_num
    }

    pub fn set_max_cache_record_num(&mut self, max_cache_record_num: usize) -> Result<()> {
        self.ensure_open("configure the sorter")?;
        if max_cache_record_num == 0 {
            return Err(Error::InvalidConfig(
                "max_cache_record_num must be greater than zero".into(),
            ));
        }
        self.max_cache_record_num = max_cache_record_num;
        Ok(())
    }

    pub fn set_max_open_file_num(&mut self, max_open_file_num: usize) -> Result<()> {
        self.ensure_open("configure the sorter")?;
        if max_open_file_num == 0 {
            return Err(Error::InvalidConfig(
                "max_open_file_num must be greater than zero".into(),
            ));
        }
        self.max_open_file_num = max_open_file_num;
        Ok(())
    }

    /// Sets the directory run files are written to.
    /// The directory is created if missing, otherwise run files other
    /// processes left in it are removed.
    ///
    /// Only possible while preparing and before the first spill; once run
    /// files exist they stay where they are, and the call is rejected with
    /// [`Error::InvalidState`].
    pub fn set_temp_directory(&mut self, dir: impl Into<std::path::PathBuf>) -> Result<()> {
        if self.state != SorterState::Preparing || !self.runs.is_empty() {
            return Err(self.invalid_state("change the temp directory"));
        }
        self.runs.set_temp_directory(dir)
    }

    /// Adds a record to the sort.
    ///
    /// Once the buffer holds `max_cache_record_num` records it is sorted and
    /// spilled to a new run file. Outside of the preparing phase the call is
    /// ignored and reported as [`Error::InvalidState`].
    pub fn add_record(&mut self, record: T) -> Result<()> {
        if self.state != SorterState::Preparing {
            return Err(self.invalid_state("add a record"));
        }
        if self.aborted {
            return Err(Error::SortAborted);
        }
        self.buffer.push(record);
        self.stats.records_added += 1;
        if self.buffer.len() >= self.max_cache_record_num {
            self.spill()?;
        }
        Ok(())
    }

    /// adds every record of the iterator, stopping at the first error.
    pub fn add_records(&mut self, records: impl IntoIterator<Item = T>) -> Result<usize> {
        let mut added = 0;
        for record in records {
            self.add_record(record)?;
            added += 1;
        }
        Ok(added)
    }

    /// Returns the next record in sorted order, or `Ok(None)` once every
    /// record has been returned.
    ///
    /// The first call ends the preparing phase. Pre-merging the spilled runs
    /// happens inside that call, so it may take as long as rewriting the data.
    ///
    /// A failing run aborts the sort: the error is returned once and every
    /// later call fails with [`Error::SortAborted`] until [`reset`](Sorter::reset).
    pub fn get_record(&mut self) -> Result<Option<T>> {
        if self.state == SorterState::Closed {
            return Err(self.invalid_state("get a record"));
        }
        if self.aborted {
            return Err(Error::SortAborted);
        }
        if self.state == SorterState::Preparing {
            if let Err(e) = self.start_sorting() {
                return Err(self.abort(e));
            }
        }
        let next = match self.merger.as_mut() {
            Some(merger) => merger.next_record(),
            None => Ok(None),
        };
        next.map_err(|e| self.abort(e))
    }

    /// Borrows the sorter as an iterator over the remaining sorted records.
    pub fn sorted(&mut self) -> Sorted<'_, T, O, C> {
        Sorted {
            sorter: self,
            failed: false,
        }
    }

    /// Throws away every record and run file of the current cycle
    /// and starts accepting records again.
    pub fn reset(&mut self) {
        if self.state == SorterState::Closed {
            warn!("reset called on a closed sorter");
            return;
        }
        self.cleanup();
        self.state = SorterState::Preparing;
    }

    /// Removes every run file and the temp directory. The directory is
    /// only removed when it is empty afterwards; files the sorter did not
    /// create keep it alive. The sorter cannot be used afterwards.
    /// Closing twice is harmless.
    pub fn close(&mut self) {
        if self.state == SorterState::Closed {
            return;
        }
        self.cleanup();
        self.runs.remove_temp_directory();
        self.state = SorterState::Closed;
        debug!("sorter closed");
    }

    fn cleanup(&mut self) {
        self.merger = None;
        self.runs.clear();
        self.buffer = Vec::new();
        self.stats = SortStats::default();
        self.aborted = false;
    }

    /// Stops handing out records after a fatal error. Run files stay
    /// on disk until the sorter is reset, closed or dropped.
    fn abort(&mut self, error: Error) -> Error {
        warn!(error = %error, state = ?self.state, "sort aborted");
        self.merger = None;
        self.aborted = true;
        error
    }

    fn ensure_open(&self, operation: &'static str) -> Result<()> {
        if self.state == SorterState::Closed {
            Err(self.invalid_state(operation))
        } else {
            Ok(())
        }
    }

    fn invalid_state(&self, operation: &'static str) -> Error {
        warn!(operation, state = ?self.state, "operation not permitted, ignoring it");
        Error::InvalidState {
            operation,
            state: self.state,
        }
    }

    /// sorts the buffer and moves it into a new run file.
    /// If this fails, the buffer keeps its records.
    fn spill(&mut self) -> Result<()> {
        (self.buffer_sort)(self.orderer.as_ref(), &mut self.buffer);
        let run = self
            .runs
            .write_records(0, self.codec.as_ref(), &self.buffer)?;
        debug!(records = run.num_records(), path = %run.path().display(), "spilled sort buffer");
        self.buffer.clear();
        self.stats.runs_spilled += 1;
        Ok(())
    }

    /// Freezes insertion and sets up the final merge over every run file
    /// and whatever is left in the buffer.
    fn start_sorting(&mut self) -> Result<()> {
        self.premerge()?;

        let codec = &self.codec;
        let readers: Vec<_> = self
            .runs
            .runs()
            .map(|run| SortRun::Disk(self.runs.reader::<T, _>(run, codec.clone())))
            .collect();
        debug!(
            disk_runs = readers.len(),
            buffered = self.buffer.len(),
            "starting final merge"
        );
        let mut merger = MergeScheduler::new(readers, self.orderer.clone())?;

        if !self.buffer.is_empty() {
            let leftover = mem::take(&mut self.buffer);
            merger.add_run(SortRun::Memory(MemoryRunReader::new(
                leftover,
                self.orderer.clone(),
                self.buffer_sort,
            )))?;
        }

        self.merger = Some(merger);
        self.state = SorterState::Sorting;
        Ok(())
    }

    /// Merges batches of runs into larger runs until no more than
    /// `max_open_file_num` runs are left, so the final merge never
    /// holds more files open than permitted.
    fn premerge(&mut self) -> Result<()> {
        if self.runs.len() <= self.max_open_file_num {
            return Ok(());
        }
        let initial_runs = self.runs.len();
        // a batch of one run would never shrink the run list
        let fan_in = self.max_open_file_num.max(2);

        while self.runs.len() > self.max_open_file_num {
            let batch: Vec<RunFile> = self.runs.runs().take(fan_in).cloned().collect();
            self.merge_batch(&batch)?;
            self.runs.retire_oldest(batch.len());
        }

        info!(
            initial_runs,
            remaining_runs = self.runs.len(),
            batches = self.stats.premerge_batches,
            levels = self.stats.merge_levels,
            "pre-merge finished"
        );
        Ok(())
    }

    /// k-way merges one batch of runs into a new run at the end of the run list.
    fn merge_batch(&mut self, batch: &[RunFile]) -> Result<()> {
        let level = batch.iter().map(RunFile::level).max().unwrap_or(0) + 1;
        let readers = batch
            .iter()
            .map(|run| self.runs.reader::<T, _>(run, self.codec.clone()));
        let mut merger = MergeScheduler::new(readers, self.orderer.clone())?;

        let codec = self.codec.clone();
        let merged = self.runs.write_run(level, |sink| {
            let mut count = 0;
            while let Some(record) = merger.next_record()? {
                codec.encode(&record, sink)?;
                count += 1;
            }
            Ok(count)
        })?;
        debug!(
            inputs = batch.len(),
            records = merged.num_records(),
            level,
            "merged run batch"
        );

        self.stats.premerge_batches += 1;
        self.stats.merge_levels = self.stats.merge_levels.max(level);
        Ok(())
    }
}

#[cfg(feature = "parallel_sort")]
impl<T, O, C> Sorter<T, O, C>
where
    T: Send,
    O: Orderer<T> + Sync,
{
    /// Sorts spill buffers with rayon instead of on the calling thread.
    pub fn with_parallel_sort(mut self) -> Self {
        self.buffer_sort = buffer_sort::parallel_sort::<T, O>;
        self
    }
}

/// Iterator over the sorted records of a sorter, see [`Sorter::sorted`].
/// Stops after the first error.
pub struct Sorted<'a, T, O, C> {
    sorter: &'a mut Sorter<T, O, C>,
    failed: bool,
}

impl<'a, T, O, C> Iterator for Sorted<'a, T, O, C>
where
    O: Orderer<T>,
    C: RecordCodec<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        let next = self.sorter.get_record().transpose();
        self.failed = matches!(next, Some(Err(_)));
        next
    }
}
