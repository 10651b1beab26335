//! Bounded-memory external sorting.
//!
//! A [`Sorter`] accepts records one at a time and hands them back in the
//! order defined by an [`Orderer`]. Only `max_cache_record_num` records are
//! kept in memory; whenever the buffer fills up it is sorted and spilled to
//! a run file. When the first record is requested, runs are merged in
//! batches of at most `max_open_file_num` until few enough remain to be
//! merged in one final k-way pass.
//!
//! ```no_run
//! use spillsort::{Sorter, SorterConfig};
//!
//! let config = SorterConfig::new()
//!     .max_cache_record_num(100_000)
//!     .temp_directory("/tmp/spillsort");
//! let mut sorter = Sorter::natural(config)?;
//! for record in [5u64, 8, 6, 200, 12, 120, 90] {
//!     sorter.add_record(record)?;
//! }
//! while let Some(record) = sorter.get_record()? {
//!     println!("{record}");
//! }
//! sorter.close();
//! # Ok::<(), spillsort::Error>(())
//! ```

mod codec;
mod error;
mod extension_trait;
mod merge;
mod orderer;
mod run;
mod sorter;
mod tape;

pub use codec::{BincodeCodec, RecordCodec};
pub use error::{Error, Result};
pub use extension_trait::*;
pub use merge::MergeScheduler;
pub use orderer::{FuncOrderer, KeyOrderer, OrdOrderer, Orderer, ReverseOrderer};
pub use run::{disk_run::DiskRunReader, memory_run::MemoryRunReader, RunReader};
pub use sorter::{
    buffer_sort::{sequential_sort, BufferSort},
    SortStats, Sorted, Sorter, SorterConfig, SorterState, DEFAULT_MAX_CACHE_RECORD_NUM,
    DEFAULT_MAX_OPEN_FILE_NUM,
};
pub use tape::{compressor::Compression, is_run_file_name, RUN_FILE_PREFIX, RUN_FILE_SUFFIX};
