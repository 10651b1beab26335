use crate::error::Result;

pub mod disk_run;
pub mod memory_run;

use self::{disk_run::DiskRunReader, memory_run::MemoryRunReader};

/// A cursor over one run, a sequence of records in ascending order.
///
/// A reader is opened once, read until `read` returns `None`, then closed
/// and never used again.
pub trait RunReader<T> {
    /// prepares the run for reading. Does not yet position on a record.
    fn open(&mut self) -> Result<()>;

    /// advances to the next record and returns it.
    /// If the method returns None, we have reached the end.
    fn read(&mut self) -> Result<Option<&T>>;

    /// returns the record returned by the last `read` without advancing.
    fn peek(&self) -> Option<&T>;

    /// moves the current record out of the reader.
    /// `peek` returns None afterwards until the next `read`.
    fn take(&mut self) -> Option<T>;

    /// releases whatever backs the run.
    fn close(&mut self);
}

/// Either kind of run a sorter merges: the leftover sort buffer
/// or one of its spill files.
pub enum SortRun<T, O, C> {
    Memory(MemoryRunReader<T, O>),
    Disk(DiskRunReader<T, C>),
}

impl<T, O, C> RunReader<T> for SortRun<T, O, C>
where
    MemoryRunReader<T, O>: RunReader<T>,
    DiskRunReader<T, C>: RunReader<T>,
{
    fn open(&mut self) -> Result<()> {
        match self {
            SortRun::Memory(run) => run.open(),
            SortRun::Disk(run) => run.open(),
        }
    }

    fn read(&mut self) -> Result<Option<&T>> {
        match self {
            SortRun::Memory(run) => run.read(),
            SortRun::Disk(run) => run.read(),
        }
    }

    fn peek(&self) -> Option<&T> {
        match self {
            SortRun::Memory(run) => run.peek(),
            SortRun::Disk(run) => run.peek(),
        }
    }

    fn take(&mut self) -> Option<T> {
        match self {
            SortRun::Memory(run) => run.take(),
            SortRun::Disk(run) => run.take(),
        }
    }

    fn close(&mut self) {
        match self {
            SortRun::Memory(run) => run.close(),
            SortRun::Disk(run) => run.close(),
        }
    }
}
