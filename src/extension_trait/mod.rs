use crate::{
    codec::RecordCodec,
    error::Result,
    orderer::Orderer,
    sorter::{Sorter, SorterState},
};

#[cfg(feature = "parallel_sort")]
/// parallel ordering extension traits.
/// This module is only available when the `parallel_sort` feature is enabled
pub mod parallel;
/// sequential ordering extension traits
pub mod sequential;

#[cfg(feature = "parallel_sort")]
pub use parallel::*;
pub use sequential::*;

/// The iterator returned by the sorting extension traits.
/// It owns its sorter and closes it, removing all run files, when dropped.
pub struct SortedIter<T, O, C>
where
    O: Orderer<T>,
    C: RecordCodec<T>,
{
    sorter: Sorter<T, O, C>,
}

impl<T, O, C> SortedIter<T, O, C>
where
    O: Orderer<T>,
    C: RecordCodec<T>,
{
    /// Feeds every record of `source` into the sorter and ends its preparing phase.
    pub(crate) fn new(mut sorter: Sorter<T, O, C>, source: impl Iterator<Item = T>) -> Result<Self> {
        sorter.add_records(source)?;
        Ok(Self { sorter })
    }

    /// the sorter doing the work, for inspecting its statistics
    pub fn sorter(&self) -> &Sorter<T, O, C> {
        &self.sorter
    }
}

impl<T, O, C> Iterator for SortedIter<T, O, C>
where
    O: Orderer<T>,
    C: RecordCodec<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.sorter.state() == SorterState::Closed {
            return None;
        }
        let next = self.sorter.get_record().transpose();
        if matches!(next, Some(Err(_)) | None) {
            self.sorter.close();
        }
        next
    }
}

impl<T, O, C> Drop for SortedIter<T, O, C>
where
    O: Orderer<T>,
    C: RecordCodec<T>,
{
    fn drop(&mut self) {
        self.sorter.close();
    }
}
