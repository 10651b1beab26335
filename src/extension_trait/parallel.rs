use std::cmp::Ordering;

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    codec::BincodeCodec,
    error::Result,
    orderer::{FuncOrderer, KeyOrderer, OrdOrderer, Orderer},
    sorter::{Sorter, SorterConfig},
};

use super::SortedIter;

/// Like [`ExternalSortExt`](super::ExternalSortExt), but every run is sorted
/// with rayon before it is spilled.
pub trait ParallelExternalSortExt: Iterator + Sized
where
    Self::Item: Send + Serialize + DeserializeOwned,
{
    /// Sorts the provided Iterator according to the provided config
    /// the native ordering specified on the iterated type.
    /// # Errors
    /// This function errors if a run file cannot be written.
    fn par_external_sort(
        self,
        config: SorterConfig,
    ) -> Result<SortedIter<Self::Item, OrdOrderer, BincodeCodec<Self::Item>>>
    where
        Self::Item: Ord;

    /// Sorts the provided Iterator according to the provided config
    /// using a custom comparison function.
    /// # Errors
    /// This function errors if a run file cannot be written.
    fn par_external_sort_by<F>(
        self,
        config: SorterConfig,
        comparator: F,
    ) -> Result<SortedIter<Self::Item, FuncOrderer<F>, BincodeCodec<Self::Item>>>
    where
        F: Fn(&Self::Item, &Self::Item) -> Ordering + Send + Sync;

    /// Sorts the provided Iterator according to the provided config
    /// using a key extraction function.
    /// # Errors
    /// This function errors if a run file cannot be written.
    fn par_external_sort_by_key<F, K>(
        self,
        config: SorterConfig,
        key_extractor: F,
    ) -> Result<SortedIter<Self::Item, KeyOrderer<F>, BincodeCodec<Self::Item>>>
    where
        F: Fn(&Self::Item) -> K + Send + Sync,
        K: Ord;
}

fn par_sort<I, O>(
    source: I,
    config: SorterConfig,
    orderer: O,
) -> Result<SortedIter<I::Item, O, BincodeCodec<I::Item>>>
where
    I: Iterator,
    I::Item: Send + Serialize + DeserializeOwned,
    O: Orderer<I::Item> + Sync,
{
    let sorter = Sorter::new(config, orderer, BincodeCodec::new())?.with_parallel_sort();
    SortedIter::new(sorter, source)
}

impl<I> ParallelExternalSortExt for I
where
    I: Iterator,
    I::Item: Send + Serialize + DeserializeOwned,
{
    fn par_external_sort(
        self,
        config: SorterConfig,
    ) -> Result<SortedIter<Self::Item, OrdOrderer, BincodeCodec<Self::Item>>>
    where
        Self::Item: Ord,
    {
        par_sort(self, config, OrdOrderer::new())
    }

    fn par_external_sort_by<F>(
        self,
        config: SorterConfig,
        comparator: F,
    ) -> Result<SortedIter<Self::Item, FuncOrderer<F>, BincodeCodec<Self::Item>>>
    where
        F: Fn(&Self::Item, &Self::Item) -> Ordering + Send + Sync,
    {
        par_sort(self, config, FuncOrderer::new(comparator))
    }

    fn par_external_sort_by_key<F, K>(
        self,
        config: SorterConfig,
        key_extractor: F,
    ) -> Result<SortedIter<Self::Item, KeyOrderer<F>, BincodeCodec<Self::Item>>>
    where
        F: Fn(&Self::Item) -> K + Send + Sync,
        K: Ord,
    {
        par_sort(self, config, KeyOrderer::new(key_extractor))
    }
}
