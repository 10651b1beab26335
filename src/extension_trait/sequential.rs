use std::cmp::Ordering;

use serde::{de::DeserializeOwned, Serialize};

use crate::{
    codec::{BincodeCodec, RecordCodec},
    error::Result,
    orderer::{FuncOrderer, KeyOrderer, OrdOrderer, Orderer},
    sorter::{Sorter, SorterConfig},
};

use super::SortedIter;

pub trait ExternalSortExt: Iterator + Sized {
    /// Sorts the provided Iterator according to the provided config
    /// using the native ordering on the type to sort.
    /// # Errors
    /// This function errors if a run file cannot be written.
    /// Run files written up to that point are removed again.
    fn external_sort(
        self,
        config: SorterConfig,
    ) -> Result<SortedIter<Self::Item, OrdOrderer, BincodeCodec<Self::Item>>>
    where
        Self::Item: Ord + Serialize + DeserializeOwned;

    /// Sorts the provided Iterator according to the provided config
    /// using a custom comparator function.
    /// # Errors
    /// This function errors if a run file cannot be written.
    fn external_sort_by<F>(
        self,
        config: SorterConfig,
        comparator: F,
    ) -> Result<SortedIter<Self::Item, FuncOrderer<F>, BincodeCodec<Self::Item>>>
    where
        F: Fn(&Self::Item, &Self::Item) -> Ordering,
        Self::Item: Serialize + DeserializeOwned;

    /// Sorts the provided Iterator according to the provided config
    /// using a key extraction function.
    /// # Errors
    /// This function errors if a run file cannot be written.
    fn external_sort_by_key<F, K>(
        self,
        config: SorterConfig,
        key_extractor: F,
    ) -> Result<SortedIter<Self::Item, KeyOrderer<F>, BincodeCodec<Self::Item>>>
    where
        F: Fn(&Self::Item) -> K,
        K: Ord,
        Self::Item: Serialize + DeserializeOwned;

    /// Sorts the provided Iterator with an explicit orderer and record codec.
    /// # Errors
    /// This function errors if a run file cannot be written.
    fn external_sort_with<O, C>(
        self,
        config: SorterConfig,
        orderer: O,
        codec: C,
    ) -> Result<SortedIter<Self::Item, O, C>>
    where
        O: Orderer<Self::Item>,
        C: RecordCodec<Self::Item>;
}

impl<I> ExternalSortExt for I
where
    I: Iterator,
{
    fn external_sort(
        self,
        config: SorterConfig,
    ) -> Result<SortedIter<Self::Item, OrdOrderer, BincodeCodec<Self::Item>>>
    where
        Self::Item: Ord + Serialize + DeserializeOwned,
    {
        self.external_sort_with(config, OrdOrderer::new(), BincodeCodec::new())
    }

    fn external_sort_by<F>(
        self,
        config: SorterConfig,
        comparator: F,
    ) -> Result<SortedIter<Self::Item, FuncOrderer<F>, BincodeCodec<Self::Item>>>
    where
        F: Fn(&Self::Item, &Self::Item) -> Ordering,
        Self::Item: Serialize + DeserializeOwned,
    {
        self.external_sort_with(config, FuncOrderer::new(comparator), BincodeCodec::new())
    }

    fn external_sort_by_key<F, K>(
        self,
        config: SorterConfig,
        key_extractor: F,
    ) -> Result<SortedIter<Self::Item, KeyOrderer<F>, BincodeCodec<Self::Item>>>
    where
        F: Fn(&Self::Item) -> K,
        K: Ord,
        Self::Item: Serialize + DeserializeOwned,
    {
        self.external_sort_with(config, KeyOrderer::new(key_extractor), BincodeCodec::new())
    }

    fn external_sort_with<O, C>(
        self,
        config: SorterConfig,
        orderer: O,
        codec: C,
    ) -> Result<SortedIter<Self::Item, O, C>>
    where
        O: Orderer<Self::Item>,
        C: RecordCodec<Self::Item>,
    {
        let sorter = Sorter::new(config, orderer, codec)?;
        SortedIter::new(sorter, self)
    }
}
