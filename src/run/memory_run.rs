use std::{mem, sync::Arc, vec::IntoIter};

use crate::{error::Result, orderer::Orderer, sorter::buffer_sort::BufferSort};

use super::RunReader;

/// A run backed by the records still held in the sort buffer.
/// The records are sorted when the reader is opened.
pub struct MemoryRunReader<T, O> {
    /// records waiting for `open`.
    pending: Vec<T>,
    source: IntoIter<T>,
    head: Option<T>,
    orderer: Arc<O>,
    buffer_sort: BufferSort<T, O>,
}

impl<T, O> MemoryRunReader<T, O> {
    pub fn new(records: Vec<T>, orderer: Arc<O>, buffer_sort: BufferSort<T, O>) -> Self {
        Self {
            pending: records,
            source: Vec::new().into_iter(),
            head: None,
            orderer,
            buffer_sort,
        }
    }

    /// the number of records not yet read
    pub fn remaining_items(&self) -> usize {
        self.pending.len() + self.source.len()
    }
}

impl<T, O> RunReader<T> for MemoryRunReader<T, O>
where
    O: Orderer<T>,
{
    fn open(&mut self) -> Result<()> {
        let mut records = mem::take(&mut self.pending);
        (self.buffer_sort)(self.orderer.as_ref(), &mut records);
        self.source = records.into_iter();
        Ok(())
    }

    fn read(&mut self) -> Result<Option<&T>> {
        self.head = self.source.next();
        Ok(self.head.as_ref())
    }

    fn peek(&self) -> Option<&T> {
        self.head.as_ref()
    }

    fn take(&mut self) -> Option<T> {
        self.head.take()
    }

    fn close(&mut self) {
        self.head = None;
        self.source = Vec::new().into_iter();
    }
}

#[cfg(test)]
mod test {
    use crate::{
        orderer::{OrdOrderer, ReverseOrderer},
        sorter::buffer_sort::sequential_sort,
    };

    use super::*;

    #[test]
    fn open_sorts_once() {
        let mut run = MemoryRunReader::new(
            vec![5, 8, 6, 200, 12],
            Arc::new(OrdOrderer::new()),
            sequential_sort,
        );
        run.open().unwrap();

        let mut seen = Vec::new();
        while let Some(&record) = run.read().unwrap() {
            seen.push(record);
        }
        assert_eq!(vec![5, 6, 8, 12, 200], seen);
        run.close();
    }

    #[test]
    fn peek_repeats_last_read() {
        let orderer = Arc::new(ReverseOrderer::new(OrdOrderer::new()));
        let mut run = MemoryRunReader::new(vec!["b", "c", "a"], orderer, sequential_sort);
        run.open().unwrap();
        assert!(run.peek().is_none());

        assert_eq!(Some(&"c"), run.read().unwrap());
        assert_eq!(Some(&"c"), run.peek());
        assert_eq!(Some(&"c"), run.peek());
        assert_eq!(2, run.remaining_items());

        assert_eq!(Some("c"), run.take());
        assert!(run.peek().is_none());
        assert_eq!(Some(&"b"), run.read().unwrap());
    }

    #[test]
    fn exhausted_run_keeps_returning_none() {
        let mut run = MemoryRunReader::new(Vec::<u8>::new(), Arc::new(OrdOrderer), sequential_sort);
        run.open().unwrap();
        assert!(run.read().unwrap().is_none());
        assert!(run.read().unwrap().is_none());
        assert_eq!(0, run.remaining_items());
    }
}
