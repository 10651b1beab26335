use std::{
    cmp::Ordering,
    collections::{binary_heap::PeekMut, BinaryHeap},
    marker::PhantomData,
    sync::Arc,
};

use tracing::warn;

use crate::{
    error::{Error, Result},
    orderer::Orderer,
    run::RunReader,
};

/// A reader in the merge heap, paired with the orderer
/// so the heap can compare the readers' current records.
struct HeapEntry<T, R, O> {
    reader: R,
    orderer: Arc<O>,
    phantom: PhantomData<fn() -> T>,
}

impl<T, R, O> PartialEq for HeapEntry<T, R, O>
where
    R: RunReader<T>,
    O: Orderer<T>,
{
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other).is_eq()
    }
}

impl<T, R, O> Eq for HeapEntry<T, R, O>
where
    R: RunReader<T>,
    O: Orderer<T>,
{
}

impl<T, R, O> PartialOrd for HeapEntry<T, R, O>
where
    R: RunReader<T>,
    O: Orderer<T>,
{
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T, R, O> Ord for HeapEntry<T, R, O>
where
    R: RunReader<T>,
    O: Orderer<T>,
{
    /// reversed, so that the std max-heap surfaces the smallest record.
    /// A reader without a current record sorts after everything else.
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.reader.peek(), other.reader.peek()) {
            (Some(l), Some(r)) => self.orderer.compare(l, r).reverse(),
            (Some(_), None) => Ordering::Greater,
            (None, Some(_)) => Ordering::Less,
            (None, None) => Ordering::Equal,
        }
    }
}

/// k-way merge over a set of sorted runs.
///
/// invariants:
/// every reader in the heap is positioned on a record,
/// and the top of the heap holds the smallest of those records.
/// Records that compare equal come out in no particular order.
///
/// A failing run ends the whole merge: the record returned before the
/// failure is still handed out, the error follows on the next call, and
/// after that the merge yields nothing.
pub struct MergeScheduler<T, R, O> {
    heap: BinaryHeap<HeapEntry<T, R, O>>,
    orderer: Arc<O>,
    failure: Option<Error>,
}

impl<T, R, O> MergeScheduler<T, R, O>
where
    R: RunReader<T>,
    O: Orderer<T>,
{
    /// Opens every reader and positions it on its first record.
    /// Readers over empty runs are closed right away.
    pub fn new(readers: impl IntoIterator<Item = R>, orderer: Arc<O>) -> Result<Self> {
        let readers = readers.into_iter();
        let mut merger = Self {
            heap: BinaryHeap::with_capacity(readers.size_hint().0),
            orderer,
            failure: None,
        };
        for reader in readers {
            merger.add_run(reader)?;
        }
        Ok(merger)
    }

    /// Opens one more reader and adds it to the merge.
    pub fn add_run(&mut self, mut reader: R) -> Result<()> {
        reader.open()?;
        if reader.read()?.is_some() {
            self.heap.push(HeapEntry {
                reader,
                orderer: self.orderer.clone(),
                phantom: PhantomData,
            });
        } else {
            reader.close();
        }
        Ok(())
    }

    /// the number of runs that still have records
    pub fn remaining_runs(&self) -> usize {
        self.heap.len()
    }

    /// Returns the smallest record left across all runs and advances its run.
    /// Once this returns `Ok(None)` or an error, it will never yield a record again.
    pub fn next_record(&mut self) -> Result<Option<T>> {
        if let Some(e) = self.failure.take() {
            return Err(e);
        }
        let mut top = match self.heap.peek_mut() {
            Some(top) => top,
            None => return Ok(None),
        };
        let record = top.reader.take();
        match top.reader.read().map(|head| head.is_some()) {
            Ok(true) => {}
            Ok(false) => {
                let mut exhausted = PeekMut::pop(top);
                exhausted.reader.close();
            }
            Err(e) => {
                PeekMut::pop(top).reader.close();
                self.abort(e);
            }
        }
        Ok(record)
    }

    /// closes every reader and parks the error for the next call.
    fn abort(&mut self, error: Error) {
        warn!(error = %error, open_runs = self.heap.len(), "run failed, aborting merge");
        for mut entry in self.heap.drain() {
            entry.reader.close();
        }
        self.failure = Some(error);
    }
}

impl<T, R, O> Iterator for MergeScheduler<T, R, O>
where
    R: RunReader<T>,
    O: Orderer<T>,
{
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_record().transpose()
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use crate::{
        orderer::OrdOrderer,
        run::memory_run::MemoryRunReader,
        sorter::buffer_sort::sequential_sort,
    };

    use super::MergeScheduler;

    fn run_merge_test(runs: Vec<Vec<u32>>) {
        let orderer = Arc::new(OrdOrderer::new());
        let readers = runs
            .iter()
            .cloned()
            .map(|run| MemoryRunReader::new(run, orderer.clone(), sequential_sort));
        let merger = MergeScheduler::new(readers, orderer.clone()).unwrap();

        let result = merger.collect::<Result<Vec<_>, _>>().unwrap();

        let mut expected: Vec<_> = runs.iter().flatten().cloned().collect();
        expected.sort();

        if expected != result {
            for run in &runs {
                println!("run: {run:?}");
            }
        }
        assert_eq!(expected, result);
    }

    #[test]
    fn test_merge_runs() {
        let run_1 = vec![1, 3, 5, 7];
        let run_4 = vec![0, 2, 4, 6];
        let run_3 = vec![8, 10, 12, 14];
        let run_2 = vec![9, 11, 13, 15];

        run_merge_test(vec![run_1, run_2, run_3, run_4]);
    }

    #[test]
    fn test_merge_unbalanced() {
        run_merge_test(vec![vec![1, 4], vec![2, 3], vec![5, 6, 7]]);
    }

    #[test]
    fn test_merge_with_empty_runs() {
        run_merge_test(vec![vec![], vec![3, 3, 9], vec![], vec![1, 3]]);
    }

    #[test]
    fn no_runs_is_exhausted_immediately() {
        let orderer = Arc::new(OrdOrderer::new());
        let mut merger = MergeScheduler::new(
            Vec::<MemoryRunReader<u8, OrdOrderer>>::new(),
            orderer,
        )
        .unwrap();
        assert_eq!(0, merger.remaining_runs());
        assert!(merger.next_record().unwrap().is_none());
        assert!(merger.next_record().unwrap().is_none());
    }

    #[test]
    fn drained_runs_leave_the_heap() {
        let orderer = Arc::new(OrdOrderer::new());
        let readers = vec![
            MemoryRunReader::new(vec![1, 2], orderer.clone(), sequential_sort),
            MemoryRunReader::new(vec![10], orderer.clone(), sequential_sort),
        ];
        let mut merger = MergeScheduler::new(readers, orderer).unwrap();
        assert_eq!(2, merger.remaining_runs());
        assert_eq!(Some(1), merger.next_record().unwrap());
        assert_eq!(Some(2), merger.next_record().unwrap());
        assert_eq!(1, merger.remaining_runs());
        assert_eq!(Some(10), merger.next_record().unwrap());
        assert_eq!(0, merger.remaining_runs());
        assert_eq!(None, merger.next_record().unwrap());
    }

    #[test]
    fn failing_run_keeps_decoded_record_then_ends_merge() {
        use std::fs;

        use crate::{
            codec::{BincodeCodec, RecordCodec},
            error::Error,
            run::disk_run::DiskRunReader,
            tape::compressor::Compression,
        };

        let dir = tempfile::tempdir().unwrap();
        let codec = BincodeCodec::<u32>::new();
        let mut paths = Vec::new();
        for (name, records) in [("a", [1u32, 2]), ("b", [3, 4])] {
            let mut bytes = Vec::new();
            for record in &records {
                codec.encode(record, &mut bytes).unwrap();
            }
            let path = dir.path().join(name);
            fs::write(&path, bytes).unwrap();
            paths.push(path);
        }
        // cut the first run inside its second record
        let full = fs::read(&paths[0]).unwrap();
        fs::write(&paths[0], &full[..full.len() - 2]).unwrap();

        let readers = paths
            .into_iter()
            .map(|path| DiskRunReader::new(path, codec.clone(), Compression::None));
        let mut merger = MergeScheduler::new(readers, Arc::new(OrdOrderer::new())).unwrap();

        assert_eq!(Some(1), merger.next_record().unwrap());
        assert_eq!(0, merger.remaining_runs());
        assert!(matches!(merger.next_record(), Err(Error::Codec(_))));
        assert_eq!(None, merger.next_record().unwrap());
    }

    #[cfg(not(miri))]
    // the only reason this is disabled on miri is that it would run too slowly
    mod random {
        use std::sync::{Arc, Mutex};

        use rand::{rngs::ThreadRng, RngCore};

        use super::run_merge_test;

        fn generate_run(rng: &mut ThreadRng, len: usize) -> Vec<u32> {
            let mut run = Vec::with_capacity(len);
            for _ in 0..len {
                run.push(rng.next_u32() % 64);
            }
            run.sort();
            run
        }

        #[test]
        fn test_merge_runs_random() {
            let params = (1..60).flat_map(move |runs| {
                (0..16).flat_map(move |items| (1..4).map(move |_| (runs, items)))
            });

            let params = Arc::new(Mutex::new(params));

            let threads: Vec<_> = (0..num_cpus::get())
                .map(|_| {
                    let params = params.clone();
                    std::thread::spawn(move || {
                        let mut rng = rand::thread_rng();
                        loop {
                            let next = params.lock().unwrap().next();
                            if let Some((num_runs, num_items)) = next {
                                let runs: Vec<_> =
                                    core::iter::repeat_with(|| generate_run(&mut rng, num_items))
                                        .take(num_runs)
                                        .collect();
                                run_merge_test(runs);
                            } else {
                                break;
                            }
                        }
                    })
                })
                .collect();

            threads.into_iter().for_each(|t| t.join().unwrap());
        }
    }
}
