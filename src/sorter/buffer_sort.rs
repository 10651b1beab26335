use crate::orderer::Orderer;

/// How a run is sorted in memory before it is spilled or merged.
pub type BufferSort<T, O> = fn(&O, &mut [T]);

pub fn sequential_sort<T, O>(orderer: &O, buffer: &mut [T])
where
    O: Orderer<T>,
{
    buffer.sort_unstable_by(|a, b| orderer.compare(a, b));
}

#[cfg(feature = "parallel_sort")]
pub fn parallel_sort<T, O>(orderer: &O, buffer: &mut [T])
where
    T: Send,
    O: Orderer<T> + Sync,
{
    use rayon::slice::ParallelSliceMut;

    buffer.par_sort_unstable_by(|a, b| orderer.compare(a, b));
}
