use std::{cmp::Ordering, sync::Arc};

/// The total order a sorter arranges its records by.
///
/// Unlike [`Ord`], an orderer is a value of its own, so the order can carry
/// state (a closure, a key extractor) and can be defined for types that
/// have no natural order at all.
pub trait Orderer<T> {
    /// compares two records
    fn compare(&self, left: &T, right: &T) -> Ordering;
}

impl<T, O> Orderer<T> for Arc<O>
where
    O: Orderer<T> + ?Sized,
{
    fn compare(&self, left: &T, right: &T) -> Ordering {
        (**self).compare(left, right)
    }
}

/// Orders records by their [`Ord`] implementation.
/// This is what a sorter uses when the caller does not supply a comparator;
/// it only exists for record types that are naturally ordered.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrdOrderer;

impl OrdOrderer {
    pub fn new() -> Self {
        Self
    }
}

impl<T: Ord> Orderer<T> for OrdOrderer {
    fn compare(&self, left: &T, right: &T) -> Ordering {
        left.cmp(right)
    }
}

/// Orders records by a key extracted from each of them.
#[derive(Clone)]
pub struct KeyOrderer<F> {
    key_extractor: F,
}

impl<F> KeyOrderer<F> {
    pub fn new<T, K>(key_extractor: F) -> Self
    where
        F: Fn(&T) -> K,
        K: Ord,
    {
        Self { key_extractor }
    }
}

impl<F, T, K> Orderer<T> for KeyOrderer<F>
where
    F: Fn(&T) -> K,
    K: Ord,
{
    fn compare(&self, left: &T, right: &T) -> Ordering {
        (self.key_extractor)(left).cmp(&(self.key_extractor)(right))
    }
}

/// Orders records with a caller supplied comparison function.
#[derive(Clone)]
pub struct FuncOrderer<F> {
    comparator: F,
}

impl<F> FuncOrderer<F> {
    pub fn new<T>(comparator: F) -> Self
    where
        F: Fn(&T, &T) -> Ordering,
    {
        Self { comparator }
    }
}

impl<F, T> Orderer<T> for FuncOrderer<F>
where
    F: Fn(&T, &T) -> Ordering,
{
    fn compare(&self, left: &T, right: &T) -> Ordering {
        (self.comparator)(left, right)
    }
}

/// Inverts another orderer, producing a descending sort.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReverseOrderer<O> {
    inner: O,
}

impl<O> ReverseOrderer<O> {
    pub fn new(inner: O) -> Self {
        Self { inner }
    }
}

impl<T, O: Orderer<T>> Orderer<T> for ReverseOrderer<O> {
    fn compare(&self, left: &T, right: &T) -> Ordering {
        self.inner.compare(left, right).reverse()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ord_orderer_follows_natural_order() {
        let orderer = OrdOrderer::new();
        assert_eq!(Ordering::Less, orderer.compare(&1, &2));
        assert_eq!(Ordering::Equal, orderer.compare(&"a", &"a"));
    }

    #[test]
    fn key_orderer_ignores_payload() {
        let orderer = KeyOrderer::new(|pair: &(u32, &str)| pair.0);
        assert_eq!(Ordering::Equal, orderer.compare(&(3, "x"), &(3, "y")));
        assert_eq!(Ordering::Greater, orderer.compare(&(4, "a"), &(3, "z")));
    }

    #[test]
    fn reverse_and_shared_orderers() {
        let orderer = Arc::new(ReverseOrderer::new(FuncOrderer::new(|a: &i64, b: &i64| a.cmp(b))));
        assert_eq!(Ordering::Greater, orderer.compare(&1, &2));
        assert_eq!(Ordering::Less, orderer.compare(&9, &2));
    }
}
