//! Insertion-sorted array with binary search lookup.
//!
//! Items are kept ordered by the comparator given at construction. New items
//! are shifted into place instead of re-sorting, which is cheap for the
//! mostly-ascending order modules are registered in. Lookups take a comparator
//! closure so callers can search with a looser notion of equality than the
//! insertion order uses (e.g. "address falls inside this range").

use std::cmp::Ordering;

/// Initial capacity of a sorted array.
pub const DEFAULT_CAPACITY: usize = 256;

pub struct SortedArray<T> {
    items: Vec<T>,
    compare: fn(&T, &T) -> Ordering,
}

impl<T> SortedArray<T> {
    #[must_use]
    pub fn new(compare: fn(&T, &T) -> Ordering) -> Self {
        Self::with_capacity(DEFAULT_CAPACITY, compare)
    }

    #[must_use]
    pub fn with_capacity(capacity: usize, compare: fn(&T, &T) -> Ordering) -> Self {
        Self { items: Vec::with_capacity(capacity.max(1)), compare }
    }

    /// Inserts `item` keeping the array sorted.
    ///
    /// Items comparing equal keep their insertion order. Storage doubles when full.
    pub fn add(&mut self, item: T) {
        if self.items.len() == self.items.capacity() {
            self.items.reserve_exact(self.items.capacity());
        }
        let mut idx = self.items.len();
        while idx > 0 && (self.compare)(&item, &self.items[idx - 1]) == Ordering::Less {
            idx -= 1;
        }
        self.items.insert(idx, item);
    }

    /// Binary search with a comparator returning the ordering of an item relative
    /// to the searched key, as [`slice::binary_search_by`] does.
    ///
    /// Of several matching items the last one inserted is returned.
    pub fn find_by<F>(&self, mut compare: F) -> Option<&T>
    where
        F: FnMut(&T) -> Ordering,
    {
        let idx = self.items.partition_point(|item| compare(item) != Ordering::Greater);
        let item = self.items.get(idx.checked_sub(1)?)?;
        (compare(item) == Ordering::Equal).then_some(item)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.items.capacity()
    }
}

impl<'a, T> IntoIterator for &'a SortedArray<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn items<T: Copy>(array: &SortedArray<T>) -> Vec<T> {
        array.iter().copied().collect()
    }

    fn by_value(a: &u32, b: &u32) -> Ordering {
        a.cmp(b)
    }

    #[test]
    fn test_add_keeps_order() {
        let mut array = SortedArray::new(by_value);
        for value in [5, 1, 4, 2, 3, 0, 9] {
            array.add(value);
        }
        assert_eq!(items(&array), [0, 1, 2, 3, 4, 5, 9]);
    }

    #[test]
    fn test_equal_items_keep_insertion_order() {
        fn by_key(a: &(u32, char), b: &(u32, char)) -> Ordering {
            a.0.cmp(&b.0)
        }
        let mut array = SortedArray::new(by_key);
        array.add((1, 'a'));
        array.add((0, 'x'));
        array.add((1, 'b'));
        assert_eq!(items(&array), [(0, 'x'), (1, 'a'), (1, 'b')]);
        assert_eq!(array.find_by(|item| item.0.cmp(&1)), Some(&(1, 'b')));
    }

    #[test]
    fn test_growth_doubles_capacity() {
        let mut array = SortedArray::with_capacity(2, by_value);
        array.add(3);
        array.add(1);
        let before = array.capacity();
        array.add(2);
        assert!(array.capacity() >= before * 2);
        assert_eq!(items(&array), [1, 2, 3]);
    }

    #[test]
    fn test_find_by() {
        let mut array = SortedArray::new(by_value);
        for value in (0..100).rev().map(|v| v * 10) {
            array.add(value);
        }
        assert_eq!(array.find_by(|item| item.cmp(&420)), Some(&420));
        assert_eq!(array.find_by(|item| item.cmp(&0)), Some(&0));
        assert_eq!(array.find_by(|item| item.cmp(&990)), Some(&990));
        assert_eq!(array.find_by(|item| item.cmp(&421)), None);
    }

    #[test]
    fn test_find_in_empty_array() {
        let array = SortedArray::new(by_value);
        assert!(array.is_empty());
        assert_eq!(array.find_by(|item| item.cmp(&1)), None);
    }
}
