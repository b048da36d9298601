use std::collections::BTreeMap;
use std::collections::btree_map;

/// Sparse set of chunk replacements that have not been written to disk yet.
///
/// Entries are keyed by chunk index, not by byte offset, and may have any
/// length. Iteration is always in ascending index order.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Overlay {
    chunks: BTreeMap<u64, Vec<u8>>,
}

impl Overlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `index`, returning the previous one.
    pub fn insert(&mut self, index: u64, data: Vec<u8>) -> Option<Vec<u8>> {
        self.chunks.insert(index, data)
    }

    pub fn remove(&mut self, index: u64) -> Option<Vec<u8>> {
        self.chunks.remove(&index)
    }

    #[must_use]
    pub fn get(&self, index: u64) -> Option<&[u8]> {
        self.chunks.get(&index).map(Vec::as_slice)
    }

    #[must_use]
    pub fn contains(&self, index: u64) -> bool {
        self.chunks.contains_key(&index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Iterates over `(index, data)` pairs in ascending index order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            inner: self.chunks.iter(),
        }
    }

    /// Entries at or above `start`, in ascending index order.
    pub(crate) fn range_from(&self, start: u64) -> btree_map::Range<'_, u64, Vec<u8>> {
        self.chunks.range(start..)
    }
}

/// Iterator over overlay entries, created by [`Overlay::iter()`].
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    inner: btree_map::Iter<'a, u64, Vec<u8>>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (u64, &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|(&i, d)| (i, d.as_slice()))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<'a> IntoIterator for &'a Overlay {
    type Item = (u64, &'a [u8]);
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iterates_in_ascending_order() {
        let mut overlay = Overlay::new();
        overlay.insert(7, vec![7]);
        overlay.insert(0, vec![0]);
        overlay.insert(3, vec![3, 3]);

        let indices: Vec<u64> = overlay.iter().map(|(i, _)| i).collect();
        assert_eq!(indices, [0u64, 3, 7]);
    }

    #[test]
    fn insert_replaces_existing_entry() {
        let mut overlay = Overlay::new();
        assert_eq!(overlay.insert(1, vec![1, 2, 3]), None);
        assert_eq!(overlay.insert(1, vec![9]), Some(vec![1, 2, 3]));
        assert_eq!(overlay.get(1), Some(&[9u8][..]));
        assert_eq!(overlay.len(), 1);
    }

    #[test]
    fn range_from_skips_lower_indices() {
        let mut overlay = Overlay::new();
        for i in [1, 4, 5, 9] {
            overlay.insert(i, Vec::new());
        }

        let tail: Vec<u64> = overlay.range_from(5).map(|(&i, _)| i).collect();
        assert_eq!(tail, [5u64, 9]);
    }
}
