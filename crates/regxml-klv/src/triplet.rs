//! KLV triplets and groups.

use crate::Auid;

/// A KLV triplet whose value bytes are owned.
///
/// Values are copied on ingest rather than aliased from the source
/// stream, so a triplet outlives the buffer it was decoded from.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct MemoryTriplet {
    key: Auid,
    value: Vec<u8>,
}

impl MemoryTriplet {
    /// Creates a triplet from a key and owned value bytes.
    pub fn new(key: Auid, value: Vec<u8>) -> Self {
        MemoryTriplet { key, value }
    }

    /// The triplet key.
    pub fn key(&self) -> &Auid {
        &self.key
    }

    /// The value bytes.
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Length of the value in bytes.
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// True if the value is empty.
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

/// A KLV group: a triplet whose value decomposes into a sequence of
/// triplets.
pub trait Group {
    /// The group key.
    fn key(&self) -> &Auid;

    /// The item triplets, in wire order.
    fn items(&self) -> &[MemoryTriplet];
}
