//! Primer pack: the local tag register of an MXF partition.

use crate::Result;
use regxml_klv::{Auid, KlvReader, LocalTagResolver, MemoryTriplet, Ul};
use std::collections::HashMap;

/// Primer pack key.
pub const KEY: Ul = Ul::new([
    0x06, 0x0e, 0x2b, 0x34, 0x02, 0x05, 0x01, 0x01, //
    0x0d, 0x01, 0x02, 0x01, 0x01, 0x05, 0x01, 0x00,
]);

/// Mapping from 16-bit local tags to full identifications, decoded
/// from a single primer pack triplet.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct PrimerPack {
    tags: HashMap<u16, Auid>,
}

impl PrimerPack {
    /// True if the key identifies a primer pack, ignoring the version
    /// octet.
    pub fn is_primer_pack(key: &Auid) -> bool {
        key.as_ul()
            .is_some_and(|ul| KEY.equals_with_mask(&ul, Ul::IGNORE_VERSION))
    }

    /// Decodes a primer pack from its triplet: an item count, an item
    /// length, then `(tag, identification)` pairs.
    pub fn from_triplet(triplet: &MemoryTriplet) -> Result<Self> {
        let mut reader = KlvReader::big_endian(triplet.value());

        let item_count = reader.read_u32()?;
        let _item_length = reader.read_u32()?;

        let mut tags = HashMap::with_capacity(item_count.min(4096) as usize);
        for _ in 0..item_count {
            let tag = reader.read_u16()?;
            let id = reader.read_auid()?;
            tags.insert(tag, id);
        }

        Ok(PrimerPack { tags })
    }

    /// Registers one mapping. Used by tests and by writers.
    pub fn insert(&mut self, tag: u16, id: Auid) {
        self.tags.insert(tag, id);
    }

    /// Number of registered tags.
    pub fn len(&self) -> usize {
        self.tags.len()
    }

    /// True if no tags are registered.
    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

impl LocalTagResolver for PrimerPack {
    fn resolve(&self, tag: u64) -> Option<&Auid> {
        let tag = u16::try_from(tag).ok()?;
        self.tags.get(&tag)
    }
}
