//! KLV local sets (ST 336).
//!
//! A local set is a group whose items are keyed by short local tags
//! rather than full 16-byte keys. The key's registry designator octet
//! selects the tag and length field encodings; a tag register (in MXF,
//! the Primer Pack) maps each local tag back to a full identification.

use crate::{Auid, ByteOrder, Error, Group, KlvReader, MemoryTriplet, Result, Ul};

/// Resolves local tags to full identifications.
pub trait LocalTagResolver {
    /// The identification registered for `tag`, if any.
    fn resolve(&self, tag: u64) -> Option<&Auid>;
}

/// A decoded local set.
#[derive(Debug, Clone)]
#[must_use]
pub struct LocalSet {
    key: Auid,
    items: Vec<MemoryTriplet>,
}

impl LocalSet {
    /// True if the triplet can be decoded as a local set.
    pub fn is_local_set(triplet: &MemoryTriplet) -> bool {
        triplet
            .key()
            .as_ul()
            .is_some_and(|ul| ul.is_local_set())
    }

    /// Decodes the items of `triplet` using the tag register.
    ///
    /// Bits 3-4 of the key's registry designator select the local tag
    /// width (1 byte, BER, 2 bytes, 4 bytes) and bits 5-6 the local
    /// length width (BER, 1, 2, 4 bytes).
    pub fn from_triplet(
        triplet: &MemoryTriplet,
        register: &dyn LocalTagResolver,
    ) -> Result<Self> {
        let ul = triplet
            .key()
            .as_ul()
            .ok_or_else(|| Error::KeyNotAUl(triplet.key().to_string()))?;

        if !ul.is_local_set() {
            return Err(Error::NotALocalSet(triplet.key().to_string()));
        }

        let designator = ul.registry_designator();
        let mut reader = KlvReader::new(triplet.value(), ByteOrder::BigEndian);
        let mut items = Vec::new();

        while reader.position() < triplet.len() {
            let tag = match (designator >> 3) & 3 {
                0 => u64::from(reader.read_u8()?),
                1 => reader.read_ber_length()?,
                2 => u64::from(reader.read_u16()?),
                _ => u64::from(reader.read_u32()?),
            };

            let length = match (designator >> 5) & 3 {
                0 => reader.read_ber_length()?,
                1 => u64::from(reader.read_u8()?),
                2 => u64::from(reader.read_u16()?),
                _ => u64::from(reader.read_u32()?),
            };

            let key = *register
                .resolve(tag)
                .ok_or(Error::UnknownLocalTag(tag))?;

            let length = usize::try_from(length).map_err(|_| Error::BerOverflow)?;
            let value = reader.read_bytes(length)?.to_vec();

            items.push(MemoryTriplet::new(key, value));
        }

        Ok(LocalSet {
            key: *triplet.key(),
            items,
        })
    }

    /// The local set key as a UL.
    pub fn key_ul(&self) -> Ul {
        self.key.as_ul().expect("local set key is a UL")
    }
}

impl Group for LocalSet {
    fn key(&self) -> &Auid {
        &self.key
    }

    fn items(&self) -> &[MemoryTriplet] {
        &self.items
    }
}
