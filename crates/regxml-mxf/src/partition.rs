//! Partition packs (ST 377-1).
//!
//! A partition pack opens every MXF partition and describes its
//! layout. The pack's kind lives in octet 13 of the key and its
//! status in octet 14; octets 13 through 15 are therefore the
//! variable portion of the key.

use crate::{Error, Result};
use regxml_klv::{Auid, KlvReader, MemoryTriplet, Ul};

/// Partition pack key, with the variable octets at their header
/// closed-complete values.
pub const KEY: Ul = Ul::new([
    0x06, 0x0e, 0x2b, 0x34, 0x02, 0x05, 0x01, 0x01, //
    0x0d, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00,
]);

/// Byte mask comparing every key octet except 13, 14 and 15.
pub const KEY_MASK: u16 = 0xFFF8;

/// Which partition of the file the pack opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    Header,
    Body,
    Footer,
}

/// Completeness of the partition's metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    OpenIncomplete,
    ClosedIncomplete,
    OpenComplete,
    ClosedComplete,
}

impl PartitionStatus {
    /// True for the two closed states.
    pub fn is_closed(self) -> bool {
        matches!(
            self,
            PartitionStatus::ClosedIncomplete | PartitionStatus::ClosedComplete
        )
    }
}

/// Decoded partition pack.
#[derive(Debug, Clone)]
#[must_use]
pub struct PartitionPack {
    pub kind: PartitionKind,
    pub status: PartitionStatus,
    pub major_version: u16,
    pub minor_version: u16,
    pub kag_size: u32,
    pub this_partition: u64,
    pub previous_partition: u64,
    pub footer_partition: u64,
    pub header_byte_count: u64,
    pub index_byte_count: u64,
    pub index_sid: u32,
    pub body_offset: u64,
    pub body_sid: u32,
    pub operational_pattern: Auid,
    pub essence_containers: Vec<Ul>,
}

impl PartitionPack {
    /// True if the key identifies a partition pack.
    pub fn is_partition_pack(key: &Auid) -> bool {
        key.as_ul()
            .is_some_and(|ul| KEY.equals_with_mask(&ul, KEY_MASK))
    }

    /// Decodes a partition pack from its triplet.
    pub fn from_triplet(triplet: &MemoryTriplet) -> Result<Self> {
        let ul = triplet.key().as_ul().ok_or_else(|| {
            Error::IllegalPartitionPack(format!("key {} is not a UL", triplet.key()))
        })?;

        let status = match ul.octet(14) {
            0x01 => PartitionStatus::OpenIncomplete,
            0x02 => PartitionStatus::ClosedIncomplete,
            0x03 => PartitionStatus::OpenComplete,
            0x04 => PartitionStatus::ClosedComplete,
            other => {
                return Err(Error::IllegalPartitionPack(format!(
                    "unknown status octet 0x{other:02x}"
                )))
            }
        };

        let kind = match ul.octet(13) {
            0x02 => PartitionKind::Header,
            0x03 => PartitionKind::Body,
            0x04 => PartitionKind::Footer,
            other => {
                return Err(Error::IllegalPartitionPack(format!(
                    "unknown kind octet 0x{other:02x}"
                )))
            }
        };

        if kind == PartitionKind::Footer && !status.is_closed() {
            return Err(Error::OpenFooterPartition);
        }

        let mut reader = KlvReader::big_endian(triplet.value());

        Ok(PartitionPack {
            kind,
            status,
            major_version: reader.read_u16()?,
            minor_version: reader.read_u16()?,
            kag_size: reader.read_u32()?,
            this_partition: reader.read_u64()?,
            previous_partition: reader.read_u64()?,
            footer_partition: reader.read_u64()?,
            header_byte_count: reader.read_u64()?,
            index_byte_count: reader.read_u64()?,
            index_sid: reader.read_u32()?,
            body_offset: reader.read_u64()?,
            body_sid: reader.read_u32()?,
            operational_pattern: reader.read_auid()?,
            essence_containers: reader.read_batch()?,
        })
    }
}
