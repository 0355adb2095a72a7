//! Header metadata scan.
//!
//! Walks a partition byte stream: locates the partition pack, the
//! primer pack, then ingests local sets until the partition's header
//! byte count is exhausted, building a by-instance-ID index of typed
//! sets. Anomalies are reported per position through the event
//! channel; the index keeps everything ingested before a failure.

use crate::{
    fill, Event, EventCode, EventHandler, PartitionPack, PrimerPack, Result, Set,
};
use regxml_klv::{KlvReader, LocalSet, Ul};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Index table segment key.
pub const INDEX_TABLE_SEGMENT_UL: Ul = Ul::new([
    0x06, 0x0e, 0x2b, 0x34, 0x02, 0x53, 0x01, 0x01, //
    0x0d, 0x01, 0x02, 0x01, 0x01, 0x10, 0x01, 0x00,
]);

/// By-instance-ID index of the sets of one partition. Ordered by
/// instance UUID bytes so iteration is deterministic.
pub type SetIndex = BTreeMap<Uuid, Set>;

/// Scans forward to the next partition pack, discarding everything
/// before it. Returns `None` if the stream ends first.
pub fn find_partition_pack(reader: &mut KlvReader) -> Result<Option<PartitionPack>> {
    loop {
        let triplet = match reader.read_triplet() {
            Ok(t) => t,
            Err(regxml_klv::Error::UnexpectedEof { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if PartitionPack::is_partition_pack(triplet.key()) {
            tracing::debug!(position = reader.position(), "partition pack found");
            return PartitionPack::from_triplet(&triplet).map(Some);
        }
    }
}

/// Scans forward to the primer pack, skipping fill items and anything
/// else. Returns `None` if the stream ends first.
pub fn find_primer_pack(reader: &mut KlvReader) -> Result<Option<PrimerPack>> {
    loop {
        let triplet = match reader.read_triplet() {
            Ok(t) => t,
            Err(regxml_klv::Error::UnexpectedEof { .. }) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if !fill::is_fill_item(triplet.key()) && PrimerPack::is_primer_pack(triplet.key()) {
            tracing::debug!(position = reader.position(), "primer pack found");
            return PrimerPack::from_triplet(&triplet).map(Some);
        }
    }
}

/// Ingests local sets until `header_byte_count` bytes have been
/// consumed past `base` (the position right after the partition pack),
/// indexing them by instance ID.
pub fn read_set_index(
    reader: &mut KlvReader,
    primer: &PrimerPack,
    header_byte_count: u64,
    base: usize,
    handler: &mut dyn EventHandler,
) -> SetIndex {
    let mut index = SetIndex::new();

    loop {
        // Byte counting restarts right after the partition pack.
        let position = (reader.position() - base) as u64;
        if position >= header_byte_count {
            break;
        }

        let triplet = match reader.read_triplet() {
            Ok(t) => t,
            Err(e) => {
                // The stream cannot be resynchronized past a bad
                // triplet; keep what was ingested so far.
                handler.handle(Event::error(
                    EventCode::InvalidTriplet,
                    e.to_string(),
                    format!("position {position}"),
                ));
                break;
            }
        };

        let Some(key_ul) = triplet.key().as_ul() else {
            handler.handle(Event::info(
                EventCode::NonMxfSet,
                format!("group key {} is not a UL", triplet.key()),
                format!("position {position}"),
            ));
            continue;
        };

        if INDEX_TABLE_SEGMENT_UL.equals_with_mask(&key_ul, Ul::IGNORE_VERSION) {
            handler.handle(Event::warn(
                EventCode::IndexTableReachedEarly,
                "index table segment inside header metadata",
                format!("position {position}"),
            ));
            break;
        }

        if fill::is_fill_item(triplet.key()) {
            continue;
        }

        if !key_ul.is_local_set() {
            handler.handle(Event::info(
                EventCode::NonMxfSet,
                format!("group {} is not a local set", triplet.key()),
                format!("position {position}"),
            ));
            continue;
        }

        let local_set = match LocalSet::from_triplet(&triplet, primer) {
            Ok(ls) => ls,
            Err(e) => {
                handler.handle(Event::error(
                    EventCode::InvalidMxfSet,
                    e.to_string(),
                    format!("position {position}"),
                ));
                continue;
            }
        };

        if !Set::has_instance_uid(&local_set) {
            handler.handle(Event::warn(
                EventCode::NonMxfSet,
                format!("group {} has no instance ID item", triplet.key()),
                format!("position {position}"),
            ));
            continue;
        }

        let set = match Set::from_group(&local_set) {
            Ok(s) => s,
            Err(e) => {
                handler.handle(Event::error(
                    EventCode::InvalidMxfSet,
                    e.to_string(),
                    format!("position {position}"),
                ));
                continue;
            }
        };

        if index.contains_key(&set.instance_id()) {
            handler.handle(Event::error(
                EventCode::DuplicateMxfSets,
                format!("duplicate instance ID {}", set.instance_id().urn()),
                format!("position {position}"),
            ));
            continue;
        }

        index.insert(set.instance_id(), set);
    }

    tracing::debug!(sets = index.len(), "header metadata scan complete");

    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{set::INSTANCE_UID_ITEM_UL, EventLog};
    use regxml_klv::{Auid, KlvWriter};

    fn preface_key() -> Auid {
        "urn:smpte:ul:060e2b34.02530101.0d010101.01012f00"
            .parse()
            .unwrap()
    }

    fn instance_uid_tagged(uuid_byte: u8) -> Vec<u8> {
        // Local set body: tag 0x3c0a, length 16, instance UUID.
        let mut w = KlvWriter::big_endian();
        w.write_u16(0x3c0a);
        w.write_u16(16);
        w.write_bytes(&[uuid_byte; 16]);
        w.into_bytes()
    }

    fn primer() -> PrimerPack {
        let mut p = PrimerPack::default();
        p.insert(0x3c0a, Auid::from(INSTANCE_UID_ITEM_UL));
        p
    }

    #[test]
    fn indexes_sets_within_header_byte_count() {
        let mut w = KlvWriter::big_endian();
        w.write_triplet(&preface_key(), &instance_uid_tagged(1));
        w.write_triplet(&preface_key(), &instance_uid_tagged(2));
        let header_byte_count = w.len() as u64;
        // One more set past the boundary; it must not be ingested.
        w.write_triplet(&preface_key(), &instance_uid_tagged(3));
        let data = w.into_bytes();

        let mut reader = KlvReader::big_endian(&data);
        let mut log = EventLog::new();
        let index = read_set_index(&mut reader, &primer(), header_byte_count, 0, &mut log);

        assert_eq!(index.len(), 2);
        assert!(log.events.is_empty());
        assert_eq!(reader.position() as u64, header_byte_count);
    }

    #[test]
    fn one_byte_more_ingests_the_next_set() {
        let mut w = KlvWriter::big_endian();
        w.write_triplet(&preface_key(), &instance_uid_tagged(1));
        let boundary = w.len() as u64;
        w.write_triplet(&preface_key(), &instance_uid_tagged(2));
        let data = w.into_bytes();

        let mut reader = KlvReader::big_endian(&data);
        let index = read_set_index(
            &mut reader,
            &primer(),
            boundary + 1,
            0,
            &mut crate::NullEventHandler,
        );
        assert_eq!(index.len(), 2);

        let mut reader = KlvReader::big_endian(&data);
        let index = read_set_index(
            &mut reader,
            &primer(),
            boundary - 1,
            0,
            &mut crate::NullEventHandler,
        );
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn duplicate_instance_ids_keep_first_and_report() {
        let mut w = KlvWriter::big_endian();
        w.write_triplet(&preface_key(), &instance_uid_tagged(1));
        w.write_triplet(&preface_key(), &instance_uid_tagged(1));
        let data = w.into_bytes();

        let mut reader = KlvReader::big_endian(&data);
        let mut log = EventLog::new();
        let index = read_set_index(&mut reader, &primer(), data.len() as u64, 0, &mut log);

        assert_eq!(index.len(), 1);
        assert_eq!(log.with_code(EventCode::DuplicateMxfSets).count(), 1);
    }

    #[test]
    fn overlong_triplet_reports_invalid_and_keeps_index() {
        let mut w = KlvWriter::big_endian();
        w.write_triplet(&preface_key(), &instance_uid_tagged(1));
        // A triplet whose announced length exceeds the remaining bytes.
        w.write_auid(&preface_key());
        w.write_ber_length(1000);
        w.write_bytes(&[0u8; 4]);
        let data = w.into_bytes();

        let mut reader = KlvReader::big_endian(&data);
        let mut log = EventLog::new();
        let index = read_set_index(&mut reader, &primer(), 10_000, 0, &mut log);

        assert_eq!(index.len(), 1);
        assert_eq!(log.with_code(EventCode::InvalidTriplet).count(), 1);
    }

    #[test]
    fn index_table_segment_stops_the_scan() {
        let mut w = KlvWriter::big_endian();
        w.write_triplet(&Auid::from(INDEX_TABLE_SEGMENT_UL), &[0u8; 4]);
        w.write_triplet(&preface_key(), &instance_uid_tagged(1));
        let data = w.into_bytes();

        let mut reader = KlvReader::big_endian(&data);
        let mut log = EventLog::new();
        let index = read_set_index(&mut reader, &primer(), data.len() as u64, 0, &mut log);

        assert!(index.is_empty());
        assert_eq!(log.with_code(EventCode::IndexTableReachedEarly).count(), 1);
    }

    #[test]
    fn fill_items_are_skipped() {
        let mut w = KlvWriter::big_endian();
        w.write_triplet(&Auid::from(fill::KEY), &[0u8; 32]);
        w.write_triplet(&preface_key(), &instance_uid_tagged(1));
        let data = w.into_bytes();

        let mut reader = KlvReader::big_endian(&data);
        let mut log = EventLog::new();
        let index = read_set_index(&mut reader, &primer(), data.len() as u64, 0, &mut log);

        assert_eq!(index.len(), 1);
        assert!(log.events.is_empty());
    }

    #[test]
    fn finds_partition_and_primer() {
        let mut w = KlvWriter::big_endian();
        // Garbage triplet before the partition pack.
        w.write_triplet(&preface_key(), &[0u8; 2]);

        let pack_value = {
            let mut v = KlvWriter::big_endian();
            v.write_u16(1);
            v.write_u16(3);
            v.write_u32(0);
            for _ in 0..5 {
                v.write_u64(0);
            }
            v.write_u32(0);
            v.write_u64(0);
            v.write_u32(0);
            v.write_bytes(&[0u8; 16]);
            v.write_batch_header(0, 16);
            v.into_bytes()
        };
        let mut key = *crate::partition::KEY.as_bytes();
        key[13] = 0x02;
        key[14] = 0x04;
        w.write_triplet(&Auid::new(key), &pack_value);

        let primer_value = {
            let mut v = KlvWriter::big_endian();
            v.write_batch_header(1, 18);
            v.write_u16(0x3c0a);
            v.write_auid(&Auid::from(INSTANCE_UID_ITEM_UL));
            v.into_bytes()
        };
        w.write_triplet(&Auid::from(crate::primer::KEY), &primer_value);

        let data = w.into_bytes();
        let mut reader = KlvReader::big_endian(&data);

        let pack = find_partition_pack(&mut reader).unwrap().unwrap();
        assert_eq!(pack.major_version, 1);

        let primer = find_primer_pack(&mut reader).unwrap().unwrap();
        assert_eq!(primer.len(), 1);

        // Stream exhausted: no further packs.
        assert!(find_partition_pack(&mut reader).unwrap().is_none());
    }
}
