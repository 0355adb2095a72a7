//! KLV writer, symmetric to [`crate::KlvReader`].
//!
//! Used by round-trip tests and to fabricate header partitions in
//! integration tests. Host-order primitives follow the writer's byte
//! order; wire structures are always emitted big-endian. BER lengths
//! use the shortest of the 1, 2, 3, 5 and 9 byte encodings.

use crate::{Auid, ByteOrder, Ul, Umid};
use uuid::Uuid;

/// Byte-order-aware KLV writer over a growable buffer.
#[must_use]
pub struct KlvWriter {
    buf: Vec<u8>,
    byte_order: ByteOrder,
}

impl KlvWriter {
    /// Creates a writer with an explicit byte order.
    pub fn new(byte_order: ByteOrder) -> Self {
        KlvWriter {
            buf: Vec::new(),
            byte_order,
        }
    }

    /// Creates a big-endian (network order) writer.
    pub fn big_endian() -> Self {
        Self::new(ByteOrder::BigEndian)
    }

    /// The writer's byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Number of bytes written.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// True if nothing has been written.
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Consumes the writer, returning the buffer.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Appends raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// One octet.
    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    /// One signed octet.
    pub fn write_i8(&mut self, value: i8) {
        self.write_u8(value as u8);
    }

    /// Two octets in the current byte order.
    pub fn write_u16(&mut self, value: u16) {
        match self.byte_order {
            ByteOrder::BigEndian => self.write_bytes(&value.to_be_bytes()),
            ByteOrder::LittleEndian => self.write_bytes(&value.to_le_bytes()),
        }
    }

    /// Two signed octets in the current byte order.
    pub fn write_i16(&mut self, value: i16) {
        self.write_u16(value as u16);
    }

    /// Four octets in the current byte order.
    pub fn write_u32(&mut self, value: u32) {
        match self.byte_order {
            ByteOrder::BigEndian => self.write_bytes(&value.to_be_bytes()),
            ByteOrder::LittleEndian => self.write_bytes(&value.to_le_bytes()),
        }
    }

    /// Four signed octets in the current byte order.
    pub fn write_i32(&mut self, value: i32) {
        self.write_u32(value as u32);
    }

    /// Eight octets in the current byte order.
    pub fn write_u64(&mut self, value: u64) {
        match self.byte_order {
            ByteOrder::BigEndian => self.write_bytes(&value.to_be_bytes()),
            ByteOrder::LittleEndian => self.write_bytes(&value.to_le_bytes()),
        }
    }

    /// Eight signed octets in the current byte order.
    pub fn write_i64(&mut self, value: i64) {
        self.write_u64(value as u64);
    }

    /// Shortest-form BER length.
    pub fn write_ber_length(&mut self, value: u64) {
        if value < 128 {
            self.write_u8(value as u8);
        } else if value <= 0xFF {
            self.write_u8(0x80 | 1);
            self.write_u8(value as u8);
        } else if value <= 0xFFFF {
            self.write_u8(0x80 | 2);
            self.write_bytes(&(value as u16).to_be_bytes());
        } else if value <= 0xFFFF_FFFF {
            self.write_u8(0x80 | 4);
            self.write_bytes(&(value as u32).to_be_bytes());
        } else {
            self.write_u8(0x80 | 8);
            self.write_bytes(&value.to_be_bytes());
        }
    }

    /// 16 raw octets of a UL.
    pub fn write_ul(&mut self, ul: &Ul) {
        self.write_bytes(ul.as_bytes());
    }

    /// 16 raw octets of an AUID.
    pub fn write_auid(&mut self, auid: &Auid) {
        self.write_bytes(auid.as_bytes());
    }

    /// A UUID in wire order: canonical bytes, swapped on little-endian
    /// streams.
    pub fn write_uuid(&mut self, uuid: &Uuid) {
        let mut bytes = *uuid.as_bytes();
        if self.byte_order == ByteOrder::LittleEndian {
            crate::reader::uuid_wire_to_canonical(&mut bytes);
        }
        self.write_bytes(&bytes);
    }

    /// 32 raw octets of a UMID.
    pub fn write_umid(&mut self, umid: &Umid) {
        self.write_bytes(umid.as_bytes());
    }

    /// A full triplet: key, shortest BER length, value.
    pub fn write_triplet(&mut self, key: &Auid, value: &[u8]) {
        self.write_auid(key);
        self.write_ber_length(value.len() as u64);
        self.write_bytes(value);
    }

    /// Batch header: item count and item length.
    pub fn write_batch_header(&mut self, count: u32, item_len: u32) {
        self.write_u32(count);
        self.write_u32(item_len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::KlvReader;

    #[test]
    fn ber_shortest_forms() {
        let cases: &[(u64, usize)] = &[
            (0, 1),
            (127, 1),
            (128, 2),
            (255, 2),
            (256, 3),
            (0xFFFF, 3),
            (0x1_0000, 5),
            (0xFFFF_FFFF, 5),
            (0x1_0000_0000, 9),
            (u64::MAX, 9),
        ];

        for &(value, expected_len) in cases {
            let mut w = KlvWriter::big_endian();
            w.write_ber_length(value);
            assert_eq!(w.len(), expected_len, "encoding length of {value}");

            let mut r = KlvReader::big_endian(w.as_bytes());
            assert_eq!(r.read_ber_length().unwrap(), value);
        }
    }

    #[test]
    fn triplet_round_trip() {
        let key: Auid = "urn:smpte:ul:060e2b34.01010101.01011502.00000000"
            .parse()
            .unwrap();

        let mut w = KlvWriter::big_endian();
        w.write_triplet(&key, &[1, 2, 3, 4, 5]);

        let mut r = KlvReader::big_endian(w.as_bytes());
        let t = r.read_triplet().unwrap();
        assert_eq!(t.key(), &key);
        assert_eq!(t.value(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn little_endian_uuid_round_trip() {
        let uuid = Uuid::from_bytes(*b"\x01\x02\x03\x04\x05\x06\x07\x08abcdefgh");

        let mut w = KlvWriter::new(ByteOrder::LittleEndian);
        w.write_uuid(&uuid);

        let mut r = KlvReader::new(w.as_bytes(), ByteOrder::LittleEndian);
        assert_eq!(r.read_uuid().unwrap(), uuid);
    }
}
