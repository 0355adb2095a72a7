//! Byte-order-aware KLV reader.
//!
//! The reader walks a byte slice and keeps its position, so callers
//! can count consumed bytes against a partition's header byte count.
//! Multi-byte integer primitives follow the reader's byte order; wire
//! structures (keys, BER lengths, identifiers, UMIDs) are always read
//! big-endian, with UUIDs and as-authored identifiers undergoing the
//! documented little-endian swap.

use crate::{Auid, ByteOrder, Error, Idau, MemoryTriplet, Result, Ul, Umid};
use uuid::Uuid;

/// Undoes the little-endian wire layout of a UUID in place: the
/// 32-bit word and the two following 16-bit words are byte-swapped,
/// the trailing 8 bytes are left alone.
pub fn uuid_wire_to_canonical(bytes: &mut [u8; 16]) {
    bytes.swap(0, 3);
    bytes.swap(1, 2);
    bytes.swap(4, 5);
    bytes.swap(6, 7);
}

/// An item type decodable from a KLV batch.
pub trait BatchItem: Sized {
    /// Decodes one item from exactly one batch slot.
    fn from_item_bytes(bytes: &[u8]) -> Result<Self>;
}

impl BatchItem for Ul {
    fn from_item_bytes(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; 16] = bytes
            .get(..16)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::BatchItemTooShort {
                need: 16,
                have: bytes.len(),
            })?;
        Ok(Ul::new(raw))
    }
}

/// Position-tracking KLV reader over a byte slice.
#[must_use]
pub struct KlvReader<'a> {
    data: &'a [u8],
    pos: usize,
    byte_order: ByteOrder,
}

impl<'a> KlvReader<'a> {
    /// Creates a reader with an explicit byte order.
    pub fn new(data: &'a [u8], byte_order: ByteOrder) -> Self {
        KlvReader {
            data,
            pos: 0,
            byte_order,
        }
    }

    /// Creates a big-endian (network order) reader.
    pub fn big_endian(data: &'a [u8]) -> Self {
        Self::new(data, ByteOrder::BigEndian)
    }

    /// The reader's byte order.
    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    /// Switches the byte order for subsequent host-order reads.
    pub fn set_byte_order(&mut self, byte_order: ByteOrder) {
        self.byte_order = byte_order;
    }

    /// Number of bytes consumed so far.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Number of bytes left.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Reads exactly `len` bytes.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(Error::UnexpectedEof {
                need: len,
                have: self.remaining(),
            });
        }
        let bytes = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    /// Drains all remaining bytes.
    pub fn read_to_end(&mut self) -> &'a [u8] {
        let bytes = &self.data[self.pos..];
        self.pos = self.data.len();
        bytes
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let bytes = self.read_bytes(N)?;
        Ok(bytes.try_into().expect("slice length checked"))
    }

    /// One octet.
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.read_array::<1>()?[0])
    }

    /// One signed octet.
    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    /// Two octets in the current byte order.
    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(self.byte_order.read_u16(self.read_array()?))
    }

    /// Two signed octets in the current byte order.
    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(self.byte_order.read_i16(self.read_array()?))
    }

    /// Four octets in the current byte order.
    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(self.byte_order.read_u32(self.read_array()?))
    }

    /// Four signed octets in the current byte order.
    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(self.byte_order.read_i32(self.read_array()?))
    }

    /// Eight octets in the current byte order.
    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(self.byte_order.read_u64(self.read_array()?))
    }

    /// Eight signed octets in the current byte order.
    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(self.byte_order.read_i64(self.read_array()?))
    }

    /// IEEE 754 single in the current byte order.
    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(self.byte_order.read_f32(self.read_array()?))
    }

    /// IEEE 754 double in the current byte order.
    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(self.byte_order.read_f64(self.read_array()?))
    }

    /// BER length (ST 336): one octet short form below 0x80, otherwise
    /// the low nibble counts the big-endian octets that follow.
    pub fn read_ber_length(&mut self) -> Result<u64> {
        let first = self.read_u8()?;

        if first & 0x80 == 0 {
            return Ok(u64::from(first));
        }

        let count = first & 0x0F;
        if count > 8 {
            return Err(Error::BerTooLong(count));
        }

        let mut value = 0u64;
        for byte in self.read_bytes(usize::from(count))? {
            value = (value << 8) | u64::from(*byte);
        }
        Ok(value)
    }

    /// 16 raw octets as a UL.
    pub fn read_ul(&mut self) -> Result<Ul> {
        Ok(Ul::new(self.read_array()?))
    }

    /// 16 raw octets as an AUID.
    pub fn read_auid(&mut self) -> Result<Auid> {
        Ok(Auid::new(self.read_array()?))
    }

    /// 16 octets as a UUID, undoing the wire swap on little-endian
    /// streams.
    pub fn read_uuid(&mut self) -> Result<Uuid> {
        let mut bytes = self.read_array()?;
        if self.byte_order == ByteOrder::LittleEndian {
            uuid_wire_to_canonical(&mut bytes);
        }
        Ok(Uuid::from_bytes(bytes))
    }

    /// 32 raw octets as a UMID.
    pub fn read_umid(&mut self) -> Result<Umid> {
        Ok(Umid::new(self.read_array()?))
    }

    /// 16 octets as an as-authored identifier, undoing the wire swap
    /// on little-endian streams.
    pub fn read_idau(&mut self) -> Result<Idau> {
        let mut bytes = self.read_array()?;
        if self.byte_order == ByteOrder::LittleEndian {
            uuid_wire_to_canonical(&mut bytes);
        }
        Ok(Idau::new(bytes))
    }

    /// One full triplet: AUID key, BER length, value bytes.
    pub fn read_triplet(&mut self) -> Result<MemoryTriplet> {
        let key = self.read_auid()?;
        let length = self.read_ber_length()?;
        let length = usize::try_from(length).map_err(|_| Error::BerOverflow)?;
        let value = self.read_bytes(length)?.to_vec();
        Ok(MemoryTriplet::new(key, value))
    }

    /// A batch: item count, item length, then that many fixed-size
    /// items.
    pub fn read_batch<T: BatchItem>(&mut self) -> Result<Vec<T>> {
        let count = self.read_u32()?;
        let item_len = usize::try_from(self.read_u32()?).map_err(|_| Error::BerOverflow)?;

        let mut items = Vec::with_capacity(count.min(4096) as usize);
        for _ in 0..count {
            let bytes = self.read_bytes(item_len)?;
            items.push(T::from_item_bytes(bytes)?);
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ber_short_form() {
        let mut r = KlvReader::big_endian(&[0x7F]);
        assert_eq!(r.read_ber_length().unwrap(), 0x7F);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn ber_long_form() {
        let mut r = KlvReader::big_endian(&[0x83, 0x01, 0x02, 0x03]);
        assert_eq!(r.read_ber_length().unwrap(), 0x010203);
    }

    #[test]
    fn ber_rejects_more_than_eight_octets() {
        let mut r = KlvReader::big_endian(&[0x89, 0, 0, 0, 0, 0, 0, 0, 0, 1]);
        assert!(matches!(r.read_ber_length(), Err(Error::BerTooLong(9))));
    }

    #[test]
    fn ber_eight_octets_reaches_u64_max() {
        let mut r =
            KlvReader::big_endian(&[0x88, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(r.read_ber_length().unwrap(), u64::MAX);
    }

    #[test]
    fn ber_short_read_fails() {
        let mut r = KlvReader::big_endian(&[0x84, 0x01]);
        assert!(matches!(
            r.read_ber_length(),
            Err(Error::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn host_order_primitives() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

        let mut be = KlvReader::big_endian(&data);
        assert_eq!(be.read_u64().unwrap(), 0x0102030405060708);

        let mut le = KlvReader::new(&data, ByteOrder::LittleEndian);
        assert_eq!(le.read_u64().unwrap(), 0x0807060504030201);
    }

    #[test]
    fn uuid_wire_swap() {
        let canonical = [
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, //
            0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10,
        ];
        let wire_le = [
            0x04, 0x03, 0x02, 0x01, 0x06, 0x05, 0x08, 0x07, //
            0x09, 0x0A, 0x0B, 0x0C, 0x0D, 0x0E, 0x0F, 0x10,
        ];

        let mut be = KlvReader::big_endian(&canonical);
        let mut le = KlvReader::new(&wire_le, ByteOrder::LittleEndian);
        assert_eq!(be.read_uuid().unwrap(), le.read_uuid().unwrap());

        let mut buf = wire_le;
        uuid_wire_to_canonical(&mut buf);
        assert_eq!(buf, canonical);
    }

    #[test]
    fn idau_matches_big_endian_wire_form() {
        let be_wire: [u8; 16] = *b"\x80\x01\x02\x03\x04\x05\x06\x07\x08\x09\x0a\x0b\x0c\x0d\x0e\x0f";
        let mut le_wire = be_wire;
        uuid_wire_to_canonical(&mut le_wire);

        let mut be = KlvReader::big_endian(&be_wire);
        let mut le = KlvReader::new(&le_wire, ByteOrder::LittleEndian);
        assert_eq!(
            be.read_idau().unwrap().as_auid(),
            le.read_idau().unwrap().as_auid()
        );
    }

    #[test]
    fn triplet_read() {
        let mut data = Vec::new();
        data.extend_from_slice(b"\x06\x0e\x2b\x34\x01\x01\x01\x01\x01\x01\x15\x02\x00\x00\x00\x00");
        data.push(0x03);
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC]);

        let mut r = KlvReader::big_endian(&data);
        let t = r.read_triplet().unwrap();
        assert_eq!(t.len(), 3);
        assert_eq!(t.value(), &[0xAA, 0xBB, 0xCC]);
        assert_eq!(r.remaining(), 0);
    }

    #[test]
    fn triplet_with_overlong_value_fails() {
        let mut data = Vec::new();
        data.extend_from_slice(&[0u8; 16]);
        data.push(0x10); // length 16, but only 2 bytes follow
        data.extend_from_slice(&[0xAA, 0xBB]);

        let mut r = KlvReader::big_endian(&data);
        assert!(matches!(
            r.read_triplet(),
            Err(Error::UnexpectedEof { need: 16, have: 2 })
        ));
    }

    #[test]
    fn batch_of_uls() {
        let ul: Ul = "urn:smpte:ul:060e2b34.04010101.0d010301.027f0100"
            .parse()
            .unwrap();

        let mut data = Vec::new();
        data.extend_from_slice(&2u32.to_be_bytes());
        data.extend_from_slice(&16u32.to_be_bytes());
        data.extend_from_slice(ul.as_bytes());
        data.extend_from_slice(ul.as_bytes());

        let mut r = KlvReader::big_endian(&data);
        let batch: Vec<Ul> = r.read_batch().unwrap();
        assert_eq!(batch, vec![ul, ul]);
    }
}
