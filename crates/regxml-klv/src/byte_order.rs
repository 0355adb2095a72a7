//! Byte order (endianness) handling for KLV value parsing.
//!
//! KLV wire structures (keys, BER lengths, identifiers) are always
//! big-endian. Multi-byte primitives inside values follow the byte
//! order of the enclosing stream, which an MXF `ByteOrder` property or
//! an Indirect value marker may switch to little-endian.

/// Byte order for multi-byte values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub enum ByteOrder {
    /// Little-endian - least significant byte first.
    LittleEndian,
    /// Big-endian (network order) - most significant byte first.
    BigEndian,
}

impl ByteOrder {
    /// Read u16 from bytes with this byte order.
    #[inline]
    pub fn read_u16(self, bytes: [u8; 2]) -> u16 {
        match self {
            ByteOrder::LittleEndian => u16::from_le_bytes(bytes),
            ByteOrder::BigEndian => u16::from_be_bytes(bytes),
        }
    }

    /// Read u32 from bytes with this byte order.
    #[inline]
    pub fn read_u32(self, bytes: [u8; 4]) -> u32 {
        match self {
            ByteOrder::LittleEndian => u32::from_le_bytes(bytes),
            ByteOrder::BigEndian => u32::from_be_bytes(bytes),
        }
    }

    /// Read u64 from bytes with this byte order.
    #[inline]
    pub fn read_u64(self, bytes: [u8; 8]) -> u64 {
        match self {
            ByteOrder::LittleEndian => u64::from_le_bytes(bytes),
            ByteOrder::BigEndian => u64::from_be_bytes(bytes),
        }
    }

    /// Read i16 from bytes with this byte order.
    #[inline]
    pub fn read_i16(self, bytes: [u8; 2]) -> i16 {
        match self {
            ByteOrder::LittleEndian => i16::from_le_bytes(bytes),
            ByteOrder::BigEndian => i16::from_be_bytes(bytes),
        }
    }

    /// Read i32 from bytes with this byte order.
    #[inline]
    pub fn read_i32(self, bytes: [u8; 4]) -> i32 {
        match self {
            ByteOrder::LittleEndian => i32::from_le_bytes(bytes),
            ByteOrder::BigEndian => i32::from_be_bytes(bytes),
        }
    }

    /// Read i64 from bytes with this byte order.
    #[inline]
    pub fn read_i64(self, bytes: [u8; 8]) -> i64 {
        match self {
            ByteOrder::LittleEndian => i64::from_le_bytes(bytes),
            ByteOrder::BigEndian => i64::from_be_bytes(bytes),
        }
    }

    /// Read f32 from bytes with this byte order.
    #[inline]
    pub fn read_f32(self, bytes: [u8; 4]) -> f32 {
        f32::from_bits(self.read_u32(bytes))
    }

    /// Read f64 from bytes with this byte order.
    #[inline]
    pub fn read_f64(self, bytes: [u8; 8]) -> f64 {
        f64::from_bits(self.read_u64(bytes))
    }
}

impl std::fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ByteOrder::LittleEndian => write!(f, "little-endian"),
            ByteOrder::BigEndian => write!(f, "big-endian"),
        }
    }
}
