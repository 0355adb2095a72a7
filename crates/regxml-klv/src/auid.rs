//! AUID: the ST 377-1 sum of a UL and a UUID.
//!
//! An AUID occupies 16 bytes. When the high bit of the first byte is
//! clear the value is a UL; otherwise it is a UUID whose two 8-byte
//! halves are swapped relative to the RFC 4122 byte order. The half
//! swap is implemented here, once; the little-endian wire swap applied
//! by readers is a distinct transform and lives in [`crate::reader`].

use crate::{Error, Result, Ul};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Swaps the two 8-byte halves of an AUID/UUID buffer in place.
pub(crate) fn swap_halves(bytes: &mut [u8; 16]) {
    for i in 0..8 {
        bytes.swap(i, i + 8);
    }
}

/// 16-byte AUID as specified in SMPTE ST 377-1.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct Auid([u8; 16]);

impl Auid {
    /// Wraps a 16-byte value.
    pub const fn new(value: [u8; 16]) -> Self {
        Auid(value)
    }

    /// Raw octets.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// True if the AUID holds a UL.
    pub fn is_ul(&self) -> bool {
        (self.0[0] & 0x80) == 0
    }

    /// True if the AUID holds a UUID.
    pub fn is_uuid(&self) -> bool {
        !self.is_ul()
    }

    /// The UL underlying the AUID, if it is one.
    pub fn as_ul(&self) -> Option<Ul> {
        self.is_ul().then(|| Ul::new(self.0))
    }

    /// The UUID underlying the AUID, if it is one.
    pub fn as_uuid(&self) -> Option<Uuid> {
        self.is_uuid().then(|| {
            let mut bytes = self.0;
            swap_halves(&mut bytes);
            Uuid::from_bytes(bytes)
        })
    }

    /// Copy with UL normalization applied; UUID-form AUIDs are
    /// returned unchanged.
    pub fn normalized(&self) -> Auid {
        match self.as_ul() {
            Some(ul) => Auid::from(ul.normalized()),
            None => *self,
        }
    }

    /// Equality after normalization of both sides.
    pub fn normalized_eq(&self, other: &Auid) -> bool {
        self.normalized() == other.normalized()
    }
}

impl Default for Auid {
    /// The all-zero AUID.
    fn default() -> Self {
        Auid([0u8; 16])
    }
}

impl From<Ul> for Auid {
    fn from(ul: Ul) -> Self {
        Auid(*ul.as_bytes())
    }
}

impl From<Uuid> for Auid {
    fn from(uuid: Uuid) -> Self {
        let mut bytes = *uuid.as_bytes();
        swap_halves(&mut bytes);
        Auid(bytes)
    }
}

impl fmt::Display for Auid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_ul() {
            Some(ul) => write!(f, "{ul}"),
            None => write!(f, "{}", self.as_uuid().expect("AUID is a UUID").urn()),
        }
    }
}

impl fmt::Debug for Auid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Auid({self})")
    }
}

impl FromStr for Auid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if let Ok(ul) = s.parse::<Ul>() {
            return Ok(Auid::from(ul));
        }
        if let Ok(uuid) = Uuid::try_parse(s) {
            return Ok(Auid::from(uuid));
        }
        Err(Error::InvalidUrn {
            kind: "AUID",
            text: s.to_string(),
        })
    }
}

/// Identifier as authored: an AUID whose on-wire layout follows the
/// byte order of the enclosing stream. The reader undoes the
/// little-endian wire swap before construction, so the wrapped bytes
/// always resolve to the same AUID as the big-endian wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use]
pub struct Idau([u8; 16]);

impl Idau {
    /// Wraps 16 bytes already in big-endian wire order.
    pub const fn new(value: [u8; 16]) -> Self {
        Idau(value)
    }

    /// The AUID the identifier resolves to.
    pub fn as_auid(&self) -> Auid {
        Auid::new(self.0)
    }
}
