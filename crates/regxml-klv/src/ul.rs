//! SMPTE Universal Labels (ST 298 / ST 336).
//!
//! A UL is a 16-byte identifier whose first byte has its high bit
//! clear. Octet 4 is the category designator (0x02 marks a KLV group),
//! octet 5 the registry designator (group coding, including the local
//! tag and length field sizes of a local set), octet 7 the version of
//! the register the label was taken from.

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

const URN_PREFIX: &str = "urn:smpte:ul:";

/// 16-byte SMPTE Universal Label.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct Ul([u8; 16]);

impl Ul {
    /// Octet index of the category designator.
    pub const CATEGORY_DESIGNATOR: usize = 4;
    /// Octet index of the registry designator.
    pub const REGISTRY_DESIGNATOR: usize = 5;
    /// Octet index of the register version.
    pub const VERSION: usize = 7;

    /// Byte mask that compares every octet except the version octet.
    pub const IGNORE_VERSION: u16 = 0xFEFF;
    /// Byte mask that compares every octet except the group coding octet.
    pub const IGNORE_GROUP_CODING: u16 = 0xFBFF;

    /// Wraps a 16-byte value.
    pub const fn new(value: [u8; 16]) -> Self {
        Ul(value)
    }

    /// Raw octets.
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Single octet accessor.
    #[inline]
    pub fn octet(&self, i: usize) -> u8 {
        self.0[i]
    }

    /// Compares two ULs under a 16-bit byte mask: bit `15 - i` of the
    /// mask governs whether octet `i` participates in the comparison.
    pub fn equals_with_mask(&self, other: &Ul, mask: u16) -> bool {
        for i in 0..16 {
            if (mask >> (15 - i)) & 1 == 1 && self.0[i] != other.0[i] {
                return false;
            }
        }
        true
    }

    /// True if the UL is a key for a KLV group (ST 336).
    pub fn is_group(&self) -> bool {
        self.category_designator() == 0x02
    }

    /// True if the UL is a key for a KLV local set (ST 336).
    pub fn is_local_set(&self) -> bool {
        self.is_group() && (self.registry_designator() & 0x07) == 3
    }

    /// Value of the category designator octet.
    pub fn category_designator(&self) -> u8 {
        self.0[Self::CATEGORY_DESIGNATOR]
    }

    /// Value of the registry designator octet.
    pub fn registry_designator(&self) -> u8 {
        self.0[Self::REGISTRY_DESIGNATOR]
    }

    /// Value of the register version octet.
    pub fn version(&self) -> u8 {
        self.0[Self::VERSION]
    }

    /// Copy with the version octet zeroed and, for group keys, the
    /// registry designator forced to 0x7F. Idempotent.
    pub fn normalized(&self) -> Ul {
        let mut norm = self.0;
        norm[Self::VERSION] = 0;
        if norm[Self::CATEGORY_DESIGNATOR] == 0x02 {
            norm[Self::REGISTRY_DESIGNATOR] = 0x7F;
        }
        Ul(norm)
    }
}

impl fmt::Display for Ul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{URN_PREFIX}")?;
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 && i % 4 == 0 {
                write!(f, ".")?;
            }
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Ul {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ul({self})")
    }
}

impl FromStr for Ul {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidUrn {
            kind: "UL",
            text: s.to_string(),
        };

        let hex = s.strip_prefix(URN_PREFIX).ok_or_else(invalid)?;
        let groups: Vec<&str> = hex.split('.').collect();
        if groups.len() != 4 || groups.iter().any(|g| g.len() != 8) {
            return Err(invalid());
        }

        let mut value = [0u8; 16];
        for (i, group) in groups.iter().enumerate() {
            let word = u32::from_str_radix(group, 16).map_err(|_| invalid())?;
            value[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        Ok(Ul(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRIMER: &str = "urn:smpte:ul:060e2b34.02050101.0d010201.01050100";

    #[test]
    fn urn_round_trip() {
        let ul: Ul = PRIMER.parse().unwrap();
        assert_eq!(ul.to_string(), PRIMER);
        assert_eq!(ul.octet(0), 0x06);
        assert_eq!(ul.octet(15), 0x00);
    }

    #[test]
    fn rejects_malformed_urns() {
        assert!("urn:uuid:01020304-0506-0708-090a-0b0c0d0e0f10".parse::<Ul>().is_err());
        assert!("urn:smpte:ul:060e2b34".parse::<Ul>().is_err());
        assert!("urn:smpte:ul:060e2b34.0205010z.0d010201.01050100".parse::<Ul>().is_err());
    }

    #[test]
    fn masked_equality() {
        let a: Ul = PRIMER.parse().unwrap();
        let mut bytes = *a.as_bytes();
        bytes[Ul::VERSION] = 0x7f;
        let b = Ul::new(bytes);

        assert_ne!(a, b);
        assert!(a.equals_with_mask(&b, Ul::IGNORE_VERSION));
        assert!(!a.equals_with_mask(&b, 0xFFFF));
    }

    #[test]
    fn group_and_local_set_predicates() {
        let primer: Ul = PRIMER.parse().unwrap();
        assert!(primer.is_group());
        // Registry designator 0x05: not a local set coding.
        assert!(!primer.is_local_set());

        let preface: Ul = "urn:smpte:ul:060e2b34.02530101.0d010101.01012f00"
            .parse()
            .unwrap();
        assert!(preface.is_group());
        assert!(preface.is_local_set());

        let item: Ul = "urn:smpte:ul:060e2b34.01010101.01011502.00000000"
            .parse()
            .unwrap();
        assert!(!item.is_group());
    }

    #[test]
    fn normalization_is_idempotent() {
        let preface: Ul = "urn:smpte:ul:060e2b34.02530101.0d010101.01012f00"
            .parse()
            .unwrap();
        let norm = preface.normalized();
        assert_eq!(norm.version(), 0);
        assert_eq!(norm.registry_designator(), 0x7F);
        assert_eq!(norm.normalized(), norm);

        // Non-group ULs only lose the version octet.
        let item: Ul = "urn:smpte:ul:060e2b34.01010101.01011502.00000000"
            .parse()
            .unwrap();
        let norm = item.normalized();
        assert_eq!(norm.version(), 0);
        assert_eq!(norm.registry_designator(), 0x01);
    }
}
