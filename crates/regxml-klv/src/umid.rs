//! SMPTE Unique Material Identifiers (ST 330).

use crate::{Error, Result};
use std::fmt;
use std::str::FromStr;

const URN_PREFIX: &str = "urn:smpte:umid:";

/// 32-byte basic UMID.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct Umid([u8; 32]);

impl Umid {
    /// Wraps a 32-byte value.
    pub const fn new(value: [u8; 32]) -> Self {
        Umid(value)
    }

    /// Raw octets.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Display for Umid {
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

impl fmt::Debug for Umid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Umid({self})")
    }
}

impl FromStr for Umid {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidUrn {
            kind: "UMID",
            text: s.to_string(),
        };

        let hex = s.strip_prefix(URN_PREFIX).ok_or_else(invalid)?;
        let groups: Vec<&str> = hex.split('.').collect();
        if groups.len() != 8 || groups.iter().any(|g| g.len() != 8) {
            return Err(invalid());
        }

        let mut value = [0u8; 32];
        for (i, group) in groups.iter().enumerate() {
            let word = u32::from_str_radix(group, 16).map_err(|_| invalid())?;
            value[i * 4..i * 4 + 4].copy_from_slice(&word.to_be_bytes());
        }
        Ok(Umid(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urn_round_trip() {
        let urn = "urn:smpte:umid:060a2b34.01010105.01010d20.13000000.\
                   d2c9036c.8f195343.ab7014d2.d718bfda";
        let umid: Umid = urn.parse().unwrap();
        assert_eq!(umid.to_string(), urn);
    }

    #[test]
    fn rejects_short_urns() {
        assert!("urn:smpte:umid:060a2b34".parse::<Umid>().is_err());
        assert!("urn:smpte:ul:060e2b34.01010101.01011502.00000000"
            .parse::<Umid>()
            .is_err());
    }
}
