//! Typed MXF sets.
//!
//! A set is a group carrying an Instance UID item, the UUID that
//! identifies the object within its file. Sets own shallow copies of
//! their item bytes and outlive the stream they were read from.

use crate::{Error, Result};
use regxml_klv::{Auid, Group, MemoryTriplet, Ul};
use uuid::Uuid;

/// Instance UID item key.
pub const INSTANCE_UID_ITEM_UL: Ul = Ul::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, //
    0x01, 0x01, 0x15, 0x02, 0x00, 0x00, 0x00, 0x00,
]);

/// True if the key is the Instance UID item, ignoring the version
/// octet.
pub fn is_instance_uid_key(key: &Auid) -> bool {
    key.as_ul()
        .is_some_and(|ul| INSTANCE_UID_ITEM_UL.equals_with_mask(&ul, Ul::IGNORE_VERSION))
}

/// A group identified by its Instance UID.
#[derive(Debug, Clone)]
#[must_use]
pub struct Set {
    key: Auid,
    instance_id: Uuid,
    items: Vec<MemoryTriplet>,
}

impl Set {
    /// True if the group carries an Instance UID item.
    pub fn has_instance_uid(group: &dyn Group) -> bool {
        group.items().iter().any(|item| is_instance_uid_key(item.key()))
    }

    /// Builds a set from a group, copying each item.
    pub fn from_group(group: &dyn Group) -> Result<Self> {
        let uid_item = group
            .items()
            .iter()
            .find(|item| is_instance_uid_key(item.key()))
            .ok_or_else(|| Error::MissingInstanceUid(group.key().to_string()))?;

        let bytes: [u8; 16] = uid_item
            .value()
            .get(..16)
            .and_then(|b| b.try_into().ok())
            .ok_or(Error::TruncatedInstanceUid(uid_item.len()))?;

        Ok(Set {
            key: *group.key(),
            instance_id: Uuid::from_bytes(bytes),
            items: group.items().to_vec(),
        })
    }

    /// The UUID identifying this set within the file.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }
}

impl Group for Set {
    fn key(&self) -> &Auid {
        &self.key
    }

    fn items(&self) -> &[MemoryTriplet] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TestGroup {
        key: Auid,
        items: Vec<MemoryTriplet>,
    }

    impl Group for TestGroup {
        fn key(&self) -> &Auid {
            &self.key
        }

        fn items(&self) -> &[MemoryTriplet] {
            &self.items
        }
    }

    fn group_key() -> Auid {
        "urn:smpte:ul:060e2b34.02530101.0d010101.01012f00"
            .parse()
            .unwrap()
    }

    #[test]
    fn extracts_instance_id() {
        let uuid = Uuid::from_bytes(*b"0123456789abcdef");
        let group = TestGroup {
            key: group_key(),
            items: vec![MemoryTriplet::new(
                Auid::from(INSTANCE_UID_ITEM_UL),
                uuid.as_bytes().to_vec(),
            )],
        };

        assert!(Set::has_instance_uid(&group));
        let set = Set::from_group(&group).unwrap();
        assert_eq!(set.instance_id(), uuid);
        assert_eq!(set.items().len(), 1);
    }

    #[test]
    fn version_octet_does_not_hide_the_item() {
        let mut key = *INSTANCE_UID_ITEM_UL.as_bytes();
        key[Ul::VERSION] = 0x0c;
        let group = TestGroup {
            key: group_key(),
            items: vec![MemoryTriplet::new(Auid::new(key), vec![0u8; 16])],
        };
        assert!(Set::has_instance_uid(&group));
    }

    #[test]
    fn missing_instance_uid_fails() {
        let group = TestGroup {
            key: group_key(),
            items: vec![],
        };
        assert!(!Set::has_instance_uid(&group));
        assert!(matches!(
            Set::from_group(&group),
            Err(Error::MissingInstanceUid(_))
        ));
    }

    #[test]
    fn short_instance_uid_fails() {
        let group = TestGroup {
            key: group_key(),
            items: vec![MemoryTriplet::new(
                Auid::from(INSTANCE_UID_ITEM_UL),
                vec![0u8; 7],
            )],
        };
        assert!(matches!(
            Set::from_group(&group),
            Err(Error::TruncatedInstanceUid(7))
        ));
    }
}
