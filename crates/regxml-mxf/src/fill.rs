//! KLV fill items (ST 336).

use regxml_klv::{Auid, Ul};

/// Fill item key.
pub const KEY: Ul = Ul::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x02, //
    0x03, 0x01, 0x02, 0x10, 0x01, 0x00, 0x00, 0x00,
]);

/// True if the key identifies a fill item. The version octet is
/// ignored so the legacy coding matches too.
pub fn is_fill_item(key: &Auid) -> bool {
    key.as_ul()
        .is_some_and(|ul| KEY.equals_with_mask(&ul, Ul::IGNORE_VERSION))
}
