//! Well-known SMPTE UL labels.
//!
//! Static table mapping the normalized URN of each UL this crate and
//! the fragment builder recognize to its register symbol. Serves as a
//! fallback label source for informative XML comments when no loaded
//! dictionary covers an identification.

use phf::phf_map;
use regxml_klv::Auid;

/// Normalized UL URN (version octet zero, group coding 0x7f) to
/// register symbol.
static WELL_KNOWN: phf::Map<&'static str, &'static str> = phf_map! {
    "urn:smpte:ul:060e2b34.027f0100.0d010201.01010000" => "PartitionPack",
    "urn:smpte:ul:060e2b34.027f0100.0d010201.01050100" => "PrimerPack",
    "urn:smpte:ul:060e2b34.01010100.03010210.01000000" => "KLVFill",
    "urn:smpte:ul:060e2b34.027f0100.0d010201.01100100" => "IndexTableSegment",
    "urn:smpte:ul:060e2b34.01010100.01011502.00000000" => "InstanceID",
    "urn:smpte:ul:060e2b34.027f0100.0d010101.01012f00" => "Preface",
    "urn:smpte:ul:060e2b34.01010100.03010201.02000000" => "ByteOrder",
    "urn:smpte:ul:060e2b34.01010100.06010104.01080000" => "PrimaryPackage",
    "urn:smpte:ul:060e2b34.01010100.05200701.08000000" => "LinkedGenerationID",
    "urn:smpte:ul:060e2b34.01010100.05200701.01000000" => "GenerationID",
    "urn:smpte:ul:060e2b34.01010100.05200701.07000000" => "ApplicationProductID",
    "urn:smpte:ul:060e2b34.01040100.01030100.00000000" => "AUID",
    "urn:smpte:ul:060e2b34.01040100.01030300.00000000" => "UUID",
    "urn:smpte:ul:060e2b34.01040100.01030200.00000000" => "PackageID",
    "urn:smpte:ul:060e2b34.01040100.03010500.00000000" => "DateStruct",
    "urn:smpte:ul:060e2b34.01040100.03010100.00000000" => "Rational",
    "urn:smpte:ul:060e2b34.01040100.03010600.00000000" => "TimeStruct",
    "urn:smpte:ul:060e2b34.01040100.03010700.00000000" => "TimeStamp",
    "urn:smpte:ul:060e2b34.01040100.03010300.00000000" => "VersionType",
    "urn:smpte:ul:060e2b34.01040100.01100100.00000000" => "Character",
    "urn:smpte:ul:060e2b34.01040100.01100300.00000000" => "Char",
    "urn:smpte:ul:060e2b34.01040100.01100500.00000000" => "UTF8Character",
    "urn:smpte:ul:060e2b34.01040100.02010101.00000000" => "ProductReleaseType",
    "urn:smpte:ul:060e2b34.01040100.01040100.00000000" => "Boolean",
};

/// Symbol of a well-known identification, if any.
pub fn well_known_label(id: &Auid) -> Option<&'static str> {
    if !id.is_ul() {
        return None;
    }
    WELL_KNOWN.get(id.normalized().to_string().as_str()).copied()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fill, partition, primer, set};
    use regxml_klv::Ul;

    #[test]
    fn keys_are_stored_normalized() {
        for key in WELL_KNOWN.keys() {
            let ul: Ul = key.parse().unwrap();
            assert_eq!(ul.normalized(), ul, "table key {key} is not normalized");
        }
    }

    #[test]
    fn resolves_crate_constants() {
        assert_eq!(
            well_known_label(&Auid::from(partition::KEY)),
            Some("PartitionPack")
        );
        assert_eq!(
            well_known_label(&Auid::from(primer::KEY)),
            Some("PrimerPack")
        );
        assert_eq!(well_known_label(&Auid::from(fill::KEY)), Some("KLVFill"));
        assert_eq!(
            well_known_label(&Auid::from(set::INSTANCE_UID_ITEM_UL)),
            Some("InstanceID")
        );
    }

    #[test]
    fn unknown_and_uuid_form_ids_resolve_to_none() {
        let uuid_form: Auid = "urn:uuid:f81d4fae-7dec-11d0-a765-00a0c91e6bf6"
            .parse()
            .unwrap();
        assert_eq!(well_known_label(&uuid_form), None);

        let unknown: Auid = "urn:smpte:ul:060e2b34.01010101.01020304.05060708"
            .parse()
            .unwrap();
        assert_eq!(well_known_label(&unknown), None);
    }
}
