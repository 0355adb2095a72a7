//! The definition model.
//!
//! Every register entry a metadictionary can hold is a [`Definition`]:
//! common identification fields plus a [`DefinitionKind`] variant. The
//! fragment builder dispatches on the variant, so a new kind surfaces
//! as a non-exhaustive match at compile time rather than a silent
//! fallthrough.

use regxml_klv::Auid;

/// Fields shared by every definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionInfo {
    pub identification: Auid,
    pub symbol: String,
    pub name: String,
    pub description: Option<String>,
    /// Namespace of the owning dictionary's scheme.
    pub ns: String,
}

/// Fields shared by property and property alias definitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyInfo {
    /// Type of the property value.
    pub property_type: Auid,
    /// Class the property belongs to.
    pub member_of: Auid,
    /// Local tag suggested by the register, zero if none.
    pub local_identification: u16,
    pub is_unique_identifier: Option<bool>,
    pub is_optional: bool,
}

impl PropertyInfo {
    /// True if the property is flagged as its class's unique
    /// identifier.
    pub fn is_unique_identifier(&self) -> bool {
        self.is_unique_identifier == Some(true)
    }
}

/// One named value of an enumeration type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnumerationElement {
    pub name: String,
    pub value: i64,
    pub description: Option<String>,
}

/// One member of a record type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordMember {
    pub name: String,
    pub member_type: Auid,
}

/// The kind-specific half of a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefinitionKind {
    Class {
        parent_class: Option<Auid>,
        is_concrete: bool,
    },
    Property(PropertyInfo),
    PropertyAlias {
        property: PropertyInfo,
        original_property: Auid,
    },
    CharacterType,
    StringType {
        element_type: Auid,
    },
    IntegerType {
        size: u8,
        is_signed: bool,
    },
    EnumerationType {
        element_type: Auid,
        elements: Vec<EnumerationElement>,
    },
    ExtendibleEnumerationType,
    FixedArrayType {
        element_type: Auid,
        element_count: u32,
    },
    VariableArrayType {
        element_type: Auid,
    },
    SetType {
        element_type: Auid,
    },
    RecordType {
        members: Vec<RecordMember>,
    },
    RenameType {
        renamed_type: Auid,
    },
    StrongReferenceType {
        referenced_type: Auid,
    },
    WeakReferenceType {
        referenced_type: Auid,
        target_set: Vec<Auid>,
    },
    IndirectType,
    OpaqueType,
    StreamType,
    LensSerialFloatType,
    FloatType {
        size: u8,
    },
}

impl DefinitionKind {
    /// Human-readable kind name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            DefinitionKind::Class { .. } => "Class",
            DefinitionKind::Property(_) => "Property",
            DefinitionKind::PropertyAlias { .. } => "PropertyAlias",
            DefinitionKind::CharacterType => "CharacterType",
            DefinitionKind::StringType { .. } => "StringType",
            DefinitionKind::IntegerType { .. } => "IntegerType",
            DefinitionKind::EnumerationType { .. } => "EnumerationType",
            DefinitionKind::ExtendibleEnumerationType => "ExtendibleEnumerationType",
            DefinitionKind::FixedArrayType { .. } => "FixedArrayType",
            DefinitionKind::VariableArrayType { .. } => "VariableArrayType",
            DefinitionKind::SetType { .. } => "SetType",
            DefinitionKind::RecordType { .. } => "RecordType",
            DefinitionKind::RenameType { .. } => "RenameType",
            DefinitionKind::StrongReferenceType { .. } => "StrongReferenceType",
            DefinitionKind::WeakReferenceType { .. } => "WeakReferenceType",
            DefinitionKind::IndirectType => "IndirectType",
            DefinitionKind::OpaqueType => "OpaqueType",
            DefinitionKind::StreamType => "StreamType",
            DefinitionKind::LensSerialFloatType => "LensSerialFloatType",
            DefinitionKind::FloatType { .. } => "FloatType",
        }
    }
}

/// A register entry.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub struct Definition {
    pub info: DefinitionInfo,
    pub kind: DefinitionKind,
}

impl Definition {
    pub fn new(info: DefinitionInfo, kind: DefinitionKind) -> Self {
        Definition { info, kind }
    }

    /// The definition's identification.
    pub fn identification(&self) -> &Auid {
        &self.info.identification
    }

    /// The definition's symbol.
    pub fn symbol(&self) -> &str {
        &self.info.symbol
    }

    /// True for class definitions.
    pub fn is_class(&self) -> bool {
        matches!(self.kind, DefinitionKind::Class { .. })
    }

    /// The property fields, for both properties and aliases.
    pub fn as_property(&self) -> Option<&PropertyInfo> {
        match &self.kind {
            DefinitionKind::Property(p) => Some(p),
            DefinitionKind::PropertyAlias { property, .. } => Some(property),
            _ => None,
        }
    }
}
