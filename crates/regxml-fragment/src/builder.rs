//! The rule-driven fragment builder.
//!
//! Transforms a KLV group into an XML element tree by dispatching on
//! the register definition of each property type. Recoverable
//! failures stay local: the offending element receives an informative
//! comment, the event channel is notified, and traversal continues
//! with the next item.

use crate::xml::{Fragment, NodeId};
use encoding_rs::{UTF_16BE, UTF_16LE};
use regxml_dict::{Definition, DefinitionKind, DefinitionResolver, MetaDictionaryCollection};
use regxml_klv::{Auid, ByteOrder, Group, KlvReader};
use regxml_mxf::{
    is_instance_uid_key, well_known_label, Event, EventCode, EventHandler, SetIndex,
};
use thiserror::Error;

/// Namespace of the `uid` and `actualType` attributes.
pub const REGXML_NS: &str = "http://sandflow.com/ns/SMPTEST2001-1/baseline";

const UID_ATTR: &str = "uid";
const ACTUALTYPE_ATTR: &str = "actualType";

const AUID_TYPE: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x01, 0x03, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const UUID_TYPE: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x01, 0x03, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const DATE_STRUCT: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x03, 0x01, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const PACKAGE_ID: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x01, 0x03, 0x02, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const RATIONAL: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x03, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const TIME_STRUCT: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x03, 0x01, 0x06, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const TIME_STAMP: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x03, 0x01, 0x07, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const VERSION_TYPE: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x03, 0x01, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const BYTE_ORDER_PROP: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x01, 0x03, 0x01, 0x02, 0x01, 0x02, 0x00, 0x00, 0x00,
]);
const CHARACTER: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x01, 0x10, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const CHAR: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x01, 0x10, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const UTF8_CHARACTER: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x01, 0x10, 0x05, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const PRODUCT_RELEASE_TYPE: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x02, 0x01, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00,
]);
const BOOLEAN: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x04, 0x01, 0x01, 0x01, 0x04, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
]);
const PRIMARY_PACKAGE: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x04, 0x06, 0x01, 0x01, 0x04, 0x01, 0x08, 0x00, 0x00,
]);
const LINKED_GENERATION_ID: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x20, 0x07, 0x01, 0x08, 0x00, 0x00, 0x00,
]);
const GENERATION_ID: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x20, 0x07, 0x01, 0x01, 0x00, 0x00, 0x00,
]);
const APPLICATION_PRODUCT_ID: Auid = Auid::new([
    0x06, 0x0e, 0x2b, 0x34, 0x01, 0x01, 0x01, 0x02, 0x05, 0x20, 0x07, 0x01, 0x07, 0x00, 0x00, 0x00,
]);

const BYTEORDER_BE_TEXT: &str = "BigEndian";
const BYTEORDER_LE_TEXT: &str = "LittleEndian";

/// Resolves identifications to human-readable labels for informative
/// XML comments.
pub trait AuidLabelResolver {
    fn label(&self, id: &Auid) -> Option<String>;
}

impl AuidLabelResolver for MetaDictionaryCollection {
    fn label(&self, id: &Auid) -> Option<String> {
        self.definition(id)
            .map(|d| {
                if d.info.name.is_empty() {
                    d.symbol().to_string()
                } else {
                    d.info.name.clone()
                }
            })
            .or_else(|| well_known_label(id).map(str::to_string))
    }
}

/// Recoverable failure inside a single property or value rule.
#[derive(Debug, Error)]
enum RuleError {
    #[error("unknown type {0}")]
    UnknownType(String),

    #[error("unknown byte order marker in {0}")]
    UnknownByteOrder(String),

    #[error("primary package {0} is not in the file")]
    MissingPrimaryPackage(String),

    #[error("no unique identifier property for {0}")]
    MissingUniqueProperty(String),

    #[error("strong reference target {0} is not in the file")]
    MissingStrongReference(String),

    #[error("strong reference type {0} does not reference a class")]
    InvalidStrongReferenceType(String),

    #[error("expected a {expected} definition, found {found} {id}")]
    UnexpectedDefinition {
        expected: &'static str,
        found: &'static str,
        id: String,
    },

    #[error("character type {0} has no decodable wire form")]
    UnsupportedCharType(String),

    #[error("string type {0} has a non-character element type")]
    UnsupportedStringType(String),

    #[error("enumeration {symbol} is not decodable: {detail}")]
    UnsupportedEnumType { symbol: String, detail: String },

    #[error("opaque type {0} is not supported")]
    OpaqueUnsupported(String),

    #[error("stream type {0} is not supported")]
    StreamUnsupported(String),

    #[error("string array {0} is not supported")]
    StringArrayUnsupported(String),

    #[error("lens serial float {0} is not supported")]
    LensSerialFloatUnsupported(String),

    #[error("value read failed: {0}")]
    Io(String),
}

impl From<regxml_klv::Error> for RuleError {
    fn from(e: regxml_klv::Error) -> Self {
        RuleError::Io(e.to_string())
    }
}

impl RuleError {
    fn code(&self) -> EventCode {
        match self {
            RuleError::UnknownType(_) => EventCode::UnknownType,
            RuleError::UnknownByteOrder(_) => EventCode::UnknownByteOrder,
            RuleError::MissingPrimaryPackage(_) => EventCode::MissingPrimaryPackage,
            RuleError::MissingUniqueProperty(_) => EventCode::MissingUniqueProperty,
            RuleError::MissingStrongReference(_) => EventCode::MissingStrongReference,
            RuleError::InvalidStrongReferenceType(_) => EventCode::InvalidStrongReferenceType,
            RuleError::UnexpectedDefinition { .. } => EventCode::UnexpectedDefinition,
            RuleError::UnsupportedCharType(_) => EventCode::UnsupportedCharType,
            RuleError::UnsupportedStringType(_) => EventCode::UnsupportedStringType,
            RuleError::UnsupportedEnumType { .. } => EventCode::UnsupportedEnumType,
            RuleError::OpaqueUnsupported(_) => EventCode::OpaqueUnsupported,
            RuleError::StreamUnsupported(_) => EventCode::StreamUnsupported,
            RuleError::StringArrayUnsupported(_) => EventCode::StringArrayUnsupported,
            RuleError::LensSerialFloatUnsupported(_) => EventCode::LensSerialFloatUnsupported,
            RuleError::Io(_) => EventCode::IoError,
        }
    }
}

/// Follows rename chains to the underlying type definition.
fn find_base_definition<'a>(
    defs: &'a dyn DefinitionResolver,
    mut def: &'a Definition,
) -> Option<&'a Definition> {
    let mut depth = 0;
    while let DefinitionKind::RenameType { renamed_type } = &def.kind {
        def = defs.definition(renamed_type)?;
        depth += 1;
        if depth > 64 {
            return None;
        }
    }
    Some(def)
}

fn iso8601_date(year: u16, month: u8, day: u8) -> String {
    format!("{year:04}-{month:02}-{day:02}")
}

fn iso8601_time(hour: u8, minute: u8, second: u8, millis: u32) -> String {
    if millis != 0 {
        format!("{hour:02}:{minute:02}:{second:02}.{millis:03}Z")
    } else {
        format!("{hour:02}:{minute:02}:{second:02}Z")
    }
}

/// Decodes a 16-bit IEEE 754 value.
fn f16_bits_to_f64(bits: u16) -> f64 {
    let sign = if bits & 0x8000 != 0 { -1.0 } else { 1.0 };
    let exponent = (bits >> 10) & 0x1F;
    let fraction = f64::from(bits & 0x3FF);
    match exponent {
        0 => sign * fraction * (-24f64).exp2(),
        0x1F => {
            if fraction == 0.0 {
                sign * f64::INFINITY
            } else {
                f64::NAN
            }
        }
        e => sign * (1.0 + fraction / 1024.0) * f64::from(i32::from(e) - 15).exp2(),
    }
}

/// Builds RegXML fragments from KLV groups.
#[must_use]
pub struct FragmentBuilder<'a> {
    defs: &'a dyn DefinitionResolver,
    sets: &'a SetIndex,
    labels: Option<&'a dyn AuidLabelResolver>,
    prefixes: Vec<(String, String)>,
    cancelled: bool,
}

impl<'a> FragmentBuilder<'a> {
    /// Creates a builder over a definition resolver and the set index
    /// used to chase strong references. A label resolver, when given,
    /// adds informative comments naming the identifications the
    /// builder writes out.
    pub fn new(
        defs: &'a dyn DefinitionResolver,
        sets: &'a SetIndex,
        labels: Option<&'a dyn AuidLabelResolver>,
    ) -> Self {
        FragmentBuilder {
            defs,
            sets,
            labels,
            prefixes: Vec::new(),
            cancelled: false,
        }
    }

    /// Builds the fragment rooted at `group`. Namespace declarations
    /// for every prefix assigned during traversal are injected on the
    /// root element.
    pub fn build(&mut self, group: &dyn Group, handler: &mut dyn EventHandler) -> Fragment {
        self.prefixes.clear();
        self.cancelled = false;

        let mut frag = Fragment::new();
        self.apply_rule3(&mut frag, None, group, handler);

        if let Some(root) = frag.root() {
            for (ns, prefix) in &self.prefixes {
                frag.set_attribute(root, format!("xmlns:{prefix}"), ns.clone());
            }
        }
        frag
    }

    fn report(&mut self, handler: &mut dyn EventHandler, event: Event) {
        if !handler.handle(event) {
            self.cancelled = true;
        }
    }

    /// Prefix assigned to `ns`, allocating `r0`, `r1`, ... on first
    /// use.
    fn prefix_for(&mut self, ns: &str) -> String {
        if let Some((_, prefix)) = self.prefixes.iter().find(|(n, _)| n == ns) {
            return prefix.clone();
        }
        let prefix = format!("r{}", self.prefixes.len());
        self.prefixes.push((ns.to_string(), prefix.clone()));
        prefix
    }

    fn append_label_comment(&mut self, frag: &mut Fragment, elem: NodeId, id: &Auid) {
        if let Some(labels) = self.labels {
            if let Some(label) = labels.label(id) {
                frag.add_comment(Some(elem), label);
            }
        }
    }

    /// Rule 3: a group becomes an element named by its class.
    pub(crate) fn apply_rule3(
        &mut self,
        frag: &mut Fragment,
        parent: Option<NodeId>,
        group: &dyn Group,
        handler: &mut dyn EventHandler,
    ) {
        if self.cancelled {
            return;
        }

        let defs = self.defs;

        let Some(definition) = defs.definition(group.key()) else {
            self.report(
                handler,
                Event::info(
                    EventCode::UnknownGroup,
                    format!("no definition for group {}", group.key()),
                    String::new(),
                ),
            );
            return;
        };

        if let (Some(def_ul), Some(key_ul)) = (
            definition.identification().as_ul(),
            group.key().as_ul(),
        ) {
            if def_ul.version() != key_ul.version() {
                self.report(
                    handler,
                    Event::info(
                        EventCode::VersionByteMismatch,
                        format!(
                            "group {} does not have the register version byte",
                            group.key()
                        ),
                        String::new(),
                    ),
                );
            }
        }

        if !definition.is_class() {
            self.report(
                handler,
                Event::error(
                    EventCode::UnexpectedDefinition,
                    format!(
                        "expected a class definition for group {}, found {}",
                        group.key(),
                        definition.kind.name()
                    ),
                    String::new(),
                ),
            );
            return;
        }

        let prefix = self.prefix_for(&definition.info.ns);
        let objelem = frag.add_element(parent, &definition.info.ns, definition.symbol(), &prefix);

        for item in group.items() {
            if self.cancelled {
                return;
            }

            let Some(itemdef) = defs.definition(item.key()) else {
                self.report(
                    handler,
                    Event::info(
                        EventCode::UnknownProperty,
                        format!("no definition for property {}", item.key()),
                        format!("group {}", group.key()),
                    ),
                );
                frag.add_comment(
                    Some(objelem),
                    format!(
                        "Unknown property\nKey: {}\nData: {}",
                        item.key(),
                        hex_string(item.value())
                    ),
                );
                continue;
            };

            if itemdef.as_property().is_none() {
                let reason = format!(
                    "expected a property definition for {}, found {}",
                    item.key(),
                    itemdef.kind.name()
                );
                self.report(
                    handler,
                    Event::warn(
                        EventCode::UnexpectedDefinition,
                        reason.clone(),
                        format!("group {}", group.key()),
                    ),
                );
                frag.add_comment(Some(objelem), reason);
                continue;
            }

            if let (Some(def_ul), Some(key_ul)) =
                (itemdef.identification().as_ul(), item.key().as_ul())
            {
                if def_ul.version() != key_ul.version() {
                    self.report(
                        handler,
                        Event::info(
                            EventCode::VersionByteMismatch,
                            format!(
                                "property {} does not have the register version byte",
                                item.key()
                            ),
                            format!("group {}", group.key()),
                        ),
                    );
                }
            }

            let item_prefix = self.prefix_for(&itemdef.info.ns);
            let elem = frag.add_element(
                Some(objelem),
                &itemdef.info.ns,
                itemdef.symbol(),
                &item_prefix,
            );

            let mut reader = KlvReader::big_endian(item.value());
            self.apply_rule4(frag, elem, &mut reader, itemdef, handler);

            // A set whose instance ID already appears on the ancestor
            // chain is referencing one of its own owners.
            if is_instance_uid_key(item.key())
                && self.detect_cycle(frag, parent, elem, definition.symbol(), handler)
            {
                return;
            }

            if itemdef
                .as_property()
                .is_some_and(|p| p.is_unique_identifier())
            {
                let reg_prefix = self.prefix_for(REGXML_NS);
                let text = frag.text_content(elem);
                frag.set_attribute(objelem, format!("{reg_prefix}:{UID_ATTR}"), text);
            }
        }
    }

    /// Looks for an instance ID identical to `elem`'s along the
    /// ancestor chain. Reports and marks the hit; returns true if the
    /// subtree must be abandoned.
    fn detect_cycle(
        &mut self,
        frag: &mut Fragment,
        parent: Option<NodeId>,
        elem: NodeId,
        group_symbol: &str,
        handler: &mut dyn EventHandler,
    ) -> bool {
        let name = frag.name(elem).clone();
        let text = frag.text_content(elem);

        let mut ancestor = parent;
        while let Some(node) = ancestor {
            for sibling in frag.child_elements(node) {
                if sibling == elem {
                    continue;
                }
                let sibling_name = frag.name(sibling);
                if sibling_name.local.eq_ignore_ascii_case(&name.local)
                    && sibling_name.ns == name.ns
                    && frag.text_content(sibling).eq_ignore_ascii_case(&text)
                {
                    let reason =
                        format!("strong reference cycle through instance ID {text}");
                    self.report(
                        handler,
                        Event::info(
                            EventCode::CircularStrongReference,
                            reason.clone(),
                            format!("group {group_symbol}"),
                        ),
                    );
                    frag.add_comment(Some(sibling), reason);
                    return true;
                }
            }
            ancestor = frag.parent(node);
        }
        false
    }

    /// Rule 4: a property value, including the exceptional properties
    /// handled before type dispatch.
    fn apply_rule4(
        &mut self,
        frag: &mut Fragment,
        elem: NodeId,
        reader: &mut KlvReader,
        propdef: &Definition,
        handler: &mut dyn EventHandler,
    ) {
        if let Err(e) = self.rule4(frag, elem, reader, propdef, handler) {
            self.report(
                handler,
                Event::error(
                    e.code(),
                    e.to_string(),
                    format!("property {}", propdef.symbol()),
                ),
            );
            frag.add_comment(Some(elem), e.to_string());
        }
    }

    fn rule4(
        &mut self,
        frag: &mut Fragment,
        elem: NodeId,
        reader: &mut KlvReader,
        propdef: &Definition,
        handler: &mut dyn EventHandler,
    ) -> Result<(), RuleError> {
        let defs = self.defs;
        let sets = self.sets;

        let prop = propdef
            .as_property()
            .ok_or_else(|| RuleError::UnexpectedDefinition {
                expected: "property",
                found: propdef.kind.name(),
                id: propdef.identification().to_string(),
            })?;

        let id = propdef.identification();

        if *id == BYTE_ORDER_PROP {
            match reader.read_u16()? {
                0x4D4D => frag.set_text(elem, BYTEORDER_BE_TEXT),
                0x4949 => {
                    // The value is decoded and reported: everything
                    // else in the header still reads big-endian.
                    frag.set_text(elem, BYTEORDER_LE_TEXT);
                    let reason = "little-endian byte order marker".to_string();
                    self.report(
                        handler,
                        Event::error(
                            EventCode::UnexpectedByteOrder,
                            reason.clone(),
                            format!("property {}", propdef.symbol()),
                        ),
                    );
                    frag.add_comment(Some(elem), reason);
                }
                other => {
                    return Err(RuleError::UnknownByteOrder(format!(
                        "byte order property value 0x{other:04x}"
                    )))
                }
            }
            return Ok(());
        }

        let tdef = defs
            .definition(&prop.property_type)
            .and_then(|d| find_base_definition(defs, d))
            .ok_or_else(|| {
                RuleError::UnknownType(format!(
                    "{} for property {}",
                    prop.property_type,
                    propdef.symbol()
                ))
            })?;

        if *id == PRIMARY_PACKAGE {
            // Encoded as the instance ID of the target set; emitted as
            // the target's unique identifier value.
            let uuid = reader.read_uuid()?;
            let set = sets
                .get(&uuid)
                .ok_or_else(|| RuleError::MissingPrimaryPackage(uuid.urn().to_string()))?;

            for item in set.items() {
                let Some(itemdef) = defs.definition(item.key()) else {
                    continue;
                };
                if itemdef
                    .as_property()
                    .is_some_and(|p| p.is_unique_identifier())
                {
                    let mut item_reader = KlvReader::big_endian(item.value());
                    self.apply_rule4(frag, elem, &mut item_reader, itemdef, handler);
                    return Ok(());
                }
            }
            return Err(RuleError::MissingUniqueProperty(format!(
                "primary package set {}",
                uuid.urn()
            )));
        }

        let tdef = if *id == LINKED_GENERATION_ID
            || *id == GENERATION_ID
            || *id == APPLICATION_PRODUCT_ID
        {
            // These are encoded as plain UUIDs whatever the register
            // declares.
            defs.definition(&UUID_TYPE)
                .ok_or_else(|| RuleError::UnknownType(format!("{UUID_TYPE} for generation ID")))?
        } else {
            tdef
        };

        self.apply_rule5(frag, elem, reader, tdef, handler);
        Ok(())
    }

    /// Rule 5: type-directed emission. Failures are localized to
    /// `elem`.
    fn apply_rule5(
        &mut self,
        frag: &mut Fragment,
        elem: NodeId,
        reader: &mut KlvReader,
        def: &Definition,
        handler: &mut dyn EventHandler,
    ) {
        if let Err(e) = self.rule5(frag, elem, reader, def, handler) {
            self.report(
                handler,
                Event::error(
                    e.code(),
                    e.to_string(),
                    format!("definition {}", def.symbol()),
                ),
            );
            frag.add_comment(Some(elem), e.to_string());
        }
    }

    fn rule5(
        &mut self,
        frag: &mut Fragment,
        elem: NodeId,
        reader: &mut KlvReader,
        def: &Definition,
        handler: &mut dyn EventHandler,
    ) -> Result<(), RuleError> {
        let defs = self.defs;

        match &def.kind {
            DefinitionKind::CharacterType => self.read_characters(frag, elem, reader, def, false),

            DefinitionKind::EnumerationType {
                element_type,
                elements,
            } => {
                let bdef = defs
                    .definition(element_type)
                    .and_then(|d| find_base_definition(defs, d))
                    .ok_or_else(|| RuleError::UnknownType(element_type.to_string()))?;

                let DefinitionKind::IntegerType { size, is_signed } = &bdef.kind else {
                    return Err(RuleError::UnsupportedEnumType {
                        symbol: def.symbol().to_string(),
                        detail: format!("element type is {}", bdef.kind.name()),
                    });
                };
                if *is_signed {
                    return Err(RuleError::UnsupportedEnumType {
                        symbol: def.symbol().to_string(),
                        detail: "signed element type".to_string(),
                    });
                }

                // The register lists ProductReleaseType as UInt8 but
                // files encode it over two bytes.
                let width = if *def.identification() == PRODUCT_RELEASE_TYPE {
                    2
                } else {
                    *size
                };

                let value = match width {
                    1 => u64::from(reader.read_u8()?),
                    2 => u64::from(reader.read_u16()?),
                    4 => u64::from(reader.read_u32()?),
                    _ => {
                        return Err(RuleError::UnsupportedEnumType {
                            symbol: def.symbol().to_string(),
                            detail: format!("{width}-byte element type"),
                        })
                    }
                };

                // Booleans encode true as any non-zero value.
                let name = if *element_type == BOOLEAN {
                    elements
                        .iter()
                        .find(|e| e.value == i64::from(value != 0))
                        .map(|e| e.name.clone())
                } else {
                    elements
                        .iter()
                        .find(|e| e.value >= 0 && e.value as u64 == value)
                        .map(|e| e.name.clone())
                };

                match name {
                    Some(name) => frag.set_text(elem, name),
                    None => {
                        frag.set_text(elem, "UNDEFINED");
                        let reason = format!("value {value} is not an element of the enumeration");
                        self.report(
                            handler,
                            Event::error(
                                EventCode::UnknownEnumValue,
                                reason.clone(),
                                format!("enumeration {}", def.symbol()),
                            ),
                        );
                        frag.add_comment(Some(elem), reason);
                    }
                }
                Ok(())
            }

            DefinitionKind::ExtendibleEnumerationType => {
                let ul = reader.read_ul()?;
                frag.set_text(elem, ul.to_string());
                self.append_label_comment(frag, elem, &Auid::from(ul));
                Ok(())
            }

            DefinitionKind::FixedArrayType {
                element_type,
                element_count,
            } => {
                if *def.identification() == UUID_TYPE {
                    let uuid = reader.read_uuid()?;
                    frag.set_text(elem, uuid.urn().to_string());
                    return Ok(());
                }
                let tdef = defs
                    .definition(element_type)
                    .and_then(|d| find_base_definition(defs, d))
                    .ok_or_else(|| RuleError::UnknownType(element_type.to_string()))?;
                self.array_elements(frag, elem, reader, tdef, u64::from(*element_count), handler)
            }

            DefinitionKind::IndirectType => {
                let order = match reader.read_u8()? {
                    0x4C => ByteOrder::LittleEndian,
                    0x42 => ByteOrder::BigEndian,
                    other => {
                        return Err(RuleError::UnknownByteOrder(format!(
                            "indirect value marker 0x{other:02x}"
                        )))
                    }
                };
                reader.set_byte_order(order);

                let actual = reader.read_idau()?.as_auid();
                let adef = defs.definition(&actual).ok_or_else(|| {
                    RuleError::UnknownType(format!("{actual} for indirect value"))
                })?;

                let reg_prefix = self.prefix_for(REGXML_NS);
                frag.set_attribute(
                    elem,
                    format!("{reg_prefix}:{ACTUALTYPE_ATTR}"),
                    adef.symbol(),
                );

                self.apply_rule5(frag, elem, reader, adef, handler);
                Ok(())
            }

            DefinitionKind::IntegerType { size, is_signed } => {
                let text = match (*size, *is_signed) {
                    (1, true) => reader.read_i8()?.to_string(),
                    (1, false) => reader.read_u8()?.to_string(),
                    (2, true) => reader.read_i16()?.to_string(),
                    (2, false) => reader.read_u16()?.to_string(),
                    (4, true) => reader.read_i32()?.to_string(),
                    (4, false) => reader.read_u32()?.to_string(),
                    (8, true) => reader.read_i64()?.to_string(),
                    (8, false) => reader.read_u64()?.to_string(),
                    _ => {
                        return Err(RuleError::UnexpectedDefinition {
                            expected: "integer of size 1, 2, 4 or 8",
                            found: "IntegerType",
                            id: def.identification().to_string(),
                        })
                    }
                };
                frag.set_text(elem, text);
                Ok(())
            }

            DefinitionKind::OpaqueType => {
                Err(RuleError::OpaqueUnsupported(def.symbol().to_string()))
            }

            DefinitionKind::RecordType { members } => {
                self.record_value(frag, elem, reader, def, members, handler)
            }

            DefinitionKind::RenameType { renamed_type } => {
                let rdef = defs
                    .definition(renamed_type)
                    .ok_or_else(|| RuleError::UnknownType(renamed_type.to_string()))?;
                self.apply_rule5(frag, elem, reader, rdef, handler);
                Ok(())
            }

            DefinitionKind::SetType { element_type } => {
                let tdef = defs
                    .definition(element_type)
                    .and_then(|d| find_base_definition(defs, d))
                    .ok_or_else(|| RuleError::UnknownType(element_type.to_string()))?;
                let count = reader.read_u32()?;
                let _item_length = reader.read_u32()?;
                self.array_elements(frag, elem, reader, tdef, u64::from(count), handler)
            }

            DefinitionKind::StreamType => {
                Err(RuleError::StreamUnsupported(def.symbol().to_string()))
            }

            DefinitionKind::StringType { element_type } => {
                let chrdef = defs
                    .definition(element_type)
                    .and_then(|d| find_base_definition(defs, d))
                    .ok_or_else(|| RuleError::UnknownType(element_type.to_string()))?;
                if !matches!(chrdef.kind, DefinitionKind::CharacterType) {
                    return Err(RuleError::UnsupportedStringType(def.symbol().to_string()));
                }
                self.read_characters(frag, elem, reader, chrdef, true)
            }

            DefinitionKind::StrongReferenceType { .. } => {
                self.strong_reference(frag, elem, reader, def, handler)
            }

            DefinitionKind::VariableArrayType { element_type } => {
                if def.symbol() == "DataValue" {
                    // An unstructured run of octets: no count, no item
                    // length.
                    frag.set_text(elem, hex_string(reader.read_to_end()));
                    return Ok(());
                }

                let tdef = defs
                    .definition(element_type)
                    .and_then(|d| find_base_definition(defs, d))
                    .ok_or_else(|| RuleError::UnknownType(element_type.to_string()))?;

                if matches!(tdef.kind, DefinitionKind::CharacterType)
                    || tdef.info.name.contains("StringArray")
                    || tdef.symbol().contains("StringArray")
                {
                    return Err(RuleError::StringArrayUnsupported(def.symbol().to_string()));
                }

                let count = reader.read_u32()?;
                let _item_length = reader.read_u32()?;
                self.array_elements(frag, elem, reader, tdef, u64::from(count), handler)
            }

            DefinitionKind::WeakReferenceType { referenced_type, .. } => {
                let classdef = defs
                    .definition(referenced_type)
                    .ok_or_else(|| RuleError::UnknownType(referenced_type.to_string()))?;
                if !classdef.is_class() {
                    return Err(RuleError::UnexpectedDefinition {
                        expected: "class",
                        found: classdef.kind.name(),
                        id: referenced_type.to_string(),
                    });
                }

                let unique = self.find_unique_property(classdef)?;
                self.apply_rule4(frag, elem, reader, unique, handler);
                Ok(())
            }

            DefinitionKind::LensSerialFloatType => Err(RuleError::LensSerialFloatUnsupported(
                def.symbol().to_string(),
            )),

            DefinitionKind::FloatType { size } => {
                let text = match *size {
                    2 => f16_bits_to_f64(reader.read_u16()?).to_string(),
                    4 => reader.read_f32()?.to_string(),
                    8 => reader.read_f64()?.to_string(),
                    _ => {
                        return Err(RuleError::UnexpectedDefinition {
                            expected: "float of size 2, 4 or 8",
                            found: "FloatType",
                            id: def.identification().to_string(),
                        })
                    }
                };
                frag.set_text(elem, text);
                Ok(())
            }

            DefinitionKind::Class { .. }
            | DefinitionKind::Property(_)
            | DefinitionKind::PropertyAlias { .. } => Err(RuleError::UnexpectedDefinition {
                expected: "type",
                found: def.kind.name(),
                id: def.identification().to_string(),
            }),
        }
    }

    /// Rules 5.4 / 5.10 / 5.14 share this element loop: strong
    /// references emit into the parent, every other element type gets
    /// a child element named by the type's symbol.
    fn array_elements(
        &mut self,
        frag: &mut Fragment,
        elem: NodeId,
        reader: &mut KlvReader,
        tdef: &Definition,
        count: u64,
        handler: &mut dyn EventHandler,
    ) -> Result<(), RuleError> {
        for _ in 0..count {
            if matches!(tdef.kind, DefinitionKind::StrongReferenceType { .. }) {
                self.strong_reference(frag, elem, reader, tdef, handler)?;
            } else {
                let prefix = self.prefix_for(&tdef.info.ns);
                let child = frag.add_element(Some(elem), &tdef.info.ns, tdef.symbol(), &prefix);
                self.apply_rule5(frag, child, reader, tdef, handler);
            }
        }
        Ok(())
    }

    /// Rule 5.13: chase an instance ID into the set index.
    fn strong_reference(
        &mut self,
        frag: &mut Fragment,
        elem: NodeId,
        reader: &mut KlvReader,
        def: &Definition,
        handler: &mut dyn EventHandler,
    ) -> Result<(), RuleError> {
        let defs = self.defs;
        let sets = self.sets;

        let DefinitionKind::StrongReferenceType { referenced_type } = &def.kind else {
            return Err(RuleError::UnexpectedDefinition {
                expected: "strong reference type",
                found: def.kind.name(),
                id: def.identification().to_string(),
            });
        };

        let target = defs
            .definition(referenced_type)
            .and_then(|d| find_base_definition(defs, d))
            .ok_or_else(|| RuleError::UnknownType(referenced_type.to_string()))?;
        if !target.is_class() {
            return Err(RuleError::InvalidStrongReferenceType(
                def.symbol().to_string(),
            ));
        }

        let uuid = reader.read_uuid()?;
        match sets.get(&uuid) {
            Some(set) => {
                self.apply_rule3(frag, Some(elem), set, handler);
                Ok(())
            }
            None => Err(RuleError::MissingStrongReference(uuid.urn().to_string())),
        }
    }

    /// Rule 5.15 support: the unique identifier property of a class,
    /// searched up the parent chain.
    fn find_unique_property(&self, classdef: &'a Definition) -> Result<&'a Definition, RuleError> {
        let defs = self.defs;
        let mut current = Some(classdef);

        while let Some(cdef) = current {
            for member_id in defs.members_of(cdef.identification()) {
                let Some(pdef) = defs.definition(&member_id) else {
                    continue;
                };
                if pdef
                    .as_property()
                    .is_some_and(|p| p.is_unique_identifier())
                {
                    return Ok(pdef);
                }
            }
            current = match &cdef.kind {
                DefinitionKind::Class {
                    parent_class: Some(parent),
                    ..
                } => defs.definition(parent),
                _ => None,
            };
        }

        Err(RuleError::MissingUniqueProperty(
            classdef.symbol().to_string(),
        ))
    }

    /// Rules 5.1 / 5.12: drain the value through the codec selected
    /// by the character type.
    fn read_characters(
        &mut self,
        frag: &mut Fragment,
        elem: NodeId,
        reader: &mut KlvReader,
        chrdef: &Definition,
        strip_trailing_nuls: bool,
    ) -> Result<(), RuleError> {
        let byte_order = reader.byte_order();
        let bytes = reader.read_to_end();
        if bytes.is_empty() {
            return Ok(());
        }

        let id = chrdef.identification();
        let decoded = if *id == CHARACTER {
            match byte_order {
                ByteOrder::BigEndian => UTF_16BE.decode(bytes).0.into_owned(),
                ByteOrder::LittleEndian => UTF_16LE.decode(bytes).0.into_owned(),
            }
        } else if *id == CHAR {
            bytes
                .iter()
                .map(|&b| if b < 0x80 { b as char } else { '\u{FFFD}' })
                .collect()
        } else if *id == UTF8_CHARACTER {
            String::from_utf8_lossy(bytes).into_owned()
        } else {
            return Err(RuleError::UnsupportedCharType(chrdef.symbol().to_string()));
        };

        let text = if strip_trailing_nuls {
            decoded.trim_end_matches('\0')
        } else {
            decoded.as_str()
        };

        if !text.is_empty() {
            frag.set_text(elem, text);
        }
        Ok(())
    }

    /// Rule 5.8: records, with the wire-format exceptions keyed by
    /// identification.
    fn record_value(
        &mut self,
        frag: &mut Fragment,
        elem: NodeId,
        reader: &mut KlvReader,
        def: &Definition,
        members: &[regxml_dict::RecordMember],
        handler: &mut dyn EventHandler,
    ) -> Result<(), RuleError> {
        let defs = self.defs;
        let id = def.identification();

        if *id == AUID_TYPE {
            let auid = reader.read_auid()?;
            frag.set_text(elem, auid.to_string());
            self.append_label_comment(frag, elem, &auid);
        } else if *id == DATE_STRUCT {
            let year = reader.read_u16()?;
            let month = reader.read_u8()?;
            let day = reader.read_u8()?;
            frag.set_text(elem, iso8601_date(year, month, day));
        } else if *id == PACKAGE_ID {
            let umid = reader.read_umid()?;
            frag.set_text(elem, umid.to_string());
        } else if *id == RATIONAL {
            let numerator = reader.read_i32()?;
            let denominator = reader.read_i32()?;
            frag.set_text(elem, format!("{numerator}/{denominator}"));
        } else if *id == TIME_STRUCT {
            // The fraction octet counts quarter-milliseconds.
            let hour = reader.read_u8()?;
            let minute = reader.read_u8()?;
            let second = reader.read_u8()?;
            let fraction = reader.read_u8()?;
            frag.set_text(
                elem,
                iso8601_time(hour, minute, second, 4 * u32::from(fraction)),
            );
        } else if *id == TIME_STAMP {
            let year = reader.read_u16()?;
            let month = reader.read_u8()?;
            let day = reader.read_u8()?;
            let hour = reader.read_u8()?;
            let minute = reader.read_u8()?;
            let second = reader.read_u8()?;
            let fraction = reader.read_u8()?;
            frag.set_text(
                elem,
                format!(
                    "{}T{}",
                    iso8601_date(year, month, day),
                    iso8601_time(hour, minute, second, 4 * u32::from(fraction))
                ),
            );
        } else if *id == VERSION_TYPE {
            // Registers declare Int8 fields but files encode UInt8.
            let major = reader.read_u8()?;
            let minor = reader.read_u8()?;
            frag.set_text(elem, format!("{major}.{minor}"));
        } else {
            for member in members {
                let mdef = defs
                    .definition(&member.member_type)
                    .and_then(|d| find_base_definition(defs, d))
                    .ok_or_else(|| RuleError::UnknownType(member.member_type.to_string()))?;

                let prefix = self.prefix_for(&def.info.ns);
                let child = frag.add_element(Some(elem), &def.info.ns, &member.name, &prefix);
                self.apply_rule5(frag, child, reader, mdef, handler);
            }
        }
        Ok(())
    }
}

fn hex_string(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02x}");
    }
    out
}
