//! Metadictionary XML importer.
//!
//! Reads the ST 2001-1b `Extension` document into a
//! [`MetaDictionary`]. The document carries a scheme identification
//! and URI followed by one element per definition; every definition
//! inherits the scheme URI as its namespace.

use crate::{
    Definition, DefinitionInfo, DefinitionKind, EnumerationElement, ImportError, MetaDictionary,
    PropertyInfo, RecordMember,
};
use quick_xml::events::Event;
use quick_xml::Reader;
use regxml_klv::Auid;

/// Namespace of the metadictionary schema.
pub const METADICT_NS: &str = "http://www.smpte-ra.org/schemas/2001-1b/2013/metadict";

/// Lightweight element tree used while importing.
#[derive(Debug, Default)]
struct XmlNode {
    name: String,
    text: String,
    children: Vec<XmlNode>,
}

impl XmlNode {
    fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    fn require_text(&self, field: &'static str) -> Result<&str, ImportError> {
        self.child_text(field).ok_or_else(|| ImportError::MissingField {
            element: self.name.clone(),
            field,
        })
    }
}

fn local_name(raw: &[u8]) -> String {
    let name = String::from_utf8_lossy(raw);
    match name.rfind(':') {
        Some(pos) => name[pos + 1..].to_string(),
        None => name.into_owned(),
    }
}

/// Parses the document into an element tree, dropping namespaces,
/// attributes, comments and processing instructions.
fn parse_tree(xml: &str) -> Result<XmlNode, ImportError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                stack.push(XmlNode {
                    name: local_name(e.name().as_ref()),
                    ..Default::default()
                });
            }
            Event::Empty(ref e) => {
                let node = XmlNode {
                    name: local_name(e.name().as_ref()),
                    ..Default::default()
                };
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            Event::Text(ref e) => {
                if let (Ok(text), Some(node)) = (e.decode(), stack.last_mut()) {
                    node.text.push_str(&text);
                }
            }
            Event::End(_) => {
                let node = stack.pop().ok_or(ImportError::UnexpectedEof)?;
                match stack.last_mut() {
                    Some(parent) => parent.children.push(node),
                    None => return Ok(node),
                }
            }
            Event::Eof => return Err(ImportError::UnexpectedEof),
            _ => {}
        }
    }
}

fn parse_auid(field: &'static str, text: &str) -> Result<Auid, ImportError> {
    text.trim().parse().map_err(|_| ImportError::InvalidValue {
        field,
        text: text.to_string(),
    })
}

fn parse_bool(field: &'static str, text: &str) -> Result<bool, ImportError> {
    match text.trim() {
        "true" | "True" | "1" => Ok(true),
        "false" | "False" | "0" => Ok(false),
        other => Err(ImportError::InvalidValue {
            field,
            text: other.to_string(),
        }),
    }
}

fn parse_number<T>(field: &'static str, text: &str) -> Result<T, ImportError>
where
    T: std::str::FromStr,
{
    let text = text.trim();
    text.parse().map_err(|_| ImportError::InvalidValue {
        field,
        text: text.to_string(),
    })
}

fn required_auid(node: &XmlNode, field: &'static str) -> Result<Auid, ImportError> {
    parse_auid(field, node.require_text(field)?)
}

fn property_info(node: &XmlNode) -> Result<PropertyInfo, ImportError> {
    Ok(PropertyInfo {
        property_type: required_auid(node, "Type")?,
        member_of: required_auid(node, "MemberOf")?,
        local_identification: match node.child_text("LocalIdentification") {
            Some(text) => parse_number("LocalIdentification", text)?,
            None => 0,
        },
        is_unique_identifier: node
            .child_text("IsUniqueIdentifier")
            .map(|t| parse_bool("IsUniqueIdentifier", t))
            .transpose()?,
        is_optional: match node.child_text("IsOptional") {
            Some(text) => parse_bool("IsOptional", text)?,
            None => false,
        },
    })
}

/// Enumeration elements arrive as repeated Name/Value/Description
/// runs; each Name starts a new element.
fn enumeration_elements(node: &XmlNode) -> Result<Vec<EnumerationElement>, ImportError> {
    let mut elements: Vec<EnumerationElement> = Vec::new();

    if let Some(container) = node.child("Elements") {
        for child in &container.children {
            match child.name.as_str() {
                "Name" => elements.push(EnumerationElement {
                    name: child.text.trim().to_string(),
                    value: 0,
                    description: None,
                }),
                "Value" => {
                    if let Some(last) = elements.last_mut() {
                        last.value = parse_number("Value", &child.text)?;
                    }
                }
                "Description" => {
                    if let Some(last) = elements.last_mut() {
                        let text = child.text.trim();
                        if !text.is_empty() {
                            last.description = Some(text.to_string());
                        }
                    }
                }
                _ => {}
            }
        }
    }

    Ok(elements)
}

/// Record members arrive as repeated Name/Type pairs.
fn record_members(node: &XmlNode) -> Result<Vec<RecordMember>, ImportError> {
    let mut members: Vec<RecordMember> = Vec::new();

    if let Some(container) = node.child("Members") {
        let mut pending: Option<String> = None;
        for child in &container.children {
            match child.name.as_str() {
                "Name" => pending = Some(child.text.trim().to_string()),
                "Type" => {
                    if let Some(name) = pending.take() {
                        members.push(RecordMember {
                            name,
                            member_type: parse_auid("Type", &child.text)?,
                        });
                    }
                }
                _ => {}
            }
        }
    }

    Ok(members)
}

fn target_set(node: &XmlNode) -> Result<Vec<Auid>, ImportError> {
    match node.child_text("TargetSet") {
        Some(text) => text
            .split_whitespace()
            .map(|urn| parse_auid("TargetSet", urn))
            .collect(),
        None => Ok(Vec::new()),
    }
}

fn convert_definition(node: &XmlNode, ns: &str) -> Result<Definition, ImportError> {
    let kind = match node.name.as_str() {
        "ClassDefinition" => DefinitionKind::Class {
            parent_class: node
                .child_text("ParentClass")
                .map(|t| parse_auid("ParentClass", t))
                .transpose()?,
            is_concrete: match node.child_text("IsConcrete") {
                Some(text) => parse_bool("IsConcrete", text)?,
                None => true,
            },
        },
        "PropertyDefinition" => DefinitionKind::Property(property_info(node)?),
        "PropertyAliasDefinition" => DefinitionKind::PropertyAlias {
            property: property_info(node)?,
            original_property: required_auid(node, "OriginalProperty")?,
        },
        "TypeDefinitionCharacter" => DefinitionKind::CharacterType,
        "TypeDefinitionString" => DefinitionKind::StringType {
            element_type: required_auid(node, "ElementType")?,
        },
        "TypeDefinitionInteger" => DefinitionKind::IntegerType {
            size: parse_number("Size", node.require_text("Size")?)?,
            is_signed: parse_bool("IsSigned", node.require_text("IsSigned")?)?,
        },
        "TypeDefinitionEnumeration" => DefinitionKind::EnumerationType {
            element_type: required_auid(node, "ElementType")?,
            elements: enumeration_elements(node)?,
        },
        "TypeDefinitionExtendibleEnumeration" => DefinitionKind::ExtendibleEnumerationType,
        "TypeDefinitionFixedArray" => DefinitionKind::FixedArrayType {
            element_type: required_auid(node, "ElementType")?,
            element_count: parse_number("ElementCount", node.require_text("ElementCount")?)?,
        },
        "TypeDefinitionVariableArray" => DefinitionKind::VariableArrayType {
            element_type: required_auid(node, "ElementType")?,
        },
        "TypeDefinitionSet" => DefinitionKind::SetType {
            element_type: required_auid(node, "ElementType")?,
        },
        "TypeDefinitionRecord" => DefinitionKind::RecordType {
            members: record_members(node)?,
        },
        "TypeDefinitionRename" => DefinitionKind::RenameType {
            renamed_type: required_auid(node, "RenamedType")?,
        },
        "TypeDefinitionStrongObjectReference" => DefinitionKind::StrongReferenceType {
            referenced_type: required_auid(node, "ReferencedType")?,
        },
        "TypeDefinitionWeakObjectReference" => DefinitionKind::WeakReferenceType {
            referenced_type: required_auid(node, "ReferencedType")?,
            target_set: target_set(node)?,
        },
        "TypeDefinitionIndirect" => DefinitionKind::IndirectType,
        "TypeDefinitionOpaque" => DefinitionKind::OpaqueType,
        "TypeDefinitionStream" => DefinitionKind::StreamType,
        // The schema spells it with the extra 'e'.
        "TypeDefinitionLenseSerialFloat" => DefinitionKind::LensSerialFloatType,
        "TypeDefinitionFloat" => DefinitionKind::FloatType {
            size: parse_number("Size", node.require_text("Size")?)?,
        },
        other => return Err(ImportError::UnknownDefinitionKind(other.to_string())),
    };

    Ok(Definition::new(
        DefinitionInfo {
            identification: required_auid(node, "Identification")?,
            symbol: node.require_text("Symbol")?.to_string(),
            name: node.child_text("Name").unwrap_or_default().to_string(),
            description: node
                .child_text("Description")
                .filter(|t| !t.is_empty())
                .map(str::to_string),
            ns: ns.to_string(),
        },
        kind,
    ))
}

/// Imports one metadictionary document.
pub fn import_dictionary(xml: &str) -> Result<MetaDictionary, ImportError> {
    let root = parse_tree(xml)?;

    if root.name != "Extension" {
        return Err(ImportError::UnexpectedRoot(root.name));
    }

    let scheme_id = required_auid(&root, "SchemeID")?;
    let scheme_uri = root.require_text("SchemeURI")?.to_string();

    let mut dict = MetaDictionary::new(scheme_id, scheme_uri.clone());

    if let Some(defs) = root.child("MetaDefinitions") {
        for node in &defs.children {
            let definition = convert_definition(node, &scheme_uri)?;
            dict.add_definition(definition)?;
        }
    }

    Ok(dict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DefinitionResolver;

    const DOC: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<Extension xmlns="http://www.smpte-ra.org/schemas/2001-1b/2013/metadict">
  <SchemeID>urn:smpte:ul:060e2b34.04060e00.00000000.00000000</SchemeID>
  <SchemeURI>http://www.smpte-ra.org/reg/335/2012</SchemeURI>
  <MetaDefinitions>
    <ClassDefinition>
      <Identification>urn:smpte:ul:060e2b34.027f0101.0d010101.01012f00</Identification>
      <Symbol>Preface</Symbol>
      <Name>Preface</Name>
      <ParentClass>urn:smpte:ul:060e2b34.027f0101.0d010101.01010100</ParentClass>
      <IsConcrete>true</IsConcrete>
    </ClassDefinition>
    <ClassDefinition>
      <Identification>urn:smpte:ul:060e2b34.027f0101.0d010101.01010100</Identification>
      <Symbol>InterchangeObject</Symbol>
      <Name>InterchangeObject</Name>
      <IsConcrete>false</IsConcrete>
    </ClassDefinition>
    <PropertyDefinition>
      <Identification>urn:smpte:ul:060e2b34.01010102.03010210.02010000</Identification>
      <Symbol>ObjectClass</Symbol>
      <Name>Object Class</Name>
      <Type>urn:smpte:ul:060e2b34.01040101.05010100.00000000</Type>
      <MemberOf>urn:smpte:ul:060e2b34.027f0101.0d010101.01010100</MemberOf>
      <LocalIdentification>257</LocalIdentification>
      <IsOptional>true</IsOptional>
    </PropertyDefinition>
    <TypeDefinitionInteger>
      <Identification>urn:smpte:ul:060e2b34.01040101.01010100.00000000</Identification>
      <Symbol>UInt8</Symbol>
      <Name>UInt8</Name>
      <Size>1</Size>
      <IsSigned>false</IsSigned>
    </TypeDefinitionInteger>
    <TypeDefinitionEnumeration>
      <Identification>urn:smpte:ul:060e2b34.01040101.02010101.00000000</Identification>
      <Symbol>ProductReleaseType</Symbol>
      <Name>Product Release Type</Name>
      <ElementType>urn:smpte:ul:060e2b34.01040101.01010100.00000000</ElementType>
      <Elements>
        <Name>VersionUnknown</Name>
        <Value>0</Value>
        <Description></Description>
        <Name>VersionReleased</Name>
        <Value>1</Value>
        <Description>Released product</Description>
      </Elements>
    </TypeDefinitionEnumeration>
    <TypeDefinitionRecord>
      <Identification>urn:smpte:ul:060e2b34.01040101.03010300.00000000</Identification>
      <Symbol>VersionType</Symbol>
      <Name>Version Type</Name>
      <Members>
        <Name>Major</Name>
        <Type>urn:smpte:ul:060e2b34.01040101.01010100.00000000</Type>
        <Name>Minor</Name>
        <Type>urn:smpte:ul:060e2b34.01040101.01010100.00000000</Type>
      </Members>
    </TypeDefinitionRecord>
    <TypeDefinitionWeakObjectReference>
      <Identification>urn:smpte:ul:060e2b34.01040101.05010100.00000000</Identification>
      <Symbol>WeakRef</Symbol>
      <Name>Weak Reference</Name>
      <ReferencedType>urn:smpte:ul:060e2b34.027f0101.0d010101.01010100</ReferencedType>
      <TargetSet>urn:smpte:ul:060e2b34.01010102.06010107.01000000
                 urn:smpte:ul:060e2b34.01010102.06010107.02000000</TargetSet>
    </TypeDefinitionWeakObjectReference>
  </MetaDefinitions>
</Extension>"#;

    #[test]
    fn imports_scheme_and_definitions() {
        let dict = import_dictionary(DOC).unwrap();

        assert_eq!(dict.scheme_uri(), "http://www.smpte-ra.org/reg/335/2012");
        assert_eq!(dict.definitions().len(), 7);

        let preface = dict.definition_by_symbol("Preface").unwrap();
        assert!(preface.is_class());
        assert_eq!(preface.info.ns, "http://www.smpte-ra.org/reg/335/2012");

        let DefinitionKind::Class {
            parent_class,
            is_concrete,
        } = &preface.kind
        else {
            panic!("expected a class");
        };
        assert!(*is_concrete);
        assert!(parent_class.is_some());
    }

    #[test]
    fn imports_property_fields() {
        let dict = import_dictionary(DOC).unwrap();
        let prop = dict.definition_by_symbol("ObjectClass").unwrap();
        let info = prop.as_property().unwrap();

        assert_eq!(info.local_identification, 257);
        assert!(info.is_optional);
        assert_eq!(info.is_unique_identifier, None);

        // The property is indexed as a member of its class.
        let class_id = dict
            .definition_by_symbol("InterchangeObject")
            .unwrap()
            .info
            .identification;
        assert!(dict.members_of(&class_id).contains(prop.identification()));
    }

    #[test]
    fn imports_enumeration_elements() {
        let dict = import_dictionary(DOC).unwrap();
        let def = dict.definition_by_symbol("ProductReleaseType").unwrap();

        let DefinitionKind::EnumerationType { elements, .. } = &def.kind else {
            panic!("expected an enumeration");
        };
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].name, "VersionUnknown");
        assert_eq!(elements[0].value, 0);
        assert_eq!(elements[0].description, None);
        assert_eq!(elements[1].name, "VersionReleased");
        assert_eq!(elements[1].value, 1);
        assert_eq!(elements[1].description.as_deref(), Some("Released product"));
    }

    #[test]
    fn imports_record_members_and_target_sets() {
        let dict = import_dictionary(DOC).unwrap();

        let DefinitionKind::RecordType { members } =
            &dict.definition_by_symbol("VersionType").unwrap().kind
        else {
            panic!("expected a record");
        };
        assert_eq!(members.len(), 2);
        assert_eq!(members[0].name, "Major");
        assert_eq!(members[1].name, "Minor");

        let DefinitionKind::WeakReferenceType { target_set, .. } =
            &dict.definition_by_symbol("WeakRef").unwrap().kind
        else {
            panic!("expected a weak reference");
        };
        assert_eq!(target_set.len(), 2);
    }

    #[test]
    fn rejects_wrong_root() {
        let err = import_dictionary("<Other/>").unwrap_err();
        assert!(matches!(err, ImportError::UnexpectedRoot(_)));
    }

    #[test]
    fn rejects_unknown_definition_kind() {
        let doc = r#"<Extension>
  <SchemeID>urn:smpte:ul:060e2b34.04060e00.00000000.00000000</SchemeID>
  <SchemeURI>urn:example</SchemeURI>
  <MetaDefinitions>
    <TypeDefinitionMystery>
      <Identification>urn:smpte:ul:060e2b34.01040101.01010100.00000000</Identification>
      <Symbol>X</Symbol>
    </TypeDefinitionMystery>
  </MetaDefinitions>
</Extension>"#;
        let err = import_dictionary(doc).unwrap_err();
        assert!(matches!(err, ImportError::UnknownDefinitionKind(_)));
    }

    #[test]
    fn missing_symbol_is_reported() {
        let doc = r#"<Extension>
  <SchemeID>urn:smpte:ul:060e2b34.04060e00.00000000.00000000</SchemeID>
  <SchemeURI>urn:example</SchemeURI>
  <MetaDefinitions>
    <TypeDefinitionIndirect>
      <Identification>urn:smpte:ul:060e2b34.01040101.01010100.00000000</Identification>
    </TypeDefinitionIndirect>
  </MetaDefinitions>
</Extension>"#;
        let err = import_dictionary(doc).unwrap_err();
        assert!(matches!(
            err,
            ImportError::MissingField { field: "Symbol", .. }
        ));
    }
}
