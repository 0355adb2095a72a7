//! Metadictionaries and their collection.
//!
//! A metadictionary stores the definitions of one scheme and indexes
//! them by normalized identification, by symbol, by owning class
//! (members) and by parent class (subclasses). Lookups normalize the
//! probe key, so version-octet and group-coding differences between a
//! file and the register do not break resolution.

use crate::{Definition, DefinitionKind, Error, Result};
use regxml_klv::Auid;
use std::collections::{BTreeSet, HashMap};

/// Maps identifications to definitions.
pub trait DefinitionResolver {
    /// The definition registered under `id`, if any.
    fn definition(&self, id: &Auid) -> Option<&Definition>;

    /// Identifications of the properties that are members of the
    /// class `id`.
    fn members_of(&self, id: &Auid) -> BTreeSet<Auid>;

    /// Identifications of the direct subclasses of the class `id`.
    fn subclasses_of(&self, id: &Auid) -> BTreeSet<Auid>;
}

/// The definitions of one scheme.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct MetaDictionary {
    scheme_id: Auid,
    scheme_uri: String,
    definitions: Vec<Definition>,
    by_id: HashMap<Auid, usize>,
    by_symbol: HashMap<String, usize>,
    members: HashMap<Auid, BTreeSet<Auid>>,
    subclasses: HashMap<Auid, BTreeSet<Auid>>,
}

impl MetaDictionary {
    pub fn new(scheme_id: Auid, scheme_uri: impl Into<String>) -> Self {
        MetaDictionary {
            scheme_id,
            scheme_uri: scheme_uri.into(),
            ..Default::default()
        }
    }

    /// The scheme identification.
    pub fn scheme_id(&self) -> &Auid {
        &self.scheme_id
    }

    /// The scheme URI, which is also the namespace of every contained
    /// definition.
    pub fn scheme_uri(&self) -> &str {
        &self.scheme_uri
    }

    /// All definitions in insertion order.
    pub fn definitions(&self) -> &[Definition] {
        &self.definitions
    }

    /// Adds a definition, updating every index. Identifications and
    /// symbols must be unique within the dictionary.
    pub fn add_definition(&mut self, definition: Definition) -> Result<()> {
        let norm = definition.info.identification.normalized();

        if self.by_id.contains_key(&norm) {
            return Err(Error::DuplicateIdentification(
                definition.info.identification,
            ));
        }
        if self.by_symbol.contains_key(&definition.info.symbol) {
            return Err(Error::DuplicateSymbol(definition.info.symbol.clone()));
        }

        match &definition.kind {
            DefinitionKind::Class {
                parent_class: Some(parent),
                ..
            } => {
                self.subclasses
                    .entry(parent.normalized())
                    .or_default()
                    .insert(definition.info.identification);
            }
            DefinitionKind::Property(p) => {
                self.members
                    .entry(p.member_of.normalized())
                    .or_default()
                    .insert(definition.info.identification);
            }
            DefinitionKind::PropertyAlias { property, .. } => {
                self.members
                    .entry(property.member_of.normalized())
                    .or_default()
                    .insert(definition.info.identification);
            }
            _ => {}
        }

        let index = self.definitions.len();
        self.by_id.insert(norm, index);
        self.by_symbol.insert(definition.info.symbol.clone(), index);
        self.definitions.push(definition);
        Ok(())
    }

    /// The definition with the given symbol, if any.
    pub fn definition_by_symbol(&self, symbol: &str) -> Option<&Definition> {
        self.by_symbol.get(symbol).map(|&i| &self.definitions[i])
    }
}

impl DefinitionResolver for MetaDictionary {
    fn definition(&self, id: &Auid) -> Option<&Definition> {
        self.by_id
            .get(&id.normalized())
            .map(|&i| &self.definitions[i])
    }

    fn members_of(&self, id: &Auid) -> BTreeSet<Auid> {
        self.members.get(&id.normalized()).cloned().unwrap_or_default()
    }

    fn subclasses_of(&self, id: &Auid) -> BTreeSet<Auid> {
        self.subclasses
            .get(&id.normalized())
            .cloned()
            .unwrap_or_default()
    }
}

/// An ordered collection of metadictionaries. Lookups delegate to the
/// contained dictionaries in insertion order and return the first hit.
#[derive(Debug, Clone, Default)]
#[must_use]
pub struct MetaDictionaryCollection {
    dicts: Vec<MetaDictionary>,
}

impl MetaDictionaryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dictionary unless its scheme URI is already present.
    pub fn add_dictionary(&mut self, dict: MetaDictionary) {
        if !self.has_namespace(dict.scheme_uri()) {
            self.dicts.push(dict);
        }
    }

    /// True if a dictionary with the given scheme URI is present.
    pub fn has_namespace(&self, ns: &str) -> bool {
        self.dicts.iter().any(|d| d.scheme_uri() == ns)
    }

    /// The contained dictionaries, in insertion order.
    pub fn dictionaries(&self) -> &[MetaDictionary] {
        &self.dicts
    }

    /// The definition with the given symbol within one scheme.
    pub fn definition_by_symbol(&self, ns: &str, symbol: &str) -> Option<&Definition> {
        self.dicts
            .iter()
            .find(|d| d.scheme_uri() == ns)
            .and_then(|d| d.definition_by_symbol(symbol))
    }
}

impl DefinitionResolver for MetaDictionaryCollection {
    fn definition(&self, id: &Auid) -> Option<&Definition> {
        self.dicts.iter().find_map(|d| d.definition(id))
    }

    fn members_of(&self, id: &Auid) -> BTreeSet<Auid> {
        let mut members = BTreeSet::new();
        for dict in &self.dicts {
            members.extend(dict.members_of(id));
        }
        members
    }

    fn subclasses_of(&self, id: &Auid) -> BTreeSet<Auid> {
        let mut subclasses = BTreeSet::new();
        for dict in &self.dicts {
            subclasses.extend(dict.subclasses_of(id));
        }
        subclasses
    }
}
