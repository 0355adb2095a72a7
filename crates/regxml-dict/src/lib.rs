//! RegXML metadictionaries (ST 2001-1).
//!
//! A metadictionary catalogs the classes, properties and types that
//! govern a RegXML document:
//!
//! - [`Definition`] / [`DefinitionKind`] - the definition model
//! - [`MetaDictionary`] / [`MetaDictionaryCollection`] - definition
//!   storage with normalized-identification, symbol, member and
//!   subclass indices
//! - [`import_dictionary`] - the ST 2001-1b XML importer
//!
//! Consumers resolve definitions through the [`DefinitionResolver`]
//! trait, so a single dictionary and a collection are
//! interchangeable.

mod definitions;
mod dict;
mod error;
mod import;

pub use definitions::{
    Definition, DefinitionInfo, DefinitionKind, EnumerationElement, PropertyInfo, RecordMember,
};
pub use dict::{DefinitionResolver, MetaDictionary, MetaDictionaryCollection};
pub use error::{Error, ImportError, Result};
pub use import::{import_dictionary, METADICT_NS};
