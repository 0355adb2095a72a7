//! Error types for regxml-dict.

use regxml_klv::Auid;
use thiserror::Error;

/// Dictionary construction errors.
#[derive(Debug, Error)]
#[must_use]
pub enum Error {
    #[error("duplicate definition identification {0}")]
    DuplicateIdentification(Auid),

    #[error("duplicate definition symbol {0:?}")]
    DuplicateSymbol(String),
}

/// Metadictionary XML import errors.
#[derive(Debug, Error)]
#[must_use]
pub enum ImportError {
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("expected an Extension root element, found {0:?}")]
    UnexpectedRoot(String),

    #[error("document ended before the root element closed")]
    UnexpectedEof,

    #[error("{element} definition is missing its {field} element")]
    MissingField {
        element: String,
        field: &'static str,
    },

    #[error("invalid {field} value {text:?}")]
    InvalidValue { field: &'static str, text: String },

    #[error("unknown definition element {0:?}")]
    UnknownDefinitionKind(String),

    #[error(transparent)]
    Dict(#[from] Error),
}

/// Result type alias for dictionary operations.
pub type Result<T> = std::result::Result<T, Error>;
