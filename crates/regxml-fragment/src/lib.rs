//! Type-directed RegXML fragment building (ST 2001-1).
//!
//! Turns the header metadata of an MXF partition into an XML
//! fragment whose structure is governed by a set of metadictionaries:
//!
//! - [`Fragment`] - the arena-backed XML tree and its serializer
//! - [`FragmentBuilder`] - the rule-driven traversal from a root
//!   group, dispatching on each property's type definition
//! - [`build_fragment`] - the end-to-end assembler over a partition
//!   byte stream
//!
//! Diagnostics flow through [`regxml_mxf::EventHandler`]; recoverable
//! failures leave an informative comment in the output and traversal
//! continues.

mod assembler;
mod builder;
mod xml;

pub use assembler::{build_fragment, PREFACE_UL};
pub use builder::{AuidLabelResolver, FragmentBuilder, REGXML_NS};
pub use xml::{Attribute, Fragment, NodeId, QName};
