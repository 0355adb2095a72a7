//! KLV primitives and SMPTE identifier types.
//!
//! This crate provides the low-level pieces for walking KLV-coded
//! byte streams (SMPTE ST 336):
//!
//! - [`Ul`], [`Auid`], [`Umid`], [`Idau`] - identifier values with
//!   bit-exact binary and URN round-trips
//! - [`ByteOrder`] - big/little endian handling for value primitives
//! - [`KlvReader`] / [`KlvWriter`] - position-tracking reader and its
//!   symmetric writer, including BER lengths and batches
//! - [`MemoryTriplet`], [`Group`], [`LocalSet`] - triplets and their
//!   decomposition through a local tag register
//!
//! # Example
//!
//! ```
//! use regxml_klv::{KlvReader, KlvWriter};
//!
//! let mut w = KlvWriter::big_endian();
//! w.write_ber_length(0x010203);
//!
//! let mut r = KlvReader::big_endian(w.as_bytes());
//! assert_eq!(r.read_ber_length().unwrap(), 0x010203);
//! ```

mod auid;
mod byte_order;
mod error;
mod local_set;
pub mod reader;
mod triplet;
mod ul;
mod umid;
pub mod writer;

pub use auid::{Auid, Idau};
pub use byte_order::ByteOrder;
pub use error::{Error, Result};
pub use local_set::{LocalSet, LocalTagResolver};
pub use reader::{BatchItem, KlvReader};
pub use triplet::{Group, MemoryTriplet};
pub use ul::Ul;
pub use umid::Umid;
pub use writer::KlvWriter;

pub use uuid::Uuid;
