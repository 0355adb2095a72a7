//! MXF header metadata structures (ST 377-1).
//!
//! Builds on [`regxml_klv`] to read the metadata half of an MXF
//! partition:
//!
//! - [`PartitionPack`] - the structural header opening a partition
//! - [`PrimerPack`] - the partition's local tag register
//! - [`Set`] - a typed group keyed by its Instance UID
//! - [`header`] - the bounded scan producing a [`SetIndex`]
//! - [`Event`] / [`EventHandler`] - the diagnostic channel shared
//!   with the fragment builder
//!
//! The scan treats most anomalies as recoverable: they are reported
//! with their stream position and processing continues.

pub mod error;
pub mod event;
pub mod fill;
pub mod header;
pub mod labels;
pub mod partition;
pub mod primer;
pub mod set;

pub use error::{Error, Result};
pub use event::{Event, EventCode, EventHandler, EventLog, NullEventHandler, Severity};
pub use header::{find_partition_pack, find_primer_pack, read_set_index, SetIndex};
pub use labels::well_known_label;
pub use partition::{PartitionKind, PartitionPack, PartitionStatus};
pub use primer::PrimerPack;
pub use set::{is_instance_uid_key, Set};
