//! Diagnostic events.
//!
//! The header scan and the fragment builder report anomalies through
//! an [`EventHandler`] rather than failing outright: most conditions
//! are recoverable and processing continues past them. Only handlers
//! decide whether a run should stop early.

use serde::Serialize;
use std::fmt;

/// Event severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Severity {
    Info,
    Warn,
    Error,
    Fatal,
}

/// Stable event codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventCode {
    UnknownGroup,
    UnknownProperty,
    UnknownType,
    VersionByteMismatch,
    UnexpectedDefinition,
    CircularStrongReference,
    MissingStrongReference,
    MissingPrimaryPackage,
    MissingUniqueProperty,
    UnknownEnumValue,
    UnexpectedByteOrder,
    UnknownByteOrder,
    UnsupportedCharType,
    UnsupportedStringType,
    UnsupportedEnumType,
    InvalidStrongReferenceType,
    OpaqueUnsupported,
    StreamUnsupported,
    StringArrayUnsupported,
    LensSerialFloatUnsupported,
    IoError,
    NonMxfSet,
    IndexTableReachedEarly,
    DuplicateMxfSets,
    InvalidTriplet,
    InvalidMxfSet,
    BadPrimerPack,
    BadHeaderPartitionPack,
    MissingPrimerPack,
    MissingHeaderPartitionPack,
    RootSetNotFound,
}

impl fmt::Display for EventCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

/// A single diagnostic event.
#[derive(Debug, Clone, Serialize)]
#[must_use]
pub struct Event {
    pub severity: Severity,
    pub code: EventCode,
    pub reason: String,
    /// Where the event occurred (group, element, stream position).
    pub context: String,
}

impl Event {
    pub fn new(
        severity: Severity,
        code: EventCode,
        reason: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Event {
            severity,
            code,
            reason: reason.into(),
            context: context.into(),
        }
    }

    pub fn info(code: EventCode, reason: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, reason, context)
    }

    pub fn warn(code: EventCode, reason: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(Severity::Warn, code, reason, context)
    }

    pub fn error(code: EventCode, reason: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, reason, context)
    }

    pub fn fatal(code: EventCode, reason: impl Into<String>, context: impl Into<String>) -> Self {
        Self::new(Severity::Fatal, code, reason, context)
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {}: {}", self.severity, self.code, self.reason)?;
        if !self.context.is_empty() {
            write!(f, " ({})", self.context)?;
        }
        Ok(())
    }
}

/// Receives diagnostic events during a scan or build.
pub trait EventHandler {
    /// Handles one event. Returning `false` requests cooperative
    /// cancellation of the surrounding operation.
    fn handle(&mut self, event: Event) -> bool;
}

/// Handler that discards every event.
pub struct NullEventHandler;

impl EventHandler for NullEventHandler {
    fn handle(&mut self, _event: Event) -> bool {
        true
    }
}

/// Handler that records every event for later inspection.
#[derive(Debug, Default)]
pub struct EventLog {
    pub events: Vec<Event>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Events with the given code.
    pub fn with_code(&self, code: EventCode) -> impl Iterator<Item = &Event> {
        self.events.iter().filter(move |e| e.code == code)
    }

    /// True if any fatal event was recorded.
    pub fn has_fatal(&self) -> bool {
        self.events.iter().any(|e| e.severity == Severity::Fatal)
    }
}

impl EventHandler for EventLog {
    fn handle(&mut self, event: Event) -> bool {
        tracing::debug!(code = %event.code, severity = ?event.severity, "{}", event.reason);
        self.events.push(event);
        true
    }
}
