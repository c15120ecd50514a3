//! Diagnostics for the catalog engine
//!
//! Every validation and mutation entry point returns a [`Diagnostic`] instead
//! of aborting. Each variant maps to a stable short code so callers can match
//! on [`Diagnostic::code`] without parsing the message.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::record::RecordId;

/// Result type for catalog operations
pub type Result<T> = std::result::Result<T, Diagnostic>;

// =============================================================================
// Diagnostic Kind
// =============================================================================

/// Cause taxonomy shared by all diagnostic codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiagnosticKind {
    /// Wrong field set, wrong types, empty or duplicate list entries
    Shape,
    /// Unknown storage unit, container type, attribute, unit or record
    Reference,
    /// Out-of-bounds locations and overlapping containers
    Geometry,
    /// Duplicate ids, names or unit symbols
    Uniqueness,
    /// Unparsable or impossible dates
    Temporal,
    /// Conversions or migrations across unit families
    UnitFamily,
    /// Unreadable, malformed or unverifiable durable files
    Storage,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Shape => "shape",
            Self::Reference => "reference",
            Self::Geometry => "geometry",
            Self::Uniqueness => "uniqueness",
            Self::Temporal => "temporal",
            Self::UnitFamily => "unit-family",
            Self::Storage => "storage",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Diagnostic
// =============================================================================

/// A structured validation or storage failure
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Diagnostic {
    // === Shape ===
    #[error("record is malformed: {reason}")]
    MalformedRecord { reason: String },

    #[error("header is malformed: {reason}")]
    MalformedHeader { reason: String },

    #[error("catalog must be a [header, records] pair: {reason}")]
    MalformedCatalog { reason: String },

    #[error("record {id} has an empty name")]
    EmptyName { id: RecordId },

    #[error("record id must be a positive integer, got {id}")]
    InvalidId { id: RecordId },

    #[error("{field}: entry {index} is empty")]
    EmptyEntry { field: String, index: usize },

    #[error("{field}: \"{value}\" appears more than once")]
    DuplicateEntry { field: String, value: String },

    #[error("numeric attribute \"{attribute}\" has no units")]
    EmptyUnitMap { attribute: String },

    #[error("numeric attribute \"{attribute}\" has no values in unit \"{unit}\"")]
    EmptyValueList { attribute: String, unit: String },

    #[error("numeric attribute \"{attribute}\" lists {value} {unit} more than once")]
    DuplicateValue {
        attribute: String,
        unit: String,
        value: f64,
    },

    #[error("numeric attribute \"{attribute}\" holds a non-finite value in unit \"{unit}\"")]
    NonFiniteValue { attribute: String, unit: String },

    #[error("categorical attribute \"{attribute}\" has no values")]
    EmptyCategoricalList { attribute: String },

    #[error("field \"{field}\" is managed by the catalog and cannot be edited")]
    ProtectedField { field: String },

    #[error("attribute name cannot be empty")]
    EmptyAttributeName,

    #[error("attribute \"{attribute}\" cannot be merged into itself")]
    SelfMerge { attribute: String },

    // === Reference ===
    #[error("storage unit \"{name}\" doesn't exist")]
    UnknownStorageUnit { name: String },

    #[error("container type \"{name}\" doesn't exist")]
    UnknownContainerType { name: String },

    #[error("storage unit \"{storage_unit}\" doesn't allow the container type \"{container_type}\"")]
    IncompatibleContainer {
        container_type: String,
        storage_unit: String,
    },

    #[error("numeric attribute \"{attribute}\" is not declared in the header")]
    UnknownAttribute { attribute: String },

    #[error("unit \"{unit}\" is not declared in the conversion graph")]
    UnknownUnit { unit: String },

    #[error("unit \"{unit}\" is not convertible to \"{base}\", the base unit of \"{attribute}\"")]
    UnitOutsideFamily {
        attribute: String,
        unit: String,
        base: String,
    },

    #[error("no record with id {id}")]
    UnknownRecord { id: RecordId },

    #[error("image path {} doesn't lead to a file", .path.display())]
    MissingImage { path: PathBuf },

    #[error("image path {} doesn't have an image extension", .path.display())]
    UnsupportedImageType { path: PathBuf },

    #[error("asset folder {}: {reason}", .path.display())]
    InvalidAssetFolder { path: PathBuf, reason: String },

    // === Geometry ===
    #[error("location axes don't match storage unit \"{storage_unit}\" (missing {missing:?}, extra {extra:?})")]
    AxisMismatch {
        storage_unit: String,
        missing: Vec<String>,
        extra: Vec<String>,
    },

    #[error("location {axis}: {value} is outside [{min}, {max}]")]
    LocationOutOfBounds {
        axis: String,
        value: i64,
        min: i64,
        max: i64,
    },

    #[error("location {axis}: container reaches {far_corner}, outside [{min}, {max}]")]
    ContainerOutOfBounds {
        axis: String,
        far_corner: i64,
        min: i64,
        max: i64,
    },

    #[error("record {id} overlaps record {other}")]
    Overlap { id: RecordId, other: RecordId },

    #[error("storage unit \"{storage_unit}\" axis {axis}: min {min} exceeds max {max}")]
    InvalidAxisRange {
        storage_unit: String,
        axis: String,
        min: i64,
        max: i64,
    },

    #[error("container type \"{container_type}\" in \"{storage_unit}\" axis {axis}: size {size} must be within 1..={span}")]
    InvalidContainerSize {
        container_type: String,
        storage_unit: String,
        axis: String,
        size: i64,
        span: i64,
    },

    #[error("container type \"{container_type}\" sizes axis {axis}, which \"{storage_unit}\" doesn't have")]
    UnknownSizeAxis {
        container_type: String,
        storage_unit: String,
        axis: String,
    },

    // === Uniqueness ===
    #[error("record id {id} is already taken")]
    DuplicateId { id: RecordId },

    #[error("name \"{name}\" is already used by record {other}")]
    DuplicateName { name: String, other: RecordId },

    #[error("sub-unit \"{unit}\" is declared under both \"{first_base}\" and \"{second_base}\"")]
    DuplicateSubUnit {
        unit: String,
        first_base: String,
        second_base: String,
    },

    #[error("sub-unit \"{unit}\" of \"{base}\" is itself a base unit")]
    SubUnitShadowsBase { unit: String, base: String },

    #[error("numeric attribute \"{attribute}\" already exists")]
    AttributeExists { attribute: String },

    #[error("unit \"{unit}\" already exists")]
    UnitExists { unit: String },

    // === Temporal ===
    #[error("date format \"{format}\" is unusable: {reason}")]
    InvalidDateFormat { format: String, reason: String },

    #[error("{field}: \"{value}\" isn't a valid datetime")]
    UnparsableDate { field: String, value: String },

    #[error("{field}: \"{value}\" lies in the future")]
    FutureDate { field: String, value: String },

    #[error("date_changed \"{changed}\" precedes date_created \"{created}\"")]
    ChangedBeforeCreated { created: String, changed: String },

    // === Unit family ===
    #[error("unit \"{from}\" cannot be converted to \"{to}\"")]
    IncompatibleUnits { from: String, to: String },

    #[error("conversion {base} -> {unit} is invalid: {reason}")]
    InvalidTransform {
        base: String,
        unit: String,
        reason: String,
    },

    #[error("\"{unit}\" declared for \"{attribute}\" is not a base unit")]
    NotABaseUnit { attribute: String, unit: String },

    #[error("unit \"{unit}\" already belongs to the family of \"{attribute}\"")]
    SameUnitFamily { attribute: String, unit: String },

    #[error("\"{input}\" is not a number followed by a unit")]
    UnparsableQuantity { input: String },

    #[error("unit \"{unit}\" is still used by {users:?}")]
    UnitInUse { unit: String, users: Vec<String> },

    #[error("cannot merge \"{attribute}\" ({from}) into \"{into}\" ({to}): different unit families")]
    MergeAcrossFamilies {
        attribute: String,
        into: String,
        from: String,
        to: String,
    },

    // === Storage ===
    #[error("IO error on {}: {reason}", .path.display())]
    Io { path: PathBuf, reason: String },

    #[error("file {} is corrupted: {reason}", .path.display())]
    CorruptFile { path: PathBuf, reason: String },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("file type of {} has to be .json", .path.display())]
    NotJsonFile { path: PathBuf },

    #[error("{} doesn't reload to the catalog that was written", .path.display())]
    RoundTripMismatch { path: PathBuf },

    #[error("{} already exists", .path.display())]
    FileExists { path: PathBuf },

    // === Wrapper ===
    #[error("invalid record {id} at position {index}: {cause}")]
    InvalidRecord {
        index: usize,
        id: RecordId,
        #[source]
        cause: Box<Diagnostic>,
    },
}

impl Diagnostic {
    /// Stable short code for this diagnostic
    pub fn code(&self) -> &'static str {
        match self {
            Self::MalformedRecord { .. } => "E001",
            Self::MalformedHeader { .. } => "E002",
            Self::MalformedCatalog { .. } => "E003",
            Self::EmptyName { .. } => "E004",
            Self::InvalidId { .. } => "E005",
            Self::EmptyEntry { .. } => "E006",
            Self::DuplicateEntry { .. } => "E007",
            Self::EmptyUnitMap { .. } => "E008",
            Self::EmptyValueList { .. } => "E009",
            Self::DuplicateValue { .. } => "E010",
            Self::NonFiniteValue { .. } => "E011",
            Self::EmptyCategoricalList { .. } => "E012",
            Self::ProtectedField { .. } => "E013",
            Self::EmptyAttributeName => "E014",
            Self::SelfMerge { .. } => "E015",

            Self::UnknownStorageUnit { .. } => "E020",
            Self::UnknownContainerType { .. } => "E021",
            Self::IncompatibleContainer { .. } => "E022",
            Self::UnknownAttribute { .. } => "E023",
            Self::UnknownUnit { .. } => "E024",
            Self::UnitOutsideFamily { .. } => "E025",
            Self::UnknownRecord { .. } => "E026",
            Self::MissingImage { .. } => "E027",
            Self::UnsupportedImageType { .. } => "E028",
            Self::InvalidAssetFolder { .. } => "E029",

            Self::AxisMismatch { .. } => "E040",
            Self::LocationOutOfBounds { .. } => "E041",
            Self::ContainerOutOfBounds { .. } => "E042",
            Self::Overlap { .. } => "E043",
            Self::InvalidAxisRange { .. } => "E044",
            Self::InvalidContainerSize { .. } => "E045",
            Self::UnknownSizeAxis { .. } => "E046",

            Self::DuplicateId { .. } => "E050",
            Self::DuplicateName { .. } => "E051",
            Self::DuplicateSubUnit { .. } => "E052",
            Self::SubUnitShadowsBase { .. } => "E053",
            Self::AttributeExists { .. } => "E054",
            Self::UnitExists { .. } => "E055",

            Self::InvalidDateFormat { .. } => "E060",
            Self::UnparsableDate { .. } => "E061",
            Self::FutureDate { .. } => "E062",
            Self::ChangedBeforeCreated { .. } => "E063",

            Self::IncompatibleUnits { .. } => "E070",
            Self::InvalidTransform { .. } => "E071",
            Self::NotABaseUnit { .. } => "E072",
            Self::SameUnitFamily { .. } => "E073",
            Self::UnparsableQuantity { .. } => "E074",
            Self::UnitInUse { .. } => "E075",
            Self::MergeAcrossFamilies { .. } => "E076",

            Self::Io { .. } => "E080",
            Self::CorruptFile { .. } => "E081",
            Self::ChecksumMismatch { .. } => "E082",
            Self::NotJsonFile { .. } => "E083",
            Self::RoundTripMismatch { .. } => "E084",
            Self::FileExists { .. } => "E085",

            Self::InvalidRecord { .. } => "E090",
        }
    }

    /// Cause category of this diagnostic; wrappers report their cause's kind
    pub fn kind(&self) -> DiagnosticKind {
        match self {
            Self::MalformedRecord { .. }
            | Self::MalformedHeader { .. }
            | Self::MalformedCatalog { .. }
            | Self::EmptyName { .. }
            | Self::InvalidId { .. }
            | Self::EmptyEntry { .. }
            | Self::DuplicateEntry { .. }
            | Self::EmptyUnitMap { .. }
            | Self::EmptyValueList { .. }
            | Self::DuplicateValue { .. }
            | Self::NonFiniteValue { .. }
            | Self::EmptyCategoricalList { .. }
            | Self::ProtectedField { .. }
            | Self::EmptyAttributeName
            | Self::SelfMerge { .. } => DiagnosticKind::Shape,

            Self::UnknownStorageUnit { .. }
            | Self::UnknownContainerType { .. }
            | Self::IncompatibleContainer { .. }
            | Self::UnknownAttribute { .. }
            | Self::UnknownUnit { .. }
            | Self::UnitOutsideFamily { .. }
            | Self::UnknownRecord { .. }
            | Self::MissingImage { .. }
            | Self::UnsupportedImageType { .. }
            | Self::InvalidAssetFolder { .. } => DiagnosticKind::Reference,

            Self::AxisMismatch { .. }
            | Self::LocationOutOfBounds { .. }
            | Self::ContainerOutOfBounds { .. }
            | Self::Overlap { .. }
            | Self::InvalidAxisRange { .. }
            | Self::InvalidContainerSize { .. }
            | Self::UnknownSizeAxis { .. } => DiagnosticKind::Geometry,

            Self::DuplicateId { .. }
            | Self::DuplicateName { .. }
            | Self::DuplicateSubUnit { .. }
            | Self::SubUnitShadowsBase { .. }
            | Self::AttributeExists { .. }
            | Self::UnitExists { .. } => DiagnosticKind::Uniqueness,

            Self::InvalidDateFormat { .. }
            | Self::UnparsableDate { .. }
            | Self::FutureDate { .. }
            | Self::ChangedBeforeCreated { .. } => DiagnosticKind::Temporal,

            Self::IncompatibleUnits { .. }
            | Self::InvalidTransform { .. }
            | Self::NotABaseUnit { .. }
            | Self::SameUnitFamily { .. }
            | Self::UnparsableQuantity { .. }
            | Self::UnitInUse { .. }
            | Self::MergeAcrossFamilies { .. } => DiagnosticKind::UnitFamily,

            Self::Io { .. }
            | Self::CorruptFile { .. }
            | Self::ChecksumMismatch { .. }
            | Self::NotJsonFile { .. }
            | Self::RoundTripMismatch { .. }
            | Self::FileExists { .. } => DiagnosticKind::Storage,

            Self::InvalidRecord { cause, .. } => cause.kind(),
        }
    }

    /// Innermost diagnostic, unwrapping `InvalidRecord`
    pub fn root(&self) -> &Diagnostic {
        match self {
            Self::InvalidRecord { cause, .. } => cause.root(),
            other => other,
        }
    }

    /// Wrap a per-record failure with the record's position and id
    pub fn in_record(self, index: usize, id: RecordId) -> Self {
        Self::InvalidRecord {
            index,
            id,
            cause: Box::new(self),
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            reason: err.to_string(),
        }
    }
}
