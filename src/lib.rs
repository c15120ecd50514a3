//! Autodex Catalog Engine
//!
//! Validation and consistency engine for a catalog of physical storage
//! containers: boxes and bins placed inside storage units, each described by
//! free text, tags and numeric attributes measured in declared units.
//!
//! ## Features
//!
//! - **Schema Validation**: Records are checked field by field against the header vocabulary
//! - **Spatial Consistency**: No two containers share an id, a name or any space
//! - **Unit Conversion**: Affine unit families with lossless cross-unit comparison
//! - **Attribute Lifecycle**: Rename, merge, re-base and re-family numeric attributes
//! - **Atomic Persistence**: Saves are re-read and re-validated before replacing the file
//!
//! ## Architecture
//!
//! ```text
//! autodex_data.json = [header, records]
//!
//! units ──▶ validate::record ──▶ validate (collective, fida) ──▶ catalog ──▶ store
//!   ▲                                                             │
//!   └──────────────────────── lifecycle ◀─────────────────────────┘
//! ```
//!
//! Every mutation is offered as a plan that can be inspected and dropped, and
//! an apply step that re-validates before committing.

pub mod catalog;
pub mod checksum;
pub mod config;
pub mod error;
pub mod header;
pub mod lifecycle;
pub mod query;
pub mod record;
pub mod store;
pub mod units;
pub mod validate;

pub use catalog::{Catalog, DuplicatePolicy, PlannedChange};
pub use checksum::Checksum;
pub use config::AutodexConfig;
pub use error::{Diagnostic, DiagnosticKind, Result};
pub use header::Header;
pub use lifecycle::{AttributeOp, AttributePlan};
pub use query::{MatchMode, RecordQuery};
pub use record::{Record, RecordDraft, RecordId, RecordPatch};
pub use store::{file_check, CatalogStore, SaveReport};
pub use units::{Quantity, Transform, TransformDescriptor, UnitRegistry};
pub use validate::Validator;
