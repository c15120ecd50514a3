//! The catalog: a header plus its records, with previewable record operations
//!
//! Every mutation is split into a *plan* step that validates and returns a
//! [`PlannedChange`] without touching the catalog, and an [`Catalog::apply`]
//! step that re-validates the change against the current records before
//! committing it. Discarding a plan is the dry run.

use serde_json::Value;
use tracing::{debug, info};

use crate::config::OutputFormat;
use crate::error::{Diagnostic, Result};
use crate::header::Header;
use crate::query::RecordQuery;
use crate::record::{Record, RecordDraft, RecordId, RecordPatch};
use crate::validate::Validator;

/// What `add` does when the draft's id is already taken
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DuplicatePolicy {
    /// Fail with `DuplicateId`
    #[default]
    Reject,
    /// Keep the existing record and do nothing
    Ignore,
    /// Replace the existing record, restarting its history
    Overwrite,
}

/// A validated but uncommitted record mutation
#[derive(Debug, Clone, PartialEq)]
pub enum PlannedChange {
    Insert(Record),
    Replace(Record),
    Remove(RecordId),
    Unchanged(RecordId),
}

impl PlannedChange {
    /// Id of the record the change is about
    pub fn id(&self) -> RecordId {
        match self {
            Self::Insert(record) | Self::Replace(record) => record.id,
            Self::Remove(id) | Self::Unchanged(id) => *id,
        }
    }
}

/// Header and records, in the order they are stored
#[derive(Debug, Clone, PartialEq)]
pub struct Catalog {
    pub header: Header,
    pub records: Vec<Record>,
}

impl Catalog {
    /// Create an empty catalog
    pub fn new(header: Header) -> Self {
        Self {
            header,
            records: Vec::new(),
        }
    }

    /// Parse the durable `[header, records]` shape
    pub fn from_value(value: Value) -> Result<Self> {
        let malformed = |reason: &str| Diagnostic::MalformedCatalog {
            reason: reason.to_string(),
        };

        let Value::Array(mut parts) = value else {
            return Err(malformed("top level is not an array"));
        };
        if parts.len() != 2 {
            return Err(malformed(&format!(
                "expected 2 top-level values, found {}",
                parts.len()
            )));
        }
        let records_value = parts.pop().unwrap_or(Value::Null);
        let header = Header::from_value(parts.pop().unwrap_or(Value::Null))?;

        let Value::Array(raw_records) = records_value else {
            return Err(malformed("records are not an array"));
        };
        let records = raw_records
            .into_iter()
            .enumerate()
            .map(|(index, raw)| {
                let id = raw.get("id").and_then(Value::as_u64).unwrap_or(0);
                Record::from_value(raw).map_err(|e| e.in_record(index, id))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { header, records })
    }

    /// Parse a catalog from JSON text
    pub fn from_json(text: &str) -> Result<Self> {
        let value: Value = serde_json::from_str(text).map_err(|e| Diagnostic::MalformedCatalog {
            reason: e.to_string(),
        })?;
        Self::from_value(value)
    }

    /// Serialize to the durable `[header, records]` shape
    pub fn to_json(&self, format: OutputFormat) -> Result<String> {
        let pair = (&self.header, &self.records);
        let encoded = match format {
            OutputFormat::Pretty => serde_json::to_string_pretty(&pair),
            OutputFormat::Compact => serde_json::to_string(&pair),
        };
        encoded.map_err(|e| Diagnostic::MalformedCatalog {
            reason: e.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.iter().find(|record| record.id == id)
    }

    pub fn position(&self, id: RecordId) -> Option<usize> {
        self.records.iter().position(|record| record.id == id)
    }

    /// Records matching `query`, in catalog order
    pub fn find(&self, query: &RecordQuery) -> Vec<&Record> {
        self.records
            .iter()
            .filter(|record| query.matches(record, &self.header))
            .collect()
    }

    pub fn exists(&self, query: &RecordQuery) -> bool {
        self.records
            .iter()
            .any(|record| query.matches(record, &self.header))
    }

    /// One past the largest id in use
    pub fn next_id(&self) -> RecordId {
        self.records.iter().map(|record| record.id).max().unwrap_or(0) + 1
    }

    fn others(&self, id: RecordId) -> impl Iterator<Item = &Record> {
        self.records.iter().filter(move |record| record.id != id)
    }

    // =========================================================================
    // Planning
    // =========================================================================

    /// Stamp `date_created` on a draft and validate it against the catalog
    pub fn plan_add(
        &self,
        draft: RecordDraft,
        policy: DuplicatePolicy,
        validator: &Validator,
    ) -> Result<PlannedChange> {
        let id = draft.id;
        let exists = self.position(id).is_some();
        if exists {
            match policy {
                DuplicatePolicy::Reject => return Err(Diagnostic::DuplicateId { id }),
                DuplicatePolicy::Ignore => return Ok(PlannedChange::Unchanged(id)),
                DuplicatePolicy::Overwrite => {}
            }
        }

        let record = draft.into_record(self.header.now_stamp()?);
        validator.collective_check(&record, self.others(id), &self.header)?;
        debug!(id, overwrite = exists, "planned add");
        Ok(if exists {
            PlannedChange::Replace(record)
        } else {
            PlannedChange::Insert(record)
        })
    }

    /// Apply `patch` to a copy of record `id`, stamp `date_changed` and validate
    pub fn plan_change(
        &self,
        id: RecordId,
        patch: &RecordPatch,
        validator: &Validator,
    ) -> Result<PlannedChange> {
        let current = self.get(id).ok_or(Diagnostic::UnknownRecord { id })?;
        if patch.is_empty() {
            return Ok(PlannedChange::Unchanged(id));
        }

        let mut changed = current.clone();
        patch.apply_to(&mut changed);
        changed.date_changed = Some(self.header.now_stamp()?);
        validator.collective_check(&changed, self.others(id), &self.header)?;
        debug!(id, "planned change");
        Ok(PlannedChange::Replace(changed))
    }

    /// Removal needs no validation beyond the record existing
    pub fn plan_delete(&self, id: RecordId) -> Result<PlannedChange> {
        self.position(id).ok_or(Diagnostic::UnknownRecord { id })?;
        Ok(PlannedChange::Remove(id))
    }

    // =========================================================================
    // Committing
    // =========================================================================

    /// Commit a planned change after re-validating it against the current records
    pub fn apply(&mut self, change: PlannedChange, validator: &Validator) -> Result<()> {
        match change {
            PlannedChange::Insert(record) => {
                if self.position(record.id).is_some() {
                    return Err(Diagnostic::DuplicateId { id: record.id });
                }
                validator.collective_check(&record, &self.records, &self.header)?;
                info!(id = record.id, name = %record.name, "record added");
                self.records.push(record);
            }
            PlannedChange::Replace(record) => {
                let index = self
                    .position(record.id)
                    .ok_or(Diagnostic::UnknownRecord { id: record.id })?;
                validator.collective_check(&record, self.others(record.id), &self.header)?;
                info!(id = record.id, "record replaced");
                self.records[index] = record;
            }
            PlannedChange::Remove(id) => {
                let index = self.position(id).ok_or(Diagnostic::UnknownRecord { id })?;
                self.records.remove(index);
                info!(id, "record deleted");
            }
            PlannedChange::Unchanged(_) => {}
        }
        Ok(())
    }

    /// Plan and commit an add
    pub fn add(
        &mut self,
        draft: RecordDraft,
        policy: DuplicatePolicy,
        validator: &Validator,
    ) -> Result<PlannedChange> {
        let change = self.plan_add(draft, policy, validator)?;
        self.apply(change.clone(), validator)?;
        Ok(change)
    }

    /// Plan and commit a change
    pub fn change(
        &mut self,
        id: RecordId,
        patch: &RecordPatch,
        validator: &Validator,
    ) -> Result<PlannedChange> {
        let change = self.plan_change(id, patch, validator)?;
        self.apply(change.clone(), validator)?;
        Ok(change)
    }

    /// Plan and commit a delete
    pub fn delete(&mut self, id: RecordId, validator: &Validator) -> Result<PlannedChange> {
        let change = self.plan_delete(id)?;
        self.apply(change.clone(), validator)?;
        Ok(change)
    }
}
