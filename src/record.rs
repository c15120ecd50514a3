//! Record types: one physical container per record

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Diagnostic, Result};
use crate::units::UnitRegistry;

/// Identity of a record
pub type RecordId = u64;

/// Axis name -> integer coordinate
pub type Location = BTreeMap<String, i64>;

/// Unit symbol -> values stored in that unit
pub type NumericValues = BTreeMap<String, Vec<f64>>;

/// Fields a record may never receive through a patch
pub const PROTECTED_FIELDS: [&str; 3] = ["id", "date_created", "date_changed"];

/// A stored container
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Record {
    pub id: RecordId,
    pub storage_unit: String,
    pub container_type: String,
    pub location: Location,
    pub name: String,
    pub description: String,
    pub contents: Vec<String>,
    pub tags: Vec<String>,
    pub image_paths: Vec<String>,
    pub numeric_attributes: BTreeMap<String, NumericValues>,
    pub categorical_attributes: BTreeMap<String, Vec<String>>,
    pub asset_folder_path: Option<PathBuf>,
    pub date_created: String,
    pub date_changed: Option<String>,
}

impl Record {
    /// Parse a record from loosely-typed JSON
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Diagnostic::MalformedRecord {
            reason: e.to_string(),
        })
    }

    /// Every stored value of `attribute`, expressed in `unit`
    pub fn values_in(&self, attribute: &str, unit: &str, units: &UnitRegistry) -> Result<Vec<f64>> {
        let stored = self
            .numeric_attributes
            .get(attribute)
            .ok_or_else(|| Diagnostic::UnknownAttribute {
                attribute: attribute.to_string(),
            })?;
        let mut values = Vec::new();
        for (from, list) in stored {
            for value in list {
                values.push(units.convert(*value, from, unit)?);
            }
        }
        Ok(values)
    }
}

/// A record before the catalog has stamped its dates
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordDraft {
    pub id: RecordId,
    pub storage_unit: String,
    pub container_type: String,
    pub location: Location,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub contents: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub image_paths: Vec<String>,
    #[serde(default)]
    pub numeric_attributes: BTreeMap<String, NumericValues>,
    #[serde(default)]
    pub categorical_attributes: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub asset_folder_path: Option<PathBuf>,
}

impl RecordDraft {
    pub fn new(
        id: RecordId,
        name: impl Into<String>,
        storage_unit: impl Into<String>,
        container_type: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            storage_unit: storage_unit.into(),
            container_type: container_type.into(),
            ..Self::default()
        }
    }

    /// Parse a draft from JSON, rejecting caller-supplied dates
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        reject_protected(&value, &["date_created", "date_changed"])?;
        serde_json::from_value(value).map_err(|e| Diagnostic::MalformedRecord {
            reason: e.to_string(),
        })
    }

    pub fn at<'a>(mut self, location: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        self.location = location
            .into_iter()
            .map(|(axis, value)| (axis.to_string(), value))
            .collect();
        self
    }

    pub fn with_numeric(
        mut self,
        attribute: impl Into<String>,
        unit: impl Into<String>,
        values: impl IntoIterator<Item = f64>,
    ) -> Self {
        self.numeric_attributes
            .entry(attribute.into())
            .or_default()
            .insert(unit.into(), values.into_iter().collect());
        self
    }

    pub fn with_contents<S: Into<String>>(mut self, contents: impl IntoIterator<Item = S>) -> Self {
        self.contents = contents.into_iter().map(Into::into).collect();
        self
    }

    /// Turn the draft into a record created at `date_created`
    pub fn into_record(self, date_created: String) -> Record {
        Record {
            id: self.id,
            storage_unit: self.storage_unit,
            container_type: self.container_type,
            location: self.location,
            name: self.name,
            description: self.description,
            contents: self.contents,
            tags: self.tags,
            image_paths: self.image_paths,
            numeric_attributes: self.numeric_attributes,
            categorical_attributes: self.categorical_attributes,
            asset_folder_path: self.asset_folder_path,
            date_created,
            date_changed: None,
        }
    }
}

/// A partial update; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordPatch {
    pub storage_unit: Option<String>,
    pub container_type: Option<String>,
    pub location: Option<Location>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub contents: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub image_paths: Option<Vec<String>>,
    pub numeric_attributes: Option<BTreeMap<String, NumericValues>>,
    pub categorical_attributes: Option<BTreeMap<String, Vec<String>>>,
    /// `Some(None)` clears the folder
    #[serde(default, deserialize_with = "present")]
    pub asset_folder_path: Option<Option<PathBuf>>,
}

fn present<'de, D>(deserializer: D) -> std::result::Result<Option<Option<PathBuf>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<PathBuf>::deserialize(deserializer).map(Some)
}

fn reject_protected(value: &serde_json::Value, fields: &[&str]) -> Result<()> {
    if let Some(object) = value.as_object() {
        if let Some(field) = fields.iter().find(|field| object.contains_key(**field)) {
            return Err(Diagnostic::ProtectedField {
                field: field.to_string(),
            });
        }
    }
    Ok(())
}

impl RecordPatch {
    /// Parse a patch from JSON; `id` and the two dates are refused
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        reject_protected(&value, &PROTECTED_FIELDS)?;
        serde_json::from_value(value).map_err(|e| Diagnostic::MalformedRecord {
            reason: e.to_string(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Copy every set field onto `record`
    pub fn apply_to(&self, record: &mut Record) {
        macro_rules! overwrite {
            ($($field:ident),*) => {
                $(if let Some(value) = &self.$field {
                    record.$field = value.clone();
                })*
            };
        }
        overwrite!(
            storage_unit,
            container_type,
            location,
            name,
            description,
            contents,
            tags,
            image_paths,
            numeric_attributes,
            categorical_attributes,
            asset_folder_path
        );
    }
}
