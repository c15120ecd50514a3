//! Catalog header: the vocabulary every record is validated against

use std::collections::BTreeMap;
use std::fmt::Write as _;

use chrono::{NaiveDateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, Result};
use crate::units::{TransformDescriptor, UnitConversions, UnitRegistry};

/// Timestamp format used when a header doesn't specify one
pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// Inclusive `[min, max]` range of one storage-unit axis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisRange(pub i64, pub i64);

impl AxisRange {
    pub fn min(&self) -> i64 {
        self.0
    }

    pub fn max(&self) -> i64 {
        self.1
    }

    pub fn contains(&self, value: i64) -> bool {
        self.0 <= value && value <= self.1
    }

    /// Number of integer positions on the axis
    ///
    /// Saturates at `i64::MAX` for ranges wider than an `i64` can count.
    pub fn span(&self) -> i64 {
        self.1
            .checked_sub(self.0)
            .and_then(|width| width.checked_add(1))
            .unwrap_or(i64::MAX)
    }
}

/// Axis name -> range
pub type Axes = BTreeMap<String, AxisRange>;

/// Storage unit -> axis -> container size along that axis
pub type ContainerSizes = BTreeMap<String, BTreeMap<String, i64>>;

/// Catalog header
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Header {
    pub version: Version,
    #[serde(default)]
    pub last_saved: Option<String>,
    pub date_format: String,
    pub storage_units: BTreeMap<String, Axes>,
    pub container_types: BTreeMap<String, ContainerSizes>,
    pub unit_conversions: UnitConversions,
    /// Attribute name -> base unit symbol
    pub numeric_attributes: BTreeMap<String, String>,
}

impl Default for Header {
    fn default() -> Self {
        Self::new(Version::new(1, 0, 0))
    }
}

impl Header {
    /// Create an empty header
    pub fn new(version: Version) -> Self {
        Self {
            version,
            last_saved: None,
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            storage_units: BTreeMap::new(),
            container_types: BTreeMap::new(),
            unit_conversions: UnitConversions::new(),
            numeric_attributes: BTreeMap::new(),
        }
    }

    /// Parse a header from loosely-typed JSON
    pub fn from_value(value: serde_json::Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| Diagnostic::MalformedHeader {
            reason: e.to_string(),
        })
    }

    pub fn with_storage_unit<'a>(
        mut self,
        name: impl Into<String>,
        axes: impl IntoIterator<Item = (&'a str, i64, i64)>,
    ) -> Self {
        let axes = axes
            .into_iter()
            .map(|(axis, min, max)| (axis.to_string(), AxisRange(min, max)))
            .collect();
        self.storage_units.insert(name.into(), axes);
        self
    }

    pub fn with_container_type<'a>(
        mut self,
        name: impl Into<String>,
        storage_unit: impl Into<String>,
        sizes: impl IntoIterator<Item = (&'a str, i64)>,
    ) -> Self {
        let sizes = sizes
            .into_iter()
            .map(|(axis, size)| (axis.to_string(), size))
            .collect();
        self.container_types
            .entry(name.into())
            .or_default()
            .insert(storage_unit.into(), sizes);
        self
    }

    pub fn with_base_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit_conversions.entry(unit.into()).or_default();
        self
    }

    pub fn with_sub_unit(
        mut self,
        base: impl Into<String>,
        unit: impl Into<String>,
        descriptor: TransformDescriptor,
    ) -> Self {
        self.unit_conversions
            .entry(base.into())
            .or_default()
            .insert(unit.into(), descriptor);
        self
    }

    pub fn with_numeric_attribute(
        mut self,
        name: impl Into<String>,
        base_unit: impl Into<String>,
    ) -> Self {
        self.numeric_attributes.insert(name.into(), base_unit.into());
        self
    }

    /// Build the validated unit registry for this header
    pub fn units(&self) -> Result<UnitRegistry> {
        UnitRegistry::from_conversions(&self.unit_conversions)
    }

    /// Size of `container_type` along `axis` when placed in `storage_unit`
    ///
    /// Axes the container type doesn't list have size 1.
    pub fn container_size(&self, container_type: &str, storage_unit: &str, axis: &str) -> i64 {
        self.container_types
            .get(container_type)
            .and_then(|units| units.get(storage_unit))
            .and_then(|sizes| sizes.get(axis))
            .copied()
            .unwrap_or(1)
    }

    /// Whether `container_type` declares it may be stored in `storage_unit`
    pub fn allows(&self, container_type: &str, storage_unit: &str) -> bool {
        self.container_types
            .get(container_type)
            .is_some_and(|units| units.contains_key(storage_unit))
    }

    /// Parse a timestamp under this header's date format
    pub fn parse_timestamp(&self, value: &str) -> Option<NaiveDateTime> {
        NaiveDateTime::parse_from_str(value, &self.date_format).ok()
    }

    /// Format `moment` under this header's date format
    pub fn format_timestamp(&self, moment: NaiveDateTime) -> Result<String> {
        let mut out = String::new();
        // Invalid specifiers surface as a fmt error rather than a panic.
        write!(out, "{}", moment.format(&self.date_format)).map_err(|_| {
            Diagnostic::InvalidDateFormat {
                format: self.date_format.clone(),
                reason: "contains an unknown specifier".to_string(),
            }
        })?;
        Ok(out)
    }

    /// Current UTC time formatted under this header's date format
    pub fn now_stamp(&self) -> Result<String> {
        self.format_timestamp(Utc::now().naive_utc())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_axis_range() {
        let range = AxisRange(1, 5);
        assert!(range.contains(1) && range.contains(5));
        assert!(!range.contains(6));
        assert_eq!(range.span(), 5);
    }

    #[test]
    fn test_container_size_defaults_to_one() {
        let header = Header::default()
            .with_storage_unit("Shelf", [("X", 1, 5), ("Y", 1, 3)])
            .with_container_type("Box", "Shelf", [("X", 2)]);
        assert_eq!(header.container_size("Box", "Shelf", "X"), 2);
        assert_eq!(header.container_size("Box", "Shelf", "Y"), 1);
        assert!(header.allows("Box", "Shelf"));
        assert!(!header.allows("Box", "Drawer"));
    }

    #[test]
    fn test_timestamps_round_trip() {
        let header = Header::default();
        let stamp = header.now_stamp().unwrap();
        assert!(stamp.ends_with('Z'));
        assert!(header.parse_timestamp(&stamp).is_some());
        assert!(header.parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_serialized_shape() {
        let header = Header::default()
            .with_storage_unit("Shelf", [("X", 1, 5)])
            .with_sub_unit("bar", "psi", TransformDescriptor::multiply(0.0689476));
        let value = serde_json::to_value(&header).unwrap();
        assert_eq!(value["storage_units"]["Shelf"]["X"], serde_json::json!([1, 5]));
        assert_eq!(
            value["unit_conversions"]["bar"]["psi"],
            serde_json::json!({"*": 0.0689476})
        );
        assert_eq!(value["version"], "1.0.0");
        assert_eq!(Header::from_value(value).unwrap(), header);
    }

    #[test]
    fn test_unknown_key_is_malformed() {
        let mut value = serde_json::to_value(Header::default()).unwrap();
        value["colour"] = serde_json::json!("blue");
        assert_eq!(Header::from_value(value).unwrap_err().code(), "E002");
    }
}
