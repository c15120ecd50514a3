//! Field-level record checks, independent of other records

use std::collections::HashSet;

use chrono::{NaiveDateTime, Utc};

use crate::error::{Diagnostic, Result};
use crate::header::Header;
use crate::record::{NumericValues, Record};
use crate::units::UnitRegistry;

pub(crate) fn check_name(record: &Record) -> Result<()> {
    if record.name.trim().is_empty() {
        return Err(Diagnostic::EmptyName { id: record.id });
    }
    Ok(())
}

pub(crate) fn check_id(record: &Record) -> Result<()> {
    if record.id == 0 {
        return Err(Diagnostic::InvalidId { id: record.id });
    }
    Ok(())
}

pub(crate) fn check_placement_names(record: &Record, header: &Header) -> Result<()> {
    if !header.storage_units.contains_key(&record.storage_unit) {
        return Err(Diagnostic::UnknownStorageUnit {
            name: record.storage_unit.clone(),
        });
    }
    if !header.container_types.contains_key(&record.container_type) {
        return Err(Diagnostic::UnknownContainerType {
            name: record.container_type.clone(),
        });
    }
    if !header.allows(&record.container_type, &record.storage_unit) {
        return Err(Diagnostic::IncompatibleContainer {
            container_type: record.container_type.clone(),
            storage_unit: record.storage_unit.clone(),
        });
    }
    Ok(())
}

/// Non-empty, pairwise-distinct strings
pub(crate) fn check_string_list(field: &str, entries: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    for (index, entry) in entries.iter().enumerate() {
        if entry.trim().is_empty() {
            return Err(Diagnostic::EmptyEntry {
                field: field.to_string(),
                index,
            });
        }
        if !seen.insert(entry.as_str()) {
            return Err(Diagnostic::DuplicateEntry {
                field: field.to_string(),
                value: entry.clone(),
            });
        }
    }
    Ok(())
}

pub(crate) fn check_lists(record: &Record) -> Result<()> {
    check_string_list("contents", &record.contents)?;
    check_string_list("tags", &record.tags)?;
    check_string_list("image_paths", &record.image_paths)
}

pub(crate) fn check_numeric_attributes(
    record: &Record,
    header: &Header,
    units: &UnitRegistry,
) -> Result<()> {
    for (attribute, by_unit) in &record.numeric_attributes {
        let base = header
            .numeric_attributes
            .get(attribute)
            .ok_or_else(|| Diagnostic::UnknownAttribute {
                attribute: attribute.clone(),
            })?;
        check_numeric_values(attribute, base, by_unit, units)?;
    }
    Ok(())
}

fn check_numeric_values(
    attribute: &str,
    base: &str,
    by_unit: &NumericValues,
    units: &UnitRegistry,
) -> Result<()> {
    if by_unit.is_empty() {
        return Err(Diagnostic::EmptyUnitMap {
            attribute: attribute.to_string(),
        });
    }
    for (unit, values) in by_unit {
        if !units.is_known(unit) {
            return Err(Diagnostic::UnknownUnit { unit: unit.clone() });
        }
        if !units.same_family(unit, base) {
            return Err(Diagnostic::UnitOutsideFamily {
                attribute: attribute.to_string(),
                unit: unit.clone(),
                base: base.to_string(),
            });
        }
        if values.is_empty() {
            return Err(Diagnostic::EmptyValueList {
                attribute: attribute.to_string(),
                unit: unit.clone(),
            });
        }
        for (i, value) in values.iter().enumerate() {
            if !value.is_finite() {
                return Err(Diagnostic::NonFiniteValue {
                    attribute: attribute.to_string(),
                    unit: unit.clone(),
                });
            }
            if values[..i].contains(value) {
                return Err(Diagnostic::DuplicateValue {
                    attribute: attribute.to_string(),
                    unit: unit.clone(),
                    value: *value,
                });
            }
        }
    }
    Ok(())
}

pub(crate) fn check_categorical_attributes(record: &Record) -> Result<()> {
    for (attribute, values) in &record.categorical_attributes {
        if values.is_empty() {
            return Err(Diagnostic::EmptyCategoricalList {
                attribute: attribute.clone(),
            });
        }
        check_string_list(&format!("categorical_attributes.{attribute}"), values)?;
    }
    Ok(())
}

pub(crate) fn check_location(record: &Record, header: &Header) -> Result<()> {
    let axes = header
        .storage_units
        .get(&record.storage_unit)
        .ok_or_else(|| Diagnostic::UnknownStorageUnit {
            name: record.storage_unit.clone(),
        })?;

    let missing: Vec<String> = axes
        .keys()
        .filter(|axis| !record.location.contains_key(*axis))
        .cloned()
        .collect();
    let extra: Vec<String> = record
        .location
        .keys()
        .filter(|axis| !axes.contains_key(*axis))
        .cloned()
        .collect();
    if !missing.is_empty() || !extra.is_empty() {
        return Err(Diagnostic::AxisMismatch {
            storage_unit: record.storage_unit.clone(),
            missing,
            extra,
        });
    }

    for (axis, &value) in &record.location {
        let range = axes[axis];
        if !range.contains(value) {
            return Err(Diagnostic::LocationOutOfBounds {
                axis: axis.clone(),
                value,
                min: range.min(),
                max: range.max(),
            });
        }
        let size = header.container_size(&record.container_type, &record.storage_unit, axis);
        let far_corner = value.checked_add(size.saturating_sub(1));
        if !far_corner.is_some_and(|corner| range.contains(corner)) {
            return Err(Diagnostic::ContainerOutOfBounds {
                axis: axis.clone(),
                far_corner: value.saturating_add(size.saturating_sub(1)),
                min: range.min(),
                max: range.max(),
            });
        }
    }
    Ok(())
}

fn parse_date(
    header: &Header,
    field: &str,
    value: &str,
    now: NaiveDateTime,
) -> Result<NaiveDateTime> {
    let parsed = header
        .parse_timestamp(value)
        .ok_or_else(|| Diagnostic::UnparsableDate {
            field: field.to_string(),
            value: value.to_string(),
        })?;
    if parsed > now {
        return Err(Diagnostic::FutureDate {
            field: field.to_string(),
            value: value.to_string(),
        });
    }
    Ok(parsed)
}

pub(crate) fn check_dates(record: &Record, header: &Header) -> Result<()> {
    let now = Utc::now().naive_utc();
    let created = parse_date(header, "date_created", &record.date_created, now)?;
    if let Some(changed_raw) = &record.date_changed {
        let changed = parse_date(header, "date_changed", changed_raw, now)?;
        if changed < created {
            return Err(Diagnostic::ChangedBeforeCreated {
                created: record.date_created.clone(),
                changed: changed_raw.clone(),
            });
        }
    }
    Ok(())
}
