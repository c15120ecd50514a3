//! Well-formedness of the catalog header

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use crate::error::{Diagnostic, Result};
use crate::header::Header;
use crate::units::UnitRegistry;

/// Validate the header and return the unit registry it declares
pub(crate) fn check_header(header: &Header) -> Result<UnitRegistry> {
    check_date_format(header)?;

    // 1. Axis ranges
    for (storage_unit, axes) in &header.storage_units {
        for (axis, range) in axes {
            if range.min() > range.max() {
                return Err(Diagnostic::InvalidAxisRange {
                    storage_unit: storage_unit.clone(),
                    axis: axis.clone(),
                    min: range.min(),
                    max: range.max(),
                });
            }
        }
    }

    // 2. Container sizes must fit inside the axes they size
    for (container_type, by_unit) in &header.container_types {
        for (storage_unit, sizes) in by_unit {
            let axes = header.storage_units.get(storage_unit).ok_or_else(|| {
                Diagnostic::UnknownStorageUnit {
                    name: storage_unit.clone(),
                }
            })?;
            for (axis, &size) in sizes {
                let range = axes.get(axis).ok_or_else(|| Diagnostic::UnknownSizeAxis {
                    container_type: container_type.clone(),
                    storage_unit: storage_unit.clone(),
                    axis: axis.clone(),
                })?;
                if size < 1 || size > range.span() {
                    return Err(Diagnostic::InvalidContainerSize {
                        container_type: container_type.clone(),
                        storage_unit: storage_unit.clone(),
                        axis: axis.clone(),
                        size,
                        span: range.span(),
                    });
                }
            }
        }
    }

    // 3. Conversion forest
    let units = header.units()?;

    // 4. Attributes are declared on star centres
    for (attribute, base) in &header.numeric_attributes {
        if attribute.trim().is_empty() {
            return Err(Diagnostic::EmptyAttributeName);
        }
        if !units.is_known(base) {
            return Err(Diagnostic::UnknownUnit { unit: base.clone() });
        }
        if !units.is_base(base) {
            return Err(Diagnostic::NotABaseUnit {
                attribute: attribute.clone(),
                unit: base.clone(),
            });
        }
    }

    debug!(
        storage_units = header.storage_units.len(),
        container_types = header.container_types.len(),
        attributes = header.numeric_attributes.len(),
        "header is well-formed"
    );
    Ok(units)
}

/// The format must render and re-read a timestamp with sub-day precision
fn check_date_format(header: &Header) -> Result<()> {
    let invalid = |reason: &str| Diagnostic::InvalidDateFormat {
        format: header.date_format.clone(),
        reason: reason.to_string(),
    };

    let probe: NaiveDateTime = NaiveDate::from_ymd_opt(2025, 1, 16)
        .and_then(|date| date.and_hms_micro_opt(23, 0, 12, 978_108))
        .ok_or_else(|| invalid("probe timestamp out of range"))?;
    let rendered = header.format_timestamp(probe)?;
    let reparsed = header
        .parse_timestamp(&rendered)
        .ok_or_else(|| invalid("a generated timestamp doesn't parse back"))?;
    if reparsed.date() != probe.date() {
        return Err(invalid("a generated timestamp loses its date"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::units::TransformDescriptor;

    fn header() -> Header {
        Header::default()
            .with_storage_unit("Shelf", [("X", 1, 5), ("Y", 1, 3)])
            .with_container_type("Box", "Shelf", [("X", 2)])
            .with_sub_unit("bar", "psi", TransformDescriptor::multiply(0.0689476))
            .with_numeric_attribute("Pressure", "bar")
    }

    #[test]
    fn test_valid_header() {
        let units = check_header(&header()).unwrap();
        assert!(units.is_base("bar"));
    }

    #[test]
    fn test_inverted_axis() {
        let header = header().with_storage_unit("Drawer", [("X", 4, 2)]);
        assert_eq!(check_header(&header).unwrap_err().code(), "E044");
    }

    #[test]
    fn test_container_larger_than_axis() {
        let header = header().with_container_type("Crate", "Shelf", [("Y", 4)]);
        let err = check_header(&header).unwrap_err();
        assert_eq!(
            err,
            Diagnostic::InvalidContainerSize {
                container_type: "Crate".into(),
                storage_unit: "Shelf".into(),
                axis: "Y".into(),
                size: 4,
                span: 3,
            }
        );
        let header = self::header().with_container_type("Sheet", "Shelf", [("Y", 0)]);
        assert_eq!(check_header(&header).unwrap_err().code(), "E045");
    }

    #[test]
    fn test_full_width_axis() {
        let header = header()
            .with_storage_unit("Rail", [("X", 0, i64::MAX)])
            .with_storage_unit("Wire", [("X", i64::MIN, i64::MAX)])
            .with_container_type("Clip", "Rail", [("X", 2)])
            .with_container_type("Clip", "Wire", [("X", i64::MAX)]);
        check_header(&header).unwrap();
        assert_eq!(header.storage_units["Wire"]["X"].span(), i64::MAX);
    }

    #[test]
    fn test_container_sizing_unknown_axis_or_unit() {
        let header = header().with_container_type("Crate", "Shelf", [("Z", 1)]);
        assert_eq!(check_header(&header).unwrap_err().code(), "E046");
        let header = self::header().with_container_type(
            "Crate",
            "Attic",
            std::iter::empty::<(&str, i64)>(),
        );
        assert_eq!(check_header(&header).unwrap_err().code(), "E020");
    }

    #[test]
    fn test_attribute_on_sub_unit() {
        let header = header().with_numeric_attribute("Tyre pressure", "psi");
        assert_eq!(check_header(&header).unwrap_err().code(), "E072");
        let header = self::header().with_numeric_attribute("Voltage", "V");
        assert_eq!(check_header(&header).unwrap_err().code(), "E024");
    }

    #[test]
    fn test_contradictory_descriptor() {
        let descriptor = TransformDescriptor {
            add: Some(1.0),
            subtract: Some(1.0),
            ..TransformDescriptor::default()
        };
        let header = header().with_sub_unit("bar", "hPa", descriptor);
        assert_eq!(check_header(&header).unwrap_err().code(), "E071");
    }

    #[test]
    fn test_bad_date_formats() {
        let mut header = header();
        header.date_format = "%Y".into();
        assert_eq!(check_header(&header).unwrap_err().code(), "E060");
        header.date_format = "%Q-%Y".into();
        assert_eq!(check_header(&header).unwrap_err().code(), "E060");
        header.date_format = "%d.%m.%Y %H:%M:%S".into();
        check_header(&header).unwrap();
    }
}
