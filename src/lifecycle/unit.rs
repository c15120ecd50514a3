//! Unit maintenance: growing and pruning the conversion forest

use tracing::info;

use crate::catalog::Catalog;
use crate::error::{Diagnostic, Result};
use crate::units::TransformDescriptor;
use crate::validate::Validator;

impl Catalog {
    /// Declare a new family centred on `unit`
    pub fn add_base_unit(&mut self, unit: &str, validator: &Validator) -> Result<()> {
        let units = self.header.units()?;
        if units.is_known(unit) {
            return Err(Diagnostic::UnitExists {
                unit: unit.to_string(),
            });
        }

        let mut staged = self.header.clone();
        staged.unit_conversions.insert(unit.to_string(), Default::default());
        validator.header_check(&staged)?;
        self.header = staged;
        info!(unit, "base unit added");
        Ok(())
    }

    /// Attach `unit` to the star centred on `base`
    pub fn add_sub_unit(
        &mut self,
        base: &str,
        unit: &str,
        descriptor: TransformDescriptor,
        validator: &Validator,
    ) -> Result<()> {
        let units = self.header.units()?;
        if !units.is_base(base) {
            return Err(Diagnostic::UnknownUnit {
                unit: base.to_string(),
            });
        }
        if units.is_known(unit) {
            return Err(Diagnostic::UnitExists {
                unit: unit.to_string(),
            });
        }

        let mut staged = self.header.clone();
        staged
            .unit_conversions
            .entry(base.to_string())
            .or_default()
            .insert(unit.to_string(), descriptor);
        validator.header_check(&staged)?;
        self.header = staged;
        info!(base, unit, "sub-unit added");
        Ok(())
    }

    /// Everything that still refers to `unit`, as human-readable labels
    pub fn unit_users(&self, unit: &str) -> Vec<String> {
        let mut users: Vec<String> = self
            .header
            .numeric_attributes
            .iter()
            .filter(|(_, base)| base.as_str() == unit)
            .map(|(attribute, _)| format!("attribute {attribute}"))
            .collect();
        if let Some(star) = self.header.unit_conversions.get(unit) {
            users.extend(star.keys().map(|sub| format!("sub-unit {sub}")));
        }
        users.extend(
            self.records
                .iter()
                .filter(|record| {
                    record
                        .numeric_attributes
                        .values()
                        .any(|by_unit| by_unit.contains_key(unit))
                })
                .map(|record| format!("record {}", record.id)),
        );
        users
    }

    /// Remove a unit nothing refers to any more
    pub fn remove_unit(&mut self, unit: &str, validator: &Validator) -> Result<()> {
        let units = self.header.units()?;
        let base = units
            .base_of(unit)
            .ok_or_else(|| Diagnostic::UnknownUnit {
                unit: unit.to_string(),
            })?
            .to_string();

        let users = self.unit_users(unit);
        if !users.is_empty() {
            return Err(Diagnostic::UnitInUse {
                unit: unit.to_string(),
                users,
            });
        }

        let mut staged = self.header.clone();
        if base == unit {
            staged.unit_conversions.remove(unit);
        } else if let Some(star) = staged.unit_conversions.get_mut(&base) {
            star.remove(unit);
        }
        validator.header_check(&staged)?;
        self.header = staged;
        info!(unit, "unit removed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DuplicatePolicy;
    use crate::header::Header;
    use crate::record::RecordDraft;

    fn catalog() -> Catalog {
        let header = Header::default()
            .with_storage_unit("Shelf", [("X", 1, 9)])
            .with_container_type("Box", "Shelf", std::iter::empty::<(&str, i64)>())
            .with_sub_unit("V", "mV", TransformDescriptor::divide(1000.0))
            .with_sub_unit("V", "kV", TransformDescriptor::multiply(1000.0))
            .with_numeric_attribute("Voltage", "V");
        let mut catalog = Catalog::new(header);
        catalog
            .add(
                RecordDraft::new(1, "fuses", "Shelf", "Box")
                    .at([("X", 1)])
                    .with_numeric("Voltage", "mV", [500.0]),
                DuplicatePolicy::Reject,
                &Validator::without_assets(),
            )
            .unwrap();
        catalog
    }

    #[test]
    fn test_add_units() {
        let mut catalog = catalog();
        let validator = Validator::without_assets();
        catalog.add_base_unit("K", &validator).unwrap();
        catalog
            .add_sub_unit("K", "C", TransformDescriptor::add(273.15), &validator)
            .unwrap();
        let units = catalog.header.units().unwrap();
        assert!((units.convert(0.0, "C", "K").unwrap() - 273.15).abs() < 1e-9);

        assert_eq!(catalog.add_base_unit("mV", &validator).unwrap_err().code(), "E055");
        let err = catalog
            .add_sub_unit("mV", "uV", TransformDescriptor::divide(1000.0), &validator)
            .unwrap_err();
        assert_eq!(err.code(), "E024");
    }

    #[test]
    fn test_invalid_descriptor_leaves_header_alone() {
        let mut catalog = catalog();
        let before = catalog.header.clone();
        let err = catalog
            .add_sub_unit("V", "MV", TransformDescriptor::default(), &Validator::without_assets())
            .unwrap_err();
        assert_eq!(err.code(), "E071");
        assert_eq!(catalog.header, before);
    }

    #[test]
    fn test_remove_unit() {
        let mut catalog = catalog();
        let validator = Validator::without_assets();

        let err = catalog.remove_unit("mV", &validator).unwrap_err();
        assert_eq!(
            err,
            Diagnostic::UnitInUse {
                unit: "mV".into(),
                users: vec!["record 1".into()],
            }
        );
        let err = catalog.remove_unit("V", &validator).unwrap_err();
        assert_eq!(err.code(), "E075");

        catalog.remove_unit("kV", &validator).unwrap();
        assert!(!catalog.header.units().unwrap().is_known("kV"));
        assert_eq!(catalog.remove_unit("kV", &validator).unwrap_err().code(), "E024");
    }
}
