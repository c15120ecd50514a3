//! Numeric attribute lifecycle: add, rename, merge, re-base, re-family, delete

use std::collections::{BTreeMap, BTreeSet};

use tracing::info;

use crate::catalog::Catalog;
use crate::error::{Diagnostic, Result};
use crate::record::RecordId;
use crate::units::{reroot, UnitRegistry};
use crate::validate::Validator;

/// A structural change to one numeric attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeOp {
    /// Declare a new attribute on a base unit
    Add { attribute: String, base_unit: String },
    /// Rename the attribute everywhere
    Rename { attribute: String, to: String },
    /// Fold `attribute` into `into`, unioning record values
    Merge { attribute: String, into: String },
    /// Make `unit` the centre of the attribute's unit family
    ChangeBaseUnit { attribute: String, unit: String },
    /// Move the attribute to the family of `unit`, dropping record values
    ChangeUnitFamily { attribute: String, unit: String },
    /// Remove the attribute from the header and every record
    Delete { attribute: String },
}

impl AttributeOp {
    /// The attribute the operation is about
    pub fn attribute(&self) -> &str {
        match self {
            Self::Add { attribute, .. }
            | Self::Rename { attribute, .. }
            | Self::Merge { attribute, .. }
            | Self::ChangeBaseUnit { attribute, .. }
            | Self::ChangeUnitFamily { attribute, .. }
            | Self::Delete { attribute } => attribute,
        }
    }
}

/// Validated effect of an [`AttributeOp`] on the current catalog
#[derive(Debug, Clone, PartialEq)]
pub struct AttributePlan {
    pub op: AttributeOp,
    /// Records whose attributes will be rewritten
    pub affected: BTreeSet<RecordId>,
    /// Attribute -> base unit it will be declared on afterwards
    pub retargeted: BTreeMap<String, String>,
}

impl Catalog {
    /// Ids of records that hold a value for `attribute`
    pub fn records_with_attribute(&self, attribute: &str) -> BTreeSet<RecordId> {
        self.records
            .iter()
            .filter(|record| record.numeric_attributes.contains_key(attribute))
            .map(|record| record.id)
            .collect()
    }

    fn declared_base(&self, attribute: &str) -> Result<&str> {
        self.header
            .numeric_attributes
            .get(attribute)
            .map(String::as_str)
            .ok_or_else(|| Diagnostic::UnknownAttribute {
                attribute: attribute.to_string(),
            })
    }

    fn ensure_new_attribute(&self, name: &str) -> Result<()> {
        if name.trim().is_empty() {
            return Err(Diagnostic::EmptyAttributeName);
        }
        if self.header.numeric_attributes.contains_key(name) {
            return Err(Diagnostic::AttributeExists {
                attribute: name.to_string(),
            });
        }
        Ok(())
    }

    /// Check preconditions of `op` and compute what it would touch
    pub fn plan_attribute(&self, op: AttributeOp) -> Result<AttributePlan> {
        let units = self.header.units()?;
        let mut affected = BTreeSet::new();
        let mut retargeted = BTreeMap::new();

        match &op {
            AttributeOp::Add {
                attribute,
                base_unit,
            } => {
                self.ensure_new_attribute(attribute)?;
                ensure_base(&units, attribute, base_unit)?;
                retargeted.insert(attribute.clone(), base_unit.clone());
            }
            AttributeOp::Rename { attribute, to } => {
                self.declared_base(attribute)?;
                self.ensure_new_attribute(to)?;
                affected = self.records_with_attribute(attribute);
            }
            AttributeOp::Merge { attribute, into } => {
                let from_base = self.declared_base(attribute)?;
                let into_base = self.declared_base(into)?;
                if attribute == into {
                    return Err(Diagnostic::SelfMerge {
                        attribute: attribute.clone(),
                    });
                }
                if !units.same_family(from_base, into_base) {
                    return Err(Diagnostic::MergeAcrossFamilies {
                        attribute: attribute.clone(),
                        into: into.clone(),
                        from: from_base.to_string(),
                        to: into_base.to_string(),
                    });
                }
                affected = self.records_with_attribute(attribute);
            }
            AttributeOp::ChangeBaseUnit { attribute, unit } => {
                let old_base = self.declared_base(attribute)?;
                ensure_known(&units, unit)?;
                if !units.same_family(old_base, unit) {
                    return Err(Diagnostic::IncompatibleUnits {
                        from: old_base.to_string(),
                        to: unit.clone(),
                    });
                }
                if old_base != unit.as_str() {
                    // Every attribute sharing the star follows its new centre.
                    for (other, base) in &self.header.numeric_attributes {
                        if base == old_base {
                            retargeted.insert(other.clone(), unit.clone());
                        }
                    }
                }
            }
            AttributeOp::ChangeUnitFamily { attribute, unit } => {
                let old_base = self.declared_base(attribute)?;
                ensure_known(&units, unit)?;
                if units.same_family(old_base, unit) {
                    return Err(Diagnostic::SameUnitFamily {
                        attribute: attribute.clone(),
                        unit: unit.clone(),
                    });
                }
                let new_base = units.base_of(unit).ok_or_else(|| Diagnostic::UnknownUnit {
                    unit: unit.clone(),
                })?;
                retargeted.insert(attribute.clone(), new_base.to_string());
                affected = self.records_with_attribute(attribute);
            }
            AttributeOp::Delete { attribute } => {
                self.declared_base(attribute)?;
                affected = self.records_with_attribute(attribute);
            }
        }

        Ok(AttributePlan {
            op,
            affected,
            retargeted,
        })
    }

    /// Commit an attribute operation
    ///
    /// The plan is recomputed against the current catalog, applied to a
    /// staged copy, and the copy is validated before it replaces `self`.
    /// Affected records get a fresh `date_changed`.
    pub fn apply_attribute(
        &mut self,
        plan: &AttributePlan,
        validator: &Validator,
    ) -> Result<AttributePlan> {
        let plan = self.plan_attribute(plan.op.clone())?;
        let mut staged = self.clone();
        let stamp = staged.header.now_stamp()?;

        match &plan.op {
            AttributeOp::Add { .. } => {}
            AttributeOp::Rename { attribute, to } => {
                if let Some(base) = staged.header.numeric_attributes.remove(attribute) {
                    staged.header.numeric_attributes.insert(to.clone(), base);
                }
                for record in &mut staged.records {
                    if let Some(values) = record.numeric_attributes.remove(attribute) {
                        record.numeric_attributes.insert(to.clone(), values);
                    }
                }
            }
            AttributeOp::Merge { attribute, into } => {
                staged.header.numeric_attributes.remove(attribute);
                for record in &mut staged.records {
                    let Some(values) = record.numeric_attributes.remove(attribute) else {
                        continue;
                    };
                    let target = record.numeric_attributes.entry(into.clone()).or_default();
                    for (unit, list) in values {
                        let merged = target.entry(unit).or_default();
                        for value in list {
                            if !merged.contains(&value) {
                                merged.push(value);
                            }
                        }
                    }
                }
            }
            AttributeOp::ChangeBaseUnit { unit, .. } => {
                if !plan.retargeted.is_empty() {
                    staged.header.unit_conversions = reroot(&staged.header.unit_conversions, unit)?;
                }
            }
            AttributeOp::ChangeUnitFamily { attribute, .. }
            | AttributeOp::Delete { attribute } => {
                if matches!(plan.op, AttributeOp::Delete { .. }) {
                    staged.header.numeric_attributes.remove(attribute);
                }
                for record in &mut staged.records {
                    record.numeric_attributes.remove(attribute);
                }
            }
        }

        for (attribute, base) in &plan.retargeted {
            staged
                .header
                .numeric_attributes
                .insert(attribute.clone(), base.clone());
        }
        for record in &mut staged.records {
            if plan.affected.contains(&record.id) {
                record.date_changed = Some(stamp.clone());
            }
        }

        validator.catalog_check(&staged)?;
        *self = staged;
        info!(
            op = ?plan.op,
            affected = plan.affected.len(),
            "attribute operation committed"
        );
        Ok(plan)
    }
}

fn ensure_known(units: &UnitRegistry, unit: &str) -> Result<()> {
    if !units.is_known(unit) {
        return Err(Diagnostic::UnknownUnit {
            unit: unit.to_string(),
        });
    }
    Ok(())
}

fn ensure_base(units: &UnitRegistry, attribute: &str, unit: &str) -> Result<()> {
    ensure_known(units, unit)?;
    if !units.is_base(unit) {
        return Err(Diagnostic::NotABaseUnit {
            attribute: attribute.to_string(),
            unit: unit.to_string(),
        });
    }
    Ok(())
}
