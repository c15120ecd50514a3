//! Unit conversion engine
//!
//! Units form a forest of stars: every base unit is the centre of a star and
//! its sub-units are the leaves. Each edge carries an affine transform that
//! turns a sub-unit value into a base value (multiply/divide first, then
//! add/subtract). Converting between two leaves always goes through the base.
//!
//! ```text
//! bar ──{"*": 0.0689476}── psi
//!  └───{"*": 0.001}─────── mbar
//! K ───{"+": 273.15}────── °C
//! ```

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Diagnostic, Result};

/// Conversion graph as stored in the header: base unit -> sub-unit -> descriptor
pub type UnitConversions = BTreeMap<String, BTreeMap<String, TransformDescriptor>>;

// =============================================================================
// Transform
// =============================================================================

/// Affine map from a sub-unit value to its base value
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Transform {
    Identity,
    Additive(f64),
    Multiplicative(f64),
    Both { factor: f64, offset: f64 },
}

impl Transform {
    /// Build the simplest transform for `value * factor + offset`
    pub fn from_affine(factor: f64, offset: f64) -> Self {
        match (factor == 1.0, offset == 0.0) {
            (true, true) => Self::Identity,
            (true, false) => Self::Additive(offset),
            (false, true) => Self::Multiplicative(factor),
            (false, false) => Self::Both { factor, offset },
        }
    }

    /// `(factor, offset)` such that `base = value * factor + offset`
    pub fn affine(self) -> (f64, f64) {
        match self {
            Self::Identity => (1.0, 0.0),
            Self::Additive(offset) => (1.0, offset),
            Self::Multiplicative(factor) => (factor, 0.0),
            Self::Both { factor, offset } => (factor, offset),
        }
    }

    /// Sub-unit value to base value
    pub fn to_base(self, value: f64) -> f64 {
        let (factor, offset) = self.affine();
        value * factor + offset
    }

    /// Base value to sub-unit value
    pub fn from_base(self, value: f64) -> f64 {
        let (factor, offset) = self.affine();
        (value - offset) / factor
    }

    /// The transform mapping base values back to sub-unit values
    pub fn inverse(self) -> Self {
        let (factor, offset) = self.affine();
        Self::from_affine(1.0 / factor, -offset / factor)
    }

    /// Apply `self` first, then `next`
    pub fn then(self, next: Transform) -> Self {
        let (a, b) = self.affine();
        let (c, d) = next.affine();
        Self::from_affine(a * c, b * c + d)
    }
}

// =============================================================================
// Transform Descriptor (wire form)
// =============================================================================

/// Stored form of a transform: at most one of `+`/`-` and one of `*`/`/`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransformDescriptor {
    #[serde(rename = "+", default, skip_serializing_if = "Option::is_none")]
    pub add: Option<f64>,
    #[serde(rename = "-", default, skip_serializing_if = "Option::is_none")]
    pub subtract: Option<f64>,
    #[serde(rename = "*", default, skip_serializing_if = "Option::is_none")]
    pub multiply: Option<f64>,
    #[serde(rename = "/", default, skip_serializing_if = "Option::is_none")]
    pub divide: Option<f64>,
}

impl TransformDescriptor {
    pub fn multiply(factor: f64) -> Self {
        Self {
            multiply: Some(factor),
            ..Self::default()
        }
    }

    pub fn divide(divisor: f64) -> Self {
        Self {
            divide: Some(divisor),
            ..Self::default()
        }
    }

    pub fn add(offset: f64) -> Self {
        Self {
            add: Some(offset),
            ..Self::default()
        }
    }

    pub fn subtract(offset: f64) -> Self {
        Self {
            subtract: Some(offset),
            ..Self::default()
        }
    }

    /// Validate and convert into a [`Transform`]
    ///
    /// Returns the reason as a plain string; the caller knows which edge it
    /// belongs to.
    pub fn to_transform(&self) -> std::result::Result<Transform, String> {
        let terms = [self.add, self.subtract, self.multiply, self.divide];
        if terms.iter().all(Option::is_none) {
            return Err("descriptor declares no operation".to_string());
        }
        if terms.iter().flatten().any(|term| !term.is_finite()) {
            return Err("descriptor terms must be finite numbers".to_string());
        }

        let offset = match (self.add, self.subtract) {
            (Some(_), Some(_)) => return Err("both \"+\" and \"-\" declared".to_string()),
            (Some(add), None) => add,
            (None, Some(sub)) => -sub,
            (None, None) => 0.0,
        };
        let factor = match (self.multiply, self.divide) {
            (Some(_), Some(_)) => return Err("both \"*\" and \"/\" declared".to_string()),
            (Some(term), None) | (None, Some(term)) if term == 0.0 => {
                return Err("multiplicative term cannot be zero".to_string())
            }
            (Some(mul), None) => mul,
            (None, Some(div)) => 1.0 / div,
            (None, None) => 1.0,
        };

        let mut transform = Transform::from_affine(factor, offset);
        if transform == Transform::Identity {
            // An explicit `{"*": 1}` is a legal alias, not a missing descriptor.
            transform = Transform::Multiplicative(1.0);
        }
        Ok(transform)
    }

    /// Describe `transform` with the fewest operators
    pub fn from_transform(transform: Transform) -> Self {
        let (factor, offset) = transform.affine();
        let mut descriptor = Self::default();
        if factor != 1.0 || offset == 0.0 {
            descriptor.multiply = Some(factor);
        }
        if offset > 0.0 {
            descriptor.add = Some(offset);
        } else if offset < 0.0 {
            descriptor.subtract = Some(-offset);
        }
        descriptor
    }
}

// =============================================================================
// Quantity
// =============================================================================

/// A number paired with a unit symbol, e.g. `"100psi"` or `"6.5 bar"`
#[derive(Debug, Clone, PartialEq)]
pub struct Quantity {
    pub value: f64,
    pub unit: String,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.value, self.unit)
    }
}

/// Split `"<number><optional separator><unit>"` without checking the unit
pub fn split_quantity(input: &str) -> Result<(f64, &str)> {
    let unparsable = || Diagnostic::UnparsableQuantity {
        input: input.to_string(),
    };
    let trimmed = input.trim();

    // The leading numeral may start with a sign.
    let split = trimmed
        .char_indices()
        .skip(1)
        .find(|(_, c)| !(c.is_ascii_digit() || *c == '.' || *c == '-'))
        .map(|(i, _)| i)
        .ok_or_else(unparsable)?;

    let (number, rest) = trimmed.split_at(split);
    let value: f64 = number.parse().map_err(|_| unparsable())?;
    let unit = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '_');
    if unit.is_empty() {
        return Err(unparsable());
    }
    Ok((value, unit))
}

// =============================================================================
// Unit Registry
// =============================================================================

/// Validated, queryable view of the conversion forest
#[derive(Debug, Clone, Default)]
pub struct UnitRegistry {
    stars: BTreeMap<String, BTreeMap<String, Transform>>,
    owners: HashMap<String, String>,
}

impl UnitRegistry {
    /// Build the registry, rejecting anything that is not a forest of stars
    pub fn from_conversions(conversions: &UnitConversions) -> Result<Self> {
        let mut stars = BTreeMap::new();
        let mut owners: HashMap<String, String> = HashMap::new();

        for (base, subs) in conversions {
            let mut star = BTreeMap::new();
            for (unit, descriptor) in subs {
                if unit == base || conversions.contains_key(unit) {
                    return Err(Diagnostic::SubUnitShadowsBase {
                        unit: unit.clone(),
                        base: base.clone(),
                    });
                }
                if let Some(first) = owners.get(unit) {
                    return Err(Diagnostic::DuplicateSubUnit {
                        unit: unit.clone(),
                        first_base: first.clone(),
                        second_base: base.clone(),
                    });
                }
                let transform = descriptor.to_transform().map_err(|reason| {
                    Diagnostic::InvalidTransform {
                        base: base.clone(),
                        unit: unit.clone(),
                        reason,
                    }
                })?;
                owners.insert(unit.clone(), base.clone());
                star.insert(unit.clone(), transform);
            }
            stars.insert(base.clone(), star);
        }

        Ok(Self { stars, owners })
    }

    pub fn is_known(&self, unit: &str) -> bool {
        self.is_base(unit) || self.owners.contains_key(unit)
    }

    pub fn is_base(&self, unit: &str) -> bool {
        self.stars.contains_key(unit)
    }

    /// All base units, sorted
    pub fn base_units(&self) -> impl Iterator<Item = &str> {
        self.stars.keys().map(String::as_str)
    }

    /// Centre of the star `unit` belongs to
    pub fn base_of(&self, unit: &str) -> Option<&str> {
        if let Some((base, _)) = self.stars.get_key_value(unit) {
            return Some(base.as_str());
        }
        self.owners.get(unit).map(String::as_str)
    }

    /// Whether two units can be converted into each other
    pub fn same_family(&self, a: &str, b: &str) -> bool {
        match (self.base_of(a), self.base_of(b)) {
            (Some(x), Some(y)) => x == y,
            _ => false,
        }
    }

    fn transform(&self, unit: &str) -> Result<Transform> {
        if self.is_base(unit) {
            return Ok(Transform::Identity);
        }
        self.owners
            .get(unit)
            .and_then(|base| self.stars.get(base))
            .and_then(|star| star.get(unit))
            .copied()
            .ok_or_else(|| Diagnostic::UnknownUnit {
                unit: unit.to_string(),
            })
    }

    /// Express `value` of `unit` in its base unit
    pub fn to_base(&self, value: f64, unit: &str) -> Result<(f64, &str)> {
        let transform = self.transform(unit)?;
        let base = self.base_of(unit).ok_or_else(|| Diagnostic::UnknownUnit {
            unit: unit.to_string(),
        })?;
        Ok((transform.to_base(value), base))
    }

    /// Express a base value in `target`
    pub fn from_base(&self, base_value: f64, target: &str) -> Result<f64> {
        Ok(self.transform(target)?.from_base(base_value))
    }

    /// Convert `value` from one unit of a star to another
    pub fn convert(&self, value: f64, from: &str, to: &str) -> Result<f64> {
        let (base_value, base) = self.to_base(value, from)?;
        if !self.is_known(to) {
            return Err(Diagnostic::UnknownUnit {
                unit: to.to_string(),
            });
        }
        if self.base_of(to) != Some(base) {
            return Err(Diagnostic::IncompatibleUnits {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.from_base(base_value, to)
    }

    /// Parse `"<number><unit>"`, checking that the unit exists
    pub fn parse_quantity(&self, input: &str) -> Result<Quantity> {
        let (value, unit) = split_quantity(input)?;
        if !self.is_known(unit) {
            return Err(Diagnostic::UnknownUnit {
                unit: unit.to_string(),
            });
        }
        Ok(Quantity {
            value,
            unit: unit.to_string(),
        })
    }

    /// Convert a quantity string such as `"100psi"` into `target`
    pub fn convert_quantity(&self, input: &str, target: &str) -> Result<f64> {
        let quantity = self.parse_quantity(input)?;
        self.convert(quantity.value, &quantity.unit, target)
    }

    /// Every unit in the same star as `unit`
    pub fn compatible_units(&self, unit: &str, include_self: bool) -> Result<BTreeSet<String>> {
        let base = self.base_of(unit).ok_or_else(|| Diagnostic::UnknownUnit {
            unit: unit.to_string(),
        })?;
        let mut units: BTreeSet<String> = std::iter::once(base.to_string())
            .chain(self.stars[base].keys().cloned())
            .collect();
        if !include_self {
            units.remove(unit);
        }
        Ok(units)
    }

    /// Sub-units hanging off `base`
    pub fn sub_units(&self, base: &str) -> impl Iterator<Item = &str> {
        self.stars
            .get(base)
            .into_iter()
            .flat_map(|star| star.keys().map(String::as_str))
    }
}

/// Recompute the star containing `new_base` so that `new_base` becomes its centre
///
/// Every other unit of the family keeps its meaning; only the descriptors
/// change. Stars of other families are copied untouched.
pub fn reroot(conversions: &UnitConversions, new_base: &str) -> Result<UnitConversions> {
    let registry = UnitRegistry::from_conversions(conversions)?;
    let old_base = registry
        .base_of(new_base)
        .ok_or_else(|| Diagnostic::UnknownUnit {
            unit: new_base.to_string(),
        })?
        .to_string();
    if old_base == new_base {
        return Ok(conversions.clone());
    }

    // new_base -> old base, inverted: old base values into new_base values.
    let to_new = registry.transform(new_base)?.inverse();

    let mut star = BTreeMap::new();
    star.insert(
        old_base.clone(),
        TransformDescriptor::from_transform(to_new),
    );
    for unit in registry.sub_units(&old_base) {
        if unit == new_base {
            continue;
        }
        let composed = registry.transform(unit)?.then(to_new);
        star.insert(
            unit.to_string(),
            TransformDescriptor::from_transform(composed),
        );
    }

    let mut rerooted = conversions.clone();
    rerooted.remove(&old_base);
    rerooted.insert(new_base.to_string(), star);
    Ok(rerooted)
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn pressure() -> UnitConversions {
        let mut conversions = UnitConversions::new();
        conversions.insert(
            "bar".into(),
            [
                ("psi".to_string(), TransformDescriptor::multiply(0.0689476)),
                ("mbar".to_string(), TransformDescriptor::divide(1000.0)),
            ]
            .into_iter()
            .collect(),
        );
        conversions.insert(
            "K".into(),
            [("C".to_string(), TransformDescriptor::add(273.15))]
                .into_iter()
                .collect(),
        );
        conversions.insert("V".into(), BTreeMap::new());
        conversions
    }

    #[test]
    fn test_psi_to_bar_and_back() {
        let units = UnitRegistry::from_conversions(&pressure()).unwrap();
        let bar = units.convert_quantity("100psi", "bar").unwrap();
        assert!((bar - 6.89476).abs() < 1e-6);
        let psi = units.convert_quantity("6.89476bar", "psi").unwrap();
        assert!((psi - 100.0).abs() < 1e-6);
    }

    #[test]
    fn test_leaf_to_leaf_goes_through_base() {
        let units = UnitRegistry::from_conversions(&pressure()).unwrap();
        let mbar = units.convert(1.0, "psi", "mbar").unwrap();
        assert!((mbar - 68.9476).abs() < 1e-6);
    }

    #[test]
    fn test_round_trip_through_base() {
        let units = UnitRegistry::from_conversions(&pressure()).unwrap();
        for (value, unit) in [(12.5, "psi"), (-40.0, "C"), (3.0, "mbar"), (7.0, "bar")] {
            let base = units.base_of(unit).unwrap().to_string();
            let there = units.convert(value, unit, &base).unwrap();
            let back = units.convert(there, &base, unit).unwrap();
            assert!((back - value).abs() < EPS, "{unit}: {back} != {value}");
        }
    }

    #[test]
    fn test_offset_units() {
        let units = UnitRegistry::from_conversions(&pressure()).unwrap();
        let (kelvin, base) = units.to_base(25.0, "C").unwrap();
        assert_eq!(base, "K");
        assert!((kelvin - 298.15).abs() < EPS);
    }

    #[test]
    fn test_cross_family_rejected() {
        let units = UnitRegistry::from_conversions(&pressure()).unwrap();
        let err = units.convert(1.0, "psi", "K").unwrap_err();
        assert_eq!(err.code(), "E070");
        let err = units.convert(1.0, "psi", "furlong").unwrap_err();
        assert_eq!(err.code(), "E024");
    }

    #[test]
    fn test_compatible_units() {
        let units = UnitRegistry::from_conversions(&pressure()).unwrap();
        let all = units.compatible_units("psi", true).unwrap();
        assert_eq!(
            all.into_iter().collect::<Vec<_>>(),
            vec!["bar", "mbar", "psi"]
        );
        let others = units.compatible_units("bar", false).unwrap();
        assert!(!others.contains("bar"));
        assert_eq!(others.len(), 2);
        assert!(units.compatible_units("V", false).unwrap().is_empty());
    }

    #[test]
    fn test_parse_quantity() {
        let units = UnitRegistry::from_conversions(&pressure()).unwrap();
        assert_eq!(
            units.parse_quantity("-3.5 C").unwrap(),
            Quantity {
                value: -3.5,
                unit: "C".into()
            }
        );
        assert_eq!(units.parse_quantity("bar").unwrap_err().code(), "E074");
        assert_eq!(units.parse_quantity("1..2bar").unwrap_err().code(), "E074");
        assert_eq!(units.parse_quantity("12").unwrap_err().code(), "E074");
        assert_eq!(units.parse_quantity("12 hp").unwrap_err().code(), "E024");
    }

    #[test]
    fn test_descriptor_rules() {
        let both_offsets = TransformDescriptor {
            add: Some(1.0),
            subtract: Some(2.0),
            ..TransformDescriptor::default()
        };
        assert!(both_offsets.to_transform().is_err());
        let both_scales = TransformDescriptor {
            multiply: Some(1.0),
            divide: Some(2.0),
            ..TransformDescriptor::default()
        };
        assert!(both_scales.to_transform().is_err());
        assert!(TransformDescriptor::default().to_transform().is_err());
        assert!(TransformDescriptor::divide(0.0).to_transform().is_err());

        let both = TransformDescriptor {
            multiply: Some(2.0),
            subtract: Some(1.0),
            ..TransformDescriptor::default()
        };
        assert_eq!(
            both.to_transform().unwrap(),
            Transform::Both {
                factor: 2.0,
                offset: -1.0
            }
        );
    }

    #[test]
    fn test_forest_rules() {
        let mut chained = pressure();
        chained
            .get_mut("bar")
            .unwrap()
            .insert("K".into(), TransformDescriptor::multiply(2.0));
        assert_eq!(
            UnitRegistry::from_conversions(&chained).unwrap_err().code(),
            "E053"
        );

        let mut own = pressure();
        own.get_mut("bar")
            .unwrap()
            .insert("bar".into(), TransformDescriptor::multiply(2.0));
        assert_eq!(
            UnitRegistry::from_conversions(&own).unwrap_err().code(),
            "E053"
        );

        let mut duplicated = pressure();
        duplicated
            .get_mut("K")
            .unwrap()
            .insert("psi".into(), TransformDescriptor::multiply(2.0));
        assert_eq!(
            UnitRegistry::from_conversions(&duplicated)
                .unwrap_err()
                .code(),
            "E052"
        );
    }

    #[test]
    fn test_reroot_preserves_meaning() {
        let before = UnitRegistry::from_conversions(&pressure()).unwrap();
        let rerooted = reroot(&pressure(), "psi").unwrap();
        let after = UnitRegistry::from_conversions(&rerooted).unwrap();

        assert!(after.is_base("psi"));
        assert!(!after.is_base("bar"));
        assert_eq!(after.base_of("mbar"), Some("psi"));
        for (from, to) in [("psi", "bar"), ("mbar", "psi"), ("bar", "mbar")] {
            let expected = before.convert(42.0, from, to).unwrap();
            let actual = after.convert(42.0, from, to).unwrap();
            assert!((expected - actual).abs() < 1e-6, "{from}->{to}");
        }
        assert_eq!(after.base_of("C"), Some("K"));
    }
}
