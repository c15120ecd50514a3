//! Axis-aligned bounding boxes of placed containers

use std::collections::BTreeMap;

use crate::header::Header;
use crate::record::Record;

/// Inclusive per-axis extent of a container
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundingBox {
    extents: BTreeMap<String, (i64, i64)>,
}

impl BoundingBox {
    /// Box of `record`: `[location, location + size - 1]` on every axis
    pub fn of(record: &Record, header: &Header) -> Self {
        let extents = record
            .location
            .iter()
            .map(|(axis, &start)| {
                let size =
                    header.container_size(&record.container_type, &record.storage_unit, axis);
                (axis.clone(), (start, start.saturating_add(size.saturating_sub(1))))
            })
            .collect();
        Self { extents }
    }

    pub fn extent(&self, axis: &str) -> Option<(i64, i64)> {
        self.extents.get(axis).copied()
    }

    /// Whether `value` lies within the box on `axis`
    pub fn covers(&self, axis: &str, value: i64) -> bool {
        self.extent(axis)
            .is_some_and(|(min, max)| min <= value && value <= max)
    }

    /// Standard AABB test: the boxes intersect on every axis
    ///
    /// Axes missing from either box never intersect.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        let axes = self.extents.keys().chain(other.extents.keys());
        axes.into_iter().all(|axis| match (self.extent(axis), other.extent(axis)) {
            (Some((a_min, a_max)), Some((b_min, b_max))) => a_min <= b_max && a_max >= b_min,
            _ => false,
        })
    }
}

/// Whether two distinct records occupy overlapping space in the same storage unit
///
/// A record is never compared with itself.
pub fn records_overlap(a: &Record, b: &Record, header: &Header) -> bool {
    a.id != b.id
        && a.storage_unit == b.storage_unit
        && BoundingBox::of(a, header).overlaps(&BoundingBox::of(b, header))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordDraft;

    fn header() -> Header {
        Header::default()
            .with_storage_unit("Shelf", [("X", 1, 5), ("Y", 1, 3)])
            .with_storage_unit("Drawer", [("X", 1, 5), ("Y", 1, 3)])
            .with_container_type("Box", "Shelf", [("X", 2)])
            .with_container_type("Box", "Drawer", [("X", 2)])
    }

    fn placed(id: u64, unit: &str, x: i64, y: i64) -> Record {
        RecordDraft::new(id, format!("box {id}"), unit, "Box")
            .at([("X", x), ("Y", y)])
            .into_record(String::new())
    }

    #[test]
    fn test_shelf_scenario() {
        let header = header();
        let first = placed(1, "Shelf", 1, 1);
        let touching = placed(2, "Shelf", 2, 1);
        let beside = placed(3, "Shelf", 3, 1);

        assert_eq!(BoundingBox::of(&first, &header).extent("X"), Some((1, 2)));
        assert!(records_overlap(&first, &touching, &header));
        assert!(!records_overlap(&first, &beside, &header));
    }

    #[test]
    fn test_overlap_is_symmetric_and_never_self() {
        let header = header();
        let records: Vec<_> = (1..=5)
            .flat_map(|x| (1..=3).map(move |y| (x, y)))
            .enumerate()
            .map(|(i, (x, y))| placed(i as u64 + 1, "Shelf", x, y))
            .collect();
        for a in &records {
            assert!(!records_overlap(a, a, &header));
            assert!(BoundingBox::of(a, &header).overlaps(&BoundingBox::of(a, &header)));
            for b in &records {
                assert_eq!(
                    records_overlap(a, b, &header),
                    records_overlap(b, a, &header)
                );
            }
        }
    }

    #[test]
    fn test_partial_axis_overlap_is_not_a_conflict() {
        let header = header();
        let a = placed(1, "Shelf", 1, 1);
        let b = placed(2, "Shelf", 1, 2);
        assert!(!records_overlap(&a, &b, &header));
    }

    #[test]
    fn test_different_storage_units_never_overlap() {
        let header = header();
        let a = placed(1, "Shelf", 1, 1);
        let b = placed(2, "Drawer", 1, 1);
        assert!(!records_overlap(&a, &b, &header));
    }

    #[test]
    fn test_extent_saturates_at_axis_end() {
        let header = Header::default()
            .with_storage_unit("Rail", [("X", 1, i64::MAX)])
            .with_container_type("Box", "Rail", [("X", 2)]);
        let clip = RecordDraft::new(1, "clip", "Rail", "Box")
            .at([("X", i64::MAX)])
            .into_record(String::new());
        let extent = BoundingBox::of(&clip, &header).extent("X");
        assert_eq!(extent, Some((i64::MAX, i64::MAX)));
    }

    #[test]
    fn test_covers() {
        let header = header();
        let boxed = BoundingBox::of(&placed(1, "Shelf", 3, 2), &header);
        assert!(boxed.covers("X", 4));
        assert!(!boxed.covers("X", 5));
        assert!(!boxed.covers("Z", 1));
    }
}
