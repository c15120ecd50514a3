//! Record lookup by example

use std::collections::BTreeMap;

use crate::header::Header;
use crate::record::{Location, Record, RecordId};
use crate::validate::BoundingBox;

/// How the set fields of a [`RecordQuery`] are compared
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Every set field equals the record's field
    #[default]
    Exact,
    /// Text contains, lists are subsets, coordinates fall inside the container
    Partial,
}

/// A record template; unset fields match anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordQuery {
    pub id: Option<RecordId>,
    pub name: Option<String>,
    pub storage_unit: Option<String>,
    pub container_type: Option<String>,
    pub location: Option<Location>,
    pub description: Option<String>,
    pub contents: Option<Vec<String>>,
    pub tags: Option<Vec<String>>,
    pub image_paths: Option<Vec<String>>,
    pub categorical_attributes: Option<BTreeMap<String, Vec<String>>>,
    pub mode: MatchMode,
}

impl RecordQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn partial(mut self) -> Self {
        self.mode = MatchMode::Partial;
        self
    }

    pub fn id(mut self, id: RecordId) -> Self {
        self.id = Some(id);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn storage_unit(mut self, storage_unit: impl Into<String>) -> Self {
        self.storage_unit = Some(storage_unit.into());
        self
    }

    pub fn at<'a>(mut self, location: impl IntoIterator<Item = (&'a str, i64)>) -> Self {
        self.location = Some(
            location
                .into_iter()
                .map(|(axis, value)| (axis.to_string(), value))
                .collect(),
        );
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn contents<S: Into<String>>(mut self, contents: impl IntoIterator<Item = S>) -> Self {
        self.contents = Some(contents.into_iter().map(Into::into).collect());
        self
    }

    pub fn tags<S: Into<String>>(mut self, tags: impl IntoIterator<Item = S>) -> Self {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    /// Whether `record` satisfies every set field
    pub fn matches(&self, record: &Record, header: &Header) -> bool {
        fn eq<T: PartialEq>(wanted: &Option<T>, actual: &T) -> bool {
            wanted.as_ref().map_or(true, |wanted| wanted == actual)
        }

        let identity = eq(&self.id, &record.id)
            && eq(&self.name, &record.name)
            && eq(&self.storage_unit, &record.storage_unit)
            && eq(&self.container_type, &record.container_type);
        if !identity {
            return false;
        }

        match self.mode {
            MatchMode::Exact => {
                eq(&self.location, &record.location)
                    && eq(&self.description, &record.description)
                    && eq(&self.contents, &record.contents)
                    && eq(&self.tags, &record.tags)
                    && eq(&self.image_paths, &record.image_paths)
                    && eq(&self.categorical_attributes, &record.categorical_attributes)
            }
            MatchMode::Partial => {
                self.location_covered(record, header)
                    && self
                        .description
                        .as_ref()
                        .map_or(true, |text| record.description.contains(text.as_str()))
                    && subset(&self.contents, &record.contents)
                    && subset(&self.tags, &record.tags)
                    && subset(&self.image_paths, &record.image_paths)
                    && self.categorical_attributes.as_ref().map_or(true, |wanted| {
                        wanted.iter().all(|(attribute, values)| {
                            record
                                .categorical_attributes
                                .get(attribute)
                                .is_some_and(|have| values.iter().all(|v| have.contains(v)))
                        })
                    })
            }
        }
    }

    fn location_covered(&self, record: &Record, header: &Header) -> bool {
        let Some(location) = &self.location else {
            return true;
        };
        let bounds = BoundingBox::of(record, header);
        location
            .iter()
            .all(|(axis, &value)| bounds.covers(axis, value))
    }
}

fn subset(wanted: &Option<Vec<String>>, actual: &[String]) -> bool {
    wanted
        .as_ref()
        .map_or(true, |wanted| wanted.iter().all(|item| actual.contains(item)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::RecordDraft;

    fn header() -> Header {
        Header::default()
            .with_storage_unit("Shelf", [("X", 1, 5), ("Y", 1, 3)])
            .with_container_type("Box", "Shelf", [("X", 2)])
    }

    fn valves() -> Record {
        let mut draft = RecordDraft::new(4, "solenoid valves", "Shelf", "Box")
            .at([("X", 1), ("Y", 2)])
            .with_contents(["festo valve", "smc valve"]);
        draft.description = "12vdc/24vdc".into();
        draft.tags = vec!["pneumatics".into()];
        draft.into_record(String::new())
    }

    #[test]
    fn test_empty_query_matches_everything() {
        assert!(RecordQuery::new().matches(&valves(), &header()));
    }

    #[test]
    fn test_exact() {
        let header = header();
        let record = valves();
        assert!(RecordQuery::new().id(4).name("solenoid valves").matches(&record, &header));
        assert!(!RecordQuery::new().contents(["festo valve"]).matches(&record, &header));
        assert!(RecordQuery::new()
            .contents(["festo valve", "smc valve"])
            .matches(&record, &header));
        assert!(!RecordQuery::new().at([("X", 2), ("Y", 2)]).matches(&record, &header));
    }

    #[test]
    fn test_partial() {
        let header = header();
        let record = valves();
        let query = RecordQuery::new().partial();
        assert!(query.clone().description("24vdc").matches(&record, &header));
        assert!(query.clone().contents(["smc valve"]).matches(&record, &header));
        assert!(!query.clone().tags(["electrics"]).matches(&record, &header));
        // The box spans X 1..=2.
        assert!(query.clone().at([("X", 2)]).matches(&record, &header));
        assert!(!query.clone().at([("X", 3)]).matches(&record, &header));
        assert!(!query.name("solenoid").matches(&record, &header));
    }
}
