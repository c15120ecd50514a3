//! Validation engine
//!
//! Three layers, each returning the first [`Diagnostic`] it finds:
//!
//! 1. **Standalone**: one record against the header vocabulary
//! 2. **Collective**: one record against every other record (identity, name,
//!    space)
//! 3. **Catalog**: every record against the rest, after the header itself
//!
//! None of the checks mutate anything, so any of them can be run on a
//! candidate catalog before it replaces the working one.

mod assets;
pub mod geometry;
mod header;
mod record;

use std::path::Path;

use tracing::debug;

use crate::catalog::Catalog;
use crate::config::ValidationConfig;
use crate::error::{Diagnostic, Result};
use crate::header::Header;
use crate::record::Record;
use crate::store;
use crate::units::UnitRegistry;

pub use geometry::{records_overlap, BoundingBox};

/// Runs the record, catalog and header checks under one configuration
#[derive(Debug, Clone, Default)]
pub struct Validator {
    config: ValidationConfig,
}

impl Validator {
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// Validator that skips on-disk image and asset-folder checks
    pub fn without_assets() -> Self {
        Self::new(ValidationConfig {
            check_assets: false,
            ..ValidationConfig::default()
        })
    }

    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Validate the header on its own
    pub fn header_check(&self, header: &Header) -> Result<()> {
        header::check_header(header).map(|_| ())
    }

    /// Validate one record against the header vocabulary
    pub fn standalone_check(&self, record: &Record, header: &Header) -> Result<()> {
        let units = header.units()?;
        self.standalone_with(record, header, &units)
    }

    pub(crate) fn standalone_with(
        &self,
        record: &Record,
        header: &Header,
        units: &UnitRegistry,
    ) -> Result<()> {
        // Field set and primitive types are guaranteed by `Record` itself.
        record::check_name(record)?;
        record::check_id(record)?;
        record::check_placement_names(record, header)?;
        record::check_lists(record)?;
        record::check_numeric_attributes(record, header, units)?;
        record::check_categorical_attributes(record)?;
        if self.config.check_assets {
            assets::check_image_paths(record, &self.config)?;
            assets::check_asset_folder(record, &self.config)?;
        }
        record::check_location(record, header)?;
        record::check_dates(record, header)
    }

    /// Validate `record` against `others`, which must not contain `record` itself
    pub fn collective_check<'a>(
        &self,
        record: &Record,
        others: impl IntoIterator<Item = &'a Record>,
        header: &Header,
    ) -> Result<()> {
        let units = header.units()?;
        self.collective_with(record, others, header, &units)
    }

    pub(crate) fn collective_with<'a>(
        &self,
        record: &Record,
        others: impl IntoIterator<Item = &'a Record>,
        header: &Header,
        units: &UnitRegistry,
    ) -> Result<()> {
        self.standalone_with(record, header, units)?;

        let others: Vec<&Record> = others.into_iter().collect();
        for other in &others {
            if other.id == record.id {
                return Err(Diagnostic::DuplicateId { id: record.id });
            }
            if other.name == record.name {
                return Err(Diagnostic::DuplicateName {
                    name: record.name.clone(),
                    other: other.id,
                });
            }
        }

        let own_box = BoundingBox::of(record, header);
        for other in others
            .iter()
            .filter(|other| other.storage_unit == record.storage_unit)
        {
            if own_box.overlaps(&BoundingBox::of(other, header)) {
                return Err(Diagnostic::Overlap {
                    id: record.id,
                    other: other.id,
                });
            }
        }
        Ok(())
    }

    /// Validate every record against the rest of the catalog
    ///
    /// Stops at the first failing record and reports it as `InvalidRecord`.
    pub fn fida_check(&self, catalog: &Catalog) -> Result<()> {
        let units = catalog.header.units()?;
        for (index, record) in catalog.records.iter().enumerate() {
            let others = catalog
                .records
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != index)
                .map(|(_, other)| other);
            self.collective_with(record, others, &catalog.header, &units)
                .map_err(|cause| cause.in_record(index, record.id))?;
        }
        debug!(records = catalog.records.len(), "catalog is consistent");
        Ok(())
    }

    /// Header check followed by the full catalog check
    pub fn catalog_check(&self, catalog: &Catalog) -> Result<()> {
        self.header_check(&catalog.header)?;
        self.fida_check(catalog)
    }

    /// Load the durable file at `path` and validate it completely
    pub fn file_check(&self, path: impl AsRef<Path>) -> Result<()> {
        store::file_check(path, self)
    }
}
