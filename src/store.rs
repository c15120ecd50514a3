//! Durable catalog file with validate-before-commit saves
//!
//! A save never writes the durable path directly:
//!
//! ```text
//! catalog ──validate──▶ <path>.tmp
//!         ──re-read, checksum, re-validate──▶ rename ──▶ <path>
//! ```
//!
//! Any failure removes the temporary file and leaves both the durable file
//! and the caller's catalog untouched.

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::catalog::Catalog;
use crate::checksum::Checksum;
use crate::config::{AutodexConfig, OutputFormat};
use crate::error::{Diagnostic, Result};
use crate::header::Header;
use crate::validate::Validator;

/// Outcome of a successful save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub path: PathBuf,
    pub checksum: Checksum,
    pub records: usize,
}

/// A catalog file on disk
#[derive(Debug, Clone)]
pub struct CatalogStore {
    path: PathBuf,
    validator: Validator,
    format: OutputFormat,
}

impl CatalogStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            validator: Validator::default(),
            format: OutputFormat::default(),
        }
    }

    /// Store at the configured path, validating with the configured rules
    pub fn from_config(config: &AutodexConfig) -> Self {
        Self {
            path: config.store_path(),
            validator: Validator::new(config.validation.clone()),
            format: config.store.output_format,
        }
    }

    pub fn with_validator(mut self, validator: Validator) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn validator(&self) -> &Validator {
        &self.validator
    }

    /// `<path>.tmp`, next to the durable file
    pub fn temp_path(&self) -> PathBuf {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".tmp");
        PathBuf::from(name)
    }

    fn ensure_json(&self) -> Result<()> {
        let is_json = self
            .path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if !is_json {
            return Err(Diagnostic::NotJsonFile {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    /// Write a new, empty catalog; refuses to replace an existing file
    pub fn create(&self, header: Header) -> Result<Catalog> {
        self.ensure_json()?;
        if self.path.exists() {
            return Err(Diagnostic::FileExists {
                path: self.path.clone(),
            });
        }
        let mut catalog = Catalog::new(header);
        self.save(&mut catalog)?;
        Ok(catalog)
    }

    /// Read and fully validate the durable file
    pub fn load(&self) -> Result<Catalog> {
        self.ensure_json()?;
        let bytes = fs::read(&self.path).map_err(|e| Diagnostic::io(&self.path, &e))?;
        let catalog = self.parse_and_validate(&self.path, &bytes).map_err(|e| {
            warn!(path = %self.path.display(), code = e.code(), "load rejected");
            e
        })?;
        info!(
            path = %self.path.display(),
            records = catalog.records.len(),
            "catalog loaded"
        );
        Ok(catalog)
    }

    /// Load and discard
    pub fn check(&self) -> Result<()> {
        self.load().map(|_| ())
    }

    /// Parse the file and validate its header without checking records
    pub fn read_header(&self) -> Result<Header> {
        self.ensure_json()?;
        let bytes = fs::read(&self.path).map_err(|e| Diagnostic::io(&self.path, &e))?;
        let value: Value = serde_json::from_slice(&bytes).map_err(|e| Diagnostic::CorruptFile {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        let raw = value
            .get(0)
            .cloned()
            .ok_or_else(|| Diagnostic::MalformedCatalog {
                reason: "no header value".to_string(),
            })?;
        let header = Header::from_value(raw)?;
        self.validator.header_check(&header)?;
        Ok(header)
    }

    fn parse_and_validate(&self, path: &Path, bytes: &[u8]) -> Result<Catalog> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| Diagnostic::CorruptFile {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let catalog = Catalog::from_value(value)?;
        self.validator.catalog_check(&catalog)?;
        Ok(catalog)
    }

    /// Validate, write atomically and make `catalog` what was written
    ///
    /// Records are written sorted by id and `last_saved` is stamped. On
    /// success `catalog` equals what a later `load` returns; on failure it is
    /// left as it was.
    pub fn save(&self, catalog: &mut Catalog) -> Result<SaveReport> {
        self.ensure_json()?;

        let mut candidate = catalog.clone();
        candidate.records.sort_by_key(|record| record.id);
        candidate.header.last_saved = Some(candidate.header.now_stamp()?);
        self.validator.catalog_check(&candidate)?;

        let text = candidate.to_json(self.format)?;
        let checksum = Checksum::from_bytes(text.as_bytes());
        let temp = self.temp_path();

        let staged = self
            .write_and_verify(&temp, &text, &checksum, &candidate)
            .and_then(|()| {
                fs::rename(&temp, &self.path).map_err(|e| Diagnostic::io(&self.path, &e))
            });
        if let Err(e) = staged {
            // Best effort: the temp file may never have been created.
            let _ = fs::remove_file(&temp);
            warn!(path = %self.path.display(), code = e.code(), "save rejected");
            return Err(e);
        }

        let records = candidate.records.len();
        *catalog = candidate;
        info!(path = %self.path.display(), records, %checksum, "catalog saved");
        Ok(SaveReport {
            path: self.path.clone(),
            checksum,
            records,
        })
    }

    fn write_and_verify(
        &self,
        temp: &Path,
        text: &str,
        checksum: &Checksum,
        expected: &Catalog,
    ) -> Result<()> {
        fs::write(temp, text).map_err(|e| Diagnostic::io(temp, &e))?;
        let bytes = fs::read(temp).map_err(|e| Diagnostic::io(temp, &e))?;
        checksum.verify(&bytes)?;
        let reloaded = self.parse_and_validate(temp, &bytes)?;
        if reloaded != *expected {
            return Err(Diagnostic::RoundTripMismatch {
                path: temp.to_path_buf(),
            });
        }
        Ok(())
    }
}

/// Load the catalog at `path` under `validator` and report the first problem
pub fn file_check(path: impl AsRef<Path>, validator: &Validator) -> Result<()> {
    CatalogStore::new(path.as_ref())
        .with_validator(validator.clone())
        .check()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::DuplicatePolicy;
    use crate::record::RecordDraft;

    fn header() -> Header {
        Header::default()
            .with_storage_unit("Shelf", [("X", 1, 5), ("Y", 1, 3)])
            .with_container_type("Box", "Shelf", [("X", 2)])
    }

    fn store(dir: &Path) -> CatalogStore {
        CatalogStore::new(dir.join("catalog.json")).with_validator(Validator::without_assets())
    }

    #[test]
    fn test_temp_path() {
        let store = CatalogStore::new("/data/catalog.json");
        assert_eq!(store.temp_path(), PathBuf::from("/data/catalog.json.tmp"));
    }

    #[test]
    fn test_requires_json_extension() {
        let dir = tempfile::tempdir().unwrap();
        let store = CatalogStore::new(dir.path().join("catalog.txt"));
        assert_eq!(store.load().unwrap_err().code(), "E083");
        assert_eq!(store.create(header()).unwrap_err().code(), "E083");
    }

    #[test]
    fn test_create_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let created = store.create(header()).unwrap();
        assert!(created.header.last_saved.is_some());
        assert_eq!(store.load().unwrap(), created);
        assert_eq!(store.create(header()).unwrap_err().code(), "E085");
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn test_save_sorts_and_reloads_equal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let validator = store.validator().clone();
        let mut catalog = Catalog::new(header());
        for (id, x) in [(7, 1), (3, 3)] {
            let draft = RecordDraft::new(id, format!("box {id}"), "Shelf", "Box")
                .at([("X", x), ("Y", 1)]);
            catalog.add(draft, DuplicatePolicy::Reject, &validator).unwrap();
        }

        let report = store.save(&mut catalog).unwrap();
        assert_eq!(report.records, 2);
        assert_eq!(
            catalog.records.iter().map(|r| r.id).collect::<Vec<_>>(),
            vec![3, 7]
        );
        report
            .checksum
            .verify(&fs::read(store.path()).unwrap())
            .unwrap();
        assert_eq!(store.load().unwrap(), catalog);
    }

    #[test]
    fn test_failed_save_leaves_everything_alone() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let mut catalog = store.create(header()).unwrap();
        let on_disk = fs::read(store.path()).unwrap();

        let mut broken = catalog.clone();
        let stamp = catalog.header.now_stamp().unwrap();
        broken
            .records
            .push(RecordDraft::new(1, "box", "Attic", "Box").into_record(stamp));
        let snapshot = broken.clone();
        let err = store.save(&mut broken).unwrap_err();
        assert_eq!(err.root().code(), "E020");
        assert_eq!(broken, snapshot);
        assert_eq!(fs::read(store.path()).unwrap(), on_disk);
        assert!(!store.temp_path().exists());

        store.save(&mut catalog).unwrap();
    }

    #[test]
    fn test_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        fs::write(store.path(), "[{\"version\": ").unwrap();
        assert_eq!(store.load().unwrap_err().code(), "E081");
        assert_eq!(
            file_check(store.path(), &Validator::without_assets()).unwrap_err().code(),
            "E081"
        );
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(store(dir.path()).load().unwrap_err().code(), "E080");
    }

    #[test]
    fn test_read_header_only() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        assert_eq!(store.read_header().unwrap_err().code(), "E080");

        let created = store.create(header()).unwrap();
        assert_eq!(store.read_header().unwrap(), created.header);

        fs::write(store.path(), "[]").unwrap();
        assert_eq!(store.read_header().unwrap_err().code(), "E003");
    }
}
