//! On-disk checks for image paths and asset folders
//!
//! Only existence, layout and extensions are checked; file contents are not
//! opened.

use std::path::Path;

use walkdir::WalkDir;

use crate::config::ValidationConfig;
use crate::error::{Diagnostic, Result};
use crate::record::Record;

fn has_image_extension(path: &Path, config: &ValidationConfig) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| config.is_image_extension(ext))
}

/// Every image path must be an existing file with an image extension
pub(crate) fn check_image_paths(record: &Record, config: &ValidationConfig) -> Result<()> {
    for raw in &record.image_paths {
        let path = Path::new(raw);
        if !path.is_file() {
            return Err(Diagnostic::MissingImage {
                path: path.to_path_buf(),
            });
        }
        if !has_image_extension(path, config) {
            return Err(Diagnostic::UnsupportedImageType {
                path: path.to_path_buf(),
            });
        }
    }
    Ok(())
}

/// An asset folder holds groups: directories at depth 1, images at depth 2
pub(crate) fn check_asset_folder(record: &Record, config: &ValidationConfig) -> Result<()> {
    let Some(root) = &record.asset_folder_path else {
        return Ok(());
    };
    let invalid = |reason: String| Diagnostic::InvalidAssetFolder {
        path: root.clone(),
        reason,
    };

    if !root.is_dir() {
        return Err(invalid("doesn't exist or isn't a directory".to_string()));
    }

    for entry in WalkDir::new(root).min_depth(1).max_depth(2).sort_by_file_name() {
        let entry = entry.map_err(|e| invalid(e.to_string()))?;
        let file_type = entry.file_type();
        match entry.depth() {
            1 if !file_type.is_dir() => {
                return Err(invalid(format!(
                    "{} is not a group directory",
                    entry.path().display()
                )));
            }
            2 if !file_type.is_file() => {
                return Err(invalid(format!(
                    "{} is not a file",
                    entry.path().display()
                )));
            }
            2 if !has_image_extension(entry.path(), config) => {
                return Err(invalid(format!(
                    "{} doesn't have an image extension",
                    entry.path().display()
                )));
            }
            _ => {}
        }
    }
    Ok(())
}
