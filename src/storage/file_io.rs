//! Collection files on disk
//!
//! A collection file is replaced in one step: the new contents go to a
//! sibling temp file which is synced and then renamed over the original.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

use crate::error::EnvelopeError;

fn storage_error(action: &str, path: &Path, err: impl std::fmt::Display) -> EnvelopeError {
    EnvelopeError::Storage(format!("Failed to {} {}: {}", action, path.display(), err))
}

/// Unique temp file next to `path`, so the rename never crosses filesystems
fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(format!(".{}.tmp", Uuid::new_v4().simple()));
    path.with_file_name(name)
}

/// Read a JSON file; a missing file yields `T::default()`
pub fn read_json<T, P>(path: P) -> Result<T, EnvelopeError>
where
    T: DeserializeOwned + Default,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
        Err(e) => return Err(storage_error("open", path, e)),
    };

    serde_json::from_reader(BufReader::new(file)).map_err(|e| storage_error("parse", path, e))
}

/// Replace a JSON file atomically
pub fn write_json_atomic<T, P>(path: P, data: &T) -> Result<(), EnvelopeError>
where
    T: Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| storage_error("create directory", parent, e))?;
    }

    let temp = temp_path(path);
    let result = write_synced(&temp, data).and_then(|()| {
        fs::rename(&temp, path).map_err(|e| storage_error("replace", path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp);
    }
    result
}

fn write_synced<T: Serialize>(path: &Path, data: &T) -> Result<(), EnvelopeError> {
    let file = File::create(path).map_err(|e| storage_error("create", path, e))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, data).map_err(|e| storage_error("serialize", path, e))?;
    writer.flush().map_err(|e| storage_error("flush", path, e))?;
    writer
        .get_ref()
        .sync_all()
        .map_err(|e| storage_error("sync", path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
    struct Rows {
        names: Vec<String>,
    }

    #[test]
    fn test_missing_file_is_default() {
        let temp = TempDir::new().unwrap();
        let rows: Rows = read_json(temp.path().join("absent.json")).unwrap();
        assert_eq!(rows, Rows::default());
    }

    #[test]
    fn test_write_replaces_contents() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("rows.json");

        write_json_atomic(&path, &Rows { names: vec!["a".into()] }).unwrap();
        write_json_atomic(&path, &Rows { names: vec!["b".into(), "c".into()] }).unwrap();

        let rows: Rows = read_json(&path).unwrap();
        assert_eq!(rows.names, vec!["b", "c"]);

        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_temp_names_are_unique() {
        let path = Path::new("/data/accounts.json");
        let (a, b) = (temp_path(path), temp_path(path));
        assert_ne!(a, b);
        assert_eq!(a.parent(), path.parent());
        assert!(a.to_string_lossy().ends_with(".tmp"));
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("rows.json");
        fs::write(&path, "{ not json").unwrap();

        let err = read_json::<Rows, _>(&path).unwrap_err();
        assert!(matches!(err, EnvelopeError::Storage(_)));
    }
}
