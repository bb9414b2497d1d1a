//! Artifact persistence
//!
//! Artifacts are JSON documents. Writes go to a temporary file next to the
//! target and are renamed into place, so readers never observe a partially
//! written file.

use crate::scaler::MinMaxScaler;
use crate::schema::Schema;
use crate::{AlignError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// File name of the persisted scaler inside a run directory
pub const SCALER_FILE: &str = "scaler.json";
/// File name of the persisted schema inside a run directory
pub const SCHEMA_FILE: &str = "schema.json";

/// Serialize `value` to `path` atomically
pub fn write_json_atomic<T: Serialize>(value: &T, path: &Path) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent)?;

    let file_name = path
        .file_name()
        .ok_or_else(|| AlignError::MalformedInput(format!("'{}' has no file name", path.display())))?;
    let temp_path = parent.join(format!(".{}.tmp", file_name.to_string_lossy()));

    {
        let file = File::create(&temp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, value)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    fs::rename(&temp_path, path)?;
    Ok(())
}

/// Deserialize a JSON artifact, reporting a missing file as [`AlignError::ArtifactMissing`]
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.exists() {
        return Err(AlignError::ArtifactMissing(path.to_path_buf()));
    }
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Persists the fitted scaler
#[derive(Debug)]
pub struct ScalerStore;

impl ScalerStore {
    pub fn save(scaler: &MinMaxScaler, path: &Path) -> Result<()> {
        write_json_atomic(scaler, path)
    }

    /// Load a scaler and check its invariants
    pub fn load(path: &Path) -> Result<MinMaxScaler> {
        let scaler: MinMaxScaler = read_json(path)?;
        scaler.validate()?;
        Ok(scaler)
    }

    pub fn save_schema(schema: &Schema, path: &Path) -> Result<()> {
        write_json_atomic(schema, path)
    }

    /// Load a schema and check its invariants
    pub fn load_schema(path: &Path) -> Result<Schema> {
        let schema: Schema = read_json(path)?;
        schema.validate()?;
        Ok(schema)
    }
}
