//! Materialized-pool file loader.
//!
//! The campaign core never builds pools itself: an external pool builder
//! (area profiles, geometric expansion, caches) materialises the complete
//! ordered target list ahead of time.  This module is the narrow seam to
//! that collaborator for the standalone binary: it deserialises an already
//! materialised list from a TOML file, in order, into a [`TargetPool`].
//!
//! File format:
//! ```toml
//! [[targets]]
//! kind = "config"
//! module = "alu"
//! address = "0000001234"
//! pblock = "alu_pb"        # optional
//!
//! [[targets]]
//! kind = "reg"
//! module = "decoder"
//! reg_id = 5
//! name = "dec_rec_q"       # optional
//! ```

use std::path::Path;

use semfi_core::{Target, TargetError, TargetPool};
use serde::Deserialize;
use thiserror::Error;

/// Error type for pool file loading.  All variants are fatal at startup.
#[derive(Debug, Error)]
pub enum PoolFileError {
    #[error("failed to read pool file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pool file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    /// A record is missing the field its kind requires, or carries an
    /// invalid value.
    #[error("invalid target record #{index}: {message}")]
    InvalidRecord { index: usize, message: String },
}

#[derive(Debug, Deserialize)]
struct PoolFile {
    #[serde(default)]
    targets: Vec<TargetRecord>,
}

#[derive(Debug, Deserialize)]
struct TargetRecord {
    kind: String,
    module: String,
    address: Option<String>,
    pblock: Option<String>,
    reg_id: Option<u16>,
    name: Option<String>,
    #[serde(default)]
    tags: Vec<String>,
}

/// Loads a materialised pool file, preserving record order as injection
/// order.
pub fn load_pool_file(path: &Path) -> Result<TargetPool, PoolFileError> {
    let text = std::fs::read_to_string(path).map_err(|source| PoolFileError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let file: PoolFile = toml::from_str(&text).map_err(|source| PoolFileError::Parse {
        path: path.display().to_string(),
        source,
    })?;

    let source_label = format!("pool:{}", path.display());
    let mut pool = TargetPool::new();
    for (index, record) in file.targets.into_iter().enumerate() {
        pool.push(record_to_target(record, &source_label).map_err(|message| {
            PoolFileError::InvalidRecord { index, message }
        })?);
    }
    Ok(pool)
}

fn record_to_target(record: TargetRecord, source: &str) -> Result<Target, String> {
    match record.kind.as_str() {
        "config" => {
            let address = record
                .address
                .ok_or_else(|| "config target requires `address`".to_string())?;
            let mut target = semfi_core::ConfigTarget::new(record.module, &address)
                .map_err(|e: TargetError| e.to_string())?
                .with_source(source)
                .with_tags(record.tags);
            if let Some(pblock) = record.pblock {
                target = target.with_pblock(pblock);
            }
            Ok(Target::Config(target))
        }
        "reg" => {
            let reg_id = record
                .reg_id
                .ok_or_else(|| "reg target requires `reg_id`".to_string())?;
            let mut target = semfi_core::RegTarget::new(record.module, reg_id)
                .map_err(|e: TargetError| e.to_string())?
                .with_source(source)
                .with_tags(record.tags);
            if let Some(name) = record.name {
                target = target.with_reg_name(name);
            }
            Ok(Target::Reg(target))
        }
        other => Err(format!("unknown target kind {other:?}")),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
