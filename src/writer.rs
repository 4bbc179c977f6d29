//! Migration artifact writer
//!
//! Persists a rendered script as one pretty-printed JSON file per revision.

use crate::config::MigrateOptions;
use crate::error::{MigrateError, MigrateResult};
use crate::migration::{Command, MigrationScript};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static SLUG_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9]+").expect("valid slug regex"));

/// Header of a migration artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MigrationInfo {
    pub revision: u64,
    pub name: String,
    pub created: DateTime<Utc>,
    pub comment: String,
    /// sha256 of the serialized up and down commands
    pub checksum: String,
}

/// File content of one migration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationArtifact {
    pub info: MigrationInfo,
    pub commands_up: Vec<Command>,
    pub commands_down: Vec<Command>,
}

impl MigrationArtifact {
    pub fn new(revision: u64, script: &MigrationScript, options: &MigrateOptions) -> MigrateResult<Self> {
        let commands_up = script.commands_up().to_vec();
        let commands_down = script.commands_down().to_vec();
        let checksum = commands_checksum(&commands_up, &commands_down)?;

        Ok(Self {
            info: MigrationInfo {
                revision,
                name: options.name.clone(),
                created: Utc::now(),
                comment: options.comment.clone(),
                checksum,
            },
            commands_up,
            commands_down,
        })
    }
}

fn commands_checksum(up: &[Command], down: &[Command]) -> MigrateResult<String> {
    let mut hasher = Sha256::new();
    hasher.update(serde_json::to_vec(up)?);
    hasher.update(serde_json::to_vec(down)?);
    Ok(format!("{:x}", hasher.finalize()))
}

/// Where a migration landed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenMigration {
    pub filename: String,
    pub revision: u64,
}

pub struct FileScriptWriter;

impl FileScriptWriter {
    /// Fail unless the output directory exists
    pub async fn check_out_dir(dir: &Path) -> MigrateResult<()> {
        match tokio::fs::metadata(dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(MigrateError::OutputDirMissing(dir.to_path_buf())),
        }
    }

    /// `{revision}-{slug(name)}.json`
    pub fn filename(revision: u64, name: &str) -> String {
        format!("{}-{}.json", revision, slug(name))
    }

    /// Write the artifact for `revision` into `options.out_dir`
    pub async fn write(
        revision: u64,
        script: &MigrationScript,
        options: &MigrateOptions,
    ) -> MigrateResult<WrittenMigration> {
        Self::check_out_dir(&options.out_dir).await?;

        let artifact = MigrationArtifact::new(revision, script, options)?;
        let filename = Self::filename(revision, &options.name);
        let path: PathBuf = options.out_dir.join(&filename);
        let body = serde_json::to_string_pretty(&artifact)?;

        debug!("Writing {} bytes to {}", body.len(), path.display());
        tokio::fs::write(&path, body)
            .await
            .map_err(|source| MigrateError::Write {
                path: path.clone(),
                source,
            })?;

        info!("New migration to revision {} has been saved to file '{}'", revision, filename);
        Ok(WrittenMigration { filename, revision })
    }
}

/// Lowercase, dash-separated file name fragment
pub fn slug(name: &str) -> String {
    let lowered = name.trim().to_lowercase();
    let slug = SLUG_SEPARATORS.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    if slug.is_empty() {
        "noname".to_string()
    } else {
        slug.to_string()
    }
}
