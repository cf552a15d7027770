// SPDX-License-Identifier: MIT OR Apache-2.0

//! Checkpoint artifact resolution.
//!
//! [`resolve()`] turns a model identifier into local paths for the four
//! artifacts the server needs: `config.json`, `tokenizer.json`,
//! `model.safetensors`, and (when the model ships one)
//! `special_tokens_map.json`.  A local directory is used as-is; otherwise
//! the `HuggingFace` cache is consulted, and unless `--offline` forces
//! local-only resolution, missing files are fetched from the Hub.

use std::path::{Path, PathBuf};

use crate::config::EncoderConfig;
use crate::error::{Result, ServeError};

/// Required checkpoint files.
const CONFIG_FILE: &str = "config.json";
/// Tokenizer definition.
const TOKENIZER_FILE: &str = "tokenizer.json";
/// Model weights (single-file; BERT-family checkpoints are not sharded).
const WEIGHTS_FILE: &str = "model.safetensors";
/// Optional special-token override map.
const SPECIAL_TOKENS_FILE: &str = "special_tokens_map.json";

// ---------------------------------------------------------------------------
// ModelArtifacts
// ---------------------------------------------------------------------------

/// Local paths of one resolved checkpoint.
#[derive(Debug, Clone)]
pub struct ModelArtifacts {
    /// `config.json` path.
    pub config: PathBuf,
    /// `tokenizer.json` path.
    pub tokenizer: PathBuf,
    /// `model.safetensors` path.
    pub weights: PathBuf,
    /// `special_tokens_map.json` path, when present.
    pub special_tokens_map: Option<PathBuf>,
}

impl ModelArtifacts {
    /// Parse the checkpoint's `config.json` into an [`EncoderConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`ServeError::Config`] if the file cannot be read or parsed.
    pub fn encoder_config(&self) -> Result<EncoderConfig> {
        let config_str = std::fs::read_to_string(&self.config)
            .map_err(|e| ServeError::Config(format!("read {}: {e}", self.config.display())))?;
        let json: serde_json::Value = serde_json::from_str(&config_str)
            .map_err(|e| ServeError::Config(format!("parse {}: {e}", self.config.display())))?;
        EncoderConfig::from_hf_config(&json)
    }
}

// ---------------------------------------------------------------------------
// Resolution
// ---------------------------------------------------------------------------

/// Resolve a model identifier to local artifact paths.
///
/// `model` is either a local directory containing the checkpoint files or
/// a Hub repository id (e.g. `"microsoft/codebert-base"`).  With
/// `offline`, only the local `HuggingFace` cache is consulted and a
/// missing file is an error; otherwise missing files are downloaded.
///
/// # Errors
///
/// Returns [`ServeError::Hub`] if a required artifact cannot be resolved.
pub fn resolve(model: &str, offline: bool) -> Result<ModelArtifacts> {
    let dir = Path::new(model);
    if dir.is_dir() {
        return resolve_local_dir(dir);
    }
    if offline {
        resolve_cached(model)
    } else {
        resolve_remote(model)
    }
}

/// Resolve from an explicit local checkpoint directory.
fn resolve_local_dir(dir: &Path) -> Result<ModelArtifacts> {
    let require = |name: &str| -> Result<PathBuf> {
        let path = dir.join(name);
        if path.is_file() {
            Ok(path)
        } else {
            Err(ServeError::Hub(format!(
                "{} not found in {}",
                name,
                dir.display()
            )))
        }
    };

    let special = dir.join(SPECIAL_TOKENS_FILE);
    Ok(ModelArtifacts {
        config: require(CONFIG_FILE)?,
        tokenizer: require(TOKENIZER_FILE)?,
        weights: require(WEIGHTS_FILE)?,
        special_tokens_map: special.is_file().then_some(special),
    })
}

/// Resolve from the local `HuggingFace` cache only.
fn resolve_cached(model: &str) -> Result<ModelArtifacts> {
    let repo = hf_hub::Cache::default().model(model.to_owned());
    let require = |name: &str| -> Result<PathBuf> {
        repo.get(name).ok_or_else(|| {
            ServeError::Hub(format!(
                "{name} for '{model}' not in the local cache (offline mode)"
            ))
        })
    };

    Ok(ModelArtifacts {
        config: require(CONFIG_FILE)?,
        tokenizer: require(TOKENIZER_FILE)?,
        weights: require(WEIGHTS_FILE)?,
        special_tokens_map: repo.get(SPECIAL_TOKENS_FILE),
    })
}

/// Resolve via the Hub API, downloading anything not already cached.
fn resolve_remote(model: &str) -> Result<ModelArtifacts> {
    let api = hf_hub::api::sync::Api::new()
        .map_err(|e| ServeError::Hub(format!("HF Hub API: {e}")))?;
    let repo = api.model(model.to_owned());
    let require = |name: &str| -> Result<PathBuf> {
        repo.get(name)
            .map_err(|e| ServeError::Hub(format!("{name} for '{model}': {e}")))
    };

    Ok(ModelArtifacts {
        config: require(CONFIG_FILE)?,
        tokenizer: require(TOKENIZER_FILE)?,
        weights: require(WEIGHTS_FILE)?,
        // Optional: many checkpoints ship one, plain BPE repos may not.
        special_tokens_map: repo.get(SPECIAL_TOKENS_FILE).ok(),
    })
}
