//! Artifact Store - Paired scaler/model persistence
//!
//! Both files carry the same header: the training run id and the data-contract
//! fingerprint. A pair is only accepted when both headers match the running
//! engine and each other, so a scaler from one run can never be served with
//! the weights of another.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::constants::{get_artifact_dir, MODEL_FILE_NAME, SCALER_FILE_NAME, SEQ_LEN};
use crate::error::{FloodError, Result};
use crate::logic::features::layout::{validate_layout, LayoutInfo};
use super::lstm::RiskModel;
use super::scaler::ScalerState;

// ============================================================================
// DATA STRUCTURES
// ============================================================================

/// Metadata stamped into every artifact file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactHeader {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub feature_version: u8,
    pub layout_hash: u32,
    pub seq_len: usize,
    pub feature_names: Vec<String>,
    /// SHA-256 of the serialized payload
    pub checksum: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    header: ArtifactHeader,
    payload: T,
}

/// A validated scaler/model pair from one training run
#[derive(Debug, Clone)]
pub struct LoadedArtifacts {
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub scaler: ScalerState,
    pub model: RiskModel,
}

// ============================================================================
// STORE
// ============================================================================

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self { dir: dir.as_ref().to_path_buf() }
    }

    /// Store at `FLOOD_ARTIFACT_DIR` or the default location
    pub fn from_env() -> Self {
        Self::new(get_artifact_dir())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_FILE_NAME)
    }

    pub fn model_path(&self) -> PathBuf {
        self.dir.join(MODEL_FILE_NAME)
    }

    /// Both files present (not validated)
    pub fn exists(&self) -> bool {
        self.scaler_path().exists() && self.model_path().exists()
    }

    /// Persist a scaler/model pair under one run id.
    ///
    /// Both files are fully written to temporary siblings before either is
    /// renamed into place.
    pub fn save(&self, run_id: Uuid, scaler: &ScalerState, model: &RiskModel) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let created_at = Utc::now();
        let model_path = self.model_path();
        let scaler_path = self.scaler_path();

        let staged = write_temp(&model_path, run_id, created_at, model).and_then(|model_tmp| {
            let scaler_tmp = write_temp(&scaler_path, run_id, created_at, scaler)?;
            Ok((model_tmp, scaler_tmp))
        });
        let (model_tmp, scaler_tmp) = match staged {
            Ok(paths) => paths,
            Err(e) => {
                discard_temps(&[model_path.as_path(), scaler_path.as_path()]);
                return Err(e);
            }
        };

        let committed = fs::rename(&model_tmp, &model_path)
            .and_then(|_| fs::rename(&scaler_tmp, &scaler_path));
        if let Err(e) = committed {
            discard_temps(&[model_path.as_path(), scaler_path.as_path()]);
            return Err(e.into());
        }

        log::info!("Artifacts for run {} saved to {}", run_id, self.dir.display());
        Ok(())
    }

    /// Load and validate the pair; every failure is reported as ModelUnavailable
    pub fn load(&self) -> Result<LoadedArtifacts> {
        let (scaler_header, scaler) = read_artifact::<ScalerState>(&self.scaler_path())?;
        let (model_header, model) = read_artifact::<RiskModel>(&self.model_path())?;

        if scaler_header.run_id != model_header.run_id {
            return Err(FloodError::ModelUnavailable(format!(
                "scaler (run {}) and model (run {}) come from different training runs",
                scaler_header.run_id, model_header.run_id
            )));
        }

        scaler.validate()?;
        model.validate()?;

        if model.config.seq_len != SEQ_LEN {
            return Err(FloodError::ModelUnavailable(format!(
                "model trained for seq_len {}, engine uses {}",
                model.config.seq_len, SEQ_LEN
            )));
        }

        log::info!("Loaded artifacts for run {} from {}", model_header.run_id, self.dir.display());

        Ok(LoadedArtifacts {
            run_id: model_header.run_id,
            created_at: model_header.created_at,
            scaler,
            model,
        })
    }
}

// ============================================================================
// HELPERS
// ============================================================================

fn checksum<T: Serialize>(payload: &T) -> Result<String> {
    let bytes = serde_json::to_vec(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Remove leftover temporary siblings after a failed save
fn discard_temps(paths: &[&Path]) {
    for path in paths {
        let tmp = temp_path(path);
        if tmp.is_file() {
            if let Err(e) = fs::remove_file(&tmp) {
                log::warn!("Could not remove {}: {}", tmp.display(), e);
            }
        }
    }
}

fn write_temp<T: Serialize>(
    path: &Path,
    run_id: Uuid,
    created_at: DateTime<Utc>,
    payload: &T,
) -> Result<PathBuf> {
    let layout = LayoutInfo::current();
    let header = ArtifactHeader {
        run_id,
        created_at,
        feature_version: layout.version,
        layout_hash: layout.hash,
        seq_len: layout.seq_len,
        feature_names: layout.feature_names,
        checksum: checksum(payload)?,
    };

    let tmp = temp_path(path);
    let mut file = File::create(&tmp)?;
    serde_json::to_writer(&mut file, &Envelope { header, payload })?;
    file.flush()?;
    file.sync_all()?;

    Ok(tmp)
}

fn read_artifact<T: Serialize + DeserializeOwned>(path: &Path) -> Result<(ArtifactHeader, T)> {
    let unavailable = |reason: String| FloodError::ModelUnavailable(format!("{}: {}", path.display(), reason));

    if !path.exists() {
        return Err(unavailable("artifact not found".to_string()));
    }

    let data = fs::read(path).map_err(|e| unavailable(e.to_string()))?;
    let envelope: Envelope<T> = serde_json::from_slice(&data).map_err(|e| unavailable(e.to_string()))?;
    let header = envelope.header;

    validate_layout(header.feature_version, header.layout_hash).map_err(|e| unavailable(e.to_string()))?;

    if header.seq_len != SEQ_LEN {
        return Err(unavailable(format!("seq_len {} does not match {}", header.seq_len, SEQ_LEN)));
    }

    let actual = checksum(&envelope.payload)?;
    if actual != header.checksum {
        return Err(unavailable("payload checksum mismatch".to_string()));
    }

    Ok((header, envelope.payload))
}
