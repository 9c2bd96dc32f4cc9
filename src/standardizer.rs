//! Z-score standardization, replaying statistics fitted at training time.
//!
//! The scaler artifact carries per-column mean and scale plus the column
//! names in training order. Nothing is ever re-fitted here: the transform
//! applies frozen statistics so a given vector standardizes the same way
//! on every replica and every restart.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::errors::{MedvError, MedvResult};
use crate::features::{FeatureVector, COLUMNS, FEATURE_COUNT};

/// On-disk shape of the scaler artifact. Exporters dump the deviation
/// array as either `scale` or `std`; `feature_names` is optional but
/// checked against the service's column order when pinned.
#[derive(Debug, Deserialize)]
struct StandardizerFile {
    feature_names: Option<Vec<String>>,
    mean: Vec<f64>,
    #[serde(alias = "std")]
    scale: Vec<f64>,
}

/// Frozen standardization statistics, one (mean, scale) pair per model
/// column in training order.
#[derive(Debug, Clone)]
pub struct Standardizer {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl Standardizer {
    /// Load and validate the scaler artifact. A missing or unreadable file
    /// is an artifact problem; a file that parses but carries unusable
    /// statistics is a configuration problem. Both abort startup.
    pub fn load(path: &Path) -> MedvResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            MedvError::artifact(path.display().to_string(), format!("cannot read scaler: {e}"))
        })?;
        let file: StandardizerFile = serde_json::from_str(&text)
            .map_err(|e| MedvError::config(format!("malformed scaler artifact: {e}")))?;
        let standardizer =
            Self::from_parts(file.feature_names.as_deref(), &file.mean, &file.scale)?;
        info!(path = %path.display(), columns = FEATURE_COUNT, "loaded standardizer");
        Ok(standardizer)
    }

    /// Build from already-parsed statistics, rejecting anything the
    /// transform could not apply safely.
    pub fn from_parts(
        feature_names: Option<&[String]>,
        mean: &[f64],
        scale: &[f64],
    ) -> MedvResult<Self> {
        if let Some(names) = feature_names {
            if names.len() != FEATURE_COUNT {
                return Err(MedvError::config(format!(
                    "scaler lists {} columns, expected {}",
                    names.len(),
                    FEATURE_COUNT
                )));
            }
            for (i, entry) in COLUMNS.iter().enumerate() {
                if names[i] != entry.column {
                    return Err(MedvError::config(format!(
                        "scaler column {} is '{}', expected '{}'",
                        i, names[i], entry.column
                    )));
                }
            }
        }
        if mean.len() != FEATURE_COUNT || scale.len() != FEATURE_COUNT {
            return Err(MedvError::config(format!(
                "scaler statistics have {} means and {} scales, expected {} of each",
                mean.len(),
                scale.len(),
                FEATURE_COUNT
            )));
        }
        let mut checked_mean = [0.0; FEATURE_COUNT];
        let mut checked_scale = [0.0; FEATURE_COUNT];
        for (i, entry) in COLUMNS.iter().enumerate() {
            if !mean[i].is_finite() {
                return Err(MedvError::config(format!(
                    "scaler mean for '{}' is not finite",
                    entry.column
                )));
            }
            if !scale[i].is_finite() || scale[i] <= 0.0 {
                return Err(MedvError::config(format!(
                    "scaler scale for '{}' must be a positive finite number",
                    entry.column
                )));
            }
            checked_mean[i] = mean[i];
            checked_scale[i] = scale[i];
        }
        Ok(Self { mean: checked_mean, scale: checked_scale })
    }

    /// Apply the frozen transform: (x - mean) / scale per column.
    pub fn transform(&self, vector: &FeatureVector) -> FeatureVector {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = (vector.as_slice()[i] - self.mean[i]) / self.scale[i];
        }
        FeatureVector::new(out)
    }
}
