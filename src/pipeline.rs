//! The scoring pipeline: adapt, standardize, predict.
//!
//! `Pipeline` owns the two loaded artifacts and exposes the one
//! operation the service exists for. Loading is fallible and happens
//! once at startup; prediction borrows the frozen state immutably, so
//! any number of requests can score concurrently.

use std::path::Path;

use tracing::debug;

use crate::errors::MedvResult;
use crate::features::{adapt, verify_columns, RawFeatures};
use crate::model::GradientBoostingModel;
use crate::standardizer::Standardizer;

/// Loaded scaler plus model, ready to score requests.
#[derive(Debug, Clone)]
pub struct Pipeline {
    standardizer: Standardizer,
    model: GradientBoostingModel,
}

impl Pipeline {
    /// Load both artifacts and cross-check them against the column table.
    /// Any failure leaves the service unstarted; there is no degraded
    /// mode that serves without a model.
    pub fn load(scaler_path: &Path, model_path: &Path) -> MedvResult<Self> {
        verify_columns()?;
        let standardizer = Standardizer::load(scaler_path)?;
        let model = GradientBoostingModel::load(model_path)?;
        Ok(Self { standardizer, model })
    }

    /// Score one request: place fields into training order, apply the
    /// frozen standardization, run the ensemble.
    pub fn predict(&self, raw: &RawFeatures) -> MedvResult<f64> {
        let vector = adapt(raw);
        let standardized = self.standardizer.transform(&vector);
        let prediction = self.model.score(&standardized)?;
        debug!(fields = raw.len(), prediction, "scored request");
        Ok(prediction)
    }

    pub fn tree_count(&self) -> usize {
        self.model.tree_count()
    }

    pub fn learning_rate(&self) -> f64 {
        self.model.learning_rate()
    }
}

#[cfg(test)]
pub mod fixtures {
    //! Artifact builders shared by unit and integration tests.

    use std::path::Path;

    use serde_json::json;

    use crate::features::{COLUMNS, FEATURE_COUNT};

    /// Write a scaler artifact with the given statistics.
    pub fn write_scaler(path: &Path, mean: &[f64], scale: &[f64]) {
        let names: Vec<&str> = COLUMNS.iter().map(|c| c.column).collect();
        let body = json!({
            "feature_names": names,
            "mean": mean,
            "scale": scale,
        });
        std::fs::write(path, serde_json::to_string_pretty(&body).unwrap()).unwrap();
    }

    /// Write an identity scaler: mean 0, scale 1 for every column.
    pub fn write_identity_scaler(path: &Path) {
        write_scaler(path, &[0.0; FEATURE_COUNT], &[1.0; FEATURE_COUNT]);
    }

    /// Write a one-stump model splitting on the first column:
    /// `x[0] <= threshold` scores `base + rate * left`, otherwise
    /// `base + rate * right`.
    pub fn write_stump_model(
        path: &Path,
        base_prediction: f64,
        learning_rate: f64,
        threshold: f64,
        left: f64,
        right: f64,
    ) {
        let body = json!({
            "n_features": FEATURE_COUNT,
            "base_prediction": base_prediction,
            "learning_rate": learning_rate,
            "trees": [{
                "feature": [0, -1, -1],
                "threshold": [threshold, 0.0, 0.0],
                "children_left": [1, -1, -1],
                "children_right": [2, -1, -1],
                "value": [0.0, left, right],
            }],
        });
        std::fs::write(path, serde_json::to_string_pretty(&body).unwrap()).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use serde_json::json;

    use super::fixtures::*;
    use super::*;
    use crate::errors::MedvError;
    use crate::features::FEATURE_COUNT;

    fn raw(body: serde_json::Value) -> RawFeatures {
        RawFeatures::from_json(body.as_object().unwrap()).unwrap()
    }

    fn stump_pipeline(dir: &Path) -> Pipeline {
        let scaler = dir.join("scaler.json");
        let model = dir.join("model.json");
        write_identity_scaler(&scaler);
        write_stump_model(&model, 10.0, 0.5, 0.5, 1.0, 2.0);
        Pipeline::load(&scaler, &model).expect("fixture artifacts load")
    }

    #[test]
    fn predicts_through_both_stages() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = stump_pipeline(dir.path());
        assert_eq!(pipeline.predict(&raw(json!({}))).unwrap(), 10.5);
        assert_eq!(pipeline.predict(&raw(json!({ "lcr": 5.0 }))).unwrap(), 11.0);
    }

    #[test]
    fn standardization_runs_before_the_model() {
        let dir = tempfile::tempdir().unwrap();
        let scaler = dir.path().join("scaler.json");
        let model = dir.path().join("model.json");
        let mut mean = [0.0; FEATURE_COUNT];
        mean[0] = 4.0;
        let mut scale = [1.0; FEATURE_COUNT];
        scale[0] = 2.0;
        write_scaler(&scaler, &mean, &scale);
        // Splits at 0 in standardized units, so the raw mean routes left.
        write_stump_model(&model, 0.0, 1.0, 0.0, -1.0, 1.0);
        let pipeline = Pipeline::load(&scaler, &model).unwrap();

        assert_eq!(pipeline.predict(&raw(json!({ "lcr": 4.0 }))).unwrap(), -1.0);
        assert_eq!(pipeline.predict(&raw(json!({ "lcr": 9.0 }))).unwrap(), 1.0);
    }

    #[test]
    fn repeated_predictions_are_identical() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = stump_pipeline(dir.path());
        let request = raw(json!({ "lcr": 0.3, "tax": 296.0 }));
        let first = pipeline.predict(&request).unwrap();
        for _ in 0..5 {
            assert_eq!(pipeline.predict(&request).unwrap(), first);
        }
    }

    #[test]
    fn missing_model_fails_load_as_artifact_error() {
        let dir = tempfile::tempdir().unwrap();
        let scaler = dir.path().join("scaler.json");
        write_identity_scaler(&scaler);
        let err = Pipeline::load(&scaler, &dir.path().join("absent.json")).unwrap_err();
        assert!(matches!(err, MedvError::Artifact { .. }));
    }

    #[test]
    fn degenerate_scaler_fails_load_as_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let scaler = dir.path().join("scaler.json");
        let model = dir.path().join("model.json");
        let mut scale = [1.0; FEATURE_COUNT];
        scale[7] = 0.0;
        write_scaler(&scaler, &[0.0; FEATURE_COUNT], &scale);
        write_stump_model(&model, 10.0, 0.5, 0.5, 1.0, 2.0);
        let err = Pipeline::load(&scaler, &model).unwrap_err();
        assert!(matches!(err, MedvError::Config { .. }));
        assert!(err.to_string().contains("dis"));
    }
}
