//! Frozen gradient-boosted regression ensemble.
//!
//! The model artifact stores every fitted tree as flat node arrays, the
//! same layout the training stack exports. Scoring walks each tree from
//! the root and sums the leaf values into the ensemble baseline. All
//! structural checks happen once at load time, so the per-request walk
//! needs no bounds bookkeeping and cannot loop.

use std::fs;
use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::errors::{MedvError, MedvResult};
use crate::features::{FeatureVector, COLUMNS, FEATURE_COUNT};

/// Child-index marker for leaf nodes in the exported arrays.
const LEAF: i32 = -1;

/// On-disk shape of one fitted tree: parallel arrays indexed by node id.
#[derive(Debug, Clone, Deserialize)]
struct TreeFile {
    feature: Vec<i32>,
    threshold: Vec<f64>,
    children_left: Vec<i32>,
    children_right: Vec<i32>,
    value: Vec<f64>,
}

/// On-disk shape of the model artifact. `feature_names`, when the
/// exporter pins it, must match the service's column order.
#[derive(Debug, Deserialize)]
struct ModelFile {
    n_features: usize,
    base_prediction: f64,
    learning_rate: f64,
    trees: Vec<TreeFile>,
    feature_names: Option<Vec<String>>,
}

/// One validated regression tree. Node 0 is the root; internal nodes
/// route on `x[feature] <= threshold` (left on true), leaves carry the
/// response in `value`.
#[derive(Debug, Clone)]
pub struct RegressionTree {
    feature: Vec<i32>,
    threshold: Vec<f64>,
    children_left: Vec<i32>,
    children_right: Vec<i32>,
    value: Vec<f64>,
}

impl RegressionTree {
    /// Check the node arrays describe a well-formed tree. Children must
    /// point strictly forward, which rules out cycles and makes the
    /// prediction walk terminate unconditionally.
    fn from_file(tree: TreeFile, index: usize, n_features: usize) -> MedvResult<Self> {
        let nodes = tree.feature.len();
        let fail = |message: String| {
            MedvError::artifact(format!("tree {index}"), message)
        };
        if nodes == 0 {
            return Err(fail("tree has no nodes".to_string()));
        }
        if tree.threshold.len() != nodes
            || tree.children_left.len() != nodes
            || tree.children_right.len() != nodes
            || tree.value.len() != nodes
        {
            return Err(fail(format!(
                "node arrays disagree on length (feature={}, threshold={}, left={}, right={}, value={})",
                nodes,
                tree.threshold.len(),
                tree.children_left.len(),
                tree.children_right.len(),
                tree.value.len()
            )));
        }
        for node in 0..nodes {
            let left = tree.children_left[node];
            let right = tree.children_right[node];
            if left == LEAF || right == LEAF {
                if left != LEAF || right != LEAF {
                    return Err(fail(format!("node {node} mixes a leaf and a child")));
                }
                if !tree.value[node].is_finite() {
                    return Err(fail(format!("leaf {node} value is not finite")));
                }
                continue;
            }
            for child in [left, right] {
                if child <= node as i32 || child as usize >= nodes {
                    return Err(fail(format!(
                        "node {node} points at child {child}, outside ({node}, {nodes})"
                    )));
                }
            }
            let feature = tree.feature[node];
            if feature < 0 || feature as usize >= n_features {
                return Err(fail(format!(
                    "node {node} splits on feature {feature}, model has {n_features} inputs"
                )));
            }
            if !tree.threshold[node].is_finite() {
                return Err(fail(format!("node {node} threshold is not finite")));
            }
        }
        Ok(Self {
            feature: tree.feature,
            threshold: tree.threshold,
            children_left: tree.children_left,
            children_right: tree.children_right,
            value: tree.value,
        })
    }

    /// Route `x` from the root to a leaf and return the leaf value.
    fn predict(&self, x: &[f64]) -> f64 {
        let mut node = 0usize;
        while self.children_left[node] != LEAF {
            let feature = self.feature[node] as usize;
            node = if x[feature] <= self.threshold[node] {
                self.children_left[node] as usize
            } else {
                self.children_right[node] as usize
            };
        }
        self.value[node]
    }
}

/// The full frozen ensemble. Immutable after load; scoring never mutates
/// and never re-reads the artifact.
#[derive(Debug, Clone)]
pub struct GradientBoostingModel {
    base_prediction: f64,
    learning_rate: f64,
    trees: Vec<RegressionTree>,
}

impl GradientBoostingModel {
    /// Load and validate the model artifact. Every failure here, from a
    /// missing file to a tree with a backwards child pointer, is an
    /// artifact error and aborts startup.
    pub fn load(path: &Path) -> MedvResult<Self> {
        let text = fs::read_to_string(path).map_err(|e| {
            MedvError::artifact(path.display().to_string(), format!("cannot read model: {e}"))
        })?;
        let file: ModelFile = serde_json::from_str(&text).map_err(|e| {
            MedvError::artifact(path.display().to_string(), format!("malformed model: {e}"))
        })?;
        let model = Self::from_file(file)?;
        info!(
            path = %path.display(),
            trees = model.trees.len(),
            learning_rate = model.learning_rate,
            "loaded model"
        );
        Ok(model)
    }

    fn from_file(file: ModelFile) -> MedvResult<Self> {
        if file.n_features != FEATURE_COUNT {
            return Err(MedvError::artifact(
                "model",
                format!(
                    "trained for {} inputs, this service serves {}",
                    file.n_features, FEATURE_COUNT
                ),
            ));
        }
        if let Some(names) = &file.feature_names {
            if names.len() != FEATURE_COUNT {
                return Err(MedvError::artifact(
                    "model",
                    format!("lists {} column names, expected {}", names.len(), FEATURE_COUNT),
                ));
            }
            for (i, entry) in COLUMNS.iter().enumerate() {
                if names[i] != entry.column {
                    return Err(MedvError::artifact(
                        "model",
                        format!("column {} is '{}', expected '{}'", i, names[i], entry.column),
                    ));
                }
            }
        }
        if !file.base_prediction.is_finite() || !file.learning_rate.is_finite() {
            return Err(MedvError::artifact(
                "model",
                "base prediction and learning rate must be finite".to_string(),
            ));
        }
        if file.trees.is_empty() {
            return Err(MedvError::artifact("model", "ensemble has no trees".to_string()));
        }
        let mut trees = Vec::with_capacity(file.trees.len());
        for (index, tree) in file.trees.into_iter().enumerate() {
            trees.push(RegressionTree::from_file(tree, index, file.n_features)?);
        }
        Ok(Self {
            base_prediction: file.base_prediction,
            learning_rate: file.learning_rate,
            trees,
        })
    }

    /// Score one standardized vector: baseline plus the learning-rate
    /// weighted sum of every tree's leaf value. Deterministic for a given
    /// artifact; trees are summed in stored order so float rounding is
    /// reproducible too.
    pub fn score(&self, vector: &FeatureVector) -> MedvResult<f64> {
        let x = vector.as_slice();
        let mut total = self.base_prediction;
        for tree in &self.trees {
            total += self.learning_rate * tree.predict(x);
        }
        if !total.is_finite() {
            return Err(MedvError::scoring("model produced a non-finite prediction"));
        }
        Ok(total)
    }

    pub fn tree_count(&self) -> usize {
        self.trees.len()
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }
}
