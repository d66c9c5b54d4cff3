//! Gaze estimator abstraction and the shipped ridge regressor.
//!
//! The estimator owns feature extraction and the feature-to-screen
//! mapping. CV-backed implementations (facial landmarks, neural
//! embeddings) live behind the [`GazeEstimator`] trait; the service only
//! needs extraction, prediction, training, and persistence.

use crate::source::Frame;
use crate::{Error, Result};
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Extracted gaze features for one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Features(pub Vec<f64>);

/// Trait for gaze estimators consumed by the service
pub trait GazeEstimator: Send {
    /// Extract features from a frame. Returns `(None, _)` when no face is
    /// visible and the blink flag when a blink is detected.
    fn extract_features(&self, frame: &Frame) -> (Option<Features>, bool);

    /// Predict screen coordinates for a batch of feature vectors.
    /// Fails with a model error when no model is trained or loaded.
    fn predict(&self, features: &[Features]) -> Result<Vec<(f64, f64)>>;

    /// Train the mapping from features to screen targets
    fn train(&mut self, features: &[Features], targets: &[(f64, f64)]) -> Result<()>;

    /// Whether a trained or loaded model is available
    fn is_trained(&self) -> bool;

    /// Discard the trained model reference
    fn clear(&mut self);

    /// Persist the trained model. The format is opaque to the service.
    fn save(&self, path: &Path) -> Result<()>;

    /// Load a previously saved model
    fn load(&mut self, path: &Path) -> Result<()>;
}

/// Persisted form of a trained ridge model
#[derive(Debug, Serialize, Deserialize)]
struct RidgeModel {
    alpha: f64,
    /// Rows: feature dimension + 1 (bias), columns: 2 (x, y)
    weights: Vec<Vec<f64>>,
}

/// Ridge-regularized linear least squares over gaze features.
///
/// Consumes feature-level frames laid out as
/// `[face_flag, blink_flag, feature...]` (see [`Frame`]).
pub struct RidgeEstimator {
    alpha: f64,
    /// (d + 1) x 2 weight matrix including the bias row
    weights: Option<DMatrix<f64>>,
}

impl RidgeEstimator {
    /// Create an untrained estimator with the given regularization strength
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        Self { alpha, weights: None }
    }

    /// Build the design matrix with a trailing bias column
    fn design_matrix(features: &[Features], dim: usize) -> DMatrix<f64> {
        DMatrix::from_fn(features.len(), dim + 1, |row, col| {
            if col == dim {
                1.0
            } else {
                features[row].0[col]
            }
        })
    }
}

impl GazeEstimator for RidgeEstimator {
    fn extract_features(&self, frame: &Frame) -> (Option<Features>, bool) {
        if frame.data.len() < 2 || frame.data[0] < 0.5 {
            return (None, false);
        }
        let blink = frame.data[1] >= 0.5;
        if blink {
            return (None, true);
        }
        (Some(Features(frame.data[2..].to_vec())), false)
    }

    fn predict(&self, features: &[Features]) -> Result<Vec<(f64, f64)>> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| Error::Model("Model is not trained".to_string()))?;

        let dim = weights.nrows() - 1;
        for f in features {
            if f.0.len() != dim {
                return Err(Error::Model(format!(
                    "Feature dimension mismatch: got {}, model expects {dim}",
                    f.0.len()
                )));
            }
        }

        let design = Self::design_matrix(features, dim);
        let predicted = design * weights;
        Ok((0..predicted.nrows())
            .map(|i| (predicted[(i, 0)], predicted[(i, 1)]))
            .collect())
    }

    fn train(&mut self, features: &[Features], targets: &[(f64, f64)]) -> Result<()> {
        if features.is_empty() || features.len() != targets.len() {
            return Err(Error::Model(format!(
                "Training set mismatch: {} feature rows, {} targets",
                features.len(),
                targets.len()
            )));
        }
        let dim = features[0].0.len();
        if dim == 0 || features.iter().any(|f| f.0.len() != dim) {
            return Err(Error::Model("Inconsistent feature dimensions".to_string()));
        }

        let design = Self::design_matrix(features, dim);
        let target_matrix =
            DMatrix::from_fn(targets.len(), 2, |row, col| if col == 0 { targets[row].0 } else { targets[row].1 });

        // Normal equations: (X^T X + alpha I) W = X^T Y
        let gram = design.transpose() * &design + DMatrix::identity(dim + 1, dim + 1) * self.alpha;
        let rhs = design.transpose() * target_matrix;

        let weights = gram
            .lu()
            .solve(&rhs)
            .ok_or_else(|| Error::Model("Ridge system is singular; increase alpha".to_string()))?;

        self.weights = Some(weights);
        Ok(())
    }

    fn is_trained(&self) -> bool {
        self.weights.is_some()
    }

    fn clear(&mut self) {
        self.weights = None;
    }

    fn save(&self, path: &Path) -> Result<()> {
        let weights = self
            .weights
            .as_ref()
            .ok_or_else(|| Error::Model("No trained model to save".to_string()))?;

        let model = RidgeModel {
            alpha: self.alpha,
            weights: weights.row_iter().map(|r| r.iter().copied().collect()).collect(),
        };
        let content = serde_json::to_string_pretty(&model)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    fn load(&mut self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Err(Error::Model(format!("Model file not found: {}", path.display())));
        }

        let content = std::fs::read_to_string(path)?;
        let model: RidgeModel = serde_json::from_str(&content)
            .map_err(|e| Error::Model(format!("Failed to parse model file: {e}")))?;

        let rows = model.weights.len();
        let cols = model.weights.first().map_or(0, Vec::len);
        if rows < 2 || cols != 2 || model.weights.iter().any(|r| r.len() != cols) {
            return Err(Error::Model("Malformed model weights".to_string()));
        }

        self.alpha = model.alpha;
        self.weights = Some(DMatrix::from_fn(rows, cols, |i, j| model.weights[i][j]));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn training_set() -> (Vec<Features>, Vec<(f64, f64)>) {
        // Targets are an exact linear function of the features, so ridge
        // with small alpha recovers them closely
        let features: Vec<Features> = (0..20)
            .map(|i| {
                let nx = f64::from(i) / 19.0;
                let ny = f64::from((i * 7) % 20) / 19.0;
                Features(vec![nx, ny, 0.5 * (nx + ny)])
            })
            .collect();
        let targets: Vec<(f64, f64)> = features
            .iter()
            .map(|f| (f.0[0] * 1920.0, f.0[1] * 1080.0))
            .collect();
        (features, targets)
    }

    #[test]
    fn test_predict_requires_training() {
        let estimator = RidgeEstimator::new(1.0);
        assert!(!estimator.is_trained());
        assert!(estimator.predict(&[Features(vec![0.5, 0.5, 0.5])]).is_err());
    }

    #[test]
    fn test_train_then_predict() {
        let mut estimator = RidgeEstimator::new(1e-6);
        let (features, targets) = training_set();
        estimator.train(&features, &targets).expect("train");
        assert!(estimator.is_trained());

        let predictions = estimator.predict(&features).expect("predict");
        for (pred, target) in predictions.iter().zip(&targets) {
            assert!((pred.0 - target.0).abs() < 1.0, "{} vs {}", pred.0, target.0);
            assert!((pred.1 - target.1).abs() < 1.0, "{} vs {}", pred.1, target.1);
        }
    }

    #[test]
    fn test_clear_discards_model() {
        let mut estimator = RidgeEstimator::new(1e-6);
        let (features, targets) = training_set();
        estimator.train(&features, &targets).expect("train");
        estimator.clear();
        assert!(!estimator.is_trained());
    }

    #[test]
    fn test_extract_features_flags() {
        let estimator = RidgeEstimator::new(1.0);

        let (features, blink) = estimator.extract_features(&Frame::no_face());
        assert!(features.is_none());
        assert!(!blink);

        let (features, blink) = estimator.extract_features(&Frame::blink());
        assert!(features.is_none());
        assert!(blink);

        let (features, blink) = estimator.extract_features(&Frame::features(&[0.1, 0.2, 0.3]));
        assert_eq!(features, Some(Features(vec![0.1, 0.2, 0.3])));
        assert!(!blink);
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = std::env::temp_dir().join("gaze_tracking_estimator_test");
        std::fs::create_dir_all(&dir).expect("tempdir");
        let path = dir.join("model.json");

        let mut estimator = RidgeEstimator::new(1e-6);
        let (features, targets) = training_set();
        estimator.train(&features, &targets).expect("train");
        let before = estimator.predict(&features[..3]).expect("predict");

        estimator.save(&path).expect("save");

        let mut loaded = RidgeEstimator::new(1.0);
        loaded.load(&path).expect("load");
        let after = loaded.predict(&features[..3]).expect("predict");
        assert_eq!(before, after);

        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn test_load_missing_file() {
        let mut estimator = RidgeEstimator::new(1.0);
        let err = estimator
            .load(Path::new("/nonexistent/gaze_model.json"))
            .expect_err("must fail");
        assert!(err.to_string().contains("Model file not found"));
    }

    #[test]
    fn test_feature_dimension_mismatch() {
        let mut estimator = RidgeEstimator::new(1e-6);
        let (features, targets) = training_set();
        estimator.train(&features, &targets).expect("train");

        let err = estimator.predict(&[Features(vec![0.5])]).expect_err("must fail");
        assert!(err.to_string().contains("dimension mismatch"));
    }
}
