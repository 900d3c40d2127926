//! On-disk model artifact: a dense feed-forward network.
//!
//! ```json
//! {
//!   "modelVersion": "2024.1",
//!   "featureSchemaVersion": 1,
//!   "metricTableVersion": 1,
//!   "featureNames": ["population_total", "..."],
//!   "outputs": ["trafficFlow", "..."],
//!   "layers": [{ "weights": [[0.1, "..."]], "bias": [0.0], "activation": "relu" }]
//! }
//! ```
//!
//! `weights` is row-major with one row per output unit.

use serde::{Deserialize, Serialize};
use urban_sim_simulation_models::Metric;

/// Per-layer activation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activation {
    #[default]
    Identity,
    Relu,
    Tanh,
}

impl Activation {
    fn apply(self, x: f64) -> f64 {
        match self {
            Self::Identity => x,
            Self::Relu => x.max(0.0),
            Self::Tanh => x.tanh(),
        }
    }
}

/// A fully connected layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DenseLayer {
    pub weights: Vec<Vec<f64>>,
    pub bias: Vec<f64>,
    #[serde(default)]
    pub activation: Activation,
}

impl DenseLayer {
    fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .iter()
            .zip(&self.bias)
            .map(|(row, bias)| {
                let sum: f64 = row.iter().zip(input).map(|(w, x)| w * x).sum();
                self.activation.apply(sum + bias)
            })
            .collect()
    }
}

/// The serialized model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ModelArtifact {
    pub model_version: String,
    pub feature_schema_version: u32,
    pub metric_table_version: u32,
    /// Expected input position names.
    pub feature_names: Vec<String>,
    /// Output position names.
    pub outputs: Vec<Metric>,
    pub layers: Vec<DenseLayer>,
}

impl ModelArtifact {
    /// Checks that the layers chain from `feature_names` to `outputs` and
    /// that every parameter is finite. Returns a description of the first
    /// problem found.
    ///
    /// # Errors
    ///
    /// Returns the problem description if the artifact is not runnable.
    pub fn validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("model has no layers".to_string());
        }

        let mut width = self.feature_names.len();
        for (i, layer) in self.layers.iter().enumerate() {
            if layer.weights.is_empty() {
                return Err(format!("layer {i} has no units"));
            }
            if layer.weights.len() != layer.bias.len() {
                return Err(format!(
                    "layer {i}: {} weight rows but {} biases",
                    layer.weights.len(),
                    layer.bias.len()
                ));
            }
            if let Some(row) = layer.weights.iter().position(|r| r.len() != width) {
                return Err(format!("layer {i} row {row}: expected {width} inputs"));
            }
            let finite = layer
                .bias
                .iter()
                .chain(layer.weights.iter().flatten())
                .all(|v| v.is_finite());
            if !finite {
                return Err(format!("layer {i} has non-finite parameters"));
            }
            width = layer.weights.len();
        }

        if width != self.outputs.len() {
            return Err(format!(
                "final layer has {width} units but {} outputs are named",
                self.outputs.len()
            ));
        }

        Ok(())
    }

    /// Number of inputs.
    #[must_use]
    pub fn input_len(&self) -> usize {
        self.feature_names.len()
    }

    /// Runs the network. `input` must have [`ModelArtifact::input_len`]
    /// values.
    #[must_use]
    pub fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.layers
            .iter()
            .fold(input.to_vec(), |activations, layer| layer.forward(&activations))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn artifact(layers: Vec<DenseLayer>) -> ModelArtifact {
        ModelArtifact {
            model_version: "t".to_string(),
            feature_schema_version: 1,
            metric_table_version: 1,
            feature_names: vec!["a".to_string(), "b".to_string()],
            outputs: vec![Metric::TrafficFlow],
            layers,
        }
    }

    #[test]
    fn forward_applies_layers_in_order() {
        let model = artifact(vec![
            DenseLayer {
                weights: vec![vec![1.0, -1.0], vec![0.5, 0.5]],
                bias: vec![0.0, 1.0],
                activation: Activation::Relu,
            },
            DenseLayer {
                weights: vec![vec![2.0, 1.0]],
                bias: vec![-0.5],
                activation: Activation::Identity,
            },
        ]);
        model.validate().unwrap();

        // hidden = relu([1 - 3, 0.5 + 1.5 + 1]) = [0, 3]; out = 0 + 3 - 0.5
        let out = model.forward(&[1.0, 3.0]);
        assert_eq!(out.len(), 1);
        assert!((out[0] - 2.5).abs() < 1e-12);
    }

    #[test]
    fn validate_catches_shape_errors() {
        let wrong_width = artifact(vec![DenseLayer {
            weights: vec![vec![1.0, 2.0, 3.0]],
            bias: vec![0.0],
            activation: Activation::Identity,
        }]);
        assert!(wrong_width.validate().unwrap_err().contains("expected 2 inputs"));

        let wrong_outputs = artifact(vec![DenseLayer {
            weights: vec![vec![1.0, 2.0], vec![3.0, 4.0]],
            bias: vec![0.0, 0.0],
            activation: Activation::Identity,
        }]);
        assert!(wrong_outputs.validate().is_err());

        assert!(artifact(vec![]).validate().is_err());
    }

    #[test]
    fn activation_defaults_to_identity() {
        let layer: DenseLayer =
            serde_json::from_str(r#"{"weights": [[1.0]], "bias": [0.0]}"#).unwrap();
        assert_eq!(layer.activation, Activation::Identity);
    }
}
