// ==============================================================================
// network.rs — FIXED-TOPOLOGY FEED-FORWARD NETWORK
// ------------------------------------------------------------------------------
// 3 inputs (left, right, forward distances)
// 6 hidden units, tanh
// 3 outputs, sigmoid → [0, 1]
//
// Weights live in a JSON blob written by the training collaborator. Inference
// has no internal state and no randomness.
// ==============================================================================

use std::fs;
use std::path::Path;

use log::warn;
use nalgebra::{DMatrix, DVector};
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const TOPOLOGY: [usize; 3] = [3, 6, 3];

#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("reading network weights: {0}")]
    Io(#[from] std::io::Error),

    #[error("decoding network weights: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("layer {layer}: expected {expected} values, found {found}")]
    Shape { layer: usize, expected: usize, found: usize },

    #[error("expected {expected} layers, found {found}")]
    LayerCount { expected: usize, found: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
    Tanh,
    Sigmoid,
}

impl Activation {
    fn apply(self, x: f32) -> f32 {
        match self {
            Activation::Tanh => x.tanh(),
            Activation::Sigmoid => 1.0 / (1.0 + (-x).exp()),
        }
    }
}

/// Serialized form of one layer: row-major `outputs × inputs` weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    pub weights: Vec<f32>,
    pub biases: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkParams {
    pub layers: Vec<LayerParams>,
}

#[derive(Debug, Clone, PartialEq)]
struct Layer {
    weights: DMatrix<f32>,
    biases: DVector<f32>,
    activation: Activation,
}

impl Layer {
    fn forward(&self, input: &DVector<f32>) -> DVector<f32> {
        (&self.weights * input + &self.biases).map(|x| self.activation.apply(x))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RaceNet {
    layers: Vec<Layer>,
}

fn activation_for(layer: usize) -> Activation {
    if layer + 2 == TOPOLOGY.len() { Activation::Sigmoid } else { Activation::Tanh }
}

impl RaceNet {
    /// Uniform weights in [-1, 1].
    pub fn random(rng: &mut impl Rng) -> Self {
        let layers = TOPOLOGY
            .windows(2)
            .enumerate()
            .map(|(i, w)| {
                let (inputs, outputs) = (w[0], w[1]);
                Layer {
                    weights: DMatrix::from_fn(outputs, inputs, |_, _| rng.gen_range(-1.0..=1.0)),
                    biases: DVector::from_fn(outputs, |_, _| rng.gen_range(-1.0..=1.0)),
                    activation: activation_for(i),
                }
            })
            .collect();
        Self { layers }
    }

    pub fn from_params(params: &NetworkParams) -> Result<Self, NetworkError> {
        let expected = TOPOLOGY.len() - 1;
        if params.layers.len() != expected {
            return Err(NetworkError::LayerCount { expected, found: params.layers.len() });
        }

        let mut layers = Vec::with_capacity(expected);
        for (i, (p, w)) in params.layers.iter().zip(TOPOLOGY.windows(2)).enumerate() {
            let (inputs, outputs) = (w[0], w[1]);
            if p.weights.len() != inputs * outputs {
                return Err(NetworkError::Shape { layer: i, expected: inputs * outputs, found: p.weights.len() });
            }
            if p.biases.len() != outputs {
                return Err(NetworkError::Shape { layer: i, expected: outputs, found: p.biases.len() });
            }
            layers.push(Layer {
                weights: DMatrix::from_row_slice(outputs, inputs, &p.weights),
                biases: DVector::from_column_slice(&p.biases),
                activation: activation_for(i),
            });
        }
        Ok(Self { layers })
    }

    pub fn params(&self) -> NetworkParams {
        NetworkParams {
            layers: self
                .layers
                .iter()
                .map(|l| LayerParams {
                    weights: l.weights.transpose().iter().copied().collect(),
                    biases: l.biases.iter().copied().collect(),
                })
                .collect(),
        }
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, NetworkError> {
        let text = fs::read_to_string(path)?;
        let params: NetworkParams = serde_json::from_str(&text)?;
        Self::from_params(&params)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), NetworkError> {
        let text = serde_json::to_string_pretty(&self.params())?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Falls back to random weights when the blob is absent or malformed.
    /// The flag is false in that case.
    pub fn load_or_random(path: impl AsRef<Path>, rng: &mut impl Rng) -> (Self, bool) {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(net) => (net, true),
            Err(e) => {
                warn!(
                    "Could not load network weights from {} ({e}); using random weights",
                    path.display()
                );
                (Self::random(rng), false)
            }
        }
    }

    pub fn infer(&self, inputs: [f32; 3]) -> [f32; 3] {
        let mut x = DVector::from_column_slice(&inputs);
        for layer in &self.layers {
            x = layer.forward(&x);
        }
        let mut out = [0.0; 3];
        for (o, v) in out.iter_mut().zip(x.iter()) {
            *o = *v;
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn logit(p: f32) -> f32 {
        (p / (1.0 - p)).ln()
    }

    /// Zero weights, output biases chosen so the sigmoid lands on `outputs`.
    fn fixed_output_params(outputs: [f32; 3]) -> NetworkParams {
        NetworkParams {
            layers: vec![
                LayerParams { weights: vec![0.0; 18], biases: vec![0.0; 6] },
                LayerParams { weights: vec![0.0; 18], biases: outputs.iter().map(|p| logit(*p)).collect() },
            ],
        }
    }

    #[test]
    fn fixed_biases_produce_expected_outputs() {
        let net = RaceNet::from_params(&fixed_output_params([0.9, 0.1, 0.8])).unwrap();
        let out = net.infer([0.2, 5.0, 5.0]);
        for (o, e) in out.iter().zip([0.9, 0.1, 0.8]) {
            assert!((o - e).abs() < 1e-5, "{out:?}");
        }
    }

    #[test]
    fn inference_is_pure() {
        let net = RaceNet::random(&mut StdRng::seed_from_u64(7));
        let a = net.infer([1.0, 2.0, 3.0]);
        let b = net.infer([1.0, 2.0, 3.0]);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| (0.0..=1.0).contains(v)));
    }

    #[test]
    fn params_survive_a_file_round_trip() {
        let net = RaceNet::random(&mut StdRng::seed_from_u64(11));
        let path = std::env::temp_dir().join("racenet-roundtrip-weights.json");
        net.save(&path).unwrap();
        let loaded = RaceNet::load(&path).unwrap();
        let _ = fs::remove_file(&path);

        assert_eq!(loaded.infer([0.5, 4.0, 9.0]), net.infer([0.5, 4.0, 9.0]));
    }

    #[test]
    fn wrong_shapes_are_rejected() {
        let mut params = fixed_output_params([0.5; 3]);
        params.layers[1].weights.pop();
        assert!(matches!(
            RaceNet::from_params(&params),
            Err(NetworkError::Shape { layer: 1, expected: 18, found: 17 })
        ));

        params.layers.pop();
        assert!(matches!(
            RaceNet::from_params(&params),
            Err(NetworkError::LayerCount { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn missing_file_falls_back_to_random_weights() {
        let path = std::env::temp_dir().join("racenet-definitely-missing.json");
        let (net, loaded) = RaceNet::load_or_random(&path, &mut StdRng::seed_from_u64(3));
        assert!(!loaded);
        let out = net.infer([1.0, 1.0, 1.0]);
        assert!(out.iter().all(|v| v.is_finite()));
    }
}
