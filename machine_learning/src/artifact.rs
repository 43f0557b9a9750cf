//! On-disk model artifacts.
//!
//! Every backend is saved as a JSON document tagged by `kind`, holding its layer shapes and
//! flat parameter vectors. Parameters follow the layouts documented on each layer.

use std::{fs::File, io::BufReader, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    Result,
    arch::{
        Sequential,
        activations::ActFn,
        layers::{Dense, Gru, Layer, LayerNorm},
    },
    backend::Backend,
    models::{Recurrent, Regressor, SpatioTemporal},
    scaler::StandardScaler,
};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Sigmoid { amp: f32 },
    Relu,
    Tanh,
}

/// The specification for the `Dense` layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DenseSpec {
    pub dim: (usize, usize),
    #[serde(default)]
    pub act_fn: Option<ActFnSpec>,
    pub params: Vec<f32>,
}

/// The specification for the `LayerNorm` layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerNormSpec {
    pub gamma: Vec<f32>,
    pub beta: Vec<f32>,
    #[serde(default = "default_eps")]
    pub eps: f32,
}

fn default_eps() -> f32 {
    crate::arch::layers::DEFAULT_EPS
}

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense(DenseSpec),
    LayerNorm(LayerNormSpec),
}

/// The specification for the `Gru` layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GruSpec {
    pub input_size: usize,
    pub hidden_size: usize,
    pub w_ih: Vec<f32>,
    pub w_hh: Vec<f32>,
    pub b_ih: Vec<f32>,
    pub b_hh: Vec<f32>,
}

/// The specification for the `StandardScaler`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalerSpec {
    pub mean: Vec<f32>,
    pub std: Vec<f32>,
}

/// The specification for every loadable backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackendSpec {
    Regressor {
        layers: Vec<LayerSpec>,
    },
    Recurrent {
        seq_len: usize,
        input_size: usize,
        norm: LayerNormSpec,
        seed: Vec<LayerSpec>,
        grus: Vec<GruSpec>,
        head: DenseSpec,
        label_scaler: ScalerSpec,
    },
    SpatioTemporal {
        lag: usize,
        features: usize,
        horizon: usize,
        channels: usize,
        layers: Vec<LayerSpec>,
    },
}

impl ActFnSpec {
    pub fn build(self) -> ActFn {
        match self {
            ActFnSpec::Sigmoid { amp } => ActFn::sigmoid(amp),
            ActFnSpec::Relu => ActFn::relu(),
            ActFnSpec::Tanh => ActFn::tanh(),
        }
    }
}

impl DenseSpec {
    pub fn build(self) -> Result<Dense> {
        Dense::new(self.dim, &self.params, self.act_fn.map(ActFnSpec::build))
    }
}

impl LayerNormSpec {
    pub fn build(self) -> Result<LayerNorm> {
        LayerNorm::new(self.gamma, self.beta, self.eps)
    }
}

impl LayerSpec {
    pub fn build(self) -> Result<Layer> {
        Ok(match self {
            LayerSpec::Dense(spec) => Layer::Dense(spec.build()?),
            LayerSpec::LayerNorm(spec) => Layer::LayerNorm(spec.build()?),
        })
    }
}

impl GruSpec {
    pub fn build(self) -> Result<Gru> {
        Gru::new(
            self.input_size,
            self.hidden_size,
            self.w_ih,
            self.w_hh,
            self.b_ih,
            self.b_hh,
        )
    }
}

impl ScalerSpec {
    pub fn build(self) -> Result<StandardScaler> {
        StandardScaler::new(self.mean, self.std)
    }
}

fn sequential(layers: Vec<LayerSpec>) -> Result<Sequential> {
    let layers = layers
        .into_iter()
        .map(LayerSpec::build)
        .collect::<Result<Vec<_>>>()?;

    Sequential::new(layers)
}

impl BackendSpec {
    /// Instantiates the backend this artifact describes.
    pub fn build(self) -> Result<Box<dyn Backend>> {
        let backend: Box<dyn Backend> = match self {
            BackendSpec::Regressor { layers } => Box::new(Regressor::new(sequential(layers)?)),
            BackendSpec::Recurrent {
                seq_len,
                input_size,
                norm,
                seed,
                grus,
                head,
                label_scaler,
            } => {
                let grus = grus
                    .into_iter()
                    .map(GruSpec::build)
                    .collect::<Result<Vec<_>>>()?;

                Box::new(Recurrent::new(
                    seq_len,
                    input_size,
                    norm.build()?,
                    sequential(seed)?,
                    grus,
                    head.build()?,
                    label_scaler.build()?,
                )?)
            }
            BackendSpec::SpatioTemporal {
                lag,
                features,
                horizon,
                channels,
                layers,
            } => Box::new(SpatioTemporal::new(
                lag,
                features,
                horizon,
                channels,
                sequential(layers)?,
            )?),
        };

        Ok(backend)
    }
}

/// Loads a backend artifact from disk.
///
/// # Arguments
/// * `path` - The path of the JSON artifact.
///
/// # Returns
/// The ready to use backend or an error if the file can't be read or describes an invalid model.
pub fn load_backend<P: AsRef<Path>>(path: P) -> Result<Box<dyn Backend>> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let spec: BackendSpec = serde_json::from_reader(BufReader::new(file))?;

    let backend = spec.build()?;
    log::info!("loaded {} backend from {}", backend.name(), path.display());
    Ok(backend)
}

#[cfg(test)]
mod tests {
    use ndarray::{Array2, Array3};

    use super::*;
    use crate::{MlErr, backend::{ModelInput, RawOutput, Scaling}};

    #[test]
    fn builds_a_regressor() {
        let json = r#"{
            "kind": "regressor",
            "layers": [
                { "dense": { "dim": [2, 1], "act_fn": "relu", "params": [1.0, 1.0, -1.0] } }
            ]
        }"#;

        let spec: BackendSpec = serde_json::from_str(json).unwrap();
        let mut backend = spec.build().unwrap();
        assert_eq!(backend.scaling(), Scaling::SelfScaling);

        let RawOutput::Rows(y) = backend.predict(ModelInput::Flat(Array2::ones((2, 2)))).unwrap()
        else {
            panic!("expected rows");
        };
        assert!(y.iter().all(|v| *v == 1.));
    }

    #[test]
    fn builds_a_recurrent_model() {
        let json = r#"{
            "kind": "recurrent",
            "seq_len": 2,
            "input_size": 1,
            "norm": { "gamma": [1.0, 1.0], "beta": [0.0, 0.0] },
            "seed": [
                { "layer_norm": { "gamma": [1.0, 1.0, 1.0], "beta": [0.0, 0.0, 0.0] } },
                { "dense": { "dim": [3, 1], "act_fn": "relu", "params": [0.0, 0.0, 0.0, 0.0] } }
            ],
            "grus": [
                { "input_size": 1, "hidden_size": 1, "w_ih": [0.0, 0.0, 0.0],
                  "w_hh": [0.0, 0.0, 0.0], "b_ih": [0.0, 0.0, 0.0], "b_hh": [0.0, 0.0, 0.0] }
            ],
            "head": { "dim": [1, 1], "params": [0.0, 2.0] },
            "label_scaler": { "mean": [1.0], "std": [3.0] }
        }"#;

        let spec: BackendSpec = serde_json::from_str(json).unwrap();
        let mut backend = spec.build().unwrap();

        let input = ModelInput::Sequence {
            x: Array3::ones((1, 2, 1)),
            seed: Array2::ones((1, 3)),
        };
        let RawOutput::Sequence(y) = backend.predict(input).unwrap() else {
            panic!("expected a sequence");
        };
        assert_eq!(y.dim(), (1, 2, 1));
        assert!(y.iter().all(|v| *v == 7.));
    }

    #[test]
    fn builds_an_externally_scaled_joint_model() {
        let json = r#"{
            "kind": "spatio_temporal",
            "lag": 1, "features": 1, "horizon": 1, "channels": 1,
            "layers": [ { "dense": { "dim": [2, 1], "params": [1.0, 1.0, 0.0] } } ]
        }"#;

        let spec: BackendSpec = serde_json::from_str(json).unwrap();
        let backend = spec.build().unwrap();
        assert_eq!(backend.scaling(), Scaling::ExternallyScaled);
    }

    #[test]
    fn invalid_shapes_fail_to_build() {
        let json = r#"{
            "kind": "regressor",
            "layers": [ { "dense": { "dim": [2, 2], "params": [1.0] } } ]
        }"#;

        let spec: BackendSpec = serde_json::from_str(json).unwrap();
        assert!(matches!(spec.build(), Err(MlErr::SizeMismatch { .. })));
    }

    #[test]
    fn loads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(
            &path,
            r#"{ "kind": "regressor", "layers": [ { "dense": { "dim": [1, 1], "params": [2.0, 0.0] } } ] }"#,
        )
        .unwrap();

        let backend = load_backend(&path).unwrap();
        assert_eq!(backend.name(), "regressor");

        assert!(matches!(
            load_backend(dir.path().join("missing.json")),
            Err(MlErr::Io(_))
        ));
    }
}
