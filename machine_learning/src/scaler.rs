use std::{fs::File, io::BufReader, path::Path};

use ndarray::{Array, Array1, ArrayView1, Axis, Dimension, Zip};

use crate::{MlErr, Result, artifact::ScalerSpec};

/// Standardization state fitted offline: `z = (x - mean) / std` per feature.
///
/// Features live on the last axis of whatever tensor is transformed.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    mean: Array1<f32>,
    std: Array1<f32>,
}

impl StandardScaler {
    /// Creates a new `StandardScaler`.
    ///
    /// A zero `std` is stored as `1`, so constant features are only centred.
    ///
    /// # Arguments
    /// * `mean` - The per feature mean.
    /// * `std` - The per feature standard deviation.
    ///
    /// # Returns
    /// A new scaler or an error if the vectors differ in length or hold non-finite values.
    pub fn new(mean: Vec<f32>, std: Vec<f32>) -> Result<Self> {
        if mean.len() != std.len() {
            return Err(MlErr::SizeMismatch {
                what: "scaler std",
                got: std.len(),
                expected: mean.len(),
            });
        }

        if mean.iter().chain(&std).any(|v| !v.is_finite()) {
            return Err(MlErr::InvalidArtifact(
                "scaler holds non-finite statistics".into(),
            ));
        }

        let std = std
            .into_iter()
            .map(|s| if s == 0. { 1. } else { s })
            .collect();

        Ok(Self {
            mean: Array1::from(mean),
            std: Array1::from_vec(std),
        })
    }

    /// Loads a scaler saved as `{ "mean": [...], "std": [...] }`.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        let spec: ScalerSpec = serde_json::from_reader(BufReader::new(file))?;
        log::debug!(
            "loaded scaler with {} feature(s) from {}",
            spec.mean.len(),
            path.as_ref().display()
        );
        spec.build()
    }

    /// Returns the amount of features this scaler was fitted on.
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn mean(&self) -> ArrayView1<'_, f32> {
        self.mean.view()
    }

    pub fn std(&self) -> ArrayView1<'_, f32> {
        self.std.view()
    }

    /// Maps `x` into the normalized space.
    pub fn transform<D: Dimension>(&self, x: Array<f32, D>) -> Result<Array<f32, D>> {
        self.apply(x, |v, mean, std| (v - mean) / std)
    }

    /// Maps normalized values back into physical units: `x * std + mean`.
    pub fn inverse_transform<D: Dimension>(&self, x: Array<f32, D>) -> Result<Array<f32, D>> {
        self.apply(x, |v, mean, std| v * std + mean)
    }

    fn apply<D, F>(&self, mut x: Array<f32, D>, f: F) -> Result<Array<f32, D>>
    where
        D: Dimension,
        F: Fn(f32, f32, f32) -> f32,
    {
        let last = x.ndim().checked_sub(1).map(Axis);
        let width = last.map(|axis| x.len_of(axis)).unwrap_or_default();

        let Some(axis) = last.filter(|_| width == self.dim()) else {
            return Err(MlErr::SizeMismatch {
                what: "scaled features",
                got: width,
                expected: self.dim(),
            });
        };

        for lane in x.lanes_mut(axis) {
            Zip::from(lane)
                .and(&self.mean)
                .and(&self.std)
                .for_each(|v, &mean, &std| *v = f(*v, mean, std));
        }

        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::{Array3, array};

    use super::*;

    #[test]
    fn inverse_undoes_transform() {
        let scaler = StandardScaler::new(vec![1., -2.], vec![2., 0.5]).unwrap();
        let x = array![[3., -1.], [0., 0.]];

        let z = scaler.transform(x.clone()).unwrap();
        assert_eq!(z, array![[1., 2.], [-0.5, 4.]]);

        let back = scaler.inverse_transform(z).unwrap();
        assert_eq!(back, x);
    }

    #[test]
    fn works_on_the_last_axis_of_any_tensor() {
        let scaler = StandardScaler::new(vec![10., 20., 30.], vec![1., 1., 1.]).unwrap();
        let x = Array3::<f32>::zeros((2, 4, 3));

        let y = scaler.inverse_transform(x).unwrap();

        assert!(y.lanes(Axis(2)).into_iter().all(|l| l == array![10., 20., 30.]));
    }

    #[test]
    fn zero_std_only_centres() {
        let scaler = StandardScaler::new(vec![5.], vec![0.]).unwrap();
        assert_eq!(scaler.transform(array![[7.]]).unwrap(), array![[2.]]);
    }

    #[test]
    fn rejects_wrong_width() {
        let scaler = StandardScaler::new(vec![0.; 6], vec![1.; 6]).unwrap();
        let err = scaler.inverse_transform(Array3::zeros((1, 3, 5))).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { got: 5, expected: 6, .. }));
    }

    #[test]
    fn rejects_mismatched_statistics() {
        assert!(StandardScaler::new(vec![0.; 2], vec![1.; 3]).is_err());
        assert!(StandardScaler::new(vec![f32::NAN], vec![1.]).is_err());
    }

    #[test]
    fn loads_from_json_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scaler.json");
        std::fs::write(&path, r#"{ "mean": [1.0, 2.0], "std": [3.0, 4.0] }"#).unwrap();

        let scaler = StandardScaler::from_file(&path).unwrap();

        assert_eq!(scaler.dim(), 2);
        assert_eq!(scaler.std(), array![3., 4.]);
    }
}
