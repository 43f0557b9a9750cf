#![allow(dead_code)]

use std::{
    cell::RefCell,
    fs,
    path::{Path, PathBuf},
    rc::Rc,
};

use machine_learning::{Backend, MlErr, ModelInput, RawOutput, Scaling};
use ndarray::{Array1, Array2, Array3, Axis};

pub const REGISTRY: &str = "\
id,name,lat,lng,population
1,Ho Chi Minh,10.0,106.0,1000000
2,Ha Noi,21.0,105.8,8000000
3,Hue,16.4,107.5,
";

/// Writes `contents` under `dir`, creating parent directories, and returns the full path.
pub fn write(dir: &Path, rel: &str, contents: &str) -> PathBuf {
    let path = dir.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

/// An hourly csv series starting at midnight with the given rows of feature values.
pub fn hourly_csv(columns: &[&str], rows: &[Vec<f32>]) -> String {
    let mut csv = format!("time,{}\n", columns.join(","));
    for (h, row) in rows.iter().enumerate() {
        let values: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        csv.push_str(&format!("2024-12-01T{h:02}:00,{}\n", values.join(",")));
    }
    csv
}

/// Rows of the eight default weather features, with values that vary per row and location.
pub fn weather_rows(n: usize, offset: f32) -> Vec<Vec<f32>> {
    (0..n)
        .map(|h| {
            let h = h as f32;
            vec![
                25. + h + offset,
                80. - h,
                20. + offset,
                0.1 * h,
                1010. + h,
                50.,
                3. + offset,
                (45. * h) % 360.,
            ]
        })
        .collect()
}

pub const WEATHER: [&str; 8] = [
    "temperature_2m",
    "relative_humidity_2m",
    "dew_point_2m",
    "precipitation",
    "surface_pressure",
    "cloud_cover",
    "wind_speed_10m",
    "wind_direction_10m",
];

/// Every input a stub backend received.
pub type Calls = Rc<RefCell<Vec<ModelInput>>>;

/// A flat regressor emitting values with many decimals, some negative.
pub struct FlatStub {
    pub calls: Calls,
}

impl Backend for FlatStub {
    fn name(&self) -> &'static str {
        "flat stub"
    }

    fn scaling(&self) -> Scaling {
        Scaling::SelfScaling
    }

    fn predict(&mut self, input: ModelInput) -> machine_learning::Result<RawOutput> {
        let got = input.kind();
        let ModelInput::Flat(x) = &input else {
            return Err(MlErr::UnsupportedInput {
                backend: "flat stub",
                got,
            });
        };

        let y = Array2::from_shape_fn((x.nrows(), 6), |(i, c)| {
            x[[i, c]] * 0.3337 - 10. * (c % 2) as f32
        });
        self.calls.borrow_mut().push(input);
        Ok(RawOutput::Rows(y))
    }
}

/// A recurrent model whose step `s` emits `(s + 1) * 10 + channel` on every channel.
pub struct SequenceStub {
    pub steps: usize,
    pub calls: Calls,
}

impl Backend for SequenceStub {
    fn name(&self) -> &'static str {
        "sequence stub"
    }

    fn scaling(&self) -> Scaling {
        Scaling::SelfScaling
    }

    fn predict(&mut self, input: ModelInput) -> machine_learning::Result<RawOutput> {
        let got = input.kind();
        let ModelInput::Sequence { x, .. } = &input else {
            return Err(MlErr::UnsupportedInput {
                backend: "sequence stub",
                got,
            });
        };

        let y = Array3::from_shape_fn((x.len_of(Axis(0)), self.steps, 6), |(_, s, c)| {
            ((s + 1) * 10 + c) as f32
        });
        self.calls.borrow_mut().push(input);
        Ok(RawOutput::Sequence(y))
    }
}

/// A joint model whose output for each entity only depends on that entity's own window:
/// `mean(first feature) + step + channel / 10`.
pub struct JointStub {
    pub horizon: usize,
}

impl Backend for JointStub {
    fn name(&self) -> &'static str {
        "joint stub"
    }

    fn scaling(&self) -> Scaling {
        Scaling::ExternallyScaled
    }

    fn predict(&mut self, input: ModelInput) -> machine_learning::Result<RawOutput> {
        let got = input.kind();
        let ModelInput::Joint(x) = input else {
            return Err(MlErr::UnsupportedInput {
                backend: "joint stub",
                got,
            });
        };

        let entities = x.len_of(Axis(0));
        let mut y = Vec::with_capacity(entities * self.horizon * 6);
        for window in x.outer_iter() {
            let level = window.column(0).mean().unwrap_or(0.);
            for h in 0..self.horizon {
                for c in 0..6 {
                    y.push(level + h as f32 + c as f32 / 10.);
                }
            }
        }
        Ok(RawOutput::Flat(Array1::from(y)))
    }
}

/// Every value of a written forecast file, after the header.
pub fn forecast_rows(path: &Path) -> Vec<Vec<String>> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .skip(1)
        .map(|line| line.split(',').map(str::to_string).collect())
        .collect()
}
