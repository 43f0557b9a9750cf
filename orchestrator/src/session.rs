use std::path::{Path, PathBuf};

use machine_learning::{Backend, StandardScaler, load_backend};

use crate::{
    adapters::{Adapter, FlatAdapter, JointAdapter, SequenceAdapter},
    assembler::{Assembler, assemble},
    configs::{BackendConfig, DEFAULT_HORIZON, ForecastConfig},
    error::{ForecastError, Result},
    forecast::CHANNELS,
    registry::{EntityId, StaticRegistry},
    series::{RawSeries, UnionTable},
    window::{ForecastSpan, WindowExtractor},
};

/// The stages every unit of work goes through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    WindowBuilt,
    Encoded,
    Predicted,
    Decoded,
    Persisted,
}

impl Stage {
    pub fn next(self) -> Option<Stage> {
        use Stage::*;

        match self {
            Idle => Some(WindowBuilt),
            WindowBuilt => Some(Encoded),
            Encoded => Some(Predicted),
            Predicted => Some(Decoded),
            Decoded => Some(Persisted),
            Persisted => None,
        }
    }
}

/// Traces the stage of a single location, or of the joint call.
struct Unit {
    label: String,
    stage: Stage,
}

impl Unit {
    fn new(label: String) -> Self {
        Self {
            label,
            stage: Stage::Idle,
        }
    }

    fn advance(&mut self) {
        if let Some(next) = self.stage.next() {
            log::debug!("{}: {:?} -> {:?}", self.label, self.stage, next);
            self.stage = next;
        }
    }
}

/// The outcome of a run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// The backend that ran.
    pub backend: String,
    /// Every location whose forecast was written, with the file it was written to.
    pub written: Vec<(EntityId, PathBuf)>,
    /// Every location whose forecast failed, with the reason.
    pub failed: Vec<(EntityId, ForecastError)>,
}

impl RunReport {
    /// Whether every location got its forecast.
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// What the joint backend reads on top of the shared context.
struct JointSource {
    input: PathBuf,
    location_column: String,
    feature_scaler: StandardScaler,
    target_scaler: StandardScaler,
}

enum Dispatch {
    PerEntity { adapter: Adapter, input_dir: PathBuf },
    Joint { adapter: JointAdapter, source: JointSource },
}

/// The immutable state shared by every stage of a run.
struct Context<'r> {
    registry: &'r StaticRegistry,
    features: Vec<String>,
    span: ForecastSpan,
    extractor: WindowExtractor,
    assembler: Assembler,
}

impl Context<'_> {
    fn forecast_entity(
        &self,
        id: EntityId,
        adapter: &Adapter,
        input_dir: &Path,
        backend: &mut dyn Backend,
    ) -> Result<PathBuf> {
        let mut unit = Unit::new(format!("location {id}"));

        let statics = self.registry.lookup(id)?;
        let series = RawSeries::from_path(input_dir.join(format!("{id}.csv")), &self.features)?;
        let window = self.extractor.extract(id, &series, &self.span)?;
        unit.advance();

        let input = adapter.encode(&window, &statics)?;
        unit.advance();

        let raw = backend.predict(input).map_err(ForecastError::BackendFailure)?;
        unit.advance();

        let matrix = adapter.decode(raw, window.len())?;
        unit.advance();

        let records = assemble(id, window.timestamps(), &matrix)?;
        let path = self.assembler.persist(id, &records)?;
        unit.advance();

        Ok(path)
    }

    fn forecast_joint(
        &self,
        adapter: &JointAdapter,
        source: &JointSource,
        backend: &mut dyn Backend,
    ) -> Result<Vec<(EntityId, PathBuf)>> {
        let mut unit = Unit::new("joint".into());

        let table = UnionTable::from_path(&source.input, &source.location_column, &self.features)?;
        let window =
            self.extractor
                .extract_joint(&table, self.registry, &self.span, adapter.horizon())?;
        unit.advance();

        let input = adapter.encode(&window, &source.feature_scaler)?;
        unit.advance();

        let raw = backend.predict(input).map_err(ForecastError::BackendFailure)?;
        unit.advance();

        let forecasts = adapter.decode(raw, &source.target_scaler, window.order())?;
        unit.advance();

        let records = forecasts
            .iter()
            .map(|(id, matrix)| Ok((*id, assemble(*id, window.timestamps(), matrix)?)))
            .collect::<Result<Vec<_>>>()?;

        let written = self.assembler.persist_all(&records)?;
        unit.advance();

        Ok(written)
    }
}

/// A backend ready to forecast every location of the registry.
pub struct Session<'r> {
    name: String,
    context: Context<'r>,
    dispatch: Dispatch,
    backend: Box<dyn Backend>,
}

impl<'r> Session<'r> {
    /// Creates a new `Session` loading the backend's model artifact.
    ///
    /// # Arguments
    /// * `config` - The validated configuration.
    /// * `name` - The backend to run.
    /// * `registry` - The locations to forecast.
    pub fn new(config: &ForecastConfig, name: &str, registry: &'r StaticRegistry) -> Result<Self> {
        let model = config.backend(name)?.model();
        let backend = load_backend(model).map_err(ForecastError::BackendFailure)?;

        Self::with_backend(config, name, registry, backend)
    }

    /// Creates a new `Session` around an already built backend.
    ///
    /// # Arguments
    /// * `config` - The validated configuration.
    /// * `name` - The configured backend the given one stands for.
    /// * `registry` - The locations to forecast.
    /// * `backend` - The model to call.
    ///
    /// # Returns
    /// The session, or `InvalidConfig` if the backend's declared scaling doesn't match the
    /// configured kind.
    pub fn with_backend(
        config: &ForecastConfig,
        name: &str,
        registry: &'r StaticRegistry,
        backend: Box<dyn Backend>,
    ) -> Result<Self> {
        let backend_config = config.backend(name)?;
        if backend.scaling() != backend_config.scaling() {
            return Err(ForecastError::InvalidConfig(format!(
                "backend {name:?} is configured as {} but its model declares {:?} output",
                backend_config.kind(),
                backend.scaling()
            )));
        }

        let extractor = config.extractor(backend_config)?;
        let lag = extractor.lag();
        let features = extractor.feature_names(&config.features).len();

        let dispatch = match backend_config {
            BackendConfig::Flat(c) => Dispatch::PerEntity {
                adapter: Adapter::Flat(FlatAdapter::new(lag, features)),
                input_dir: c.input_dir.clone(),
            },
            BackendConfig::Sequence(c) => Dispatch::PerEntity {
                adapter: Adapter::Sequence(SequenceAdapter::new(lag, features)),
                input_dir: c.input_dir.clone(),
            },
            BackendConfig::Joint(c) => {
                let feature_scaler = load_scaler(&c.feature_scaler, features)?;
                let target_scaler = load_scaler(&c.target_scaler, CHANNELS)?;
                let horizon = backend_config.horizon().unwrap_or(DEFAULT_HORIZON);

                Dispatch::Joint {
                    adapter: JointAdapter::new(lag, features, horizon),
                    source: JointSource {
                        input: c.input.clone(),
                        location_column: c.location_column.clone(),
                        feature_scaler,
                        target_scaler,
                    },
                }
            }
        };

        Ok(Self {
            name: name.to_string(),
            context: Context {
                registry,
                features: config.features.clone(),
                span: config.span,
                extractor,
                assembler: Assembler::new(backend_config.output_dir()),
            },
            dispatch,
            backend,
        })
    }

    /// Forecasts every location and writes the results.
    ///
    /// Per-location backends carry on past a failing location and list it in the report.
    /// A failure of the joint backend aborts the whole run and leaves every previous forecast
    /// of it in place.
    pub fn run(&mut self) -> Result<RunReport> {
        log::info!(
            "running backend {:?} over {} location(s)",
            self.name,
            self.context.registry.len()
        );

        let mut report = RunReport {
            backend: self.name.clone(),
            ..Default::default()
        };

        match &self.dispatch {
            Dispatch::PerEntity { adapter, input_dir } => {
                for id in self.context.registry.ids() {
                    match self
                        .context
                        .forecast_entity(id, adapter, input_dir, self.backend.as_mut())
                    {
                        Ok(path) => report.written.push((id, path)),
                        Err(e) => {
                            log::warn!("location {id} skipped: {e}");
                            report.failed.push((id, e));
                        }
                    }
                }
            }
            Dispatch::Joint { adapter, source } => {
                report.written = self
                    .context
                    .forecast_joint(adapter, source, self.backend.as_mut())?;
            }
        }

        log::info!(
            "backend {:?} wrote {} forecast(s), {} location(s) failed",
            self.name,
            report.written.len(),
            report.failed.len()
        );
        Ok(report)
    }
}

fn load_scaler(path: &Path, dim: usize) -> Result<StandardScaler> {
    let scaler = StandardScaler::from_file(path).map_err(|e| {
        ForecastError::InvalidConfig(format!("cannot load scaler {}: {e}", path.display()))
    })?;

    if scaler.dim() != dim {
        return Err(ForecastError::shape(
            "scaler dimension",
            scaler.dim(),
            dim,
        ));
    }
    Ok(scaler)
}

#[cfg(test)]
mod tests {
    use machine_learning::{ModelInput, RawOutput, Scaling};
    use ndarray::Array2;

    use super::*;

    struct Constant;

    impl Backend for Constant {
        fn name(&self) -> &'static str {
            "constant"
        }

        fn scaling(&self) -> Scaling {
            Scaling::SelfScaling
        }

        fn predict(&mut self, input: ModelInput) -> machine_learning::Result<RawOutput> {
            let got = input.kind();
            match input {
                ModelInput::Flat(x) => Ok(RawOutput::Rows(Array2::from_elem((x.nrows(), 6), 1.5))),
                _ => Err(machine_learning::MlErr::UnsupportedInput {
                    backend: "constant",
                    got,
                }),
            }
        }
    }

    const CONFIG: &str = r#"{
        "registry": "registry.csv",
        "features": ["temp"],
        "backends": {
            "rf": { "kind": "flat", "model": "rf.json", "input_dir": "in", "output_dir": "out", "lag": 2 },
            "joint": {
                "kind": "joint", "model": "j.json", "input": "union.csv",
                "feature_scaler": "x.json", "target_scaler": "y.json",
                "output_dir": "out", "lag": 2, "derive_wind": false
            }
        }
    }"#;

    #[test]
    fn stages_run_in_order() {
        let mut stage = Stage::Idle;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            seen.push(next);
            stage = next;
        }

        assert_eq!(seen.len(), 6);
        assert_eq!(seen.last(), Some(&Stage::Persisted));
    }

    #[test]
    fn backends_must_declare_the_configured_scaling() {
        let config = ForecastConfig::from_json(CONFIG).unwrap();
        let registry = StaticRegistry::default();

        let err = Session::with_backend(&config, "joint", &registry, Box::new(Constant))
            .err()
            .unwrap();
        assert!(matches!(err, ForecastError::InvalidConfig(_)));
    }

    #[test]
    fn failing_locations_are_reported() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ForecastConfig::from_json(CONFIG).unwrap();
        config.rebase(dir.path());
        std::fs::create_dir(dir.path().join("in")).unwrap();
        std::fs::write(
            dir.path().join("in/1.csv"),
            "time,temp\n2024-01-01T00:00,1\n2024-01-01T01:00,2\n",
        )
        .unwrap();
        let registry = StaticRegistry::from_reader(
            "id,latitude,longitude,population\n1,0,0,1\n2,0,0,1\n".as_bytes(),
        )
        .unwrap();

        let mut session = Session::with_backend(&config, "rf", &registry, Box::new(Constant)).unwrap();
        let report = session.run().unwrap();

        assert!(!report.is_success());
        assert_eq!(report.backend, "rf");
        assert_eq!(report.written, vec![(1, dir.path().join("out/1.csv"))]);
        assert_eq!(report.failed.len(), 1);
        assert!(matches!(report.failed[0], (2, ForecastError::Io(_))));
    }
}
