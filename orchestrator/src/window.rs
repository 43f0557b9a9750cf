use chrono::{Duration, NaiveDateTime};
use ndarray::{Array2, Array3, ArrayView2, ArrayView3, Axis, concatenate, s};
use serde::Deserialize;

use crate::{
    error::{ForecastError, Result},
    order::EntityOrder,
    registry::{EntityId, StaticRegistry},
    series::{RawSeries, UnionTable, deserialize_timestamp, format_timestamp},
};

/// The derived wind components, appended after the remaining features.
pub const WIND_COMPONENTS: [&str; 2] = ["wind_x_component", "wind_y_component"];

/// The range of forecast labels requested from a run. Open ends fall back to the data bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub struct ForecastSpan {
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub start: Option<NaiveDateTime>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub end: Option<NaiveDateTime>,
}

impl ForecastSpan {
    pub fn new(start: Option<NaiveDateTime>, end: Option<NaiveDateTime>) -> Self {
        Self { start, end }
    }

    /// A span holding a single label.
    pub fn at(ts: NaiveDateTime) -> Self {
        Self::new(Some(ts), Some(ts))
    }
}

/// The lag windows of a single location, one per forecast label.
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeriesWindow {
    entity_id: EntityId,
    timestamps: Vec<NaiveDateTime>,
    features: Array3<f32>,
    feature_names: Vec<String>,
}

impl TimeSeriesWindow {
    /// Creates a new `TimeSeriesWindow`.
    ///
    /// # Arguments
    /// * `entity_id` - The location the windows belong to.
    /// * `timestamps` - The forecast label of every window.
    /// * `features` - The `(windows, lag, features)` tensor.
    /// * `feature_names` - The name of every feature.
    pub fn new(
        entity_id: EntityId,
        timestamps: Vec<NaiveDateTime>,
        features: Array3<f32>,
        feature_names: Vec<String>,
    ) -> Result<Self> {
        let (windows, _, f) = features.dim();
        if windows != timestamps.len() {
            return Err(ForecastError::shape("window labels", timestamps.len(), windows));
        }
        if f != feature_names.len() {
            return Err(ForecastError::shape("feature names", feature_names.len(), f));
        }

        Ok(Self {
            entity_id,
            timestamps,
            features,
            feature_names,
        })
    }

    pub fn entity_id(&self) -> EntityId {
        self.entity_id
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn features(&self) -> ArrayView3<'_, f32> {
        self.features.view()
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// The number of windows.
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn lag(&self) -> usize {
        self.features.len_of(Axis(1))
    }

    pub fn feature_count(&self) -> usize {
        self.features.len_of(Axis(2))
    }
}

/// One lag window per location, all ending at the same anchor.
#[derive(Debug, Clone, PartialEq)]
pub struct JointWindow {
    order: EntityOrder,
    anchor: NaiveDateTime,
    timestamps: Vec<NaiveDateTime>,
    features: Array3<f32>,
}

impl JointWindow {
    /// The entity order the first axis of the features follows.
    pub fn order(&self) -> &EntityOrder {
        &self.order
    }

    /// The last observed timestamp of every window.
    pub fn anchor(&self) -> NaiveDateTime {
        self.anchor
    }

    /// The forecast labels, one per horizon step.
    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    /// The `(entities, lag, features)` tensor.
    pub fn features(&self) -> ArrayView3<'_, f32> {
        self.features.view()
    }

    pub fn horizon(&self) -> usize {
        self.timestamps.len()
    }
}

/// Turns raw series into fixed length lag windows.
#[derive(Debug, Clone)]
pub struct WindowExtractor {
    lag: usize,
    step: Duration,
    wind: Option<String>,
}

impl WindowExtractor {
    /// Creates a new `WindowExtractor`.
    ///
    /// # Arguments
    /// * `lag` - The number of observations in each window.
    /// * `step` - The spacing between consecutive observations.
    /// * `wind` - The wind direction column to derive the wind components from, if any.
    pub fn new(lag: usize, step: Duration, wind: Option<String>) -> Self {
        Self { lag, step, wind }
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    pub fn step(&self) -> Duration {
        self.step
    }

    /// Applies the feature derivations configured for this extractor.
    pub fn prepare(&self, series: &RawSeries) -> Result<RawSeries> {
        match &self.wind {
            Some(column) => derive_wind(series, column),
            None => Ok(series.clone()),
        }
    }

    /// The names of the features in the windows built out of series with the given columns.
    pub fn feature_names(&self, columns: &[String]) -> Vec<String> {
        match &self.wind {
            Some(wind) if columns.contains(wind) => columns
                .iter()
                .filter(|c| *c != wind)
                .cloned()
                .chain(WIND_COMPONENTS.iter().map(|c| c.to_string()))
                .collect(),
            _ => columns.to_vec(),
        }
    }

    /// Builds one window per forecast label of a single location.
    ///
    /// # Arguments
    /// * `entity_id` - The location the series belongs to.
    /// * `series` - The raw observations of the location.
    /// * `span` - The requested labels.
    ///
    /// # Returns
    /// The windows, or `InsufficientHistory` if the span lies outside the series or any
    /// label lacks `lag` valid observations.
    pub fn extract(
        &self,
        entity_id: EntityId,
        series: &RawSeries,
        span: &ForecastSpan,
    ) -> Result<TimeSeriesWindow> {
        let series = self.prepare(series)?;
        let ts = series.timestamps();
        let (Some(first), Some(last)) = (ts.first(), ts.last()) else {
            return Err(ForecastError::InsufficientHistory(format!(
                "location {entity_id} has no observations"
            )));
        };

        for requested in [span.start, span.end].into_iter().flatten() {
            if requested < *first || requested > *last {
                return Err(ForecastError::InsufficientHistory(format!(
                    "{} is outside the available range {}..{} of location {entity_id}",
                    format_timestamp(&requested),
                    format_timestamp(first),
                    format_timestamp(last),
                )));
            }
        }

        let start = match span.start {
            Some(start) => ts.partition_point(|t| *t < start),
            None => self.lag.saturating_sub(1),
        };
        let end = match span.end {
            Some(end) => ts.partition_point(|t| *t <= end),
            None => ts.len(),
        };

        if start >= end {
            return Err(ForecastError::InsufficientHistory(format!(
                "location {entity_id} has no observation to forecast from inside the requested span"
            )));
        }

        let mut features = Array3::zeros((end - start, self.lag, series.columns().len()));
        for (mut dst, i) in features.outer_iter_mut().zip(start..end) {
            dst.assign(&self.window_at(&series, i)?);
        }

        TimeSeriesWindow::new(
            entity_id,
            ts[start..end].to_vec(),
            features,
            series.columns().to_vec(),
        )
    }

    /// Builds a single window per location, all ending at the same anchor.
    ///
    /// # Arguments
    /// * `table` - The series of every location, keyed by display name.
    /// * `registry` - The registry the location names are resolved against.
    /// * `span` - Its end, when set, is used as the anchor.
    /// * `horizon` - The number of forecast labels after the anchor.
    ///
    /// # Returns
    /// The joint window, carrying the entity order its rows follow.
    pub fn extract_joint(
        &self,
        table: &UnionTable,
        registry: &StaticRegistry,
        span: &ForecastSpan,
        horizon: usize,
    ) -> Result<JointWindow> {
        let order = EntityOrder::new(table.locations(), registry)?;

        let prepared = order
            .names()
            .map(|name| match table.get(name) {
                Some(series) => self.prepare(series),
                None => Err(ForecastError::UnknownEntity(name.to_string())),
            })
            .collect::<Result<Vec<_>>>()?;

        let latest_common = prepared
            .iter()
            .filter_map(|series| series.timestamps().last().copied())
            .min();
        let anchor = span.end.or(latest_common).ok_or_else(|| {
            ForecastError::InsufficientHistory("the joint source has no observations".into())
        })?;

        let mut windows = Vec::with_capacity(prepared.len());
        for ((name, _), series) in order.iter().zip(&prepared) {
            let ts = series.timestamps();
            let i = ts.binary_search(&anchor).map_err(|_| {
                ForecastError::InsufficientHistory(format!(
                    "location {name:?} has no observation at {}",
                    format_timestamp(&anchor)
                ))
            })?;
            windows.push(self.window_at(series, i)?.insert_axis(Axis(0)));
        }

        let features = if windows.is_empty() {
            Array3::zeros((0, self.lag, 0))
        } else {
            concatenate(Axis(0), &windows).map_err(|e| {
                ForecastError::AdapterShapeMismatch(format!("joint windows disagree: {e}"))
            })?
        };

        let timestamps = (1..=horizon)
            .map(|k| {
                i32::try_from(k)
                    .ok()
                    .and_then(|k| self.step.checked_mul(k))
                    .and_then(|offset| anchor.checked_add_signed(offset))
                    .ok_or_else(|| {
                        ForecastError::InsufficientHistory(format!(
                            "forecast label {k} after {} is out of the representable range",
                            format_timestamp(&anchor)
                        ))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(JointWindow {
            order,
            anchor,
            timestamps,
            features,
        })
    }

    /// Returns the window ending at row `i`, checking that it is complete.
    fn window_at<'a>(&self, series: &'a RawSeries, i: usize) -> Result<ArrayView2<'a, f32>> {
        let ts = series.timestamps();
        let label = format_timestamp(&ts[i]);
        if i + 1 < self.lag {
            return Err(ForecastError::InsufficientHistory(format!(
                "only {} observation(s) up to {label}, {} needed",
                i + 1,
                self.lag
            )));
        }

        let first = i + 1 - self.lag;
        if let Some(pair) = ts[first..=i]
            .windows(2)
            .find(|pair| pair[1] - pair[0] != self.step)
        {
            return Err(ForecastError::InsufficientHistory(format!(
                "gap between {} and {} in the window ending at {label}",
                format_timestamp(&pair[0]),
                format_timestamp(&pair[1])
            )));
        }

        let window = series.values().slice(s![first..=i, ..]);
        if window.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::InsufficientHistory(format!(
                "missing values in the window ending at {label}"
            )));
        }

        Ok(window)
    }
}

/// Replaces the wind direction column, in degrees, with its x and y components.
///
/// Series without the column are returned unchanged.
pub fn derive_wind(series: &RawSeries, column: &str) -> Result<RawSeries> {
    let Some(idx) = series.column_index(column) else {
        return Ok(series.clone());
    };

    let values = series.values();
    let kept: Vec<usize> = (0..values.ncols()).filter(|&c| c != idx).collect();
    let radians = values.column(idx).mapv(f32::to_radians);
    let components = [radians.mapv(f32::cos), radians.mapv(f32::sin)];

    let mut derived = Array2::zeros((values.nrows(), kept.len() + components.len()));
    for (dst, &src) in kept.iter().enumerate() {
        derived.column_mut(dst).assign(&values.column(src));
    }
    for (k, component) in components.iter().enumerate() {
        derived.column_mut(kept.len() + k).assign(component);
    }

    let columns = kept
        .iter()
        .map(|&c| series.columns()[c].clone())
        .chain(WIND_COMPONENTS.iter().map(|c| c.to_string()))
        .collect();

    RawSeries::new(series.timestamps().to_vec(), columns, derived)
}
