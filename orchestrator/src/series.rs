use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use chrono::NaiveDateTime;
use ndarray::Array2;
use serde::{Deserialize, Deserializer};

use crate::error::{ForecastError, Result};

/// The name of the timestamp column in every time series file.
pub const TIME_COLUMN: &str = "time";

/// The format timestamps are written with.
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M";

const ACCEPTED_FORMATS: [&str; 4] = [
    TIME_FORMAT,
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Parses a timestamp with minute or second precision.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();
    ACCEPTED_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .ok_or_else(|| ForecastError::InvalidData(format!("unparseable timestamp {raw:?}")))
}

pub fn format_timestamp(ts: &NaiveDateTime) -> String {
    ts.format(TIME_FORMAT).to_string()
}

/// Deserializes an optional timestamp in any of the accepted formats.
pub(crate) fn deserialize_timestamp<'de, D>(
    deserializer: D,
) -> std::result::Result<Option<NaiveDateTime>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer)?
        .map(|raw| parse_timestamp(&raw).map_err(serde::de::Error::custom))
        .transpose()
}

/// The raw observations of a single location: one row per timestamp, one column per feature.
///
/// Rows are sorted by time and timestamps are unique. Missing values are `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSeries {
    timestamps: Vec<NaiveDateTime>,
    columns: Vec<String>,
    values: Array2<f32>,
}

impl RawSeries {
    /// Creates a new `RawSeries`.
    ///
    /// # Arguments
    /// * `timestamps` - The time of every row, strictly increasing.
    /// * `columns` - The feature names.
    /// * `values` - The `(rows, columns)` observations.
    ///
    /// # Returns
    /// The series, or `InvalidData` if the dimensions disagree or the timestamps aren't strictly increasing.
    pub fn new(
        timestamps: Vec<NaiveDateTime>,
        columns: Vec<String>,
        values: Array2<f32>,
    ) -> Result<Self> {
        let (rows, cols) = values.dim();
        if rows != timestamps.len() || cols != columns.len() {
            return Err(ForecastError::InvalidData(format!(
                "series values are {rows}x{cols} but there are {} timestamp(s) and {} column(s)",
                timestamps.len(),
                columns.len()
            )));
        }

        if let Some(pair) = timestamps.windows(2).find(|pair| pair[0] >= pair[1]) {
            return Err(ForecastError::InvalidData(format!(
                "timestamps are not strictly increasing at {}",
                format_timestamp(&pair[1])
            )));
        }

        Ok(Self {
            timestamps,
            columns,
            values,
        })
    }

    /// Sorts the given rows by time and builds the series out of them.
    fn from_rows(columns: Vec<String>, mut rows: Vec<(NaiveDateTime, Vec<f32>)>) -> Result<Self> {
        rows.sort_by_key(|(ts, _)| *ts);

        let n = rows.len();
        let mut timestamps = Vec::with_capacity(n);
        let mut flat = Vec::with_capacity(n * columns.len());
        for (ts, values) in rows {
            timestamps.push(ts);
            flat.extend(values);
        }

        let values = Array2::from_shape_vec((n, columns.len()), flat)
            .map_err(|e| ForecastError::InvalidData(e.to_string()))?;
        Self::new(timestamps, columns, values)
    }

    /// Loads the series of a single location from a csv file.
    ///
    /// # Arguments
    /// * `path` - The path of the file.
    /// * `features` - The columns to keep, in order.
    pub fn from_path<P: AsRef<Path>>(path: P, features: &[String]) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, features)
    }

    pub fn from_reader<R: Read>(rdr: R, features: &[String]) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(rdr);
        let layout = Layout::new(rdr.headers()?, features, None)?;

        let mut rows = Vec::new();
        for record in rdr.records() {
            let (_, ts, values) = layout.parse(&record?)?;
            rows.push((ts, values));
        }

        Self::from_rows(features.to_vec(), rows)
    }

    pub fn timestamps(&self) -> &[NaiveDateTime] {
        &self.timestamps
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &Array2<f32> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

/// A long format table holding the series of every location, keyed by display name.
#[derive(Debug, Clone, Default)]
pub struct UnionTable {
    series: BTreeMap<String, RawSeries>,
}

impl UnionTable {
    /// Loads a long format csv file and groups its rows per location.
    ///
    /// # Arguments
    /// * `path` - The path of the file.
    /// * `location_column` - The column holding each row's location display name.
    /// * `features` - The columns to keep, in order.
    pub fn from_path<P: AsRef<Path>>(
        path: P,
        location_column: &str,
        features: &[String],
    ) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_reader(file, location_column, features)
    }

    pub fn from_reader<R: Read>(rdr: R, location_column: &str, features: &[String]) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(rdr);
        let layout = Layout::new(rdr.headers()?, features, Some(location_column))?;

        let mut groups: BTreeMap<String, Vec<_>> = BTreeMap::new();
        for record in rdr.records() {
            let (location, ts, values) = layout.parse(&record?)?;
            groups
                .entry(location.unwrap_or_default())
                .or_default()
                .push((ts, values));
        }

        let series = groups
            .into_iter()
            .map(|(name, rows)| Ok((name, RawSeries::from_rows(features.to_vec(), rows)?)))
            .collect::<Result<_>>()?;

        Ok(Self { series })
    }

    /// Iterates over the location names in lexicographic order.
    pub fn locations(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }

    pub fn get(&self, location: &str) -> Option<&RawSeries> {
        self.series.get(location)
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Where the needed fields are within each csv record.
struct Layout {
    time: usize,
    location: Option<usize>,
    features: Vec<usize>,
}

impl Layout {
    fn new(
        headers: &csv::StringRecord,
        features: &[String],
        location: Option<&str>,
    ) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim() == name)
                .ok_or_else(|| ForecastError::InvalidData(format!("missing column {name:?}")))
        };

        Ok(Self {
            time: find(TIME_COLUMN)?,
            location: location.map(find).transpose()?,
            features: features.iter().map(|f| find(f)).collect::<Result<_>>()?,
        })
    }

    fn parse(
        &self,
        record: &csv::StringRecord,
    ) -> Result<(Option<String>, NaiveDateTime, Vec<f32>)> {
        let field = |i: usize| record.get(i).unwrap_or("").trim();

        let ts = parse_timestamp(field(self.time))?;
        let location = self.location.map(|i| field(i).to_string());
        let values = self
            .features
            .iter()
            .map(|&i| match field(i) {
                "" => Ok(f32::NAN),
                raw => raw.parse::<f32>().map_err(|_| {
                    let line = record.position().map_or(0, |p| p.line());
                    ForecastError::InvalidData(format!("line {line}: {raw:?} is not a number"))
                }),
            })
            .collect::<Result<_>>()?;

        Ok((location, ts, values))
    }
}
