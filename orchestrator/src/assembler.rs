use std::{
    fs, io,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;

use crate::{
    error::{ForecastError, Result},
    forecast::{CHANNELS, ForecastMatrix, POLLUTANTS},
    registry::EntityId,
    series::{TIME_COLUMN, format_timestamp},
};

/// A single forecast row of a location.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRecord {
    pub entity_id: EntityId,
    pub timestamp: NaiveDateTime,
    pub values: [f64; CHANNELS],
}

/// Rounds to two decimals.
pub fn round2(v: f64) -> f64 {
    (v * 100.).round() / 100.
}

/// Pairs every row of a forecast with its timestamp.
///
/// # Arguments
/// * `entity_id` - The location the forecast belongs to.
/// * `timestamps` - The label of every forecast row.
/// * `matrix` - The decoded forecast.
///
/// # Returns
/// One record per row with its values rounded, or `AdapterShapeMismatch` if there isn't a
/// timestamp per row.
pub fn assemble(
    entity_id: EntityId,
    timestamps: &[NaiveDateTime],
    matrix: &ForecastMatrix,
) -> Result<Vec<ForecastRecord>> {
    if timestamps.len() != matrix.horizon() {
        return Err(ForecastError::shape(
            "forecast timestamps",
            timestamps.len(),
            matrix.horizon(),
        ));
    }

    Ok(timestamps
        .iter()
        .zip(matrix.values().outer_iter())
        .map(|(ts, row)| {
            let mut values = [0.; CHANNELS];
            for (dst, v) in values.iter_mut().zip(row) {
                *dst = round2(*v as f64);
            }
            ForecastRecord {
                entity_id,
                timestamp: *ts,
                values,
            }
        })
        .collect())
}

/// Writes forecast records to one csv file per location.
#[derive(Debug, Clone)]
pub struct Assembler {
    output_dir: PathBuf,
}

impl Assembler {
    pub fn new<P: Into<PathBuf>>(output_dir: P) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// The file the forecast of a location is written to.
    pub fn path_for(&self, id: EntityId) -> PathBuf {
        self.output_dir.join(format!("{id}.csv"))
    }

    /// Writes the records of a location, replacing any previous forecast.
    ///
    /// The file is written next to the target and renamed over it once complete.
    ///
    /// # Returns
    /// The path of the written file.
    pub fn persist(&self, id: EntityId, records: &[ForecastRecord]) -> Result<PathBuf> {
        let tmp = self.stage(id, records)?;
        self.commit(id, &tmp)
    }

    /// Writes the records of several locations as a whole.
    ///
    /// No previous forecast is replaced until every location has been written in full. A
    /// failure while writing leaves the output directory as it was.
    ///
    /// # Returns
    /// The path written for every location, in the given order.
    pub fn persist_all(
        &self,
        batches: &[(EntityId, Vec<ForecastRecord>)],
    ) -> Result<Vec<(EntityId, PathBuf)>> {
        let mut staged = Vec::with_capacity(batches.len());
        for (id, records) in batches {
            match self.stage(*id, records) {
                Ok(tmp) => staged.push((*id, tmp)),
                Err(e) => {
                    staged.iter().for_each(|(_, tmp)| discard(tmp));
                    return Err(e);
                }
            }
        }

        let mut written = Vec::with_capacity(staged.len());
        for (i, (id, tmp)) in staged.iter().enumerate() {
            match self.commit(*id, tmp) {
                Ok(path) => written.push((*id, path)),
                Err(e) => {
                    staged[i + 1..].iter().for_each(|(_, tmp)| discard(tmp));
                    return Err(e);
                }
            }
        }
        Ok(written)
    }

    /// Writes the records of a location to its temporary file.
    fn stage(&self, id: EntityId, records: &[ForecastRecord]) -> Result<PathBuf> {
        if let Some(other) = records.iter().find(|r| r.entity_id != id) {
            return Err(ForecastError::InvalidData(format!(
                "record of location {} handed over as location {id}",
                other.entity_id
            )));
        }

        fs::create_dir_all(&self.output_dir)?;
        let tmp = self.output_dir.join(format!(".{id}.csv.tmp"));
        if let Err(e) = write_records(&tmp, records) {
            discard(&tmp);
            return Err(e);
        }
        Ok(tmp)
    }

    /// Moves a staged file over the forecast of its location.
    fn commit(&self, id: EntityId, tmp: &Path) -> Result<PathBuf> {
        let path = self.path_for(id);
        if let Err(e) = fs::rename(tmp, &path) {
            discard(tmp);
            return Err(e.into());
        }

        log::debug!("wrote forecast of location {id} to {}", path.display());
        Ok(path)
    }
}

fn write_records(path: &Path, records: &[ForecastRecord]) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    wtr.write_record(std::iter::once(TIME_COLUMN).chain(POLLUTANTS))?;
    for record in records {
        let mut fields = Vec::with_capacity(CHANNELS + 1);
        fields.push(format_timestamp(&record.timestamp));
        fields.extend(record.values.iter().map(|v| format!("{v:.2}")));
        wtr.write_record(&fields)?;
    }
    wtr.flush()?;
    Ok(())
}

fn discard(tmp: &Path) {
    if let Err(e) = fs::remove_file(tmp) {
        if e.kind() != io::ErrorKind::NotFound {
            log::warn!("cannot remove {}: {e}", tmp.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::series::parse_timestamp;

    fn matrix() -> ForecastMatrix {
        ForecastMatrix::new(
            array![
                [0.1234, 1.005, 2., 3.999, 40.5, 0.],
                [1., 2., 3., 4., 5., 6.]
            ],
            2,
        )
        .unwrap()
    }

    fn labels() -> Vec<NaiveDateTime> {
        vec![
            parse_timestamp("2024-12-01T10:00").unwrap(),
            parse_timestamp("2024-12-01T11:00").unwrap(),
        ]
    }

    #[test]
    fn records_are_rounded_to_two_decimals() {
        let records = assemble(7, &labels(), &matrix()).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].values[0], 0.12);
        assert_eq!(records[0].values[3], 4.);
        assert_eq!(records[1].timestamp, labels()[1]);
    }

    #[test]
    fn one_timestamp_per_row_is_required() {
        let err = assemble(7, &labels()[..1], &matrix()).unwrap_err();
        assert!(matches!(err, ForecastError::AdapterShapeMismatch(_)));
    }

    #[test]
    fn persists_a_csv_per_location() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(dir.path().join("out"));
        let records = assemble(7, &labels(), &matrix()).unwrap();

        let path = assembler.persist(7, &records).unwrap();

        assert_eq!(path, dir.path().join("out").join("7.csv"));
        let written = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines[0], "time,co,no2,o3,so2,pm2_5,pm10");
        assert_eq!(lines[1], "2024-12-01T10:00,0.12,1.00,2.00,4.00,40.50,0.00");
        assert_eq!(lines[2], "2024-12-01T11:00,1.00,2.00,3.00,4.00,5.00,6.00");
        assert_eq!(fs::read_dir(dir.path().join("out")).unwrap().count(), 1);
    }

    #[test]
    fn persisting_again_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(dir.path());
        let records = assemble(7, &labels(), &matrix()).unwrap();

        assembler.persist(7, &records).unwrap();
        let first = fs::read(assembler.path_for(7)).unwrap();
        assembler.persist(7, &records[..1]).unwrap();
        let second = fs::read(assembler.path_for(7)).unwrap();

        assert!(second.len() < first.len());
        assert!(first.starts_with(&second));
    }

    #[test]
    fn foreign_records_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let records = assemble(7, &labels(), &matrix()).unwrap();

        let err = Assembler::new(dir.path()).persist(8, &records).unwrap_err();
        assert!(matches!(err, ForecastError::InvalidData(_)));
    }

    #[test]
    fn failed_writes_leave_no_temporary_file() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(dir.path());
        fs::create_dir(assembler.path_for(7)).unwrap();
        let records = assemble(7, &labels(), &matrix()).unwrap();

        assert!(assembler.persist(7, &records).is_err());

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(names, vec!["7.csv"]);
    }

    #[test]
    fn persists_every_batch() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(dir.path());
        let batches = vec![
            (7, assemble(7, &labels(), &matrix()).unwrap()),
            (8, assemble(8, &labels(), &matrix()).unwrap()),
        ];

        let written = assembler.persist_all(&batches).unwrap();

        assert_eq!(
            written,
            vec![(7, assembler.path_for(7)), (8, assembler.path_for(8))]
        );
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn a_failing_batch_replaces_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = Assembler::new(dir.path());
        fs::write(assembler.path_for(7), "previous").unwrap();
        let batches = vec![
            (7, assemble(7, &labels(), &matrix()).unwrap()),
            (8, assemble(7, &labels(), &matrix()).unwrap()),
        ];

        let err = assembler.persist_all(&batches).unwrap_err();

        assert!(matches!(err, ForecastError::InvalidData(_)));
        assert_eq!(fs::read_to_string(assembler.path_for(7)).unwrap(), "previous");
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
