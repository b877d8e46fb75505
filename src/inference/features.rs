//! Feature rows and their parsers.
//!
//! A [`FeatureVector`] always holds exactly [`FEATURE_COUNT`] values, so shape
//! checks happen once, here, before anything reaches the classifier.

use super::FEATURE_COUNT;
use crate::error::{GuardResult, ValidationError};
use ndarray::{Array2, Array3};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One record of 32 traffic/session statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector([f32; FEATURE_COUNT]);

impl FeatureVector {
    pub fn new(values: [f32; FEATURE_COUNT]) -> Self {
        Self(values)
    }

    /// All-zero record, the dashboard's default manual input
    pub fn zeros() -> Self {
        Self([0.0; FEATURE_COUNT])
    }

    /// Parse a comma-separated string of exactly 32 numbers.
    /// Whitespace around values is ignored.
    pub fn parse_manual(input: &str) -> Result<Self, ValidationError> {
        let trimmed = input.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyInput);
        }

        let values = trimmed
            .split(',')
            .enumerate()
            .map(|(i, token)| {
                let token = token.trim();
                token.parse::<f32>().map_err(|_| ValidationError::NonNumeric {
                    position: i + 1,
                    value: token.to_string(),
                })
            })
            .collect::<Result<Vec<f32>, _>>()?;

        Self::try_from(values.as_slice())
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn values(&self) -> &[f32; FEATURE_COUNT] {
        &self.0
    }
}

impl TryFrom<&[f32]> for FeatureVector {
    type Error = ValidationError;

    fn try_from(values: &[f32]) -> Result<Self, Self::Error> {
        let array: [f32; FEATURE_COUNT] =
            values.try_into().map_err(|_| ValidationError::FeatureCount {
                expected: FEATURE_COUNT,
                found: values.len(),
            })?;
        Ok(Self(array))
    }
}

impl TryFrom<Vec<f32>> for FeatureVector {
    type Error = ValidationError;

    fn try_from(values: Vec<f32>) -> Result<Self, Self::Error> {
        Self::try_from(values.as_slice())
    }
}

/// Non-empty, uniformly 32-wide set of rows, in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureBatch {
    rows: Vec<FeatureVector>,
    #[serde(skip_serializing_if = "Option::is_none")]
    columns: Option<Vec<String>>,
}

impl FeatureBatch {
    /// Validate raw rows. A single malformed row rejects the whole batch.
    pub fn new(rows: Vec<Vec<f32>>) -> Result<Self, ValidationError> {
        if rows.is_empty() {
            return Err(ValidationError::EmptyInput);
        }

        let rows = rows
            .into_iter()
            .map(FeatureVector::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { rows, columns: None })
    }

    pub fn from_vectors(rows: Vec<FeatureVector>) -> Result<Self, ValidationError> {
        if rows.is_empty() {
            return Err(ValidationError::EmptyInput);
        }
        Ok(Self { rows, columns: None })
    }

    pub fn single(vector: FeatureVector) -> Self {
        Self {
            rows: vec![vector],
            columns: None,
        }
    }

    /// Read a delimited table with a header row and exactly 32 numeric columns
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, ValidationError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(ValidationError::EmptyInput);
        }
        if headers.len() != FEATURE_COUNT {
            return Err(ValidationError::ColumnCount {
                line: 1,
                expected: FEATURE_COUNT,
                found: headers.len(),
            });
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or(0);

            if record.len() != FEATURE_COUNT {
                return Err(ValidationError::ColumnCount {
                    line,
                    expected: FEATURE_COUNT,
                    found: record.len(),
                });
            }

            let mut values = [0.0f32; FEATURE_COUNT];
            for (column, (slot, cell)) in values.iter_mut().zip(record.iter()).enumerate() {
                *slot = cell.parse().map_err(|_| ValidationError::NonNumericCell {
                    line,
                    column: column + 1,
                    value: cell.to_string(),
                })?;
            }
            rows.push(FeatureVector::new(values));
        }

        let mut batch = Self::from_vectors(rows)?;
        batch.columns = Some(headers.iter().map(str::to_string).collect());
        Ok(batch)
    }

    /// Read a CSV file; see [`FeatureBatch::from_csv_reader`]
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> GuardResult<Self> {
        let file = File::open(path)?;
        Ok(Self::from_csv_reader(file)?)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureVector] {
        &self.rows
    }

    /// Header names when the batch came from a table
    pub fn column_names(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Lay the rows out as `(batch, 32, 1)`: a 32-step sequence with one channel
    pub fn to_tensor(&self) -> Array3<f32> {
        let flat: Vec<f32> = self.rows.iter().flat_map(|row| row.as_slice().iter().copied()).collect();
        Array3::from_shape_vec((self.rows.len(), FEATURE_COUNT, 1), flat)
            .unwrap_or_else(|_| unreachable!("every row holds exactly FEATURE_COUNT values"))
    }

    /// Rows as a plain `(batch, 32)` matrix
    pub fn to_matrix(&self) -> Array2<f32> {
        let mut matrix = Array2::zeros((self.rows.len(), FEATURE_COUNT));
        for (mut target, row) in matrix.rows_mut().into_iter().zip(&self.rows) {
            target.assign(&ndarray::ArrayView1::from(row.as_slice()));
        }
        matrix
    }
}

impl IntoIterator for FeatureBatch {
    type Item = FeatureVector;
    type IntoIter = std::vec::IntoIter<FeatureVector>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}
