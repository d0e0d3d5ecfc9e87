//! This module contains common data structures used across the classifiers.

use num_traits::{AsPrimitive, Float};

use crate::error::{Error, Result};

/// Numeric feature type accepted by every classifier.
///
/// Distances and statistics are always computed in `f64`; `F` only controls
/// how training data is stored.
pub trait Feature: Float + AsPrimitive<f64> + std::fmt::Debug {}

impl<T> Feature for T where T: Float + AsPrimitive<f64> + std::fmt::Debug {}

/// Class label produced by the model factory and the dataset helpers.
pub type Label = i64;

/// Represents a single data point, with features and a label.
///
/// - `F`: The type of the features (e.g., `f64`, `f32`).
/// - `L`: The type of the label (e.g., `i64`, `String`, an enum).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataPoint<F, L> {
    pub features: Vec<F>,
    pub label: L,
}

impl<F, L> DataPoint<F, L> {
    pub fn new(features: Vec<F>, label: L) -> Self {
        DataPoint { features, label }
    }
}

/// A dense, rectangular table: one `Vec` per row, every row the same length.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Data<T> {
    rows: Vec<Vec<T>>,
    cols: usize,
}

impl<T> Default for Data<T> {
    fn default() -> Self {
        Data {
            rows: Vec::new(),
            cols: 0,
        }
    }
}

impl<T: Copy> Data<T> {
    /// Builds a table, rejecting rows whose length differs from the first row.
    pub fn from_rows(rows: Vec<Vec<T>>) -> Result<Self> {
        let cols = rows.first().map_or(0, Vec::len);
        if let Some((row, bad)) = rows.iter().enumerate().find(|(_, r)| r.len() != cols) {
            return Err(Error::RaggedRow {
                row,
                expected: cols,
                found: bad.len(),
            });
        }
        Ok(Data { rows, cols })
    }

    /// A single-column table, handy for label vectors.
    pub fn column_vector(values: &[T]) -> Self {
        Data {
            rows: values.iter().map(|&v| vec![v]).collect(),
            cols: if values.is_empty() { 0 } else { 1 },
        }
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_cols(&self) -> usize {
        self.cols
    }

    /// True when the table has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.cols == 0
    }

    pub fn row(&self, i: usize) -> &[T] {
        &self.rows[i]
    }

    pub fn rows(&self) -> &[Vec<T>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<T>> {
        self.rows
    }

    pub fn column(&self, j: usize) -> Vec<T> {
        self.rows.iter().map(|r| r[j]).collect()
    }

    pub fn transpose(&self) -> Self {
        let rows = (0..self.cols).map(|j| self.column(j)).collect();
        Data {
            rows,
            cols: self.rows.len(),
        }
    }
}

/// Reads class labels from the first column of a label table.
pub fn labels_from_first_column<F: Feature>(y: &Data<F>) -> Result<Vec<Label>> {
    y.rows()
        .iter()
        .map(|row| {
            let value: f64 = row.first().map_or(f64::NAN, |&v| v.as_());
            if value.is_finite() && value.fract() == 0.0 {
                Ok(value as Label)
            } else {
                Err(Error::InvalidLabel(value))
            }
        })
        .collect()
}

/// Checks that `x` is a usable training table and that `y` has one label per row.
pub(crate) fn check_training_set<F: Copy, L>(x: &Data<F>, y: &[L]) -> Result<()> {
    if x.is_empty() {
        return Err(Error::EmptyTrainingSet {
            rows: x.n_rows(),
            cols: x.n_cols(),
        });
    }
    if y.len() != x.n_rows() {
        return Err(Error::LabelCountMismatch {
            expected: x.n_rows(),
            found: y.len(),
        });
    }
    Ok(())
}

/// Fraction of positions where `predicted` and `expected` agree.
pub fn accuracy<L: PartialEq>(predicted: &[L], expected: &[L]) -> Result<f64> {
    if expected.is_empty() {
        return Err(Error::EmptyTestSet);
    }
    if predicted.len() != expected.len() {
        return Err(Error::LabelCountMismatch {
            expected: expected.len(),
            found: predicted.len(),
        });
    }
    let correct = predicted
        .iter()
        .zip(expected)
        .filter(|(p, e)| p == e)
        .count();
    Ok(correct as f64 / expected.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_from_rows_rejects_ragged_input() {
        let err = Data::from_rows(vec![vec![1.0, 2.0], vec![3.0]]).unwrap_err();
        assert!(matches!(
            err,
            Error::RaggedRow {
                row: 1,
                expected: 2,
                found: 1
            }
        ));
    }

    #[test]
    fn test_shape_and_transpose() {
        let data = Data::from_rows(vec![vec![1.0, 2.0, 3.0], vec![4.0, 5.0, 6.0]]).unwrap();
        assert_eq!((data.n_rows(), data.n_cols()), (2, 3));
        assert_eq!(data.column(1), vec![2.0, 5.0]);

        let t = data.transpose();
        assert_eq!((t.n_rows(), t.n_cols()), (3, 2));
        assert_eq!(t.row(2), &[3.0, 6.0]);
    }

    #[test]
    fn test_empty_tables() {
        let no_rows: Data<f64> = Data::from_rows(vec![]).unwrap();
        assert!(no_rows.is_empty());
        let no_cols: Data<f64> = Data::from_rows(vec![vec![], vec![]]).unwrap();
        assert!(no_cols.is_empty());
        assert_eq!(no_cols.n_rows(), 2);
    }

    #[test]
    fn test_labels_from_first_column() {
        let y = Data::from_rows(vec![vec![1.0, 9.0], vec![-1.0, 9.0]]).unwrap();
        assert_eq!(labels_from_first_column(&y).unwrap(), vec![1, -1]);

        let bad = Data::column_vector(&[0.5f64]);
        assert!(matches!(
            labels_from_first_column(&bad),
            Err(Error::InvalidLabel(_))
        ));
    }

    #[test]
    fn test_accuracy() {
        assert_relative_eq!(accuracy(&[1, 2, 3, 4], &[1, 2, 0, 4]).unwrap(), 0.75);
        assert!(matches!(
            accuracy::<i64>(&[], &[]),
            Err(Error::EmptyTestSet)
        ));
    }
}
