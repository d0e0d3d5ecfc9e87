//! Python bindings, built with `--features python`.

use pyo3::exceptions::{PyTypeError, PyValueError};
use pyo3::prelude::*;
use pyo3::types::{PyDict, PyList};

use crate::common_types::{Data, DataPoint};
use crate::config::params;
use crate::error::Error;
use crate::knn::{KnnClassifier, SearchStrategy};
use crate::math::lp;

fn to_py_err(err: Error) -> PyErr {
    PyValueError::new_err(err.to_string())
}

/// Minkowski distance between two equally long vectors.
#[pyfunction]
#[pyo3(signature = (a, b, p = 2))]
fn minkowski_distance(a: Vec<f64>, b: Vec<f64>, p: u32) -> PyResult<f64> {
    if a.len() != b.len() || a.is_empty() {
        return Err(PyValueError::new_err(
            "Input vectors must be non-empty and have the same length.",
        ));
    }
    Ok(lp(&a, &b, p))
}

#[pyclass(name = "SearchStrategy")]
#[derive(Clone, Debug)]
enum PySearchStrategy {
    LinearScan,
    KdTree,
}

impl From<SearchStrategy> for PySearchStrategy {
    fn from(val: SearchStrategy) -> Self {
        match val {
            SearchStrategy::LinearScan => PySearchStrategy::LinearScan,
            SearchStrategy::KdTree => PySearchStrategy::KdTree,
        }
    }
}

#[pyclass(name = "KnnClassifier")]
struct PyKnnClassifier {
    classifier: KnnClassifier<f64, String>,
}

#[pymethods]
impl PyKnnClassifier {
    /// `model_type` is `"knn"` for a linear scan or `"kdtree"`.
    #[new]
    #[pyo3(signature = (k, p = 2, model_type = "knn"))]
    fn new(k: usize, p: u32, model_type: &str) -> Self {
        let (k, p) = (k.to_string(), p.to_string());
        PyKnnClassifier {
            classifier: KnnClassifier::from_params(&params([
                ("k", k.as_str()),
                ("p", p.as_str()),
                ("model_type", model_type),
            ])),
        }
    }

    /// Accepts `{'features': [...], 'label': '...'}` dicts or `([...], '...')` tuples.
    fn fit(&mut self, training_data: &Bound<'_, PyList>) -> PyResult<()> {
        let mut points: Vec<DataPoint<f64, String>> = Vec::with_capacity(training_data.len());
        for item in training_data {
            if let Ok(dict) = item.downcast::<PyDict>() {
                let features = dict
                    .get_item("features")?
                    .ok_or_else(|| PyValueError::new_err("Missing 'features' key"))?;
                let label = dict
                    .get_item("label")?
                    .ok_or_else(|| PyValueError::new_err("Missing 'label' key"))?;
                points.push(DataPoint::new(features.extract()?, label.extract()?));
            } else if let Ok((features, label)) = item.extract::<(Vec<f64>, String)>() {
                points.push(DataPoint::new(features, label));
            } else {
                return Err(PyTypeError::new_err(
                    "Training data items must be dictionaries {'features': [...], 'label': '...'} or tuples ([...], '...')",
                ));
            }
        }
        self.classifier.fit(points).map_err(to_py_err)
    }

    fn predict_single(&self, features: Vec<f64>) -> PyResult<String> {
        self.classifier.try_predict(&features).map_err(to_py_err)
    }

    fn predict(&self, test_data: Vec<Vec<f64>>) -> PyResult<Vec<String>> {
        test_data
            .iter()
            .map(|row| self.classifier.try_predict(row).map_err(to_py_err))
            .collect()
    }

    fn validate(&self, test_data: Vec<Vec<f64>>, labels: Vec<String>) -> PyResult<f64> {
        let x_test = Data::from_rows(test_data).map_err(to_py_err)?;
        self.classifier.validate(&x_test, &labels).map_err(to_py_err)
    }

    fn describe(&self) -> String {
        self.classifier.to_string()
    }

    #[getter]
    fn search_strategy(&self) -> PySearchStrategy {
        self.classifier.search_strategy().into()
    }
}

#[pymodule]
fn stat_classifiers(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(minkowski_distance, m)?)?;
    m.add_class::<PySearchStrategy>()?;
    m.add_class::<PyKnnClassifier>()?;
    Ok(())
}
