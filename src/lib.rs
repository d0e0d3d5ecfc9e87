//! Classical statistical classifiers: k-nearest neighbors (linear scan or
//! k-d tree), the perceptron and Gaussian naive Bayes, plus loaders for the
//! iris and MNIST datasets.

pub mod common_types;
pub mod config;
pub mod error;
pub mod knn;
pub mod loaders;
pub mod math;
pub mod model;
pub mod naive_bayes;
pub mod perceptron;
pub mod timing;

#[cfg(feature = "python")]
mod python;

pub use common_types::{Data, DataPoint, Feature, Label};
pub use config::ModelParam;
pub use error::{Error, Result};
pub use knn::{KdTree, KnnClassifier, KnnConfig, PruneBound, SearchStrategy};
pub use model::{Model, ModelType, create_model};
pub use naive_bayes::NaiveBayes;
pub use perceptron::Perceptron;
