//! String-selected classifier front end.
//!
//! ```text
//! let mut model = create_model::<f64>("knn", &params([("k", "5")]))?;
//! model.train(&x_train, &y_train)?;
//! model.validate(&x_test, &y_test)?;
//! ```

use std::fmt;
use std::str::FromStr;

use crate::common_types::{Data, Feature, Label, labels_from_first_column};
use crate::config::ModelParam;
use crate::error::{Error, Result};
use crate::knn::KnnClassifier;
use crate::naive_bayes::NaiveBayes;
use crate::perceptron::Perceptron;

/// Names that were planned but never implemented.
const UNSUPPORTED: [&str; 7] = [
    "decision_tree",
    "logistic_regression",
    "svm",
    "ada_boost",
    "em",
    "hmm",
    "crf",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ModelType {
    Perceptron,
    Knn,
    NaiveBayes,
}

impl FromStr for ModelType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "perceptron" => Ok(ModelType::Perceptron),
            "knn" => Ok(ModelType::Knn),
            "naive_bayes" => Ok(ModelType::NaiveBayes),
            other if UNSUPPORTED.contains(&other) => Err(Error::UnsupportedModel(other.to_string())),
            other => Err(Error::UnknownModel(other.to_string())),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ModelType::Perceptron => "perceptron",
            ModelType::Knn => "knn",
            ModelType::NaiveBayes => "naive_bayes",
        })
    }
}

#[derive(Debug, Clone)]
pub enum Model<F> {
    Perceptron(Perceptron),
    Knn(KnnClassifier<F, Label>),
    NaiveBayes(NaiveBayes<Label>),
}

/// Builds an untrained model of the named type.
pub fn create_model<F: Feature>(model_type: &str, params: &ModelParam) -> Result<Model<F>> {
    let kind = model_type.parse::<ModelType>().inspect_err(|err| {
        log::error!("cannot create model: {err}");
    })?;
    log::info!("creating {kind} model");
    Ok(Model::new(kind, params))
}

impl<F: Feature> Model<F> {
    pub fn new(kind: ModelType, params: &ModelParam) -> Self {
        match kind {
            ModelType::Perceptron => Model::Perceptron(Perceptron::from_params(params)),
            ModelType::Knn => Model::Knn(KnnClassifier::from_params(params)),
            ModelType::NaiveBayes => Model::NaiveBayes(NaiveBayes::from_params(params)),
        }
    }

    pub fn model_type(&self) -> ModelType {
        match self {
            Model::Perceptron(_) => ModelType::Perceptron,
            Model::Knn(_) => ModelType::Knn,
            Model::NaiveBayes(_) => ModelType::NaiveBayes,
        }
    }

    /// Trains on `x`, taking labels from the first column of `y`.
    pub fn train(&mut self, x: &Data<F>, y: &Data<F>) -> Result<()> {
        let labels = labels_from_first_column(y)?;
        match self {
            Model::Perceptron(m) => m.train(x, &labels),
            Model::Knn(m) => m.train(x, &labels),
            Model::NaiveBayes(m) => m.train(x, &labels),
        }
    }

    pub fn try_predict(&self, x: &[F]) -> Result<Label> {
        match self {
            Model::Perceptron(m) => m.try_predict(x),
            Model::Knn(m) => m.try_predict(x),
            Model::NaiveBayes(m) => m.try_predict(x),
        }
    }

    pub fn predict(&self, x: &[F]) -> Label {
        match self {
            Model::Perceptron(m) => m.predict(x),
            Model::Knn(m) => m.predict(x),
            Model::NaiveBayes(m) => m.predict(x),
        }
    }

    pub fn validate(&self, x_test: &Data<F>, y_test: &Data<F>) -> Result<f64> {
        let labels = labels_from_first_column(y_test)?;
        match self {
            Model::Perceptron(m) => m.validate(x_test, &labels),
            Model::Knn(m) => m.validate(x_test, &labels),
            Model::NaiveBayes(m) => m.validate(x_test, &labels),
        }
    }

    pub fn describe(&self) {
        match self {
            Model::Perceptron(m) => m.describe(),
            Model::Knn(m) => m.describe(),
            Model::NaiveBayes(m) => m.describe(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params;

    fn table(rows: Vec<Vec<f64>>) -> Data<f64> {
        Data::from_rows(rows).unwrap()
    }

    #[test]
    fn test_model_type_parsing() {
        assert_eq!("knn".parse::<ModelType>().unwrap(), ModelType::Knn);
        assert_eq!("naive_bayes".parse::<ModelType>().unwrap(), ModelType::NaiveBayes);
        assert!(matches!("svm".parse::<ModelType>(), Err(Error::UnsupportedModel(name)) if name == "svm"));
        assert!(matches!("magic".parse::<ModelType>(), Err(Error::UnknownModel(_))));
        assert_eq!(ModelType::Perceptron.to_string(), "perceptron");
    }

    #[test]
    fn test_create_model_dispatches() {
        let model = create_model::<f64>("knn", &params([("model_type", "kdtree")])).unwrap();
        assert!(matches!(model, Model::Knn(ref knn) if knn.kd_tree().is_none()));
        assert_eq!(model.model_type(), ModelType::Knn);
        assert!(create_model::<f64>("hmm", &ModelParam::new()).is_err());
    }

    #[test]
    fn test_every_model_trains_from_label_table() {
        let x = table(vec![vec![1.0, 1.0], vec![2.0, 1.5], vec![8.0, 9.0], vec![9.0, 8.0]]);
        let y = Data::column_vector(&[-1.0, -1.0, 1.0, 1.0]);
        for name in ["perceptron", "knn", "naive_bayes"] {
            let mut model = create_model::<f64>(name, &params([("k", "1")])).unwrap();
            model.train(&x, &y).unwrap();
            assert_eq!(model.predict(&[1.5, 1.0]), -1, "{name}");
            assert_eq!(model.predict(&[8.5, 8.5]), 1, "{name}");
            assert_eq!(model.validate(&x, &y).unwrap(), 1.0, "{name}");
        }
    }

    #[test]
    fn test_fractional_labels_are_rejected() {
        let x = table(vec![vec![1.0], vec![2.0]]);
        let y = Data::column_vector(&[0.5, 1.0]);
        let mut model = create_model::<f64>("knn", &ModelParam::new()).unwrap();
        assert!(matches!(model.train(&x, &y), Err(Error::InvalidLabel(_))));
        assert!(matches!(model.try_predict(&[1.0]), Err(Error::NotTrained)));
    }
}
