//! Binary perceptron, `f(x) = sign(w·x + b)`, over labels `+1` / `-1`.
//!
//! Two mistake-driven training forms are available:
//!
//! - **original**: on a mistake `y·f(x) <= 0`, update `w += η y x` and `b += η y`;
//! - **dual**: keep one coefficient `α_i` per training row and test mistakes
//!   through the Gram matrix, `y_i (Σ_j α_j y_j x_j·x_i + b) <= 0`, updating
//!   `α_i += η` and `b += η y_i`; finally `w = Σ_i α_i y_i x_i`.
//!
//! Training sweeps the data until a sweep makes no mistakes or `max_iter`
//! sweeps have run.

use std::fmt;

use crate::common_types::{Data, Feature, Label, accuracy, check_training_set};
use crate::config::{self, ModelParam};
use crate::error::{Error, Result};
use crate::math::{add, dot, gram, scale, sign};
use crate::timing::Stopwatch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PerceptronForm {
    #[default]
    Original,
    Dual,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PerceptronConfig {
    pub form: PerceptronForm,
    /// Learning rate; `None` picks 0.1 for the original form and 1 for the dual.
    pub eta: Option<f64>,
    pub max_iter: usize,
}

impl Default for PerceptronConfig {
    fn default() -> Self {
        PerceptronConfig {
            form: PerceptronForm::Original,
            eta: None,
            max_iter: 1000,
        }
    }
}

impl PerceptronConfig {
    /// Reads `model_type` (`original` | `dual`), `eta` and `max_iter`.
    pub fn from_params(params: &ModelParam) -> Self {
        let defaults = PerceptronConfig::default();
        let form = match config::text(params, "model_type") {
            Some("dual") => PerceptronForm::Dual,
            _ => PerceptronForm::Original,
        };
        let eta = params
            .contains_key("eta")
            .then(|| config::float_or(params, "eta", 0.1));
        PerceptronConfig {
            form,
            eta,
            max_iter: config::integer_or(params, "max_iter", defaults.max_iter),
        }
    }

    fn learning_rate(&self) -> f64 {
        self.eta.unwrap_or(match self.form {
            PerceptronForm::Original => 0.1,
            PerceptronForm::Dual => 1.0,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Perceptron {
    config: PerceptronConfig,
    weight: Vec<f64>,
    bias: f64,
}

impl Perceptron {
    pub fn new(config: PerceptronConfig) -> Self {
        Perceptron {
            config,
            weight: Vec::new(),
            bias: 0.0,
        }
    }

    pub fn from_params(params: &ModelParam) -> Self {
        Self::new(PerceptronConfig::from_params(params))
    }

    pub fn config(&self) -> &PerceptronConfig {
        &self.config
    }

    pub fn weight(&self) -> &[f64] {
        &self.weight
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    pub fn is_trained(&self) -> bool {
        !self.weight.is_empty()
    }

    /// Trains on rows of `x` labelled `+1` or `-1`.
    pub fn train<F: Feature>(&mut self, x: &Data<F>, y: &[Label]) -> Result<()> {
        let _timer = Stopwatch::start("perceptron train");
        let trained = check_training_set(x, y)
            .and_then(|()| signed_labels(y))
            .map(|y| match self.config.form {
                PerceptronForm::Original => self.fit_original(x, &y),
                PerceptronForm::Dual => self.fit_dual(x, &y),
            });
        match trained {
            Ok((weight, bias)) => {
                self.weight = weight;
                self.bias = bias;
                log::info!("perceptron training done");
                self.describe();
                Ok(())
            }
            Err(err) => {
                log::error!("perceptron training rejected: {err}");
                Err(err)
            }
        }
    }

    fn fit_original<F: Feature>(&self, x: &Data<F>, y: &[f64]) -> (Vec<f64>, f64) {
        log::info!("training original form");
        let eta = self.config.learning_rate();
        let mut weight = vec![1.0; x.n_cols()];
        let mut bias = 0.0;

        let converged = (0..self.config.max_iter).any(|_| {
            let mut mistakes = 0;
            for (row, &label) in x.rows().iter().zip(y) {
                if label * (dot_f64(row, &weight) + bias) <= 0.0 {
                    weight = add(&weight, &scale(row, eta * label));
                    bias += eta * label;
                    mistakes += 1;
                }
            }
            mistakes == 0
        });
        if !converged {
            log::warn!("perceptron did not converge in {} sweeps", self.config.max_iter);
        }
        (weight, bias)
    }

    fn fit_dual<F: Feature>(&self, x: &Data<F>, y: &[f64]) -> (Vec<f64>, f64) {
        log::info!("training dual form");
        let eta = self.config.learning_rate();
        let gram = gram(x);
        let mut alpha = vec![0.0; x.n_rows()];
        let mut bias = 0.0;

        let converged = (0..self.config.max_iter).any(|_| {
            let mut mistakes = 0;
            for i in 0..alpha.len() {
                let activation: f64 = alpha
                    .iter()
                    .zip(y)
                    .zip(&gram[i])
                    .map(|((a, yj), g)| a * yj * g)
                    .sum::<f64>()
                    + bias;
                if y[i] * activation <= 0.0 {
                    alpha[i] += eta;
                    bias += eta * y[i];
                    mistakes += 1;
                }
            }
            mistakes == 0
        });
        if !converged {
            log::warn!("perceptron did not converge in {} sweeps", self.config.max_iter);
        }

        let weight = x
            .rows()
            .iter()
            .zip(alpha.iter().zip(y))
            .fold(vec![0.0; x.n_cols()], |w, (row, (a, label))| {
                add(&w, &scale(row, a * label))
            });
        (weight, bias)
    }

    pub fn try_predict<F: Feature>(&self, x: &[F]) -> Result<Label> {
        if !self.is_trained() {
            return Err(Error::NotTrained);
        }
        if x.len() != self.weight.len() {
            return Err(Error::DimensionMismatch {
                expected: self.weight.len(),
                found: x.len(),
            });
        }
        Ok(sign(dot_f64(x, &self.weight) + self.bias) as Label)
    }

    /// Predicts `+1` or `-1`; failures are logged and yield `0`.
    pub fn predict<F: Feature>(&self, x: &[F]) -> Label {
        self.try_predict(x).unwrap_or_else(|err| {
            log::error!("perceptron prediction failed: {err}");
            Label::default()
        })
    }

    pub fn validate<F: Feature>(&self, x_test: &Data<F>, y_test: &[Label]) -> Result<f64> {
        let _timer = Stopwatch::start("perceptron validate");
        if !self.is_trained() {
            return Err(Error::NotTrained);
        }
        let predictions: Vec<Label> = x_test.rows().iter().map(|row| self.predict(row)).collect();
        let acc = accuracy(&predictions, y_test)?;
        log::info!("accuracy: {acc:.6}");
        Ok(acc)
    }

    pub fn describe(&self) {
        log::info!("{self}");
    }
}

impl fmt::Display for Perceptron {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let form = match self.config.form {
            PerceptronForm::Original => "original",
            PerceptronForm::Dual => "dual",
        };
        write!(f, "Perceptron ({form} form): f(x) = sign(w . x + b), w = [")?;
        for (i, w) in self.weight.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{w:.6}")?;
        }
        write!(f, "], b = {:.6}", self.bias)
    }
}

fn dot_f64<F: Feature>(row: &[F], weight: &[f64]) -> f64 {
    let row: Vec<f64> = row.iter().map(|v| v.as_()).collect();
    dot(&row, weight)
}

fn signed_labels(y: &[Label]) -> Result<Vec<f64>> {
    y.iter()
        .map(|&label| match label {
            1 => Ok(1.0),
            -1 => Ok(-1.0),
            other => Err(Error::InvalidLabel(other as f64)),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::params;

    fn separable() -> (Data<f64>, Vec<Label>) {
        let x = Data::from_rows(vec![vec![3.0, 3.0], vec![4.0, 3.0], vec![1.0, 1.0]]).unwrap();
        (x, vec![1, 1, -1])
    }

    fn assert_separates(model: &Perceptron, x: &Data<f64>, y: &[Label]) {
        for (row, &label) in x.rows().iter().zip(y) {
            let margin = label as f64 * (dot(row, model.weight()) + model.bias());
            assert!(margin > 0.0, "row {row:?} has margin {margin}");
            assert_eq!(model.predict(row), label);
        }
    }

    #[test]
    fn test_original_form_separates_training_data() {
        let (x, y) = separable();
        let mut model = Perceptron::from_params(&params([("model_type", "original")]));
        model.train(&x, &y).unwrap();
        assert_eq!(model.weight().len(), 2);
        assert_separates(&model, &x, &y);
    }

    #[test]
    fn test_dual_form_separates_training_data() {
        let (x, y) = separable();
        let mut model = Perceptron::from_params(&params([("model_type", "dual")]));
        model.train(&x, &y).unwrap();
        assert_separates(&model, &x, &y);
        assert_eq!(model.predict(&[10.0, 10.0]), 1);
        assert_eq!(model.predict(&[0.0, 0.0]), -1);
    }

    #[test]
    fn test_non_separable_data_stops_after_max_iter() {
        let x = Data::from_rows(vec![
            vec![0.0, 0.0],
            vec![1.0, 1.0],
            vec![0.0, 1.0],
            vec![1.0, 0.0],
        ])
        .unwrap();
        let y = vec![1, 1, -1, -1];
        let mut model = Perceptron::from_params(&params([("max_iter", "5")]));
        assert!(model.train(&x, &y).is_ok());
        assert!(model.is_trained());
    }

    #[test]
    fn test_rejects_bad_labels_and_empty_data() {
        let (x, _) = separable();
        let mut model = Perceptron::new(PerceptronConfig::default());
        assert!(matches!(model.train(&x, &[1, 0, -1]), Err(Error::InvalidLabel(_))));
        assert!(matches!(
            model.train(&Data::<f64>::from_rows(vec![]).unwrap(), &[]),
            Err(Error::EmptyTrainingSet { .. })
        ));
        assert!(!model.is_trained());
        assert!(matches!(model.try_predict(&[1.0, 1.0]), Err(Error::NotTrained)));
        assert_eq!(model.predict(&[1.0, 1.0]), 0);
    }

    #[test]
    fn test_config_from_params() {
        let config = PerceptronConfig::from_params(&params([("model_type", "dual"), ("eta", "0.5")]));
        assert_eq!(config.form, PerceptronForm::Dual);
        assert_eq!(config.learning_rate(), 0.5);
        assert_eq!(PerceptronConfig::default().learning_rate(), 0.1);
    }

    #[test]
    fn test_validate_and_display() {
        let (x, y) = separable();
        let mut model = Perceptron::new(PerceptronConfig::default());
        model.train(&x, &y).unwrap();
        assert_eq!(model.validate(&x, &y).unwrap(), 1.0);
        assert!(model.to_string().starts_with("Perceptron (original form)"));
    }
}
