//! Gaussian naive Bayes.
//!
//! Each class keeps its prior and one normal distribution per feature;
//! prediction picks the class with the largest log posterior
//! `ln P(c) + Σ_j ln N(x_j; μ_cj, σ_cj)`.

use std::collections::BTreeMap;
use std::fmt;

use crate::common_types::{Data, Feature, accuracy, check_training_set};
use crate::config::{self, ModelParam};
use crate::error::{Error, Result};
use crate::math::{gaussian_log_pdf, mean, stdev};
use crate::timing::Stopwatch;

/// Added to every per-feature standard deviation so constant features keep
/// a finite density.
pub const SIGMA_SMOOTHING: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GaussianParam {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ClassSummary {
    pub prior: f64,
    pub features: Vec<GaussianParam>,
}

impl ClassSummary {
    fn log_posterior<F: Feature>(&self, x: &[F]) -> f64 {
        self.features
            .iter()
            .zip(x)
            .map(|(g, &v)| gaussian_log_pdf(v.as_(), g.mu, g.sigma))
            .sum::<f64>()
            + self.prior.ln()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NaiveBayesConfig {
    /// Log every class summary after training.
    pub model_show: bool,
}

impl NaiveBayesConfig {
    /// Reads `model_type` and `model_show`. Only `gaussian` is available;
    /// `bernoulli` and anything else fall back to it with a warning.
    pub fn from_params(params: &ModelParam) -> Self {
        match config::text(params, "model_type") {
            None | Some("gaussian") => {}
            Some(other) => log::warn!("naive Bayes `{other}` is not available, using gaussian"),
        }
        NaiveBayesConfig {
            model_show: config::flag(params, "model_show"),
        }
    }
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(bound(
        serialize = "L: serde::Serialize",
        deserialize = "L: serde::Deserialize<'de> + Ord"
    ))
)]
pub struct NaiveBayes<L> {
    config: NaiveBayesConfig,
    classes: BTreeMap<L, ClassSummary>,
    dim: usize,
}

impl<L> NaiveBayes<L>
where
    L: Ord + Clone + Default + fmt::Debug,
{
    pub fn new(config: NaiveBayesConfig) -> Self {
        NaiveBayes {
            config,
            classes: BTreeMap::new(),
            dim: 0,
        }
    }

    pub fn from_params(params: &ModelParam) -> Self {
        Self::new(NaiveBayesConfig::from_params(params))
    }

    pub fn is_trained(&self) -> bool {
        !self.classes.is_empty()
    }

    pub fn classes(&self) -> &BTreeMap<L, ClassSummary> {
        &self.classes
    }

    pub fn train<F: Feature>(&mut self, x: &Data<F>, y: &[L]) -> Result<()> {
        let _timer = Stopwatch::start("naive bayes train");
        if let Err(err) = check_training_set(x, y) {
            log::error!("naive Bayes training rejected: {err}");
            return Err(err);
        }

        let mut grouped: BTreeMap<L, Vec<&[F]>> = BTreeMap::new();
        for (row, label) in x.rows().iter().zip(y) {
            grouped.entry(label.clone()).or_default().push(row);
        }

        let m = x.n_rows() as f64;
        self.classes = grouped
            .into_iter()
            .map(|(label, rows)| {
                let features = (0..x.n_cols())
                    .map(|j| {
                        let column: Vec<f64> = rows.iter().map(|r| r[j].as_()).collect();
                        GaussianParam {
                            mu: mean(&column),
                            sigma: stdev(&column) + SIGMA_SMOOTHING,
                        }
                    })
                    .collect();
                let summary = ClassSummary {
                    prior: rows.len() as f64 / m,
                    features,
                };
                (label, summary)
            })
            .collect();
        self.dim = x.n_cols();
        log::info!("naive Bayes trained on {} classes", self.classes.len());
        self.describe();
        Ok(())
    }

    pub fn try_predict<F: Feature>(&self, x: &[F]) -> Result<L> {
        if !self.is_trained() {
            return Err(Error::NotTrained);
        }
        if x.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: x.len(),
            });
        }
        let mut best: Option<(&L, f64)> = None;
        for (label, summary) in &self.classes {
            let score = summary.log_posterior(x);
            log::debug!("class {label:?}: log posterior {score}");
            if best.is_none_or(|(_, top)| score > top) {
                best = Some((label, score));
            }
        }
        best.map(|(label, _)| label.clone()).ok_or(Error::NotTrained)
    }

    pub fn predict<F: Feature>(&self, x: &[F]) -> L {
        self.try_predict(x).unwrap_or_else(|err| {
            log::error!("naive Bayes prediction failed: {err}");
            L::default()
        })
    }

    pub fn validate<F: Feature>(&self, x_test: &Data<F>, y_test: &[L]) -> Result<f64> {
        let _timer = Stopwatch::start("naive bayes validate");
        if !self.is_trained() {
            return Err(Error::NotTrained);
        }
        let predictions: Vec<L> = x_test.rows().iter().map(|row| self.predict(row)).collect();
        let acc = accuracy(&predictions, y_test)?;
        log::info!("accuracy: {acc:.6}");
        Ok(acc)
    }

    pub fn describe(&self) {
        log::info!("Gaussian naive Bayes with {} classes", self.classes.len());
        if self.config.model_show {
            for (label, summary) in &self.classes {
                log::info!("class {label:?}: prior {:.6}", summary.prior);
                for (j, g) in summary.features.iter().enumerate() {
                    log::info!("  feature {j}: mu = {:.6}, sigma = {:.6}", g.mu, g.sigma);
                }
            }
        }
    }
}
