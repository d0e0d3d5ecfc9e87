//! k-nearest-neighbors classification.
//!
//! Two interchangeable search engines sit behind [`KnnClassifier`]:
//! a brute-force [`LinearScan`] and a median-split [`KdTree`]. Both produce
//! the k closest training points, which [`plurality_vote`] reduces to a label.

pub mod best_k;
pub mod kd_tree;
pub mod linear;
pub mod vote;

use std::fmt;

pub use kd_tree::{KdTree, PruneBound, SearchOutcome};
pub use linear::LinearScan;
pub use vote::plurality_vote;

use crate::common_types::{Data, DataPoint, Feature, check_training_set};
use crate::config::{self, ModelParam};
use crate::error::{Error, Result};
use crate::timing::Stopwatch;

/// Defines the search strategy to be used by the KNN classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SearchStrategy {
    #[default]
    LinearScan,
    KdTree,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct KnnConfig {
    /// Number of neighbors that vote.
    pub k: usize,
    /// Minkowski exponent.
    pub p: u32,
    pub strategy: SearchStrategy,
    pub prune: PruneBound,
}

impl Default for KnnConfig {
    fn default() -> Self {
        KnnConfig {
            k: 3,
            p: 2,
            strategy: SearchStrategy::LinearScan,
            prune: PruneBound::KthBest,
        }
    }
}

impl KnnConfig {
    /// Reads `k`, `p`, `model_type` (`knn` | `kdtree`) and `prune`
    /// (`kth` | `nearest`); anything else keeps its default.
    pub fn from_params(params: &ModelParam) -> Self {
        let defaults = KnnConfig::default();
        let strategy = match config::text(params, "model_type") {
            Some("kdtree") => SearchStrategy::KdTree,
            Some("knn") | None => SearchStrategy::LinearScan,
            Some(other) => {
                log::warn!("unknown k-NN model_type `{other}`, using linear scan");
                SearchStrategy::LinearScan
            }
        };
        let prune = match config::text(params, "prune") {
            Some("nearest") => PruneBound::Nearest,
            _ => PruneBound::KthBest,
        };
        let p = match config::integer_or(params, "p", defaults.p) {
            0 => {
                log::warn!("p = 0 is not a distance exponent, using p = {}", defaults.p);
                defaults.p
            }
            p => p,
        };
        KnnConfig {
            k: config::integer_or(params, "k", defaults.k),
            p,
            strategy,
            prune,
        }
    }
}

#[derive(Debug, Clone)]
enum Engine<F, L> {
    Untrained,
    Linear(LinearScan<F, L>),
    Tree(KdTree<F, L>),
}

/// The K-Nearest Neighbors Classifier.
///
/// `predict` only borrows the classifier: all search state is local to the
/// call, so a trained classifier can be shared between threads.
#[derive(Debug, Clone)]
pub struct KnnClassifier<F, L> {
    config: KnnConfig,
    engine: Engine<F, L>,
}

impl<F, L> KnnClassifier<F, L>
where
    F: Feature,
    L: Ord + Clone + Default,
{
    pub fn new(config: KnnConfig) -> Self {
        KnnClassifier {
            config,
            engine: Engine::Untrained,
        }
    }

    pub fn from_params(params: &ModelParam) -> Self {
        Self::new(KnnConfig::from_params(params))
    }

    pub fn config(&self) -> &KnnConfig {
        &self.config
    }

    pub fn search_strategy(&self) -> SearchStrategy {
        self.config.strategy
    }

    pub fn is_trained(&self) -> bool {
        !matches!(self.engine, Engine::Untrained)
    }

    /// Number of stored training points (zero before training).
    pub fn n_training_points(&self) -> usize {
        match &self.engine {
            Engine::Untrained => 0,
            Engine::Linear(scan) => scan.len(),
            Engine::Tree(tree) => tree.len(),
        }
    }

    /// The k-d tree, when the classifier was trained with that strategy.
    pub fn kd_tree(&self) -> Option<&KdTree<F, L>> {
        match &self.engine {
            Engine::Tree(tree) => Some(tree),
            _ => None,
        }
    }

    /// Trains on the rows of `x` with one label per row.
    ///
    /// Copies the data, so the caller's buffers are not referenced afterwards.
    /// On failure the previous training state is left untouched.
    pub fn train(&mut self, x: &Data<F>, y: &[L]) -> Result<()> {
        let _timer = Stopwatch::start("knn train");
        if let Err(err) = check_training_set(x, y) {
            log::error!("k-NN training rejected: {err}");
            return Err(err);
        }
        let points = x
            .rows()
            .iter()
            .zip(y)
            .map(|(row, label)| DataPoint::new(row.clone(), label.clone()))
            .collect();
        self.fit(points)
    }

    /// Trains from labeled points, replacing any previous training.
    pub fn fit(&mut self, points: Vec<DataPoint<F, L>>) -> Result<()> {
        let engine = match self.config.strategy {
            SearchStrategy::LinearScan => {
                log::info!("linear-scan k-NN has no training phase; storing {} points", points.len());
                LinearScan::new(points).map(Engine::Linear)
            }
            SearchStrategy::KdTree => {
                log::info!("building k-d tree over {} points", points.len());
                KdTree::build(points).map(Engine::Tree)
            }
        };
        match engine {
            Ok(engine) => {
                self.engine = engine;
                self.describe();
                Ok(())
            }
            Err(err) => {
                log::error!("k-NN training failed: {err}");
                Err(err)
            }
        }
    }

    /// k actually used for a query; larger requests shrink to the training
    /// set size without changing the configuration.
    fn effective_k(&self, available: usize) -> usize {
        if self.config.k > available {
            log::warn!(
                "k = {} exceeds the {available} training points, using k = {available}",
                self.config.k
            );
            available
        } else {
            self.config.k
        }
    }

    /// The k nearest training points as `(distance, label)`, closest first.
    pub fn neighbors(&self, query: &[F]) -> Result<Vec<(f64, L)>> {
        let found = match &self.engine {
            Engine::Untrained => return Err(Error::NotTrained),
            Engine::Linear(scan) => {
                if query.len() != scan.dim() {
                    return Err(Error::DimensionMismatch {
                        expected: scan.dim(),
                        found: query.len(),
                    });
                }
                scan.nearest(query, self.effective_k(scan.len()), self.config.p)
            }
            Engine::Tree(tree) => {
                let k = self.effective_k(tree.len());
                let outcome = tree.search(query, k, self.config.p, self.config.prune)?;
                log::debug!(
                    "k-d search visited {} of {} nodes",
                    outcome.visited,
                    tree.len()
                );
                outcome.candidates
            }
        };
        Ok(found
            .into_iter()
            .map(|(d, point)| (d, point.label.clone()))
            .collect())
    }

    /// Plurality label of the k nearest neighbors.
    pub fn try_predict(&self, query: &[F]) -> Result<L> {
        let neighbors = self.neighbors(query)?;
        plurality_vote(neighbors.into_iter().map(|(_, label)| label)).ok_or(Error::NoNeighbors)
    }

    /// Like [`try_predict`](Self::try_predict), but logs the failure and
    /// returns `L::default()` instead.
    pub fn predict(&self, query: &[F]) -> L {
        self.try_predict(query).unwrap_or_else(|err| {
            log::error!("k-NN prediction failed: {err}");
            L::default()
        })
    }

    pub fn predict_batch(&self, queries: &[Vec<F>]) -> Vec<L> {
        queries.iter().map(|q| self.predict(q)).collect()
    }

    /// Fraction of test rows whose prediction equals the given label.
    pub fn validate(&self, x_test: &Data<F>, y_test: &[L]) -> Result<f64> {
        let _timer = Stopwatch::start("knn validate");
        if !self.is_trained() {
            log::error!("k-NN validation before training");
            return Err(Error::NotTrained);
        }
        let predictions = self.predict_batch(x_test.rows());
        let accuracy = crate::common_types::accuracy(&predictions, y_test)?;
        log::info!("accuracy: {accuracy:.6}");
        Ok(accuracy)
    }

    /// Logs the configuration.
    pub fn describe(&self) {
        log::info!("{self}");
    }
}

impl<F: Feature, L> fmt::Display for KnnClassifier<F, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let strategy = match self.config.strategy {
            SearchStrategy::LinearScan => "linear scan",
            SearchStrategy::KdTree => "k-d tree",
        };
        write!(
            f,
            "KNN with k = {}, p = {}, {strategy}",
            self.config.k, self.config.p
        )?;
        if self.config.strategy == SearchStrategy::KdTree {
            let prune = match self.config.prune {
                PruneBound::KthBest => "k-th best",
                PruneBound::Nearest => "nearest",
            };
            write!(f, ", pruned by {prune} distance")?;
        }
        match &self.engine {
            Engine::Untrained => write!(f, " (untrained)"),
            Engine::Linear(scan) => write!(f, " ({} points)", scan.len()),
            Engine::Tree(tree) => write!(f, " ({} nodes, height {})", tree.len(), tree.height()),
        }
    }
}

/// Shared feature dimensionality of a training set.
///
/// Empty sets and zero-length features are rejected as an empty training
/// set; a point whose length differs from the first is a ragged row.
pub(crate) fn feature_dimension<F, L>(points: &[DataPoint<F, L>]) -> Result<usize> {
    let dim = points.first().map_or(0, |p| p.features.len());
    if dim == 0 {
        return Err(Error::EmptyTrainingSet {
            rows: points.len(),
            cols: dim,
        });
    }
    if let Some((row, bad)) = points
        .iter()
        .enumerate()
        .find(|(_, p)| p.features.len() != dim)
    {
        return Err(Error::RaggedRow {
            row,
            expected: dim,
            found: bad.features.len(),
        });
    }
    Ok(dim)
}
