//! Brute-force neighbor search over the stored training set.

use super::best_k::KBestNeighbors;
use super::feature_dimension;
use crate::common_types::{DataPoint, Feature};
use crate::error::Result;
use crate::math::lp;

/// Training points kept verbatim; every query scans all of them.
#[derive(Debug, Clone)]
pub struct LinearScan<F, L> {
    points: Vec<DataPoint<F, L>>,
    dim: usize,
}

impl<F: Feature, L> LinearScan<F, L> {
    pub fn new(points: Vec<DataPoint<F, L>>) -> Result<Self> {
        let dim = feature_dimension(&points)?;
        Ok(LinearScan { points, dim })
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn points(&self) -> &[DataPoint<F, L>] {
        &self.points
    }

    /// The `k` closest points to `query`, closest first.
    ///
    /// The first `k` points seed the accumulator; each later point replaces
    /// the current worst only when strictly closer, so equal distances keep
    /// training order. `O(m log k)`.
    pub fn nearest(&self, query: &[F], k: usize, p: u32) -> Vec<(f64, &DataPoint<F, L>)> {
        let mut best = KBestNeighbors::new(k);
        for point in &self.points {
            best.add(lp(query, &point.features, p), point);
        }
        best.into_sorted_points()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn make_dp(features: Vec<f64>, label: char) -> DataPoint<f64, char> {
        DataPoint::new(features, label)
    }

    fn four_points() -> Vec<DataPoint<f64, char>> {
        vec![
            make_dp(vec![1.0, 1.0], 'A'),
            make_dp(vec![2.0, 2.0], 'A'),
            make_dp(vec![8.0, 8.0], 'B'),
            make_dp(vec![9.0, 9.0], 'B'),
        ]
    }

    #[test]
    fn test_nearest_three_from_origin() {
        let scan = LinearScan::new(four_points()).unwrap();
        let labels: Vec<char> = scan
            .nearest(&[0.0, 0.0], 3, 2)
            .into_iter()
            .map(|(_, p)| p.label)
            .collect();
        assert_eq!(labels, vec!['A', 'A', 'B']);
    }

    #[test]
    fn test_k_larger_than_training_set_returns_everything() {
        let scan = LinearScan::new(four_points()).unwrap();
        assert_eq!(scan.nearest(&[5.0, 5.0], 10, 2).len(), 4);
    }

    #[test]
    fn test_equal_distances_keep_training_order() {
        let points = vec![
            make_dp(vec![-1.0], 'L'),
            make_dp(vec![1.0], 'R'),
            make_dp(vec![3.0], 'F'),
        ];
        let scan = LinearScan::new(points).unwrap();
        let nearest = scan.nearest(&[0.0], 1, 2);
        assert_eq!(nearest[0].1.label, 'L');
    }

    #[test]
    fn test_rejects_empty_and_inconsistent_input() {
        assert!(matches!(
            LinearScan::<f64, char>::new(vec![]),
            Err(Error::EmptyTrainingSet { .. })
        ));
        let ragged = vec![make_dp(vec![1.0, 2.0], 'A'), make_dp(vec![3.0], 'B')];
        assert!(matches!(
            LinearScan::new(ragged),
            Err(Error::RaggedRow { row: 1, .. })
        ));
    }
}
