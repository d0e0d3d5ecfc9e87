//! This module contains the k-d tree used by the tree-backed k-NN engine.
//!
//! Nodes live in an arena (`Vec<KdNode>`) and refer to their children by
//! index. The tree is built once from the training set and never mutated;
//! all per-query state lives in a [`SearchContext`] created for each search.

use std::cmp::Ordering;
use std::ops::Range;

use super::best_k::KBestNeighbors;
use super::feature_dimension;
use crate::common_types::{DataPoint, Feature};
use crate::error::{Error, Result};
use crate::math::lp;

pub type NodeId = usize;

#[derive(Debug, Clone)]
pub struct KdNode<F, L> {
    point: DataPoint<F, L>,
    /// Depth in the tree; the split axis is `level % dim`.
    level: usize,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

impl<F, L> KdNode<F, L> {
    pub fn point(&self) -> &DataPoint<F, L> {
        &self.point
    }

    pub fn level(&self) -> usize {
        self.level
    }

    pub fn left(&self) -> Option<NodeId> {
        self.left
    }

    pub fn right(&self) -> Option<NodeId> {
        self.right
    }
}

/// Which distance bounds the search radius when deciding whether to cross a
/// splitting hyperplane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PruneBound {
    /// The k-th best distance once k candidates are held, unbounded before.
    /// Never skips a subtree that could hold one of the k nearest points.
    #[default]
    KthBest,
    /// The single best distance seen so far. Visits fewer nodes but, for
    /// k > 1, may skip subtrees holding the 2nd..k-th nearest points.
    Nearest,
}

#[derive(Debug, Clone)]
pub struct KdTree<F, L> {
    nodes: Vec<KdNode<F, L>>,
    root: Option<NodeId>,
    dim: usize,
}

/// Result of one k-nearest search.
#[derive(Debug)]
pub struct SearchOutcome<'a, F, L> {
    /// The single closest point.
    pub nearest: Option<(f64, &'a DataPoint<F, L>)>,
    /// Up to k closest points, closest first.
    pub candidates: Vec<(f64, &'a DataPoint<F, L>)>,
    /// Number of nodes whose distance was evaluated.
    pub visited: usize,
}

/// Per-query scratch: the overall nearest node and the bounded candidate set.
struct SearchContext {
    nearest: Option<(NodeId, f64)>,
    candidates: KBestNeighbors<NodeId>,
    visited: usize,
}

impl SearchContext {
    fn new(k: usize) -> Self {
        SearchContext {
            nearest: None,
            candidates: KBestNeighbors::new(k),
            visited: 0,
        }
    }

    fn visit(&mut self, id: NodeId, distance: f64) {
        if self.nearest.is_none_or(|(_, best)| distance < best) {
            self.nearest = Some((id, distance));
        }
        self.candidates.add(distance, id);
        self.visited += 1;
    }

    fn radius(&self, bound: PruneBound) -> f64 {
        match bound {
            PruneBound::KthBest => self
                .candidates
                .current_farthest_distance()
                .unwrap_or(f64::INFINITY),
            PruneBound::Nearest => self.nearest.map_or(f64::INFINITY, |(_, d)| d),
        }
    }
}

enum Step {
    /// Walk towards the leaf region containing the query.
    Descend(NodeId),
    /// Evaluate the node, then consider the subtree on the far side.
    Settle(NodeId, Option<NodeId>),
}

/// Build-time node: the training point is referenced by index until the
/// arena is assembled.
struct Skeleton {
    point_index: usize,
    level: usize,
    left: Option<NodeId>,
    right: Option<NodeId>,
}

enum Slot {
    Root,
    Left(NodeId),
    Right(NodeId),
}

impl<F: Feature, L> KdTree<F, L> {
    /// Builds a balanced tree by alternating-axis median splits.
    ///
    /// Fails on an empty training set, zero-length features, or points of
    /// differing dimensionality. Coordinates must not be NaN.
    pub fn build(points: Vec<DataPoint<F, L>>) -> Result<Self> {
        let dim = feature_dimension(&points)?;

        let mut order: Vec<usize> = (0..points.len()).collect();
        let mut skeleton: Vec<Skeleton> = Vec::with_capacity(points.len());
        let mut root = None;
        let mut work: Vec<(Range<usize>, usize, Slot)> = vec![(0..points.len(), 0, Slot::Root)];

        while let Some((range, depth, slot)) = work.pop() {
            if range.is_empty() {
                continue;
            }
            let axis = depth % dim;
            let split = range.start + median_split(&mut order[range.clone()], &points, axis);

            let id = skeleton.len();
            skeleton.push(Skeleton {
                point_index: order[split],
                level: depth,
                left: None,
                right: None,
            });
            match slot {
                Slot::Root => root = Some(id),
                Slot::Left(parent) => skeleton[parent].left = Some(id),
                Slot::Right(parent) => skeleton[parent].right = Some(id),
            }

            work.push((split + 1..range.end, depth + 1, Slot::Right(id)));
            work.push((range.start..split, depth + 1, Slot::Left(id)));
        }

        // every point became exactly one node; move them into arena order
        let mut rank = vec![0; points.len()];
        for (id, s) in skeleton.iter().enumerate() {
            rank[s.point_index] = id;
        }
        let mut ranked: Vec<(NodeId, DataPoint<F, L>)> = points
            .into_iter()
            .enumerate()
            .map(|(i, p)| (rank[i], p))
            .collect();
        ranked.sort_unstable_by_key(|(id, _)| *id);

        let nodes: Vec<KdNode<F, L>> = skeleton
            .into_iter()
            .zip(ranked)
            .map(|(s, (_, point))| KdNode {
                point,
                level: s.level,
                left: s.left,
                right: s.right,
            })
            .collect();

        log::debug!("built k-d tree with {} nodes over {} dimensions", nodes.len(), dim);
        Ok(KdTree { nodes, root, dim })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &KdNode<F, L> {
        &self.nodes[id]
    }

    fn axis_of(&self, node: &KdNode<F, L>) -> usize {
        node.level % self.dim
    }

    fn check_query(&self, query: &[F]) -> Result<()> {
        if query.len() != self.dim {
            return Err(Error::DimensionMismatch {
                expected: self.dim,
                found: query.len(),
            });
        }
        Ok(())
    }

    /// Finds up to `k` nearest points to `query` under the Lp distance.
    ///
    /// Each node first descends towards the query's side of its splitting
    /// hyperplane, then evaluates itself, then crosses to the other side only
    /// if the hyperplane is closer than the radius chosen by `bound`.
    pub fn search(
        &self,
        query: &[F],
        k: usize,
        p: u32,
        bound: PruneBound,
    ) -> Result<SearchOutcome<'_, F, L>> {
        self.check_query(query)?;

        let mut ctx = SearchContext::new(k);
        let mut stack: Vec<Step> = self.root.map(Step::Descend).into_iter().collect();

        while let Some(step) = stack.pop() {
            match step {
                Step::Descend(id) => {
                    let node = &self.nodes[id];
                    let axis = self.axis_of(node);
                    let (near, far) = if query[axis] < node.point.features[axis] {
                        (node.left, node.right)
                    } else {
                        (node.right, node.left)
                    };
                    stack.push(Step::Settle(id, far));
                    if let Some(near) = near {
                        stack.push(Step::Descend(near));
                    }
                }
                Step::Settle(id, far) => {
                    let node = &self.nodes[id];
                    ctx.visit(id, lp(query, &node.point.features, p));

                    if let Some(far) = far {
                        let axis = self.axis_of(node);
                        let gap: f64 = (query[axis] - node.point.features[axis]).abs().as_();
                        if gap < ctx.radius(bound) {
                            stack.push(Step::Descend(far));
                        }
                    }
                }
            }
        }

        Ok(SearchOutcome {
            nearest: ctx.nearest.map(|(id, d)| (d, &self.nodes[id].point)),
            candidates: ctx
                .candidates
                .into_sorted_points()
                .into_iter()
                .map(|(d, id)| (d, &self.nodes[id].point))
                .collect(),
            visited: ctx.visited,
        })
    }

    /// Every point within `radius` (inclusive) of `query`, in visit order.
    pub fn within_radius(
        &self,
        query: &[F],
        radius: f64,
        p: u32,
    ) -> Result<Vec<(f64, &DataPoint<F, L>)>> {
        self.check_query(query)?;
        let mut found = Vec::new();
        if radius <= 0.0 {
            return Ok(found);
        }

        let mut stack: Vec<NodeId> = self.root.into_iter().collect();
        while let Some(id) = stack.pop() {
            let node = &self.nodes[id];
            let distance = lp(query, &node.point.features, p);
            if distance <= radius {
                found.push((distance, &node.point));
            }

            let axis = self.axis_of(node);
            let (near, far) = if query[axis] < node.point.features[axis] {
                (node.left, node.right)
            } else {
                (node.right, node.left)
            };
            let gap: f64 = (query[axis] - node.point.features[axis]).abs().as_();
            if let Some(far) = far.filter(|_| gap <= radius) {
                stack.push(far);
            }
            if let Some(near) = near {
                stack.push(near);
            }
        }
        Ok(found)
    }

    /// Longest root-to-leaf path, counted in nodes.
    pub fn height(&self) -> usize {
        let mut tallest = 0;
        let mut stack: Vec<(NodeId, usize)> = self.root.map(|r| (r, 1)).into_iter().collect();
        while let Some((id, depth)) = stack.pop() {
            tallest = tallest.max(depth);
            let node = &self.nodes[id];
            stack.extend(node.left.iter().chain(node.right.iter()).map(|&c| (c, depth + 1)));
        }
        tallest
    }

    /// Verifies the ordering invariant at every node: left subtree strictly
    /// below the node on its split axis, right subtree at or above it.
    pub fn is_valid(&self) -> bool {
        self.nodes.iter().all(|node| {
            let axis = self.axis_of(node);
            let split = node.point.features[axis];
            self.subtree(node.left)
                .all(|id| self.nodes[id].point.features[axis] < split)
                && self
                    .subtree(node.right)
                    .all(|id| self.nodes[id].point.features[axis] >= split)
        })
    }

    fn subtree(&self, start: Option<NodeId>) -> impl Iterator<Item = NodeId> + '_ {
        let mut stack: Vec<NodeId> = start.into_iter().collect();
        std::iter::from_fn(move || {
            let id = stack.pop()?;
            let node = &self.nodes[id];
            stack.extend(node.left.iter().chain(node.right.iter()));
            Some(id)
        })
    }
}

/// Places the median (by count) of `indices` on `axis` at the midpoint using
/// selection, then moves the split back to the leftmost element sharing the
/// median's coordinate. Returns the split position: everything before it is
/// strictly smaller on `axis`, everything after it is not smaller.
fn median_split<F: Feature, L>(indices: &mut [usize], points: &[DataPoint<F, L>], axis: usize) -> usize {
    let coord = |i: usize| points[i].features[axis];
    let mid = indices.len() / 2;
    indices.select_nth_unstable_by(mid, |&a, &b| {
        coord(a).partial_cmp(&coord(b)).unwrap_or(Ordering::Equal)
    });
    let median = coord(indices[mid]);

    // group the lower half's duplicates of the median right before it
    let lower = &mut indices[..mid];
    let mut boundary = 0;
    for i in 0..lower.len() {
        if coord(lower[i]) < median {
            lower.swap(i, boundary);
            boundary += 1;
        }
    }

    let mut split = mid;
    while split > 0 && coord(indices[split - 1]) == median {
        split -= 1;
    }
    split
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn make_dp(features: Vec<f64>, label: i32) -> DataPoint<f64, i32> {
        DataPoint { features, label }
    }

    fn check_node_props(tree: &KdTree<f64, i32>, id: Option<NodeId>, features: &[f64], label: i32, level: usize) -> NodeId {
        let id = id.expect("Node should exist but was None");
        let node = tree.node(id);
        assert_eq!(node.point().features, features, "Node point features mismatch");
        assert_eq!(node.point().label, label, "Node point label mismatch");
        assert_eq!(node.level(), level, "Node level mismatch");
        id
    }

    fn random_points(rng: &mut StdRng, n: usize, dim: usize, grid: i32) -> Vec<DataPoint<f64, i32>> {
        (0..n)
            .map(|i| {
                let features = (0..dim).map(|_| rng.gen_range(0..grid) as f64).collect();
                make_dp(features, (i % 3) as i32)
            })
            .collect()
    }

    fn brute_force_nearest(points: &[DataPoint<f64, i32>], query: &[f64], p: u32) -> Vec<f64> {
        let mut d: Vec<f64> = points.iter().map(|pt| lp(query, &pt.features, p)).collect();
        d.sort_by(|a, b| a.partial_cmp(b).unwrap());
        d
    }

    #[test]
    fn test_empty_input() {
        let points: Vec<DataPoint<f64, i32>> = vec![];
        assert!(matches!(KdTree::build(points), Err(Error::EmptyTrainingSet { .. })));
    }

    #[test]
    fn test_zero_dimensionality_points() {
        let points = vec![make_dp(vec![], 0)];
        assert!(matches!(KdTree::build(points), Err(Error::EmptyTrainingSet { .. })));
    }

    #[test]
    fn test_inconsistent_dimensionality() {
        let points = vec![make_dp(vec![1.0, 2.0], 0), make_dp(vec![3.0], 1)];
        assert!(matches!(KdTree::build(points), Err(Error::RaggedRow { row: 1, .. })));
    }

    #[test]
    fn test_single_point_tree() {
        let tree = KdTree::build(vec![make_dp(vec![1.0, 2.0], 42)]).unwrap();
        let root = check_node_props(&tree, tree.root(), &[1.0, 2.0], 42, 0);
        assert!(tree.node(root).left().is_none());
        assert!(tree.node(root).right().is_none());
        assert_eq!(tree.height(), 1);
    }

    #[test]
    fn test_median_construction_2d() {
        let points = vec![
            make_dp(vec![2.0, 3.0], 1),
            make_dp(vec![5.0, 4.0], 2),
            make_dp(vec![9.0, 6.0], 3),
            make_dp(vec![4.0, 7.0], 4),
            make_dp(vec![8.0, 1.0], 5),
            make_dp(vec![7.0, 2.0], 6),
        ];
        let tree = KdTree::build(points).unwrap();

        // x-sorted: 2 4 5 7 8 9, midpoint index 3 -> (7,2)
        let root = check_node_props(&tree, tree.root(), &[7.0, 2.0], 6, 0);
        // left range {(2,3),(5,4),(4,7)} by y: 3 4 7 -> (5,4)
        let left = check_node_props(&tree, tree.node(root).left(), &[5.0, 4.0], 2, 1);
        // right range {(8,1),(9,6)} by y: 1 6 -> (9,6)
        let right = check_node_props(&tree, tree.node(root).right(), &[9.0, 6.0], 3, 1);

        check_node_props(&tree, tree.node(left).left(), &[2.0, 3.0], 1, 2);
        check_node_props(&tree, tree.node(left).right(), &[4.0, 7.0], 4, 2);
        check_node_props(&tree, tree.node(right).left(), &[8.0, 1.0], 5, 2);
        assert!(tree.node(right).right().is_none());
        assert!(tree.is_valid());
    }

    #[test]
    fn test_three_points_one_dimension() {
        let points = vec![make_dp(vec![3.0], 3), make_dp(vec![1.0], 1), make_dp(vec![2.0], 2)];
        let tree = KdTree::build(points).unwrap();
        let root = check_node_props(&tree, tree.root(), &[2.0], 2, 0);
        // axis stays 0 at every level in one dimension
        check_node_props(&tree, tree.node(root).left(), &[1.0], 1, 1);
        check_node_props(&tree, tree.node(root).right(), &[3.0], 3, 1);
    }

    #[test]
    fn test_duplicate_coordinates_split_leftmost() {
        // x values 1 2 2 2 3: the median 2 must move to the first duplicate so
        // the left subtree stays strictly below it
        let points = vec![
            make_dp(vec![2.0, 0.0], 0),
            make_dp(vec![3.0, 0.0], 1),
            make_dp(vec![2.0, 1.0], 2),
            make_dp(vec![1.0, 0.0], 3),
            make_dp(vec![2.0, 2.0], 4),
        ];
        let tree = KdTree::build(points).unwrap();
        let root = tree.node(tree.root().unwrap());
        assert_eq!(root.point().features[0], 2.0);
        let left = tree.node(root.left().unwrap());
        assert_eq!(left.point().features, vec![1.0, 0.0]);
        assert!(left.left().is_none() && left.right().is_none());
        assert!(tree.is_valid());
        assert_eq!(tree.len(), 5);
    }

    #[test]
    fn test_all_identical_points_do_not_overflow() {
        let points: Vec<_> = (0..20_000).map(|i| make_dp(vec![0.0, 0.0], i)).collect();
        let tree = KdTree::build(points).unwrap();
        assert_eq!(tree.len(), 20_000);
        // every node lands on the right spine
        assert_eq!(tree.height(), 20_000);
        let outcome = tree.search(&[0.0, 0.0], 3, 2, PruneBound::KthBest).unwrap();
        assert_eq!(outcome.candidates.len(), 3);
    }

    #[test]
    fn test_random_trees_are_valid_and_balanced() {
        let mut rng = StdRng::seed_from_u64(7);
        for dim in 1..=4 {
            let points = random_points(&mut rng, 257, dim, 1000);
            let tree = KdTree::build(points).unwrap();
            assert!(tree.is_valid(), "invalid tree for dim {dim}");
            assert!(tree.height() <= 12, "height {} for dim {dim}", tree.height());
        }
        // heavy duplication still yields a valid tree
        let points = random_points(&mut rng, 300, 3, 4);
        assert!(KdTree::build(points).unwrap().is_valid());
    }

    #[test]
    fn test_search_matches_brute_force() {
        let mut rng = StdRng::seed_from_u64(11);
        let points = random_points(&mut rng, 200, 3, 50);
        let tree = KdTree::build(points.clone()).unwrap();

        for _ in 0..50 {
            let query: Vec<f64> = (0..3).map(|_| rng.gen_range(-5.0..55.0)).collect();
            for p in [1, 2, 3] {
                let expected = brute_force_nearest(&points, &query, p);

                let one = tree.search(&query, 1, p, PruneBound::Nearest).unwrap();
                assert_eq!(one.nearest.unwrap().0, expected[0]);

                let k = 7;
                let many = tree.search(&query, k, p, PruneBound::KthBest).unwrap();
                let got: Vec<f64> = many.candidates.iter().map(|(d, _)| *d).collect();
                assert_eq!(got, expected[..k].to_vec());
            }
        }
    }

    #[test]
    fn test_candidate_set_size() {
        let mut rng = StdRng::seed_from_u64(3);
        let points = random_points(&mut rng, 64, 2, 100);
        let tree = KdTree::build(points).unwrap();
        for k in [1, 5, 64, 100] {
            for bound in [PruneBound::KthBest, PruneBound::Nearest] {
                let outcome = tree.search(&[50.0, 50.0], k, 2, bound).unwrap();
                assert_eq!(outcome.candidates.len(), k.min(outcome.visited));
                assert!(outcome.visited <= tree.len());
            }
        }
    }

    #[test]
    fn test_pruning_skips_far_subtrees() {
        let points: Vec<_> = (0..1024).map(|i| make_dp(vec![i as f64], 0)).collect();
        let tree = KdTree::build(points).unwrap();
        let outcome = tree.search(&[500.2], 1, 2, PruneBound::Nearest).unwrap();
        assert_eq!(outcome.nearest.unwrap().1.features, vec![500.0]);
        assert!(outcome.visited < 64, "visited {}", outcome.visited);
    }

    #[test]
    fn test_nearest_bound_can_skip_second_neighbor() {
        // root 5.0, left 4.0, right 20.0; the query lands right of the root
        let points = vec![make_dp(vec![4.0], 1), make_dp(vec![5.0], 2), make_dp(vec![20.0], 3)];
        let tree = KdTree::build(points).unwrap();
        let labels = |bound: PruneBound| -> Vec<i32> {
            let outcome = tree.search(&[5.1], 2, 2, bound).unwrap();
            outcome.candidates.iter().map(|(_, p)| p.label).collect()
        };
        assert_eq!(labels(PruneBound::KthBest), vec![2, 1]);
        assert_eq!(labels(PruneBound::Nearest), vec![2, 3]);
    }

    #[test]
    fn test_search_rejects_wrong_dimension() {
        let tree = KdTree::build(vec![make_dp(vec![1.0, 2.0], 0)]).unwrap();
        assert!(matches!(
            tree.search(&[1.0], 1, 2, PruneBound::KthBest),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn test_radius_search_negative_or_zero_radius() {
        let tree = KdTree::build(vec![make_dp(vec![1.0], 0)]).unwrap();
        assert!(tree.within_radius(&[1.0], 0.0, 2).unwrap().is_empty());
        assert!(tree.within_radius(&[1.0], -1.0, 2).unwrap().is_empty());
    }

    #[test]
    fn test_radius_search_simple_case() {
        let points = vec![
            make_dp(vec![1.0, 1.0], 1),   // sqrt(8) from (3,3)
            make_dp(vec![2.0, 2.0], 2),   // sqrt(2)
            make_dp(vec![3.0, 3.0], 3),   // 0
            make_dp(vec![4.0, 4.0], 4),   // sqrt(2)
            make_dp(vec![5.0, 5.0], 5),   // sqrt(8)
            make_dp(vec![10.0, 10.0], 6), // sqrt(98)
        ];
        let tree = KdTree::build(points).unwrap();
        let target = [3.0, 3.0];

        let r0_5 = tree.within_radius(&target, 0.5, 2).unwrap();
        assert_eq!(r0_5.len(), 1);
        assert!(r0_5.iter().any(|(_, p)| p.label == 3));

        let r2 = tree.within_radius(&target, 2.0, 2).unwrap();
        let mut labels: Vec<i32> = r2.iter().map(|(_, p)| p.label).collect();
        labels.sort();
        assert_eq!(labels, vec![2, 3, 4]);

        let r3 = tree.within_radius(&target, 3.0, 2).unwrap();
        assert_eq!(r3.len(), 5);
        assert!(r3.iter().all(|(_, p)| p.label != 6));

        // Manhattan: (2,2) and (4,4) are exactly 2 away
        let manhattan = tree.within_radius(&target, 2.0, 1).unwrap();
        assert_eq!(manhattan.len(), 3);
    }
}
