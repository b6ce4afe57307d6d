use std::collections::BinaryHeap;

use nalgebra::Vector3;
use ndarray::prelude::*;
use ordered_float::OrderedFloat;

enum KdNode {
    Leaf {
        points: Array2<f32>,
        indices: Vec<usize>,
    },
    NonLeaf {
        axis: usize,
        middle_value: f32,
        left: Box<KdNode>,
        right: Box<KdNode>,
    },
}

/// KdTree for exact nearest neighbor search over 3D points.
pub struct KdTree {
    root: Box<KdNode>,
    len: usize,
}

impl KdTree {
    /// Create a new KdTree from a set of points.
    /// The points are stored in a 2D array, where each row is a point.
    ///
    /// # Arguments
    ///
    /// * points - (Nx3) array of points.
    pub fn new(points: &ArrayView2<f32>) -> Self {
        // Recursive creation.
        fn rec(points: &ArrayView2<f32>, mut indices: Vec<usize>, depth: usize) -> KdNode {
            // Stop recursion if this should be a leaf node.
            if indices.len() <= 16 {
                return KdNode::Leaf {
                    points: points.select(Axis(0), &indices),
                    indices,
                };
            }

            let axis = depth % 3;
            indices.sort_by(|idx1, idx2| points[[*idx1, axis]].total_cmp(&points[[*idx2, axis]]));

            let mid = indices.len() / 2;
            KdNode::NonLeaf {
                axis,
                middle_value: points[[indices[mid], axis]],
                left: Box::new(rec(points, indices[0..mid].to_vec(), depth + 1)),
                right: Box::new(rec(points, indices[mid..].to_vec(), depth + 1)),
            }
        }

        let indices = Vec::from_iter(0..points.nrows());
        KdTree {
            root: Box::new(rec(points, indices, 0)),
            len: points.nrows(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Find the nearest neighbor to a query point.
    ///
    /// # Returns
    ///
    /// The index of the nearest point and its squared distance, or `None` if
    /// the tree is empty.
    pub fn nearest(&self, query: &Vector3<f32>) -> Option<(usize, f32)> {
        self.knn(query, 1).into_iter().next()
    }

    /// Find the `k` nearest neighbors to a query point.
    ///
    /// # Returns
    ///
    /// Up to `k` pairs of point index and squared distance, closest first.
    pub fn knn(&self, query: &Vector3<f32>, k: usize) -> Vec<(usize, f32)> {
        if k == 0 {
            return Vec::new();
        }

        // Max-heap on distance holding the best k candidates so far.
        let mut heap: BinaryHeap<(OrderedFloat<f32>, usize)> = BinaryHeap::with_capacity(k + 1);
        search(&self.root, query, k, &mut heap);

        heap.into_sorted_vec()
            .into_iter()
            .map(|(dist, idx)| (idx, dist.0))
            .collect()
    }
}

fn search(
    node: &KdNode,
    query: &Vector3<f32>,
    k: usize,
    heap: &mut BinaryHeap<(OrderedFloat<f32>, usize)>,
) {
    match node {
        KdNode::Leaf { points, indices } => {
            for (leaf_point, index) in points.outer_iter().zip(indices) {
                let dist = (query - Vector3::new(leaf_point[0], leaf_point[1], leaf_point[2]))
                    .norm_squared();
                if heap.len() < k {
                    heap.push((OrderedFloat(dist), *index));
                } else if heap.peek().map_or(false, |(worst, _)| dist < worst.0) {
                    heap.pop();
                    heap.push((OrderedFloat(dist), *index));
                }
            }
        }
        KdNode::NonLeaf {
            axis,
            middle_value,
            left,
            right,
        } => {
            let diff = query[*axis] - middle_value;
            let (near, far) = if diff < 0.0 { (left, right) } else { (right, left) };

            search(near, query, k, heap);
            let worst = heap.peek().map_or(f32::INFINITY, |(worst, _)| worst.0);
            if heap.len() < k || diff * diff < worst {
                search(far, query, k, heap);
            }
        }
    }
}
