//! k 近邻: 在所有基准点上建一棵静态 k-d 树, 逐点查询.

use std::num::NonZeroUsize;

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use ordered_float::OrderedFloat;

use crate::Point3;

/// 基准点上的 k-d 树. 叶结点容量 32.
type PointTree = ImmutableKdTree<f64, u32, 3, 32>;

/// 点 `i` 的 `k` 个最近邻 (不含自身), 按距离升序排列. 距离相同的按索引排列.
fn neighbours_of(tree: &PointTree, points: &[Point3], i: usize, k: usize) -> Vec<usize> {
    let k = k.min(points.len() - 1);
    let Some(qty) = NonZeroUsize::new(k + 1) else {
        return vec![];
    };
    let mut cand: Vec<(OrderedFloat<f64>, usize)> = tree
        .nearest_n::<SquaredEuclidean>(&points[i], qty)
        .into_iter()
        .map(|nn| (OrderedFloat(nn.distance), nn.item as usize))
        .filter(|(_, j)| *j != i)
        .collect();
    cand.sort_unstable();
    cand.truncate(k);
    cand.into_iter().map(|(_, j)| j).collect()
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        /// 借助 `rayon`, 并行地求所有点的 `k` 近邻表. `k` 超过 `points.len() - 1` 时截断.
        pub fn knn(points: &[Point3], k: usize) -> Vec<Vec<usize>> {
            if points.is_empty() {
                return vec![];
            }
            let tree = PointTree::new_from_slice(points);
            (0..points.len())
                .into_par_iter()
                .map(|i| neighbours_of(&tree, points, i, k))
                .collect()
        }
    } else {
        /// 所有点的 `k` 近邻表. `k` 超过 `points.len() - 1` 时截断.
        pub fn knn(points: &[Point3], k: usize) -> Vec<Vec<usize>> {
            if points.is_empty() {
                return vec![];
            }
            let tree = PointTree::new_from_slice(points);
            (0..points.len()).map(|i| neighbours_of(&tree, points, i, k)).collect()
        }
    }
}

/// 把 k 近邻表对称化为无向邻接表: `j ∈ adj[i]` 当且仅当 `j ∈ table[i]` 或 `i ∈ table[j]`.
pub fn symmetrize(table: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut adj: Vec<Vec<usize>> = table.to_vec();
    for (i, row) in table.iter().enumerate() {
        for &j in row {
            adj[j].push(i);
        }
    }
    for row in adj.iter_mut() {
        row.sort_unstable();
        row.dedup();
    }
    adj
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_knn_on_a_line() {
        let pts: Vec<Point3> = (0..6).map(|i| [(i * i) as f64, 0.0, 0.0]).collect();
        let t = knn(&pts, 2);
        assert_eq!(t[0], vec![1, 2]);
        assert_eq!(t[3], vec![2, 4]);
        assert_eq!(t[5], vec![4, 3]);
        // k 被截断.
        assert_eq!(knn(&pts, 100)[0].len(), 5);
        assert!(knn(&pts[..1], 3)[0].is_empty());
    }

    #[test]
    fn test_knn_matches_exhaustive_search() {
        // 线性同余序列生成的确定性点云.
        let mut state = 12345u64;
        let mut next = || {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            (state >> 11) as f64 / (1u64 << 53) as f64 * 50.0
        };
        let pts: Vec<Point3> = (0..300).map(|_| [next(), next(), next()]).collect();
        let d2 = |a: &Point3, b: &Point3| (0..3).map(|c| (a[c] - b[c]).powi(2)).sum::<f64>();

        let t = knn(&pts, 10);
        assert_eq!(t.len(), pts.len());
        for (i, row) in t.iter().enumerate().step_by(17) {
            let mut all: Vec<usize> = (0..pts.len()).filter(|&j| j != i).collect();
            all.sort_by(|&a, &b| d2(&pts[i], &pts[a]).total_cmp(&d2(&pts[i], &pts[b])));
            assert_eq!(row, &all[..10]);
        }
    }

    #[test]
    fn test_duplicate_points() {
        let pts = vec![[1.0, 1.0, 1.0]; 4];
        let t = knn(&pts, 2);
        for (i, row) in t.iter().enumerate() {
            assert_eq!(row.len(), 2);
            assert!(!row.contains(&i));
        }
        assert!(knn(&[], 3).is_empty());
    }

    #[test]
    fn test_symmetrize() {
        let table = vec![vec![1], vec![2], vec![1]];
        let adj = symmetrize(&table);
        assert_eq!(adj, vec![vec![1], vec![0, 2], vec![1]]);
    }
}
