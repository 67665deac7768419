//! 基于 k 近邻主成分分析的法向估计.

use std::iter::once;

use crate::surface::eigen::{covariance, symmetric_eigen};
use crate::Point3;

/// 相对秩判定阈值: 第二大特征值不超过最大特征值的该倍数时, 视为共线.
const RANK_EPS: f64 = 1e-10;

/// 点集整体的主成分秩是否小于 2 (共线或全部重合)?
pub fn is_collinear(points: &[Point3]) -> bool {
    let (values, _) = symmetric_eigen(&covariance(points.iter()));
    let largest = values[2];
    largest <= f64::MIN_POSITIVE || values[1] <= RANK_EPS * largest
}

/// 估计每个点的单位法向 (符号未定).
///
/// 点 `i` 的法向是 `i` 与其近邻 `table[i]` 构成点集的协方差矩阵最小特征值对应的特征向量.
pub fn estimate_normals(points: &[Point3], table: &[Vec<usize>]) -> Vec<Point3> {
    points
        .iter()
        .zip(table.iter())
        .map(|(p, neigh)| {
            let cov = covariance(once(p).chain(neigh.iter().map(|&j| &points[j])));
            let (_, vectors) = symmetric_eigen(&cov);
            vectors[0]
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::knn::knn;

    #[test]
    fn test_plane_normals() {
        let pts: Vec<Point3> = (0..25)
            .map(|i| [(i % 5) as f64, (i / 5) as f64, 2.0 * (i % 5) as f64])
            .collect();
        let normals = estimate_normals(&pts, &knn(&pts, 6));
        // 平面 z = 2x 的法向为 ±(-2, 0, 1) / sqrt(5).
        let s = 5f64.sqrt();
        for n in normals {
            let d = (-2.0 * n[0] + n[2]) / s;
            assert!((d.abs() - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_collinearity() {
        let line: Vec<Point3> = (0..5).map(|i| [i as f64, 2.0 * i as f64, 0.0]).collect();
        assert!(is_collinear(&line));
        assert!(is_collinear(&[[1.0; 3]; 4]));
        assert!(!is_collinear(&[[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]]));
    }
}
