//! 由无序点云重建封闭表面.
//!
//! 1. kNN 主成分分析估计法向;
//! 2. 沿 kNN 图的最小生成树统一法向符号;
//! 3. 在规则网格上用共轭梯度求解泊松方程, 得到隐式函数 `χ`;
//! 4. 以采样点处 `χ` 的均值为等值, 用 surface nets 提取等值面.

use crate::consts::{NORMAL_KNN, ORIENT_KNN, POISSON_DEPTH, POISSON_WIDTH};
use crate::error::{Degeneracy, SurfaceError, SurfaceResult};
use crate::mesh::TriMesh;
use crate::Point3;

mod cg;
mod eigen;
mod knn;
mod nets;
mod normals;
mod orient;
mod poisson;

pub use nets::surface_nets;
pub use poisson::NodeGrid;

/// 重建所需的最少点数.
pub const MIN_POINTS: usize = 3;

/// 允许的深度范围. 深度 `d` 的网格每个方向有 `2^d` 个结点.
pub const DEPTH_RANGE: std::ops::RangeInclusive<u32> = 3..=8;

/// 表面重建参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SurfaceParams {
    /// 网格深度, 位于 [`DEPTH_RANGE`].
    pub depth: u32,
    /// 法向涂抹半径 (以单元为单位的直径), 必须为正.
    pub width: f64,
    /// 法向估计的近邻数.
    pub normal_k: usize,
    /// 法向定向的近邻数.
    pub orient_k: usize,
}

impl Default for SurfaceParams {
    #[inline]
    fn default() -> Self {
        Self {
            depth: POISSON_DEPTH,
            width: POISSON_WIDTH,
            normal_k: NORMAL_KNN,
            orient_k: ORIENT_KNN,
        }
    }
}

impl SurfaceParams {
    fn check(&self) -> SurfaceResult<()> {
        if !DEPTH_RANGE.contains(&self.depth) {
            return Err(SurfaceError::InvalidParameter("depth must lie in 3..=8"));
        }
        if !(self.width.is_finite() && self.width > 0.0) {
            return Err(SurfaceError::InvalidParameter("width must be positive"));
        }
        if self.normal_k < 2 || self.orient_k == 0 {
            return Err(SurfaceError::InvalidParameter(
                "normal_k must be at least 2 and orient_k at least 1",
            ));
        }
        Ok(())
    }
}

/// 以默认近邻数重建表面.
#[inline]
pub fn reconstruct(points: &[Point3], depth: u32, width: f64) -> SurfaceResult<TriMesh> {
    reconstruct_with(
        points,
        &SurfaceParams {
            depth,
            width,
            ..Default::default()
        },
    )
}

/// 估计并统一定向每个点的单位法向.
pub fn oriented_normals(points: &[Point3], normal_k: usize, orient_k: usize) -> Vec<Point3> {
    let table = knn::knn(points, normal_k.max(orient_k));
    let prefix = |k: usize| -> Vec<Vec<usize>> {
        table.iter().map(|row| row[..k.min(row.len())].to_vec()).collect()
    };
    let mut normals = normals::estimate_normals(points, &prefix(normal_k));
    let adj = knn::symmetrize(&prefix(orient_k));
    orient::orient_normals(points, &mut normals, &adj);
    normals
}

/// 重建表面.
///
/// # 返回值
///
/// 法向朝外的三角网格. 以下情况返回错误:
///
/// - 点数少于 [`MIN_POINTS`]: `InsufficientPoints`;
/// - 参数越界: `InvalidParameter`;
/// - 点集共线: `DegenerateMesh(CollinearInput)`;
/// - 没有提取到任何三角形: `DegenerateMesh(NoTriangles)`.
///
/// # 注意
///
/// 点过于稀疏时结果可能不封闭. 这种情况只记录警告, 调用方可通过 [`TriMesh::report`] 检查.
pub fn reconstruct_with(points: &[Point3], params: &SurfaceParams) -> SurfaceResult<TriMesh> {
    if points.len() < MIN_POINTS {
        return Err(SurfaceError::InsufficientPoints(points.len(), MIN_POINTS));
    }
    params.check()?;
    if normals::is_collinear(points) {
        return Err(SurfaceError::DegenerateMesh(Degeneracy::CollinearInput));
    }

    let normals = oriented_normals(points, params.normal_k, params.orient_k);
    let grid = poisson::solve(points, &normals, params.depth, params.width);
    let iso = points.iter().map(|p| grid.sample(*p)).sum::<f64>() / points.len() as f64;
    let mesh = surface_nets(&grid, iso);
    if mesh.is_empty() {
        return Err(SurfaceError::DegenerateMesh(Degeneracy::NoTriangles));
    }

    let report = mesh.report();
    if !report.watertight {
        log::warn!(
            "reconstructed surface is not watertight: {} boundary edges, {} non-manifold edges",
            report.boundary_edges,
            report.non_manifold_edges
        );
    }
    log::info!(
        "reconstructed surface from {} points: {} vertices, {} triangles, volume {:.1} mm^3",
        points.len(),
        report.vertices,
        report.triangles,
        report.signed_volume
    );
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::orient::tests::fibonacci_sphere;

    #[test]
    fn test_sphere() {
        let pts = fibonacci_sphere(500, 10.0);
        let mesh = reconstruct(&pts, 5, 5.0).unwrap();
        let report = mesh.report();
        let exact = 4.0 / 3.0 * std::f64::consts::PI * 1000.0;
        assert!(report.signed_volume > 0.4 * exact);
        assert!(report.signed_volume < 1.6 * exact);
        for v in mesh.vertices() {
            let r = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!((r - 10.0).abs() < 3.0, "vertex at radius {r}");
        }
    }

    #[test]
    fn test_too_few_points() {
        assert_eq!(
            reconstruct(&[], 5, 5.0).unwrap_err(),
            SurfaceError::InsufficientPoints(0, 3)
        );
        assert_eq!(
            reconstruct(&[[0.0; 3], [1.0; 3]], 5, 5.0).unwrap_err(),
            SurfaceError::InsufficientPoints(2, 3)
        );
    }

    #[test]
    fn test_collinear() {
        let pts: Vec<Point3> = (0..20).map(|i| [i as f64, 2.0 * i as f64, 0.0]).collect();
        assert_eq!(
            reconstruct(&pts, 5, 5.0).unwrap_err(),
            SurfaceError::DegenerateMesh(Degeneracy::CollinearInput)
        );
        let same = vec![[1.0, 2.0, 3.0]; 10];
        assert_eq!(
            reconstruct(&same, 5, 5.0).unwrap_err(),
            SurfaceError::DegenerateMesh(Degeneracy::CollinearInput)
        );
    }

    #[test]
    fn test_invalid_parameters() {
        let pts = fibonacci_sphere(50, 3.0);
        assert!(matches!(
            reconstruct(&pts, 2, 5.0),
            Err(SurfaceError::InvalidParameter(_))
        ));
        assert!(matches!(
            reconstruct(&pts, 9, 5.0),
            Err(SurfaceError::InvalidParameter(_))
        ));
        assert!(matches!(
            reconstruct(&pts, 5, 0.0),
            Err(SurfaceError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_oriented_normals_point_outward() {
        let pts = fibonacci_sphere(200, 5.0);
        let normals = oriented_normals(&pts, NORMAL_KNN, ORIENT_KNN);
        let outward = pts
            .iter()
            .zip(normals.iter())
            .filter(|(p, n)| p[0] * n[0] + p[1] * n[1] + p[2] * n[2] > 0.0)
            .count();
        assert_eq!(outward, pts.len());
    }
}
