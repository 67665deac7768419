//! 三角网格体素化: 沿 x 方向的扫描线奇偶规则.
//!
//! 对每个 `(z, h)` 行, 求穿过体素中心的 x 向直线与所有三角形的交点,
//! 排序后相邻两个交点之间的体素中心都在网格内部.

use ndarray::{Array3, ArrayViewMut2, Axis};

use crate::data::Grid3d;
use crate::eval::grid::ReferenceGrid;
use crate::mesh::TriMesh;
use crate::{Idx3d, Point3};

/// 扫描线在 `(y, z)` 上的微小偏移 (以体素间距为单位).
/// 避免扫描线恰好穿过三角形的边或顶点而被计数两次.
const JITTER: [f64; 2] = [1.37e-6, 2.91e-6];

/// 扫描所需的网格几何信息.
#[derive(Copy, Clone, Debug)]
struct Scan {
    shape: Idx3d,
    spacing: [f64; 3],
    origin: Point3,
}

/// 把世界坐标下的 `mesh` 体素化到 `grid` 上. 内部体素为 1, 其余为 0.
///
/// # 注意
///
/// `mesh` 不封闭时, 交点数为奇数的扫描线丢弃最后一个交点, 并记录警告.
pub fn voxelize(mesh: &TriMesh, grid: &ReferenceGrid) -> Array3<u8> {
    let local = mesh.transformed(&grid.world_to_local());
    voxelize_local(&local, grid)
}

/// 把已位于网格局部坐标下的 `mesh` 体素化.
pub fn voxelize_local<G: Grid3d>(mesh: &TriMesh, grid: &G) -> Array3<u8> {
    let mut labels = Array3::zeros(grid.shape());
    if mesh.is_empty() || grid.size() == 0 {
        return labels;
    }
    let scan = Scan {
        shape: grid.shape(),
        spacing: grid.spacing(),
        origin: grid.origin(),
    };
    let tris: Vec<[Point3; 3]> = (0..mesh.triangles().len()).map(|i| mesh.corners(i)).collect();
    let odd = fill_slices(&mut labels, &scan, &tris);
    if odd > 0 {
        log::warn!(
            "voxelize: {} scanlines cross the surface an odd number of times, mesh is not closed",
            odd
        );
    }
    labels
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

        /// 借助 `rayon`, 并行地填充每个水平切片. 返回奇数交点的扫描线数.
        fn fill_slices(labels: &mut Array3<u8>, scan: &Scan, tris: &[[Point3; 3]]) -> usize {
            labels
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .map(|(z, slice)| fill_slice(z, slice, scan, tris))
                .sum()
        }
    } else {
        /// 逐个填充水平切片. 返回奇数交点的扫描线数.
        fn fill_slices(labels: &mut Array3<u8>, scan: &Scan, tris: &[[Point3; 3]]) -> usize {
            labels
                .axis_iter_mut(Axis(0))
                .enumerate()
                .map(|(z, slice)| fill_slice(z, slice, scan, tris))
                .sum()
        }
    }
}

/// 扫描线 `(py, pz)` 与三角形的交点 x 坐标.
fn crossing([a, b, c]: &[Point3; 3], py: f64, pz: f64) -> Option<f64> {
    // (y, z) 平面上的有向面积.
    let edge = |u: &Point3, v: &Point3, y: f64, z: f64| (v[1] - u[1]) * (z - u[2]) - (v[2] - u[2]) * (y - u[1]);
    let d = edge(a, b, c[1], c[2]);
    if d.abs() < 1e-14 {
        return None;
    }
    let w0 = edge(b, c, py, pz) / d;
    let w1 = edge(c, a, py, pz) / d;
    let w2 = edge(a, b, py, pz) / d;
    (w0 >= 0.0 && w1 >= 0.0 && w2 >= 0.0).then(|| w0 * a[0] + w1 * b[0] + w2 * c[0])
}

/// 填充第 `z` 个水平切片.
fn fill_slice(z: usize, mut slice: ArrayViewMut2<u8>, scan: &Scan, tris: &[[Point3; 3]]) -> usize {
    let (_, h, w) = scan.shape;
    let [ox, oy, oz] = scan.origin;
    let [sx, sy, sz] = scan.spacing;
    let jy = JITTER[0] * sy;
    let pz = oz + z as f64 * sz + JITTER[1] * sz;

    let mut rows: Vec<Vec<f64>> = vec![Vec::new(); h];
    for t in tris {
        let (zlo, zhi) = min_max(t.iter().map(|p| p[2]));
        if pz < zlo || pz > zhi {
            continue;
        }
        let (ylo, yhi) = min_max(t.iter().map(|p| p[1]));
        let first = ((ylo - oy - jy) / sy).ceil().max(0.0);
        let last = ((yhi - oy - jy) / sy).floor().min((h - 1) as f64);
        if first > last {
            continue;
        }
        for r in first as usize..=last as usize {
            let py = oy + r as f64 * sy + jy;
            if let Some(x) = crossing(t, py, pz) {
                rows[r].push(x);
            }
        }
    }

    let mut odd = 0;
    for (r, xs) in rows.iter_mut().enumerate() {
        if xs.is_empty() {
            continue;
        }
        xs.sort_by(f64::total_cmp);
        if xs.len() % 2 == 1 {
            odd += 1;
        }
        for pair in xs.chunks_exact(2) {
            let from = ((pair[0] - ox) / sx).ceil().max(0.0) as usize;
            let end = (((pair[1] - ox) / sx).ceil().max(0.0) as usize).min(w);
            for c in from..end {
                slice[(r, c)] = 1;
            }
        }
    }
    odd
}

#[inline]
fn min_max(it: impl Iterator<Item = f64>) -> (f64, f64) {
    it.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)))
}
