//! 泊松隐式函数求解.
//!
//! 在覆盖采样点的规则网格上求解 `Δχ = ∇·V`, 其中 `V` 是把定向法向以帐篷核涂抹到网格结点上的向量场.
//! 边界结点满足 `χ = 0`. 求得的 `χ` 在物体内部较小, 外部接近 0.

use crate::surface::cg::{cg_solve, CgStop};
use crate::Point3;

/// 结点上的标量场. 结点 `(i, j, k)` 位于 `origin + (i, j, k) * h`, 三个方向各有 `n` 个结点.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeGrid {
    n: usize,
    origin: Point3,
    h: f64,
    values: Vec<f64>,
}

impl NodeGrid {
    /// 以 `f(i, j, k)` 填充结点值.
    pub fn from_fn(n: usize, origin: Point3, h: f64, mut f: impl FnMut(usize, usize, usize) -> f64) -> Self {
        let mut values = Vec::with_capacity(n * n * n);
        for i in 0..n {
            for j in 0..n {
                for k in 0..n {
                    values.push(f(i, j, k));
                }
            }
        }
        Self { n, origin, h, values }
    }

    /// 每个方向的结点数.
    #[inline]
    pub fn n(&self) -> usize {
        self.n
    }

    /// 结点间距.
    #[inline]
    pub fn spacing(&self) -> f64 {
        self.h
    }

    /// 结点 `(0, 0, 0)` 的位置.
    #[inline]
    pub fn origin(&self) -> Point3 {
        self.origin
    }

    #[inline]
    fn flat(&self, i: usize, j: usize, k: usize) -> usize {
        (i * self.n + j) * self.n + k
    }

    /// 结点值. 越界时 panic.
    #[inline]
    pub fn value(&self, i: usize, j: usize, k: usize) -> f64 {
        self.values[self.flat(i, j, k)]
    }

    /// 网格坐标 (以结点为单位) 对应的空间位置.
    #[inline]
    pub fn position(&self, g: [f64; 3]) -> Point3 {
        [
            self.origin[0] + g[0] * self.h,
            self.origin[1] + g[1] * self.h,
            self.origin[2] + g[2] * self.h,
        ]
    }

    /// 空间位置对应的网格坐标.
    #[inline]
    pub fn grid_coords(&self, p: Point3) -> [f64; 3] {
        [
            (p[0] - self.origin[0]) / self.h,
            (p[1] - self.origin[1]) / self.h,
            (p[2] - self.origin[2]) / self.h,
        ]
    }

    /// 三线性插值. 网格外的点被夹到最近的边界.
    pub fn sample(&self, p: Point3) -> f64 {
        let last = (self.n - 1) as f64;
        let g = self.grid_coords(p).map(|v| v.clamp(0.0, last));
        let lo = g.map(|v| (v.floor() as usize).min(self.n.saturating_sub(2)));
        let t = [g[0] - lo[0] as f64, g[1] - lo[1] as f64, g[2] - lo[2] as f64];
        let mut acc = 0.0;
        for corner in 0..8usize {
            let d = [corner & 1, (corner >> 1) & 1, (corner >> 2) & 1];
            let w: f64 = (0..3)
                .map(|a| if d[a] == 1 { t[a] } else { 1.0 - t[a] })
                .product();
            if w != 0.0 {
                acc += w * self.value(lo[0] + d[0], lo[1] + d[1], lo[2] + d[2]);
            }
        }
        acc
    }
}

/// 覆盖 `points` 的网格: 每个方向 `n` 个结点, 采样点外侧至少留出两个单元.
fn fit_grid(points: &[Point3], n: usize) -> (Point3, f64) {
    let mut lo = [f64::INFINITY; 3];
    let mut hi = [f64::NEG_INFINITY; 3];
    for p in points {
        for a in 0..3 {
            lo[a] = lo[a].min(p[a]);
            hi[a] = hi[a].max(p[a]);
        }
    }
    let extent = (0..3).map(|a| hi[a] - lo[a]).fold(0.0, f64::max);
    let h = extent * 1.1 / (n - 5) as f64;
    let half = h * (n - 1) as f64 / 2.0;
    let origin = [0, 1, 2].map(|a| (lo[a] + hi[a]) / 2.0 - half);
    (origin, h)
}

/// 把法向以半径 `r` (单元) 的三线性帐篷核涂抹到结点上. 返回三个分量场.
fn splat(grid: &NodeGrid, points: &[Point3], normals: &[Point3], r: usize) -> [Vec<f64>; 3] {
    let n = grid.n;
    let mut field = [vec![0.0; n * n * n], vec![0.0; n * n * n], vec![0.0; n * n * n]];
    let rf = r as f64;
    let last = (n - 1) as f64;
    for (p, nrm) in points.iter().zip(normals.iter()) {
        let g = grid.grid_coords(*p);
        let range = |v: f64| {
            let from = (v - rf).ceil().clamp(0.0, last) as usize;
            let to = (v + rf).floor().clamp(0.0, last) as usize;
            from..=to
        };
        for i in range(g[0]) {
            let wi = 1.0 - (i as f64 - g[0]).abs() / rf;
            for j in range(g[1]) {
                let wj = 1.0 - (j as f64 - g[1]).abs() / rf;
                for k in range(g[2]) {
                    let wk = 1.0 - (k as f64 - g[2]).abs() / rf;
                    let w = wi * wj * wk;
                    if w <= 0.0 {
                        continue;
                    }
                    let idx = grid.flat(i, j, k);
                    for (comp, v) in field.iter_mut().zip(nrm.iter()) {
                        comp[idx] += w * v;
                    }
                }
            }
        }
    }
    field
}

/// 求解泊松方程, 返回结点上的 `χ`.
///
/// # 注意
///
/// 调用方保证 `depth` 位于 `3..=8`, `points` 非共线, 且 `normals` 与 `points` 等长.
pub fn solve(points: &[Point3], normals: &[Point3], depth: u32, width: f64) -> NodeGrid {
    let n = 1usize << depth;
    let (origin, h) = fit_grid(points, n);
    let mut grid = NodeGrid {
        n,
        origin,
        h,
        values: vec![0.0; n * n * n],
    };
    let r = ((width / 2.0).ceil() as usize).max(1);
    let [vx, vy, vz] = splat(&grid, points, normals, r);

    // 右端项 -∇·V · h², 中心差分. 边界结点为 0.
    let mut rhs = vec![0.0; n * n * n];
    for i in 1..n - 1 {
        for j in 1..n - 1 {
            for k in 1..n - 1 {
                let div = (vx[grid.flat(i + 1, j, k)] - vx[grid.flat(i - 1, j, k)])
                    + (vy[grid.flat(i, j + 1, k)] - vy[grid.flat(i, j - 1, k)])
                    + (vz[grid.flat(i, j, k + 1)] - vz[grid.flat(i, j, k - 1)]);
                rhs[grid.flat(i, j, k)] = -div * h / 2.0;
            }
        }
    }

    let stop = CgStop {
        tol: 1e-7,
        max_iter: 4 * n + 100,
    };
    let out = cg_solve(|x, ax| apply_neg_laplacian(n, x, ax), &rhs, stop);
    if out.residual > stop.tol {
        log::warn!(
            "poisson solve stopped after {} iterations with relative residual {:.3e}",
            out.iterations,
            out.residual
        );
    } else {
        log::debug!(
            "poisson solve: {}^3 nodes, {} iterations, residual {:.3e}",
            n,
            out.iterations,
            out.residual
        );
    }
    grid.values = out.x;
    grid
}

/// 一个 `i` 切面上的 `-h²Δ`, 七点差分. 边界结点输出 0.
fn neg_laplacian_plane(n: usize, i: usize, x: &[f64], plane: &mut [f64]) {
    let at = |i: usize, j: usize, k: usize| x[(i * n + j) * n + k];
    for j in 0..n {
        for k in 0..n {
            let out = &mut plane[j * n + k];
            if i == 0 || j == 0 || k == 0 || i == n - 1 || j == n - 1 || k == n - 1 {
                *out = 0.0;
                continue;
            }
            *out = 6.0 * at(i, j, k)
                - at(i - 1, j, k)
                - at(i + 1, j, k)
                - at(i, j - 1, k)
                - at(i, j + 1, k)
                - at(i, j, k - 1)
                - at(i, j, k + 1);
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        /// 借助 `rayon`, 按 `i` 切面并行地计算 `-h²Δx`.
        fn apply_neg_laplacian(n: usize, x: &[f64], out: &mut [f64]) {
            out.par_chunks_mut(n * n)
                .enumerate()
                .for_each(|(i, plane)| neg_laplacian_plane(n, i, x, plane));
        }
    } else {
        /// 计算 `-h²Δx`.
        fn apply_neg_laplacian(n: usize, x: &[f64], out: &mut [f64]) {
            for (i, plane) in out.chunks_mut(n * n).enumerate() {
                neg_laplacian_plane(n, i, x, plane);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    #[test]
    fn test_fit_grid_keeps_margin() {
        let pts = [[0.0, 0.0, 0.0], [10.0, 4.0, 2.0]];
        let (origin, h) = fit_grid(&pts, 16);
        assert!(f64_eq(h, 1.0));
        // 中心对齐.
        assert!(f64_eq(origin[0] + 7.5 * h, 5.0));
        for p in pts {
            for a in 0..3 {
                let g = (p[a] - origin[a]) / h;
                assert!(g >= 2.0 && g <= 13.0);
            }
        }
    }

    #[test]
    fn test_sample_is_trilinear() {
        let g = NodeGrid::from_fn(4, [1.0, 0.0, 0.0], 0.5, |i, j, k| (i + 2 * j + 3 * k) as f64);
        assert!(f64_eq(g.sample([1.0, 0.0, 0.0]), 0.0));
        // (i, j, k) = (1.5, 0.5, 1) => 1.5 + 1 + 3.
        assert!(f64_eq(g.sample([1.75, 0.25, 0.5]), 5.5));
        // 夹到边界.
        assert!(f64_eq(g.sample([-10.0, 0.0, 0.0]), 0.0));
        assert!(f64_eq(g.sample([100.0, 100.0, 100.0]), 18.0));
    }

    #[test]
    fn test_solution_is_lower_inside() {
        let pts = crate::surface::orient::tests::fibonacci_sphere(300, 6.0);
        let normals: Vec<Point3> = pts.iter().map(|p| p.map(|v| v / 6.0)).collect();
        let grid = solve(&pts, &normals, 4, 3.0);
        let center = grid.sample([0.0; 3]);
        let on_surface = grid.sample(pts[0]);
        let corner = grid.value(0, 0, 0);
        assert!(center < on_surface);
        assert!(on_surface < corner);
        assert_eq!(corner, 0.0);
    }
}
