//! Surface nets 等值面提取.
//!
//! 每个跨越等值面的单元放置一个顶点 (各条穿越边上交点的均值),
//! 每条跨越等值面的网格边生成一个由周围四个单元顶点组成的四边形.

use std::collections::HashMap;

use crate::mesh::TriMesh;
use crate::surface::poisson::NodeGrid;

/// 以单元最小角结点为索引的单元编号.
#[inline]
fn cell_key(n: usize, i: usize, j: usize, k: usize) -> usize {
    (i * n + j) * n + k
}

/// 单元 `(i, j, k)` 的顶点 (网格坐标). 单元不跨越等值面时返回 `None`.
fn cell_vertex(grid: &NodeGrid, iso: f64, i: usize, j: usize, k: usize) -> Option<[f64; 3]> {
    let corner = |c: usize| [c & 1, (c >> 1) & 1, (c >> 2) & 1];
    let value = |d: [usize; 3]| grid.value(i + d[0], j + d[1], k + d[2]);

    let mut sum = [0.0; 3];
    let mut hits = 0usize;
    for c in 0..8usize {
        for bit in [1usize, 2, 4] {
            if c & bit != 0 {
                continue;
            }
            let (da, db) = (corner(c), corner(c | bit));
            let (va, vb) = (value(da), value(db));
            if (va < iso) == (vb < iso) {
                continue;
            }
            let t = (iso - va) / (vb - va);
            for a in 0..3 {
                sum[a] += da[a] as f64 + t * (db[a] as f64 - da[a] as f64);
            }
            hits += 1;
        }
    }
    (hits > 0).then(|| {
        let m = hits as f64;
        [i as f64 + sum[0] / m, j as f64 + sum[1] / m, k as f64 + sum[2] / m]
    })
}

/// 提取 `grid` 中 `value < iso` 区域的边界.
///
/// # 返回值
///
/// 法向朝外的三角网格 (世界坐标). 没有跨越等值面的边时返回空网格.
/// 紧贴网格外层的穿越边因缺少相邻单元被跳过, 此时结果不封闭.
pub fn surface_nets(grid: &NodeGrid, iso: f64) -> TriMesh {
    let n = grid.n();
    if n < 2 {
        return TriMesh::default();
    }
    let cells = n - 1;

    let mut vertices = Vec::new();
    let mut index: HashMap<usize, usize> = HashMap::new();
    for i in 0..cells {
        for j in 0..cells {
            for k in 0..cells {
                if let Some(g) = cell_vertex(grid, iso, i, j, k) {
                    index.insert(cell_key(n, i, j, k), vertices.len());
                    vertices.push(grid.position(g));
                }
            }
        }
    }

    let inside = |i: usize, j: usize, k: usize| grid.value(i, j, k) < iso;
    let lookup = |c: [(usize, usize, usize); 4]| -> Option<[usize; 4]> {
        let mut out = [0usize; 4];
        for (slot, (i, j, k)) in out.iter_mut().zip(c) {
            if i >= cells || j >= cells || k >= cells {
                return None;
            }
            *slot = *index.get(&cell_key(n, i, j, k))?;
        }
        Some(out)
    };

    let mut triangles = Vec::new();
    let mut skipped = 0usize;
    for i in 0..n {
        for j in 0..n {
            for k in 0..n {
                let a = inside(i, j, k);
                // 三个正方向的边, 以及它们周围的四个单元 (从内到外看逆时针).
                let mut edges: Vec<(bool, Option<[(usize, usize, usize); 4]>)> = Vec::with_capacity(3);
                if i + 1 < n {
                    let quad = (j >= 1 && k >= 1)
                        .then(|| [(i, j - 1, k - 1), (i, j, k - 1), (i, j, k), (i, j - 1, k)]);
                    edges.push((inside(i + 1, j, k), quad));
                }
                if j + 1 < n {
                    let quad = (i >= 1 && k >= 1)
                        .then(|| [(i - 1, j, k - 1), (i - 1, j, k), (i, j, k), (i, j, k - 1)]);
                    edges.push((inside(i, j + 1, k), quad));
                }
                if k + 1 < n {
                    let quad = (i >= 1 && j >= 1)
                        .then(|| [(i - 1, j - 1, k), (i, j - 1, k), (i, j, k), (i - 1, j, k)]);
                    edges.push((inside(i, j, k + 1), quad));
                }
                for (b, quad) in edges {
                    if a == b {
                        continue;
                    }
                    let Some(q) = quad.and_then(lookup) else {
                        skipped += 1;
                        continue;
                    };
                    let q = if a { q } else { [q[3], q[2], q[1], q[0]] };
                    triangles.push([q[0], q[1], q[2]]);
                    triangles.push([q[0], q[2], q[3]]);
                }
            }
        }
    }
    if skipped > 0 {
        log::debug!("surface nets: {} crossing edges on the grid border skipped", skipped);
    }

    let mut mesh = TriMesh::new(vertices, triangles);
    if mesh.signed_volume() < 0.0 {
        mesh.flip();
    }
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_grid(n: usize, h: f64, r: f64) -> NodeGrid {
        let c = (n - 1) as f64 * h / 2.0;
        NodeGrid::from_fn(n, [-c, -c, -c], h, |i, j, k| {
            let p = [i as f64 * h - c, j as f64 * h - c, k as f64 * h - c];
            (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt() - r
        })
    }

    #[test]
    fn test_sphere_is_closed_and_outward() {
        let grid = sphere_grid(24, 1.0, 7.0);
        let mesh = surface_nets(&grid, 0.0);
        let report = mesh.report();
        assert!(report.watertight);
        assert_eq!(report.non_manifold_edges, 0);

        let exact = 4.0 / 3.0 * std::f64::consts::PI * 343.0;
        assert!((report.signed_volume - exact).abs() / exact < 0.1);
        for v in mesh.vertices() {
            let r = (v[0] * v[0] + v[1] * v[1] + v[2] * v[2]).sqrt();
            assert!((r - 7.0).abs() < 1.0);
        }
        // 面法向朝外.
        let outward = (0..mesh.triangles().len())
            .filter(|&t| {
                let c = mesh.corners(t);
                let m = [0, 1, 2].map(|a| (c[0][a] + c[1][a] + c[2][a]) / 3.0);
                let nrm = mesh.face_normals()[t];
                m[0] * nrm[0] + m[1] * nrm[1] + m[2] * nrm[2] > 0.0
            })
            .count();
        assert_eq!(outward, mesh.triangles().len());
    }

    #[test]
    fn test_no_crossing_gives_empty_mesh() {
        let grid = NodeGrid::from_fn(6, [0.0; 3], 1.0, |_, _, _| 1.0);
        assert!(surface_nets(&grid, 0.0).is_empty());
        assert!(surface_nets(&grid, 2.0).is_empty());
    }

    #[test]
    fn test_cut_by_border_is_open() {
        // 内部区域碰到网格外层, 结果不封闭.
        let grid = sphere_grid(10, 1.0, 5.0);
        let mesh = surface_nets(&grid, 0.0);
        assert!(!mesh.is_empty());
        assert!(!mesh.report().watertight);
    }
}
