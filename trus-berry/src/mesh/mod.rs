//! 三角网格: 重建结果与真值网格共用的表示.

use std::collections::HashMap;

use crate::pose::{cross, dot, norm, sub, Pose};
use crate::Point3;

mod stl;
mod wireframe;

pub use stl::{read_stl, write_stl};
pub use wireframe::wireframe;

/// 三角网格. 三角形按逆时针 (右手法则) 顺序存储顶点索引, 法向朝外.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TriMesh {
    vertices: Vec<Point3>,
    triangles: Vec<[usize; 3]>,
    face_normals: Vec<Point3>,
}

/// 网格的拓扑与几何摘要.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MeshReport {
    /// 顶点数.
    pub vertices: usize,
    /// 三角形数.
    pub triangles: usize,
    /// 只属于一个三角形的边数.
    pub boundary_edges: usize,
    /// 属于三个及以上三角形的边数.
    pub non_manifold_edges: usize,
    /// 非空, 且每条边恰好属于两个三角形.
    pub watertight: bool,
    /// 有向体积 (立方毫米). 封闭且法向朝外时为正.
    pub signed_volume: f64,
    /// 表面积 (平方毫米).
    pub area: f64,
}

/// 无向边, 较小的顶点索引在前.
#[inline]
pub(crate) fn edge_key(a: usize, b: usize) -> (usize, usize) {
    if a < b {
        (a, b)
    } else {
        (b, a)
    }
}

impl TriMesh {
    /// 由顶点和三角形构建, 并计算面法向.
    ///
    /// # 注意
    ///
    /// 三角形中的索引必须都小于 `vertices.len()`, 否则后续操作 panic.
    pub fn new(vertices: Vec<Point3>, triangles: Vec<[usize; 3]>) -> Self {
        let mut mesh = Self {
            vertices,
            triangles,
            face_normals: vec![],
        };
        mesh.compute_face_normals();
        mesh
    }

    /// 顶点.
    #[inline]
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices
    }

    /// 三角形.
    #[inline]
    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    /// 单位面法向. 退化三角形的法向为零向量.
    #[inline]
    pub fn face_normals(&self) -> &[Point3] {
        &self.face_normals
    }

    /// 是否没有三角形?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// 第 `i` 个三角形的三个顶点坐标.
    #[inline]
    pub fn corners(&self, i: usize) -> [Point3; 3] {
        self.triangles[i].map(|v| self.vertices[v])
    }

    /// 重新计算面法向.
    pub fn compute_face_normals(&mut self) {
        self.face_normals = (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.corners(i);
                let n = cross(sub(b, a), sub(c, a));
                let len = norm(n);
                if len > f64::EPSILON {
                    n.map(|v| v / len)
                } else {
                    [0.0; 3]
                }
            })
            .collect();
    }

    /// 轴对齐包围盒 `(min, max)`. 没有顶点时返回 `None`.
    pub fn bounding_box(&self) -> Option<(Point3, Point3)> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(lo, hi), p| {
            (
                [lo[0].min(p[0]), lo[1].min(p[1]), lo[2].min(p[2])],
                [hi[0].max(p[0]), hi[1].max(p[1]), hi[2].max(p[2])],
            )
        }))
    }

    /// 每条无向边被多少个三角形共享.
    pub fn edge_counts(&self) -> HashMap<(usize, usize), usize> {
        let mut counts = HashMap::with_capacity(self.triangles.len() * 3 / 2 + 1);
        for &[a, b, c] in &self.triangles {
            for (u, v) in [(a, b), (b, c), (c, a)] {
                *counts.entry(edge_key(u, v)).or_insert(0) += 1;
            }
        }
        counts
    }

    /// 有向体积 (散度定理).
    pub fn signed_volume(&self) -> f64 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.corners(i);
                dot(a, cross(b, c)) / 6.0
            })
            .sum()
    }

    /// 表面积.
    pub fn area(&self) -> f64 {
        (0..self.triangles.len())
            .map(|i| {
                let [a, b, c] = self.corners(i);
                norm(cross(sub(b, a), sub(c, a))) / 2.0
            })
            .sum()
    }

    /// 翻转所有三角形的朝向.
    pub fn flip(&mut self) {
        for t in self.triangles.iter_mut() {
            t.swap(1, 2);
        }
        for n in self.face_normals.iter_mut() {
            *n = n.map(|v| -v);
        }
    }

    /// 用 `pose` 变换所有顶点, 返回新网格.
    pub fn transformed(&self, pose: &Pose) -> TriMesh {
        let vertices = self.vertices.iter().map(|p| pose.apply_point(*p)).collect();
        TriMesh::new(vertices, self.triangles.clone())
    }

    /// 拓扑与几何摘要.
    pub fn report(&self) -> MeshReport {
        let counts = self.edge_counts();
        let boundary_edges = counts.values().filter(|c| **c == 1).count();
        let non_manifold_edges = counts.values().filter(|c| **c > 2).count();
        MeshReport {
            vertices: self.vertices.len(),
            triangles: self.triangles.len(),
            boundary_edges,
            non_manifold_edges,
            watertight: !self.is_empty() && boundary_edges == 0 && non_manifold_edges == 0,
            signed_volume: self.signed_volume(),
            area: self.area(),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    /// 以 `lo`, `hi` 为对角的封闭长方体, 法向朝外.
    pub(crate) fn cuboid(lo: Point3, hi: Point3) -> TriMesh {
        let v = |i: usize| -> Point3 {
            [
                if i & 1 == 0 { lo[0] } else { hi[0] },
                if i & 2 == 0 { lo[1] } else { hi[1] },
                if i & 4 == 0 { lo[2] } else { hi[2] },
            ]
        };
        let vertices = (0..8).map(v).collect();
        let triangles = vec![
            [0, 2, 1],
            [1, 2, 3],
            [4, 5, 6],
            [5, 7, 6],
            [0, 1, 4],
            [1, 5, 4],
            [2, 6, 3],
            [3, 6, 7],
            [0, 4, 2],
            [2, 4, 6],
            [1, 3, 5],
            [3, 7, 5],
        ];
        TriMesh::new(vertices, triangles)
    }

    #[test]
    fn test_cuboid_report() {
        let m = cuboid([0.0; 3], [1.0, 2.0, 3.0]);
        let r = m.report();
        assert!(r.watertight);
        assert_eq!(r.boundary_edges, 0);
        assert_eq!(r.triangles, 12);
        assert!(f64_eq(r.signed_volume, 6.0));
        assert!(f64_eq(r.area, 22.0));
        assert_eq!(m.bounding_box(), Some(([0.0; 3], [1.0, 2.0, 3.0])));
        // 底面法向朝 -z.
        assert!(f64_eq(m.face_normals()[0][2], -1.0));
    }

    #[test]
    fn test_flip_and_open_mesh() {
        let mut m = cuboid([0.0; 3], [1.0; 3]);
        m.flip();
        assert!(f64_eq(m.signed_volume(), -1.0));
        assert!(f64_eq(m.face_normals()[0][2], 1.0));

        let open = TriMesh::new(m.vertices().to_vec(), m.triangles()[..10].to_vec());
        let r = open.report();
        assert!(!r.watertight);
        assert!(r.boundary_edges > 0);
        assert!(!TriMesh::default().report().watertight);
    }

    #[test]
    fn test_transformed() {
        let m = cuboid([0.0; 3], [1.0; 3]).transformed(&Pose::from_translation([5.0, 0.0, 0.0]));
        let (lo, _) = m.bounding_box().unwrap();
        assert!(f64_eq(lo[0], 5.0));
        assert!(f64_eq(m.signed_volume(), 1.0));
    }
}
