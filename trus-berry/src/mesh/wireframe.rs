use std::collections::HashMap;

use crate::mesh::{edge_key, TriMesh};
use crate::pose::dot;

/// 线框预览所需的边: 边界边, 非流形边, 以及两侧面法向夹角超过 `feature_angle` (度) 的特征边.
///
/// 返回的边为 `(小索引, 大索引)`, 按字典序排列且不重复.
pub fn wireframe(mesh: &TriMesh, feature_angle: f64) -> Vec<(usize, usize)> {
    let mut faces: HashMap<(usize, usize), Vec<usize>> = HashMap::new();
    for (f, &[a, b, c]) in mesh.triangles().iter().enumerate() {
        for (u, v) in [(a, b), (b, c), (c, a)] {
            faces.entry(edge_key(u, v)).or_default().push(f);
        }
    }

    let cos_limit = feature_angle.to_radians().cos();
    let normals = mesh.face_normals();
    let mut edges: Vec<(usize, usize)> = faces
        .into_iter()
        .filter_map(|(edge, fs)| {
            let keep = match fs.as_slice() {
                [f0, f1] => dot(normals[*f0], normals[*f1]) < cos_limit,
                _ => true,
            };
            keep.then_some(edge)
        })
        .collect();
    edges.sort_unstable();
    edges
}
