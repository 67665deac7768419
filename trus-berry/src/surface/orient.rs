//! 法向定向: 沿 k 近邻图的最小生成树传播符号.

use binary_heap_plus::BinaryHeap;

use crate::pose::{dot, sub};
use crate::Point3;

/// 堆中的候选边 `(权重, 已定向端点, 待定向端点)`.
type Candidate = (f64, usize, usize);

/// 一致地定向法向.
///
/// 1. 以 z 坐标最大的点为种子, 强制其法向朝 +z;
/// 2. 以 `1 - |ni · nj|` 为边权, 在邻接图 `adj` 上按 Prim 算法扩展最小生成树,
///    每加入一个点, 就把它的法向翻转到与父结点同侧;
/// 3. 图不连通时, 对剩余点中 z 最大者重复以上过程;
/// 4. 最后, 如果多数法向指向质心, 则全部翻转.
pub fn orient_normals(points: &[Point3], normals: &mut [Point3], adj: &[Vec<usize>]) {
    let n = points.len();
    if n == 0 {
        return;
    }
    let mut visited = vec![false; n];
    // 堆顶为权重最小的边.
    let mut heap: BinaryHeap<Candidate, _> =
        BinaryHeap::new_by(|a: &Candidate, b: &Candidate| b.0.total_cmp(&a.0));

    while let Some(seed) = (0..n)
        .filter(|i| !visited[*i])
        .max_by(|a, b| points[*a][2].total_cmp(&points[*b][2]))
    {
        if normals[seed][2] < 0.0 {
            normals[seed] = normals[seed].map(|v| -v);
        }
        visited[seed] = true;
        heap.extend(edges_from(normals, adj, seed, &visited));

        while let Some((_, from, to)) = heap.pop() {
            if visited[to] {
                continue;
            }
            visited[to] = true;
            if dot(normals[from], normals[to]) < 0.0 {
                normals[to] = normals[to].map(|v| -v);
            }
            heap.extend(edges_from(normals, adj, to, &visited));
        }
    }

    let centroid = points
        .iter()
        .fold([0.0; 3], |s, p| [s[0] + p[0], s[1] + p[1], s[2] + p[2]])
        .map(|v| v / n as f64);
    let inward = points
        .iter()
        .zip(normals.iter())
        .filter(|(p, nrm)| dot(**nrm, sub(**p, centroid)) < 0.0)
        .count();
    if inward * 2 > n {
        log::debug!("normals point inward ({inward}/{n}), flipping all");
        for nrm in normals.iter_mut() {
            *nrm = nrm.map(|v| -v);
        }
    }
}

/// 从 `from` 出发, 到所有未访问邻点的候选边.
fn edges_from(normals: &[Point3], adj: &[Vec<usize>], from: usize, visited: &[bool]) -> Vec<Candidate> {
    adj[from]
        .iter()
        .filter(|j| !visited[**j])
        .map(|&to| (1.0 - dot(normals[from], normals[to]).abs(), from, to))
        .collect()
}
