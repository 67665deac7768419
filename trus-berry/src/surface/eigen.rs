//! 3x3 实对称矩阵的特征分解, 以及点集的协方差矩阵.

use faer::{Mat, Side};

/// 3x3 对称矩阵.
pub type Sym3 = [[f64; 3]; 3];

/// 求对称矩阵 `a` 的特征值和单位特征向量. 只读取下三角部分.
///
/// # 返回值
///
/// `(values, vectors)`, 特征值按升序排列, `vectors[i]` 对应 `values[i]`.
pub fn symmetric_eigen(a: &Sym3) -> ([f64; 3], [[f64; 3]; 3]) {
    let m = Mat::<f64>::from_fn(3, 3, |r, c| a[r][c]);
    let eig = m.selfadjoint_eigendecomposition(Side::Lower);
    let s = eig.s().column_vector();
    let u = eig.u();

    let mut order = [0usize, 1, 2];
    order.sort_by(|i, j| s.read(*i).total_cmp(&s.read(*j)));
    let values = order.map(|i| s.read(i));
    let vectors = order.map(|i| [u.read(0, i), u.read(1, i), u.read(2, i)]);
    (values, vectors)
}

/// 点集的协方差矩阵 (除以点数). 点集为空时返回零矩阵.
pub fn covariance<'a, I>(points: I) -> Sym3
where
    I: IntoIterator<Item = &'a [f64; 3]>,
    I::IntoIter: Clone,
{
    let it = points.into_iter();
    let (n, sum) = it.clone().fold((0usize, [0.0; 3]), |(n, s), p| {
        (n + 1, [s[0] + p[0], s[1] + p[1], s[2] + p[2]])
    });
    let mut cov = [[0.0; 3]; 3];
    if n == 0 {
        return cov;
    }
    let mean = sum.map(|v| v / n as f64);
    for p in it {
        let d = [p[0] - mean[0], p[1] - mean[1], p[2] - mean[2]];
        for (r, row) in cov.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v += d[r] * d[c];
            }
        }
    }
    cov.map(|row| row.map(|v| v / n as f64))
}
