//! 共轭梯度法. 求解对称半正定线性系统 `A x = b`, 其中 `A` 以闭包形式给出.

/// 共轭梯度的终止条件.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct CgStop {
    /// 相对残差 `|r| / |b|` 的阈值.
    pub tol: f64,
    /// 最大迭代次数.
    pub max_iter: usize,
}

/// 求解结果.
#[derive(Clone, Debug)]
pub struct CgOutcome {
    /// 解向量.
    pub x: Vec<f64>,
    /// 实际迭代次数.
    pub iterations: usize,
    /// 最终相对残差.
    pub residual: f64,
}

#[inline]
fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// 以零向量为初值, 求解 `A x = b`.
///
/// `a_op(p, out)` 需要把 `A p` 写入 `out`. `b` 为零向量时直接返回零解.
pub fn cg_solve<F>(a_op: F, b: &[f64], stop: CgStop) -> CgOutcome
where
    F: Fn(&[f64], &mut [f64]),
{
    let n = b.len();
    let mut x = vec![0.0; n];
    let b_norm = dot(b, b).sqrt();
    if b_norm == 0.0 {
        return CgOutcome {
            x,
            iterations: 0,
            residual: 0.0,
        };
    }

    // x0 = 0 => r = b.
    let mut r = b.to_vec();
    let mut p = r.clone();
    let mut ap = vec![0.0; n];
    let mut rs_old = dot(&r, &r);
    let mut iterations = 0;

    while iterations < stop.max_iter {
        iterations += 1;
        a_op(&p, &mut ap);
        let pap = dot(&p, &ap);
        if pap.abs() < 1e-300 {
            break;
        }
        let alpha = rs_old / pap;
        for ((xi, ri), (pi, api)) in x.iter_mut().zip(r.iter_mut()).zip(p.iter().zip(ap.iter())) {
            *xi += alpha * pi;
            *ri -= alpha * api;
        }
        let rs_new = dot(&r, &r);
        if rs_new.sqrt() < stop.tol * b_norm {
            rs_old = rs_new;
            break;
        }
        let beta = rs_new / rs_old;
        for (pi, ri) in p.iter_mut().zip(r.iter()) {
            *pi = ri + beta * *pi;
        }
        rs_old = rs_new;
    }

    CgOutcome {
        x,
        iterations,
        residual: rs_old.sqrt() / b_norm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOP: CgStop = CgStop {
        tol: 1e-12,
        max_iter: 100,
    };

    #[test]
    fn test_cg_diagonal() {
        let diag = [2.0, 3.0, 4.0];
        let out = cg_solve(
            |v, out| {
                for ((o, vi), di) in out.iter_mut().zip(v).zip(diag.iter()) {
                    *o = vi * di;
                }
            },
            &[2.0, 6.0, 12.0],
            STOP,
        );
        for (xi, ei) in out.x.iter().zip([1.0, 2.0, 3.0]) {
            assert!((xi - ei).abs() < 1e-8, "expected {ei}, got {xi}");
        }
        assert!(out.residual < 1e-10);
    }

    #[test]
    fn test_cg_1d_laplacian() {
        // -u'' = 1 on 5 interior nodes, u = 0 at both ends.
        let n = 5;
        let lap = |v: &[f64], out: &mut [f64]| {
            for i in 0..n {
                let left = if i > 0 { v[i - 1] } else { 0.0 };
                let right = if i + 1 < n { v[i + 1] } else { 0.0 };
                out[i] = 2.0 * v[i] - left - right;
            }
        };
        let out = cg_solve(lap, &[1.0; 5], STOP);
        // 解析解 u_i = i (n + 1 - i) / 2, i = 1..=n.
        for (i, xi) in out.x.iter().enumerate() {
            let k = (i + 1) as f64;
            assert!((xi - k * (6.0 - k) / 2.0).abs() < 1e-8);
        }
        assert!(out.residual < 1e-10);
    }

    #[test]
    fn test_zero_rhs() {
        let out = cg_solve(|_, _| unreachable!(), &[0.0; 4], STOP);
        assert_eq!(out.x, vec![0.0; 4]);
        assert_eq!(out.iterations, 0);
    }
}
