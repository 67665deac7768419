//! 三维空间的齐次变换 (位姿) 以及由位姿连接的坐标系图.
//!
//! 一个 [`Pose`] 描述了 "子坐标系 → 父坐标系" 的映射, 即 `p_parent = M · p_child`.
//! 多个位姿组合时, 右侧的变换先作用于点.

use std::ops::Mul;

use crate::Point3;

mod graph;
mod trus;

pub use graph::FrameGraph;

/// 4x4 齐次变换矩阵, 行优先存储.
///
/// 位姿是不可变值. 所有运算都返回新的实例.
///
/// 绝大多数位姿是刚体变换 (左上角 3x3 为正交矩阵). 重采样变换会额外携带像素间距带来的缩放,
/// 因此 [`Pose::inverse`] 对一般仿射变换也适用; 刚体变换可以使用更快的
/// [`Pose::rigid_inverse`].
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Pose {
    m: [[f64; 4]; 4],
}

impl Default for Pose {
    #[inline]
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// `a * b`: 先作用 `b`, 再作用 `a`.
impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        let mut m = [[0.0; 4]; 4];
        for (r, row) in m.iter_mut().enumerate() {
            for (c, v) in row.iter_mut().enumerate() {
                *v = (0..4).map(|k| self.m[r][k] * rhs.m[k][c]).sum();
            }
        }
        Pose { m }
    }
}

impl Mul for &Pose {
    type Output = Pose;

    #[inline]
    fn mul(self, rhs: &Pose) -> Pose {
        *self * *rhs
    }
}

impl Pose {
    /// 恒等变换.
    pub const IDENTITY: Pose = Pose {
        m: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// 从行优先 4x4 矩阵构建. 不检查最后一行是否为 `[0, 0, 0, 1]`.
    #[inline]
    pub const fn from_rows(m: [[f64; 4]; 4]) -> Self {
        Self { m }
    }

    /// 平移变换.
    pub fn from_translation([x, y, z]: Point3) -> Self {
        let mut m = Self::IDENTITY.m;
        m[0][3] = x;
        m[1][3] = y;
        m[2][3] = z;
        Self { m }
    }

    /// 按轴缩放. 仅用于构建重采样变换.
    pub fn from_scale([sx, sy, sz]: Point3) -> Self {
        let mut m = Self::IDENTITY.m;
        m[0][0] = sx;
        m[1][1] = sy;
        m[2][2] = sz;
        Self { m }
    }

    /// 由旋转矩阵和平移向量构建.
    pub fn from_parts(r: [[f64; 3]; 3], [x, y, z]: Point3) -> Self {
        Self {
            m: [
                [r[0][0], r[0][1], r[0][2], x],
                [r[1][0], r[1][1], r[1][2], y],
                [r[2][0], r[2][1], r[2][2], z],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// 绕单位轴 `axis` 旋转 `angle` 弧度 (Rodrigues 公式).
    ///
    /// `axis` 会被归一化. 如果 `axis` 是零向量, 返回恒等变换.
    pub fn from_axis_angle(axis: Point3, angle: f64) -> Self {
        let n = norm(axis);
        if n == 0.0 {
            return Self::IDENTITY;
        }
        let [x, y, z] = axis.map(|v| v / n);
        let (s, c) = angle.sin_cos();
        let t = 1.0 - c;
        Self::from_parts(
            [
                [t * x * x + c, t * x * y - s * z, t * x * z + s * y],
                [t * x * y + s * z, t * y * y + c, t * y * z - s * x],
                [t * x * z - s * y, t * y * z + s * x, t * z * z + c],
            ],
            [0.0; 3],
        )
    }

    /// 绕 x 轴旋转.
    #[inline]
    pub fn rotation_x(angle: f64) -> Self {
        Self::from_axis_angle([1.0, 0.0, 0.0], angle)
    }

    /// 绕 y 轴旋转.
    #[inline]
    pub fn rotation_y(angle: f64) -> Self {
        Self::from_axis_angle([0.0, 1.0, 0.0], angle)
    }

    /// 绕 z 轴旋转.
    #[inline]
    pub fn rotation_z(angle: f64) -> Self {
        Self::from_axis_angle([0.0, 0.0, 1.0], angle)
    }

    /// 获取行优先矩阵.
    #[inline]
    pub fn rows(&self) -> &[[f64; 4]; 4] {
        &self.m
    }

    /// 组合: 返回 `self · child`. 即先作用 `child`, 再作用 `self`.
    #[inline]
    pub fn then(&self, child: &Pose) -> Pose {
        self * child
    }

    /// 平移部分.
    #[inline]
    pub fn translation(&self) -> Point3 {
        [self.m[0][3], self.m[1][3], self.m[2][3]]
    }

    /// 左上角 3x3 部分.
    #[inline]
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let m = &self.m;
        [
            [m[0][0], m[0][1], m[0][2]],
            [m[1][0], m[1][1], m[1][2]],
            [m[2][0], m[2][1], m[2][2]],
        ]
    }

    /// 把平移的 z 分量替换为 `z`, 其余保持不变.
    pub fn with_translation_z(&self, z: f64) -> Pose {
        let mut m = self.m;
        m[2][3] = z;
        Pose { m }
    }

    /// 变换点 (齐次坐标 `w = 1`).
    #[inline]
    pub fn apply_point(&self, [x, y, z]: Point3) -> Point3 {
        let m = &self.m;
        [
            m[0][0] * x + m[0][1] * y + m[0][2] * z + m[0][3],
            m[1][0] * x + m[1][1] * y + m[1][2] * z + m[1][3],
            m[2][0] * x + m[2][1] * y + m[2][2] * z + m[2][3],
        ]
    }

    /// 变换向量 (齐次坐标 `w = 0`, 不受平移影响).
    #[inline]
    pub fn apply_vector(&self, [x, y, z]: Point3) -> Point3 {
        let m = &self.m;
        [
            m[0][0] * x + m[0][1] * y + m[0][2] * z,
            m[1][0] * x + m[1][1] * y + m[1][2] * z,
            m[2][0] * x + m[2][1] * y + m[2][2] * z,
        ]
    }

    /// 判断是否为刚体变换: 左上角正交, 行列式为 `+1`, 最后一行为 `[0, 0, 0, 1]`.
    pub fn is_rigid(&self, tol: f64) -> bool {
        let r = self.rotation();
        for i in 0..3 {
            for j in 0..3 {
                let dot: f64 = (0..3).map(|k| r[i][k] * r[j][k]).sum();
                let expected = if i == j { 1.0 } else { 0.0 };
                if (dot - expected).abs() > tol {
                    return false;
                }
            }
        }
        let last = self.m[3];
        (det3(&r) - 1.0).abs() <= tol
            && last[..3].iter().all(|v| v.abs() <= tol)
            && (last[3] - 1.0).abs() <= tol
    }

    /// 刚体逆变换 `(Rᵀ, -Rᵀ t)`.
    ///
    /// 仅当 `self` 是刚体变换时结果正确. 对含缩放的变换请使用 [`Pose::inverse`].
    pub fn rigid_inverse(&self) -> Pose {
        let r = self.rotation();
        let t = self.translation();
        let mut rt = [[0.0; 3]; 3];
        for (i, row) in rt.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = r[j][i];
            }
        }
        let nt = [
            -(rt[0][0] * t[0] + rt[0][1] * t[1] + rt[0][2] * t[2]),
            -(rt[1][0] * t[0] + rt[1][1] * t[1] + rt[1][2] * t[2]),
            -(rt[2][0] * t[0] + rt[2][1] * t[1] + rt[2][2] * t[2]),
        ];
        Pose::from_parts(rt, nt)
    }

    /// 一般仿射逆变换. 左上角 3x3 奇异时返回 `None`.
    pub fn inverse(&self) -> Option<Pose> {
        let a = self.rotation();
        let det = det3(&a);
        if det.abs() < 1e-12 {
            return None;
        }
        // 伴随矩阵 / 行列式.
        let mut inv = [[0.0; 3]; 3];
        for (i, row) in inv.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                let (r0, r1) = ((j + 1) % 3, (j + 2) % 3);
                let (c0, c1) = ((i + 1) % 3, (i + 2) % 3);
                *v = (a[r0][c0] * a[r1][c1] - a[r0][c1] * a[r1][c0]) / det;
            }
        }
        let t = self.translation();
        let nt = [
            -(inv[0][0] * t[0] + inv[0][1] * t[1] + inv[0][2] * t[2]),
            -(inv[1][0] * t[0] + inv[1][1] * t[1] + inv[1][2] * t[2]),
            -(inv[2][0] * t[0] + inv[2][1] * t[1] + inv[2][2] * t[2]),
        ];
        Some(Pose::from_parts(inv, nt))
    }

    /// 逐元素近似比较.
    pub fn approx_eq(&self, other: &Pose, tol: f64) -> bool {
        self.m
            .iter()
            .flatten()
            .zip(other.m.iter().flatten())
            .all(|(a, b)| (a - b).abs() <= tol)
    }

    /// 以空白分隔的 16 个数 (行优先) 表示, 每行一组.
    pub fn to_text(&self) -> String {
        self.m
            .iter()
            .map(|row| row.iter().map(|v| format!("{v}")).collect::<Vec<_>>().join(" "))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// 解析空白分隔的 16 个数 (行优先). 数目不对或无法解析时返回 `None`.
    pub fn parse_text(s: &str) -> Option<Pose> {
        let values: Vec<f64> = s
            .split_whitespace()
            .map(str::parse::<f64>)
            .collect::<Result<_, _>>()
            .ok()?;
        if values.len() != 16 {
            return None;
        }
        let mut m = [[0.0; 4]; 4];
        for (i, v) in values.into_iter().enumerate() {
            m[i / 4][i % 4] = v;
        }
        Some(Pose { m })
    }
}

#[inline]
fn det3(a: &[[f64; 3]; 3]) -> f64 {
    a[0][0] * (a[1][1] * a[2][2] - a[1][2] * a[2][1]) - a[0][1] * (a[1][0] * a[2][2] - a[1][2] * a[2][0])
        + a[0][2] * (a[1][0] * a[2][1] - a[1][1] * a[2][0])
}

/// 向量长度.
#[inline]
pub fn norm([x, y, z]: Point3) -> f64 {
    (x * x + y * y + z * z).sqrt()
}

/// 两点之差 `a - b`.
#[inline]
pub fn sub(a: Point3, b: Point3) -> Point3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// 点积.
#[inline]
pub fn dot(a: Point3, b: Point3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// 叉积.
#[inline]
pub fn cross(a: Point3, b: Point3) -> Point3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::*;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn point_eq(a: Point3, b: Point3) -> bool {
        a.iter().zip(b.iter()).all(|(x, y)| f64_eq(*x, *y))
    }

    fn some_rigid() -> Pose {
        Pose::from_translation([3.0, -2.0, 7.5])
            * Pose::from_axis_angle([1.0, 2.0, -0.5], 0.8)
            * Pose::rotation_z(FRAC_PI_3)
    }

    #[test]
    fn test_compose_order() {
        // 先旋转 90 度, 再平移.
        let p = Pose::from_translation([10.0, 0.0, 0.0]) * Pose::rotation_z(FRAC_PI_2);
        assert!(point_eq(p.apply_point([1.0, 0.0, 0.0]), [10.0, 1.0, 0.0]));

        // 先平移, 再旋转 90 度.
        let q = Pose::rotation_z(FRAC_PI_2) * Pose::from_translation([10.0, 0.0, 0.0]);
        assert!(point_eq(q.apply_point([1.0, 0.0, 0.0]), [0.0, 11.0, 0.0]));
    }

    #[test]
    fn test_rigid_inverse() {
        let p = some_rigid();
        assert!(p.is_rigid(1e-9));
        assert!((p * p.rigid_inverse()).approx_eq(&Pose::IDENTITY, 1e-9));
        assert!((p.rigid_inverse() * p).approx_eq(&Pose::IDENTITY, 1e-9));
        let general = p.inverse().unwrap();
        assert!(general.approx_eq(&p.rigid_inverse(), 1e-9));
    }

    #[test]
    fn test_affine_inverse() {
        let p = some_rigid() * Pose::from_scale([0.2, 0.3, 1.0]);
        assert!(!p.is_rigid(1e-6));
        let inv = p.inverse().unwrap();
        let x = [4.0, -1.0, 0.0];
        assert!(point_eq(inv.apply_point(p.apply_point(x)), x));
        assert!(Pose::from_scale([1.0, 0.0, 1.0]).inverse().is_none());
    }

    #[test]
    fn test_vector_ignores_translation() {
        let p = Pose::from_translation([1.0, 2.0, 3.0]);
        assert!(point_eq(p.apply_vector([0.0, 0.0, 1.0]), [0.0, 0.0, 1.0]));
    }

    #[test]
    fn test_with_translation_z() {
        let p = some_rigid().with_translation_z(42.0);
        assert!(f64_eq(p.translation()[2], 42.0));
        assert!(f64_eq(p.translation()[0], some_rigid().translation()[0]));
        assert!(p.is_rigid(1e-9));
    }

    #[test]
    fn test_text_form() {
        let p = some_rigid();
        let back = Pose::parse_text(&p.to_text()).unwrap();
        assert_eq!(back, p);
        assert!(Pose::parse_text("1 0 0").is_none());
        assert!(Pose::parse_text("1 0 0 0 0 1 0 0 0 0 1 0 0 0 0 x").is_none());
    }
}
