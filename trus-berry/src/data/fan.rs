//! 超声扇形掩膜.
//!
//! 我们一般使用行优先编码存储二维图像. 其中行就是 "Height" (垂直方向), 列就是 "Width" (水平方向).
//! 然后将 "Height" 作为平面直角坐标系中的 x 轴, 将 "Width" 作为平面直角坐标系中的 y 轴,
//! 这样相当于将原先的平面直角坐标系按顺时针旋转了 90 度.
//!
//! 以扇形中心为原点, 平面上任意点的方向就可以通过 `atan2` 确定下来了.
//! 注意我们通过归一化保证了弧度的范围为 `[0, 2 * PI)`. 在该规范下,
//! 图像 "向上" (h 减少) 的方向弧度为 `PI`, 扇形关于该方向对称.

use ndarray::Array2;
use num::ToPrimitive;
use std::f64::consts::PI;
use std::fmt::Formatter;

use crate::consts::gray::{MASK_BACKGROUND, MASK_FOREGROUND};
use crate::Idx2d;

const PI_2: f64 = PI * 2.0;

/// 超声扇形: 以 `center` 为圆心, 半径位于 `(inner, outer)` 之间,
/// 且与向上中线的夹角小于半视场角的所有像素.
///
/// 该结构不负责检测图像越界.
#[derive(Copy, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FanMask {
    /// 中心坐标 `(h, w)`.
    center: (i32, i32),
    inner: f64,
    outer: f64,
    /// 半视场角, 弧度, `(0, PI]`.
    half_fov: f64,
}

/// 弧度转换为角度.
fn arc_to_angle(arc: f64) -> f64 {
    arc * 180.0 * std::f64::consts::FRAC_1_PI
}

/// 角度转换为弧度.
#[inline]
fn angle_to_arc(angle: f64) -> f64 {
    angle * PI / 180.0
}

/// 内部会将弧度转换为角度, 因为角度更加直观. 另外压缩到一行.
impl std::fmt::Debug for FanMask {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_fmt(format_args!(
            "FanMask {{ center: {:?}, radius: ({:.2}, {:.2}), fov: {:.4}° }}",
            self.center,
            self.inner,
            self.outer,
            arc_to_angle(self.half_fov * 2.0)
        ))
    }
}

/// `FanMask` 初始化错误.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum InitFanError {
    /// 中心无法用 `i32` 精确表示.
    CenterOutOfBound,
    /// 半径不满足 `0 <= inner < outer`.
    RadiusOrder,
    /// 视场角不在 `(0, 360]` 度之内.
    FovOutOfRange,
}

impl FanMask {
    /// 以 `center` 为圆心, 内外半径分别为 `inner` 和 `outer` (像素),
    /// 视场角为 `fov` 度, 创建一个开口向上的扇形.
    ///
    /// # 返回值
    ///
    /// - 当 `center` 无法用 `i32` 精确表示时, 返回 `Err(InitFanError::CenterOutOfBound)`;
    /// - 当半径不满足 `0 <= inner < outer` 时, 返回 `Err(InitFanError::RadiusOrder)`;
    /// - 当 `fov` 不在 `(0, 360]` 范围内时, 返回 `Err(InitFanError::FovOutOfRange)`;
    /// - 其他情况下成功, 返回 `Ok(FanMask)`.
    pub fn new(center: Idx2d, inner: f64, outer: f64, fov: f64) -> Result<Self, InitFanError> {
        let center = usize_to_i32_2d(&center).ok_or(InitFanError::CenterOutOfBound)?;
        if !(0.0 <= inner && inner < outer) {
            return Err(InitFanError::RadiusOrder);
        }
        if !(fov > 0.0 && fov <= 360.0) {
            return Err(InitFanError::FovOutOfRange);
        }
        Ok(Self {
            center,
            inner,
            outer,
            half_fov: angle_to_arc(fov) / 2.0,
        })
    }

    /// 模拟器使用的默认扇形: 视场角 140 度, 内半径 40, 外半径 210,
    /// 中心位于 `(3h/4, w/2)`.
    pub fn default_for(shape: Idx2d) -> Result<Self, InitFanError> {
        let (h, w) = shape;
        Self::new((h / 4 * 3, w / 2), 40.0, 210.0, 140.0)
    }

    /// 获取中心点.
    #[inline]
    pub fn center(&self) -> (i32, i32) {
        self.center
    }

    /// 获取视场角 (度).
    #[inline]
    pub fn fov(&self) -> f64 {
        arc_to_angle(self.half_fov * 2.0)
    }

    /// 判断点 `point` 是否被包含在扇形中. 内外圆周本身不属于扇形.
    pub fn contains(&self, point: Idx2d) -> bool {
        let Some((h, w)) = usize_to_i32_2d(&point) else {
            return false;
        };
        let dh = (h - self.center.0) as f64;
        let dw = (w - self.center.1) as f64;
        let dist = dh.hypot(dw);
        if !(self.inner < dist && dist < self.outer) {
            return false;
        }
        (self.arc_to(dh, dw) - PI).abs() < self.half_fov
    }

    /// 获取偏移 `(dh, dw)` 的弧度. 该弧度取值范围为 `[0, 2 * PI)`.
    ///
    /// # 弧度规范
    ///
    /// - h 增加的方向弧度为 `0`;
    /// - w 增加的方向弧度为 `pi / 2`;
    /// - h 减少的方向弧度为 `pi`;
    /// - w 减少的方向弧度为 `3 * pi / 2`;
    fn arc_to(&self, dh: f64, dw: f64) -> f64 {
        let mut raw = f64::atan2(dw, dh);
        if raw < 0.0 {
            raw += PI_2;
        }
        raw
    }

    /// 渲染为 `shape` 大小的掩膜. 扇形内为 `MASK_FOREGROUND`, 其余为 `MASK_BACKGROUND`.
    pub fn render(&self, shape: Idx2d) -> Array2<u8> {
        Array2::from_shape_fn(shape, |pos| {
            if self.contains(pos) {
                MASK_FOREGROUND
            } else {
                MASK_BACKGROUND
            }
        })
    }

    /// 把 `frame` 中扇形以外的像素置零.
    pub fn apply(&self, frame: &mut Array2<u8>) {
        for (pos, pix) in frame.indexed_iter_mut() {
            if !self.contains(pos) {
                *pix = 0;
            }
        }
    }
}

/// 试将 `(usize, usize)` 转换为 `(i32, i32)`.
/// 如果越界则返回 `None`.
#[inline]
fn usize_to_i32_2d((p1, p2): &Idx2d) -> Option<(i32, i32)> {
    let p1 = (*p1).to_i32()?;
    let p2 = (*p2).to_i32()?;
    Some((p1, p2))
}

#[cfg(test)]
mod tests {
    use super::{FanMask, InitFanError};
    use crate::consts::gray::is_foreground;

    #[test]
    fn test_fan_init_err() {
        let s = FanMask::new((0, usize::MAX), 0.0, 1.0, 90.0).unwrap_err();
        assert_eq!(s, InitFanError::CenterOutOfBound);

        let s = FanMask::new((1, 1), 5.0, 5.0, 90.0).unwrap_err();
        assert_eq!(s, InitFanError::RadiusOrder);
        let s = FanMask::new((1, 1), -1.0, 5.0, 90.0).unwrap_err();
        assert_eq!(s, InitFanError::RadiusOrder);

        let s = FanMask::new((3, 4), 1.0, 2.0, 0.0).unwrap_err();
        assert_eq!(s, InitFanError::FovOutOfRange);
        let s = FanMask::new((3, 4), 1.0, 2.0, 361.0).unwrap_err();
        assert_eq!(s, InitFanError::FovOutOfRange);
    }

    /// 中心 (300, 200), 视场角 140 度.
    #[test]
    fn test_fan_contains() {
        let f = FanMask::default_for((400, 400)).unwrap();
        assert_eq!(f.center(), (300, 200));
        assert!((f.fov() - 140.0).abs() < 1e-9);

        // 中线正上方.
        assert!(f.contains((200, 200)));
        // 太近 / 太远.
        assert!(!f.contains((270, 200)));
        assert!(!f.contains((300 - 210, 200)));
        // 正下方.
        assert!(!f.contains((350, 200)));
        // 水平方向 (90 度) 位于 70 度半视场之外.
        assert!(!f.contains((300, 300)));
        // 与中线夹角 60 度: dh = -cos60 * 100, dw = sin60 * 100.
        assert!(f.contains((250, 287)));
        // 与中线夹角 80 度.
        assert!(!f.contains((283, 298)));
    }

    #[test]
    fn test_fan_render_and_apply() {
        let f = FanMask::new((20, 20), 2.0, 10.0, 90.0).unwrap();
        let m = f.render((30, 40));
        assert_eq!(m.dim(), (30, 40));
        assert!(is_foreground(m[(15, 20)]));
        assert!(!is_foreground(m[(25, 20)]));

        let mut frame = ndarray::Array2::from_elem((30, 40), 9u8);
        f.apply(&mut frame);
        assert_eq!(frame[(15, 20)], 9);
        assert_eq!(frame[(0, 0)], 0);
        let kept = frame.iter().filter(|p| **p == 9).count();
        assert_eq!(kept, m.iter().filter(|p| is_foreground(**p)).count());
    }
}
