/// 强度窗口, 包含窗位 (level) 和窗宽 (width). 用于把体数据标量映射为 8-bit 灰度.
///
/// 该窗口是只读的. 若要修改窗口参数, 你应该创建新的实例.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct IntensityWindow {
    level: f32,
    width: f32,
}

impl Default for IntensityWindow {
    #[inline]
    fn default() -> Self {
        Self::from_ultrasound()
    }
}

impl IntensityWindow {
    /// 构建强度窗.
    ///
    /// `level` 和 `width` 必须在合理范围内, 否则返回 `None`.
    pub fn new(level: f32, width: f32) -> Option<IntensityWindow> {
        if (-1e5..=1e5).contains(&level) && 0.0 < width && width <= 1e5 {
            Some(Self { level, width })
        } else {
            None
        }
    }

    /// 由值域 `[lo, hi]` 构建. `lo >= hi` 时返回 `None`.
    #[inline]
    pub fn from_range(lo: f32, hi: f32) -> Option<IntensityWindow> {
        if lo < hi {
            Self::new((lo + hi) / 2.0, hi - lo)
        } else {
            None
        }
    }

    /// 8-bit 超声体数据的恒等窗口: 窗位 127.5, 窗宽 255.
    #[inline]
    pub const fn from_ultrasound() -> IntensityWindow {
        Self {
            level: 127.5,
            width: 255.0,
        }
    }

    /// 窗下限.
    #[inline]
    pub fn lower_bound(&self) -> f32 {
        self.level - self.width / 2.0
    }

    /// 窗上限.
    #[inline]
    pub fn upper_bound(&self) -> f32 {
        self.level + self.width / 2.0
    }

    /// 窗位.
    #[inline]
    pub fn level(&self) -> f32 {
        self.level
    }

    /// 窗宽.
    #[inline]
    pub fn width(&self) -> f32 {
        self.width
    }

    /// 求在当前窗设置下, `v` 对应的灰度图像素整数值 (0 <= value <= 255).
    ///
    /// 如果 `v` 无意义 (如 inf, NaN), 则返回 `None`.
    pub fn eval(&self, v: f32) -> Option<u8> {
        if !v.is_finite() {
            return None;
        }
        let lb = self.lower_bound();
        if v <= lb {
            Some(u8::MIN)
        } else if v >= self.upper_bound() {
            Some(u8::MAX)
        } else {
            // 255, not 256.
            Some((((v - lb) / self.width()) * 255.0) as u8)
        }
    }
}
