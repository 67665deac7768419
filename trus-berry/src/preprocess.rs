//! 帧预处理: 零填充到训练画布, 标准化, 双线性缩放到模型输入分辨率.
//!
//! 填充偏移会被保留下来, 供轮廓反投影时抵消.

use ndarray::{s, Array2, ArrayView2};

use crate::consts::{MODEL_INPUT, PADDED_CANVAS};
use crate::error::{PreprocessError, PreprocessResult};
use crate::pose::Pose;
use crate::Idx2d;

/// 画布设置: 填充画布与模型输入的分辨率 `(h, w)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Canvas {
    /// 填充画布.
    pub padded: Idx2d,
    /// 模型输入.
    pub model: Idx2d,
}

impl Default for Canvas {
    #[inline]
    fn default() -> Self {
        Self {
            padded: PADDED_CANVAS,
            model: MODEL_INPUT,
        }
    }
}

/// 四个方向的零填充像素数.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PaddingOffsets {
    /// 上方.
    pub top: usize,
    /// 左侧.
    pub left: usize,
    /// 下方.
    pub bottom: usize,
    /// 右侧.
    pub right: usize,
}

impl PaddingOffsets {
    /// 把大小为 `frame` 的图像填充到 `canvas` 所需的偏移. 不足的像素数为奇数时,
    /// 多出的一个像素放在上方/左侧.
    ///
    /// 超出画布时返回 `Err(PreprocessError::FrameTooLarge)`.
    pub fn for_frame(frame: Idx2d, canvas: Idx2d) -> PreprocessResult<Self> {
        let (fh, fw) = frame;
        let (ch, cw) = canvas;
        if fh > ch || fw > cw {
            return Err(PreprocessError::FrameTooLarge { frame, canvas });
        }
        let (dh, dw) = (ch - fh, cw - fw);
        let top = dh.div_ceil(2);
        let left = dw.div_ceil(2);
        Ok(Self {
            top,
            left,
            bottom: dh - top,
            right: dw - left,
        })
    }

    /// "原始帧像素 → 画布像素" 的平移, 即 `T(left, top, 0)`.
    #[inline]
    pub fn shift(&self) -> Pose {
        Pose::from_translation([self.left as f64, self.top as f64, 0.0])
    }
}

/// 预处理结果.
#[derive(Clone, Debug)]
pub struct Preprocessed {
    /// 模型输入, 形状为 [`Canvas::model`].
    pub input: Array2<f32>,
    /// 填充偏移.
    pub offsets: PaddingOffsets,
}

/// 零填充到 `canvas`. 返回填充后的图像与偏移.
pub fn pad(frame: ArrayView2<u8>, canvas: Idx2d) -> PreprocessResult<(Array2<u8>, PaddingOffsets)> {
    let offsets = PaddingOffsets::for_frame(frame.dim(), canvas)?;
    let (fh, fw) = frame.dim();
    let mut out = Array2::zeros(canvas);
    out.slice_mut(s![offsets.top..offsets.top + fh, offsets.left..offsets.left + fw])
        .assign(&frame);
    Ok((out, offsets))
}

/// 用自身的均值和 (总体) 标准差标准化. 标准差为 0 时只减去均值.
pub fn standardize(img: ArrayView2<f32>) -> Array2<f32> {
    let n = img.len();
    if n == 0 {
        return img.to_owned();
    }
    let mean = img.iter().map(|v| *v as f64).sum::<f64>() / n as f64;
    let var = img.iter().map(|v| (*v as f64 - mean).powi(2)).sum::<f64>() / n as f64;
    let std = var.sqrt();
    if std > 0.0 {
        img.mapv(|v| ((v as f64 - mean) / std) as f32)
    } else {
        img.mapv(|v| (v as f64 - mean) as f32)
    }
}

/// 双线性缩放 (角点对齐). 输出值不会超出输入的取值范围.
pub fn resize_bilinear(img: ArrayView2<f32>, (oh, ow): Idx2d) -> Array2<f32> {
    let (ih, iw) = img.dim();
    if ih == 0 || iw == 0 {
        return Array2::zeros((oh, ow));
    }
    let scale = |len_in: usize, len_out: usize| -> f32 {
        if len_out > 1 {
            (len_in - 1) as f32 / (len_out - 1) as f32
        } else {
            0.0
        }
    };
    let (sh, sw) = (scale(ih, oh), scale(iw, ow));
    Array2::from_shape_fn((oh, ow), |(y, x)| {
        let v = (y as f32 * sh).min((ih - 1) as f32);
        let u = (x as f32 * sw).min((iw - 1) as f32);
        bilinear(&img, u, v)
    })
}

/// 在 `(u = 列, v = 行)` 处双线性插值. 调用方保证坐标不越界.
fn bilinear(img: &ArrayView2<f32>, u: f32, v: f32) -> f32 {
    let (height, width) = img.dim();
    let iu = u.trunc() as usize;
    let iv = v.trunc() as usize;
    let frac_u = u.fract();
    let frac_v = v.fract();

    let val00 = img[(iv, iu)];
    let val01 = if iu + 1 < width { img[(iv, iu + 1)] } else { val00 };
    let val10 = if iv + 1 < height { img[(iv + 1, iu)] } else { val00 };
    let val11 = if iu + 1 < width && iv + 1 < height {
        img[(iv + 1, iu + 1)]
    } else {
        val00
    };

    let frac_uu = 1. - frac_u;
    let frac_vv = 1. - frac_v;
    val00 * frac_uu * frac_vv + val01 * frac_u * frac_vv + val10 * frac_uu * frac_v + val11 * frac_u * frac_v
}

/// 完整的预处理: 填充 → 转为 `f32` → 标准化 → 缩放.
///
/// # 返回值
///
/// - 空帧返回 `Err(PreprocessError::EmptyFrame)`;
/// - 帧大于填充画布时返回 `Err(PreprocessError::FrameTooLarge)`;
/// - 其余情况返回模型输入和填充偏移.
pub fn normalize(frame: ArrayView2<u8>, canvas: &Canvas) -> PreprocessResult<Preprocessed> {
    if frame.is_empty() {
        return Err(PreprocessError::EmptyFrame);
    }
    let (padded, offsets) = pad(frame, canvas.padded)?;
    let as_float = padded.mapv(f32::from);
    let standardized = standardize(as_float.view());
    let input = resize_bilinear(standardized.view(), canvas.model);
    Ok(Preprocessed { input, offsets })
}

/// 把模型输出的概率图放大回填充画布分辨率.
#[inline]
pub fn upsample_mask(mask: ArrayView2<f32>, canvas: &Canvas) -> Array2<f32> {
    resize_bilinear(mask, canvas.padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn f32_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-5
    }

    #[test]
    fn test_padding_offsets() {
        let o = PaddingOffsets::for_frame((400, 400), (510, 788)).unwrap();
        assert_eq!(o.top + o.bottom + 400, 510);
        assert_eq!(o.left + o.right + 400, 788);
        assert_eq!((o.top, o.left), (55, 194));

        // 奇数差时多出的像素放在上方/左侧.
        let o = PaddingOffsets::for_frame((2, 3), (5, 6)).unwrap();
        assert_eq!(o, PaddingOffsets { top: 2, left: 2, bottom: 1, right: 1 });

        assert_eq!(
            PaddingOffsets::for_frame((600, 10), (510, 788)).unwrap_err(),
            PreprocessError::FrameTooLarge {
                frame: (600, 10),
                canvas: (510, 788)
            }
        );
    }

    #[test]
    fn test_pad_places_frame() {
        let f = arr2(&[[1u8, 2], [3, 4]]);
        let (p, o) = pad(f.view(), (4, 5)).unwrap();
        assert_eq!((o.top, o.left), (1, 2));
        assert_eq!(p[(1, 2)], 1);
        assert_eq!(p[(2, 3)], 4);
        assert_eq!(p.iter().map(|v| *v as u32).sum::<u32>(), 10);
        // shift 把原始像素映射到画布像素.
        let q = o.shift().apply_point([1.0, 1.0, 0.0]);
        assert_eq!(q, [3.0, 2.0, 0.0]);
    }

    #[test]
    fn test_standardize() {
        let a = arr2(&[[1.0f32, 3.0], [1.0, 3.0]]);
        let s = standardize(a.view());
        assert!(f32_eq(s[(0, 0)], -1.0));
        assert!(f32_eq(s[(0, 1)], 1.0));

        let c = Array2::from_elem((3, 3), 7.0f32);
        assert!(standardize(c.view()).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_resize_is_range_preserving() {
        let a = arr2(&[[0.0f32, 10.0], [20.0, 30.0]]);
        let r = resize_bilinear(a.view(), (5, 7));
        assert_eq!(r.dim(), (5, 7));
        assert!(f32_eq(r[(0, 0)], 0.0));
        assert!(f32_eq(r[(0, 6)], 10.0));
        assert!(f32_eq(r[(4, 6)], 30.0));
        assert!(f32_eq(r[(2, 3)], 15.0));
        assert!(r.iter().all(|v| (0.0..=30.0).contains(v)));
    }

    #[test]
    fn test_normalize() {
        let frame = Array2::from_shape_fn((400, 400), |(h, w)| ((h + w) % 256) as u8);
        let out = normalize(frame.view(), &Canvas::default()).unwrap();
        assert_eq!(out.input.dim(), MODEL_INPUT);
        assert_eq!((out.offsets.top, out.offsets.left), (55, 194));

        let empty = Array2::<u8>::zeros((0, 4));
        assert_eq!(
            normalize(empty.view(), &Canvas::default()).unwrap_err(),
            PreprocessError::EmptyFrame
        );
        let up = upsample_mask(out.input.view(), &Canvas::default());
        assert_eq!(up.dim(), PADDED_CANVAS);
    }
}
