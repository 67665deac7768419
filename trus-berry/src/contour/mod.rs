//! 轮廓提取: 概率图 → 最大前景区域的外边界 → 降采样 → 世界坐标下的三维点.

use ndarray::ArrayView2;

use crate::consts::{CONTOUR_STRIDE, MASK_THRESHOLD};
use crate::data::mask::threshold;
use crate::data::MaskSlice;
use crate::error::ContourError;
use crate::pose::Pose;
use crate::preprocess::PaddingOffsets;
use crate::{Idx2d, Point3};

mod trace;

pub use trace::moore_trace;

/// 轮廓提取参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ContourParams {
    /// 降采样步长, 至少为 1. 推荐 10 ~ 20.
    pub stride: usize,
    /// 概率图二值化阈值.
    pub threshold: f32,
}

impl Default for ContourParams {
    #[inline]
    fn default() -> Self {
        Self {
            stride: CONTOUR_STRIDE,
            threshold: MASK_THRESHOLD,
        }
    }
}

/// 求概率图 `prob` 中最大 4-连通前景区域的外边界 (画布像素坐标 `(h, w)`).
///
/// 全背景时返回空序列.
pub fn largest_boundary(prob: ArrayView2<f32>, level: f32) -> Vec<Idx2d> {
    let binary = threshold(prob, level);
    let Some(mut area) = MaskSlice::new(binary.view()).largest_area() else {
        return vec![];
    };
    // 行优先顺序中的第一个像素一定在外边界上.
    area.sort_unstable();
    let start = area[0];
    let only = MaskSlice::new(binary.view()).keep_largest();
    moore_trace(&MaskSlice::new(only.view()), start)
}

/// 提取一帧概率图的轮廓, 并反投影到世界坐标.
///
/// 每个保留下来的画布像素 `(x = w, y = h)` 映射为
/// `world · shift⁻¹ · (x, y, 0, 1)`, 其中 `shift` 是填充偏移 `T(left, top, 0)`,
/// `world` 是重采样变换 (像素 → 世界).
///
/// # 返回值
///
/// - `params.stride == 0` 时返回 `Err(ContourError::InvalidStride)`;
/// - 全背景概率图返回空序列, 不视为错误.
pub fn extract_contour(
    prob: ArrayView2<f32>,
    world: &Pose,
    offsets: &PaddingOffsets,
    params: &ContourParams,
) -> Result<Vec<Point3>, ContourError> {
    if params.stride == 0 {
        return Err(ContourError::InvalidStride);
    }
    let boundary = largest_boundary(prob, params.threshold);
    let canvas_to_world = world * &offsets.shift().rigid_inverse();
    let points: Vec<Point3> = boundary
        .iter()
        .step_by(params.stride)
        .map(|&(h, w)| canvas_to_world.apply_point([w as f64, h as f64, 0.0]))
        .collect();
    log::debug!(
        "contour: {} boundary pixels, {} points kept",
        boundary.len(),
        points.len()
    );
    Ok(points)
}
