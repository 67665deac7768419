//! 切面重采样: 用一个平面位姿切割参考体, 得到 8-bit 二维超声帧.

use ndarray::{Array2, ArrayViewMut1, Axis};

use crate::data::{Grid3d, IntensityWindow, RefVolume};
use crate::pose::Pose;
use crate::Idx2d;

/// 重采样输出几何: 输出帧大小 `(rows, cols)` 和像素间距 `[列方向, 行方向]` (毫米).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ResliceSpec {
    /// 输出帧大小 `(rows, cols)`.
    pub dims: Idx2d,
    /// 像素间距 `[sx, sy]`, 分别对应列和行.
    pub spacing: [f64; 2],
}

impl Default for ResliceSpec {
    /// 400 x 400, 间距 0.122 毫米.
    fn default() -> Self {
        Self {
            dims: (400, 400),
            spacing: [0.122, 0.122],
        }
    }
}

impl ResliceSpec {
    /// "切平面局部坐标 → 像素" 的组合: 平面原点位于第 0 行的列中点,
    /// 行沿平面 y 轴向下增长.
    ///
    /// 返回 `T(-cols/2 * sx, 0, 0) · S(sx, sy, 1)`.
    pub fn pixel_to_plane(&self) -> Pose {
        let (_, cols) = self.dims;
        let [sx, sy] = self.spacing;
        Pose::from_translation([-(cols as f64) / 2.0 * sx, 0.0, 0.0])
            * Pose::from_scale([sx, sy, 1.0])
    }
}

/// 一次重采样的结果.
#[derive(Clone, Debug)]
pub struct Resliced {
    /// 输出帧, `(rows, cols)`.
    pub frame: Array2<u8>,
    /// 像素 `(x = col, y = row, 0)` → 世界坐标 的变换, 已包含像素间距.
    pub transform: Pose,
    /// 是否至少有一个像素落在参考体内部.
    pub in_bounds: bool,
}

/// 用切平面 `plane` (平面局部 → 世界) 最近邻重采样 `volume`.
///
/// 参考体之外的像素值为 0. 切平面完全位于参考体之外时, 返回全零帧而不是错误.
///
/// # 注意
///
/// `volume` 的 "体素 → 世界" 变换不可逆时 (间距为 0), 同样返回全零帧.
pub fn reslice(
    volume: &RefVolume,
    window: &IntensityWindow,
    plane: &Pose,
    spec: &ResliceSpec,
) -> Resliced {
    let transform = plane * &spec.pixel_to_plane();
    let mut frame = Array2::zeros(spec.dims);

    let Some(world_to_ijk) = volume.ijk_to_world().inverse() else {
        log::debug!("reference volume has a singular voxel transform");
        return Resliced {
            frame,
            transform,
            in_bounds: false,
        };
    };
    let pixel_to_ijk = world_to_ijk * transform;

    let fill_row = |row: usize, mut line: ArrayViewMut1<u8>| -> usize {
        let mut hit = 0;
        for (col, pix) in line.iter_mut().enumerate() {
            let ijk = pixel_to_ijk.apply_point([col as f64, row as f64, 0.0]);
            if let Some(idx) = nearest_voxel(volume, ijk) {
                *pix = window.eval(volume[idx]).unwrap_or(0);
                hit += 1;
            }
        }
        hit
    };
    let hits = for_each_row(&mut frame, fill_row);

    let in_bounds = hits > 0;
    if !in_bounds {
        log::debug!("cutting plane misses the reference volume, frame is blank");
    }
    Resliced {
        frame,
        transform,
        in_bounds,
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

        /// 借助 `rayon`, 并行地逐行填充. 返回 `op` 返回值之和.
        fn for_each_row<F>(frame: &mut Array2<u8>, op: F) -> usize
        where
            F: Fn(usize, ArrayViewMut1<u8>) -> usize + Sync + Send,
        {
            frame
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .map(|(row, line)| op(row, line))
                .sum()
        }
    } else {
        /// 逐行填充. 返回 `op` 返回值之和.
        fn for_each_row<F>(frame: &mut Array2<u8>, op: F) -> usize
        where
            F: Fn(usize, ArrayViewMut1<u8>) -> usize,
        {
            frame
                .axis_iter_mut(Axis(0))
                .enumerate()
                .map(|(row, line)| op(row, line))
                .sum()
        }
    }
}

/// 连续体素坐标 `[i, j, k]` 的最近体素索引 `(z, h, w)`. 越界时返回 `None`.
#[inline]
fn nearest_voxel(volume: &RefVolume, ijk: [f64; 3]) -> Option<(usize, usize, usize)> {
    let [i, j, k] = ijk.map(f64::round);
    if !(i >= 0.0 && j >= 0.0 && k >= 0.0) {
        return None;
    }
    let idx = (k as usize, j as usize, i as usize);
    volume.check(&idx).then_some(idx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    /// 体素值为其 w 索引的 20 倍.
    fn ramp_volume() -> RefVolume {
        let data = Array3::from_shape_fn((10, 10, 10), |(_, _, w)| w as f32 * 20.0);
        RefVolume::new(data, [1.0; 3], [0.0; 3])
    }

    #[test]
    fn test_reslice_transform_layout() {
        let spec = ResliceSpec {
            dims: (4, 6),
            spacing: [0.5, 2.0],
        };
        let plane = Pose::from_translation([5.0, 0.0, 3.0]);
        let out = reslice(&ramp_volume(), &IntensityWindow::default(), &plane, &spec);
        assert_eq!(out.frame.dim(), (4, 6));
        // 第 0 行的列中点即平面原点.
        let p = out.transform.apply_point([3.0, 0.0, 0.0]);
        assert!(f64_eq(p[0], 5.0) && f64_eq(p[1], 0.0) && f64_eq(p[2], 3.0));
        // 行间距 2 毫米.
        let q = out.transform.apply_point([3.0, 1.0, 0.0]);
        assert!(f64_eq(q[1], 2.0));
    }

    #[test]
    fn test_reslice_samples_nearest_voxel() {
        let spec = ResliceSpec {
            dims: (3, 4),
            spacing: [1.0, 1.0],
        };
        // 平面原点 (4, 2, 5): 列 c 对应 x = 4 - 2 + c.
        let plane = Pose::from_translation([4.0, 2.0, 5.0]);
        let window = IntensityWindow::default();
        let out = reslice(&ramp_volume(), &window, &plane, &spec);
        assert!(out.in_bounds);
        for c in 0..4 {
            let expected = window.eval((2 + c) as f32 * 20.0).unwrap();
            assert_eq!(out.frame[(1, c)], expected);
        }
    }

    #[test]
    fn test_reslice_out_of_bounds_is_blank() {
        let plane = Pose::from_translation([0.0, 0.0, 500.0]);
        let out = reslice(
            &ramp_volume(),
            &IntensityWindow::default(),
            &plane,
            &ResliceSpec::default(),
        );
        assert!(!out.in_bounds);
        assert!(out.frame.iter().all(|p| *p == 0));
        assert_eq!(out.frame.dim(), (400, 400));
    }
}
