//! 参考体数据及二维栅格相关操作.

use std::ops::Index;
use std::path::Path;

use ndarray::{Array3, ArrayView3};
use nifti::{IntoNdArray, NiftiHeader, NiftiObject, ReaderOptions};

use crate::error::{TrialError, TrialResult};
use crate::pose::Pose;
use crate::{Idx2d, Idx3d, Point3};

pub mod fan;
pub mod mask;
pub mod reslice;
pub mod save;
pub mod window;

pub use fan::FanMask;
pub use mask::MaskSlice;
pub use reslice::{reslice, Resliced, ResliceSpec};
pub use save::ImgWriteVis;
pub use window::IntensityWindow;

/// 规则三维网格的共用属性和部分通用操作.
///
/// 索引顺序统一为 `(z, h, w)`, 即 `(k, j, i)`; 间距和原点统一为 `[x, y, z]` 顺序,
/// 其中 x 沿 `w` 增长, y 沿 `h` 增长, z 沿切片方向增长.
pub trait Grid3d {
    /// 数据形状 `(z, h, w)`.
    fn shape(&self) -> Idx3d;

    /// 体素间距 `[x, y, z]`, 以毫米为单位.
    fn spacing(&self) -> [f64; 3];

    /// 体素 `(0, 0, 0)` 中心在网格局部坐标系中的位置.
    fn origin(&self) -> Point3;

    /// 获取水平切片形状大小.
    #[inline]
    fn slice_shape(&self) -> Idx2d {
        let (_, h, w) = self.shape();
        (h, w)
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 获取体素的实际体积值, 以立方毫米为单位.
    #[inline]
    fn voxel(&self) -> f64 {
        self.spacing().iter().product()
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    fn is_isotropic(&self) -> bool {
        let [x, y, z] = self.spacing();
        x == y && x == z
    }

    /// 体素 `(z, h, w)` 中心在网格局部坐标系中的位置. 不检查越界.
    #[inline]
    fn voxel_center(&self, (z, h, w): Idx3d) -> Point3 {
        let [ox, oy, oz] = self.origin();
        let [sx, sy, sz] = self.spacing();
        [
            ox + w as f64 * sx,
            oy + h as f64 * sy,
            oz + z as f64 * sz,
        ]
    }

    /// "体素索引 `(i, j, k, 1)` → 网格局部坐标" 的变换. 注意 `i` 对应 `w`.
    #[inline]
    fn ijk_to_local(&self) -> Pose {
        Pose::from_translation(self.origin()) * Pose::from_scale(self.spacing())
    }
}

/// 静态参考体数据 (术前采集的 TRUS 扫描), 包括标量数据和它在世界中的放置位姿.
///
/// 参考体在一个病例/试验的生命周期内只读.
#[derive(Debug, Clone)]
pub struct RefVolume {
    data: Array3<f32>,
    spacing: [f64; 3],
    origin: Point3,
    placement: Pose,
}

/// 将 (W, H, z) 转换成 (z, H, W). 以后均按照该模式访问.
#[inline]
fn get_shape_from_header(h: &NiftiHeader) -> Idx3d {
    // [W, H, z]. 体素个数数组.
    let [_, w, h, z, ..] = h.dim;
    (z as usize, h as usize, w as usize)
}

impl Grid3d for RefVolume {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn spacing(&self) -> [f64; 3] {
        self.spacing
    }

    #[inline]
    fn origin(&self) -> Point3 {
        self.origin
    }
}

impl Index<Idx3d> for RefVolume {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl RefVolume {
    /// 由 `(z, h, w)` 排布的数据构建. 放置位姿初始为恒等变换.
    pub fn new(data: Array3<f32>, spacing: [f64; 3], origin: Point3) -> Self {
        Self {
            data,
            spacing,
            origin,
            placement: Pose::IDENTITY,
        }
    }

    /// 打开 nii 文件格式的体数据. `path` 为 nii 文件的本地路径.
    /// 如果打开成功, 则返回 `Ok(Self)`, 否则返回 `Err`.
    ///
    /// 体素间距取自 `pixdim`, 原点取自 `qoffset`. 方向信息不在此处解析,
    /// 由病例的配准位姿 (见 [`RefVolume::with_placement`]) 负责.
    pub fn open<P: AsRef<Path>>(path: P) -> TrialResult<Self> {
        let obj = ReaderOptions::new().read_file(path.as_ref())?;
        let header = obj.header().clone();
        let [_, sx, sy, sz, ..] = header.pixdim;
        let spacing = [sx, sy, sz].map(|v| if v > 0.0 { v as f64 } else { 1.0 });
        let origin = [
            header.quatern_x as f64,
            header.quatern_y as f64,
            header.quatern_z as f64,
        ];

        // [W, H, z] -> [z, H, W].
        // hint: 原第一维向下增长, 原第二维向右增长.
        let data = obj
            .into_volume()
            .into_ndarray::<f32>()?
            .permuted_axes([2, 1, 0].as_slice());

        let shape = get_shape_from_header(&header);
        let data = Array3::from_shape_vec(shape, data.iter().copied().collect()).map_err(|e| {
            TrialError::Malformed {
                path: path.as_ref().display().to_string(),
                reason: e.to_string(),
            }
        })?;

        Ok(Self::new(data, spacing, origin))
    }

    /// 设置 "局部 → 世界" 的放置位姿 (如病例的 TRUS 到圆柱体模配准).
    #[inline]
    pub fn with_placement(mut self, placement: Pose) -> Self {
        self.placement = placement;
        self
    }

    /// 替换放置位姿.
    #[inline]
    pub fn set_placement(&mut self, placement: Pose) {
        self.placement = placement;
    }

    /// 放置位姿.
    #[inline]
    pub fn placement(&self) -> &Pose {
        &self.placement
    }

    /// "体素索引 → 世界坐标" 的变换.
    #[inline]
    pub fn ijk_to_world(&self) -> Pose {
        self.placement * self.ijk_to_local()
    }

    /// 原始数据视图, `(z, h, w)` 排布.
    #[inline]
    pub fn data(&self) -> ArrayView3<f32> {
        self.data.view()
    }

    /// 安全访问. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, index: Idx3d) -> Option<f32> {
        self.data.get(index).copied()
    }

    /// 体数据的最小值和最大值. 空体数据返回 `None`.
    pub fn min_max(&self) -> Option<(f32, f32)> {
        self.data.iter().copied().fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}
