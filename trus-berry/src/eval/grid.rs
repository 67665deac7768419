//! 评估用的参考网格.

use ndarray::Array3;

use crate::data::{Grid3d, RefVolume};
use crate::pose::Pose;
use crate::{Idx3d, Point3};

/// 体素化的目标网格: 形状 `(z, h, w)`, 间距, 原点, 以及 "网格局部 → 世界" 的放置位姿.
///
/// 重建网格和真值网格都在世界坐标下给出, 体素化前先变换到网格局部坐标.
#[derive(Clone, Debug, PartialEq)]
pub struct ReferenceGrid {
    shape: Idx3d,
    spacing: [f64; 3],
    origin: Point3,
    placement: Pose,
}

impl Grid3d for ReferenceGrid {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.shape
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

impl ReferenceGrid {
    /// 放置位姿为恒等变换的网格.
    pub fn new(shape: Idx3d, spacing: [f64; 3], origin: Point3) -> Self {
        Self {
            shape,
            spacing,
            origin,
            placement: Pose::IDENTITY,
        }
    }

    /// 设置放置位姿.
    #[inline]
    pub fn with_placement(mut self, placement: Pose) -> Self {
        self.placement = placement;
        self
    }

    /// 与参考体数据共用原点, 间距, 形状和放置位姿.
    pub fn from_volume(volume: &RefVolume) -> Self {
        Self {
            shape: volume.shape(),
            spacing: volume.spacing(),
            origin: volume.origin(),
            placement: *volume.placement(),
        }
    }

    /// 放置位姿.
    #[inline]
    pub fn placement(&self) -> &Pose {
        &self.placement
    }

    /// "世界 → 网格局部" 的变换. 放置位姿应当是刚体变换.
    #[inline]
    pub fn world_to_local(&self) -> Pose {
        self.placement.rigid_inverse()
    }

    /// 全背景标签体.
    #[inline]
    pub fn empty_labels(&self) -> Array3<u8> {
        Array3::zeros(self.shape)
    }
}
