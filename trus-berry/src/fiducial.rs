//! 基准点累积器.

use ndarray::Array2;

use crate::error::FiducialError;
use crate::Point3;

/// 按轮廓分组累积的三维基准点, 支持以轮廓为单位撤销.
///
/// # 注意
///
/// 1. 每次 [`FiducialSet::append_contour`] 都形成一个撤销单元, 即使轮廓为空.
/// 2. 任何修改都会增加 [`FiducialSet::revision`], 网格据此判断是否过期.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FiducialSet {
    points: Vec<Point3>,
    /// 每个轮廓的点数, 后进先出.
    counts: Vec<usize>,
    revision: u64,
}

impl FiducialSet {
    /// 空集合.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个轮廓.
    pub fn append_contour(&mut self, contour: &[Point3]) {
        self.points.extend_from_slice(contour);
        self.counts.push(contour.len());
        self.revision += 1;
    }

    /// 撤销最近一次追加的轮廓, 返回被移除的点数.
    ///
    /// 自上次清空以来没有轮廓时返回 `Err(FiducialError::EmptyHistory)`, 集合保持不变.
    pub fn undo_last_contour(&mut self) -> Result<usize, FiducialError> {
        let n = self.counts.pop().ok_or(FiducialError::EmptyHistory)?;
        self.points.truncate(self.points.len() - n);
        self.revision += 1;
        Ok(n)
    }

    /// 清空所有点和撤销历史.
    pub fn clear(&mut self) {
        self.points.clear();
        self.counts.clear();
        self.revision += 1;
    }

    /// 所有点, 按追加顺序排列.
    #[inline]
    pub fn all_points(&self) -> &[Point3] {
        &self.points
    }

    /// 轮廓 (撤销单元) 个数.
    #[inline]
    pub fn contour_count(&self) -> usize {
        self.counts.len()
    }

    /// 点的总数.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// 是否没有任何点?
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 修改计数.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// 转换为 `N x 3` 数组, 用于保存为 `.npy`.
    pub fn to_array(&self) -> Array2<f64> {
        let flat: Vec<f64> = self.points.iter().flatten().copied().collect();
        Array2::from_shape_vec((self.points.len(), 3), flat).unwrap_or_else(|_| Array2::zeros((0, 3)))
    }

    /// 由 `N x 3` 数组恢复, 整体作为一个轮廓.
    pub fn from_array(arr: &Array2<f64>) -> Self {
        let pts: Vec<Point3> = arr
            .rows()
            .into_iter()
            .filter(|r| r.len() == 3)
            .map(|r| [r[0], r[1], r[2]])
            .collect();
        let mut set = Self::new();
        if !pts.is_empty() {
            set.append_contour(&pts);
        }
        set
    }
}
