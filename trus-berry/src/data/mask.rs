//! 二值分割掩膜.

use std::collections::{HashSet, VecDeque};
use std::ops::Index;

use ndarray::{Array2, ArrayView2};

use crate::consts::gray::*;
use crate::{Area2d, Areas2d, Idx2d, Predicate};

/// 不可变、借用的二维二值掩膜. 像素只有 [`MASK_BACKGROUND`] 和 [`MASK_FOREGROUND`] 两种取值.
#[derive(Clone, Copy, Debug)]
pub struct MaskSlice<'a> {
    data: ArrayView2<'a, u8>,
}

impl Index<Idx2d> for MaskSlice<'_> {
    type Output = u8;

    #[inline]
    fn index(&self, index: Idx2d) -> &Self::Output {
        &self.data[index]
    }
}

impl<'a> From<ArrayView2<'a, u8>> for MaskSlice<'a> {
    #[inline]
    fn from(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }
}

impl<'a> MaskSlice<'a> {
    /// 直接初始化.
    #[inline]
    pub fn new(data: ArrayView2<'a, u8>) -> Self {
        Self { data }
    }

    /// 获得底层数据的一份不可变 shallow copy.
    #[inline]
    pub fn array_view(&self) -> ArrayView2<'a, u8> {
        self.data
    }

    /// 图像的分辨率 (高, 宽).
    #[inline]
    pub fn shape(&self) -> Idx2d {
        self.data.dim()
    }

    /// 获得图像的高.
    #[inline]
    pub fn height(&self) -> usize {
        self.shape().0
    }

    /// 获得图像的宽.
    #[inline]
    pub fn width(&self) -> usize {
        self.shape().1
    }

    /// 判断一个索引是否合法 (未越界).
    #[inline]
    pub fn check(&self, (h, w): Idx2d) -> bool {
        let (h_len, w_len) = self.shape();
        h < h_len && w < w_len
    }

    /// 获取给定位置 (高, 宽) 的像素值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx2d) -> Option<u8> {
        self.data.get(pos).copied()
    }

    /// 该掩膜是否为全背景?
    #[inline]
    pub fn is_background(&self) -> bool {
        self.data.iter().copied().all(is_background)
    }

    /// 前景像素个数.
    #[inline]
    pub fn count_foreground(&self) -> usize {
        self.data.iter().filter(|p| is_foreground(**p)).count()
    }

    /// 以行优先规则, 获取能迭代图像所有索引的迭代器.
    #[inline]
    pub fn pos_iter(&self) -> impl Iterator<Item = Idx2d> + 'a {
        ndarray::indices(self.data.dim()).into_iter()
    }

    /// 位置 `(h, w)` 处的像素是否为前景? 越界视为背景.
    #[inline]
    pub fn is_foreground_at(&self, pos: Idx2d) -> bool {
        matches!(self.get(pos), Some(p) if is_foreground(p))
    }

    /// 获得 `pos` 的 4-邻域像素索引. 保证返回的索引都不越界.
    pub fn n4_positions(&self, (h, w): Idx2d) -> Vec<Idx2d> {
        [
            (h.wrapping_sub(1), w),
            (h.wrapping_add(1), w),
            (h, w.wrapping_sub(1)),
            (h, w.wrapping_add(1)),
        ]
        .into_iter()
        .filter(|p| self.check(*p))
        .collect()
    }

    /// 按照 4-相邻规则获取所有区域. 两个像素 `p1` 和 `p2` 属于同一个区域,
    /// 当且仅当存在一条从 `p1` 到 `p2` 的 4-相邻路径, 且路径上的所有像素
    /// (包括 `p1` 和 `p2`) 都满足谓词 `pred`.
    ///
    /// 区域按其首个像素的行优先顺序排列.
    #[inline]
    pub fn areas(&self, pred: Predicate) -> Areas2d {
        self.areas_from_local(self.pos_iter(), pred)
    }

    /// 按照 4-相邻规则获取所有区域, 但区域范围由 `it` 指定.
    pub fn areas_from_local<I: IntoIterator<Item = Idx2d>>(&self, it: I, pred: Predicate) -> Areas2d {
        let mut ans = Areas2d::with_capacity(1);
        let mut bfs_q = VecDeque::with_capacity(4);
        let mut set = HashSet::with_capacity(16);

        for pos in it.into_iter() {
            if set.contains(&pos) || !pred(self[pos]) {
                continue;
            }
            bfs_q.push_back(pos);
            let mut this_area = Area2d::with_capacity(1);
            while let Some(cur_pos) = bfs_q.pop_front() {
                if !set.insert(cur_pos) {
                    continue;
                }
                this_area.push(cur_pos);
                bfs_q.extend(
                    self.n4_positions(cur_pos)
                        .into_iter()
                        .filter(|n| pred(self[*n]) && !set.contains(n)),
                );
            }
            ans.push(this_area);
        }
        ans
    }

    /// 面积最大的 4-连通前景区域. 面积相同时取行优先顺序中最先出现的那个.
    /// 全背景时返回 `None`.
    pub fn largest_area(&self) -> Option<Area2d> {
        let areas = self.areas(is_foreground);
        let mut best: Option<Area2d> = None;
        for area in areas {
            if best.as_ref().map_or(true, |b| area.len() > b.len()) {
                best = Some(area);
            }
        }
        best
    }

    /// 只保留最大 4-连通前景区域的掩膜副本.
    pub fn keep_largest(&self) -> Array2<u8> {
        let mut out = Array2::from_elem(self.shape(), MASK_BACKGROUND);
        if let Some(area) = self.largest_area() {
            for pos in area {
                out[pos] = MASK_FOREGROUND;
            }
        }
        out
    }
}

/// 把概率图按阈值 `level` 二值化: `p >= level` 为前景.
pub fn threshold(prob: ArrayView2<f32>, level: f32) -> Array2<u8> {
    prob.mapv(|p| {
        if p >= level {
            MASK_FOREGROUND
        } else {
            MASK_BACKGROUND
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_areas_and_largest() {
        let a = arr2(&[
            [1, 1, 0, 0, 0],
            [1, 0, 0, 1, 1],
            [0, 0, 0, 1, 1],
            [1, 0, 0, 0, 0],
        ]);
        let m = MaskSlice::new(a.view());
        let areas = m.areas(is_foreground);
        assert_eq!(areas.len(), 3);
        assert_eq!(areas[0].len(), 3);
        assert_eq!(areas[1].len(), 4);
        assert_eq!(areas[2], vec![(3, 0)]);

        let largest = m.largest_area().unwrap();
        assert_eq!(largest.len(), 4);
        assert!(largest.contains(&(2, 4)));

        let kept = m.keep_largest();
        assert_eq!(MaskSlice::new(kept.view()).count_foreground(), 4);
        assert_eq!(kept[(0, 0)], MASK_BACKGROUND);
    }

    #[test]
    fn test_diagonal_is_not_4_connected() {
        let a = arr2(&[[1, 0], [0, 1]]);
        let m = MaskSlice::new(a.view());
        assert_eq!(m.areas(is_foreground).len(), 2);
        // 面积相同时取先出现者.
        assert_eq!(m.largest_area().unwrap(), vec![(0, 0)]);
    }

    #[test]
    fn test_empty_mask() {
        let a = Array2::<u8>::zeros((3, 3));
        let m = MaskSlice::new(a.view());
        assert!(m.is_background());
        assert!(m.largest_area().is_none());
        assert!(!m.is_foreground_at((5, 5)));
    }

    #[test]
    fn test_pos_iter_outlives_slice() {
        let a = Array2::<u8>::zeros((2, 3));
        let it = {
            let m = MaskSlice::new(a.view());
            m.pos_iter()
        };
        let all: Vec<Idx2d> = it.collect();
        assert_eq!(all.len(), 6);
        assert_eq!(all[0], (0, 0));
        assert_eq!(all[3], (1, 0));
        assert_eq!(all[5], (1, 2));
    }

    #[test]
    fn test_threshold() {
        let p = arr2(&[[0.1f32, 0.5], [0.49, 0.9]]);
        assert_eq!(threshold(p.view(), 0.5), arr2(&[[0, 1], [0, 1]]));
    }
}
