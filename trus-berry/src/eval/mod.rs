//! 精度评估: 把重建网格和真值网格体素化到同一参考网格上, 统计混淆矩阵与比率指标.

use std::ops::Add;

use ndarray::{ArrayView2, ArrayView3, Axis};

use crate::error::{MetricError, MetricResult};
use crate::mesh::TriMesh;

mod batch;
mod grid;
mod report;
mod voxelize;

pub use batch::{score_batch, ScoreJob};
pub use grid::ReferenceGrid;
pub use report::{append_metrics, MetricsRow, METRICS_HEADER};
pub use voxelize::{voxelize, voxelize_local};

/// 逐体素的混淆矩阵计数. 标签非 0 即为前景.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Confusion {
    /// 真阳性.
    pub tp: u64,
    /// 真阴性.
    pub tn: u64,
    /// 假阳性.
    pub fp: u64,
    /// 假阴性.
    pub fn_: u64,
}

impl Add for Confusion {
    type Output = Confusion;

    #[inline]
    fn add(self, rhs: Confusion) -> Confusion {
        Confusion {
            tp: self.tp + rhs.tp,
            tn: self.tn + rhs.tn,
            fp: self.fp + rhs.fp,
            fn_: self.fn_ + rhs.fn_,
        }
    }
}

impl Confusion {
    /// 体素总数.
    #[inline]
    pub fn total(&self) -> u64 {
        self.tp + self.tn + self.fp + self.fn_
    }

    /// 真值前景体素数.
    #[inline]
    pub fn truth_positives(&self) -> u64 {
        self.tp + self.fn_
    }

    /// 预测前景体素数.
    #[inline]
    pub fn predicted_positives(&self) -> u64 {
        self.tp + self.fp
    }
}

/// 分母为零时返回 `None`.
#[inline]
fn ratio(num: u64, den: u64) -> Option<f64> {
    (den != 0).then(|| num as f64 / den as f64)
}

fn count_slice(pred: ArrayView2<u8>, truth: ArrayView2<u8>) -> Confusion {
    let mut c = Confusion::default();
    for (p, t) in pred.iter().zip(truth.iter()) {
        match (*p != 0, *t != 0) {
            (true, true) => c.tp += 1,
            (false, false) => c.tn += 1,
            (true, false) => c.fp += 1,
            (false, true) => c.fn_ += 1,
        }
    }
    c
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IndexedParallelIterator, IntoParallelIterator, ParallelIterator};

        /// 借助 `rayon`, 按水平切片并行统计.
        fn count_slices(pred: ArrayView3<u8>, truth: ArrayView3<u8>) -> Confusion {
            pred.axis_iter(Axis(0))
                .into_par_iter()
                .zip(truth.axis_iter(Axis(0)).into_par_iter())
                .map(|(p, t)| count_slice(p, t))
                .reduce(Confusion::default, |a, b| a + b)
        }
    } else {
        /// 按水平切片统计.
        fn count_slices(pred: ArrayView3<u8>, truth: ArrayView3<u8>) -> Confusion {
            pred.axis_iter(Axis(0))
                .zip(truth.axis_iter(Axis(0)))
                .map(|(p, t)| count_slice(p, t))
                .fold(Confusion::default(), |a, b| a + b)
        }
    }
}

/// 统计预测标签体 `pred` 相对真值标签体 `truth` 的混淆矩阵.
///
/// 两者形状不同时返回 `Err(MetricError::ShapeMismatch)`.
pub fn confusion(pred: ArrayView3<u8>, truth: ArrayView3<u8>) -> MetricResult<Confusion> {
    if pred.dim() != truth.dim() {
        return Err(MetricError::ShapeMismatch(pred.dim(), truth.dim()));
    }
    Ok(count_slices(pred, truth))
}

/// 一次评估的全部结果. 分母为零的比率为 `None`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Score {
    /// 混淆矩阵.
    pub confusion: Confusion,
    /// `TP / (TP + FN)`.
    pub recall: Option<f64>,
    /// `TN / (TN + FP)`.
    pub specificity: Option<f64>,
    /// `TP / (TP + FP)`.
    pub precision: Option<f64>,
    /// `2TP / (2TP + FP + FN)`.
    pub dice: Option<f64>,
}

impl From<Confusion> for Score {
    fn from(c: Confusion) -> Self {
        Self {
            confusion: c,
            recall: ratio(c.tp, c.tp + c.fn_),
            specificity: ratio(c.tn, c.tn + c.fp),
            precision: ratio(c.tp, c.tp + c.fp),
            dice: ratio(2 * c.tp, 2 * c.tp + c.fp + c.fn_),
        }
    }
}

impl Score {
    /// 召回率. 真值为空时返回 `Err(MetricError::UndefinedMetric)`.
    #[inline]
    pub fn recall_defined(&self) -> MetricResult<f64> {
        self.recall.ok_or(MetricError::UndefinedMetric("recall"))
    }

    /// 特异度.
    #[inline]
    pub fn specificity_defined(&self) -> MetricResult<f64> {
        self.specificity.ok_or(MetricError::UndefinedMetric("specificity"))
    }

    /// 精确率. 预测为空时返回 `Err(MetricError::UndefinedMetric)`.
    #[inline]
    pub fn precision_defined(&self) -> MetricResult<f64> {
        self.precision.ok_or(MetricError::UndefinedMetric("precision"))
    }

    /// Dice 系数. 预测和真值都为空时返回 `Err(MetricError::UndefinedMetric)`.
    #[inline]
    pub fn dice_defined(&self) -> MetricResult<f64> {
        self.dice.ok_or(MetricError::UndefinedMetric("dice"))
    }
}

/// 体素化两个网格并评估.
pub fn score(reconstructed: &TriMesh, ground_truth: &TriMesh, grid: &ReferenceGrid) -> MetricResult<Score> {
    let pred = voxelize(reconstructed, grid);
    let truth = voxelize(ground_truth, grid);
    let c = confusion(pred.view(), truth.view())?;
    log::debug!(
        "score: tp {} tn {} fp {} fn {} over {} voxels",
        c.tp,
        c.tn,
        c.fp,
        c.fn_,
        c.total()
    );
    Ok(Score::from(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::cuboid;
    use ndarray::Array3;

    fn f64_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-8
    }

    /// 确定性的伪随机标签体.
    fn noise(shape: (usize, usize, usize), seed: u64) -> Array3<u8> {
        let mut s = seed;
        Array3::from_shape_fn(shape, |_| {
            s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            ((s >> 33) % 3 == 0) as u8
        })
    }

    #[test]
    fn test_partition() {
        let a = noise((5, 6, 7), 1);
        let b = noise((5, 6, 7), 2);
        let c = confusion(a.view(), b.view()).unwrap();
        assert_eq!(c.total(), 5 * 6 * 7);
        let truth = b.iter().filter(|v| **v != 0).count() as u64;
        assert_eq!(c.truth_positives(), truth);
        let pred = a.iter().filter(|v| **v != 0).count() as u64;
        assert_eq!(c.predicted_positives(), pred);
    }

    #[test]
    fn test_dice_bounds() {
        let a = noise((4, 4, 4), 3);
        let b = noise((4, 4, 4), 4);
        let s = Score::from(confusion(a.view(), b.view()).unwrap());
        let d = s.dice_defined().unwrap();
        assert!((0.0..=1.0).contains(&d));

        // 相同 => 1.
        let same = Score::from(confusion(a.view(), a.view()).unwrap());
        assert!(f64_eq(same.dice.unwrap(), 1.0));

        // 不相交 => 0.
        let inv = a.mapv(|v| (v == 0) as u8);
        let disjoint = Score::from(confusion(a.view(), inv.view()).unwrap());
        assert!(f64_eq(disjoint.dice.unwrap(), 0.0));
    }

    #[test]
    fn test_empty_truth_makes_recall_undefined() {
        let a = noise((3, 3, 3), 5);
        let empty = Array3::<u8>::zeros((3, 3, 3));
        let s = Score::from(confusion(a.view(), empty.view()).unwrap());
        assert_eq!(s.recall, None);
        assert_eq!(
            s.recall_defined(),
            Err(MetricError::UndefinedMetric("recall"))
        );
        assert!(s.specificity_defined().is_ok());
    }

    #[test]
    fn test_shape_mismatch() {
        let a = Array3::<u8>::zeros((2, 2, 2));
        let b = Array3::<u8>::zeros((2, 2, 3));
        assert_eq!(
            confusion(a.view(), b.view()),
            Err(MetricError::ShapeMismatch((2, 2, 2), (2, 2, 3)))
        );
    }

    #[test]
    fn test_score_meshes() {
        let grid = ReferenceGrid::new((8, 8, 8), [1.0; 3], [0.0; 3]);
        let truth = cuboid([0.5, 0.5, 0.5], [4.5, 4.5, 4.5]);
        let recon = cuboid([2.5, 0.5, 0.5], [6.5, 4.5, 4.5]);
        let s = score(&recon, &truth, &grid).unwrap();
        assert_eq!(s.confusion.tp, 32);
        assert_eq!(s.confusion.fp, 32);
        assert_eq!(s.confusion.fn_, 32);
        assert_eq!(s.confusion.tn, 512 - 96);
        assert!(f64_eq(s.dice.unwrap(), 0.5));
        assert!(f64_eq(s.recall.unwrap(), 0.5));
        assert!(f64_eq(s.precision.unwrap(), 0.5));
    }
}
