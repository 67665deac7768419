//! 多个试验的批量评估. 各试验互不依赖.

use crate::error::MetricResult;
use crate::eval::{score, ReferenceGrid, Score};
use crate::mesh::TriMesh;
use crate::trial::TrialKey;

/// 一个评估任务. 同一病例的任务共享真值网格和参考网格.
#[derive(Copy, Clone, Debug)]
pub struct ScoreJob<'a> {
    /// 试验标识.
    pub key: &'a TrialKey,
    /// 重建网格.
    pub reconstructed: &'a TriMesh,
    /// 真值网格.
    pub ground_truth: &'a TriMesh,
    /// 参考网格.
    pub grid: &'a ReferenceGrid,
}

impl ScoreJob<'_> {
    #[inline]
    fn run(&self) -> (TrialKey, MetricResult<Score>) {
        let s = score(self.reconstructed, self.ground_truth, self.grid);
        if let Err(e) = &s {
            log::warn!("scoring {} failed: {}", self.key, e);
        }
        (self.key.clone(), s)
    }
}

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::prelude::*;

        /// 借助 `rayon`, 并行地评估所有任务. 结果顺序与 `jobs` 相同.
        pub fn score_batch(jobs: &[ScoreJob]) -> Vec<(TrialKey, MetricResult<Score>)> {
            jobs.par_iter().map(ScoreJob::run).collect()
        }
    } else {
        /// 依次评估所有任务. 结果顺序与 `jobs` 相同.
        pub fn score_batch(jobs: &[ScoreJob]) -> Vec<(TrialKey, MetricResult<Score>)> {
            jobs.iter().map(ScoreJob::run).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::tests::cuboid;

    #[test]
    fn test_batch_keeps_order() {
        let grid = ReferenceGrid::new((6, 6, 6), [1.0; 3], [0.0; 3]);
        let truth = cuboid([0.5; 3], [2.5; 3]);
        let same = truth.clone();
        let shifted = cuboid([1.5, 0.5, 0.5], [3.5, 2.5, 2.5]);
        let keys = [TrialKey::new("A", 1, 1), TrialKey::new("A", 1, 2)];
        let jobs = [
            ScoreJob {
                key: &keys[0],
                reconstructed: &same,
                ground_truth: &truth,
                grid: &grid,
            },
            ScoreJob {
                key: &keys[1],
                reconstructed: &shifted,
                ground_truth: &truth,
                grid: &grid,
            },
        ];
        let out = score_batch(&jobs);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].0, keys[0]);
        assert_eq!(out[0].1.as_ref().unwrap().dice, Some(1.0));
        assert_eq!(out[1].0, keys[1]);
        assert_eq!(out[1].1.as_ref().unwrap().dice, Some(0.5));
    }
}
