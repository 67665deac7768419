//! 模拟器默认的变换层级.

use crate::consts::frames::*;
use crate::error::FrameResult;
use crate::pose::{FrameGraph, Pose};

impl FrameGraph {
    /// 构建模拟器的默认变换层级. 所有父位姿初始为恒等变换, 标定结果随后通过
    /// [`FrameGraph::set_pose`] 写入.
    ///
    /// ```text
    /// Ras
    /// └── Reference
    ///     ├── BoxModel
    ///     │   └── Cylinder
    ///     │       └── Trus
    ///     └── Phantom
    ///         ├── Probe
    ///         │   └── ProbeTip
    ///         │       └── ProbeModel
    ///         │           ├── UsMask
    ///         │           └── BiopsyTrajectory
    ///         │               └── BiopsyModel
    ///         └── Pointer
    ///             └── PointerTip
    /// ```
    pub fn trus_default() -> Self {
        let mut g = FrameGraph::new(RAS);
        // 以下名称都是常量且各不相同, 不会失败.
        let built = g.extend_chain(&[
            (REFERENCE, RAS),
            (BOX_MODEL, REFERENCE),
            (CYLINDER, BOX_MODEL),
            (TRUS, CYLINDER),
            (PHANTOM, REFERENCE),
            (PROBE, PHANTOM),
            (PROBE_TIP, PROBE),
            (PROBE_MODEL, PROBE_TIP),
            (US_MASK, PROBE_MODEL),
            (BIOPSY_TRAJECTORY, PROBE_MODEL),
            (BIOPSY_MODEL, BIOPSY_TRAJECTORY),
            (POINTER, PHANTOM),
            (POINTER_TIP, POINTER),
        ]);
        debug_assert!(built.is_ok());
        g
    }

    /// 依次添加 `(name, parent)` 坐标系, 初始位姿为恒等变换.
    fn extend_chain(&mut self, pairs: &[(&str, &str)]) -> FrameResult<()> {
        for (name, parent) in pairs {
            self.add_frame(name, parent, Pose::IDENTITY)?;
        }
        Ok(())
    }
}
