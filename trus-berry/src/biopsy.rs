//! 穿刺针的移动与发射.

use crate::consts::frames::{BIOPSY_MODEL, FIRED_BIOPSY_PREFIX, REFERENCE};
use crate::error::FrameResult;
use crate::pose::FrameGraph;
use crate::trial::BiopsyRecord;

/// 把穿刺针沿轨迹推进到 `depth` (毫米): 替换 `BiopsyModel → BiopsyTrajectory` 平移的 z 分量.
pub fn move_biopsy(graph: &mut FrameGraph, depth: f64) -> FrameResult<()> {
    let pose = graph.pose(BIOPSY_MODEL)?;
    graph.set_pose(BIOPSY_MODEL, pose.with_translation_z(depth))
}

/// 已发射的穿刺次数, 即图中以 `BiopsyModelToReference_` 开头的坐标系个数.
pub fn fired_count(graph: &FrameGraph) -> usize {
    graph
        .names()
        .iter()
        .filter(|n| n.starts_with(FIRED_BIOPSY_PREFIX))
        .count()
}

/// 发射穿刺针.
///
/// 1. 以当前穿刺针相对参考坐标系的位姿, 在 `Reference` 之下添加坐标系
///    `BiopsyModelToReference_{n}`, `n` 为已发射次数;
/// 2. 把穿刺深度复位为 0.
pub fn fire_biopsy(graph: &mut FrameGraph) -> FrameResult<BiopsyRecord> {
    let name = format!("{FIRED_BIOPSY_PREFIX}{}", fired_count(graph));
    let pose = graph.transform_between(BIOPSY_MODEL, REFERENCE)?;
    graph.add_frame(&name, REFERENCE, pose)?;
    move_biopsy(graph, 0.0)?;
    log::info!("fired biopsy `{}` at {:?}", name, pose.translation());
    Ok(BiopsyRecord { name, pose })
}
