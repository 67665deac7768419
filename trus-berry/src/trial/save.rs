//! 试验结果的保存与读取.

use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use ndarray::Array2;
use ndarray_npy::{read_npy, write_npy};

use crate::consts::files;
use crate::error::TrialResult;
use crate::fiducial::FiducialSet;
use crate::mesh::{read_stl, write_stl, TriMesh};
use crate::pose::FrameGraph;
use crate::trial::clock::{format_secs, format_utc};
use crate::trial::TrialRecord;

/// 把 `record` 与当前场景 `graph` 保存到 `{results}/{participant}/{dir_name}/`.
///
/// 所有文件先写入同级的临时目录, 全部成功后再整体改名. 失败时已有的同名试验保持不变.
///
/// # 返回值
///
/// 试验目录的路径.
pub fn save_trial(
    results: &Path,
    record: &TrialRecord,
    graph: &FrameGraph,
    ended: SystemTime,
) -> TrialResult<PathBuf> {
    let dir = record.key().dir_in(results);
    let parent = results.join(&record.key().participant);
    let name = record.key().dir_name();
    let partial = parent.join(format!(".{name}.partial"));

    if partial.exists() {
        fs::remove_dir_all(&partial)?;
    }
    fs::create_dir_all(&partial)?;
    if let Err(e) = write_contents(&partial, record, graph, ended) {
        // 尽力清理, 保留原始错误.
        let _ = fs::remove_dir_all(&partial);
        return Err(e);
    }

    let old = parent.join(format!(".{name}.old"));
    if let Err(e) = move_into_place(&partial, &dir, &old, |from, to| fs::rename(from, to)) {
        let _ = fs::remove_dir_all(&partial);
        return Err(e.into());
    }

    let (contours, points) = record.fiducial_counts();
    log::info!(
        "saved trial {} ({} contours, {} points) to {}",
        record.key(),
        contours,
        points,
        dir.display()
    );
    Ok(dir)
}

/// 把写好的 `partial` 目录改名为 `dir`. 已有的 `dir` 先移到 `old`, 成功后删除.
///
/// # 注意
///
/// 第二次改名失败时, `old` 会被改回 `dir`. 删除 `old` 失败不影响保存结果, 只记录警告.
fn move_into_place<R>(partial: &Path, dir: &Path, old: &Path, mut rename: R) -> io::Result<()>
where
    R: FnMut(&Path, &Path) -> io::Result<()>,
{
    if !dir.exists() {
        return rename(partial, dir);
    }
    if old.exists() {
        fs::remove_dir_all(old)?;
    }
    rename(dir, old)?;
    if let Err(e) = rename(partial, dir) {
        if let Err(back) = rename(old, dir) {
            log::error!("cannot restore {} from {}: {back}", dir.display(), old.display());
        }
        return Err(e);
    }
    if let Err(e) = fs::remove_dir_all(old) {
        log::warn!("saved {}, but cannot remove {}: {e}", dir.display(), old.display());
    }
    Ok(())
}

fn write_contents(
    dir: &Path,
    record: &TrialRecord,
    graph: &FrameGraph,
    ended: SystemTime,
) -> TrialResult<()> {
    write_npy(dir.join(files::FIDUCIALS), &record.fiducials().to_array())?;
    if let Some(mesh) = record.mesh() {
        if record.is_mesh_stale() {
            log::warn!("trial {}: saving a mesh built before the last fiducial edit", record.key());
        }
        write_stl(dir.join(files::MESH), mesh)?;
    }

    let mut log = BufWriter::new(fs::File::create(dir.join(files::TRIAL_LOG))?);
    write_trial_log(&mut log, record, ended)?;
    log.flush()?;

    let mut scene = BufWriter::new(fs::File::create(dir.join(files::SCENE))?);
    write_scene(&mut scene, record, graph)?;
    scene.flush()?;
    Ok(())
}

/// 人类可读的试验日志.
fn write_trial_log<W: Write>(w: &mut W, record: &TrialRecord, ended: SystemTime) -> io::Result<()> {
    let key = record.key();
    writeln!(w, "Participant: {}", key.participant)?;
    writeln!(w, "Volume: {}", key.volume)?;
    writeln!(w, "Trial: {}", key.trial)?;
    writeln!(w, "Completed: {}", format_utc(ended))?;
    writeln!(w, "Duration: {} s", format_secs(record.duration_until(ended)))?;
    let (contours, points) = record.fiducial_counts();
    writeln!(w, "Contours: {contours}")?;
    writeln!(w, "Fiducials: {points}")?;
    let mesh = match (record.mesh(), record.is_mesh_stale()) {
        (None, _) => "none",
        (Some(_), false) => "current",
        (Some(_), true) => "stale",
    };
    writeln!(w, "Mesh: {mesh}")?;
    writeln!(w, "Biopsies: {}", record.biopsies().len())?;
    for b in record.biopsies() {
        writeln!(w, "{}: {}", b.name, b.pose.to_text().replace('\n', " "))?;
    }
    Ok(())
}

/// 场景快照: 每个坐标系一行 `名称 \t 父坐标系 \t 世界位姿 (16 个数)`, 随后是穿刺记录.
fn write_scene<W: Write>(w: &mut W, record: &TrialRecord, graph: &FrameGraph) -> TrialResult<()> {
    for name in graph.names() {
        let parent = graph.parent(name)?.unwrap_or("-");
        let world = graph.world_transform(name)?;
        writeln!(w, "{name}\t{parent}\t{}", world.to_text().replace('\n', " "))?;
    }
    for b in record.biopsies() {
        writeln!(w, "{}\t-\t{}", b.name, b.pose.to_text().replace('\n', " "))?;
    }
    Ok(())
}

/// 读取试验目录下的基准点, 整体作为一个轮廓.
pub fn load_fiducials(dir: &Path) -> TrialResult<FiducialSet> {
    let arr: Array2<f64> = read_npy(dir.join(files::FIDUCIALS))?;
    Ok(FiducialSet::from_array(&arr))
}

/// 读取试验目录下的网格. 文件不存在时返回 `Ok(None)`.
pub fn load_mesh(dir: &Path) -> TrialResult<Option<TriMesh>> {
    let path = dir.join(files::MESH);
    if !path.exists() {
        return Ok(None);
    }
    read_stl(path).map(Some)
}
