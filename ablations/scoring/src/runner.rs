//! 程序运行函数.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::thread;
use std::time::Instant;

use trus_berry::consts::files::{MESH, METRICS};
use trus_berry::consts::{POISSON_DEPTH, POISSON_WIDTH};
use trus_berry::prelude::*;
use utils::loader;

use crate::result::ScoringResult;

/// 读取试验网格. 没有 `mesh.stl` 时由基准点重建并写回试验目录.
fn mesh_for(dir: &TrialDir) -> Result<TriMesh, String> {
    if let Some(mesh) = load_mesh(&dir.path).map_err(|e| e.to_string())? {
        return Ok(mesh);
    }
    let fids = load_fiducials(&dir.path).map_err(|e| e.to_string())?;
    let mesh = reconstruct(fids.all_points(), POISSON_DEPTH, POISSON_WIDTH).map_err(|e| e.to_string())?;
    write_stl(dir.path.join(MESH), &mesh).map_err(|e| e.to_string())?;
    log::info!("{}: rebuilt mesh from {} fiducials", dir.key, fids.len());
    Ok(mesh)
}

/// 按 CPU 核心数分段, 并行地准备所有试验的网格.
fn load_meshes(trials: &[TrialDir]) -> Vec<Result<TriMesh, String>> {
    let ranges = utils::split_even(trials.len(), utils::cpus());
    thread::scope(|s| {
        let handles: Vec<_> = ranges
            .into_iter()
            .map(|r| s.spawn(move || trials[r].iter().map(mesh_for).collect::<Vec<_>>()))
            .collect();
        handles
            .into_iter()
            .flat_map(|h| h.join().expect("Thread joining error"))
            .collect()
    })
}

/// 加载 `volumes` 中的病例, 返回带真值网格 (世界坐标) 的病例.
fn load_cases(cases: &Path, volumes: BTreeSet<u32>) -> BTreeMap<u32, (TriMesh, ReferenceGrid)> {
    let mut ans = BTreeMap::new();
    for (idx, case) in loader::case_loader(volumes, cases) {
        let case = match case {
            Ok(c) => c,
            Err(e) => {
                log::warn!("case {idx} skipped: {e}");
                continue;
            }
        };
        let Some(gt) = case.ground_truth_world() else {
            log::warn!("case {idx} has no ground truth, skipped");
            continue;
        };
        ans.insert(idx, (gt, ReferenceGrid::from_volume(&case.volume)));
    }
    ans
}

/// 实际运行.
pub fn run() -> ScoringResult {
    let results = loader::results_dir_from_env_or_home();
    let cases = loader::cases_dir_from_env_or_home();
    assert!(results.is_dir(), "results directory {} not found", results.display());
    assert!(cases.is_dir(), "cases directory {} not found", cases.display());

    let start = Instant::now();
    let trials = walk_results(&results).expect("cannot walk results directory");
    println!("Scoring {} trials...", trials.len());

    let volumes: BTreeSet<u32> = trials.iter().map(|t| t.key.volume).collect();
    let cases = load_cases(&cases, volumes);
    let meshes = load_meshes(&trials);

    let mut out = ScoringResult::new();
    let mut jobs = Vec::with_capacity(trials.len());
    for (trial, mesh) in trials.iter().zip(meshes.iter()) {
        match (mesh, cases.get(&trial.key.volume)) {
            (Ok(mesh), Some((gt, grid))) => jobs.push(ScoreJob {
                key: &trial.key,
                reconstructed: mesh,
                ground_truth: gt,
                grid,
            }),
            (Err(e), _) => out.fail(trial.key.clone(), e.clone()),
            (Ok(_), None) => out.fail(trial.key.clone(), "case unavailable".to_string()),
        }
    }

    let mut per_participant: BTreeMap<String, Vec<MetricsRow>> = BTreeMap::new();
    for (key, score) in score_batch(&jobs) {
        match score {
            Ok(score) => {
                let row = MetricsRow { key, score };
                out.push(row.clone());
                per_participant
                    .entry(row.key.participant.clone())
                    .or_default()
                    .push(row);
            }
            Err(e) => out.fail(key, e.to_string()),
        }
    }

    for (participant, rows) in per_participant {
        let path = results.join(participant).join(METRICS);
        if let Err(e) = append_metrics(&path, &rows) {
            log::error!("cannot write {}: {e}", path.display());
        }
    }
    out.finish(start.elapsed());
    out
}
