//! 模拟会话: 持有坐标系图, 当前病例和当前试验.
//!
//! 会话是所有用户操作的入口. 一个会话同时至多有一个进行中的试验,
//! 试验结束时写盘并从内存中丢弃.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use crate::biopsy;
use crate::config::SimConfig;
use crate::consts::files::SURVEY;
use crate::consts::frames::{FIRED_BIOPSY_PREFIX, POINTER, TRUS};
use crate::data::RefVolume;
use crate::dataset::Case;
use crate::error::{SessionError, SessionResult};
use crate::eval::{score, ReferenceGrid, Score};
use crate::mesh::{MeshReport, TriMesh};
use crate::oracle::SegmentationOracle;
use crate::pipeline::{start_reconstruction, PoseStream, ReconstructionHandle, ReconstructionPipeline};
use crate::pose::{FrameGraph, Pose};
use crate::surface::reconstruct_with;
use crate::trial::{append_survey, save_trial, BiopsyRecord, SurveyResponse, TrialKey, TrialRecord};

/// 已加载的病例. 放置位姿已换算为世界坐标.
struct LoadedCase {
    index: u32,
    volume: Arc<RefVolume>,
    ground_truth: Option<TriMesh>,
}

/// 模拟会话.
pub struct Session<O> {
    config: SimConfig,
    results: PathBuf,
    graph: FrameGraph,
    stream: PoseStream,
    case: Option<LoadedCase>,
    trial: Option<TrialRecord>,
    reconstruction: Option<ReconstructionHandle<O>>,
}

impl<O> std::fmt::Debug for Session<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("results", &self.results)
            .field("case", &self.case.as_ref().map(|c| c.index))
            .field("trial", &self.trial.as_ref().map(TrialRecord::key))
            .field("reconstructing", &self.reconstruction.is_some())
            .finish_non_exhaustive()
    }
}

impl<O: SegmentationOracle + Send + 'static> Session<O> {
    /// 以默认 TRUS 坐标系层级创建会话. 试验结果写入 `results`.
    pub fn new(config: SimConfig, results: impl Into<PathBuf>) -> Self {
        Self {
            config,
            results: results.into(),
            graph: FrameGraph::trus_default(),
            stream: PoseStream::new(),
            case: None,
            trial: None,
            reconstruction: None,
        }
    }

    /// 配置.
    #[inline]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// 结果目录.
    #[inline]
    pub fn results_dir(&self) -> &Path {
        &self.results
    }

    /// 坐标系图.
    #[inline]
    pub fn graph(&self) -> &FrameGraph {
        &self.graph
    }

    /// 位姿流. 外部追踪器也可以直接向它发布世界位姿.
    #[inline]
    pub fn stream(&self) -> &PoseStream {
        &self.stream
    }

    /// 当前试验.
    #[inline]
    pub fn trial(&self) -> Option<&TrialRecord> {
        self.trial.as_ref()
    }

    /// 替换坐标系 `name` 的父位姿.
    pub fn set_pose(&mut self, name: &str, pose: Pose) -> SessionResult<()> {
        Ok(self.graph.set_pose(name, pose)?)
    }

    /// 加载病例: 把配准变换挂到 `Trus` 坐标系, 并据此放置参考体.
    ///
    /// 试验进行中时返回 `Err(SessionError::TrialInProgress)`.
    pub fn load_case(&mut self, case: Case) -> SessionResult<()> {
        if self.trial.is_some() {
            return Err(SessionError::TrialInProgress);
        }
        self.graph.set_pose(TRUS, case.placement)?;
        let world = self.graph.world_transform(TRUS)?;
        let ground_truth = case.ground_truth.map(|m| m.transformed(&world));
        log::info!("loaded case {}", case.index);
        self.case = Some(LoadedCase {
            index: case.index,
            volume: Arc::new(case.volume.with_placement(world)),
            ground_truth,
        });
        Ok(())
    }

    /// 开始试验 `(participant, 当前病例, trial)`.
    pub fn start_trial(&mut self, participant: &str, trial: u32) -> SessionResult<&TrialKey> {
        if self.trial.is_some() {
            return Err(SessionError::TrialInProgress);
        }
        let case = self.case.as_ref().ok_or(SessionError::NoCase)?;
        let key = TrialKey::new(participant, case.index, trial);
        log::info!("trial {key} started");
        Ok(self.trial.insert(TrialRecord::new(key)).key())
    }

    fn trial_mut(&mut self) -> SessionResult<&mut TrialRecord> {
        self.trial.as_mut().ok_or(SessionError::NoTrial)
    }

    /// 以 `oracle` 开始实时重建. 已在重建时先停止旧的重建.
    pub fn start_reconstruction(&mut self, oracle: O) -> SessionResult<()> {
        let trial = self.trial.as_ref().ok_or(SessionError::NoTrial)?;
        let case = self.case.as_ref().ok_or(SessionError::NoCase)?;
        let pipeline = ReconstructionPipeline::new(
            Arc::clone(&case.volume),
            oracle,
            self.config.pipeline,
            trial.shared_fiducials(),
        );
        // 先停止旧的, 保证同一时刻只有一个回调.
        self.stop_reconstruction();
        self.reconstruction = Some(start_reconstruction(&self.stream, pipeline));
        Ok(())
    }

    /// 停止实时重建. 没有在重建时返回 `false`.
    pub fn stop_reconstruction(&mut self) -> bool {
        // drop 即取消订阅.
        self.reconstruction.take().is_some()
    }

    /// 正在进行的重建.
    #[inline]
    pub fn reconstruction(&self) -> Option<&ReconstructionHandle<O>> {
        self.reconstruction.as_ref()
    }

    /// 更新追踪指针的位姿, 并把它的世界位姿发布到位姿流.
    ///
    /// # 返回值
    ///
    /// 本次调用实际投递的位姿个数. 其他线程正在投递时为 0.
    pub fn update_pointer(&mut self, pose: Pose) -> SessionResult<usize> {
        self.graph.set_pose(POINTER, pose)?;
        let world = self.graph.world_transform(POINTER)?;
        Ok(self.stream.publish(world))
    }

    /// 撤销最近一个轮廓, 返回移除的点数.
    pub fn undo_last_contour(&mut self) -> SessionResult<usize> {
        let n = self.trial_mut()?.fiducials().undo_last_contour()?;
        log::debug!("undo removed {n} points");
        Ok(n)
    }

    /// 清空所有基准点.
    pub fn clear_fiducials(&mut self) -> SessionResult<()> {
        self.trial_mut()?.fiducials().clear();
        log::info!("fiducials cleared");
        Ok(())
    }

    /// 由当前基准点生成表面.
    ///
    /// 轮廓少于 `config.min_contours` 时返回 `Err(SessionError::TooFewContours)`.
    pub fn generate_surface(&mut self) -> SessionResult<MeshReport> {
        let min = self.config.min_contours;
        let params = self.config.surface;
        let trial = self.trial_mut()?;
        let (points, revision) = {
            let f = trial.fiducials();
            if f.contour_count() < min {
                return Err(SessionError::TooFewContours(f.contour_count(), min));
            }
            (f.all_points().to_vec(), f.revision())
        };
        let mesh = reconstruct_with(&points, &params)?;
        let report = mesh.report();
        trial.set_mesh(mesh, revision);
        Ok(report)
    }

    /// 在当前病例的参考网格上, 比较当前网格与真值网格.
    ///
    /// 没有病例, 没有试验, 或者病例没有真值网格时返回对应错误. 网格尚未生成时
    /// 返回 `Ok(None)`.
    pub fn score_current(&self) -> SessionResult<Option<Score>> {
        let case = self.case.as_ref().ok_or(SessionError::NoCase)?;
        let trial = self.trial.as_ref().ok_or(SessionError::NoTrial)?;
        let Some(mesh) = trial.mesh() else {
            return Ok(None);
        };
        let Some(gt) = &case.ground_truth else {
            return Err(SessionError::NoGroundTruth);
        };
        let grid = ReferenceGrid::from_volume(&case.volume);
        Ok(Some(score(mesh, gt, &grid)?))
    }

    /// 把穿刺针推进到 `depth` 毫米.
    pub fn move_biopsy(&mut self, depth: f64) -> SessionResult<()> {
        Ok(biopsy::move_biopsy(&mut self.graph, depth)?)
    }

    /// 发射穿刺针, 并记入当前试验.
    pub fn fire_biopsy(&mut self) -> SessionResult<&BiopsyRecord> {
        if self.trial.is_none() {
            return Err(SessionError::NoTrial);
        }
        let record = biopsy::fire_biopsy(&mut self.graph)?;
        let trial = self.trial_mut()?;
        trial.push_biopsy(record);
        Ok(&trial.biopsies()[trial.biopsies().len() - 1])
    }

    /// 结束并保存当前试验.
    ///
    /// 保存失败时试验保留在内存中, 可以再次尝试. 成功后删除本次试验发射的穿刺坐标系.
    ///
    /// # 返回值
    ///
    /// 试验目录的路径.
    pub fn end_trial(&mut self) -> SessionResult<PathBuf> {
        if self.trial.is_none() {
            return Err(SessionError::NoTrial);
        }
        self.stop_reconstruction();
        let trial = self.trial.as_ref().ok_or(SessionError::NoTrial)?;
        let dir = save_trial(&self.results, trial, &self.graph, SystemTime::now())?;

        let fired: Vec<String> = self
            .graph
            .names()
            .into_iter()
            .filter(|n| n.starts_with(FIRED_BIOPSY_PREFIX))
            .map(str::to_string)
            .collect();
        for name in fired {
            self.graph.remove_frame(&name)?;
        }
        if let Some(t) = self.trial.take() {
            log::info!("trial {} ended", t.key());
        }
        Ok(dir)
    }

    /// 放弃当前试验, 不保存.
    pub fn abort_trial(&mut self) -> SessionResult<TrialKey> {
        self.stop_reconstruction();
        let t = self.trial.take().ok_or(SessionError::NoTrial)?;
        log::warn!("trial {} aborted without saving", t.key());
        Ok(t.key().clone())
    }

    /// 把问卷答复追加到 `{results}/survey.csv`.
    pub fn submit_survey(&self, response: &SurveyResponse) -> SessionResult<()> {
        append_survey(&self.results.join(SURVEY), response, SystemTime::now())?;
        Ok(())
    }
}
