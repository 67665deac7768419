//! 实时重建流水线.
//!
//! 每一次位姿更新都完整地执行一遍:
//!
//! 切面重采样 → 扇形掩膜 → 填充与标准化 → 分割模型 → 放大回画布 → 轮廓反投影 → 基准点累积.
//!
//! 流水线本身是单线程的. 位姿由 [`PoseStream`] 推送, 投递是 "最新值优先" 的,
//! 处理不过来的中间位姿会被丢弃.

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use ndarray::{Array2, Zip};

use crate::consts::gray::is_background;
use crate::contour::{extract_contour, ContourParams};
use crate::data::fan::FanMask;
use crate::data::reslice::{reslice, ResliceSpec};
use crate::data::{ImgWriteVis, IntensityWindow, MaskSlice, RefVolume};
use crate::error::{PipelineError, PipelineResult};
use crate::oracle::{run_oracle, SegmentationOracle};
use crate::pose::Pose;
use crate::preprocess::{normalize, upsample_mask, Canvas};
use crate::trial::SharedFiducials;

mod stream;

pub use stream::{PoseStream, SubscriptionId};

/// 流水线参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PipelineParams {
    /// 体数据到 8-bit 灰度的强度窗口.
    pub window: IntensityWindow,
    /// 重采样输出几何.
    pub reslice: ResliceSpec,
    /// 填充画布与模型输入大小.
    pub canvas: Canvas,
    /// 轮廓阈值与降采样步长.
    pub contour: ContourParams,
    /// 切平面相对追踪指针的固定偏移 (切平面局部 → 指针).
    pub image_offset: Pose,
    /// 扇形掩膜. `None` 表示不遮挡.
    pub fan: Option<FanMask>,
}

impl Default for PipelineParams {
    fn default() -> Self {
        let reslice = ResliceSpec::default();
        Self {
            window: IntensityWindow::default(),
            reslice,
            canvas: Canvas::default(),
            contour: ContourParams::default(),
            image_offset: Pose::IDENTITY,
            fan: FanMask::default_for(reslice.dims).ok(),
        }
    }
}

/// 单次流水线的摘要.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PassSummary {
    /// 切平面是否与参考体相交.
    pub in_bounds: bool,
    /// 追加的基准点个数.
    pub points: usize,
}

/// 重建流水线. 持有参考体, 分割模型, 以及与会话共享的基准点集合.
pub struct ReconstructionPipeline<O> {
    volume: Arc<RefVolume>,
    oracle: O,
    params: PipelineParams,
    fiducials: SharedFiducials,
    /// 开始重建时由 `params.fan` 渲染的背景掩膜.
    background: Option<Array2<u8>>,
    /// 背景掩膜捕获之后 `params.fan` 是否被修改过?
    background_stale: bool,
}

impl<O> std::fmt::Debug for ReconstructionPipeline<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconstructionPipeline")
            .field("params", &self.params)
            .field("background", &self.background.is_some())
            .field("background_stale", &self.background_stale)
            .finish_non_exhaustive()
    }
}

impl<O: SegmentationOracle> ReconstructionPipeline<O> {
    /// 构建流水线并立即捕获背景掩膜.
    pub fn new(
        volume: Arc<RefVolume>,
        oracle: O,
        params: PipelineParams,
        fiducials: SharedFiducials,
    ) -> Self {
        let mut p = Self {
            volume,
            oracle,
            params,
            fiducials,
            background: None,
            background_stale: false,
        };
        p.refresh_background();
        p
    }

    /// 参数.
    #[inline]
    pub fn params(&self) -> &PipelineParams {
        &self.params
    }

    /// 参考体.
    #[inline]
    pub fn volume(&self) -> &RefVolume {
        &self.volume
    }

    /// 替换扇形掩膜.
    ///
    /// # 注意
    ///
    /// 背景掩膜不会自动更新. 在调用 [`ReconstructionPipeline::refresh_background`] 之前,
    /// 流水线继续使用旧的背景.
    pub fn set_fan(&mut self, fan: Option<FanMask>) {
        if self.params.fan != fan {
            self.params.fan = fan;
            self.background_stale = true;
            log::warn!("fan mask changed, background stays stale until refreshed");
        }
    }

    /// 背景掩膜是否落后于当前扇形参数?
    #[inline]
    pub fn is_background_stale(&self) -> bool {
        self.background_stale
    }

    /// 按当前扇形参数重新捕获背景掩膜.
    pub fn refresh_background(&mut self) {
        self.background = self.params.fan.map(|f| f.render(self.params.reslice.dims));
        self.background_stale = false;
        log::debug!("background mask captured: {:?}", self.params.fan);
    }

    /// 把背景掩膜保存为 PNG, 扇形内为白色. 没有背景掩膜时不写文件, 返回 `Ok(false)`.
    pub fn save_background<P: AsRef<Path>>(&self, path: P) -> image::ImageResult<bool> {
        let Some(bg) = &self.background else {
            return Ok(false);
        };
        MaskSlice::new(bg.view()).save(path)?;
        Ok(true)
    }

    /// 由追踪指针的世界位姿得到切平面位姿 (切平面局部 → 世界).
    #[inline]
    pub fn cutting_plane(&self, pointer: &Pose) -> Pose {
        pointer * &self.params.image_offset
    }

    /// 对一个指针位姿执行一遍完整的流水线, 并把得到的轮廓追加到基准点集合.
    ///
    /// 切平面与参考体不相交时照常执行, 此时得到空轮廓.
    ///
    /// # 返回值
    ///
    /// 任一阶段失败时返回对应的错误, 基准点集合保持不变.
    pub fn process(&mut self, pointer: &Pose) -> PipelineResult<PassSummary> {
        let p = &self.params;
        let plane = self.cutting_plane(pointer);
        let mut resliced = reslice(&self.volume, &p.window, &plane, &p.reslice);
        if let Some(bg) = &self.background {
            Zip::from(&mut resliced.frame).and(bg).for_each(|pix, &m| {
                if is_background(m) {
                    *pix = 0;
                }
            });
        }

        let pre = normalize(resliced.frame.view(), &p.canvas)?;
        let prob = run_oracle(&mut self.oracle, pre.input.view(), p.canvas.model)?;
        let prob = upsample_mask(prob.view(), &p.canvas);
        let points = extract_contour(prob.view(), &resliced.transform, &pre.offsets, &p.contour)?;

        self.fiducials
            .lock()
            .map_err(|_| PipelineError::Poisoned("fiducials"))?
            .append_contour(&points);
        log::debug!(
            "pass: in_bounds = {}, {} points appended",
            resliced.in_bounds,
            points.len()
        );
        Ok(PassSummary {
            in_bounds: resliced.in_bounds,
            points: points.len(),
        })
    }
}

/// 重建过程的累计统计.
#[derive(Debug, Default)]
pub struct PassStats {
    passes: AtomicUsize,
    failures: AtomicUsize,
    points: AtomicUsize,
}

impl PassStats {
    /// 成功的流水线次数.
    #[inline]
    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::Relaxed)
    }

    /// 失败的流水线次数.
    #[inline]
    pub fn failures(&self) -> usize {
        self.failures.load(Ordering::Relaxed)
    }

    /// 累计追加的基准点个数.
    #[inline]
    pub fn points(&self) -> usize {
        self.points.load(Ordering::Relaxed)
    }
}

/// 正在进行的重建. `stop()` 或 drop 时取消订阅.
pub struct ReconstructionHandle<O> {
    stream: PoseStream,
    id: Option<SubscriptionId>,
    pipeline: Arc<Mutex<ReconstructionPipeline<O>>>,
    stats: Arc<PassStats>,
}

impl<O> std::fmt::Debug for ReconstructionHandle<O> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReconstructionHandle")
            .field("id", &self.id)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// 在 `stream` 上注册重建回调.
///
/// 回调中的错误不会中断重建: 它们以 `warn` 级别记录, 并计入 [`PassStats::failures`].
pub fn start_reconstruction<O>(
    stream: &PoseStream,
    pipeline: ReconstructionPipeline<O>,
) -> ReconstructionHandle<O>
where
    O: SegmentationOracle + Send + 'static,
{
    let pipeline = Arc::new(Mutex::new(pipeline));
    let stats = Arc::new(PassStats::default());

    let (p, s) = (Arc::clone(&pipeline), Arc::clone(&stats));
    let id = stream.subscribe(move |pose| {
        let mut guard = p.lock().unwrap_or_else(PoisonError::into_inner);
        match guard.process(pose) {
            Ok(summary) => {
                s.passes.fetch_add(1, Ordering::Relaxed);
                s.points.fetch_add(summary.points, Ordering::Relaxed);
            }
            Err(e) => {
                s.failures.fetch_add(1, Ordering::Relaxed);
                log::warn!("reconstruction pass failed: {e}");
            }
        }
    });
    log::info!("reconstruction started");
    ReconstructionHandle {
        stream: stream.clone(),
        id: Some(id),
        pipeline,
        stats,
    }
}

impl<O> ReconstructionHandle<O> {
    /// 是否仍在订阅?
    #[inline]
    pub fn is_running(&self) -> bool {
        self.id.is_some()
    }

    /// 累计统计.
    #[inline]
    pub fn stats(&self) -> &PassStats {
        &self.stats
    }

    /// 锁定流水线, 用于调整参数或刷新背景.
    #[inline]
    pub fn pipeline(&self) -> MutexGuard<'_, ReconstructionPipeline<O>> {
        self.pipeline.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 取消订阅. 重复调用无效果.
    pub fn stop(&mut self) {
        if let Some(id) = self.id.take() {
            self.stream.unsubscribe(id);
            log::info!(
                "reconstruction stopped after {} passes ({} failed, {} points)",
                self.stats.passes(),
                self.stats.failures(),
                self.stats.points()
            );
        }
    }
}

impl<O> Drop for ReconstructionHandle<O> {
    fn drop(&mut self) {
        self.stop();
    }
}
