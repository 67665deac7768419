//! 运行时错误.
//!
//! 每个模块只返回与自身相关的最窄错误类型. 上层 ([`crate::session`])
//! 通过 [`SessionError`] 汇总.

use crate::Idx2d;
use thiserror::Error;

/// 坐标系图错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    /// 坐标系不存在.
    #[error("unknown frame `{0}`")]
    UnknownFrame(String),

    /// 坐标系已经存在.
    #[error("frame `{0}` already exists")]
    DuplicateFrame(String),

    /// 修改父坐标系会形成环.
    #[error("attaching `{frame}` under `{parent}` would create a cycle")]
    Cycle {
        /// 被移动的坐标系.
        frame: String,
        /// 期望的新父坐标系.
        parent: String,
    },

    /// 根坐标系没有父变换, 不能修改.
    #[error("the root frame `{0}` has no parent transform")]
    RootFrame(String),

    /// 变换不可逆.
    #[error("transform of `{0}` is singular")]
    Singular(String),

    /// 坐标系仍有子坐标系, 不能删除.
    #[error("frame `{0}` still has children")]
    HasChildren(String),
}

/// 坐标系图操作结果.
pub type FrameResult<T> = Result<T, FrameError>;

/// 帧预处理错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PreprocessError {
    /// 输入帧超出填充画布.
    #[error("frame {frame:?} does not fit into canvas {canvas:?}")]
    FrameTooLarge {
        /// 输入帧 `(h, w)`.
        frame: Idx2d,
        /// 画布 `(h, w)`.
        canvas: Idx2d,
    },

    /// 输入帧为空.
    #[error("empty frame")]
    EmptyFrame,
}

/// 帧预处理结果.
pub type PreprocessResult<T> = Result<T, PreprocessError>;

/// 分割模型错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OracleError {
    /// 模型输入或输出形状与约定不符.
    #[error("oracle shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        /// 约定形状.
        expected: Idx2d,
        /// 实际形状.
        found: Idx2d,
    },

    /// 模型后端自身的失败.
    #[error("oracle backend failure: {0}")]
    Backend(String),
}

/// 轮廓提取错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContourError {
    /// 降采样步长必须至少为 1.
    #[error("contour stride must be at least 1")]
    InvalidStride,
}

/// 基准点累积器错误.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FiducialError {
    /// 自上次清空以来没有可撤销的轮廓.
    #[error("no contour to undo")]
    EmptyHistory,
}

/// 退化网格的具体原因.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// 输入点共线 (或全部重合), 无法确定表面.
    CollinearInput,

    /// 等值面提取没有产生任何三角形.
    NoTriangles,
}

/// 表面重建错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SurfaceError {
    /// 点数不足. `(已有点数, 最少需要点数)`.
    #[error("insufficient points: {0} supplied, at least {1} required")]
    InsufficientPoints(usize, usize),

    /// 结果退化.
    #[error("degenerate mesh: {0:?}")]
    DegenerateMesh(Degeneracy),

    /// 参数越界.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),
}

/// 表面重建结果.
pub type SurfaceResult<T> = Result<T, SurfaceError>;

/// 精度评估错误.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MetricError {
    /// 分母为零的比率.
    #[error("metric `{0}` is undefined (zero denominator)")]
    UndefinedMetric(&'static str),

    /// 两个标签体形状不同.
    #[error("label volumes differ in shape: {0:?} vs {1:?}")]
    ShapeMismatch((usize, usize, usize), (usize, usize, usize)),
}

/// 精度评估结果.
pub type MetricResult<T> = Result<T, MetricError>;

/// 单次流水线错误.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 坐标系查询失败.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// 预处理失败.
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    /// 模型推理失败.
    #[error(transparent)]
    Oracle(#[from] OracleError),

    /// 轮廓提取失败.
    #[error(transparent)]
    Contour(#[from] ContourError),

    /// 共享状态的锁被污染 (持锁线程 panic).
    #[error("shared state `{0}` is poisoned")]
    Poisoned(&'static str),
}

/// 单次流水线结果.
pub type PipelineResult<T> = Result<T, PipelineError>;

/// 文件读写错误. 发生时当前的保存操作被放弃, 已保存的试验不受影响.
#[derive(Debug, Error)]
pub enum TrialError {
    /// 底层 I/O 错误.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 写 npy 失败.
    #[error("failed to write npy: {0}")]
    WriteNpy(#[from] ndarray_npy::WriteNpyError),

    /// 读 npy 失败.
    #[error("failed to read npy: {0}")]
    ReadNpy(#[from] ndarray_npy::ReadNpyError),

    /// 读 NIfTI 失败.
    #[error("failed to read nifti: {0}")]
    Nifti(#[from] nifti::NiftiError),

    /// 文件内容格式错误.
    #[error("malformed file `{path}`: {reason}")]
    Malformed {
        /// 文件路径.
        path: String,
        /// 原因.
        reason: String,
    },

    /// Likert 量表取值必须位于 `1..=5`.
    #[error("likert answer {0} is out of 1..=5")]
    InvalidLikert(u8),

    /// 场景快照中的坐标系查询失败.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// 配置文件编解码失败.
    #[error("failed to encode or decode config: {0}")]
    Config(#[from] bincode::Error),
}

/// 文件读写结果.
pub type TrialResult<T> = Result<T, TrialError>;

/// 会话层错误. 汇总下层的所有错误.
#[derive(Debug, Error)]
pub enum SessionError {
    /// 生成表面前采集的轮廓太少. `(已有, 最少需要)`.
    #[error("collect more contours first: {0} recorded, {1} required")]
    TooFewContours(usize, usize),

    /// 没有加载病例.
    #[error("no case loaded")]
    NoCase,

    /// 没有进行中的试验.
    #[error("no trial in progress")]
    NoTrial,

    /// 已有进行中的试验.
    #[error("a trial is already in progress")]
    TrialInProgress,

    /// 当前病例没有真值网格.
    #[error("the loaded case has no ground truth mesh")]
    NoGroundTruth,

    /// 坐标系错误.
    #[error(transparent)]
    Frame(#[from] FrameError),

    /// 基准点错误.
    #[error(transparent)]
    Fiducial(#[from] FiducialError),

    /// 表面重建错误.
    #[error(transparent)]
    Surface(#[from] SurfaceError),

    /// 精度评估错误.
    #[error(transparent)]
    Metric(#[from] MetricError),

    /// 文件读写错误.
    #[error(transparent)]
    Trial(#[from] TrialError),

    /// 流水线错误.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

/// 会话层结果.
pub type SessionResult<T> = Result<T, SessionError>;
