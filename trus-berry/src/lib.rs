#![warn(missing_docs)] // <= 合适时移除它.

//! 核心库. 提供经直肠超声 (TRUS) 引导前列腺穿刺模拟器的实时切面重建与轮廓提取流水线,
//! 以及离线的表面重建与精度评估工具.
//!
//! 该 crate 目前仅提供 `safe` 接口.
//!
//! # 数据流
//!
//! 位姿流 → 切面重采样 → 帧预处理 → 分割模型 → 轮廓提取 → 基准点累积
//! → (按需) 表面重建 → (离线) 精度评估.
//!
//! # 注意
//!
//! 1. 所有坐标系变换都通过显式的 [`FrameGraph`] 组合, 不存在全局场景.
//! 2. 位姿是不可变值. 每一次流水线都返回新的值, 不在调用之间复用中间状态.
//! 3. 在非期望情况下, 函数返回错误而不是 panic. 少数标注了 "越界时 panic"
//!   的低层访问函数例外.
//!
//! # 模块
//!
//! ### 位姿与坐标系图 ✅
//!
//! 实现位于 `trus-berry/src/pose`.
//!
//! ### 参考体数据, 强度窗口, 扇形掩膜与切面重采样 ✅
//!
//! 实现位于 `trus-berry/src/data`.
//!
//! ### 帧预处理 (填充, 标准化, 双线性缩放) ✅
//!
//! 实现位于 `trus-berry/src/preprocess.rs`.
//!
//! ### 轮廓提取与反投影 ✅
//!
//! 最大 4-连通前景区域, 8-邻域 Moore 边界追踪, 按步长降采样.
//!
//! 实现位于 `trus-berry/src/contour`.
//!
//! ### 基准点累积 (可撤销) ✅
//!
//! 实现位于 `trus-berry/src/fiducial.rs`.
//!
//! ### 表面重建 ✅
//!
//! kNN PCA 法向估计, 最小生成树法向定向, 泊松方程 (共轭梯度) 隐式求解, surface nets 等值面提取.
//!
//! 实现位于 `trus-berry/src/surface`.
//!
//! ### 精度评估 ✅
//!
//! 网格体素化, 混淆矩阵, Dice 等指标, 指标 CSV.
//!
//! 实现位于 `trus-berry/src/eval`.
//!
//! ### 试验记录与持久化, 问卷 ✅
//!
//! 实现位于 `trus-berry/src/trial`.
//!
//! ### 位姿流与实时重建流水线 ✅
//!
//! "最新值优先" 的位姿推送, 订阅句柄在 `stop()` 或 drop 时取消订阅.
//!
//! 实现位于 `trus-berry/src/pipeline`.
//!
//! ### 会话, 穿刺, 病例与结果目录 ✅
//!
//! 实现位于 `trus-berry/src/session.rs`, `trus-berry/src/biopsy.rs` 与 `trus-berry/src/dataset`.

/// 二维索引 `(h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx2d = (usize, usize);

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 三维空间点 / 向量, 以毫米为单位, 顺序为 `[x, y, z]`.
pub type Point3 = [f64; 3];

type Area2d = Vec<Idx2d>;
type Areas2d = Vec<Area2d>;
type Predicate = fn(u8) -> bool;

pub mod biopsy;
pub mod config;
pub mod consts;
pub mod contour;
pub mod data;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod fiducial;
pub mod mesh;
pub mod oracle;
pub mod pipeline;
pub mod pose;
pub mod prelude;
pub mod preprocess;
pub mod session;
pub mod surface;
pub mod trial;

pub use config::SimConfig;
pub use data::{Grid3d, IntensityWindow, RefVolume};
pub use fiducial::FiducialSet;
pub use mesh::TriMesh;
pub use pose::{FrameGraph, Pose};
