//! 🍇欢迎光临🍓
//!
//! 涵盖了本 crate 一系列常用的功能.

pub use crate::{Idx2d, Idx3d, Point3};

pub use crate::config::{cases_dir_from_env_or_home, results_dir_from_env_or_home, SimConfig};
pub use crate::data::{FanMask, Grid3d, IntensityWindow, RefVolume, ResliceSpec};
pub use crate::dataset::{case_loader, discover_cases, walk_results, Case, TrialDir};
pub use crate::eval::{append_metrics, score, score_batch, MetricsRow, ReferenceGrid, Score, ScoreJob};
pub use crate::fiducial::FiducialSet;
pub use crate::mesh::{read_stl, write_stl, TriMesh};
pub use crate::oracle::{SegmentationOracle, ThresholdOracle};
pub use crate::pipeline::{start_reconstruction, PoseStream, ReconstructionPipeline};
pub use crate::pose::{FrameGraph, Pose};
pub use crate::session::Session;
pub use crate::surface::{reconstruct, reconstruct_with, SurfaceParams};
pub use crate::trial::{load_fiducials, load_mesh, save_trial, SurveyResponse, TrialKey, TrialRecord};
