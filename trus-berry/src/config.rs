//! 模拟器配置与数据目录.

use std::env;
use std::path::PathBuf;

use crate::consts::MIN_CONTOURS;
use crate::dataset::home_dataset_dir_with;
use crate::pipeline::PipelineParams;
use crate::surface::SurfaceParams;

/// 结果目录的环境变量.
pub const RESULTS_DIR_ENV: &str = "TRUS_RESULTS_DIR";

/// 病例目录的环境变量.
pub const CASES_DIR_ENV: &str = "TRUS_CASES_DIR";

/// 环境变量 `var` 非空时返回其值, 否则返回 `$HOME/dataset/trus/{leaf}`.
fn dir_from_env_or_home(var: &str, leaf: &str) -> Option<PathBuf> {
    match env::var_os(var) {
        Some(d) if !d.is_empty() => Some(PathBuf::from(d)),
        _ => home_dataset_dir_with(["trus", leaf]),
    }
}

/// 获取试验结果基本路径.
///
/// 1. 若环境变量 `$TRUS_RESULTS_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/trus/results`. 无法确定用户主目录时返回 `None`.
#[inline]
pub fn results_dir_from_env_or_home() -> Option<PathBuf> {
    dir_from_env_or_home(RESULTS_DIR_ENV, "results")
}

/// 获取病例基本路径.
///
/// 1. 若环境变量 `$TRUS_CASES_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/trus/cases`. 无法确定用户主目录时返回 `None`.
#[inline]
pub fn cases_dir_from_env_or_home() -> Option<PathBuf> {
    dir_from_env_or_home(CASES_DIR_ENV, "cases")
}

/// 模拟器配置. 默认值与模拟器出厂设置一致.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SimConfig {
    /// 实时重建流水线参数.
    pub pipeline: PipelineParams,
    /// 表面重建参数.
    pub surface: SurfaceParams,
    /// 生成表面之前至少需要的轮廓个数.
    pub min_contours: usize,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            pipeline: PipelineParams::default(),
            surface: SurfaceParams::default(),
            min_contours: MIN_CONTOURS,
        }
    }
}

#[cfg(feature = "serde")]
impl SimConfig {
    /// 以 `bincode` 编码写入 `path`.
    pub fn save<P: AsRef<std::path::Path>>(&self, path: P) -> crate::error::TrialResult<()> {
        let bytes = bincode::serialize(self)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// 读取由 [`SimConfig::save`] 写入的配置.
    pub fn load<P: AsRef<std::path::Path>>(path: P) -> crate::error::TrialResult<Self> {
        let bytes = std::fs::read(path)?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = SimConfig::default();
        assert_eq!(c.min_contours, 3);
        assert_eq!(c.surface.depth, 5);
        assert_eq!(c.pipeline.canvas.padded, (510, 788));
        assert_eq!(c.pipeline.canvas.model, (256, 256));
        assert_eq!(c.pipeline.reslice.dims, (400, 400));
        assert!(c.pipeline.fan.is_some());
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("sim.bin");
        let mut c = SimConfig::default();
        c.surface.depth = 6;
        c.pipeline.contour.stride = 12;
        c.pipeline.fan = None;
        c.save(&path).unwrap();
        assert_eq!(SimConfig::load(&path).unwrap(), c);

        std::fs::write(&path, b"\x01").unwrap();
        assert!(SimConfig::load(&path).is_err());
    }

    #[test]
    fn test_dirs_from_env() {
        // 只读取一个本测试独有的变量, 避免与其他测试竞争.
        let var = "TRUS_BERRY_TEST_ONLY_DIR";
        env::set_var(var, "/tmp/somewhere");
        assert_eq!(
            dir_from_env_or_home(var, "results"),
            Some(PathBuf::from("/tmp/somewhere"))
        );
        env::set_var(var, "");
        if let Some(p) = dir_from_env_or_home(var, "results") {
            assert!(p.ends_with("dataset/trus/results"));
        }
    }
}
