//! 对 `trus-berry::dataset` 的更一层封装. 提供更直接的目录和病例加载器.

use std::path::{Path, PathBuf};
use trus_berry::dataset::{self, CaseLoader};

/// 获取试验结果基本路径.
///
/// 1. 若环境变量 `$TRUS_RESULTS_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/trus/results`.
pub fn results_dir_from_env_or_home() -> PathBuf {
    trus_berry::config::results_dir_from_env_or_home().expect("cannot locate home directory")
}

/// 获取病例基本路径.
///
/// 1. 若环境变量 `$TRUS_CASES_DIR` 非空, 则返回其值;
/// 2. 否则, 返回 `$HOME/dataset/trus/cases`.
pub fn cases_dir_from_env_or_home() -> PathBuf {
    trus_berry::config::cases_dir_from_env_or_home().expect("cannot locate home directory")
}

/// 获取 `path` 下给定编号的病例加载器.
#[inline]
pub fn case_loader<I: IntoIterator<Item = u32>, P: AsRef<Path>>(indices: I, path: P) -> CaseLoader {
    dataset::case_loader(indices, path)
}
