//! 试验结果目录的遍历.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::TrialResult;
use crate::trial::TrialKey;

/// 一个已保存的试验目录.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TrialDir {
    /// 由目录名解析得到的标识.
    pub key: TrialKey,
    /// 目录路径.
    pub path: PathBuf,
}

/// `dir` 下的所有子目录名, 跳过隐藏目录 (如保存过程中的临时目录).
fn visible_subdirs(dir: &Path) -> TrialResult<Vec<(String, PathBuf)>> {
    let mut ans = vec![];
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_string) else {
            continue;
        };
        if !name.starts_with('.') {
            ans.push((name, entry.path()));
        }
    }
    Ok(ans)
}

/// 列出参与者 `participant` 的所有试验目录, 按标识排序.
///
/// 名称不符合 `{participant}_Volume_{v}_Trial_{t}` 的目录被忽略.
pub fn trial_dirs(results: &Path, participant: &str) -> TrialResult<Vec<TrialDir>> {
    let mut ans: Vec<TrialDir> = visible_subdirs(&results.join(participant))?
        .into_iter()
        .filter_map(|(name, path)| match TrialKey::parse(&name) {
            Some(key) if key.participant == participant => Some(TrialDir { key, path }),
            _ => {
                log::debug!("skipping `{name}` under participant `{participant}`");
                None
            }
        })
        .collect();
    ans.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    Ok(ans)
}

/// 列出 `results` 下所有参与者的所有试验目录, 按标识排序.
pub fn walk_results(results: &Path) -> TrialResult<Vec<TrialDir>> {
    let mut ans = vec![];
    for (participant, _) in visible_subdirs(results)? {
        ans.extend(trial_dirs(results, &participant)?);
    }
    ans.sort_unstable_by(|a, b| a.key.cmp(&b.key));
    Ok(ans)
}
