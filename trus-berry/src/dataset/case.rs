//! 病例加载器.
//!
//! 病例目录布局:
//!
//! ```text
//! {cases}/Patient_{N}/
//!     TRUS.nii.gz 或 TRUS.nii    参考体数据
//!     TRUSToCylinder.txt         (可选) 4x4 行优先配准变换
//!     GroundTruth.stl            (可选) 体数据局部坐标系下的真值网格
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use crate::consts::files::{CASE_DIR_PREFIX, GROUND_TRUTH, PLACEMENT, VOLUME, VOLUME_RAW};
use crate::data::RefVolume;
use crate::error::{TrialError, TrialResult};
use crate::mesh::{read_stl, TriMesh};
use crate::pose::Pose;

/// 一个病例.
#[derive(Debug, Clone)]
pub struct Case {
    /// 病例编号 `N`.
    pub index: u32,
    /// 参考体数据. 放置位姿已设置为 `placement`.
    pub volume: RefVolume,
    /// TRUS 到圆柱体模的配准变换. 文件缺失时为恒等变换.
    pub placement: Pose,
    /// 体数据局部坐标系下的真值网格.
    pub ground_truth: Option<TriMesh>,
}

/// 病例目录 `{cases}/Patient_{index}`.
#[inline]
pub fn case_dir(cases: &Path, index: u32) -> PathBuf {
    cases.join(format!("{CASE_DIR_PREFIX}{index}"))
}

/// 读取 4x4 行优先的文本变换.
pub fn read_placement(path: &Path) -> TrialResult<Pose> {
    let text = fs::read_to_string(path)?;
    Pose::parse_text(&text).ok_or_else(|| TrialError::Malformed {
        path: path.display().to_string(),
        reason: "expected 16 whitespace separated numbers".to_string(),
    })
}

impl Case {
    /// 打开病例目录 `dir`.
    ///
    /// 优先读取 `TRUS.nii.gz`, 不存在时读取 `TRUS.nii`. 配准变换和真值网格缺失时不视为错误.
    pub fn open(index: u32, dir: &Path) -> TrialResult<Self> {
        let compressed = dir.join(VOLUME);
        let volume_path = if compressed.is_file() {
            compressed
        } else {
            dir.join(VOLUME_RAW)
        };
        let volume = RefVolume::open(&volume_path)?;

        let placement_path = dir.join(PLACEMENT);
        let placement = if placement_path.is_file() {
            read_placement(&placement_path)?
        } else {
            log::debug!("case {index}: no {PLACEMENT}, using identity");
            Pose::IDENTITY
        };

        let gt_path = dir.join(GROUND_TRUTH);
        let ground_truth = if gt_path.is_file() {
            Some(read_stl(&gt_path)?)
        } else {
            None
        };

        log::info!(
            "case {index}: volume {:?}, ground truth {}",
            volume.data().dim(),
            if ground_truth.is_some() { "present" } else { "missing" }
        );
        Ok(Self {
            index,
            volume: volume.with_placement(placement),
            placement,
            ground_truth,
        })
    }

    /// 变换到世界坐标系的真值网格.
    #[inline]
    pub fn ground_truth_world(&self) -> Option<TriMesh> {
        self.ground_truth.as_ref().map(|m| m.transformed(&self.placement))
    }
}

/// 列出 `cases` 下所有 `Patient_{N}` 目录的编号, 升序排列.
pub fn discover_cases(cases: &Path) -> TrialResult<Vec<u32>> {
    let mut ans = vec![];
    for entry in fs::read_dir(cases)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name();
        let idx = name
            .to_str()
            .and_then(|n| n.strip_prefix(CASE_DIR_PREFIX))
            .and_then(|n| n.parse().ok());
        if let Some(idx) = idx {
            ans.push(idx);
        }
    }
    ans.sort_unstable();
    Ok(ans)
}

/// 从病例编号和病例根目录创建加载器.
///
/// # 注意
///
/// 病例按 `indices` 的顺序惰性加载. 缺失或损坏的病例在迭代时返回 `Err`, 不影响后续病例.
pub fn case_loader<I: IntoIterator<Item = u32>, P: AsRef<Path>>(indices: I, cases: P) -> CaseLoader {
    let mut data: Vec<u32> = indices.into_iter().collect();
    data.reverse();
    CaseLoader {
        path: cases.as_ref().to_owned(),
        data_rev: data,
    }
}

/// 病例加载器.
#[derive(Debug)]
pub struct CaseLoader {
    path: PathBuf,
    data_rev: Vec<u32>,
}

impl Iterator for CaseLoader {
    type Item = (u32, TrialResult<Case>);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.data_rev.pop()?;
        Some((idx, Case::open(idx, &case_dir(&self.path, idx))))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.data_rev.len(), Some(self.data_rev.len()))
    }
}

impl ExactSizeIterator for CaseLoader {
    #[inline]
    fn len(&self) -> usize {
        self.data_rev.len()
    }
}
