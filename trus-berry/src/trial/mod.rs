//! 试验记录, 持久化与问卷.
//!
//! 一次试验由 `(参与者, 体数据编号, 试验编号)` 标识, 拥有一个基准点集合和至多一个重建网格.
//! 试验结束时写入 `{results}/{participant}/{participant}_Volume_{v}_Trial_{t}/`, 随后从内存中丢弃.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime};

use crate::fiducial::FiducialSet;
use crate::mesh::TriMesh;
use crate::pose::Pose;

pub mod clock;
mod save;
mod survey;

pub use save::{load_fiducials, load_mesh, save_trial};
pub use survey::{append_survey, SurveyResponse, SURVEY_HEADER};
pub(crate) use survey::csv_field;

/// 试验标识.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrialKey {
    /// 参与者标识. 可以包含下划线.
    pub participant: String,
    /// 体数据 (病例) 编号.
    pub volume: u32,
    /// 试验编号.
    pub trial: u32,
}

impl fmt::Display for TrialKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_Volume_{}_Trial_{}", self.participant, self.volume, self.trial)
    }
}

impl TrialKey {
    /// 构建标识.
    #[inline]
    pub fn new(participant: impl Into<String>, volume: u32, trial: u32) -> Self {
        Self {
            participant: participant.into(),
            volume,
            trial,
        }
    }

    /// 试验目录名 `{participant}_Volume_{v}_Trial_{t}`.
    #[inline]
    pub fn dir_name(&self) -> String {
        self.to_string()
    }

    /// 试验目录 `{results}/{participant}/{dir_name}`.
    pub fn dir_in(&self, results: &Path) -> PathBuf {
        let mut p = results.join(&self.participant);
        p.push(self.dir_name());
        p
    }

    /// 解析试验目录名. 格式不符时返回 `None`.
    pub fn parse(name: &str) -> Option<Self> {
        let (head, trial) = name.rsplit_once("_Trial_")?;
        let (participant, volume) = head.rsplit_once("_Volume_")?;
        if participant.is_empty() {
            return None;
        }
        Some(Self {
            participant: participant.to_string(),
            volume: volume.parse().ok()?,
            trial: trial.parse().ok()?,
        })
    }
}

/// 一次已发射的穿刺记录: 坐标系名称 `BiopsyModelToReference_{n}` 及其位姿.
#[derive(Clone, Debug, PartialEq)]
pub struct BiopsyRecord {
    /// 坐标系名称.
    pub name: String,
    /// 穿刺针模型到参考坐标系的位姿.
    pub pose: Pose,
}

/// 在重建线程与调用方之间共享的基准点集合.
pub type SharedFiducials = Arc<Mutex<FiducialSet>>;

/// 进行中的试验.
///
/// # 注意
///
/// 1. 网格只在 [`TrialRecord::set_mesh`] 时生成一次. 此后基准点的任何修改都会使网格过期,
///   需要调用方重新生成.
/// 2. 基准点集合由互斥锁保护. 同一语句内不要两次调用 [`TrialRecord::fiducials`].
#[derive(Debug)]
pub struct TrialRecord {
    key: TrialKey,
    fiducials: SharedFiducials,
    /// 网格及其生成时基准点集合的修改计数.
    mesh: Option<(TriMesh, u64)>,
    started: SystemTime,
    biopsies: Vec<BiopsyRecord>,
}

impl TrialRecord {
    /// 以当前时刻开始的新试验.
    #[inline]
    pub fn new(key: TrialKey) -> Self {
        Self::started_at(key, SystemTime::now())
    }

    /// 以给定时刻开始的新试验.
    pub fn started_at(key: TrialKey, started: SystemTime) -> Self {
        Self {
            key,
            fiducials: Arc::default(),
            mesh: None,
            started,
            biopsies: vec![],
        }
    }

    /// 试验标识.
    #[inline]
    pub fn key(&self) -> &TrialKey {
        &self.key
    }

    /// 开始时刻.
    #[inline]
    pub fn started(&self) -> SystemTime {
        self.started
    }

    /// 到 `now` 为止的持续时间. 时钟回拨时为 0.
    #[inline]
    pub fn duration_until(&self, now: SystemTime) -> Duration {
        now.duration_since(self.started).unwrap_or_default()
    }

    /// 锁定基准点集合. 重建线程崩溃留下的污染锁照常使用.
    #[inline]
    pub fn fiducials(&self) -> MutexGuard<'_, FiducialSet> {
        self.fiducials.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 与重建流水线共享的句柄.
    #[inline]
    pub fn shared_fiducials(&self) -> SharedFiducials {
        Arc::clone(&self.fiducials)
    }

    /// `(轮廓个数, 点数)`.
    pub fn fiducial_counts(&self) -> (usize, usize) {
        let f = self.fiducials();
        (f.contour_count(), f.len())
    }

    /// 替换基准点集合.
    #[inline]
    pub fn set_fiducials(&mut self, fiducials: FiducialSet) {
        *self.fiducials() = fiducials;
    }

    /// 保存网格. `revision` 是读取生成网格所用的基准点时, 基准点集合的修改计数
    /// ([`FiducialSet::revision`]), 必须与那些点在同一次加锁中读取.
    #[inline]
    pub fn set_mesh(&mut self, mesh: TriMesh, revision: u64) {
        self.mesh = Some((mesh, revision));
    }

    /// 网格 (可能已过期).
    #[inline]
    pub fn mesh(&self) -> Option<&TriMesh> {
        self.mesh.as_ref().map(|(m, _)| m)
    }

    /// 网格生成后基准点是否被修改过? 没有网格时返回 `false`.
    #[inline]
    pub fn is_mesh_stale(&self) -> bool {
        self.mesh
            .as_ref()
            .is_some_and(|(_, rev)| *rev != self.fiducials().revision())
    }

    /// 已发射的穿刺记录.
    #[inline]
    pub fn biopsies(&self) -> &[BiopsyRecord] {
        &self.biopsies
    }

    /// 追加一次穿刺记录.
    #[inline]
    pub fn push_biopsy(&mut self, record: BiopsyRecord) {
        self.biopsies.push(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_round_trip() {
        let k = TrialKey::new("P_01", 3, 12);
        assert_eq!(k.dir_name(), "P_01_Volume_3_Trial_12");
        assert_eq!(TrialKey::parse(&k.dir_name()), Some(k.clone()));
        assert_eq!(
            k.dir_in(Path::new("/r")),
            Path::new("/r").join("P_01").join("P_01_Volume_3_Trial_12")
        );
    }

    #[test]
    fn test_key_rejects_garbage() {
        assert_eq!(TrialKey::parse("metrics.csv"), None);
        assert_eq!(TrialKey::parse("_Volume_1_Trial_2"), None);
        assert_eq!(TrialKey::parse("A_Volume_x_Trial_2"), None);
        assert_eq!(TrialKey::parse("A_Volume_1_Trial_"), None);
    }

    #[test]
    fn test_mesh_staleness() {
        let mut r = TrialRecord::new(TrialKey::new("A", 1, 1));
        assert!(!r.is_mesh_stale());
        r.fiducials().append_contour(&[[0.0; 3]]);
        let rev = r.fiducials().revision();
        r.set_mesh(TriMesh::default(), rev);
        assert!(!r.is_mesh_stale());
        r.fiducials().append_contour(&[[1.0; 3]]);
        assert!(r.is_mesh_stale());
        let rev = r.fiducials().revision();
        r.set_mesh(TriMesh::default(), rev);
        assert!(!r.is_mesh_stale());

        // 共享句柄上的修改同样使网格过期.
        r.shared_fiducials().lock().unwrap().undo_last_contour().unwrap();
        assert!(r.is_mesh_stale());
        assert_eq!(r.fiducial_counts(), (1, 1));
    }

    #[test]
    fn test_mesh_from_older_revision_is_stale() {
        let mut r = TrialRecord::new(TrialKey::new("A", 1, 1));
        r.fiducials().append_contour(&[[0.0; 3]]);
        let rev = r.fiducials().revision();
        // 网格生成期间, 另一线程追加了一条轮廓.
        let shared = r.shared_fiducials();
        std::thread::spawn(move || shared.lock().unwrap().append_contour(&[[1.0; 3]]))
            .join()
            .unwrap();
        r.set_mesh(TriMesh::default(), rev);
        assert!(r.is_mesh_stale());
    }

    #[test]
    fn test_duration() {
        let t0 = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let r = TrialRecord::started_at(TrialKey::new("A", 1, 1), t0);
        assert_eq!(r.duration_until(t0 + Duration::from_secs(5)), Duration::from_secs(5));
        assert_eq!(r.duration_until(SystemTime::UNIX_EPOCH), Duration::ZERO);
    }
}
