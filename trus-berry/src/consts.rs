//! 通用常量.

/// 单通道颜色与掩膜像素值.
pub mod gray {
    /// 掩膜中背景的像素值.
    pub const MASK_BACKGROUND: u8 = 0;

    /// 掩膜中前景 (前列腺) 的像素值.
    pub const MASK_FOREGROUND: u8 = 1;

    /// 单通道黑色.
    pub const BLACK: u8 = 0b_0000_0000;

    /// 单通道白色.
    pub const WHITE: u8 = 0b_1111_1111;

    /// 像素是否是前景?
    #[inline]
    pub const fn is_foreground(p: u8) -> bool {
        matches!(p, MASK_FOREGROUND)
    }

    /// 像素是否是背景?
    #[inline]
    pub const fn is_background(p: u8) -> bool {
        matches!(p, MASK_BACKGROUND)
    }
}

/// 分割模型训练时使用的填充画布大小 `(h, w)`.
pub const PADDED_CANVAS: (usize, usize) = (510, 788);

/// 分割模型的固定输入分辨率 `(h, w)`.
pub const MODEL_INPUT: (usize, usize) = (256, 256);

/// 概率图二值化阈值.
pub const MASK_THRESHOLD: f32 = 0.5;

/// 轮廓降采样的默认步长.
pub const CONTOUR_STRIDE: usize = 15;

/// 泊松重建的默认深度.
pub const POISSON_DEPTH: u32 = 5;

/// 泊松重建的默认宽度参数.
pub const POISSON_WIDTH: f64 = 5.0;

/// 法向估计使用的近邻数.
pub const NORMAL_KNN: usize = 10;

/// 法向定向 (最小生成树) 使用的近邻数.
pub const ORIENT_KNN: usize = 100;

/// 生成表面之前至少需要采集的轮廓数.
pub const MIN_CONTOURS: usize = 3;

/// 坐标系名称. 与模拟器场景中的变换层级一一对应.
pub mod frames {
    /// 根坐标系.
    pub const RAS: &str = "Ras";
    /// 参考 (追踪器) 坐标系.
    pub const REFERENCE: &str = "Reference";
    /// 盒状体模.
    pub const BOX_MODEL: &str = "BoxModel";
    /// 圆柱体模.
    pub const CYLINDER: &str = "Cylinder";
    /// TRUS 体数据. 病例配准变换挂在这里.
    pub const TRUS: &str = "Trus";
    /// 体模.
    pub const PHANTOM: &str = "Phantom";
    /// 探头.
    pub const PROBE: &str = "Probe";
    /// 探头尖端.
    pub const PROBE_TIP: &str = "ProbeTip";
    /// 探头模型.
    pub const PROBE_MODEL: &str = "ProbeModel";
    /// 超声扇形掩膜.
    pub const US_MASK: &str = "UsMask";
    /// 穿刺轨迹.
    pub const BIOPSY_TRAJECTORY: &str = "BiopsyTrajectory";
    /// 穿刺针模型. 其相对轨迹的 z 平移即为穿刺深度.
    pub const BIOPSY_MODEL: &str = "BiopsyModel";
    /// 被追踪的指针.
    pub const POINTER: &str = "Pointer";
    /// 指针尖端.
    pub const POINTER_TIP: &str = "PointerTip";

    /// 已发射穿刺针记录的坐标系名称前缀.
    pub const FIRED_BIOPSY_PREFIX: &str = "BiopsyModelToReference_";
}

/// 病例目录下的文件名.
pub mod files {
    /// 病例目录名前缀, 如 `Patient_3`.
    pub const CASE_DIR_PREFIX: &str = "Patient_";
    /// 参考体数据.
    pub const VOLUME: &str = "TRUS.nii.gz";
    /// 参考体数据 (未压缩).
    pub const VOLUME_RAW: &str = "TRUS.nii";
    /// TRUS 到圆柱体模的配准变换 (4x4 行优先文本).
    pub const PLACEMENT: &str = "TRUSToCylinder.txt";
    /// 真值网格.
    pub const GROUND_TRUTH: &str = "GroundTruth.stl";

    /// 基准点数组.
    pub const FIDUCIALS: &str = "fiducials.npy";
    /// 重建网格.
    pub const MESH: &str = "mesh.stl";
    /// 试验日志.
    pub const TRIAL_LOG: &str = "trial.txt";
    /// 场景快照.
    pub const SCENE: &str = "scene.txt";
    /// 每个参与者的指标 CSV.
    pub const METRICS: &str = "metrics.csv";
    /// 问卷 CSV.
    pub const SURVEY: &str = "survey.csv";
}
