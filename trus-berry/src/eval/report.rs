//! 指标 CSV.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::error::TrialResult;
use crate::eval::Score;
use crate::trial::{csv_field, TrialKey};

/// 指标 CSV 表头.
pub const METRICS_HEADER: &str = "Participant,Volume,Trial,TruePositive,TrueNegative,FalsePositive,FalseNegative,Recall,Specificity,Precision,DiceScore";

/// 指标 CSV 的一行.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricsRow {
    /// 试验标识.
    pub key: TrialKey,
    /// 评估结果.
    pub score: Score,
}

impl MetricsRow {
    /// 不含换行的 CSV 行. 未定义的比率写为 `NaN`.
    pub fn to_csv(&self) -> String {
        #[inline]
        fn ratio(v: Option<f64>) -> String {
            match v {
                Some(v) => format!("{v:.6}"),
                None => "NaN".to_string(),
            }
        }

        let c = &self.score.confusion;
        format!(
            "{},{},{},{},{},{},{},{},{},{},{}",
            csv_field(&self.key.participant),
            self.key.volume,
            self.key.trial,
            c.tp,
            c.tn,
            c.fp,
            c.fn_,
            ratio(self.score.recall),
            ratio(self.score.specificity),
            ratio(self.score.precision),
            ratio(self.score.dice)
        )
    }
}

/// 以追加方式写入指标 CSV. 文件不存在或为空时先写表头.
pub fn append_metrics(path: &Path, rows: &[MetricsRow]) -> TrialResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    if f.metadata()?.len() == 0 {
        writeln!(f, "{METRICS_HEADER}")?;
    }
    for row in rows {
        writeln!(f, "{}", row.to_csv())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::Confusion;

    #[test]
    fn test_rows() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("A").join("metrics.csv");
        let defined = MetricsRow {
            key: TrialKey::new("A", 1, 2),
            score: Score::from(Confusion {
                tp: 1,
                tn: 2,
                fp: 1,
                fn_: 0,
            }),
        };
        let undefined = MetricsRow {
            key: TrialKey::new("A", 1, 3),
            score: Score::from(Confusion {
                tp: 0,
                tn: 8,
                fp: 0,
                fn_: 0,
            }),
        };
        append_metrics(&path, &[defined]).unwrap();
        append_metrics(&path, &[undefined]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], METRICS_HEADER);
        assert_eq!(
            lines[1],
            "A,1,2,1,2,1,0,1.000000,0.666667,0.500000,0.666667"
        );
        assert_eq!(lines[2], "A,1,3,0,8,0,0,NaN,1.000000,NaN,NaN");
    }
}
