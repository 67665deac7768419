//! 评估结果汇总.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::time::Duration;

use trus_berry::prelude::*;

/// 均值. 没有已定义的值时为 `None`.
fn mean<I: IntoIterator<Item = Option<f64>>>(it: I) -> Option<f64> {
    let (sum, n) = it
        .into_iter()
        .flatten()
        .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

/// 将一个参与者的结果写进 `w` 中.
fn describe_into<W: Write>(participant: &str, rows: &[&MetricsRow], w: &mut W) -> io::Result<()> {
    const S4: &str = "    ";

    #[inline]
    fn f64_to_display(f: Option<f64>) -> String {
        match f {
            Some(f) => format!("{f:.6}"),
            None => "/".to_string(),
        }
    }

    writeln!(w, "Participant `{participant}`:")?;
    writeln!(w, "{S4}Scored trials: {}", rows.len())?;
    let avg = |f: fn(&Score) -> Option<f64>| f64_to_display(mean(rows.iter().map(|r| f(&r.score))));
    writeln!(w, "{S4}Average recall: {}", avg(|s| s.recall))?;
    writeln!(w, "{S4}Average specificity: {}", avg(|s| s.specificity))?;
    writeln!(w, "{S4}Average precision: {}", avg(|s| s.precision))?;
    write!(w, "{S4}Average dice: {}", avg(|s| s.dice))?;
    Ok(())
}

/// 离线评估的最终结果.
#[derive(Debug, Default)]
pub struct ScoringResult {
    rows: Vec<MetricsRow>,
    failed: Vec<(TrialKey, String)>,
    elapsed: Duration,
}

impl ScoringResult {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录一个成功评估的试验.
    #[inline]
    pub fn push(&mut self, row: MetricsRow) {
        self.rows.push(row);
    }

    /// 记录一个失败的试验.
    pub fn fail(&mut self, key: TrialKey, reason: String) {
        log::warn!("{key}: {reason}");
        self.failed.push((key, reason));
    }

    /// 记录总耗时.
    #[inline]
    pub fn finish(&mut self, elapsed: Duration) {
        self.elapsed = elapsed;
    }

    /// 打印分析结果.
    pub fn analyze(&self) {
        utils::sep();
        let mut groups: BTreeMap<&str, Vec<&MetricsRow>> = BTreeMap::new();
        for row in &self.rows {
            groups.entry(row.key.participant.as_str()).or_default().push(row);
        }

        let mut buf = Vec::with_capacity(512);
        for (participant, rows) in &groups {
            describe_into(participant, rows, &mut buf).unwrap();
            println!("{}", String::from_utf8_lossy(&buf));
            buf.clear();
            utils::sep();
        }

        for (key, reason) in &self.failed {
            println!("Failed `{key}`: {reason}");
        }
        println!(
            "{} scored, {} failed, {:.1} s",
            self.rows.len(),
            self.failed.len(),
            self.elapsed.as_secs_f64()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trus_berry::eval::Confusion;

    #[test]
    fn test_describe() {
        let row = |trial, tp| MetricsRow {
            key: TrialKey::new("A", 1, trial),
            score: Score::from(Confusion {
                tp,
                tn: 10,
                fp: 0,
                fn_: 2,
            }),
        };
        let (a, b) = (row(1, 2), row(2, 0));
        let mut buf = vec![];
        describe_into("A", &[&a, &b], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Scored trials: 2"));
        // recall: 0.5 与 0.0; precision: 1.0 与未定义.
        assert!(text.contains("Average recall: 0.250000"));
        assert!(text.contains("Average precision: 1.000000"));
    }

    #[test]
    fn test_mean() {
        assert_eq!(mean([None, None]), None);
        assert_eq!(mean([Some(1.0), None, Some(2.0)]), Some(1.5));
    }
}
