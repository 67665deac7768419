//! 试验后问卷 (6 道 Likert 题).

use std::borrow::Cow;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::time::SystemTime;

use crate::error::{TrialError, TrialResult};
use crate::trial::clock::format_utc;

/// 问卷 CSV 表头.
pub const SURVEY_HEADER: &str = "Timestamp,Participant,Q1,Q2,Q3,Q4,Q5,Q6";

/// 一份问卷答复. 每题取值 `1..=5`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SurveyResponse {
    participant: String,
    answers: [u8; 6],
}

impl SurveyResponse {
    /// 构建答复. 任何一题越界时返回 `Err(TrialError::InvalidLikert)`.
    pub fn new(participant: impl Into<String>, answers: [u8; 6]) -> TrialResult<Self> {
        if let Some(bad) = answers.iter().find(|a| !(1..=5).contains(*a)) {
            return Err(TrialError::InvalidLikert(*bad));
        }
        Ok(Self {
            participant: participant.into(),
            answers,
        })
    }

    /// 参与者.
    #[inline]
    pub fn participant(&self) -> &str {
        &self.participant
    }

    /// 六道题的答案.
    #[inline]
    pub fn answers(&self) -> [u8; 6] {
        self.answers
    }
}

/// CSV 字段转义: 含逗号, 引号或换行时加引号.
pub(crate) fn csv_field(s: &str) -> Cow<'_, str> {
    if s.contains([',', '"', '\n', '\r']) {
        Cow::Owned(format!("\"{}\"", s.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(s)
    }
}

/// 以追加方式写入问卷 CSV. 文件不存在或为空时先写表头.
pub fn append_survey(path: &Path, response: &SurveyResponse, at: SystemTime) -> TrialResult<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut f = OpenOptions::new().create(true).append(true).open(path)?;
    if f.metadata()?.len() == 0 {
        writeln!(f, "{SURVEY_HEADER}")?;
    }
    let answers: Vec<String> = response.answers.iter().map(u8::to_string).collect();
    writeln!(
        f,
        "{},{},{}",
        format_utc(at),
        csv_field(&response.participant),
        answers.join(",")
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn test_likert_range() {
        assert!(SurveyResponse::new("A", [1, 2, 3, 4, 5, 5]).is_ok());
        assert!(matches!(
            SurveyResponse::new("A", [1, 2, 0, 4, 5, 5]),
            Err(TrialError::InvalidLikert(0))
        ));
        assert!(matches!(
            SurveyResponse::new("A", [6, 2, 3, 4, 5, 5]),
            Err(TrialError::InvalidLikert(6))
        ));
    }

    #[test]
    fn test_append_writes_header_once() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested").join("survey.csv");
        let t = UNIX_EPOCH + Duration::from_secs(60);
        append_survey(&path, &SurveyResponse::new("A", [1, 2, 3, 4, 5, 1]).unwrap(), t).unwrap();
        append_survey(&path, &SurveyResponse::new("B,C", [5; 6]).unwrap(), t).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], SURVEY_HEADER);
        assert_eq!(lines[1], "1970-01-01 00:01:00,A,1,2,3,4,5,1");
        assert_eq!(lines[2], "1970-01-01 00:01:00,\"B,C\",5,5,5,5,5,5");
    }
}
