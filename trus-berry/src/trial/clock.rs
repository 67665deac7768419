//! UTC 时间戳格式化.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// 1970-01-01 起的天数 → `(年, 月, 日)`. 公历, 支持负数天.
fn civil_from_days(days: i64) -> (i64, u32, u32) {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z.rem_euclid(146_097);
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let d = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let m = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let y = yoe + era * 400 + i64::from(m <= 2);
    (y, m, d)
}

/// 以 `YYYY-MM-DD HH:MM:SS` (UTC) 格式化 Unix 秒数.
pub fn format_unix_secs(secs: i64) -> String {
    let days = secs.div_euclid(86_400);
    let rem = secs.rem_euclid(86_400);
    let (y, m, d) = civil_from_days(days);
    format!(
        "{y:04}-{m:02}-{d:02} {:02}:{:02}:{:02}",
        rem / 3600,
        rem % 3600 / 60,
        rem % 60
    )
}

/// 以 `YYYY-MM-DD HH:MM:SS` (UTC) 格式化时刻. 早于 1970 年的时刻同样支持.
pub fn format_utc(t: SystemTime) -> String {
    let secs = match t.duration_since(UNIX_EPOCH) {
        Ok(d) => d.as_secs() as i64,
        Err(e) => -(e.duration().as_secs_f64().ceil() as i64),
    };
    format_unix_secs(secs)
}

/// 以秒为单位, 保留一位小数.
#[inline]
pub fn format_secs(d: Duration) -> String {
    format!("{:.1}", d.as_secs_f64())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_dates() {
        assert_eq!(format_unix_secs(0), "1970-01-01 00:00:00");
        assert_eq!(format_unix_secs(951_782_400), "2000-02-29 00:00:00");
        assert_eq!(format_unix_secs(1_700_000_000), "2023-11-14 22:13:20");
        assert_eq!(format_unix_secs(-1), "1969-12-31 23:59:59");
    }

    #[test]
    fn test_system_time() {
        let t = UNIX_EPOCH + Duration::from_secs(86_400 + 3661);
        assert_eq!(format_utc(t), "1970-01-02 01:01:01");
        assert_eq!(format_secs(Duration::from_millis(12_340)), "12.3");
    }
}
