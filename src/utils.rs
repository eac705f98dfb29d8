use chrono::{Datelike, Timelike};

use crate::network::{Minutes, UnixTime};

pub const fn const_unwrap<T: Copy>(x: Option<T>) -> T {
    if let Some(x) = x { x } else { panic!("Failed to const unwrap.") }
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid time {0:?}, expected HH:MM or HH:MM:SS.")]
pub struct TimeParseError(pub String);

fn parse_time_impl(h: &str, m: &str) -> Result<Minutes, std::num::ParseIntError> {
    let hours: Minutes = h.parse()?;
    let minutes: Minutes = m.parse()?;
    Ok(hours * 60 + minutes)
}

/// Parses `HH:MM` or `HH:MM:SS` into minutes after midnight. Hours may exceed 23 for
/// events after midnight of the service day. Seconds are dropped.
pub fn parse_time(s: &str) -> Result<Minutes, TimeParseError> {
    let parts: Vec<&str> = s.split(':').collect();
    if !(2..=3).contains(&parts.len()) || parts[1].len() != 2 || parts.get(2).is_some_and(|sec| sec.len() != 2) {
        return Err(TimeParseError(s.to_owned()));
    }
    if let Some(sec) = parts.get(2) {
        sec.parse::<u8>().map_err(|_| TimeParseError(s.to_owned()))?;
    }

    let (hour, min) = (parts[0], parts[1]);
    match parse_time_impl(hour, min) {
        Ok(minutes) if min < "60" && hour.len() <= 2 => Ok(minutes),
        _ => Err(TimeParseError(s.to_owned())),
    }
}

pub fn get_time_str(time: Minutes) -> String {
    let hours = time / 60;
    let minutes = time % 60;
    format!("{:02}:{:02}", hours, minutes)
}

pub fn get_datetime_str(time: UnixTime) -> String {
    format!(
        "{:04}-{:02}-{:02} {:02}:{:02}",
        time.year(),
        time.month(),
        time.day(),
        time.hour(),
        time.minute()
    )
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    #[test]
    fn parses_times() {
        assert_eq!(parse_time("05:31"), Ok(331));
        assert_eq!(parse_time("8:30:00"), Ok(510));
        assert_eq!(parse_time("25:10"), Ok(1510));
        assert!(parse_time("12").is_err());
        assert!(parse_time("12:5").is_err());
        assert!(parse_time("12:75").is_err());
        assert!(parse_time("ab:00").is_err());
        assert!(parse_time("12:00:xx").is_err());
    }

    #[test]
    fn formats_times() {
        assert_eq!(get_time_str(331), "05:31");
        assert_eq!(get_time_str(1510), "25:10");
        let time = NaiveDate::from_ymd_opt(2019, 5, 2).unwrap().and_hms_opt(7, 5, 0).unwrap();
        assert_eq!(get_datetime_str(time), "2019-05-02 07:05");
    }
}
