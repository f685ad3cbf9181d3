//! Day-of-year timestamps used as record keys by the ephemeris feed.

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::warn;

/// `2024-079T12:00:00.000Z`: year, day of year, time of day, UTC.
pub const EPOCH_FORMAT: &str = "%Y-%jT%H:%M:%S%.fZ";

const READABLE_FORMAT: &str = "%B %d, %Y at %I:%M:%S %p";

pub fn parse_epoch(epoch: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    NaiveDateTime::parse_from_str(epoch, EPOCH_FORMAT).map(|t| t.and_utc())
}

/// `March 19, 2024 at 12:00:00 PM`
pub fn readable(time: &DateTime<Utc>) -> String {
    time.format(READABLE_FORMAT).to_string()
}

/// Picks the epoch nearest to `at`. The first of equally distant epochs wins;
/// entries that do not parse are skipped.
pub fn closest<'a, I>(epochs: I, at: DateTime<Utc>) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a String>,
{
    epochs
        .into_iter()
        .filter_map(|epoch| match parse_epoch(epoch) {
            Ok(time) => Some((epoch, time)),
            Err(e) => {
                warn!(epoch = %epoch, "skipping unparseable epoch: {}", e);
                None
            }
        })
        .min_by_key(|(_, time)| (*time - at).num_milliseconds().unsigned_abs())
        .map(|(epoch, _)| epoch.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    fn epochs(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parses_day_of_year_format() {
        let t = parse_epoch("2024-079T12:30:15.250Z").unwrap();
        assert_eq!((t.year(), t.month(), t.day()), (2024, 3, 19));
        assert_eq!((t.hour(), t.minute(), t.second()), (12, 30, 15));
        assert_eq!(t.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn rejects_other_formats() {
        assert!(parse_epoch("2024-03-19T12:00:00Z").is_err());
        assert!(parse_epoch("invalid-epoch").is_err());
        assert!(parse_epoch("2023-366T00:00:00.000Z").is_err());
    }

    #[test]
    fn readable_rendering() {
        let t = parse_epoch("2024-079T13:05:00.000Z").unwrap();
        assert_eq!(readable(&t), "March 19, 2024 at 01:05:00 PM");
    }

    #[test]
    fn closest_picks_nearest() {
        let list = epochs(&["2024-079T12:00:00.000Z", "2024-079T13:00:00.000Z", "2024-079T14:00:00.000Z"]);
        let at = Utc.with_ymd_and_hms(2024, 3, 19, 13, 20, 0).unwrap();
        assert_eq!(closest(&list, at), Some("2024-079T13:00:00.000Z"));

        let far_future = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(closest(&list, far_future), Some("2024-079T14:00:00.000Z"));
    }

    #[test]
    fn closest_ties_go_to_first_occurrence() {
        let list = epochs(&["2024-079T12:00:00.000Z", "2024-079T13:00:00.000Z"]);
        let midpoint = Utc.with_ymd_and_hms(2024, 3, 19, 12, 30, 0).unwrap();
        assert_eq!(closest(&list, midpoint), Some("2024-079T12:00:00.000Z"));
    }

    #[test]
    fn closest_of_nothing_is_none() {
        let at = Utc::now();
        assert_eq!(closest(&Vec::new(), at), None);
        assert_eq!(closest(&epochs(&["garbage"]), at), None);
    }
}
