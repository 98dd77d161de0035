//! Roster payload parsing
//!
//! The roster endpoint returns comma-separated rows in ISO-8859-1:
//!
//! ```text
//! Clanmate, Clan Rank, Total XP, Kills
//! Zezima,Owner,1234567,12
//! Iron\xa0Bob,Recruit,500,0,2021-03-04
//! ```
//!
//! Rows that cannot be read are dropped; nothing here fails the whole fetch.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};

use super::RosterMember;

/// Date formats tried, in order, for the optional join date column
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%d/%m/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Decode an ISO-8859-1 payload
///
/// Every Latin-1 byte is the code point of the same value, so the decode can
/// never fail.
pub fn decode_latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Parse a roster payload into members, skipping unreadable rows
pub fn parse_roster(text: &str) -> Vec<RosterMember> {
    text.lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_row)
        .collect()
}

fn parse_row(line: &str) -> Option<RosterMember> {
    let cells: Vec<&str> = line.split(',').collect();
    if cells.len() < 4 {
        return None;
    }

    let display_name = cells[0].trim();
    let rank = cells[1].trim();
    if display_name.is_empty() || rank.is_empty() {
        return None;
    }

    // Header rows and corrupt lines fail here
    let activity_score = cells[2].trim().parse::<i64>().ok()?;
    let secondary_score = cells[3].trim().parse::<i64>().ok()?;

    let join_date = cells.get(4).and_then(|raw| parse_join_date(raw));

    Some(RosterMember {
        display_name: display_name.to_string(),
        rank: rank.to_string(),
        activity_score,
        secondary_score,
        join_date,
    })
}

/// Parse a join date in any of the known formats, `None` if none fits
pub fn parse_join_date(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date.and_hms_opt(0, 0, 0).map(|dt| Utc.from_utc_datetime(&dt));
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|dt| Utc.from_utc_datetime(&dt))
}
