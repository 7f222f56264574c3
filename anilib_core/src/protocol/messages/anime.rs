//! Anime-level records: calendar, updates and votes

use super::parse_opt;
use crate::protocol::Result;
use serde::{Deserialize, Serialize};

/// Upcoming or recently started anime, from a 297 CALENDAR line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEntry {
    pub aid: u64,
    /// Unix timestamp of the start date
    pub start: Option<i64>,
    pub date_flags: Option<u32>,
}

impl CalendarEntry {
    pub fn from_fields(fields: &[String]) -> Result<Self> {
        Ok(Self {
            aid: super::parse_required(fields, 0, "aid")?,
            start: parse_opt(fields.get(1)),
            date_flags: parse_opt(fields.get(2)),
        })
    }
}

/// Response of UPDATED: the anime ids changed since a timestamp
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdatedAnime {
    pub count: u32,
    /// Unix timestamp of the latest update
    pub last_update: Option<i64>,
    pub aids: Vec<u64>,
}

impl UpdatedAnime {
    /// Build from a 243 UPDATED line: `entity|total|last update|aid,aid,...`
    pub fn from_fields(fields: &[String]) -> Result<Self> {
        let aids = fields
            .get(3)
            .map(|list| {
                list.split(',')
                    .filter_map(|aid| aid.trim().parse().ok())
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            count: super::parse_required(fields, 1, "total")?,
            last_update: parse_opt(fields.get(2)),
            aids,
        })
    }
}

/// What a vote is cast on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteKind {
    Anime,
    AnimeTemporary,
    Group,
}

impl VoteKind {
    pub fn code(self) -> u8 {
        match self {
            VoteKind::Anime => 1,
            VoteKind::AnimeTemporary => 2,
            VoteKind::Group => 3,
        }
    }
}

/// Result of VOTE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VoteOutcome {
    /// 260
    Voted { name: String, value: u16 },
    /// 261
    Revoked { name: String },
    /// 262
    Updated { name: String, value: u16 },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(line: &str) -> Vec<String> {
        line.split('|').map(str::to_string).collect()
    }

    #[test]
    fn test_calendar_entry() {
        let entry = CalendarEntry::from_fields(&fields("4896|1700000000|0")).unwrap();
        assert_eq!(entry.aid, 4896);
        assert_eq!(entry.start, Some(1_700_000_000));
    }

    #[test]
    fn test_updated() {
        let updated = UpdatedAnime::from_fields(&fields("1|3|1700000000|10,20,30")).unwrap();
        assert_eq!(updated.count, 3);
        assert_eq!(updated.aids, vec![10, 20, 30]);

        let empty = UpdatedAnime::from_fields(&fields("1|0|")).unwrap();
        assert!(empty.aids.is_empty());
    }

    #[test]
    fn test_vote_codes() {
        assert_eq!(VoteKind::Anime.code(), 1);
        assert_eq!(VoteKind::Group.code(), 3);
    }
}
