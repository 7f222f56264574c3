//! EPISODE records

use super::parse_opt;
use crate::protocol::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    pub eid: u64,
    pub aid: u64,
    pub length_mins: Option<u32>,
    pub rating: Option<u32>,
    pub votes: Option<u32>,
    pub number: String,
    pub title_english: Option<String>,
    pub title_romaji: Option<String>,
    pub title_kanji: Option<String>,
    /// Unix timestamp of the first air date
    pub aired: Option<i64>,
}

impl EpisodeRecord {
    /// Build from a 240 EPISODE data line:
    /// `eid|aid|length|rating|votes|epno|eng|romaji|kanji|aired|type`
    pub fn from_fields(fields: &[String]) -> Result<Self> {
        let text = |index: usize| {
            fields
                .get(index)
                .filter(|value| !value.is_empty())
                .cloned()
        };

        Ok(Self {
            eid: super::parse_required(fields, 0, "eid")?,
            aid: super::parse_required(fields, 1, "aid")?,
            length_mins: parse_opt(fields.get(2)),
            rating: parse_opt(fields.get(3)),
            votes: parse_opt(fields.get(4)),
            number: fields.get(5).cloned().unwrap_or_default(),
            title_english: text(6),
            title_romaji: text(7),
            title_kanji: text(8),
            aired: parse_opt(fields.get(9)).filter(|aired| *aired != 0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_episode_fields() {
        let raw: Vec<String> = "69260|4896|25|700|12|1|The Land of Visible Pain||||0"
            .split('|')
            .map(str::to_string)
            .collect();
        let episode = EpisodeRecord::from_fields(&raw).unwrap();
        assert_eq!(episode.eid, 69260);
        assert_eq!(episode.number, "1");
        assert_eq!(episode.title_english.as_deref(), Some("The Land of Visible Pain"));
        assert_eq!(episode.title_romaji, None);
        assert_eq!(episode.aired, None);
    }
}
