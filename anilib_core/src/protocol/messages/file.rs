//! FILE records

use super::parse_opt;
use crate::protocol::Result;
use serde::{Deserialize, Serialize};

/// File mask requested by FILE lookups
pub const FMASK: &str = "78C8FEF8";
/// Anime mask requested by FILE lookups
pub const AMASK: &str = "00E03000";

/// Number of fields the file mask produces before the anime names
const FILE_FIELD_COUNT: usize = 20;

/// A file as registered in the catalog
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub fid: u64,
    pub aid: u64,
    pub eid: Option<u64>,
    pub gid: Option<u64>,
    pub state: Option<u16>,
    pub size: Option<u64>,
    pub ed2k: Option<String>,
    pub crc32: Option<String>,
    pub quality: Option<String>,
    pub source: Option<String>,
    pub length_secs: Option<u32>,
    pub anime_romaji: Option<String>,
    pub anime_kanji: Option<String>,
    pub anime_english: Option<String>,
    pub episode_romaji: Option<String>,
    pub episode_kanji: Option<String>,
}

impl FileRecord {
    /// Build a record from the fields of a 220 FILE response
    pub fn from_fields(fields: &[String]) -> Result<Self> {
        let text = |index: usize| {
            fields
                .get(index)
                .filter(|value| !value.is_empty())
                .cloned()
        };

        Ok(Self {
            fid: super::parse_required(fields, 0, "fid")?,
            aid: super::parse_required(fields, 1, "aid")?,
            eid: parse_opt(fields.get(2)),
            gid: parse_opt(fields.get(3)).filter(|gid| *gid != 0),
            state: parse_opt(fields.get(4)),
            size: parse_opt(fields.get(5)),
            ed2k: text(6),
            crc32: text(7),
            quality: text(8),
            source: text(9),
            length_secs: parse_opt(fields.get(17)),
            anime_romaji: text(FILE_FIELD_COUNT),
            anime_kanji: text(FILE_FIELD_COUNT + 1),
            anime_english: text(FILE_FIELD_COUNT + 2),
            episode_romaji: text(FILE_FIELD_COUNT + 3),
            episode_kanji: text(FILE_FIELD_COUNT + 4),
        })
    }

    /// Best available title for display
    pub fn title(&self) -> Option<&str> {
        self.anime_english
            .as_deref()
            .or(self.anime_romaji.as_deref())
            .or(self.anime_kanji.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(line: &str) -> Vec<String> {
        line.split('|').map(str::to_string).collect()
    }

    #[test]
    fn test_full_record() {
        let mut raw = fields("312498|4896|69260|4243|1|233647104|abc|deadbeef|high|TV");
        raw.resize(FILE_FIELD_COUNT, String::new());
        raw[17] = "1440".into();
        raw.extend(fields("Kino no Tabi|キノの旅|Kino's Journey|Ep1|"));

        let record = FileRecord::from_fields(&raw).unwrap();
        assert_eq!(record.fid, 312498);
        assert_eq!(record.aid, 4896);
        assert_eq!(record.gid, Some(4243));
        assert_eq!(record.size, Some(233647104));
        assert_eq!(record.length_secs, Some(1440));
        assert_eq!(record.title(), Some("Kino's Journey"));
        assert_eq!(record.episode_kanji, None);
    }

    #[test]
    fn test_short_record() {
        let record = FileRecord::from_fields(&fields("1|2|3|0")).unwrap();
        assert_eq!(record.eid, Some(3));
        assert_eq!(record.gid, None);
        assert_eq!(record.title(), None);
    }

    #[test]
    fn test_missing_ids() {
        assert!(FileRecord::from_fields(&fields("x|2")).is_err());
        assert!(FileRecord::from_fields(&fields("1")).is_err());
    }
}
