//! GROUP records

use super::parse_opt;
use crate::protocol::Result;
use serde::{Deserialize, Serialize};

/// A release group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseGroup {
    pub gid: u64,
    pub rating: Option<u32>,
    pub votes: Option<u32>,
    pub anime_count: Option<u32>,
    pub file_count: Option<u32>,
    pub name: String,
    pub short_name: String,
    pub url: Option<String>,
}

impl ReleaseGroup {
    /// Build from a 250 GROUP data line:
    /// `gid|rating|votes|acount|fcount|name|short|irc channel|irc server|url|...`
    pub fn from_fields(fields: &[String]) -> Result<Self> {
        Ok(Self {
            gid: super::parse_required(fields, 0, "gid")?,
            rating: parse_opt(fields.get(1)),
            votes: parse_opt(fields.get(2)),
            anime_count: parse_opt(fields.get(3)),
            file_count: parse_opt(fields.get(4)),
            name: fields.get(5).cloned().unwrap_or_default(),
            short_name: fields.get(6).cloned().unwrap_or_default(),
            url: fields.get(9).filter(|url| !url.is_empty()).cloned(),
        })
    }
}
