//! Request and response model for the UDP transport
//!
//! Requests are a command keyword plus `key=value` parameters. Responses are a
//! status line followed by `|`-separated data lines. Typed records for the
//! operations the handlers use live in the submodules.

pub mod anime;
pub mod episode;
pub mod file;
pub mod group;
pub mod mylist;
pub mod request;
pub mod response;

pub use anime::{CalendarEntry, UpdatedAnime, VoteKind, VoteOutcome};
pub use episode::EpisodeRecord;
pub use file::FileRecord;
pub use group::ReleaseGroup;
pub use mylist::{MyListAddOutcome, MyListState};
pub use request::Request;
pub use response::{LoginReply, RawResponse};

use serde::Serialize;

/// Parameter separator used in responses
pub const PARAM_SEPARATOR: char = '|';

/// Newline encoding for multiline values
pub const ENCODED_NEWLINE: &str = "<br />";

/// Result of a lookup that may legitimately find nothing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum Lookup<T> {
    Found(T),
    NoData,
}

impl<T> Lookup<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Lookup<U> {
        match self {
            Lookup::Found(value) => Lookup::Found(f(value)),
            Lookup::NoData => Lookup::NoData,
        }
    }

    /// Apply a fallible conversion to the found value
    pub fn try_map<U, E>(self, f: impl FnOnce(T) -> Result<U, E>) -> Result<Lookup<U>, E> {
        match self {
            Lookup::Found(value) => f(value).map(Lookup::Found),
            Lookup::NoData => Ok(Lookup::NoData),
        }
    }

    pub fn found(self) -> Option<T> {
        match self {
            Lookup::Found(value) => Some(value),
            Lookup::NoData => None,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Lookup::NoData)
    }
}

/// Encode a parameter value for transmission
///
/// Only `&` needs HTML entity encoding; newlines travel as `<br />` and
/// carriage returns are dropped.
pub fn encode_value(value: &str) -> String {
    let mut result = String::with_capacity(value.len() + 10);

    for ch in value.chars() {
        match ch {
            '&' => result.push_str("&amp;"),
            '\n' => result.push_str(ENCODED_NEWLINE),
            '\r' => continue,
            _ => result.push(ch),
        }
    }

    result
}

/// Decode a value from a response field
///
/// Reverses `&amp;` and `<br />`, and maps the registry's backtick quoting
/// back to an apostrophe.
pub fn decode_value(value: &str) -> String {
    value
        .replace("&amp;", "&")
        .replace(ENCODED_NEWLINE, "\n")
        .replace('`', "'")
}

/// Parse an optional numeric field, treating empty strings as absent
pub(crate) fn parse_opt<T: std::str::FromStr>(field: Option<&String>) -> Option<T> {
    field
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .and_then(|value| value.parse().ok())
}

/// Parse a required numeric field
pub(crate) fn parse_required<T: std::str::FromStr>(
    fields: &[String],
    index: usize,
    name: &str,
) -> crate::protocol::Result<T> {
    parse_opt(fields.get(index))
        .ok_or_else(|| crate::protocol::ProtocolError::missing_field(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_value() {
        assert_eq!(encode_value("simple"), "simple");
        assert_eq!(encode_value("with&ampersand"), "with&amp;ampersand");
        assert_eq!(
            encode_value("line1\r\nline2"),
            format!("line1{ENCODED_NEWLINE}line2")
        );
        assert_eq!(encode_value("user@example.com"), "user@example.com");
    }

    #[test]
    fn test_decode_value() {
        assert_eq!(decode_value("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(decode_value("a<br />b"), "a\nb");
        assert_eq!(decode_value("Kino`s Journey"), "Kino's Journey");
    }

    #[test]
    fn test_lookup_combinators() {
        let found: Lookup<u32> = Lookup::Found(2);
        assert_eq!(found.clone().map(|v| v * 2), Lookup::Found(4));
        assert_eq!(found.found(), Some(2));

        let none: Lookup<u32> = Lookup::NoData;
        assert!(none.is_no_data());
        let mapped: Result<Lookup<u32>, ()> = none.try_map(|_| Err(()));
        assert_eq!(mapped, Ok(Lookup::NoData));
    }

    #[test]
    fn test_parse_helpers() {
        let fields = vec!["12".to_string(), "".to_string(), "x".to_string()];
        assert_eq!(parse_required::<u64>(&fields, 0, "aid").unwrap(), 12);
        assert_eq!(parse_opt::<u64>(fields.get(1)), None);
        assert_eq!(parse_opt::<u64>(fields.get(2)), None);
        assert!(parse_required::<u64>(&fields, 5, "eid").is_err());
    }
}
