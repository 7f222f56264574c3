//! Wire requests

use super::encode_value;
use std::fmt;

/// Parameters whose values never appear in logs
const MASKED_PARAMS: [&str; 2] = ["pass", "s"];

/// One request for the UDP transport
#[derive(Clone, PartialEq, Eq)]
pub struct Request {
    command: &'static str,
    params: Vec<(&'static str, String)>,
}

impl Request {
    pub fn new(command: &'static str) -> Self {
        Self {
            command,
            params: Vec::new(),
        }
    }

    /// Append a parameter
    pub fn param(mut self, key: &'static str, value: impl ToString) -> Self {
        self.params.push((key, value.to_string()));
        self
    }

    pub fn command(&self) -> &'static str {
        self.command
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Commands that are valid without a session
    pub fn requires_session(&self) -> bool {
        !matches!(self.command, "AUTH" | "PING" | "ENCODING" | "VERSION")
    }

    pub fn is_login(&self) -> bool {
        self.command == "AUTH"
    }

    pub fn is_ping(&self) -> bool {
        self.command == "PING"
    }

    /// Render the request line, appending the session token when given
    pub fn encode(&self, session: Option<&str>) -> String {
        self.render(session, false)
    }

    /// Render the request line with secrets replaced by `***`
    pub fn masked(&self, session: Option<&str>) -> String {
        self.render(session, true)
    }

    fn render(&self, session: Option<&str>, mask: bool) -> String {
        let mut parts: Vec<String> = self
            .params
            .iter()
            .map(|(key, value)| {
                if mask && MASKED_PARAMS.contains(key) {
                    format!("{key}=***")
                } else {
                    format!("{key}={}", encode_value(value))
                }
            })
            .collect();

        if let Some(session) = session.filter(|_| self.requires_session()) {
            if mask {
                parts.push("s=***".to_string());
            } else {
                parts.push(format!("s={session}"));
            }
        }

        if parts.is_empty() {
            self.command.to_string()
        } else {
            format!("{} {}", self.command, parts.join("&"))
        }
    }

    pub fn auth(username: &str, password: &str, client: &str, client_version: u32) -> Self {
        Self::new("AUTH")
            .param("user", username)
            .param("pass", password)
            .param("protover", crate::protocol::PROTOCOL_VERSION)
            .param("client", client)
            .param("clientver", client_version)
            .param("enc", "utf8")
    }

    pub fn logout() -> Self {
        Self::new("LOGOUT")
    }

    pub fn ping() -> Self {
        Self::new("PING").param("nat", 1)
    }

    pub fn file_by_hash(size: u64, ed2k: &str) -> Self {
        Self::new("FILE")
            .param("size", size)
            .param("ed2k", ed2k.to_lowercase())
            .param("fmask", super::file::FMASK)
            .param("amask", super::file::AMASK)
    }

    pub fn file_by_id(fid: u64) -> Self {
        Self::new("FILE")
            .param("fid", fid)
            .param("fmask", super::file::FMASK)
            .param("amask", super::file::AMASK)
    }

    pub fn mylist_add(size: u64, ed2k: &str, state: super::MyListState, watched: bool) -> Self {
        Self::new("MYLISTADD")
            .param("size", size)
            .param("ed2k", ed2k.to_lowercase())
            .param("state", state.code())
            .param("viewed", u8::from(watched))
            .param("edit", 0)
    }

    pub fn mylist_edit(size: u64, ed2k: &str, state: super::MyListState, watched: bool) -> Self {
        Self::new("MYLISTADD")
            .param("size", size)
            .param("ed2k", ed2k.to_lowercase())
            .param("state", state.code())
            .param("viewed", u8::from(watched))
            .param("edit", 1)
    }

    pub fn mylist_del(size: u64, ed2k: &str) -> Self {
        Self::new("MYLISTDEL")
            .param("size", size)
            .param("ed2k", ed2k.to_lowercase())
    }

    pub fn vote(kind: super::VoteKind, id: u64, value: u16) -> Self {
        Self::new("VOTE")
            .param("type", kind.code())
            .param("id", id)
            .param("value", value)
    }

    pub fn calendar() -> Self {
        Self::new("CALENDAR")
    }

    /// Anime updated since the given unix timestamp
    pub fn updated(since: i64) -> Self {
        Self::new("UPDATED").param("entity", 1).param("time", since)
    }

    pub fn group(gid: u64) -> Self {
        Self::new("GROUP").param("gid", gid)
    }

    pub fn episode(eid: u64) -> Self {
        Self::new("EPISODE").param("eid", eid)
    }
}

impl fmt::Debug for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Request({})", self.masked(None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_without_params() {
        assert_eq!(Request::calendar().encode(Some("abc")), "CALENDAR s=abc");
        assert_eq!(Request::new("VERSION").encode(None), "VERSION");
    }

    #[test]
    fn test_session_only_for_session_commands() {
        assert_eq!(Request::ping().encode(Some("abc")), "PING nat=1");
        assert_eq!(
            Request::group(7).encode(Some("abc")),
            "GROUP gid=7&s=abc"
        );
    }

    #[test]
    fn test_auth_is_masked_in_logs() {
        let auth = Request::auth("alice", "p&ss", "anilib", 1);
        let wire = auth.encode(None);
        assert!(wire.contains("pass=p&amp;ss"));
        assert!(wire.starts_with("AUTH user=alice&"));

        let masked = auth.masked(None);
        assert!(masked.contains("pass=***"));
        assert!(!masked.contains("p&amp;ss"));
        assert!(!format!("{auth:?}").contains("p&amp;ss"));
    }

    #[test]
    fn test_session_is_masked() {
        let masked = Request::episode(4).masked(Some("SeCrEt"));
        assert_eq!(masked, "EPISODE eid=4&s=***");
    }

    #[test]
    fn test_hash_is_lowercased() {
        let req = Request::mylist_del(1024, "ABCDEF");
        assert_eq!(req.get("ed2k"), Some("abcdef"));
        assert!(!req.is_login());
        assert!(Request::auth("a", "b", "c", 1).is_login());
        assert!(Request::ping().is_ping());
    }
}
