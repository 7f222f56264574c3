//! Commands: persisted units of work

use crate::error::{InternalError, Result, ValidationError};
use crate::protocol::Axis;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Version of the payload envelope written by this build
pub const PAYLOAD_VERSION: u32 = 1;

/// Characters of payload JSON included in failure logs
const PAYLOAD_SUMMARY_CHARS: usize = 200;

/// Priority for commands a user is waiting on
pub const USER_PRIORITY: u8 = 1;

/// Queues with their own processor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueueName {
    General,
    Hasher,
    Images,
}

impl QueueName {
    pub const ALL: [QueueName; 3] = [QueueName::General, QueueName::Hasher, QueueName::Images];

    pub fn as_str(self) -> &'static str {
        match self {
            QueueName::General => "general",
            QueueName::Hasher => "hasher",
            QueueName::Images => "images",
        }
    }
}

impl fmt::Display for QueueName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        QueueName::ALL
            .into_iter()
            .find(|queue| queue.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| ValidationError::unknown_queue(s))
    }
}

/// Tag selecting the handler for a command
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CommandType {
    HashFile,
    GetFile,
    AddFileToMyList,
    DeleteFileFromMyList,
    VoteAnime,
    GetCalendar,
    GetUpdated,
    GetReleaseGroup,
    GetEpisode,
    GetAnimeHttp,
    SyncMyList,
    SyncVotes,
    DownloadImage,
}

impl CommandType {
    pub const ALL: [CommandType; 13] = [
        CommandType::HashFile,
        CommandType::GetFile,
        CommandType::AddFileToMyList,
        CommandType::DeleteFileFromMyList,
        CommandType::VoteAnime,
        CommandType::GetCalendar,
        CommandType::GetUpdated,
        CommandType::GetReleaseGroup,
        CommandType::GetEpisode,
        CommandType::GetAnimeHttp,
        CommandType::SyncMyList,
        CommandType::SyncVotes,
        CommandType::DownloadImage,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommandType::HashFile => "HashFile",
            CommandType::GetFile => "GetFile",
            CommandType::AddFileToMyList => "AddFileToMyList",
            CommandType::DeleteFileFromMyList => "DeleteFileFromMyList",
            CommandType::VoteAnime => "VoteAnime",
            CommandType::GetCalendar => "GetCalendar",
            CommandType::GetUpdated => "GetUpdated",
            CommandType::GetReleaseGroup => "GetReleaseGroup",
            CommandType::GetEpisode => "GetEpisode",
            CommandType::GetAnimeHttp => "GetAnimeHttp",
            CommandType::SyncMyList => "SyncMyList",
            CommandType::SyncVotes => "SyncVotes",
            CommandType::DownloadImage => "DownloadImage",
        }
    }

    /// Queue whose processor runs this type
    pub fn queue(self) -> QueueName {
        match self {
            CommandType::HashFile => QueueName::Hasher,
            CommandType::DownloadImage => QueueName::Images,
            _ => QueueName::General,
        }
    }

    /// Transport this type dispatches on, if any
    pub fn axis(self) -> Option<Axis> {
        match self {
            CommandType::HashFile | CommandType::DownloadImage => None,
            CommandType::GetAnimeHttp | CommandType::SyncMyList | CommandType::SyncVotes => {
                Some(Axis::Http)
            }
            _ => Some(Axis::Udp),
        }
    }

    /// Lower is more urgent
    pub fn default_priority(self) -> u8 {
        match self {
            CommandType::GetAnimeHttp => 2,
            CommandType::GetFile | CommandType::HashFile => 3,
            CommandType::GetUpdated | CommandType::GetEpisode => 4,
            CommandType::GetCalendar | CommandType::GetReleaseGroup => 5,
            CommandType::AddFileToMyList | CommandType::VoteAnime => 6,
            CommandType::SyncMyList | CommandType::SyncVotes => 7,
            CommandType::DownloadImage => 8,
            CommandType::DeleteFileFromMyList => 10,
        }
    }

    /// Types that cannot run while any of `blocked` is banned or backing off
    pub fn gated_by(blocked: &[Axis]) -> Vec<CommandType> {
        CommandType::ALL
            .into_iter()
            .filter(|kind| kind.axis().is_some_and(|axis| blocked.contains(&axis)))
            .collect()
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for CommandType {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        CommandType::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| ValidationError::unknown_command_type(s))
    }
}

/// Typed payload of one command type
///
/// The semantic key identifies the work: two payloads with the same key are
/// the same command and are never queued twice.
pub trait CommandPayload: Serialize + DeserializeOwned {
    const COMMAND_TYPE: CommandType;

    fn key(&self) -> String;

    fn into_command(&self) -> Result<Command> {
        Command::new(self)
    }
}

/// A unit of work as persisted by a [`CommandStore`](super::CommandStore)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub identity: String,
    pub command_type: CommandType,
    pub priority: u8,
    pub queue: QueueName,
    pub payload: serde_json::Value,
    pub payload_version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Insertion order assigned by the store; breaks priority ties
    pub seq: u64,
}

impl Command {
    pub fn new<P: CommandPayload>(payload: &P) -> Result<Self> {
        let command_type = P::COMMAND_TYPE;
        let now = Utc::now();
        Ok(Self {
            identity: format!("{}_{}", command_type.name(), payload.key()),
            command_type,
            priority: command_type.default_priority(),
            queue: command_type.queue(),
            payload: serde_json::to_value(payload)?,
            payload_version: PAYLOAD_VERSION,
            created_at: now,
            updated_at: now,
            seq: 0,
        })
    }

    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority;
        self
    }

    /// Mark as requested by a user, ahead of background work
    pub fn user_initiated(self) -> Self {
        self.with_priority(USER_PRIORITY)
    }

    /// Decode the payload for the handler of this command's type
    pub fn payload<P: CommandPayload>(&self) -> Result<P> {
        if self.payload_version != PAYLOAD_VERSION {
            return Err(
                InternalError::unsupported_payload_version(self.payload_version, PAYLOAD_VERSION)
                    .into(),
            );
        }
        if self.command_type != P::COMMAND_TYPE {
            return Err(InternalError::assertion(format!(
                "{} payload requested from a {} command",
                P::COMMAND_TYPE,
                self.command_type
            ))
            .into());
        }
        Ok(serde_json::from_value(self.payload.clone())?)
    }

    /// Bounded rendering of the payload for logs
    pub fn payload_summary(&self) -> String {
        let json = self.payload.to_string();
        match json.char_indices().nth(PAYLOAD_SUMMARY_CHARS) {
            Some((cut, _)) => format!("{}...", &json[..cut]),
            None => json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Lookup {
        size: u64,
        ed2k: String,
    }

    impl CommandPayload for Lookup {
        const COMMAND_TYPE: CommandType = CommandType::GetFile;

        fn key(&self) -> String {
            format!("{}_{}", self.ed2k, self.size)
        }
    }

    #[test]
    fn test_identity_and_defaults() {
        let command = Lookup {
            size: 42,
            ed2k: "abc".into(),
        }
        .into_command()
        .unwrap();

        assert_eq!(command.identity, "GetFile_abc_42");
        assert_eq!(command.priority, 3);
        assert_eq!(command.queue, QueueName::General);
        assert_eq!(command.payload_version, PAYLOAD_VERSION);
        assert_eq!(command.clone().user_initiated().priority, USER_PRIORITY);
    }

    #[test]
    fn test_payload_roundtrip_checks_version() {
        let payload = Lookup {
            size: 1,
            ed2k: "x".into(),
        };
        let mut command = Command::new(&payload).unwrap();
        assert_eq!(command.payload::<Lookup>().unwrap(), payload);

        command.payload_version = 9;
        let err = command.payload::<Lookup>().unwrap_err();
        assert!(err.to_string().contains("Unsupported payload version 9"));
    }

    #[test]
    fn test_payload_summary_is_bounded() {
        let command = Command::new(&Lookup {
            size: 1,
            ed2k: "é".repeat(500),
        })
        .unwrap();
        let summary = command.payload_summary();
        assert!(summary.ends_with("..."));
        assert_eq!(summary.chars().count(), PAYLOAD_SUMMARY_CHARS + 3);
    }

    #[test]
    fn test_command_type_routing() {
        assert_eq!(CommandType::HashFile.queue(), QueueName::Hasher);
        assert_eq!(CommandType::DownloadImage.queue(), QueueName::Images);
        assert_eq!(CommandType::GetAnimeHttp.axis(), Some(Axis::Http));
        assert_eq!(CommandType::VoteAnime.axis(), Some(Axis::Udp));
        assert_eq!(CommandType::DownloadImage.axis(), None);
        assert_eq!(CommandType::DeleteFileFromMyList.default_priority(), 10);

        let gated = CommandType::gated_by(&[Axis::Http]);
        assert_eq!(
            gated,
            vec![
                CommandType::GetAnimeHttp,
                CommandType::SyncMyList,
                CommandType::SyncVotes
            ]
        );
        assert!(CommandType::gated_by(&[]).is_empty());
    }

    #[test]
    fn test_parse_names() {
        for kind in CommandType::ALL {
            assert_eq!(kind.name().parse::<CommandType>().unwrap(), kind);
        }
        assert!("Nope".parse::<CommandType>().is_err());
        assert_eq!("Images".parse::<QueueName>().unwrap(), QueueName::Images);
        assert!("other".parse::<QueueName>().is_err());
    }
}
