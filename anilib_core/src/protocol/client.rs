//! Typed registry operations
//!
//! [`RegistryClient`] is what command handlers talk to. Every UDP operation
//! goes through [`ProtocolSession::dispatch`]; documents go through
//! [`HttpClient`].

use crate::protocol::error::{ProtocolError, ResponseCode, Result};
use crate::protocol::http::{HttpClient, HttpDocument};
use crate::protocol::messages::{
    CalendarEntry, EpisodeRecord, FileRecord, Lookup, MyListAddOutcome, MyListState,
    RawResponse, ReleaseGroup, Request, UpdatedAnime, VoteKind, VoteOutcome, parse_opt,
};
use crate::protocol::session::ProtocolSession;
use log::warn;
use std::sync::Arc;
use std::time::Duration;

/// Typed facade over the session and the HTTP client
#[derive(Clone)]
pub struct RegistryClient {
    session: Arc<ProtocolSession>,
    http: Arc<HttpClient>,
}

impl RegistryClient {
    pub fn new(session: Arc<ProtocolSession>, http: Arc<HttpClient>) -> Self {
        Self { session, http }
    }

    pub fn session(&self) -> &Arc<ProtocolSession> {
        &self.session
    }

    pub fn http(&self) -> &Arc<HttpClient> {
        &self.http
    }

    /// Look a file up by ed2k hash and size
    pub async fn file_by_hash(&self, size: u64, ed2k: &str) -> Result<Lookup<FileRecord>> {
        let response = self.session.dispatch(&Request::file_by_hash(size, ed2k)).await?;
        decode_payload(response, &[220], |response| {
            FileRecord::from_fields(response.require_fields()?)
        })
    }

    pub async fn file_by_id(&self, fid: u64) -> Result<Lookup<FileRecord>> {
        let response = self.session.dispatch(&Request::file_by_id(fid)).await?;
        decode_payload(response, &[220], |response| {
            FileRecord::from_fields(response.require_fields()?)
        })
    }

    /// Add a file to the user's list; a file already listed is not an error
    pub async fn add_file_to_mylist(
        &self,
        size: u64,
        ed2k: &str,
        state: MyListState,
        watched: bool,
    ) -> Result<Lookup<MyListAddOutcome>> {
        let response = self
            .session
            .dispatch(&Request::mylist_add(size, ed2k, state, watched))
            .await?;

        decode_payload(response, &[210, 310, 311], |response| {
            let first = response.fields().first();
            match response.code {
                ResponseCode(210) => Ok(MyListAddOutcome::Added {
                    lid: parse_opt(first).ok_or_else(|| ProtocolError::missing_field("lid"))?,
                }),
                ResponseCode(310) => Ok(MyListAddOutcome::AlreadyInList {
                    lid: parse_opt(first),
                }),
                _ => Ok(MyListAddOutcome::Edited {
                    entries: parse_opt(first).unwrap_or(1),
                }),
            }
        })
    }

    /// Remove a file from the user's list, returning the number of entries removed
    pub async fn delete_file_from_mylist(&self, size: u64, ed2k: &str) -> Result<Lookup<u32>> {
        let response = self
            .session
            .dispatch(&Request::mylist_del(size, ed2k))
            .await?;

        match response {
            Lookup::Found(response) if response.code == ResponseCode(411) => Ok(Lookup::NoData),
            other => other.try_map(|response| {
                expect_code(&response, &[211])?;
                Ok(parse_opt(response.fields().first()).unwrap_or(1))
            }),
        }
    }

    /// Vote on an anime; a value of zero revokes the vote
    pub async fn vote_anime(
        &self,
        aid: u64,
        value: u16,
        temporary: bool,
    ) -> Result<Lookup<VoteOutcome>> {
        let kind = if temporary {
            VoteKind::AnimeTemporary
        } else {
            VoteKind::Anime
        };
        let response = self.session.dispatch(&Request::vote(kind, aid, value)).await?;

        match response {
            Lookup::Found(response) if response.code == ResponseCode(360) => Ok(Lookup::NoData),
            other => other.try_map(|response| {
                let name = response.fields().first().cloned().unwrap_or_default();
                let value = parse_opt(response.fields().get(1)).unwrap_or(value);
                match response.code {
                    ResponseCode(260) => Ok(VoteOutcome::Voted { name, value }),
                    ResponseCode(261) => Ok(VoteOutcome::Revoked { name }),
                    ResponseCode(262) => Ok(VoteOutcome::Updated { name, value }),
                    code => Err(ProtocolError::invalid_response(
                        "vote accepted",
                        format!("{code} {}", response.message),
                    )),
                }
            }),
        }
    }

    pub async fn calendar(&self) -> Result<Lookup<Vec<CalendarEntry>>> {
        let response = self.session.dispatch(&Request::calendar()).await?;
        decode_payload(response, &[297], |response| {
            response
                .lines
                .iter()
                .map(|fields| CalendarEntry::from_fields(fields))
                .collect()
        })
    }

    /// Anime changed since a unix timestamp
    pub async fn updated_since(&self, since: i64) -> Result<Lookup<UpdatedAnime>> {
        let response = self.session.dispatch(&Request::updated(since)).await?;
        decode_payload(response, &[243], |response| {
            UpdatedAnime::from_fields(response.require_fields()?)
        })
    }

    pub async fn release_group(&self, gid: u64) -> Result<Lookup<ReleaseGroup>> {
        let response = self.session.dispatch(&Request::group(gid)).await?;
        decode_payload(response, &[250], |response| {
            ReleaseGroup::from_fields(response.require_fields()?)
        })
    }

    pub async fn episode(&self, eid: u64) -> Result<Lookup<EpisodeRecord>> {
        let response = self.session.dispatch(&Request::episode(eid)).await?;
        decode_payload(response, &[240], |response| {
            EpisodeRecord::from_fields(response.require_fields()?)
        })
    }

    /// Round trip time of a PING
    pub async fn ping(&self) -> Result<Duration> {
        let started = tokio::time::Instant::now();
        let response = self.session.dispatch(&Request::ping()).await?;
        match response {
            Lookup::Found(response) => expect_code(&response, &[300]).map(|_| started.elapsed()),
            Lookup::NoData => Err(ProtocolError::invalid_response("300 PONG", "no data")),
        }
    }

    pub async fn anime_document(&self, aid: u64) -> Result<Lookup<HttpDocument>> {
        self.http.anime(aid).await
    }

    pub async fn mylist_document(&self) -> Result<Lookup<HttpDocument>> {
        self.http.mylist().await
    }

    pub async fn votes_document(&self) -> Result<Lookup<HttpDocument>> {
        self.http.votes().await
    }
}

/// Check the reply code, then decode its payload
///
/// A success-coded reply whose data cannot be decoded counts as no data.
fn decode_payload<T>(
    response: Lookup<RawResponse>,
    expected: &[u16],
    decode: impl FnOnce(&RawResponse) -> Result<T>,
) -> Result<Lookup<T>> {
    let Lookup::Found(response) = response else {
        return Ok(Lookup::NoData);
    };
    expect_code(&response, expected)?;
    match decode(&response) {
        Ok(value) => Ok(Lookup::Found(value)),
        Err(e) => {
            warn!(
                "Unusable payload in {} {} reply, treating as no data: {e}",
                response.code, response.message
            );
            Ok(Lookup::NoData)
        }
    }
}

fn expect_code(response: &RawResponse, expected: &[u16]) -> Result<()> {
    if expected.contains(&response.code.0) {
        Ok(())
    } else {
        Err(unexpected(expected, response.code))
    }
}

fn unexpected(expected: &[u16], actual: ResponseCode) -> ProtocolError {
    let expected: Vec<String> = expected.iter().map(u16::to_string).collect();
    ProtocolError::invalid_response(expected.join(" or "), actual.to_string())
}
