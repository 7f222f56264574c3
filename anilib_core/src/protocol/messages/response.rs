//! Raw responses and login replies

use super::{PARAM_SEPARATOR, decode_value};
use crate::protocol::error::{ProtocolError, ResponseCode, Result};

/// A decoded response: status line plus data lines split into fields
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub code: ResponseCode,
    pub message: String,
    pub lines: Vec<Vec<String>>,
}

impl RawResponse {
    /// Parse a full response text
    pub fn parse(text: &str) -> Result<Self> {
        let mut lines = text.lines().filter(|line| !line.trim().is_empty());

        let header = lines
            .next()
            .ok_or_else(|| ProtocolError::invalid_packet("Empty response"))?;
        let (code, message) = parse_response_header(header)?;

        Ok(Self {
            code: ResponseCode(code),
            message,
            lines: lines.map(parse_response_fields).collect(),
        })
    }

    /// Fields of the first data line
    pub fn fields(&self) -> &[String] {
        self.lines.first().map(Vec::as_slice).unwrap_or(&[])
    }

    /// Fields of the first data line, failing when there is none
    pub fn require_fields(&self) -> Result<&[String]> {
        match self.lines.first() {
            Some(fields) => Ok(fields),
            None => Err(ProtocolError::invalid_response(
                "data line",
                format!("{} without data", self.code),
            )),
        }
    }
}

/// Parse the status line into code and message
pub fn parse_response_header(line: &str) -> Result<(u16, String)> {
    let mut parts = line.trim().splitn(2, ' ');

    let raw_code = parts.next().unwrap_or_default();
    let code = raw_code.parse::<u16>().map_err(|_| {
        ProtocolError::invalid_packet(format!("Invalid response code: {raw_code}"))
    })?;

    let message = parts.next().unwrap_or("").to_string();

    Ok((code, message))
}

/// Parse response fields from a data line
pub fn parse_response_fields(line: &str) -> Vec<String> {
    line.split(PARAM_SEPARATOR).map(decode_value).collect()
}

/// Outcome of a successful AUTH
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReply {
    pub session: String,
    pub new_version_available: bool,
}

impl LoginReply {
    /// Extract the session key from a 200/201 response
    ///
    /// The key is the first word of the status message, e.g.
    /// `200 iQUO2 LOGIN ACCEPTED` or `200 abc123 1.2.3.4:9000 LOGIN ACCEPTED`
    /// when NAT is enabled. Some servers put it on the first data line instead.
    pub fn from_response(response: &RawResponse) -> Result<Self> {
        let new_version_available = response.code == ResponseCode::LOGIN_ACCEPTED_NEW_VERSION;
        if response.code != ResponseCode::LOGIN_ACCEPTED && !new_version_available {
            return Err(ProtocolError::invalid_response(
                "200 or 201",
                response.code.to_string(),
            ));
        }

        let words: Vec<&str> = response.message.split_whitespace().collect();
        let session = match words.first() {
            Some(first) if *first != "LOGIN" && words.contains(&"LOGIN") => first.to_string(),
            _ => response
                .fields()
                .first()
                .filter(|value| !value.is_empty())
                .cloned()
                .ok_or_else(|| ProtocolError::missing_field("session"))?,
        };

        Ok(Self {
            session,
            new_version_available,
        })
    }
}
