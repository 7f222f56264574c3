//! Scripted HTTP endpoint

use anilib_core::protocol::{HttpTransport, ProtocolError};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

type Responder = Box<dyn Fn(&str) -> Result<String, ProtocolError> + Send + Sync>;

/// HTTP transport answering from a closure and recording requested URLs
pub struct ScriptedHttp {
    responder: Responder,
    urls: Mutex<Vec<String>>,
}

impl ScriptedHttp {
    pub fn new(
        responder: impl Fn(&str) -> Result<String, ProtocolError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            responder: Box::new(responder),
            urls: Mutex::new(Vec::new()),
        }
    }

    /// Every request gets the same body
    pub fn fixed(body: &str) -> Self {
        let body = body.to_string();
        Self::new(move |_| Ok(body.clone()))
    }

    /// Fails every request; for stacks that must never go over HTTP
    pub fn unreachable() -> Self {
        Self::new(|url| Err(ProtocolError::http(format!("unexpected request {url}"), false)))
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().clone()
    }
}

#[async_trait]
impl HttpTransport for ScriptedHttp {
    async fn get_text(&self, url: &str) -> Result<String, ProtocolError> {
        self.urls.lock().push(url.to_string());
        (self.responder)(url)
    }

    async fn get_bytes(&self, url: &str) -> Result<Bytes, ProtocolError> {
        self.get_text(url).await.map(|body| Bytes::from(body.into_bytes()))
    }
}
