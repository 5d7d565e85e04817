//! Inputs describing one failed HTTP exchange with an ACME server.

use std::fmt;
use std::io::Read;

use bytes::Bytes;
use serde_json::Value;
use thiserror::Error;

/// Default cap on how much of a response stream is read (10 MB).
pub const DEFAULT_MAX_BODY_SIZE: usize = 10 * 1024 * 1024;

/// Metadata of a finished exchange, as reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeInfo {
    /// Request URL. Some transports lose it on early failures.
    pub url: Option<String>,
    /// HTTP status of the response.
    pub status: u16,
    /// Body captured by the transport itself, used when the response stream
    /// cannot be read.
    pub body: Option<Bytes>,
}

impl ExchangeInfo {
    #[must_use]
    pub fn new(url: impl Into<String>, status: u16) -> Self {
        Self {
            url: Some(url.into()),
            status,
            body: None,
        }
    }

    /// Metadata for an exchange whose URL is unknown.
    #[must_use]
    pub fn without_url(status: u16) -> Self {
        Self {
            url: None,
            status,
            body: None,
        }
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Why a response body could not be turned into JSON.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum BodyDecodeError {
    /// Body is not valid UTF-8
    #[error("response body is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    /// Body is not valid JSON
    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Decode a raw body as UTF-8 text and then as JSON.
///
/// # Errors
///
/// Returns [`BodyDecodeError::Utf8`] for non UTF-8 input and
/// [`BodyDecodeError::Json`] when the text is not a JSON document.
pub fn decode_json_body(body: &[u8]) -> Result<Value, BodyDecodeError> {
    let text = std::str::from_utf8(body)?;
    Ok(serde_json::from_str(text)?)
}

/// One failed exchange, handed to [`AcmeProtocolError`](crate::AcmeProtocolError)
/// for classification.
///
/// The body may be supplied in three ways, in order of preference:
/// - already decoded, via [`Exchange::with_body_json`]
/// - as raw bytes, via [`Exchange::with_body`]
/// - as an unread response stream, via [`Exchange::with_response`]; it is read
///   once, and [`ExchangeInfo::body`] is used if the read fails or the stream
///   exceeds the body size limit
pub struct Exchange<'r> {
    pub(crate) info: ExchangeInfo,
    pub(crate) response: Option<Box<dyn Read + 'r>>,
    pub(crate) max_body_size: usize,
    pub(crate) body: Option<Bytes>,
    pub(crate) body_json: Option<Value>,
}

impl<'r> Exchange<'r> {
    #[must_use]
    pub fn new(info: ExchangeInfo) -> Self {
        Self {
            info,
            response: None,
            max_body_size: DEFAULT_MAX_BODY_SIZE,
            body: None,
            body_json: None,
        }
    }

    /// Build an exchange from an `http` response and the URL it was fetched from.
    #[must_use]
    pub fn from_response(url: impl Into<String>, response: http::Response<Bytes>) -> Self {
        let status = response.status().as_u16();
        let body = response.into_body();
        Self::new(ExchangeInfo::new(url, status)).with_body(body)
    }

    #[must_use]
    pub fn with_response(mut self, response: impl Read + 'r) -> Self {
        self.response = Some(Box::new(response));
        self
    }

    /// Limit how many bytes are read from the response stream.
    #[must_use]
    pub fn with_max_body_size(mut self, limit: usize) -> Self {
        self.max_body_size = limit;
        self
    }

    #[must_use]
    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(body.into());
        self
    }

    #[must_use]
    pub fn with_body_json(mut self, body_json: Value) -> Self {
        self.body_json = Some(body_json);
        self
    }

    #[must_use]
    pub fn info(&self) -> &ExchangeInfo {
        &self.info
    }

    /// Settle the body into `(raw, decoded)` form.
    ///
    /// Never fails: unreadable streams fall back to the metadata body and
    /// undecodable bodies leave the decoded half empty.
    pub(crate) fn resolve_body(self) -> ResolvedBody {
        let Self {
            info:
                ExchangeInfo {
                    url,
                    status,
                    body: metadata_body,
                },
            response,
            max_body_size,
            mut body,
            mut body_json,
        } = self;

        if body.is_none() && body_json.is_none() {
            body = match response {
                Some(reader) => match read_body_limited(reader, max_body_size) {
                    Ok(read) => Some(read),
                    Err(e) => {
                        tracing::debug!(
                            error = %e,
                            "response body unreadable, using body from exchange metadata"
                        );
                        metadata_body
                    }
                },
                None => metadata_body,
            };
        }

        if body_json.is_none()
            && let Some(raw) = &body
        {
            match decode_json_body(raw) {
                Ok(value) => body_json = Some(value),
                Err(e) => tracing::debug!(error = %e, "response body is not a JSON document"),
            }
        }

        ResolvedBody {
            url,
            status,
            body,
            body_json,
        }
    }
}

/// Read the whole stream, failing once it grows past `limit` bytes.
fn read_body_limited(reader: Box<dyn Read + '_>, limit: usize) -> std::io::Result<Bytes> {
    let mut buf = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    reader.take(cap).read_to_end(&mut buf)?;
    if buf.len() > limit {
        return Err(std::io::Error::other(format!(
            "response body exceeds {limit} bytes"
        )));
    }
    Ok(Bytes::from(buf))
}

impl fmt::Debug for Exchange<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("info", &self.info)
            .field("response", &self.response.as_ref().map(|_| "<stream>"))
            .field("max_body_size", &self.max_body_size)
            .field("body", &self.body)
            .field("body_json", &self.body_json)
            .finish()
    }
}

/// Exchange after body resolution and decoding.
#[derive(Debug)]
pub(crate) struct ResolvedBody {
    pub(crate) url: Option<String>,
    pub(crate) status: u16,
    pub(crate) body: Option<Bytes>,
    pub(crate) body_json: Option<Value>,
}
