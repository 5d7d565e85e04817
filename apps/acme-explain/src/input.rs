use std::io::Read;
use std::path::Path;

use acme_errors::{Exchange, ExchangeInfo};
use anyhow::Context;
use figment::Figment;
use figment::providers::{Format, Yaml};
use serde::Deserialize;
use serde_json::Value;

/// A failed exchange as captured by a transport log or written by hand.
///
/// Accepted as YAML or JSON:
///
/// ```yaml
/// url: https://acme-v02.api.letsencrypt.org/acme/new-order
/// status: 400
/// body: '{"type": "urn:ietf:params:acme:error:malformed"}'
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordedExchange {
    #[serde(default)]
    pub url: Option<String>,
    pub status: u16,
    /// Raw body text, decoded as JSON when possible.
    #[serde(default)]
    pub body: Option<String>,
    /// Already decoded body; takes precedence over `body`.
    #[serde(default)]
    pub body_json: Option<Value>,
}

impl RecordedExchange {
    /// # Errors
    ///
    /// Fails when the text is neither YAML nor JSON, or lacks `status`.
    pub fn parse(text: &str) -> anyhow::Result<Self> {
        Figment::from(Yaml::string(text))
            .extract()
            .context("invalid exchange record")
    }

    /// Read a record from a file, or from stdin when `path` is `-`.
    ///
    /// # Errors
    ///
    /// Fails on I/O errors and on records [`RecordedExchange::parse`] rejects.
    pub fn read(path: &Path) -> anyhow::Result<Self> {
        let text = if path == Path::new("-") {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read exchange record from stdin")?;
            text
        } else {
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read exchange record {}", path.display()))?
        };
        Self::parse(&text)
    }

    #[must_use]
    pub fn into_exchange(self) -> Exchange<'static> {
        let info = match self.url {
            Some(url) => ExchangeInfo::new(url, self.status),
            None => ExchangeInfo::without_url(self.status),
        };
        let mut exchange = Exchange::new(info);
        if let Some(body) = self.body {
            exchange = exchange.with_body(body);
        }
        if let Some(body_json) = self.body_json {
            exchange = exchange.with_body_json(body_json);
        }
        exchange
    }
}
