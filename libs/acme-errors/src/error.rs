//! Failure kinds shared by every step of an ACME client run.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::protocol::AcmeProtocolError;
use crate::report::FailureReport;

/// Category of a failure, for handlers that branch without reading messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum FailureKind {
    /// Generic failure of the current unit of work
    Module,
    /// The ACME server rejected a request
    Protocol,
    /// Crypto backend or other internal failure
    Backend,
    /// Connection, DNS or TLS failure before a response arrived
    Network,
    /// A private key or CSR could not be parsed
    KeyParsing,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Module => "module",
            Self::Protocol => "protocol",
            Self::Backend => "backend",
            Self::Network => "network",
            Self::KeyParsing => "key_parsing",
        };
        f.write_str(s)
    }
}

/// Message plus auxiliary data carried by the non-protocol failure kinds.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Failure {
    pub message: String,
    pub details: Map<String, Value>,
}

impl Failure {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            details: Map::new(),
        }
    }

    #[must_use]
    pub fn with_detail(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.details.insert(key.into(), value.into());
        self
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Terminal failure of one unit of work against an ACME server.
///
/// None of these are retried here; they travel up to the top-level handler,
/// which turns them into a [`FailureReport`].
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum AcmeError {
    #[error("{0}")]
    Module(Failure),

    #[error(transparent)]
    Protocol(Box<AcmeProtocolError>),

    #[error("{0}")]
    Backend(Failure),

    #[error("{0}")]
    Network(Failure),

    #[error("{0}")]
    KeyParsing(Failure),
}

impl AcmeError {
    #[must_use]
    pub fn module(message: impl Into<String>) -> Self {
        Self::Module(Failure::new(message))
    }

    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(Failure::new(message))
    }

    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(Failure::new(message))
    }

    #[must_use]
    pub fn key_parsing(message: impl Into<String>) -> Self {
        Self::KeyParsing(Failure::new(message))
    }

    /// Attach auxiliary data. Protocol errors keep it among their extras.
    #[must_use]
    pub fn with_detail(self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        match self {
            Self::Module(f) => Self::Module(f.with_detail(key, value)),
            Self::Backend(f) => Self::Backend(f.with_detail(key, value)),
            Self::Network(f) => Self::Network(f.with_detail(key, value)),
            Self::KeyParsing(f) => Self::KeyParsing(f.with_detail(key, value)),
            Self::Protocol(e) => Self::Protocol(Box::new(e.with_extra(key, value.into()))),
        }
    }

    #[must_use]
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Module(_) => FailureKind::Module,
            Self::Protocol(_) => FailureKind::Protocol,
            Self::Backend(_) => FailureKind::Backend,
            Self::Network(_) => FailureKind::Network,
            Self::KeyParsing(_) => FailureKind::KeyParsing,
        }
    }

    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Protocol(e) => e.message(),
            Self::Module(f) | Self::Backend(f) | Self::Network(f) | Self::KeyParsing(f) => {
                &f.message
            }
        }
    }

    /// The protocol error, when this is one.
    #[must_use]
    pub fn as_protocol(&self) -> Option<&AcmeProtocolError> {
        match self {
            Self::Protocol(e) => Some(e.as_ref()),
            _ => None,
        }
    }

    /// Final report for the top-level handler.
    #[must_use]
    pub fn report(&self) -> FailureReport {
        let other = match self {
            Self::Protocol(e) => e.report_fields(),
            Self::Module(f) | Self::Backend(f) | Self::Network(f) | Self::KeyParsing(f) => {
                f.details.clone()
            }
        };
        FailureReport::new(self.kind(), self.message(), other)
    }
}

impl From<AcmeProtocolError> for AcmeError {
    fn from(err: AcmeProtocolError) -> Self {
        Self::Protocol(Box::new(err))
    }
}

pub type AcmeResult<T> = Result<T, AcmeError>;
