#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![warn(warnings)]

//! Failure classification for ACME (RFC 8555) clients
//!
//! This crate turns a failed HTTP exchange with an ACME server into a
//! structured error:
//! - Problem documents are decoded when the body carries one, and rendered
//!   with their nested subproblems (`(0)`, `(0.1)`, ...)
//! - Status codes reported by the problem document and by HTTP are reconciled
//! - Bodies that are not problem documents are reported verbatim
//! - Body read and decode failures degrade to "no body", they never surface
//!
//! The other failure kinds a client runs into (backend, network, key parsing)
//! share the same [`AcmeError`] type and report shape.
//!
//! # Example
//!
//! ```
//! use acme_errors::{AcmeProtocolError, Exchange, ExchangeInfo};
//!
//! let body = br#"{"type":"urn:ietf:params:acme:error:badNonce","detail":"stale nonce"}"#;
//! let err = AcmeProtocolError::new(
//!     Exchange::new(ExchangeInfo::new("https://ca.example/acme/new-order", 400))
//!         .with_body(&body[..]),
//! );
//!
//! assert_eq!(err.problem_type(), Some("urn:ietf:params:acme:error:badNonce"));
//! assert_eq!(
//!     err.message(),
//!     "ACME request failed for https://ca.example/acme/new-order with status 400. \
//!      Error urn:ietf:params:acme:error:badNonce: \"stale nonce\"."
//! );
//! ```

mod error;
pub mod exchange;
pub mod problem;
mod protocol;
pub mod report;

pub use error::{AcmeError, AcmeResult, Failure, FailureKind};
pub use exchange::{
    BodyDecodeError, DEFAULT_MAX_BODY_SIZE, Exchange, ExchangeInfo, decode_json_body,
};
pub use problem::{APPLICATION_PROBLEM_JSON, Problem, ProblemDisplay, format_error_problem};
pub use protocol::{AcmeProtocolError, DEFAULT_MESSAGE};
pub use report::FailureReport;
