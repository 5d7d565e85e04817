//! Classification of failed ACME exchanges into [`AcmeProtocolError`].

use std::fmt::Write as _;

use serde_json::{Map, Value};
use thiserror::Error;

use crate::exchange::{Exchange, ResolvedBody};
use crate::problem::{MemberText, Problem, SubproblemLines};

/// Message used when the caller does not supply one.
pub const DEFAULT_MESSAGE: &str = "ACME request failed";

/// Rendered in place of the exchange URL when the transport lost it.
const UNKNOWN_URL: &str = "None";

/// A failed ACME request, with the server's problem document when one could
/// be recovered.
///
/// Constructed once from an [`Exchange`] and never mutated afterwards. The
/// status fields keep the raw values of the exchange; only the rendered
/// message reconciles them with the status the problem document reports.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{message}")]
pub struct AcmeProtocolError {
    message: String,
    http_url: Option<String>,
    http_status: u16,
    problem: Option<Problem>,
    subproblems: Vec<Value>,
    extras: Map<String, Value>,
}

impl AcmeProtocolError {
    /// Classify a failed exchange using [`DEFAULT_MESSAGE`].
    #[must_use]
    pub fn new(exchange: Exchange<'_>) -> Self {
        Self::with_message(exchange, DEFAULT_MESSAGE)
    }

    /// Classify a failed exchange, leading the rendered message with `message`.
    #[must_use]
    pub fn with_message(exchange: Exchange<'_>, message: &str) -> Self {
        let resolved = exchange.resolve_body();
        let classified = classify(&resolved);

        let url = resolved.url.as_deref().unwrap_or(UNKNOWN_URL);
        let rendered = format!(
            "{message} for {url} with {}.{}",
            classified.code, classified.additional
        );

        tracing::debug!(
            http_url = resolved.url.as_deref(),
            http_status = resolved.status,
            problem_type = classified.problem.as_ref().and_then(Problem::type_url),
            subproblems = classified.subproblems.len(),
            "classified ACME protocol error"
        );

        Self {
            message: rendered,
            http_url: resolved.url,
            http_status: resolved.status,
            problem: classified.problem,
            subproblems: classified.subproblems,
            extras: Map::new(),
        }
    }

    /// Attach a forward-compatible auxiliary value.
    ///
    /// Keys that clash with the fixed report fields (`http_url`, `http_status`,
    /// `problem`, `subproblems`) are shadowed by them in the failure report.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    /// Final human-readable message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn http_url(&self) -> Option<&str> {
        self.http_url.as_deref()
    }

    /// Status of the HTTP exchange, exactly as the transport reported it.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        self.http_status
    }

    /// Problem document without its subproblems, if the body carried one.
    #[must_use]
    pub fn problem(&self) -> Option<&Problem> {
        self.problem.as_ref()
    }

    /// Top-level subproblems, exactly as received.
    #[must_use]
    pub fn subproblems(&self) -> &[Value] {
        &self.subproblems
    }

    #[must_use]
    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    /// Problem `type` of the top-level document, e.g. for matching on
    /// `urn:ietf:params:acme:error:badNonce`.
    #[must_use]
    pub fn problem_type(&self) -> Option<&str> {
        self.problem.as_ref().and_then(Problem::type_url)
    }

    /// Auxiliary data for the failure report.
    #[must_use]
    pub fn report_fields(&self) -> Map<String, Value> {
        let mut fields = self.extras.clone();
        fields.insert(
            "http_url".to_owned(),
            self.http_url.clone().map_or(Value::Null, Value::String),
        );
        fields.insert("http_status".to_owned(), Value::from(self.http_status));
        fields.insert(
            "problem".to_owned(),
            Value::Object(
                self.problem
                    .as_ref()
                    .map(|p| p.members().clone())
                    .unwrap_or_default(),
            ),
        );
        fields.insert(
            "subproblems".to_owned(),
            Value::Array(self.subproblems.clone()),
        );
        fields
    }
}

struct Classified {
    code: String,
    additional: String,
    problem: Option<Problem>,
    subproblems: Vec<Value>,
}

fn classify(resolved: &ResolvedBody) -> Classified {
    if resolved.status >= 400
        && let Some(problem) = resolved.body_json.as_ref().and_then(problem_document)
    {
        return classify_problem(resolved.status, problem);
    }
    classify_fallback(resolved)
}

/// Any JSON object with a `type` member is a problem document; its other
/// members are taken as they come.
fn problem_document(body_json: &Value) -> Option<Problem> {
    body_json
        .as_object()
        .filter(|object| object.contains_key("type"))
        .map(|object| Problem::from(object.clone()))
}

fn classify_problem(http_status: u16, mut problem: Problem) -> Classified {
    let code = match problem.status() {
        Some(problem_status) if *problem_status != http_status => format!(
            "status {} (HTTP status: {http_status})",
            MemberText(Some(problem_status))
        ),
        _ => format!("status {http_status}"),
    };

    let mut additional = format!(" {problem}.");

    let subproblems = problem.take_subproblems();
    if let Some(subproblems) = &subproblems {
        let lines = SubproblemLines {
            subproblems,
            prefix: "",
        };
        _ = write!(additional, " Subproblems:{lines}");
    }

    Classified {
        code,
        additional,
        problem: Some(problem),
        subproblems: subproblems.unwrap_or_default(),
    }
}

fn classify_fallback(resolved: &ResolvedBody) -> Classified {
    let additional = if let Some(body_json) = &resolved.body_json {
        format!(" The JSON error result: {body_json}")
    } else if let Some(body) = &resolved.body {
        format!(" The raw error result: {}", String::from_utf8_lossy(body))
    } else {
        String::new()
    };

    Classified {
        code: format!("HTTP status {}", resolved.status),
        additional,
        problem: None,
        subproblems: Vec::new(),
    }
}
