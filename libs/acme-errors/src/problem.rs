//! RFC 8555 / RFC 7807 problem documents and their human-readable rendering.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Content type ACME servers use for problem documents.
pub const APPLICATION_PROBLEM_JSON: &str = "application/problem+json";

/// Problem document returned by an ACME server.
///
/// The document is kept exactly as received: members are not validated
/// against a schema, so a string `status` or a numeric `title` survives a
/// decode/encode cycle unchanged and is rendered as its JSON text.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Problem {
    members: Map<String, Value>,
}

impl Problem {
    /// Create a problem document with only the `type` member set.
    #[must_use]
    pub fn new(type_url: impl Into<String>) -> Self {
        Self::default().with_member("type", Value::String(type_url.into()))
    }

    #[must_use]
    pub fn with_title(self, title: impl Into<String>) -> Self {
        self.with_member("title", Value::String(title.into()))
    }

    #[must_use]
    pub fn with_detail(self, detail: impl Into<String>) -> Self {
        self.with_member("detail", Value::String(detail.into()))
    }

    #[must_use]
    pub fn with_status(self, status: u16) -> Self {
        self.with_member("status", Value::from(status))
    }

    /// Set `subproblems`. An explicitly empty list still renders the
    /// `Subproblems:` header.
    #[must_use]
    pub fn with_subproblems(self, subproblems: Vec<Problem>) -> Self {
        let list = subproblems.into_iter().map(Value::from).collect();
        self.with_member("subproblems", Value::Array(list))
    }

    /// Set any member, e.g. RFC 8555 `identifier` or RFC 7807 `instance`.
    #[must_use]
    pub fn with_member(mut self, key: impl Into<String>, value: Value) -> Self {
        self.members.insert(key.into(), value);
        self
    }

    /// The `type` member, when it is a string.
    #[must_use]
    pub fn type_url(&self) -> Option<&str> {
        self.members.get("type").and_then(Value::as_str)
    }

    /// The `status` member as received, which is not necessarily a number.
    #[must_use]
    pub fn status(&self) -> Option<&Value> {
        self.members.get("status")
    }

    #[must_use]
    pub fn member(&self, key: &str) -> Option<&Value> {
        self.members.get(key)
    }

    #[must_use]
    pub fn members(&self) -> &Map<String, Value> {
        &self.members
    }

    #[must_use]
    pub fn into_members(self) -> Map<String, Value> {
        self.members
    }

    /// Detach the `subproblems` list.
    ///
    /// A `null` member is removed and yields `None`, like a missing one. A
    /// member that is not a list stays in the document.
    pub fn take_subproblems(&mut self) -> Option<Vec<Value>> {
        match self.members.get("subproblems") {
            Some(Value::Array(_) | Value::Null) => match self.members.remove("subproblems") {
                Some(Value::Array(list)) => Some(list),
                _ => None,
            },
            _ => None,
        }
    }

    /// Display adapter that renders this problem with the given subproblem
    /// index prefix (see [`format_error_problem`]).
    #[must_use]
    pub fn display_with_prefix<'a>(&'a self, prefix: &'a str) -> ProblemDisplay<'a> {
        ProblemDisplay {
            members: &self.members,
            prefix,
        }
    }
}

impl From<Map<String, Value>> for Problem {
    fn from(members: Map<String, Value>) -> Self {
        Self { members }
    }
}

impl From<Problem> for Value {
    fn from(problem: Problem) -> Self {
        Value::Object(problem.members)
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.display_with_prefix(""), f)
    }
}

/// Strings render bare, any other member as its JSON text, a missing one as
/// `null`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MemberText<'a>(pub(crate) Option<&'a Value>);

impl fmt::Display for MemberText<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(Value::String(s)) => f.write_str(s),
            Some(other) => write!(f, "{other}"),
            None => f.write_str("null"),
        }
    }
}

/// Renders a problem document and, recursively, its subproblems.
///
/// Created by [`Problem::display_with_prefix`].
#[derive(Debug, Clone, Copy)]
pub struct ProblemDisplay<'a> {
    members: &'a Map<String, Value>,
    prefix: &'a str,
}

impl fmt::Display for ProblemDisplay<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let members = self.members;
        let type_url = MemberText(members.get("type"));
        match members.get("title") {
            Some(title) => write!(f, "Error \"{}\" ({type_url})", MemberText(Some(title)))?,
            None => write!(f, "Error {type_url}")?,
        }
        if let Some(detail) = members.get("detail") {
            write!(f, ": \"{}\"", MemberText(Some(detail)))?;
        }
        match members.get("subproblems") {
            None | Some(Value::Null) => {}
            Some(Value::Array(subproblems)) => {
                let lines = SubproblemLines {
                    subproblems,
                    prefix: self.prefix,
                };
                write!(f, " Subproblems:{lines}")?;
            }
            Some(_) => f.write_str(" Subproblems:")?,
        }
        Ok(())
    }
}

/// One `\n(<index>) <problem>.` line per subproblem.
///
/// Shared by the formatter and by the protocol error builder, which renders
/// the top-level subproblem block a second time.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SubproblemLines<'a> {
    pub(crate) subproblems: &'a [Value],
    pub(crate) prefix: &'a str,
}

impl fmt::Display for SubproblemLines<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (position, subproblem) in self.subproblems.iter().enumerate() {
            let index = format!("{}{position}", self.prefix);
            match subproblem {
                Value::Object(members) => {
                    let nested_prefix = format!("{index}.");
                    let nested = ProblemDisplay {
                        members,
                        prefix: &nested_prefix,
                    };
                    write!(f, "\n({index}) {nested}.")?;
                }
                other => write!(f, "\n({index}) Error {other}.")?,
            }
        }
        Ok(())
    }
}

/// Render a problem document as a single human-readable string.
///
/// `subproblem_prefix` is prepended to every subproblem index, so nested
/// subproblems come out as `(0.1)`, `(0.1.2)` and so on.
///
/// ```
/// use acme_errors::{Problem, format_error_problem};
///
/// let problem = Problem::new("urn:ietf:params:acme:error:malformed")
///     .with_title("Malformed")
///     .with_detail("JWS has no nonce");
/// assert_eq!(
///     format_error_problem(&problem, ""),
///     r#"Error "Malformed" (urn:ietf:params:acme:error:malformed): "JWS has no nonce""#,
/// );
/// ```
#[must_use]
pub fn format_error_problem(problem: &Problem, subproblem_prefix: &str) -> String {
    problem.display_with_prefix(subproblem_prefix).to_string()
}
