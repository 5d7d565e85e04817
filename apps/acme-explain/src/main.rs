//! Explain a recorded failed ACME exchange.
//!
//! Reads one exchange (YAML or JSON, `-` for stdin), classifies it and prints
//! the failure report a top-level handler would surface, then exits with
//! status 1. Unreadable input exits with status 2.

mod config;
mod input;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use acme_errors::{AcmeError, AcmeProtocolError, FailureReport};
use clap::Parser;

use crate::config::{ExplainConfig, OutputFormat};
use crate::input::RecordedExchange;

/// Explain a failed ACME exchange as a failure report
#[derive(Parser)]
#[command(name = "acme-explain")]
#[command(version, about = "Explain a failed ACME exchange as a failure report")]
struct Cli {
    /// Exchange record (YAML or JSON); `-` reads stdin
    exchange: PathBuf,

    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Leading message of the report (overrides config)
    #[arg(short, long)]
    message: Option<String>,

    /// Output format (overrides config)
    #[arg(short, long, value_enum)]
    output: Option<OutputFormat>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(report) => {
            report.log();
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("acme-explain: {e:#}");
            ExitCode::from(2)
        }
    }
}

fn run(cli: Cli) -> anyhow::Result<FailureReport> {
    let mut config = ExplainConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(cli.message, cli.output, cli.verbose);
    logging::init_logging(&config.logging)?;

    let record = RecordedExchange::read(&cli.exchange)?;
    tracing::debug!(status = record.status, url = record.url.as_deref(), "loaded exchange record");

    let report = explain(record, &config);
    println!("{}", render(&report, config.output)?);
    Ok(report)
}

fn explain(record: RecordedExchange, config: &ExplainConfig) -> FailureReport {
    let exchange = record.into_exchange();
    let err: AcmeError = match &config.message {
        Some(message) => AcmeProtocolError::with_message(exchange, message),
        None => AcmeProtocolError::new(exchange),
    }
    .into();
    err.report()
}

fn render(report: &FailureReport, output: OutputFormat) -> anyhow::Result<String> {
    Ok(match output {
        OutputFormat::Json => serde_json::to_string_pretty(report)?,
        OutputFormat::Text => report.msg.clone(),
    })
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use acme_errors::FailureKind;
    use clap::CommandFactory;
    use serde_json::json;

    fn record(text: &str) -> RecordedExchange {
        RecordedExchange::parse(text).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn explains_problem_document() {
        let report = explain(
            record(
                r#"{"url": "https://ca/acme/new-order", "status": 400,
                    "body_json": {"type": "urn:ietf:params:acme:error:malformed", "detail": "bad CSR"}}"#,
            ),
            &ExplainConfig::default(),
        );
        assert_eq!(report.kind, FailureKind::Protocol);
        assert_eq!(
            report.msg,
            "ACME request failed for https://ca/acme/new-order with status 400. \
             Error urn:ietf:params:acme:error:malformed: \"bad CSR\"."
        );
        assert_eq!(
            report.other["problem"],
            json!({"type": "urn:ietf:params:acme:error:malformed", "detail": "bad CSR"})
        );
    }

    #[test]
    fn configured_message_leads() {
        let config = ExplainConfig {
            message: Some("Failed to poll authorization".to_owned()),
            ..ExplainConfig::default()
        };
        let report = explain(record("url: https://ca/authz/1\nstatus: 500\n"), &config);
        assert_eq!(
            report.msg,
            "Failed to poll authorization for https://ca/authz/1 with HTTP status 500."
        );
    }

    #[test]
    fn renders_json_and_text() {
        let report = explain(record("status: 404\n"), &ExplainConfig::default());

        let rendered: serde_json::Value =
            serde_json::from_str(&render(&report, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(rendered["failed"], json!(true));
        assert_eq!(rendered["kind"], json!("protocol"));
        assert_eq!(rendered["other"]["http_url"], json!(null));
        assert_eq!(rendered["other"]["subproblems"], json!([]));

        assert_eq!(render(&report, OutputFormat::Text).unwrap(), report.msg);
    }
}
