use std::path::Path;

use anyhow::Context;
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Yaml};
use serde::{Deserialize, Serialize};

/// Prefix of environment overrides, e.g. `ACME_EXPLAIN__LOGGING__LEVEL=debug`.
pub const ENV_PREFIX: &str = "ACME_EXPLAIN__";

/// How the failure report is written to stdout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `{"failed": true, "kind": ..., "msg": ..., "other": {...}}`
    #[default]
    Json,
    /// The bare message
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` takes precedence when set.
    pub level: String,
    /// Emit JSON lines instead of human-readable logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_owned(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExplainConfig {
    /// Leading message of the report; the library default when unset.
    pub message: Option<String>,
    pub output: OutputFormat,
    pub logging: LoggingConfig,
}

impl ExplainConfig {
    /// Layered load: defaults, then the YAML file (if any), then
    /// `ACME_EXPLAIN__*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails when the file does not exist or a layer does not match the schema.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut figment = Figment::new().merge(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            if !path.is_file() {
                anyhow::bail!("config file does not exist: {}", path.display());
            }
            figment = figment.merge(Yaml::file(path));
        }
        figment
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .context("invalid configuration")
    }

    /// Apply command-line overrides on top of the loaded layers.
    pub fn apply_cli_overrides(
        &mut self,
        message: Option<String>,
        output: Option<OutputFormat>,
        verbose: u8,
    ) {
        if message.is_some() {
            self.message = message;
        }
        if let Some(output) = output {
            self.output = output;
        }
        match verbose {
            0 => {}
            1 => "info".clone_into(&mut self.logging.level),
            2 => "debug".clone_into(&mut self.logging.level),
            _ => "trace".clone_into(&mut self.logging.level),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use std::io::Write;

    fn yaml_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_file_or_env() {
        let config = temp_env::with_vars_unset(
            ["ACME_EXPLAIN__MESSAGE", "ACME_EXPLAIN__OUTPUT", "ACME_EXPLAIN__LOGGING__LEVEL"],
            || ExplainConfig::load(None).unwrap(),
        );
        assert_eq!(config, ExplainConfig::default());
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.output, OutputFormat::Json);
    }

    #[test]
    fn yaml_file_is_applied() {
        let file = yaml_file("message: Failed to finalize order\noutput: text\nlogging:\n  json: true\n");
        let config = temp_env::with_vars_unset(
            ["ACME_EXPLAIN__MESSAGE", "ACME_EXPLAIN__OUTPUT"],
            || ExplainConfig::load(Some(file.path())).unwrap(),
        );
        assert_eq!(config.message.as_deref(), Some("Failed to finalize order"));
        assert_eq!(config.output, OutputFormat::Text);
        assert!(config.logging.json);
        assert_eq!(config.logging.level, "warn");
    }

    #[test]
    fn env_overrides_file() {
        let file = yaml_file("logging:\n  level: info\n");
        let config = temp_env::with_var("ACME_EXPLAIN__LOGGING__LEVEL", Some("debug"), || {
            ExplainConfig::load(Some(file.path())).unwrap()
        });
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = ExplainConfig::load(Some(Path::new("/nonexistent/acme-explain.yaml"))).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = yaml_file("mesage: typo\n");
        let result = temp_env::with_vars_unset(["ACME_EXPLAIN__MESSAGE"], || {
            ExplainConfig::load(Some(file.path()))
        });
        assert!(result.is_err());
    }

    #[test]
    fn cli_overrides_win() {
        let mut config = ExplainConfig::default();
        config.apply_cli_overrides(Some("Custom".to_owned()), Some(OutputFormat::Text), 2);
        assert_eq!(config.message.as_deref(), Some("Custom"));
        assert_eq!(config.output, OutputFormat::Text);
        assert_eq!(config.logging.level, "debug");

        config.apply_cli_overrides(None, None, 0);
        assert_eq!(config.message.as_deref(), Some("Custom"));
        assert_eq!(config.logging.level, "debug");
    }
}
