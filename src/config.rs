//! TOML configuration of a conversion run.
//!
//! Only `input.path` is required, everything else falls back to a default:
//!
//! ```toml
//! [input]
//! path = "jawiki-latest-pages-articles.xml.bz2"
//!
//! [admission]
//! special_title_prefix = "Wikipedia:"
//! skip_redirects = false
//!
//! [output]
//! path = "records.jsonl"   # stdout if omitted
//! record_type = "wikipedia"
//!
//! [pipeline]
//! workers = 4
//! queue_capacity = 64
//! max_pages = 1000
//!
//! [logging]
//! level = "info"
//! format = "text"
//! ```

use std::{
    fmt,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{
    admission::{AdmissionFilter, DEFAULT_SPECIAL_TITLE_PREFIX},
    pipeline::{PipelineOptions, DEFAULT_QUEUE_CAPACITY},
    record::DEFAULT_RECORD_TYPE,
};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config file {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub admission: AdmissionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InputConfig {
    /// The bzip2 compressed XML dump.
    #[serde(default)]
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AdmissionConfig {
    /// Pages whose title starts with this are skipped. Empty disables the rule.
    #[serde(default = "default_special_title_prefix")]
    pub special_title_prefix: String,
    #[serde(default)]
    pub skip_redirects: bool,
}

fn default_special_title_prefix() -> String {
    DEFAULT_SPECIAL_TITLE_PREFIX.to_string()
}

impl Default for AdmissionConfig {
    fn default() -> Self {
        Self {
            special_title_prefix: default_special_title_prefix(),
            skip_redirects: false,
        }
    }
}

impl AdmissionConfig {
    pub fn filter(&self) -> AdmissionFilter {
        AdmissionFilter::new(self.special_title_prefix.as_str(), self.skip_redirects)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputConfig {
    /// JSON lines file to write, stdout if unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default = "default_record_type")]
    pub record_type: String,
}

fn default_record_type() -> String {
    DEFAULT_RECORD_TYPE.to_string()
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: None,
            record_type: default_record_type(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// 0 runs the sequential loop.
    #[serde(default)]
    pub workers: usize,
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    #[serde(default)]
    pub max_pages: Option<usize>,
}

fn default_queue_capacity() -> usize {
    DEFAULT_QUEUE_CAPACITY
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_pages: None,
        }
    }
}

impl PipelineConfig {
    pub fn options(&self) -> PipelineOptions {
        PipelineOptions {
            workers: self.workers,
            queue_capacity: self.queue_capacity,
            max_pages: self.max_pages,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }

    /// The level `steps` notches more verbose, saturating at trace.
    pub fn more_verbose(self, steps: u8) -> Self {
        const LEVELS: [LogLevel; 5] = [
            LogLevel::Error,
            LogLevel::Warn,
            LogLevel::Info,
            LogLevel::Debug,
            LogLevel::Trace,
        ];
        let index = self as usize + steps as usize;
        LEVELS[index.min(LEVELS.len() - 1)]
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: LogLevel,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
}

fn default_log_level() -> LogLevel {
    LogLevel::Info
}

fn default_log_format() -> LogFormat {
    LogFormat::Text
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Read and parse a config file. Not validated yet, since the command line
    /// may still fill in the input path.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Report every problem at once rather than the first one found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();

        if self.input.path.as_os_str().is_empty() {
            errors.push("input.path must be set".to_string());
        }
        if self.pipeline.queue_capacity == 0 {
            errors.push("pipeline.queue_capacity must be positive".to_string());
        }
        if self.pipeline.max_pages == Some(0) {
            errors.push("pipeline.max_pages must be positive when set".to_string());
        }
        if self.output.record_type.is_empty() {
            errors.push("output.record_type must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_minimal_config() {
        let file = write_config("[input]\npath = \"enwiki.xml.bz2\"\n");
        let config = Config::load(file.path()).unwrap();
        config.validate().unwrap();

        assert_eq!(config.input.path, PathBuf::from("enwiki.xml.bz2"));
        assert_eq!(config.admission, AdmissionConfig::default());
        assert_eq!(config.admission.special_title_prefix, "Wikipedia:");
        assert_eq!(config.output.path, None);
        assert_eq!(config.output.record_type, "wikipedia");
        assert_eq!(config.pipeline.options(), PipelineOptions::default());
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[test]
    fn test_full_config() {
        let file = write_config(
            r#"
[input]
path = "/data/jawiki.xml.bz2"

[admission]
special_title_prefix = "Wikipedia:"
skip_redirects = true

[output]
path = "records.jsonl"
record_type = "jawiki"

[pipeline]
workers = 4
queue_capacity = 16
max_pages = 1000

[logging]
level = "debug"
format = "json"
"#,
        );
        let config = Config::load(file.path()).unwrap();
        config.validate().unwrap();

        assert!(config.admission.skip_redirects);
        assert_eq!(config.output.path, Some(PathBuf::from("records.jsonl")));
        assert_eq!(config.output.record_type, "jawiki");
        assert_eq!(
            config.pipeline.options(),
            PipelineOptions {
                workers: 4,
                queue_capacity: 16,
                max_pages: Some(1000),
            }
        );
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_validation_collects_all_errors() {
        let file = write_config("[pipeline]\nqueue_capacity = 0\nmax_pages = 0\n");
        let config = Config::load(file.path()).unwrap();

        match config.validate() {
            Err(ConfigError::Invalid(errors)) => {
                assert_eq!(errors.len(), 3, "{errors:?}");
                assert!(errors[0].contains("input.path"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_parse_errors() {
        let file = write_config("[pipeline]\nworkers = \"many\"\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let file = write_config("[logging]\nlevel = \"loud\"\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));

        let file = write_config("[inptu]\npath = \"x\"\n");
        assert!(matches!(
            Config::load(file.path()),
            Err(ConfigError::Parse { .. })
        ));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Config::load(&dir.path().join("missing.toml")),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_log_level_verbosity() {
        assert_eq!(LogLevel::Info.more_verbose(0), LogLevel::Info);
        assert_eq!(LogLevel::Info.more_verbose(1), LogLevel::Debug);
        assert_eq!(LogLevel::Warn.more_verbose(9), LogLevel::Trace);
        assert_eq!(LogLevel::Debug.to_string(), "debug");
    }

    #[test]
    fn test_empty_prefix_disables_special_titles() {
        let admission = AdmissionConfig {
            special_title_prefix: String::new(),
            skip_redirects: false,
        };
        assert_eq!(admission.filter(), AdmissionFilter::new("", false));
    }
}
