use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to run {}: {source}", .binary.display())]
    Spawn {
        binary: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{} report exited with {status}", .binary.display())]
    Failed { binary: PathBuf, status: ExitStatus },
    #[error("simpleperf output is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// How to invoke the simpleperf binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimpleperfConfig {
    /// Path or name of the simpleperf executable.
    pub binary: PathBuf,
    /// File the generated report is written to before parsing.
    pub report_file: PathBuf,
    /// Ask for complete call graphs instead of brief ones.
    pub full_callgraph: bool,
}

impl Default for SimpleperfConfig {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("simpleperf"),
            report_file: PathBuf::from("perf.report"),
            full_callgraph: true,
        }
    }
}

impl SimpleperfConfig {
    /// Defaults overridden by `SIMPLEPERF` and `SIMPLEPERF_REPORT_FILE`.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(binary) = non_empty_var("SIMPLEPERF") {
            config.binary = PathBuf::from(binary);
        }
        if let Some(file) = non_empty_var("SIMPLEPERF_REPORT_FILE") {
            config.report_file = PathBuf::from(file);
        }
        config
    }

    /// Arguments that make `simpleperf report` write a parseable report file.
    pub fn report_args(&self, args: &[String]) -> Vec<OsString> {
        let mut out: Vec<OsString> = vec!["report".into()];
        if self.full_callgraph {
            out.push("--full-callgraph".into());
        }
        out.extend(args.iter().map(OsString::from));
        out.push("-o".into());
        out.push(self.report_file.clone().into_os_string());
        out
    }

    fn command(&self) -> Command {
        Command::new(&self.binary)
    }

    fn check(&self, status: ExitStatus) -> Result<(), SourceError> {
        if status.success() {
            Ok(())
        } else {
            Err(SourceError::Failed {
                binary: self.binary.clone(),
                status,
            })
        }
    }

    fn spawn_error(&self, source: io::Error) -> SourceError {
        SourceError::Spawn {
            binary: self.binary.clone(),
            source,
        }
    }
}

/// Where report text comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReportSource {
    /// A report file written earlier by `simpleperf report`.
    File(PathBuf),
    /// Run `simpleperf report` with extra arguments and read what it wrote.
    Simpleperf {
        config: SimpleperfConfig,
        args: Vec<String>,
    },
}

impl ReportSource {
    pub fn read_text(&self) -> Result<String, SourceError> {
        match self {
            Self::File(path) => read_file(path),
            Self::Simpleperf { config, args } => {
                let report_args = config.report_args(args);
                tracing::info!(
                    binary = %config.binary.display(),
                    ?report_args,
                    "running simpleperf"
                );
                let status = config
                    .command()
                    .args(&report_args)
                    .status()
                    .map_err(|e| config.spawn_error(e))?;
                config.check(status)?;
                read_file(&config.report_file)
            }
        }
    }
}

/// Run `simpleperf report` and let it print its plain text report.
pub fn run_report_passthrough(
    config: &SimpleperfConfig,
    args: &[String],
) -> Result<(), SourceError> {
    let status = config
        .command()
        .arg("report")
        .args(args)
        .status()
        .map_err(|e| config.spawn_error(e))?;
    config.check(status)
}

/// Option help of `simpleperf report`, without its leading usage line.
pub fn report_help(config: &SimpleperfConfig) -> Result<String, SourceError> {
    let output = config
        .command()
        .args(["report", "-h"])
        .stderr(Stdio::inherit())
        .output()
        .map_err(|e| config.spawn_error(e))?;
    let text = String::from_utf8(output.stdout)?;
    Ok(strip_first_line(&text).to_string())
}

fn non_empty_var(name: &str) -> Option<OsString> {
    std::env::var_os(name).filter(|value| !value.is_empty())
}

fn strip_first_line(text: &str) -> &str {
    text.split_once('\n').map_or("", |(_, rest)| rest)
}

fn read_file(path: &Path) -> Result<String, SourceError> {
    std::fs::read_to_string(path).map_err(|source| SourceError::Read {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_args_write_to_report_file() {
        let config = SimpleperfConfig::default();
        let args = config.report_args(&["-i".to_string(), "perf.data".to_string()]);
        assert_eq!(
            args,
            vec!["report", "--full-callgraph", "-i", "perf.data", "-o", "perf.report"]
        );

        let brief = SimpleperfConfig {
            full_callgraph: false,
            report_file: PathBuf::from("/tmp/out.txt"),
            ..SimpleperfConfig::default()
        };
        assert_eq!(brief.report_args(&[]), vec!["report", "-o", "/tmp/out.txt"]);
    }

    #[test]
    fn help_drops_usage_line() {
        assert_eq!(
            strip_first_line("Usage: simpleperf report [options]\n-i <file>\n"),
            "-i <file>\n"
        );
        assert_eq!(strip_first_line("only one line"), "");
    }

    #[test]
    fn reads_report_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("perf.report");
        std::fs::write(&path, "Event: cpu-cycles (type 0, config 0)\n").unwrap();

        let text = ReportSource::File(path).read_text().unwrap();
        assert_eq!(text, "Event: cpu-cycles (type 0, config 0)\n");
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.report");
        let err = ReportSource::File(path.clone()).read_text().unwrap_err();
        assert!(matches!(err, SourceError::Read { path: ref p, .. } if *p == path));
    }

    #[test]
    fn missing_binary_is_a_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let config = SimpleperfConfig {
            binary: dir.path().join("no-such-simpleperf"),
            ..SimpleperfConfig::default()
        };
        let err = run_report_passthrough(&config, &[]).unwrap_err();
        assert!(matches!(err, SourceError::Spawn { .. }));
    }
}
