use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use simpleperf_report_core::model::EventReport;
use simpleperf_report_core::source::{self, ReportSource, SimpleperfConfig};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "\
simpleperf-report   A wrapper around the simpleperf report command.

Usage:
  simpleperf-report [--json] <report-file>       show a report file written by simpleperf report
  simpleperf-report [--json] --tree [args...]    run simpleperf report with full call graphs and show them
  simpleperf-report [args...]                    run simpleperf report and print its plain output

Options supported by simpleperf report command:";

#[derive(Debug, PartialEq)]
enum Mode {
    Help,
    Show { source: ReportSource, json: bool },
    Passthrough(Vec<String>),
}

fn parse_args(args: Vec<String>, config: &SimpleperfConfig) -> Mode {
    if args.iter().any(|a| a == "-h" || a == "--help") {
        return Mode::Help;
    }

    let json = args.iter().any(|a| a == "--json");
    let tree = args.iter().any(|a| a == "--tree");
    let rest: Vec<String> = args
        .into_iter()
        .filter(|a| a != "--json" && a != "--tree")
        .collect();

    if let [path] = rest.as_slice()
        && !tree
        && std::path::Path::new(path).is_file()
    {
        return Mode::Show {
            source: ReportSource::File(PathBuf::from(path)),
            json,
        };
    }

    if tree || json {
        Mode::Show {
            source: ReportSource::Simpleperf {
                config: config.clone(),
                args: rest,
            },
            json,
        }
    } else {
        Mode::Passthrough(rest)
    }
}

fn write_reports(out: &mut impl Write, reports: &[EventReport], json: bool) -> Result<()> {
    if json {
        serde_json::to_writer_pretty(&mut *out, reports)?;
        writeln!(out)?;
    } else {
        for report in reports {
            writeln!(out, "{report}")?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "simpleperf_report=info,simpleperf_report_core=info".into()),
        )
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let config = SimpleperfConfig::from_env();
    let args: Vec<String> = std::env::args().skip(1).collect();

    match parse_args(args, &config) {
        Mode::Help => {
            let help = source::report_help(&config).context("failed to query simpleperf")?;
            let mut out = io::stdout().lock();
            writeln!(out, "{USAGE}")?;
            write!(out, "{help}")?;
        }
        Mode::Show {
            source: report_source,
            json,
        } => {
            let parsed = simpleperf_report_core::load_report(&report_source)
                .with_context(|| format!("failed to load report from {report_source:?}"))?;
            if parsed.event_reports.is_empty() {
                tracing::warn!("report contains no events");
            }
            write_reports(&mut io::stdout().lock(), &parsed.event_reports, json)?;
        }
        Mode::Passthrough(args) => source::run_report_passthrough(&config, &args)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn help_wins() {
        let config = SimpleperfConfig::default();
        assert_eq!(parse_args(args(&["-i", "x", "--help"]), &config), Mode::Help);
    }

    #[test]
    fn plain_args_are_forwarded() {
        let config = SimpleperfConfig::default();
        assert_eq!(
            parse_args(args(&["-i", "perf.data", "--sort", "comm"]), &config),
            Mode::Passthrough(args(&["-i", "perf.data", "--sort", "comm"]))
        );
    }

    #[test]
    fn tree_runs_simpleperf() {
        let config = SimpleperfConfig::default();
        assert_eq!(
            parse_args(args(&["--tree", "-i", "perf.data"]), &config),
            Mode::Show {
                source: ReportSource::Simpleperf {
                    config: config.clone(),
                    args: args(&["-i", "perf.data"]),
                },
                json: false,
            }
        );
    }

    #[test]
    fn existing_file_is_shown() {
        let path = std::env::current_exe().unwrap();
        let path_str = path.to_string_lossy().into_owned();
        let config = SimpleperfConfig::default();
        assert_eq!(
            parse_args(vec![path_str, "--json".to_string()], &config),
            Mode::Show {
                source: ReportSource::File(path),
                json: true,
            }
        );
    }

    #[test]
    fn text_output_dumps_reports() {
        let parsed = simpleperf_report_core::parsers::parse_event_reports(&[
            "Event: cpu-cycles (type 0, config 0)",
            "",
            "Overhead  Symbol",
            "100.00%  main",
        ])
        .unwrap();
        let mut out = Vec::new();
        write_reports(&mut out, &parsed.event_reports, false).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Event: cpu-cycles (type 0, config 0)\n\nOverhead  Symbol\nReportItem (raw_line 100.00%  main)\n\n"
        );
    }
}
