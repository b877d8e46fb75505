use clap::{Arg, ArgAction, ArgGroup, ArgMatches, Command};
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::process;
use std::time::Duration;

use cityguard::{
    config::GuardConfig,
    discovery::{NeighborDiscovery, TableFormat},
    inference::{FeatureBatch, FeatureVector, InferencePipeline, ModelGate},
    network::{resolve_ipv4, DeviceInfo},
    output::{OutputConfig, OutputFormat, OutputManager},
    scanner::{engine::local_address, PortProber, ProbeTarget},
    top_ports::parse_port_list,
    utils::Logger,
    GuardError,
};

fn cli() -> Command {
    Command::new("cityguard")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Network exposure and intrusion diagnostics")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file (default: ~/.cityguard.toml)")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable debug logging")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FORMAT")
                .help("Output format: text, json, csv")
                .default_value("text")
                .value_parser(clap::builder::PossibleValuesParser::new(["text", "json", "csv"]))
                .global(true),
        )
        .arg(
            Arg::new("output-file")
                .long("output-file")
                .value_name("FILE")
                .help("Write results to FILE instead of stdout")
                .value_parser(clap::value_parser!(PathBuf))
                .global(true),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colored output")
                .action(ArgAction::SetTrue)
                .global(true),
        )
        .subcommand(
            Command::new("ports")
                .about("Check which TCP ports of a host accept connections")
                .arg(
                    Arg::new("host")
                        .value_name("HOST")
                        .help("Host to probe (default: this machine)")
                        .index(1),
                )
                .arg(
                    Arg::new("ports")
                        .short('p')
                        .long("ports")
                        .value_name("PORTS")
                        .help("Ports to probe, e.g. 22,80,443 or 1-1024"),
                )
                .arg(
                    Arg::new("timeout")
                        .short('t')
                        .long("timeout")
                        .value_name("MS")
                        .help("Per-port connect timeout in milliseconds")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    Arg::new("show-closed")
                        .long("show-closed")
                        .help("Also list ports that did not accept a connection")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("neighbors")
                .about("List devices in the local neighbor (ARP) table")
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("FORMAT")
                        .help("Neighbor table layout: windows or bsd (default: native)")
                        .value_parser(clap::builder::PossibleValuesParser::new(["windows", "bsd"])),
                ),
        )
        .subcommand(
            Command::new("predict")
                .about("Classify 32-feature traffic records")
                .arg(
                    Arg::new("values")
                        .long("values")
                        .value_name("V1,...,V32")
                        .help("One record as 32 comma-separated numbers"),
                )
                .arg(
                    Arg::new("csv")
                        .long("csv")
                        .value_name("FILE")
                        .help("CSV file with a header row and 32 numeric columns")
                        .value_parser(clap::value_parser!(PathBuf)),
                )
                .group(ArgGroup::new("input").args(["values", "csv"]).required(true))
                .arg(
                    Arg::new("model")
                        .short('m')
                        .long("model")
                        .value_name("PATH")
                        .help("Classifier artifact (default: Model.onnx)")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(Command::new("info").about("Show information about this device"))
}

#[tokio::main]
async fn main() {
    let matches = cli().get_matches();

    let config_path = matches.get_one::<PathBuf>("config");
    let config = match GuardConfig::load(config_path.map(|p| p.as_path())) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{} {}", "[!] Failed to load config:".bright_red(), e);
            process::exit(1);
        }
    };

    let level = if matches.get_flag("verbose") {
        log::LevelFilter::Debug
    } else {
        config.logging.level_filter()
    };
    Logger::init(level);

    if let Err(e) = run(&matches, config).await {
        let code = e.downcast_ref::<GuardError>().map(|g| g.exit_code()).unwrap_or(1);
        eprintln!("{} {:#}", "[!] ERROR:".bright_red().bold(), e);
        if let Some(GuardError::ModelUnavailable { .. }) = e.downcast_ref::<GuardError>() {
            eprintln!(
                "{}",
                "    Export the trained classifier to ONNX and pass it with --model.".bright_yellow()
            );
        }
        process::exit(code);
    }
}

async fn run(matches: &ArgMatches, mut config: GuardConfig) -> anyhow::Result<()> {
    let format: OutputFormat = matches
        .get_one::<String>("output")
        .map(|s| s.parse())
        .transpose()
        .map_err(anyhow::Error::msg)?
        .unwrap_or(OutputFormat::Text);

    let mut output_config = OutputConfig {
        format,
        file: matches.get_one::<PathBuf>("output-file").cloned(),
        colored: !matches.get_flag("no-color"),
        ..OutputConfig::default()
    };

    match matches.subcommand() {
        Some(("ports", sub)) => {
            if let Some(spec) = sub.get_one::<String>("ports") {
                config.scanner.ports = parse_port_list(spec).map_err(GuardError::from)?;
            }
            if let Some(ms) = sub.get_one::<u64>("timeout") {
                config.scanner.timeout_ms = *ms;
            }
            config.validate()?;
            output_config.show_closed = sub.get_flag("show-closed");

            let host = match sub.get_one::<String>("host") {
                Some(host) => resolve_ipv4(host).await?,
                None => local_address(),
            };
            let target = ProbeTarget::new(host, &config.scanner.ports, config.scanner.timeout_duration())
                .map_err(GuardError::from)?;

            let spinner = spinner(format, format!("Probing {} ports on {}", target.ports().len(), host));
            let report = PortProber::from_config(&config.scanner).report(&target).await;
            spinner.finish_and_clear();

            OutputManager::new(output_config).write_scan(&report)?;
        }
        Some(("neighbors", sub)) => {
            if let Some(name) = sub.get_one::<String>("format") {
                let table_format: TableFormat = name.parse().map_err(anyhow::Error::msg)?;
                config.discovery.format = Some(table_format);
            }

            let spinner = spinner(format, "Reading neighbor table".to_string());
            let neighbors = NeighborDiscovery::from_config(&config.discovery).discover();
            spinner.finish_and_clear();

            OutputManager::new(output_config).write_neighbors(&neighbors)?;
        }
        Some(("predict", sub)) => {
            if let Some(model) = sub.get_one::<PathBuf>("model") {
                config.model.path = model.clone();
            }

            // Validate input before paying for the model load
            let batch = if let Some(values) = sub.get_one::<String>("values") {
                FeatureBatch::single(FeatureVector::parse_manual(values).map_err(GuardError::from)?)
            } else if let Some(path) = sub.get_one::<PathBuf>("csv") {
                FeatureBatch::from_csv_path(path)?
            } else {
                anyhow::bail!("either --values or --csv is required");
            };

            let gate = ModelGate::from_config(&config.model);
            let pipeline = InferencePipeline::from_gate(&gate)?;

            let spinner = spinner(format, format!("Classifying {} record(s)", batch.len()));
            let results = cityguard::classify(&pipeline, &batch);
            spinner.finish_and_clear();

            OutputManager::new(output_config).write_predictions(&results?, batch.column_names())?;
        }
        Some(("info", _)) => {
            OutputManager::new(output_config).write_device_info(&DeviceInfo::collect())?;
        }
        _ => unreachable!("subcommand_required is set"),
    }

    Ok(())
}

/// Spinner on stderr for text output; hidden for machine-readable formats
fn spinner(format: OutputFormat, message: String) -> ProgressBar {
    if format != OutputFormat::Text {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }

    #[test]
    fn test_predict_requires_an_input() {
        assert!(cli().try_get_matches_from(["cityguard", "predict"]).is_err());
        assert!(cli()
            .try_get_matches_from(["cityguard", "predict", "--values", "1", "--csv", "x.csv"])
            .is_err());
        assert!(cli().try_get_matches_from(["cityguard", "predict", "--csv", "x.csv"]).is_ok());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let matches = cli()
            .try_get_matches_from(["cityguard", "ports", "127.0.0.1", "-p", "22,80", "-o", "json"])
            .unwrap();
        assert_eq!(matches.get_one::<String>("output").map(String::as_str), Some("json"));
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, "ports");
        assert_eq!(sub.get_one::<String>("ports").map(String::as_str), Some("22,80"));
    }
}
