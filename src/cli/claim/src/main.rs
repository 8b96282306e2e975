use anyhow::{anyhow, Result};
use clap::{App, AppSettings, Arg, ArgMatches, SubCommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ClaimCommands, SimulateOptions};
use token_claim::ClaimConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let config_arg = Arg::with_name("config")
        .short("c")
        .long("config")
        .value_name("FILE")
        .help("Path to config file (defaults to the user config directory)")
        .takes_value(true);

    let matches = App::new("Token Claim CLI")
        .version("0.1")
        .author("PeoPay Team")
        .about("Inspect claim configuration and simulate the approve-then-claim flow")
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .subcommand(
            SubCommand::with_name("config")
                .about("Manage the claim configuration")
                .setting(AppSettings::SubcommandRequiredElseHelp)
                .subcommand(
                    SubCommand::with_name("init")
                        .about("Write a sample configuration")
                        .arg(config_arg.clone())
                        .arg(
                            Arg::with_name("force")
                                .short("f")
                                .long("force")
                                .help("Overwrite an existing file"),
                        ),
                )
                .subcommand(
                    SubCommand::with_name("show")
                        .about("Print the effective configuration")
                        .arg(config_arg.clone()),
                ),
        )
        .subcommand(
            SubCommand::with_name("simulate")
                .about("Run the claim flow against an in-memory chain")
                .arg(config_arg)
                .arg(
                    Arg::with_name("balance")
                        .short("b")
                        .long("balance")
                        .value_name("RAW")
                        .help("Legacy balance in raw units")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("rate")
                        .short("r")
                        .long("rate")
                        .value_name("RATE")
                        .help("Claim rate, 1000 is parity")
                        .takes_value(true)
                        .required(true),
                )
                .arg(
                    Arg::with_name("chain")
                        .long("chain")
                        .value_name("CHAIN_ID")
                        .help("Active chain id")
                        .takes_value(true)
                        .default_value("1"),
                )
                .arg(
                    Arg::with_name("poll-ms")
                        .long("poll-ms")
                        .value_name("MILLIS")
                        .help("Confirmation polling interval")
                        .takes_value(true)
                        .default_value("25"),
                )
                .arg(
                    Arg::with_name("no-logs")
                        .long("no-logs")
                        .help("Mine claims without a successor transfer log"),
                )
                .arg(
                    Arg::with_name("reject")
                        .long("reject")
                        .help("Reject every wallet prompt"),
                ),
        )
        .get_matches();

    match matches.subcommand() {
        ("config", Some(config_matches)) => match config_matches.subcommand() {
            ("init", Some(sub_matches)) => {
                let path = config_path(sub_matches);
                ClaimCommands::init_config(&path, sub_matches.is_present("force"))?;
                println!("Wrote sample configuration to {}", path.display());
            }
            ("show", Some(sub_matches)) => {
                let config = load_config(sub_matches)?;
                print!("{}", config.to_toml()?);
            }
            _ => println!("No config subcommand specified. Use --help for usage information."),
        },
        ("simulate", Some(sub_matches)) => {
            let config = if sub_matches.is_present("config") {
                load_config(sub_matches)?
            } else {
                ClaimCommands::sample_config()
            };

            let options = SimulateOptions {
                chain_id: parse_arg(sub_matches, "chain")?,
                balance: parse_arg(sub_matches, "balance")?,
                rate: parse_arg(sub_matches, "rate")?,
                poll_ms: parse_arg(sub_matches, "poll-ms")?,
                emit_successor_logs: !sub_matches.is_present("no-logs"),
                reject: sub_matches.is_present("reject"),
            };

            ClaimCommands::simulate(config, options).await?;
        }
        _ => println!("No subcommand specified. Use --help for usage information."),
    }

    Ok(())
}

fn config_path(matches: &ArgMatches) -> PathBuf {
    matches
        .value_of("config")
        .map(PathBuf::from)
        .unwrap_or_else(ClaimConfig::default_path)
}

fn load_config(matches: &ArgMatches) -> Result<ClaimConfig> {
    match matches.value_of("config") {
        Some(path) => Ok(ClaimConfig::from_path(&PathBuf::from(path))?),
        None => Ok(ClaimConfig::load()?),
    }
}

fn parse_arg<T>(matches: &ArgMatches, name: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = matches
        .value_of(name)
        .ok_or_else(|| anyhow!("Missing --{}", name))?;
    raw.parse::<T>()
        .map_err(|e| anyhow!("Invalid --{} {:?}: {}", name, raw, e))
}
