use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::{error, info};

use devantech_relays::{RelayClient, RelayConfig, RelayResult};

#[derive(Parser)]
#[command(name = "devantech-relays")]
#[command(about = "Control Devantech ETH-series relay modules over TCP")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Module address (IP or hostname)
    #[arg(long, env = "RELAY_HOST")]
    host: Option<String>,

    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// TCP/IP password, if the module has one set
    #[arg(long, env = "RELAY_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    #[arg(long, env = "RELAY_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show module model and versions
    Info,

    /// Show the state of every relay
    Status,

    /// Show the state of one relay
    Get {
        /// Relay number, starting at 1
        relay: u8,
    },

    /// Switch one relay on or off
    Set {
        relay: u8,

        /// on/off, true/false or 1/0
        #[arg(value_parser = parse_state, action = clap::ArgAction::Set)]
        state: bool,

        /// Revert after this many milliseconds (100..=25500)
        #[arg(long)]
        pulse_ms: Option<u64>,
    },

    /// Show digital input states
    Inputs,

    /// Read an analogue input
    Analogue { channel: u8 },

    /// Show the relay supply voltage
    Volts,

    /// Show the module MAC address
    Mac,
}

fn parse_state(raw: &str) -> Result<bool, String> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "on" => Ok(true),
        "false" | "0" | "off" => Ok(false),
        _ => Err(format!("invalid relay state '{raw}' (expected on/off)")),
    }
}

fn build_config(cli: &Cli) -> RelayResult<RelayConfig> {
    let mut config = RelayConfig::new(
        cli.host.clone().unwrap_or_default(),
        cli.password.clone().unwrap_or_default(),
    );
    if let Some(port) = cli.port {
        config = config.with_port(port);
    }
    if let Some(secs) = cli.timeout_secs {
        config = config.with_timeout(Duration::from_secs(secs));
    }
    config.validate()?;
    Ok(config)
}

fn on_off(state: bool) -> &'static str {
    if state { "on" } else { "off" }
}

async fn run(cli: Cli) -> RelayResult<()> {
    let config = build_config(&cli)?;
    let client = RelayClient::with_config(config);

    match cli.command {
        Commands::Info => {
            let info = client.module_info().await?;
            if cli.json {
                println!("{}", json!(info));
            } else {
                println!(
                    "{} (id {}), hardware v{}, firmware v{}",
                    info.model.name, info.model.id, info.hardware_version, info.firmware_version
                );
                println!(
                    "{} relays, {} digital IO, {} analogue inputs",
                    info.model.relays, info.model.digital_io, info.model.analogue_inputs
                );
            }
        }
        Commands::Status => {
            let states = client.relay_states().await?;
            if cli.json {
                println!("{}", json!(states));
            } else {
                for (index, state) in states.iter() {
                    println!("relay {index}: {}", on_off(state));
                }
            }
        }
        Commands::Get { relay } => {
            let state = client.get_relay_state(relay).await?;
            if cli.json {
                println!("{}", json!({ "relay": relay, "state": state }));
            } else {
                println!("relay {relay}: {}", on_off(state));
            }
        }
        Commands::Set {
            relay,
            state,
            pulse_ms,
        } => match pulse_ms {
            Some(ms) => {
                client
                    .pulse_relay(relay, state, Duration::from_millis(ms))
                    .await?
            }
            None => client.set_relay_state(relay, state).await?,
        },
        Commands::Inputs => {
            let inputs = client.digital_inputs().await?;
            if cli.json {
                println!("{}", json!(inputs));
            } else {
                for (i, active) in inputs.iter().enumerate() {
                    println!("input {}: {}", i + 1, if *active { "active" } else { "inactive" });
                }
            }
        }
        Commands::Analogue { channel } => {
            let value = client.analogue_input(channel).await?;
            if cli.json {
                println!("{}", json!({ "channel": channel, "value": value }));
            } else {
                println!("channel {channel}: {value}");
            }
        }
        Commands::Volts => {
            let volts = client.supply_voltage().await?;
            if cli.json {
                println!("{}", json!({ "volts": volts }));
            } else {
                println!("{volts:.1}V");
            }
        }
        Commands::Mac => {
            let mac = client.mac_address().await?;
            let rendered = mac
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect::<Vec<_>>()
                .join(":");
            if cli.json {
                println!("{}", json!({ "mac": rendered }));
            } else {
                println!("{rendered}");
            }
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    if let Some(host) = &cli.host {
        info!("Using relay module at {}", host);
    }

    if let Err(e) = run(cli).await {
        error!("{} ({:?})", e, e.kind());
        std::process::exit(1);
    }
}
