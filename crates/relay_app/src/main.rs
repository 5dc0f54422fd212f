mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand};
use relay_engine::ClientError;
use relay_logging::{relay_error, LogDestination};

use config::RelayConfig;

#[derive(Parser)]
#[command(name = "contract-relay")]
#[command(about = "Webhook relay and status watcher for the contract processing pipeline")]
struct Cli {
    /// RON config file; defaults to ./contract-relay.ron when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Also write logs to this file.
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the webhook relay.
    Serve {
        #[arg(long)]
        bind: Option<String>,
    },
    /// Follow an account's processing status until it completes.
    Watch {
        account: String,
        #[arg(long)]
        relay_url: Option<String>,
        /// Backend access token; falls back to RELAY_TOKEN.
        #[arg(long)]
        token: Option<String>,
        /// List envelopes first, registering this relay as their webhook.
        #[arg(long, default_value_t = false)]
        register: bool,
    },
    /// Ask the contract assistant about the signed-in account's contracts.
    Chat {
        /// Question to send; may be omitted with --clear.
        message: Vec<String>,
        #[arg(long)]
        token: Option<String>,
        /// Forget earlier questions before asking.
        #[arg(long, default_value_t = false)]
        clear: bool,
    },
    /// Save one signed document into the output directory.
    Download {
        envelope: String,
        document: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        token: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match RelayConfig::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("configuration error: {err}");
            return ExitCode::from(2);
        }
    };
    init_logging(&config, cli.verbose, cli.log_file);

    let result = match cli.command {
        Command::Serve { bind } => commands::serve(config, bind).await,
        Command::Watch {
            account,
            relay_url,
            token,
            register,
        } => commands::watch(config, account, relay_url, token, register).await,
        Command::Chat {
            message,
            token,
            clear,
        } => commands::chat(config, message.join(" "), token, clear).await,
        Command::Download {
            envelope,
            document,
            name,
            token,
        } => commands::download(config, envelope, document, name, token).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            let unauthorized = err
                .downcast_ref::<ClientError>()
                .is_some_and(ClientError::is_unauthorized);
            if unauthorized {
                eprintln!("Your session has expired. Sign in again to get a new token.");
            } else {
                eprintln!("error: {err:#}");
            }
            relay_error!("command failed: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(config: &RelayConfig, verbose: u8, log_file: Option<PathBuf>) {
    let base = relay_logging::parse_level(&config.log).unwrap_or(log::LevelFilter::Info);
    let level = match verbose {
        0 => base,
        1 => base.max(log::LevelFilter::Debug),
        _ => log::LevelFilter::Trace,
    };
    let destination = match log_file {
        Some(path) => LogDestination::Both(path),
        None => LogDestination::Terminal,
    };
    relay_logging::initialize(destination, level);
}
