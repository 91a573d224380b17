use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use sharenix::{
    client_builder::build_client,
    collaborators::Collaborators,
    config::{load_config, load_sites, sites_search_path},
    dispatch::{DispatchOptions, Dispatcher, Mode},
    errors::CliError,
    executor::Executor,
    history::HistoryLedger,
    log_setup::configure_logging,
    output::{error_notification, format_history_listing, format_result, success_notification},
    paths::Storage,
};

#[deny(unused_imports)]
#[deny(unused_variables)]
#[deny(unused_mut)]
#[deny(unsafe_code)]
// Dependencies
#[macro_use]
extern crate log;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Upload mode: f/file, fs/fullscreen, c/clipboard, u/url.
    #[arg(short, long, default_value = "f")]
    mode: String,
    /// Target site name. `default` picks the default site for the mode.
    #[arg(short, long, default_value = "default")]
    site: String,
    /// Disable all terminal output except errors.
    #[arg(short, long)]
    quiet: bool,
    /// Show desktop notifications for the upload.
    #[arg(short, long)]
    notify: bool,
    /// Open the uploaded url in the default browser.
    #[arg(short, long)]
    open: bool,
    /// Copy the url to the clipboard after uploading.
    #[arg(short = 'c', long = "copy")]
    copy_url: bool,
    /// Show upload history (grep-able).
    #[arg(long)]
    history: bool,
    /// Application config file path.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Sites file path.
    #[arg(long)]
    sites: Option<PathBuf>,
    /// Log filter, e.g. `debug` or `sharenix=trace`.
    #[arg(long)]
    log_level: Option<String>,
    /// File path or url, depending on the mode.
    input: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    configure_logging(&cli.log_level, cli.quiet).ok();

    let app = load_config(&cli.config).context("failed to load config")?;
    let sites_path = cli.sites.clone().or_else(|| app.sites.clone());
    let sites = load_sites(sites_path.as_deref(), &sites_search_path())?;
    let storage = Storage::resolve(&app, &sites).context("failed to resolve storage directory")?;

    if cli.history {
        let records = HistoryLedger::new(storage.history_file())
            .read_all()
            .await
            .context("failed to read upload history")?;
        println!("{}", format_history_listing(&records));
        return Ok(());
    }

    let mode: Mode = cli.mode.parse()?;
    if mode.needs_input() && cli.input.is_none() {
        return Err(CliError::MissingInput(cli.mode.clone()))
            .context("pass a file path or url as the last argument")?;
    }

    let client = build_client(&app).context("failed to build http client")?;
    let plugins_dir = storage.plugins_dir()?;
    let executor = Executor::new(client, plugins_dir, app.plugin_timeout);
    let collaborators = Collaborators::with_notify_command(sites.notify_command.clone());
    let dispatcher = Dispatcher::new(sites, executor, storage, collaborators);

    let options = DispatchOptions {
        notify: cli.notify,
        open: cli.open,
        copy_url: cli.copy_url,
    };
    debug!("Dispatching {:?} to {}", mode, cli.site);

    match dispatcher
        .dispatch(mode, &cli.site, cli.input.as_deref(), &options)
        .await
    {
        Ok(result) => {
            if !cli.quiet {
                println!("{}", format_result(&result));
            }
            if cli.notify {
                if let Err(e) = dispatcher.notify(&success_notification(&result.url)).await {
                    warn!("Failed to show notification: {}", e);
                }
            }
            Ok(())
        }
        Err(e) => {
            if cli.notify {
                if let Err(notify_err) = dispatcher.notify(&error_notification(&e.to_string())).await {
                    warn!("Failed to show notification: {}", notify_err);
                }
            }
            Err(e).context("upload failed")
        }
    }
}
