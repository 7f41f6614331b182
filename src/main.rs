//! Guerrero - Media Metadata Collection
//!
//! This is the main entry point for the Guerrero command line tool, which
//! collects mediainfo data of files on local disks, FTP hosts and SMB shares.

use anyhow::Result;
use clap::Parser;
use std::path::Path;
use tracing::{Level, info};
use tracing_appender::{non_blocking, rolling};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use guerrero::cli::{Args, Commands};
use guerrero::config::Config;
use guerrero::workflow::Workflow;

const DEFAULT_CONFIG_FILE: &str = "guerrero.toml";

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Setup logging to both console and file
    setup_logging(args.verbose)?;

    // Load configuration
    let mut config = match &args.config {
        Some(config_path) => Config::from_file(config_path)?,
        None => {
            // Try to load guerrero.toml from current directory first
            if Path::new(DEFAULT_CONFIG_FILE).exists() {
                info!("Found {} in current directory, loading...", DEFAULT_CONFIG_FILE);
                Config::from_file(DEFAULT_CONFIG_FILE)?
            } else {
                Config::default()
            }
        }
    };

    // Execute command
    match args.command {
        Commands::Local { directory, options } => {
            options.apply(&mut config);
            Workflow::new(config).collect_local(&directory).await?;
        }
        Commands::Ftp {
            directory,
            host,
            port,
            user,
            password,
            options,
        } => {
            options.apply(&mut config);
            if let Some(host) = host {
                config.ftp.host = host;
            }
            if let Some(port) = port {
                config.ftp.port = port;
            }
            if let Some(user) = user {
                config.ftp.user = user;
            }
            if let Some(password) = password {
                config.ftp.password = password;
            }

            Workflow::new(config).collect_ftp(&directory).await?;
        }
        Commands::Smb {
            directory,
            service,
            user,
            password,
            options,
        } => {
            options.apply(&mut config);
            if let Some(service) = service {
                config.smb.service = service;
            }
            if user.is_some() {
                config.smb.username = user;
            }
            if password.is_some() {
                config.smb.password = password;
            }

            Workflow::new(config).collect_smb(&directory).await?;
        }
        Commands::Probe { file, strict } => {
            if strict {
                config.normalizer.strict = true;
            }

            let infos = Workflow::new(config).probe(&file).await?;
            println!("{}", serde_json::to_string_pretty(&infos)?);
        }
        Commands::InitConfig { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists, use --force to overwrite it",
                    output.display()
                );
            }

            config.save_to_file(&output)?;
            println!("Configuration written to {}", output.display());
        }
    }

    Ok(())
}

fn setup_logging(verbose: bool) -> Result<()> {
    // Create log directory
    let guerrero_dir = std::env::current_dir()?.join(".guerrero");
    let log_dir = guerrero_dir.join("log");
    std::fs::create_dir_all(&log_dir)?;

    // Set up file appender with daily rotation
    let file_appender = rolling::daily(&log_dir, "guerrero.log");
    let (non_blocking_file, _guard) = non_blocking(file_appender);
    // Keep the guard alive for the duration of the program
    std::mem::forget(_guard);

    // Determine log level
    let log_level = if verbose { Level::DEBUG } else { Level::INFO };

    // Console logs go to stderr, stdout carries the results
    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    // Create file layer
    let file_layer = fmt::layer()
        .with_writer(non_blocking_file)
        .with_target(false)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_file(true)
        .with_line_number(true)
        .with_ansi(false); // No ANSI colors in file

    // Setup layered subscriber
    let subscriber = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(console_layer)
        .with(file_layer);

    // Initialize the subscriber
    subscriber
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    info!(
        "Logging initialized - console: {}, file: {}",
        log_level,
        log_dir.join("guerrero.log").display()
    );

    Ok(())
}
