use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use std::path::PathBuf;
use terratiles::{Config, TileServer, catalog::Catalog};

#[derive(Parser, Debug)]
#[command(
	author,
	version,
	about,
	long_about = None,
	propagate_version = true,
	disable_help_subcommand = true,
)]
struct Cli {
	#[command(subcommand)]
	command: Commands,

	#[command(flatten)]
	verbose: Verbosity<InfoLevel>,
}

#[derive(Subcommand, Debug)]
enum Commands {
	/// Serve the configured layers over WMS, WMTS and TMS
	Serve {
		/// Path to the descriptor file
		#[arg(short, long)]
		config: PathBuf,
	},

	/// Validate a descriptor without serving
	Check {
		/// Path to the descriptor file
		#[arg(short, long)]
		config: PathBuf,
	},
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	env_logger::Builder::new()
		.filter_level(cli.verbose.log_level_filter())
		.format_timestamp(None)
		.init();

	match cli.command {
		Commands::Serve { config } => serve(&config),
		Commands::Check { config } => check(&config),
	}
}

fn runtime(worker_threads: usize) -> Result<tokio::runtime::Runtime> {
	let mut builder = tokio::runtime::Builder::new_multi_thread();
	if worker_threads > 0 {
		builder.worker_threads(worker_threads);
	}
	builder.enable_all().build().context("building the worker runtime")
}

fn serve(path: &PathBuf) -> Result<()> {
	let config = Config::from_path(path)?;
	let rt = runtime(config.server.worker_threads)?;
	rt.block_on(async move {
		let mut server = TileServer::from_config(config).await?;
		server.start().await?;
		wait_for_shutdown(&server, path).await?;
		server.stop().await;
		Ok(())
	})
}

/// Blocks until ctrl-c; on unix, SIGHUP reloads the descriptor in place
/// while serving continues from the previous catalogue.
#[cfg(unix)]
async fn wait_for_shutdown(server: &TileServer, path: &PathBuf) -> Result<()> {
	use tokio::signal::unix::{SignalKind, signal};
	let mut hangup = signal(SignalKind::hangup()).context("installing the SIGHUP handler")?;
	loop {
		tokio::select! {
			result = tokio::signal::ctrl_c() => {
				result.context("waiting for shutdown signal")?;
				return Ok(());
			}
			_ = hangup.recv() => {
				log::info!("SIGHUP received, reloading '{}'", path.display());
				match Config::from_path(path) {
					Ok(next) => {
						if let Err(err) = server.reload(&next).await {
							log::error!("reload failed, keeping the current catalogue: {err:#}");
						}
					}
					Err(err) => log::error!("reload failed, keeping the current catalogue: {err:#}"),
				}
			}
		}
	}
}

#[cfg(not(unix))]
async fn wait_for_shutdown(_server: &TileServer, _path: &PathBuf) -> Result<()> {
	tokio::signal::ctrl_c().await.context("waiting for shutdown signal")
}

fn check(path: &PathBuf) -> Result<()> {
	let config = Config::from_path(path)?;
	let rt = runtime(1)?;
	rt.block_on(async move {
		let catalog = Catalog::build(&config).await?;
		println!(
			"descriptor OK: {} layer(s), {} pyramid(s), {} style(s), {} TMS",
			catalog.layers.len(),
			catalog.pyramids.len(),
			catalog.styles.len(),
			catalog.tms.len()
		);
		Ok(())
	})
}
