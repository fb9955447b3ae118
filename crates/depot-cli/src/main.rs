use std::{env, fs, process::Command, sync::Arc};

use clap::Parser;
use cli::{Args, Commands};
use depot_config::config::{config_path, generate_default_config, Config};
use depot_core::{
    error::{ErrorContext, MirrorError},
    MirrorResult,
};
use depot_events::{ChannelSink, EventSinkHandle, NullSink};
use logging::setup_logging;
use progress::{spawn_event_handler, ProgressGuard};
use status::display_status;
use sync::{print_report, sync_mirror, SyncFlags};
use tracing::{info, warn};
use utils::{progress_enabled, set_flag, COLOR, PROGRESS};

mod cli;
mod logging;
mod progress;
mod status;
mod sync;
mod utils;

/// Event sink for a run, plus the progress thread rendering it when enabled.
fn create_event_sink(json: bool) -> (EventSinkHandle, Option<ProgressGuard>) {
    if progress_enabled() && !json {
        let (sink, receiver) = ChannelSink::new();
        let events: EventSinkHandle = Arc::new(sink);
        (events, Some(spawn_event_handler(receiver)))
    } else {
        let events: EventSinkHandle = Arc::new(NullSink);
        (events, None)
    }
}

fn load_config(args: &Args) -> MirrorResult<(std::path::PathBuf, Config)> {
    let path = config_path(args.config.as_deref())?;
    let mut config = Config::load(&path)?;

    if let Some(workers) = args.workers {
        config.workers = Some(workers);
    }
    if let Some(user_agent) = &args.user_agent {
        config.user_agent = Some(user_agent.clone());
    }
    config.resolve()?;

    Ok((path, config))
}

async fn handle_cli() -> MirrorResult<()> {
    let args = Args::parse();

    if let Err(err) = setup_logging(&args) {
        eprintln!("failed to set up logging: {err}");
    }

    if args.no_color {
        set_flag(&COLOR, false);
    }
    if args.no_progress || args.quiet {
        set_flag(&PROGRESS, false);
    }

    if let Commands::DefConfig = args.command {
        let path = config_path(args.config.as_deref())?;
        generate_default_config(&path)?;
        return Ok(());
    }

    let (path, config) = load_config(&args)?;

    match args.command {
        Commands::Sync {
            no_update,
            skip_download,
            skip_reconcile,
            no_yanked,
        } => {
            let flags = SyncFlags {
                no_update,
                skip_download,
                skip_reconcile,
                no_yanked,
            };
            let (events, progress_guard) = create_event_sink(args.json);
            let result = sync_mirror(&config, args.proxy.as_deref(), flags, events).await;

            // Every sender is gone once the mirror is dropped, so the handler drains.
            if let Some(guard) = progress_guard {
                guard.finish();
            }
            progress::stop();

            print_report(&result?);
        }
        Commands::Status => display_status(&config, args.json)?,
        Commands::Env => {
            info!("DEPOT_CONFIG={}", path.display());
            info!("DEPOT_INDEX={}", config.get_index_path()?.display());
            info!("DEPOT_DB={}", config.get_db_path()?.display());
            info!("DEPOT_ARCHIVES={}", config.get_archive_path()?.display());
            info!("DEPOT_INDEX_URL={}", config.get_index_url());
        }
        Commands::Config { edit } => {
            match edit {
                Some(editor) => {
                    let editor = editor
                        .or_else(|| env::var("EDITOR").ok())
                        .unwrap_or_else(|| "vi".to_string());
                    Command::new(&editor)
                        .arg(&path)
                        .status()
                        .with_context(|| {
                            format!("executing command {} {}", editor, path.display())
                        })?;
                }
                None => {
                    let content = match fs::read_to_string(&path) {
                        Ok(content) => content,
                        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                            warn!("Config file {} not found", path.display());
                            config.to_annotated_document()?.to_string()
                        }
                        Err(err) => {
                            return Err(MirrorError::IoError {
                                action: "reading config".to_string(),
                                source: err,
                            });
                        }
                    };
                    info!("{}", content);
                }
            };
        }
        Commands::DefConfig => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .context_lines(2)
                .build(),
        )
    }))
    .ok();

    if let Err(err) = handle_cli().await {
        progress::stop();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(1);
    }
}
