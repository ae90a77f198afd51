mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::{AnalyzeArgs, Cli, Command, EditArgs, TagsCommand};
use trackprobe::analysis::{analyze_file, format_report};
use trackprobe::metadata::editor::{expand_selection, update, EditorAction, EditorState, ShownFile};
use trackprobe::metadata::{capitalize, DisplayMap, FfmpegTools};
use trackprobe::server::{self, AppState};
use trackprobe::Config;

const DEFAULT_LOG_FILTER: &str = "trackprobe=debug,tower_http=info";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Serve => serve(cli.config).await,
        Command::Analyze(args) => analyze(&cli.config, args).await,
        Command::Tags(TagsCommand::Show { paths }) => show_tags(&cli.config, &paths).await,
        Command::Tags(TagsCommand::Edit(args)) => edit_tags(&cli.config, args).await,
    }
}

async fn serve(config: Config) -> Result<()> {
    config.prepare()?;
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.addr))?;

    let classifier = config.classifier();
    let state = AppState::new(config, classifier);
    server::serve(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for shutdown signal: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Shutdown signal received");
    })
    .await
    .context("Server error")
}

async fn analyze(config: &Config, args: AnalyzeArgs) -> Result<()> {
    if !args.file.is_file() {
        bail!("Input file does not exist: {:?}", args.file);
    }
    let classifier = config.classifier();
    let path = args.file.clone();
    let result = tokio::task::spawn_blocking(move || analyze_file(&path, &classifier))
        .await
        .context("Analysis task panicked")?
        .with_context(|| format!("Failed to analyze {:?}", args.file))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        let name = args
            .file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        print!("{}", format_report(&name, &result));
    }
    Ok(())
}

fn print_map(map: &DisplayMap) {
    for (key, value) in map {
        println!("  {}: {}", capitalize(key), value);
    }
}

async fn select(tools: &FfmpegTools, paths: &[std::path::PathBuf]) -> Result<EditorState> {
    let state = update(EditorState::default(), EditorAction::Select(expand_selection(paths)), tools).await;
    if !state.has_selection() {
        bail!("{}", state.status);
    }
    tracing::info!("{}", state.status);
    Ok(state)
}

async fn show_tags(config: &Config, paths: &[std::path::PathBuf]) -> Result<()> {
    let tools = config.media_tools();
    let state = select(&tools, paths).await?;
    let state = update(state, EditorAction::Show, &tools).await;

    for shown in &state.shown {
        match shown {
            ShownFile::Probed { name, report } => {
                println!("File: {}", name);
                println!("Format metadata:");
                print_map(&report.format);
                for stream in &report.streams {
                    println!("Stream {}: {}", stream.position + 1, stream.codec_type);
                    print_map(&stream.fields);
                }
                println!();
            }
            ShownFile::Failed { name, error } => eprintln!("Error in {}: {}", name, error),
        }
    }
    Ok(())
}

async fn edit_tags(config: &Config, args: EditArgs) -> Result<()> {
    let tools = config.media_tools();
    let mut state = select(&tools, &args.paths).await?;

    let overrides = args.field_overrides();
    for file in 0..state.files.len() {
        for (key, value) in &overrides {
            state = update(
                state,
                EditorAction::SetField {
                    file,
                    key: key.clone(),
                    value: value.clone(),
                },
                &tools,
            )
            .await;
        }
        if let Some(filters) = &args.audio_filters {
            state = update(
                state,
                EditorAction::SetFilter {
                    file,
                    filters: filters.clone(),
                },
                &tools,
            )
            .await;
        }
    }

    for entry in &state.files {
        println!("{}", entry.name());
        for (label, value) in entry.labeled_fields() {
            println!("  {}: {}", label, value);
        }
    }

    let state = update(state, EditorAction::Save, &tools).await;
    let mut failures = 0;
    for outcome in &state.saved {
        if outcome.success {
            println!("{} -> {}: {}", outcome.source.display(), outcome.output.display(), outcome.message);
        } else {
            failures += 1;
            eprintln!("{}: {}", outcome.source.display(), outcome.message);
        }
    }
    if failures > 0 {
        bail!("{} of {} file(s) failed", failures, state.saved.len());
    }
    Ok(())
}
