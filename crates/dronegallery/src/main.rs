//! `dgallery` - CLI for dronegallery
//!
//! This binary follows an image-set collection and presents the live gallery
//! as an HTML page or as fragments on stdout.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;

use dronegallery::cli::{Cli, Command, ConfigCommand, RenderCommand, WatchCommand};
use dronegallery::gallery::{render_page, HtmlFilePresenter, Presenter, StdoutPresenter};
use dronegallery::{init_logging, Config, DocumentStore, LiveGallery, SqliteCollection};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // These must work even when the active configuration is broken
    match &cli.command {
        Command::Config(ConfigCommand::Path) => {
            println!("{}", config_path(cli.config.as_deref()).display());
            return Ok(());
        }
        Command::Config(ConfigCommand::Validate { file }) => {
            return handle_validate(file.clone().or_else(|| cli.config.clone()));
        }
        _ => {}
    }

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    match cli.command {
        Command::Watch(cmd) => handle_watch(&config, &cmd).await,
        Command::Render(cmd) => handle_render(&config, &cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(ConfigCommand::Show { json }) => handle_show(&config, json),
        Command::Config(ConfigCommand::Path | ConfigCommand::Validate { .. }) => Ok(()),
    }
}

fn config_path(custom: Option<&Path>) -> PathBuf {
    custom.map_or_else(Config::default_config_path, Path::to_path_buf)
}

fn gallery(config: &Config) -> LiveGallery<SqliteCollection> {
    let collection = SqliteCollection::new(config.database_path(), config.poll_interval());
    LiveGallery::new(collection, config.query(), config.gallery_settings())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        eprintln!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

async fn handle_watch(config: &Config, cmd: &WatchCommand) -> Result<()> {
    let options = config.render_options();
    let target = if cmd.stdout {
        None
    } else {
        cmd.output.clone().or_else(|| config.output.html_path.clone())
    };

    let mut presenter: Box<dyn Presenter> = match &target {
        Some(path) => {
            eprintln!("Writing gallery to {}", path.display());
            Box::new(HtmlFilePresenter::new(path, options))
        }
        None => Box::new(StdoutPresenter::stdout(options)),
    };

    let summary = gallery(config)
        .run(presenter.as_mut(), shutdown_signal())
        .await
        .context("live gallery failed")?;

    eprintln!(
        "Stopped after {} snapshots, {} errors, {} frames (banner {})",
        summary.snapshots,
        summary.errors,
        summary.frames,
        if summary.banner_shown {
            "shown"
        } else {
            "not shown"
        }
    );
    Ok(())
}

async fn handle_render(config: &Config, cmd: &RenderCommand) -> Result<()> {
    let state = gallery(config)
        .render_once()
        .await
        .context("failed to read the collection")?;

    // A one-off page has nothing to follow
    let mut options = config.render_options();
    options.refresh_secs = 0;

    match cmd.output.clone().or_else(|| config.output.html_path.clone()) {
        Some(path) => {
            HtmlFilePresenter::new(&path, options).present(&state)?;
            println!("Wrote {} records to {}", state.records.len(), path.display());
        }
        None => print!("{}", render_page(&state, &options)),
    }
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> Result<()> {
    let db_path = config.database_path();
    let store = DocumentStore::open_read_only(&db_path)
        .with_context(|| format!("failed to open {}", db_path.display()))?;
    let stats = store.stats(&config.collection.name, &config.collection.order_by)?;

    if json {
        let status = serde_json::json!({
            "database_path": db_path,
            "collection": config.collection.name,
            "total_documents": stats.total_documents,
            "timestamped_documents": stats.timestamped_documents,
            "oldest_capture": stats.oldest_capture,
            "newest_capture": stats.newest_capture,
            "db_size_bytes": stats.db_size_bytes,
            "expected_count": config.gallery.expected_count,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        let format_time = |time: Option<chrono::DateTime<chrono::Utc>>| {
            time.map_or_else(
                || "-".to_string(),
                |t| {
                    t.with_timezone(&chrono::Local)
                        .format("%Y-%m-%d %H:%M:%S")
                        .to_string()
                },
            )
        };

        println!("dgallery status");
        println!("---------------");
        println!("Database:      {}", db_path.display());
        println!("Collection:    {}", config.collection.name);
        println!(
            "Documents:     {} ({} timestamped, {} expected)",
            stats.total_documents, stats.timestamped_documents, config.gallery.expected_count
        );
        println!("Oldest:        {}", format_time(stats.oldest_capture));
        println!("Newest:        {}", format_time(stats.newest_capture));
        println!("Size:          {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_show(config: &Config, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(config)?);
        return Ok(());
    }

    println!("Current Configuration");
    println!("=====================");
    println!();
    println!("[Collection]");
    println!("  Database path:      {}", config.database_path().display());
    println!("  Name:               {}", config.collection.name);
    println!("  Ordered by:         {} (newest first)", config.collection.order_by);
    println!("  Poll interval (ms): {}", config.collection.poll_interval_ms);
    println!();
    println!("[Gallery]");
    println!("  Title:              {}", config.gallery.title);
    println!("  Schema:             {}", config.gallery.schema);
    println!("  Expected count:     {}", config.gallery.expected_count);
    println!("  Banner delay (ms):  {}", config.gallery.banner_delay_ms);
    println!("  Banner text:        {}", config.gallery.banner_text);
    println!("  Time format:        {}", config.gallery.time_format);
    println!();
    println!("[Output]");
    match &config.output.html_path {
        Some(path) => println!("  HTML path:          {}", path.display()),
        None => println!("  HTML path:          (stdout)"),
    }
    println!("  Refresh (s):        {}", config.output.refresh_secs);
    Ok(())
}

fn handle_validate(file: Option<PathBuf>) -> Result<()> {
    let path = config_path(file.as_deref());
    if !path.exists() {
        println!("No configuration file at {} (defaults apply)", path.display());
    }
    Config::load_from(Some(path.clone()))
        .with_context(|| format!("{} is not a valid configuration", path.display()))?;
    println!("Configuration is valid: {}", path.display());
    Ok(())
}
