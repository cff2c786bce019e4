use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::ValueEnum;
use eyre::{Result, bail};
use log::{debug, info};
use tokio::io::AsyncBufReadExt;
use tokio::sync::mpsc;

use vidgroup::backend::{ProcessRequest, VideoInfo};
use vidgroup::capture::{CaptureSession, spawn_batcher};
use vidgroup::category::{ElementMetadata, detect_all};
use vidgroup::config::Config;
use vidgroup::{CapturedStream, GroupOptions, NameStrategy, VideoGroup, output};

mod cli;

use cli::{Cli, OutputFormat};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("vidgroup.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vidgroup")
        .join("logs")
}

fn build_after_help() -> String {
    format!(
        "\nConfig is read from: {}\nLogs are written to: {}",
        vidgroup::config::config_path().display(),
        log_dir().join("vidgroup.log").display()
    )
}

/// Retry an async operation with exponential backoff
async fn retry<F, Fut, T>(max_attempts: u32, operation: F) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    let mut last_err = None;
    for attempt in 0..max_attempts {
        match operation().await {
            Ok(val) => return Ok(val),
            Err(e) => {
                if attempt + 1 < max_attempts {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    debug!("Attempt {} failed: {e}, retrying in {delay:?}", attempt + 1);
                    tokio::time::sleep(delay).await;
                }
                last_err = Some(e);
            }
        }
    }
    Err(last_err.unwrap_or_else(|| eyre::eyre!("no attempts made")))
}

fn render(groups: &[VideoGroup], format: OutputFormat) -> String {
    match format {
        OutputFormat::Text => output::render_text(groups),
        OutputFormat::Json => output::render_json(groups),
    }
}

fn emit(rendered: &str, cli: &Cli) -> Result<()> {
    if let Some(ref path) = cli.output {
        std::fs::write(path, rendered)?;
        if cli.verbose {
            eprintln!("Output written to: {}", path.display());
        }
    } else {
        println!("{rendered}");
    }
    Ok(())
}

fn categorize_file(cli: &Cli, path: &Path, format: OutputFormat, config: &Config) -> Result<()> {
    let content = std::fs::read_to_string(path)?;
    let elements: Vec<ElementMetadata> = serde_json::from_str(&content)
        .map_err(|e| eyre::eyre!("invalid element metadata in {}: {e}", path.display()))?;

    let detected = detect_all(&elements, &config.ad_keywords);
    if cli.verbose {
        eprintln!("Elements: {} scanned, {} distinct", elements.len(), detected.len());
    }

    let rendered = match format {
        OutputFormat::Text => output::render_elements_text(&detected),
        OutputFormat::Json => output::render_elements_json(&detected),
    };
    emit(&rendered, cli)
}

async fn watch(cli: &Cli, options: GroupOptions, format: OutputFormat, debounce: Duration) -> Result<()> {
    let (tx, rx) = mpsc::channel(64);
    let (mut batches, batcher) = spawn_batcher(rx, debounce);
    let video_only = cli.video_only;

    let reader = tokio::spawn(async move {
        let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let line = line.trim();
            if line.is_empty() || (video_only && !vidgroup::stream::is_video_url(line, None)) {
                continue;
            }
            if tx.send(CapturedStream::new(line)).await.is_err() {
                break;
            }
        }
        Ok::<(), io::Error>(())
    });

    let mut session = CaptureSession::new();
    while let Some(batch) = batches.recv().await {
        let added = batch.into_iter().filter(|s| session.observe(s.clone())).count();
        if added == 0 {
            continue;
        }
        debug!("Regrouping after {added} new streams");
        let groups = session.groups(&options);
        if cli.verbose {
            eprintln!("Streams: {} Videos: {}", session.len(), groups.len());
        }
        emit(&render(&groups, format), cli)?;
    }

    reader.await??;
    batcher.await?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_default();

    let format = cli
        .format
        .or_else(|| {
            config
                .default_format
                .as_deref()
                .and_then(|f| OutputFormat::from_str(f, true).ok())
        })
        .unwrap_or(OutputFormat::Text);

    let name_strategy = if cli.consensus {
        NameStrategy::Consensus
    } else {
        config.name_strategy.unwrap_or_default()
    };
    let options = GroupOptions { name_strategy };

    if cli.verbose {
        let config_path = vidgroup::config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
        debug!("Name strategy: {name_strategy:?}");
    }

    if let Some(ref path) = cli.elements {
        return categorize_file(&cli, path, format, &config);
    }

    if cli.watch {
        return watch(&cli, options, format, config.debounce()).await;
    }

    // Collect URLs: from args or stdin
    let urls = if !cli.urls.is_empty() {
        cli.urls.clone()
    } else {
        let stdin = io::stdin();
        stdin.lock().lines().collect::<Result<Vec<_>, _>>()?
    };

    let streams: Vec<CapturedStream> = urls
        .iter()
        .map(|u| u.trim())
        .filter(|u| !u.is_empty())
        .filter(|u| !cli.video_only || vidgroup::stream::is_video_url(u, None))
        .map(CapturedStream::new)
        .collect();

    if streams.is_empty() {
        bail!("no stream URLs provided\n\nUsage: vidgroup <URL>...\n       cat urls.txt | vidgroup");
    }

    let groups = vidgroup::aggregate_with(&streams, &options);

    if cli.verbose {
        eprintln!("Streams: {}\nVideos: {}", streams.len(), groups.len());
    }

    emit(&render(&groups, format), &cli)?;

    if cli.submit {
        let backend = cli
            .backend
            .clone()
            .or_else(|| config.backend_url.clone())
            .ok_or_else(|| eyre::eyre!("--submit needs a backend: pass --backend or set backend_url in config"))?;

        let video_info = VideoInfo {
            src: streams.first().map(|s| s.url.clone()),
            title: cli.title.clone().or_else(|| groups.first().map(|g| g.name.clone())),
            page_url: cli.page_url.clone(),
            quality: groups.first().and_then(|g| g.best_quality()).map(|q| q.to_string()),
        };
        let request = ProcessRequest::new(video_info, vec![], &streams);
        let client = reqwest::Client::new();

        let response = retry(3, || {
            let client = &client;
            let backend = &backend;
            let request = &request;
            async move { vidgroup::client::submit(client, backend, request).await }
        })
        .await?;

        eprintln!("Submitted: {} ({})", response.process_id, response.message);
        eprintln!(
            "Download: {}",
            vidgroup::backend::download_redirect(&backend, &response.process_id)
        );
        if cli.verbose && response.grouped_videos.len() != groups.len() {
            eprintln!(
                "Backend grouped {} videos, local grouping found {}",
                response.grouped_videos.len(),
                groups.len()
            );
        }
    }

    Ok(())
}
