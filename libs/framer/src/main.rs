use std::{io::Read, path::PathBuf, time::Duration};

use clap::{Parser, Subcommand, ValueEnum};
use miette::IntoDiagnostic;
use sitewise_framer::{
    FrameProducer, FramerConfig, Response, StaticResolver,
    append::append_matching_frames,
    output::{OutputFormat, write_frames},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[clap(
        long,
        value_enum,
        default_value = "info",
        global = true,
        help = "Log level (error, warn, info, debug, trace)"
    )]
    log_level: LogLevel,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone)]
enum Commands {
    #[command(about = "Convert SiteWise JSON responses into frames")]
    Frame(FrameArgs),
    #[command(about = "Check a metadata file and list its properties")]
    Metadata(MetadataArgs),
}

#[derive(clap::Args, Clone, Debug)]
struct FrameArgs {
    #[clap(
        help = "Response files; pages of the same series are appended. Reads stdin when empty"
    )]
    responses: Vec<PathBuf>,
    #[clap(long, short, help = "Path to the TOML metadata file")]
    metadata: PathBuf,
    #[clap(long, value_enum, default_value = "table", help = "Output format")]
    format: FormatArg,
    #[clap(long, help = "Ref id attached to every frame")]
    ref_id: Option<String>,
    #[clap(long, help = "Give up resolving metadata after this many milliseconds")]
    timeout_ms: Option<u64>,
}

#[derive(clap::Args, Clone, Debug)]
struct MetadataArgs {
    #[clap(help = "Path to the TOML metadata file")]
    path: PathBuf,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Table,
    Csv,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

fn read_responses(paths: &[PathBuf]) -> miette::Result<Vec<Response>> {
    if paths.is_empty() {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .into_diagnostic()?;
        return Ok(vec![serde_json::from_str(&buf).into_diagnostic()?]);
    }
    paths
        .iter()
        .map(|path| {
            debug!(?path, "reading response");
            let buf = std::fs::read_to_string(path).into_diagnostic()?;
            serde_json::from_str(&buf).into_diagnostic()
        })
        .collect()
}

async fn frame(args: FrameArgs) -> miette::Result<()> {
    let FrameArgs {
        responses,
        metadata,
        format,
        ref_id,
        timeout_ms,
    } = args;
    let resolver = StaticResolver::from(FramerConfig::read(&metadata).into_diagnostic()?);
    let responses = read_responses(&responses)?;

    let cancel = CancellationToken::new();
    if let Some(timeout_ms) = timeout_ms {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(timeout_ms)).await;
            cancel.cancel();
        });
    }

    let mut frames = Vec::new();
    for response in &responses {
        let mut page = response.frames(&resolver, &cancel).await.into_diagnostic()?;
        if let Some(ref_id) = &ref_id {
            page = page.into_iter().map(|f| f.with_ref_id(ref_id)).collect();
        }
        frames = append_matching_frames(frames, page).into_diagnostic()?;
    }
    info!(responses = responses.len(), frames = frames.len(), "framed");

    let format = match format {
        FormatArg::Table => OutputFormat::Table,
        FormatArg::Csv => OutputFormat::Csv,
    };
    write_frames(&frames, format, std::io::stdout().lock()).into_diagnostic()
}

fn metadata(args: MetadataArgs) -> miette::Result<()> {
    let config = FramerConfig::read(&args.path).into_diagnostic()?;
    for property in &config.property {
        let data_type = property
            .data_type
            .map(|t| format!("{t:?}"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{}/{}\t{} / {}\t{}",
            property.asset_id,
            property.property_id,
            property.asset_name,
            property.property_name,
            data_type
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> miette::Result<()> {
    let args = Cli::parse();
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::builder().from_env_lossy()
    } else {
        EnvFilter::builder().parse_lossy(format!("sitewise_framer={}", args.log_level.as_str()))
    };

    let _ = tracing_subscriber::fmt::fmt()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::new(
            "%Y-%m-%d %H:%M:%S%.3f".to_string(),
        ))
        .try_init();

    match args.command {
        Commands::Frame(args) => frame(args).await,
        Commands::Metadata(args) => metadata(args),
    }
}
