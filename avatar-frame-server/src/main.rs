mod http;
mod multipart;
mod routes;
mod server;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use tracing_log::AsTrace;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::path::{Path, PathBuf};

use avatar_frame::{FrameKind, Framer, FramerConfig};

#[derive(Parser)]
#[command(name = "avatar-frame")]
#[command(about = "Overlay event avatar frames on photos", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true, default_value_t)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the web server
    Serve(ServeArgs),
    /// Frame a single image file
    Compose(ComposeArgs),
}

#[derive(Args)]
struct ConfigArgs {
    /// JSON config file; flags below override it
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Directory holding the frame PNGs
    #[arg(long, value_name = "DIR")]
    static_dir: Option<PathBuf>,

    /// JPEG quality (1-100)
    #[arg(long, value_name = "QUALITY")]
    quality: Option<u8>,
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(short, long, value_name = "ADDR", default_value = "127.0.0.1:5000")]
    bind: String,

    /// Page served at `/`
    #[arg(long, value_name = "FILE", default_value = "templates/index.html")]
    index: PathBuf,

    /// Maximum request body in bytes
    #[arg(long, value_name = "BYTES")]
    max_upload_bytes: Option<usize>,

    /// Number of request worker threads.
    /// defaults to the number of logical CPUs
    #[arg(short, long)]
    threads: Option<usize>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Args)]
struct ComposeArgs {
    /// Photo to frame (PNG or JPEG)
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// Frame variant
    #[arg(short, long, value_enum, default_value_t = FrameArg::Participant)]
    frame: FrameArg,

    /// Output file, defaults to the download name in the current directory
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    #[command(flatten)]
    config: ConfigArgs,
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum FrameArg {
    Participant,
    Organizer,
}

impl From<FrameArg> for FrameKind {
    fn from(arg: FrameArg) -> Self {
        match arg {
            FrameArg::Participant => FrameKind::Participant,
            FrameArg::Organizer => FrameKind::Organizer,
        }
    }
}

const DEFAULT_STATIC_DIR: &str = "static";

fn main() -> Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose);

    match cli.command {
        Command::Serve(args) => serve(args),
        Command::Compose(args) => compose(args),
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    // RUST_LOG wins over --verbose; `log` records from the library are
    // bridged in by the subscriber
    let filter = EnvFilter::builder()
        .with_default_directive(level.as_trace().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .with(filter)
        .init();
}

fn build_config(args: &ConfigArgs) -> Result<FramerConfig> {
    let mut config = match &args.config {
        Some(path) => FramerConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => FramerConfig::default(),
    };

    if let Some(dir) = &args.static_dir {
        config = config.with_static_dir(dir);
    }

    if let Some(quality) = args.quality {
        if !(1..=100).contains(&quality) {
            anyhow::bail!("Quality must be between 1 and 100");
        }
        config.quality = quality;
    }

    Ok(config)
}

fn serve(args: ServeArgs) -> Result<()> {
    if let Some(threads) = args.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .context("Failed to build worker pool")?;
    }

    let mut config = build_config(&args.config)?;
    if let Some(max) = args.max_upload_bytes {
        config.max_upload_bytes = max;
    }

    for (kind, path) in config.frames.iter() {
        if !path.exists() {
            tracing::warn!("{kind} frame asset not found at {}", path.display());
        }
    }

    let static_dir = args
        .config
        .static_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_STATIC_DIR));

    let framer = Framer::new(config).context("Invalid configuration")?;
    let app = routes::App::new(framer, static_dir, args.index);
    server::serve(app, &args.bind)
}

fn compose(args: ComposeArgs) -> Result<()> {
    if !args.input.exists() {
        anyhow::bail!("Input file does not exist: {}", args.input.display());
    }

    let framer = Framer::new(build_config(&args.config)?).context("Invalid configuration")?;
    let frame = FrameKind::from(args.frame);

    log::info!("Framing `{}` with the {frame} frame", args.input.display());

    let generated = framer
        .compose_file(&args.input, frame)
        .with_context(|| format!("Failed to frame {}", args.input.display()))?;

    let output = args
        .output
        .unwrap_or_else(|| Path::new(".").join(&generated.file_name));
    std::fs::write(&output, &generated.data).context("Failed to write output file")?;

    log::info!("Done: {}", output.display());
    Ok(())
}
