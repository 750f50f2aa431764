//! RTSP Player - pulls an MJPEG stream and writes the frames out
//!
//! Runs one session through SETUP, PLAY and TEARDOWN, writing every delivered
//! frame payload to a file or stdout, then prints the stream report.

use clap::Parser;
use crossbeam::channel::{self, Sender};
use rtsp::{DataFrame, FrameSink, Session, StreamReport};
use rtsp_cli::config::{Config, ServerConfig};
use rtsp_cli::stats::{display_compact_stats, format_report};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "rtsp-play")]
#[command(about = "RTSP/RTP MJPEG stream player", long_about = None)]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Server host (overrides the config file)
    #[arg(long)]
    host: Option<String>,

    /// Server RTSP port (overrides the config file)
    #[arg(short, long)]
    port: Option<u16>,

    /// Resource to play (overrides the config file)
    #[arg(short, long)]
    resource: Option<String>,

    /// Output file for frame payloads (use '-' for stdout)
    #[arg(short, long, default_value = "-")]
    output: String,

    /// Stop after this many seconds (0 plays until the stream goes idle)
    #[arg(short, long, default_value = "0")]
    duration: u64,

    /// Statistics interval in seconds (0 disables)
    #[arg(long, default_value = "1")]
    stats: u64,

    /// Print an example configuration file and exit
    #[arg(long)]
    print_config: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

/// Writes payloads and signals the end of the stream
struct OutputSink {
    writer: Box<dyn Write + Send>,
    bytes_written: Arc<AtomicU64>,
    ended: Sender<StreamReport>,
}

impl FrameSink for OutputSink {
    fn on_frame(&mut self, frame: DataFrame) {
        let payload = frame.into_payload();
        match self.writer.write_all(&payload) {
            Ok(()) => {
                self.bytes_written
                    .fetch_add(payload.len() as u64, Ordering::Relaxed);
            }
            Err(e) => tracing::error!("Failed to write frame: {}", e),
        }
    }

    fn on_stream_end(&mut self, report: &StreamReport) {
        if let Err(e) = self.writer.flush() {
            tracing::error!("Failed to flush output: {}", e);
        }
        let _ = self.ended.send(report.clone());
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn resolve_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)
            .map_err(|e| anyhow::anyhow!("Failed to load '{}': {}", path.display(), e))?,
        None => {
            let (Some(host), Some(resource)) = (&args.host, &args.resource) else {
                anyhow::bail!("--host and --resource are required without --config");
            };
            Config {
                server: ServerConfig {
                    host: host.clone(),
                    port: 554,
                    resource: resource.clone(),
                },
                session: None,
            }
        }
    };

    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(resource) = &args.resource {
        config.server.resource = resource.clone();
    }
    config.validate()?;
    Ok(config)
}

fn open_output(output: &str) -> anyhow::Result<Box<dyn Write + Send>> {
    if output == "-" {
        tracing::info!("Writing to stdout");
        Ok(Box::new(BufWriter::new(io::stdout())))
    } else {
        tracing::info!("Writing to file: {}", output);
        let file = File::create(output)
            .map_err(|e| anyhow::anyhow!("Failed to create file '{}': {}", output, e))?;
        Ok(Box::new(BufWriter::new(file)))
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if args.print_config {
        print!("{}", toml::to_string_pretty(&Config::example())?);
        return Ok(());
    }

    init_logging(args.verbose);

    let config = resolve_config(&args)?;
    let session_config = config.session_config()?;
    let server = &config.server;
    tracing::info!(
        "Playing rtsp://{}:{}/{}",
        server.host,
        server.port,
        server.resource
    );

    let bytes_written = Arc::new(AtomicU64::new(0));
    let (ended_tx, ended_rx) = channel::bounded(1);
    let sink = OutputSink {
        writer: open_output(&args.output)?,
        bytes_written: Arc::clone(&bytes_written),
        ended: ended_tx,
    };

    let session = Session::open_with(&server.host, server.port, session_config, sink)?;
    session.setup(&server.resource)?;
    tracing::info!(
        "Session {} set up, data port {}",
        session.session_id().unwrap_or_default(),
        session.data_port().unwrap_or_default()
    );
    session.play()?;

    let start = Instant::now();
    let deadline = (args.duration > 0).then(|| start + Duration::from_secs(args.duration));
    let tick = if args.stats > 0 {
        Duration::from_secs(args.stats)
    } else {
        Duration::from_millis(250)
    };

    let mut report = None;
    loop {
        let wait = match deadline {
            Some(at) => tick.min(at.saturating_duration_since(Instant::now())),
            None => tick,
        };
        match ended_rx.recv_timeout(wait) {
            Ok(r) => {
                report = Some(r);
                break;
            }
            Err(channel::RecvTimeoutError::Disconnected) => break,
            Err(channel::RecvTimeoutError::Timeout) => {}
        }

        if args.stats > 0 {
            display_compact_stats(
                &session.stats(),
                bytes_written.load(Ordering::Relaxed),
                start.elapsed(),
            );
        }
        if deadline.map_or(false, |at| Instant::now() >= at) {
            tracing::info!("Duration reached");
            break;
        }
    }
    if args.stats > 0 {
        eprintln!();
    }

    // The report is discarded by teardown, so take it first.
    let report = report.or_else(|| session.last_report());
    session.teardown()?;
    session.close();

    match report {
        Some(report) => eprintln!(
            "{}",
            format_report(&report, bytes_written.load(Ordering::Relaxed))
        ),
        None => tracing::info!("Stopped before the stream went idle"),
    }
    Ok(())
}
