//! Headless front end over the media toolkit core
//!
//! Runs one download or conversion per invocation and renders its progress
//! in the terminal.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;

use media_toolkit::core::converter::{detect_kind, suggest_targets};
use media_toolkit::core::tools::probe_all;
use media_toolkit::core::models::Platform;
use media_toolkit::utils::logging::init_tracing;
use media_toolkit::utils::validation::detect_platform;
use media_toolkit::{
    AppState, ConversionRequest, DownloadFormat, DownloadRequest, JobEvent, JobStatus,
    TargetFormat,
};

#[derive(Parser)]
#[command(name = "media-toolkit-cli")]
#[command(version)]
#[command(about = "Download media and convert files from the command line", long_about = None)]
struct Cli {
    /// Show debug logs
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download a YouTube video, playlist or any yt-dlp supported URL
    Download {
        url: String,
        #[arg(short, long, default_value = "mp4")]
        format: DownloadFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Netscape-format cookie file
        #[arg(long)]
        cookies: Option<PathBuf>,
    },
    /// Download an Instagram post or reel
    #[command(alias = "ig")]
    Instagram {
        url: String,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        cookies: Option<PathBuf>,
    },
    /// Convert a file to another format
    Convert {
        input: PathBuf,
        #[arg(short, long)]
        to: TargetFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List the formats a file can be converted to
    Suggest { input: PathBuf },
    /// Check yt-dlp, ffmpeg and pandoc
    Tools,
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Print the current settings
    Show,
    /// Folder containing the ffmpeg binary ("" clears it)
    SetFfmpeg { dir: PathBuf },
    /// Default folder for downloads and conversions
    SetOutput { dir: PathBuf },
    /// Restore default settings
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(if cli.verbose { "debug" } else { "warn" });

    if let Err(e) = run(cli.command).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

async fn run(command: Commands) -> anyhow::Result<()> {
    let (state, mut events) = AppState::new()?;

    match command {
        Commands::Download {
            url,
            format,
            output,
            cookies,
        } => {
            let request = match detect_platform(&url) {
                Platform::Instagram => DownloadRequest::instagram(url),
                _ => DownloadRequest::youtube(url, format),
            };
            let request = request
                .with_output_dir(output)
                .with_cookie_file(cookies);
            let job_id = state.jobs.submit_download(request).await?;
            follow_job(&mut events, &job_id).await
        }
        Commands::Instagram {
            url,
            output,
            cookies,
        } => {
            let request = DownloadRequest::instagram(url)
                .with_output_dir(output)
                .with_cookie_file(cookies);
            let job_id = state.jobs.submit_download(request).await?;
            follow_job(&mut events, &job_id).await
        }
        Commands::Convert { input, to, output } => {
            let job_id = state
                .jobs
                .submit_conversion(ConversionRequest {
                    input,
                    target: to,
                    output_dir: output,
                })
                .await?;
            follow_job(&mut events, &job_id).await
        }
        Commands::Suggest { input } => {
            let kind = detect_kind(&input);
            let formats: Vec<String> = suggest_targets(kind)
                .iter()
                .map(ToString::to_string)
                .collect();
            println!("{:?}: {}", kind, formats.join(", "));
            Ok(())
        }
        Commands::Tools => {
            let config = state.config_snapshot().await;
            let mut missing = 0;
            for status in probe_all(&config).await {
                if status.available {
                    println!(
                        "✅ {:<8} {}",
                        status.name,
                        status.version.unwrap_or_default()
                    );
                } else {
                    missing += 1;
                    println!("❌ {:<8} not found", status.name);
                }
            }
            if missing > 0 {
                anyhow::bail!("{} tool(s) missing", missing);
            }
            Ok(())
        }
        Commands::Config(command) => run_config(&state, command).await,
    }
}

async fn run_config(state: &AppState, command: ConfigCommand) -> anyhow::Result<()> {
    let config = match command {
        ConfigCommand::Show => state.config_snapshot().await,
        ConfigCommand::SetFfmpeg { dir } => state.set_ffmpeg_dir(&dir).await?,
        ConfigCommand::SetOutput { dir } => state.set_default_output(&dir).await?,
        ConfigCommand::Reset => state.reset_config().await?,
    };

    println!("# {}", state.config_path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

/// Render events of `job_id` until it finishes
async fn follow_job(
    events: &mut mpsc::UnboundedReceiver<JobEvent>,
    job_id: &str,
) -> anyhow::Result<()> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=> "),
    );

    while let Some(event) = events.recv().await {
        if event.job_id() != job_id {
            continue;
        }
        match event {
            JobEvent::Log { line, .. } => bar.println(line),
            JobEvent::Progress { percent, .. } => bar.set_position(percent.round() as u64),
            JobEvent::Finished {
                status,
                message,
                output,
                ..
            } => {
                bar.finish_and_clear();
                return match status {
                    JobStatus::Completed => {
                        println!("{}", message);
                        if let Some(path) = output {
                            println!("{}", path.display());
                        }
                        Ok(())
                    }
                    _ => Err(anyhow::anyhow!(message)),
                };
            }
        }
    }

    bar.abandon();
    anyhow::bail!("job {} stopped without reporting a result", job_id)
}
