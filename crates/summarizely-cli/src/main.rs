mod config;

use std::{io::Write, path::PathBuf, time::Duration};

use anyhow::Result;
use chrono::Utc;
use clap::{ArgAction, Parser, ValueEnum};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing_subscriber::EnvFilter;

use summarizely_core::{
    Captions, DEFAULT_CLI_MAX_CHARS, Engine, InvocationResult, InvokeOptions, ProviderConfig,
    ProviderDescriptor, ProviderId, RetryPolicy, SummarizelyError, SystemProbe, build_prompt,
    cache::DEFAULT_OUTPUT_DIR, describe_failure, fetch_captions, find_cached, has_yt_dlp,
    install_hint, invoke::DEFAULT_TIMEOUT, provider::BackendKind, retry, run_metadata, save_run,
    select_provider, youtube_id,
};

const EXIT_UNEXPECTED: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NO_CAPTIONS: i32 = 4;
const EXIT_PROVIDER: i32 = 5;

/// CLI wrapper for ProviderId (needed for clap ValueEnum)
#[derive(Clone, Copy, ValueEnum)]
enum CliProvider {
    ClaudeCli,
    CodexCli,
    Ollama,
    Openai,
    Anthropic,
    Google,
}

impl From<CliProvider> for ProviderId {
    fn from(cli: CliProvider) -> Self {
        match cli {
            CliProvider::ClaudeCli => ProviderId::ClaudeCli,
            CliProvider::CodexCli => ProviderId::CodexCli,
            CliProvider::Ollama => ProviderId::Ollama,
            CliProvider::Openai => ProviderId::Openai,
            CliProvider::Anthropic => ProviderId::Anthropic,
            CliProvider::Google => ProviderId::Google,
        }
    }
}

#[derive(Parser)]
#[command(name = "summarizely")]
#[command(version, about = "Summarize YouTube videos from their captions with local or cloud AI")]
struct Cli {
    /// YouTube URL
    url: String,

    /// Summarization provider (auto-detected when omitted)
    #[arg(short, long)]
    provider: Option<CliProvider>,

    /// Model to use with the provider
    #[arg(short, long)]
    model: Option<String>,

    /// Directory summaries are written to [default: summaries]
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Do not save transcript.txt next to the summary
    #[arg(long)]
    no_save_transcript: bool,

    /// Cap the transcript sent to the provider at N characters
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    max_chars: Option<u64>,

    /// Send the whole transcript to CLI providers
    #[arg(long, conflicts_with = "max_chars")]
    no_cap: bool,

    /// Print the summary as it is generated
    #[arg(long)]
    stream: bool,

    /// Provider timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only print errors
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

fn create_spinner(msg: &str, hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")
            .expect("spinner template is valid"),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("summarizely={0},summarizely_core={0},warn", level))
        }))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Print an error and exit with `code`.
fn fail(code: i32, msg: impl std::fmt::Display) -> ! {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
    std::process::exit(code);
}

fn done(msg: impl std::fmt::Display, quiet: bool) {
    if !quiet {
        eprintln!("{} {}", style("✓").green().bold(), msg);
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if let Err(e) = run(cli).await {
        fail(EXIT_UNEXPECTED, format!("Unexpected error: {:#}", e));
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = config::load_settings(cli.config.as_deref())
        .unwrap_or_else(|e| fail(EXIT_USAGE, format!("{:#}", e)));

    let url = cli.url.trim().to_string();
    let Some(video_id) = youtube_id(&url) else {
        fail(EXIT_USAGE, format!("not a YouTube URL: {}", url));
    };

    let requested = match (cli.provider, settings.provider.as_deref()) {
        (Some(p), _) => Some(ProviderId::from(p)),
        (None, Some(name)) => Some(
            name.parse::<ProviderId>()
                .unwrap_or_else(|e| fail(EXIT_USAGE, e)),
        ),
        (None, None) => None,
    };
    let model = cli.model.or(settings.model);
    let output_dir = cli
        .output_dir
        .or(settings.output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
    let timeout = cli
        .timeout
        .or(settings.timeout_secs)
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TIMEOUT);
    let stream_requested = cli.stream || settings.stream.unwrap_or(false);

    let provider_config = ProviderConfig::from_env();
    let provider = match requested {
        Some(id) => ProviderDescriptor::new(id, "requested"),
        None => select_provider(&provider_config, &SystemProbe).unwrap_or_else(|e| {
            fail(
                EXIT_PROVIDER,
                format!(
                    "No provider available. Install a CLI provider (claude, codex), Ollama, or set an API key.\nReason: {}",
                    e.reason
                ),
            )
        }),
    };

    if !cli.quiet {
        eprintln!(
            "\n{}  {}\n",
            style("summarizely").cyan().bold(),
            style("YouTube Summarizer").dim()
        );
    }
    done(
        format!(
            "Provider: {} {}",
            style(provider.id).yellow(),
            style(format!("({})", provider.reason)).dim()
        ),
        cli.quiet,
    );

    // Reuse earlier work for the same video
    let mut captions: Option<Captions> = None;
    if let Some(cached) = find_cached(&output_dir, &video_id) {
        if let Some(summary) = cached
            .summary
            .as_ref()
            .filter(|_| cached.summary_matches(provider.id.as_str(), model.as_deref()))
        {
            done(
                format!(
                    "Summary {} {}",
                    style(cached.dir.display()).dim(),
                    style("(cached)").dim()
                ),
                cli.quiet,
            );
            println!("{}", summary);
            return Ok(());
        }
        if let Some(transcript) = cached.transcript {
            done(
                format!("Transcript {}", style("(cached)").dim()),
                cli.quiet,
            );
            captions = Some(Captions {
                title: cached.metadata.title,
                video_id: video_id.clone(),
                url: url.clone(),
                transcript,
                ..Default::default()
            });
        }
    }

    let captions = match captions {
        Some(captions) => captions,
        None => {
            let spinner = create_spinner("Fetching captions via yt-dlp...", cli.quiet);
            match fetch_captions(&url).await {
                Ok(captions) => {
                    spinner.finish_and_clear();
                    done(
                        format!(
                            "Captions: {} {}",
                            captions.title,
                            style(format!("({} chars)", captions.transcript.chars().count())).dim()
                        ),
                        cli.quiet,
                    );
                    captions
                }
                Err(
                    e @ (SummarizelyError::CaptionsUnavailable { .. }
                    | SummarizelyError::ToolFailed { .. }),
                ) => {
                    spinner.finish_and_clear();
                    let mut msg = e.to_string();
                    if !has_yt_dlp().await {
                        msg.push_str(&format!(
                            "\nTip: Install yt-dlp for best results:\n  {}",
                            install_hint()
                        ));
                    }
                    fail(EXIT_NO_CAPTIONS, msg);
                }
                Err(e) => {
                    spinner.finish_and_clear();
                    return Err(e.into());
                }
            }
        }
    };

    let max_chars = if cli.no_cap {
        None
    } else {
        let requested_cap = cli.max_chars.map(|n| n as usize).or(settings.max_chars);
        match (requested_cap, provider.id.kind()) {
            (Some(max), _) => Some(max),
            (None, BackendKind::Cli) => Some(DEFAULT_CLI_MAX_CHARS),
            (None, _) => None,
        }
    };
    let prompt = build_prompt(&captions, max_chars);

    let engine = Engine::new(provider_config);
    let options = InvokeOptions {
        model: model.clone(),
        timeout,
    };

    // Only Ollama streams; the others keep the spinner and print once at the end.
    let stream = stream_requested && provider.id.supports_streaming();
    if stream_requested && !stream {
        tracing::info!("{} returns the summary in one piece, not streaming", provider.id.name());
    }
    let spinner = create_spinner(
        &format!("Summarizing with {}...", provider.id.name()),
        cli.quiet || stream,
    );
    let report = retry(&RetryPolicy::default(), |_| {
        attempt(&engine, provider.id, &prompt, &options, stream)
    })
    .await;
    spinner.finish_and_clear();

    let markdown = match report.result {
        Ok(markdown) => markdown,
        Err(e) => fail(EXIT_PROVIDER, describe_failure(provider.id, &e)),
    };
    if stream {
        println!();
    }
    done(
        format!(
            "Summary generated ({}{})",
            provider.id.name(),
            if report.attempts > 1 {
                format!(", {} attempts", report.attempts)
            } else {
                String::new()
            }
        ),
        cli.quiet,
    );

    let now = Utc::now();
    let metadata = run_metadata(&captions, provider.id.as_str(), model.as_deref(), now);
    match save_run(
        &output_dir,
        &captions,
        &markdown,
        &metadata,
        !cli.no_save_transcript,
        now,
    )
    .await
    {
        Ok(dir) => done(
            format!("{} {}", style("Saved:").dim(), style(dir.display()).cyan()),
            cli.quiet,
        ),
        Err(e) => tracing::warn!("Could not save summary to {}: {}", output_dir.display(), e),
    }

    if !stream {
        println!("{}", markdown);
    }
    Ok(())
}

async fn attempt(
    engine: &Engine,
    provider: ProviderId,
    prompt: &str,
    options: &InvokeOptions,
    stream: bool,
) -> InvocationResult {
    if !stream {
        return engine.invoke(provider, prompt, options).await;
    }
    engine
        .invoke_streaming(provider, prompt, options, |chunk| {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(chunk.as_bytes());
            let _ = stdout.flush();
        })
        .await
}
