use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use std::future::Future;
use std::io::IsTerminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::oneshot;
use yt_comments::{
    CredentialSource, DEFAULT_BASE_URL, Sampler, ServiceConfig, YouTubeService, extract_video_id,
};
use yt_oauth::{OAuthConfig, OAuthManager, SharedOAuthManager, TokenCache};

const PROGRESS_TICK: Duration = Duration::from_millis(50);

/// yt lets you choose contest winners and see comments of a YouTube video
#[derive(Parser, Debug)]
#[command(name = "yt", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to file containing an API key; OAuth is skipped when given
    #[arg(long, global = true)]
    api_key_path: Option<PathBuf>,

    /// OAuth client ID
    #[arg(long, env = "YT_CLIENT_ID", global = true)]
    client_id: Option<String>,

    /// OAuth client secret (leave empty for public PKCE clients)
    #[arg(
        long,
        env = "YT_CLIENT_SECRET",
        hide_env_values = true,
        default_value = "",
        global = true
    )]
    client_secret: String,

    /// Redirect URI registered for the OAuth client; its port is used for the local listener
    #[arg(long, default_value = "http://localhost:8090/", global = true)]
    redirect_uri: String,

    /// Path of the OAuth token cache (defaults to ~/.yt.json)
    #[arg(long, global = true)]
    token_path: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print out youtube comments
    #[command(
        after_help = "Example: yt comments https://www.youtube.com/watch?v=BIk1zUy8ehU&ab_channel=LexFridman"
    )]
    Comments {
        /// Video URL of the form https://www.youtube.com/watch?v=<id>
        video_url: String,

        /// Max number of comments
        #[arg(short, long, default_value_t = 10)]
        count: usize,
    },
    /// Print out random winner(s)
    #[command(
        after_help = "Example: yt winner https://www.youtube.com/watch?v=oYBGPVwNK2c&ab_channel=Katherout"
    )]
    Winner {
        /// Video URL of the form https://www.youtube.com/watch?v=<id>
        video_url: String,

        /// Total number of winners. Each user is considered equally regardless of number of comments.
        #[arg(short, long, default_value_t = 1)]
        count: usize,
    },
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::EnvFilter;

    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "yt:".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    // A bad URL must be rejected before the browser flow can start
    let video_id = match &cli.command {
        Command::Comments { video_url, .. } | Command::Winner { video_url, .. } => {
            extract_video_id(video_url)?
        }
    };

    let mut sampler = Sampler::from_time_seed();

    let (credential, token_provider) = credential_source(&cli).await?;

    // Get REST API address from environment variable or use default
    let base_url =
        std::env::var("REST_API_ADDRESS").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
    tracing::debug!("using REST API at {}", base_url);

    let service = YouTubeService::new(ServiceConfig {
        credential: Some(credential),
        base_url,
    })?;

    let start = Instant::now();
    let result = match cli.command {
        Command::Comments { count, .. } => with_progress(
            "loading youtube comments",
            service.fetch_comments(&video_id, count),
        )
        .await
        .map(|comments| {
            for (i, comment) in comments.iter().enumerate() {
                println!(
                    "{}: [{}] {}",
                    i + 1,
                    comment.author_display_name.cyan(),
                    comment.text_original
                );
            }
        }),
        Command::Winner { count, .. } => with_progress(
            "loading youtube commenters",
            service.fetch_distinct_commenters(&video_id),
        )
        .await
        .map(|commenters| {
            tracing::debug!("{} distinct commenters", commenters.len());
            for (i, winner) in sampler.pick(&commenters, count).iter().enumerate() {
                println!("Winner #{}: \"{}\"", i + 1, winner.blue().bold());
            }
        }),
    };

    // Store the token in case it was refreshed, even if the command failed
    if let Some(provider) = &token_provider {
        persist_token(provider).await;
    }

    println!("took {}ms", start.elapsed().as_millis());
    result?;
    Ok(())
}

/// A static key wins over OAuth; otherwise the cached token is loaded or the
/// browser flow runs.
async fn credential_source(
    cli: &Cli,
) -> Result<(CredentialSource, Option<SharedOAuthManager>), Box<dyn std::error::Error>> {
    if let Some(api_key_path) = &cli.api_key_path {
        tracing::info!("reading API key from {}", api_key_path.display());
        let key = std::fs::read_to_string(api_key_path)
            .map_err(|e| {
                format!(
                    "Failed to read API key file '{}': {}",
                    api_key_path.display(),
                    e
                )
            })?
            .trim()
            .to_string();
        return Ok((CredentialSource::StaticKey(key), None));
    }

    let client_id = cli
        .client_id
        .clone()
        .ok_or("either --api-key-path or --client-id (YT_CLIENT_ID) must be specified")?;

    let token_path = match &cli.token_path {
        Some(path) => path.clone(),
        None => TokenCache::default_path().map_err(yt_comments::Error::from)?,
    };

    let config = OAuthConfig::new(client_id, cli.client_secret.clone())
        .with_redirect_uri(cli.redirect_uri.clone());
    let mut manager = OAuthManager::new(config, TokenCache::new(token_path));
    manager
        .load_or_authorize()
        .await
        .map_err(yt_comments::Error::from)?;

    let provider = manager.into_shared();
    Ok((CredentialSource::TokenProvider(provider.clone()), Some(provider)))
}

/// Best effort: results already printed stay valid if this fails, so the
/// failure is only reported. Returns whether the token was written.
async fn persist_token(provider: &SharedOAuthManager) -> bool {
    match provider.lock().await.save_token() {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!("could not save token: {}", e);
            eprintln!("{} could not save token: {}", "yt:".yellow().bold(), e);
            false
        }
    }
}

/// Run `work` while a ticker shows elapsed time on stderr.
async fn with_progress<T>(message: &str, work: impl Future<Output = T>) -> T {
    if !std::io::stderr().is_terminal() {
        return work.await;
    }

    let (done_tx, done_rx) = oneshot::channel::<()>();
    let ticker = tokio::spawn(render_progress(message.to_string(), done_rx));

    let output = work.await;

    let _ = done_tx.send(());
    let _ = ticker.await;
    output
}

async fn render_progress(message: String, mut done: oneshot::Receiver<()>) {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let start = Instant::now();
    let mut interval = tokio::time::interval(PROGRESS_TICK);

    loop {
        tokio::select! {
            _ = &mut done => {
                spinner.finish_and_clear();
                return;
            }
            _ = interval.tick() => {
                spinner.set_message(format!(
                    "{}... ({}ms)",
                    message,
                    start.elapsed().as_millis()
                ));
                spinner.tick();
            }
        }
    }
}
