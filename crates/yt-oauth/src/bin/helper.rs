use clap::Parser;
use std::path::PathBuf;
use yt_oauth::{OAuthConfig, TokenCache, start_auth_flow};

/// OAuth 2.0 helper tool: authorize once and store the token for the yt CLI
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// OAuth client ID
    #[arg(long, env = "YT_CLIENT_ID", required = true)]
    client_id: String,

    /// OAuth client secret (leave empty for public PKCE clients)
    #[arg(long, env = "YT_CLIENT_SECRET", default_value = "")]
    client_secret: String,

    /// Redirect URI registered for the client; its port is used for the local listener
    #[arg(long, default_value = "http://localhost:8090/")]
    redirect_uri: String,

    /// Path to save the OAuth token file (defaults to ~/.yt.json)
    #[arg(long)]
    token_path: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config =
        OAuthConfig::new(args.client_id, args.client_secret).with_redirect_uri(args.redirect_uri);
    let token_path = match args.token_path {
        Some(path) => path,
        None => TokenCache::default_path()?,
    };
    let cache = TokenCache::new(token_path);

    // The callback handler persists the token before this returns
    start_auth_flow(&config, &cache).await?;

    eprintln!("\nOAuth token saved to: {}", cache.path().display());
    eprintln!("You can now use the yt CLI");

    Ok(())
}
