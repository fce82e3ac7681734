//! ProxyKit credential management demo
//!
//! Issues, inspects, reconfigures and deletes proxy credentials from the
//! command line.
//!
//! # Usage
//!
//! ```bash
//! # Issue two credentials
//! cargo run --example manage_credentials -- --api-token pk_live_... create --count 2
//!
//! # Enable sticky sessions and smart routing on the newest credential
//! cargo run --example manage_credentials -- latest --sticky --smart-routing
//!
//! # Show a credential as JSON, using a config file
//! cargo run --example manage_credentials -- --config proxykit.toml show u1
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use proxykit_client::{ProxyHandle, ProxyKitClient};
use proxykit_common::{Config, Protocol};

#[derive(Parser, Debug)]
#[command(author, version, about = "ProxyKit credential management demo")]
struct Args {
    /// TOML configuration file; flags below override it
    #[arg(long)]
    config: Option<PathBuf>,

    /// Base URL of the management API
    #[arg(long)]
    base_url: Option<String>,

    /// API token for authentication
    #[arg(long, env = "PROXYKIT_API_TOKEN")]
    api_token: Option<String>,

    /// Protocol used when printing proxy URLs
    #[arg(long, default_value = "http")]
    protocol: Protocol,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Issue new credentials
    Create {
        #[arg(long, default_value_t = 1)]
        count: usize,
    },
    /// Load the most recent credential and optionally enable features
    Latest {
        #[arg(long)]
        sticky: bool,
        #[arg(long)]
        smart_routing: bool,
    },
    /// List every credential on the account
    List,
    /// Print one credential as JSON
    Show { username: String },
    /// Delete a credential
    Delete { username: String },
    /// Print traffic usage
    Usage,
}

fn print_proxy(proxy: &ProxyHandle, protocol: Protocol) {
    println!("{:<40} {}", proxy.username(), proxy.to_url(protocol));
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => Config::load(path)?,
        None => Config::new(),
    };
    if let Some(base_url) = &args.base_url {
        config = config.with_base_url(base_url);
    }
    if let Some(token) = &args.api_token {
        config = config.with_api_token(token);
    }

    let client = ProxyKitClient::new(config)?;
    let registry = client.credentials();

    match args.command {
        Command::Create { count } => {
            for proxy in registry.create(count).await? {
                print_proxy(&proxy, args.protocol);
            }
        }
        Command::Latest {
            sticky,
            smart_routing,
        } => {
            let mut proxy = registry
                .load_first()
                .await?
                .context("account has no credentials")?;
            if sticky {
                proxy.enable_sticky().await?;
            }
            if smart_routing {
                proxy.enable_smart_routing().await?;
            }
            print_proxy(&proxy, args.protocol);
        }
        Command::List => {
            for proxy in registry.refresh().await? {
                print_proxy(&proxy, args.protocol);
            }
        }
        Command::Show { username } => {
            let proxy = registry
                .find(&username)
                .await?
                .with_context(|| format!("credential {username} not found"))?;
            println!("{}", serde_json::to_string_pretty(&proxy.describe())?);
        }
        Command::Delete { username } => {
            registry.delete(&username).await?;
            println!("Deleted {username}");
        }
        Command::Usage => {
            let usage = client.usage().await?;
            println!("Bytes used: {}", usage.bytes_used);
            println!("Requests:   {}", usage.requests);
            if let Some(remaining) = usage.bytes_remaining() {
                println!("Remaining:  {remaining}");
            }
        }
    }

    Ok(())
}
