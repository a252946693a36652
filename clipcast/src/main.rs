//! clipcast - Post Kindle highlights to Mastodon and tend the follow graph

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use libclipcast::logging::{self, LogFormat};
use libclipcast::platforms::mastodon::MastodonClient;
use libclipcast::platforms::Platform;
use libclipcast::{ClipcastError, Config, GraphService, QuoteService};
use serde_json::json;
use tracing::debug;

#[derive(Parser)]
#[command(name = "clipcast")]
#[command(about = "Post Kindle highlights to Mastodon and keep the follow graph tidy", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the config file
    #[arg(long, global = true, env = "CLIPCAST_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format (text, json, pretty)
    #[arg(long, global = true)]
    log_format: Option<LogFormat>,
}

#[derive(Subcommand)]
enum Commands {
    /// Mark every clipping prefixed with ">> " as processed
    SkipSelected,

    /// Post the oldest clipping that has not been posted yet
    PostSingleQuote {
        /// Mark the oldest clipping as processed without posting it
        #[arg(long, conflicts_with_all = ["only_print", "print_next"])]
        skip: bool,

        /// Print the oldest unprocessed clipping and exit
        #[arg(long, conflicts_with = "print_next")]
        only_print: bool,

        /// Print the next N posts as they would be published and exit
        #[arg(long, value_name = "N")]
        print_next: Option<usize>,

        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Unfollow the longest-followed accounts that do not follow back
    UnfollowSomeUnfollowers {
        /// How many accounts to unfollow
        #[arg(default_value_t = 50)]
        amount: usize,
    },

    /// Follow back followers and accounts that boosted our posts
    FollowAllFollowers,

    /// Follow the followers of other accounts
    FollowFollowersOfOthers {
        /// How many accounts to follow in total
        #[arg(long, default_value_t = 100)]
        amount: usize,

        /// Accounts whose followers to follow, in order
        #[arg(required = true)]
        handles: Vec<String>,
    },

    /// Check whether an account follows us
    FollowsMe {
        /// Account handle, e.g. user@instance.social
        handle: String,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    logging::from_env(cli.log_format, cli.verbose).init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(exit_code(&e));
    }
}

fn exit_code(error: &anyhow::Error) -> i32 {
    error
        .downcast_ref::<ClipcastError>()
        .map(ClipcastError::exit_code)
        .unwrap_or(1)
}

fn load_config(path: Option<&Path>) -> libclipcast::Result<Config> {
    match path {
        Some(path) => Config::load_from_path(path),
        None => Config::load(),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = load_config(cli.config.as_deref())?;
    debug!("Clippings file: {}", config.clippings_path().display());

    match cli.command {
        Commands::SkipSelected => skip_selected(&config),
        Commands::PostSingleQuote {
            skip,
            only_print,
            print_next,
            format,
        } => {
            let quotes = QuoteService::from_config(&config);
            if let Some(n) = print_next {
                print_next_posts(&quotes, n, format)
            } else if only_print {
                print_oldest(&quotes, format)
            } else if skip {
                skip_oldest(&quotes, format)
            } else {
                post_oldest(&config, &quotes, format).await
            }
        }
        Commands::UnfollowSomeUnfollowers { amount } => {
            let client = connect(&config).await?;
            let graph = GraphService::from_config(&client, &config)?;
            let unfollowed = graph.unfollow_unfollowers(amount).await?;
            println!("Unfollowed {} accounts", unfollowed);
            Ok(())
        }
        Commands::FollowAllFollowers => {
            let client = connect(&config).await?;
            let graph = GraphService::from_config(&client, &config)?;
            let summary = graph.follow_all_followers().await?;
            println!(
                "Followed {} followers and {} boosters",
                summary.followers_followed, summary.boosters_followed
            );
            Ok(())
        }
        Commands::FollowFollowersOfOthers { amount, handles } => {
            let client = connect(&config).await?;
            let graph = GraphService::from_config(&client, &config)?;
            let followed = graph.follow_followers_of_others(amount, &handles).await?;
            println!("Followed {} accounts", followed);
            Ok(())
        }
        Commands::FollowsMe { handle } => {
            let client = connect(&config).await?;
            let graph = GraphService::from_config(&client, &config)?;
            let follows = graph.is_following_me(&handle).await?;
            println!("{}", if follows { "yes" } else { "no" });
            Ok(())
        }
    }
}

/// Build and authenticate the Mastodon client
async fn connect(config: &Config) -> libclipcast::Result<MastodonClient> {
    let mut client = MastodonClient::from_config(config.require_mastodon()?)?;
    client.authenticate().await?;
    Ok(client)
}

fn skip_selected(config: &Config) -> Result<()> {
    let quotes = QuoteService::from_config(config);
    let added = quotes.skip_selected()?;
    println!("Marked {} clippings as processed", added);
    Ok(())
}

fn print_next_posts(quotes: &QuoteService, n: usize, format: OutputFormat) -> Result<()> {
    let clippings = quotes.oldest_unprocessed_n(n)?;

    match format {
        OutputFormat::Text => {
            for clipping in &clippings {
                println!("{}", quotes.compose(clipping));
                println!("==========");
            }
        }
        OutputFormat::Json => {
            let posts: Vec<_> = clippings
                .iter()
                .map(|c| json!({ "id": c.id(), "content": quotes.compose(c) }))
                .collect();
            println!("{}", serde_json::to_string_pretty(&posts)?);
        }
    }

    Ok(())
}

fn print_oldest(quotes: &QuoteService, format: OutputFormat) -> Result<()> {
    let clipping = quotes.oldest_unprocessed()?;

    match format {
        OutputFormat::Text => println!("{}", clipping),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&clipping)?),
    }

    Ok(())
}

fn skip_oldest(quotes: &QuoteService, format: OutputFormat) -> Result<()> {
    let clipping = quotes.skip_oldest()?;

    match format {
        OutputFormat::Text => println!("Skipped: {}", clipping.body),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({ "skipped": clipping }))?
        ),
    }

    Ok(())
}

async fn post_oldest(config: &Config, quotes: &QuoteService, format: OutputFormat) -> Result<()> {
    // Fail on an empty backlog before touching the network
    quotes.oldest_unprocessed()?;

    let client = connect(config).await?;
    let outcome = quotes.post_oldest(&client).await?;

    match format {
        OutputFormat::Text => println!("{}:{}", client.name(), outcome.status_id),
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&json!({
                "platform": client.name(),
                "status_id": outcome.status_id,
                "content": outcome.content,
            }))?
        ),
    }

    Ok(())
}
