// SPDX-License-Identifier: GPL-3.0-only
mod config;
mod logging;
mod platform;
mod utils;
mod workshop;

#[cfg(test)]
mod test_helpers;

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use config::{Backend, Config};
use logging::setup_logging;
use platform::{AppId, LocalPlatform, Platform, WorkshopItemId};
use workshop::{ClientOptions, UploadRequest, WorkshopClient};

#[derive(Debug, Parser)]
#[command(name = "workshop-client", version, about = "Publish and sync workshop items")]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, global = true, env = "WORKSHOP_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Publish a file with a thumbnail
    Upload {
        /// Name the file is stored and published under
        #[arg(long)]
        file_name: String,
        /// Local file whose contents get published
        #[arg(long)]
        input: PathBuf,
        #[arg(long)]
        title: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long = "tag")]
        tags: Vec<String>,
        /// Thumbnail image
        #[arg(long)]
        thumbnail: PathBuf,
    },
    /// Enumerate subscriptions and download missing or outdated items
    Sync {
        /// Only fetch the item at this position of the subscribed list
        #[arg(long)]
        index: Option<usize>,
    },
    /// Remove a subscription
    Unsubscribe { id: u64 },
    /// Delete a file from private storage
    Delete { file_name: String },
    /// Subscribe to a published item
    Subscribe { id: u64 },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match &cli.config {
        Some(path) => {
            let path = path.display().to_string();
            Config::load_with(|key| match key {
                "WORKSHOP_CONFIG" => Some(path.clone()),
                _ => std::env::var(key).ok(),
            })?
        }
        None => Config::load()?,
    };

    // Initialize logging
    setup_logging(&config.log_level)?;

    info!("Starting workshop-client v{}", env!("CARGO_PKG_VERSION"));

    match config.backend {
        Backend::Local => {
            let platform = Arc::new(
                LocalPlatform::open(&config.platform_root, AppId(config.app_id))
                    .await
                    .with_context(|| {
                        format!("Failed to open platform root {}", config.platform_root.display())
                    })?,
            );
            let client = WorkshopClient::new(platform, ClientOptions::from(&config));
            run(cli.command, &client).await
        }
        Backend::Steam => run_steam(cli.command, &config).await,
    }
}

#[cfg(feature = "steam")]
async fn run_steam(command: Command, config: &Config) -> anyhow::Result<()> {
    let staging_dir = config.platform_root.join("staging");
    let platform = Arc::new(
        platform::steam::SteamPlatform::init(AppId(config.app_id), staging_dir)
            .context("Failed to initialize the Steam API")?,
    );
    let client = WorkshopClient::new(platform, ClientOptions::from(config));
    run(command, &client).await
}

#[cfg(not(feature = "steam"))]
async fn run_steam(_command: Command, _config: &Config) -> anyhow::Result<()> {
    anyhow::bail!("Steam backend requested but this build lacks the `steam` feature")
}

async fn run<P: Platform>(command: Command, client: &WorkshopClient<P>) -> anyhow::Result<()> {
    match command {
        Command::Upload {
            file_name,
            input,
            title,
            description,
            tags,
            thumbnail,
        } => {
            let contents = tokio::fs::read(&input)
                .await
                .with_context(|| format!("Failed to read {}", input.display()))?;
            let thumbnail = std::path::absolute(&thumbnail)
                .with_context(|| format!("Failed to resolve {}", thumbnail.display()))?;

            let request = UploadRequest::new(file_name, contents, title, description, thumbnail)
                .with_tags(tags);
            let outcome = client.save_to_workshop(request).await;
            match outcome.item_id() {
                Some(item_id) => println!("published {item_id} ({outcome:?})"),
                None => println!("not published: {outcome:?}"),
            }
        }
        Command::Sync { index: None } => {
            let mut fetched = client.fetched();
            let progress = tokio::spawn(async move {
                let mut resolved = 0usize;
                while fetched.changed().await.is_ok() {
                    if *fetched.borrow_and_update() {
                        resolved += 1;
                        debug!(resolved, "Subscribed item resolved");
                    }
                }
            });

            let result = client.get_subscribed_items().await;
            progress.abort();
            let report = result?;

            for (id, outcome) in &report.items {
                println!("{id}: {outcome:?}");
            }
            println!(
                "{} downloaded, {} up to date, {} failed",
                report.downloaded(),
                report.up_to_date(),
                report.failed()
            );
        }
        Command::Sync { index: Some(index) } => {
            client.refresh_subscriptions().await?;
            let subscribed = client.subscribed_items().await;
            println!("{} subscribed items", subscribed.len());

            let outcome = client.get_item_content(index).await?;
            if let Some(id) = subscribed.get(index) {
                println!("{id}: {outcome:?} (fetched: {})", client.is_fetched());
            }
        }
        Command::Unsubscribe { id } => {
            client.unsubscribe(WorkshopItemId(id)).await?;
            println!("unsubscribed {id}");
        }
        Command::Delete { file_name } => {
            let deleted = client.delete_file(&file_name).await;
            println!("{}", if deleted { "deleted" } else { "not found" });
        }
        Command::Subscribe { id } => {
            client.subscribe(WorkshopItemId(id)).await?;
            println!("subscribed {id}");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_upload() {
        let cli = Cli::try_parse_from([
            "workshop-client",
            "upload",
            "--file-name",
            "map.txt",
            "--input",
            "./map.txt",
            "--title",
            "Canyon",
            "--tag",
            "track",
            "--tag",
            "desert",
            "--thumbnail",
            "/img/thumb.png",
        ])
        .unwrap();

        match cli.command {
            Command::Upload {
                file_name,
                tags,
                description,
                ..
            } => {
                assert_eq!(file_name, "map.txt");
                assert_eq!(tags, vec!["track".to_string(), "desert".to_string()]);
                assert_eq!(description, "");
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_unsubscribe_requires_numeric_id() {
        assert!(Cli::try_parse_from(["workshop-client", "unsubscribe", "abc"]).is_err());
        assert!(Cli::try_parse_from(["workshop-client", "unsubscribe", "42"]).is_ok());
    }

    #[test]
    fn test_parse_sync_index() {
        let cli = Cli::try_parse_from(["workshop-client", "sync", "--index", "3"]).unwrap();
        assert!(matches!(cli.command, Command::Sync { index: Some(3) }));

        let cli = Cli::try_parse_from(["workshop-client", "sync"]).unwrap();
        assert!(matches!(cli.command, Command::Sync { index: None }));
    }

    #[tokio::test]
    async fn test_run_single_item_sync() {
        let config = test_helpers::create_test_config();
        let root = config.platform_root.parent().unwrap().to_path_buf();
        let platform = Arc::new(
            LocalPlatform::open(&config.platform_root, AppId(config.app_id))
                .await
                .unwrap(),
        );
        let client = WorkshopClient::new(Arc::clone(&platform), ClientOptions::from(&config));

        let image = root.join("thumb.png");
        std::fs::write(&image, b"png").unwrap();
        let request = UploadRequest::new("level(2).txt", "level", "Level", "", &image);
        let item_id = client.save_to_workshop(request).await.item_id().unwrap();

        run(Command::Subscribe { id: item_id.0 }, &client).await.unwrap();
        run(Command::Sync { index: Some(0) }, &client).await.unwrap();

        assert_eq!(
            std::fs::read(config.content_dir.join("level(2).txt")).unwrap(),
            b"level"
        );
        assert!(client.is_fetched());
        assert!(run(Command::Sync { index: Some(1) }, &client).await.is_err());

        let _ = std::fs::remove_dir_all(root);
    }

    #[tokio::test]
    async fn test_run_subscribe_and_sync() {
        let config = test_helpers::create_test_config();
        let platform = Arc::new(
            LocalPlatform::open(&config.platform_root, AppId(config.app_id))
                .await
                .unwrap(),
        );
        let client = WorkshopClient::new(Arc::clone(&platform), ClientOptions::from(&config));

        assert!(run(Command::Subscribe { id: 7 }, &client).await.is_err());
        run(Command::Sync { index: None }, &client).await.unwrap();
        assert!(
            run(Command::Sync { index: Some(0) }, &client)
                .await
                .is_err()
        );
        run(
            Command::Delete {
                file_name: "missing.txt".to_string(),
            },
            &client,
        )
        .await
        .unwrap();

        let _ = std::fs::remove_dir_all(config.platform_root.parent().unwrap());
    }
}
