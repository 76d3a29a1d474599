use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use client_core::{HttpStoriesClient, PlaybackController, StoriesViewer, TickOutcome};
use shared::domain::StoryId;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Args {
    #[arg(long, default_value = "http://127.0.0.1:8443")]
    server_url: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the currently visible stories, newest first.
    List {
        #[arg(long)]
        json: bool,
    },
    /// Upload a png, jpeg or webp image as a new story.
    Upload { path: PathBuf },
    Delete { id: String },
    /// Play stories in the terminal, starting from `--from` or the newest.
    Play {
        #[arg(long)]
        from: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();
    let args = Args::parse();

    let client = HttpStoriesClient::new(&args.server_url)?;
    let mut viewer = StoriesViewer::new(Arc::new(client));
    viewer.refresh().await;
    if let Some(err) = viewer.feed().last_error() {
        bail!("could not load stories from {}: {err}", args.server_url);
    }

    match args.command {
        Command::List { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(viewer.stories())?);
            } else if viewer.stories().is_empty() {
                println!("No stories in the last 24 hours.");
            } else {
                for story in viewer.stories() {
                    println!(
                        "{}  uploaded {}  expires {}",
                        story.id,
                        story.uploaded_at.to_rfc3339(),
                        story.expires_at.to_rfc3339()
                    );
                }
            }
        }
        Command::Upload { path } => {
            let story = viewer.upload(&path).await?;
            println!("Uploaded story {} ({} visible)", story.id, viewer.stories().len());
        }
        Command::Delete { id } => {
            viewer.delete(&StoryId(id.clone())).await?;
            println!("Deleted story {id}");
        }
        Command::Play { from } => {
            let start = match from {
                Some(id) => StoryId(id),
                None => match viewer.stories().first() {
                    Some(story) => story.id.clone(),
                    None => {
                        println!("No stories to play.");
                        return Ok(());
                    }
                },
            };
            if !viewer.select(&start) {
                bail!("story {start} is not visible");
            }
            print_position(viewer.playback());
            viewer
                .play(|outcome, playback| {
                    if matches!(outcome, TickOutcome::Advanced { .. }) {
                        print_position(playback);
                    }
                })
                .await;
            println!("Done.");
        }
    }

    Ok(())
}

fn print_position(playback: &PlaybackController) {
    if let Some(view) = playback.view() {
        println!("[{}/{}] {}", view.index + 1, view.total, view.story.id);
    }
}
