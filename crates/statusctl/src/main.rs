//! statusctl - command-line client for statusd

mod cli;
mod client;
mod display;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use client::StatusdClient;
use owo_colors::OwoColorize;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let client = StatusdClient::new(&cli.url)?;

    match cli.command {
        Commands::Status => {
            let (resp, raw) = client.status().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&raw)?);
            } else {
                display::print_status(&resp);
            }
        }
        Commands::Service { id } => {
            let (resp, raw) = client.service(&id).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&raw)?);
            } else {
                display::print_service(&resp);
            }
        }
        Commands::Top { limit } => {
            let (resp, raw) = client.top(limit).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&raw)?);
            } else {
                display::print_top(&resp);
            }
        }
        Commands::Health => {
            let (resp, raw) = client.health().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&raw)?);
            } else {
                display::print_health(&resp);
            }
        }
        Commands::Flush => {
            let raw = client.flush().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&raw)?);
            } else {
                println!("[OK] {}", "Caches flushed".green());
            }
        }
    }
    Ok(())
}
