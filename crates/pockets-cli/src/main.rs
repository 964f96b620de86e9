#![deny(clippy::all, clippy::pedantic)]

use clap::Parser;

mod args;
mod client;
mod commands;


use args::Cli;
use client::{CliError, Ctx};

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let ctx = Ctx::new(cli.site.as_deref())?;
    let output = commands::run(&ctx, cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
