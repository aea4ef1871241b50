//! Operator command line for the auth core
//!
//! Every command prints one JSON document on stdout. Logs go to stderr.

mod keys;
mod session;

use clap::{Parser, Subcommand};
use serde::Serialize;

use crate::AuthCore;

pub use keys::{IssueKeyArgs, KeyIdArgs, ListKeysArgs};
pub use session::{AuthorizeArgs, ConsumeArgs, ExchangeArgs};

/// Discord MCP Auth - API keys, session tokens and rate limits
#[derive(Parser)]
#[command(name = "discord-mcp-auth")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Issue a new API key and print its secret once
    IssueKey(IssueKeyArgs),

    /// Revoke an API key; tokens minted from it stop working
    RevokeKey(KeyIdArgs),

    /// List the keys of an owner
    ListKeys(ListKeysArgs),

    /// Exchange an API key secret for a session token
    Exchange(ExchangeArgs),

    /// Check whether a session token may perform an action
    Authorize(AuthorizeArgs),

    /// Consume one request from a key's rate limit window
    Consume(ConsumeArgs),

    /// Clear a key's rate limit window
    ResetRateLimit(KeyIdArgs),
}

pub async fn run(core: &AuthCore, command: Command) -> anyhow::Result<()> {
    match command {
        Command::IssueKey(args) => keys::issue(core, args).await,
        Command::RevokeKey(args) => keys::revoke(core, args).await,
        Command::ListKeys(args) => keys::list(core, args).await,
        Command::Exchange(args) => session::exchange(core, args).await,
        Command::Authorize(args) => session::authorize(core, args).await,
        Command::Consume(args) => session::consume(core, args).await,
        Command::ResetRateLimit(args) => session::reset(core, args).await,
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
