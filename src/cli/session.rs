//! Token and rate limit commands

use anyhow::{bail, Context};
use clap::Args;
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::domain::api_key::{ApiKeyId, Scope};
use crate::domain::RequestedAction;
use crate::AuthCore;

use super::keys::KeyIdArgs;
use super::print_json;

#[derive(Args)]
pub struct ExchangeArgs {
    /// API key secret; read from stdin when omitted
    #[arg(long)]
    pub secret: Option<String>,
}

#[derive(Args)]
pub struct AuthorizeArgs {
    /// Session token
    #[arg(long)]
    pub token: String,

    #[arg(long)]
    pub scope: Scope,

    #[arg(long)]
    pub guild: Option<String>,

    #[arg(long)]
    pub channel: Option<String>,
}

#[derive(Args)]
pub struct ConsumeArgs {
    pub key_id: String,

    /// Limit to apply instead of the key's own override or the
    /// configured default
    #[arg(long)]
    pub limit: Option<u32>,
}

pub(super) async fn exchange(core: &AuthCore, args: ExchangeArgs) -> anyhow::Result<()> {
    let secret = match args.secret {
        Some(secret) => secret,
        None => read_secret_from_stdin().await?,
    };

    let token = core.exchange(&secret).await?;

    print_json(&json!({
        "access_token": token.as_str(),
        "token_type": "bearer",
        "expires_at": token.expires_at(),
        "key_id": token.claims().key_id(),
        "scope": token.claims().scope,
    }))
}

async fn read_secret_from_stdin() -> anyhow::Result<String> {
    let mut line = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut line)
        .await
        .context("failed to read secret from stdin")?;

    let secret = line.trim().to_string();
    if secret.is_empty() {
        bail!("no secret given; pass --secret or pipe it on stdin");
    }
    Ok(secret)
}

pub(super) async fn authorize(core: &AuthCore, args: AuthorizeArgs) -> anyhow::Result<()> {
    let mut action = RequestedAction::new(args.scope);
    if let Some(guild) = args.guild {
        action = action.in_guild(guild);
    }
    if let Some(channel) = args.channel {
        action = action.in_channel(channel);
    }

    let decision = core.authorize(&args.token, &action).await?;
    print_json(&decision)
}

pub(super) async fn consume(core: &AuthCore, args: ConsumeArgs) -> anyhow::Result<()> {
    let status = match args.limit {
        Some(limit) => core.check_and_consume_with_limit(&args.key_id, limit).await?,
        None => {
            let key_id = ApiKeyId::new(&args.key_id).context("invalid key id")?;
            core.check_and_consume_for_key(&key_id).await?
        }
    };
    print_json(&status)
}

pub(super) async fn reset(core: &AuthCore, args: KeyIdArgs) -> anyhow::Result<()> {
    core.reset_rate_limit(&args.key_id).await?;
    print_json(&json!({ "key_id": args.key_id, "reset": true }))
}
