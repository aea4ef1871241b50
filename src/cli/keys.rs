//! Key management commands

use anyhow::Context;
use chrono::Duration;
use clap::Args;
use serde_json::json;

use crate::domain::api_key::{ApiKeyId, Restriction, RestrictionSet, Scope};
use crate::infrastructure::api_key::IssueKeyRequest;
use crate::AuthCore;

use super::print_json;

#[derive(Args)]
pub struct IssueKeyArgs {
    /// Owner the key is issued to
    #[arg(long)]
    pub owner: String,

    /// read_only, read_write or moderate
    #[arg(long, default_value = "read_only")]
    pub scope: Scope,

    /// Allowed target as `guild` or `guild:channel`; repeatable
    #[arg(long = "restrict")]
    pub restrictions: Vec<Restriction>,

    /// Lifetime in hours; defaults to the configured key TTL
    #[arg(long)]
    pub ttl_hours: Option<u32>,

    #[arg(long)]
    pub label: Option<String>,

    /// Requests per window replacing the configured default
    #[arg(long)]
    pub rate_limit: Option<u32>,
}

#[derive(Args)]
pub struct KeyIdArgs {
    pub key_id: String,
}

#[derive(Args)]
pub struct ListKeysArgs {
    #[arg(long)]
    pub owner: String,
}

pub(super) async fn issue(core: &AuthCore, args: IssueKeyArgs) -> anyhow::Result<()> {
    let mut request = IssueKeyRequest::new(args.owner, args.scope)
        .with_restrictions(args.restrictions.into_iter().collect::<RestrictionSet>());

    if let Some(hours) = args.ttl_hours {
        request = request.with_ttl(Duration::hours(i64::from(hours)));
    }
    if let Some(label) = args.label {
        request = request.with_label(label);
    }
    if let Some(limit) = args.rate_limit {
        request = request.with_rate_limit_override(limit);
    }

    let issued = core.issue_key(request).await?;

    print_json(&json!({
        "key": issued.api_key,
        "secret": issued.secret,
    }))
}

pub(super) async fn revoke(core: &AuthCore, args: KeyIdArgs) -> anyhow::Result<()> {
    let key_id = ApiKeyId::new(&args.key_id).context("invalid key id")?;
    core.revoke_key(&key_id).await?;

    print_json(&json!({ "key_id": key_id, "revoked": true }))
}

pub(super) async fn list(core: &AuthCore, args: ListKeysArgs) -> anyhow::Result<()> {
    let keys = core.list_keys(&args.owner).await?;
    print_json(&keys)
}
