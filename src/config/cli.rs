use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum, builder::BoolishValueParser};
use serde::Deserialize;

/// Command-line arguments for the relcache binary.
#[derive(Debug, Parser)]
#[command(
    name = "relcache",
    version,
    about = "Relation store with cached follower and subscriber views"
)]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(
        long = "config-file",
        env = "RELCACHE_CONFIG_FILE",
        value_name = "PATH",
        global = true
    )]
    pub config_file: Option<PathBuf>,

    #[command(flatten)]
    pub overrides: Overrides,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Args, Default, Clone)]
pub struct Overrides {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL", global = true)]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT", global = true)]
    pub database_max_connections: Option<u32>,

    /// Select the relation store backend.
    #[arg(long = "store", value_name = "BACKEND", global = true)]
    pub store: Option<StoreBackend>,

    /// Select the cache backend.
    #[arg(long = "cache", value_name = "BACKEND", global = true)]
    pub cache: Option<CacheBackend>,

    /// Override the Redis connection URL.
    #[arg(long = "redis-url", value_name = "URL", global = true)]
    pub redis_url: Option<String>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new(),
        global = true
    )]
    pub log_json: Option<bool>,

    /// Per-operation deadline in milliseconds.
    #[arg(long = "timeout-ms", value_name = "MILLIS", global = true)]
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Apply pending database migrations.
    Migrate,
    /// Insert relations given as OWNER:RELATED pairs.
    Create(CreateArgs),
    /// Delete relations given as OWNER:RELATED pairs.
    Delete(PairsArgs),
    /// Mark RELATED as blocked by OWNER.
    Block(PairArgs),
    /// Clear the blocked flag.
    Unblock(PairArgs),
    /// Mark OWNER as following RELATED.
    Follow(PairArgs),
    /// Clear the following flag.
    Unfollow(PairArgs),
    /// Mark OWNER as subscribed to RELATED.
    Subscribe(PairArgs),
    /// Clear the subscribed flag.
    Unsubscribe(PairArgs),
    /// Print a single relation.
    Show(PairArgs),
    /// Print the follower-id view of OWNER.
    Followers(OwnerArgs),
    /// Print the subscriber-id view of OWNER.
    Subscribers(OwnerArgs),
}

#[derive(Debug, Args, Clone)]
pub struct CreateArgs {
    #[command(flatten)]
    pub pairs: PairsArgs,

    /// Create the relations with the blocked flag set.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub blocked: bool,

    /// Create the relations with the following flag set.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub following: bool,

    /// Create the relations with the subscribed flag set.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub subscribed: bool,
}

#[derive(Debug, Args, Clone)]
pub struct PairsArgs {
    #[arg(value_name = "OWNER:RELATED", value_parser = parse_pair, required = true)]
    pub pairs: Vec<(String, String)>,
}

#[derive(Debug, Args, Clone)]
pub struct PairArgs {
    #[arg(value_name = "OWNER")]
    pub owner: String,

    #[arg(value_name = "RELATED")]
    pub related: String,
}

#[derive(Debug, Args, Clone)]
pub struct OwnerArgs {
    #[arg(value_name = "OWNER")]
    pub owner: String,
}

fn parse_pair(value: &str) -> Result<(String, String), String> {
    let (owner, related) = value
        .split_once(':')
        .ok_or_else(|| format!("expected OWNER:RELATED, got `{value}`"))?;
    if owner.is_empty() || related.is_empty() {
        return Err(format!("both ids are required in `{value}`"));
    }
    Ok((owner.to_string(), related.to_string()))
}
