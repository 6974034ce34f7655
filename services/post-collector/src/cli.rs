//! Command-line interface

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use collector::IndexQuery;

#[derive(Debug, Parser)]
#[command(name = "post-collector", version, about = "Collect posts from the Twitter API and the post index")]
pub struct Cli {
    /// Config file (default: $CONFIG_PATH or ./post-collector.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Give up after this many seconds, including rate-limit waits
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Recent posts matching the search terms, newest first
    Search {
        terms: String,
        #[arg(long, default_value_t = 100)]
        count: usize,
        /// Step the watermark by the page size instead of recomputing it
        #[arg(long)]
        fixed_step: bool,
    },
    /// One post by id
    Status { id: u64 },
    /// One user by numeric id, @name or bare screen name
    User { user: String },
    /// Stored posts from the search index
    Index(IndexArgs),
    /// External hosts cited by a post
    Sources {
        id: u64,
        /// Report link hosts as written, without following redirects
        #[arg(long)]
        no_follow: bool,
    },
    /// Credential pool summary
    Pool,
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Search { .. } => "search",
            Command::Status { .. } => "status",
            Command::User { .. } => "user",
            Command::Index(_) => "index",
            Command::Sources { .. } => "sources",
            Command::Pool => "pool",
        }
    }
}

#[derive(Debug, Args)]
pub struct IndexArgs {
    /// FIELD=TEXT full-text match; repeat to require several
    #[arg(long = "match", value_name = "FIELD=TEXT", value_parser = parse_field_pair, required = true)]
    pub matches: Vec<(String, String)>,

    /// FIELD=TEXT match to exclude
    #[arg(long, value_name = "FIELD=TEXT", value_parser = parse_field_pair)]
    pub exclude: Vec<(String, String)>,

    #[arg(long, default_value_t = 0)]
    pub from: usize,

    #[arg(long, default_value_t = 10)]
    pub size: usize,
}

impl IndexArgs {
    /// All matches required, all exclusions forbidden.
    pub fn build_query(&self) -> Option<IndexQuery> {
        let required = self
            .matches
            .iter()
            .map(|(field, text)| IndexQuery::matching(field, text));
        let excluded = self
            .exclude
            .iter()
            .map(|(field, text)| !IndexQuery::matching(field, text));
        required.chain(excluded).reduce(|acc, part| acc & part)
    }
}

fn parse_field_pair(raw: &str) -> Result<(String, String), String> {
    let (field, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected FIELD=TEXT, got {raw:?}"))?;
    let field = field.trim();
    if field.is_empty() {
        return Err(format!("empty field name in {raw:?}"));
    }
    Ok((field.to_string(), text.to_string()))
}
