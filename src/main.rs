use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rayon::prelude::*;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use qrw::config::AppConfig;
use qrw::query::{BasicQuery, Parameter, SearchKind};
use qrw::rewrite::{
    compute_insight_command_query, is_single_repo_query, multi_repo_query, single_repo_query,
    with_defaults, Dimension, PatternReplacer,
};

#[derive(Parser)]
#[command(name = "qrw")]
#[command(about = "Rewrite search queries: defaults, repository scoping, insights, pattern replacement")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (defaults to the platform config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the parsed query tree as JSON
    Parse {
        query: String,

        /// How bare patterns are read (overrides the config)
        #[arg(short, long)]
        kind: Option<SearchKind>,
    },
    /// Print the query in canonical form
    Print {
        query: String,

        #[arg(short, long)]
        kind: Option<SearchKind>,
    },
    /// Merge default parameters into a query
    Defaults {
        query: String,

        /// Default parameter as field:value (repeatable)
        #[arg(short, long = "default", value_parser = parse_parameter)]
        defaults: Vec<Parameter>,

        /// Use the configured insight defaults instead of --default
        #[arg(long)]
        insight_defaults: bool,
    },
    /// Restrict a query to a list of repositories
    MultiRepo {
        query: String,

        /// Repository name (repeatable)
        #[arg(short, long = "repo", required = true)]
        repos: Vec<String>,

        #[arg(short, long = "default", value_parser = parse_parameter)]
        defaults: Vec<Parameter>,
    },
    /// Restrict a query to one repository
    SingleRepo {
        query: String,

        #[arg(short, long)]
        repo: String,

        /// Revision to search at
        #[arg(long)]
        rev: Option<String>,

        #[arg(short, long = "default", value_parser = parse_parameter)]
        defaults: Vec<Parameter>,
    },
    /// Check whether a query targets exactly one repository
    IsSingleRepo { query: String },
    /// Turn the pattern into a compute directive grouping by a dimension
    Insight {
        query: String,

        /// lang, repo, path, author or date
        #[arg(short, long)]
        dimension: Dimension,
    },
    /// Replace every pattern of a query with a new value
    Replace {
        query: String,
        value: String,

        #[arg(short, long)]
        kind: Option<SearchKind>,
    },
    /// Apply the configured insight defaults to one query per line
    Batch {
        /// Input file, or - for stdin
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };

    match cli.command {
        Commands::Parse { query, kind } => {
            let nodes = BasicQuery::from(query).parse(kind.unwrap_or(config.search_kind))?;
            println!("{}", serde_json::to_string_pretty(&nodes)?);
        }
        Commands::Print { query, kind } => {
            let nodes = BasicQuery::from(query).parse(kind.unwrap_or(config.search_kind))?;
            println!("{}", BasicQuery::from_nodes(&nodes));
        }
        Commands::Defaults {
            query,
            defaults,
            insight_defaults,
        } => {
            let defaults = if insight_defaults {
                config.insight_defaults()
            } else {
                defaults
            };
            println!("{}", with_defaults(&BasicQuery::from(query), &defaults)?);
        }
        Commands::MultiRepo {
            query,
            repos,
            defaults,
        } => {
            println!(
                "{}",
                multi_repo_query(&BasicQuery::from(query), &repos, &defaults)?
            );
        }
        Commands::SingleRepo {
            query,
            repo,
            rev,
            defaults,
        } => {
            println!(
                "{}",
                single_repo_query(&BasicQuery::from(query), &repo, rev.as_deref(), &defaults)?
            );
        }
        Commands::IsSingleRepo { query } => match is_single_repo_query(&BasicQuery::from(query)) {
            Ok(single) => println!("{single}"),
            Err(e) if e.is_not_supported() => println!("unsupported"),
            Err(e) => return Err(e.into()),
        },
        Commands::Insight { query, dimension } => {
            println!(
                "{}",
                compute_insight_command_query(&BasicQuery::from(query), dimension)?
            );
        }
        Commands::Replace { query, value, kind } => {
            let replacer = PatternReplacer::new(
                &BasicQuery::from(query),
                kind.unwrap_or(config.search_kind),
            )?;
            println!("{}", replacer.replace(&value)?);
        }
        Commands::Batch { input } => {
            run_batch(&input, &config)?;
        }
    }

    Ok(())
}

/// Rewrite every line in parallel; output keeps the input order
fn run_batch(input: &Path, config: &AppConfig) -> Result<()> {
    let content = if input.as_os_str() == "-" {
        let mut buf = String::new();
        io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read queries from stdin")?;
        buf
    } else {
        fs::read_to_string(input)
            .with_context(|| format!("Failed to read {}", input.display()))?
    };

    let defaults = config.insight_defaults();
    let lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).collect();

    let results: Vec<String> = lines
        .par_iter()
        .map(|line| match with_defaults(&BasicQuery::from(*line), &defaults) {
            Ok(query) => query.into_string(),
            Err(e) => format!("error: {e}"),
        })
        .collect();

    for result in results {
        println!("{result}");
    }
    Ok(())
}

fn parse_parameter(s: &str) -> std::result::Result<Parameter, String> {
    let (field, value) = s
        .split_once(':')
        .ok_or_else(|| format!("expected field:value, got {s:?}"))?;
    if field.is_empty() {
        return Err(format!("missing field in {s:?}"));
    }
    match field.strip_prefix('-') {
        Some(field) => Ok(Parameter::new(field, value).negate()),
        None => Ok(Parameter::new(field, value)),
    }
}

/// Initialize logging system. `RUST_LOG` wins over `--verbose`.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{}={level}", env!("CARGO_PKG_NAME"))));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}
