use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use faceted_search::config::{Config, LoggingConfig};
use faceted_search::search::{
    create_engine, Document, EngineBackend, FilterValue, RangeSpec, SearchRequest, SortOrder,
    WriteOptions,
};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "faceted-search")]
#[command(about = "Faceted search over Elasticsearch and Meilisearch", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, env = "FACETED_SEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Backend to use, overriding configuration
    #[arg(short, long)]
    backend: Option<EngineBackend>,

    /// Index to operate on
    #[arg(short, long, default_value = "courseware_content")]
    index: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a search and print the result envelope
    Search {
        /// Free-text query
        #[arg(value_name = "QUERY")]
        query: Option<String>,

        /// Equality filter FIELD=VALUE; repeat a field to match any of its values
        #[arg(short, long = "field", value_name = "FIELD=VALUE")]
        fields: Vec<String>,

        /// Filter FIELD=VALUE that also matches documents without the field
        #[arg(long = "filter", value_name = "FIELD=VALUE")]
        filters: Vec<String>,

        /// Inclusive range FIELD=LOW..HIGH (either side may be empty)
        #[arg(long = "range", value_name = "FIELD=LOW..HIGH")]
        ranges: Vec<String>,

        /// Exclude documents where FIELD=VALUE
        #[arg(short, long = "exclude", value_name = "FIELD=VALUE")]
        excludes: Vec<String>,

        /// Facet to count, optionally limited to the top N terms
        #[arg(short = 'a', long = "facet", value_name = "FIELD[:SIZE]")]
        facets: Vec<String>,

        /// Sort criterion
        #[arg(short, long = "sort", value_name = "FIELD[:asc|desc]")]
        sort: Vec<String>,

        #[arg(long, default_value = "0")]
        from: usize,

        /// Page size (defaults to the configured page size)
        #[arg(long)]
        size: Option<usize>,

        /// Count each facet without its own filters
        #[arg(short, long)]
        multivalue: bool,
    },

    /// Index documents from a JSON Lines file
    Index {
        #[arg(short, long, value_name = "JSONL")]
        file: PathBuf,

        /// Wait until the documents are searchable
        #[arg(short, long)]
        refresh: bool,
    },

    /// Remove documents by logical id
    Remove {
        #[arg(value_name = "ID", required = true)]
        ids: Vec<String>,

        /// Wait until the removal is visible
        #[arg(short, long)]
        refresh: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = Config::load_from(cli.config.as_deref()).context("Failed to load configuration")?;
    init_tracing(&config.logging);

    if let Some(backend) = cli.backend {
        config.search.backend = Some(backend);
        config.search.index_backends.remove(&cli.index);
    }

    let engine = create_engine(&config.search, &cli.index)?;
    tracing::info!(backend = %engine.backend(), index = %engine.index_name(), "Search engine ready");

    match cli.command {
        Commands::Search {
            query,
            fields,
            filters,
            ranges,
            excludes,
            facets,
            sort,
            from,
            size,
            multivalue,
        } => {
            let mut request = SearchRequest::new()
                .with_from(from)
                .with_size(size.unwrap_or(config.search.default_page_size))
                .multivalue(multivalue);
            if let Some(query) = query {
                request = request.with_query_string(query);
            }

            for (field, values) in group_pairs(&fields)? {
                request = request.with_field(field, values);
            }
            for (field, value) in filters.iter().map(|f| split_pair(f)).collect::<Result<Vec<_>>>()? {
                request = request.with_filter(field, value);
            }
            for range in &ranges {
                let (field, range) = parse_range(range)?;
                request = request.with_range(field, range);
            }
            for (field, values) in group_pairs(&excludes)? {
                request = request.excluding(field, values);
            }
            for facet in &facets {
                let (field, size) = match facet.split_once(':') {
                    Some((field, size)) => (
                        field,
                        Some(size.parse::<usize>().with_context(|| format!("Invalid facet size in `{}`", facet))?),
                    ),
                    None => (facet.as_str(), None),
                };
                request = request.with_aggregation(field, size);
            }
            for criterion in &sort {
                let (field, order) = match criterion.split_once(':') {
                    Some((field, order)) => (field, order.parse::<SortOrder>().map_err(anyhow::Error::msg)?),
                    None => (criterion.as_str(), SortOrder::Asc),
                };
                request = request.with_sort(field, order);
            }

            let result = engine.search(&request).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
        }

        Commands::Index { file, refresh } => {
            let contents = tokio::fs::read_to_string(&file)
                .await
                .with_context(|| format!("Failed to read {}", file.display()))?;

            let documents = contents
                .lines()
                .enumerate()
                .filter(|(_, line)| !line.trim().is_empty())
                .map(|(number, line)| {
                    let value: serde_json::Value = serde_json::from_str(line)
                        .with_context(|| format!("Line {} is not valid JSON", number + 1))?;
                    Document::try_from(value).with_context(|| format!("Line {} is not a document", number + 1))
                })
                .collect::<Result<Vec<_>>>()?;

            engine.index(&documents, WriteOptions { refresh }).await?;
            println!("Indexed {} document(s) into {}", documents.len(), engine.index_name());
        }

        Commands::Remove { ids, refresh } => {
            engine.remove(&ids, WriteOptions { refresh }).await?;
            println!("Removed {} document(s) from {}", ids.len(), engine.index_name());
        }
    }

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| logging.level.as_str().into());

    let json_layer = logging
        .json
        .then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr));
    let text_layer = (!logging.json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .init();
}

fn split_pair(pair: &str) -> Result<(&str, &str)> {
    match pair.split_once('=') {
        Some((field, value)) if !field.is_empty() => Ok((field, value)),
        _ => bail!("Expected FIELD=VALUE, got `{}`", pair),
    }
}

/// Merge repeated FIELD=VALUE pairs per field, keeping first-seen order
///
/// Values stay text so ids such as `00123` reach the backend unchanged.
fn group_pairs(pairs: &[String]) -> Result<Vec<(String, Vec<FilterValue>)>> {
    let mut grouped: Vec<(String, Vec<FilterValue>)> = Vec::new();
    for pair in pairs {
        let (field, value) = split_pair(pair)?;
        let value = FilterValue::from(value);
        match grouped.iter_mut().find(|(existing, _)| existing == field) {
            Some((_, values)) => values.push(value),
            None => grouped.push((field.to_string(), vec![value])),
        }
    }
    Ok(grouped)
}

/// Range bound: integer, finite float, RFC 3339 timestamp, otherwise text
fn parse_bound(raw: &str) -> Result<FilterValue> {
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(FilterValue::Integer(i));
    }
    if let Ok(f) = raw.parse::<f64>() {
        if !f.is_finite() {
            bail!("Range bound `{}` is not a finite number", raw);
        }
        return Ok(FilterValue::Float(f));
    }
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Ok(FilterValue::DateTime(dt));
    }
    Ok(FilterValue::Text(raw.to_string()))
}

fn parse_range(raw: &str) -> Result<(&str, RangeSpec)> {
    let (field, bounds) = split_pair(raw)?;
    let Some((lower, upper)) = bounds.split_once("..") else {
        bail!("Expected FIELD=LOW..HIGH, got `{}`", raw);
    };
    let bound = |value: &str| (!value.is_empty()).then(|| parse_bound(value)).transpose();
    Ok((
        field,
        RangeSpec {
            lower: bound(lower)?,
            upper: bound(upper)?,
        },
    ))
}
