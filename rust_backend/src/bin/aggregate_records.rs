use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

use health_records::aggregation::AggregationOutput;
use health_records::db::{services, RecordTypeRegistry, RepositoryConfig, RepositoryFactory};
use health_records::models::{AggregateRequest, Record};

// ========================================
// Input Loading
// ========================================

fn load_json<T: DeserializeOwned>(path: &str) -> Result<T> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path))?;
    let deserializer = &mut serde_json::Deserializer::from_str(&content);
    serde_path_to_error::deserialize(deserializer).map_err(|e| {
        anyhow::anyhow!("Failed to parse {} at '{}': {}", path, e.path(), e.inner())
    })
}

fn load_config(path: Option<&str>) -> Result<RepositoryConfig> {
    let config = match path {
        Some(path) => RepositoryConfig::from_file(Path::new(path))
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => RepositoryConfig::from_default_location().unwrap_or_else(|e| {
            log::info!("Using default repository configuration: {}", e);
            RepositoryConfig::default()
        }),
    };
    config
        .with_env_overrides()
        .context("Invalid repository configuration overrides")
}

// ========================================
// Aggregation
// ========================================

async fn run_aggregation(
    records_path: &str,
    request_path: &str,
    config_path: Option<&str>,
) -> Result<AggregationOutput> {
    let config = load_config(config_path)?;
    let zone = config.zone_offset()?;
    println!("Repository: {}", config.repository.repo_type);
    println!("Zone offset: {}s", zone.total_seconds());

    let registry = Arc::new(RecordTypeRegistry::standard());
    let repo = RepositoryFactory::create_local(&config, registry.clone())
        .context("Failed to create repository")?;

    println!("Loading records...");
    let records: Vec<Record> = load_json(records_path)?;
    let ids = services::insert_records(&repo, &records)
        .await
        .context("Failed to insert records")?;
    println!("  Inserted {} records", ids.len());

    println!("Loading aggregation request...");
    let request: AggregateRequest = load_json(request_path)?;
    println!(
        "  {} kinds, bucket: {:?}",
        request.kinds.len(),
        request.bucket
    );

    let output = services::aggregate(&repo, &registry, &request, zone)
        .await
        .context("Aggregation failed")?;
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args: Vec<String> = std::env::args().collect();
    let (records_path, request_path) = match (args.get(1), args.get(2)) {
        (Some(records), Some(request)) => (records.as_str(), request.as_str()),
        _ => {
            eprintln!(
                "Usage: {} <records.json> <request.json> [repository.toml]",
                args.first().map(String::as_str).unwrap_or("aggregate_records")
            );
            std::process::exit(2);
        }
    };
    let config_path = args.get(3).map(String::as_str);

    println!("=== Health Records Aggregation ===");
    println!("Records file: {}", records_path);
    println!("Request file: {}", request_path);
    if let Some(path) = config_path {
        println!("Config file: {}", path);
    }
    println!();

    match run_aggregation(records_path, request_path, config_path).await {
        Ok(output) => {
            println!();
            println!("✓ Aggregation completed successfully!");
            println!("{}", serde_json::to_string_pretty(&output)?);
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Aggregation failed: {:#}", e);
            Err(e)
        }
    }
}
