//! sap-odata
//!
//! Exploration binary: `sap-odata` prints a JSON summary of the service's
//! entity sets, `sap-odata ENTITY_SET [TOP]` prints the first page of a set.
//! Logs go to stderr so stdout stays machine-readable.

use anyhow::{bail, Context};
use sap_odata::config::Config;
use sap_odata::metadata::ServiceMetadata;
use sap_odata::Query;
use serde_json::{json, Value};
use std::io::{self, Write};
use tracing_subscriber::EnvFilter;

const DEFAULT_TOP: u64 = 20;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let entity_set = args.next();
    let top = match args.next() {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("TOP must be a non-negative integer, got '{}'", raw))?,
        None => DEFAULT_TOP,
    };
    if args.next().is_some() {
        bail!("usage: sap-odata [ENTITY_SET [TOP]]");
    }

    let config = Config::load_default().context("failed to load configuration")?;
    let runtime_config = config.to_runtime()?;
    tracing::info!(
        "Configured for OData {} at {}",
        runtime_config.version,
        runtime_config.service_root
    );

    let client = runtime_config.client()?;
    let metadata = client.fetch_metadata().await?;
    let client = client.aligned_with(&metadata);

    for (owner, path) in metadata.unresolved_references() {
        tracing::warn!("Unresolved reference in {}: {}", owner, path);
    }

    let output = match entity_set {
        None => summarize(&metadata),
        Some(name) => {
            if metadata.entity_set(&name).is_none() {
                bail!("unknown entity set '{}'", name);
            }
            let page = Query::new(name).top(top).execute::<Value>(&client).await?;
            serde_json::to_value(page)?
        }
    };

    let mut stdout = io::stdout();
    writeln!(stdout, "{}", serde_json::to_string_pretty(&output)?)?;
    stdout.flush()?;
    Ok(())
}

fn summarize(metadata: &ServiceMetadata) -> Value {
    let sets: Vec<Value> = metadata
        .entity_sets
        .iter()
        .map(|set| {
            let entity_type = metadata.entity_type(&set.entity_type);
            json!({
                "name": set.name,
                "entity_type": set.entity_type,
                "keys": entity_type.map(|t| t.keys.clone()).unwrap_or_default(),
                "properties": entity_type.map(|t| t.properties.len()).unwrap_or(0),
                "navigation": entity_type
                    .map(|t| t.navigation.iter().map(|n| n.name.clone()).collect::<Vec<_>>())
                    .unwrap_or_default(),
                "creatable": set.creatable,
                "updatable": set.updatable,
                "deletable": set.deletable,
                "searchable": set.searchable,
            })
        })
        .collect();

    json!({
        "namespace": metadata.namespace,
        "version": metadata.version,
        "entity_sets": sets,
        "operations": metadata.operations.iter().map(|op| &op.name).collect::<Vec<_>>(),
    })
}
