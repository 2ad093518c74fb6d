//! CLI command implementations

use anyhow::{bail, Context};
use infragraph_core::{reduce, write_elements, Config};
use infragraph_entities::{catalog, GraphBuilder};
use infragraph_state::{evaluate, evaluate_globally, resolve, MemoryStateStore, ParamResolver, Selector};
use std::path::{Path, PathBuf};

pub async fn build(state: PathBuf, config: PathBuf, out: PathBuf, no_reduce: bool) -> anyhow::Result<()> {
    let config = Config::load_or_default(&config)?;
    let store = load_state(&state)?;

    let registry = catalog::registry()?;
    let builder = GraphBuilder::new(&registry)
        .with_relationships(catalog::relationships()?)
        .with_scope(config.scope.clone());
    let (mut graph, report) = builder.build(&store).await?;

    for (entity_type, count) in &report.entities {
        tracing::info!("  {:<28} {}", entity_type, count);
    }

    if no_reduce {
        tracing::info!("Skipping reducer rules");
    } else {
        let rules = config.reducer.rules()?;
        let reduction = reduce(&mut graph, &rules)?;
        for aggregate in &reduction.aggregates {
            tracing::info!("  {} <- {} nodes ({})", aggregate.id, aggregate.count, aggregate.rule);
        }
    }

    write_elements(&graph, &out)?;
    tracing::info!(
        "Wrote {} nodes, {} edges to {}",
        graph.node_count(),
        graph.edge_count(),
        out.display()
    );
    Ok(())
}

pub async fn query(state: PathBuf, selector: String, scope: Option<(String, String)>) -> anyhow::Result<()> {
    let selector: Selector = selector.parse()?;
    let store = load_state(&state)?;

    let known = catalog::registry()?.selector_registry();
    if known.validate(&selector).is_err() {
        tracing::warn!(
            "{}|{} is not read by any built-in translator",
            selector.service,
            selector.function
        );
    }

    let values = match scope {
        Some((account, region)) => evaluate(&account, &region, &selector, &store).await?,
        None => evaluate_globally(&selector, &store).await?,
    };
    tracing::info!("{} values", values.len());
    println!("{}", serde_json::to_string_pretty(&values)?);
    Ok(())
}

pub async fn params(state: PathBuf, account: String, region: String, resolvers: Vec<String>) -> anyhow::Result<()> {
    let resolvers = resolvers
        .iter()
        .map(String::as_str)
        .map(parse_resolver)
        .collect::<anyhow::Result<Vec<_>>>()?;
    let store = load_state(&state)?;

    let params = resolve(&account, &region, &resolvers, &store).await?;
    tracing::info!("{} parameter sets for {}/{}", params.len(), account, region);
    println!("{}", serde_json::to_string_pretty(&params)?);
    Ok(())
}

fn load_state(path: &Path) -> anyhow::Result<MemoryStateStore> {
    let store = MemoryStateStore::from_snapshot(path)?;
    tracing::info!(
        "Loaded {} state records across {} account/regions from {}",
        store.len(),
        store.scopes().len(),
        path.display()
    );
    Ok(store)
}

/// `key=Service|Function|query` or `key:=<json>`.
pub fn parse_resolver(arg: &str) -> anyhow::Result<ParamResolver> {
    let Some((key, rest)) = arg.split_once('=') else {
        bail!("resolver '{}' must look like key=selector or key:=json", arg);
    };
    if let Some(key) = key.strip_suffix(':') {
        if key.is_empty() {
            bail!("resolver '{}' has an empty key", arg);
        }
        let value: serde_json::Value =
            serde_json::from_str(rest).with_context(|| format!("resolver '{}': invalid JSON", key))?;
        return Ok(ParamResolver::value(key, value));
    }
    if key.is_empty() {
        bail!("resolver '{}' has an empty key", arg);
    }
    let selector: Selector = rest.parse()?;
    Ok(ParamResolver::selector(key, selector))
}
