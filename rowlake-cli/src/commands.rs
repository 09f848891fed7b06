//! Subcommand handlers.

use crate::table;
use crate::{Commands, ConfigAction, TransformArgs};
use anyhow::{Context, bail};
use rowlake_core::adapters::{DELIMITED_TEXT, STRUCTURED_TEXT, format_for_path};
use rowlake_core::config::{StorageBackend, load_config};
use rowlake_core::perf::{SampleMethod, percent_sample, random_sample, stratified_sample, systematic_sample};
use rowlake_core::pipeline::aggregate::AggregateOp;
use rowlake_core::{
    AdapterOptions, Aggregation, Condition, CreateOptions, DatasetKind, ExternalHandle, Lake, LakeConfig,
    MergeOptions, Pipeline, SortDirection,
};
use std::path::Path;

pub async fn handle_command(command: Commands, workspace: &Path) -> anyhow::Result<()> {
    match command {
        Commands::Config { action } => handle_config(action, workspace),
        Commands::Import {
            file,
            name,
            format,
            table,
        } => handle_import(workspace, &file, name, format, table).await,
        Commands::List => {
            let lake = open_lake(workspace).await?;
            print_list(&lake);
            Ok(())
        }
        Commands::Show { id, rows } => {
            let lake = open_lake(workspace).await?;
            show_dataset(&lake, &id, rows)
        }
        Commands::Stats => {
            let lake = open_lake(workspace).await?;
            let stats = lake.stats();
            println!("Datasets:    {}", stats.dataset_count);
            println!("Total rows:  {}", stats.total_rows);
            println!("Approx size: {}", human_bytes(stats.approx_bytes));
            for (kind, count) in &stats.by_kind {
                println!("  {:<12} {count}", kind.to_string());
            }
            Ok(())
        }
        Commands::Validate { id } => {
            let lake = open_lake(workspace).await?;
            let report = lake.validate(&id)?;
            println!("{}", report.headline());
            for error in &report.errors {
                println!("  row {} field '{}': {:?}", error.row, error.column, error.error);
            }
            Ok(())
        }
        Commands::Delete { id } => {
            let mut lake = open_lake(workspace).await?;
            if lake.delete(&id).await? {
                println!("Deleted {id}");
            } else {
                println!("No dataset with id {id}");
            }
            Ok(())
        }
        Commands::Clone { id, name } => {
            let mut lake = open_lake(workspace).await?;
            let copy = lake.clone_dataset(&id, name.as_deref()).await?;
            println!("Cloned {id} as '{}' ({})", copy.name, copy.id);
            Ok(())
        }
        Commands::Merge { ids, name } => {
            let mut lake = open_lake(workspace).await?;
            let merged = lake
                .merge(
                    &ids,
                    MergeOptions {
                        name,
                        ..MergeOptions::default()
                    },
                )
                .await?;
            println!(
                "Merged {} datasets into '{}' ({}, {} rows)",
                ids.len(),
                merged.name,
                merged.id,
                merged.row_count()
            );
            Ok(())
        }
        Commands::Transform(args) => handle_transform(workspace, args).await,
        Commands::Sample {
            id,
            method,
            size,
            field,
            save,
        } => handle_sample(workspace, &id, &method, size, field.as_deref(), save).await,
        Commands::Query { sql, tables } => {
            let lake = open_lake(workspace).await?;
            let bindings = tables
                .iter()
                .map(|t| parse_binding(t))
                .collect::<anyhow::Result<Vec<_>>>()?;
            let rows = lake.query(&sql, &bindings)?;
            print!("{}", table::render_records(&table::columns_of(&rows), &rows));
            println!("({} rows)", rows.len());
            Ok(())
        }
        Commands::Export { id, out, format } => {
            let lake = open_lake(workspace).await?;
            let format = resolve_format(format.as_deref(), &out)?;
            let options = options_for_path(lake.config(), &out);
            let bytes = lake.export(&id, &format, &options).await?;
            tokio::fs::write(&out, &bytes)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            println!("Wrote {} bytes to {}", bytes.len(), out.display());
            Ok(())
        }
    }
}

/// Load config, force file-backed storage and hydrate the registry.
async fn open_lake(workspace: &Path) -> anyhow::Result<Lake> {
    let mut config =
        load_config(Some(workspace), None).map_err(|e| anyhow::anyhow!("Configuration error: {}", e))?;
    for problem in config.validate() {
        tracing::warn!("Config: {problem}");
    }
    config.storage.backend = StorageBackend::File;

    let mut lake = Lake::from_config(config, workspace);
    let loaded = lake.hydrate().await?;
    tracing::debug!(loaded, "Lake hydrated");
    Ok(lake)
}

fn handle_config(action: ConfigAction, workspace: &Path) -> anyhow::Result<()> {
    match action {
        ConfigAction::Init => {
            let config_dir = workspace.join(".rowlake");
            std::fs::create_dir_all(&config_dir)?;

            let config_path = config_dir.join("config.toml");
            if config_path.exists() {
                println!("Configuration file already exists at: {}", config_path.display());
                return Ok(());
            }
            let mut config = LakeConfig::default();
            config.storage.backend = StorageBackend::File;
            std::fs::write(&config_path, config.to_toml()?)?;
            println!("Created configuration file at: {}", config_path.display());
            Ok(())
        }
        ConfigAction::Show => {
            let config = load_config(Some(workspace), None)
                .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;
            println!("{}", config.to_toml()?);
            Ok(())
        }
    }
}

async fn handle_import(
    workspace: &Path,
    file: &Path,
    name: Option<String>,
    format: Option<String>,
    table_name: Option<String>,
) -> anyhow::Result<()> {
    let mut lake = open_lake(workspace).await?;
    let format = resolve_format(format.as_deref(), file)?;
    let mut options = options_for_path(lake.config(), file);
    options.table = table_name;

    let name = name.unwrap_or_else(|| {
        file.file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "import".to_string())
    });
    let dataset = lake
        .import(name, &format, &ExternalHandle::path(file), &options)
        .await?;
    println!(
        "Imported '{}' ({}): {} rows, {} columns",
        dataset.name,
        dataset.id,
        dataset.row_count(),
        dataset.schema.len()
    );
    Ok(())
}

async fn handle_transform(workspace: &Path, args: TransformArgs) -> anyhow::Result<()> {
    let mut lake = open_lake(workspace).await?;
    let pipeline = build_pipeline(lake.create_pipeline(&args.id)?, &args)?;

    if args.explain {
        for (i, step) in pipeline.describe().iter().enumerate() {
            println!("{:>2}. {step}", i + 1);
        }
        return Ok(());
    }

    match args.save {
        Some(name) => {
            let saved = lake.materialize(&pipeline, Some(&name)).await?;
            println!("Saved '{}' ({}): {} rows", saved.name, saved.id, saved.row_count());
        }
        None => {
            let result = pipeline.execute()?;
            print!("{}", table::render_records(&table::columns_for(&result.schema, &result.rows), &result.rows));
            println!("({} rows)", result.row_count());
        }
    }
    Ok(())
}

/// Append steps in a fixed order: filter, aggregate, rename, project,
/// distinct, sort, then limit.
fn build_pipeline(mut pipeline: Pipeline, args: &TransformArgs) -> anyhow::Result<Pipeline> {
    for text in &args.conditions {
        let condition: Condition = text.parse()?;
        pipeline = pipeline.filter_where(condition);
    }
    if !args.aggregations.is_empty() {
        let aggregations = args
            .aggregations
            .iter()
            .map(|a| parse_aggregation(a))
            .collect::<anyhow::Result<Vec<_>>>()?;
        pipeline = pipeline.aggregate(aggregations, &args.group_by);
    }
    if !args.rename.is_empty() {
        let mapping = args
            .rename
            .iter()
            .map(|r| {
                r.split_once('=')
                    .map(|(from, to)| (from.trim().to_string(), to.trim().to_string()))
                    .with_context(|| format!("Invalid rename '{r}', expected old=new"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        pipeline = pipeline.rename(&mapping);
    }
    if !args.select.is_empty() {
        pipeline = pipeline.select(&args.select);
    }
    if !args.exclude.is_empty() {
        pipeline = pipeline.exclude(&args.exclude);
    }
    if let Some(field) = &args.distinct {
        pipeline = pipeline.distinct(Some(field.as_str()).filter(|f| !f.is_empty()));
    }
    if let Some(sort) = &args.sort {
        let (field, direction) = parse_sort(sort)?;
        pipeline = pipeline.sort(field, direction);
    }
    if args.limit.is_some() || args.offset > 0 {
        pipeline = pipeline.limit(args.limit.unwrap_or(usize::MAX), args.offset);
    }
    Ok(pipeline)
}

async fn handle_sample(
    workspace: &Path,
    id: &str,
    method: &str,
    size: f64,
    field: Option<&str>,
    save: Option<String>,
) -> anyhow::Result<()> {
    let mut lake = open_lake(workspace).await?;
    let dataset = lake
        .get(id)
        .with_context(|| format!("Dataset not found: {id}"))?;
    let method: SampleMethod = method.parse().map_err(anyhow::Error::msg)?;
    if size < 0.0 || !size.is_finite() {
        bail!("Sample size must be a non-negative number");
    }

    let rows = match method {
        SampleMethod::Random => random_sample(&dataset.rows, size as usize),
        SampleMethod::Systematic => systematic_sample(&dataset.rows, size as usize),
        SampleMethod::Stratified => {
            let field = field.context("Stratified sampling needs --field")?;
            stratified_sample(&dataset.rows, field, size as usize)
        }
        SampleMethod::Percent => percent_sample(&dataset.rows, size),
    };

    match save {
        Some(name) => {
            let options = CreateOptions {
                schema: Some(dataset.schema.clone()),
                kind: Some(DatasetKind::Transformed),
                ..CreateOptions::default()
            }
            .with_metadata("source_id", dataset.id.clone())
            .with_metadata("sample_method", method.to_string());
            let saved = lake.create(name, rows, options).await?;
            println!("Saved '{}' ({}): {} rows", saved.name, saved.id, saved.row_count());
        }
        None => {
            print!("{}", table::render_records(&table::columns_for(&dataset.schema, &rows), &rows));
            println!("({} of {} rows, {method})", rows.len(), dataset.row_count());
        }
    }
    Ok(())
}

fn print_list(lake: &Lake) {
    let summaries = lake.list();
    if summaries.is_empty() {
        println!("No datasets. Import one with `rowlake import <file>`.");
        return;
    }
    let headers: Vec<String> = ["ID", "NAME", "KIND", "VERSION", "ROWS", "COLUMNS", "UPDATED"]
        .iter()
        .map(|h| h.to_string())
        .collect();
    let rows: Vec<Vec<String>> = summaries
        .iter()
        .map(|s| {
            vec![
                s.id.clone(),
                s.name.clone(),
                s.kind.to_string(),
                s.version.to_string(),
                s.row_count.to_string(),
                s.column_count.to_string(),
                s.updated_at.format("%Y-%m-%d %H:%M").to_string(),
            ]
        })
        .collect();
    print!("{}", table::render(&headers, &rows));
}

fn show_dataset(lake: &Lake, id: &str, max_rows: usize) -> anyhow::Result<()> {
    let dataset = lake
        .get(id)
        .with_context(|| format!("Dataset not found: {id}"))?;
    println!("{} ({})", dataset.name, dataset.id);
    println!(
        "kind: {}  version: {}  rows: {}",
        dataset.kind,
        dataset.version,
        dataset.row_count()
    );
    if !dataset.metadata.is_empty() {
        println!("metadata: {}", serde_json::Value::Object(dataset.metadata.clone()));
    }
    println!();

    let headers: Vec<String> = ["COLUMN", "TYPE", "NULLABLE"].iter().map(|h| h.to_string()).collect();
    let schema_rows: Vec<Vec<String>> = dataset
        .schema
        .columns
        .iter()
        .map(|c| vec![c.name.clone(), c.dtype.to_string(), c.nullable.to_string()])
        .collect();
    print!("{}", table::render(&headers, &schema_rows));
    println!();

    let shown = &dataset.rows[..max_rows.min(dataset.rows.len())];
    print!("{}", table::render_records(&table::columns_for(&dataset.schema, shown), shown));
    if shown.len() < dataset.rows.len() {
        println!("... {} more rows", dataset.rows.len() - shown.len());
    }
    Ok(())
}

/// Explicit format if given, otherwise detect from the file extension.
fn resolve_format(explicit: Option<&str>, path: &Path) -> anyhow::Result<String> {
    if let Some(format) = explicit {
        return Ok(format.to_string());
    }
    format_for_path(path)
        .map(str::to_string)
        .with_context(|| format!("Cannot detect format of {}; pass --format", path.display()))
}

/// Configured import options, adjusted for extensions that imply a variant.
fn options_for_path(config: &LakeConfig, path: &Path) -> AdapterOptions {
    let mut options = AdapterOptions::from(&config.import);
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match (format_for_path(path), ext.as_deref()) {
        (Some(DELIMITED_TEXT), Some("tsv")) => options.delimiter = '\t',
        (Some(STRUCTURED_TEXT), Some("jsonl" | "ndjson")) => options.json_lines = true,
        _ => {}
    }
    options
}

/// `people=abc123` -> ("people", "abc123").
fn parse_binding(text: &str) -> anyhow::Result<(&str, &str)> {
    match text.split_once('=') {
        Some((table, id)) if !table.trim().is_empty() && !id.trim().is_empty() => Ok((table.trim(), id.trim())),
        _ => bail!("Invalid table binding '{text}', expected name=dataset_id"),
    }
}

/// `age` or `age:desc`.
fn parse_sort(text: &str) -> anyhow::Result<(String, SortDirection)> {
    match text.rsplit_once(':') {
        None => Ok((text.to_string(), SortDirection::Ascending)),
        Some((field, dir)) => {
            let direction = match dir.to_ascii_lowercase().as_str() {
                "asc" | "ascending" => SortDirection::Ascending,
                "desc" | "descending" => SortDirection::Descending,
                other => bail!("Unknown sort direction '{other}'"),
            };
            Ok((field.to_string(), direction))
        }
    }
}

/// `total=sum:amount`, `rows=count`.
fn parse_aggregation(text: &str) -> anyhow::Result<Aggregation> {
    let (name, func) = text
        .split_once('=')
        .with_context(|| format!("Invalid aggregation '{text}', expected name=op:field"))?;
    let (op, field) = match func.split_once(':') {
        Some((op, field)) => (op, Some(field.trim())),
        None => (func, None),
    };
    let op = match op.trim().to_ascii_lowercase().as_str() {
        "count" => AggregateOp::Count,
        "count_distinct" => AggregateOp::CountDistinct,
        "sum" => AggregateOp::Sum,
        "avg" | "mean" => AggregateOp::Avg,
        "min" => AggregateOp::Min,
        "max" => AggregateOp::Max,
        "first" => AggregateOp::First,
        "last" => AggregateOp::Last,
        other => bail!("Unknown aggregation '{other}'"),
    };
    if field.is_none() && op != AggregateOp::Count {
        bail!("Aggregation '{text}' needs a field");
    }
    Ok(Aggregation::new(name.trim(), op, field))
}

fn human_bytes(bytes: usize) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{value:.1} {}", UNITS[unit])
    }
}
