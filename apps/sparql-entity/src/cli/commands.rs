//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use super::CacheAction;
use crate::report::{
    BundleLookupReport, CacheEntry, CacheReport, CheckReport, EncodeReport,
    FieldForPredicateReport, FieldLookupReport, GraphsReport, HashReport, IdReport, MappingReport,
    TargetGraphReport,
};
use serde::Serialize;
use sparql_entity_core::{
    Engine, EngineConfig, EntityId, EntityStub, EntityTypeId, FieldValue, MappingCache,
    MappingError, RedbMappingCache, SparqlEntity,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum size of a configuration file (10 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Entity id used for the transient request graph override of `graphs`.
const PREVIEW_ENTITY_ID: &str = "urn:sparql-entity:preview";

/// Validate file size before reading.
fn validate_file_size(path: &Path, max_size: u64) -> Result<(), MappingError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| MappingError::IoError(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(MappingError::InvalidConfig(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Canonicalize a path and ensure it names a regular file.
fn validate_file_path(path: &Path) -> Result<PathBuf, MappingError> {
    let canonical = path.canonicalize().map_err(|e| {
        MappingError::IoError(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(MappingError::IoError(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load and validate the engine configuration.
pub fn load_config(path: &Path) -> Result<EngineConfig, MappingError> {
    let canonical = validate_file_path(path)?;
    validate_file_size(&canonical, MAX_CONFIG_FILE_SIZE)?;
    EngineConfig::load(&canonical)
}

fn open_engine(config: &EngineConfig) -> Result<Engine, MappingError> {
    Engine::from_config(config)
}

fn print_json<T: Serialize>(report: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(report).unwrap_or_default()
    );
}

fn or_all(value: Option<&str>) -> &str {
    value.unwrap_or("(all)")
}

/// Split a comma-separated list, dropping empty items.
pub fn split_list(list: &str) -> Vec<&str> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

// =============================================================================
// CHECK COMMAND
// =============================================================================

/// Validate the configuration and build every declared mapping.
pub fn cmd_check(
    config_path: &Path,
    config: &EngineConfig,
    json_mode: bool,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;
    let built = engine.warm()?;

    let report = CheckReport {
        config: config_path.display().to_string(),
        entity_types: built,
        graphs: engine
            .graphs()
            .config()
            .definitions
            .iter()
            .map(|d| d.id.to_string())
            .collect(),
        strategies: engine
            .identifiers()
            .strategy_ids()
            .map(str::to_string)
            .collect(),
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Configuration OK");
    println!("================");
    println!("Config:       {}", report.config);
    println!("Entity types: {}", report.entity_types);
    println!("Graphs:       {}", report.graphs.join(", "));
    println!("Strategies:   {}", report.strategies.join(", "));

    Ok(())
}

// =============================================================================
// MAPPING COMMANDS
// =============================================================================

/// Show the full mapping of an entity type.
pub fn cmd_mapping(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;
    let mapping = engine.registry().mapping(&EntityTypeId::from(entity_type))?;
    let report = MappingReport::from(mapping.as_ref());

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Mapping of {}", report.entity_type);
    println!("Fingerprint: {}", report.fingerprint);
    println!("Bundle key:  {}", report.bundle_key);
    println!("Bundle predicates: {}", report.bundle_predicates.join(", "));
    println!();
    println!("Bundles:");
    for row in &report.bundles {
        println!("  {:<20} {}", row.bundle, row.type_uri);
    }
    println!();
    println!("Columns:");
    for row in &report.columns {
        println!(
            "  {}.{}.{} -> {} [{}{}]",
            row.bundle,
            row.field,
            row.column,
            row.predicate,
            row.format,
            if row.serialized { ", serialized" } else { "" }
        );
    }
    if !report.shared_predicates.is_empty() {
        println!();
        println!("Shared predicates:");
        for (predicate, bundles) in &report.shared_predicates {
            println!("  {} ({})", predicate, bundles.join(", "));
        }
    }

    Ok(())
}

/// Predicates of a field column.
pub fn cmd_predicates(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
    field: &str,
    column: Option<&str>,
    bundle: Option<&str>,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;
    let predicates = engine.registry().field_predicates(
        &EntityTypeId::from(entity_type),
        field,
        column,
        bundle,
    )?;

    let report = FieldLookupReport {
        entity_type: entity_type.to_string(),
        field: field.to_string(),
        column: column.map(str::to_string),
        bundle: bundle.map(str::to_string),
        values: predicates.iter().map(ToString::to_string).collect(),
    };
    print_lookup(&report, "Predicates", json_mode);
    Ok(())
}

/// Declared value formats of a field column.
pub fn cmd_format(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
    field: &str,
    column: Option<&str>,
    bundle: Option<&str>,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;
    let formats =
        engine
            .registry()
            .field_format(&EntityTypeId::from(entity_type), field, column, bundle)?;

    let report = FieldLookupReport {
        entity_type: entity_type.to_string(),
        field: field.to_string(),
        column: column.map(str::to_string),
        bundle: bundle.map(str::to_string),
        values: formats.iter().map(ToString::to_string).collect(),
    };
    print_lookup(&report, "Formats", json_mode);
    Ok(())
}

fn print_lookup(report: &FieldLookupReport, title: &str, json_mode: bool) {
    if json_mode {
        print_json(report);
        return;
    }

    println!(
        "{} of {}.{} (column: {}, bundle: {})",
        title,
        report.entity_type,
        report.field,
        report.column.as_deref().unwrap_or("(main)"),
        or_all(report.bundle.as_deref())
    );
    if report.values.is_empty() {
        println!("  (none)");
    }
    for value in &report.values {
        println!("  {}", value);
    }
}

/// Bundle to type URI, or type URI to bundles.
pub fn cmd_bundle(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
    bundle: Option<&str>,
    type_uri: Option<&str>,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;
    let id = EntityTypeId::from(entity_type);

    let report = match (bundle, type_uri) {
        (Some(bundle), _) => BundleLookupReport {
            entity_type: entity_type.to_string(),
            type_uri: engine.registry().bundle_to_type_uri(&id, bundle)?.to_string(),
            bundles: vec![bundle.to_string()],
        },
        (None, Some(uri)) => BundleLookupReport {
            entity_type: entity_type.to_string(),
            type_uri: uri.to_string(),
            bundles: engine
                .registry()
                .type_uri_to_bundles(&id, uri)?
                .iter()
                .map(ToString::to_string)
                .collect(),
        },
        (None, None) => {
            return Err(MappingError::InvalidConfig(
                "either --bundle or --type-uri is required".to_string(),
            ));
        }
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Type URI: {}", report.type_uri);
    println!(
        "Bundles:  {}",
        if report.bundles.is_empty() {
            "(none)".to_string()
        } else {
            report.bundles.join(", ")
        }
    );
    Ok(())
}

/// The field a predicate holds in a bundle.
pub fn cmd_field_for(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
    predicate: &str,
    bundle: &str,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;
    let field_ref =
        engine
            .registry()
            .field_for_predicate(&EntityTypeId::from(entity_type), predicate, bundle)?;

    let report = FieldForPredicateReport {
        entity_type: entity_type.to_string(),
        predicate: predicate.to_string(),
        bundle: bundle.to_string(),
        field: field_ref.as_ref().map(|r| r.field.to_string()),
        column: field_ref.as_ref().map(|r| r.column.to_string()),
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    match (&report.field, &report.column) {
        (Some(field), Some(column)) => println!("{} -> {}.{}", predicate, field, column),
        _ => println!("{} is not mapped in bundle {}", predicate, bundle),
    }
    Ok(())
}

// =============================================================================
// ENCODE COMMAND
// =============================================================================

/// Arguments of `encode`.
#[derive(Debug, Clone, Copy)]
pub struct EncodeArgs<'a> {
    pub entity_type: &'a str,
    pub field: &'a str,
    pub value: &'a str,
    pub column: Option<&'a str>,
    pub bundle: Option<&'a str>,
    pub language: Option<&'a str>,
}

/// Encode a lexical value into an RDF term for a field column.
pub fn cmd_encode(
    config: &EngineConfig,
    json_mode: bool,
    args: &EncodeArgs<'_>,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;
    let id = EntityTypeId::from(args.entity_type);
    let mapping = engine.registry().mapping(&id)?;
    let declared = mapping.column_mapping(args.field, args.column, args.bundle)?;

    let value = if declared.serialize {
        FieldValue::Serialized(
            serde_json::from_str(args.value)
                .map_err(|e| MappingError::SerializationError(e.to_string()))?,
        )
    } else {
        FieldValue::parse_for_format(args.value, &declared.format)?
    };

    let term = engine.codec().encode(
        &id,
        args.field,
        &value,
        args.column,
        args.bundle,
        args.language,
    )?;
    let report = EncodeReport::new(declared.format.as_str(), &term);

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("{}", report.term);
    Ok(())
}

// =============================================================================
// GRAPH COMMANDS
// =============================================================================

/// Enabled graphs and graph URIs of an entity type.
///
/// With `request`, the listed graphs are set as the request graphs of a
/// transient entity and the URIs a read of `bundle` would consult are shown.
pub fn cmd_graphs(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
    request: Option<&str>,
    bundle: Option<&str>,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;
    let id = EntityTypeId::from(entity_type);
    let report = GraphsReport::new(engine.graphs(), &id);

    let read_uris = match (request, bundle) {
        (Some(request), Some(bundle)) => {
            let entity_id = EntityId::from(PREVIEW_ENTITY_ID);
            let context = engine.graphs().request_context(&id);
            let guard = context.scoped(&entity_id, &split_list(request))?;
            let uris = engine
                .graphs()
                .request_graph_uris(&id, &entity_id, bundle)?;
            tracing::debug!(graphs = ?guard.graphs().names(), "request graphs resolved");
            Some(uris)
        }
        _ => None,
    };

    if json_mode {
        let output = serde_json::json!({
            "graphs": report,
            "read_uris": read_uris.map(|uris| {
                uris.iter().map(ToString::to_string).collect::<Vec<_>>()
            }),
        });
        print_json(&output);
        return Ok(());
    }

    println!("Graphs of {}", report.entity_type);
    println!("Default: {}", report.default_graph);
    println!();
    println!("Enabled (by weight):");
    for row in &report.enabled {
        println!("  {:<12} {:>5}  {}", row.id, row.weight, row.label);
    }
    println!();
    println!("URIs:");
    for (bundle, graphs) in &report.uris {
        for (graph, uri) in graphs {
            println!("  {}/{} -> {}", bundle, graph, uri);
        }
    }
    if let Some(uris) = read_uris {
        println!();
        println!("Read URIs:");
        for uri in uris {
            println!("  {}", uri);
        }
    }

    Ok(())
}

/// The graph a save of an entity would write to.
pub fn cmd_target_graph(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
    bundle: &str,
    graph: Option<&str>,
    target: Option<&str>,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;

    let mut entity = EntityStub::new(entity_type, bundle);
    if let Some(graph) = graph {
        entity = entity.with_graph(graph);
    }
    if let Some(target) = target {
        entity = entity.with_target_graph(target);
    }

    let resolved = engine.graphs().target_graph_from_entity(&entity)?;
    let uri = engine
        .graphs()
        .bundle_graph_uri(entity.entity_type_id(), bundle, resolved.as_str())
        .ok();

    let report = TargetGraphReport {
        entity_type: entity_type.to_string(),
        bundle: bundle.to_string(),
        graph: resolved.to_string(),
        uri: uri.map(|u| u.to_string()),
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Target graph: {}", report.graph);
    println!(
        "Graph URI:    {}",
        report.uri.as_deref().unwrap_or("(not configured)")
    );
    Ok(())
}

// =============================================================================
// IDENTIFIER COMMAND
// =============================================================================

/// Generate an identifier for a new entity.
pub fn cmd_generate_id(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
    bundle: &str,
    label: Option<&str>,
) -> Result<(), MappingError> {
    let engine = open_engine(config)?;

    let mut entity = EntityStub::new(entity_type, bundle);
    if let Some(label) = label {
        entity = entity.with_label(label);
    }

    let strategy = engine.identifiers().plugin(&entity);
    let id = engine.ensure_id(&entity)?;

    let report = IdReport {
        entity_type: entity_type.to_string(),
        bundle: bundle.to_string(),
        strategy: strategy.id().to_string(),
        id: id.to_string(),
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("{}", report.id);
    Ok(())
}

// =============================================================================
// CACHE COMMAND
// =============================================================================

/// Manage the mapping snapshot cache.
pub fn cmd_cache(
    config: &EngineConfig,
    json_mode: bool,
    path: Option<&Path>,
    action: CacheAction,
) -> Result<(), MappingError> {
    let path = path
        .map(Path::to_path_buf)
        .or_else(|| config.snapshot_cache.clone())
        .ok_or_else(|| {
            MappingError::InvalidConfig(
                "no snapshot cache: pass --path or set snapshot_cache".to_string(),
            )
        })?;
    let cache = Arc::new(RedbMappingCache::open(&path)?);

    match action {
        CacheAction::Warm => {
            let engine = Engine::build(
                config,
                Some(Arc::clone(&cache) as Arc<dyn MappingCache>),
                |_| {},
            )?;
            let built = engine.warm()?;
            tracing::info!(entity_types = built, path = %path.display(), "snapshot cache warmed");
        }
        CacheAction::Clear => {
            cache.clear()?;
            tracing::info!(path = %path.display(), "snapshot cache cleared");
        }
        CacheAction::List => {}
    }

    let report = CacheReport {
        path: path.display().to_string(),
        entries: cache_entries(config, &cache)?,
    };

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Snapshot cache: {}", report.path);
    if report.entries.is_empty() {
        println!("  (empty)");
    }
    for entry in &report.entries {
        println!(
            "  {:<20} {} {}",
            entry.entity_type,
            entry.fingerprint.as_deref().unwrap_or("-"),
            if entry.fresh { "fresh" } else { "stale" }
        );
    }
    Ok(())
}

/// Stored snapshots, compared against the current declarations.
pub fn cache_entries(
    config: &EngineConfig,
    cache: &RedbMappingCache,
) -> Result<Vec<CacheEntry>, MappingError> {
    cache
        .entity_types()?
        .into_iter()
        .map(|id| {
            let stored = cache.fingerprint(&id)?;
            let current = config
                .entity_types
                .iter()
                .find(|schema| schema.id == id)
                .map(|schema| schema.fingerprint())
                .transpose()?;
            Ok(CacheEntry {
                entity_type: id.to_string(),
                fingerprint: stored.map(|f| f.to_hex()),
                fresh: stored.is_some() && stored == current,
            })
        })
        .collect()
}

// =============================================================================
// HASH COMMAND
// =============================================================================

/// BLAKE3 fingerprint of an entity type declaration.
pub fn cmd_hash(
    config: &EngineConfig,
    json_mode: bool,
    entity_type: &str,
) -> Result<(), MappingError> {
    let schema = config
        .entity_types
        .iter()
        .find(|schema| schema.id.as_str() == entity_type)
        .ok_or_else(|| MappingError::UnknownEntityType {
            entity_type: EntityTypeId::from(entity_type),
        })?;
    let report = HashReport::new(entity_type, schema.fingerprint()?);

    if json_mode {
        print_json(&report);
        return Ok(());
    }

    println!("Entity type: {}", report.entity_type);
    println!("BLAKE3:      {}", report.fingerprint);
    Ok(())
}
