//! # CLI Command Implementations
//!
//! This module contains the actual implementations of CLI commands.

use std::path::PathBuf;
use topika_core::{
    ConstructId, ConstructKind, ConstructOps, FileStore, IdentifierKind, IdentityOps, IndexOps,
    Locator, MergeOps, RedbStore, TopicMap, TopicMapError, TopicMapSnapshot, TopicMapStore,
    TopicMapView, topic_map_from_bytes, topic_map_to_bytes,
};

// =============================================================================
// FILE SIZE LIMITS
// =============================================================================

/// Maximum file size for import (500 MB).
///
/// This prevents memory exhaustion from malicious or accidental large files.
const MAX_IMPORT_FILE_SIZE: u64 = 500 * 1024 * 1024;

/// Validate file size before reading.
fn validate_file_size(path: &PathBuf, max_size: u64) -> Result<(), TopicMapError> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| TopicMapError::Io(format!("Cannot read file metadata: {}", e)))?;

    if metadata.len() > max_size {
        return Err(TopicMapError::Serialization(format!(
            "File size {} bytes exceeds maximum allowed {} bytes",
            metadata.len(),
            max_size
        )));
    }
    Ok(())
}

/// Validate an input file path.
///
/// Canonicalizes the path to resolve symlinks and "..", ensures it exists
/// and is a regular file. This prevents path traversal through inputs like
/// "../../../etc/passwd".
fn validate_file_path(path: &std::path::Path) -> Result<PathBuf, TopicMapError> {
    let canonical = path.canonicalize().map_err(|e| {
        TopicMapError::Io(format!("Invalid file path '{}': {}", path.display(), e))
    })?;

    if !canonical.is_file() {
        return Err(TopicMapError::Io(format!(
            "Path '{}' is not a regular file",
            path.display()
        )));
    }

    Ok(canonical)
}

/// Validate an output file path.
///
/// For output files, the parent directory must exist and be a directory.
fn validate_output_path(path: &std::path::Path) -> Result<PathBuf, TopicMapError> {
    let parent = path.parent().unwrap_or(std::path::Path::new("."));

    let canonical_parent = parent.canonicalize().map_err(|e| {
        TopicMapError::Io(format!(
            "Invalid output directory '{}': {}",
            parent.display(),
            e
        ))
    })?;

    if !canonical_parent.is_dir() {
        return Err(TopicMapError::Io(format!(
            "Output directory '{}' is not a valid directory",
            parent.display()
        )));
    }

    let filename = path
        .file_name()
        .ok_or_else(|| TopicMapError::Io("Output path has no filename".to_string()))?;

    Ok(canonical_parent.join(filename))
}

// =============================================================================
// STATUS COMMAND
// =============================================================================

/// Show topic-map statistics.
pub fn cmd_status(db_path: &PathBuf, backend: &str, json_mode: bool) -> Result<(), TopicMapError> {
    let map = load_or_create_map(db_path, backend)?;

    let mut counts = [0usize; 6];
    for id in map.live_ids() {
        if let Ok(construct) = map.construct(id) {
            match construct.kind() {
                ConstructKind::Topic => counts[0] += 1,
                ConstructKind::Name => counts[1] += 1,
                ConstructKind::Occurrence => counts[2] += 1,
                ConstructKind::Variant => counts[3] += 1,
                ConstructKind::Association => counts[4] += 1,
                ConstructKind::Role => counts[5] += 1,
                ConstructKind::TopicMap => {}
            }
        }
    }
    let [topics, names, occurrences, variants, associations, roles] = counts;

    if json_mode {
        let output = serde_json::json!({
            "database": db_path.to_string_lossy(),
            "backend": backend,
            "topics": topics,
            "names": names,
            "occurrences": occurrences,
            "variants": variants,
            "associations": associations,
            "roles": roles,
            "item_identifiers": map.identity().len(IdentifierKind::Item),
            "subject_identifiers": map.identity().len(IdentifierKind::Subject),
            "subject_locators": map.identity().len(IdentifierKind::SubjectLocator),
            "scopes": map.scope_registry().len()
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&output).unwrap_or_default()
        );
        return Ok(());
    }

    println!("Topika Map Status");
    println!("=================");
    println!("Database: {:?}", db_path);
    println!("Backend:  {}", backend);
    println!();
    println!("Topics:       {}", topics);
    println!("Names:        {}", names);
    println!("Occurrences:  {}", occurrences);
    println!("Variants:     {}", variants);
    println!("Associations: {}", associations);
    println!("Roles:        {}", roles);
    println!();
    println!(
        "Item Identifiers:    {}",
        map.identity().len(IdentifierKind::Item)
    );
    println!(
        "Subject Identifiers: {}",
        map.identity().len(IdentifierKind::Subject)
    );
    println!(
        "Subject Locators:    {}",
        map.identity().len(IdentifierKind::SubjectLocator)
    );
    println!("Scopes:              {}", map.scope_registry().len());

    Ok(())
}

// =============================================================================
// INIT COMMAND
// =============================================================================

/// Initialize a new database.
pub fn cmd_init(db_path: &PathBuf, backend: &str, force: bool) -> Result<(), TopicMapError> {
    if db_path.exists() {
        if !force {
            return Err(TopicMapError::Io(
                "Database already exists. Use --force to overwrite.".to_string(),
            ));
        }
        std::fs::remove_file(db_path).map_err(|e| TopicMapError::Io(e.to_string()))?;
    }

    let map = TopicMap::new();
    save_map(&map, db_path, backend)?;
    println!("Initialized new {} database at {:?}", backend, db_path);

    Ok(())
}

// =============================================================================
// CONSTRUCT CREATION COMMANDS
// =============================================================================

/// Create or look up a topic by identifier.
pub fn cmd_topic(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    subject_identifier: Option<&str>,
    subject_locator: Option<&str>,
    item_identifier: Option<&str>,
) -> Result<(), TopicMapError> {
    if subject_identifier.is_none() && subject_locator.is_none() && item_identifier.is_none() {
        return Err(TopicMapError::InvalidValue(
            "Provide at least one of --subject-identifier, --subject-locator, \
             --item-identifier"
                .to_string(),
        ));
    }

    let mut map = load_or_create_map(db_path, backend)?;

    // Resolve through the first identifier given, then attach the rest.
    // Each added identifier may trigger an automatic merge; the topic
    // created here is always the survivor.
    let topic = if let Some(si) = subject_identifier {
        map.ensure_topic_by_subject_identifier(Locator::new(si))?
    } else if let Some(sl) = subject_locator {
        map.ensure_topic_by_subject_locator(Locator::new(sl))?
    } else if let Some(ii) = item_identifier {
        map.ensure_topic_by_item_identifier(Locator::new(ii))?
    } else {
        unreachable!()
    };

    if let Some(sl) = subject_locator {
        let locator = Locator::new(sl);
        if map.topic_by_subject_locator(&locator) != Some(topic) {
            map.add_subject_locator(topic, locator)?;
        }
    }
    if let Some(ii) = item_identifier {
        let locator = Locator::new(ii);
        if map.construct_by_item_identifier(&locator) != Some(topic) {
            map.add_item_identifier(topic, locator)?;
        }
    }

    save_map(&map, db_path, backend)?;

    if json_mode {
        println!("{}", serde_json::json!({ "topic": topic.0 }));
    } else {
        println!("Topic {}", topic);
    }
    Ok(())
}

/// Attach a name to a topic.
pub fn cmd_name(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    topic: &str,
    name_type: &str,
    value: &str,
    themes: &[String],
) -> Result<(), TopicMapError> {
    let mut map = load_or_create_map(db_path, backend)?;

    let topic = resolve_topic(&map, topic)?;
    let ntype = map.ensure_topic_by_subject_identifier(Locator::new(name_type))?;
    let theme_ids = ensure_themes(&mut map, themes)?;

    let name = map.create_name(topic, ntype, value, &theme_ids)?;
    save_map(&map, db_path, backend)?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({ "name": name.0, "topic": topic.0 })
        );
    } else {
        println!("Name {} on topic {}", name, topic);
    }
    Ok(())
}

/// Attach an occurrence to a topic.
pub fn cmd_occurrence(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    topic: &str,
    occurrence_type: &str,
    value: &str,
    datatype: Option<&str>,
    themes: &[String],
) -> Result<(), TopicMapError> {
    let mut map = load_or_create_map(db_path, backend)?;

    let topic = resolve_topic(&map, topic)?;
    let otype = map.ensure_topic_by_subject_identifier(Locator::new(occurrence_type))?;
    let theme_ids = ensure_themes(&mut map, themes)?;
    let datatype = datatype.map(Locator::new);

    let occurrence = map.create_occurrence(topic, otype, value, datatype, &theme_ids)?;
    save_map(&map, db_path, backend)?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({ "occurrence": occurrence.0, "topic": topic.0 })
        );
    } else {
        println!("Occurrence {} on topic {}", occurrence, topic);
    }
    Ok(())
}

/// Create an association with roles.
pub fn cmd_assoc(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    assoc_type: &str,
    roles: &[String],
    themes: &[String],
) -> Result<(), TopicMapError> {
    let mut map = load_or_create_map(db_path, backend)?;

    let atype = map.ensure_topic_by_subject_identifier(Locator::new(assoc_type))?;
    let theme_ids = ensure_themes(&mut map, themes)?;
    let assoc = map.create_association(atype, &theme_ids)?;

    let mut role_ids = Vec::new();
    for spec in roles {
        let Some((role_type, player)) = spec.split_once('=') else {
            return Err(TopicMapError::InvalidValue(format!(
                "Role spec '{}' is not of the form type-uri=player-uri",
                spec
            )));
        };
        let rtype = map.ensure_topic_by_subject_identifier(Locator::new(role_type.trim()))?;
        let player = map.ensure_topic_by_subject_identifier(Locator::new(player.trim()))?;
        role_ids.push(map.create_role(assoc, rtype, player)?);
    }

    save_map(&map, db_path, backend)?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({
                "association": assoc.0,
                "roles": role_ids.iter().map(|r| r.0).collect::<Vec<_>>()
            })
        );
    } else {
        println!("Association {} with {} roles", assoc, role_ids.len());
    }
    Ok(())
}

// =============================================================================
// MERGE COMMAND
// =============================================================================

/// Merge one topic into another.
pub fn cmd_merge(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    target: &str,
    source: &str,
) -> Result<(), TopicMapError> {
    let mut map = load_or_create_map(db_path, backend)?;

    let target = resolve_topic(&map, target)?;
    let source = resolve_topic(&map, source)?;
    map.merge_in(target, source)?;
    save_map(&map, db_path, backend)?;

    if json_mode {
        println!(
            "{}",
            serde_json::json!({ "survivor": target.0, "absorbed": source.0 })
        );
    } else {
        println!("Merged {} into {}", source, target);
    }
    Ok(())
}

// =============================================================================
// QUERY COMMAND
// =============================================================================

/// Execute an index query.
pub fn cmd_query(
    db_path: &PathBuf,
    backend: &str,
    json_mode: bool,
    query_type: &str,
    type_ref: Option<&str>,
    themes: &[String],
    match_all: bool,
    kind: &str,
    pattern: Option<&str>,
    namespace: &str,
    topic: Option<&str>,
) -> Result<(), TopicMapError> {
    let map = load_or_create_map(db_path, backend)?;

    match query_type {
        "instances" => {
            let type_ref = type_ref.ok_or_else(|| {
                TopicMapError::InvalidValue("instances query requires --type".to_string())
            })?;
            let type_id = resolve_topic(&map, type_ref)?;
            let hits = map.topics_by_type(type_id);
            print_ids(&map, "instances", &hits, json_mode);
        }

        "typed" => {
            let type_ref = type_ref.ok_or_else(|| {
                TopicMapError::InvalidValue("typed query requires --type".to_string())
            })?;
            let type_id = resolve_topic(&map, type_ref)?;
            let hits = map.constructs_by_type(parse_kind(kind)?, type_id);
            print_ids(&map, "typed", &hits, json_mode);
        }

        "scoped" => {
            if themes.is_empty() {
                return Err(TopicMapError::InvalidValue(
                    "scoped query requires at least one --theme".to_string(),
                ));
            }
            let mut theme_ids = Vec::new();
            for theme in themes {
                theme_ids.push(resolve_topic(&map, theme)?);
            }
            let hits = map.constructs_by_themes(parse_kind(kind)?, &theme_ids, match_all);
            print_ids(&map, "scoped", &hits, json_mode);
        }

        "identifiers" => {
            let pattern = pattern.ok_or_else(|| {
                TopicMapError::InvalidValue("identifiers query requires --pattern".to_string())
            })?;
            let hits = map.identifiers_matching(parse_namespace(namespace)?, pattern)?;
            if json_mode {
                let entries: Vec<_> = hits
                    .iter()
                    .map(|(locator, id)| {
                        serde_json::json!({ "locator": locator.as_str(), "construct": id.0 })
                    })
                    .collect();
                println!(
                    "{}",
                    serde_json::to_string_pretty(&entries).unwrap_or_default()
                );
            } else {
                println!("{} identifiers matching '{}':", hits.len(), pattern);
                for (locator, id) in &hits {
                    println!("  {} -> {}", locator.as_str(), id);
                }
            }
        }

        "supertypes" | "subtypes" => {
            let topic_ref = topic.ok_or_else(|| {
                TopicMapError::InvalidValue(format!("{} query requires --topic", query_type))
            })?;
            let topic_id = resolve_topic(&map, topic_ref)?;
            let closure = if query_type == "supertypes" {
                map.supertypes_closure_of(topic_id)
            } else {
                map.subtypes_closure_of(topic_id)
            };
            let hits: Vec<ConstructId> = closure.into_iter().collect();
            print_ids(&map, query_type, &hits, json_mode);
        }

        _ => {
            return Err(TopicMapError::InvalidValue(format!(
                "Unknown query type: {}. Use: instances, typed, scoped, identifiers, \
                 supertypes, subtypes",
                query_type
            )));
        }
    }

    Ok(())
}

/// Print a list of construct ids, with subject identifiers where available.
fn print_ids(map: &TopicMap, label: &str, ids: &[ConstructId], json_mode: bool) {
    if json_mode {
        let entries: Vec<_> = ids
            .iter()
            .map(|id| {
                serde_json::json!({
                    "construct": id.0,
                    "subject_identifiers": subject_identifiers_of(map, *id)
                })
            })
            .collect();
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).unwrap_or_default()
        );
        return;
    }

    println!("{} results ({}):", ids.len(), label);
    for id in ids {
        let sids = subject_identifiers_of(map, *id);
        if sids.is_empty() {
            println!("  {}", id);
        } else {
            println!("  {} ({})", id, sids.join(", "));
        }
    }
}

/// Subject identifiers of a construct, empty for non-topics.
fn subject_identifiers_of(map: &TopicMap, id: ConstructId) -> Vec<String> {
    map.construct_opt(id)
        .and_then(|c| c.as_topic())
        .map(|t| {
            t.subject_identifiers
                .iter()
                .map(|l| l.as_str().to_string())
                .collect()
        })
        .unwrap_or_default()
}

// =============================================================================
// EXPORT COMMAND
// =============================================================================

/// Export the map.
pub fn cmd_export(
    db_path: &PathBuf,
    backend: &str,
    output: &std::path::Path,
    format: &str,
) -> Result<(), TopicMapError> {
    let validated_output = validate_output_path(output)?;
    let map = load_or_create_map(db_path, backend)?;

    let data = match format {
        "snapshot" => topic_map_to_bytes(&map)?,
        "json" => serde_json::to_vec_pretty(&TopicMapSnapshot::capture(&map))
            .map_err(|e| TopicMapError::Serialization(e.to_string()))?,
        _ => {
            return Err(TopicMapError::Serialization(format!(
                "Unknown format: {}. Use: snapshot, json",
                format
            )));
        }
    };

    std::fs::write(&validated_output, &data)
        .map_err(|e| TopicMapError::Io(format!("Write file: {}", e)))?;

    println!("Exported {} bytes to {:?}", data.len(), validated_output);

    Ok(())
}

// =============================================================================
// IMPORT COMMAND
// =============================================================================

/// Import a map from a snapshot file.
pub fn cmd_import(
    db_path: &PathBuf,
    backend: &str,
    input: &std::path::Path,
) -> Result<(), TopicMapError> {
    let validated_path = validate_file_path(input)?;
    validate_file_size(&validated_path, MAX_IMPORT_FILE_SIZE)?;

    let data =
        std::fs::read(&validated_path).map_err(|e| TopicMapError::Io(format!("Read file: {}", e)))?;

    let map = topic_map_from_bytes(&data)?;
    save_map(&map, db_path, backend)?;

    println!("Imported map: {} topics", map.topics().len());

    Ok(())
}

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Load the map from a database path, creating an empty one for databases
/// that do not exist yet.
pub fn load_or_create_map(db_path: &PathBuf, backend: &str) -> Result<TopicMap, TopicMapError> {
    match backend {
        "redb" => RedbStore::open(db_path)?.load(),
        _ => {
            if db_path.exists() {
                FileStore::new(db_path).load()
            } else {
                Ok(TopicMap::new())
            }
        }
    }
}

/// Persist the map to a database path.
pub fn save_map(map: &TopicMap, db_path: &PathBuf, backend: &str) -> Result<(), TopicMapError> {
    match backend {
        "redb" => RedbStore::open(db_path)?.save(map),
        _ => FileStore::new(db_path).save(map),
    }
}

/// Resolve a topic through any of its three identifier namespaces.
pub fn resolve_topic(map: &TopicMap, reference: &str) -> Result<ConstructId, TopicMapError> {
    let locator = Locator::new(reference);
    if let Some(id) = map.topic_by_subject_identifier(&locator) {
        return Ok(id);
    }
    if let Some(id) = map.topic_by_subject_locator(&locator) {
        return Ok(id);
    }
    if let Some(id) = map.construct_by_item_identifier(&locator) {
        if map.construct(id)?.kind() == ConstructKind::Topic {
            return Ok(id);
        }
    }
    Err(TopicMapError::InvalidValue(format!(
        "No topic with identifier '{}'",
        reference
    )))
}

/// Ensure a topic for every theme reference, by subject identifier.
fn ensure_themes(map: &mut TopicMap, themes: &[String]) -> Result<Vec<ConstructId>, TopicMapError> {
    let mut ids = Vec::with_capacity(themes.len());
    for theme in themes {
        ids.push(map.ensure_topic_by_subject_identifier(Locator::new(theme))?);
    }
    Ok(ids)
}

/// Parse a construct kind filter.
fn parse_kind(kind: &str) -> Result<ConstructKind, TopicMapError> {
    match kind {
        "name" => Ok(ConstructKind::Name),
        "occurrence" => Ok(ConstructKind::Occurrence),
        "variant" => Ok(ConstructKind::Variant),
        "association" => Ok(ConstructKind::Association),
        "role" => Ok(ConstructKind::Role),
        _ => Err(TopicMapError::InvalidValue(format!(
            "Unknown kind: {}. Use: name, occurrence, variant, association, role",
            kind
        ))),
    }
}

/// Parse an identifier namespace name.
fn parse_namespace(namespace: &str) -> Result<IdentifierKind, TopicMapError> {
    match namespace {
        "item" => Ok(IdentifierKind::Item),
        "subject" => Ok(IdentifierKind::Subject),
        "locator" => Ok(IdentifierKind::SubjectLocator),
        _ => Err(TopicMapError::InvalidValue(format!(
            "Unknown namespace: {}. Use: item, subject, locator",
            namespace
        ))),
    }
}
