//! Command implementations for the xiphos CLI.

use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, info, warn};
use serde_json::Value;

use crate::analysis::CharFilter;
use crate::analysis::char_filter::mapping::MappingCharFilter;
use crate::cli::args::*;
use crate::cli::output::*;
use crate::error::{Result, XiphosError};
use crate::index::{Document, IndexReader, MemoryIndexWriter};
use crate::query::{FuzzyConfig, FuzzyQuery, PrefixQuery, Query, TermQuery, WildcardQuery};
use crate::search::{IndexSearcher, SearchOptions};
use crate::storage::Storage;
use crate::storage::compound::{CompoundStore, CompoundWriter};
use crate::storage::file::FileStorage;
use crate::storage::memory::MemoryStorage;

/// Execute a CLI command.
pub fn execute_command(args: XiphosArgs) -> Result<()> {
    match &args.command {
        Command::Compound(compound_args) => match &compound_args.action {
            CompoundAction::Pack { output, files } => {
                output_result(&pack_compound(output, files)?, &args)
            }
            CompoundAction::List { file } => output_result(&list_compound(file)?, &args),
            CompoundAction::Unpack { file, dir } => {
                output_result(&unpack_compound(file, dir)?, &args)
            }
        },
        Command::Map(map_args) => output_result(&map_text(map_args)?, &args),
        Command::Search(search_args) => output_result(&search_docs(search_args)?, &args),
    }
}

/// Split a path into the storage directory holding it and its file name.
fn split_path(path: &Path) -> Result<(PathBuf, String)> {
    let name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| XiphosError::argument(format!("Invalid file path {}", path.display())))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, name.to_string()))
}

fn open_compound(path: &Path) -> Result<CompoundStore> {
    let (dir, name) = split_path(path)?;
    let storage: Arc<dyn Storage> = Arc::new(FileStorage::open(dir)?);
    CompoundStore::open(storage, &name)
}

/// Pack `files` into the compound file `output`. Entries are named after
/// the file names; missing files and repeated names are skipped.
pub fn pack_compound(output: &Path, files: &[PathBuf]) -> Result<PackResult> {
    let (_, compound_name) = split_path(output)?;
    let staging: Arc<dyn Storage> = Arc::new(MemoryStorage::new_default());
    let mut writer = CompoundWriter::new(Arc::clone(&staging), &compound_name);
    let mut skipped = 0;

    for file in files {
        let (_, name) = split_path(file)?;
        if name == compound_name || staging.file_exists(&name) {
            warn!("Skipping {}: an entry named {name} was already added", file.display());
            skipped += 1;
            continue;
        }
        let data = match fs::read(file) {
            Ok(data) => data,
            Err(e) => {
                warn!("Skipping {}: {e}", file.display());
                skipped += 1;
                continue;
            }
        };
        let mut out = staging.create_output(&name)?;
        out.write_all(&data)?;
        out.flush()?;
        drop(out);
        writer.add_file(&name)?;
        debug!("Staged {name} ({} bytes)", data.len());
    }

    let files_packed = writer.len();
    writer.close()?;

    let mut input = staging.open_input(&compound_name)?;
    let mut data = Vec::new();
    input.read_to_end(&mut data)?;
    fs::write(output, &data)?;
    info!("Wrote {} with {files_packed} entries", output.display());

    Ok(PackResult {
        path: output.display().to_string(),
        files_packed,
        files_skipped: skipped,
        size_bytes: data.len() as u64,
    })
}

/// List the entries of the compound file at `path` in directory order.
pub fn list_compound(path: &Path) -> Result<CompoundListing> {
    let store = open_compound(path)?;
    let mut entries = Vec::with_capacity(store.count());
    store.each(|name| {
        entries.push(CompoundEntry {
            name: name.to_string(),
            length: store.length(name),
        })
    });
    Ok(CompoundListing {
        path: path.display().to_string(),
        entries,
    })
}

/// Extract every entry of the compound file at `path` into `dir`.
pub fn unpack_compound(path: &Path, dir: &Path) -> Result<UnpackResult> {
    let store = open_compound(path)?;
    fs::create_dir_all(dir)?;

    let mut names = Vec::with_capacity(store.count());
    store.each(|name| names.push(name.to_string()));

    let mut written = 0;
    let mut skipped = 0;
    for name in names {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            warn!("Skipping entry with unsafe name {name:?}");
            skipped += 1;
            continue;
        }
        let mut input = store.open_input(&name)?;
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        fs::write(dir.join(&name), &data)?;
        written += 1;
    }

    Ok(UnpackResult {
        path: path.display().to_string(),
        directory: dir.display().to_string(),
        files_written: written,
        files_skipped: skipped,
    })
}

/// Map text through the mapping file given on the command line.
pub fn map_text(args: &MapArgs) -> Result<MapResult> {
    let filter = MappingCharFilter::from_json_file(&args.mapping)?;
    let (mapped, transformations) = filter.filter(&args.text);
    let output = match args.capacity {
        Some(capa) => filter.mapper().map(&args.text, capa),
        None => mapped,
    };
    Ok(MapResult {
        input: args.text.clone(),
        output,
        replacements: transformations.len(),
    })
}

fn load_documents(path: &Path) -> Result<Vec<BTreeMap<String, String>>> {
    let json = fs::read_to_string(path)?;
    let values: Vec<Value> = serde_json::from_str(&json)?;
    let mut docs = Vec::with_capacity(values.len());
    for (i, value) in values.into_iter().enumerate() {
        let Value::Object(obj) = value else {
            warn!("Skipping document {i}: not a JSON object");
            continue;
        };
        let mut fields = BTreeMap::new();
        for (name, value) in obj {
            match value {
                Value::String(text) => {
                    fields.insert(name, text);
                }
                Value::Null => {}
                other => {
                    fields.insert(name, other.to_string());
                }
            }
        }
        docs.push(fields);
    }
    Ok(docs)
}

fn build_query(args: &SearchArgs) -> Query {
    let term = if args.keyword.contains(&args.field) {
        args.term.clone()
    } else {
        args.term.to_lowercase()
    };
    let field = args.field.as_str();
    match args.kind {
        QueryKind::Term => TermQuery::new(field, term).into(),
        QueryKind::Prefix => PrefixQuery::new(field, term).into(),
        QueryKind::Wildcard => WildcardQuery::new(field, term).into(),
        QueryKind::Fuzzy => FuzzyQuery::with_config(
            field,
            term,
            FuzzyConfig {
                min_similarity: args.min_similarity,
                prefix_length: args.prefix_length,
                ..FuzzyConfig::default()
            },
        )
        .into(),
    }
}

/// Index the documents file in memory and run the requested query.
pub fn search_docs(args: &SearchArgs) -> Result<SearchOutput> {
    let docs = load_documents(&args.docs)?;
    let mut writer = MemoryIndexWriter::new();
    for fields in &docs {
        let mut builder = Document::builder();
        for (name, value) in fields {
            builder = if args.keyword.contains(name) {
                builder.add_keyword(name.as_str(), value.as_str())
            } else {
                builder.add_text(name.as_str(), value.as_str())
            };
        }
        writer.add_document(builder.build());
    }
    let reader: Arc<dyn IndexReader> = Arc::new(writer.into_reader());
    debug!("Indexed {} documents from {}", reader.max_doc(), args.docs.display());

    let searcher = IndexSearcher::new(reader);
    let query = build_query(args);
    let start = Instant::now();
    let top_docs = searcher.search(
        &query,
        &SearchOptions::new(args.limit).first_doc(args.offset),
    )?;
    let duration_ms = start.elapsed().as_millis() as u64;

    let mut hits = Vec::with_capacity(top_docs.hits.len());
    for hit in &top_docs.hits {
        let explanation = if args.explain {
            Some(searcher.explain(&query, hit.doc)?)
        } else {
            None
        };
        hits.push(SearchHitOutput {
            doc: hit.doc,
            score: hit.score,
            fields: docs.get(hit.doc as usize).cloned().unwrap_or_default(),
            explanation,
        });
    }

    Ok(SearchOutput {
        query: query.to_string(),
        total_hits: top_docs.total_hits,
        max_score: top_docs.max_score,
        duration_ms,
        hits,
    })
}
