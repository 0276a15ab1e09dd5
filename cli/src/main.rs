//! doctree CLI - structure extracted documents into a persisted hierarchy

use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;

use doctree::{
    BlockKind, ContentBlock, DirAssetStore, Document, Repository, Section, TreeBuilder,
};

#[derive(Parser)]
#[command(name = "doctree")]
#[command(version)]
#[command(about = "Structure extracted documents into a persisted hierarchy", long_about = None)]
struct Cli {
    /// Database file
    #[arg(long, global = true, env = "DOCTREE_DB", default_value = "doctree.db")]
    db: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest element-stream JSON files into the database
    Ingest {
        /// Input files (JSON array of elements per file)
        #[arg(value_name = "FILE", required = true)]
        inputs: Vec<PathBuf>,

        /// Directory for extracted side content (images, tables)
        #[arg(short, long, value_name = "DIR", default_value = "output")]
        assets: PathBuf,

        /// Document title (single input only; defaults to the file stem)
        #[arg(long)]
        title: Option<String>,

        /// Reject heading-level gaps instead of clamping them
        #[arg(long)]
        strict: bool,

        /// Also write the built tree as JSON next to the assets
        #[arg(long)]
        dump_json: bool,
    },

    /// List stored documents
    #[command(alias = "ls")]
    List {
        /// Number of records to skip
        #[arg(long, default_value = "0")]
        skip: u32,

        /// Maximum number of records
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Show one document's tree
    Show {
        /// Document identifier
        #[arg(value_name = "ID")]
        id: String,

        /// Print the full tree as JSON
        #[arg(long)]
        json: bool,
    },

    /// Search documents and content
    Search {
        /// Search term
        #[arg(value_name = "QUERY", required_unless_present = "kind")]
        query: Option<String>,

        /// Search content block text instead of document titles
        #[arg(long)]
        content: bool,

        /// Filter content blocks by kind (text, image, table)
        #[arg(long, value_name = "KIND")]
        kind: Option<BlockKind>,

        /// Number of records to skip
        #[arg(long, default_value = "0")]
        skip: u32,

        /// Maximum number of records
        #[arg(long, default_value = "20")]
        limit: u32,
    },

    /// Delete a document and all of its sections and content
    #[command(alias = "rm")]
    Delete {
        /// Document identifier
        #[arg(value_name = "ID")]
        id: String,
    },
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Ingest {
            inputs,
            assets,
            title,
            strict,
            dump_json,
        } => cmd_ingest(&cli.db, &inputs, &assets, title, strict, dump_json),
        Commands::List { skip, limit } => cmd_list(&cli.db, skip, limit),
        Commands::Show { id, json } => cmd_show(&cli.db, &id, json),
        Commands::Search {
            query,
            content,
            kind,
            skip,
            limit,
        } => cmd_search(&cli.db, query.as_deref(), content, kind, skip, limit),
        Commands::Delete { id } => cmd_delete(&cli.db, &id),
    };

    if let Err(err) = result {
        eprintln!("{} {err}", "error:".red().bold());
        std::process::exit(1);
    }
}

fn cmd_ingest(
    db: &Path,
    inputs: &[PathBuf],
    assets: &Path,
    title: Option<String>,
    strict: bool,
    dump_json: bool,
) -> doctree::Result<()> {
    if title.is_some() && inputs.len() > 1 {
        return Err(doctree::Error::InvalidInput(
            "--title requires a single input file".to_string(),
        ));
    }

    let repo = Repository::open(db)?;
    let store = DirAssetStore::new(assets);
    log::info!(
        "ingesting {} files into {}",
        inputs.len(),
        db.display()
    );

    let progress = ProgressBar::new(inputs.len() as u64);
    progress.set_style(
        ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );

    // Each file is an independent transform; distinct documents never
    // contend with each other in the repository.
    let outcomes: Vec<(PathBuf, doctree::Result<Document>)> = inputs
        .par_iter()
        .map(|input| {
            let outcome = ingest_one(input, &repo, &store, title.as_deref(), strict, dump_json);
            progress.inc(1);
            (input.clone(), outcome)
        })
        .collect();
    progress.finish_and_clear();

    let mut failures = 0;
    for (input, outcome) in &outcomes {
        match outcome {
            Ok(doc) => {
                println!(
                    "{} {} {} ({} sections, {} blocks)",
                    "✓".green().bold(),
                    input.display(),
                    doc.id.dimmed(),
                    doc.section_count(),
                    doc.block_count(),
                );
            }
            Err(err) => {
                failures += 1;
                println!("{} {} {err}", "✗".red().bold(), input.display());
            }
        }
    }

    if failures > 0 {
        return Err(doctree::Error::InvalidInput(format!(
            "{failures} of {} files failed",
            outcomes.len()
        )));
    }
    Ok(())
}

fn ingest_one(
    input: &Path,
    repo: &Repository,
    store: &DirAssetStore,
    title: Option<&str>,
    strict: bool,
    dump_json: bool,
) -> doctree::Result<Document> {
    let raw = fs::read_to_string(input)?;
    let elements = doctree::elements_from_json(&raw)?;

    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "untitled".to_string());
    let title = title.map(str::to_string).unwrap_or_else(|| stem.clone());
    let filename = input
        .file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or(stem);

    let mut options = doctree::BuildOptions::new();
    if strict {
        options = options.strict_headings();
    }
    let mut doc = TreeBuilder::with_options(options).build(title, filename, &elements)?;
    doctree::extract_side_content(&mut doc, store)?;
    repo.persist(&doc)?;

    if dump_json {
        let path = store.root().join(&doc.id).join("document.json");
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, serde_json::to_string_pretty(&doc).unwrap_or_default())?;
    }

    Ok(doc)
}

fn cmd_list(db: &Path, skip: u32, limit: u32) -> doctree::Result<()> {
    let repo = Repository::open(db)?;
    let summaries = repo.list(skip, limit)?;
    let total = repo.count()?;

    if summaries.is_empty() {
        println!("no documents");
        return Ok(());
    }

    for summary in &summaries {
        println!(
            "{}  {}  {} {}",
            summary.id.dimmed(),
            summary.created_at.format("%Y-%m-%d %H:%M"),
            summary.title.bold(),
            format!("({})", summary.source_filename).dimmed(),
        );
    }
    println!("{}", format!("{} of {total} documents", summaries.len()).dimmed());
    Ok(())
}

fn cmd_show(db: &Path, id: &str, json: bool) -> doctree::Result<()> {
    let repo = Repository::open(db)?;
    let doc = repo.fetch(id)?;

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&doc)
                .map_err(|e| doctree::Error::StorageRead(e.to_string()))?
        );
        return Ok(());
    }

    println!("{} {}", doc.title.bold(), format!("[{}]", doc.id).dimmed());
    println!(
        "{}",
        format!(
            "{} · {} pages · {} sections · {} blocks",
            doc.source_filename,
            doc.metadata.page_count,
            doc.section_count(),
            doc.block_count()
        )
        .dimmed()
    );
    for block in &doc.blocks {
        print_block(block, 1);
    }
    for section in &doc.sections {
        print_section(section, 1);
    }
    Ok(())
}

fn print_section(section: &Section, depth: usize) {
    let indent = "  ".repeat(depth);
    println!("{indent}{} {}", "§".cyan(), section.title.bold());
    for block in &section.blocks {
        print_block(block, depth + 1);
    }
    for child in &section.sections {
        print_section(child, depth + 1);
    }
}

fn print_block(block: &ContentBlock, depth: usize) {
    let indent = "  ".repeat(depth);
    match block.kind() {
        BlockKind::Text => {
            let text = block.text().unwrap_or_default();
            let preview: String = text.chars().take(60).collect();
            let ellipsis = if text.chars().count() > 60 { "…" } else { "" };
            println!("{indent}{preview}{ellipsis}");
        }
        kind => {
            let source = block.source().unwrap_or("<no source>");
            println!("{indent}{} {}", format!("[{kind}]").yellow(), source.dimmed());
        }
    }
}

fn cmd_search(
    db: &Path,
    query: Option<&str>,
    content: bool,
    kind: Option<BlockKind>,
    skip: u32,
    limit: u32,
) -> doctree::Result<()> {
    let repo = Repository::open(db)?;

    if let Some(kind) = kind {
        let hits = repo.blocks_by_kind(kind, skip, limit)?;
        print_block_hits(&hits);
        return Ok(());
    }

    let query = query.unwrap_or_default();
    if content {
        let hits = repo.search_blocks(query, skip, limit)?;
        print_block_hits(&hits);
    } else {
        let summaries = repo.search_documents(query, skip, limit)?;
        if summaries.is_empty() {
            println!("no matches");
            return Ok(());
        }
        for summary in &summaries {
            println!(
                "{}  {} {}",
                summary.id.dimmed(),
                summary.title.bold(),
                format!("({})", summary.source_filename).dimmed(),
            );
        }
    }
    Ok(())
}

fn print_block_hits(hits: &[doctree::BlockHit]) {
    if hits.is_empty() {
        println!("no matches");
        return;
    }
    for hit in hits {
        let payload = hit
            .text
            .as_deref()
            .or(hit.source.as_deref())
            .or(hit.caption.as_deref())
            .unwrap_or_default();
        let preview: String = payload.chars().take(70).collect();
        println!(
            "{}  {} {}",
            hit.document_id.dimmed(),
            format!("[{}]", hit.kind).yellow(),
            preview,
        );
    }
}

fn cmd_delete(db: &Path, id: &str) -> doctree::Result<()> {
    let repo = Repository::open(db)?;
    repo.delete(id)?;
    println!("{} deleted {id}", "✓".green().bold());
    Ok(())
}
