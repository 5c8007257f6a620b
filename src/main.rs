mod db;
mod export;
mod extract;
mod fetch;
mod segmenter;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use regex::Regex;
use tracing::warn;

use db::GazetteRow;
use segmenter::PageText;

#[derive(Parser)]
#[command(
    name = "diario_segmenter",
    about = "Segmenta o Diário do Legislativo (ALMG) em seções de interesse"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a gazette by date (DDMMYYYY), URL or local path
    Fetch {
        /// Date, full URL, or path to a local PDF
        input: String,
    },
    /// Extract page text from registered gazettes
    Extract {
        /// Restrict to one gazette id (default: all pending)
        #[arg(short, long)]
        id: Option<i64>,
    },
    /// Segment extracted gazettes into labeled page intervals
    Segment {
        /// Restrict to one gazette id (default: all pending)
        #[arg(short, long)]
        id: Option<i64>,
    },
    /// Write one gazette's sections as a two-column CSV
    Export {
        #[arg(short, long)]
        id: i64,
        /// Output path (default: data/exports/)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Fetch + extract + segment + export in one pipeline
    Run {
        /// Date, full URL, or path to a local PDF
        input: String,
        /// Output path (default: data/exports/)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the resolved sections of one gazette
    Sections {
        #[arg(short, long)]
        id: i64,
    },
    /// Show pipeline statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch { input } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let id = fetch_and_register(&conn, &input).await?;
            println!("Diário registrado (id {}).", id);
            Ok(())
        }
        Commands::Extract { id } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let gazettes = db::fetch_unextracted(&conn, id)?;
            if gazettes.is_empty() {
                println!("Nada a extrair. Rode 'fetch' primeiro.");
                return Ok(());
            }
            for gazette in &gazettes {
                let pages = extract::run(&conn, gazette)?;
                println!("Diário {}: {} páginas.", gazette.id, pages);
            }
            Ok(())
        }
        Commands::Segment { id } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let gazettes = db::fetch_unsegmented(&conn, id)?;
            if gazettes.is_empty() {
                println!("Nada a segmentar. Rode 'extract' primeiro.");
                return Ok(());
            }
            let (done, sections) = segment_gazettes(&conn, gazettes, false)?;
            println!("Segmentados {} diários, {} seções.", done, sections);
            Ok(())
        }
        Commands::Export { id, out } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            export_gazette(&conn, id, out)
        }
        Commands::Run { input, out } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let id = fetch_and_register(&conn, &input).await?;
            let gazette = db::get_gazette(&conn, id)?;

            let pages = extract::run(&conn, &gazette)?;
            println!("Extraídas {} páginas.", pages);

            segment_gazettes(&conn, vec![db::get_gazette(&conn, id)?], true)?;
            let sections = db::fetch_sections(&conn, id)?;
            export::print_table(&sections);

            export_gazette(&conn, id, out)
        }
        Commands::Sections { id } => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let sections = db::fetch_sections(&conn, id)?;
            if sections.is_empty() {
                println!("Nenhuma seção registrada para o diário {}.", id);
                return Ok(());
            }
            export::print_table(&sections);
            Ok(())
        }
        Commands::Stats => {
            let conn = db::connect()?;
            db::init_schema(&conn)?;
            let s = db::get_stats(&conn)?;
            println!("Registrados:  {}", s.registered);
            println!("Extraídos:    {}", s.extracted);
            println!("Segmentados:  {}", s.segmented);
            println!("Páginas:      {}", s.pages);
            println!("Seções:       {}", s.sections);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nConcluído em {}", format_duration(elapsed));
    }

    result
}

async fn fetch_and_register(conn: &rusqlite::Connection, input: &str) -> Result<i64> {
    let source = fetch::parse_input(input)?;
    let fetched = fetch::fetch(&source).await?;
    db::register_gazette(
        conn,
        fetched.date.as_deref(),
        fetched.url.as_deref(),
        fetched.source,
        &fetched.pdf_path.to_string_lossy(),
    )
}

/// Segment each gazette's stored pages. Classification runs are independent
/// across documents, so they go through rayon; saving stays on this thread
/// with the connection. Returns (gazettes segmented, total sections).
fn segment_gazettes(
    conn: &rusqlite::Connection,
    gazettes: Vec<GazetteRow>,
    strict: bool,
) -> Result<(usize, usize)> {
    use rayon::prelude::*;

    let mut loaded = Vec::with_capacity(gazettes.len());
    for gazette in gazettes {
        let pages: Vec<PageText> = db::fetch_pages(conn, gazette.id)?
            .into_iter()
            .map(|p| PageText {
                page_index: p.page_index as usize,
                text: p.text,
            })
            .collect();
        loaded.push((gazette, pages));
    }

    let results: Vec<_> = loaded
        .par_iter()
        .map(|(gazette, pages)| (gazette, pages, segmenter::segment_document(pages)))
        .collect();

    let mut done = 0;
    let mut total_sections = 0;
    for (gazette, pages, intervals) in results {
        if intervals.is_empty() {
            report_no_sections(gazette, pages);
            if strict {
                bail!("nenhum título de interesse encontrado (diário {})", gazette.id);
            }
            warn!("Diário {}: nenhum título de interesse, mantido como pendente", gazette.id);
            continue;
        }

        let records: Vec<db::SectionRecord> = intervals
            .iter()
            .enumerate()
            .map(|(i, s)| db::SectionRecord {
                position: i as i64,
                start_page: s.start_page as i64,
                end_page: s.end_page as i64,
                page_range: s.page_range(),
                label: s.label.clone(),
            })
            .collect();
        total_sections += records.len();
        db::save_sections(conn, gazette.id, &records)?;
        done += 1;
    }

    Ok((done, total_sections))
}

fn export_gazette(conn: &rusqlite::Connection, id: i64, out: Option<PathBuf>) -> Result<()> {
    let gazette = db::get_gazette(conn, id)?;
    let sections = db::fetch_sections(conn, id)?;
    if sections.is_empty() {
        bail!("diário {} sem seções; rode 'segment' primeiro", id);
    }
    let path = out.unwrap_or_else(|| default_export_path(&gazette));
    export::write_csv(&path, &sections)?;
    println!("CSV gravado em {} ({} linhas).", path.display(), sections.len());
    Ok(())
}

fn default_export_path(gazette: &GazetteRow) -> PathBuf {
    match &gazette.date {
        Some(d) => PathBuf::from(format!("data/exports/L{}.csv", d)),
        None => PathBuf::from(format!("data/exports/diario_{}.csv", gazette.id)),
    }
}

/// Dump candidate lines from the opening pages so a human can see why
/// nothing matched (typically an extraction quirk or a new heading variant).
fn report_no_sections(gazette: &GazetteRow, pages: &[PageText]) {
    let candidate_re = Regex::new(
        r"(?i)(TRAMITA|APRESENTA|RECEB|REQUER|LEI|MANIFEST|ATA|MATERIA\s+ADMIN|QUESTAO|RESOLU|ERRAT|EMEND|SUBSTIT|ACORDO|PARECER|CORRESP|OFIC|COMUNIC)",
    )
    .unwrap();

    let mut found = Vec::new();
    'pages: for page in pages.iter().take(50) {
        for line in segmenter::normalize::page_lines(&page.text) {
            if candidate_re.is_match(&line) {
                found.push(format!(
                    "p{}: {} || compact={}",
                    page.page_index,
                    line,
                    segmenter::normalize::compact_key(&line)
                ));
                if found.len() >= 400 {
                    break 'pages;
                }
            }
        }
    }

    println!("\n=== Diário {}: amostra de linhas candidatas ===", gazette.id);
    for line in &found {
        println!("{}", line);
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
