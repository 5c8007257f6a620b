use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use tracing::info;

use crate::db::{self, GazetteRow, PageRow};
use crate::segmenter::{classifier, normalize};

/// Extraction diagnostics stored on the gazette row. Pages without a
/// printed "PÁGINA N" marker fall back to their physical index during
/// segmentation, which is worth being able to see afterwards.
#[derive(Serialize)]
struct ExtractionMeta {
    page_count: usize,
    pages_without_page_marker: Vec<i64>,
}

pub fn command_available(cmd: &str) -> bool {
    Command::new(cmd)
        .arg("-v")
        .output()
        .is_ok()
}

/// Whole-document text via `pdftotext -layout`, one string per physical
/// page. Layout mode keeps the line structure the classifier depends on.
pub fn extract_pages(pdf_path: &Path) -> Result<Vec<String>> {
    if !command_available("pdftotext") {
        bail!("pdftotext não encontrado no PATH (instale poppler-utils)");
    }

    let output = Command::new("pdftotext")
        .args(["-layout", "-enc", "UTF-8"])
        .arg(pdf_path)
        .arg("-")
        .output()
        .with_context(|| format!("executando pdftotext em {}", pdf_path.display()))?;

    if !output.status.success() {
        bail!(
            "pdftotext falhou em {}: {}",
            pdf_path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }

    let text = String::from_utf8_lossy(&output.stdout).into_owned();
    Ok(split_pages(&text))
}

/// Split pdftotext output on form feeds. The tool emits one trailing form
/// feed per page, so the final empty fragment is dropped; empty pages in the
/// middle of the document are kept to preserve physical indices.
pub fn split_pages(text: &str) -> Vec<String> {
    let mut pages: Vec<String> = text.split('\u{c}').map(|p| p.to_string()).collect();
    if pages.last().is_some_and(|p| p.trim().is_empty()) {
        pages.pop();
    }
    pages
}

/// Extract one gazette's pages into the store, recording each page's printed
/// number when its "PÁGINA N" marker is present.
pub fn run(conn: &rusqlite::Connection, gazette: &GazetteRow) -> Result<usize> {
    let pages = extract_pages(Path::new(&gazette.pdf_path))?;

    let pb = ProgressBar::new(pages.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len} páginas")?
            .progress_chars("=> "),
    );

    let mut rows = Vec::with_capacity(pages.len());
    for (i, text) in pages.iter().enumerate() {
        let lines = normalize::page_lines(text);
        rows.push(PageRow {
            page_index: (i + 1) as i64,
            page_number: classifier::find_page_marker(&lines).map(|n| n as i64),
            text: text.clone(),
        });
        pb.inc(1);
    }
    pb.finish_and_clear();

    db::save_pages(conn, gazette.id, &rows)?;

    let meta = ExtractionMeta {
        page_count: rows.len(),
        pages_without_page_marker: rows
            .iter()
            .filter(|r| r.page_number.is_none())
            .map(|r| r.page_index)
            .collect(),
    };
    db::set_gazette_meta(conn, gazette.id, &serde_json::to_string(&meta)?)?;

    info!("Diário {}: {} páginas extraídas", gazette.id, rows.len());
    Ok(rows.len())
}
