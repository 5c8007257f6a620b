use anyhow::Result;
use rusqlite::Connection;

const DB_PATH: &str = "data/diarios.sqlite";

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS gazettes (
            id         INTEGER PRIMARY KEY,
            date       TEXT,
            url        TEXT,
            source     TEXT NOT NULL CHECK(source IN ('url','local')),
            pdf_path   TEXT UNIQUE NOT NULL,
            page_count INTEGER,
            extracted  BOOLEAN NOT NULL DEFAULT 0,
            segmented  BOOLEAN NOT NULL DEFAULT 0,
            meta       TEXT,
            fetched_at TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE INDEX IF NOT EXISTS idx_gazettes_extracted ON gazettes(extracted);
        CREATE INDEX IF NOT EXISTS idx_gazettes_segmented ON gazettes(segmented);

        CREATE TABLE IF NOT EXISTS gazette_pages (
            id          INTEGER PRIMARY KEY,
            gazette_id  INTEGER NOT NULL REFERENCES gazettes(id),
            page_index  INTEGER NOT NULL,
            page_number INTEGER,
            text        TEXT NOT NULL,
            UNIQUE(gazette_id, page_index)
        );
        CREATE INDEX IF NOT EXISTS idx_pages_gazette ON gazette_pages(gazette_id);

        CREATE TABLE IF NOT EXISTS gazette_sections (
            id         INTEGER PRIMARY KEY,
            gazette_id INTEGER NOT NULL REFERENCES gazettes(id),
            position   INTEGER NOT NULL,
            start_page INTEGER NOT NULL,
            end_page   INTEGER NOT NULL,
            page_range TEXT NOT NULL,
            label      TEXT NOT NULL,
            UNIQUE(gazette_id, position)
        );
        CREATE INDEX IF NOT EXISTS idx_sections_gazette ON gazette_sections(gazette_id);
        ",
    )?;
    Ok(())
}

// ── Gazettes ──

pub struct GazetteRow {
    pub id: i64,
    pub date: Option<String>,
    pub url: Option<String>,
    pub source: String,
    pub pdf_path: String,
    pub page_count: Option<i64>,
}

/// Register a gazette, returning its id. Re-registering the same PDF path is
/// a no-op that returns the existing row.
pub fn register_gazette(
    conn: &Connection,
    date: Option<&str>,
    url: Option<&str>,
    source: &str,
    pdf_path: &str,
) -> Result<i64> {
    conn.execute(
        "INSERT OR IGNORE INTO gazettes (date, url, source, pdf_path) VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![date, url, source, pdf_path],
    )?;
    let id = conn.query_row(
        "SELECT id FROM gazettes WHERE pdf_path = ?1",
        rusqlite::params![pdf_path],
        |r| r.get(0),
    )?;
    Ok(id)
}

pub fn get_gazette(conn: &Connection, id: i64) -> Result<GazetteRow> {
    let row = conn.query_row(
        "SELECT id, date, url, source, pdf_path, page_count FROM gazettes WHERE id = ?1",
        rusqlite::params![id],
        map_gazette,
    )?;
    Ok(row)
}

pub fn fetch_unextracted(conn: &Connection, id: Option<i64>) -> Result<Vec<GazetteRow>> {
    fetch_gazettes(conn, "extracted = 0", id)
}

pub fn fetch_unsegmented(conn: &Connection, id: Option<i64>) -> Result<Vec<GazetteRow>> {
    fetch_gazettes(conn, "extracted = 1 AND segmented = 0", id)
}

fn fetch_gazettes(conn: &Connection, cond: &str, id: Option<i64>) -> Result<Vec<GazetteRow>> {
    let sql = match id {
        Some(n) => format!(
            "SELECT id, date, url, source, pdf_path, page_count FROM gazettes
             WHERE {cond} AND id = {n} ORDER BY id"
        ),
        None => format!(
            "SELECT id, date, url, source, pdf_path, page_count FROM gazettes
             WHERE {cond} ORDER BY id"
        ),
    };
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_gazette)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

fn map_gazette(row: &rusqlite::Row) -> rusqlite::Result<GazetteRow> {
    Ok(GazetteRow {
        id: row.get(0)?,
        date: row.get(1)?,
        url: row.get(2)?,
        source: row.get(3)?,
        pdf_path: row.get(4)?,
        page_count: row.get(5)?,
    })
}

// ── Pages ──

pub struct PageRow {
    pub page_index: i64,
    pub page_number: Option<i64>,
    pub text: String,
}

/// Store a gazette's extracted pages and mark it extracted. Replaces any
/// previous extraction of the same gazette.
pub fn save_pages(conn: &Connection, gazette_id: i64, pages: &[PageRow]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        tx.execute(
            "DELETE FROM gazette_pages WHERE gazette_id = ?1",
            rusqlite::params![gazette_id],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO gazette_pages (gazette_id, page_index, page_number, text)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for p in pages {
            stmt.execute(rusqlite::params![gazette_id, p.page_index, p.page_number, p.text])?;
        }
        tx.execute(
            "UPDATE gazettes SET extracted = 1, segmented = 0, page_count = ?2 WHERE id = ?1",
            rusqlite::params![gazette_id, pages.len() as i64],
        )?;
    }
    tx.commit()?;
    Ok(())
}

/// Attach an extraction-diagnostics JSON blob to the gazette row.
pub fn set_gazette_meta(conn: &Connection, gazette_id: i64, meta_json: &str) -> Result<()> {
    conn.execute(
        "UPDATE gazettes SET meta = ?2 WHERE id = ?1",
        rusqlite::params![gazette_id, meta_json],
    )?;
    Ok(())
}

pub fn fetch_pages(conn: &Connection, gazette_id: i64) -> Result<Vec<PageRow>> {
    let mut stmt = conn.prepare(
        "SELECT page_index, page_number, text FROM gazette_pages
         WHERE gazette_id = ?1 ORDER BY page_index",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![gazette_id], |row| {
            Ok(PageRow {
                page_index: row.get(0)?,
                page_number: row.get(1)?,
                text: row.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Sections ──

pub struct SectionRecord {
    pub position: i64,
    pub start_page: i64,
    pub end_page: i64,
    pub page_range: String,
    pub label: String,
}

/// Store the resolved sections and mark the gazette segmented. Replaces any
/// previous segmentation.
pub fn save_sections(conn: &Connection, gazette_id: i64, sections: &[SectionRecord]) -> Result<()> {
    let tx = conn.unchecked_transaction()?;
    {
        tx.execute(
            "DELETE FROM gazette_sections WHERE gazette_id = ?1",
            rusqlite::params![gazette_id],
        )?;
        let mut stmt = tx.prepare(
            "INSERT INTO gazette_sections (gazette_id, position, start_page, end_page, page_range, label)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for s in sections {
            stmt.execute(rusqlite::params![
                gazette_id, s.position, s.start_page, s.end_page, s.page_range, s.label,
            ])?;
        }
        tx.execute(
            "UPDATE gazettes SET segmented = 1 WHERE id = ?1",
            rusqlite::params![gazette_id],
        )?;
    }
    tx.commit()?;
    Ok(())
}

pub fn fetch_sections(conn: &Connection, gazette_id: i64) -> Result<Vec<SectionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT position, start_page, end_page, page_range, label FROM gazette_sections
         WHERE gazette_id = ?1 ORDER BY position",
    )?;
    let rows = stmt
        .query_map(rusqlite::params![gazette_id], |row| {
            Ok(SectionRecord {
                position: row.get(0)?,
                start_page: row.get(1)?,
                end_page: row.get(2)?,
                page_range: row.get(3)?,
                label: row.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub registered: usize,
    pub extracted: usize,
    pub segmented: usize,
    pub pages: usize,
    pub sections: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let registered: usize = conn.query_row("SELECT COUNT(*) FROM gazettes", [], |r| r.get(0))?;
    let extracted: usize =
        conn.query_row("SELECT COUNT(*) FROM gazettes WHERE extracted = 1", [], |r| r.get(0))?;
    let segmented: usize =
        conn.query_row("SELECT COUNT(*) FROM gazettes WHERE segmented = 1", [], |r| r.get(0))?;
    let pages: usize = conn.query_row("SELECT COUNT(*) FROM gazette_pages", [], |r| r.get(0))?;
    let sections: usize =
        conn.query_row("SELECT COUNT(*) FROM gazette_sections", [], |r| r.get(0))?;
    Ok(Stats {
        registered,
        extracted,
        segmented,
        pages,
        sections,
    })
}
