use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use tracing::{info, warn};

const URL_BASE: &str = "https://diariolegislativo.almg.gov.br";
const CACHE_DIR: &str = "data/pdfs";
const PDF_MAGIC: &[u8] = b"%PDF-";
const MAX_RETRIES: u32 = 3;
const BASE_BACKOFF_MS: u64 = 2000;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// What the user handed us on the command line.
#[derive(Debug, PartialEq, Eq)]
pub enum SourceInput {
    /// Gazette date, canonical YYYYMMDD.
    Date(String),
    Url(String),
    Local(PathBuf),
}

/// Classify a raw CLI argument: full URL, filesystem path, or gazette date.
pub fn parse_input(raw: &str) -> Result<SourceInput> {
    let s = raw.trim();
    if s.is_empty() {
        bail!("informe uma data (DDMMYYYY), URL ou caminho local");
    }
    let lower = s.to_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return Ok(SourceInput::Url(s.to_string()));
    }
    if s.contains('/') || s.contains('\\') {
        return Ok(SourceInput::Local(PathBuf::from(s)));
    }
    Ok(SourceInput::Date(normalize_date(s)?))
}

/// Accepts DD/MM/YYYY, DD-MM-YYYY, YYYY-MM-DD, YYYY/MM/DD, DDMMYYYY and
/// YYYYMMDD (the last disambiguated by a 19xx/20xx prefix). Returns the
/// canonical YYYYMMDD form, validating the calendar date.
pub fn normalize_date(s: &str) -> Result<String> {
    let s = s.trim();

    let parsed = if let Some((d, m, y)) = split_date(s, &['/', '-'], false) {
        NaiveDate::from_ymd_opt(y, m, d)
    } else if let Some((d, m, y)) = split_date(s, &['/', '-'], true) {
        NaiveDate::from_ymd_opt(y, m, d)
    } else if s.len() == 8 && s.chars().all(|c| c.is_ascii_digit()) {
        digits_to_date(s)
    } else {
        None
    };

    match parsed {
        Some(date) => Ok(date.format("%Y%m%d").to_string()),
        None => bail!("data inválida: {s:?} (use DDMMYYYY, ex: 13122025)"),
    }
}

fn split_date(s: &str, seps: &[char], year_first: bool) -> Option<(u32, u32, i32)> {
    let parts: Vec<&str> = s.split(|c| seps.contains(&c)).collect();
    if parts.len() != 3 {
        return None;
    }
    let (y, m, d) = if year_first {
        (parts[0], parts[1], parts[2])
    } else {
        (parts[2], parts[1], parts[0])
    };
    if y.len() != 4 || m.len() != 2 || d.len() != 2 {
        return None;
    }
    Some((d.parse().ok()?, m.parse().ok()?, y.parse().ok()?))
}

fn digits_to_date(s: &str) -> Option<NaiveDate> {
    // A 19xx/20xx prefix reads as YYYYMMDD; everything else as DDMMYYYY.
    if s.starts_with("19") || s.starts_with("20") {
        let y: i32 = s[..4].parse().ok()?;
        let m: u32 = s[4..6].parse().ok()?;
        let d: u32 = s[6..].parse().ok()?;
        if let Some(date) = NaiveDate::from_ymd_opt(y, m, d) {
            return Some(date);
        }
    }
    let d: u32 = s[..2].parse().ok()?;
    let m: u32 = s[2..4].parse().ok()?;
    let y: i32 = s[4..].parse().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Canonical gazette URL for a YYYYMMDD date.
pub fn gazette_url(yyyymmdd: &str) -> String {
    format!("{URL_BASE}/{}/L{yyyymmdd}.pdf", &yyyymmdd[..4])
}

pub fn looks_like_pdf(head: &[u8]) -> bool {
    head.starts_with(PDF_MAGIC)
}

fn file_is_pdf(path: &Path) -> bool {
    let mut head = [0u8; 5];
    match std::fs::File::open(path) {
        Ok(mut f) => {
            use std::io::Read;
            f.read_exact(&mut head).is_ok() && looks_like_pdf(&head)
        }
        Err(_) => false,
    }
}

/// A registered source PDF ready for extraction.
pub struct Fetched {
    pub pdf_path: PathBuf,
    pub date: Option<String>,
    pub url: Option<String>,
    pub source: &'static str,
}

/// Resolve an input to a verified local PDF, downloading through the cache
/// when needed.
pub async fn fetch(input: &SourceInput) -> Result<Fetched> {
    match input {
        SourceInput::Date(yyyymmdd) => {
            let url = gazette_url(yyyymmdd);
            info!("URL montada: {}", url);
            let pdf_path = download_cached(&url, &format!("L{yyyymmdd}.pdf")).await?;
            Ok(Fetched {
                pdf_path,
                date: Some(yyyymmdd.clone()),
                url: Some(url),
                source: "url",
            })
        }
        SourceInput::Url(url) => {
            let name = url
                .rsplit('/')
                .next()
                .filter(|n| !n.is_empty())
                .unwrap_or("diario.pdf");
            let pdf_path = download_cached(url, name).await?;
            Ok(Fetched {
                pdf_path,
                date: None,
                url: Some(url.clone()),
                source: "url",
            })
        }
        SourceInput::Local(path) => {
            if !path.exists() {
                bail!("arquivo local não encontrado: {}", path.display());
            }
            if !file_is_pdf(path) {
                bail!("arquivo não é um PDF: {}", path.display());
            }
            Ok(Fetched {
                pdf_path: path.clone(),
                date: None,
                url: None,
                source: "local",
            })
        }
    }
}

/// Download `url` into the cache, verifying the PDF signature. A cached file
/// that already passes the check is reused. Retries with exponential backoff
/// on rate limiting and server errors.
async fn download_cached(url: &str, file_name: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(CACHE_DIR).context("criando diretório de cache")?;
    let path = Path::new(CACHE_DIR).join(file_name);

    if file_is_pdf(&path) {
        info!("Cache: reutilizando {}", path.display());
        return Ok(path);
    }

    let client = reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .build()?;

    let body = download_with_retry(&client, url).await?;
    if !looks_like_pdf(&body) {
        bail!("o Diário não existe para a data informada (conteúdo não é PDF): {url}");
    }

    std::fs::write(&path, &body)
        .with_context(|| format!("gravando {}", path.display()))?;
    info!("Baixado: {} ({} bytes)", path.display(), body.len());
    Ok(path)
}

async fn download_with_retry(client: &reqwest::Client, url: &str) -> Result<Vec<u8>> {
    for attempt in 0..=MAX_RETRIES {
        let response = client.get(url).send().await;

        let retryable = match &response {
            Ok(r) => {
                let status = r.status();
                status.as_u16() == 429 || status.is_server_error()
            }
            Err(e) => e.is_timeout() || e.is_connect(),
        };

        if !retryable || attempt == MAX_RETRIES {
            let response = response.with_context(|| format!("falha ao baixar {url}"))?;
            let response = response
                .error_for_status()
                .with_context(|| format!("falha ao baixar {url}"))?;
            return Ok(response.bytes().await?.to_vec());
        }

        let backoff = Duration::from_millis(BASE_BACKOFF_MS * 2u64.pow(attempt));
        warn!(
            "Falha transitória em {} (tentativa {}/{}), aguardando {:.1}s",
            url,
            attempt + 1,
            MAX_RETRIES,
            backoff.as_secs_f64()
        );
        tokio::time::sleep(backoff).await;
    }

    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .with_context(|| format!("falha ao baixar {url}"))?;
    Ok(response.bytes().await?.to_vec())
}
