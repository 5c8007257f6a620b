use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static INNER_WS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[ \t]+").unwrap());

/// Normalize one raw physical line: NBSP → space, collapse runs of
/// spaces/tabs, trim. Extraction output is full of both.
pub fn clean_line(raw: &str) -> String {
    let s = raw.replace('\u{a0}', " ");
    INNER_WS_RE.replace_all(&s, " ").trim().to_string()
}

/// Split a page's raw text into cleaned, non-empty lines.
pub fn page_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(clean_line)
        .filter(|l| !l.is_empty())
        .collect()
}

/// Reduce a line to its matching key: uppercase, NFD-decompose and drop
/// combining marks, keep ASCII letters and digits only. "Matéria  adm." and
/// "MATERIA ADM" collapse to the same key. Idempotent; empty input yields an
/// empty key, which matches no marker.
pub fn compact_key(s: &str) -> String {
    s.to_uppercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .filter(|c| c.is_ascii_alphanumeric())
        .collect()
}

/// Concatenated key of up to `width` consecutive line keys starting at
/// `start` (fewer if the page ends first). Titles split across 2–3 physical
/// lines by extraction match through these windows.
pub fn window_key(keys: &[String], start: usize, width: usize) -> String {
    keys.iter().skip(start).take(width).flat_map(|k| k.chars()).collect()
}

/// True if any 1/2/3-line window at `start` begins with `marker`. Every
/// width is tested; a wider match is never shadowed by a narrower miss.
pub fn window_starts_with(keys: &[String], start: usize, marker: &str) -> bool {
    (1..=3).any(|w| window_key(keys, start, w).starts_with(marker))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean_line("  TRAMITA\u{a0}\u{a0}ÇÃO \t DE  PROPOSIÇÕES  "), "TRAMITA ÇÃO DE PROPOSIÇÕES");
    }

    #[test]
    fn page_lines_drops_empties() {
        let lines = page_lines("ATA\n\n   \nMATÉRIA ADMINISTRATIVA\n");
        assert_eq!(lines, vec!["ATA", "MATÉRIA ADMINISTRATIVA"]);
    }

    #[test]
    fn key_strips_accents_and_punctuation() {
        assert_eq!(compact_key("Tramitação de Proposições"), "TRAMITACAODEPROPOSICOES");
        assert_eq!(compact_key("CORRESPONDÊNCIA DESPACHADA PELO 1º-SECRETÁRIO"), "CORRESPONDENCIADESPACHADAPELO1SECRETARIO");
        assert_eq!(compact_key("QUESTÃO DE ORDEM"), "QUESTAODEORDEM");
    }

    #[test]
    fn key_is_idempotent() {
        let once = compact_key("Apresentação de Proposições");
        assert_eq!(compact_key(&once), once);
    }

    #[test]
    fn empty_line_empty_key() {
        assert_eq!(compact_key(""), "");
        assert_eq!(compact_key("—•—"), "");
    }

    #[test]
    fn windows_join_split_titles() {
        let keys: Vec<String> = ["PROJETOS", "DE LEI", "Nº 123"]
            .iter()
            .map(|l| compact_key(l))
            .collect();
        assert_eq!(window_key(&keys, 0, 1), "PROJETOS");
        assert_eq!(window_key(&keys, 0, 2), "PROJETOSDELEI");
        assert!(window_starts_with(&keys, 0, "PROJETOSDELEI"));
        assert!(!window_starts_with(&keys, 1, "PROJETOSDELEI"));
    }

    #[test]
    fn window_truncates_at_page_end() {
        let keys = vec![compact_key("REQUERIMENTOS")];
        assert_eq!(window_key(&keys, 0, 3), "REQUERIMENTOS");
        assert_eq!(window_key(&keys, 1, 3), "");
    }
}
