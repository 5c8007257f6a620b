use std::sync::LazyLock;

use regex::Regex;

// Running boilerplate printed on every page: masthead, site domain, weekday
// header, explicit page markers.
static BOILERPLATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(DI[ÁA]RIO\s+DO\s+LEGISLATIVO|www\.almg\.gov\.br|Segunda-feira|Ter[çc]a-feira|Quarta-feira|Quinta-feira|Sexta-feira|S[áa]bado|Domingo|\bP[ÁA]GINA\s+\d+\b)",
    )
    .unwrap()
});

static RULE_ONLY_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[-–—_•.\s]+$").unwrap());
static CONTENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Za-zÀ-ÿ0-9]").unwrap());

/// A line counts toward page content if it is not boilerplate, not a bare
/// horizontal rule or bullet run, and carries at least one letter or digit.
pub fn is_relevant(line: &str) -> bool {
    let line = line.trim();
    if line.is_empty() || BOILERPLATE_RE.is_match(line) || RULE_ONLY_RE.is_match(line) {
        return false;
    }
    CONTENT_RE.is_match(line)
}

/// Whether `line_idx` is the first relevant line of its page. Pure predicate
/// over the page's line list, recomputed per call.
pub fn is_page_top(line_idx: usize, lines: &[String]) -> bool {
    !lines[..line_idx].iter().any(|prev| is_relevant(prev))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(lines: &[&str]) -> Vec<String> {
        lines.iter().map(|l| l.to_string()).collect()
    }

    #[test]
    fn masthead_and_weekdays_are_boilerplate() {
        assert!(!is_relevant("DIÁRIO DO LEGISLATIVO"));
        assert!(!is_relevant("diario do legislativo"));
        assert!(!is_relevant("www.almg.gov.br"));
        assert!(!is_relevant("Terça-feira, 6 de janeiro de 2026"));
        assert!(!is_relevant("PÁGINA 12"));
        assert!(!is_relevant("Pagina 3 de 80"));
    }

    #[test]
    fn rules_and_bullets_are_not_content() {
        assert!(!is_relevant("--------"));
        assert!(!is_relevant("• • •"));
        assert!(!is_relevant("—— _ ——"));
        assert!(!is_relevant(""));
    }

    #[test]
    fn real_titles_are_relevant() {
        assert!(is_relevant("TRAMITAÇÃO DE PROPOSIÇÕES"));
        assert!(is_relevant("ATA"));
        assert!(is_relevant("1ª REUNIÃO ORDINÁRIA"));
    }

    #[test]
    fn top_skips_boilerplate_prefix() {
        let lines = page(&[
            "DIÁRIO DO LEGISLATIVO",
            "Sexta-feira, 12 de dezembro de 2025",
            "PÁGINA 3",
            "TRAMITAÇÃO DE PROPOSIÇÕES",
            "APRESENTAÇÃO DE PROPOSIÇÕES",
        ]);
        assert!(is_page_top(3, &lines));
        assert!(!is_page_top(4, &lines));
    }

    #[test]
    fn first_line_is_always_top() {
        let lines = page(&["ATA"]);
        assert!(is_page_top(0, &lines));
    }

    #[test]
    fn relevant_predecessor_blocks_top() {
        let lines = page(&["Parecer sobre o requerimento", "ATA"]);
        assert!(!is_page_top(1, &lines));
    }
}
