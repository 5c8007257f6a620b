use std::sync::LazyLock;

use regex::Regex;

use super::normalize::{compact_key, window_starts_with};
use super::page_top::is_page_top;

static PAGE_NUM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bP[ÁA]GINA\s+(\d{1,4})\b").unwrap());

// How deep into a page the printed "PÁGINA N" marker is searched for.
const PAGE_NUM_SCAN_LINES: usize = 220;
// The promulgated-laws heading only appears in the opening part of a gazette.
const LEIS_PAGE_CEILING: i32 = 40;

// Structural markers.
const TRAMITACAO: &str = "TRAMITACAODEPROPOSICOES";
const RECEBIMENTO: &str = "RECEBIMENTODEPROPOSICOES";
const APRESENTACAO: &str = "APRESENTACAODEPROPOSICOES";

// Hard cuts: close the running block, never produce an output row.
const ATA: &str = "ATA";
const ATAS: &str = "ATAS";
const MATERIA_ADMINISTRATIVA: &str = "MATERIAADMINISTRATIVA";
const QUESTAO_DE_ORDEM: &str = "QUESTAODEORDEM";
const HARD_CUTS: &[&str] = &[ATA, ATAS, MATERIA_ADMINISTRATIVA, QUESTAO_DE_ORDEM];
const PARECER_PREFIX: &str = "PARECER";

// Correspondence context.
const CORRESPONDENCIA_HEADER: &str = "CORRESPONDENCIADESPACHADAPELO1SECRETARIO";
const OFICIOS: &str = "OFICIOS";

// Material triggers inside an apresentação block.
const PROJETO_DE_LEI: &str = "PROJETODELEI";
const PROJETOS_DE_LEI: &str = "PROJETOSDELEI";
const REQUERIMENTOS: &str = "REQUERIMENTOS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Cut,
    Out,
}

/// One boundary observation. `sequence` is globally unique and strictly
/// increasing in emission order; it keeps within-page classification order
/// stable once events are sorted by printed page number.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub page: i32,
    pub sequence: u32,
    pub kind: EventKind,
    pub label: Option<String>,
    pub overlapping: bool,
    pub is_page_top: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubKind {
    Pl,
    Req,
}

/// Context carried across lines and pages. `captured_leis` is a one-shot
/// latch: it survives every context reset for the rest of the document.
#[derive(Debug, Default)]
struct State {
    in_tramitacao: bool,
    apresentacao_ativa: bool,
    sub_apresentacao: Option<SubKind>,
    saw_correspondencia_header: bool,
    captured_leis: bool,
}

impl State {
    fn clear_context(&mut self) {
        self.in_tramitacao = false;
        self.apresentacao_ativa = false;
        self.sub_apresentacao = None;
        self.saw_correspondencia_header = false;
    }
}

pub struct Classifier {
    state: State,
    sequence: u32,
    events: Vec<Event>,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Classifier {
    pub fn new() -> Self {
        Classifier {
            state: State::default(),
            sequence: 0,
            events: Vec::new(),
        }
    }

    /// Scan one page's cleaned lines. Pages must arrive in physical order;
    /// context flags carry across page boundaries.
    pub fn scan_page(&mut self, physical_index: usize, lines: &[String]) {
        let page = printed_page_number(lines, physical_index as i32);
        let keys: Vec<String> = lines.iter().map(|l| compact_key(l)).collect();

        for (i, line) in lines.iter().enumerate() {
            let key = keys[i].as_str();
            let top = is_page_top(i, lines);

            // 1. Hard cuts: ATA(S), MATÉRIA ADMINISTRATIVA, QUESTÃO DE
            //    ORDEM, anything starting with PARECER.
            if HARD_CUTS.contains(&key) || key.starts_with(PARECER_PREFIX) {
                self.emit(page, EventKind::Cut, None, false, top);
                self.state.clear_context();
                continue;
            }

            // 2. TRAMITAÇÃO opens the procedural-flow context.
            if key == TRAMITACAO {
                self.state.in_tramitacao = true;
                self.state.apresentacao_ativa = false;
                self.state.sub_apresentacao = None;
                self.state.saw_correspondencia_header = false;
                self.emit(page, EventKind::Cut, None, false, top);
                continue;
            }

            // 3. RECEBIMENTO/APRESENTAÇÃO sub-headings inside TRAMITAÇÃO.
            if self.state.in_tramitacao && (key == RECEBIMENTO || key == APRESENTACAO) {
                self.state.apresentacao_ativa = key == APRESENTACAO;
                self.state.sub_apresentacao = None;
                self.state.saw_correspondencia_header = false;
                self.emit(page, EventKind::Cut, None, false, top);
                continue;
            }

            // 4. APRESENTAÇÃO outside TRAMITAÇÃO: context only, no event.
            if !self.state.in_tramitacao && key == APRESENTACAO {
                self.state.apresentacao_ativa = true;
                self.state.sub_apresentacao = None;
                continue;
            }

            // 5. Flag hygiene: a structural or hard-cut heading while an
            //    apresentação is open closes it; the line keeps matching
            //    the rules below.
            if self.state.apresentacao_ativa
                && (key == TRAMITACAO || key == ATA || key == ATAS || key == MATERIA_ADMINISTRATIVA)
            {
                self.state.apresentacao_ativa = false;
                self.state.sub_apresentacao = None;
            }

            // 6. Correspondence header: context only.
            if key == CORRESPONDENCIA_HEADER {
                self.state.saw_correspondencia_header = true;
                continue;
            }

            // 7. OFÍCIOS under the correspondence header.
            if self.state.saw_correspondencia_header && key == OFICIOS {
                self.emit(
                    page,
                    EventKind::Out,
                    Some("CORRESPONDÊNCIA: OFÍCIOS".to_string()),
                    true,
                    top,
                );
                self.state.clear_context();
                continue;
            }

            // 8. Material subdivision of an open apresentação. Re-matching
            //    the sub-kind already active consumes the line without a
            //    duplicate event, so a multi-page run collapses into one
            //    section.
            if self.state.apresentacao_ativa {
                if window_starts_with(&keys, i, PROJETO_DE_LEI)
                    || window_starts_with(&keys, i, PROJETOS_DE_LEI)
                {
                    if self.state.sub_apresentacao != Some(SubKind::Pl) {
                        let label = apresentacao_label(SubKind::Pl, self.state.in_tramitacao);
                        self.emit(page, EventKind::Out, Some(label), true, top);
                        self.state.sub_apresentacao = Some(SubKind::Pl);
                    }
                    continue;
                }
                if window_starts_with(&keys, i, REQUERIMENTOS) {
                    if self.state.sub_apresentacao != Some(SubKind::Req) {
                        let label = apresentacao_label(SubKind::Req, self.state.in_tramitacao);
                        self.emit(page, EventKind::Out, Some(label), true, top);
                        self.state.sub_apresentacao = Some(SubKind::Req);
                    }
                    continue;
                }
            }

            // 9. Direct OUT markers.
            if key == OFICIOS {
                self.emit(page, EventKind::Out, Some("OFÍCIOS".to_string()), true, top);
                self.state.clear_context();
                continue;
            }

            // Promulgated laws: latch first, then the page ceiling, and the
            // visible line must be exactly the bare word.
            if !self.state.captured_leis && page <= LEIS_PAGE_CEILING {
                let upper = line.to_uppercase();
                if upper == "LEI" || upper == "LEIS" {
                    self.emit(
                        page,
                        EventKind::Out,
                        Some("LEIS PROMULGADAS".to_string()),
                        true,
                        top,
                    );
                    self.state.captured_leis = true;
                    self.state.clear_context();
                    continue;
                }
            }

            if let Some(label) = direct_out_label(key, self.state.in_tramitacao) {
                self.emit(page, EventKind::Out, Some(label), true, top);
                self.state.clear_context();
                continue;
            }

            // Anything else is inert.
        }
    }

    /// Consume the classifier, returning events ordered by (page, sequence).
    pub fn into_events(mut self) -> Vec<Event> {
        self.events.sort_by_key(|e| (e.page, e.sequence));
        self.events
    }

    fn emit(
        &mut self,
        page: i32,
        kind: EventKind,
        label: Option<String>,
        overlapping: bool,
        is_page_top: bool,
    ) {
        self.sequence += 1;
        self.events.push(Event {
            page,
            sequence: self.sequence,
            kind,
            label,
            overlapping,
            is_page_top,
        });
    }
}

/// The page's own "PÁGINA N" marker, searched in its first lines.
pub fn find_page_marker(lines: &[String]) -> Option<i32> {
    lines.iter().take(PAGE_NUM_SCAN_LINES).find_map(|line| {
        PAGE_NUM_RE
            .captures(line)
            .and_then(|caps| caps[1].parse().ok())
    })
}

/// Printed page number, falling back to the 1-based physical index when the
/// marker is missing or malformed.
pub fn printed_page_number(lines: &[String], fallback: i32) -> i32 {
    find_page_marker(lines).unwrap_or(fallback)
}

fn prefix_tramitacao(label: &str, in_tramitacao: bool) -> String {
    if in_tramitacao {
        format!("TRAMITAÇÃO DE PROPOSIÇÕES: {label}")
    } else {
        label.to_string()
    }
}

fn apresentacao_label(kind: SubKind, in_tramitacao: bool) -> String {
    let base = match kind {
        SubKind::Pl => "APRESENTAÇÃO DE PROPOSIÇÕES: PROJETOS DE LEI",
        SubKind::Req => "APRESENTAÇÃO DE PROPOSIÇÕES: REQUERIMENTOS",
    };
    prefix_tramitacao(base, in_tramitacao)
}

fn direct_out_label(key: &str, in_tramitacao: bool) -> Option<String> {
    let label = match key {
        "MANIFESTACAO" | "MANIFESTACOES" => "MANIFESTAÇÕES",
        "REQUERIMENTOAPROVADO" | "REQUERIMENTOSAPROVADOS" => "REQUERIMENTOS APROVADOS",
        "PROPOSICOESDELEI" => "PROPOSIÇÕES DE LEI",
        "RESOLUCAO" => "RESOLUÇÃO",
        "ERRATA" | "ERRATAS" => "ERRATAS",
        "RECEBIMENTODEEMENDA"
        | "RECEBIMENTODEEMENDASESUBSTITUTIVO"
        | "RECEBIMENTODEEMENDASESUBSTITUTIVOS" => "EMENDAS OU SUBSTITUTIVOS PUBLICADOS",
        "ACORDODELIDERES" => "ACORDO DE LÍDERES",
        "COMUNICACAODAPRESIDENCIA" => {
            return Some(prefix_tramitacao("COMUNICAÇÃO DA PRESIDÊNCIA", in_tramitacao));
        }
        "LEITURADECOMUNICACOES" => "LEITURA DE COMUNICAÇÕES",
        "DESPACHODEREQUERIMENTOS" => "DESPACHO DE REQUERIMENTOS",
        "DECISAODAPRESIDENCIA" => "DECISÃO DA PRESIDÊNCIA",
        "PROPOSICOESNAORECEBIDAS" => "PROPOSIÇÕES NÃO RECEBIDAS",
        _ => return None,
    };
    Some(label.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segmenter::normalize::page_lines;

    fn scan(pages: &[&str]) -> Vec<Event> {
        let mut classifier = Classifier::new();
        for (i, text) in pages.iter().enumerate() {
            let lines = page_lines(text);
            classifier.scan_page(i + 1, &lines);
        }
        classifier.into_events()
    }

    fn out_labels(events: &[Event]) -> Vec<&str> {
        events
            .iter()
            .filter(|e| e.kind == EventKind::Out)
            .map(|e| e.label.as_deref().unwrap())
            .collect()
    }

    #[test]
    fn printed_number_beats_physical_index() {
        let lines = page_lines("DIÁRIO DO LEGISLATIVO\nPÁGINA 17\nATA");
        assert_eq!(printed_page_number(&lines, 3), 17);
    }

    #[test]
    fn missing_marker_falls_back() {
        let lines = page_lines("ATA\ntexto qualquer");
        assert_eq!(printed_page_number(&lines, 7), 7);
    }

    #[test]
    fn hard_cut_resets_context() {
        let events = scan(&["TRAMITAÇÃO DE PROPOSIÇÕES\nAPRESENTAÇÃO DE PROPOSIÇÕES\nATA\nPROJETOS DE LEI"]);
        // The PROJETOS DE LEI after ATA must not produce an OUT: the
        // apresentação context died with the cut.
        assert!(out_labels(&events).is_empty());
        assert_eq!(events.iter().filter(|e| e.kind == EventKind::Cut).count(), 3);
    }

    #[test]
    fn parecer_prefix_is_a_cut() {
        let events = scan(&["PARECER PARA O 1º TURNO DO PROJETO DE LEI Nº 100/2026"]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::Cut);
    }

    #[test]
    fn apresentacao_inside_tramitacao_builds_composite_label() {
        let events = scan(&[
            "TRAMITAÇÃO DE PROPOSIÇÕES\nAPRESENTAÇÃO DE PROPOSIÇÕES\nPROJETOS DE LEI\nPROJETO DE LEI Nº 1/2026",
        ]);
        assert_eq!(
            out_labels(&events),
            vec!["TRAMITAÇÃO DE PROPOSIÇÕES: APRESENTAÇÃO DE PROPOSIÇÕES: PROJETOS DE LEI"]
        );
    }

    #[test]
    fn apresentacao_alone_gets_plain_label() {
        let events = scan(&["APRESENTAÇÃO DE PROPOSIÇÕES\nREQUERIMENTOS\nREQUERIMENTO Nº 5/2026"]);
        assert_eq!(out_labels(&events), vec!["APRESENTAÇÃO DE PROPOSIÇÕES: REQUERIMENTOS"]);
    }

    #[test]
    fn split_title_matches_through_window() {
        let joined = scan(&["APRESENTAÇÃO DE PROPOSIÇÕES\nPROJETOS DE LEI"]);
        let split = scan(&["APRESENTAÇÃO DE PROPOSIÇÕES\nPROJETOS\nDE LEI"]);
        assert_eq!(out_labels(&joined), out_labels(&split));
        assert_eq!(out_labels(&split).len(), 1);
    }

    #[test]
    fn repeated_sub_kind_is_silent() {
        let events = scan(&[
            "APRESENTAÇÃO DE PROPOSIÇÕES\nREQUERIMENTOS",
            "REQUERIMENTOS\nREQUERIMENTOS",
        ]);
        assert_eq!(out_labels(&events).len(), 1);
    }

    #[test]
    fn sub_kind_switch_emits_both() {
        let events = scan(&["APRESENTAÇÃO DE PROPOSIÇÕES\nPROJETOS DE LEI\nREQUERIMENTOS"]);
        assert_eq!(
            out_labels(&events),
            vec![
                "APRESENTAÇÃO DE PROPOSIÇÕES: PROJETOS DE LEI",
                "APRESENTAÇÃO DE PROPOSIÇÕES: REQUERIMENTOS",
            ]
        );
    }

    #[test]
    fn aprovados_absorbed_inside_apresentacao() {
        // While an apresentação is open, REQUERIMENTOS APROVADOS is eaten by
        // the REQ window prefix and must not open its own section.
        let events = scan(&["APRESENTAÇÃO DE PROPOSIÇÕES\nREQUERIMENTOS APROVADOS"]);
        assert_eq!(out_labels(&events), vec!["APRESENTAÇÃO DE PROPOSIÇÕES: REQUERIMENTOS"]);
    }

    #[test]
    fn laws_capture_is_single_shot() {
        let mut classifier = Classifier::new();
        for i in 1..=60 {
            let text = if i == 3 || i == 55 {
                format!("PÁGINA {i}\nLEI")
            } else {
                format!("PÁGINA {i}\ntexto corrido")
            };
            classifier.scan_page(i as usize, &page_lines(&text));
        }
        let events = classifier.into_events();
        let laws: Vec<_> = events
            .iter()
            .filter(|e| e.label.as_deref() == Some("LEIS PROMULGADAS"))
            .collect();
        assert_eq!(laws.len(), 1);
        assert_eq!(laws[0].page, 3);
    }

    #[test]
    fn laws_ignored_past_ceiling() {
        let events = scan(&["PÁGINA 41\nLEIS"]);
        assert!(out_labels(&events).is_empty());
    }

    #[test]
    fn laws_requires_bare_word() {
        // "LEI Nº 25.000" is body text, not the section heading.
        let events = scan(&["LEI Nº 25.000, DE 5 DE JANEIRO DE 2026"]);
        assert!(out_labels(&events).is_empty());
    }

    #[test]
    fn correspondence_needs_its_header() {
        let plain = scan(&["OFÍCIOS"]);
        assert_eq!(out_labels(&plain), vec!["OFÍCIOS"]);

        let with_header = scan(&["CORRESPONDÊNCIA DESPACHADA PELO 1º-SECRETÁRIO\nOFÍCIOS"]);
        assert_eq!(out_labels(&with_header), vec!["CORRESPONDÊNCIA: OFÍCIOS"]);
    }

    #[test]
    fn comunicacao_prefixed_only_inside_tramitacao() {
        let outside = scan(&["COMUNICAÇÃO DA PRESIDÊNCIA"]);
        assert_eq!(out_labels(&outside), vec!["COMUNICAÇÃO DA PRESIDÊNCIA"]);

        let inside = scan(&["TRAMITAÇÃO DE PROPOSIÇÕES\nCOMUNICAÇÃO DA PRESIDÊNCIA"]);
        assert_eq!(
            out_labels(&inside),
            vec!["TRAMITAÇÃO DE PROPOSIÇÕES: COMUNICAÇÃO DA PRESIDÊNCIA"]
        );
    }

    #[test]
    fn direct_out_clears_tramitacao() {
        let events = scan(&["TRAMITAÇÃO DE PROPOSIÇÕES\nERRATAS\nCOMUNICAÇÃO DA PRESIDÊNCIA"]);
        // After ERRATAS the tramitação context is gone, so the second OUT
        // carries no prefix.
        assert_eq!(out_labels(&events), vec!["ERRATAS", "COMUNICAÇÃO DA PRESIDÊNCIA"]);
    }

    #[test]
    fn accents_and_case_are_ignored() {
        let events = scan(&["Requerimentos Aprovados"]);
        assert_eq!(out_labels(&events), vec!["REQUERIMENTOS APROVADOS"]);
    }

    #[test]
    fn inert_lines_leave_no_trace() {
        let events = scan(&["Considerando o disposto no art. 5º\nnada a declarar"]);
        assert!(events.is_empty());
    }

    #[test]
    fn sequence_is_strictly_increasing() {
        let events = scan(&["ATA\nOFÍCIOS\nERRATAS", "MANIFESTAÇÕES\nATA"]);
        let seqs: Vec<u32> = events.iter().map(|e| e.sequence).collect();
        let mut sorted = seqs.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(seqs.len(), sorted.len());
    }

    #[test]
    fn recebimento_closes_apresentacao() {
        let events = scan(&[
            "TRAMITAÇÃO DE PROPOSIÇÕES\nAPRESENTAÇÃO DE PROPOSIÇÕES\nPROJETOS DE LEI\nRECEBIMENTO DE PROPOSIÇÕES\nPROJETOS DE LEI",
        ]);
        // After RECEBIMENTO the apresentação is closed, so the second
        // PROJETOS DE LEI is inert.
        assert_eq!(out_labels(&events).len(), 1);
    }
}
