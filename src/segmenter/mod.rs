pub mod classifier;
pub mod intervals;
pub mod normalize;
pub mod page_top;

use classifier::Classifier;
pub use classifier::{Event, EventKind};
pub use intervals::SectionInterval;

/// Raw text of one physical page, 1-based index as delivered by extraction.
pub struct PageText {
    pub page_index: usize,
    pub text: String,
}

/// Three-pass pipeline: page text → cleaned lines → event stream → page
/// intervals. Pages must be in physical order; context carries across them.
pub fn segment_document(pages: &[PageText]) -> Vec<SectionInterval> {
    let events = scan_events(pages);
    intervals::resolve(&events, pages.len() as i32)
}

/// Classification only, exposed for diagnostics and tests.
pub fn scan_events(pages: &[PageText]) -> Vec<Event> {
    let mut classifier = Classifier::new();
    for page in pages {
        let lines = normalize::page_lines(&page.text);
        classifier.scan_page(page.page_index, &lines);
    }
    classifier.into_events()
}
