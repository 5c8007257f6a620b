use super::classifier::{Event, EventKind};

/// A resolved section: the label plus the physical page span it occupies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionInterval {
    pub start_page: i32,
    pub end_page: i32,
    pub label: String,
}

impl SectionInterval {
    /// Two-column row shape consumed by the publisher: "3" or "3 - 7".
    pub fn page_range(&self) -> String {
        if self.start_page == self.end_page {
            format!("{}", self.start_page)
        } else {
            format!("{} - {}", self.start_page, self.end_page)
        }
    }
}

/// Close each OUT event against the event that follows it.
///
/// `events` must already be sorted by (page, sequence). A section normally
/// ends on the page before the next boundary; it claims the boundary's own
/// page only when the section is the overlapping kind and the boundary is
/// not at its page's top. The final section runs to the end of the document.
pub fn resolve(events: &[Event], total_pages: i32) -> Vec<SectionInterval> {
    let mut intervals = Vec::new();

    for (idx, event) in events.iter().enumerate() {
        if event.kind != EventKind::Out {
            continue;
        }
        let label = match &event.label {
            Some(l) => l.clone(),
            None => continue,
        };
        let start_page = event.page;

        let mut end_page = match events.get(idx + 1) {
            None => total_pages,
            Some(next) if next.page == start_page => start_page,
            Some(next) if next.is_page_top => next.page - 1,
            Some(next) if event.overlapping => next.page,
            Some(next) => next.page - 1,
        };
        if end_page < start_page {
            end_page = start_page;
        }

        intervals.push(SectionInterval {
            start_page,
            end_page,
            label,
        });
    }

    intervals
}
