//! Splits a timeline into chart pages.

use crate::model::{ObservationType, Reading, Slot, TimelineEntry};

/// Reading slots on one chart page.
pub const PAGE_LENGTH: usize = 12;

/// One chart page worth of columns and the scoring scheme it is drawn with.
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub entries: Vec<TimelineEntry>,
    /// Empty when no entry on the page names a scheme.
    pub score_system: String,
}

impl Page {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_meows(&self) -> bool {
        self.score_system == "meows"
    }

    pub fn dates(&self) -> Vec<Option<Slot<String>>> {
        self.entries.iter().map(TimelineEntry::date).collect()
    }

    pub fn times(&self) -> Vec<Option<Slot<String>>> {
        self.entries.iter().map(TimelineEntry::time).collect()
    }

    pub fn bp(&self) -> Vec<(Slot<f64>, Slot<f64>)> {
        self.entries.iter().map(TimelineEntry::bp).collect()
    }

    pub fn temperature(&self) -> Vec<Slot<Reading>> {
        self.entries
            .iter()
            .map(|entry| entry.reading(ObservationType::Temperature))
            .collect()
    }

    pub fn spo2_scales(&self) -> Vec<Option<u8>> {
        self.entries.iter().map(TimelineEntry::spo2_scale).collect()
    }
}

/// Close a page at [`PAGE_LENGTH`] entries, or as soon as an entry names a different
/// scheme from the one already established. The entry that changes scheme opens the
/// next page.
pub fn paginate(timeline: Vec<TimelineEntry>) -> Vec<Page> {
    let mut pages = Vec::with_capacity(timeline.len() / PAGE_LENGTH + 1);
    let mut current: Vec<TimelineEntry> = Vec::with_capacity(PAGE_LENGTH);
    let mut established = String::new();

    for entry in timeline {
        let label = entry.score_system();
        if !label.is_empty() && !established.is_empty() && label != established && !current.is_empty() {
            pages.push(Page {
                entries: std::mem::take(&mut current),
                score_system: established.clone(),
            });
        }
        if !label.is_empty() {
            established = label.to_string();
        }

        current.push(entry);
        if current.len() == PAGE_LENGTH {
            pages.push(Page {
                entries: std::mem::take(&mut current),
                score_system: established.clone(),
            });
        }
    }

    if !current.is_empty() {
        pages.push(Page {
            entries: current,
            score_system: established,
        });
    }
    pages
}
