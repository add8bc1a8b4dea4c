use crate::sections::ViewSections;
use std::collections::HashMap;

pub const DEFAULT_EXPANDED: [&str; 5] = ["PINNED", "ASSIGNED TO ME", "OPEN", "INBOX", "PRIVATE"];

/// Which roster sections are expanded.
///
/// Sections without an explicit state are collapsed; they expand on their own the
/// first time they show unread messages. In exclusive mode (the embedded widget,
/// where vertical space is scarce) toggling a section collapses every other one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionExpansion {
    state: HashMap<String, bool>,
    exclusive: bool,
}

impl SectionExpansion {
    pub fn new(exclusive: bool) -> Self {
        Self {
            state: DEFAULT_EXPANDED
                .iter()
                .map(|id| (id.to_string(), true))
                .collect(),
            exclusive,
        }
    }

    pub fn is_expanded(&self, section_id: &str) -> bool {
        self.state.get(section_id).copied().unwrap_or(false)
    }

    pub fn toggle(&mut self, section_id: &str) {
        let next = !self.is_expanded(section_id);
        if self.exclusive {
            for expanded in self.state.values_mut() {
                *expanded = false;
            }
        }
        self.state.insert(section_id.to_string(), next);
    }

    /// Expands `section_id` and forgets every other section's state.
    pub fn solo(&mut self, section_id: &str) {
        self.state.clear();
        self.state.insert(section_id.to_string(), true);
    }

    /// Expands sections that have unread messages and no explicit state yet.
    /// Returns whether anything changed.
    pub fn auto_expand(&mut self, sections: &ViewSections) -> bool {
        let mut changed = false;
        for section in sections.iter() {
            if section.info.unread_count > 0 && !self.state.contains_key(section.id()) {
                self.state.insert(section.id().to_string(), true);
                changed = true;
            }
        }
        changed
    }
}

impl Default for SectionExpansion {
    fn default() -> Self {
        Self::new(false)
    }
}
