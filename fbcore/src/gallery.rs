//! Registry backing the fullscreen file carousel.
//!
//! Every rendered file preview registers itself under `(room, message)`. Several
//! previews of the same message may be mounted at once, so registrations are
//! counted per element and a message leaves the gallery only when its last element
//! unregisters.

use std::collections::{BTreeMap, BTreeSet};

pub type ElementId = u64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryPosition {
    pub room_id: String,
    /// Message ids of the room, sorted.
    pub ids: Vec<String>,
    pub index: usize,
}

#[derive(Debug, Default)]
pub struct FileGallery {
    files: BTreeMap<String, BTreeMap<String, BTreeSet<ElementId>>>,
    showing: Option<String>,
    next_element: ElementId,
}

impl FileGallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a preview element; the returned id is needed to unregister it.
    pub fn register(&mut self, room_id: &str, message_id: &str) -> ElementId {
        let element = self.next_element;
        self.next_element += 1;
        self.files
            .entry(room_id.to_string())
            .or_default()
            .entry(message_id.to_string())
            .or_default()
            .insert(element);
        element
    }

    pub fn unregister(&mut self, room_id: &str, message_id: &str, element: ElementId) {
        let Some(messages) = self.files.get_mut(room_id) else {
            return;
        };
        if let Some(elements) = messages.get_mut(message_id) {
            elements.remove(&element);
            if elements.is_empty() {
                messages.remove(message_id);
            }
        }
        if messages.is_empty() {
            self.files.remove(room_id);
        }
    }

    pub fn show(&mut self, message_id: &str) {
        self.showing = Some(message_id.to_string());
    }

    pub fn hide(&mut self) {
        self.showing = None;
    }

    pub fn showing(&self) -> Option<&str> {
        self.showing.as_deref()
    }

    /// Where the shown file sits in its room's carousel. `None` when nothing is shown
    /// or the shown file is no longer registered.
    pub fn position(&self) -> Option<GalleryPosition> {
        let showing = self.showing.as_deref()?;
        self.files.iter().find_map(|(room_id, messages)| {
            let ids: Vec<String> = messages.keys().cloned().collect();
            let index = ids.iter().position(|id| id == showing)?;
            Some(GalleryPosition {
                room_id: room_id.clone(),
                ids,
                index,
            })
        })
    }

    pub fn next(&mut self) -> bool {
        self.step(1)
    }

    pub fn prev(&mut self) -> bool {
        self.step(-1)
    }

    fn step(&mut self, delta: isize) -> bool {
        let Some(position) = self.position() else {
            return false;
        };
        let Some(target) = position.index.checked_add_signed(delta) else {
            return false;
        };
        match position.ids.get(target) {
            Some(id) => {
                self.showing = Some(id.clone());
                true
            }
            None => false,
        }
    }
}
