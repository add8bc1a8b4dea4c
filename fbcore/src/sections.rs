//! Roster section state and the reducer that folds roster items into it.
//!
//! State is organized per view. Within a view, sections are ordered by their
//! server-assigned `pos`; within a section, rows sit at their server-assigned
//! position and unloaded positions are holes (`None`).
//!
//! Every section keeps `rooms.len() <= count`: rows are never materialized past the
//! total the server claims for the section.

use crate::schema::{EventRosterRoom, EventRosterSection, RosterEvent};
use log::debug;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterSection {
    pub info: EventRosterSection,
    pub rooms: Vec<Option<EventRosterRoom>>,
}

impl RosterSection {
    fn new(info: EventRosterSection) -> Self {
        Self {
            info,
            rooms: Vec::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.info.id
    }

    pub fn view(&self) -> &str {
        &self.info.view
    }

    /// Total rows the server claims.
    pub fn count(&self) -> usize {
        self.info.count
    }

    /// Rows loaded before the first hole. The next page starts right after them.
    pub fn materialized_len(&self) -> usize {
        self.rooms.iter().take_while(|r| r.is_some()).count()
    }

    /// Every loaded row, holes or not.
    pub fn loaded(&self) -> usize {
        self.rooms.iter().filter(|r| r.is_some()).count()
    }

    pub fn row(&self, index: usize) -> Option<&EventRosterRoom> {
        self.rooms.get(index).and_then(Option::as_ref)
    }

    fn position_of(&self, room_id: &str) -> Option<usize> {
        self.rooms
            .iter()
            .position(|r| matches!(r, Some(r) if r.room.id == room_id))
    }

    fn remove_room(&mut self, room_id: &str) -> bool {
        match self.position_of(room_id) {
            Some(index) => {
                self.rooms.remove(index);
                self.trim();
                true
            }
            None => false,
        }
    }

    fn place_room(&mut self, index: usize, room: EventRosterRoom) {
        self.remove_room(&room.room.id);
        if matches!(self.rooms.get(index), Some(Some(_))) {
            self.rooms.insert(index, Some(room));
        } else {
            if self.rooms.len() <= index {
                self.rooms.resize(index + 1, None);
            }
            self.rooms[index] = Some(room);
        }
        // A row past the claimed total means the section grew before its count update
        // reached us.
        if self.rooms.len() > self.info.count {
            self.info.count = self.rooms.len();
        }
    }

    fn update_info(&mut self, info: EventRosterSection) {
        self.info = info;
        self.rooms.truncate(self.info.count);
        self.trim();
    }

    fn trim(&mut self) {
        while matches!(self.rooms.last(), Some(None)) {
            self.rooms.pop();
        }
    }
}

/// Sections of one view, ordered by `pos`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewSections {
    sections: Vec<RosterSection>,
}

impl ViewSections {
    pub fn iter(&self) -> impl Iterator<Item = &RosterSection> {
        self.sections.iter()
    }

    pub fn get(&self, section_id: &str) -> Option<&RosterSection> {
        self.sections.iter().find(|s| s.id() == section_id)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    fn entry(&mut self, section_id: &str, view: &str) -> &mut RosterSection {
        let index = match self.sections.iter().position(|s| s.id() == section_id) {
            Some(index) => index,
            None => {
                self.sections
                    .push(RosterSection::new(EventRosterSection::placeholder(section_id, view)));
                self.sections.len() - 1
            }
        };
        &mut self.sections[index]
    }

    /// Returns whether the section moved and the view needs re-sorting.
    fn upsert_section(&mut self, info: EventRosterSection) -> bool {
        match self.sections.iter_mut().find(|s| s.id() == info.id) {
            Some(section) => {
                let moved = section.info.pos != info.pos;
                section.update_info(info);
                moved
            }
            None => {
                self.sections.push(RosterSection::new(info));
                true
            }
        }
    }

    fn place_room(&mut self, room: &EventRosterRoom) {
        for (section_id, &pos) in &room.sections {
            let index = pos.saturating_sub(1);
            self.entry(section_id, &room.view)
                .place_room(index, room.clone());
        }
    }

    /// Drops the room from every section it no longer belongs to.
    fn evict_room(&mut self, room: &EventRosterRoom) {
        for section in &mut self.sections {
            if !room.sections.contains_key(section.id()) {
                section.remove_room(&room.room.id);
            }
        }
    }

    fn apply(&mut self, items: &[RosterEvent]) {
        let mut needs_sort = false;
        for item in items {
            match item {
                RosterEvent::Section(info) => {
                    needs_sort |= self.upsert_section(info.clone());
                }
                RosterEvent::Room(room) => self.place_room(room),
            }
        }
        if needs_sort {
            self.sections.sort_by_key(|s| s.info.pos);
        }
    }

    /// Customers listed by a `CUSTOMER` entity view, most recently active first.
    pub fn customers(&self) -> Vec<CustomerEntry> {
        let mut entries: Vec<(i64, CustomerEntry)> = self
            .sections
            .iter()
            .filter(|s| s.info.entity_type.as_deref() == Some("CUSTOMER"))
            .filter_map(|s| {
                let entity = s.info.entity.as_ref()?;
                let last_ts = s
                    .rooms
                    .iter()
                    .flatten()
                    .filter_map(|r| r.room.last_message.as_ref().map(|m| m.created_ts))
                    .max()
                    .unwrap_or(0);
                Some((
                    last_ts,
                    CustomerEntry {
                        id: entity.id.clone(),
                        name: entity.name.clone(),
                    },
                ))
            })
            .collect();
        entries.sort_by(|a, b| b.0.cmp(&a.0));
        entries.into_iter().map(|(_, entry)| entry).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerEntry {
    pub id: String,
    pub name: String,
}

/// All views the client currently tracks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RosterSections {
    views: BTreeMap<String, ViewSections>,
}

impl RosterSections {
    pub fn view(&self, view: &str) -> Option<&ViewSections> {
        self.views.get(view)
    }

    pub fn section(&self, view: &str, section_id: &str) -> Option<&RosterSection> {
        self.views.get(view)?.get(section_id)
    }

    pub fn views(&self) -> impl Iterator<Item = &str> {
        self.views.keys().map(String::as_str)
    }

    pub fn has_view(&self, view: &str) -> bool {
        self.views.contains_key(view)
    }

    /// Replaces whatever was held under `view` with a fresh snapshot.
    pub fn reset_view(&mut self, view: &str, items: &[RosterEvent]) {
        let mut sections = ViewSections::default();
        sections.apply(items);
        self.views.insert(view.to_string(), sections);
    }

    pub fn remove_view(&mut self, view: &str) -> bool {
        self.views.remove(view).is_some()
    }

    /// Folds page results or pushed updates into their views. Items for views that
    /// are not tracked (never opened, or already closed) are dropped.
    ///
    /// Returns how many items were applied.
    pub fn apply(&mut self, items: &[RosterEvent]) -> usize {
        let mut applied = 0;
        let mut by_view: BTreeMap<&str, Vec<RosterEvent>> = BTreeMap::new();
        for item in items {
            by_view.entry(item.view()).or_default().push(item.clone());
        }
        for (view, items) in by_view {
            match self.views.get_mut(view) {
                Some(sections) => {
                    sections.apply(&items);
                    applied += items.len();
                }
                None => debug!(
                    target: "Roster/Store",
                    "Dropping {} item(s) for untracked view {view}",
                    items.len()
                ),
            }
        }
        applied
    }

    /// A pushed room update: besides placing it, removes it from the sections of its
    /// view it has left.
    pub fn apply_room_event(&mut self, room: &EventRosterRoom) -> bool {
        match self.views.get_mut(&room.view) {
            Some(sections) => {
                sections.evict_room(room);
                sections.place_room(room);
                true
            }
            None => false,
        }
    }

    /// Finds a room's roster entry in any tracked view.
    pub fn room(&self, room_id: &str) -> Option<&EventRosterRoom> {
        self.views
            .values()
            .flat_map(|v| v.iter())
            .flat_map(|s| s.rooms.iter().flatten())
            .find(|r| r.room.id == room_id)
    }
}
