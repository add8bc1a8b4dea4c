//! What a roster list shows for a section: rows, placeholders, titles, empty states.

use crate::schema::{EventBadge, EventRoom};
use crate::sections::RosterSection;
use std::fmt;
use std::ops::Range;

/// Sections shown even when empty, so agents waiting for new triage keep a stable
/// layout. Every other section hides at `count == 0`.
pub const ALWAYS_VISIBLE_SECTIONS: [&str; 2] = ["OPEN", "INBOX"];

pub fn is_section_visible(section: &RosterSection) -> bool {
    ALWAYS_VISIBLE_SECTIONS.contains(&section.id()) || section.count() > 0
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Row<'a> {
    Room {
        index: usize,
        room: &'a EventRoom,
        badge: Option<&'a EventBadge>,
    },
    /// Position counted by the server but not loaded yet.
    Loading(usize),
}

impl fmt::Display for Row<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Row::Room { room, .. } => f.write_str(&room.name),
            Row::Loading(index) => write!(f, "Loading... {index}"),
        }
    }
}

/// Rows for a viewport range, clamped to the section's claimed count. Server order
/// is kept as-is.
pub fn visible_rows(section: &RosterSection, range: Range<usize>) -> Vec<Row<'_>> {
    let end = range.end.min(section.count());
    (range.start.min(end)..end)
        .map(|index| match section.row(index) {
            Some(entry) => Row::Room {
                index,
                room: &entry.room,
                badge: entry.badge.as_ref(),
            },
            None => Row::Loading(index),
        })
        .collect()
}

pub fn empty_state(searching: bool) -> &'static str {
    if searching { "No matches" } else { "No issues" }
}

pub fn section_title(section: &RosterSection, is_agent: bool) -> String {
    if section.info.entity_type.as_deref() == Some("TAG") {
        if let Some(entity) = &section.info.entity {
            if !entity.name.is_empty() {
                return entity.name.clone();
            }
        }
        return format!("Unknown: {}", section.id());
    }

    let title = match section.id() {
        "OPEN" => "Unassigned",
        "INBOX" => "Team support",
        "PRIVATE" if is_agent => "Private conversations",
        "PRIVATE" => "Private",
        "PINNED" => "Pinned",
        "ASSIGNED TO ME" => "Assigned to me",
        "ASSIGNED" => "Assigned",
        "DIRECT" => "Direct",
        "ARCHIVED" => "Archived",
        "CLOSED" => "Closed",
        "INTERNAL" => "Internal",
        "NEW" => "New customers",
        "NEW VISITOR" => "New visitors",
        other => return format!("Unknown: {other}"),
    };
    title.to_string()
}

/// Unread indicator for a section header: unread rooms first, then mentions, and a
/// plain dot when only one of the two is known to be non-zero.
pub fn section_unread_total(section: &RosterSection) -> Option<u32> {
    let info = &section.info;
    if info.unread_count == 0 && info.mentions_count == 0 {
        return None;
    }
    Some(if info.unread_count > 0 {
        info.unread_count
    } else {
        info.mentions_count
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EventRosterRoom, EventRosterSection, RosterEvent, SectionEntity};
    use crate::sections::RosterSections;

    fn roster_with(count: usize, rows: &[(usize, &str)]) -> RosterSections {
        let mut items = vec![RosterEvent::Section(EventRosterSection {
            id: "OPEN".into(),
            view: "main".into(),
            count,
            ..Default::default()
        })];
        for (pos, id) in rows {
            items.push(RosterEvent::Room(EventRosterRoom {
                view: "main".into(),
                room: EventRoom {
                    id: id.to_string(),
                    name: id.to_uppercase(),
                    ..Default::default()
                },
                badge: None,
                sections: [("OPEN".to_string(), *pos)].into_iter().collect(),
            }));
        }
        let mut roster = RosterSections::default();
        roster.reset_view("main", &items);
        roster
    }

    #[test]
    fn holes_render_as_loading_placeholders() {
        let roster = roster_with(4, &[(1, "a"), (3, "c")]);
        let section = roster.section("main", "OPEN").unwrap();
        let rendered: Vec<String> = visible_rows(section, 0..10)
            .iter()
            .map(ToString::to_string)
            .collect();
        assert_eq!(rendered, vec!["A", "Loading... 1", "C", "Loading... 3"]);
    }

    #[test]
    fn empty_open_section_stays_visible() {
        let roster = roster_with(0, &[]);
        assert!(is_section_visible(roster.section("main", "OPEN").unwrap()));

        let mut pinned = roster.section("main", "OPEN").unwrap().clone();
        pinned.info.id = "PINNED".into();
        assert!(!is_section_visible(&pinned));
    }

    #[test]
    fn titles_cover_tags_and_unknown_ids() {
        let roster = roster_with(0, &[]);
        let mut section = roster.section("main", "OPEN").unwrap().clone();
        assert_eq!(section_title(&section, true), "Unassigned");

        section.info.id = "PRIVATE".into();
        assert_eq!(section_title(&section, true), "Private conversations");
        assert_eq!(section_title(&section, false), "Private");

        section.info.id = "TAG:t1".into();
        section.info.entity_type = Some("TAG".into());
        section.info.entity = Some(SectionEntity {
            id: "t1".into(),
            name: "billing".into(),
        });
        assert_eq!(section_title(&section, true), "billing");

        section.info.entity_type = None;
        section.info.id = "MYSTERY".into();
        assert_eq!(section_title(&section, true), "Unknown: MYSTERY");
    }

    #[test]
    fn empty_state_depends_on_search() {
        assert_eq!(empty_state(true), "No matches");
        assert_eq!(empty_state(false), "No issues");
    }
}
