//! Roster view descriptors.
//!
//! A view is a named server-side subscription. Its descriptor must be stable for as
//! long as the consumer's inputs are unchanged: a different descriptor is treated as
//! a different subscription and costs a close/open round trip.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Sections materialized when a consumer does not ask for specific ones.
pub const DEFAULT_SECTIONS: [&str; 8] = [
    "ARCHIVED",
    "PINNED",
    "NEW VISITOR",
    "NEW",
    "ASSIGNED TO ME",
    "ASSIGNED",
    "DIRECT",
    "*OPEN",
];

pub const FOLDER_SECTIONS: [&str; 9] = [
    "NEW VISITOR",
    "NEW",
    "CLOSED",
    "ARCHIVED",
    "?PINNED",
    "ASSIGNED TO ME",
    "ASSIGNED",
    "DIRECT",
    "*OPEN",
];

pub const FOLDER_PAGE_LIMIT: u32 = 10;
pub const FOLDER_VIEW_PREFIX: &str = "customer_rooms_";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub focused: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ViewOptions {
    pub view: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sections: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filters: Option<ViewFilters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ViewOptions {
    pub fn new(view: impl Into<String>) -> Self {
        Self {
            view: view.into(),
            sections: None,
            filters: None,
            limit: None,
        }
    }

    /// The main roster. Focus mode gets its own view id so both can stay open.
    pub fn roster(focused: bool) -> Self {
        Self {
            filters: Some(ViewFilters {
                customer_ids: None,
                focused: Some(true),
            }),
            ..Self::new(if focused { "focused" } else { "main" })
        }
    }

    /// The customer list, one entity section per customer.
    pub fn customers() -> Self {
        Self {
            sections: Some(vec!["CUSTOMER".to_string()]),
            ..Self::new("customers")
        }
    }

    pub fn with_sections<I, S>(mut self, sections: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sections = Some(sections.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Fills in [`DEFAULT_SECTIONS`] when the consumer left sections unset.
    pub fn with_default_sections(mut self) -> Self {
        if self.sections.is_none() {
            self.sections = Some(DEFAULT_SECTIONS.iter().map(|s| s.to_string()).collect());
        }
        self
    }

    /// Cache key for the open-view result: the full serialized descriptor.
    pub fn cache_key(&self) -> String {
        // Only strings, bools and integers; serialization cannot fail.
        serde_json::to_string(self).unwrap_or_else(|_| self.view.clone())
    }
}

/// Builds the customer-filtered folder view.
///
/// Each distinct `(customer set, focus)` combination gets a fresh
/// `customer_rooms_<n>` id; repeated calls with the same inputs return the cached
/// descriptor unchanged.
#[derive(Debug, Default)]
pub struct FolderViewOptions {
    next_key: u64,
    last: Option<(BTreeSet<String>, bool, ViewOptions)>,
}

impl FolderViewOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn options<'a, I>(&mut self, customer_ids: I, focused: bool) -> &ViewOptions
    where
        I: IntoIterator<Item = &'a str>,
    {
        let ids: BTreeSet<String> = customer_ids.into_iter().map(str::to_string).collect();

        let entry = match self.last.take() {
            Some(last) if last.0 == ids && last.1 == focused => last,
            _ => {
                let view = format!("{FOLDER_VIEW_PREFIX}{}", self.next_key);
                self.next_key += 1;
                let options = ViewOptions {
                    filters: Some(ViewFilters {
                        customer_ids: Some(ids.iter().cloned().collect()),
                        focused: Some(focused),
                    }),
                    ..ViewOptions::new(view)
                        .with_sections(FOLDER_SECTIONS)
                        .with_limit(FOLDER_PAGE_LIMIT)
                };
                (ids, focused, options)
            }
        };

        &self.last.insert(entry).2
    }
}

/// Visibility marker a section id may carry in a view request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionVisibility {
    /// `*` prefix: materialized by default.
    Default,
    /// `?` prefix: only when it has rows.
    Optional,
    Normal,
}

/// Splits the visibility prefix off a requested section id.
pub fn parse_section_request(raw: &str) -> (SectionVisibility, &str) {
    if let Some(id) = raw.strip_prefix('*') {
        (SectionVisibility::Default, id)
    } else if let Some(id) = raw.strip_prefix('?') {
        (SectionVisibility::Optional, id)
    } else {
        (SectionVisibility::Normal, raw)
    }
}
