//! Domain entities
//!
//! Typed row shapes for the three sheet tabs, their identities, and the
//! partial updates (patches) the engine produces. Conversion from the
//! stringly-typed external sheet happens at the store boundary; inside the
//! engine every row is one of these variants.

use std::fmt;

use serde::{Deserialize, Serialize};

/// One logical table within the external sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tab {
    Sources,
    Leads,
    Searches,
}

impl Tab {
    /// All tabs the engine mirrors.
    #[must_use]
    pub const fn all() -> [Tab; 3] {
        [Tab::Sources, Tab::Leads, Tab::Searches]
    }

    /// Sheet tab name as it appears in the external store.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Tab::Sources => "sources",
            Tab::Leads => "leads",
            Tab::Searches => "searches",
        }
    }
}

impl fmt::Display for Tab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stable row identity within a tab.
///
/// Rows are keyed by their natural key: URL for sources, link for leads,
/// query text for searches. Identifiers are unique within a tab.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RowId(String);

impl RowId {
    /// Creates a row identifier from a natural key.
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the underlying key.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RowId {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

/// Processing state of a source row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStatus {
    #[default]
    New,
    Checked,
}

/// Processing state of a search row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchStatus {
    #[default]
    New,
    Completed,
}

/// A lead source: a page that may list organizations worth contacting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRow {
    pub title: String,
    pub url: String,
    pub description: String,
    pub date_found: String,
    pub status: SourceStatus,
    pub leads_found: u32,
}

/// A single organization to contact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeadRow {
    pub org_name: String,
    pub link: String,
    pub phone: String,
    pub email: String,
    pub notes: String,
    pub checked: bool,
    pub emailed: bool,
}

/// A recorded search query and its completion state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRow {
    pub date: String,
    pub query: String,
    pub returns: SearchStatus,
}

/// A row from any tab, tagged by shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tab", rename_all = "snake_case")]
pub enum SheetRow {
    Source(SourceRow),
    Lead(LeadRow),
    Search(SearchRow),
}

impl SheetRow {
    /// The tab this row belongs to.
    #[must_use]
    pub fn tab(&self) -> Tab {
        match self {
            SheetRow::Source(_) => Tab::Sources,
            SheetRow::Lead(_) => Tab::Leads,
            SheetRow::Search(_) => Tab::Searches,
        }
    }

    /// Natural-key identity of this row.
    #[must_use]
    pub fn id(&self) -> RowId {
        match self {
            SheetRow::Source(s) => RowId::new(s.url.clone()),
            SheetRow::Lead(l) => RowId::new(l.link.clone()),
            SheetRow::Search(s) => RowId::new(s.query.clone()),
        }
    }

    /// Whether the engine already finished this row for its operation.
    ///
    /// Done flags are monotonic: the engine never reverts them.
    #[must_use]
    pub fn is_done(&self) -> bool {
        match self {
            SheetRow::Source(s) => s.status == SourceStatus::Checked,
            SheetRow::Lead(l) => l.checked,
            SheetRow::Search(s) => s.returns == SearchStatus::Completed,
        }
    }

    /// Applies a partial update onto this row.
    ///
    /// Application is idempotent and respects two rules: done flags never
    /// revert, and an absent or empty value in the patch never clears a
    /// non-empty cell (operator-entered data wins over a blank
    /// extraction).
    pub fn apply(&mut self, patch: &FieldPatch) {
        match (self, patch) {
            (SheetRow::Source(row), FieldPatch::Source(p)) => row.apply(p),
            (SheetRow::Lead(row), FieldPatch::Lead(p)) => row.apply(p),
            (SheetRow::Search(row), FieldPatch::Search(p)) => row.apply(p),
            (row, patch) => {
                tracing::warn!(
                    tab = %row.tab(),
                    "ignoring patch of mismatched shape: {patch:?}"
                );
            }
        }
    }
}

/// Partial update for a source row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourcePatch {
    pub title: Option<String>,
    pub status: Option<SourceStatus>,
    pub leads_found: Option<u32>,
    /// Marker appended to the description, e.g. an error note.
    pub annotation: Option<String>,
}

/// Partial update for a lead row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LeadPatch {
    pub phone: Option<String>,
    pub email: Option<String>,
    pub notes: Option<String>,
    pub checked: Option<bool>,
    pub emailed: Option<bool>,
    /// Marker appended to the notes, e.g. an error note.
    pub annotation: Option<String>,
}

/// Partial update for a search row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchPatch {
    pub returns: Option<SearchStatus>,
}

/// A partial update for a row of any tab.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "tab", rename_all = "snake_case")]
pub enum FieldPatch {
    Source(SourcePatch),
    Lead(LeadPatch),
    Search(SearchPatch),
}

impl SourceRow {
    fn apply(&mut self, patch: &SourcePatch) {
        if let Some(title) = non_empty(&patch.title) {
            self.title = title.to_string();
        }
        if patch.status == Some(SourceStatus::Checked) {
            self.status = SourceStatus::Checked;
        }
        if let Some(count) = patch.leads_found {
            self.leads_found = count;
        }
        if let Some(note) = non_empty(&patch.annotation) {
            append_annotation(&mut self.description, note);
        }
    }
}

impl LeadRow {
    fn apply(&mut self, patch: &LeadPatch) {
        if let Some(phone) = non_empty(&patch.phone) {
            self.phone = phone.to_string();
        }
        if let Some(email) = non_empty(&patch.email) {
            self.email = email.to_string();
        }
        if let Some(notes) = non_empty(&patch.notes) {
            self.notes = notes.to_string();
        }
        if patch.checked == Some(true) {
            self.checked = true;
        }
        if patch.emailed == Some(true) {
            self.emailed = true;
        }
        if let Some(note) = non_empty(&patch.annotation) {
            append_annotation(&mut self.notes, note);
        }
    }
}

impl SearchRow {
    fn apply(&mut self, patch: &SearchPatch) {
        if patch.returns == Some(SearchStatus::Completed) {
            self.returns = SearchStatus::Completed;
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

/// Appends `[note]` to a free-text cell, once.
///
/// The containment check keeps repeated application of the same patch from
/// growing the cell, preserving mark-dirty idempotence.
fn append_annotation(cell: &mut String, note: &str) {
    let marker = format!("[{note}]");
    if cell.contains(&marker) {
        return;
    }
    if cell.is_empty() {
        *cell = marker;
    } else {
        *cell = format!("{cell} {marker}");
    }
}

/// Scheme-less, `www.`-less host used to deduplicate leads and sources.
///
/// Two URLs pointing at the same organization's site almost always share a
/// base domain even when paths and schemes differ.
#[must_use]
pub fn base_domain(url: &str) -> String {
    let trimmed = url
        .trim()
        .trim_start_matches("https://")
        .trim_start_matches("http://");
    let host = trimmed.split(['/', '?', '#']).next().unwrap_or(trimmed);
    host.trim_start_matches("www.").to_ascii_lowercase()
}
