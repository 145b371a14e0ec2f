//! Editable rule tables for protected paths and command rewrites.
//!
//! A [`RuleTable`] owns an ordered sequence of [`RuleRow`]s of one
//! [`RuleKind`]. Rows are either `Confirmed` (committed content, immutable)
//! or the single trailing `Draft` row the operator types into. The table is
//! the single source of truth; renderers only project it.
//!
//! The backend stores both lists as arrays of strings. Command rules are
//! encoded as `"<original> > <replacement>"`, with an empty replacement
//! written as `"<original> >"`.

pub mod editor;

use std::fmt;

// ---------------------------------------------------------------------------
// Rule kinds and fields
// ---------------------------------------------------------------------------

/// Which backend list a table mirrors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    Path,
    Command,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path => write!(f, "protected paths"),
            Self::Command => write!(f, "command rules"),
        }
    }
}

/// Content of a single rule row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleFields {
    Path { path: String },
    Command { original: String, replacement: String },
}

impl RuleFields {
    /// Empty fields for a fresh draft of the given kind.
    pub fn empty(kind: RuleKind) -> Self {
        match kind {
            RuleKind::Path => Self::Path {
                path: String::new(),
            },
            RuleKind::Command => Self::Command {
                original: String::new(),
                replacement: String::new(),
            },
        }
    }

    pub fn kind(&self) -> RuleKind {
        match self {
            Self::Path { .. } => RuleKind::Path,
            Self::Command { .. } => RuleKind::Command,
        }
    }

    /// The field that must be non-empty for the row to be committed.
    pub fn primary(&self) -> &str {
        match self {
            Self::Path { path } => path,
            Self::Command { original, .. } => original,
        }
    }

    /// Parse one backend entry. Returns `None` for entries whose primary
    /// field is blank after trimming.
    pub fn decode(kind: RuleKind, entry: &str) -> Option<Self> {
        let entry = entry.trim();
        if entry.is_empty() {
            return None;
        }

        let fields = match kind {
            RuleKind::Path => Self::Path {
                path: entry.to_string(),
            },
            RuleKind::Command => {
                let (original, replacement) = split_command_rule(entry);
                Self::Command {
                    original: original.to_string(),
                    replacement: replacement.to_string(),
                }
            }
        };

        if fields.primary().is_empty() {
            return None;
        }
        Some(fields)
    }

    /// Encode into the backend string representation.
    pub fn encode(&self) -> String {
        match self {
            Self::Path { path } => path.trim().to_string(),
            Self::Command {
                original,
                replacement,
            } => {
                let replacement = replacement.trim();
                if replacement.is_empty() {
                    format!("{} >", original.trim())
                } else {
                    format!("{} > {}", original.trim(), replacement)
                }
            }
        }
    }
}

/// Split a command rule on its first `>`, trimming both sides.
///
/// An entry without `>` is treated as an original with no replacement.
pub fn split_command_rule(entry: &str) -> (&str, &str) {
    match entry.split_once('>') {
        Some((original, replacement)) => (original.trim(), replacement.trim()),
        None => (entry.trim(), ""),
    }
}

// ---------------------------------------------------------------------------
// Rows
// ---------------------------------------------------------------------------

/// Lifecycle state of a row. Removal ends the lifecycle; it is not a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowState {
    Draft,
    Confirmed,
}

/// Stable identity of a row within its table. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RowId(u64);

/// One editable field of a draft row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DraftField {
    Path,
    Original,
    Replacement,
}

/// Field-level validation failure shown inline at the row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    EmptyPath,
    EmptyOriginal,
    /// The stored form splits on the first `>`, so an original can't hold one.
    ArrowInOriginal,
}

impl FieldError {
    pub fn field(self) -> DraftField {
        match self {
            Self::EmptyPath => DraftField::Path,
            Self::EmptyOriginal | Self::ArrowInOriginal => DraftField::Original,
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyPath => write!(f, "path is required"),
            Self::EmptyOriginal => write!(f, "original command is required"),
            Self::ArrowInOriginal => write!(f, "original command cannot contain '>'"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleRow {
    id: RowId,
    fields: RuleFields,
    state: RowState,
    ordinal: usize,
    error: Option<FieldError>,
}

impl RuleRow {
    pub fn id(&self) -> RowId {
        self.id
    }

    pub fn kind(&self) -> RuleKind {
        self.fields.kind()
    }

    pub fn fields(&self) -> &RuleFields {
        &self.fields
    }

    pub fn state(&self) -> RowState {
        self.state
    }

    pub fn is_draft(&self) -> bool {
        self.state == RowState::Draft
    }

    /// 1-based display position.
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    /// Validation indicator left by the last failed confirm, if any.
    pub fn error(&self) -> Option<FieldError> {
        self.error
    }

    fn validate(&self) -> Result<(), FieldError> {
        match &self.fields {
            RuleFields::Path { path } if path.trim().is_empty() => Err(FieldError::EmptyPath),
            RuleFields::Command { original, .. } if original.trim().is_empty() => {
                Err(FieldError::EmptyOriginal)
            }
            RuleFields::Command { original, .. } if original.contains('>') => {
                Err(FieldError::ArrowInOriginal)
            }
            _ => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// Table
// ---------------------------------------------------------------------------

/// Result of [`RuleTable::confirm`]. Failures are local and leave the table
/// as it was (apart from the validation indicator).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    Confirmed,
    Invalid(FieldError),
    NotDraft,
    Missing,
}

/// Ordered rule rows for one kind, with exactly one trailing draft row.
#[derive(Debug, Clone)]
pub struct RuleTable {
    kind: RuleKind,
    rows: Vec<RuleRow>,
    next_id: u64,
}

impl RuleTable {
    /// An editable table holding only the draft row.
    pub fn new(kind: RuleKind) -> Self {
        let mut table = Self {
            kind,
            rows: Vec::new(),
            next_id: 0,
        };
        table.ensure_draft();
        table.renumber();
        table
    }

    pub fn kind(&self) -> RuleKind {
        self.kind
    }

    pub fn rows(&self) -> &[RuleRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, id: RowId) -> Option<&RuleRow> {
        self.rows.iter().find(|r| r.id == id)
    }

    /// Row at a 1-based ordinal.
    pub fn row_at(&self, ordinal: usize) -> Option<&RuleRow> {
        ordinal.checked_sub(1).and_then(|i| self.rows.get(i))
    }

    pub fn draft(&self) -> Option<&RuleRow> {
        self.rows.iter().find(|r| r.is_draft())
    }

    pub fn confirmed(&self) -> impl Iterator<Item = &RuleRow> {
        self.rows.iter().filter(|r| !r.is_draft())
    }

    /// Replace all rows with one confirmed row per usable entry, followed
    /// by a fresh draft row. Blank entries are dropped; duplicates are kept.
    pub fn populate<S: AsRef<str>>(&mut self, entries: &[S]) {
        self.rows.clear();
        for entry in entries {
            if let Some(fields) = RuleFields::decode(self.kind, entry.as_ref()) {
                let row = self.make_row(fields, RowState::Confirmed);
                self.rows.push(row);
            }
        }
        self.ensure_draft();
        self.renumber();
    }

    /// Set one field of the draft row. Ignored when the field does not
    /// belong to this table's kind. Clears the validation indicator when
    /// the edited field is the one that failed.
    pub fn set_draft_field(&mut self, field: DraftField, value: impl Into<String>) {
        let Some(row) = self.rows.iter_mut().find(|r| r.is_draft()) else {
            return;
        };
        let slot = match (&mut row.fields, field) {
            (RuleFields::Path { path }, DraftField::Path) => path,
            (RuleFields::Command { original, .. }, DraftField::Original) => original,
            (RuleFields::Command { replacement, .. }, DraftField::Replacement) => replacement,
            _ => return,
        };
        *slot = value.into();
        if row.error.is_some_and(|e| e.field() == field) {
            row.error = None;
        }
    }

    /// Current value of a draft field, or `""` if the field does not apply.
    pub fn draft_field(&self, field: DraftField) -> &str {
        let Some(row) = self.draft() else {
            return "";
        };
        match (&row.fields, field) {
            (RuleFields::Path { path }, DraftField::Path) => path,
            (RuleFields::Command { original, .. }, DraftField::Original) => original,
            (RuleFields::Command { replacement, .. }, DraftField::Replacement) => replacement,
            _ => "",
        }
    }

    /// Commit a draft row. On validation failure the row keeps its state
    /// and gains an error indicator.
    pub fn confirm(&mut self, id: RowId) -> ConfirmOutcome {
        let Some(row) = self.rows.iter_mut().find(|r| r.id == id) else {
            return ConfirmOutcome::Missing;
        };
        if !row.is_draft() {
            return ConfirmOutcome::NotDraft;
        }
        if let Err(err) = row.validate() {
            row.error = Some(err);
            return ConfirmOutcome::Invalid(err);
        }

        row.fields = match &row.fields {
            RuleFields::Path { path } => RuleFields::Path {
                path: path.trim().to_string(),
            },
            RuleFields::Command {
                original,
                replacement,
            } => RuleFields::Command {
                original: original.trim().to_string(),
                replacement: replacement.trim().to_string(),
            },
        };
        row.state = RowState::Confirmed;
        row.error = None;

        self.ensure_draft();
        self.renumber();
        ConfirmOutcome::Confirmed
    }

    /// Confirm whichever row is currently the draft.
    pub fn confirm_draft(&mut self) -> ConfirmOutcome {
        match self.draft().map(RuleRow::id) {
            Some(id) => self.confirm(id),
            None => ConfirmOutcome::Missing,
        }
    }

    /// Delete a confirmed row. Returns `false` (and changes nothing) for the
    /// draft row or a row that no longer exists.
    pub fn remove(&mut self, id: RowId) -> bool {
        let Some(index) = self.rows.iter().position(|r| r.id == id) else {
            return false;
        };
        if self.rows[index].is_draft() {
            return false;
        }
        self.rows.remove(index);
        self.ensure_draft();
        self.renumber();
        true
    }

    /// Backend representation: one string per confirmed row, in order.
    pub fn export(&self) -> Vec<String> {
        self.confirmed()
            .filter(|r| !r.fields.primary().trim().is_empty())
            .map(|r| r.fields.encode())
            .collect()
    }

    // -- Internal --

    fn make_row(&mut self, fields: RuleFields, state: RowState) -> RuleRow {
        let id = RowId(self.next_id);
        self.next_id += 1;
        RuleRow {
            id,
            fields,
            state,
            ordinal: 0,
            error: None,
        }
    }

    fn ensure_draft(&mut self) {
        if self.rows.iter().any(|r| r.is_draft()) {
            return;
        }
        let row = self.make_row(RuleFields::empty(self.kind), RowState::Draft);
        self.rows.push(row);
    }

    fn renumber(&mut self) {
        for (i, row) in self.rows.iter_mut().enumerate() {
            row.ordinal = i + 1;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
