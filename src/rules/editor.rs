//! Rule editor: the protected-path and command-rule tables plus the
//! load/save round trip against the backend config.
//!
//! Load and save are split into a `begin_*` half (taken on the UI thread
//! before the request goes out) and a `finish_*` half (applied when the
//! response comes back). Responses whose ticket has been superseded are
//! ignored. [`RuleEditor::load`] and [`RuleEditor::save`] run both halves
//! synchronously for callers that can block.
use crate::api::generation::{Generations, Ticket};
use crate::api::{ApiError, Backend, ConfigUpdate, RemoteConfig};

use super::{RuleKind, RuleTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorOp {
    Load,
    Save,
}

pub type EditorTicket = Ticket<EditorOp>;

/// Outcome of applying a save response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Persisted; the caller should reload to pick up what the backend stored.
    Saved,
    /// Rejected; tables untouched, message shown to the operator.
    Failed(String),
    /// A newer save was started; this response was dropped.
    Stale,
}

/// Outcome of applying a load response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed(String),
    Stale,
}

#[derive(Debug, Clone)]
pub struct RuleEditor {
    pub paths: RuleTable,
    pub commands: RuleTable,
    load_error: Option<String>,
    save_error: Option<String>,
    generations: Generations<EditorOp>,
}

impl Default for RuleEditor {
    fn default() -> Self {
        Self::new()
    }
}

impl RuleEditor {
    pub fn new() -> Self {
        Self {
            paths: RuleTable::new(RuleKind::Path),
            commands: RuleTable::new(RuleKind::Command),
            load_error: None,
            save_error: None,
            generations: Generations::new(),
        }
    }

    pub fn table(&self, kind: RuleKind) -> &RuleTable {
        match kind {
            RuleKind::Path => &self.paths,
            RuleKind::Command => &self.commands,
        }
    }

    pub fn table_mut(&mut self, kind: RuleKind) -> &mut RuleTable {
        match kind {
            RuleKind::Path => &mut self.paths,
            RuleKind::Command => &mut self.commands,
        }
    }

    /// Error from the most recent load, if it failed.
    pub fn load_error(&self) -> Option<&str> {
        self.load_error.as_deref()
    }

    /// Error from the most recent save, if it failed.
    pub fn save_error(&self) -> Option<&str> {
        self.save_error.as_deref()
    }

    // -- Load --

    pub fn begin_load(&mut self) -> EditorTicket {
        self.generations.begin(EditorOp::Load)
    }

    /// Apply a fetched config. On failure the tables are left as they were
    /// so the operator can keep adding rules.
    pub fn finish_load(
        &mut self,
        ticket: EditorTicket,
        result: Result<RemoteConfig, ApiError>,
    ) -> LoadOutcome {
        if !self.generations.is_current(&ticket) {
            tracing::debug!(generation = ticket.generation, "dropping stale rules load");
            return LoadOutcome::Stale;
        }

        match result {
            Ok(config) => {
                self.apply_config(&config);
                self.load_error = None;
                LoadOutcome::Loaded
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to load rules");
                let message = e.to_string();
                self.load_error = Some(message.clone());
                LoadOutcome::Failed(message)
            }
        }
    }

    /// Populate both tables from a config snapshot.
    pub fn apply_config(&mut self, config: &RemoteConfig) {
        self.paths.populate(&config.protected_paths);
        self.commands.populate(&config.command_rules);
    }

    // -- Save --

    /// Start a save: export both tables into an update body.
    pub fn begin_save(&mut self) -> (EditorTicket, ConfigUpdate) {
        let ticket = self.generations.begin(EditorOp::Save);
        let update = ConfigUpdate {
            basic: None,
            protected_paths: Some(self.paths.export()),
            command_rules: Some(self.commands.export()),
        };
        (ticket, update)
    }

    /// Apply a save response. Table contents are never modified here.
    pub fn finish_save<T>(
        &mut self,
        ticket: EditorTicket,
        result: Result<T, ApiError>,
    ) -> SaveOutcome {
        if !self.generations.is_current(&ticket) {
            tracing::debug!(generation = ticket.generation, "dropping stale rules save");
            return SaveOutcome::Stale;
        }

        match result {
            Ok(_) => {
                self.save_error = None;
                tracing::info!(
                    paths = self.paths.export().len(),
                    commands = self.commands.export().len(),
                    "rules saved"
                );
                SaveOutcome::Saved
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to save rules");
                let message = e.to_string();
                self.save_error = Some(message.clone());
                SaveOutcome::Failed(message)
            }
        }
    }

    // -- Blocking helpers --

    pub fn load(&mut self, backend: &dyn Backend) -> LoadOutcome {
        let ticket = self.begin_load();
        let result = backend.fetch_config();
        self.finish_load(ticket, result)
    }

    /// Save, then reload so the tables reflect what the backend persisted.
    pub fn save(&mut self, backend: &dyn Backend) -> SaveOutcome {
        let (ticket, update) = self.begin_save();
        let result = backend.update_config(&update);
        let outcome = self.finish_save(ticket, result);
        if outcome == SaveOutcome::Saved {
            self.load(backend);
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::DraftField;

    fn config(paths: &[&str], rules: &[&str]) -> RemoteConfig {
        RemoteConfig {
            protected_paths: paths.iter().map(|s| s.to_string()).collect(),
            command_rules: rules.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    #[test]
    fn load_populates_both_tables() {
        let mut editor = RuleEditor::new();
        let ticket = editor.begin_load();
        let outcome = editor.finish_load(ticket, Ok(config(&["/etc"], &["rm > echo"])));
        assert_eq!(outcome, LoadOutcome::Loaded);
        assert_eq!(editor.paths.export(), vec!["/etc"]);
        assert_eq!(editor.commands.export(), vec!["rm > echo"]);
        assert!(editor.paths.draft().is_some());
    }

    #[test]
    fn failed_load_keeps_tables_editable() {
        let mut editor = RuleEditor::new();
        let ticket = editor.begin_load();
        let outcome = editor.finish_load(ticket, Err(ApiError::Transport("refused".into())));
        assert!(matches!(outcome, LoadOutcome::Failed(_)));
        assert!(editor.load_error().is_some());
        assert_eq!(editor.paths.len(), 1);
        assert!(editor.paths.draft().is_some());
    }

    #[test]
    fn stale_load_is_dropped() {
        let mut editor = RuleEditor::new();
        let old = editor.begin_load();
        let new = editor.begin_load();
        editor.finish_load(new, Ok(config(&["/new"], &[])));
        let outcome = editor.finish_load(old, Ok(config(&["/old"], &[])));
        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(editor.paths.export(), vec!["/new"]);
    }

    #[test]
    fn begin_save_exports_confirmed_rows_only() {
        let mut editor = RuleEditor::new();
        editor.apply_config(&config(&["/etc"], &["a > b"]));
        editor.paths.set_draft_field(DraftField::Path, "/unconfirmed");
        let (_, update) = editor.begin_save();
        assert_eq!(update.protected_paths, Some(vec!["/etc".to_string()]));
        assert_eq!(update.command_rules, Some(vec!["a > b".to_string()]));
        assert_eq!(update.basic, None);
    }

    #[test]
    fn failed_save_leaves_rows_untouched() {
        let mut editor = RuleEditor::new();
        editor.apply_config(&config(&["/etc", "/root"], &["x >"]));
        editor.paths.set_draft_field(DraftField::Path, "/pending");
        let before = editor.paths.rows().to_vec();

        let (ticket, _) = editor.begin_save();
        let outcome = editor.finish_save::<()>(
            ticket,
            Err(ApiError::Status {
                code: 500,
                message: "disk full".into(),
                details: None,
            }),
        );

        assert_eq!(outcome, SaveOutcome::Failed("disk full".into()));
        assert_eq!(editor.save_error(), Some("disk full"));
        assert_eq!(editor.paths.rows(), before.as_slice());
    }

    #[test]
    fn superseded_save_is_stale() {
        let mut editor = RuleEditor::new();
        let (first, _) = editor.begin_save();
        let (second, _) = editor.begin_save();
        assert_eq!(editor.finish_save(first, Ok(())), SaveOutcome::Stale);
        assert_eq!(editor.finish_save(second, Ok(())), SaveOutcome::Saved);
    }
}
