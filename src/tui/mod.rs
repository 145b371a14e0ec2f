//! Terminal dashboard.
//!
//! Five pages in a tab bar, each a projection of [`DashboardShell`] state:
//! - **Dashboard**: protection status, counters, reload/restart
//! - **Config**: basic settings form
//! - **Rules**: protected-path and command-rule tables
//! - **Logs**: live log feed with pause/clear
//! - **Tools**: ad-hoc command runner
//!
//! Key handling lives on [`App`]; drawing lives in [`render`].

mod render;

use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal, backend::CrosstermBackend};

use crate::api::Backend;
use crate::config::DashConfig;
use crate::dashboard::DashboardShell;
use crate::dashboard::settings::SettingKey;
use crate::rules::{ConfirmOutcome, DraftField, RowId, RuleKind, RuleTable};

pub use render::draw;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Config,
    Rules,
    Logs,
    Tools,
}

impl Page {
    pub const ALL: [Page; 5] = [
        Self::Dashboard,
        Self::Config,
        Self::Rules,
        Self::Logs,
        Self::Tools,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Self::Dashboard => "Dashboard",
            Self::Config => "Config",
            Self::Rules => "Rules",
            Self::Logs => "Logs",
            Self::Tools => "Tools",
        }
    }

    pub fn index(self) -> usize {
        Self::ALL.iter().position(|p| *p == self).unwrap_or(0)
    }
}

/// Terminal UI state on top of the shell.
pub struct App {
    pub shell: DashboardShell,
    pub page: Page,
    pub should_quit: bool,

    // Rules page
    pub rules_focus: RuleKind,
    path_selected: usize,
    command_selected: usize,
    pub command_field: DraftField,

    // Config page
    pub settings_selected: usize,
    pub settings_editing: Option<String>,

    // Tools page
    pub command_input: String,
}

impl App {
    pub fn new(shell: DashboardShell) -> Self {
        Self {
            shell,
            page: Page::Dashboard,
            should_quit: false,
            rules_focus: RuleKind::Path,
            path_selected: 0,
            command_selected: 0,
            command_field: DraftField::Original,
            settings_selected: 0,
            settings_editing: None,
            command_input: String::new(),
        }
    }

    // -- Rules selection --

    /// Selected row index in a table, clamped to its current length.
    pub fn selected(&self, kind: RuleKind) -> usize {
        let raw = match kind {
            RuleKind::Path => self.path_selected,
            RuleKind::Command => self.command_selected,
        };
        raw.min(self.shell.editor.table(kind).len().saturating_sub(1))
    }

    fn set_selected(&mut self, kind: RuleKind, index: usize) {
        let max = self.shell.editor.table(kind).len().saturating_sub(1);
        let index = index.min(max);
        match kind {
            RuleKind::Path => self.path_selected = index,
            RuleKind::Command => self.command_selected = index,
        }
    }

    fn focused_table(&self) -> &RuleTable {
        self.shell.editor.table(self.rules_focus)
    }

    fn selected_row_id(&self) -> Option<RowId> {
        let index = self.selected(self.rules_focus);
        self.focused_table().rows().get(index).map(|r| r.id())
    }

    fn draft_selected(&self) -> bool {
        let index = self.selected(self.rules_focus);
        self.focused_table()
            .rows()
            .get(index)
            .is_some_and(|r| r.is_draft())
    }

    /// Field of the focused draft row that receives typed characters.
    pub fn active_draft_field(&self) -> DraftField {
        match self.rules_focus {
            RuleKind::Path => DraftField::Path,
            RuleKind::Command => self.command_field,
        }
    }

    /// Whether typed characters go into a text field right now.
    pub fn text_input_active(&self) -> bool {
        match self.page {
            Page::Rules => self.draft_selected(),
            Page::Config => self.settings_editing.is_some(),
            Page::Tools => true,
            _ => false,
        }
    }

    // -- Keys --

    pub fn on_key(&mut self, key: KeyEvent, now: Instant) {
        let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

        if ctrl && key.code == KeyCode::Char('c') {
            self.should_quit = true;
            return;
        }
        if let KeyCode::F(n) = key.code
            && (1..=5).contains(&n)
        {
            self.page = Page::ALL[usize::from(n - 1)];
            return;
        }
        if !self.text_input_active() {
            match key.code {
                KeyCode::Char('q') => {
                    self.should_quit = true;
                    return;
                }
                KeyCode::Char(c @ '1'..='5') => {
                    let index = c as usize - '1' as usize;
                    self.page = Page::ALL[index];
                    return;
                }
                _ => {}
            }
        }

        match self.page {
            Page::Dashboard => self.on_dashboard_key(key, now),
            Page::Config => self.on_config_key(key, ctrl, now),
            Page::Rules => self.on_rules_key(key, ctrl),
            Page::Logs => self.on_logs_key(key),
            Page::Tools => self.on_tools_key(key),
        }
    }

    fn on_dashboard_key(&mut self, key: KeyEvent, now: Instant) {
        match key.code {
            KeyCode::Char('r') => self.shell.reload_service(),
            KeyCode::Char('R') => self.shell.restart_service(),
            KeyCode::Char('u') => self.shell.refresh_dashboard(now),
            _ => {}
        }
    }

    fn on_config_key(&mut self, key: KeyEvent, ctrl: bool, now: Instant) {
        let setting = SettingKey::ALL[self.settings_selected.min(SettingKey::ALL.len() - 1)];

        if let Some(buffer) = self.settings_editing.as_mut() {
            match key.code {
                KeyCode::Enter => {
                    let value = std::mem::take(buffer);
                    self.shell.settings.set(setting, value);
                    self.settings_editing = None;
                }
                KeyCode::Esc => self.settings_editing = None,
                KeyCode::Backspace => {
                    buffer.pop();
                }
                KeyCode::Char(c) if !ctrl => buffer.push(c),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::Char('s') if ctrl => {
                self.shell.save_settings(now);
            }
            KeyCode::Up => self.settings_selected = self.settings_selected.saturating_sub(1),
            KeyCode::Down => {
                self.settings_selected = (self.settings_selected + 1).min(SettingKey::ALL.len() - 1)
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                if setting.is_text() {
                    self.settings_editing = Some(self.shell.settings.get(setting).to_string());
                } else {
                    let languages = self.shell.context.languages.clone();
                    self.shell.settings.cycle(setting, &languages);
                }
            }
            _ => {}
        }
    }

    fn on_rules_key(&mut self, key: KeyEvent, ctrl: bool) {
        let kind = self.rules_focus;
        let index = self.selected(kind);

        if ctrl {
            match key.code {
                KeyCode::Char('s') => self.shell.save_rules(),
                KeyCode::Char('r') => self.shell.load_rules(),
                _ => {}
            }
            return;
        }

        match key.code {
            KeyCode::BackTab => {
                self.rules_focus = match kind {
                    RuleKind::Path => RuleKind::Command,
                    RuleKind::Command => RuleKind::Path,
                };
            }
            KeyCode::Up => self.set_selected(kind, index.saturating_sub(1)),
            KeyCode::Down => self.set_selected(kind, index + 1),
            KeyCode::End => self.set_selected(kind, usize::MAX),
            _ if self.draft_selected() => self.on_draft_key(key),
            KeyCode::Delete | KeyCode::Char('d') => {
                if let Some(id) = self.selected_row_id() {
                    self.shell.editor.table_mut(kind).remove(id);
                    self.set_selected(kind, index);
                }
            }
            KeyCode::Enter => self.set_selected(kind, usize::MAX),
            _ => {}
        }
    }

    fn on_draft_key(&mut self, key: KeyEvent) {
        let kind = self.rules_focus;
        let field = self.active_draft_field();
        let table = self.shell.editor.table_mut(kind);

        match key.code {
            KeyCode::Tab if kind == RuleKind::Command => {
                self.command_field = match self.command_field {
                    DraftField::Original => DraftField::Replacement,
                    _ => DraftField::Original,
                };
            }
            KeyCode::Char(c) => {
                let mut value = table.draft_field(field).to_string();
                value.push(c);
                table.set_draft_field(field, value);
            }
            KeyCode::Backspace => {
                let mut value = table.draft_field(field).to_string();
                value.pop();
                table.set_draft_field(field, value);
            }
            KeyCode::Enter => {
                if table.confirm_draft() == ConfirmOutcome::Confirmed {
                    self.command_field = DraftField::Original;
                    self.set_selected(kind, usize::MAX);
                }
            }
            _ => {}
        }
    }

    fn on_logs_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('p') => self.shell.logs.toggle_pause(),
            KeyCode::Char('c') => self.shell.logs.clear(),
            _ => {}
        }
    }

    fn on_tools_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Enter => {
                let command = self.command_input.clone();
                self.shell.execute(&command);
            }
            KeyCode::Esc => self.command_input.clear(),
            KeyCode::Backspace => {
                self.command_input.pop();
            }
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.command_input.push(c)
            }
            _ => {}
        }
    }
}

// ---------------------------------------------------------------------------
// Event loop
// ---------------------------------------------------------------------------

/// Run the dashboard until the operator quits.
///
/// Redraws every 100 ms, applies backend replies and stream events as they
/// arrive, and polls stats while the dashboard page is visible.
pub fn run(backend: Arc<dyn Backend>, config: &DashConfig) -> Result<()> {
    let mut shell = DashboardShell::new(backend, config);
    shell.start(Instant::now());
    let mut app = App::new(shell);

    enable_raw_mode().context("failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen).context("failed to enter alternate screen")?;
    let mut terminal =
        Terminal::new(CrosstermBackend::new(stdout)).context("failed to create terminal")?;

    let result = event_loop(&mut terminal, &mut app);

    // Restore even when the loop failed.
    disable_raw_mode().ok();
    execute!(terminal.backend_mut(), LeaveAlternateScreen).ok();
    terminal.show_cursor().ok();
    result
}

fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    loop {
        let now = Instant::now();
        terminal.draw(|f| draw(f, app, now))?;

        if event::poll(Duration::from_millis(100))?
            && let Event::Key(key) = event::read()?
            && key.kind == KeyEventKind::Press
        {
            app.on_key(key, Instant::now());
        }

        let now = Instant::now();
        app.shell.drain(now);
        app.shell.tick(now, app.page == Page::Dashboard);

        if app.should_quit {
            return Ok(());
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
