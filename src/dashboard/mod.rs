//! Dashboard shell: the context object shared by the pages, request
//! dispatch, and the actions the operator can trigger.
//!
//! All state lives on the UI thread inside [`DashboardShell`]. Backend
//! calls run on short-lived worker threads and report back over a channel;
//! [`DashboardShell::drain`] applies the replies. Each operation kind is
//! guarded by a generation counter so a late reply to a superseded request
//! is discarded.
//!
//! - **Context**: cached config, latest stats, languages
//! - **Actions**: reload, restart, execute, save settings
//! - **Polling**: stats refresh while the status page is visible
//! - **Rules / logs**: owns the [`RuleEditor`] and [`LogStreamConsumer`]

pub mod settings;
pub mod status;

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use crate::api::generation::{Generations, Ticket};
use crate::api::{
    ActionAck, ApiError, Backend, CommandOutput, ConfigUpdate, Language, RemoteConfig, Stats,
    StreamEvent,
};
use crate::config::DashConfig;
use crate::logs::LogStreamConsumer;
use crate::logs::notify::NotificationQueue;
use crate::rules::editor::{EditorTicket, LoadOutcome, RuleEditor, SaveOutcome};

use settings::SettingsForm;
use status::StatusView;

// ---------------------------------------------------------------------------
// Context
// ---------------------------------------------------------------------------

/// Page-level state shared by the status view and the settings form.
#[derive(Debug, Clone, Default)]
pub struct DashboardContext {
    pub config: Option<RemoteConfig>,
    pub stats: Option<Stats>,
    pub languages: Vec<Language>,
}

impl DashboardContext {
    pub fn status(&self) -> StatusView {
        StatusView::derive(self.config.as_ref(), self.stats.as_ref())
    }
}

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    FetchConfig,
    FetchStats,
    FetchLanguages,
    SaveSettings,
    Reload,
    Restart,
    Execute,
}

pub type OpTicket = Ticket<Operation>;

/// Replies delivered to the UI thread.
#[derive(Debug)]
pub enum ShellMsg {
    Config(OpTicket, Result<RemoteConfig, ApiError>),
    Stats(OpTicket, Result<Stats, ApiError>),
    Languages(OpTicket, Result<Vec<Language>, ApiError>),
    SettingsSaved(OpTicket, Result<ActionAck, ApiError>),
    Reloaded(OpTicket, Result<ActionAck, ApiError>),
    Restarted(OpTicket, Result<ActionAck, ApiError>),
    Executed(OpTicket, Result<CommandOutput, ApiError>),
    RulesLoaded(EditorTicket, Result<RemoteConfig, ApiError>),
    RulesSaved(EditorTicket, Result<ActionAck, ApiError>),
    Stream(StreamEvent),
}

// ---------------------------------------------------------------------------
// Shell
// ---------------------------------------------------------------------------

pub struct DashboardShell {
    backend: Arc<dyn Backend>,
    tx: Sender<ShellMsg>,
    rx: Receiver<ShellMsg>,
    generations: Generations<Operation>,
    in_flight: usize,
    poll_interval: Duration,
    last_poll: Option<Instant>,
    stream_started: bool,

    pub context: DashboardContext,
    pub editor: RuleEditor,
    pub logs: LogStreamConsumer,
    pub toasts: NotificationQueue,
    pub settings: SettingsForm,
    pub command_output: Option<String>,
}

impl DashboardShell {
    pub fn new(backend: Arc<dyn Backend>, config: &DashConfig) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            backend,
            tx,
            rx,
            generations: Generations::new(),
            in_flight: 0,
            poll_interval: Duration::from_secs(config.dashboard.poll_interval_secs.max(1)),
            last_poll: None,
            stream_started: false,
            context: DashboardContext::default(),
            editor: RuleEditor::new(),
            logs: LogStreamConsumer::new(config.logs.buffer_lines),
            toasts: NotificationQueue::new(config.notifications.max_visible),
            settings: SettingsForm::default(),
            command_output: None,
        }
    }

    /// Issue the initial requests for every page and open the log feed.
    pub fn start(&mut self, now: Instant) {
        self.refresh_dashboard(now);
        self.request_languages();
        self.load_rules();
        self.start_log_stream();
    }

    /// Number of requests started but not yet applied (the log feed is not
    /// counted).
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    fn spawn<F>(&mut self, job: F)
    where
        F: FnOnce(&dyn Backend) -> ShellMsg + Send + 'static,
    {
        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        self.in_flight += 1;
        thread::spawn(move || {
            let _ = tx.send(job(backend.as_ref()));
        });
    }

    // -- Requests --

    pub fn request_config(&mut self) {
        let ticket = self.generations.begin(Operation::FetchConfig);
        self.spawn(move |b| ShellMsg::Config(ticket, b.fetch_config()));
    }

    pub fn request_stats(&mut self, now: Instant) {
        self.last_poll = Some(now);
        let ticket = self.generations.begin(Operation::FetchStats);
        self.spawn(move |b| ShellMsg::Stats(ticket, b.fetch_stats()));
    }

    pub fn request_languages(&mut self) {
        let ticket = self.generations.begin(Operation::FetchLanguages);
        self.spawn(move |b| ShellMsg::Languages(ticket, b.fetch_languages()));
    }

    /// Refetch config and stats for the status page.
    pub fn refresh_dashboard(&mut self, now: Instant) {
        self.request_config();
        self.request_stats(now);
    }

    pub fn reload_service(&mut self) {
        let ticket = self.generations.begin(Operation::Reload);
        self.spawn(move |b| ShellMsg::Reloaded(ticket, b.reload()));
    }

    pub fn restart_service(&mut self) {
        let ticket = self.generations.begin(Operation::Restart);
        self.spawn(move |b| ShellMsg::Restarted(ticket, b.restart()));
    }

    /// Run an ad-hoc command. Blank input is ignored.
    pub fn execute(&mut self, command: &str) -> bool {
        let command = command.trim().to_string();
        if command.is_empty() {
            return false;
        }
        tracing::info!(command = %command, "executing command");
        let ticket = self.generations.begin(Operation::Execute);
        self.spawn(move |b| ShellMsg::Executed(ticket, b.execute(&command)));
        true
    }

    /// Validate and submit the settings form. Returns `false` when local
    /// validation failed (errors stay on the form).
    pub fn save_settings(&mut self, now: Instant) -> bool {
        let basic = match self.settings.validate() {
            Ok(basic) => basic,
            Err(errors) => {
                if let Some(first) = errors.first() {
                    self.toasts.error(first.to_string(), now);
                }
                return false;
            }
        };
        let update = ConfigUpdate {
            basic: Some(basic),
            ..Default::default()
        };
        let ticket = self.generations.begin(Operation::SaveSettings);
        self.spawn(move |b| ShellMsg::SettingsSaved(ticket, b.update_config(&update)));
        true
    }

    pub fn load_rules(&mut self) {
        let ticket = self.editor.begin_load();
        self.spawn(move |b| ShellMsg::RulesLoaded(ticket, b.fetch_config()));
    }

    pub fn save_rules(&mut self) {
        let (ticket, update) = self.editor.begin_save();
        self.spawn(move |b| ShellMsg::RulesSaved(ticket, b.update_config(&update)));
    }

    /// Open the log feed on a dedicated thread. Only the first call has an
    /// effect; a closed feed is not reopened.
    pub fn start_log_stream(&mut self) {
        if self.stream_started {
            return;
        }
        self.stream_started = true;

        let backend = Arc::clone(&self.backend);
        let tx = self.tx.clone();
        thread::spawn(move || {
            let stream = match backend.open_log_stream() {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = tx.send(ShellMsg::Stream(StreamEvent::Closed(Some(e.to_string()))));
                    return;
                }
            };
            tracing::info!("log stream opened");
            for event in stream {
                if tx.send(ShellMsg::Stream(event)).is_err() {
                    break;
                }
            }
        });
    }

    // -- Time --

    /// Expire toasts and poll stats when due.
    pub fn tick(&mut self, now: Instant, dashboard_visible: bool) {
        self.toasts.expire(now);
        if !dashboard_visible {
            return;
        }
        let due = self
            .last_poll
            .is_none_or(|last| now.saturating_duration_since(last) >= self.poll_interval);
        if due {
            self.request_stats(now);
        }
    }

    // -- Replies --

    /// Apply every reply that has already arrived. Returns how many.
    pub fn drain(&mut self, now: Instant) -> usize {
        let mut applied = 0;
        while let Ok(msg) = self.rx.try_recv() {
            self.handle(msg, now);
            applied += 1;
        }
        applied
    }

    /// Block until every started request has been applied or `timeout`
    /// elapses. Returns `true` when idle.
    pub fn wait_idle(&mut self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.rx.recv_timeout(remaining) {
                Ok(msg) => self.handle(msg, Instant::now()),
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return false;
                }
            }
        }
        true
    }

    fn is_current(&self, ticket: &OpTicket) -> bool {
        let current = self.generations.is_current(ticket);
        if !current {
            tracing::debug!(op = ?ticket.op, generation = ticket.generation, "dropping stale response");
        }
        current
    }

    pub fn handle(&mut self, msg: ShellMsg, now: Instant) {
        if !matches!(msg, ShellMsg::Stream(_)) {
            self.in_flight = self.in_flight.saturating_sub(1);
        }

        match msg {
            ShellMsg::Config(ticket, result) => {
                if !self.is_current(&ticket) {
                    return;
                }
                match result {
                    Ok(config) => {
                        self.settings = SettingsForm::from_basic(&config.basic);
                        self.context.config = Some(config);
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to fetch config");
                        self.toasts.error("Error loading configuration", now);
                    }
                }
            }
            ShellMsg::Stats(ticket, result) => {
                if !self.is_current(&ticket) {
                    return;
                }
                match result {
                    Ok(stats) => self.context.stats = Some(stats),
                    Err(e) => tracing::debug!(error = %e, "stats poll failed"),
                }
            }
            ShellMsg::Languages(ticket, result) => {
                if !self.is_current(&ticket) {
                    return;
                }
                match result {
                    Ok(languages) => self.context.languages = languages,
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to fetch languages");
                        self.context.languages.clear();
                        self.toasts.error("Error loading languages", now);
                    }
                }
            }
            ShellMsg::SettingsSaved(ticket, result) => {
                if !self.is_current(&ticket) {
                    return;
                }
                match result {
                    Ok(_) => {
                        self.toasts.info("Configuration saved", now);
                        self.request_config();
                    }
                    Err(e) => self.toasts.error(e.to_string(), now),
                }
            }
            ShellMsg::Reloaded(ticket, result) => {
                if !self.is_current(&ticket) {
                    return;
                }
                self.finish_action(result, "Configuration reloaded", now);
            }
            ShellMsg::Restarted(ticket, result) => {
                if !self.is_current(&ticket) {
                    return;
                }
                self.finish_action(result, "Service restarted", now);
            }
            ShellMsg::Executed(ticket, result) => {
                if !self.is_current(&ticket) {
                    return;
                }
                match result {
                    Ok(out) => self.command_output = Some(out.output),
                    Err(e) => {
                        if let Some(details) = e.details() {
                            self.command_output = Some(details.to_string());
                        }
                        self.toasts.error(e.to_string(), now);
                    }
                }
            }
            ShellMsg::RulesLoaded(ticket, result) => {
                if let LoadOutcome::Failed(message) = self.editor.finish_load(ticket, result) {
                    self.toasts.error(format!("Error loading rules: {message}"), now);
                }
            }
            ShellMsg::RulesSaved(ticket, result) => match self.editor.finish_save(ticket, result) {
                SaveOutcome::Saved => {
                    self.toasts.info("Rules saved", now);
                    self.load_rules();
                }
                SaveOutcome::Failed(message) => self.toasts.error(message, now),
                SaveOutcome::Stale => {}
            },
            ShellMsg::Stream(event) => self.logs.handle(event, &mut self.toasts, now),
        }
    }

    fn finish_action(&mut self, result: Result<ActionAck, ApiError>, success: &str, now: Instant) {
        match result {
            Ok(_) => {
                self.toasts.info(success, now);
                self.refresh_dashboard(now);
            }
            Err(e) => {
                tracing::warn!(error = %e, "service action failed");
                self.toasts.error(e.to_string(), now);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
