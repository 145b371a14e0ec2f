//! Non-interactive command implementations.
//!
//! - `dpdash status`: protection status and counters
//! - `dpdash rules ...`: list or edit protected paths and command rules
//! - `dpdash reload | restart`: service actions
//! - `dpdash exec ...`: run a command on the backend host
//! - `dpdash logs`: follow the live log feed
//! - `dpdash languages`: UI languages offered by the backend
//! - `dpdash config show|init|path`: client configuration management

use anyhow::{Result, bail};
use colored::Colorize;

use crate::api::{Backend, StreamEvent};
use crate::config::{self, DashConfig};
use crate::dashboard::status::{Protection, StatusView};
use crate::rules::editor::{LoadOutcome, RuleEditor, SaveOutcome};
use crate::rules::{ConfirmOutcome, DraftField, RuleFields, RuleKind, RuleTable};

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Table,
    Json,
}

impl OutputFormat {
    pub fn from_str_opt(s: Option<&str>) -> Self {
        match s {
            Some("json") => Self::Json,
            _ => Self::Table,
        }
    }
}

// ---------------------------------------------------------------------------
// dpdash status
// ---------------------------------------------------------------------------

/// Show protection status. A failed stats fetch is not fatal.
pub fn run_status(backend: &dyn Backend, format: OutputFormat) -> Result<()> {
    let config = backend.fetch_config()?;
    let stats = match backend.fetch_stats() {
        Ok(stats) => Some(stats),
        Err(e) => {
            tracing::warn!(error = %e, "stats unavailable");
            None
        }
    };
    let view = StatusView::derive(Some(&config), stats.as_ref());

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "status": view.status_text,
                "active": view.protection == Protection::Active,
                "last_updated": view.last_updated,
                "automatic_updates": view.update_mode,
                "protection_mode": view.protection_mode,
                "expiration": view.expiration.as_ref().map(|e| &e.text),
                "protection_count": view.protection_count,
                "basic": config.basic,
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => print_status_table(&view),
    }
    Ok(())
}

fn print_status_table(view: &StatusView) {
    println!("{}", "Deeprotection Status".bold().cyan());
    println!("{}", "=".repeat(50));

    let status = match view.protection {
        Protection::Active => view.status_text.green().bold(),
        Protection::Disabled => view.status_text.yellow().bold(),
        Protection::Unknown => view.status_text.red().bold(),
    };
    println!("  {} {}", "Status:           ".bold(), status);
    println!("  {} {}", "Last updated:     ".bold(), view.last_updated);
    println!("  {} {}", "Automatic updates:".bold(), view.update_mode);
    println!("  {} {}", "Protection mode:  ".bold(), view.protection_mode);
    if let Some(expiration) = &view.expiration {
        let text = if expiration.counting_down {
            expiration.text.yellow()
        } else {
            expiration.text.normal()
        };
        println!("  {} {}", "Expiration:       ".bold(), text);
    }
    match view.protection_count {
        Some(count) => println!("  {} {}", "Protected events: ".bold(), format_number(count)),
        None => println!("  {} {}", "Protected events: ".bold(), "unavailable".dimmed()),
    }
}

// ---------------------------------------------------------------------------
// dpdash rules
// ---------------------------------------------------------------------------

/// A single edit applied through the rule tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleChange {
    AddPath(String),
    AddCommand {
        original: String,
        replacement: String,
    },
    RemovePath(usize),
    RemoveCommand(usize),
}

/// List both rule tables.
pub fn run_rules(backend: &dyn Backend, format: OutputFormat) -> Result<()> {
    let editor = load_editor(backend)?;

    match format {
        OutputFormat::Json => {
            let value = serde_json::json!({
                "protected_paths": editor.paths.export(),
                "command_rules": editor.commands.export(),
            });
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        OutputFormat::Table => {
            print_rule_table(&editor.paths);
            println!();
            print_rule_table(&editor.commands);
        }
    }
    Ok(())
}

/// Load the rules, apply one change and save.
pub fn run_rule_change(backend: &dyn Backend, change: RuleChange) -> Result<()> {
    let mut editor = load_editor(backend)?;
    apply_rule_change(&mut editor, &change)?;

    match editor.save(backend) {
        SaveOutcome::Saved => {
            println!("{} Rules saved", "✓".green().bold());
            Ok(())
        }
        SaveOutcome::Failed(message) => bail!(message),
        SaveOutcome::Stale => bail!("save was superseded"),
    }
}

/// Apply a change with the same table operations the editor page uses.
pub fn apply_rule_change(editor: &mut RuleEditor, change: &RuleChange) -> Result<()> {
    match change {
        RuleChange::AddPath(path) => {
            let table = editor.table_mut(RuleKind::Path);
            table.set_draft_field(DraftField::Path, path.as_str());
            confirm(table)
        }
        RuleChange::AddCommand {
            original,
            replacement,
        } => {
            let table = editor.table_mut(RuleKind::Command);
            table.set_draft_field(DraftField::Original, original.as_str());
            table.set_draft_field(DraftField::Replacement, replacement.as_str());
            confirm(table)
        }
        RuleChange::RemovePath(n) => remove(editor.table_mut(RuleKind::Path), *n),
        RuleChange::RemoveCommand(n) => remove(editor.table_mut(RuleKind::Command), *n),
    }
}

fn confirm(table: &mut RuleTable) -> Result<()> {
    match table.confirm_draft() {
        ConfirmOutcome::Confirmed => Ok(()),
        ConfirmOutcome::Invalid(err) => bail!("invalid rule: {err}"),
        ConfirmOutcome::NotDraft | ConfirmOutcome::Missing => bail!("no draft row to confirm"),
    }
}

fn remove(table: &mut RuleTable, ordinal: usize) -> Result<()> {
    let Some(row) = table.row_at(ordinal).filter(|r| !r.is_draft()) else {
        bail!("no entry #{ordinal} in {}", table.kind());
    };
    let id = row.id();
    table.remove(id);
    Ok(())
}

fn load_editor(backend: &dyn Backend) -> Result<RuleEditor> {
    let mut editor = RuleEditor::new();
    match editor.load(backend) {
        LoadOutcome::Loaded => Ok(editor),
        LoadOutcome::Failed(message) => bail!(message),
        LoadOutcome::Stale => bail!("load was superseded"),
    }
}

fn print_rule_table(table: &RuleTable) {
    let title = match table.kind() {
        RuleKind::Path => "Protected Paths",
        RuleKind::Command => "Command Rules",
    };
    println!("{}", title.bold().cyan());

    let mut any = false;
    for (i, row) in table.confirmed().enumerate() {
        any = true;
        let text = match row.fields() {
            RuleFields::Path { path } => path.clone(),
            RuleFields::Command {
                original,
                replacement,
            } if replacement.is_empty() => format!("{original} {}", "→ (blocked)".dimmed()),
            RuleFields::Command {
                original,
                replacement,
            } => format!("{original} {} {replacement}", "→".dimmed()),
        };
        let line = format!("  {:>3}  {}", row.ordinal(), text);
        if i % 2 == 0 {
            println!("{line}");
        } else {
            println!("{}", line.dimmed());
        }
    }
    if !any {
        println!("  {}", "(none)".dimmed());
    }
}

// ---------------------------------------------------------------------------
// dpdash reload | restart | exec
// ---------------------------------------------------------------------------

pub fn run_reload(backend: &dyn Backend) -> Result<()> {
    let ack = backend.reload()?;
    print_ack(ack.message.as_deref().unwrap_or("Configuration reloaded"), ack.output.as_deref());
    Ok(())
}

pub fn run_restart(backend: &dyn Backend) -> Result<()> {
    let ack = backend.restart()?;
    print_ack(ack.message.as_deref().unwrap_or("Service restarted"), ack.output.as_deref());
    Ok(())
}

fn print_ack(message: &str, output: Option<&str>) {
    println!("{} {}", "✓".green().bold(), message);
    if let Some(output) = output.filter(|o| !o.trim().is_empty()) {
        println!("{}", "--- Output ---".dimmed());
        print!("{output}");
        if !output.ends_with('\n') {
            println!();
        }
    }
}

/// Run a command on the backend host. Blank input does nothing.
pub fn run_exec(backend: &dyn Backend, command: &str) -> Result<()> {
    let command = command.trim();
    if command.is_empty() {
        return Ok(());
    }
    match backend.execute(command) {
        Ok(out) => {
            print!("{}", out.output);
            Ok(())
        }
        Err(e) => {
            if let Some(details) = e.details() {
                eprintln!("{}", details.dimmed());
            }
            Err(e.into())
        }
    }
}

// ---------------------------------------------------------------------------
// dpdash logs
// ---------------------------------------------------------------------------

/// Print the log feed until the backend closes it. With `once`, stop after
/// the first log line.
pub fn run_logs(backend: &dyn Backend, once: bool) -> Result<()> {
    let stream = backend.open_log_stream()?;
    for event in stream {
        match event {
            StreamEvent::Line(line) => {
                if line.is_empty() {
                    continue;
                }
                println!("{line}");
                if once {
                    break;
                }
            }
            StreamEvent::ServerError(message) => {
                eprintln!("{} {}", "[stream error]".red(), message);
            }
            StreamEvent::Closed(reason) => {
                match reason {
                    Some(reason) => eprintln!("{} {}", "[stream closed]".dimmed(), reason),
                    None => eprintln!("{}", "[stream closed]".dimmed()),
                }
                break;
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// dpdash languages
// ---------------------------------------------------------------------------

pub fn run_languages(backend: &dyn Backend, format: OutputFormat) -> Result<()> {
    let languages = backend.fetch_languages()?;
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&languages)?),
        OutputFormat::Table => {
            println!("{}", "Languages".bold().cyan());
            for lang in &languages {
                println!("  {:<10} {}", lang.code, lang.name);
            }
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// dpdash config show | init | path
// ---------------------------------------------------------------------------

/// Show the effective (merged) configuration as TOML.
pub fn run_config_show(config: &DashConfig) -> Result<()> {
    let toml_str = config::show_effective_config(config)?;
    println!("{}", "Effective dpdash Configuration".bold().cyan());
    println!("{}", "=".repeat(50));
    println!();
    println!("{toml_str}");

    let global_exists = config::global_config_file().is_some_and(|p| p.exists());
    let project_exists = config::project_config_file().is_some_and(|p| p.exists());
    println!("{}", "Sources (highest priority last):".dimmed());
    println!("  {} built-in defaults", "·".dimmed());
    print_source("~/.dpdash/config.toml", global_exists);
    print_source(".dpdash.toml", project_exists);
    println!("  {} {}", "·".dimmed(), "DPDASH_* environment variables".dimmed());
    println!("  {} {}", "·".dimmed(), "--url".dimmed());
    Ok(())
}

fn print_source(name: &str, exists: bool) {
    if exists {
        println!("  {} {}", "✓".green(), name.dimmed());
    } else {
        println!("  {} {}", "·".dimmed(), format!("{name} (not found)").dimmed());
    }
}

/// Initialize a default config file at `~/.dpdash/config.toml`.
pub fn run_config_init(force: bool) -> Result<()> {
    let path = config::init_config(force)?;
    println!("{} Config written to {}", "✓".green().bold(), path.display());
    println!("  {}", "Edit the file to point dpdash at your backend.".dimmed());
    Ok(())
}

/// Print where config files are read from.
pub fn run_config_path() -> Result<()> {
    if let Some(path) = config::global_config_file() {
        println!("{}", path.display());
    }
    if let Some(path) = config::project_config_file() {
        println!("{}", path.display());
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Formatting helpers
// ---------------------------------------------------------------------------

/// Format a number with comma separators for readability.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::new();
    for (i, ch) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(ch);
    }
    result.chars().rev().collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::RemoteConfig;

    fn editor() -> RuleEditor {
        let mut editor = RuleEditor::new();
        editor.apply_config(&RemoteConfig {
            protected_paths: vec!["/etc".into(), "/boot".into()],
            command_rules: vec!["rm -rf / > echo no".into()],
            ..Default::default()
        });
        editor
    }

    #[test]
    fn test_format_number() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }

    #[test]
    fn test_output_format_parsing() {
        assert_eq!(OutputFormat::from_str_opt(None), OutputFormat::Table);
        assert_eq!(OutputFormat::from_str_opt(Some("json")), OutputFormat::Json);
        assert_eq!(OutputFormat::from_str_opt(Some("csv")), OutputFormat::Table);
    }

    #[test]
    fn add_path_appends_before_draft() {
        let mut editor = editor();
        apply_rule_change(&mut editor, &RuleChange::AddPath(" /root ".into())).unwrap();
        assert_eq!(editor.paths.export(), vec!["/etc", "/boot", "/root"]);
        assert!(editor.paths.rows().last().unwrap().is_draft());
    }

    #[test]
    fn add_command_without_replacement() {
        let mut editor = editor();
        let change = RuleChange::AddCommand {
            original: "shutdown".into(),
            replacement: String::new(),
        };
        apply_rule_change(&mut editor, &change).unwrap();
        assert_eq!(
            editor.commands.export(),
            vec!["rm -rf / > echo no", "shutdown >"]
        );
    }

    #[test]
    fn empty_path_is_rejected() {
        let mut editor = editor();
        let err = apply_rule_change(&mut editor, &RuleChange::AddPath("  ".into())).unwrap_err();
        assert!(err.to_string().contains("path is required"));
        assert_eq!(editor.paths.export(), vec!["/etc", "/boot"]);
    }

    #[test]
    fn add_command_with_arrow_in_original_is_rejected() {
        let mut editor = editor();
        let change = RuleChange::AddCommand {
            original: "echo a > /tmp/x".into(),
            replacement: String::new(),
        };
        let err = apply_rule_change(&mut editor, &change).unwrap_err();
        assert!(err.to_string().contains("cannot contain '>'"));
        assert_eq!(editor.commands.export(), vec!["rm -rf / > echo no"]);
    }

    #[test]
    fn remove_by_ordinal() {
        let mut editor = editor();
        apply_rule_change(&mut editor, &RuleChange::RemovePath(1)).unwrap();
        assert_eq!(editor.paths.export(), vec!["/boot"]);
        assert_eq!(editor.paths.rows()[0].ordinal(), 1);
    }

    #[test]
    fn remove_rejects_draft_and_out_of_range() {
        let mut editor = editor();
        // ordinal 2 is the draft row of the command table
        assert!(apply_rule_change(&mut editor, &RuleChange::RemoveCommand(2)).is_err());
        assert!(apply_rule_change(&mut editor, &RuleChange::RemovePath(0)).is_err());
        assert!(apply_rule_change(&mut editor, &RuleChange::RemovePath(9)).is_err());
        assert_eq!(editor.commands.export(), vec!["rm -rf / > echo no"]);
    }
}
