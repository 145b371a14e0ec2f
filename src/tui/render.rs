use std::time::Instant;

use ratatui::{
    Frame,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Tabs, Wrap},
};

use super::{App, Page};
use crate::dashboard::settings::SettingKey;
use crate::dashboard::status::Protection;
use crate::logs::LineKind;
use crate::logs::notify::{Level, Phase};
use crate::rules::{DraftField, RuleFields, RuleKind, RuleRow};

/// Draw the whole screen: tab bar, current page, key help and toasts.
pub fn draw(f: &mut Frame, app: &App, now: Instant) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(1),
        ])
        .split(f.area());

    let titles: Vec<Line> = Page::ALL
        .iter()
        .enumerate()
        .map(|(i, p)| Line::from(format!("{} {}", i + 1, p.title())))
        .collect();
    let tabs = Tabs::new(titles)
        .block(Block::default().borders(Borders::ALL).title(" dpdash "))
        .select(app.page.index())
        .style(Style::default().fg(Color::White))
        .highlight_style(Style::default().fg(Color::Cyan).bold());
    f.render_widget(tabs, chunks[0]);

    match app.page {
        Page::Dashboard => render_dashboard(f, chunks[1], app),
        Page::Config => render_config(f, chunks[1], app),
        Page::Rules => render_rules(f, chunks[1], app),
        Page::Logs => render_logs(f, chunks[1], app),
        Page::Tools => render_tools(f, chunks[1], app),
    }

    let help = Paragraph::new(help_text(app)).style(Style::default().fg(Color::DarkGray));
    f.render_widget(help, chunks[2]);

    render_toasts(f, f.area(), app, now);
}

fn help_text(app: &App) -> &'static str {
    match app.page {
        Page::Dashboard => "r reload · R restart · u refresh · 1-5/F1-F5 pages · q quit",
        Page::Config if app.settings_editing.is_some() => "Enter apply · Esc cancel",
        Page::Config => "↑↓ select · Enter edit/cycle · Ctrl+S save · q quit",
        Page::Rules => {
            "↑↓ select · Enter confirm · Del remove · Tab field · Shift+Tab table · Ctrl+S save · Ctrl+R reload"
        }
        Page::Logs => "p pause/resume · c clear · q quit",
        Page::Tools => "Enter run · Esc clear · F1-F5 pages · Ctrl+C quit",
    }
}

// -- Dashboard --

fn render_dashboard(f: &mut Frame, area: Rect, app: &App) {
    let view = app.shell.context.status();

    let status_color = match view.protection {
        Protection::Active => Color::Green,
        Protection::Disabled => Color::Yellow,
        Protection::Unknown => Color::Red,
    };
    let label = |text: &'static str| Span::styled(text, Style::default().fg(Color::Cyan));

    let mut lines = vec![
        Line::from(vec![
            label("Status:            "),
            Span::styled(view.status_text.clone(), Style::default().fg(status_color).bold()),
        ]),
        Line::from(vec![label("Last updated:      "), Span::raw(view.last_updated.clone())]),
        Line::from(vec![label("Automatic updates: "), Span::raw(view.update_mode.clone())]),
        Line::from(vec![label("Protection mode:   "), Span::raw(view.protection_mode.clone())]),
    ];
    if let Some(expiration) = &view.expiration {
        let style = if expiration.counting_down {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        lines.push(Line::from(vec![
            label("Expiration:        "),
            Span::styled(expiration.text.clone(), style),
        ]));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(vec![
        label("Protected events:  "),
        Span::raw(
            view.protection_count
                .map_or_else(|| "-".to_string(), |n| n.to_string()),
        ),
    ]));

    let paragraph = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title(" Service Status "));
    f.render_widget(paragraph, area);
}

// -- Config --

fn render_config(f: &mut Frame, area: Rect, app: &App) {
    let form = &app.shell.settings;
    let languages = &app.shell.context.languages;

    let items: Vec<ListItem> = SettingKey::ALL
        .iter()
        .enumerate()
        .map(|(i, key)| {
            let value = match (&app.settings_editing, i == app.settings_selected) {
                (Some(buffer), true) => format!("{buffer}▌"),
                _ => form.display(*key, languages),
            };
            let mut spans = vec![
                Span::styled(
                    format!("{:<32}", key.label()),
                    Style::default().fg(Color::Cyan),
                ),
                Span::raw(value),
            ];
            if let Some(err) = form.error_for(*key) {
                spans.push(Span::styled(
                    format!("  {}", err.message),
                    Style::default().fg(Color::Red),
                ));
            }
            ListItem::new(Line::from(spans))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(" Basic Settings "))
        .highlight_style(Style::default().add_modifier(Modifier::REVERSED));
    let mut state = ListState::default().with_selected(Some(app.settings_selected));
    f.render_stateful_widget(list, area, &mut state);
}

// -- Rules --

fn render_rules(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(50),
            Constraint::Percentage(50),
            Constraint::Length(1),
        ])
        .split(area);

    render_rule_table(f, chunks[0], app, RuleKind::Path, " Protected Paths ");
    render_rule_table(f, chunks[1], app, RuleKind::Command, " Command Rules ");

    let editor = &app.shell.editor;
    if let Some(err) = editor.save_error().or(editor.load_error()) {
        let line = Paragraph::new(err.to_string()).style(Style::default().fg(Color::Red));
        f.render_widget(line, chunks[2]);
    }
}

fn render_rule_table(f: &mut Frame, area: Rect, app: &App, kind: RuleKind, title: &str) {
    let table = app.shell.editor.table(kind);
    let focused = app.rules_focus == kind;

    let items: Vec<ListItem> = table
        .rows()
        .iter()
        .map(|row| ListItem::new(row_line(row, focused.then_some(app.active_draft_field()))))
        .collect();

    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default()
    };
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(title.to_string()),
        )
        .highlight_style(if focused {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
        });
    let mut state = ListState::default().with_selected(Some(app.selected(kind)));
    f.render_stateful_widget(list, area, &mut state);
}

/// `active` is the draft field receiving input, if this table has focus.
fn row_line(row: &RuleRow, active: Option<DraftField>) -> Line<'static> {
    let number = Span::styled(
        format!("{:>3}  ", row.ordinal()),
        Style::default().fg(Color::DarkGray),
    );
    let mut spans = vec![number];

    match (row.fields(), row.is_draft()) {
        (RuleFields::Path { path }, false) => spans.push(Span::raw(path.clone())),
        (RuleFields::Command { original, replacement }, false) => {
            spans.push(Span::raw(original.clone()));
            spans.push(Span::styled(" → ", Style::default().fg(Color::DarkGray)));
            spans.push(Span::raw(replacement.clone()));
        }
        (RuleFields::Path { path }, true) => {
            spans.push(draft_span(path, "new path", active.is_some()));
        }
        (RuleFields::Command { original, replacement }, true) => {
            spans.push(draft_span(
                original,
                "original",
                active == Some(DraftField::Original),
            ));
            spans.push(Span::styled(" → ", Style::default().fg(Color::DarkGray)));
            spans.push(draft_span(
                replacement,
                "replacement",
                active == Some(DraftField::Replacement),
            ));
        }
    }

    if let Some(err) = row.error() {
        spans.push(Span::styled(
            format!("  {err}"),
            Style::default().fg(Color::Red),
        ));
    }
    Line::from(spans)
}

fn draft_span(value: &str, placeholder: &str, active: bool) -> Span<'static> {
    let cursor = if active { "▌" } else { "" };
    if value.is_empty() {
        Span::styled(
            format!("<{placeholder}>{cursor}"),
            Style::default().fg(Color::DarkGray).italic(),
        )
    } else {
        Span::styled(
            format!("{value}{cursor}"),
            Style::default().fg(Color::Yellow),
        )
    }
}

// -- Logs --

fn render_logs(f: &mut Frame, area: Rect, app: &App) {
    let logs = &app.shell.logs;
    let height = area.height.saturating_sub(2) as usize;
    let skip = logs.len().saturating_sub(height);

    let items: Vec<ListItem> = logs
        .lines()
        .skip(skip)
        .map(|line| {
            let style = match line.kind {
                LineKind::Log => Style::default(),
                LineKind::Error => Style::default().fg(Color::Red),
            };
            ListItem::new(Span::styled(line.text.clone(), style))
        })
        .collect();

    let state = if !logs.is_connected() {
        "disconnected"
    } else if logs.is_paused() {
        "paused"
    } else {
        "live"
    };
    let title = format!(" Logs [{state}] · p {} ", logs.toggle_label());
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(list, area);
}

// -- Tools --

fn render_tools(f: &mut Frame, area: Rect, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(0)])
        .split(area);

    let input = Paragraph::new(format!("{}▌", app.command_input))
        .block(Block::default().borders(Borders::ALL).title(" Command "));
    f.render_widget(input, chunks[0]);

    let output = app.shell.command_output.as_deref().unwrap_or("");
    let paragraph = Paragraph::new(output.to_string())
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(" Output "));
    f.render_widget(paragraph, chunks[1]);
}

// -- Toasts --

fn render_toasts(f: &mut Frame, area: Rect, app: &App, now: Instant) {
    let width = 48.min(area.width.saturating_sub(2));
    let mut y = area.y + 1;

    for note in app.shell.toasts.visible(now) {
        if y + 3 > area.bottom() {
            break;
        }
        let x = area.right().saturating_sub(width + 1);
        let rect = Rect::new(x, y, width, 3);

        let color = match note.level {
            Level::Info => Color::Green,
            Level::Error => Color::Red,
        };
        let border = match note.phase(now) {
            Phase::Shown => Style::default().fg(color),
            Phase::Entering | Phase::Leaving => Style::default().fg(color).add_modifier(Modifier::DIM),
        };

        f.render_widget(Clear, rect);
        let toast = Paragraph::new(note.text.clone())
            .block(Block::default().borders(Borders::ALL).border_style(border));
        f.render_widget(toast, rect);
        y += 3;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
