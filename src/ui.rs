use ratatui::prelude::*;
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Clear, Padding, Paragraph, Wrap};

use crate::app::{App, SettingsModal};
use crate::form::{FormField, WORKSPACE_BASE_PLACEHOLDER};
use crate::notify::{Toast, ToastLevel};
use crate::theme::Theme;

const TEXT_PADDING: u16 = 1;
const STATUS_HEIGHT: u16 = 3;
const TITLE_BAR_HEIGHT: u16 = 3;
const VSCODE_BUTTON_HEIGHT: u16 = 3;
const EXPLORER_WIDTH_PERCENT: u16 = 30;
const COLLAPSED_EXPLORER_WIDTH: u16 = 3;
const TOAST_WIDTH: u16 = 44;
const ACTIVE_TITLE_BG: Color = Color::Rgb(90, 145, 200);
const STATUS_HELP_TEXT: &str = "Ctrl+S settings | Ctrl+N new conversation | Ctrl+X end session | Ctrl+B explorer | Ctrl+R refresh | Ctrl+O VS Code | Ctrl+C quit";
const FORM_HELP_TEXT: &str = "Tab/Shift+Tab field | Up/Down model | Enter save | Esc close";
const CONFIRM_HELP_TEXT: &str = "Enter/y end session and save | Esc/n go back";
pub const END_SESSION_TITLE: &str = "End Session";
pub const END_SESSION_MESSAGE: &str =
    "Changing settings requires ending the current session. Any work in progress will be lost.";

pub fn render(frame: &mut Frame, app: &App, theme: &Theme) {
    let [body, status] = Layout::vertical([Constraint::Min(0), Constraint::Length(STATUS_HEIGHT)])
        .areas(frame.area());
    let explorer_constraint = if app.explorer().is_open() {
        Constraint::Percentage(EXPLORER_WIDTH_PERCENT)
    } else {
        Constraint::Length(COLLAPSED_EXPLORER_WIDTH)
    };
    let [explorer, main] =
        Layout::horizontal([explorer_constraint, Constraint::Min(0)]).areas(body);

    render_explorer(frame, explorer, app, theme);
    render_main_pane(frame, main, app, theme);

    frame.render_widget(
        Paragraph::new(status_line_text(app))
            .style(Style::default().bg(theme.status_bg).fg(theme.muted_fg))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.status_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        status,
    );

    if let Some(modal) = app.settings_modal() {
        render_settings_modal(frame, modal, theme);
        if modal.is_confirming() {
            render_danger_modal(frame, modal, theme);
        }
    }
    render_toasts(frame, &app.toasts(), theme);
}

fn render_title_bar(frame: &mut Frame, area: Rect, title: &str, bg: Color, fg: Color) {
    frame.render_widget(
        Paragraph::new(title.to_string())
            .style(Style::default().bg(bg).fg(fg))
            .block(
                Block::default()
                    .style(Style::default().bg(bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        area,
    );
}

fn render_explorer(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let explorer = app.explorer();
    let [title_area, content_area] =
        Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)]).areas(area);
    let title_bg = darken(theme.explorer_bg);

    let Some(label) = explorer.header_label(app.workspace_path()) else {
        render_title_bar(frame, title_area, ">", title_bg, theme.muted_fg);
        frame.render_widget(
            Block::default().style(Style::default().bg(theme.explorer_bg)),
            content_area,
        );
        return;
    };
    render_title_bar(frame, title_area, &label, title_bg, theme.text_fg);

    let [tree_area, button_area] = Layout::vertical([
        Constraint::Min(0),
        Constraint::Length(VSCODE_BUTTON_HEIGHT),
    ])
    .areas(content_area);

    let lines: Vec<Line> = if let Some(error) = explorer.error() {
        vec![Line::styled(error.to_string(), Style::default().fg(theme.danger_fg))]
    } else if explorer.is_loading() && explorer.files().is_empty() {
        vec![Line::styled("Loading...", Style::default().fg(theme.muted_fg))]
    } else if explorer.files().is_empty() {
        vec![Line::styled(
            "No files to show",
            Style::default().fg(theme.muted_fg),
        )]
    } else {
        explorer
            .files()
            .iter()
            .enumerate()
            .map(|(idx, path)| {
                let selected = idx == explorer.selected();
                let style = if selected {
                    Style::default()
                        .fg(theme.active_fg)
                        .add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.text_fg)
                };
                Line::from(vec![
                    Span::styled(
                        if selected { "> " } else { "  " },
                        Style::default().fg(theme.muted_fg),
                    ),
                    Span::styled(path.clone(), style),
                ])
            })
            .collect()
    };
    let visible = tree_area.height.saturating_sub(TEXT_PADDING * 2) as usize;
    let scroll = explorer.selected().saturating_sub(visible.saturating_sub(1)) as u16;
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(theme.explorer_bg))
            .scroll((scroll, 0))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.explorer_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        tree_area,
    );

    let button_style = if explorer.vscode_enabled(app.agent_state()) {
        Style::default()
            .fg(theme.active_fg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
            .fg(theme.muted_fg)
            .add_modifier(Modifier::DIM)
    };
    frame.render_widget(
        Paragraph::new(Line::styled("[ Open in VS Code ]", button_style))
            .alignment(Alignment::Center)
            .block(
                Block::default()
                    .style(Style::default().bg(title_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        button_area,
    );
}

fn render_main_pane(frame: &mut Frame, area: Rect, app: &App, theme: &Theme) {
    let [title_area, content_area] =
        Layout::vertical([Constraint::Length(TITLE_BAR_HEIGHT), Constraint::Min(0)]).areas(area);
    render_title_bar(
        frame,
        title_area,
        app.route(),
        darken(theme.main_bg),
        theme.text_fg,
    );

    let mut lines = Vec::new();
    match app.session() {
        Some(session) => {
            lines.push(Line::from(vec![
                Span::styled("Conversation ", Style::default().fg(theme.muted_fg)),
                Span::styled(
                    session.id().to_string(),
                    Style::default()
                        .fg(theme.active_fg)
                        .add_modifier(Modifier::BOLD),
                ),
            ]));
            lines.push(Line::from(vec![
                Span::styled("Agent ", Style::default().fg(theme.muted_fg)),
                Span::styled(session.agent_state().label(), Style::default().fg(theme.text_fg)),
            ]));
            if let Some(path) = session.host_path() {
                lines.push(Line::from(vec![
                    Span::styled("Workspace ", Style::default().fg(theme.muted_fg)),
                    Span::styled(path.display().to_string(), Style::default().fg(theme.text_fg)),
                ]));
            }
        }
        None => lines.push(Line::styled(
            "No active conversation. Press Ctrl+N to start one.",
            Style::default().fg(theme.muted_fg),
        )),
    }
    lines.push(Line::default());
    lines.extend(
        app.activity()
            .map(|entry| Line::styled(entry.to_string(), Style::default().fg(theme.text_fg))),
    );

    // Unwrapped, so one entry is one row and the tail stays in view.
    let visible = content_area.height.saturating_sub(TEXT_PADDING * 2);
    let scroll = u16::try_from(lines.len())
        .unwrap_or(u16::MAX)
        .saturating_sub(visible);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(theme.main_bg))
            .scroll((scroll, 0))
            .block(
                Block::default()
                    .style(Style::default().bg(theme.main_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        content_area,
    );
}

fn status_line_text(app: &App) -> String {
    match app.settings_modal() {
        Some(modal) if modal.is_saving() => {
            format!("Saving settings {}", working_dots(app.ticks))
        }
        Some(modal) if modal.is_confirming() => CONFIRM_HELP_TEXT.to_string(),
        Some(_) => FORM_HELP_TEXT.to_string(),
        None => STATUS_HELP_TEXT.to_string(),
    }
}

fn working_dots(ticks: u64) -> &'static str {
    const FRAMES: [&str; 6] = ["[   ]", "[.  ]", "[.. ]", "[...]", "[ ..]", "[  .]"];
    FRAMES[((ticks / 2) as usize) % FRAMES.len()]
}

fn field_label(text: &'static str, focused: bool, theme: &Theme) -> Line<'static> {
    let style = if focused {
        Style::default()
            .fg(theme.active_fg)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.muted_fg)
    };
    Line::from(vec![
        Span::styled(if focused { "> " } else { "  " }, style),
        Span::styled(text, style),
    ])
}

fn input_line(value: &str, placeholder: &str, theme: &Theme) -> Line<'static> {
    if value.is_empty() {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                placeholder.to_string(),
                Style::default().fg(theme.muted_fg).bg(theme.input_bg),
            ),
        ])
    } else {
        Line::from(vec![
            Span::raw("  "),
            Span::styled(
                value.to_string(),
                Style::default().fg(theme.text_fg).bg(theme.input_bg),
            ),
        ])
    }
}

fn render_settings_modal(frame: &mut Frame, modal: &SettingsModal, theme: &Theme) {
    let form = &modal.form;
    let focus = form.focus();
    let mut lines = vec![
        Line::styled(
            "Settings",
            Style::default()
                .fg(theme.active_fg)
                .add_modifier(Modifier::BOLD),
        ),
        Line::default(),
        field_label("LLM Model", focus == FormField::Model, theme),
    ];
    let model_text = match form.selected_model() {
        Some(choice) => format!("{} / {}", choice.provider, choice.model),
        None => "No models available".to_string(),
    };
    let position = form
        .selected_model_index()
        .map(|idx| format!(" ({}/{})", idx + 1, form.model_choices().len()))
        .unwrap_or_default();
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(
            model_text,
            Style::default().fg(theme.text_fg).bg(theme.input_bg),
        ),
        Span::styled(position, Style::default().fg(theme.muted_fg)),
    ]));
    lines.push(Line::default());

    let mut key_label = field_label("API Key", focus == FormField::ApiKey, theme);
    key_label.spans.push(Span::styled(
        if form.is_key_set() { " (set)" } else { " (not set)" },
        Style::default().fg(theme.muted_fg),
    ));
    lines.push(key_label);
    lines.push(input_line(
        &form.masked_api_key_input(),
        form.api_key_placeholder(),
        theme,
    ));
    lines.push(Line::default());

    lines.push(field_label(
        "Workspaces Base Directory",
        focus == FormField::WorkspaceBase,
        theme,
    ));
    lines.push(input_line(
        form.workspace_base_input(),
        WORKSPACE_BASE_PLACEHOLDER,
        theme,
    ));
    lines.push(Line::default());

    let save_text = if modal.is_saving() {
        "[ Saving... ]"
    } else {
        "[ Save ]"
    };
    let save_style = if !form.is_valid() || modal.is_saving() {
        Style::default()
            .fg(theme.muted_fg)
            .add_modifier(Modifier::DIM)
    } else if focus == FormField::Save {
        Style::default()
            .fg(theme.active_fg)
            .bg(ACTIVE_TITLE_BG)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(theme.text_fg)
    };
    lines.push(Line::from(vec![
        Span::raw("  "),
        Span::styled(save_text, save_style),
    ]));
    if let Some(error) = form.error() {
        lines.push(Line::default());
        lines.push(Line::styled(
            error.to_string(),
            Style::default().fg(theme.danger_fg),
        ));
    }

    let height = (lines.len() as u16).saturating_add(TEXT_PADDING * 2 + 2);
    let overlay = centered_rect(frame.area(), 64, height);
    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(theme.modal_bg))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .style(Style::default().bg(theme.modal_bg))
                    .padding(Padding::uniform(TEXT_PADDING + 1)),
            ),
        overlay,
    );
}

fn render_danger_modal(frame: &mut Frame, modal: &SettingsModal, theme: &Theme) {
    let hint = if modal.is_saving() {
        "Saving settings..."
    } else {
        CONFIRM_HELP_TEXT
    };
    let lines = vec![
        Line::styled(
            END_SESSION_TITLE,
            Style::default()
                .fg(theme.danger_fg)
                .add_modifier(Modifier::BOLD),
        ),
        Line::default(),
        Line::styled(END_SESSION_MESSAGE, Style::default().fg(theme.text_fg)),
        Line::default(),
        Line::styled(hint, Style::default().fg(theme.muted_fg)),
    ];
    let overlay = centered_rect(frame.area(), 56, 11);
    frame.render_widget(Clear, overlay);
    frame.render_widget(
        Paragraph::new(lines)
            .style(Style::default().bg(theme.status_bg))
            .wrap(Wrap { trim: true })
            .block(
                Block::default()
                    .style(Style::default().bg(theme.status_bg))
                    .padding(Padding::uniform(TEXT_PADDING)),
            ),
        overlay,
    );
}

fn render_toasts(frame: &mut Frame, toasts: &[Toast], theme: &Theme) {
    let area = frame.area();
    let width = TOAST_WIDTH.min(area.width);
    let mut y = area.y;
    for toast in toasts.iter().rev() {
        let height = 3u16;
        if y.saturating_add(height) > area.y.saturating_add(area.height) {
            break;
        }
        let x = area.x + area.width.saturating_sub(width);
        let rect = Rect::new(x, y, width, height);
        let fg = match toast.level {
            ToastLevel::Info => theme.text_fg,
            ToastLevel::Error => theme.danger_fg,
        };
        frame.render_widget(Clear, rect);
        frame.render_widget(
            Paragraph::new(toast.message.clone())
                .style(Style::default().bg(theme.modal_bg).fg(fg))
                .block(
                    Block::default()
                        .style(Style::default().bg(theme.modal_bg))
                        .padding(Padding::horizontal(TEXT_PADDING)),
                )
                .wrap(Wrap { trim: true }),
            rect,
        );
        y = y.saturating_add(height);
    }
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width);
    let height = height.min(area.height);
    let x = area.x.saturating_add(area.width.saturating_sub(width) / 2);
    let y = area.y.saturating_add(area.height.saturating_sub(height) / 2);
    Rect::new(x, y, width, height)
}

fn darken(base: Color) -> Color {
    match base {
        Color::Rgb(r, g, b) => Color::Rgb(
            adjust_channel(r, -12),
            adjust_channel(g, -12),
            adjust_channel(b, -12),
        ),
        _ => base,
    }
}

fn adjust_channel(channel: u8, delta: i16) -> u8 {
    let value = channel as i16 + delta;
    value.clamp(0, 255) as u8
}

#[cfg(test)]
#[path = "../tests/unit/ui_tests.rs"]
mod tests;
