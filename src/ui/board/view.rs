use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::block::{Position, Title};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use crate::notify::Severity;
use crate::task::Task;

use super::app::{modality_label, BoardApp, StatusKind};
use super::layout::{to_cells, CardSlot, ColumnSlot};

const COLOR_TEXT: Color = Color::Rgb(234, 236, 239);
const COLOR_MUTED: Color = Color::Rgb(160, 165, 172);
const COLOR_MUTED_DARK: Color = Color::Rgb(118, 124, 130);
const COLOR_BG_MUTED: Color = Color::Rgb(52, 56, 60);
const COLOR_INFO: Color = Color::Rgb(116, 198, 219);
const COLOR_WARNING: Color = Color::Rgb(244, 200, 98);
const COLOR_ERROR: Color = Color::Rgb(255, 107, 107);
const COLOR_SUCCESS: Color = Color::Rgb(126, 210, 146);
const COLOR_ACCENT: Color = Color::Rgb(122, 170, 255);
const COLOR_BORDER_LIST: Color = Color::Rgb(92, 126, 166);

const TOAST_WIDTH: u16 = 48;

pub(crate) fn render(frame: &mut Frame, app: &mut BoardApp) {
    let area = frame.size();
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(
            [
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(3),
            ]
            .as_ref(),
        )
        .split(area);
    let header = chunks[0];
    let main = chunks[1];
    let footer = chunks[2];

    app.relayout(main);
    let app: &BoardApp = app;

    render_header(frame, app, header);
    for slot in &app.geometry.columns {
        render_column(frame, app, slot);
    }
    for slot in &app.geometry.cards {
        if let Some(task) = app.engine.store().get(&slot.task_id) {
            render_card(frame, app, slot, task);
        }
    }
    render_drag_preview(frame, app, main);
    render_toasts(frame, app, main);
    render_footer(frame, app, footer);
}

fn render_header(frame: &mut Frame, app: &BoardApp, area: Rect) {
    let mut spans = vec![
        Span::styled(
            "boardflow",
            Style::default()
                .fg(COLOR_ACCENT)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled(app.engine.store().scope().to_string(), Style::default().fg(COLOR_INFO)),
        Span::styled("  input: ", Style::default().fg(COLOR_MUTED_DARK)),
        Span::styled(
            modality_label(app.engine.modality()),
            Style::default().fg(COLOR_MUTED),
        ),
    ];
    let syncing = app.engine.mutations().pending();
    if syncing > 0 {
        spans.push(Span::styled(
            format!("  syncing {syncing}"),
            Style::default().fg(COLOR_WARNING),
        ));
    }
    frame.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn render_column(frame: &mut Frame, app: &BoardApp, slot: &ColumnSlot) {
    let partition = app.engine.partition();
    let (count, hovered) = partition
        .column(slot.status)
        .map(|column| (column.len(), column.hovered))
        .unwrap_or((0, false));

    let border_style = if hovered {
        Style::default()
            .fg(COLOR_ACCENT)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(COLOR_BORDER_LIST)
    };
    let title = Line::from(vec![
        Span::styled(
            format!(" {} ", slot.status.label()),
            Style::default().fg(COLOR_TEXT).add_modifier(Modifier::BOLD),
        ),
        Span::styled(format!("{count} "), Style::default().fg(COLOR_MUTED)),
    ]);
    let mut block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(title);
    if slot.overflow > 0 {
        block = block.title(
            Title::from(Span::styled(
                format!(" +{} more ", slot.overflow),
                Style::default().fg(COLOR_MUTED_DARK),
            ))
            .position(Position::Bottom)
            .alignment(Alignment::Right),
        );
    }
    frame.render_widget(block, slot.area);
}

fn render_card(frame: &mut Frame, app: &BoardApp, slot: &CardSlot, task: &Task) {
    let dragged = app
        .engine
        .dragging()
        .is_some_and(|preview| preview.task_id == slot.task_id);
    let selected = app.selected.as_ref() == Some(&slot.task_id);
    let syncing = app.engine.mutations().is_pending(&slot.task_id);

    let border_style = if dragged {
        Style::default().fg(COLOR_MUTED_DARK)
    } else if syncing {
        Style::default().fg(COLOR_WARNING)
    } else if selected {
        Style::default().fg(COLOR_ACCENT)
    } else {
        Style::default().fg(COLOR_BG_MUTED)
    };
    let text_style = if dragged {
        Style::default()
            .fg(COLOR_MUTED_DARK)
            .add_modifier(Modifier::DIM)
    } else {
        Style::default().fg(COLOR_TEXT)
    };

    let line = card_line(task, text_style);
    let widget = Paragraph::new(line).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(border_style),
    );
    frame.render_widget(widget, slot.area);
}

fn card_line(task: &Task, text_style: Style) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("{} ", task.card_code()), Style::default().fg(COLOR_INFO)),
        Span::styled(task.title.clone(), text_style),
    ])
}

fn render_drag_preview(frame: &mut Frame, app: &BoardApp, area: Rect) {
    let (Some(grab), Some(preview)) = (app.grab, app.engine.dragging()) else {
        return;
    };
    let Some(task) = app.engine.store().get(&preview.task_id) else {
        return;
    };
    let rect = to_cells(grab.rect, area);
    if rect.width < 3 || rect.height < 3 {
        return;
    }

    let target = match preview.pending_status {
        Some(status) if status != preview.origin_status => {
            Span::styled(format!(" -> {} ", status.label()), Style::default().fg(COLOR_SUCCESS))
        }
        _ => Span::styled(
            format!(" {} ", preview.origin_status.label()),
            Style::default().fg(COLOR_MUTED),
        ),
    };
    let widget = Paragraph::new(card_line(task, Style::default().fg(COLOR_TEXT))).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(
                Style::default()
                    .fg(COLOR_ACCENT)
                    .add_modifier(Modifier::BOLD),
            )
            .title(target),
    );
    frame.render_widget(Clear, rect);
    frame.render_widget(widget, rect);
}

fn render_toasts(frame: &mut Frame, app: &BoardApp, area: Rect) {
    let toasts = app.engine.sink();
    if toasts.is_empty() {
        return;
    }
    let lines: Vec<Line<'static>> = toasts
        .visible()
        .map(|notification| {
            let color = match notification.severity {
                Severity::Success => COLOR_SUCCESS,
                Severity::Error => COLOR_ERROR,
            };
            Line::from(Span::styled(notification.message.clone(), Style::default().fg(color)))
        })
        .collect();

    let width = TOAST_WIDTH.min(area.width);
    let height = (lines.len() as u16 + 2).min(area.height);
    let rect = Rect::new(
        area.right().saturating_sub(width),
        area.bottom().saturating_sub(height),
        width,
        height,
    );
    let widget = Paragraph::new(lines).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(COLOR_BORDER_LIST)),
    );
    frame.render_widget(Clear, rect);
    frame.render_widget(widget, rect);
}

fn render_footer(frame: &mut Frame, app: &BoardApp, area: Rect) {
    let hint_span = Span::styled(
        "drag cards with the mouse  Esc cancel  t input  r reload  q quit",
        Style::default().fg(COLOR_INFO),
    );
    let line = if let Some((status, kind)) = &app.status {
        let status_style = match kind {
            StatusKind::Error => Style::default()
                .fg(COLOR_ERROR)
                .add_modifier(Modifier::BOLD),
            StatusKind::Info => Style::default().fg(COLOR_WARNING),
        };
        Line::from(vec![
            hint_span,
            Span::raw("  |  "),
            Span::styled(status.clone(), status_style),
        ])
    } else {
        Line::from(hint_span)
    };
    let detail_line = Line::from(Span::styled(
        selected_summary(app).unwrap_or_else(|| count_summary(app)),
        Style::default().fg(COLOR_ACCENT),
    ));
    let widget = Paragraph::new(vec![line, detail_line])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::TOP)
                .border_style(Style::default().fg(COLOR_BORDER_LIST)),
        );
    frame.render_widget(widget, area);
}

fn count_summary(app: &BoardApp) -> String {
    let partition = app.engine.partition();
    let mut parts: Vec<String> = partition
        .columns
        .iter()
        .map(|column| format!("{} {}", column.status.label(), column.len()))
        .collect();
    if partition.hidden > 0 {
        parts.push(format!("{} hidden", partition.hidden));
    }
    parts.join("  ")
}

fn selected_summary(app: &BoardApp) -> Option<String> {
    let task = app.engine.store().get(app.selected.as_ref()?)?;
    let mut summary = format!(
        "{} {}  [{}, {:?}, {:?}",
        task.card_code(),
        task.title,
        task.status.label(),
        task.task_type,
        task.priority
    );
    if let Some(points) = task.story_points {
        summary.push_str(&format!(", {points} pts"));
    }
    if let Some(user) = &task.assigned_to {
        summary.push_str(&format!(", @{user}"));
    }
    summary.push(']');
    Some(summary)
}
