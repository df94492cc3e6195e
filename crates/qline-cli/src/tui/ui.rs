//! UI rendering

use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph},
    Frame,
};

use qline_core::ChannelStatus;

use super::app::{ActivePane, App, InputMode};

/// Main UI rendering function
pub fn draw(frame: &mut Frame, app: &App) {
    let outer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(1)])
        .split(frame.area());

    let pane_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(outer_chunks[0]);

    draw_queues_pane(frame, app, pane_chunks[0]);
    draw_members_pane(frame, app, pane_chunks[1]);
    draw_channel_indicator(frame, app);

    match app.input_mode {
        InputMode::Normal => draw_status_bar(frame, app, outer_chunks[1]),
        InputMode::Create => draw_create_input(frame, app, outer_chunks[1]),
    }

    if app.show_help {
        draw_help_overlay(frame);
    }
}

fn pane_styles(is_active: bool) -> (Style, Style) {
    if is_active {
        (
            Style::default().add_modifier(Modifier::BOLD),
            Style::default()
                .add_modifier(Modifier::BOLD)
                .add_modifier(Modifier::REVERSED),
        )
    } else {
        (
            Style::default(),
            Style::default().add_modifier(Modifier::REVERSED),
        )
    }
}

/// Queue list (left)
fn draw_queues_pane(frame: &mut Frame, app: &App, area: Rect) {
    let (border_style, highlight_style) = pane_styles(app.active_pane == ActivePane::Queues);

    let items: Vec<ListItem> = app
        .queue_rows
        .iter()
        .map(|row| {
            let marker = if row.joined { "● " } else { "  " };
            let style = if row.active {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(marker, Style::default().fg(Color::Green)),
                Span::styled(row.to_string(), style),
            ]))
        })
        .collect();

    let block = Block::default()
        .title(format!(" Queues ({}) ", app.queue_rows.len()))
        .borders(Borders::ALL)
        .border_style(border_style);

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style);

    let mut state = ListState::default();
    if !app.queue_rows.is_empty() {
        state.select(Some(app.queue_index));
    }

    frame.render_stateful_widget(list, area, &mut state);
}

/// Members of the active queue (right)
fn draw_members_pane(frame: &mut Frame, app: &App, area: Rect) {
    let (border_style, highlight_style) = pane_styles(app.active_pane == ActivePane::Members);

    let title = match app.active_queue_name() {
        Some(name) => match app.state.my_position() {
            Some(position) => format!(" {} - you are #{} ", name, position),
            None => format!(" {} ", name),
        },
        None => " Members ".to_string(),
    };
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border_style);

    if app.member_rows.is_empty() {
        let hint = if app.state.active_queue_id.is_some() {
            "Nobody is waiting"
        } else {
            "Select a queue and press Enter"
        };
        let paragraph = Paragraph::new(vec![
            Line::from(""),
            Line::from(Span::styled(
                hint,
                Style::default().add_modifier(Modifier::DIM),
            )),
        ])
        .block(block);
        frame.render_widget(paragraph, area);
        return;
    }

    let items: Vec<ListItem> = app
        .member_rows
        .iter()
        .map(|row| {
            let actions = row
                .actions
                .iter()
                .map(|a| a.label())
                .collect::<Vec<_>>()
                .join(" / ");
            let style = if row.is_self {
                Style::default().add_modifier(Modifier::BOLD)
            } else {
                Style::default()
            };
            ListItem::new(Line::from(vec![
                Span::styled(row.to_string(), style),
                Span::styled(
                    format!("  [{}]", actions),
                    Style::default().add_modifier(Modifier::DIM),
                ),
            ]))
        })
        .collect();

    let list = List::new(items)
        .block(block)
        .highlight_style(highlight_style);

    let mut state = ListState::default();
    state.select(Some(app.member_index));

    frame.render_stateful_widget(list, area, &mut state);
}

/// Status bar at the bottom: error, loading, message or key hints
fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let paragraph = if let Some(error) = &app.state.error {
        Paragraph::new(error.as_str()).style(Style::default().fg(Color::Red))
    } else if app.state.is_loading() {
        Paragraph::new("Loading...").style(Style::default().add_modifier(Modifier::DIM))
    } else if !app.state.authenticated {
        Paragraph::new("Not logged in. Run `qline login --token <token>`")
            .style(Style::default().fg(Color::Yellow))
    } else {
        let content = app.status_message.clone().unwrap_or_else(|| {
            "enter:join/open/swap  s:skip  x:leave  n:new  r:refresh  ?:help  q:quit".to_string()
        });
        Paragraph::new(content).style(Style::default().add_modifier(Modifier::DIM))
    };

    frame.render_widget(paragraph, area);
}

/// Name input for a new queue
fn draw_create_input(frame: &mut Frame, app: &App, area: Rect) {
    let prefix = "New queue: ";

    let line = Line::from(vec![
        Span::styled(prefix, Style::default().fg(Color::Yellow)),
        Span::raw(app.input.as_str()),
    ]);

    frame.render_widget(Paragraph::new(line), area);

    let cursor_x = area.x + (prefix.len() + app.input.chars().count()) as u16;
    frame.set_cursor_position((cursor_x, area.y));
}

/// Update channel indicator in the top-right corner
fn draw_channel_indicator(frame: &mut Frame, app: &App) {
    let area = frame.area();
    if area.width < 5 {
        return;
    }

    let (icon, style) = match app.channel_status {
        ChannelStatus::Connected => ("✓", Style::default().fg(Color::Green)),
        ChannelStatus::Connecting => ("↻", Style::default().fg(Color::Yellow)),
        ChannelStatus::Disconnected => ("⚡", Style::default().fg(Color::DarkGray)),
    };

    let indicator = Paragraph::new(Span::styled(icon, style));
    frame.render_widget(indicator, Rect::new(area.width - 2, 0, 1, 1));
}

fn draw_help_overlay(frame: &mut Frame) {
    let area = frame.area();

    let popup_width = 50.min(area.width.saturating_sub(4));
    let popup_height = 17.min(area.height.saturating_sub(4));
    let popup_x = (area.width.saturating_sub(popup_width)) / 2;
    let popup_y = (area.height.saturating_sub(popup_height)) / 2;
    let popup_area = Rect::new(popup_x, popup_y, popup_width, popup_height);

    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled(
            "Keyboard Shortcuts",
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("  j/k, ↑/↓    Move up/down"),
        Line::from("  h/l, Tab    Switch panes"),
        Line::from("  Enter       Join or open queue"),
        Line::from("              Request swap with member"),
        Line::from("  s           Skip your turn"),
        Line::from("  x           Leave the queue"),
        Line::from("  n           New queue"),
        Line::from("  r           Refresh"),
        Line::from("  q           Quit"),
        Line::from(""),
        Line::from(Span::styled(
            "Press any key to close",
            Style::default().add_modifier(Modifier::DIM),
        )),
    ];

    let block = Block::default()
        .title(" Help ")
        .borders(Borders::ALL)
        .border_style(Style::default().add_modifier(Modifier::BOLD));

    frame.render_widget(Paragraph::new(help_text).block(block), popup_area);
}
