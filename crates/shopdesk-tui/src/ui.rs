use ratatui::{
    Frame,
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Modifier, Style, Stylize},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
};
use shopdesk_core::ChatRole;
use crate::app::{display_width, App};
use crate::tui;

const TOPICS: &[&str] = &[
    "Product information",
    "Order issues",
    "Shipping and delivery",
    "Returns and refunds",
    "Payment questions",
];

/// Split a line on `**` pairs and render the enclosed runs bold. An unclosed
/// marker is kept as literal text.
fn parse_markdown_line(text: &str) -> Line<'static> {
    let mut spans: Vec<Span<'static>> = Vec::new();
    let mut rest = text;

    while let Some(start) = rest.find("**") {
        let after = &rest[start + 2..];
        match after.find("**") {
            Some(end) if end > 0 => {
                if start > 0 {
                    spans.push(Span::raw(rest[..start].to_string()));
                }
                spans.push(Span::styled(
                    after[..end].to_string(),
                    Style::default().add_modifier(Modifier::BOLD),
                ));
                rest = &after[end + 2..];
            }
            _ => break,
        }
    }

    if !rest.is_empty() {
        spans.push(Span::raw(rest.to_string()));
    }

    Line::from(spans)
}

/// Render a frame, falling back to the recovery screen if rendering panics.
pub fn draw(app: &mut App, frame: &mut Frame) {
    if app.render_fault.is_none() {
        match tui::catch_render_fault(|| render(app, frame)) {
            Ok(()) => return,
            Err(fault) => app.render_fault = Some(fault),
        }
    }
    render_recovery(app, frame);
}

pub fn render(app: &mut App, frame: &mut Frame) {
    let area = frame.area();
    let banner_height = match app.controller.last_error() {
        Some(message) => banner_height(message, area.width, area.height),
        None => 0,
    };

    let [header_area, banner_area, chat_area, input_area, footer_area] = Layout::vertical([
        Constraint::Length(1),
        Constraint::Length(banner_height),
        Constraint::Min(0),
        Constraint::Length(3),
        Constraint::Length(1),
    ])
    .areas(area);

    render_header(app, frame, header_area);
    if banner_height > 0 {
        render_error_banner(app, frame, banner_area);
    }
    render_chat(app, frame, chat_area);
    render_input(app, frame, input_area);
    render_footer(app, frame, footer_area);
}

/// Rows for the error banner: the wrapped reason plus borders, at most a
/// third of the screen.
fn banner_height(message: &str, width: u16, screen_height: u16) -> u16 {
    let inner_width = width.saturating_sub(2) as usize;
    let rows = wrapped_line_count(message, inner_width).saturating_add(2);
    let max_rows = (screen_height / 3).max(3) as usize;
    rows.clamp(3, max_rows) as u16
}

/// Line count after greedy word wrapping, splitting words wider than `width`.
fn wrapped_line_count(text: &str, width: usize) -> usize {
    if width == 0 {
        return 1;
    }

    let count: usize = text
        .lines()
        .map(|line| {
            let mut rows = 1;
            let mut used = 0;
            for word in line.split_whitespace() {
                let mut word_width = display_width(word);
                let needed = if used == 0 { word_width } else { used + 1 + word_width };
                if needed <= width {
                    used = needed;
                    continue;
                }
                if used > 0 {
                    rows += 1;
                }
                while word_width > width {
                    rows += 1;
                    word_width -= width;
                }
                used = word_width;
            }
            rows
        })
        .sum();
    count.max(1)
}

fn render_header(app: &App, frame: &mut Frame, area: Rect) {
    let mut spans = vec![
        Span::styled(" E-commerce Assistant ", Style::default().fg(Color::Cyan).bold()),
        Span::styled(format!(" {} ", app.model()), Style::default().fg(Color::Gray)),
        Span::styled(
            format!("v{}", env!("CARGO_PKG_VERSION")),
            Style::default().fg(Color::Gray),
        ),
    ];
    if let Some(notice) = &app.startup_notice {
        spans.push(Span::styled(
            format!("  {} ", notice),
            Style::default().fg(Color::Yellow).bold(),
        ));
    }
    let title = Line::from(spans);

    let header = Paragraph::new(title).style(Style::default().bg(Color::DarkGray));
    frame.render_widget(header, area);
}

fn render_error_banner(app: &App, frame: &mut Frame, area: Rect) {
    let Some(message) = app.controller.last_error() else {
        return;
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Red))
        .title(" Error (Esc to dismiss) ");

    let banner = Paragraph::new(message.to_string())
        .style(Style::default().fg(Color::Red))
        .block(block)
        .wrap(Wrap { trim: true });

    frame.render_widget(banner, area);
}

fn render_chat(app: &mut App, frame: &mut Frame, area: Rect) {
    // Inner size minus borders, used for scroll calculations
    app.chat_height = area.height.saturating_sub(2);
    app.chat_width = area.width.saturating_sub(2);

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray))
        .title(" Conversation ");

    let text = if app.controller.messages().is_empty() && !app.controller.is_loading() {
        welcome_text()
    } else {
        let mut lines: Vec<Line> = Vec::new();

        for msg in app.controller.messages() {
            let label_style = match msg.role {
                ChatRole::User => Style::default().fg(Color::Cyan),
                ChatRole::Assistant => Style::default().fg(Color::Yellow),
                ChatRole::System => Style::default().fg(Color::Magenta),
            };
            lines.push(Line::from(Span::styled(
                format!("{}:", msg.role),
                label_style.add_modifier(Modifier::BOLD),
            )));
            for line in msg.content.lines() {
                match msg.role {
                    ChatRole::Assistant => lines.push(parse_markdown_line(line)),
                    _ => lines.push(Line::from(line.to_string())),
                }
            }
            lines.push(Line::default());
        }

        if app.controller.is_loading() {
            // Animated ellipsis: cycles through ".", "..", "..."
            let dots = ".".repeat((app.animation_frame as usize) + 1);
            lines.push(Line::from(Span::styled(
                format!("Thinking{}", dots),
                Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
            )));
        }

        Text::from(lines)
    };

    let chat = Paragraph::new(text)
        .block(block)
        .wrap(Wrap { trim: false })
        .scroll((app.chat_scroll, 0));

    frame.render_widget(chat, area);
}

fn welcome_text() -> Text<'static> {
    let mut lines = vec![Line::from(Span::styled(
        "Welcome! I can help you with:",
        Style::default().add_modifier(Modifier::BOLD),
    ))];
    for topic in TOPICS {
        lines.push(Line::from(format!("  • {}", topic)));
    }
    lines.push(Line::default());
    lines.push(Line::from(Span::styled(
        "Type your message below and press Enter.",
        Style::default().fg(Color::DarkGray),
    )));
    Text::from(lines)
}

fn render_input(app: &App, frame: &mut Frame, area: Rect) {
    let loading = app.controller.is_loading();
    let (title, border_color) = if loading {
        (" Sending... ", Color::DarkGray)
    } else {
        (" Send (Enter) ", Color::Yellow)
    };

    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(border_color))
        .title(title);

    let inner_width = area.width.saturating_sub(2) as usize;
    let (visible_text, cursor_x) =
        input_viewport(app.controller.input(), app.input_cursor, inner_width);

    let input_style = if loading {
        Style::default().fg(Color::DarkGray)
    } else {
        Style::default().fg(Color::Cyan)
    };

    let paragraph = if app.controller.input().is_empty() && !loading {
        Paragraph::new(Span::styled(
            "Type your message...",
            Style::default().fg(Color::DarkGray),
        ))
    } else {
        Paragraph::new(visible_text).style(input_style)
    };

    frame.render_widget(paragraph.block(block), area);

    if !loading {
        frame.set_cursor_position((area.x + cursor_x + 1, area.y + 1));
    }
}

/// Horizontal scrolling in display columns: the slice of `input` that fits in
/// `width` columns with the cursor cell visible, and the cursor's column.
fn input_viewport(input: &str, cursor: usize, width: usize) -> (String, u16) {
    let widths: Vec<(char, usize)> = input
        .chars()
        .map(|c| {
            let mut buf = [0u8; 4];
            (c, display_width(c.encode_utf8(&mut buf)))
        })
        .collect();
    let cursor = cursor.min(widths.len());
    if width == 0 {
        return (String::new(), 0);
    }

    // Drop leading characters until text before the cursor plus the cursor cell fits
    let mut start = 0;
    let mut before: usize = widths[..cursor].iter().map(|(_, w)| w).sum();
    while start < cursor && before + 1 > width {
        before -= widths[start].1;
        start += 1;
    }

    let mut visible = String::new();
    let mut used = 0;
    for &(c, w) in &widths[start..] {
        if used + w > width {
            break;
        }
        visible.push(c);
        used += w;
    }

    (visible, before as u16)
}

fn render_footer(app: &App, frame: &mut Frame, area: Rect) {
    // Key style: dark background with bright text for visibility on both light/dark terminals
    let key_style = Style::default().bg(Color::DarkGray).fg(Color::White);
    let label_style = Style::default().bg(Color::Black).fg(Color::White);

    let mut hints = vec![
        Span::styled(" Enter ", key_style),
        Span::styled(" send ", label_style),
        Span::styled(" PgUp/PgDn ", key_style),
        Span::styled(" scroll ", label_style),
    ];
    if app.controller.last_error().is_some() {
        hints.push(Span::styled(" Esc ", key_style));
        hints.push(Span::styled(" dismiss ", label_style));
    } else {
        hints.push(Span::styled(" Esc ", key_style));
        hints.push(Span::styled(" quit ", label_style));
    }

    frame.render_widget(Paragraph::new(Line::from(hints)), area);
}

fn render_recovery(app: &App, frame: &mut Frame) {
    let area = frame.area();
    frame.render_widget(Clear, area);

    let mut lines = vec![
        Line::from(Span::styled(
            "Something went wrong.",
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        )),
        Line::default(),
    ];
    if let Some(fault) = &app.render_fault {
        lines.push(Line::from(Span::styled(
            fault.clone(),
            Style::default().fg(Color::DarkGray),
        )));
        lines.push(Line::default());
    }
    lines.push(Line::from(vec![
        Span::styled(" r ", Style::default().bg(Color::DarkGray).fg(Color::White)),
        Span::raw(" restart   "),
        Span::styled(" q ", Style::default().bg(Color::DarkGray).fg(Color::White)),
        Span::raw(" quit"),
    ]));

    let [_, middle, _] = Layout::vertical([
        Constraint::Percentage(35),
        Constraint::Min(0),
        Constraint::Percentage(35),
    ])
    .areas(area);

    let screen = Paragraph::new(lines)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    frame.render_widget(screen, middle);
}
