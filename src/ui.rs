use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, Widget},
    Frame,
};
use unicode_width::UnicodeWidthStr;

use rote::app::{App, Screen};
use rote::celebration::Celebration;
use rote::editor::{Editor, Field};
use rote::session::TypingSession;
use rote::stats::Summary;
use rote::util::{minutes, round2};

const HORIZONTAL_MARGIN: u16 = 2;
const VERTICAL_MARGIN: u16 = 1;
const OBSCURED: char = '·';

pub fn draw(f: &mut Frame, app: &App) {
    let area = f.area();
    render(app, area, f.buffer_mut());
}

pub fn render(app: &App, area: Rect, buf: &mut Buffer) {
    if area.width <= HORIZONTAL_MARGIN * 2 || area.height <= VERTICAL_MARGIN * 2 + 2 {
        return;
    }

    match app.screen {
        Screen::Home => render_home(app, area, buf),
        Screen::Typing => render_typing(app, area, buf),
        Screen::Stats => render_stats(app, area, buf),
        Screen::Editor => {
            if let Some(editor) = app.editor.as_ref() {
                render_editor(editor, area, buf);
            }
        }
    }

    if let Some(notice) = &app.notice {
        let line = Rect::new(area.x, area.y + area.height - 1, area.width, 1);
        Paragraph::new(Span::styled(
            notice.as_str(),
            Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
        ))
        .alignment(Alignment::Center)
        .render(line, buf);
    }

    if app.celebration.is_active {
        render_celebration(&app.celebration, area, buf);
    }
}

fn bold() -> Style {
    Style::default().add_modifier(Modifier::BOLD)
}

fn dim() -> Style {
    Style::default().add_modifier(Modifier::DIM)
}

fn legend(keys: &[(&'static str, &'static str)]) -> Line<'static> {
    let mut spans = Vec::new();
    for (i, (key, action)) in keys.iter().enumerate() {
        if i > 0 {
            spans.push(Span::styled("  ", dim()));
        }
        spans.push(Span::styled(*key, bold().fg(Color::Cyan)));
        spans.push(Span::styled(format!(" {action}"), dim()));
    }
    Line::from(spans)
}

/// Header, body and footer rows inside the screen margins
fn frame_chunks(area: Rect) -> std::rc::Rc<[Rect]> {
    Layout::default()
        .direction(Direction::Vertical)
        .horizontal_margin(HORIZONTAL_MARGIN)
        .vertical_margin(VERTICAL_MARGIN)
        .constraints([
            Constraint::Length(2),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(area)
}

fn render_home(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = frame_chunks(area);
    let summary = app.summary();

    Paragraph::new(vec![
        Line::from(Span::styled("rote", bold().fg(Color::Magenta))),
        Line::from(Span::styled(
            format!(
                "{} snippets · {} tests · {:.2} min practiced",
                app.snippets.len(),
                summary.total_tests,
                summary.total_minutes()
            ),
            dim(),
        )),
    ])
    .render(chunks[0], buf);

    if app.snippets.is_empty() {
        Paragraph::new(Span::styled(
            "No snippets yet. Press a to add one.",
            Style::default().fg(Color::Yellow),
        ))
        .alignment(Alignment::Center)
        .render(chunks[1], buf);
    } else {
        let rows = app.snippets.iter().enumerate().map(|(idx, snippet)| {
            let style = if idx == app.cursor {
                bold().add_modifier(Modifier::REVERSED)
            } else {
                Style::default()
            };
            Row::new(vec![
                Cell::from(snippet.id.to_string()),
                Cell::from(snippet.title.clone()),
                Cell::from(snippet.test_count.to_string()),
                Cell::from(format!("{:.2}", round2(minutes(snippet.elapsed)))),
            ])
            .style(style)
        });

        Table::new(
            rows,
            [
                Constraint::Length(5),
                Constraint::Min(20),
                Constraint::Length(6),
                Constraint::Length(8),
            ],
        )
        .header(Row::new(vec!["#", "Title", "Tests", "Minutes"]).style(bold().fg(Color::Cyan)))
        .block(Block::default().borders(Borders::TOP))
        .render(chunks[1], buf);
    }

    Paragraph::new(legend(&[
        ("↑/↓", "move"),
        ("enter", "practice"),
        ("r", "random"),
        ("a", "add"),
        ("e", "edit"),
        ("d", "delete"),
        ("s", "stats"),
        ("q", "quit"),
    ]))
    .render(chunks[2], buf);
}

fn render_typing(app: &App, area: Rect, buf: &mut Buffer) {
    let Some(session) = app.session.as_ref() else {
        return;
    };
    let chunks = frame_chunks(area);
    let status = app.status();

    let title = app
        .selected
        .as_ref()
        .map(|s| s.title.as_str())
        .unwrap_or_default();
    let badge = if status.completed {
        Span::styled(" COMPLETE ", bold().fg(Color::Black).bg(Color::Green))
    } else if status.started {
        Span::styled(" RUNNING ", bold().fg(Color::Black).bg(Color::Yellow))
    } else {
        Span::styled(" READY ", dim())
    };

    Paragraph::new(vec![
        Line::from(vec![
            Span::styled(title.to_string(), bold().fg(Color::Magenta)),
            Span::raw("  "),
            badge,
        ]),
        Line::from(vec![
            Span::styled("speed ", dim()),
            Span::styled(format!("{:.2} cpm", session.chars_per_minute()), bold()),
            Span::styled("  time ", dim()),
            Span::styled(format!("{:.2} min", session.minutes_elapsed()), bold()),
        ]),
    ])
    .render(chunks[0], buf);

    let obscure = app.config.obscure_target && status.started && !session.is_revealed();
    Paragraph::new(code_lines(session, obscure))
        .block(Block::default().borders(Borders::TOP))
        .render(chunks[1], buf);

    let reveal = if session.is_revealed() { "hide" } else { "reveal" };
    Paragraph::new(legend(&[
        ("esc", "back"),
        ("^r", "restart"),
        ("^n", "random"),
        ("^e", reveal),
        ("^o", "edit"),
        ("^d", "delete"),
    ]))
    .render(chunks[2], buf);
}

/// Target text with the typed prefix highlighted. Untyped text is replaced
/// by dots when obscured; whitespace stays so the shape remains visible.
fn code_lines(session: &TypingSession, obscure: bool) -> Vec<Line<'static>> {
    let typed_chars = session.typed().chars().count();
    let done_style = bold().fg(Color::Green);
    let cursor_style = dim().add_modifier(Modifier::UNDERLINED | Modifier::BOLD);
    let hide = |c: char| if obscure && !c.is_whitespace() { OBSCURED } else { c };

    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in session.target().split('\n') {
        let chars: Vec<char> = raw.chars().collect();
        let done = typed_chars.saturating_sub(offset).min(chars.len());

        let mut spans = vec![Span::styled(
            chars[..done].iter().collect::<String>(),
            done_style,
        )];
        let mut rest = &chars[done..];
        let on_cursor_line = offset + done == typed_chars && !session.is_completed();
        if on_cursor_line {
            if let Some((&next, tail)) = rest.split_first() {
                spans.push(Span::styled(hide(next).to_string(), cursor_style));
                rest = tail;
            }
        }
        spans.push(Span::styled(
            rest.iter().map(|&c| hide(c)).collect::<String>(),
            dim(),
        ));

        lines.push(Line::from(spans));
        offset += chars.len() + 1;
    }
    lines
}

fn render_stats(app: &App, area: Rect, buf: &mut Buffer) {
    let chunks = frame_chunks(area);
    let summary = app.summary();

    Paragraph::new(vec![
        Line::from(Span::styled("Practice stats", bold().fg(Color::Magenta))),
        Line::from(Span::styled(
            format!(
                "{} tests · {:.2} min total",
                summary.total_tests,
                summary.total_minutes()
            ),
            dim(),
        )),
    ])
    .render(chunks[0], buf);

    render_summary_table(&summary, chunks[1], buf);

    Paragraph::new(legend(&[("esc", "back"), ("q", "quit")])).render(chunks[2], buf);
}

fn render_editor(editor: &Editor, area: Rect, buf: &mut Buffer) {
    let chunks = frame_chunks(area);
    let heading = if editor.target().is_some() {
        "Edit snippet"
    } else {
        "New snippet"
    };
    Paragraph::new(Line::from(Span::styled(heading, bold().fg(Color::Magenta))))
        .render(chunks[0], buf);

    let body = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Min(3)])
        .split(chunks[1]);

    let boxed = |name: &'static str, field: Field| {
        let style = if editor.field == field {
            Style::default().fg(Color::Cyan)
        } else {
            dim()
        };
        Block::default()
            .borders(Borders::ALL)
            .border_style(style)
            .title(name)
    };

    Paragraph::new(editor.title.as_str())
        .block(boxed("Title", Field::Title))
        .render(body[0], buf);
    Paragraph::new(editor.code.as_str())
        .block(boxed("Code", Field::Code))
        .render(body[1], buf);

    Paragraph::new(legend(&[
        ("tab", "next"),
        ("S-tab", "switch"),
        ("^s", "save"),
        ("esc", "cancel"),
    ]))
    .render(chunks[2], buf);
}

fn render_summary_table(summary: &Summary, area: Rect, buf: &mut Buffer) {
    let title_width = summary
        .rows
        .iter()
        .map(|row| row.title.width())
        .max()
        .unwrap_or(5)
        .clamp(5, 50) as u16;

    let rows = summary.rows.iter().map(|row| {
        let count_style = if row.count == 0 {
            dim()
        } else {
            Style::default().fg(Color::Green)
        };
        Row::new(vec![
            Cell::from(row.title.clone()).style(bold()),
            Cell::from(row.count.to_string()).style(count_style),
            Cell::from(format!("{:.2}", row.minutes())),
        ])
    });

    Table::new(
        rows,
        [
            Constraint::Length(title_width),
            Constraint::Length(6),
            Constraint::Length(8),
        ],
    )
    .header(Row::new(vec!["Title", "Tests", "Minutes"]).style(bold().fg(Color::Cyan)))
    .block(Block::default().borders(Borders::TOP))
    .column_spacing(2)
    .render(area, buf);
}

/// Render celebration particles over whatever screen is showing
fn render_celebration(celebration: &Celebration, area: Rect, buf: &mut Buffer) {
    let colors = [
        Color::Yellow,
        Color::Magenta,
        Color::Cyan,
        Color::Green,
        Color::Red,
        Color::Blue,
        Color::LightYellow,
    ];

    for particle in &celebration.particles {
        if particle.x < 0.0 || particle.y < 0.0 {
            continue;
        }
        let (x, y) = (particle.x as u16, particle.y as u16);
        if x >= area.width || y >= area.height {
            continue;
        }

        let color = colors[particle.color_index % colors.len()];
        let life = particle.life();
        let style = if life > 0.7 {
            Style::default().fg(color).add_modifier(Modifier::BOLD)
        } else if life > 0.3 {
            Style::default().fg(color)
        } else {
            Style::default().fg(color).add_modifier(Modifier::DIM)
        };

        if let Some(cell) = buf.cell_mut((area.x + x, area.y + y)) {
            cell.set_symbol(&particle.symbol.to_string());
            cell.set_style(style);
        }
    }

    let banner = celebration.banner;
    let width = (banner.width() as u16 + 4).min(area.width);
    let banner_area = Rect::new(
        area.x + (area.width - width) / 2,
        area.y + area.height / 2,
        width,
        1,
    );
    Paragraph::new(Span::styled(
        banner,
        bold().fg(Color::Black).bg(Color::Yellow),
    ))
    .alignment(Alignment::Center)
    .render(banner_area, buf);
}
