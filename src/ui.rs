use chrono::{DateTime, Utc};
use ratatui::{
    layout::{Constraint, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, List, ListItem, Paragraph, Wrap},
    Frame,
};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::app::{App, SearchField};
use crate::config::Theme;
use crate::controller::ViewState;
use crate::pagination::{control_origin, segments, segments_width, PageControl, PageTarget};
use crate::service::{format_timestamp, Contribution};

/// Rows taken by one contribution in the list.
pub const ITEM_HEIGHT: u16 = 3;

const EMPTY_MESSAGE: &str = "No contributions found matching your search criteria.";
const LOADING_MESSAGE: &str = "Loading contributions…";

struct Palette {
    bg: Color,
    fg: Color,
    muted: Color,
    accent: Color,
    header_bg: Color,
    header_fg: Color,
    highlight_bg: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            bg: Color::Black,
            fg: Color::White,
            muted: Color::DarkGray,
            accent: Color::Cyan,
            header_bg: Color::Blue,
            header_fg: Color::White,
            highlight_bg: Color::DarkGray,
        },
        Theme::Light => Palette {
            bg: Color::White,
            fg: Color::Black,
            muted: Color::Gray,
            accent: Color::Blue,
            header_bg: Color::LightBlue,
            header_fg: Color::Black,
            highlight_bg: Color::Gray,
        },
    }
}

/// Layout regions for mouse hit testing
pub struct LayoutRegions {
    pub header: Rect,
    pub search_bar: Rect,
    pub list: Rect,
    pub pagination: Rect,
    pub footer: Rect,
}

pub fn get_layout_regions(area: Rect) -> LayoutRegions {
    let chunks = Layout::vertical([
        Constraint::Length(3),
        Constraint::Length(3),
        Constraint::Min(1),
        Constraint::Length(1),
        Constraint::Length(3),
    ])
    .split(area);

    LayoutRegions {
        header: chunks[0],
        search_bar: chunks[1],
        list: chunks[2],
        pagination: chunks[3],
        footer: chunks[4],
    }
}

pub fn render(frame: &mut Frame, app: &mut App, now: DateTime<Utc>) {
    let p = palette(app.theme);
    let regions = get_layout_regions(frame.area());

    frame.render_widget(
        Block::default().style(Style::default().bg(p.bg).fg(p.fg)),
        frame.area(),
    );

    render_header(frame, app, &p, regions.header);
    render_search_bar(frame, app, &p, regions.search_bar);

    match app.controller.view() {
        ViewState::Loading => {
            let loading = Paragraph::new(LOADING_MESSAGE)
                .style(Style::default().fg(p.accent).add_modifier(Modifier::BOLD))
                .centered()
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(p.muted)),
                );
            frame.render_widget(loading, regions.list);
        }
        ViewState::Error(message) => {
            let error_msg = Paragraph::new(message.as_str())
                .style(Style::default().fg(Color::Red))
                .block(Block::default().borders(Borders::ALL).title("Error"));
            frame.render_widget(error_msg, regions.list);
        }
        ViewState::Empty => {
            let empty = Paragraph::new(EMPTY_MESSAGE)
                .style(Style::default().fg(p.muted))
                .centered()
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .border_style(Style::default().fg(p.muted)),
                );
            frame.render_widget(empty, regions.list);
        }
        ViewState::Loaded {
            contributions,
            total_pages,
        } => {
            let width = regions.list.width.saturating_sub(5) as usize;
            let items: Vec<ListItem> = contributions
                .iter()
                .map(|c| contribution_item(c, now, width, &p))
                .collect();
            let title = format!(
                "Contributions (page {} of {}, {} total)",
                app.controller.current_page(),
                total_pages,
                app.controller.total_items()
            );
            let list = List::new(items)
                .block(
                    Block::default()
                        .borders(Borders::ALL)
                        .title(title)
                        .border_style(Style::default().fg(p.muted)),
                )
                .highlight_style(
                    Style::default()
                        .bg(p.highlight_bg)
                        .add_modifier(Modifier::BOLD),
                )
                .highlight_symbol(">> ");
            frame.render_stateful_widget(list, regions.list, &mut app.list_state);

            if let Some(control) = app.controller.page_control() {
                render_page_control(frame, &control, &p, regions.pagination);
            }
        }
    }

    render_footer(frame, app, &p, regions.footer);

    if app.show_details {
        render_details_modal(frame, app, now, &p);
    }

    if app.location_mode {
        render_location_prompt(frame, app, &p);
    }

    if app.show_help {
        render_help(frame, &p);
    }
}

fn render_header(frame: &mut Frame, app: &App, p: &Palette, area: Rect) {
    let location = app.location().to_query_string();
    let right = format!("{}  [{}]", location, app.theme.label());
    let title = "Contribution Viewer";
    let inner_width = area.width.saturating_sub(2) as usize;
    let pad = inner_width.saturating_sub(title.width() + right.width());

    let line = Line::from(vec![
        Span::styled(title, Style::default().add_modifier(Modifier::BOLD)),
        Span::raw(" ".repeat(pad)),
        Span::raw(right),
    ]);
    let header = Paragraph::new(line)
        .style(Style::default().bg(p.header_bg).fg(p.header_fg))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(header, area);
}

fn render_search_bar(frame: &mut Frame, app: &App, p: &Palette, area: Rect) {
    let field = |label: &'static str, value: &str, focused: bool| -> Vec<Span<'static>> {
        let shown = if app.search_mode {
            if focused {
                format!("{}_", value)
            } else {
                value.to_string()
            }
        } else if value.is_empty() {
            "(any)".to_string()
        } else {
            value.to_string()
        };
        let value_style = if app.search_mode && focused {
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD)
        } else if value.is_empty() && !app.search_mode {
            Style::default().fg(p.muted)
        } else {
            Style::default().fg(p.fg)
        };
        vec![
            Span::styled(format!("{}: ", label), Style::default().fg(p.accent)),
            Span::styled(shown, value_style),
        ]
    };

    let mut spans = field(
        "Title",
        &app.search.title,
        app.search.focus == SearchField::Title,
    );
    spans.push(Span::raw("    "));
    spans.extend(field(
        "Producer",
        &app.search.owner,
        app.search.focus == SearchField::Owner,
    ));

    let border = if app.search_mode {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(p.muted)
    };
    let bar = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .title("Search")
            .border_style(border),
    );
    frame.render_widget(bar, area);
}

fn contribution_item(
    c: &Contribution,
    now: DateTime<Utc>,
    width: usize,
    p: &Palette,
) -> ListItem<'static> {
    let status = c.status_at(now);
    let badge = format!("[{:9}] ", status.label());
    let title_width = width.saturating_sub(badge.width());

    let heading = Line::from(vec![
        Span::styled(badge, Style::default().fg(status.color()).add_modifier(Modifier::BOLD)),
        Span::styled(
            truncate_to_width(&c.title, title_width),
            Style::default().fg(p.fg).add_modifier(Modifier::BOLD),
        ),
    ]);
    let times = format!(
        "Producer: {}  ·  {} → {}",
        c.owner,
        format_timestamp(c.start_time),
        format_timestamp(c.end_time)
    );
    let meta = Line::from(Span::styled(
        truncate_to_width(&times, width),
        Style::default().fg(p.accent),
    ));
    let description = Line::from(Span::styled(
        truncate_to_width(&c.description.replace('\n', " "), width),
        Style::default().fg(p.muted),
    ));

    ListItem::new(vec![heading, meta, description])
}

fn render_page_control(frame: &mut Frame, control: &PageControl, p: &Palette, area: Rect) {
    let segs = segments(control);
    let mut spans = Vec::with_capacity(segs.len() * 2);
    for (i, seg) in segs.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        let style = match seg.target {
            PageTarget::Page(n) if n == control.current => Style::default()
                .bg(p.accent)
                .fg(p.bg)
                .add_modifier(Modifier::BOLD),
            _ if seg.enabled => Style::default().fg(p.fg),
            _ => Style::default().fg(p.muted),
        };
        spans.push(Span::styled(seg.label.clone(), style));
    }

    let x = control_origin(area, &segs);
    let width = segments_width(&segs).min(area.right().saturating_sub(x));
    frame.render_widget(
        Paragraph::new(Line::from(spans)),
        Rect::new(x, area.y, width, area.height),
    );
}

fn render_footer(frame: &mut Frame, app: &App, p: &Palette, area: Rect) {
    if let Some(ref msg) = app.status_message {
        let footer = Paragraph::new(msg.as_str())
            .style(Style::default().fg(Color::Green).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL));
        frame.render_widget(footer, area);
        return;
    }

    let footer_text = if app.show_help {
        "Press any key to close"
    } else if app.location_mode {
        "Type a location | Enter: Open | Esc: Cancel"
    } else if app.show_details {
        "j/k: Scroll | Esc/i/Enter: Close"
    } else if app.search_mode {
        "Type to edit | Tab: Switch field | Enter: Search | Esc: Cancel"
    } else if !app.location().search.is_empty() {
        "q: Quit | /: Search | c: Clear search | n/p: Next/Prev page | i: Details | \
         o: Location | d: Theme | ?: Help"
    } else {
        "q/Esc: Quit | /: Search | n/p: Next/Prev page | g/G: First/Last | i: Details | \
         o: Location | d: Theme | ?: Help"
    };
    let footer = Paragraph::new(footer_text)
        .style(Style::default().fg(p.muted))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(footer, area);
}

fn render_details_modal(frame: &mut Frame, app: &App, now: DateTime<Utc>, p: &Palette) {
    let Some(c) = app.selected_contribution() else {
        return;
    };
    let status = c.status_at(now);
    let label_style = Style::default().fg(p.accent).add_modifier(Modifier::BOLD);

    let mut lines = vec![
        Line::from(vec![
            Span::styled("Status:   ", label_style),
            Span::styled(status.label(), Style::default().fg(status.color())),
        ]),
        Line::from(vec![Span::styled("Producer: ", label_style), Span::raw(c.owner.clone())]),
        Line::from(vec![
            Span::styled("Start:    ", label_style),
            Span::raw(format_timestamp(c.start_time)),
        ]),
        Line::from(vec![
            Span::styled("End:      ", label_style),
            Span::raw(format_timestamp(c.end_time)),
        ]),
        Line::from(vec![Span::styled("Id:       ", label_style), Span::raw(c.id.to_string())]),
        Line::from(""),
    ];
    lines.extend(c.description.lines().map(|l| Line::from(l.to_string())));

    let area = centered_rect(70, 80, frame.area());
    let details = Paragraph::new(lines)
        .style(Style::default().fg(p.fg).bg(p.bg))
        .wrap(Wrap { trim: false })
        .scroll((app.detail_scroll.min(u16::MAX as usize) as u16, 0))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title(c.title.clone())
                .border_style(Style::default().fg(p.accent)),
        );
    frame.render_widget(Clear, area);
    frame.render_widget(details, area);
}

fn render_location_prompt(frame: &mut Frame, app: &App, p: &Palette) {
    let area = centered_fixed_rect(64, 3, frame.area());
    let prompt = Paragraph::new(format!("{}_", app.location_input))
        .style(Style::default().fg(Color::Yellow).bg(p.bg))
        .block(Block::default().borders(Borders::ALL).title("Open location"));
    frame.render_widget(Clear, area);
    frame.render_widget(prompt, area);
}

fn render_help(frame: &mut Frame, p: &Palette) {
    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD);

    let help_text = vec![
        Line::from(vec![Span::styled("Contributions", section_style)]),
        Line::from("  j / Down      Move down"),
        Line::from("  k / Up        Move up"),
        Line::from("  i / Enter     Open details"),
        Line::from(""),
        Line::from(vec![Span::styled("Pages", section_style)]),
        Line::from("  n / Right     Next page"),
        Line::from("  p / Left      Previous page"),
        Line::from("  g / Home      First page"),
        Line::from("  G / End       Last page"),
        Line::from(""),
        Line::from(vec![Span::styled("Search", section_style)]),
        Line::from("  /             Edit search"),
        Line::from("  Tab           Switch title/producer"),
        Line::from("  Enter         Run search"),
        Line::from("  c             Clear search"),
        Line::from(""),
        Line::from(vec![Span::styled("Mouse", section_style)]),
        Line::from("  Click         Select contribution or page"),
        Line::from("  Scroll        Move selection"),
        Line::from(""),
        Line::from(vec![Span::styled("Other", section_style)]),
        Line::from("  o             Open a location"),
        Line::from("  r             Refresh"),
        Line::from("  d             Toggle dark mode"),
        Line::from("  ?             Toggle this help"),
        Line::from("  q / Esc       Quit"),
    ];

    let area = centered_rect(50, 70, frame.area());

    let help = Paragraph::new(help_text)
        .style(Style::default().fg(p.fg))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Help")
                .style(Style::default().bg(p.bg)),
        );

    frame.render_widget(Clear, area);
    frame.render_widget(help, area);
}

/// Cut `text` to at most `max` columns, marking the cut with an ellipsis.
fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    if max == 0 {
        return String::new();
    }
    let mut out = String::new();
    let mut used = 0;
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w + 1 > max {
            break;
        }
        out.push(ch);
        used += w;
    }
    out.push('…');
    out
}

fn centered_fixed_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + area.width.saturating_sub(width) / 2;
    let y = area.y + area.height.saturating_sub(height) / 2;
    Rect::new(
        x,
        y,
        width.min(area.width),
        height.min(area.height),
    )
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::vertical([
        Constraint::Percentage((100 - percent_y) / 2),
        Constraint::Percentage(percent_y),
        Constraint::Percentage((100 - percent_y) / 2),
    ])
    .split(area);

    Layout::horizontal([
        Constraint::Percentage((100 - percent_x) / 2),
        Constraint::Percentage(percent_x),
        Constraint::Percentage((100 - percent_x) / 2),
    ])
    .split(popup_layout[1])[1]
}

/// Index of the contribution drawn at `row`, if any.
pub fn list_index_at(app: &App, list_area: Rect, row: u16) -> Option<usize> {
    if row <= list_area.y || row >= list_area.bottom().saturating_sub(1) {
        return None;
    }
    let offset_rows = (row - list_area.y - 1) / ITEM_HEIGHT;
    let index = app.list_state.offset() + offset_rows as usize;
    (index < app.controller.contributions().len()).then_some(index)
}
