mod app;
mod config;
mod controller;
mod location;
mod pagination;
mod service;
mod ui;

use std::fs::{self, OpenOptions};
use std::io::{stdout, Stdout};
use std::path::Path;
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use crossterm::{
    event::{
        self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
        KeyModifiers, MouseButton, MouseEvent, MouseEventKind,
    },
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{prelude::*, Terminal};
use tracing_subscriber::EnvFilter;

use app::App;
use config::{AppDirs, Cli, PreferenceStore, Theme};
use controller::{ListController, ViewState};
use service::{spawn_loader, HttpSource};

const LOADING_POLL_INTERVAL: Duration = Duration::from_millis(100);
const IDLE_POLL_INTERVAL: Duration = Duration::from_secs(1);

fn main() -> Result<()> {
    let cli = Cli::parse();
    let dirs = AppDirs::resolve(&cli).context("failed to resolve application directories")?;
    init_logging(&dirs.log_path(&cli))?;

    let source = HttpSource::new(&cli.api_url, cli.request_timeout())
        .with_context(|| format!("invalid API URL {:?}", cli.api_url))?;
    tracing::info!(
        endpoint = %source.endpoint(),
        per_page = cli.per_page,
        "starting contribview"
    );

    let store = PreferenceStore::new(dirs.preferences_path());
    tracing::debug!(path = %store.path().display(), "loading preferences");
    let prefs = store.load_or_default();
    let colorfgbg = std::env::var("COLORFGBG").ok();
    let theme = Theme::initial(&prefs, colorfgbg.as_deref());
    let on_theme_change = Box::new(move |theme: Theme| {
        if let Err(e) = store.save_theme(theme) {
            tracing::warn!(error = %e, "failed to persist theme");
        }
    });

    let (tx, rx) = mpsc::channel();
    let loader = spawn_loader(Arc::new(source), tx);
    let controller = ListController::new(cli.initial_location(), cli.per_page);

    // Setup terminal with mouse capture
    enable_raw_mode().context("failed to enable raw mode")?;
    execute!(stdout(), EnterAlternateScreen, EnableMouseCapture)
        .context("failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout());
    let mut terminal = Terminal::new(backend).context("failed to create terminal backend")?;

    let mut app = App::new(controller, loader, rx, theme, on_theme_change);
    let result = run(&mut terminal, &mut app);

    // Cleanup terminal
    disable_raw_mode().context("failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )
    .context("failed to leave alternate screen")?;
    terminal.show_cursor().context("failed to restore cursor")?;

    result?;
    println!(
        "Reopen this view with: contribview --location '{}'",
        app.location().to_query_string()
    );
    Ok(())
}

fn init_logging(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create log directory {}", parent.display()))?;
    }
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))
}

fn run(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        app.process_background();
        terminal
            .draw(|frame| ui::render(frame, app, Utc::now()))
            .context("failed to draw frame")?;

        let poll_timeout = if app.is_loading() {
            LOADING_POLL_INTERVAL
        } else {
            IDLE_POLL_INTERVAL
        };
        if !event::poll(poll_timeout).context("event polling failed")? {
            continue;
        }

        match event::read().context("failed to read event")? {
            Event::Key(key) if key.kind == KeyEventKind::Press => handle_key(app, key),
            Event::Mouse(mouse) => {
                let size = terminal.size().context("failed to read terminal size")?;
                handle_mouse_event(app, mouse, Rect::new(0, 0, size.width, size.height));
            }
            _ => {}
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn handle_key(app: &mut App, key: KeyEvent) {
    // Help can be toggled from anywhere except text entry
    if key.code == KeyCode::Char('?') && !app.search_mode && !app.location_mode {
        app.toggle_help();
        return;
    }

    if app.show_help {
        app.show_help = false;
        return;
    }

    if app.location_mode {
        match key.code {
            KeyCode::Esc => app.cancel_location_prompt(),
            KeyCode::Enter => app.submit_location(),
            KeyCode::Backspace => {
                app.location_input.pop();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.location_input.clear();
            }
            KeyCode::Char(c) => app.location_input.push(c),
            _ => {}
        }
        return;
    }

    if app.search_mode {
        match key.code {
            KeyCode::Esc => app.cancel_search(),
            KeyCode::Enter => app.submit_search(),
            KeyCode::Tab | KeyCode::BackTab => app.search.toggle_focus(),
            KeyCode::Backspace => {
                app.search.focused_mut().pop();
            }
            KeyCode::Char('u') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                app.search.focused_mut().clear();
            }
            KeyCode::Char(c) => app.search.focused_mut().push(c),
            _ => {}
        }
        return;
    }

    if app.show_details {
        match key.code {
            KeyCode::Esc | KeyCode::Char('i') | KeyCode::Enter | KeyCode::Char('q') => {
                app.close_details()
            }
            KeyCode::Down | KeyCode::Char('j') => app.detail_scroll_down(1),
            KeyCode::Up | KeyCode::Char('k') => app.detail_scroll_up(1),
            KeyCode::PageDown => app.detail_scroll_down(10),
            KeyCode::PageUp => app.detail_scroll_up(10),
            _ => {}
        }
        return;
    }

    app.clear_status_message();
    match key.code {
        KeyCode::Char('q') => app.should_quit = true,
        KeyCode::Esc => {
            if !app.location().search.is_empty() {
                app.clear_search();
            } else {
                app.should_quit = true;
            }
        }
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            app.should_quit = true;
        }
        KeyCode::Char('/') => app.start_search(),
        KeyCode::Char('c') => app.clear_search(),
        KeyCode::Char('o') => app.start_location_prompt(),
        KeyCode::Char('j') | KeyCode::Down => app.next(),
        KeyCode::Char('k') | KeyCode::Up => app.previous(),
        KeyCode::Char('n') | KeyCode::Right | KeyCode::PageDown => app.next_page(),
        KeyCode::Char('p') | KeyCode::Left | KeyCode::PageUp => app.previous_page(),
        KeyCode::Char('g') | KeyCode::Home => app.first_page(),
        KeyCode::Char('G') | KeyCode::End => app.last_page(),
        KeyCode::Char('i') | KeyCode::Enter => app.open_details(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('d') => app.toggle_theme(),
        _ => {}
    }
}

fn handle_mouse_event(app: &mut App, mouse: MouseEvent, frame_size: Rect) {
    // Don't handle mouse events when an overlay or prompt is shown
    if app.show_help || app.show_details || app.search_mode || app.location_mode {
        return;
    }

    let regions = ui::get_layout_regions(frame_size);

    match mouse.kind {
        MouseEventKind::Down(MouseButton::Left) => {
            if mouse_in_rect(mouse, regions.pagination) {
                // The control is only drawn over a loaded page
                if matches!(app.view(), ViewState::Loaded { .. })
                    && let Some(control) = app.controller.page_control()
                    && let Some(target) =
                        pagination::hit_test(regions.pagination, &control, mouse.column)
                {
                    app.activate_page_target(target);
                }
            } else if mouse_in_rect(mouse, regions.list) {
                if let Some(index) = ui::list_index_at(app, regions.list, mouse.row) {
                    app.list_state.select(Some(index));
                }
            } else if mouse_in_rect(mouse, regions.search_bar) {
                app.start_search();
            }
        }
        MouseEventKind::ScrollUp => {
            if mouse_in_rect(mouse, regions.list) {
                app.previous();
            }
        }
        MouseEventKind::ScrollDown => {
            if mouse_in_rect(mouse, regions.list) {
                app.next();
            }
        }
        _ => {}
    }
}

fn mouse_in_rect(mouse: MouseEvent, rect: Rect) -> bool {
    mouse.column >= rect.x
        && mouse.column < rect.x + rect.width
        && mouse.row >= rect.y
        && mouse.row < rect.y + rect.height
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::tests::Harness;
    use crate::location::ViewLocation;

    fn make_mouse(column: u16, row: u16) -> MouseEvent {
        MouseEvent {
            kind: MouseEventKind::Down(MouseButton::Left),
            column,
            row,
            modifiers: KeyModifiers::empty(),
        }
    }

    fn press(app: &mut App, code: KeyCode) {
        handle_key(app, KeyEvent::new(code, KeyModifiers::empty()));
    }

    fn type_text(app: &mut App, text: &str) {
        for c in text.chars() {
            press(app, KeyCode::Char(c));
        }
    }

    #[test]
    fn test_mouse_in_rect_inside() {
        let rect = Rect::new(10, 10, 20, 15);
        assert!(mouse_in_rect(make_mouse(15, 15), rect));
    }

    #[test]
    fn test_mouse_in_rect_bottom_right_exclusive() {
        let rect = Rect::new(10, 10, 20, 15);
        assert!(!mouse_in_rect(make_mouse(30, 25), rect));
        assert!(mouse_in_rect(make_mouse(29, 24), rect));
    }

    #[test]
    fn test_mouse_in_rect_zero_rect() {
        let rect = Rect::new(5, 5, 0, 0);
        assert!(!mouse_in_rect(make_mouse(5, 5), rect));
    }

    #[test]
    fn test_keys_search_flow() {
        let mut h = Harness::new(ViewLocation::parse("page=2"));
        h.respond_last(14, 60);

        press(&mut h.app, KeyCode::Char('/'));
        assert!(h.app.search_mode);
        type_text(&mut h.app, "Test");
        press(&mut h.app, KeyCode::Tab);
        type_text(&mut h.app, "Owner");
        press(&mut h.app, KeyCode::Enter);

        let ticket = h.last_ticket();
        assert_eq!(ticket.query.skip, 0);
        assert_eq!(ticket.query.title.as_deref(), Some("Test"));
        assert_eq!(ticket.query.owner.as_deref(), Some("Owner"));
    }

    #[test]
    fn test_keys_while_searching_do_not_quit() {
        let mut h = Harness::new(ViewLocation::default());
        press(&mut h.app, KeyCode::Char('/'));
        type_text(&mut h.app, "q?");
        assert!(!h.app.should_quit);
        assert!(!h.app.show_help);
        assert_eq!(h.app.search.title, "q?");
    }

    #[test]
    fn test_escape_clears_search_before_quitting() {
        let mut h = Harness::new(ViewLocation::parse("title=news"));
        press(&mut h.app, KeyCode::Esc);
        assert!(!h.app.should_quit);
        assert!(h.app.location().search.is_empty());
        press(&mut h.app, KeyCode::Esc);
        assert!(h.app.should_quit);
    }

    #[test]
    fn test_page_keys() {
        let mut h = Harness::new(ViewLocation::default());
        h.respond_last(14, 100);
        press(&mut h.app, KeyCode::Char('p'));
        assert_eq!(h.ticket_count(), 1);
        press(&mut h.app, KeyCode::Char('n'));
        assert_eq!(h.app.location().page, 2);
        h.respond_last(14, 100);
        press(&mut h.app, KeyCode::Char('G'));
        assert_eq!(h.app.location().page, 8);
    }

    #[test]
    fn test_click_on_page_number() {
        let mut h = Harness::new(ViewLocation::default());
        h.respond_last(14, 70);
        let frame = Rect::new(0, 0, 100, 40);
        let regions = ui::get_layout_regions(frame);
        let control = h.app.controller.page_control().unwrap();
        let segs = pagination::segments(&control);
        // Prev, " 1 ", " 2 ": aim at the middle of page 2
        let x = pagination::control_origin(regions.pagination, &segs)
            + segs[0].width()
            + 1
            + segs[1].width()
            + 1
            + 1;
        handle_mouse_event(&mut h.app, make_mouse(x, regions.pagination.y), frame);
        assert_eq!(h.app.location().page, 2);
    }

    #[test]
    fn test_click_on_hidden_page_control_is_ignored() {
        let mut h = Harness::new(ViewLocation::default());
        h.respond_last(14, 70);
        h.app.refresh();
        let frame = Rect::new(0, 0, 100, 40);
        let regions = ui::get_layout_regions(frame);
        let control = h.app.controller.page_control().unwrap();
        let segs = pagination::segments(&control);
        let last = pagination::control_origin(regions.pagination, &segs)
            + pagination::segments_width(&segs)
            - 2;
        handle_mouse_event(&mut h.app, make_mouse(last, regions.pagination.y), frame);
        assert_eq!(h.app.location().page, 1);
        assert_eq!(h.ticket_count(), 2);
    }

    #[test]
    fn test_click_selects_row() {
        let mut h = Harness::new(ViewLocation::default());
        h.respond_last(3, 3);
        let frame = Rect::new(0, 0, 100, 40);
        let regions = ui::get_layout_regions(frame);
        handle_mouse_event(&mut h.app, make_mouse(5, regions.list.y + 4), frame);
        assert_eq!(h.app.list_state.selected(), Some(1));
    }

    #[test]
    fn test_location_prompt_keys() {
        let mut h = Harness::new(ViewLocation::default());
        press(&mut h.app, KeyCode::Char('o'));
        assert!(h.app.location_mode);
        handle_key(
            &mut h.app,
            KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL),
        );
        type_text(&mut h.app, "page=3&title=x");
        press(&mut h.app, KeyCode::Enter);
        assert_eq!(h.app.location().page, 3);
        assert_eq!(h.last_ticket().query.title.as_deref(), Some("x"));
    }
}
