use std::sync::mpsc::{Receiver, TryRecvError};

use ratatui::widgets::ListState;

use crate::config::Theme;
use crate::controller::{ListController, ViewState};
use crate::location::ViewLocation;
use crate::pagination::PageTarget;
use crate::service::{Contribution, FetchTicket, PageLoaded, PageLoader, SearchParams};

/// Called with the new theme whenever the user flips it.
pub type ThemeListener = Box<dyn FnMut(Theme)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchField {
    Title,
    Owner,
}

/// Draft values of the search bar; only applied on submit.
#[derive(Debug, Clone)]
pub struct SearchForm {
    pub title: String,
    pub owner: String,
    pub focus: SearchField,
}

impl SearchForm {
    fn from_params(params: &SearchParams) -> Self {
        Self {
            title: params.title.clone(),
            owner: params.owner.clone(),
            focus: SearchField::Title,
        }
    }

    pub fn focused_mut(&mut self) -> &mut String {
        match self.focus {
            SearchField::Title => &mut self.title,
            SearchField::Owner => &mut self.owner,
        }
    }

    pub fn toggle_focus(&mut self) {
        self.focus = match self.focus {
            SearchField::Title => SearchField::Owner,
            SearchField::Owner => SearchField::Title,
        };
    }

    pub fn params(&self) -> SearchParams {
        SearchParams::new(&self.title, &self.owner)
    }
}

pub struct App {
    pub controller: ListController,
    pub list_state: ListState,
    pub should_quit: bool,
    pub search: SearchForm,
    pub search_mode: bool,
    pub location_mode: bool,
    pub location_input: String,
    pub show_help: bool,
    pub show_details: bool,
    pub detail_scroll: usize,
    pub status_message: Option<String>,
    pub theme: Theme,
    page_loader: PageLoader,
    events: Receiver<PageLoaded>,
    on_theme_change: ThemeListener,
}

impl App {
    pub fn new(
        controller: ListController,
        page_loader: PageLoader,
        events: Receiver<PageLoaded>,
        theme: Theme,
        on_theme_change: ThemeListener,
    ) -> Self {
        let search = SearchForm::from_params(&controller.location().search);
        let mut app = Self {
            controller,
            list_state: ListState::default(),
            should_quit: false,
            search,
            search_mode: false,
            location_mode: false,
            location_input: String::new(),
            show_help: false,
            show_details: false,
            detail_scroll: 0,
            status_message: None,
            theme,
            page_loader,
            events,
            on_theme_change,
        };
        let ticket = app.controller.load();
        app.dispatch(Some(ticket));
        app
    }

    fn dispatch(&mut self, ticket: Option<FetchTicket>) {
        let Some(ticket) = ticket else {
            return;
        };
        self.list_state.select(None);
        self.show_details = false;
        tracing::info!(
            token = ticket.token,
            skip = ticket.query.skip,
            limit = ticket.query.limit,
            title = ticket.query.title.as_deref().unwrap_or(""),
            owner = ticket.query.owner.as_deref().unwrap_or(""),
            "fetching contributions"
        );
        (self.page_loader)(ticket);
    }

    /// Drain finished requests; returns true when the view changed.
    pub fn process_background(&mut self) -> bool {
        let mut changed = false;
        loop {
            match self.events.try_recv() {
                Ok(loaded) => changed |= self.handle_page_loaded(loaded),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::warn!("listing loader disconnected");
                    break;
                }
            }
        }
        changed
    }

    pub fn handle_page_loaded(&mut self, loaded: PageLoaded) -> bool {
        if !self.controller.apply(loaded.token, loaded.result) {
            return false;
        }
        if !self.controller.contributions().is_empty() {
            self.list_state.select(Some(0));
        }
        true
    }

    pub fn is_loading(&self) -> bool {
        self.controller.is_loading()
    }

    pub fn view(&self) -> &ViewState {
        self.controller.view()
    }

    pub fn location(&self) -> &ViewLocation {
        self.controller.location()
    }

    // Search bar

    pub fn start_search(&mut self) {
        self.search = SearchForm::from_params(&self.controller.location().search);
        self.search_mode = true;
    }

    pub fn cancel_search(&mut self) {
        self.search = SearchForm::from_params(&self.controller.location().search);
        self.search_mode = false;
    }

    pub fn submit_search(&mut self) {
        self.search_mode = false;
        let params = self.search.params();
        let ticket = self.controller.submit_search(params);
        self.dispatch(ticket);
    }

    pub fn clear_search(&mut self) {
        self.search = SearchForm::from_params(&SearchParams::default());
        self.search_mode = false;
        let ticket = self.controller.clear_search();
        self.dispatch(ticket);
    }

    // Location prompt

    pub fn start_location_prompt(&mut self) {
        self.location_input = self.controller.location().to_query_string();
        self.location_mode = true;
    }

    pub fn cancel_location_prompt(&mut self) {
        self.location_mode = false;
        self.location_input.clear();
    }

    pub fn submit_location(&mut self) {
        self.location_mode = false;
        let location = ViewLocation::parse(&self.location_input);
        self.location_input.clear();
        self.navigate(location);
    }

    /// Jump to a location coming from outside the list view.
    pub fn navigate(&mut self, location: ViewLocation) {
        self.search = SearchForm::from_params(&location.search);
        let ticket = self.controller.navigate(location);
        self.dispatch(ticket);
    }

    // Pages

    pub fn next_page(&mut self) {
        let ticket = self.controller.next_page();
        self.dispatch(ticket);
    }

    pub fn previous_page(&mut self) {
        let ticket = self.controller.previous_page();
        self.dispatch(ticket);
    }

    pub fn first_page(&mut self) {
        let ticket = self.controller.first_page();
        self.dispatch(ticket);
    }

    pub fn last_page(&mut self) {
        let ticket = self.controller.last_page();
        self.dispatch(ticket);
    }

    pub fn go_to_page(&mut self, page: u32) {
        let ticket = self.controller.select_page(page);
        self.dispatch(ticket);
    }

    pub fn activate_page_target(&mut self, target: PageTarget) {
        match target {
            PageTarget::Previous => self.previous_page(),
            PageTarget::Next => self.next_page(),
            PageTarget::Page(n) => self.go_to_page(n),
            PageTarget::Gap => {}
        }
    }

    pub fn refresh(&mut self) {
        let ticket = self.controller.refresh();
        self.dispatch(Some(ticket));
        self.status_message = Some("Refreshing".into());
    }

    // Selection within the current page

    pub fn next(&mut self) {
        let len = self.controller.contributions().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        self.list_state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.controller.contributions().len();
        if len == 0 {
            return;
        }
        let i = match self.list_state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        self.list_state.select(Some(i));
    }

    pub fn selected_contribution(&self) -> Option<&Contribution> {
        self.list_state
            .selected()
            .and_then(|i| self.controller.contributions().get(i))
    }

    pub fn open_details(&mut self) {
        if self.selected_contribution().is_some() {
            self.show_details = true;
            self.detail_scroll = 0;
        }
    }

    pub fn close_details(&mut self) {
        self.show_details = false;
    }

    pub fn detail_scroll_down(&mut self, amount: usize) {
        self.detail_scroll = self.detail_scroll.saturating_add(amount);
    }

    pub fn detail_scroll_up(&mut self, amount: usize) {
        self.detail_scroll = self.detail_scroll.saturating_sub(amount);
    }

    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    pub fn toggle_theme(&mut self) {
        self.theme = self.theme.toggled();
        (self.on_theme_change)(self.theme);
        self.status_message = Some(format!("Switched to {} mode", self.theme.label()));
    }

    pub fn clear_status_message(&mut self) {
        self.status_message = None;
    }
}
