//! List view state machine. Every change to `(page, title, owner)` produces a
//! `FetchTicket`; a response only lands if its token is still the pending one.

use crate::location::ViewLocation;
use crate::pagination::{page_control, PageControl};
use crate::service::{
    Contribution, FetchError, FetchOutcome, FetchTicket, ListingPage, ListingQuery, SearchParams,
};

pub const FETCH_ERROR_MESSAGE: &str = "Failed to fetch contributions. Please try again later.";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewState {
    Loading,
    Loaded {
        contributions: Vec<Contribution>,
        total_pages: u32,
    },
    Empty,
    Error(String),
}

pub struct ListController {
    location: ViewLocation,
    per_page: u32,
    total_items: u64,
    view: ViewState,
    next_token: u64,
    pending: Option<u64>,
}

impl ListController {
    pub fn new(location: ViewLocation, per_page: u32) -> Self {
        Self {
            location,
            per_page: per_page.max(1),
            total_items: 0,
            view: ViewState::Loading,
            next_token: 0,
            pending: None,
        }
    }

    pub fn location(&self) -> &ViewLocation {
        &self.location
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn current_page(&self) -> u32 {
        self.location.page
    }

    pub fn total_items(&self) -> u64 {
        self.total_items
    }

    pub fn total_pages(&self) -> u32 {
        let pages = self.total_items.div_ceil(u64::from(self.per_page));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    pub fn is_loading(&self) -> bool {
        self.view == ViewState::Loading
    }

    pub fn contributions(&self) -> &[Contribution] {
        match &self.view {
            ViewState::Loaded { contributions, .. } => contributions,
            _ => &[],
        }
    }

    pub fn page_control(&self) -> Option<PageControl> {
        page_control(self.location.page, self.total_pages())
    }

    /// Enter `Loading` and issue a request for the current state.
    pub fn load(&mut self) -> FetchTicket {
        let token = self.next_token;
        self.next_token = self.next_token.wrapping_add(1);
        self.pending = Some(token);
        self.view = ViewState::Loading;
        FetchTicket {
            token,
            query: ListingQuery::new(self.location.page, self.per_page, &self.location.search),
        }
    }

    pub fn refresh(&mut self) -> FetchTicket {
        self.load()
    }

    /// Move to `location`; nothing is fetched when it equals the current one.
    pub fn navigate(&mut self, location: ViewLocation) -> Option<FetchTicket> {
        if location == self.location {
            return None;
        }
        self.location = location;
        Some(self.load())
    }

    pub fn submit_search(&mut self, search: SearchParams) -> Option<FetchTicket> {
        self.navigate(ViewLocation::new(1, search))
    }

    pub fn clear_search(&mut self) -> Option<FetchTicket> {
        self.navigate(ViewLocation::default())
    }

    /// Out-of-range pages are ignored; with no known total only page 1 is in range.
    pub fn select_page(&mut self, page: u32) -> Option<FetchTicket> {
        if page == self.location.page || page < 1 || page > self.total_pages().max(1) {
            return None;
        }
        self.navigate(self.location.with_page(page))
    }

    /// Works from any page past the first, even when the total is unknown.
    pub fn previous_page(&mut self) -> Option<FetchTicket> {
        if self.location.page <= 1 {
            return None;
        }
        let page = (self.location.page - 1).min(self.total_pages().max(1));
        self.navigate(self.location.with_page(page))
    }

    pub fn next_page(&mut self) -> Option<FetchTicket> {
        if self.location.page >= self.total_pages() {
            return None;
        }
        self.select_page(self.location.page + 1)
    }

    pub fn first_page(&mut self) -> Option<FetchTicket> {
        if self.location.page <= 1 {
            return None;
        }
        self.navigate(self.location.with_page(1))
    }

    pub fn last_page(&mut self) -> Option<FetchTicket> {
        self.select_page(self.total_pages())
    }

    /// Apply a finished request. Returns `false` when the response was stale.
    pub fn apply(&mut self, token: u64, result: Result<ListingPage, FetchError>) -> bool {
        if self.pending != Some(token) {
            tracing::debug!(token, pending = ?self.pending, "discarding stale listing response");
            return false;
        }
        self.pending = None;

        match FetchOutcome::from(result) {
            FetchOutcome::Success(page) => {
                self.total_items = page.total;
                tracing::info!(
                    token,
                    count = page.contributions.len(),
                    total = page.total,
                    "contributions loaded"
                );
                self.view = ViewState::Loaded {
                    contributions: page.contributions,
                    total_pages: self.total_pages(),
                };
            }
            FetchOutcome::Empty { total } => {
                self.total_items = total;
                tracing::info!(token, total, "no contributions on this page");
                self.view = ViewState::Empty;
            }
            FetchOutcome::Failure(err) => {
                self.total_items = 0;
                tracing::error!(token, error = %err, "failed to fetch contributions");
                self.view = ViewState::Error(FETCH_ERROR_MESSAGE.to_string());
            }
        }
        true
    }
}
