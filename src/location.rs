//! Shareable view location: the page and filters encoded as a query string,
//! so the same view can be reopened later with `--location`.

use url::form_urlencoded;

use crate::service::SearchParams;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewLocation {
    pub page: u32,
    pub search: SearchParams,
}

impl Default for ViewLocation {
    fn default() -> Self {
        Self {
            page: 1,
            search: SearchParams::default(),
        }
    }
}

impl ViewLocation {
    pub fn new(page: u32, search: SearchParams) -> Self {
        Self {
            page: page.max(1),
            search,
        }
    }

    /// Lenient parse: missing keys take their defaults, a bad page becomes 1,
    /// unknown keys are ignored.
    pub fn parse(query: &str) -> Self {
        let query = query.trim().trim_start_matches('?');
        let mut page = 1;
        let mut title = String::new();
        let mut owner = String::new();

        for (key, value) in form_urlencoded::parse(query.as_bytes()) {
            match key.as_ref() {
                "page" => page = value.trim().parse::<u32>().ok().filter(|p| *p >= 1).unwrap_or(1),
                "title" => title = value.into_owned(),
                "owner" => owner = value.into_owned(),
                _ => {}
            }
        }

        Self::new(page, SearchParams::new(&title, &owner))
    }

    pub fn to_query_string(&self) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        serializer.append_pair("page", &self.page.to_string());
        if !self.search.title.is_empty() {
            serializer.append_pair("title", &self.search.title);
        }
        if !self.search.owner.is_empty() {
            serializer.append_pair("owner", &self.search.owner);
        }
        serializer.finish()
    }

    pub fn with_page(&self, page: u32) -> Self {
        Self::new(page, self.search.clone())
    }
}
