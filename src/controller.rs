use std::sync::Arc;

use crate::data::{ListingService, Page};
use crate::gallery::{self, Gallery, Presenter, SortKey};
use crate::reddit::{self, Category, ListingError, ListingOptions};

pub const DEFAULT_ERROR_TITLE: &str = "Something went wrong";
pub const DEFAULT_ERROR_MESSAGE: &str =
    "No data could be loaded. Does the subreddit exist?";
pub const NO_POSTS_TITLE: &str = "No posts";
pub const NO_POSTS_MESSAGE: &str =
    "No posts were found. There was no suitable content, try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    L15,
    L30,
    L45,
    L60,
}

impl Limit {
    pub const ALL: [Limit; 4] = [Limit::L15, Limit::L30, Limit::L45, Limit::L60];

    pub fn value(self) -> u32 {
        match self {
            Limit::L15 => 15,
            Limit::L30 => 30,
            Limit::L45 => 45,
            Limit::L60 => 60,
        }
    }

    pub fn from_value(value: u32) -> Option<Self> {
        Limit::ALL.into_iter().find(|limit| limit.value() == value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Form {
    pub subreddit: String,
    pub category: Category,
    pub limit: Limit,
}

impl Default for Form {
    fn default() -> Self {
        Self {
            subreddit: "meme".into(),
            category: Category::Hot,
            limit: Limit::L15,
        }
    }
}

/// Modal dialog content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

impl Notice {
    fn new(title: &str, body: &str) -> Self {
        Self {
            title: title.to_string(),
            body: body.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Loading { request_id: u64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadOutcome {
    Rendered(usize),
    Empty,
    Errored,
}

/// A fetch prepared by [`Controller::begin_load`], runnable off the UI thread.
#[derive(Debug, Clone)]
pub struct LoadRequest {
    pub request_id: u64,
    pub community: String,
    pub category: Category,
    pub options: ListingOptions,
}

impl LoadRequest {
    pub fn execute(&self, service: &dyn ListingService) -> Result<Page, ListingError> {
        service.fetch_listing(&self.community, self.category, &self.options)
    }
}

#[derive(Debug, Clone)]
pub struct Options {
    pub form: Form,
    pub sort: Option<SortKey>,
    pub region: String,
    /// Host that comment thread links point at.
    pub base_url: String,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            form: Form::default(),
            sort: Some(SortKey::Score),
            region: reddit::DEFAULT_REGION.to_string(),
            base_url: reddit::DEFAULT_BASE_URL.to_string(),
        }
    }
}

pub struct Controller<P: Presenter = Gallery> {
    service: Arc<dyn ListingService>,
    presenter: P,
    form: Form,
    region: String,
    reload: bool,
    sort: Option<SortKey>,
    notice: Option<Notice>,
    phase: Phase,
    last_target: Option<(String, Category)>,
    next_request_id: u64,
}

impl Controller<Gallery> {
    pub fn new(service: Arc<dyn ListingService>, opts: Options) -> Self {
        let gallery = Gallery::new(&opts.base_url);
        Self::with_presenter(service, gallery, opts)
    }
}

impl<P: Presenter> Controller<P> {
    pub fn with_presenter(service: Arc<dyn ListingService>, presenter: P, opts: Options) -> Self {
        Self {
            service,
            presenter,
            form: opts.form,
            region: opts.region,
            reload: false,
            sort: opts.sort,
            notice: None,
            phase: Phase::Idle,
            last_target: None,
            next_request_id: 1,
        }
    }

    pub fn service(&self) -> Arc<dyn ListingService> {
        self.service.clone()
    }

    pub fn presenter(&self) -> &P {
        &self.presenter
    }

    pub fn form(&self) -> &Form {
        &self.form
    }

    pub fn sort_key(&self) -> Option<SortKey> {
        self.sort
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Loading { .. })
    }

    pub fn reload_pending(&self) -> bool {
        self.reload
    }

    /// The load button is enabled only while a subreddit is entered.
    pub fn can_load(&self) -> bool {
        !self.form.subreddit.is_empty()
    }

    pub fn on_subreddit_input(&mut self, text: impl Into<String>) {
        self.form.subreddit = text.into();
    }

    pub fn on_subreddit_change(&mut self) {
        self.reload = true;
    }

    pub fn set_category(&mut self, category: Category) {
        self.form.category = category;
        self.reload = true;
    }

    pub fn set_limit(&mut self, limit: Limit) {
        self.form.limit = limit;
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    /// Prepares the next fetch. Returns `None` while the load button is disabled.
    pub fn begin_load(&mut self) -> Option<LoadRequest> {
        if !self.can_load() {
            return None;
        }
        let community = reddit::normalize_subreddit(&self.form.subreddit);
        let category = self.form.category;

        if let Some((previous, previous_category)) = self.last_target.take() {
            if previous != community || previous_category != category {
                self.service.reset_cursor(&previous);
            }
        }
        if self.reload {
            self.presenter.clear();
            self.service.reset_cursor(&community);
            self.reload = false;
        }
        self.last_target = Some((community.clone(), category));

        let request_id = self.next_request_id;
        self.next_request_id = self.next_request_id.wrapping_add(1);
        self.phase = Phase::Loading { request_id };
        tracing::debug!(request_id, community = %community, category = category.as_str(), "load started");

        Some(LoadRequest {
            request_id,
            community,
            category,
            options: ListingOptions {
                limit: self.form.limit.value(),
                region: self.region.clone(),
                after: None,
            },
        })
    }

    /// Applies a finished fetch. Results of superseded requests are dropped and yield `None`,
    /// and only an accepted page moves the target's cursor.
    pub fn finish_load(
        &mut self,
        request_id: u64,
        result: Result<Page, ListingError>,
    ) -> Option<LoadOutcome> {
        match self.phase {
            Phase::Loading { request_id: current } if current == request_id => {}
            _ => {
                tracing::debug!(request_id, "discarding stale listing response");
                return None;
            }
        }
        self.phase = Phase::Idle;

        let outcome = match result {
            Ok(Page { posts, after }) => {
                if let Some((community, _)) = &self.last_target {
                    self.service.record_cursor(community, after);
                }
                let outcome = if posts.is_empty() {
                    self.notice = Some(Notice::new(NO_POSTS_TITLE, NO_POSTS_MESSAGE));
                    LoadOutcome::Empty
                } else {
                    LoadOutcome::Rendered(posts.len())
                };
                self.presenter.render_all(&posts);
                self.apply_sort(None);
                outcome
            }
            Err(err) => {
                tracing::error!(error = %err, status = ?err.status(), "failed to load listing");
                let body = err.reason().unwrap_or(DEFAULT_ERROR_MESSAGE);
                self.notice = Some(Notice::new(DEFAULT_ERROR_TITLE, body));
                LoadOutcome::Errored
            }
        };
        Some(outcome)
    }

    /// Runs a full load cycle on the calling thread.
    pub fn load(&mut self) -> Option<LoadOutcome> {
        let request = self.begin_load()?;
        let result = request.execute(self.service.as_ref());
        self.finish_load(request.request_id, result)
    }

    /// Reorders rendered entries by descending `key`, or by the current key when `None`.
    pub fn apply_sort(&mut self, key: Option<SortKey>) {
        if key.is_some() {
            self.sort = key;
        }
        let Some(key) = self.sort else {
            return;
        };
        gallery::assign_visual_order(self.presenter.entries_mut(), key);
    }

    pub fn clear_sort(&mut self) {
        self.sort = None;
    }
}
