use serde::{Deserialize, Serialize};

use crate::reddit::{self, Post};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    #[default]
    Score,
    Downs,
    Created,
}

impl SortKey {
    pub const ALL: [SortKey; 3] = [SortKey::Score, SortKey::Downs, SortKey::Created];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortKey::Score => "score",
            SortKey::Downs => "downs",
            SortKey::Created => "created",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortKey::Score => "Score",
            SortKey::Downs => "Downvotes",
            SortKey::Created => "Newest",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        SortKey::ALL
            .into_iter()
            .find(|sort| sort.as_str().eq_ignore_ascii_case(key.trim()))
    }
}

/// One rendered card.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub post_id: String,
    pub score: i64,
    pub downs: i64,
    pub created_utc: f64,
    pub title: String,
    /// Comment thread; `None` renders the title as plain text.
    pub thread_url: Option<String>,
    pub thumbnail: String,
    pub link: String,
    /// Visual position assigned by the last sort pass.
    pub order: usize,
}

impl Entry {
    pub fn from_post(post: &Post, thread_base: &str, order: usize) -> Self {
        let thread_url = if post.permalink.is_empty() {
            None
        } else {
            Some(reddit::thread_url(thread_base, &post.permalink))
        };
        Self {
            post_id: post.id.clone(),
            score: post.score,
            downs: post.downs,
            created_utc: post.created_utc,
            title: post.title.clone(),
            thread_url,
            thumbnail: post.thumbnail.clone(),
            link: post.url.clone(),
            order,
        }
    }

    pub fn attribute(&self, key: SortKey) -> f64 {
        match key {
            SortKey::Score => self.score as f64,
            SortKey::Downs => self.downs as f64,
            SortKey::Created => self.created_utc,
        }
    }
}

pub trait Presenter {
    fn render_all(&mut self, posts: &[Post]);
    fn clear(&mut self);
    fn entries(&self) -> &[Entry];
    fn entries_mut(&mut self) -> &mut [Entry];
}

/// Entries in render order, as the terminal grid draws them.
#[derive(Debug, Clone)]
pub struct Gallery {
    entries: Vec<Entry>,
    thread_base: String,
}

impl Gallery {
    /// `thread_base` is the host that entry thread links are resolved against.
    pub fn new(thread_base: &str) -> Self {
        Self {
            entries: Vec::new(),
            thread_base: thread_base.to_string(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries sorted by their visual order index.
    pub fn visual_order(&self) -> Vec<&Entry> {
        let mut ordered: Vec<&Entry> = self.entries.iter().collect();
        ordered.sort_by_key(|entry| entry.order);
        ordered
    }
}

impl Presenter for Gallery {
    fn render_all(&mut self, posts: &[Post]) {
        let start = self.entries.len();
        self.entries.extend(
            posts
                .iter()
                .enumerate()
                .map(|(i, post)| Entry::from_post(post, &self.thread_base, start + i)),
        );
    }

    fn clear(&mut self) {
        self.entries.clear();
    }

    fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn entries_mut(&mut self) -> &mut [Entry] {
        &mut self.entries
    }
}

/// Ranks entries by descending `key` and writes the rank into each entry's order index.
/// Ties keep render order.
pub fn assign_visual_order(entries: &mut [Entry], key: SortKey) {
    let mut ranked: Vec<usize> = (0..entries.len()).collect();
    ranked.sort_by(|&a, &b| {
        entries[b]
            .attribute(key)
            .partial_cmp(&entries[a].attribute(key))
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (order, index) in ranked.into_iter().enumerate() {
        entries[index].order = order;
    }
}
