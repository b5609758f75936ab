use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::reddit::{self, Category, ListingError, ListingOptions, Post};

const NO_THUMBNAIL: &str = "default";
const DISPLAYABLE_HINTS: [&str; 2] = ["link", "image"];

/// One fetched page: displayable posts in fetch order plus the listing's `after` token.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub posts: Vec<Post>,
    pub after: Option<String>,
}

pub trait ListingService: Send + Sync {
    /// Fetches the next page of `community`, continuing from its stored cursor.
    ///
    /// The returned `after` token is not stored; callers commit it with
    /// [`ListingService::record_cursor`] once the page is accepted.
    fn fetch_listing(
        &self,
        community: &str,
        category: Category,
        opts: &ListingOptions,
    ) -> Result<Page, ListingError>;

    /// Stores the cursor of an accepted page, or forgets it once the listing ended.
    fn record_cursor(&self, community: &str, after: Option<String>);

    /// Forgets the pagination cursor held for `community`.
    fn reset_cursor(&self, community: &str);
}

/// Pagination cursors keyed by community name.
#[derive(Debug, Default, Clone)]
pub struct CursorStore {
    cursors: HashMap<String, String>,
}

impl CursorStore {
    pub fn get(&self, community: &str) -> Option<&str> {
        self.cursors.get(community).map(String::as_str)
    }

    /// Stores the cursor a fetch returned, or drops the community's entry once its listing ended.
    pub fn record(&mut self, community: &str, after: Option<String>) {
        match after.filter(|token| !token.is_empty()) {
            Some(token) => {
                self.cursors.insert(community.to_string(), token);
            }
            None => {
                self.cursors.remove(community);
            }
        }
    }

    pub fn clear(&mut self, community: &str) {
        self.cursors.remove(community);
    }
}

/// Whether a post may be shown: no adult, stickied or spoiler posts, a real
/// thumbnail, and a link or image hint.
pub fn is_displayable(post: &Post) -> bool {
    !post.over_18
        && !post.stickied
        && !post.spoiler
        && !post.thumbnail.is_empty()
        && post.thumbnail != NO_THUMBNAIL
        && DISPLAYABLE_HINTS.contains(&post.post_hint.as_str())
}

pub fn content_filter(listing: reddit::Listing<Post>) -> Vec<Post> {
    listing
        .children
        .into_iter()
        .map(|thing| thing.data)
        .filter(is_displayable)
        .collect()
}

pub struct RedditListingService {
    client: Arc<reddit::Client>,
    cursors: Mutex<CursorStore>,
}

impl RedditListingService {
    pub fn new(client: Arc<reddit::Client>) -> Self {
        Self {
            client,
            cursors: Mutex::new(CursorStore::default()),
        }
    }

    pub fn cursor(&self, community: &str) -> Option<String> {
        self.cursors.lock().get(community).map(str::to_string)
    }
}

impl ListingService for RedditListingService {
    fn fetch_listing(
        &self,
        community: &str,
        category: Category,
        opts: &ListingOptions,
    ) -> Result<Page, ListingError> {
        let mut opts = opts.clone();
        if let Some(after) = self.cursor(community) {
            opts.after = Some(after);
        }
        let mut listing = self.client.subreddit_listing(community, category, opts)?;
        let after = listing.after.take();
        let fetched = listing.children.len();
        let posts = content_filter(listing);
        tracing::info!(
            community,
            category = category.as_str(),
            fetched,
            kept = posts.len(),
            "listing fetched"
        );
        Ok(Page { posts, after })
    }

    fn record_cursor(&self, community: &str, after: Option<String>) {
        self.cursors.lock().record(community, after);
    }

    fn reset_cursor(&self, community: &str) {
        self.cursors.lock().clear(community);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reddit::{Listing, Thing};

    fn post(id: &str) -> Post {
        Post {
            id: id.into(),
            title: format!("post {id}"),
            thumbnail: format!("https://b.thumbs.redditmedia.com/{id}.jpg"),
            post_hint: "image".into(),
            ..Default::default()
        }
    }

    fn listing(posts: Vec<Post>) -> Listing<Post> {
        Listing {
            after: None,
            before: None,
            children: posts
                .into_iter()
                .map(|data| Thing {
                    kind: "t3".into(),
                    data,
                })
                .collect(),
        }
    }

    #[test]
    fn filter_excludes_unwanted_posts() {
        let mut adult = post("adult");
        adult.over_18 = true;
        let mut sticky = post("sticky");
        sticky.stickied = true;
        let mut spoiler = post("spoiler");
        spoiler.spoiler = true;
        let mut no_thumb = post("no_thumb");
        no_thumb.thumbnail.clear();
        let mut default_thumb = post("default_thumb");
        default_thumb.thumbnail = "default".into();
        let mut self_post = post("self");
        self_post.post_hint = "self".into();
        let mut video = post("video");
        video.post_hint = "hosted:video".into();

        let kept = content_filter(listing(vec![
            adult,
            sticky,
            spoiler,
            no_thumb,
            default_thumb,
            self_post,
            video,
        ]));
        assert!(kept.is_empty());
    }

    #[test]
    fn filter_keeps_order_of_displayable_posts() {
        let mut link = post("b");
        link.post_hint = "link".into();
        let mut sticky = post("x");
        sticky.stickied = true;
        let kept = content_filter(listing(vec![post("a"), sticky, link, post("c")]));
        let ids: Vec<_> = kept.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["a", "b", "c"]);
    }

    #[test]
    fn cursor_store_records_and_clears_per_community() {
        let mut store = CursorStore::default();
        store.record("pics", Some("t1".into()));
        store.record("aww", Some("t9".into()));
        assert_eq!(store.get("pics"), Some("t1"));

        store.record("pics", None);
        assert_eq!(store.get("pics"), None);
        assert_eq!(store.get("aww"), Some("t9"));

        store.record("aww", Some(String::new()));
        assert_eq!(store.get("aww"), None);
    }
}
