use std::sync::Arc;
use std::time::Duration;

use moka::sync::Cache;

use crate::types::Page;

const ALL_PAGES_KEY: &str = "all_pages";

/// Cached snapshot of the full page listing.
///
/// Entries expire a fixed time after insertion whether or not they are read.
/// Writers invalidate; the next reader rebuilds. Two readers rebuilding at
/// once both store a consistent snapshot, the later one wins.
#[derive(Clone)]
pub struct PageListCache {
    pages: Cache<&'static str, Arc<Vec<Page>>>,
}

impl PageListCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            pages: Cache::builder().time_to_live(ttl).max_capacity(1).build(),
        }
    }

    pub fn get(&self) -> Option<Arc<Vec<Page>>> {
        self.pages.get(&ALL_PAGES_KEY)
    }

    pub fn set(&self, pages: Arc<Vec<Page>>) {
        self.pages.insert(ALL_PAGES_KEY, pages);
    }

    pub fn invalidate(&self) {
        self.pages.invalidate(&ALL_PAGES_KEY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::OffsetDateTime;

    fn page(name: &str) -> Page {
        Page {
            id: 1,
            name: name.to_string(),
            content: "x".to_string(),
            last_modified_utc: OffsetDateTime::now_utc(),
            attachments: Vec::new(),
        }
    }

    #[test]
    fn set_get_invalidate() {
        let cache = PageListCache::new(Duration::from_secs(60));
        assert!(cache.get().is_none());

        cache.set(Arc::new(vec![page("a")]));
        assert_eq!(cache.get().unwrap().len(), 1);

        cache.invalidate();
        assert!(cache.get().is_none());
    }

    #[test]
    fn entries_expire_without_invalidation() {
        let cache = PageListCache::new(Duration::from_millis(50));
        cache.set(Arc::new(vec![page("a")]));
        std::thread::sleep(Duration::from_millis(150));
        assert!(cache.get().is_none());
    }
}
