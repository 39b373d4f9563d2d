use crate::errors::SiteError;
use crate::site::model::{Post, PostType, SiteContent, SiteInfo, Term, User};
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;

/// Read access to already-fetched site content.
pub trait ContentSource: Send + Sync {
    fn site(&self) -> &SiteInfo;
    fn post(&self, id: u64) -> Option<&Post>;
    fn term(&self, id: u64, taxonomy: &str) -> Option<&Term>;
    fn user(&self, id: u64) -> Option<&User>;
    fn post_type(&self, name: &str) -> Option<&PostType>;

    /// Unregistered types fall back to the built-in rule: only `post` has excerpts.
    fn supports_excerpt(&self, post_type: &str) -> bool {
        match self.post_type(post_type) {
            Some(pt) => pt.supports_excerpt,
            None => post_type == "post",
        }
    }

    /// The static front page, if one is configured and exists.
    fn static_front_page(&self) -> Option<&Post> {
        self.site().front_page.and_then(|id| self.post(id))
    }

    fn posts_page(&self) -> Option<&Post> {
        self.site().posts_page.and_then(|id| self.post(id))
    }
}

#[derive(Debug, Default)]
pub struct SiteStore {
    site: SiteInfo,
    posts: HashMap<u64, Post>,
    terms: HashMap<(String, u64), Term>,
    users: HashMap<u64, User>,
    post_types: HashMap<String, PostType>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SiteCounts {
    pub posts: usize,
    pub terms: usize,
    pub users: usize,
    pub post_types: usize,
}

impl SiteStore {
    pub fn from_content(content: SiteContent) -> Self {
        let mut store = SiteStore {
            site: content.site,
            ..Default::default()
        };
        for p in content.posts {
            if store.posts.insert(p.id, p).is_some() {
                tracing::warn!("duplicate post id in site content; last entry wins");
            }
        }
        for t in content.terms {
            store.terms.insert((t.taxonomy.clone(), t.id), t);
        }
        for u in content.users {
            store.users.insert(u.id, u);
        }
        for pt in content.post_types {
            store.post_types.insert(pt.name.clone(), pt);
        }
        store
    }

    pub fn from_json(raw: &str) -> Result<Self, SiteError> {
        let content: SiteContent =
            serde_json::from_str(raw).map_err(|e| SiteError::Parse(e.to_string()))?;
        Ok(Self::from_content(content))
    }

    pub fn from_file(path: &Path) -> Result<Self, SiteError> {
        if !path.exists() {
            return Err(SiteError::NotFound(path.display().to_string()));
        }
        let raw = std::fs::read_to_string(path).map_err(|e| SiteError::Io(e.to_string()))?;
        let store = Self::from_json(&raw)?;
        tracing::info!(path=%path.display(), posts=store.posts.len(), terms=store.terms.len(), "site content loaded");
        Ok(store)
    }

    pub fn counts(&self) -> SiteCounts {
        SiteCounts {
            posts: self.posts.len(),
            terms: self.terms.len(),
            users: self.users.len(),
            post_types: self.post_types.len(),
        }
    }
}

impl ContentSource for SiteStore {
    fn site(&self) -> &SiteInfo {
        &self.site
    }

    fn post(&self, id: u64) -> Option<&Post> {
        self.posts.get(&id)
    }

    fn term(&self, id: u64, taxonomy: &str) -> Option<&Term> {
        self.terms.get(&(taxonomy.to_string(), id))
    }

    fn user(&self, id: u64) -> Option<&User> {
        self.users.get(&id)
    }

    fn post_type(&self, name: &str) -> Option<&PostType> {
        self.post_types.get(name)
    }
}
