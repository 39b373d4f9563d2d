use serde::{Deserialize, Serialize};
use std::fmt;

/// What a description is being derived for. Exactly one kind per resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentSubject {
    FrontPage,
    BlogIndex,
    Singular { id: u64 },
    Term { id: u64, taxonomy: String },
    PostTypeArchive { post_type: String },
    Author { id: u64 },
}

impl fmt::Display for ContentSubject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentSubject::FrontPage => write!(f, "front_page"),
            ContentSubject::BlogIndex => write!(f, "blog_index"),
            ContentSubject::Singular { id } => write!(f, "singular:{id}"),
            ContentSubject::Term { id, taxonomy } => write!(f, "term:{taxonomy}:{id}"),
            ContentSubject::PostTypeArchive { post_type } => write!(f, "pta:{post_type}"),
            ContentSubject::Author { id } => write!(f, "author:{id}"),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PostMeta {
    pub description: String,
    pub og_description: String,
    pub twitter_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    #[serde(default = "default_post_type")]
    pub post_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub password: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default)]
    pub meta: PostMeta,
}

impl Post {
    /// Password-protected and non-public posts must never feed a description.
    pub fn is_protected(&self) -> bool {
        !self.password.is_empty()
            || matches!(self.status.as_str(), "private" | "draft" | "pending" | "future")
    }
}

fn default_post_type() -> String {
    "post".to_string()
}

fn default_status() -> String {
    "publish".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Term {
    pub id: u64,
    pub taxonomy: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub meta_description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostType {
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub supports_excerpt: bool,
    #[serde(default)]
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteInfo {
    pub name: String,
    pub tagline: String,
    pub front_page: Option<u64>,
    pub posts_page: Option<u64>,
    pub homepage_description: String,
    pub homepage_og_description: String,
    pub homepage_twitter_description: String,
}

/// On-disk shape of a site file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteContent {
    pub site: SiteInfo,
    pub posts: Vec<Post>,
    pub terms: Vec<Term>,
    pub users: Vec<User>,
    pub post_types: Vec<PostType>,
}
