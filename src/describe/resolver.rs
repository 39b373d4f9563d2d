use crate::describe::{first_non_empty, sanitize};
use crate::site::model::{ContentSubject, Post};
use crate::site::store::ContentSource;

/// Format of the blog index excerpt.
pub const LATEST_POSTS: &str = "Latest posts: ";

/// Picks the raw, markup-free text a description is derived from.
/// Unknown subjects and protected posts yield an empty string.
pub fn resolve_excerpt(source: &dyn ContentSource, subject: &ContentSubject) -> String {
    match subject {
        ContentSubject::FrontPage => match source.static_front_page() {
            Some(page) => singular_excerpt(source, page),
            None => blog_index_excerpt(source),
        },
        ContentSubject::BlogIndex => blog_index_excerpt(source),
        ContentSubject::Singular { id } => source
            .post(*id)
            .map(|post| singular_excerpt(source, post))
            .unwrap_or_default(),
        ContentSubject::Term { id, taxonomy } => source
            .term(*id, taxonomy)
            .map(|term| sanitize::description_text(&term.description))
            .unwrap_or_default(),
        ContentSubject::PostTypeArchive { post_type } => source
            .post_type(post_type)
            .map(|pt| sanitize::description_text(&pt.description))
            .unwrap_or_default(),
        ContentSubject::Author { id } => source
            .user(*id)
            .map(|user| sanitize::excerpt_text(&user.description))
            .unwrap_or_default(),
    }
}

/// "Latest posts: {title}", titled after the posts page or the site itself.
pub fn blog_index_title(source: &dyn ContentSource) -> String {
    let title = source
        .posts_page()
        .map(|page| page.title.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| source.site().name.trim());
    if title.is_empty() {
        return String::new();
    }
    format!("{LATEST_POSTS}{title}")
}

fn blog_index_excerpt(source: &dyn ContentSource) -> String {
    sanitize::description_text(&blog_index_title(source))
}

fn singular_excerpt(source: &dyn ContentSource, post: &Post) -> String {
    if post.is_protected() {
        tracing::debug!(post_id = post.id, "protected post; no excerpt");
        return String::new();
    }
    let candidates: [&dyn Fn() -> Option<String>; 2] = [
        &|| {
            source
                .supports_excerpt(&post.post_type)
                .then(|| sanitize::excerpt_text(&post.excerpt))
        },
        &|| Some(body_excerpt(&post.content)),
    ];
    first_non_empty(&candidates)
}

fn body_excerpt(content: &str) -> String {
    if content.trim().is_empty() {
        return String::new();
    }
    let without_urls = sanitize::strip_paragraph_urls(&sanitize::strip_newline_urls(content));
    sanitize::excerpt_text(&without_urls)
}
