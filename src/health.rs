use crate::site::store::{ContentSource, SiteStore};
use std::path::Path;

pub fn check_site_file(path: Option<&Path>) -> bool {
    match path {
        Some(p) => SiteStore::from_file(p).is_ok(),
        None => false,
    }
}

/// A site can describe its front page only with a name or some front page text.
pub fn check_site_identity(source: &dyn ContentSource) -> bool {
    let site = source.site();
    !site.name.trim().is_empty() || !site.tagline.trim().is_empty() || source.static_front_page().is_some()
}
