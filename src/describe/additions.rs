use crate::describe::resolver::blog_index_title;
use crate::describe::sanitize;
use crate::site::model::ContentSubject;
use crate::site::store::ContentSource;

/// Additions whose decoded length exceeds this are never used.
pub const MAX_ADDITIONS_CHARS: usize = 71;

fn subject_title(source: &dyn ContentSource, subject: &ContentSubject) -> String {
    let raw = match subject {
        ContentSubject::FrontPage => source.site().tagline.clone(),
        ContentSubject::BlogIndex => blog_index_title(source),
        ContentSubject::Singular { id } => source.post(*id).map(|p| p.title.clone()).unwrap_or_default(),
        ContentSubject::Term { id, taxonomy } => source
            .term(*id, taxonomy)
            .map(|t| t.name.clone())
            .unwrap_or_default(),
        ContentSubject::PostTypeArchive { post_type } => source
            .post_type(post_type)
            .map(|pt| if pt.label.is_empty() { pt.name.clone() } else { pt.label.clone() })
            .unwrap_or_default(),
        ContentSubject::Author { id } => source
            .user(*id)
            .map(|u| u.display_name.clone())
            .unwrap_or_default(),
    };
    sanitize::description_text(&raw)
}

/// Builds "{title} {connector} {site name}", or the title alone when the
/// site name is left out. Empty when disabled or when there is no title.
pub fn compose_additions(
    source: &dyn ContentSource,
    subject: &ContentSubject,
    enabled: bool,
    use_sitename: bool,
    connector: &str,
) -> String {
    if !enabled {
        return String::new();
    }
    let title = subject_title(source, subject);
    if title.is_empty() {
        return String::new();
    }
    if use_sitename {
        format!("{} {} {}", title, connector.trim(), source.site().name.trim())
            .trim()
            .to_string()
    } else {
        title
    }
}
