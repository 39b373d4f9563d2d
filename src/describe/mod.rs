use crate::site::model::ContentSubject;
use crate::site::store::ContentSource;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub mod additions;
pub mod resolver;
pub mod sanitize;
pub mod trim;

use additions::{compose_additions, MAX_ADDITIONS_CHARS};
use resolver::resolve_excerpt;
use trim::trim_to_boundary;

/// Output surface a description is generated for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescriptionType {
    Search,
    OpenGraph,
    Twitter,
}

impl DescriptionType {
    pub const ALL: [DescriptionType; 3] = [
        DescriptionType::Search,
        DescriptionType::OpenGraph,
        DescriptionType::Twitter,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DescriptionType::Search => "search",
            DescriptionType::OpenGraph => "opengraph",
            DescriptionType::Twitter => "twitter",
        }
    }

    /// Unknown names fall back to `search`.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "opengraph" | "open_graph" | "og" => DescriptionType::OpenGraph,
            "twitter" => DescriptionType::Twitter,
            _ => DescriptionType::Search,
        }
    }
}

impl fmt::Display for DescriptionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Upper character limits per surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LengthBudgets {
    pub search: usize,
    pub opengraph: usize,
    pub twitter: usize,
}

impl LengthBudgets {
    pub fn for_type(&self, ty: DescriptionType) -> usize {
        match ty {
            DescriptionType::Search => self.search,
            DescriptionType::OpenGraph => self.opengraph,
            DescriptionType::Twitter => self.twitter,
        }
    }
}

impl Default for LengthBudgets {
    fn default() -> Self {
        Self {
            search: 160,
            opengraph: 190,
            twitter: 155,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DescriptionOptions {
    pub auto_description: bool,
    pub additions: bool,
    pub additions_sitename: bool,
    pub separator: String,
    pub connector: String,
    pub budgets: LengthBudgets,
}

impl Default for DescriptionOptions {
    fn default() -> Self {
        Self {
            auto_description: true,
            additions: true,
            additions_sitename: true,
            separator: "|".to_string(),
            connector: "on".to_string(),
            budgets: LengthBudgets::default(),
        }
    }
}

/// Results computed during one render. Owned by the caller and dropped with it.
#[derive(Debug, Default)]
pub struct RenderMemo {
    excerpts: HashMap<ContentSubject, String>,
    generated: HashMap<(ContentSubject, DescriptionType), String>,
}

impl RenderMemo {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptions {
    pub search: String,
    pub opengraph: String,
    pub twitter: String,
}

/// Evaluates candidates in order; the first one yielding non-blank text wins.
pub(crate) fn first_non_empty(candidates: &[&dyn Fn() -> Option<String>]) -> String {
    candidates
        .iter()
        .find_map(|candidate| candidate().filter(|s| !s.trim().is_empty()))
        .unwrap_or_default()
}

pub struct DescriptionGenerator {
    source: Arc<dyn ContentSource>,
    options: DescriptionOptions,
    metrics: DescriptionMetrics,
}

impl DescriptionGenerator {
    pub fn new(source: Arc<dyn ContentSource>, options: DescriptionOptions) -> Self {
        Self {
            source,
            options,
            metrics: DescriptionMetrics::default(),
        }
    }

    pub fn options(&self) -> &DescriptionOptions {
        &self.options
    }

    pub fn source(&self) -> &dyn ContentSource {
        self.source.as_ref()
    }

    /// The description for `subject` on surface `ty`: a custom one when set,
    /// otherwise the generated one.
    pub fn get_description(
        &self,
        memo: &mut RenderMemo,
        subject: &ContentSubject,
        ty: DescriptionType,
        escape: bool,
    ) -> String {
        let custom = self.custom_description(subject, ty);
        let desc = if custom.is_empty() {
            self.get_generated_description(memo, subject, ty, false)
        } else {
            self.metrics.custom_count.fetch_add(1, Ordering::Relaxed);
            custom
        };
        if escape {
            sanitize::escape_description(&desc)
        } else {
            desc
        }
    }

    pub fn get_all(&self, memo: &mut RenderMemo, subject: &ContentSubject, escape: bool) -> Descriptions {
        Descriptions {
            search: self.get_description(memo, subject, DescriptionType::Search, escape),
            opengraph: self.get_description(memo, subject, DescriptionType::OpenGraph, escape),
            twitter: self.get_description(memo, subject, DescriptionType::Twitter, escape),
        }
    }

    /// User-entered description, following each surface's fallback chain.
    pub fn custom_description(&self, subject: &ContentSubject, ty: DescriptionType) -> String {
        let source = self.source.as_ref();
        let site = source.site();
        let subject = self.canonical_subject(subject);
        let post = match &subject {
            ContentSubject::FrontPage => source.static_front_page(),
            ContentSubject::Singular { id } => source.post(*id),
            _ => None,
        };
        let is_front = subject == ContentSubject::FrontPage;
        let home = |value: &str| is_front.then(|| value.to_string());
        let meta = |pick: fn(&crate::site::model::PostMeta) -> &str| post.map(|p| pick(&p.meta).to_string());

        let desc = match ty {
            DescriptionType::Search => {
                let term_meta = || match &subject {
                    ContentSubject::Term { id, taxonomy } => {
                        source.term(*id, taxonomy).map(|t| t.meta_description.clone())
                    }
                    _ => None,
                };
                let candidates: [&dyn Fn() -> Option<String>; 3] = [
                    &|| home(&site.homepage_description),
                    &|| meta(|m| &m.description),
                    &term_meta,
                ];
                first_non_empty(&candidates)
            }
            DescriptionType::OpenGraph => {
                let candidates: [&dyn Fn() -> Option<String>; 2] = [
                    &|| home(&site.homepage_og_description),
                    &|| meta(|m| &m.og_description),
                ];
                first_non_empty(&candidates)
            }
            DescriptionType::Twitter => {
                let candidates: [&dyn Fn() -> Option<String>; 4] = [
                    &|| home(&site.homepage_twitter_description),
                    &|| home(&site.homepage_og_description),
                    &|| meta(|m| &m.twitter_description),
                    &|| meta(|m| &m.og_description),
                ];
                first_non_empty(&candidates)
            }
        };
        desc.trim().to_string()
    }

    /// Automatically derived description, bounded by the surface's budget.
    pub fn get_generated_description(
        &self,
        memo: &mut RenderMemo,
        subject: &ContentSubject,
        ty: DescriptionType,
        escape: bool,
    ) -> String {
        if !self.options.auto_description {
            return String::new();
        }
        let subject = self.canonical_subject(subject);
        let key = (subject.clone(), ty);
        let desc = if let Some(hit) = memo.generated.get(&key) {
            self.metrics.memo_hits.fetch_add(1, Ordering::Relaxed);
            hit.clone()
        } else {
            let desc = self.generate(memo, &subject, ty);
            memo.generated.insert(key, desc.clone());
            desc
        };
        if escape {
            sanitize::escape_description(&desc)
        } else {
            desc
        }
    }

    pub fn excerpt(&self, memo: &mut RenderMemo, subject: &ContentSubject) -> String {
        memo.excerpts
            .entry(subject.clone())
            .or_insert_with(|| resolve_excerpt(self.source.as_ref(), subject))
            .clone()
    }

    pub fn additions(&self, subject: &ContentSubject) -> String {
        compose_additions(
            self.source.as_ref(),
            subject,
            self.options.additions,
            self.options.additions_sitename,
            &self.options.connector,
        )
    }

    fn generate(&self, memo: &mut RenderMemo, subject: &ContentSubject, ty: DescriptionType) -> String {
        let budget = self.options.budgets.for_type(ty);
        let separator = self.options.separator.trim();
        let mut excerpt = self.excerpt(memo, subject);

        if excerpt.is_empty() && self.falls_back_to_tagline(subject) {
            excerpt = compose_additions(self.source.as_ref(), subject, true, true, &self.options.connector);
        }

        let mut additions = String::new();
        if !self.additions_superseded(subject) {
            let composed = self.additions(subject);
            if excerpt.is_empty() {
                excerpt = composed;
            } else {
                let reserved = self.reserved_for(&composed, separator);
                if sanitize::decoded_len(&composed) <= MAX_ADDITIONS_CHARS && reserved < budget {
                    additions = composed;
                }
            }
        }

        let reserved = self.reserved_for(&additions, separator);
        let trimmed = trim_to_boundary(&excerpt, budget.saturating_sub(reserved));
        let desc = if additions.is_empty() || trimmed.is_empty() {
            trimmed
        } else {
            format!("{additions} {separator} {trimmed}")
        };

        self.metrics.generated_count.fetch_add(1, Ordering::Relaxed);
        if desc.is_empty() {
            self.metrics.empty_count.fetch_add(1, Ordering::Relaxed);
        }
        tracing::debug!(subject=%subject, kind=%ty, budget, chars=desc.chars().count(), "generated description");
        desc
    }

    /// Characters the additions and separator take from the excerpt's budget.
    fn reserved_for(&self, additions: &str, separator: &str) -> usize {
        if additions.is_empty() {
            0
        } else {
            sanitize::decoded_len(additions) + separator.chars().count() + 2
        }
    }

    /// The front page and blog index already read like additions.
    fn additions_superseded(&self, subject: &ContentSubject) -> bool {
        matches!(subject, ContentSubject::FrontPage | ContentSubject::BlogIndex)
    }

    /// An empty static front page is described by its tagline, switches aside.
    fn falls_back_to_tagline(&self, subject: &ContentSubject) -> bool {
        *subject == ContentSubject::FrontPage && self.source.static_front_page().is_some()
    }

    /// Pages assigned as front page or posts page are described as such.
    fn canonical_subject(&self, subject: &ContentSubject) -> ContentSubject {
        let site = self.source.site();
        match subject {
            ContentSubject::Singular { id } if site.front_page == Some(*id) => ContentSubject::FrontPage,
            ContentSubject::Singular { id } if site.posts_page == Some(*id) => ContentSubject::BlogIndex,
            other => other.clone(),
        }
    }

    pub fn metrics_snapshot(&self) -> DescriptionMetricsSnapshot {
        DescriptionMetricsSnapshot {
            generated_count: self.metrics.generated_count.load(Ordering::Relaxed),
            custom_count: self.metrics.custom_count.load(Ordering::Relaxed),
            empty_count: self.metrics.empty_count.load(Ordering::Relaxed),
            memo_hits: self.metrics.memo_hits.load(Ordering::Relaxed),
        }
    }
}

#[derive(Default)]
pub struct DescriptionMetrics {
    pub generated_count: AtomicU64,
    pub custom_count: AtomicU64,
    pub empty_count: AtomicU64,
    pub memo_hits: AtomicU64,
}

#[derive(Debug, Serialize)]
pub struct DescriptionMetricsSnapshot {
    pub generated_count: u64,
    pub custom_count: u64,
    pub empty_count: u64,
    pub memo_hits: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::store::SiteStore;

    const SITE: &str = r#"{
        "site": {
            "name": "Acme",
            "tagline": "Tools for makers",
            "front_page": 1,
            "posts_page": 2,
            "homepage_og_description": "Social home."
        },
        "posts": [
            {"id": 1, "post_type": "page", "title": "Home", "content": "<p>We build sturdy tools for people who make things by hand.</p>"},
            {"id": 2, "post_type": "page", "title": "Journal"},
            {"id": 3, "title": "Sharpening chisels", "content": "A sharp chisel is a safe chisel. Start with a flat back, then hone the bevel until a burr forms along the whole edge."},
            {"id": 4, "title": "Custom", "content": "Body.", "meta": {"description": "Hand-written summary.", "og_description": "OG summary."}},
            {"id": 5, "title": "Locked", "password": "pw", "content": "Secret plans for the new workshop."},
            {"id": 6, "title": "Empty"}
        ]
    }"#;

    fn generator(options: DescriptionOptions) -> DescriptionGenerator {
        let store = SiteStore::from_json(SITE).expect("fixture");
        DescriptionGenerator::new(Arc::new(store), options)
    }

    #[test]
    fn singular_gets_additions_prefix() {
        let g = generator(DescriptionOptions::default());
        let mut memo = RenderMemo::new();
        let desc = g.get_description(&mut memo, &ContentSubject::Singular { id: 3 }, DescriptionType::Search, false);
        assert!(desc.starts_with("Sharpening chisels on Acme | A sharp chisel is a safe chisel."), "{desc}");
        assert!(desc.chars().count() <= 160 + 3);
    }

    #[test]
    fn additions_disabled_gives_plain_excerpt() {
        let g = generator(DescriptionOptions {
            additions: false,
            ..Default::default()
        });
        let mut memo = RenderMemo::new();
        let desc = g.get_description(&mut memo, &ContentSubject::Singular { id: 3 }, DescriptionType::Search, false);
        assert!(desc.starts_with("A sharp chisel is a safe chisel."), "{desc}");
    }

    #[test]
    fn additions_replace_missing_excerpt() {
        let g = generator(DescriptionOptions::default());
        let mut memo = RenderMemo::new();
        let desc = g.get_description(&mut memo, &ContentSubject::Singular { id: 6 }, DescriptionType::Search, false);
        assert_eq!(desc, "Empty on Acme...");
    }

    #[test]
    fn front_page_and_posts_page_skip_additions() {
        let g = generator(DescriptionOptions::default());
        let mut memo = RenderMemo::new();
        let front = g.get_description(&mut memo, &ContentSubject::Singular { id: 1 }, DescriptionType::Search, false);
        assert_eq!(front, "We build sturdy tools for people who make things by hand.");
        let blog = g.get_description(&mut memo, &ContentSubject::Singular { id: 2 }, DescriptionType::Search, false);
        // A single word after the colon reads as a trailing fragment.
        assert_eq!(blog, "Latest posts:");
    }

    #[test]
    fn custom_fields_win_and_twitter_falls_back_to_open_graph() {
        let g = generator(DescriptionOptions::default());
        let mut memo = RenderMemo::new();
        let s = ContentSubject::Singular { id: 4 };
        let all = g.get_all(&mut memo, &s, false);
        assert_eq!(all.search, "Hand-written summary.");
        assert_eq!(all.opengraph, "OG summary.");
        assert_eq!(all.twitter, "OG summary.");

        let home = g.get_all(&mut memo, &ContentSubject::FrontPage, false);
        assert_eq!(home.opengraph, "Social home.");
        assert_eq!(home.twitter, "Social home.");
        assert_eq!(home.search, "We build sturdy tools for people who make things by hand.");
    }

    #[test]
    fn protected_post_yields_title_additions_only() {
        let g = generator(DescriptionOptions::default());
        let mut memo = RenderMemo::new();
        let desc = g.get_description(&mut memo, &ContentSubject::Singular { id: 5 }, DescriptionType::Search, false);
        assert!(!desc.contains("Secret"));
        assert_eq!(desc, "Locked on Acme...");
    }

    #[test]
    fn auto_description_off_disables_generation() {
        let g = generator(DescriptionOptions {
            auto_description: false,
            ..Default::default()
        });
        let mut memo = RenderMemo::new();
        assert_eq!(
            g.get_description(&mut memo, &ContentSubject::Singular { id: 3 }, DescriptionType::Search, false),
            ""
        );
        assert_eq!(
            g.get_description(&mut memo, &ContentSubject::Singular { id: 4 }, DescriptionType::Search, false),
            "Hand-written summary."
        );
    }

    #[test]
    fn budgets_differ_per_surface_and_memo_is_reused() {
        let g = generator(DescriptionOptions {
            additions: false,
            budgets: LengthBudgets {
                search: 40,
                opengraph: 60,
                twitter: 20,
            },
            ..Default::default()
        });
        let mut memo = RenderMemo::new();
        let s = ContentSubject::Singular { id: 3 };
        let search = g.get_generated_description(&mut memo, &s, DescriptionType::Search, false);
        let twitter = g.get_generated_description(&mut memo, &s, DescriptionType::Twitter, false);
        assert!(search.chars().count() <= 43);
        assert!(twitter.chars().count() <= 23);
        assert!(twitter.len() < search.len());
        assert_eq!(memo.generated.len(), 2);

        let again = g.get_generated_description(&mut memo, &s, DescriptionType::Search, false);
        assert_eq!(again, search);
        assert_eq!(g.metrics_snapshot().memo_hits, 1);
        assert_eq!(g.metrics_snapshot().generated_count, 2);
    }

    #[test]
    fn long_additions_are_dropped() {
        let long_title = "A".repeat(40) + " " + &"B".repeat(40);
        let site = format!(
            r#"{{"site": {{"name": "Acme"}}, "posts": [{{"id": 1, "title": "{long_title}", "content": "Short body text here."}}]}}"#
        );
        let store = SiteStore::from_json(&site).expect("fixture");
        let g = DescriptionGenerator::new(Arc::new(store), DescriptionOptions::default());
        let mut memo = RenderMemo::new();
        let desc = g.get_description(&mut memo, &ContentSubject::Singular { id: 1 }, DescriptionType::Search, false);
        assert_eq!(desc, "Short body text here.");
    }

    #[test]
    fn additions_leaving_no_room_are_dropped() {
        let store = SiteStore::from_json(
            r#"{"site": {"name": "Acme"}, "posts": [{"id": 1, "title": "Sharpening tips", "content": "A sharp chisel is a safe chisel."}]}"#,
        )
        .expect("fixture");
        let g = DescriptionGenerator::new(
            Arc::new(store),
            DescriptionOptions {
                budgets: LengthBudgets {
                    search: 20,
                    ..Default::default()
                },
                ..Default::default()
            },
        );
        let mut memo = RenderMemo::new();
        let desc = g.get_description(&mut memo, &ContentSubject::Singular { id: 1 }, DescriptionType::Search, false);
        assert_eq!(desc, "A sharp chisel is a...");
        assert_eq!(desc, trim_to_boundary("A sharp chisel is a safe chisel.", 20));
    }

    #[test]
    fn empty_static_front_page_falls_back_to_tagline() {
        let store = SiteStore::from_json(
            r#"{"site": {"name": "Acme", "tagline": "Tools for makers", "front_page": 1},
                "posts": [{"id": 1, "post_type": "page", "title": "Home", "content": ""}]}"#,
        )
        .expect("fixture");
        let g = DescriptionGenerator::new(
            Arc::new(store),
            DescriptionOptions {
                additions: false,
                additions_sitename: false,
                ..Default::default()
            },
        );
        let mut memo = RenderMemo::new();
        assert_eq!(
            g.get_description(&mut memo, &ContentSubject::FrontPage, DescriptionType::Search, false),
            "Tools for makers on Acme..."
        );
        assert_eq!(
            g.get_description(&mut memo, &ContentSubject::Singular { id: 1 }, DescriptionType::Twitter, false),
            "Tools for makers on Acme..."
        );
    }

    #[test]
    fn named_references_are_decoded_and_measured_as_characters() {
        let store = SiteStore::from_json(
            r#"{"site": {"name": "Acme"}, "posts": [
                {"id": 1, "title": "Caf&eacute; &euro;5", "content": "Le caf&eacute; co&ucirc;te 5&euro;."}
            ]}"#,
        )
        .expect("fixture");
        let g = DescriptionGenerator::new(Arc::new(store), DescriptionOptions::default());
        let mut memo = RenderMemo::new();
        let desc = g.get_description(&mut memo, &ContentSubject::Singular { id: 1 }, DescriptionType::Search, false);
        assert_eq!(desc, "Caf\u{e9} \u{20ac}5 on Acme | Le caf\u{e9} co\u{fb}te 5\u{20ac}.");

        // 60 encoded characters plus " on Acme" stays under the additions cap.
        let title = "&eacute;".repeat(60);
        let site = format!(
            r#"{{"site": {{"name": "Acme"}}, "posts": [{{"id": 2, "title": "{title}", "content": "Short body text here."}}]}}"#
        );
        let store = SiteStore::from_json(&site).expect("fixture");
        let g = DescriptionGenerator::new(Arc::new(store), DescriptionOptions::default());
        let desc = g.get_description(&mut memo, &ContentSubject::Singular { id: 2 }, DescriptionType::Search, false);
        assert_eq!(desc, format!("{} on Acme | Short body text here.", "\u{e9}".repeat(60)));
    }

    #[test]
    fn escaping_is_applied_on_output() {
        let store = SiteStore::from_json(
            r#"{"site": {"name": "Acme"}, "posts": [{"id": 1, "title": "T", "content": "Tom &amp; Jerry say \"hi\"."}]}"#,
        )
        .expect("fixture");
        let g = DescriptionGenerator::new(
            Arc::new(store),
            DescriptionOptions {
                additions: false,
                ..Default::default()
            },
        );
        let mut memo = RenderMemo::new();
        let s = ContentSubject::Singular { id: 1 };
        assert_eq!(
            g.get_description(&mut memo, &s, DescriptionType::Search, true),
            "Tom &amp; Jerry say &quot;hi&quot;."
        );
        assert_eq!(
            g.get_description(&mut memo, &s, DescriptionType::Search, false),
            "Tom & Jerry say \"hi\"."
        );
    }

    #[test]
    fn type_names_are_lenient() {
        assert_eq!(DescriptionType::from_name("opengraph"), DescriptionType::OpenGraph);
        assert_eq!(DescriptionType::from_name("Twitter"), DescriptionType::Twitter);
        assert_eq!(DescriptionType::from_name("bogus"), DescriptionType::Search);
    }
}
