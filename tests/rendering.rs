//! Rendering the fixture site through the public API.
//!
//! The fixture corpus lives in `fixtures/content/`: a trailhead point, a
//! ridge line, three photos (two on 2024-03-02), a post that references
//! most of them, a note with one dangling reference, a file and a link.

use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use waymark::config::{self, SiteConfig};
use waymark::dispatch::{
    self, DanglingReason, RenderContext, RenderError, RenderEvent,
};
use waymark::grammar;
use waymark::repository::{ContentRepository, RepositoryError};
use waymark::resolver::RESOLVERS;
use waymark::store::JsonStore;
use waymark::types::{ContentKind, ContentRecord, GenerationVersion};
use waymark::urls::{SitePage, SiteUrls, UrlBuilder};

const TRAILHEAD: &str = "11111111-1111-1111-1111-111111111111";
const DAWN: &str = "22222222-2222-2222-2222-222222222222";
const SUMMIT_CAIRN: &str = "22222222-2222-2222-2222-222222222223";
const RIDGE_LOOP: &str = "33333333-3333-3333-3333-333333333333";
const SPRING_HIKE: &str = "44444444-4444-4444-4444-444444444444";
const GEAR_LIST: &str = "55555555-5555-5555-5555-555555555555";
const MISSING_NOTE: &str = "99999999-9999-9999-9999-999999999999";

fn fixture_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures")
}

struct Site {
    config: SiteConfig,
    store: JsonStore,
    urls: SiteUrls,
}

impl Site {
    fn load() -> Self {
        let root = fixture_root();
        let config = config::load_config(&root).unwrap();
        let store = JsonStore::load(&config.content_dir(&root)).unwrap();
        let urls = SiteUrls::new(&config, &root);
        Site {
            config,
            store,
            urls,
        }
    }

    fn ctx(&self) -> RenderContext<'_> {
        RenderContext::new(&self.store, &self.urls).with_options((&self.config).into())
    }

    fn body(&self, id: &str) -> String {
        self.store
            .get(id.parse().unwrap())
            .unwrap()
            .body_content
            .clone()
    }
}

// =========================================================================
// Channels
// =========================================================================

#[tokio::test]
async fn site_render_resolves_every_code_in_the_post() {
    let site = Site::load();
    let html = dispatch::process_for_site(&site.ctx(), &site.body(SPRING_HIKE))
        .await
        .unwrap();

    assert!(html.starts_with("Start at "));
    assert!(html.contains(
        r#"<a class="point-page-link" href="https://trails.example.org/Points/trailhead/trailhead.html">the trailhead</a>"#
    ));
    assert!(html.contains(
        r#"<a class="line-page-link" href="https://trails.example.org/Lines/ridge-loop/ridge-loop.html">Ridge Loop</a>"#
    ));
    assert!(html.contains(r#"<figure class="single-photo-container">"#));
    assert!(html.contains(
        "https://trails.example.org/Photos/dawn-on-the-ridge/dawn-on-the-ridge--400.jpg 400w"
    ));
    assert!(html.contains(&format!(r#"id="Point-{TRAILHEAD}""#)));
    assert!(html.contains("singlePointMapInit"));
    assert!(html.contains("file-download-link"));
    assert!(html.contains(r#"href="https://trails.example.org/Files/trail-map/trail-map.pdf""#));
    assert!(html.contains(
        r#"<a class="special-page-link" href="https://trails.example.org/Photos/Galleries/AllPhotos.html">Photo Gallery</a>"#
    ));
    assert!(!html.contains("{{"), "unresolved code left in:\n{html}");
}

#[tokio::test]
async fn email_render_strips_maps_and_uses_one_capped_size() {
    let site = Site::load();
    let html = dispatch::process_for_email(&site.ctx(), &site.body(SPRING_HIKE))
        .await
        .unwrap();

    assert!(!html.contains("<script"));
    assert!(!html.contains("leaflet"));
    assert!(!html.contains("{{"));
    assert!(html.contains(r#"role="presentation""#));
    assert!(html.contains("dawn-on-the-ridge--800.jpg"));
    assert!(html.contains(r#"width="800""#));
    assert!(!html.contains("srcset"));
    // Non-spatial links still render
    assert!(html.contains(">the trailhead</a>"));
}

#[tokio::test]
async fn email_render_strips_every_spatial_keyword_resolved_or_not() {
    let site = Site::load();
    let gone = Uuid::from_u128(0xdead);
    let text = format!(
        "a {{{{point {TRAILHEAD}; Trailhead}}}} b {{{{line {RIDGE_LOOP};}}}} \
         c {{{{geojson {gone};}}}} d {{{{mapComponent {gone}; text Overview;}}}} e"
    );
    let html = dispatch::process_for_email(&site.ctx(), &text).await.unwrap();
    assert_eq!(html, "a  b  c  d  e");
}

#[tokio::test]
async fn local_display_loads_pictures_from_media_root() {
    let site = Site::load();
    let text = format!("{{{{photo {DAWN}; Dawn on the Ridge}}}}");
    let html = dispatch::process_for_local_display(&site.ctx(), &text)
        .await
        .unwrap();

    assert!(html.contains("file://"));
    assert!(html.contains("/media/Photos/dawn-on-the-ridge/dawn-on-the-ridge--1200.jpg"));
    assert!(!html.contains("srcset"));
}

#[tokio::test]
async fn photo_caption_carries_camera_details() {
    let site = Site::load();
    let text = format!("{{{{photo {DAWN}; Dawn on the Ridge}}}}");
    let html = dispatch::process_for_site(&site.ctx(), &text).await.unwrap();
    assert!(html.contains(r#"alt="Sunrise over the ridge line""#));
    assert!(html.contains("First light from the north ridge."));
    assert!(html.contains("Canon EOS R6"));
    assert!(html.contains("ISO 100"));
}

// =========================================================================
// Properties
// =========================================================================

#[tokio::test]
async fn create_then_resolve_returns_the_record() {
    let site = Site::load();
    let ctx = site.ctx();
    let records = site.store.all_content().await.unwrap();

    let mut checked = 0;
    for resolver in RESOLVERS {
        let Some(record) = records.iter().find(|r| r.kind == resolver.kind) else {
            continue;
        };
        let token = resolver.create(record);
        let found = dispatch::referenced_content(&ctx, &token, resolver.keyword)
            .await
            .unwrap();
        let ids: Vec<Uuid> = found.iter().map(|r| r.content_id).collect();
        assert_eq!(ids, vec![record.content_id], "round trip via {token}");
        checked += 1;
    }
    assert!(checked >= 10, "only {checked} resolvers had fixture content");
}

#[tokio::test]
async fn named_display_wins_over_title_and_generic_uses_title() {
    let site = Site::load();
    let text = format!(r#"{{{{photolink {DAWN}; text "Custom";}}}} and {{{{photolink {SUMMIT_CAIRN};}}}}"#);
    let html = dispatch::process_for_site(&site.ctx(), &text).await.unwrap();

    assert!(html.contains(">Custom</a>"));
    assert!(html.contains(">Summit Cairn</a>"));
    assert!(!html.contains("Dawn on the Ridge</a>"));
}

#[tokio::test]
async fn dangling_map_code_never_fails_and_renders_deterministically() {
    let site = Site::load();
    let text = format!("before {{{{point {};}}}} after", Uuid::from_u128(0xdead));

    let first = dispatch::process_for_site(&site.ctx(), &text).await.unwrap();
    let second = dispatch::process_for_site(&site.ctx(), &text).await.unwrap();
    assert_eq!(first, second);
    assert_eq!(first, text);

    let email = dispatch::process_for_email(&site.ctx(), &text).await.unwrap();
    assert_eq!(email, "before  after");
}

#[test]
fn spatial_detection_only_counts_map_keywords() {
    assert!(grammar::has_spatial_tokens(&format!("{{{{point {TRAILHEAD};}}}}")));
    assert!(grammar::has_spatial_tokens(&format!("x {{{{line {RIDGE_LOOP}; Loop}}}}")));
    assert!(grammar::has_spatial_tokens(&format!("{{{{mapComponent {TRAILHEAD};}}}}")));
    assert!(grammar::has_spatial_tokens(&format!("{{{{geojson {TRAILHEAD};}}}}")));

    let site = Site::load();
    assert!(grammar::has_spatial_tokens(&site.body(SPRING_HIKE)));
    assert!(!grammar::has_spatial_tokens(&site.body(GEAR_LIST)));
    assert!(!grammar::has_spatial_tokens(&format!(
        "{{{{photo {DAWN};}}}} {{{{notelink {GEAR_LIST};}}}} {{{{pointlink {TRAILHEAD};}}}}"
    )));
}

#[tokio::test]
async fn site_render_is_idempotent_once_resolved() {
    let site = Site::load();
    let once = dispatch::process_for_site(&site.ctx(), &site.body(SPRING_HIKE))
        .await
        .unwrap();
    let twice = dispatch::process_for_site(&site.ctx(), &once).await.unwrap();
    assert_eq!(once, twice);
}

/// URL builder with the short page URLs used in documentation examples.
struct ShortUrls;

impl UrlBuilder for ShortUrls {
    fn page_url(&self, record: &ContentRecord) -> String {
        format!("/{}s/{}", record.kind, record.slug)
    }

    fn picture_url(&self, record: &ContentRecord, file_name: &str) -> String {
        format!("/{}s/{}/{}", record.kind, record.slug, file_name)
    }

    fn local_picture_url(&self, record: &ContentRecord, file_name: &str) -> String {
        format!("file://{}", self.picture_url(record, file_name))
    }

    fn file_download_url(&self, _record: &ContentRecord) -> Option<String> {
        None
    }

    fn site_page_url(&self, _page: SitePage) -> String {
        "/".to_string()
    }

    fn daily_photos_url(&self, day: NaiveDate) -> String {
        format!("/daily/{day}")
    }

    fn tag_url(&self, tag: &str) -> String {
        format!("/tags/{tag}")
    }
}

#[tokio::test]
async fn pointlink_with_display_text_renders_anchor_in_place() {
    let site = Site::load();
    let ctx = RenderContext::new(&site.store, &ShortUrls);
    let text = format!("See {{{{pointlink {TRAILHEAD}; text My Point;}}}} for details.");

    let html = dispatch::process_for_site(&ctx, &text).await.unwrap();
    assert_eq!(
        html,
        r#"See <a class="point-page-link" href="/points/trailhead">My Point</a> for details."#
    );
}

// =========================================================================
// Progress and audit
// =========================================================================

#[tokio::test]
async fn progress_reports_resolved_and_unresolved_codes() {
    let site = Site::load();
    let (tx, rx) = mpsc::channel();
    let ctx = site.ctx().with_progress(&tx);
    let html = dispatch::process_for_site(&ctx, &site.body(GEAR_LIST)).await.unwrap();
    drop(ctx);
    drop(tx);
    let events: Vec<RenderEvent> = rx.iter().collect();

    assert!(events.contains(&RenderEvent::Resolved {
        keyword: "post",
        content_id: SPRING_HIKE.parse().unwrap(),
        title: "Spring Hike".into(),
    }));
    assert!(events.contains(&RenderEvent::Unresolved {
        keyword: "notelink",
        content_id: MISSING_NOTE.parse().unwrap(),
    }));
    // The dangling code is left as written
    assert!(html.contains(&format!("{{{{notelink {MISSING_NOTE}; the old list}}}}")));
}

#[tokio::test]
async fn audit_finds_only_the_dangling_note_link() {
    let site = Site::load();
    let ctx = site.ctx();
    let records = site.store.all_content().await.unwrap();

    let mut found = Vec::new();
    for record in &records {
        for d in dispatch::dangling_references(&ctx, &record.searchable_text())
            .await
            .unwrap()
        {
            found.push((record.title.clone(), d));
        }
    }
    assert_eq!(found.len(), 1, "{found:?}");
    let (title, dangling) = &found[0];
    assert_eq!(title, "Gear List");
    assert_eq!(dangling.keyword, "notelink");
    assert_eq!(dangling.reason, DanglingReason::NotFound);
}

// =========================================================================
// Failure
// =========================================================================

/// Repository whose storage is gone.
struct Closed;

#[async_trait]
impl ContentRepository for Closed {
    async fn find_by_content_id(
        &self,
        _content_id: Uuid,
        _kind: Option<ContentKind>,
    ) -> Result<Option<ContentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("closed".into()))
    }

    async fn related_content_edges(
        &self,
        _content_id: Uuid,
        _version: GenerationVersion,
    ) -> Result<Vec<Uuid>, RepositoryError> {
        Err(RepositoryError::Unavailable("closed".into()))
    }

    async fn content_referencing(
        &self,
        _content_id: Uuid,
    ) -> Result<Vec<ContentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("closed".into()))
    }

    async fn photos_on_day(&self, _day: NaiveDate) -> Result<Vec<ContentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("closed".into()))
    }

    async fn all_content(&self) -> Result<Vec<ContentRecord>, RepositoryError> {
        Err(RepositoryError::Unavailable("closed".into()))
    }
}

#[tokio::test]
async fn unavailable_repository_fails_the_render() {
    let site = Site::load();
    let ctx = RenderContext::new(&Closed, &site.urls);
    let err = dispatch::process_for_site(&ctx, &site.body(SPRING_HIKE))
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::Repository(RepositoryError::Unavailable(_))));
}

#[tokio::test]
async fn cancelled_render_stops() {
    let site = Site::load();
    let cancel = CancellationToken::new();
    cancel.cancel();
    let ctx = site.ctx().with_cancel(cancel);
    let err = dispatch::process_for_site(&ctx, &site.body(SPRING_HIKE))
        .await
        .unwrap_err();
    assert!(matches!(err, RenderError::Cancelled));
}
