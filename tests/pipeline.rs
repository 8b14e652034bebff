//! End-to-end tests: OPML → aggregate → rank → render, against mock feeds.
//!
//! Each test runs its own wiremock server and output directory.

use std::path::PathBuf;
use std::time::Duration;

use feedhub::config::Settings;
use feedhub::feed::{
    opml, AggregateError, FaviconResolver, Fetcher, RetryPolicy, DEFAULT_USER_AGENT,
};
use pretty_assertions::assert_eq;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_settings() -> Settings {
    let mut settings = Settings::default();
    settings.site_title = "Test Hub".into();
    settings.fetch.timeout_secs = 2;
    settings.fetch.max_attempts = 2;
    settings.fetch.retry_backoff_ms = 0;
    settings
}

fn out_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("feedhub_pipeline_{name}"));
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

fn rss_feed(site: &str, items: &[(&str, &str)]) -> String {
    let items: String = items
        .iter()
        .map(|(title, date)| {
            format!(
                "<item><title>{title}</title><link>{site}/posts/{title}</link>\
                 <description>&lt;p&gt;About {title}&lt;/p&gt;</description>\
                 <pubDate>{date}</pubDate></item>"
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0"?>
<rss version="2.0"><channel>
  <title>Mock</title><link>{site}</link><description>A mock blog</description>
  {items}
</channel></rss>"#
    )
}

async fn mount_feed(server: &MockServer, route: &str, body: String) {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_run_skips_failing_feed_and_ranks_entries() {
    let server = MockServer::start().await;
    let site = server.uri();

    mount_feed(
        &server,
        "/blog.xml",
        rss_feed(
            &site,
            &[
                ("second", "Thu, 26 Oct 2023 09:00:00 GMT"),
                ("first", "Fri, 27 Oct 2023 09:00:00 GMT"),
            ],
        ),
    )
    .await;
    mount_feed(
        &server,
        "/news.xml",
        rss_feed(&site, &[("breaking", "Fri, 27 Oct 2023 12:00:00 GMT")]),
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/down.xml"))
        .respond_with(ResponseTemplate::new(503))
        .expect(2)
        .mount(&server)
        .await;

    let opml_doc = format!(
        r#"<?xml version="1.0"?>
<opml version="2.0"><body>
  <outline text="Blog" xmlUrl="{site}/blog.xml" category="Tech"/>
  <outline text="Down" xmlUrl="{site}/down.xml" category="Tech"/>
  <outline text="Bad" xmlUrl="no scheme here"/>
  <outline text="News" xmlUrl="{site}/news.xml"/>
</body></opml>"#
    );
    let descriptors = opml::parse(&opml_doc);
    assert_eq!(descriptors.len(), 3);

    let dir = out_dir("full_run");
    let (result, written) = feedhub::generate(&test_settings(), &descriptors, &dir)
        .await
        .unwrap();

    assert_eq!(written.len(), 4);

    let feed_titles: Vec<_> = result.feeds.iter().map(|f| f.title.as_str()).collect();
    assert_eq!(feed_titles, vec!["News", "Blog"]);

    let entry_titles: Vec<_> = result.entries.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(entry_titles, vec!["breaking", "first", "second"]);

    let group_names: Vec<_> = result.categories.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(group_names, vec!["Uncategorized", "Tech"]);

    let latest = std::fs::read_to_string(dir.join("latest.xml")).unwrap();
    let breaking = latest.find("<title>breaking</title>").unwrap();
    let first = latest.find("<title>first</title>").unwrap();
    assert!(breaking < first);
    assert!(latest.contains("<description>About first</description>"));

    let directory = std::fs::read_to_string(dir.join("feeds.xml")).unwrap();
    assert!(directory.contains("Category: Tech | Posts: 2"));
    assert!(!directory.contains("down.xml"));

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(dir.join("latest.json")).unwrap()).unwrap();
    assert_eq!(json["items"].as_array().unwrap().len(), 3);

    let html = std::fs::read_to_string(dir.join("index.html")).unwrap();
    assert!(html.contains("<h1>Test Hub</h1>"));
    assert!(html.contains(r#"id="Tech""#));

    std::fs::remove_dir_all(&dir).ok();
}

#[tokio::test]
async fn test_empty_subscription_list_writes_nothing() {
    let descriptors = opml::parse(r#"<opml version="2.0"><body></body></opml>"#);
    assert!(descriptors.is_empty());

    let dir = out_dir("empty");
    let err = feedhub::generate(&test_settings(), &descriptors, &dir)
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<AggregateError>(),
        Some(&AggregateError::NoFeeds)
    );
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_all_feeds_failing_writes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let descriptors = opml::parse(&format!(
        r#"<opml><body><outline text="x" xmlUrl="{}/feed.xml"/></body></opml>"#,
        server.uri()
    ));

    let dir = out_dir("all_failing");
    let err = feedhub::generate(&test_settings(), &descriptors, &dir)
        .await
        .unwrap_err();

    assert_eq!(
        err.downcast_ref::<AggregateError>(),
        Some(&AggregateError::NoEntries { feeds: 1 })
    );
    assert!(!dir.exists());
}

#[tokio::test]
async fn test_github_profile_favicon_needs_no_network() {
    // Every request would fail against this unroutable client setup
    let policy = RetryPolicy {
        timeout: Duration::from_millis(50),
        max_attempts: 1,
        backoff: Duration::ZERO,
    };
    let resolver = FaviconResolver::new(Fetcher::new(DEFAULT_USER_AGENT, policy).unwrap());

    let icon = resolver
        .resolve("https://github.com/torvalds.atom", None)
        .await;
    assert_eq!(icon.as_deref(), Some("https://github.com/torvalds.png?size=50"));
}
