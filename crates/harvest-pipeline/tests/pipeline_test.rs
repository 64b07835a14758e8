//! End-to-end runs against canned pages.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use harvest_core::{AppConfig, DedupKey, SiteKind};
use harvest_db::{seen_keys, Database, DedupStore, MemoryDedupStore, SqliteDedupStore, StoreError};
use harvest_fetch::{FetchedPage, Fetcher, StaticFetcher};
use harvest_pipeline::{DiscoveryError, PipelineDriver, RunContext, RunError, RunState};
use harvest_sites::SiteProfile;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

const TC_TEMPLATE: &str = "http://test.local/tc/pn%d/";

fn reference() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
}

fn tc_url(page: u32) -> String {
    TC_TEMPLATE.replace("%d", &page.to_string())
}

/// A rental listing page with `listings` of (title, room, age in days).
fn tc_page(listings: &[(&str, &str, i64)], pages: u32) -> String {
    let items: String = listings
        .iter()
        .map(|(title, room, age_days)| {
            let sortid = (reference() - TimeDelta::days(*age_days)).timestamp_millis();
            format!(
                r#"<li logr="p_1" sortid="{sortid}">
                    <div class="des">
                        <h2><a href="/hezu/{title}.shtml">{title}</a></h2>
                        <p class="room">{room}</p>
                        <p class="add"><a>Chaoyang</a> <a>Wangjing</a></p>
                        <div class="jjr"><span class="geren">Mr. Li</span></div>
                    </div>
                    <div class="money"><b>2500</b></div>
                </li>"#
            )
        })
        .collect();

    let pager: String = (1..=pages)
        .map(|page| format!("<a><span>{page}</span></a>"))
        .collect();

    format!(
        r#"<html><body>
            <ul class="listUl">{items}</ul>
            <div class="pager" id="bottom_ad_li">{pager}<a class="next"><span>next</span></a></div>
        </body></html>"#
    )
}

fn config(download_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.general.download_dir = download_dir.to_path_buf();
    config.sites.tc.url = TC_TEMPLATE.to_string();
    config
}

fn profile(config: &AppConfig, kind: SiteKind) -> SiteProfile {
    SiteProfile::from_config(config, kind).expect("build profile")
}

fn context(profile: SiteProfile, store: Arc<dyn DedupStore>) -> RunContext {
    RunContext::with_reference(profile, store, CancellationToken::new(), reference())
}

fn tc_fetcher() -> StaticFetcher {
    StaticFetcher::new()
        .with_page(
            tc_url(1),
            tc_page(
                &[
                    ("Sunny", "2 rooms", 1),
                    ("Stale", "1 room", 20),
                    ("Basement deal", "1 room", 1),
                ],
                2,
            ),
        )
        .with_page(tc_url(2), tc_page(&[("Quiet", "1 room", 15)], 2))
}

fn export_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .expect("read export")
        .lines()
        .map(str::to_string)
        .collect()
}

#[tokio::test]
async fn test_tc_run_exports_filtered_records_in_page_order() {
    let tmp = TempDir::new().expect("create temp dir");
    let mut config = config(tmp.path());
    config.sites.tc.banned_titles = vec!["Basement".to_string()];

    let driver = PipelineDriver::new(Arc::new(tc_fetcher()));
    let ctx = context(profile(&config, SiteKind::Tc), Arc::new(MemoryDedupStore::new()));

    let report = driver.run(&ctx).await.expect("run succeeds");

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.pages_planned, 2);
    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.records_exported, 2);
    assert!(!report.cancelled);

    let output = report.output.expect("export written");
    assert_eq!(output.parent(), Some(tmp.path().join("tc").as_path()));

    let lines = export_lines(&output);
    assert_eq!(
        lines[0],
        "title,rental,room,district,address,href,landlord,last"
    );
    assert!(lines[1].starts_with("Sunny,2500,2 rooms,Chaoyang,Chaoyang Wangjing,"));
    assert!(lines[2].starts_with("Quiet,"));
    assert_eq!(lines.len(), 3);
}

#[tokio::test]
async fn test_second_run_exports_nothing() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(tmp.path());
    let store: Arc<dyn DedupStore> = Arc::new(MemoryDedupStore::new());
    let driver = PipelineDriver::new(Arc::new(tc_fetcher()));

    let first = driver
        .run(&context(profile(&config, SiteKind::Tc), Arc::clone(&store)))
        .await
        .expect("first run");
    assert_eq!(first.records_exported, 3);

    let second = driver
        .run(&context(profile(&config, SiteKind::Tc), store))
        .await
        .expect("second run");
    assert_eq!(second.state, RunState::Done);
    assert_eq!(second.pages_processed, 2);
    assert_eq!(second.records_exported, 0);
    assert!(second.output.is_none());
}

#[tokio::test]
async fn test_dedup_survives_reopening_the_database() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(&tmp.path().join("dl"));
    let db_path = tmp.path().join("harvest.db");
    let driver = PipelineDriver::new(Arc::new(tc_fetcher()));

    for expected in [3, 0] {
        let db = Database::new(&db_path).await.expect("open database");
        db.run_migrations().await.expect("run migrations");
        let store = Arc::new(SqliteDedupStore::new(db.pool().clone()));

        let report = driver
            .run(&context(profile(&config, SiteKind::Tc), store))
            .await
            .expect("run succeeds");
        assert_eq!(report.records_exported, expected);

        db.close().await;
    }
}

#[tokio::test]
async fn test_same_listing_on_two_pages_is_exported_once() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(tmp.path());
    let fetcher = StaticFetcher::new()
        .with_page(tc_url(1), tc_page(&[("Twin", "1 room", 1)], 2))
        .with_page(tc_url(2), tc_page(&[("Twin", "1 room", 1)], 2));

    let driver = PipelineDriver::new(Arc::new(fetcher));
    let report = driver
        .run(&context(
            profile(&config, SiteKind::Tc),
            Arc::new(MemoryDedupStore::new()),
        ))
        .await
        .expect("run succeeds");

    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.records_exported, 1);
}

#[tokio::test]
async fn test_zero_page_count_is_nothing_to_do() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(tmp.path());
    let fetcher = Arc::new(StaticFetcher::new().with_page(
        tc_url(1),
        r#"<html><body><div id="bottom_ad_li"><a><span>0</span></a></div></body></html>"#,
    ));

    let driver = PipelineDriver::new(fetcher.clone());
    let report = driver
        .run(&context(
            profile(&config, SiteKind::Tc),
            Arc::new(MemoryDedupStore::new()),
        ))
        .await
        .expect("empty plan is not an error");

    assert_eq!(report.state, RunState::Done);
    assert_eq!(report.pages_planned, 0);
    assert!(report.output.is_none());
    assert_eq!(fetcher.requests(), vec![tc_url(1)]);
    assert!(!tmp.path().join("tc").exists());
}

#[tokio::test]
async fn test_first_page_failure_fails_the_run() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(tmp.path());
    let fetcher = StaticFetcher::new().with_status(tc_url(1), 503);

    let driver = PipelineDriver::new(Arc::new(fetcher));
    let err = driver
        .run(&context(
            profile(&config, SiteKind::Tc),
            Arc::new(MemoryDedupStore::new()),
        ))
        .await
        .expect_err("first page failure is fatal");

    assert_eq!(err.pages_processed(), 0);
    assert!(matches!(
        err,
        RunError::Discovery {
            source: DiscoveryError::FirstPageFailed { .. },
            ..
        }
    ));
}

#[tokio::test]
async fn test_failed_page_only_costs_that_page() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(tmp.path());
    let fetcher = StaticFetcher::new()
        .with_page(tc_url(1), tc_page(&[("One", "1 room", 1)], 3))
        .with_status(tc_url(2), 500)
        .with_page(tc_url(3), tc_page(&[("Three", "1 room", 1)], 3));

    let driver = PipelineDriver::new(Arc::new(fetcher));
    let report = driver
        .run(&context(
            profile(&config, SiteKind::Tc),
            Arc::new(MemoryDedupStore::new()),
        ))
        .await
        .expect("run succeeds");

    assert_eq!(report.pages_planned, 3);
    assert_eq!(report.pages_processed, 2);
    assert_eq!(report.records_exported, 2);
}

#[tokio::test]
async fn test_redirect_stops_further_pages() {
    let tmp = TempDir::new().expect("create temp dir");
    let mut config = config(tmp.path());
    config.general.max_concurrent_pages = Some(1);

    let fetcher = Arc::new(
        StaticFetcher::new()
            .with_page(tc_url(1), tc_page(&[("One", "1 room", 1)], 3))
            .with_redirect(
                tc_url(2),
                "http://test.local/tc/",
                tc_page(&[("Landing", "1 room", 1)], 3),
            )
            .with_page(tc_url(3), tc_page(&[("Three", "1 room", 1)], 3)),
    );

    let driver = PipelineDriver::new(fetcher.clone());
    let report = driver
        .run(&context(
            profile(&config, SiteKind::Tc),
            Arc::new(MemoryDedupStore::new()),
        ))
        .await
        .expect("run succeeds");

    assert_eq!(report.pages_planned, 3);
    assert_eq!(report.pages_processed, 1);
    assert_eq!(report.records_exported, 1);
    assert!(!report.cancelled);
    assert!(!fetcher.requests().contains(&tc_url(3)));
}

#[tokio::test]
async fn test_cancelled_run_issues_no_page_fetches() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(tmp.path());
    let fetcher = Arc::new(tc_fetcher());
    let cancel = CancellationToken::new();
    let ctx = RunContext::with_reference(
        profile(&config, SiteKind::Tc),
        Arc::new(MemoryDedupStore::new()),
        cancel.clone(),
        reference(),
    );

    cancel.cancel();
    let report = PipelineDriver::new(fetcher.clone())
        .run(&ctx)
        .await
        .expect("cancelled run still finishes");

    assert!(report.cancelled);
    assert_eq!(report.pages_processed, 0);
    assert!(report.output.is_none());
    // Only the planning fetch of page 1 went out.
    assert_eq!(fetcher.requests(), vec![tc_url(1)]);
}

#[tokio::test]
async fn test_export_failure_reports_processed_pages() {
    let tmp = TempDir::new().expect("create temp dir");
    let blocker = tmp.path().join("not-a-dir");
    std::fs::write(&blocker, b"file").expect("write blocker");
    let config = config(&blocker);

    let driver = PipelineDriver::new(Arc::new(tc_fetcher()));
    let err = driver
        .run(&context(
            profile(&config, SiteKind::Tc),
            Arc::new(MemoryDedupStore::new()),
        ))
        .await
        .expect_err("export cannot succeed");

    assert!(matches!(err, RunError::Export { .. }));
    assert_eq!(err.pages_processed(), 2);
}

#[tokio::test]
async fn test_clean_output_removes_previous_exports() {
    let tmp = TempDir::new().expect("create temp dir");
    let mut config = config(tmp.path());
    config.general.clean_download_dir = true;
    let stale = tmp.path().join("tc").join("tc_20000101000000.csv");
    std::fs::create_dir_all(stale.parent().expect("parent")).expect("create dir");
    std::fs::write(&stale, b"old").expect("write stale export");

    let driver = PipelineDriver::new(Arc::new(tc_fetcher()));
    let report = driver
        .run(&context(
            profile(&config, SiteKind::Tc),
            Arc::new(MemoryDedupStore::new()),
        ))
        .await
        .expect("run succeeds");

    assert!(!stale.exists());
    assert!(report.output.expect("export written").exists());
}

#[tokio::test]
async fn test_smth_keeps_one_listing_per_author() {
    let tmp = TempDir::new().expect("create temp dir");
    let mut config = config(tmp.path());
    config.sites.smth.url = "http://test.local/smth?p=%d".to_string();

    let row = |title: &str, author: &str| {
        format!(
            r#"<tr>
                <td class="title_9"><a href="/article/{title}">{title}</a></td>
                <td class="title_12"><a>{author}</a></td>
                <td class="title_10"><a>00:00</a></td>
            </tr>"#
        )
    };
    let page = format!(
        r#"<html><body><div id="main"><div id="body">
            <ul class="pagination"><ol class="page-main"><li><a>1</a></li><li><a>&gt;</a></li></ol></ul>
            <div class="b-content"><table><tbody>{}{}{}</tbody></table></div>
        </div></div></body></html>"#,
        row("Room-A", "alice"),
        row("Room-B", "alice"),
        row("Room-C", "bob")
    );
    let fetcher = StaticFetcher::new().with_page("http://test.local/smth?p=1", page);

    let driver = PipelineDriver::new(Arc::new(fetcher));
    let ctx = RunContext::new(
        profile(&config, SiteKind::Smth),
        Arc::new(MemoryDedupStore::new()),
        CancellationToken::new(),
    );
    let report = driver.run(&ctx).await.expect("run succeeds");

    assert_eq!(report.records_exported, 2);
    let lines = export_lines(&report.output.expect("export written"));
    assert!(lines[1].starts_with("Room-A,"));
    assert!(lines[2].starts_with("Room-C,"));
}

#[tokio::test]
async fn test_mfw_downloads_post_images() {
    let tmp = TempDir::new().expect("create temp dir");
    let mut config = config(tmp.path());
    config.sites.mfw.url = "http://test.local/yj/1-0-%d.html".to_string();

    let list = r#"<html><body>
        <div class="post-list"><ul>
            <li><div class="post-cover"><a href="/i/100.html" title="Kyoto"></a></div></li>
            <li><div class="post-cover"><a href="/i/200.html" title="Osaka"></a></div></li>
        </ul></div>
        <div class="_pagebar"><div><span class="count"><span>1</span></span></div></div>
    </body></html>"#;
    let post = r#"<html><body><div class="_j_content_box">
        <div class="add_pic"><a href="/photo/4532.html"><img data-rt-src="http://img.test.local/a/AB.jpeg?w=1"></a></div>
        <div class="add_pic"><a href="/photo/4533.html"><img data-rt-src="http://img.test.local/a/CD.png"></a></div>
    </div></body></html>"#;

    let fetcher = StaticFetcher::new()
        .with_page("http://test.local/yj/1-0-1.html", list)
        .with_page("http://test.local/i/100.html", post)
        .with_bytes("http://img.test.local/a/AB.jpeg?w=1", vec![0xFF, 0xD8, 0xFF]);

    let driver = PipelineDriver::new(Arc::new(fetcher));
    let ctx = context(profile(&config, SiteKind::Mfw), Arc::new(MemoryDedupStore::new()));
    let report = driver.run(&ctx).await.expect("run succeeds");

    let saved = tmp.path().join("mfw").join("100").join("4532.jpeg");
    assert_eq!(std::fs::read(&saved).expect("image saved"), vec![0xFF, 0xD8, 0xFF]);
    assert!(!tmp.path().join("mfw").join("100").join("4533.png").exists());

    assert_eq!(report.records_exported, 2);
    let lines = export_lines(&report.output.expect("manifest written"));
    assert_eq!(lines[0], "title,href,directory,images,failed");
    assert_eq!(lines[1], "Kyoto,http://test.local/i/100.html,100,1,1");
    assert_eq!(lines[2], "Osaka,http://test.local/i/200.html,200,0,0");
}

const MFW_LIST_URL: &str = "http://test.local/yj/1-0-1.html";

fn mfw_fetcher() -> StaticFetcher {
    let list = r#"<html><body>
        <div class="post-list"><ul>
            <li><div class="post-cover"><a href="/i/100.html" title="Kyoto"></a></div></li>
            <li><div class="post-cover"><a href="/i/200.html" title="Osaka"></a></div></li>
        </ul></div>
        <div class="_pagebar"><div><span class="count"><span>1</span></span></div></div>
    </body></html>"#;
    let post = r#"<html><body><div class="_j_content_box">
        <div class="add_pic"><a href="/photo/4532.html"><img data-rt-src="http://img.test.local/a/AB.jpeg"></a></div>
    </div></body></html>"#;

    StaticFetcher::new()
        .with_page(MFW_LIST_URL, list)
        .with_page("http://test.local/i/100.html", post)
        .with_page("http://test.local/i/200.html", post)
        .with_bytes("http://img.test.local/a/AB.jpeg", vec![0xFF, 0xD8])
}

/// Cancels the run while the listing page is being fetched by its worker.
struct CancelDuringListing {
    inner: StaticFetcher,
    cancel: CancellationToken,
    listing_fetches: AtomicUsize,
}

#[async_trait]
impl Fetcher for CancelDuringListing {
    async fn fetch(&self, url: &str) -> harvest_fetch::Result<FetchedPage> {
        // The first fetch of the listing is the planner's, the second the worker's.
        if url == MFW_LIST_URL && self.listing_fetches.fetch_add(1, Ordering::SeqCst) == 1 {
            self.cancel.cancel();
        }
        self.inner.fetch(url).await
    }

    async fn fetch_bytes(&self, url: &str) -> harvest_fetch::Result<Vec<u8>> {
        self.inner.fetch_bytes(url).await
    }
}

#[tokio::test]
async fn test_cancel_mid_run_skips_detail_pages() {
    let tmp = TempDir::new().expect("create temp dir");
    let mut config = config(tmp.path());
    config.sites.mfw.url = "http://test.local/yj/1-0-%d.html".to_string();

    let cancel = CancellationToken::new();
    let fetcher = Arc::new(CancelDuringListing {
        inner: mfw_fetcher(),
        cancel: cancel.clone(),
        listing_fetches: AtomicUsize::new(0),
    });
    let ctx = RunContext::with_reference(
        profile(&config, SiteKind::Mfw),
        Arc::new(MemoryDedupStore::new()),
        cancel,
        reference(),
    );

    let report = PipelineDriver::new(fetcher.clone())
        .run(&ctx)
        .await
        .expect("cancelled run still finishes");

    assert!(report.cancelled);
    assert_eq!(report.pages_processed, 1);
    let requests = fetcher.inner.requests();
    assert!(
        requests.iter().all(|url| !url.contains("/i/")),
        "detail pages fetched after cancel: {requests:?}"
    );
    assert!(!tmp.path().join("mfw").join("100").exists());

    // Accepted posts are still exported, with nothing downloaded.
    assert_eq!(report.records_exported, 2);
    let lines = export_lines(&report.output.expect("manifest written"));
    assert_eq!(lines[1], "Kyoto,http://test.local/i/100.html,100,0,0");
    assert_eq!(lines[2], "Osaka,http://test.local/i/200.html,200,0,0");
}

/// Dedup store whose lookups or writes always fail.
struct FailingStore {
    inner: MemoryDedupStore,
    fail_seen: bool,
    fail_mark: bool,
}

impl FailingStore {
    fn failing_seen() -> Self {
        Self {
            inner: MemoryDedupStore::new(),
            fail_seen: true,
            fail_mark: false,
        }
    }

    fn failing_mark() -> Self {
        Self {
            inner: MemoryDedupStore::new(),
            fail_seen: false,
            fail_mark: true,
        }
    }
}

#[async_trait]
impl DedupStore for FailingStore {
    async fn seen(&self, site: SiteKind, key: &DedupKey) -> Result<bool, StoreError> {
        if self.fail_seen {
            return Err(StoreError::Read {
                key: key.to_string(),
                source: sqlx::Error::PoolTimedOut,
            });
        }
        self.inner.seen(site, key).await
    }

    async fn mark_seen(&self, site: SiteKind, key: &DedupKey) -> Result<bool, StoreError> {
        if self.fail_mark {
            return Err(StoreError::Write {
                key: key.to_string(),
                source: sqlx::Error::PoolTimedOut,
            });
        }
        self.inner.mark_seen(site, key).await
    }

    async fn asset_downloaded(&self, site: SiteKind, link: &str) -> Result<bool, StoreError> {
        self.inner.asset_downloaded(site, link).await
    }

    async fn mark_asset(
        &self,
        site: SiteKind,
        link: &str,
        downloaded: bool,
    ) -> Result<(), StoreError> {
        self.inner.mark_asset(site, link, downloaded).await
    }
}

#[tokio::test]
async fn test_failing_dedup_lookup_treats_records_as_new() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(tmp.path());
    let store: Arc<dyn DedupStore> = Arc::new(FailingStore::failing_seen());
    let driver = PipelineDriver::new(Arc::new(tc_fetcher()));

    let first = driver
        .run(&context(profile(&config, SiteKind::Tc), Arc::clone(&store)))
        .await
        .expect("lookup failures do not fail the run");
    assert_eq!(first.state, RunState::Done);
    assert_eq!(first.records_exported, 3);
    assert_eq!(export_lines(&first.output.expect("export written")).len(), 4);

    // Recording still works, so the claim rejects the repeats.
    let second = driver
        .run(&context(profile(&config, SiteKind::Tc), store))
        .await
        .expect("second run");
    assert_eq!(second.records_exported, 0);
}

#[tokio::test]
async fn test_failing_dedup_write_keeps_records() {
    let tmp = TempDir::new().expect("create temp dir");
    let config = config(tmp.path());
    let store: Arc<dyn DedupStore> = Arc::new(FailingStore::failing_mark());
    let driver = PipelineDriver::new(Arc::new(tc_fetcher()));

    for _ in 0..2 {
        let report = driver
            .run(&context(profile(&config, SiteKind::Tc), Arc::clone(&store)))
            .await
            .expect("write failures do not fail the run");
        assert_eq!(report.state, RunState::Done);
        assert_eq!(report.records_exported, 3);
        assert!(report.output.expect("export written").exists());
    }
}

const IMG_TEMPLATE: &str = "http://test.local/api/list?page=%d";

fn img_fetcher() -> StaticFetcher {
    let first = "\u{feff}{\"statu\":1,\"total\":\"3\",\"pages\":2,\"list\":[\
        {\"id\":\"1024\",\"arcurl\":\"/a/1024.html\",\"title\":\"Harbour\",\"click\":\"5300\",\"picnum\":2},\
        {\"id\":\"1025\",\"arcurl\":\"/a/1025.html\",\"title\":\"Alley\",\"click\":\"12\",\"picnum\":4}]}";
    let second = r#"{"statu":1,"total":"3","pages":2,"list":[
        {"id":"1026","arcurl":"/a/1026.html","title":"Bridge","click":"4000","picnum":1}]}"#;
    let album = |images: &[&str]| {
        let anchors: String = images
            .iter()
            .enumerate()
            .map(|(i, src)| format!(r#"<a data-id="{i}"><img data-original="{src}"></a>"#))
            .collect();
        format!(r#"<html><body><div class="wp"><div id="container">{anchors}</div></div></body></html>"#)
    };

    StaticFetcher::new()
        .with_page(IMG_TEMPLATE.replace("%d", "1"), first)
        .with_page(IMG_TEMPLATE.replace("%d", "2"), second)
        .with_page(
            "http://test.local/a/1024.html",
            album(&["http://img.test.local/p/a1.jpg", "http://img.test.local/p/a2.jpg"]),
        )
        .with_page(
            "http://test.local/a/1026.html",
            album(&["http://img.test.local/p/b1.png"]),
        )
        .with_bytes("http://img.test.local/p/a1.jpg", vec![1, 2, 3])
        .with_bytes("http://img.test.local/p/b1.png", vec![4, 5])
}

#[tokio::test]
async fn test_img_run_filters_clicks_and_marks_downloads() {
    let tmp = TempDir::new().expect("create temp dir");
    let mut config = config(&tmp.path().join("dl"));
    config.sites.img.url = IMG_TEMPLATE.to_string();
    config.sites.img.min_clicks = 3000;

    let db = Database::new(&tmp.path().join("harvest.db"))
        .await
        .expect("open database");
    db.run_migrations().await.expect("run migrations");
    let store: Arc<dyn DedupStore> = Arc::new(SqliteDedupStore::new(db.pool().clone()));

    let fetcher = Arc::new(img_fetcher());
    let report = PipelineDriver::new(fetcher.clone())
        .run(&context(profile(&config, SiteKind::Img), Arc::clone(&store)))
        .await
        .expect("run succeeds");

    assert_eq!(report.pages_planned, 2);
    assert_eq!(report.records_exported, 2);
    let lines = export_lines(&report.output.expect("manifest written"));
    assert_eq!(lines[0], "title,href,clicks,directory,images,failed");
    assert_eq!(lines[1], "Harbour,http://test.local/a/1024.html,5300,1024,1,1");
    assert_eq!(lines[2], "Bridge,http://test.local/a/1026.html,4000,1026,1,0");

    let root = tmp.path().join("dl").join("img");
    assert_eq!(std::fs::read(root.join("1024").join("a1.jpg")).expect("a1"), vec![1, 2, 3]);
    assert_eq!(std::fs::read(root.join("1026").join("b1.png")).expect("b1"), vec![4, 5]);
    assert!(!fetcher
        .requests()
        .contains(&"http://test.local/a/1025.html".to_string()));

    let saved = |link: &'static str| {
        let store = Arc::clone(&store);
        async move {
            store
                .asset_downloaded(SiteKind::Img, link)
                .await
                .expect("marker lookup")
        }
    };
    assert!(saved("http://img.test.local/p/a1.jpg").await);
    assert!(!saved("http://img.test.local/p/a2.jpg").await);
    assert!(saved("http://img.test.local/p/b1.png").await);

    // Forget the albums but keep the markers: saved links are not fetched again,
    // the failed one is retried.
    seen_keys::forget_site(db.pool(), "img")
        .await
        .expect("forget keys");
    let again = Arc::new(img_fetcher());
    let rerun = PipelineDriver::new(again.clone())
        .run(&context(profile(&config, SiteKind::Img), Arc::clone(&store)))
        .await
        .expect("rerun succeeds");

    assert_eq!(rerun.records_exported, 2);
    let requests = again.requests();
    assert!(!requests.contains(&"http://img.test.local/p/a1.jpg".to_string()));
    assert!(!requests.contains(&"http://img.test.local/p/b1.png".to_string()));
    assert!(requests.contains(&"http://img.test.local/p/a2.jpg".to_string()));
    let lines = export_lines(&rerun.output.expect("manifest written"));
    assert_eq!(lines[1], "Harbour,http://test.local/a/1024.html,5300,1024,1,1");

    db.close().await;
}
