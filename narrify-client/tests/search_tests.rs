mod common;

use common::{harness, harness_with, settle};
use narrify_client::cache::{keys, KeyFilter, QueryStatus};
use narrify_client::consumers::{HomeFeed, FEED_EXCERPT_CHARS};
use narrify_client::ConsumerSettings;
use narrify_test_utils::fixtures::{seeded_api, AMY, PASSWORD};
use narrify_test_utils::generators::arb_keystrokes;
use narrify_test_utils::{ApiCall, FakePostsApi};
use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

const QUIET: Duration = Duration::from_millis(350);

#[tokio::test(start_paused = true)]
async fn typing_cat_then_cats_fetches_only_cats() {
    let h = harness();
    let feed = Arc::new(HomeFeed::new(&h.ctx));
    let follower = feed.follow();
    feed.settled_view().await.unwrap();
    h.api.reset_calls();

    feed.set_search("cat");
    tokio::time::sleep(Duration::from_millis(100)).await;
    feed.set_search("cats");
    tokio::time::sleep(QUIET + Duration::from_millis(50)).await;
    settle().await;

    let view = feed.settled_view().await.unwrap();
    assert_eq!(view.search, "cats");
    assert_eq!(view.total, 1);
    assert_eq!(h.api.count(&ApiCall::ListPosts("cats".into())), 1);
    assert_eq!(h.api.count(&ApiCall::ListPosts("cat".into())), 0);
    assert_eq!(h.api.count_list_posts(), 1);
    assert!(!h.ctx.cache.contains(&keys::posts("cat")));
    follower.abort();
}

#[tokio::test(start_paused = true)]
async fn previous_results_stay_visible_while_new_search_loads() {
    let h = harness();
    let feed = Arc::new(HomeFeed::new(&h.ctx));
    let follower = feed.follow();
    assert_eq!(feed.settled_view().await.unwrap().total, 3);

    let gate = h.api.hold(ApiCall::ListPosts("cats".into()));
    feed.set_search("cats");
    tokio::time::sleep(QUIET * 2).await;
    settle().await;

    let view = feed.view().unwrap();
    assert_eq!(view.status, QueryStatus::Loading);
    assert!(view.is_placeholder);
    assert_eq!(view.total, 3);

    gate.release();
    let view = feed.settled_view().await.unwrap();
    assert!(!view.is_placeholder);
    assert_eq!(view.total, 1);
    assert_eq!(view.rows[0].title, "Cats of Lisbon");
    follower.abort();
}

#[tokio::test]
async fn older_response_never_overwrites_newer() {
    let h = harness();
    let feed = HomeFeed::new(&h.ctx);

    let first = h.api.hold(ApiCall::ListPosts(String::new()));
    assert_eq!(feed.view().unwrap().status, QueryStatus::Loading);
    settle().await;

    h.api.add_post(AMY, "Fresh", "Just written.");
    h.ctx.cache.invalidate(&KeyFilter::prefix(keys::posts_root()));
    let view = feed.settled_view().await.unwrap();
    assert_eq!(view.total, 4);

    first.release();
    settle().await;
    let view = feed.view().unwrap();
    assert_eq!(view.status, QueryStatus::Success);
    assert_eq!(view.total, 4);
}

#[tokio::test]
async fn feed_pages_and_marks_own_posts() {
    let api = FakePostsApi::new().with_user(AMY, PASSWORD);
    for i in 0..7 {
        api.add_post(AMY, &format!("Post {}", i), &"word ".repeat(100));
    }
    api.add_post("someone", "Theirs", "Not yours.");
    let h = harness_with(
        api,
        ConsumerSettings {
            feed_page_size: 3,
            ..ConsumerSettings::default()
        },
    );
    h.ctx.auth.login(AMY, PASSWORD).await.unwrap();
    let feed = HomeFeed::new(&h.ctx);

    let view = feed.settled_view().await.unwrap();
    assert_eq!(view.total, 8);
    assert_eq!(view.rows.len(), 3);
    assert!(view.has_more);
    // Newest first.
    assert_eq!(view.rows[0].title, "Theirs");
    assert!(!view.rows[0].can_edit);
    assert!(view.rows[1].can_edit);
    assert_eq!(
        view.rows[1].excerpt.chars().count(),
        FEED_EXCERPT_CHARS + "...".len()
    );

    feed.load_more();
    feed.load_more();
    let view = feed.view().unwrap();
    assert_eq!(view.rows.len(), 8);
    assert!(!view.has_more);
    assert_eq!(h.api.count_list_posts(), 1);
}

#[tokio::test(start_paused = true)]
async fn stale_lists_refetch_on_next_read() {
    let h = harness_with(
        seeded_api(),
        ConsumerSettings {
            stale_after: Some(Duration::from_secs(30)),
            ..ConsumerSettings::default()
        },
    );
    let feed = HomeFeed::new(&h.ctx);
    feed.settled_view().await.unwrap();

    tokio::time::sleep(Duration::from_secs(10)).await;
    feed.settled_view().await.unwrap();
    assert_eq!(h.api.count_list_posts(), 1);

    tokio::time::sleep(Duration::from_secs(31)).await;
    let view = feed.view().unwrap();
    assert_eq!(view.status, QueryStatus::Loading);
    assert_eq!(view.total, 3);
    feed.settled_view().await.unwrap();
    assert_eq!(h.api.count_list_posts(), 2);
}

#[tokio::test]
async fn failed_search_shows_error_and_does_not_retry() {
    let h = harness();
    let feed = HomeFeed::new(&h.ctx);
    h.api
        .fail_next(narrify_test_utils::ApiClientError::from_status(500, r#"{"detail":"db down"}"#));
    let view = feed.settled_view().await.unwrap();
    assert_eq!(view.status, QueryStatus::Error);
    assert_eq!(view.error.map(|e| e.message), Some("HTTP 500: db down".to_string()));

    feed.view().unwrap();
    feed.view().unwrap();
    settle().await;
    assert_eq!(h.api.count_list_posts(), 1);

    h.ctx.cache.invalidate(&KeyFilter::exact(keys::posts("")));
    let view = feed.settled_view().await.unwrap();
    assert_eq!(view.status, QueryStatus::Success);
    assert!(view.error.is_none());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn keystroke_burst_fetches_only_the_final_search(strokes in arb_keystrokes(QUIET.as_millis() as u64 - 1)) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .start_paused(true)
            .build()
            .unwrap();
        let (calls, committed) = runtime.block_on(async {
            let h = harness();
            let feed = Arc::new(HomeFeed::new(&h.ctx));
            let follower = feed.follow();
            feed.settled_view().await.unwrap();
            h.api.reset_calls();

            for (raw, gap) in &strokes {
                feed.set_search(raw.clone());
                tokio::time::sleep(Duration::from_millis(*gap)).await;
            }
            tokio::time::sleep(QUIET * 2).await;
            settle().await;
            feed.settled_view().await.unwrap();
            follower.abort();
            (h.api.calls(), feed.search().committed())
        });

        let last = strokes.last().map(|(raw, _)| raw.trim().to_string()).unwrap_or_default();
        prop_assert_eq!(&committed, &last);
        let expected = if last.is_empty() {
            Vec::new()
        } else {
            vec![ApiCall::ListPosts(last)]
        };
        prop_assert_eq!(calls, expected);
    }
}
