#![allow(dead_code)]

use narrify_client::persistence::MemoryMedium;
use narrify_client::{AppContext, ConsumerSettings};
use narrify_test_utils::fixtures::seeded_api;
use narrify_test_utils::FakePostsApi;
use std::sync::Arc;

pub struct Harness {
    pub api: Arc<FakePostsApi>,
    pub medium: Arc<MemoryMedium>,
    pub ctx: AppContext,
}

pub fn harness() -> Harness {
    harness_with(seeded_api(), ConsumerSettings::default())
}

pub fn harness_with(api: FakePostsApi, settings: ConsumerSettings) -> Harness {
    let api = Arc::new(api);
    let medium = Arc::new(MemoryMedium::new());
    let ctx = AppContext::new(api.clone(), medium.clone(), settings);
    Harness { api, medium, ctx }
}

/// Let spawned fetches run to their next suspension point.
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

/// Yield until `condition` holds, failing after a bounded number of turns.
pub async fn eventually(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("condition never became true");
}
