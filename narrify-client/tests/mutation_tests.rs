mod common;

use common::{harness, settle};
use narrify_client::cache::{keys, QueryStatus};
use narrify_client::consumers::{Dashboard, EditorAccess, EditorForm, HomeFeed, PostDetail, PostEditor};
use narrify_client::mutation::{MutationOutcome, MutationRecord};
use narrify_client::{ClientError, ErrorKind};
use narrify_core::{Post, PostId};
use narrify_test_utils::fixtures::{post_input, AMY, BOB, PASSWORD};
use narrify_test_utils::ApiCall;

const AMY_POST: PostId = PostId(1);
const BOB_POST: PostId = PostId(3);

#[tokio::test]
async fn delete_invalidates_lists_and_detail() {
    let h = harness();
    let dashboard = Dashboard::attach(&h.ctx);
    let feed = HomeFeed::new(&h.ctx);
    let detail = PostDetail::new(&h.ctx, AMY_POST);
    h.ctx.auth.login(AMY, PASSWORD).await.unwrap();

    assert_eq!(dashboard.settled_view().await.unwrap().rows.len(), 2);
    assert_eq!(feed.settled_view().await.unwrap().total, 3);
    let view = detail.settled_view().await.unwrap();
    assert!(view.can_modify);
    h.api.reset_calls();

    detail.delete().await.unwrap();
    assert!(!h.api.has_post(AMY_POST));

    let entry = h
        .ctx
        .cache
        .settled::<Post>(&keys::post(AMY_POST))
        .await
        .unwrap();
    assert_eq!(entry.status, QueryStatus::Error);
    assert_eq!(entry.error.as_ref().map(|e| e.kind), Some(ErrorKind::NotFound));
    assert!(entry.data.is_none());

    let mine = h
        .ctx
        .cache
        .settled::<Vec<Post>>(&keys::my_posts())
        .await
        .unwrap();
    assert_eq!(mine.data().map(Vec::len), Some(1));
    assert_eq!(feed.settled_view().await.unwrap().total, 2);

    assert_eq!(h.api.count(&ApiCall::DeletePost(AMY_POST)), 1);
    assert_eq!(h.api.count(&ApiCall::GetPost(AMY_POST)), 1);
    assert_eq!(h.api.count(&ApiCall::MyPosts), 1);
    assert_eq!(h.api.count(&ApiCall::ListPosts(String::new())), 1);

    let view = detail.view().unwrap();
    assert!(view.post.is_none());
    assert!(!view.can_modify);
}

#[tokio::test]
async fn forbidden_delete_surfaces_error_without_invalidating() {
    let h = harness();
    let dashboard = Dashboard::attach(&h.ctx);
    h.ctx.auth.login(BOB, PASSWORD).await.unwrap();
    dashboard.settled_view().await.unwrap();
    h.api.reset_calls();

    let err = h.ctx.mutations.delete(AMY_POST).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    assert!(h.ctx.session.is_authenticated());
    assert!(h.api.has_post(AMY_POST));
    settle().await;
    assert_eq!(h.api.calls(), vec![ApiCall::DeletePost(AMY_POST)]);
}

#[tokio::test]
async fn rejected_credential_on_write_clears_session_without_retry() {
    let h = harness();
    h.ctx.auth.login(AMY, PASSWORD).await.unwrap();
    h.api.revoke_tokens();

    let err = h
        .ctx
        .mutations
        .create(post_input())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);
    assert!(!h.ctx.session.is_authenticated());
    assert_eq!(h.api.count(&ApiCall::CreatePost), 1);
}

#[tokio::test]
async fn writes_require_a_session() {
    let h = harness();
    let err = h.ctx.mutations.delete(AMY_POST).await.unwrap_err();
    assert!(matches!(err, ClientError::LoginRequired));
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn invalid_payload_is_rejected_before_the_call() {
    let h = harness();
    h.ctx.auth.login(AMY, PASSWORD).await.unwrap();
    h.api.reset_calls();
    let mut input = post_input();
    input.title = "  ".into();

    let err = h
        .ctx
        .mutations
        .execute(MutationRecord::create(input))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(_)));
    assert!(h.api.calls().is_empty());
}

#[tokio::test]
async fn create_refreshes_dashboard() {
    let h = harness();
    let dashboard = Dashboard::attach(&h.ctx);
    h.ctx.auth.login(AMY, PASSWORD).await.unwrap();
    dashboard.settled_view().await.unwrap();

    let outcome = h
        .ctx
        .mutations
        .execute(MutationRecord::create(post_input()))
        .await
        .unwrap();
    let MutationOutcome::Created(post) = outcome else {
        panic!("expected a created post");
    };
    assert_eq!(post.author_username.as_deref(), Some(AMY));

    let view = dashboard.settled_view().await.unwrap();
    assert_eq!(view.rows.len(), 3);
    assert_eq!(view.rows[0].id, post.id);
}

#[tokio::test]
async fn editor_distinguishes_access_outcomes() {
    let h = harness();
    let editor = PostEditor::new(&h.ctx);

    assert_eq!(
        editor.open_existing(AMY_POST).await.unwrap(),
        EditorAccess::LoginRequired
    );
    assert!(matches!(editor.open_new(), Err(ClientError::LoginRequired)));

    h.ctx.auth.login(AMY, PASSWORD).await.unwrap();
    match editor.open_existing(AMY_POST).await.unwrap() {
        EditorAccess::Editable(form) => {
            assert_eq!(form.target, Some(AMY_POST));
            assert_eq!(form.title, "Cats of Lisbon");
        }
        other => panic!("expected editable, got {:?}", other),
    }
    assert_eq!(
        editor.open_existing(BOB_POST).await.unwrap(),
        EditorAccess::Forbidden
    );
    assert_eq!(
        editor.open_existing(PostId(999)).await.unwrap(),
        EditorAccess::NotFound
    );
    assert_eq!(editor.open_new().unwrap(), EditorForm::default());
}

#[tokio::test]
async fn editor_update_refreshes_detail() {
    let h = harness();
    let editor = PostEditor::new(&h.ctx);
    let detail = PostDetail::new(&h.ctx, AMY_POST);
    h.ctx.auth.login(AMY, PASSWORD).await.unwrap();

    let EditorAccess::Editable(mut form) = editor.open_existing(AMY_POST).await.unwrap() else {
        panic!("expected editable");
    };
    form.title = "Cats of Porto".into();
    let updated = editor.submit(&form).await.unwrap();
    assert_eq!(updated.title, "Cats of Porto");

    let view = detail.settled_view().await.unwrap();
    assert_eq!(view.post.map(|p| p.title.clone()), Some("Cats of Porto".to_string()));
    assert_eq!(h.api.count(&ApiCall::GetPost(AMY_POST)), 2);

    form.content = String::new();
    let err = editor.submit(&form).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(h.api.count(&ApiCall::UpdatePost(AMY_POST)), 1);
}

#[tokio::test]
async fn editor_new_post_creates() {
    let h = harness();
    let editor = PostEditor::new(&h.ctx);
    h.ctx.auth.login(BOB, PASSWORD).await.unwrap();

    let mut form = editor.open_new().unwrap();
    form.title = " Fresh ".into();
    form.content = "Body".into();
    let post = editor.submit(&form).await.unwrap();
    assert_eq!(post.title, "Fresh");
    assert_eq!(post.author_username.as_deref(), Some(BOB));
    assert!(h.api.has_post(post.id));
}
