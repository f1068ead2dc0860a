//! Transaction lifecycle guarantees of the Unit of Work.

use lms_backend::repositories::repository::Repository;
use lms_backend::repositories::{UnitOfWork, UserRepository};
use lms_backend::types::OrganizationId;

#[path = "support/mod.rs"]
mod support;

#[tokio::test]
async fn commit_persists_changes() {
    let Some(pool) = support::try_test_pool().await else {
        support::skip_notice("commit_persists_changes");
        return;
    };

    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let user = support::seed_user(uow.conn(), OrganizationId::new(), None).await;
    uow.commit().await.expect("commit");

    let repo = UserRepository::new();
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let reloaded = repo
        .find_by_id(uow.conn(), user.id)
        .await
        .expect("query user");
    uow.rollback().await.expect("rollback");
    assert!(reloaded.is_some());
}

#[tokio::test]
async fn rollback_discards_changes() {
    let Some(pool) = support::try_test_pool().await else {
        support::skip_notice("rollback_discards_changes");
        return;
    };

    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let user = support::seed_user(uow.conn(), OrganizationId::new(), None).await;
    uow.rollback().await.expect("rollback");

    let repo = UserRepository::new();
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let reloaded = repo
        .find_by_id(uow.conn(), user.id)
        .await
        .expect("query user");
    uow.rollback().await.expect("rollback");
    assert!(reloaded.is_none());
}

#[tokio::test]
async fn dropping_an_uncommitted_scope_rolls_back() {
    let Some(pool) = support::try_test_pool().await else {
        support::skip_notice("dropping_an_uncommitted_scope_rolls_back");
        return;
    };

    let user_id;
    {
        let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
        let user = support::seed_user(uow.conn(), OrganizationId::new(), None).await;
        user_id = user.id;
        // Dropped here without commit: the error-propagation path.
    }

    let repo = UserRepository::new();
    let mut uow = UnitOfWork::begin(&pool).await.expect("begin");
    let reloaded = repo
        .find_by_id(uow.conn(), user_id)
        .await
        .expect("query user");
    uow.rollback().await.expect("rollback");
    assert!(reloaded.is_none());
}
