use anyhow::Context;
use futures::StreamExt;
use pashusewa_core::{
    ControllerOptions, FileSessionStore, SessionController, SessionState, SessionStore,
};
use std::sync::Arc;
use tempfile::TempDir;

fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime")
}

fn controller_in(dir: &TempDir) -> SessionController {
    SessionController::new(Arc::new(FileSessionStore::in_dir(dir.path())))
}

async fn settled(controller: &SessionController) -> SessionState {
    controller.ready().await;
    tokio::task::yield_now().await;
    controller.current()
}

#[test]
fn restart_restores_logged_in_session() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().context("temp dir")?;

    runtime.block_on(async {
        let controller = controller_in(&temp_dir);
        controller.login("tok123", "user1", true).await;
        assert!(settled(&controller).await.is_vet);
    });

    let restored = runtime.block_on(async {
        let controller = controller_in(&temp_dir);
        settled(&controller).await
    });
    assert!(restored.is_authenticated);
    assert_eq!(restored.user_id.as_deref(), Some("user1"));
    assert_eq!(restored.user_token.as_deref(), Some("tok123"));
    assert!(restored.error.is_none());
    Ok(())
}

#[test]
fn persisted_role_survives_restart() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let options = ControllerOptions { persist_role: true };

    let restored = runtime.block_on(async {
        let store = Arc::new(FileSessionStore::in_dir(temp_dir.path()));
        let controller = SessionController::with_options(store.clone(), options);
        controller.login("tok", "vet1", true).await;
        drop(controller);

        let controller = SessionController::with_options(store, options);
        settled(&controller).await
    });
    assert_eq!(restored, SessionState::authenticated("vet1", "tok", true));
}

#[test]
fn logout_leaves_nothing_on_disk() -> anyhow::Result<()> {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().context("temp dir")?;
    let store = FileSessionStore::in_dir(temp_dir.path());

    let state = runtime.block_on(async {
        let controller = SessionController::new(Arc::new(store.clone()));
        controller.login("tok", "user1", false).await;
        controller.logout().await;
        settled(&controller).await
    });

    assert!(!state.is_authenticated);
    assert!(state.user_id.is_none());
    assert!(state.user_token.is_none());
    assert!(!store.path().exists());
    let record = runtime
        .block_on(store.load())
        .context("session file should load after logout")?;
    assert!(record.is_empty());
    Ok(())
}

#[test]
fn subscribers_see_login_and_logout() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");

    runtime.block_on(async {
        let controller = controller_in(&temp_dir);
        controller.ready().await;
        let mut rx = controller.subscribe();

        controller.login("tok", "user1", false).await;
        let state = rx
            .wait_for(|state| state.is_authenticated && !state.is_loading)
            .await
            .expect("login observed")
            .clone();
        assert_eq!(state.user_id.as_deref(), Some("user1"));

        controller.logout().await;
        let state = rx
            .wait_for(|state| !state.is_authenticated)
            .await
            .expect("logout observed")
            .clone();
        assert!(state.user_token.is_none());
    });
}

#[test]
fn concurrent_login_and_logout_keep_state_consistent() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");

    let state = runtime.block_on(async {
        let controller = controller_in(&temp_dir);
        controller.ready().await;
        tokio::join!(
            controller.login("tok", "user1", false),
            controller.logout()
        );
        settled(&controller).await
    });

    // Either operation may win, but the published state stays coherent.
    assert!(!state.is_loading);
    assert_eq!(state.is_authenticated, state.user_token.is_some());
}

#[test]
fn store_streams_follow_controller_writes() {
    let runtime = test_runtime();
    let temp_dir = TempDir::new().expect("temp dir");
    let store = FileSessionStore::in_dir(temp_dir.path());

    runtime.block_on(async {
        let mut user_ids = store.user_id();
        assert_eq!(user_ids.next().await.expect("initial").expect("ok"), None);

        let controller = SessionController::new(Arc::new(store.clone()));
        controller.login("tok", "user1", false).await;
        let next = user_ids.next().await.expect("update").expect("ok");
        assert_eq!(next.as_deref(), Some("user1"));
    });
}
