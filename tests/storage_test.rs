//! Durable state integration tests
//!
//! Community configuration and name overrides must survive a restart:
//! state written through one `AppState` is read back by a fresh one over the
//! same data directory.

mod common;

use std::sync::Arc;
use tempfile::TempDir;

use common::*;
use rollcall::state::{COMMUNITIES_DOC, OVERRIDES_DOC};
use rollcall::storage::JsonStore;
use rollcall::{AppState, CommunityId, MemberId};

async fn open(dir: &TempDir) -> AppState {
    let store = JsonStore::open(dir.path()).await.unwrap();
    AppState::load(store).await.unwrap()
}

#[tokio::test]
async fn test_fresh_directory_is_empty_state() {
    let dir = TempDir::new().unwrap();
    let state = open(&dir).await;

    assert!(state.config(COMMUNITY).clan().is_none());
    assert!(state.overrides_for(COMMUNITY).is_empty());
}

#[tokio::test]
async fn test_config_and_overrides_survive_restart() {
    let dir = TempDir::new().unwrap();
    {
        let state = open(&dir).await;
        state
            .update_config(COMMUNITY, |c| {
                c.clan_name = Some("Lords of Gielinor".to_string());
                c.summary_channel_id = Some(SUMMARY);
            })
            .await
            .unwrap();
        state
            .set_override(COMMUNITY, MemberId(10), "Iron Bob")
            .await
            .unwrap();
        state
            .set_override(CommunityId(2), MemberId(10), "Someone Else")
            .await
            .unwrap();
    }

    assert!(dir.path().join(COMMUNITIES_DOC).exists());
    assert!(dir.path().join(OVERRIDES_DOC).exists());

    let restored = open(&dir).await;
    let config = restored.config(COMMUNITY);
    assert_eq!(config.clan(), Some("Lords of Gielinor"));
    assert_eq!(config.summary_channel_id, Some(SUMMARY));
    assert_eq!(
        restored
            .overrides_for(COMMUNITY)
            .get(&MemberId(10))
            .map(String::as_str),
        Some("Iron Bob")
    );
    assert_eq!(restored.overrides_for(CommunityId(2)).len(), 1);
}

#[tokio::test]
async fn test_pending_sets_are_not_persisted() {
    let dir = TempDir::new().unwrap();
    let token = {
        let state = open(&dir).await;
        let token = state.pending().add(COMMUNITY, MODERATOR, vec![]);
        state.persist().await.unwrap();
        token
    };

    let restored = open(&dir).await;
    assert!(restored.pending().get(&token).is_none());
}

#[tokio::test]
async fn test_service_commands_persist() {
    let dir = TempDir::new().unwrap();
    {
        let state = Arc::new(open(&dir).await);
        let fx = Fixture::with_state(vec![], StaticRoster::new(&[]), state).await;
        fx.service
            .connect_roster(&ctx(MODERATOR), "  Lords of Gielinor ")
            .await
            .unwrap();
        fx.service
            .set_name_override(&ctx(MODERATOR), MemberId(11), "Zezima")
            .await
            .unwrap();
    }

    let restored = open(&dir).await;
    assert_eq!(restored.config(COMMUNITY).clan(), Some("Lords of Gielinor"));
    assert_eq!(
        restored
            .overrides_for(COMMUNITY)
            .get(&MemberId(11))
            .map(String::as_str),
        Some("Zezima")
    );
}

#[tokio::test]
async fn test_documents_are_readable_json() {
    let dir = TempDir::new().unwrap();
    let state = open(&dir).await;
    state
        .update_config(COMMUNITY, |c| c.clan_name = Some("Lords".to_string()))
        .await
        .unwrap();

    let raw = std::fs::read_to_string(dir.path().join(COMMUNITIES_DOC)).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(doc[0]["community_id"], 1);
    assert_eq!(doc[0]["clan_name"], "Lords");
}

#[tokio::test]
async fn test_corrupt_document_fails_load() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join(OVERRIDES_DOC), "[{\"oops\":").unwrap();

    let store = JsonStore::open(dir.path()).await.unwrap();
    assert!(AppState::load(store).await.is_err());
}
