//! Integration tests for access through incoming shares.

mod helpers;

use bytes::Bytes;
use http::StatusCode;

use davsync_entity::ShareType;
use helpers::TestApp;

/// alice owns `shared/plan.txt` and shares `shared` with the `org` group.
async fn shared_folder(app: &TestApp) {
    let alice = TestApp::user("alice");
    app.mkcol(&alice, "/shared").await;
    app.put(&alice, "/shared/plan.txt", "the plan").await;
    app.share("alice/files/shared", "org", ShareType::Group).await;
}

#[tokio::test]
async fn test_group_share_reaches_subgroup_member() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let bob = TestApp::member("bob", &["org.eng"]);

    let response = app
        .request(&bob, "GET", "/shared/plan.txt", &[], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "the plan");
}

#[tokio::test]
async fn test_share_is_invisible_to_outsiders() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let mallory = TestApp::member("mallory", &["orgx"]);

    let response = app
        .request(&mallory, "GET", "/shared/plan.txt", &[], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_own_path_wins_over_share() {
    let app = TestApp::new();
    let bob = TestApp::member("bob", &["org"]);
    app.mkcol(&bob, "/shared").await;
    app.put(&bob, "/shared/plan.txt", "bob's plan").await;
    shared_folder(&app).await;

    let response = app
        .request(&bob, "GET", "/shared/plan.txt", &[], Bytes::new())
        .await;
    assert_eq!(response.text(), "bob's plan");
}

#[tokio::test]
async fn test_put_over_directly_shared_file_creates_own_file() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    let bob = TestApp::user("bob");
    app.put(&alice, "/doc.txt", "alice's").await;
    let shared = app.share("alice/files/doc.txt", "bob", ShareType::User).await;

    app.put(&bob, "/doc.txt", "bob's").await;

    assert_eq!(
        std::fs::read_to_string(app.disk("alice/files/doc.txt")).unwrap(),
        "alice's"
    );
    let node = app.node("alice/files/doc.txt").await.unwrap();
    let shares = app.stores.shares.get_by_node(node.id).await.unwrap();
    assert_eq!(shares.len(), 1);
    assert_eq!(shares[0].id, shared.id);
    assert_eq!(app.node("bob/files/doc.txt").await.unwrap().owner, "bob");

    let response = app.request(&bob, "GET", "/doc.txt", &[], Bytes::new()).await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.text(), "bob's");
}

#[tokio::test]
async fn test_put_into_share_belongs_to_owner() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let bob = TestApp::member("bob", &["org"]);

    app.put(&bob, "/shared/notes.txt", "from bob").await;

    let node = app.node("alice/files/shared/notes.txt").await.unwrap();
    assert_eq!(node.owner, "alice");
    assert!(app.node("bob/files/shared/notes.txt").await.is_none());
    assert_eq!(
        std::fs::read_to_string(app.disk("alice/files/shared/notes.txt")).unwrap(),
        "from bob"
    );
}

#[tokio::test]
async fn test_mkcol_into_share_belongs_to_owner() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let bob = TestApp::member("bob", &["org"]);

    app.mkcol(&bob, "/shared/sub").await;
    let node = app.node("alice/files/shared/sub").await.unwrap();
    assert!(node.is_dir);
    assert_eq!(node.owner, "alice");
}

#[tokio::test]
async fn test_move_into_share_transfers_ownership() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let bob = TestApp::member("bob", &["org"]);
    app.mkcol(&bob, "/mine").await;
    app.put(&bob, "/mine/draft.txt", "draft").await;

    let response = app
        .request(
            &bob,
            "MOVE",
            "/mine",
            &[("Destination", "/remote.php/webdav/shared/mine")],
            Bytes::new(),
        )
        .await;
    assert!(response.status.is_success(), "MOVE answered {}", response.status);

    for path in ["alice/files/shared/mine", "alice/files/shared/mine/draft.txt"] {
        assert_eq!(app.node(path).await.unwrap().owner, "alice", "{path}");
    }
    assert!(app.node("bob/files/mine").await.is_none());
    assert!(app.disk("alice/files/shared/mine/draft.txt").is_file());
}

#[tokio::test]
async fn test_move_into_share_drops_grants_to_new_owner() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let bob = TestApp::member("bob", &["org"]);
    app.mkcol(&bob, "/mine").await;
    app.share("bob/files/mine", "alice", ShareType::User).await;
    app.share("bob/files/mine", "carol", ShareType::User).await;

    let response = app
        .request(
            &bob,
            "MOVE",
            "/mine",
            &[("Destination", "/remote.php/webdav/shared/mine")],
            Bytes::new(),
        )
        .await;
    assert!(response.status.is_success(), "MOVE answered {}", response.status);

    let node = app.node("alice/files/shared/mine").await.unwrap();
    let targets: Vec<String> = app
        .stores
        .shares
        .get_by_node(node.id)
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.target)
        .collect();
    assert_eq!(targets, vec!["carol".to_string()]);
}

#[tokio::test]
async fn test_unshare_keeps_group_grant() {
    let app = TestApp::new();
    shared_folder(&app).await;
    app.share("alice/files/shared", "bob", ShareType::User).await;
    let bob = TestApp::member("bob", &["org"]);

    let response = app.request(&bob, "DELETE", "/shared", &[], Bytes::new()).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let node = app.node("alice/files/shared").await.unwrap();
    let remaining = app.stores.shares.get_by_node(node.id).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].target, "org");
    let response = app
        .request(&bob, "GET", "/shared/plan.txt", &[], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::OK);
}

#[tokio::test]
async fn test_delete_of_mount_point_only_unshares() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    app.mkcol(&alice, "/shared").await;
    app.put(&alice, "/shared/plan.txt", "the plan").await;
    app.share("alice/files/shared", "bob", ShareType::User).await;
    let bob = TestApp::user("bob");

    let response = app.request(&bob, "DELETE", "/shared", &[], Bytes::new()).await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    let node = app.node("alice/files/shared").await.unwrap();
    assert!(app.stores.shares.get_by_node(node.id).await.unwrap().is_empty());
    assert!(app.disk("alice/files/shared/plan.txt").is_file());

    let response = app
        .request(&bob, "GET", "/shared/plan.txt", &[], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_inside_share_trashes_for_owner() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let bob = TestApp::member("bob", &["org"]);

    let response = app
        .request(&bob, "DELETE", "/shared/plan.txt", &[], Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::NO_CONTENT);

    assert!(app.node("alice/files/shared/plan.txt").await.is_none());
    assert!(app.node("alice/files_trash/plan.txt").await.is_some());
    assert!(app.disk("alice/files_trash/plan.txt").is_file());
}

#[tokio::test]
async fn test_collision_picks_oldest_share_root() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    let carol = TestApp::user("carol");
    app.mkcol(&alice, "/team").await;
    app.put(&alice, "/team/a.txt", "from alice").await;
    app.mkcol(&carol, "/team").await;
    app.put(&carol, "/team/a.txt", "from carol").await;
    app.share("carol/files/team", "bob", ShareType::User).await;
    app.share("alice/files/team", "bob", ShareType::User).await;
    let bob = TestApp::user("bob");

    for _ in 0..3 {
        let response = app.request(&bob, "GET", "/team/a.txt", &[], Bytes::new()).await;
        assert_eq!(response.text(), "from alice");
    }
}

#[tokio::test]
async fn test_home_listing_splices_incoming_shares() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let bob = TestApp::member("bob", &["org.eng"]);
    app.put(&bob, "/own.txt", "mine").await;

    let response = app.propfind(&bob, "/", "1").await;
    assert_eq!(response.status, StatusCode::MULTI_STATUS);
    let body = response.text();

    assert!(body.contains("/remote.php/webdav/<"), "{body}");
    assert!(body.contains("/remote.php/webdav/own.txt<"), "{body}");
    assert!(body.contains("/remote.php/webdav/shared/<"), "{body}");
    assert!(!body.contains("alice/files"), "{body}");
    assert!(!body.contains("bob/files"), "{body}");
    assert!(body.contains("<oc:permissions>SRDNVCK</oc:permissions>"), "{body}");
    assert!(body.contains("<oc:permissions>RDNVW</oc:permissions>"), "{body}");
    assert!(
        body.contains("<oc:owner-display-name>alice</oc:owner-display-name>"),
        "{body}"
    );
    assert_eq!(body.matches("/remote.php/webdav/shared/<").count(), 1, "{body}");
}

#[tokio::test]
async fn test_listing_inside_share_uses_client_hrefs() {
    let app = TestApp::new();
    shared_folder(&app).await;
    let bob = TestApp::member("bob", &["org"]);

    let response = app.propfind(&bob, "/shared", "1").await;
    assert_eq!(response.status, StatusCode::MULTI_STATUS);
    let body = response.text();
    assert!(body.contains("/remote.php/webdav/shared/plan.txt<"), "{body}");
    assert!(!body.contains("alice/files"), "{body}");
    assert!(body.contains("<oc:permissions>SRDNVW</oc:permissions>"), "{body}");
}

#[tokio::test]
async fn test_owner_sees_share_types() {
    let app = TestApp::new();
    shared_folder(&app).await;
    app.share("alice/files/shared", "bob", ShareType::User).await;
    let alice = TestApp::user("alice");

    let response = app.propfind(&alice, "/shared", "0").await;
    let body = response.text();
    assert!(body.contains("<oc:share-types>"), "{body}");
    assert_eq!(body.matches("<oc:share-type>").count(), 2, "{body}");
    assert!(body.contains("<oc:share-type>1</oc:share-type>"), "{body}");
    assert!(body.contains("<oc:share-type>0</oc:share-type>"), "{body}");
}
