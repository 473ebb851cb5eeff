//! Integration tests for status.php, favorites, search and storage stats.

mod helpers;

use bytes::Bytes;
use http::StatusCode;
use serde_json::json;

use davsync_entity::{ShareType, VERSION};
use helpers::TestApp;

const TAGS: &str = "/index.php/apps/files/api/v1/files";
const FAVORITES: &str = "/index.php/apps/files/api/v1/tags/_$!<Favorite>!$_/files";
const SEARCH: &str = "/index.php/core/search";
const STORAGE_STATS: &str = "/index.php/apps/files/ajax/getstoragestats.php";

#[tokio::test]
async fn test_status_without_session() {
    let app = TestApp::new();
    app.stores.settings.set(VERSION, "9.0.1").await.unwrap();

    let response = app
        .api_request(&Default::default(), "GET", "/status.php", Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(
        response.headers.get("Content-Type").unwrap(),
        "application/json"
    );
    assert_eq!(
        response.json(),
        json!({
            "installed": true,
            "maintenance": false,
            "version": "9.0.1",
            "versionstring": "9.0.1",
            "edition": ""
        })
    );
}

#[tokio::test]
async fn test_wrong_method_is_rejected() {
    let app = TestApp::new();
    let response = app
        .api_request(&Default::default(), "POST", "/status.php", Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_tagging_marks_and_unmarks_favorite() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    app.put(&alice, "/My%20Notes.txt", "n").await;
    let node = app.node("alice/files/My Notes.txt").await.unwrap();

    let body = json!({"tags": ["_$!<Favorite>!$_"]}).to_string();
    let response = app
        .api_request(&alice, "POST", &format!("{TAGS}/My%20Notes.txt"), body)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(response.json(), json!({"tags": ["_$!<Favorite>!$_"]}));
    assert!(app.stores.favorites.is_favorite(node.id, "alice").await.unwrap());

    let response = app.propfind(&alice, "/My%20Notes.txt", "0").await;
    assert!(response.text().contains("<oc:favorite>1</oc:favorite>"));

    let body = json!({"tags": []}).to_string();
    app.api_request(&alice, "POST", &format!("{TAGS}/My%20Notes.txt"), body)
        .await;
    assert!(!app.stores.favorites.is_favorite(node.id, "alice").await.unwrap());
}

#[tokio::test]
async fn test_tagging_through_share_marks_owner_node() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    app.mkcol(&alice, "/shared").await;
    app.put(&alice, "/shared/plan.txt", "p").await;
    app.share("alice/files/shared", "bob", ShareType::User).await;
    let bob = TestApp::user("bob");
    let node = app.node("alice/files/shared/plan.txt").await.unwrap();

    let body = json!({"tags": ["_$!<Favorite>!$_"]}).to_string();
    let response = app
        .api_request(&bob, "POST", &format!("{TAGS}/shared/plan.txt"), body)
        .await;
    assert_eq!(response.status, StatusCode::OK);
    assert!(app.stores.favorites.is_favorite(node.id, "bob").await.unwrap());
    assert!(!app.stores.favorites.is_favorite(node.id, "alice").await.unwrap());
}

#[tokio::test]
async fn test_tagging_unknown_path_is_not_found() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    let body = json!({"tags": ["_$!<Favorite>!$_"]}).to_string();
    let response = app
        .api_request(&alice, "POST", &format!("{TAGS}/ghost.txt"), body)
        .await;
    assert_eq!(response.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_favorites_listing() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    app.mkcol(&alice, "/docs").await;
    app.put(&alice, "/docs/a.txt", "abc").await;
    let body = json!({"tags": ["_$!<Favorite>!$_"]}).to_string();
    app.api_request(&alice, "POST", &format!("{TAGS}/docs/a.txt"), body)
        .await;

    let response = app
        .api_request(
            &alice,
            "GET",
            "/index.php/apps/files/api/v1/tags/_%24!%3CFavorite%3E!%24_/files",
            Bytes::new(),
        )
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let files = response.json()["files"].as_array().unwrap().clone();
    assert_eq!(files.len(), 1);
    assert_eq!(files[0]["name"], "a.txt");
    assert_eq!(files[0]["path"], "/docs");
    assert_eq!(files[0]["size"], 3);
    assert_eq!(files[0]["type"], "file");
    assert_eq!(files[0]["permissions"], 27);
    assert_eq!(files[0]["tags"], json!(["_$!<Favorite>!$_"]));
    assert!(files[0].get("shareTypes").is_none());
}

#[test]
fn test_favorites_route_matches_raw_tag() {
    assert_eq!(
        davsync_webdav::ApiRoute::match_path(FAVORITES),
        Some(davsync_webdav::ApiRoute::Favorites)
    );
}

#[tokio::test]
async fn test_search_finds_own_files_by_name() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    app.mkcol(&alice, "/docs").await;
    app.put(&alice, "/docs/report.txt", "nested").await;
    app.put(&alice, "/report.txt", "top").await;
    app.put(&alice, "/my-report.txt", "other").await;
    let nested = app.node("alice/files/docs/report.txt").await.unwrap();

    let response = app
        .api_request(&alice, "GET", &format!("{SEARCH}?query=report.txt"), Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let hits = response.json();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 2, "{hits:?}");

    let hit = hits.iter().find(|h| h["path"] == "docs/report.txt").unwrap();
    assert_eq!(hit["id"], nested.id.to_string());
    assert_eq!(hit["name"], "report.txt");
    assert_eq!(hit["link"], "/index.php/apps/files/?dir=/docs&scrollto=report.txt");
    assert_eq!(hit["mime"], "text/plain");
    assert_eq!(hit["permissions"], "27");
    assert_eq!(hit["size"], "6");
    assert_eq!(hit["type"], "file");
    assert!(hits.iter().any(|h| h["path"] == "report.txt"));
}

#[tokio::test]
async fn test_search_skips_trash_and_reaches_shares() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    let bob = TestApp::user("bob");
    app.mkcol(&alice, "/shared").await;
    app.put(&alice, "/shared/plan.txt", "the plan").await;
    app.put(&alice, "/plan.txt", "private").await;
    app.share("alice/files/shared", "bob", ShareType::User).await;
    app.put(&bob, "/plan.txt", "bob's").await;
    app.request(&bob, "DELETE", "/plan.txt", &[], Bytes::new()).await;

    let response = app
        .api_request(&bob, "GET", &format!("{SEARCH}?query=plan.txt"), Bytes::new())
        .await;
    let hits = response.json();
    let hits = hits.as_array().unwrap();
    assert_eq!(hits.len(), 1, "{hits:?}");
    assert_eq!(hits[0]["path"], "shared/plan.txt");
    assert_eq!(hits[0]["permissions"], "31");
    assert_eq!(hits[0]["link"], "/index.php/apps/files/?dir=/shared&scrollto=plan.txt");
}

#[tokio::test]
async fn test_search_ignores_paths() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");
    app.mkcol(&alice, "/docs").await;

    for query in ["docs%2Fa", "", ".."] {
        let response = app
            .api_request(&alice, "GET", &format!("{SEARCH}?query={query}"), Bytes::new())
            .await;
        assert_eq!(response.status, StatusCode::OK, "{query}");
        assert_eq!(response.json(), json!([]), "{query}");
    }
}

#[tokio::test]
async fn test_storage_stats() {
    let app = TestApp::new();
    let alice = TestApp::user("alice");

    let response = app
        .api_request(&alice, "GET", STORAGE_STATS, Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::OK);
    let body = response.json();
    assert_eq!(body["status"], "success");
    assert_eq!(body["data"]["uploadMaxFilesize"], 537919488);
    assert_eq!(body["data"]["maxHumanFilesize"], "Upload (max. 513 MB)");
    assert_eq!(body["data"]["usedSpacePercent"], 0);
    assert_eq!(body["data"]["owner"], "alice");
    assert_eq!(body["data"]["ownerDisplayName"], "alice");
    assert!(body["data"]["freeSpace"].is_u64());

    let response = app
        .api_request(&Default::default(), "GET", STORAGE_STATS, Bytes::new())
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
}
