//! End-to-end scenario tests (spec.md §8) driven over a real HTTP client
//! against a spawned in-process router, mirroring
//! `form-state/tests/delegated_auth_and_build_flow.rs`'s shape: build the
//! app, hit it with `reqwest`, assert on JSON bodies. TLS termination is
//! `ec-server::run`'s job, not the router's, so tests bind a plain TCP
//! listener and talk plain HTTP to the same `axum::Router` production code
//! builds.

use std::sync::Arc;
use std::time::Duration;

use ec_auth::Authority;
use ec_catalog::{model::QuestionGroupSpec, Catalog, Paper};
use ec_server::AppState;
use ec_store::ArtifactStore;
use ec_types::{PaperNumber, Question, Version};
use serde_json::json;

struct TestServer {
    base_url: String,
    catalog: Arc<Catalog>,
    authority: Arc<Authority>,
    artifacts: Arc<ArtifactStore>,
    _db_dir: tempfile::TempDir,
    _artifact_dir: tempfile::TempDir,
}

async fn spawn_server() -> TestServer {
    let db_dir = tempfile::tempdir().unwrap();
    let artifact_dir = tempfile::tempdir().unwrap();

    let db = ec_catalog::db::open_db(db_dir.path().join("catalog.redb"));
    let authority = Arc::new(Authority::new(db.clone(), 0x1122_3344_5566_7788_99aa_bbcc_ddee_ff00).unwrap());
    let catalog = Arc::new(Catalog::new(db, authority.clone()));
    let artifacts = Arc::new(ArtifactStore::new(artifact_dir.path()).unwrap());

    let state = AppState::new(
        authority.clone(),
        catalog.clone(),
        artifacts.clone(),
        "test-coordinator".to_string(),
        db_dir.path().join("users.json"),
    );

    let router = ec_server::build_router(state, Duration::from_secs(5));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router.into_make_service()).await.unwrap();
    });

    TestServer {
        base_url: format!("http://{addr}"),
        catalog,
        authority,
        artifacts,
        _db_dir: db_dir,
        _artifact_dir: artifact_dir,
    }
}

fn one_question_paper(paper: u32) -> Paper {
    Paper {
        paper_number: PaperNumber(paper),
        magic_code: "magic".into(),
        id_pages: vec![1],
        question_groups: vec![QuestionGroupSpec {
            question: Question(1),
            version: Version(1),
            pages: vec![2],
            max_mark: 10,
        }],
    }
}

fn ingest_all_pages(catalog: &Catalog, paper: PaperNumber) {
    catalog
        .ingest_page(paper, 1, Version(1), "artifact-1".into(), "hash-1".into(), "p1.png".into())
        .unwrap();
    catalog
        .ingest_page(paper, 2, Version(1), "artifact-2".into(), "hash-2".into(), "p2.png".into())
        .unwrap();
}

async fn login(client: &reqwest::Client, base: &str, user: &str, password: &str) -> String {
    let resp = client
        .post(format!("{base}/users/{user}/token"))
        .json(&json!({ "user": user, "password": password, "api_version": "1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200, "login for {user} should succeed");
    let body: serde_json::Value = resp.json().await.unwrap();
    body["token"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn happy_id_round_trip_then_progress_advances() {
    let server = spawn_server().await;
    server.catalog.register_paper(one_question_paper(1)).unwrap();
    ingest_all_pages(&server.catalog, PaperNumber(1));
    server.authority.create_or_update_user("marker1", "hunter22", false).unwrap();

    let client = reqwest::Client::new();
    let token = login(&client, &server.base_url, "marker1", "hunter22").await;

    let before: serde_json::Value = client
        .get(format!("{}/ID/progress", server.base_url))
        .header("x-exam-user", "marker1")
        .header("x-exam-token", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(before["done"], 0);
    assert_eq!(before["total"], 1);

    let claimed: serde_json::Value = client
        .get(format!("{}/ID/tasks/available", server.base_url))
        .header("x-exam-user", "marker1")
        .header("x-exam-token", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(claimed["paper_number"], 1);

    let resp = client
        .patch(format!("{}/ID/tasks/1", server.base_url))
        .header("x-exam-user", "marker1")
        .header("x-exam-token", &token)
        .json(&json!({ "student_id": "10000001", "student_name": "Alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let after: serde_json::Value = client
        .get(format!("{}/ID/progress", server.base_url))
        .header("x-exam-user", "marker1")
        .header("x-exam-token", &token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after["done"], 1);
    assert_eq!(after["total"], 1);
}

#[tokio::test]
async fn duplicate_student_id_conflicts_then_retry_succeeds() {
    let server = spawn_server().await;
    server.catalog.register_paper(one_question_paper(1)).unwrap();
    server.catalog.register_paper(one_question_paper(2)).unwrap();
    ingest_all_pages(&server.catalog, PaperNumber(1));
    ingest_all_pages(&server.catalog, PaperNumber(2));
    server.authority.create_or_update_user("u1", "passwordu1", false).unwrap();
    server.authority.create_or_update_user("u2", "passwordu2", false).unwrap();

    let client = reqwest::Client::new();
    let t1 = login(&client, &server.base_url, "u1", "passwordu1").await;
    let t2 = login(&client, &server.base_url, "u2", "passwordu2").await;

    // Both claim — FIFO means u1 gets paper 1, u2 gets paper 2.
    client
        .get(format!("{}/ID/tasks/available", server.base_url))
        .header("x-exam-user", "u1")
        .header("x-exam-token", &t1)
        .send()
        .await
        .unwrap();
    client
        .get(format!("{}/ID/tasks/available", server.base_url))
        .header("x-exam-user", "u2")
        .header("x-exam-token", &t2)
        .send()
        .await
        .unwrap();

    let resp = client
        .patch(format!("{}/ID/tasks/1", server.base_url))
        .header("x-exam-user", "u1")
        .header("x-exam-token", &t1)
        .json(&json!({ "student_id": "10000001", "student_name": "Alice" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let resp = client
        .patch(format!("{}/ID/tasks/2", server.base_url))
        .header("x-exam-user", "u2")
        .header("x-exam-token", &t2)
        .json(&json!({ "student_id": "10000001", "student_name": "Bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 409);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "Conflict");

    let resp = client
        .patch(format!("{}/ID/tasks/2", server.base_url))
        .header("x-exam-user", "u2")
        .header("x-exam-token", &t2)
        .json(&json!({ "student_id": "10000002", "student_name": "Bob" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn second_login_revokes_first_token_and_resets_in_flight_claims() {
    let server = spawn_server().await;
    server.catalog.register_paper(one_question_paper(1)).unwrap();
    ingest_all_pages(&server.catalog, PaperNumber(1));
    server.authority.create_or_update_user("repeat", "hunter25", false).unwrap();

    let client = reqwest::Client::new();
    let first_token = login(&client, &server.base_url, "repeat", "hunter25").await;

    client
        .get(format!("{}/ID/tasks/available", server.base_url))
        .header("x-exam-user", "repeat")
        .header("x-exam-token", &first_token)
        .send()
        .await
        .unwrap();

    let second_token = login(&client, &server.base_url, "repeat", "hunter25").await;
    assert_ne!(first_token, second_token);

    // The first token no longer validates.
    let resp = client
        .get(format!("{}/ID/progress", server.base_url))
        .header("x-exam-user", "repeat")
        .header("x-exam-token", &first_token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    // The claim it held reverted to Todo — the new session can claim it again.
    let claimed: serde_json::Value = client
        .get(format!("{}/ID/tasks/available", server.base_url))
        .header("x-exam-user", "repeat")
        .header("x-exam-token", &second_token)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(claimed["paper_number"], 1);
}

#[tokio::test]
async fn requests_without_a_valid_token_are_unauthorised() {
    let server = spawn_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .get(format!("{}/ID/progress", server.base_url))
        .header("x-exam-user", "nobody")
        .header("x-exam-token", "bogus")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .get(format!("{}/ID/progress", server.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn mark_claim_return_round_trip_with_integrity_check() {
    let server = spawn_server().await;
    server.catalog.register_paper(one_question_paper(7)).unwrap();
    ingest_all_pages(&server.catalog, PaperNumber(7));
    server.authority.create_or_update_user("grader", "hunter26", false).unwrap();

    let client = reqwest::Client::new();
    let token = login(&client, &server.base_url, "grader", "hunter26").await;

    let claim_resp = client
        .get(format!("{}/MK/tasks/available/1/1", server.base_url))
        .header("x-exam-user", "grader")
        .header("x-exam-token", &token)
        .send()
        .await
        .unwrap();
    assert_eq!(claim_resp.status(), 200);
    let content_type = claim_resp
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.starts_with("multipart/mixed"));
    let body_bytes = claim_resp.bytes().await.unwrap();
    let body_text = String::from_utf8_lossy(&body_bytes);
    assert!(body_text.contains("integrity_check"));

    let claimed = server
        .catalog
        .get_mark_task(PaperNumber(7), Question(1), Version(1))
        .unwrap()
        .unwrap();
    let integrity_check = claimed.integrity_check.clone().unwrap();

    let annotated_bytes = b"pretend annotated png bytes";
    let record_bytes = b"{\"strokes\":[]}";
    let annotated_digest = ArtifactStore::hash(annotated_bytes).0;
    let record_digest = ArtifactStore::hash(record_bytes).0;

    let control = serde_json::to_string(&json!({
        "score": 7,
        "marking_seconds": 42,
        "tags": ["needs-review"],
        "integrity_check": integrity_check,
        "annotated_image_digest": annotated_digest,
        "annotation_record_digest": record_digest,
    }))
    .unwrap();

    let form = reqwest::multipart::Form::new()
        .text("control", control)
        .part(
            "annotated_image",
            reqwest::multipart::Part::bytes(annotated_bytes.to_vec()),
        )
        .part(
            "annotation_record",
            reqwest::multipart::Part::bytes(record_bytes.to_vec()),
        );

    let resp = client
        .patch(format!("{}/MK/tasks/7/1/1", server.base_url))
        .header("x-exam-user", "grader")
        .header("x-exam-token", &token)
        .multipart(form)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let task = server
        .catalog
        .get_mark_task(PaperNumber(7), Question(1), Version(1))
        .unwrap()
        .unwrap();
    assert_eq!(task.score, Some(7));
    assert_eq!(task.marked_by.as_deref(), Some("grader"));

    // Verify the artifacts actually landed in the store under the
    // recorded ids (round-trip property P6).
    let annotated_id = task.annotated_image_id.clone().unwrap();
    let stored = server
        .artifacts
        .get(ec_store::ArtifactKind::Annotated, &ec_store::ArtifactId(annotated_id))
        .unwrap();
    assert_eq!(stored, annotated_bytes);
}

#[tokio::test]
async fn admin_routes_reject_non_admin_users_but_accept_admins() {
    let server = spawn_server().await;
    server.catalog.register_paper(one_question_paper(1)).unwrap();
    ingest_all_pages(&server.catalog, PaperNumber(1));
    server.authority.create_or_update_user("marker1", "hunter22", false).unwrap();
    server.authority.create_or_update_user("root", "hunter23", true).unwrap();

    let client = reqwest::Client::new();
    let marker_token = login(&client, &server.base_url, "marker1", "hunter22").await;
    let admin_token = login(&client, &server.base_url, "root", "hunter23").await;

    let resp = client
        .post(format!("{}/admin/users/enable", server.base_url))
        .header("x-exam-user", "marker1")
        .header("x-exam-token", &marker_token)
        .json(&json!({ "username": "marker1", "enabled": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    assert!(server.authority.is_enabled("marker1").unwrap());

    let resp = client
        .post(format!("{}/admin/users/enable", server.base_url))
        .header("x-exam-user", "root")
        .header("x-exam-token", &admin_token)
        .json(&json!({ "username": "marker1", "enabled": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert!(!server.authority.is_enabled("marker1").unwrap());
}

#[tokio::test]
async fn info_and_spec_endpoints_require_no_auth() {
    let server = spawn_server().await;
    server.catalog.register_paper(one_question_paper(1)).unwrap();
    let client = reqwest::Client::new();

    let resp = client.get(format!("{}/ping", server.base_url)).send().await.unwrap();
    assert_eq!(resp.status(), 200);

    let info: serde_json::Value = client
        .get(format!("{}/info", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(info["short_name"], "test-coordinator");

    let spec: serde_json::Value = client
        .get(format!("{}/spec", server.base_url))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(spec["paper_count"], 1);
}
