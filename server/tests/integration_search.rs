use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use sift_core::persist::{load_docs, load_index, save_docs, save_index, IndexPaths, MetaFile};
use sift_core::{DocMeta, InvertedIndex, Tokenizer, TokenizerConfig};
use sift_server::{build_app_with, ServerConfig};
use std::collections::HashMap;
use tempfile::tempdir;
use tower::ServiceExt;

const TOKEN: &str = "secret";

fn build_tiny_index(dir: &std::path::Path) {
    let paths = IndexPaths::new(dir);
    let tokenizer = Tokenizer::default();
    let index = InvertedIndex::new();
    let mut docs = HashMap::new();
    for (id, (path, text)) in [("a.txt", "the cat sat"), ("b.txt", "the dog sat"), ("c.txt", "cats and dogs")]
        .into_iter()
        .enumerate()
    {
        index.index_text(id as u32, &tokenizer, text);
        docs.insert(id as u32, DocMeta { path: path.into() });
    }
    save_index(&paths, &index, &MetaFile::for_index(&index, TokenizerConfig::default())).unwrap();
    save_docs(&paths, &docs).unwrap();
}

fn app(dir: &std::path::Path) -> Router {
    build_app_with(ServerConfig { index_dir: dir.to_path_buf(), admin_token: Some(TOKEN.into()) }).unwrap()
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.clone().oneshot(req).await.unwrap();
    let status = resp.status();
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    send(app, Request::get(uri).body(Body::empty()).unwrap()).await
}

fn ids(json: &Value) -> Vec<u64> {
    json["doc_ids"].as_array().unwrap().iter().map(|v| v.as_u64().unwrap()).collect()
}

#[tokio::test]
async fn search_returns_matching_ids_and_paths() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let (status, json) = get(&app, "/search?q=sat%20AND%20NOT%20cat").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(ids(&json), vec![1]);
    assert_eq!(json["total_hits"], 1);
    assert_eq!(json["docs"][0]["path"], "b.txt");

    let (_, json) = get(&app, "/search?q=(cat%20OR%20dog)%20AND%20sat&limit=1").await;
    assert_eq!(ids(&json), vec![0, 1]);
    assert_eq!(json["docs"].as_array().unwrap().len(), 1);

    let (status, json) = get(&app, "/search?q=elephant").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);
}

#[tokio::test]
async fn malformed_query_is_bad_request_with_position() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let (status, json) = get(&app, "/search?q=cat%20AND").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["position"], 7);

    let (status, _) = get(&app, "/search?q=cat%20dog").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, json) = get(&app, "/search?q=cat%20dog&implicit_and=true").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["total_hits"], 0);

    let deep = format!("/search?q={}a{}", "%28".repeat(5_000), "%29".repeat(5_000));
    let (status, json) = get(&app, &deep).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["position"], 256);
}

#[tokio::test]
async fn doc_lookup() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let (status, json) = get(&app, "/doc/2").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["path"], "c.txt");
    let (status, _) = get(&app, "/doc/9").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_endpoints_require_token() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let req = Request::post("/index/commit").body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn batch_delete_and_commit_update_the_index() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let batch = serde_json::json!([
        { "doc_id": 3, "text": "a cat and a bird", "path": "d.txt" },
        { "doc_id": 0, "text": "the mat" }
    ]);
    let req = Request::post("/index/batch")
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::from(batch.to_string()))
        .unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 4);

    let (_, json) = get(&app, "/search?q=cat").await;
    assert_eq!(ids(&json), vec![3]);
    assert_eq!(json["docs"][0]["path"], "d.txt");

    let req = Request::delete("/index/doc/1").header("X-ADMIN-TOKEN", TOKEN).body(Body::empty()).unwrap();
    let (status, _) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    let (_, json) = get(&app, "/search?q=NOT%20bird").await;
    assert_eq!(ids(&json), vec![0, 2]);

    let req = Request::post("/index/commit").header("X-ADMIN-TOKEN", TOKEN).body(Body::empty()).unwrap();
    let (status, json) = send(&app, req).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["num_docs"], 3);

    let (reloaded, _) = load_index(&IndexPaths::new(dir.path())).unwrap();
    assert_eq!(reloaded.lookup("mat").as_slice(), &[0]);
    assert!(reloaded.lookup("dog").is_empty());
    assert_eq!(reloaded.lookup("dogs").as_slice(), &[2]);
}

fn admin_post(uri: &str, body: String) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .header("X-ADMIN-TOKEN", TOKEN)
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn commit_racing_batches_reloads_consistently() {
    let dir = tempdir().unwrap();
    build_tiny_index(dir.path());
    let app = app(dir.path());

    let mut tasks = Vec::new();
    for round in 0..8u32 {
        let batch: Vec<Value> = (0..25u32)
            .map(|n| {
                let id = 10 + round * 25 + n;
                serde_json::json!({ "doc_id": id, "text": format!("fresh tag{id}"), "path": format!("{id}.txt") })
            })
            .collect();
        let batch_app = app.clone();
        tasks.push(tokio::spawn(async move {
            send(&batch_app, admin_post("/index/batch", Value::from(batch).to_string())).await.0
        }));
        let commit_app = app.clone();
        tasks.push(tokio::spawn(async move {
            send(&commit_app, admin_post("/index/commit", String::new())).await.0
        }));
    }
    for task in tasks {
        assert_eq!(task.await.unwrap(), StatusCode::OK);
    }

    let paths = IndexPaths::new(dir.path());
    let (reloaded, _) = load_index(&paths).unwrap();
    let docs = load_docs(&paths).unwrap();
    for id in &reloaded.universe() {
        assert!(docs.contains_key(&id), "doc {id} committed without its path");
        if id >= 10 {
            let terms = reloaded.document_terms(id).unwrap();
            assert_eq!(terms, vec!["fresh".to_string(), format!("tag{id}")]);
        }
    }
}
