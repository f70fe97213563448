use axum::body::{to_bytes, Body};
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use chrono::NaiveDateTime;
use petshop::observability::metrics::Metrics;
use petshop::store::MemoryStore;
use petshop::{router, AppState};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

struct TestApp {
    app: Router,
    store: MemoryStore,
    state: AppState,
}

fn test_app() -> TestApp {
    let store = MemoryStore::new();
    let state = AppState::new(Arc::new(store.clone()), Arc::new(Metrics::new()), "petshop-test".into());
    state.mark_ready();
    TestApp { app: router(state.clone()), store, state }
}

async fn call(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let req = match body {
        Some(b) => builder
            .header("content-type", "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };
    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

async fn create_owner(app: &Router, first: &str, last: &str) -> StatusCode {
    call(app, Method::POST, "/owners", Some(json!({"first_name": first, "last_name": last}))).await.0
}

async fn create_pet(app: &Router, name: &str, breed: &str, owner_id: i64) -> StatusCode {
    call(app, Method::POST, "/pets", Some(json!({"name": name, "breed": breed, "owner_id": owner_id}))).await.0
}

#[tokio::test]
async fn end_to_end_owner_pet_lifecycle() {
    let t = test_app();
    assert_eq!(create_owner(&t.app, "Ann", "Lee").await, StatusCode::CREATED);
    assert_eq!(create_pet(&t.app, "Rex", "Lab", 1).await, StatusCode::CREATED);

    let (status, owner) = call(&t.app, Method::GET, "/pets/1/owner", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owner["id"], 1);
    assert_eq!(owner["first_name"], "Ann");
    assert_eq!(owner["last_name"], "Lee");

    let (status, _) = call(&t.app, Method::DELETE, "/pets/1/owner/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, body) = call(&t.app, Method::GET, "/pets/1/owner", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn created_owner_is_listed_verbatim() {
    let t = test_app();
    assert_eq!(create_owner(&t.app, "Zoë", "O'Hara").await, StatusCode::CREATED);
    let (status, owners) = call(&t.app, Method::GET, "/owners", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owners.as_array().unwrap().len(), 1);
    assert_eq!(owners[0]["first_name"], "Zoë");
    assert_eq!(owners[0]["last_name"], "O'Hara");
    assert_eq!(owners[0]["date_created"], owners[0]["date_modified"]);
}

#[tokio::test]
async fn short_owner_name_is_rejected_without_write() {
    let t = test_app();
    let (status, body) = call(&t.app, Method::POST, "/owners", Some(json!({"first_name": "Al", "last_name": "Lee"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (_, owners) = call(&t.app, Method::GET, "/owners", None).await;
    assert_eq!(owners, json!([]));
}

#[tokio::test]
async fn empty_owner_list_is_ok() {
    let t = test_app();
    let (status, owners) = call(&t.app, Method::GET, "/owners", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owners, json!([]));
}

#[tokio::test]
async fn owners_filtered_by_creation_day() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    let today = chrono::Utc::now().date_naive();

    let (status, owners) = call(&t.app, Method::GET, &format!("/owners?date_created={}", today), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owners.as_array().unwrap().len(), 1);

    let (status, owners) = call(&t.app, Method::GET, "/owners?date_created=2001-01-01", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owners, json!([]));

    let (status, owners) = call(&t.app, Method::GET, &format!("/owners/by-date?date_created={}", today), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owners.as_array().unwrap().len(), 1);

    let (status, _) = call(&t.app, Method::GET, "/owners?date_created=not-a-date", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn owners_on_last_representable_day_is_empty() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    for uri in ["/owners/by-date?date_created=%2B262142-12-31", "/owners?date_created=%2B262142-12-31"] {
        let (status, owners) = call(&t.app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::OK, "{}", uri);
        assert_eq!(owners, json!([]), "{}", uri);
    }
}

#[tokio::test]
async fn pet_for_missing_owner_is_not_found_without_write() {
    let t = test_app();
    assert_eq!(create_pet(&t.app, "Rex", "Lab", 42).await, StatusCode::NOT_FOUND);
    create_owner(&t.app, "Ann", "Lee").await;
    let (_, pets) = call(&t.app, Method::GET, "/pets/owner/1", None).await;
    assert_eq!(pets, json!([]));
}

#[tokio::test]
async fn pet_validation_errors() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    assert_eq!(create_pet(&t.app, "Re", "Lab", 1).await, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(create_pet(&t.app, "Rex", "La", 1).await, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = call(&t.app, Method::POST, "/pets", Some(json!({"name": "Rex"}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn non_positive_path_ids_are_rejected() {
    let t = test_app();
    for uri in ["/pets/0/owner", "/pets/-3/owner", "/pets/owner/0", "/pets/abc/owner"] {
        let (status, body) = call(&t.app, Method::GET, uri, None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{}", uri);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }
    let (status, _) = call(&t.app, Method::DELETE, "/pets/1/owner/0", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn owner_of_pet_by_name_takes_first_match() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    create_owner(&t.app, "Bob", "Ray").await;
    create_pet(&t.app, "Rex", "Lab", 2).await;
    create_pet(&t.app, "Rex", "Pug", 1).await;

    let (status, owner) = call(&t.app, Method::GET, "/pets/owner?pet_name=Rex", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owner["first_name"], "Bob");

    let (status, _) = call(&t.app, Method::GET, "/pets/owner?pet_name=rex", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = call(&t.app, Method::GET, "/pets/owner", None).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn pets_by_owner_id() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    create_pet(&t.app, "Rex", "Lab", 1).await;
    create_pet(&t.app, "Max", "Pug", 1).await;

    let (status, pets) = call(&t.app, Method::GET, "/pets/owner/1", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = pets.as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Rex", "Max"]);
    assert_eq!(pets[0]["owner_id"], 1);

    let (status, _) = call(&t.app, Method::GET, "/pets/owner/9", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn pets_by_owner_name_aggregate_across_owners() {
    let t = test_app();
    create_owner(&t.app, "Jon", "Lee").await;
    create_owner(&t.app, "Jona", "Park").await;
    create_owner(&t.app, "Mia", "Wong").await;
    create_pet(&t.app, "Fido", "Mutt", 2).await;
    create_pet(&t.app, "Rex", "Lab", 1).await;
    create_pet(&t.app, "Tom", "Tabby", 3).await;

    let (status, pets) = call(&t.app, Method::GET, "/pets?owner_name=jon", None).await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = pets.as_array().unwrap().iter().map(|p| p["name"].as_str().unwrap()).collect();
    assert_eq!(names, vec!["Rex", "Fido"]);

    let (status, pets) = call(&t.app, Method::GET, "/pets?owner_name=N%20LE", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pets.as_array().unwrap().len(), 1);

    let (status, _) = call(&t.app, Method::GET, "/pets?owner_name=zed", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_name_match_with_no_pets_is_empty_list() {
    let t = test_app();
    create_owner(&t.app, "Jon", "Lee").await;
    let (status, pets) = call(&t.app, Method::GET, "/pets?owner_name=jon", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(pets, json!([]));
}

#[tokio::test]
async fn update_pet_scoped_to_owner() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    create_owner(&t.app, "Bob", "Ray").await;
    create_pet(&t.app, "Rex", "Lab", 1).await;

    let (status, _) = call(&t.app, Method::PUT, "/pets/1", Some(json!({"name": "Max", "breed": "Pug", "owner_id": 2}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, pets) = call(&t.app, Method::GET, "/pets/owner/1", None).await;
    assert_eq!(pets[0]["name"], "Rex");
    assert_eq!(pets[0]["breed"], "Lab");

    let (status, _) = call(&t.app, Method::PUT, "/pets/1", Some(json!({"name": "Max", "breed": "Pug", "owner_id": 1}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, pets) = call(&t.app, Method::GET, "/pets/owner/1", None).await;
    assert_eq!(pets[0]["name"], "Max");
    assert_eq!(pets[0]["breed"], "Pug");
    assert_eq!(pets[0]["owner_id"], 1);
}

#[tokio::test]
async fn update_pet_is_idempotent() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    create_pet(&t.app, "Rex", "Lab", 1).await;
    let body = json!({"name": "Max", "breed": "Pug", "owner_id": 1});

    for _ in 0..2 {
        let (status, _) = call(&t.app, Method::PUT, "/pets/1", Some(body.clone())).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (_, pets) = call(&t.app, Method::GET, "/pets/owner/1", None).await;
        assert_eq!(pets[0]["name"], "Max");
        assert_eq!(pets[0]["breed"], "Pug");
    }
}

fn timestamp(v: &Value) -> NaiveDateTime {
    serde_json::from_value(v.clone()).unwrap()
}

#[tokio::test]
async fn update_pet_refreshes_date_modified_only() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    create_owner(&t.app, "Bob", "Ray").await;
    create_pet(&t.app, "Rex", "Lab", 1).await;
    let (_, pets) = call(&t.app, Method::GET, "/pets/owner/1", None).await;
    let created = timestamp(&pets[0]["date_created"]);
    let modified = timestamp(&pets[0]["date_modified"]);

    tokio::time::sleep(Duration::from_millis(5)).await;
    let (status, _) = call(&t.app, Method::PUT, "/pets/1", Some(json!({"name": "Max", "breed": "Pug", "owner_id": 2}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (_, pets) = call(&t.app, Method::GET, "/pets/owner/1", None).await;
    assert_eq!(timestamp(&pets[0]["date_modified"]), modified);

    let (status, _) = call(&t.app, Method::PUT, "/pets/1", Some(json!({"name": "Max", "breed": "Pug", "owner_id": 1}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, pets) = call(&t.app, Method::GET, "/pets/owner/1", None).await;
    assert!(timestamp(&pets[0]["date_modified"]) > modified);
    assert_eq!(timestamp(&pets[0]["date_created"]), created);
}

#[tokio::test]
async fn update_pet_rejects_short_fields() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    create_pet(&t.app, "Rex", "Lab", 1).await;
    let (status, _) = call(&t.app, Method::PUT, "/pets/1", Some(json!({"name": "Mx", "breed": "Pug", "owner_id": 1}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn delete_pet_with_wrong_owner_is_noop() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    create_owner(&t.app, "Bob", "Ray").await;
    create_pet(&t.app, "Rex", "Lab", 1).await;

    let (status, _) = call(&t.app, Method::DELETE, "/pets/1/owner/2", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, owner) = call(&t.app, Method::GET, "/pets/1/owner", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(owner["first_name"], "Ann");
}

#[tokio::test]
async fn delete_owner_blocked_while_pets_exist() {
    let t = test_app();
    create_owner(&t.app, "Ann", "Lee").await;
    create_pet(&t.app, "Rex", "Lab", 1).await;

    let (status, body) = call(&t.app, Method::DELETE, "/owners/1", None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "CONFLICT");

    call(&t.app, Method::DELETE, "/pets/1/owner/1", None).await;
    let (status, _) = call(&t.app, Method::DELETE, "/owners/1", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = call(&t.app, Method::DELETE, "/owners/1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn store_outage_is_a_generic_server_error() {
    let t = test_app();
    t.store.set_available(false);
    let (status, body) = call(&t.app, Method::GET, "/owners", None).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "STORE_ERROR");
    assert_eq!(body["error"]["message"], "Internal server error.");
}

#[tokio::test]
async fn readiness_follows_store_and_draining() {
    let t = test_app();
    let (status, _) = call(&t.app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::OK);

    t.store.set_available(false);
    let (status, body) = call(&t.app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!("STORE_UNAVAILABLE"));

    t.store.set_available(true);
    t.state.start_draining();
    let (status, body) = call(&t.app, Method::GET, "/readyz", None).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, json!("DRAINING"));
}

#[tokio::test]
async fn welcome_and_metrics() {
    let t = test_app();
    let (status, body) = call(&t.app, Method::GET, "/", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["msg"], "Welcome to PetShop");

    create_owner(&t.app, "Ann", "Lee").await;
    call(&t.app, Method::GET, "/pets/9/owner", None).await;
    let (status, body) = call(&t.app, Method::GET, "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("owners_created_total 1"));
    assert!(text.contains("request_errors_total{code=\"NOT_FOUND\"} 1"));
}
