use axum::http::StatusCode;
use consultify_core::config::AppConfig;
use consultify_server::build_router;
use consultify_server::state::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use tower::ServiceExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn app_with(config: AppConfig) -> axum::Router {
    let conn = consultify_core::db::open_in_memory().unwrap();
    build_router(AppState::new(conn, config).with_env_keys(HashMap::new()))
}

fn app() -> axum::Router {
    app_with(AppConfig::default())
}

/// Send a request via `oneshot` and return (status, raw body).
async fn send_raw(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
    let mut builder = axum::http::Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {token}"));
    }
    let req = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(axum::body::Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap(),
        None => builder.body(axum::body::Body::empty()).unwrap(),
    };
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, bytes.to_vec())
}

/// Send a request and return (status, parsed JSON body).
async fn send(
    app: &axum::Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let (status, _, bytes) = send_raw(app, method, uri, token, body).await;
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

/// Register an organization; returns (token, organization id).
async fn register(app: &axum::Router, org: &str, email: &str) -> (String, String) {
    let (status, body) = send(
        app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "organization_name": org,
            "email": email,
            "password": "password123",
            "first_name": "Ada",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    (
        body["token"].as_str().unwrap().to_string(),
        body["organization"]["id"].as_str().unwrap().to_string(),
    )
}

async fn create_project(app: &axum::Router, token: &str, body: Value) -> String {
    let (status, project) = send(app, "POST", "/api/projects", Some(token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED, "{project}");
    project["id"].as_str().unwrap().to_string()
}

async fn add_user(app: &axum::Router, admin: &str, email: &str, role: &str) -> String {
    let (status, body) = send(
        app,
        "POST",
        "/api/users",
        Some(admin),
        Some(json!({ "email": email, "password": "password123", "role": role })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let (status, login) = send(
        app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": email, "password": "password123" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{login}");
    login["token"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_is_public() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_and_me() {
    let app = app();
    let (token, org_id) = register(&app, "Acme", "admin@acme.io").await;

    let (status, me) = send(&app, "GET", "/api/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["user"]["role"], "ADMIN");
    assert_eq!(me["organization"]["id"], org_id.as_str());
    assert_eq!(me["organization"]["token_balance"], 100_000);
    assert!(me["user"].get("password_hash").is_none());

    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/login",
        None,
        Some(json!({ "email": "ADMIN@acme.io", "password": "wrong-password" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_or_bad_token_is_401() {
    let app = app();
    let (status, body) = send(&app, "GET", "/api/projects", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());

    let (status, _) = send(&app, "GET", "/api/projects", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_email_is_409() {
    let app = app();
    register(&app, "Acme", "admin@acme.io").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/auth/register",
        None,
        Some(json!({
            "organization_name": "Other",
            "email": "admin@acme.io",
            "password": "password123",
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn viewer_cannot_manage_projects() {
    let app = app();
    let (admin, _) = register(&app, "Acme", "admin@acme.io").await;
    let viewer = add_user(&app, &admin, "viewer@acme.io", "VIEWER").await;

    let (status, _) = send(&app, "GET", "/api/projects", Some(&viewer), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        "POST",
        "/api/projects",
        Some(&viewer),
        Some(json!({ "name": "Nope" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn admin_cannot_grant_superadmin() {
    let app = app();
    let (admin, _) = register(&app, "Acme", "admin@acme.io").await;
    let (status, _) = send(
        &app,
        "POST",
        "/api/users",
        Some(&admin),
        Some(json!({ "email": "boss@acme.io", "password": "password123", "role": "SUPERADMIN" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn deactivated_organization_tokens_are_rejected() {
    let state = AppState::new(
        consultify_core::db::open_in_memory().unwrap(),
        AppConfig::default(),
    )
    .with_env_keys(HashMap::new());
    let app = build_router(state.clone());
    let (token, org_id) = register(&app, "Acme", "admin@acme.io").await;

    let (status, _) = send(&app, "GET", "/api/projects", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);

    state
        .db(move |conn| {
            let patch = consultify_core::organization::OrganizationPatch {
                is_active: Some(false),
                ..Default::default()
            };
            consultify_core::organization::Organization::update(conn, &org_id, &patch)
        })
        .await
        .unwrap();

    let (status, body) = send(&app, "GET", "/api/projects", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized: organization is deactivated");
}

// ---------------------------------------------------------------------------
// Projects, tasks, initiatives
// ---------------------------------------------------------------------------

#[tokio::test]
async fn other_tenant_sees_404() {
    let app = app();
    let (acme, _) = register(&app, "Acme", "admin@acme.io").await;
    let (globex, _) = register(&app, "Globex", "admin@globex.io").await;
    let project = create_project(&app, &acme, json!({ "name": "Pilot" })).await;

    let uri = format!("/api/projects/{project}");
    let (status, _) = send(&app, "GET", &uri, Some(&acme), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, "GET", &uri, Some(&globex), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, list) = send(&app, "GET", "/api/projects", Some(&globex), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn task_lifecycle_and_soft_delete() {
    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;

    let (status, task) = send(
        &app,
        "POST",
        &format!("/api/projects/{project}/tasks"),
        Some(&token),
        Some(json!({ "title": "Map processes", "priority": "high" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{task}");
    let task_id = task["id"].as_str().unwrap();
    assert_eq!(task["status"], "todo");

    let (status, updated) = send(
        &app,
        "PATCH",
        &format!("/api/tasks/{task_id}"),
        Some(&token),
        Some(json!({ "status": "done" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "done");

    let (status, list) = send(
        &app,
        "GET",
        &format!("/api/projects/{project}/tasks?status=done"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list.as_array().unwrap().len(), 1);

    let uri = format!("/api/tasks/{task_id}");
    let (status, _) = send(&app, "DELETE", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, list) = send(
        &app,
        "GET",
        &format!("/api/projects/{project}/tasks"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn task_initiative_must_share_project() {
    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let a = create_project(&app, &token, json!({ "name": "A" })).await;
    let b = create_project(&app, &token, json!({ "name": "B" })).await;
    let (status, initiative) = send(
        &app,
        "POST",
        &format!("/api/projects/{a}/initiatives"),
        Some(&token),
        Some(json!({ "name": "Data platform", "axis": 4, "start_date": "2026-07-01" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{initiative}");

    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/projects/{b}/tasks"),
        Some(&token),
        Some(json!({ "title": "x", "initiative_id": initiative["id"] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, roadmap) = send(&app, "GET", "/api/roadmap", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roadmap[0]["quarter"], "2026-Q3");
}

#[tokio::test]
async fn invalid_axis_is_400() {
    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/projects/{project}/initiatives"),
        Some(&token),
        Some(json!({ "name": "Bad", "axis": 9 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Assessments and reports
// ---------------------------------------------------------------------------

#[tokio::test]
async fn drd_assessment_flow_and_pdf() {
    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;

    let (status, frameworks) =
        send(&app, "GET", "/api/assessments/frameworks", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(frameworks.as_array().unwrap().len(), 5);

    let (status, assessment) = send(
        &app,
        "POST",
        &format!("/api/projects/{project}/assessments"),
        Some(&token),
        Some(json!({ "framework": "DRD" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{assessment}");
    let id = assessment["id"].as_str().unwrap().to_string();

    // Completing early fails: nothing scored yet.
    let (status, _) = send(
        &app,
        "POST",
        &format!("/api/assessments/{id}/complete"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "PUT",
        &format!("/api/assessments/{id}/scores/digital_processes"),
        Some(&token),
        Some(json!({ "actual": 8.0, "target": 5.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let drd = frameworks
        .as_array()
        .unwrap()
        .iter()
        .find(|f| f["framework"] == "DRD")
        .unwrap();
    for (i, dim) in drd["dimensions"].as_array().unwrap().iter().enumerate() {
        let key = dim["key"].as_str().unwrap();
        let actual = if i == 3 { 2.0 } else { 4.0 };
        let (status, body) = send(
            &app,
            "PUT",
            &format!("/api/assessments/{id}/scores/{key}"),
            Some(&token),
            Some(json!({ "actual": actual, "target": 6.0 })),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    let (status, done) = send(
        &app,
        "POST",
        &format!("/api/assessments/{id}/complete"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "completed");

    let (status, summary) = send(
        &app,
        "GET",
        &format!("/api/assessments/{id}/summary"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(summary["gaps"][0]["dimension"], "data_management");
    assert_eq!(summary["completion_pct"], 100.0);

    let (status, headers, bytes) = send_raw(
        &app,
        "GET",
        &format!("/api/assessments/{id}/report.pdf"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers["content-type"], "application/pdf");
    assert!(bytes.starts_with(b"%PDF-1.4"));
}

// ---------------------------------------------------------------------------
// AI chat
// ---------------------------------------------------------------------------

async fn chat(app: &axum::Router, token: &str, project: &str, body: Value) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        &format!("/api/projects/{project}/ai/chat"),
        Some(token),
        Some(body),
    )
    .await
}

#[tokio::test]
async fn chat_without_credentials_falls_back_unbilled() {
    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;

    let question = json!({ "message": "Where is our roadmap?" });
    let (status, reply) = chat(&app, &token, &project, question).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["mode"], "FALLBACK");
    assert_eq!(reply["tokens_used"], 0);
    assert_eq!(reply["balance"], 100_000);
}

#[tokio::test]
async fn guard_outcomes_follow_ai_role() {
    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let advisor = create_project(&app, &token, json!({ "name": "Advisor" })).await;
    let manager =
        create_project(&app, &token, json!({ "name": "Manager", "ai_role": "MANAGER" })).await;
    let operator =
        create_project(&app, &token, json!({ "name": "Operator", "ai_role": "OPERATOR" })).await;
    let regulated = create_project(
        &app,
        &token,
        json!({ "name": "Regulated", "ai_role": "OPERATOR", "regulatory_mode": true }),
    )
    .await;
    let body = json!({ "message": "Create a task to audit the MES", "action": "create_task" });

    let (status, _) = chat(&app, &token, &advisor, body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, reply) = chat(&app, &token, &regulated, body.clone()).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(reply["error"].as_str().unwrap().contains("regulatory mode"));

    let (status, reply) = chat(&app, &token, &manager, body.clone()).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(reply["decision"], "requires_approval");
    let cr = reply["change_request_id"].as_str().unwrap();
    let uri = format!("/api/change-requests/{cr}");
    let (status, request) = send(&app, "GET", &uri, Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(request["kind"], "ai_action");
    assert_eq!(request["status"], "submitted");

    let (status, reply) = chat(&app, &token, &operator, body.clone()).await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert!(reply["applied"]["task_id"].is_string());
    assert!(reply.get("note").is_none());

    let (status, reply) = chat(
        &app,
        &token,
        &operator,
        json!({ "message": "Mark the audit done", "action": "update_status" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert!(reply["applied"].is_null());
    assert!(reply["note"].as_str().unwrap().contains("update_status"));

    let delete = json!({ "message": "x", "action": "delete_project" });
    let (status, _) = chat(&app, &token, &operator, delete).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn approved_ai_action_is_applied_on_implement() {
    let app = app();
    let (admin, _) = register(&app, "Acme", "admin@acme.io").await;
    let user = add_user(&app, &admin, "user@acme.io", "USER").await;
    let manager = add_user(&app, &admin, "manager@acme.io", "MANAGER").await;
    let project = create_project(&app, &admin, json!({ "name": "P", "ai_role": "MANAGER" })).await;

    let (status, reply) = chat(
        &app,
        &user,
        &project,
        json!({ "message": "Launch a data governance board", "action": "create_initiative" }),
    )
    .await;
    assert_eq!(status, StatusCode::ACCEPTED);
    let cr = reply["change_request_id"].as_str().unwrap().to_string();
    let transition = format!("/api/change-requests/{cr}/transition");

    let approve = Some(json!({ "to": "approved" }));
    let (status, _) = send(&app, "POST", &transition, Some(&user), approve).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    for to in ["approved", "implemented"] {
        let (status, body) =
            send(&app, "POST", &transition, Some(&manager), Some(json!({ "to": to }))).await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }
    let (_, initiatives) = send(
        &app,
        "GET",
        &format!("/api/projects/{project}/initiatives"),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(initiatives[0]["name"], "Launch a data governance board");

    let reopen = Some(json!({ "to": "draft" }));
    let (status, _) = send(&app, "POST", &transition, Some(&manager), reopen).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let uri = "/api/audit?action=change_request.implemented";
    let (status, audit) = send(&app, "GET", uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn live_chat_is_billed_from_usage() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-tenant-key-1234")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"choices":[{"message":{"content":"Start with data management."}}],
                "usage":{"prompt_tokens":300,"completion_tokens":20,"total_tokens":320}}"#,
        )
        .create_async()
        .await;

    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;
    let (status, view) = send(
        &app,
        "PUT",
        "/api/integrations",
        Some(&token),
        Some(json!({
            "provider": "openai",
            "api_key": "sk-tenant-key-1234",
            "base_url": server.url(),
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{view}");
    assert_eq!(view["api_key"], "sk-…1234");

    let question = json!({ "message": "Where do we start?" });
    let (status, reply) = chat(&app, &token, &project, question).await;
    mock.assert_async().await;
    assert_eq!(status, StatusCode::OK, "{reply}");
    assert_eq!(reply["mode"], "LIVE");
    assert_eq!(reply["reply"], "Start with data management.");
    assert_eq!(reply["tokens_used"], 320);
    assert_eq!(reply["balance"], 100_000 - 320);

    let (_, ledger) = send(&app, "GET", "/api/billing/ledger", Some(&token), None).await;
    assert_eq!(ledger[0]["kind"], "debit");
    assert_eq!(ledger[0]["provider"], "openai");
}

#[tokio::test]
async fn provider_error_falls_back() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(500)
        .create_async()
        .await;

    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;
    send(
        &app,
        "PUT",
        "/api/integrations",
        Some(&token),
        Some(json!({
            "provider": "openai",
            "api_key": "sk-tenant-key-1234",
            "base_url": server.url()
        })),
    )
    .await;

    let (status, reply) = chat(&app, &token, &project, json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["mode"], "FALLBACK");
    assert_eq!(reply["tokens_used"], 0);
}

#[tokio::test]
async fn empty_balance_is_402() {
    let mut config = AppConfig::default();
    config.billing.signup_grant = 0;
    let app = app_with(config);
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;

    let (status, _) = chat(&app, &token, &project, json!({ "message": "hello" })).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn chat_rate_limit_is_429() {
    let mut config = AppConfig::default();
    config.ai.requests_per_minute = 1;
    let app = app_with(config);
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;

    let (status, _) = chat(&app, &token, &project, json!({ "message": "one" })).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = chat(&app, &token, &project, json!({ "message": "two" })).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}

#[tokio::test]
async fn research_without_key_falls_back() {
    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let (status, body) = send(
        &app,
        "POST",
        "/api/ai/research",
        Some(&token),
        Some(json!({ "query": "lean benchmarks" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["mode"], "FALLBACK");
    assert_eq!(body["results"].as_array().unwrap().len(), 0);
}

// ---------------------------------------------------------------------------
// Billing, analytics, demo
// ---------------------------------------------------------------------------

#[tokio::test]
async fn billing_credit_requires_manage_billing() {
    let app = app();
    let (admin, _) = register(&app, "Acme", "admin@acme.io").await;
    let manager = add_user(&app, &admin, "manager@acme.io", "MANAGER").await;

    let credit = "/api/billing/credit";
    let ten = Some(json!({ "amount": 10 }));
    let (status, _) = send(&app, "POST", credit, Some(&manager), ten).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let five_hundred = Some(json!({ "amount": 500 }));
    let (status, entry) = send(&app, "POST", credit, Some(&admin), five_hundred).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["balance_after"], 100_500);

    let (status, _) = send(&app, "POST", credit, Some(&admin), Some(json!({ "amount": 0 }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, balance) = send(&app, "GET", "/api/billing/balance", Some(&manager), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(balance["balance"], 100_500);
}

#[tokio::test]
async fn dashboard_counts() {
    let app = app();
    let (token, _) = register(&app, "Acme", "admin@acme.io").await;
    let project = create_project(&app, &token, json!({ "name": "Pilot" })).await;
    send(
        &app,
        "POST",
        &format!("/api/projects/{project}/tasks"),
        Some(&token),
        Some(json!({ "title": "Late", "due_date": "2020-01-01" })),
    )
    .await;

    let (status, dash) = send(&app, "GET", "/api/analytics/dashboard", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(dash["projects"], 1);
    assert_eq!(dash["overdue_tasks"], 1);

    let (status, progress) = send(
        &app,
        "GET",
        &format!("/api/projects/{project}/progress"),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(progress["completion_pct"], 0.0);
}

#[tokio::test]
async fn demo_start_and_tour() {
    let app = app();
    let label = Some(json!({ "label": "Acme" }));
    let (status, started) = send(&app, "POST", "/api/demo/start", None, label).await;
    assert_eq!(status, StatusCode::CREATED, "{started}");
    let token = started["token"].as_str().unwrap();
    let session = started["session"]["id"].as_str().unwrap();
    assert_eq!(started["session"]["tour"]["step"], "welcome");

    let (status, roadmap) = send(&app, "GET", "/api/roadmap", Some(token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(roadmap.as_array().unwrap().len(), 3);

    let (status, advanced) = send(
        &app,
        "POST",
        &format!("/api/demo/session/{session}/advance"),
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(advanced["tour"]["step"], "assessment");

    let (status, _) = send(&app, "GET", "/api/demo/session/unknown", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
