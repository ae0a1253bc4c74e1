//! AI chat and research orchestration.
//!
//! A chat request runs through: permission, per-user rate limit, the
//! project's AI guard, a balance pre-flight, credential resolution, the
//! provider call and settlement. Anything that stops a live answer after
//! the pre-flight (no credentials, provider error) degrades to the
//! deterministic FALLBACK reply, which is not billed.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use consultify_core::ai_guard::{self, ActionClass, AiAction, GuardDecision};
use consultify_core::audit::{self, AuditEntry};
use consultify_core::billing::{self, Charge};
use consultify_core::db::with_transaction;
use consultify_core::governance::{self, ChangeRequest, NewChangeRequest};
use consultify_core::integration::IntegrationConfig;
use consultify_core::project::Project;
use consultify_core::prompt::{build_system_prompt, PromptContext};
use consultify_core::rbac::Permission;
use consultify_core::types::{ChangeKind, Provider};
use consultify_llm::{
    fallback_response, ChatMessage, ChatRequest, ChatResponse, LlmClient, ResponseMode,
    TavilyClient,
};
use rusqlite::Connection;
use serde::Deserialize;
use std::time::Instant;

use crate::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ChatBody {
    pub message: String,
    #[serde(default = "default_action")]
    pub action: String,
    #[serde(default)]
    pub provider: Option<Provider>,
    #[serde(default)]
    pub language: Option<String>,
}

fn default_action() -> String {
    AiAction::Answer.as_str().to_string()
}

/// Resolved provider endpoint for one call.
#[derive(Debug, Clone)]
struct Credentials {
    api_key: String,
    model: String,
    base_url: Option<String>,
}

enum Prepared {
    Denied(String),
    NeedsApproval(ChangeRequest),
    Ready {
        system: String,
        integration: Option<IntegrationConfig>,
    },
}

fn llm_provider(provider: Provider) -> Option<consultify_llm::Provider> {
    match provider {
        Provider::OpenAi => Some(consultify_llm::Provider::OpenAi),
        Provider::Anthropic => Some(consultify_llm::Provider::Anthropic),
        Provider::Gemini => Some(consultify_llm::Provider::Gemini),
        Provider::Tavily => None,
    }
}

/// Tenant integration first, then the process environment.
fn resolve_credentials(
    app: &AppState,
    provider: Provider,
    integration: Option<IntegrationConfig>,
) -> Option<Credentials> {
    let default_model = app.config.ai.model_for(provider).to_string();
    if let Some(config) = integration {
        return Some(Credentials {
            api_key: config.api_key,
            model: config.model.unwrap_or(default_model),
            base_url: config.base_url,
        });
    }
    app.env_keys.get(&provider).map(|key| Credentials {
        api_key: key.clone(),
        model: default_model,
        base_url: None,
    })
}

/// One provider call; any failure becomes the fallback reply.
async fn call_provider(
    app: &AppState,
    provider: consultify_llm::Provider,
    credentials: &Credentials,
    system: &str,
    message: &str,
) -> ChatResponse {
    let mut client = LlmClient::new(provider, credentials.api_key.clone());
    if let Some(base_url) = &credentials.base_url {
        client = client.with_base_url(base_url.clone());
    }
    let request = ChatRequest::new(credentials.model.clone(), vec![ChatMessage::user(message)])
        .with_system(system)
        .with_max_tokens(app.config.ai.max_output_tokens);
    match client.complete(&request).await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(%provider, error = %e, "provider call failed, using fallback");
            fallback_response(message)
        }
    }
}

/// Everything a chat commits once the reply is known.
struct Settlement<'a> {
    organization_id: &'a str,
    user_id: &'a str,
    project_id: &'a str,
    response: &'a ChatResponse,
    tokens: i64,
    payload: &'a serde_json::Value,
    executes: bool,
}

/// Debit, audit and (for executing actions) apply in one transaction, so a
/// failed apply leaves the balance untouched. Returns (billed, balance, applied).
fn settle_chat(
    conn: &Connection,
    s: &Settlement<'_>,
) -> consultify_core::Result<(i64, i64, Option<serde_json::Value>)> {
    with_transaction(conn, |tx| {
        let org = s.organization_id;
        let mut billed = 0;
        if s.tokens > 0 {
            let entry = billing::debit_capped(
                tx,
                org,
                &Charge {
                    user_id: Some(s.user_id),
                    amount: s.tokens,
                    provider: Some(&s.response.provider),
                    model: Some(&s.response.model),
                    description: "ai chat",
                },
            )?;
            billed = entry.map_or(0, |e| e.amount);
        }
        audit::record(
            tx,
            AuditEntry::new(org, "ai.chat", "project")
                .by(s.user_id)
                .entity(s.project_id)
                .details(serde_json::json!({
                    "action": s.payload["action"],
                    "provider": s.response.provider,
                    "model": s.response.model,
                    "mode": s.response.mode,
                    "tokens": billed,
                })),
        )?;
        let applied = if s.executes {
            governance::execute_ai_action(tx, org, s.project_id, s.user_id, s.payload)?
        } else {
            None
        };
        Ok((billed, billing::balance(tx, org)?, applied))
    })
}

/// POST /api/projects/:id/ai/chat
pub async fn chat(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Path(project_id): Path<String>,
    Json(body): Json<ChatBody>,
) -> Result<(StatusCode, Json<serde_json::Value>), AppError> {
    auth.require(Permission::UseAi)?;
    let message = body.message.trim().to_string();
    if message.is_empty() {
        return Err(AppError::bad_request("message is required"));
    }
    let provider = body.provider.unwrap_or(app.config.ai.default_provider);
    let Some(llm) = llm_provider(provider) else {
        return Err(AppError::bad_request(format!("{provider} cannot serve chat")));
    };
    app.chat_limiter.check(&auth.user_id, Instant::now())?;
    let action = body.action.trim().to_string();

    let prepared = {
        let (auth, project_id) = (auth.clone(), project_id.clone());
        let (action, message) = (action.clone(), message.clone());
        let billing_cfg = app.config.billing.clone();
        let language = body.language.clone();
        app.db(move |conn| {
            let project = Project::get(conn, &auth.organization_id, &project_id)?;
            match ai_guard::evaluate(project.ai_role, project.regulatory_mode, &action) {
                GuardDecision::Denied { reason } => Ok(Prepared::Denied(reason)),
                GuardDecision::RequiresApproval => {
                    let request = ChangeRequest::create(
                        conn,
                        &auth.organization_id,
                        &auth.user_id,
                        &NewChangeRequest {
                            project_id: project.id.clone(),
                            title: format!("AI action: {action}"),
                            description: message.clone(),
                            kind: ChangeKind::AiAction,
                            payload: Some(serde_json::json!({
                                "action": action,
                                "message": message,
                            })),
                            submit: true,
                        },
                    )?;
                    Ok(Prepared::NeedsApproval(request))
                }
                GuardDecision::Allowed => {
                    let ctx = PromptContext::load(
                        conn,
                        &auth.organization_id,
                        &project,
                        language.as_deref(),
                    )?;
                    let system = build_system_prompt(&ctx);
                    let required = billing::estimate_tokens(&system, billing_cfg.chars_per_token)
                        + billing::estimate_tokens(&message, billing_cfg.chars_per_token)
                        + billing_cfg.min_chat_reserve;
                    billing::ensure_available(conn, &auth.organization_id, required)?;
                    let integration =
                        IntegrationConfig::active(conn, &auth.organization_id, provider)?;
                    Ok(Prepared::Ready {
                        system,
                        integration,
                    })
                }
            }
        })
        .await?
    };

    let (system, integration) = match prepared {
        Prepared::Denied(reason) => return Err(AppError::forbidden(reason)),
        Prepared::NeedsApproval(request) => {
            return Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "decision": "requires_approval",
                    "change_request_id": request.id,
                    "status": request.status,
                })),
            ));
        }
        Prepared::Ready {
            system,
            integration,
        } => (system, integration),
    };

    let response = match resolve_credentials(&app, provider, integration) {
        Some(credentials) => call_provider(&app, llm, &credentials, &system, &message).await,
        None => {
            tracing::info!(%provider, "no credentials configured, using fallback");
            fallback_response(&message)
        }
    };

    let cpt = app.config.billing.chars_per_token;
    let tokens = match (response.mode, response.usage) {
        (ResponseMode::Fallback, _) => 0,
        (ResponseMode::Live, Some(usage)) => i64::try_from(usage.total()).unwrap_or(i64::MAX),
        (ResponseMode::Live, None) => {
            billing::estimate_tokens(&system, cpt)
                + billing::estimate_tokens(&message, cpt)
                + billing::estimate_tokens(&response.text, cpt)
        }
    };
    let executes = AiAction::parse(&action).is_some_and(|a| a.class() == ActionClass::Executing);

    let payload = serde_json::json!({ "action": action, "message": message });
    let settled = {
        let response = response.clone();
        app.db(move |conn| {
            settle_chat(
                conn,
                &Settlement {
                    organization_id: &auth.organization_id,
                    user_id: &auth.user_id,
                    project_id: &project_id,
                    response: &response,
                    tokens,
                    payload: &payload,
                    executes,
                },
            )
        })
        .await?
    };
    let (tokens_used, balance, applied) = settled;

    let mut reply = serde_json::json!({
        "reply": response.text,
        "mode": response.mode,
        "provider": response.provider,
        "model": response.model,
        "tokens_used": tokens_used,
        "balance": balance,
        "applied": applied,
    });
    // Only create_task and create_initiative have an automatic apply step.
    if executes && reply["applied"].is_null() {
        reply["note"] = serde_json::Value::String(format!(
            "'{action}' is not applied automatically; make the change through the API"
        ));
    }
    Ok((StatusCode::OK, Json(reply)))
}

#[derive(Debug, Deserialize)]
pub struct ResearchBody {
    pub query: String,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
}

fn default_max_results() -> usize {
    5
}

/// POST /api/ai/research: Tavily web search at a fixed token cost.
pub async fn research(
    State(app): State<AppState>,
    Extension(auth): Extension<AuthUser>,
    Json(body): Json<ResearchBody>,
) -> Result<Json<serde_json::Value>, AppError> {
    auth.require(Permission::UseAi)?;
    let query = body.query.trim().to_string();
    if query.is_empty() {
        return Err(AppError::bad_request("query is required"));
    }
    app.chat_limiter.check(&auth.user_id, Instant::now())?;
    let cost = app.config.billing.research_cost;

    let integration = {
        let org = auth.organization_id.clone();
        app.db(move |conn| {
            if cost > 0 {
                billing::ensure_available(conn, &org, cost)?;
            }
            IntegrationConfig::active(conn, &org, Provider::Tavily)
        })
        .await?
    };
    let client = match (integration, app.env_keys.get(&Provider::Tavily)) {
        (Some(config), _) => {
            let client = TavilyClient::new(config.api_key);
            match config.base_url {
                Some(url) => Some(client.with_base_url(url)),
                None => Some(client),
            }
        }
        (None, Some(key)) => Some(TavilyClient::new(key.clone())),
        (None, None) => None,
    };

    let found = match client {
        Some(client) => match client.search(&query, body.max_results).await {
            Ok(found) => Some(found),
            Err(e) => {
                tracing::warn!(error = %e, "research call failed, using fallback");
                None
            }
        },
        None => None,
    };
    let Some(found) = found else {
        return Ok(Json(serde_json::json!({
            "mode": ResponseMode::Fallback,
            "answer": null,
            "results": [],
            "tokens_used": 0,
        })));
    };

    let (tokens_used, balance) = app
        .db(move |conn| {
            let org = auth.organization_id.as_str();
            let mut billed = 0;
            if cost > 0 {
                let entry = billing::debit_capped(
                    conn,
                    org,
                    &Charge {
                        user_id: Some(&auth.user_id),
                        amount: cost,
                        provider: Some(Provider::Tavily.as_str()),
                        model: None,
                        description: "ai research",
                    },
                )?;
                billed = entry.map_or(0, |e| e.amount);
            }
            audit::record(
                conn,
                AuditEntry::new(org, "ai.research", "organization")
                    .by(&auth.user_id)
                    .entity(org)
                    .details(serde_json::json!({ "query": query, "tokens": billed })),
            )?;
            Ok((billed, billing::balance(conn, org)?))
        })
        .await?;

    Ok(Json(serde_json::json!({
        "mode": ResponseMode::Live,
        "answer": found.answer,
        "results": found.results,
        "tokens_used": tokens_used,
        "balance": balance,
    })))
}
