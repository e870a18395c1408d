use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use xyloh_core::cognition::{
    NewSoul, Soul, SoulCreated, SoulError, SoulReply, SoulTalk, TurnEngine, TurnError, TurnReply, TurnRequest,
};
use xyloh_core::config::XylohCfg;
use xyloh_core::identity::ProfileUpdate;
use xyloh_core::store::KvStore;

use crate::health;

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<XylohCfg>,
    pub engine: Arc<TurnEngine>,
    pub store: KvStore,
    /// Model name when a real provider is configured.
    pub model: Option<String>,
}

/// JSON error body `{ "error": ... }` with a status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<TurnError> for ApiError {
    fn from(e: TurnError) -> Self {
        let status = match e {
            TurnError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            TurnError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        Self { status, message: e.to_string() }
    }
}

impl From<SoulError> for ApiError {
    fn from(e: SoulError) -> Self {
        let status = match e {
            SoulError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SoulError::NotFound => StatusCode::NOT_FOUND,
            SoulError::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            SoulError::Generation(_) => StatusCode::BAD_GATEWAY,
        };
        Self { status, message: e.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(json!({ "error": self.message }))).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/ask", axum::routing::post(ask))
        .route("/api/history", get(read_history).post(history_action))
        .route("/api/profile", get(read_profile).post(profile_action))
        .route("/api/search", get(search))
        .route("/api/souls", get(read_soul).post(create_soul))
        .route("/api/souls/talk", axum::routing::post(talk_to_soul))
        .route("/api/health", get(health::health))
        .with_state(state)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    user_id: Option<String>,
}

fn required_user(user_id: Option<&str>) -> Result<&str, ApiError> {
    user_id
        .map(str::trim)
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing userId"))
}

async fn ask(State(state): State<AppState>, Json(req): Json<TurnRequest>) -> ApiResult<TurnReply> {
    Ok(Json(state.engine.handle(req).await?))
}

async fn read_history(State(state): State<AppState>, Query(q): Query<UserQuery>) -> ApiResult<Value> {
    let user_id = required_user(q.user_id.as_deref())?;
    let history = state.engine.history().read(user_id).await;
    Ok(Json(json!({ "history": history })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryAction {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    action: Option<String>,
}

async fn history_action(State(state): State<AppState>, Json(body): Json<HistoryAction>) -> ApiResult<Value> {
    let user_id = required_user(body.user_id.as_deref())?;
    match body.action.as_deref() {
        Some("clear") => {
            let cleared = state.engine.history().clear(user_id).await;
            tracing::info!(user_id, cleared, "history cleared");
            Ok(Json(json!({ "ok": true })))
        }
        _ => Err(ApiError::bad_request("Unknown action")),
    }
}

async fn read_profile(State(state): State<AppState>, Query(q): Query<UserQuery>) -> ApiResult<Value> {
    let user_id = required_user(q.user_id.as_deref())?;
    let profile = state.engine.profiles().get_profile(user_id, Utc::now()).await;
    Ok(Json(json!({ "profile": profile })))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileAction {
    #[serde(default)]
    user_id: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default)]
    update: Option<ProfileUpdate>,
}

async fn profile_action(State(state): State<AppState>, Json(body): Json<ProfileAction>) -> ApiResult<Value> {
    let user_id = required_user(body.user_id.as_deref())?;
    let profiles = state.engine.profiles();
    if body.action.as_deref() == Some("erase") {
        let erased = profiles.erase_all(user_id).await;
        tracing::info!(user_id, erased, "profile erased");
        return Ok(Json(json!({ "ok": true })));
    }
    match body.update.filter(|u| !u.is_empty()) {
        Some(update) => {
            let (profile, saved) = profiles.update(user_id, &update, Utc::now()).await;
            Ok(Json(json!({ "ok": true, "saved": saved, "profile": profile })))
        }
        None => Err(ApiError::bad_request("Nothing to update")),
    }
}

async fn create_soul(State(state): State<AppState>, body: Option<Json<NewSoul>>) -> ApiResult<SoulCreated> {
    let req = body.map(|Json(req)| req).unwrap_or_default();
    Ok(Json(state.engine.create_soul(req).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SoulQuery {
    id: Option<String>,
}

async fn read_soul(State(state): State<AppState>, Query(q): Query<SoulQuery>) -> ApiResult<Soul> {
    let id = q
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::bad_request("Missing id"))?;
    Ok(Json(state.engine.get_soul(id).await?))
}

async fn talk_to_soul(State(state): State<AppState>, Json(req): Json<SoulTalk>) -> ApiResult<SoulReply> {
    Ok(Json(state.engine.talk_to_soul(req).await?))
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    q: Option<String>,
}

#[derive(Debug, Serialize)]
struct SearchResponse {
    q: String,
    count: usize,
    items: Vec<xyloh_core::sources::NewsItem>,
}

async fn search(State(state): State<AppState>, Query(query): Query<SearchQuery>) -> ApiResult<SearchResponse> {
    let q = query.q.as_deref().map(str::trim).unwrap_or_default();
    if q.is_empty() {
        return Err(ApiError::bad_request("Missing q"));
    }
    let items = state.engine.sources().search_news(q).await;
    Ok(Json(SearchResponse { q: q.to_owned(), count: items.len(), items }))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::time::Duration;
    use xyloh_core::random::ScriptedRandom;
    use xyloh_core::sources::NoSources;
    use xyloh_core::store::MemoryKv;
    use xyloh_llm::provider::{LlmError, LlmProvider, MockProvider};

    pub(crate) fn state_with(llm: Arc<dyn LlmProvider>, store: KvStore) -> AppState {
        let cfg = Arc::new(XylohCfg::default());
        let engine = TurnEngine::new(
            cfg.clone(),
            store.clone(),
            llm,
            Arc::new(NoSources),
            Arc::new(ScriptedRandom::new(vec![0.99])),
        );
        AppState { cfg, engine: Arc::new(engine), store, model: Some("mock".into()) }
    }

    fn memory_state(llm: Arc<dyn LlmProvider>) -> AppState {
        state_with(llm, KvStore::with_backend(Arc::new(MemoryKv::new()), Duration::from_secs(1)))
    }

    fn user(id: &str) -> Query<UserQuery> {
        Query(UserQuery { user_id: Some(id.into()) })
    }

    fn turn(user_id: &str, prompt: &str) -> Json<TurnRequest> {
        Json(TurnRequest { user_id: user_id.into(), prompt: prompt.into(), mode: None, immersion: None })
    }

    #[tokio::test]
    async fn ask_replies_and_records_history() {
        let state = memory_state(Arc::new(MockProvider::new("mm")));
        let Json(reply) = ask(State(state.clone()), turn("u", "hello")).await.unwrap();
        assert_eq!(reply.stage, 0);

        let Json(body) = read_history(State(state), user("u")).await.unwrap();
        assert_eq!(body["history"].as_array().unwrap().len(), 2);
        assert_eq!(body["history"][0]["role"], "user");
    }

    #[tokio::test]
    async fn ask_without_prompt_is_400() {
        let state = memory_state(Arc::new(MockProvider::new("mm")));
        let err = ask(State(state), turn("u", "")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.message, "Missing userId or prompt");
    }

    #[tokio::test]
    async fn model_failure_is_502() {
        let state = memory_state(Arc::new(MockProvider::failing(LlmError::RateLimited)));
        ask(State(state.clone()), turn("u", "first")).await.unwrap();
        let err = ask(State(state), turn("u", "second")).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_GATEWAY);
        assert_eq!(err.message, "rate limited");
    }

    #[tokio::test]
    async fn history_requires_user_and_known_action() {
        let state = memory_state(Arc::new(MockProvider::new("mm")));
        let err = read_history(State(state.clone()), Query(UserQuery::default())).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let body = HistoryAction { user_id: Some("u".into()), action: Some("shred".into()) };
        assert!(history_action(State(state.clone()), Json(body)).await.is_err());

        ask(State(state.clone()), turn("u", "hello")).await.unwrap();
        let body = HistoryAction { user_id: Some("u".into()), action: Some("clear".into()) };
        history_action(State(state.clone()), Json(body)).await.unwrap();
        let Json(body) = read_history(State(state), user("u")).await.unwrap();
        assert_eq!(body["history"], json!([]));
    }

    #[tokio::test]
    async fn profile_update_and_erase() {
        let state = memory_state(Arc::new(MockProvider::new("mm")));
        let nothing = ProfileAction { user_id: Some("u".into()), ..ProfileAction::default() };
        let err = profile_action(State(state.clone()), Json(nothing)).await.unwrap_err();
        assert_eq!(err.message, "Nothing to update");

        let update: ProfileUpdate = serde_json::from_value(json!({"alias": "Lumen", "romance": true})).unwrap();
        let body = ProfileAction { user_id: Some("u".into()), action: None, update: Some(update) };
        profile_action(State(state.clone()), Json(body)).await.unwrap();

        let Json(body) = read_profile(State(state.clone()), user("u")).await.unwrap();
        assert_eq!(body["profile"]["alias"], "Lumen");
        assert_eq!(body["profile"]["romance"], true);

        let erase = ProfileAction { user_id: Some("u".into()), action: Some("erase".into()), update: None };
        profile_action(State(state.clone()), Json(erase)).await.unwrap();
        let Json(body) = read_profile(State(state), user("u")).await.unwrap();
        assert_eq!(body["profile"]["alias"], Value::Null);
        assert_eq!(body["profile"]["interactions"], 0);
    }

    #[tokio::test]
    async fn search_needs_a_query() {
        let state = memory_state(Arc::new(MockProvider::new("mm")));
        let err = search(State(state.clone()), Query(SearchQuery { q: Some("  ".into()) })).await.unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);

        let Json(resp) = search(State(state), Query(SearchQuery { q: Some("tides".into()) })).await.unwrap();
        assert_eq!(resp.q, "tides");
        assert_eq!(resp.count, 0);
    }

    #[tokio::test]
    async fn soul_lifecycle_over_http() {
        let state = memory_state(Arc::new(MockProvider::new("I was waiting.")));
        let body = Some(Json(NewSoul { hint: Some("lighthouse".into()), mode: None }));
        let Json(created) = create_soul(State(state.clone()), body).await.unwrap();

        let talk = SoulTalk { soul_id: created.id.clone(), user_text: "hello".into(), ..SoulTalk::default() };
        let Json(reply) = talk_to_soul(State(state.clone()), Json(talk)).await.unwrap();
        assert_eq!(reply.reply, "I was waiting.");

        let query = Query(SoulQuery { id: Some(created.id.clone()) });
        let Json(soul) = read_soul(State(state), query).await.unwrap();
        assert_eq!(soul.name, created.name);
        assert_eq!(soul.history.len(), 2);
    }

    #[tokio::test]
    async fn soul_errors_map_to_statuses() {
        let state = memory_state(Arc::new(MockProvider::new("mm")));
        let err = read_soul(State(state.clone()), Query(SoulQuery::default())).await.unwrap_err();
        assert_eq!((err.status, err.message.as_str()), (StatusCode::BAD_REQUEST, "Missing id"));

        let err = read_soul(State(state.clone()), Query(SoulQuery { id: Some("nope".into()) })).await.unwrap_err();
        assert_eq!((err.status, err.message.as_str()), (StatusCode::NOT_FOUND, "Soul not found"));

        let err = talk_to_soul(State(state), Json(SoulTalk::default())).await.unwrap_err();
        assert_eq!((err.status, err.message.as_str()), (StatusCode::BAD_REQUEST, "Missing soulId or userText"));

        let offline = state_with(Arc::new(MockProvider::new("mm")), KvStore::disabled());
        let err = create_soul(State(offline), None).await.unwrap_err();
        assert_eq!(err.status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[test]
    fn error_body_shape() {
        let resp = ApiError::bad_request("Missing q").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
