use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{
        FromRequest, FromRequestParts, Request, State,
        rejection::{FormRejection, PathRejection},
    },
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

use crate::commands::today;
use mealtrack_core::db::{Database, is_constraint_violation};
use mealtrack_core::models::{Dashboard, DailySummary, GoalValues, NewFood, NewMealLog, User};

const BODY_LIMIT: usize = 1024 * 1024; // 1 MiB

/// Where redirects go when the client did not say which page it came from.
const FALLBACK_PAGE: &str = "/";

#[derive(Clone)]
struct AppState {
    db: Arc<Mutex<Database>>,
}

impl AppState {
    fn db(&self) -> MutexGuard<'_, Database> {
        self.db
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct AddUserForm {
    name: String,
}

#[derive(Deserialize)]
struct AddFoodForm {
    name: String,
    #[serde(deserialize_with = "padded_number")]
    protein: f64,
    #[serde(deserialize_with = "padded_number")]
    carbs: f64,
    #[serde(deserialize_with = "padded_number")]
    calories: f64,
}

#[derive(Deserialize)]
struct LogMealForm {
    #[serde(deserialize_with = "padded_number")]
    food_id: i64,
    #[serde(deserialize_with = "padded_number")]
    quantity: f64,
    date: String,
}

#[derive(Deserialize)]
struct SetGoalForm {
    #[serde(deserialize_with = "padded_number")]
    protein_goal: f64,
    #[serde(deserialize_with = "padded_number")]
    carbs_goal: f64,
    #[serde(deserialize_with = "padded_number")]
    calories_goal: f64,
}

/// Parse a numeric form value, ignoring surrounding whitespace.
fn padded_number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = String::deserialize(deserializer)?;
    raw.trim()
        .parse()
        .map_err(|err| serde::de::Error::custom(format!("invalid number {raw:?}: {err}")))
}

#[derive(Serialize)]
struct UserList {
    users: Vec<User>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    PayloadTooLarge,
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::PayloadTooLarge => (
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large".to_string(),
            ),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            Self::PayloadTooLarge
        } else {
            Self::BadRequest(rejection.body_text())
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        Self::BadRequest(rejection.body_text())
    }
}

/// `axum::Form` with rejections rendered as [`ApiError`].
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
struct FormInput<T>(T);

/// `axum::extract::Path` with rejections rendered as [`ApiError`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
struct PathParam<T>(T);

fn finite(field: &str, value: f64) -> Result<f64, ApiError> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(ApiError::BadRequest(format!(
            "{field} must be a finite number"
        )))
    }
}

fn user_not_found(user_id: i64) -> ApiError {
    ApiError::NotFound(format!("User {user_id} not found"))
}

// --- Navigation helpers ---

/// The page the client navigated from, or the user list when it is unknown.
fn referring_page(headers: &HeaderMap) -> Redirect {
    let target = headers
        .get(header::REFERER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(FALLBACK_PAGE);
    Redirect::to(target)
}

fn summary_page(user_id: i64, day: &str) -> Redirect {
    Redirect::to(&format!(
        "/summary/{user_id}/{}",
        percent_encode_component(day)
    ))
}

/// Percent-encode a single path segment.
///
/// Dates are opaque strings, so anything outside the RFC 3986 unreserved set
/// is escaped to keep the redirect target a valid location.
fn percent_encode_component(input: &str) -> String {
    let mut encoded = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char);
            }
            _ => {
                encoded.push('%');
                encoded.push(char::from(HEX_CHARS[(byte >> 4) as usize]));
                encoded.push(char::from(HEX_CHARS[(byte & 0x0F) as usize]));
            }
        }
    }
    encoded
}

const HEX_CHARS: [u8; 16] = *b"0123456789ABCDEF";

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- User handlers ---

async fn list_users(State(state): State<AppState>) -> Result<Json<UserList>, ApiError> {
    let users = state.db().list_users().context("database error")?;
    Ok(Json(UserList { users }))
}

async fn add_user(
    State(state): State<AppState>,
    FormInput(form): FormInput<AddUserForm>,
) -> Result<Redirect, ApiError> {
    let user = state
        .db()
        .create_user(&form.name)
        .context("failed to create user")?;
    info!(user_id = user.id, "created user");
    Ok(Redirect::to(FALLBACK_PAGE))
}

async fn delete_user(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Redirect, ApiError> {
    if state
        .db()
        .delete_user(user_id)
        .context("failed to delete user")?
    {
        info!(user_id, "deleted user with its meal logs and goals");
    } else {
        debug!(user_id, "delete_user: no such user");
    }
    Ok(Redirect::to(FALLBACK_PAGE))
}

async fn user_dashboard(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
) -> Result<Json<Dashboard>, ApiError> {
    let db = state.db();
    let user = db
        .get_user(user_id)
        .context("database error")?
        .ok_or_else(|| user_not_found(user_id))?;
    let foods = db.list_foods().context("database error")?;
    Ok(Json(Dashboard {
        user,
        foods,
        today: today(),
    }))
}

// --- Food handlers ---

async fn add_food(
    State(state): State<AppState>,
    headers: HeaderMap,
    FormInput(form): FormInput<AddFoodForm>,
) -> Result<Redirect, ApiError> {
    let new_food = NewFood {
        name: form.name,
        protein: finite("protein", form.protein)?,
        carbs: finite("carbs", form.carbs)?,
        calories: finite("calories", form.calories)?,
    };
    let food = state
        .db()
        .create_food(&new_food)
        .context("failed to create food")?;
    info!(food_id = food.id, name = %food.name, "created food");
    Ok(referring_page(&headers))
}

async fn delete_food(
    State(state): State<AppState>,
    headers: HeaderMap,
    PathParam(food_id): PathParam<i64>,
) -> Result<Redirect, ApiError> {
    if state
        .db()
        .delete_food(food_id)
        .context("failed to delete food")?
    {
        info!(food_id, "deleted food with its meal logs");
    } else {
        debug!(food_id, "delete_food: no such food");
    }
    Ok(referring_page(&headers))
}

// --- Meal log handlers ---

async fn log_meal(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
    FormInput(form): FormInput<LogMealForm>,
) -> Result<Redirect, ApiError> {
    if form.date.is_empty() {
        return Err(ApiError::BadRequest("date must not be empty".to_string()));
    }
    let new_log = NewMealLog {
        user_id,
        food_id: form.food_id,
        quantity: finite("quantity", form.quantity)?,
        date: form.date,
    };

    let log = state.db().create_meal_log(&new_log).map_err(|err| {
        if is_constraint_violation(&err) {
            warn!(user_id, food_id = new_log.food_id, "log_meal rejected: {err:#}");
            ApiError::BadRequest(format!(
                "Unknown user {user_id} or food {}",
                new_log.food_id
            ))
        } else {
            ApiError::Internal(err.context("failed to insert meal log"))
        }
    })?;

    info!(log_id = log.id, user_id, food_id = log.food_id, date = %log.date, "logged meal");
    Ok(summary_page(user_id, &log.date))
}

async fn delete_meal_log(
    State(state): State<AppState>,
    headers: HeaderMap,
    PathParam(log_id): PathParam<i64>,
) -> Result<Redirect, ApiError> {
    let removed = state
        .db()
        .delete_meal_log(log_id)
        .context("failed to delete meal log")?;

    match removed {
        Some(log) => {
            info!(log_id, user_id = log.user_id, date = %log.date, "deleted meal log");
            Ok(summary_page(log.user_id, &log.date))
        }
        None => {
            debug!(log_id, "delete_meal_log: no such log");
            Ok(referring_page(&headers))
        }
    }
}

// --- Summary / goal handlers ---

async fn daily_summary(
    State(state): State<AppState>,
    PathParam((user_id, day)): PathParam<(i64, String)>,
) -> Result<Json<DailySummary>, ApiError> {
    let db = state.db();
    db.get_user(user_id)
        .context("database error")?
        .ok_or_else(|| user_not_found(user_id))?;
    let summary = db
        .build_daily_summary(user_id, &day)
        .context("failed to build daily summary")?;
    Ok(Json(summary))
}

async fn set_goal(
    State(state): State<AppState>,
    PathParam(user_id): PathParam<i64>,
    FormInput(form): FormInput<SetGoalForm>,
) -> Result<Redirect, ApiError> {
    let values = GoalValues {
        protein_goal: finite("protein_goal", form.protein_goal)?,
        carbs_goal: finite("carbs_goal", form.carbs_goal)?,
        calories_goal: finite("calories_goal", form.calories_goal)?,
    };
    let day = today();

    let db = state.db();
    db.get_user(user_id)
        .context("database error")?
        .ok_or_else(|| user_not_found(user_id))?;
    let goal = db
        .update_daily_goal(user_id, &day, &values)
        .context("failed to update daily goal")?;
    info!(goal_id = goal.id, user_id, date = %day, "set daily goal");

    Ok(summary_page(user_id, &day))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(list_users))
        .route("/add_user", post(add_user))
        .route("/delete_user/{user_id}", post(delete_user))
        .route("/user/{user_id}", get(user_dashboard))
        .route("/add_food", post(add_food))
        .route("/delete_food/{food_id}", post(delete_food))
        .route("/log_meal/{user_id}", post(log_meal))
        .route("/delete_meal_log/{log_id}", post(delete_meal_log))
        .route("/summary/{user_id}/{day}", get(daily_summary))
        .route("/set_goal/{user_id}", post(set_goal))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server(db: Database, port: u16, bind: &str) -> anyhow::Result<()> {
    let state = AppState {
        db: Arc::new(Mutex::new(db)),
    };
    let app = build_router(state);

    if bind != "127.0.0.1" && bind != "localhost" {
        warn!("listening on {bind}; there is no authentication, any device on the network can edit this store");
    }

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("listening on http://{bind}:{port}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // The router, and with it the last handle on the store, is gone by now.
    info!("server stopped, store closed");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!("failed to install Ctrl+C handler: {err}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!("failed to install SIGTERM handler: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received Ctrl+C, shutting down"),
        () = terminate => info!("received terminate signal, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState {
            db: Arc::new(Mutex::new(Database::open_in_memory().unwrap())),
        }
    }

    async fn send(app: &Router, request: axum::http::Request<Body>) -> Response {
        app.clone().oneshot(request).await.unwrap()
    }

    fn get_req(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn form_post(uri: &str, body: &str) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn form_post_from(uri: &str, body: &str, referer: &str) -> axum::http::Request<Body> {
        axum::http::Request::post(uri)
            .header("content-type", "application/x-www-form-urlencoded")
            .header("referer", referer)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn seed_user_and_egg(state: &AppState) -> (i64, i64) {
        let db = state.db();
        let user = db.create_user("Alice").unwrap();
        let food = db
            .create_food(&NewFood {
                name: "Egg".to_string(),
                protein: 6.0,
                carbs: 1.0,
                calories: 70.0,
            })
            .unwrap();
        (user.id, food.id)
    }

    #[tokio::test]
    async fn list_users_empty() {
        let app = build_router(test_state());

        let response = send(&app, get_req("/")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["users"], serde_json::json!([]));
    }

    #[tokio::test]
    async fn add_user_redirects_to_list() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = send(&app, form_post("/add_user", "name=Alice")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let json = json_body(send(&app, get_req("/")).await).await;
        assert_eq!(json["users"][0]["name"], "Alice");
    }

    #[tokio::test]
    async fn add_user_missing_name_returns_400() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = send(&app, form_post("/add_user", "")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.db().list_users().unwrap().is_empty());
    }

    #[tokio::test]
    async fn egg_scenario_end_to_end() {
        let app = build_router(test_state());

        send(&app, form_post("/add_user", "name=Alice")).await;
        let response = send(
            &app,
            form_post_from(
                "/add_food",
                "name=Egg&protein=6&carbs=1&calories=70",
                "/user/1",
            ),
        )
        .await;
        assert_eq!(location(&response), "/user/1");

        let response = send(
            &app,
            form_post("/log_meal/1", "food_id=1&quantity=2&date=2024-01-01"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/summary/1/2024-01-01");

        let response = send(&app, get_req("/summary/1/2024-01-01")).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["total_protein"], 12.0);
        assert_eq!(json["total_carbs"], 2.0);
        assert_eq!(json["total_calories"], 140.0);
        assert_eq!(json["logs"][0]["food_name"], "Egg");
        assert_eq!(json["goal"]["calories_goal"], 0.0);
    }

    #[tokio::test]
    async fn add_food_non_numeric_returns_400_without_writing() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = send(
            &app,
            form_post("/add_food", "name=Egg&protein=lots&carbs=1&calories=70"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(state.db().list_foods().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_food_nan_returns_400() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = send(
            &app,
            form_post("/add_food", "name=Egg&protein=NaN&carbs=1&calories=70"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "protein must be a finite number");
        assert!(state.db().list_foods().unwrap().is_empty());
    }

    #[tokio::test]
    async fn add_food_accepts_padded_numbers() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = send(
            &app,
            form_post("/add_food", "name=Egg&protein=+6&carbs=%201%20&calories=70"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        let foods = state.db().list_foods().unwrap();
        assert_eq!(foods.len(), 1);
        assert!((foods[0].protein - 6.0).abs() < f64::EPSILON);
        assert!((foods[0].carbs - 1.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn add_food_without_referer_falls_back_to_list() {
        let app = build_router(test_state());

        let response = send(
            &app,
            form_post("/add_food", "name=Egg&protein=-6&carbs=1&calories=70"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn delete_food_cascades_and_returns_to_referer() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, food_id) = seed_user_and_egg(&state);
        send(
            &app,
            form_post(
                &format!("/log_meal/{user_id}"),
                &format!("food_id={food_id}&quantity=1&date=2024-01-01"),
            ),
        )
        .await;

        let response = send(
            &app,
            form_post_from(&format!("/delete_food/{food_id}"), "", "/user/1"),
        )
        .await;
        assert_eq!(location(&response), "/user/1");

        let db = state.db();
        assert!(db.get_food(food_id).unwrap().is_none());
        assert!(db.meal_logs_for_day(user_id, "2024-01-01").unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_user_cascades() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, food_id) = seed_user_and_egg(&state);
        send(
            &app,
            form_post(
                &format!("/log_meal/{user_id}"),
                &format!("food_id={food_id}&quantity=3&date=2024-01-01"),
            ),
        )
        .await;
        send(&app, get_req(&format!("/summary/{user_id}/2024-01-01"))).await;

        let response = send(&app, form_post(&format!("/delete_user/{user_id}"), "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");

        let response = send(&app, get_req(&format!("/summary/{user_id}/2024-01-01"))).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert!(state.db().list_users().unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_unknown_user_still_redirects() {
        let app = build_router(test_state());

        let response = send(&app, form_post("/delete_user/99", "")).await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn delete_meal_log_redirects_to_its_summary() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, food_id) = seed_user_and_egg(&state);
        let log = state
            .db()
            .create_meal_log(&NewMealLog {
                user_id,
                food_id,
                quantity: 1.0,
                date: "2024-02-29".to_string(),
            })
            .unwrap();

        let response = send(
            &app,
            form_post_from(&format!("/delete_meal_log/{}", log.id), "", "/elsewhere"),
        )
        .await;
        assert_eq!(location(&response), format!("/summary/{user_id}/2024-02-29"));
        assert!(state.db().get_meal_log(log.id).unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_unknown_meal_log_returns_to_referer() {
        let state = test_state();
        let app = build_router(state.clone());

        let response = send(
            &app,
            form_post_from("/delete_meal_log/12", "", "/summary/1/2024-01-01"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/summary/1/2024-01-01");

        let response = send(&app, form_post("/delete_meal_log/12", "")).await;
        assert_eq!(location(&response), "/");
    }

    #[tokio::test]
    async fn log_meal_unknown_food_returns_400() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, _) = seed_user_and_egg(&state);

        let response = send(
            &app,
            form_post(
                &format!("/log_meal/{user_id}"),
                "food_id=404&quantity=1&date=2024-01-01",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn log_meal_empty_date_returns_400_without_writing() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, food_id) = seed_user_and_egg(&state);

        let response = send(
            &app,
            form_post(
                &format!("/log_meal/{user_id}"),
                &format!("food_id={food_id}&quantity=2&date="),
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = json_body(response).await;
        assert_eq!(json["error"], "date must not be empty");
        assert!(state.db().meal_logs_for_day(user_id, "").unwrap().is_empty());
    }

    #[tokio::test]
    async fn log_meal_encodes_opaque_date_in_redirect() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, food_id) = seed_user_and_egg(&state);

        let response = send(
            &app,
            form_post(
                &format!("/log_meal/{user_id}"),
                &format!("food_id={food_id}&quantity=1&date=next+week"),
            ),
        )
        .await;
        assert_eq!(
            location(&response),
            format!("/summary/{user_id}/next%20week")
        );

        let response = send(&app, get_req(&format!("/summary/{user_id}/next%20week"))).await;
        let json = json_body(response).await;
        assert_eq!(json["date"], "next week");
        assert_eq!(json["total_calories"], 70.0);
    }

    #[tokio::test]
    async fn summary_unknown_user_returns_404() {
        let app = build_router(test_state());

        let response = send(&app, get_req("/summary/5/2024-01-01")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let json = json_body(response).await;
        assert_eq!(json["error"], "User 5 not found");
    }

    #[tokio::test]
    async fn summary_creates_goal_once() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, _) = seed_user_and_egg(&state);
        let uri = format!("/summary/{user_id}/2024-01-01");

        let first = json_body(send(&app, get_req(&uri)).await).await;
        let second = json_body(send(&app, get_req(&uri)).await).await;
        assert_eq!(first["goal"]["id"], second["goal"]["id"]);
        assert_eq!(first["total_protein"], 0.0);
    }

    #[tokio::test]
    async fn non_integer_path_id_returns_400() {
        let app = build_router(test_state());

        let response = send(&app, get_req("/user/abc")).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn dashboard_lists_foods_and_today() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, _) = seed_user_and_egg(&state);

        let response = send(&app, get_req(&format!("/user/{user_id}"))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = json_body(response).await;
        assert_eq!(json["user"]["name"], "Alice");
        assert_eq!(json["foods"][0]["name"], "Egg");
        assert_eq!(json["today"], today());
    }

    #[tokio::test]
    async fn dashboard_unknown_user_returns_404() {
        let app = build_router(test_state());

        let response = send(&app, get_req("/user/3")).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn set_goal_twice_updates_same_row() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, _) = seed_user_and_egg(&state);
        let day = today();

        let response = send(
            &app,
            form_post(
                &format!("/set_goal/{user_id}"),
                "protein_goal=150&carbs_goal=200&calories_goal=2000",
            ),
        )
        .await;
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), format!("/summary/{user_id}/{day}"));
        let first = state.db().get_or_create_daily_goal(user_id, &day).unwrap();
        assert_eq!(first.protein_goal, 150.0);
        assert_eq!(first.carbs_goal, 200.0);
        assert_eq!(first.calories_goal, 2000.0);

        send(
            &app,
            form_post(
                &format!("/set_goal/{user_id}"),
                "protein_goal=100&carbs_goal=250&calories_goal=1800",
            ),
        )
        .await;
        let json = json_body(send(&app, get_req(&format!("/summary/{user_id}/{day}"))).await).await;
        assert_eq!(json["goal"]["id"], first.id);
        assert_eq!(json["goal"]["protein_goal"], 100.0);
        assert_eq!(json["goal"]["calories_goal"], 1800.0);
    }

    #[tokio::test]
    async fn set_goal_missing_field_returns_400() {
        let state = test_state();
        let app = build_router(state.clone());
        let (user_id, _) = seed_user_and_egg(&state);

        let response = send(
            &app,
            form_post(&format!("/set_goal/{user_id}"), "protein_goal=150"),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn security_headers_present() {
        let app = build_router(test_state());

        let response = send(&app, get_req("/")).await;
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response.headers().get("content-security-policy").unwrap(),
            "default-src 'none'"
        );
    }

    #[tokio::test]
    async fn body_size_limit_rejects_oversized() {
        let app = build_router(test_state());

        let big_body = "name=".to_string() + &"a".repeat(BODY_LIMIT + 1);
        let response = send(&app, form_post("/add_user", &big_body)).await;
        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn internal_error_does_not_leak_details() {
        let error = ApiError::Internal(anyhow::anyhow!("disk I/O error at /home/user/meal_tracker.db"));
        let response = error.into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = json_body(response).await;
        assert_eq!(json["error"], "Internal server error");
    }

    #[test]
    fn percent_encode_leaves_iso_dates_alone() {
        assert_eq!(percent_encode_component("2024-01-01"), "2024-01-01");
        assert_eq!(percent_encode_component("a/b c"), "a%2Fb%20c");
    }
}
