//! Linkgate HTTP surface
//!
//! Authentication happens upstream: the fronting proxy forwards the
//! authenticated user id in `x-principal-id`. Requests without the header
//! act anonymously; an id the store does not know is rejected with 401.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::caps::{Capability, PermissionSet};
use crate::constants::{caps_to_names, role_name};
use crate::entity::{Actor, LinkId, LinkStats, ShortLink, User, UserId};
use crate::error::LinkgateError;
use crate::links::LinkAccessGuard;
use crate::namespace::CustomPath;
use crate::store::LinkStore;
use crate::users::UserAdministrationGuard;

pub const PRINCIPAL_HEADER: &str = "x-principal-id";

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct CreateLinkRequest {
    pub url: String,
    #[serde(default)]
    pub custom_path: Option<CustomPath>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Include other users' links (needs an "any" capability)
    #[serde(default)]
    pub all: bool,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
}

/// Exactly one of the fields selects the new permission set
#[derive(Debug, Default, Deserialize)]
pub struct PermissionsRequest {
    pub role: Option<String>,
    pub capabilities: Option<Vec<String>>,
    pub permissions: Option<u64>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct UserView {
    pub id: UserId,
    pub username: String,
    pub permissions: u64,
    pub capabilities: Vec<&'static str>,
    pub role: Option<&'static str>,
    pub created_at: u64,
}

impl From<User> for UserView {
    fn from(u: User) -> Self {
        UserView {
            id: u.id,
            capabilities: caps_to_names(u.permissions),
            role: role_name(u.permissions),
            permissions: u.permissions.bits(),
            username: u.username,
            created_at: u.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);
type ApiResult<T> = Result<T, ApiError>;

fn fail(e: LinkgateError) -> ApiError {
    let status = match &e {
        LinkgateError::Forbidden => StatusCode::FORBIDDEN,
        LinkgateError::NotFound(_) => StatusCode::NOT_FOUND,
        LinkgateError::Conflict(_) => StatusCode::CONFLICT,
        LinkgateError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        LinkgateError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    let error = match &e {
        LinkgateError::Storage(msg) => {
            tracing::error!(error = %msg, "storage failure");
            "internal error".to_string()
        }
        other => other.to_string(),
    };
    (status, Json(ErrorResponse { error }))
}

fn unauthorized(msg: &str) -> ApiError {
    (StatusCode::UNAUTHORIZED, Json(ErrorResponse { error: msg.to_string() }))
}

// ============================================================================
// App State
// ============================================================================

pub type SharedStore = Arc<dyn LinkStore>;

pub struct AppState {
    pub links: LinkAccessGuard<SharedStore>,
    pub users: UserAdministrationGuard<SharedStore>,
}

impl AppState {
    pub fn new(store: SharedStore) -> Self {
        AppState {
            links: LinkAccessGuard::new(store.clone()),
            users: UserAdministrationGuard::new(store),
        }
    }

    /// Resolve the forwarded principal header into an actor
    fn actor(&self, headers: &HeaderMap) -> ApiResult<Actor> {
        let Some(raw) = headers.get(PRINCIPAL_HEADER) else {
            return Ok(Actor::Anonymous);
        };
        let id: UserId = raw
            .to_str()
            .ok()
            .and_then(|s| s.trim().parse().ok())
            .ok_or_else(|| unauthorized("malformed principal id"))?;
        match self.users.principal(id) {
            Ok(p) => Ok(Actor::Principal(p)),
            Err(LinkgateError::NotFound(_)) => Err(unauthorized("unknown principal")),
            Err(e) => Err(fail(e)),
        }
    }
}

type Shared = State<Arc<AppState>>;

// ============================================================================
// Handlers
// ============================================================================

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

async fn create_link(
    State(state): Shared,
    headers: HeaderMap,
    Json(req): Json<CreateLinkRequest>,
) -> ApiResult<(StatusCode, Json<ShortLink>)> {
    let actor = state.actor(&headers)?;
    let link = state
        .links
        .create_link(&actor, &req.url, req.custom_path.as_ref())
        .map_err(fail)?;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn list_links(
    State(state): Shared,
    headers: HeaderMap,
    Query(q): Query<ListQuery>,
) -> ApiResult<Json<Vec<ShortLink>>> {
    let actor = state.actor(&headers)?;
    state.links.list_links(&actor, q.all).map(Json).map_err(fail)
}

async fn delete_link(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<LinkId>,
) -> ApiResult<StatusCode> {
    let actor = state.actor(&headers)?;
    state.links.delete_link(&actor, id).map_err(fail)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn link_stats(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<LinkId>,
) -> ApiResult<Json<LinkStats>> {
    let actor = state.actor(&headers)?;
    state.links.link_stats(&actor, id).map(Json).map_err(fail)
}

async fn register(
    State(state): Shared,
    Json(req): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<UserView>)> {
    let user = state.users.register(&req.username).map_err(fail)?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

async fn list_users(State(state): Shared, headers: HeaderMap) -> ApiResult<Json<Vec<UserView>>> {
    let actor = state.actor(&headers)?;
    let users = state.users.list_users(&actor).map_err(fail)?;
    Ok(Json(users.into_iter().map(UserView::from).collect()))
}

async fn update_permissions(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<UserId>,
    Json(req): Json<PermissionsRequest>,
) -> ApiResult<StatusCode> {
    let actor = state.actor(&headers)?;
    let updated = match (req.role, req.capabilities, req.permissions) {
        (Some(role), None, None) => state.users.set_role(&actor, id, &role).map(|_| ()),
        (None, Some(names), None) => parse_capabilities(&names)
            .and_then(|set| state.users.update_permissions(&actor, id, set)),
        (None, None, Some(bits)) => {
            state.users.update_permissions(&actor, id, PermissionSet::from_bits(bits))
        }
        _ => Err(LinkgateError::invalid(
            "give exactly one of 'role', 'capabilities' or 'permissions'",
        )),
    };
    updated.map_err(fail)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_user(
    State(state): Shared,
    headers: HeaderMap,
    Path(id): Path<UserId>,
) -> ApiResult<StatusCode> {
    let actor = state.actor(&headers)?;
    state.users.delete_user(&actor, id).map_err(fail)?;
    Ok(StatusCode::NO_CONTENT)
}

/// Public redirect for a short path
async fn redirect(State(state): Shared, Path(path): Path<String>) -> ApiResult<Response> {
    let link = state.links.resolve(&path).map_err(fail)?;
    Ok((StatusCode::FOUND, [(header::LOCATION, link.original_url)]).into_response())
}

fn parse_capabilities(names: &[String]) -> crate::error::Result<PermissionSet> {
    names.iter().try_fold(PermissionSet::NONE, |set, n| {
        Capability::from_name(n)
            .map(|c| set.grant(c))
            .ok_or_else(|| LinkgateError::invalid(format!("unknown capability '{n}'")))
    })
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/links", post(create_link).get(list_links))
        .route("/api/links/:id", delete(delete_link))
        .route("/api/links/:id/stats", get(link_stats))
        .route("/api/register", post(register))
        .route("/api/users", get(list_users))
        .route("/api/users/:id", delete(delete_user))
        .route("/api/users/:id/permissions", put(update_permissions))
        .route("/*path", get(redirect))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::bootstrap;
    use crate::store::MemoryStore;
    use axum::http::HeaderValue;

    fn state() -> (Arc<AppState>, UserId) {
        let store: SharedStore = Arc::new(MemoryStore::new());
        let admin = bootstrap(&store, "root").unwrap();
        (Arc::new(AppState::new(store)), admin.id)
    }

    fn as_user(id: UserId) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert(PRINCIPAL_HEADER, HeaderValue::from_str(&id.to_string()).unwrap());
        h
    }

    #[tokio::test]
    async fn anonymous_create_and_redirect() {
        let (state, _) = state();
        let req = CreateLinkRequest { url: "https://example.com/x".into(), custom_path: None };
        let (status, Json(link)) =
            create_link(State(state.clone()), HeaderMap::new(), Json(req)).await.unwrap();
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(link.owner_id, None);

        let resp = redirect(State(state.clone()), Path(link.path.clone())).await.unwrap();
        assert_eq!(resp.status(), StatusCode::FOUND);
        assert_eq!(resp.headers()[header::LOCATION], "https://example.com/x");

        match redirect(State(state), Path("missing".into())).await {
            Err((status, _)) => assert_eq!(status, StatusCode::NOT_FOUND),
            Ok(resp) => panic!("unexpected {}", resp.status()),
        }
    }

    #[tokio::test]
    async fn anonymous_custom_path_is_forbidden() {
        let (state, _) = state();
        let req = CreateLinkRequest {
            url: "https://example.com".into(),
            custom_path: Some(CustomPath::global("promo")),
        };
        let (status, Json(body)) =
            create_link(State(state), HeaderMap::new(), Json(req)).await.unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body.error, "forbidden");
    }

    #[tokio::test]
    async fn unknown_or_malformed_principal_is_unauthorized() {
        let (state, _) = state();
        let (status, _) = list_links(State(state.clone()), as_user(999), Query(ListQuery::default()))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let mut h = HeaderMap::new();
        h.insert(PRINCIPAL_HEADER, HeaderValue::from_static("root"));
        let (status, _) = list_links(State(state), h, Query(ListQuery::default())).await.unwrap_err();
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn admin_manages_registered_user() {
        let (state, admin) = state();
        let (_, Json(alice)) =
            register(State(state.clone()), Json(RegisterRequest { username: "alice".into() }))
                .await
                .unwrap();
        assert_eq!(alice.role, Some("regular"));

        let (status, _) = list_users(State(state.clone()), as_user(alice.id)).await.unwrap_err();
        assert_eq!(status, StatusCode::FORBIDDEN);

        let req = PermissionsRequest { role: Some("editor".into()), ..Default::default() };
        let status = update_permissions(State(state.clone()), as_user(admin), Path(alice.id), Json(req))
            .await
            .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);

        let Json(users) = list_users(State(state.clone()), as_user(admin)).await.unwrap();
        let alice_view = users.iter().find(|u| u.id == alice.id).unwrap();
        assert_eq!(alice_view.role, Some("editor"));

        let req = PermissionsRequest {
            capabilities: Some(vec!["create_any".into(), "nope".into()]),
            ..Default::default()
        };
        let (status, _) = update_permissions(State(state.clone()), as_user(admin), Path(alice.id), Json(req))
            .await
            .unwrap_err();
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let status = delete_user(State(state.clone()), as_user(admin), Path(alice.id)).await.unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = delete_user(State(state), as_user(admin), Path(alice.id)).await.unwrap_err();
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn taken_custom_path_is_conflict() {
        let (state, admin) = state();
        let req = || CreateLinkRequest {
            url: "https://example.com".into(),
            custom_path: Some(CustomPath::global("promo")),
        };
        create_link(State(state.clone()), as_user(admin), Json(req())).await.unwrap();
        let (status, _) = create_link(State(state), as_user(admin), Json(req())).await.unwrap_err();
        assert_eq!(status, StatusCode::CONFLICT);
    }

    #[test]
    fn capability_names_are_checked() {
        assert!(parse_capabilities(&["delete_own".into(), "view_own_stats".into()]).is_ok());
        assert!(parse_capabilities(&["root".into()]).is_err());
    }
}
