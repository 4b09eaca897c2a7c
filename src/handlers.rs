use crate::auth::AuthService;
use crate::cache::{cache_key, ResponseCache};
use crate::config::Config;
use crate::context::RequestContext;
use crate::errors::ApiError;
use crate::loader::Loaders;
use crate::models::*;
use crate::rate_limit::RateLimiter;
use crate::store::EntityStore;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Non-admin callers see only the head of the plan catalog.
const PUBLIC_PLAN_LIMIT: usize = 3;

/// Shared application state injected into handlers.
///
/// The limiter, cache, and pending-code map are the only process-lifetime
/// mutable state; everything request-scoped lives in `RequestContext`.
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// In-memory entity store.
    pub store: Arc<EntityStore>,
    /// Fixed-window request limiter, keyed per client.
    pub rate_limiter: RateLimiter,
    /// TTL + LRU response cache for read queries.
    pub cache: ResponseCache,
    /// Phone-code authentication and session tokens.
    pub auth: AuthService,
}

impl AppState {
    pub fn new(config: Config, store: Arc<EntityStore>) -> Self {
        let rate_limiter = RateLimiter::new(
            Duration::from_millis(config.rate_limit_window_ms),
            config.rate_limit_max,
        );
        let cache = ResponseCache::new(
            config.cache_capacity,
            Duration::from_millis(config.cache_ttl_ms),
        );
        let auth = AuthService::new(
            Arc::clone(&store),
            config.jwt_secret.clone(),
            config.admin_phones.clone(),
            config.log_auth,
        );
        Self {
            config,
            store,
            rate_limiter,
            cache,
            auth,
        }
    }
}

/// Builds the application router. Kept out of `main` so the test suites can
/// drive the exact production routing and middleware stack.
pub fn router(state: Arc<AppState>) -> Router {
    let api = Router::new()
        .route("/api/v1/auth/login", post(auth_login))
        .route("/api/v1/auth/confirm", post(auth_confirm))
        .route("/api/v1/me", get(me))
        .route("/api/v1/people", get(list_people))
        .route("/api/v1/people/:id", get(get_person))
        .route("/api/v1/people/:id/contracts", get(person_contracts))
        .route("/api/v1/plans", get(list_plans))
        .route("/api/v1/plans/:id", get(get_plan))
        .route("/api/v1/plans/:id/contracts", get(plan_contracts))
        .route("/api/v1/contracts", get(list_contracts))
        .route("/api/v1/contracts/status-counts", get(status_counts))
        .route("/api/v1/contracts/:id", get(get_contract))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(64 * 1024)));

    // Health check bypasses rate limiting (no request context is built).
    Router::new()
        .route("/health", get(health))
        .merge(api)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "consorcio-api",
            "version": env!("CARGO_PKG_VERSION"),
        })),
    )
}

// ============ Auth ============

/// POST /api/v1/auth/login
///
/// Public: starts the phone-code login flow. Rate limited like everything
/// else, but no identity is required.
pub async fn auth_login(
    State(state): State<Arc<AppState>>,
    _ctx: RequestContext,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let result = state.auth.request_login(&body.phone)?;
    Ok(Json(result))
}

/// POST /api/v1/auth/confirm
///
/// Public: confirms a pending code and returns a session token.
pub async fn auth_confirm(
    State(state): State<Arc<AppState>>,
    _ctx: RequestContext,
    Json(body): Json<ConfirmRequest>,
) -> Result<Json<AuthPayload>, ApiError> {
    let payload = state.auth.confirm_code(&body.phone, &body.code)?;
    Ok(Json(payload))
}

/// GET /api/v1/me
pub async fn me(ctx: RequestContext) -> Result<Json<Person>, ApiError> {
    let person = ctx.require_person()?;
    Ok(Json(person.clone()))
}

// ============ People ============

/// GET /api/v1/people
pub async fn list_people(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
    ctx: RequestContext,
) -> Result<Json<Value>, ApiError> {
    ctx.require_person()?;
    let args = json!({ "limit": pagination.limit(), "offset": pagination.offset() });
    let key = cache_key("people", &args, ctx.is_admin);
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }
    let page = paginate(&state.store.people(), pagination);
    cache_and_reply(&state, key, &page)
}

/// GET /api/v1/people/:id
pub async fn get_person(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ctx: RequestContext,
) -> Result<Json<Person>, ApiError> {
    ctx.require_person()?;
    let person = state
        .store
        .person_by_id(id)
        .ok_or_else(|| ApiError::NotFound(format!("Person {} not found", id)))?;
    Ok(Json(person))
}

/// GET /api/v1/people/:id/contracts
///
/// Contracts belonging to one person, with optional status filter and
/// limit/offset slicing. Returns a bare list, not a connection.
pub async fn person_contracts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(filter): Query<ContractFilter>,
    ctx: RequestContext,
) -> Result<Json<Vec<ContractView>>, ApiError> {
    ctx.require_person()?;
    if state.store.person_by_id(id).is_none() {
        return Err(ApiError::NotFound(format!("Person {} not found", id)));
    }
    let contracts = filter_slice(state.store.contracts_by_person(id), &filter);
    let views = resolve_contracts(&contracts, &ctx.loaders)?;
    Ok(Json(views))
}

// ============ Plans ============

/// GET /api/v1/plans
///
/// The administrative tier sees the full catalog; everyone else only its
/// head. The privilege tier is part of the cache key so the widened result
/// set can never leak to a standard caller.
pub async fn list_plans(
    State(state): State<Arc<AppState>>,
    Query(pagination): Query<Pagination>,
    ctx: RequestContext,
) -> Result<Json<Value>, ApiError> {
    ctx.require_person()?;
    let args = json!({ "limit": pagination.limit(), "offset": pagination.offset() });
    let key = cache_key("plans", &args, ctx.is_admin);
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }
    let mut plans = state.store.plans();
    if !ctx.is_admin {
        plans.truncate(PUBLIC_PLAN_LIMIT);
    }
    let page = paginate(&plans, pagination);
    cache_and_reply(&state, key, &page)
}

/// GET /api/v1/plans/:id
pub async fn get_plan(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ctx: RequestContext,
) -> Result<Json<Plan>, ApiError> {
    ctx.require_person()?;
    let plan = state
        .store
        .plan_by_id(id)
        .ok_or_else(|| ApiError::NotFound(format!("Plan {} not found", id)))?;
    Ok(Json(plan))
}

/// GET /api/v1/plans/:id/contracts
pub async fn plan_contracts(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(filter): Query<ContractFilter>,
    ctx: RequestContext,
) -> Result<Json<Vec<ContractView>>, ApiError> {
    ctx.require_person()?;
    if state.store.plan_by_id(id).is_none() {
        return Err(ApiError::NotFound(format!("Plan {} not found", id)));
    }
    let contracts = filter_slice(state.store.contracts_by_plan(id), &filter);
    let views = resolve_contracts(&contracts, &ctx.loaders)?;
    Ok(Json(views))
}

// ============ Contracts ============

/// GET /api/v1/contracts
pub async fn list_contracts(
    State(state): State<Arc<AppState>>,
    Query(filter): Query<ContractFilter>,
    ctx: RequestContext,
) -> Result<Json<Value>, ApiError> {
    ctx.require_person()?;
    let args = json!({
        "status": filter.status,
        "limit": filter.pagination().limit(),
        "offset": filter.pagination().offset(),
    });
    let key = cache_key("contracts", &args, ctx.is_admin);
    if let Some(hit) = state.cache.get(&key) {
        return Ok(Json(hit));
    }
    let mut contracts = state.store.contracts();
    if let Some(status) = filter.status {
        contracts.retain(|c| c.status == status);
    }
    let page = paginate(&contracts, filter.pagination());
    // Only the page's nodes are resolved; one batch per entity type.
    let nodes = resolve_contracts(&page.nodes, &ctx.loaders)?;
    let result = Connection {
        nodes,
        page_info: page.page_info,
    };
    cache_and_reply(&state, key, &result)
}

/// GET /api/v1/contracts/:id
pub async fn get_contract(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
    ctx: RequestContext,
) -> Result<Json<ContractView>, ApiError> {
    ctx.require_person()?;
    let contract = state
        .store
        .contract_by_id(id)
        .ok_or_else(|| ApiError::NotFound(format!("Contract {} not found", id)))?;
    let view = resolve_contract(&contract, &ctx.loaders)?;
    Ok(Json(view))
}

/// GET /api/v1/contracts/status-counts
pub async fn status_counts(
    State(state): State<Arc<AppState>>,
    ctx: RequestContext,
) -> Result<Json<Vec<StatusCount>>, ApiError> {
    ctx.require_person()?;
    let contracts = state.store.contracts();
    let counts = ContractStatus::ALL
        .iter()
        .map(|status| StatusCount {
            status: *status,
            total: contracts.iter().filter(|c| c.status == *status).count(),
        })
        .filter(|c| c.total > 0)
        .collect();
    Ok(Json(counts))
}

// ============ Resolution helpers ============

/// Applies the status filter and limit/offset slice used by the relation
/// sub-lists.
fn filter_slice(mut contracts: Vec<Contract>, filter: &ContractFilter) -> Vec<Contract> {
    if let Some(status) = filter.status {
        contracts.retain(|c| c.status == status);
    }
    let pagination = filter.pagination();
    contracts
        .into_iter()
        .skip(pagination.offset())
        .take(pagination.limit())
        .collect()
}

/// Resolves a batch of contracts into views. All related identifiers are
/// queued before the first flush, so each entity type costs exactly one
/// store fetch for the whole level.
fn resolve_contracts(
    contracts: &[Contract],
    loaders: &Loaders,
) -> Result<Vec<ContractView>, ApiError> {
    for contract in contracts {
        loaders.people.enqueue(contract.person_id);
        loaders.plans.enqueue(contract.plan_id);
    }
    loaders.people.flush();
    loaders.plans.flush();
    contracts
        .iter()
        .map(|c| resolve_contract(c, loaders))
        .collect()
}

fn resolve_contract(contract: &Contract, loaders: &Loaders) -> Result<ContractView, ApiError> {
    let person = loaders.people.load(contract.person_id).ok_or_else(|| {
        ApiError::Internal(format!(
            "Contract {} references missing person {}",
            contract.id, contract.person_id
        ))
    })?;
    let plan = loaders.plans.load(contract.plan_id).ok_or_else(|| {
        ApiError::Internal(format!(
            "Contract {} references missing plan {}",
            contract.id, contract.plan_id
        ))
    })?;
    let progress_percent = contract.progress_percent(&plan);
    Ok(ContractView {
        id: contract.id,
        person,
        plan,
        contracted_at: contract.contracted_at.clone(),
        status: contract.status,
        paid_installments: contract.paid_installments,
        progress_percent,
    })
}

fn cache_and_reply<T: serde::Serialize>(
    state: &AppState,
    key: String,
    result: &T,
) -> Result<Json<Value>, ApiError> {
    let value = serde_json::to_value(result)
        .map_err(|e| ApiError::Internal(format!("Failed to serialize response: {}", e)))?;
    state.cache.insert(key, value.clone());
    Ok(Json(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContractStatus;

    fn seeded_loaders() -> Loaders {
        Loaders::new(Arc::new(EntityStore::seeded()))
    }

    #[test]
    fn resolving_a_level_costs_one_fetch_per_entity_type() {
        let store = Arc::new(EntityStore::seeded());
        let loaders = Loaders::new(Arc::clone(&store));
        let contracts = store.contracts();
        let views = resolve_contracts(&contracts, &loaders).unwrap();
        assert_eq!(views.len(), contracts.len());
        assert_eq!(loaders.people.fetch_count(), 1);
        assert_eq!(loaders.plans.fetch_count(), 1);
    }

    #[test]
    fn resolved_view_carries_clamped_progress() {
        let store = Arc::new(EntityStore::seeded());
        let loaders = Loaders::new(Arc::clone(&store));
        // Contract 8: 30 paid on a 24-installment plan.
        let contract = store.contract_by_id(8).unwrap();
        let view = resolve_contract(&contract, &loaders).unwrap();
        assert_eq!(view.progress_percent, 100.0);
        assert_eq!(view.plan.id, 5);
        assert_eq!(view.person.id, 4);
    }

    #[test]
    fn dangling_relation_surfaces_as_internal_error() {
        let loaders = seeded_loaders();
        let contract = Contract {
            id: 99,
            person_id: 999,
            plan_id: 1,
            contracted_at: "2024-01-01".to_string(),
            status: ContractStatus::Active,
            paid_installments: 0,
        };
        let err = resolve_contract(&contract, &loaders).unwrap_err();
        assert_eq!(err.reason(), "internal");
    }

    #[test]
    fn filter_slice_applies_status_then_window() {
        let store = EntityStore::seeded();
        let filter = ContractFilter {
            status: Some(ContractStatus::Active),
            limit: Some(2),
            offset: Some(1),
        };
        let sliced = filter_slice(store.contracts(), &filter);
        assert_eq!(sliced.len(), 2);
        assert!(sliced.iter().all(|c| c.status == ContractStatus::Active));
        // Four active contracts seeded; offset 1 skips the first.
        assert_eq!(sliced[0].id, 3);
    }
}
