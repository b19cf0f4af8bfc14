use sqlx::PgPool;

use crate::refinement::RefinementContext;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Model factory, credential cipher and fan-out limits shared by every refinement.
    pub refinement: RefinementContext,
}
