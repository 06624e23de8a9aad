//! Scheduler trigger for the reminder scanner

use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use utoipa::IntoParams;

use crate::{error::AppResult, services::reminders::ScanReport};

#[derive(Deserialize, IntoParams)]
pub struct CronQuery {
    /// Shared secret configured as `reminders.secret`
    pub secret: Option<String>,
}

/// Run one reminder sweep
#[utoipa::path(
    get,
    path = "/cron/reminders",
    tag = "reminders",
    params(CronQuery),
    responses(
        (status = 200, description = "Sweep finished", body = ScanReport),
        (status = 401, description = "Missing or wrong secret")
    )
)]
pub async fn run_reminders(
    State(state): State<crate::AppState>,
    Query(query): Query<CronQuery>,
) -> AppResult<Json<ScanReport>> {
    let scanner = &state.services.reminders;
    scanner.authorize(query.secret.as_deref().unwrap_or_default())?;
    let report = scanner.run().await?;
    Ok(Json(report))
}
