//! Statement execution.
//!
//! Runs a [`QueryPlan`] on an acquired handle. Rows are forwarded as the
//! driver returned them. Statements are logged at debug level by shape
//! only; parameter values never reach the log.

use crate::db::driver::Handle;
use crate::error::DbResult;
use crate::models::{QueryPlan, Row};
use std::time::Instant;
use tracing::debug;

/// Run a plan and return its rows. Every error propagates unchanged.
pub async fn run(handle: &mut dyn Handle, plan: &QueryPlan) -> DbResult<Vec<Row>> {
    let start = Instant::now();
    debug!(sql = %plan.sql, params = plan.params.len(), "Executing statement");

    let rows = handle.query(&plan.sql, &plan.params).await?;

    debug!(
        rows = rows.len(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "Statement completed"
    );
    Ok(rows)
}

/// Like [`run`], but a missing table (or other undefined object) yields
/// `None` instead of an error.
pub async fn run_allow_missing(
    handle: &mut dyn Handle,
    plan: &QueryPlan,
) -> DbResult<Option<Vec<Row>>> {
    match run(handle, plan).await {
        Ok(rows) => Ok(Some(rows)),
        Err(e) if e.is_object_not_found() => {
            debug!(sql = %plan.sql, error = %e, "Object not found");
            Ok(None)
        }
        Err(e) => Err(e),
    }
}
