use std::collections::BTreeMap;

use tracing::debug;

use super::{DerivedContext, DerivedError};
use crate::common::constants::*;
use crate::ingestion::rows::{EventRow, EventTypeRow};
use crate::ingestion::{CombinedResult, EntityWriter};
use crate::storage::quote_literal;

pub fn applicable(combined: &CombinedResult) -> bool {
    let malloc_has_address = combined
        .event_type(MALLOC)
        .map(|malloc| malloc.columns.contains(FIELD_ADDRESS))
        .unwrap_or(false);
    malloc_has_address && combined.event_type(FREE).is_some()
}

/// Allocations whose address was never freed afterwards.
pub fn unmatched_allocations_sql(profile_id: &str) -> String {
    let profile_id = quote_literal(profile_id);
    format!(
        "SELECT events.timestamp, events.timestamp_from_start, events.weight, events.thread_id, events.stacktrace_id \
         FROM {EVENTS_TABLE} AS events \
         INNER JOIN {EVENT_FIELDS_TABLE} AS event_fields ON (events.profile_id = event_fields.profile_id AND events.event_id = event_fields.event_id) \
         WHERE events.profile_id = {profile_id} AND events.event_type = '{MALLOC}' \
         AND NOT EXISTS (\
         SELECT 1 FROM {EVENTS_TABLE} AS frees \
         INNER JOIN {EVENT_FIELDS_TABLE} AS free_fields ON (frees.profile_id = free_fields.profile_id AND frees.event_id = free_fields.event_id) \
         WHERE frees.profile_id = events.profile_id AND frees.event_type = '{FREE}' \
         AND frees.timestamp_from_start >= events.timestamp_from_start \
         AND (free_fields.fields::jsonb ->> '{FIELD_ADDRESS}') = (event_fields.fields::jsonb ->> '{FIELD_ADDRESS}')) \
         ORDER BY events.event_id"
    )
}

pub async fn publish(ctx: &DerivedContext<'_>) -> Result<usize, DerivedError> {
    let rows = ctx
        .database
        .query(&unmatched_allocations_sql(&ctx.profile_id))
        .await?;
    if rows.is_empty() {
        debug!(profile_id = %ctx.profile_id, "No unmatched native allocations");
        return Ok(0);
    }

    let mut events: EntityWriter<EventRow> =
        EntityWriter::new(ctx.database.clone(), ctx.profile_id.clone(), ctx.batch_size);
    let mut total_weight = 0i64;
    let mut has_stacktraces = false;
    for row in &rows {
        let weight = row.opt_i64(2)?;
        let stacktrace_id = row.opt_i64(4)?;
        total_weight += weight.unwrap_or(0);
        has_stacktraces |= stacktrace_id.is_some();

        events
            .insert(EventRow {
                event_id: ctx.sequences.next_event_id(),
                event_type: NATIVE_LEAK.to_string(),
                timestamp: row.i64(0)?,
                timestamp_from_start: row.i64(1)?,
                duration: 0,
                samples: 1,
                weight,
                weight_entity: Some(WEIGHT_BYTES.to_string()),
                thread_id: row.opt_i64(3)?,
                stacktrace_id,
            })
            .await?;
    }
    let written = events.close().await?;

    let mut params = BTreeMap::new();
    params.insert(PARAM_SOURCE.to_string(), SOURCE_ASYNC_PROFILER.to_string());
    let mut types: EntityWriter<EventTypeRow> = EntityWriter::new(ctx.database.clone(), ctx.profile_id.clone(), 1);
    types
        .insert(EventTypeRow {
            name: NATIVE_LEAK.to_string(),
            label: "Native Leaks".to_string(),
            samples: written as i64,
            weight: Some(total_weight),
            has_stacktraces,
            params: serde_json::to_string(&params)?,
        })
        .await?;
    types.close().await?;

    Ok(written)
}
