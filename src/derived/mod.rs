//! Synthetic events computed from already persisted primary events.

pub mod errors;
pub mod native_leak;

use std::sync::Arc;

use tracing::info;

use crate::ingestion::{CombinedResult, ProfileSequences};
use crate::storage::Database;

pub use errors::DerivedError;

/// Everything a calculator needs to read primary events and write derived ones.
pub struct DerivedContext<'a> {
    pub database: Arc<dyn Database>,
    pub profile_id: Arc<str>,
    pub sequences: Arc<ProfileSequences>,
    pub batch_size: usize,
    pub combined: &'a CombinedResult,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DerivedEventCalculator {
    NativeLeaks,
}

impl DerivedEventCalculator {
    pub const ALL: [DerivedEventCalculator; 1] = [DerivedEventCalculator::NativeLeaks];

    pub fn name(&self) -> &'static str {
        match self {
            DerivedEventCalculator::NativeLeaks => "native-leaks",
        }
    }

    pub fn applicable(&self, combined: &CombinedResult) -> bool {
        match self {
            DerivedEventCalculator::NativeLeaks => native_leak::applicable(combined),
        }
    }

    /// Write the derived events; returns how many were written.
    pub async fn publish(&self, ctx: &DerivedContext<'_>) -> Result<usize, DerivedError> {
        match self {
            DerivedEventCalculator::NativeLeaks => native_leak::publish(ctx).await,
        }
    }
}

/// Run every applicable calculator in order, stopping at the first failure.
pub async fn run_calculators(ctx: &DerivedContext<'_>) -> Result<usize, DerivedError> {
    let mut total = 0;
    for calculator in DerivedEventCalculator::ALL {
        if !calculator.applicable(ctx.combined) {
            continue;
        }
        let written = calculator.publish(ctx).await?;
        info!(
            profile_id = %ctx.profile_id,
            calculator = calculator.name(),
            events = written,
            "🧮 Derived events published"
        );
        total += written;
    }
    Ok(total)
}
