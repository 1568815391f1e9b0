//! Per-type finalization applied once to every merged event type.

use super::result::{ActiveSettings, EventTypeBuilder};
use crate::common::constants::*;

const PARAM_CPU_EVENT: &str = "cpu_event";
const PARAM_WEIGHT_ENTITY: &str = "weight_entity";

/// Closed, ordered set of event type enhancers.
///
/// Variants carry the setting values they were resolved with, so applying an
/// enhancer never looks anything up again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventTypeEnhancer {
    ExecutionSamples { event: Option<String>, period: Option<String> },
    WallClockSamples { interval: Option<String> },
    NativeMallocSamples { interval: Option<String> },
    TlabAllocationSamples { alloc: Option<String> },
    MonitorEnter { lock: Option<String>, threshold: Option<String> },
    MonitorWait { threshold: Option<String> },
    ThreadPark { threshold: Option<String> },
    WallClockWeight { interval_ns: i64 },
    ExecutionSampleWeight { interval_ns: i64 },
}

fn param(settings: &ActiveSettings, event_type: &str, name: &str) -> Option<String> {
    settings.params(event_type).and_then(|params| params.get(name)).cloned()
}

fn source_for(async_profiler_param: &Option<String>) -> &'static str {
    if async_profiler_param.is_some() {
        SOURCE_ASYNC_PROFILER
    } else {
        SOURCE_JDK
    }
}

impl EventTypeEnhancer {
    /// Resolve the enhancer list, in application order, from the merged settings.
    pub fn resolve(settings: &ActiveSettings) -> Vec<EventTypeEnhancer> {
        let execution_interval = param(settings, EXECUTION_SAMPLE, "interval")
            .or_else(|| param(settings, EXECUTION_SAMPLE, "period"));
        let wall_interval = param(settings, WALL_CLOCK_SAMPLE, "interval");

        let mut enhancers = vec![
            EventTypeEnhancer::ExecutionSamples {
                event: param(settings, EXECUTION_SAMPLE, "event"),
                period: execution_interval.clone(),
            },
            EventTypeEnhancer::WallClockSamples {
                interval: wall_interval.clone(),
            },
            EventTypeEnhancer::NativeMallocSamples {
                interval: param(settings, MALLOC, "nativemem"),
            },
            EventTypeEnhancer::TlabAllocationSamples {
                alloc: param(settings, OBJECT_ALLOCATION_IN_NEW_TLAB, "alloc")
                    .or_else(|| param(settings, OBJECT_ALLOCATION_OUTSIDE_TLAB, "alloc")),
            },
            EventTypeEnhancer::MonitorEnter {
                lock: param(settings, JAVA_MONITOR_ENTER, "lock"),
                threshold: param(settings, JAVA_MONITOR_ENTER, "threshold"),
            },
            EventTypeEnhancer::MonitorWait {
                threshold: param(settings, JAVA_MONITOR_WAIT, "threshold"),
            },
            EventTypeEnhancer::ThreadPark {
                threshold: param(settings, THREAD_PARK, "threshold"),
            },
        ];

        if let Some(interval_ns) = wall_interval.as_deref().and_then(parse_duration_nanos) {
            enhancers.push(EventTypeEnhancer::WallClockWeight { interval_ns });
        }
        if let Some(interval_ns) = execution_interval.as_deref().and_then(parse_duration_nanos) {
            enhancers.push(EventTypeEnhancer::ExecutionSampleWeight { interval_ns });
        }
        enhancers
    }

    pub fn name(&self) -> &'static str {
        match self {
            EventTypeEnhancer::ExecutionSamples { .. } => "execution-samples",
            EventTypeEnhancer::WallClockSamples { .. } => "wall-clock-samples",
            EventTypeEnhancer::NativeMallocSamples { .. } => "native-malloc-samples",
            EventTypeEnhancer::TlabAllocationSamples { .. } => "tlab-allocation-samples",
            EventTypeEnhancer::MonitorEnter { .. } => "monitor-enter",
            EventTypeEnhancer::MonitorWait { .. } => "monitor-wait",
            EventTypeEnhancer::ThreadPark { .. } => "thread-park",
            EventTypeEnhancer::WallClockWeight { .. } => "wall-clock-weight",
            EventTypeEnhancer::ExecutionSampleWeight { .. } => "execution-sample-weight",
        }
    }

    pub fn is_applicable(&self, builder: &EventTypeBuilder) -> bool {
        let code = builder.code.as_str();
        match self {
            EventTypeEnhancer::ExecutionSamples { .. } => code == EXECUTION_SAMPLE,
            EventTypeEnhancer::WallClockSamples { .. } => code == WALL_CLOCK_SAMPLE,
            EventTypeEnhancer::NativeMallocSamples { .. } => code == MALLOC,
            EventTypeEnhancer::TlabAllocationSamples { .. } => {
                code == OBJECT_ALLOCATION_IN_NEW_TLAB || code == OBJECT_ALLOCATION_OUTSIDE_TLAB
            }
            EventTypeEnhancer::MonitorEnter { .. } => code == JAVA_MONITOR_ENTER,
            EventTypeEnhancer::MonitorWait { .. } => code == JAVA_MONITOR_WAIT,
            EventTypeEnhancer::ThreadPark { .. } => code == THREAD_PARK,
            EventTypeEnhancer::WallClockWeight { .. } => code == WALL_CLOCK_SAMPLE && builder.weight.is_none(),
            EventTypeEnhancer::ExecutionSampleWeight { .. } => {
                code == EXECUTION_SAMPLE && builder.weight.is_none()
            }
        }
    }

    pub fn apply(&self, builder: &mut EventTypeBuilder) {
        match self {
            EventTypeEnhancer::ExecutionSamples { event, period } => {
                builder.label = Some("CPU Samples".to_string());
                set_extra(builder, PARAM_SOURCE, source_for(event));
                set_extra(builder, PARAM_CPU_EVENT, event.as_deref().unwrap_or("cpu"));
                copy_extra(builder, "period", period);
            }
            EventTypeEnhancer::WallClockSamples { interval } => {
                builder.label = Some("Wall-Clock Samples".to_string());
                set_extra(builder, PARAM_SOURCE, SOURCE_ASYNC_PROFILER);
                copy_extra(builder, "interval", interval);
            }
            EventTypeEnhancer::NativeMallocSamples { interval } => {
                builder.label = Some("Native Allocations".to_string());
                set_extra(builder, PARAM_SOURCE, SOURCE_ASYNC_PROFILER);
                set_extra(builder, PARAM_WEIGHT_ENTITY, WEIGHT_BYTES);
                copy_extra(builder, "nativemem", interval);
            }
            EventTypeEnhancer::TlabAllocationSamples { alloc } => {
                set_extra(builder, PARAM_SOURCE, source_for(alloc));
                set_extra(builder, PARAM_WEIGHT_ENTITY, WEIGHT_BYTES);
                copy_extra(builder, "alloc", alloc);
            }
            EventTypeEnhancer::MonitorEnter { lock, threshold } => {
                set_extra(builder, PARAM_SOURCE, source_for(lock));
                copy_extra(builder, "lock", lock);
                copy_extra(builder, "threshold", threshold);
            }
            EventTypeEnhancer::MonitorWait { threshold } | EventTypeEnhancer::ThreadPark { threshold } => {
                set_extra(builder, PARAM_SOURCE, SOURCE_JDK);
                copy_extra(builder, "threshold", threshold);
            }
            EventTypeEnhancer::WallClockWeight { interval_ns }
            | EventTypeEnhancer::ExecutionSampleWeight { interval_ns } => {
                builder.weight = Some(builder.samples.saturating_mul(*interval_ns));
                set_extra(builder, PARAM_WEIGHT_ENTITY, WEIGHT_DURATION);
            }
        }
    }
}

fn set_extra(builder: &mut EventTypeBuilder, key: &str, value: &str) {
    builder.extras.insert(key.to_string(), value.to_string());
}

fn copy_extra(builder: &mut EventTypeBuilder, key: &str, value: &Option<String>) {
    if let Some(value) = value {
        set_extra(builder, key, value);
    }
}

/// Parse `<n> ns|us|µs|ms|s` (whitespace optional) or a bare nanosecond count.
pub fn parse_duration_nanos(value: &str) -> Option<i64> {
    let value = value.trim();
    let split = value
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(idx, _)| idx)
        .unwrap_or(value.len());
    let (number, unit) = value.split_at(split);
    let number: i64 = number.parse().ok()?;

    let multiplier = match unit.trim() {
        "" | "ns" => 1,
        "us" | "µs" => NANOS_PER_MICROSECOND,
        "ms" => NANOS_PER_MILLISECOND,
        "s" => NANOS_PER_SECOND,
        _ => return None,
    };
    number.checked_mul(multiplier)
}
