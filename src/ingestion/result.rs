//! Aggregates accumulated by ingestion workers and merged by the collector.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::common::constants::PARAM_ENABLED;
use crate::common::structs::TimestampMS;

pub type SettingParams = BTreeMap<String, String>;

/// Per-type statistics built incrementally during ingestion.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventTypeBuilder {
    pub code: String,
    pub label: Option<String>,
    pub samples: i64,
    pub weight: Option<i64>,
    pub has_stacktraces: bool,
    pub columns: BTreeSet<String>,
    pub extras: SettingParams,
}

impl EventTypeBuilder {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn add_event(&mut self, samples: i64, weight: Option<i64>) {
        self.samples = self.samples.saturating_add(samples);
        if let Some(weight) = weight {
            self.weight = Some(self.weight.unwrap_or(0).saturating_add(weight));
        }
    }

    /// Fold another partial builder of the same type into this one.
    ///
    /// Sums and flags are order independent; conflicting labels resolve to
    /// the lexicographically smallest one.
    pub fn merge(&mut self, other: &EventTypeBuilder) {
        self.samples = self.samples.saturating_add(other.samples);
        self.weight = match (self.weight, other.weight) {
            (Some(a), Some(b)) => Some(a.saturating_add(b)),
            (a, b) => a.or(b),
        };
        self.has_stacktraces |= other.has_stacktraces;
        self.label = match (self.label.take(), other.label.clone()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        self.columns.extend(other.columns.iter().cloned());
        for (key, value) in &other.extras {
            self.extras.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Finalize with the type's active-setting parameters; enhancer extras
    /// override setting parameters of the same name.
    pub fn build(self, setting_params: Option<&SettingParams>) -> EventType {
        let mut params = setting_params.cloned().unwrap_or_default();
        params.extend(self.extras);
        EventType {
            label: self.label.unwrap_or_else(|| self.code.clone()),
            name: self.code,
            samples: self.samples,
            weight: self.weight,
            has_stacktraces: self.has_stacktraces,
            params,
            columns: self.columns,
        }
    }
}

/// A finalized event type as persisted in `event_types`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventType {
    pub name: String,
    pub label: String,
    pub samples: i64,
    pub weight: Option<i64>,
    pub has_stacktraces: bool,
    pub params: SettingParams,
    /// Field names observed on events of this type; not persisted.
    #[serde(skip)]
    pub columns: BTreeSet<String>,
}

/// Configuration parameters that were active for one event type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActiveSetting {
    pub event_type: String,
    pub enabled: bool,
    pub params: SettingParams,
}

impl ActiveSetting {
    pub fn new(event_type: impl Into<String>) -> Self {
        Self {
            event_type: event_type.into(),
            ..Default::default()
        }
    }

    /// Record one parameter; `enabled` toggles the setting instead of being stored.
    pub fn accept(&mut self, name: &str, value: &str) {
        if name == PARAM_ENABLED {
            self.enabled = value.eq_ignore_ascii_case("true");
        } else {
            self.params.insert(name.to_string(), value.to_string());
        }
    }
}

/// Active settings keyed by event type.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ActiveSettings {
    settings: BTreeMap<String, ActiveSetting>,
}

impl ActiveSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accumulate one parameter; the first occurrence creates the setting.
    pub fn record(&mut self, event_type: &str, name: &str, value: &str) {
        self.settings
            .entry(event_type.to_string())
            .or_insert_with(|| ActiveSetting::new(event_type))
            .accept(name, value);
    }

    pub fn insert(&mut self, setting: ActiveSetting) {
        self.settings.insert(setting.event_type.clone(), setting);
    }

    /// Contribute `setting` to this merged map. Disabled settings contribute nothing.
    pub fn absorb(&mut self, setting: &ActiveSetting) {
        if !setting.enabled {
            return;
        }
        let merged = self
            .settings
            .entry(setting.event_type.clone())
            .or_insert_with(|| ActiveSetting::new(setting.event_type.clone()));
        merged.enabled = true;
        merged
            .params
            .extend(setting.params.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Merge two setting maps, keeping only enabled settings.
    pub fn merged(a: &ActiveSettings, b: &ActiveSettings) -> ActiveSettings {
        let mut result = ActiveSettings::new();
        for setting in a.settings.values().chain(b.settings.values()) {
            result.absorb(setting);
        }
        result
    }

    pub fn get(&self, event_type: &str) -> Option<&ActiveSetting> {
        self.settings.get(event_type)
    }

    /// Parameters of an enabled setting.
    pub fn params(&self, event_type: &str) -> Option<&SettingParams> {
        self.settings
            .get(event_type)
            .filter(|setting| setting.enabled)
            .map(|setting| &setting.params)
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }
}

/// A thread observed in the recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EventThread {
    pub thread_id: i64,
    pub java_id: Option<i64>,
    pub os_id: Option<i64>,
    pub name: String,
}

/// Partial (per worker) or merged aggregate state of an ingestion run.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EventWriterResult {
    pub threads: Vec<EventThread>,
    pub event_types: BTreeMap<String, EventTypeBuilder>,
    pub active_settings: ActiveSettings,
    pub types_with_stacktraces: BTreeSet<String>,
    pub latest_event: Option<TimestampMS>,
}

impl EventWriterResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Combine two results. Per-type sums, settings and the latest timestamp
    /// do not depend on the order of the operands; threads are concatenated.
    pub fn merge(mut self, other: EventWriterResult) -> EventWriterResult {
        for (code, builder) in &other.event_types {
            self.event_types
                .entry(code.clone())
                .or_insert_with(|| EventTypeBuilder::new(code.clone()))
                .merge(builder);
        }
        self.active_settings = ActiveSettings::merged(&self.active_settings, &other.active_settings);
        self.threads.extend(other.threads);
        self.types_with_stacktraces.extend(other.types_with_stacktraces);
        self.latest_event = match (self.latest_event, other.latest_event) {
            (Some(a), Some(b)) => Some(a.max(b)),
            (a, b) => a.or(b),
        };
        self
    }

    pub fn event_type(&self, code: &str) -> Option<&EventTypeBuilder> {
        self.event_types.get(code)
    }
}
