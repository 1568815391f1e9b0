use serde::{Deserialize, Serialize};

pub type TimestampMS = i64;

/// Classification of a captured call-stack, stored as `stacktraces.type_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StacktraceType {
    #[default]
    Unknown,
    Application,
    Jvm,
    Native,
}

impl StacktraceType {
    pub fn id(self) -> i64 {
        match self {
            StacktraceType::Unknown => 0,
            StacktraceType::Application => 1,
            StacktraceType::Jvm => 2,
            StacktraceType::Native => 3,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(StacktraceType::Unknown),
            1 => Some(StacktraceType::Application),
            2 => Some(StacktraceType::Jvm),
            3 => Some(StacktraceType::Native),
            _ => None,
        }
    }
}

/// Tag attached to a stack trace through `stacktrace_tags`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StacktraceTag {
    ExcludeIdle,
    UnsafeAllocation,
}

impl StacktraceTag {
    pub fn id(self) -> i64 {
        match self {
            StacktraceTag::ExcludeIdle => 0,
            StacktraceTag::UnsafeAllocation => 1,
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            0 => Some(StacktraceTag::ExcludeIdle),
            1 => Some(StacktraceTag::UnsafeAllocation),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stacktrace_type_ids_round_trip() {
        for st in [
            StacktraceType::Unknown,
            StacktraceType::Application,
            StacktraceType::Jvm,
            StacktraceType::Native,
        ] {
            assert_eq!(StacktraceType::from_id(st.id()), Some(st));
        }
        assert_eq!(StacktraceType::from_id(99), None);
    }

    #[test]
    fn test_tag_serde_names() {
        let tag: StacktraceTag = serde_json::from_str("\"exclude_idle\"").unwrap();
        assert_eq!(tag, StacktraceTag::ExcludeIdle);
        assert_eq!(StacktraceTag::from_id(1), Some(StacktraceTag::UnsafeAllocation));
    }
}
