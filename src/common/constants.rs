/// Storage and ingestion constants
// Table names
pub const PROFILES_TABLE: &str = "profiles";
pub const EVENTS_TABLE: &str = "events";
pub const EVENT_FIELDS_TABLE: &str = "event_fields";
pub const EVENT_TYPES_TABLE: &str = "event_types";
pub const STACKTRACES_TABLE: &str = "stacktraces";
pub const STACKTRACE_TAGS_TABLE: &str = "stacktrace_tags";
pub const THREADS_TABLE: &str = "threads";

// Batch processing
pub const DEFAULT_BATCH_SIZE: usize = 10_000;
// PostgreSQL wire protocol limit on bind parameters per statement
pub const MAX_BIND_PARAMETERS: usize = 65_535;

// Time constants
pub const MILLISECONDS_PER_SECOND: i64 = 1000;
pub const NANOS_PER_MICROSECOND: i64 = 1_000;
pub const NANOS_PER_MILLISECOND: i64 = 1_000_000;
pub const NANOS_PER_SECOND: i64 = 1_000_000_000;

// Event type codes
pub const EXECUTION_SAMPLE: &str = "jdk.ExecutionSample";
pub const WALL_CLOCK_SAMPLE: &str = "profiler.WallClockSample";
pub const MALLOC: &str = "profiler.Malloc";
pub const FREE: &str = "profiler.Free";
pub const NATIVE_LEAK: &str = "profiler.NativeLeak";
pub const OBJECT_ALLOCATION_IN_NEW_TLAB: &str = "jdk.ObjectAllocationInNewTLAB";
pub const OBJECT_ALLOCATION_OUTSIDE_TLAB: &str = "jdk.ObjectAllocationOutsideTLAB";
pub const JAVA_MONITOR_ENTER: &str = "jdk.JavaMonitorEnter";
pub const JAVA_MONITOR_WAIT: &str = "jdk.JavaMonitorWait";
pub const THREAD_PARK: &str = "jdk.ThreadPark";

// Weight entities
pub const WEIGHT_BYTES: &str = "bytes";
pub const WEIGHT_DURATION: &str = "duration";

// Event type extra parameter keys
pub const PARAM_SOURCE: &str = "source";
pub const PARAM_ENABLED: &str = "enabled";
pub const SOURCE_JDK: &str = "jdk";
pub const SOURCE_ASYNC_PROFILER: &str = "async-profiler";

// Native memory fields
pub const FIELD_ADDRESS: &str = "address";
