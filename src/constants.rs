//! Global constants for the collector harness.
//!
//! This module centralizes the contract surface shared between the
//! orchestrator and the normalization pipeline: template markers, remote
//! path conventions, and the record schema.

// Spec template markers
/// Sentinel phrase on the line that opens the artifact section of a template.
pub const SPEC_START_MARKER: &str = "The list of artifacts and their args.";

/// Sentinel phrase on the line that closes the artifact section.
pub const SPEC_END_MARKER: &str = "Can be ZIP";

/// Artifact appended to every generated spec so bundles always carry
/// host-identity data.
pub const CLIENT_INFO_ARTIFACT: &str = "Generic.Client.Info";

// Result file conventions
/// Results file holding host-identity fields; never enriched or validated.
pub const BASIC_INFO_FILENAME: &str = "Generic.Client.Info.BasicInformation.json";

/// Escaped-slash token used by the collector when flattening artifact paths
/// into result filenames.
pub const ESCAPED_SLASH: &str = "%2F";

/// Source type assigned when a filename yields no usable segment.
pub const UNKNOWN_SOURCE_TYPE: &str = "Unknown";

/// Keys every enriched record must carry.
pub const REQUIRED_RECORD_KEYS: &[&str] = &[
    "source_type",
    "Hostname",
    "OS",
    "Platform",
    "PlatformVersion",
    "Fqdn",
    "MACAddresses",
];

/// Host-identity keys extracted from the basic-information file.
pub const SYSTEM_INFO_KEYS: &[&str] = &[
    "Hostname",
    "OS",
    "Platform",
    "PlatformVersion",
    "Fqdn",
    "MACAddresses",
];

// Timestamp canonicalization
/// Keys always checked for ISO-8601 values.
pub const KNOWN_TIMESTAMP_KEYS: &[&str] = &[
    "visit_time",
    "KeyLastWriteTimestamp",
    "LastUpdated",
    "KeyMTime",
];

/// Substrings (case-insensitive) that mark a key as timestamp-bearing.
pub const TIME_INDICATOR_WORDS: &[&str] = &[
    "time", "date", "timestamp", "modified", "created", "accessed", "updated",
    "last", "mtime", "ctime", "atime",
];

/// Exact format accepted for conversion: `YYYY-MM-DDTHH:MM:SSZ` (UTC).
pub const ISO_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Suffix of the integer field added alongside a converted timestamp.
pub const EPOCH_SUFFIX: &str = "_epoch";

// Remote path conventions
/// Remote scratch directory for pushed collectors, logs and bundles.
pub const REMOTE_TEMP_DIR: &str = "C:\\Windows\\Temp";

/// Glob matching collection bundles in the remote temp directory.
pub const REMOTE_BUNDLE_PATTERN: &str = "C:\\Windows\\Temp\\Collection-*.zip";

/// Patterns removed by best-effort remote cleanup.
pub const REMOTE_CLEANUP_PATTERNS: &[&str] = &[
    "C:\\Windows\\Temp\\Collector_*.exe",
    "C:\\Windows\\Temp\\Collector_*.log",
    "C:\\Windows\\Temp\\Collection-*.zip",
];

// Execution verification
/// Token the remote wrapper prints only when the collector exited zero.
pub const EXEC_SUCCESS_TOKEN: &str = "Success";

/// Token the collector itself writes on clean shutdown; checked in the
/// pulled log.
pub const EXEC_EXITING_TOKEN: &str = "Exiting";

/// Fixed pause (seconds) between execution and the single log-existence poll.
pub const POST_EXEC_PAUSE_SECS: u64 = 2;

// Hashing
/// Buffer size for streamed SHA-256 (1MB).
pub const HASH_BUFFER_SIZE: usize = 1024 * 1024;
