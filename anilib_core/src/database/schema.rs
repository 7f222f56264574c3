//! Database schema definitions

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Initial schema: version tracking and the command table
pub const SCHEMA_V1: &str = r#"
-- Schema version tracking
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

-- Pending commands; seq gives FIFO order within a priority
CREATE TABLE IF NOT EXISTS command_requests (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    command_id TEXT NOT NULL,
    command_type TEXT NOT NULL,
    priority INTEGER NOT NULL,
    queue TEXT NOT NULL,
    payload TEXT NOT NULL,
    payload_version INTEGER NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    UNIQUE(command_id)
);
"#;

/// Index for the processors' next-command query
pub const SCHEMA_V2: &str = r#"
CREATE INDEX IF NOT EXISTS idx_command_requests_order
    ON command_requests(queue, priority, seq);
"#;
