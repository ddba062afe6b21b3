/// Maximum number of records mutated per batched write.
///
/// Mirrors the per-batch record cap of the backing store; callers that need
/// to touch more rows (e.g. clearing partner flags after an unpair) must
/// chunk their updates.
pub const BATCH_WRITE_LIMIT: usize = 500;

/// Maximum times a store transaction is retried after a write conflict
/// before the whole operation fails.
pub const MAX_TX_RETRIES: u32 = 5;

/// Default rate-limit window length in seconds.
pub const DEFAULT_RATE_WINDOW_SECS: u64 = 60;

/// Default maximum request-creation calls per identity per window.
pub const DEFAULT_RATE_MAX_REQUESTS: u32 = 20;

/// Default HTTP API port.
pub const DEFAULT_HTTP_PORT: u16 = 8080;
