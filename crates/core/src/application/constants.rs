// Tuning defaults (no magic values in the pool, executor or lifecycle code)
use std::time::Duration;

/// Idle age after which a pooled channel is recreated (5 minutes)
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_secs(300);

/// Attempts per logical operation, first try included
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Fixed pause between attempts (2s)
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Wait after a start/stop command before verifying its effect (1s)
pub const DEFAULT_SETTLE_INTERVAL: Duration = Duration::from_secs(1);

/// How often the sweeper looks for expired channels (1 minute)
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(60);
