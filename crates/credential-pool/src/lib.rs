//! Credential pool for a rate-limited remote API
//!
//! Holds several credentials, each bound to its own client, and runs remote
//! operations against them round-robin. A call that hits a quota or a
//! transient outage moves on to the next credential; when a full rotation
//! fails the pool sleeps for a fixed backoff and starts over, so callers see
//! a slow success rather than a rate-limit error.
//!
//! Failure handling per attempt:
//! 1. Success → returned to the caller
//! 2. RateLimited / Transient → next credential, backoff after a full rotation
//! 3. Unauthorized → credential disabled for the life of the pool
//! 4. Fatal → surfaced immediately, no retry
//!
//! Every wait is raced against a `Cancellation` (deadline and/or signal).

pub mod cancel;
pub mod error;
pub mod operation;
pub mod pool;

pub use cancel::{CancelHandle, Cancellation};
pub use error::{Error, Result};
pub use operation::{ApiCall, ApiResponse, Callback, Operation};
pub use pool::{Credential, CredentialPool, DEFAULT_BACKOFF, MemberStatus};
