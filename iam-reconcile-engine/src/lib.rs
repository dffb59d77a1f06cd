//! Idempotent reconciliation for cloud identity and storage resources.
//!
//! Each `ensure_*` operation fetches actual state from the provider, compares
//! it against desired state using canonical policy digests, and issues the
//! minimal mutating calls to converge. Nothing is cached between calls, so
//! repeated invocations and concurrent callers are safe: a lost create race
//! is just the "already exists, now compare" branch.
//!
//! ```no_run
//! use iam_reconcile_engine::provider::memory::MemoryProvider;
//! use iam_reconcile_engine::Reconciler;
//! use iam_reconcile_policy::service_trust_policy;
//!
//! # async fn demo() -> iam_reconcile_engine::ReconcileResult<()> {
//! let reconciler = Reconciler::new(MemoryProvider::new());
//! let trust = service_trust_policy("lambda.amazonaws.com");
//! let first = reconciler.ensure_role("svc-exec", &trust, Some("exec role")).await?;
//! assert!(first.was_created());
//! let second = reconciler.ensure_role("svc-exec", &trust, Some("exec role")).await?;
//! assert!(second.is_noop());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod naming;
pub mod provider;
pub mod reconcile;
pub mod types;
pub mod waiter;

pub use error::{ProviderError, ProviderResult, ReconcileError, ReconcileResult};
pub use provider::CloudProvider;
pub use reconcile::{AccessStackOutcome, AccessStackSpec, Reconciler, ReconcilerConfig};
pub use types::{
    BucketProbe, ManagedPolicyMeta, ManagedPolicyVersion, ReconciliationResult, ResourceSpec,
    Role, MAX_POLICY_VERSIONS,
};
pub use waiter::{PropagationKind, PropagationWaiter};
