//! # fleetgate-authz: Hierarchical authorization
//!
//! Decides whether an authenticated user may act on the records owned by a
//! party (typically a driver), given a three-tier organizational hierarchy:
//! master organizations delegate to managed organizations, which contain
//! locations.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Handler / sidecar (PolicyEnforcer)          │
//! └─────────────────┬───────────────────────────┘
//!                   │ (actor, target, level)
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  RequestScope (per-request decision cache)   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  DecisionEngine                              │
//! │  (steps gated by ActionPolicy per level)     │
//! │  ├─ 1. direct owner                          │
//! │  ├─ 2. target's active roles                 │
//! │  ├─ 3. master delegation                     │──► AuditEmitter
//! │  ├─ 4. organization management               │
//! │  └─ 5. location management                   │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  RoleHierarchyResolver ──► GraphAdapter      │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Access paths
//!
//! | Path                | Granted when                                          |
//! |---------------------|-------------------------------------------------------|
//! | `direct_owner`      | the actor's account created the target party          |
//! | `master_delegation` | the actor's home org holds `master` over a target org |
//! | `org_manager`       | the actor manages, owns or consults for a target org  |
//! | `location_manager`  | the actor manages one of the target's locations       |
//!
//! Delegation is exactly one hop: a master-of-a-master grants nothing.
//!
//! Only the paths the [`ActionPolicy`] accepts for the requested level are
//! checked. A bare location manager reaches a driver for `read` but not for
//! `delete` under the default policy.
//!
//! ## Failure semantics
//!
//! A store failure or timeout yields [`Indeterminate`], which is neither an
//! allow nor a deny. Enforcement points map it to 503.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use fleetgate_authz::{AccessPath, DecisionEngine};
//! use fleetgate_graph::InMemoryGraph;
//! use fleetgate_types::{Party, PartyId, PartyKind, UserId};
//!
//! # let runtime = tokio::runtime::Builder::new_current_thread().enable_time().build()?;
//! # runtime.block_on(async {
//! let graph = InMemoryGraph::new();
//! let alice = UserId::new("alice")?;
//! let driver = PartyId::new("driver-1")?;
//! graph.insert_party(Party::new(driver.clone(), PartyKind::Person).owned_by(alice.clone()));
//!
//! let engine = DecisionEngine::new(Arc::new(graph));
//! let decision = engine.authorize(&alice, &driver).await?;
//!
//! assert!(decision.allowed());
//! assert_eq!(decision.path, AccessPath::DirectOwner);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! # })?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod audit;
pub mod cache;
pub mod clock;
pub mod decision;
pub mod enforcement;
pub mod engine;
pub mod policy;
pub mod resolver;

pub use audit::{
    AuditEmitter, AuditError, AuditOutcome, AuditQuery, AuditRecord, AuditSink,
    ChannelAuditSink, MemoryAuditSink, TracingAuditSink,
};
pub use cache::{DecisionCache, RequestScope};
pub use clock::{Clock, FixedClock, SystemClock};
pub use decision::{AccessDecision, AuthorizationResult, DecisionOutcome, Indeterminate};
pub use enforcement::{
    AuthorizeRequest, AuthorizeResponse, EnforcementError, PolicyEnforcer, SidecarResponse,
    enforce, respond,
};
pub use engine::{DecisionEngine, EngineBuilder};
pub use fleetgate_types::{AccessPath, ActionLevel};
pub use policy::ActionPolicy;
pub use resolver::{DEFAULT_STORE_TIMEOUT, Ownership, RoleHierarchyResolver};
