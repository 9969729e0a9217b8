//! Trait definitions (hexagonal ports). Depend only on domain.
//!
//! The load engine talks to a database exclusively through the
//! [`Backend`](outbound::backend::Backend) port. Concrete databases live in
//! `adapter::outbound` and are chosen at the edge (CLI or embedding code).
//!
//! ```text
//!   ┌──────────────────────────────────────┐
//!   │  Orchestrator / Worker / Pool        │
//!   └──────────────────┬───────────────────┘
//!                      │ Backend
//!          ┌───────────┴───────────┐
//!          ▼                       ▼
//!     ┌─────────┐            ┌───────────┐
//!     │ SQLite  │            │  Memory   │
//!     │ adapter │            │ (testkit) │
//!     └─────────┘            └───────────┘
//! ```

pub mod outbound;

pub use outbound::backend::Backend;
