//! Host groups for the job scheduler
//!
//! A host group is a named, persisted list of worker-host ids. The
//! scheduler stores groups here, resolves a group into live host records
//! when it needs addresses, and asks the selector for one worker at
//! dispatch time.
//!
//! ## Architecture
//!
//! | Component | Role |
//! |-----------|------|
//! | [`db::Database`] | Pooled SQLite, one connection per operation |
//! | [`db::HostGroupStore`] | CRUD and filtered reads on `hostgroup` |
//! | [`db::PrincipalStore`] | Creator ids → display names |
//! | [`registry::HostRegistry`] | Host id → host record lookup (pluggable) |
//! | [`db::SqlHostRegistry`] | Registry backed by the `host` table |
//! | [`resolver::HostGroupResolver`] | Group → member host records |
//! | [`selector::WorkerSelector`] | Uniform random pick of one member |
//!
//! ## Example
//!
//! ```no_run
//! # async fn demo() -> Result<(), hostgroup::HostGroupError> {
//! use hostgroup::{Config, Database, HostGroupStore, WorkerSelector};
//!
//! let db = Database::open(&Config::with_database("/tmp/hostgroup.db"))?;
//! let store = HostGroupStore::new(db);
//!
//! let id = store
//!     .create("web", "frontend pool", "admin", &["h1".into(), "h2".into()])
//!     .await?;
//! let group = store.get_by_id(&id).await?;
//! let worker = WorkerSelector::default().pick_host(&group)?;
//! # let _ = worker;
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod ids;
pub mod model;
pub mod registry;
pub mod resolver;
pub mod selector;

// Re-exports
pub use clock::{Clock, SystemClock};
pub use config::Config;
pub use db::{Database, HostGroupStore, PrincipalStore, SqlHostRegistry};
pub use error::{BoxError, HostGroupError, StoreError};
pub use ids::{IdGenerator, UuidGenerator};
pub use model::{Host, HostGroup, HostGroupPage, Principal};
pub use registry::HostRegistry;
pub use resolver::HostGroupResolver;
pub use selector::{RandomSource, SeededRandom, ThreadRandom, WorkerSelector};
