//! Sessions and principals for the proctor grading platform.
//!
//! This crate provides:
//! - Principals and their global roles (`Principal`, `Role`)
//! - Session tokens and lifecycle (`Session`, `SessionToken`, `SessionState`)
//! - The `SessionManager`, which turns a token into a principal
//! - Storage traits (`SessionStore`, `PrincipalDirectory`) and an
//!   in-memory implementation
//!
//! # Example
//!
//! ```
//! use chrono::{Duration, Utc};
//! use proctor_core::UserId;
//! use proctor_platform_access::{ManualClock, MemoryStore, Principal, Role, SessionManager};
//!
//! # tokio_test();
//! # fn tokio_test() {
//! # let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! # rt.block_on(async {
//! let clock = ManualClock::new(Utc::now());
//! let manager = SessionManager::new(clock.clone(), Duration::hours(1));
//! let mut store = MemoryStore::new();
//! store.put_principal(Principal::new(UserId::new(7), Role::Student, "alice"));
//!
//! let session = manager.create(&mut store, UserId::new(7)).await.unwrap();
//! let principal = manager.validate(&mut store, session.token()).await.unwrap();
//! assert_eq!(principal.id(), UserId::new(7));
//!
//! clock.advance(Duration::hours(2));
//! assert!(manager.validate(&mut store, session.token()).await.is_err());
//! # });
//! # }
//! ```

pub mod clock;
pub mod error;
pub mod manager;
pub mod memory;
pub mod principal;
pub mod role;
pub mod session;
pub mod store;

// Re-export main types at crate root
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::AuthenticationError;
pub use manager::SessionManager;
pub use memory::MemoryStore;
pub use principal::Principal;
pub use role::{Role, UnknownRole};
pub use session::{Session, SessionState, SessionToken};
pub use store::{PrincipalDirectory, SessionStore};
