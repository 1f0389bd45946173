//! Auth-flow state reconciliation.
//!
//! Out-of-band auth flows (email verification, password reset) finish on a
//! redirect, and their result has to be picked up again by the running app.
//! [`AuthStateStore`] gives one view over every place that result may sit.

pub mod query;
pub mod state;
pub mod store;

pub use query::UrlQuery;
pub use state::{AuthFlowState, AuthStatus, ExpiresAt, Source};
pub use store::{AuthStateError, AuthStateStore};
