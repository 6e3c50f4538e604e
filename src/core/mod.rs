//! Execution engine core: settlement, cancellation and handler plumbing.
//!
//! Everything a variant needs to run lives here; the variants themselves are in
//! the `tasks` module.
//!
//! Internal modules:
//! - `guard`: the settlement guard (settle once, close once, sever references);
//! - `cancel`: cancellation handles and child scopes;
//! - `handlers`: the three-channel handler set.

mod cancel;
mod guard;
mod handlers;

pub use cancel::Cancel;
pub use guard::{Resolver, Teardown};
pub use handlers::Handlers;

pub(crate) use cancel::CancelScope;
pub(crate) use guard::guard;
