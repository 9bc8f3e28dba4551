//! Authentication and authorization
//!
//! Token issuance, validation and revocation, the revocation store,
//! the ownership guard, and the login/logout endpoints.

pub mod clock;
pub mod extractor;
pub mod guard;
pub mod handlers;
pub mod password;
pub mod session_store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use extractor::{bearer_token, Authenticated};
pub use guard::{authorize, Decision, Ownable};
pub use session_store::{spawn_sweeper, MemorySessionStore, PgSessionStore, SessionStore, StoreError};
pub use token::{Claims, Identity, TokenError, TokenService};
