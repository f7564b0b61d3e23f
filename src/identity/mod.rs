//! Central identity surface: principals, the session and token services, the
//! credential-verification manager, and the role/permission table.
//! Keep the public surface thin and split implementation across sub-modules.

mod authorizer;
mod principal;
mod provider;
mod session;
mod token;

pub use authorizer::{Permission, Role};
pub use principal::{AuthMode, Principal};
pub use provider::AuthManager;
pub use session::{Session, SessionManager, SessionToken};
pub use token::{Claims, TokenService};
