//! Authentication core: login pipeline, brute-force protection, and the
//! pluggable token strategy.

pub mod config;
pub mod context;
pub mod error;
pub mod exchange;
pub mod guard;
pub mod login;
pub mod password;
pub mod provider;
pub mod user;

pub use config::LoginPolicy;
pub use context::AuthContext;
pub use error::AuthError;
pub use exchange::ExchangeCodes;
pub use guard::BruteForceGuard;
pub use login::{LoginOutcome, LoginService};
pub use provider::AuthProvider;
pub use user::LoginUser;
