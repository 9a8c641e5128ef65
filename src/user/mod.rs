pub mod auth;
pub mod sqlite_user_store;
pub mod user_models;
pub mod user_store;

pub use auth::{AuthKeys, RamadanflowHasher, SaltedPassword, TokenClaims};
pub use sqlite_user_store::SqliteUserStore;
pub use user_models::{Gender, NewUser, UserAccount, UserRole};
pub use user_store::UserStore;
