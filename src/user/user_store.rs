use super::auth::SaltedPassword;
use super::user_models::{NewUser, UserAccount, UserRole};
use anyhow::Result;

pub trait UserStore: Send + Sync {
    /// Creates a new user with the given credentials and returns the user id.
    /// Returns Err if the username or email is already taken.
    fn create_user(&self, new_user: &NewUser, password: &SaltedPassword) -> Result<i64>;

    /// Returns the user with the given username (case-insensitive).
    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, username: &str) -> Result<Option<UserAccount>>;

    /// Returns the user matching the identifier as either username or email.
    /// Returns Ok(None) if no user matches.
    fn get_user_by_identifier(&self, identifier: &str) -> Result<Option<UserAccount>>;

    /// Returns all users in creation order.
    fn get_all_users(&self) -> Result<Vec<UserAccount>>;

    /// Returns the total number of users.
    fn count_users(&self) -> Result<i64>;

    /// Returns the stored password for the given username.
    /// Returns Ok(None) if the user does not exist.
    fn get_password(&self, username: &str) -> Result<Option<SaltedPassword>>;

    /// Replaces the stored password. Returns false if the user does not exist.
    fn update_password(&self, username: &str, password: &SaltedPassword) -> Result<bool>;

    /// Changes the user's role. Returns false if the user does not exist.
    fn set_role(&self, username: &str, role: UserRole) -> Result<bool>;

    /// Sets the score multiplier. Range validation happens at the admin
    /// write boundary, not here. Returns false if the user does not exist.
    fn set_score_multiplier(&self, username: &str, multiplier: f64) -> Result<bool>;

    /// Freezes or unfreezes the user. Returns false if the user does not exist.
    fn set_frozen(&self, username: &str, frozen: bool) -> Result<bool>;

    /// Returns the frozen flag, or Ok(None) if the user does not exist.
    fn is_frozen(&self, username: &str) -> Result<Option<bool>>;

    /// Deletes the user row. Tracker data lives in a separate store and is
    /// cleaned up by the caller. Returns false if the user does not exist.
    fn delete_user(&self, username: &str) -> Result<bool>;
}
