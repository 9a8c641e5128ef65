//! Test database fixtures.

use super::constants::*;
use anyhow::Result;
use ramadanflow_server::user::auth::SaltedPassword;
use ramadanflow_server::user::user_models::{Gender, NewUser, UserRole};
use ramadanflow_server::user::UserStore;

/// Seeds the standard users: one admin, one male user, one female user.
/// Created directly through the store so setup does not count against the
/// auth-route rate limiter.
pub fn create_test_users(user_store: &dyn UserStore) -> Result<()> {
    user_store.create_user(
        &NewUser {
            username: ADMIN_USER.to_string(),
            email: format!("{}@example.com", ADMIN_USER),
            role: UserRole::Admin,
            gender: Some(Gender::Male),
            age: Some(40),
            date_of_birth: None,
        },
        &SaltedPassword::new(ADMIN_PASS)?,
    )?;
    user_store.create_user(
        &NewUser {
            username: TEST_USER.to_string(),
            email: format!("{}@example.com", TEST_USER),
            role: UserRole::User,
            gender: Some(Gender::Male),
            age: Some(30),
            date_of_birth: None,
        },
        &SaltedPassword::new(TEST_PASS)?,
    )?;
    user_store.create_user(
        &NewUser {
            username: SECOND_USER.to_string(),
            email: format!("{}@example.com", SECOND_USER),
            role: UserRole::User,
            gender: Some(Gender::Female),
            age: Some(25),
            date_of_birth: None,
        },
        &SaltedPassword::new(SECOND_PASS)?,
    )?;
    Ok(())
}
