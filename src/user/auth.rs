//! Password hashing and JWT session tokens.

use super::user_models::UserAccount;
use anyhow::{anyhow, bail, Context, Result};
use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::str::FromStr;
use tracing::warn;

/// Issued bearer tokens stay valid this long; there is no server-side
/// session table, so revocation happens only by expiry or secret rotation.
pub const TOKEN_TTL_DAYS: i64 = 30;

mod ramadanflow_argon2 {
    use anyhow::{anyhow, Result};
    use argon2::{
        password_hash::{
            rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        },
        Argon2,
    };

    pub fn generate_b64_salt() -> String {
        SaltString::generate(&mut OsRng).to_string()
    }

    pub fn hash<T: AsRef<str>>(plain: &[u8], b64_salt: T) -> Result<String> {
        let argon2 = Argon2::default();
        let salt = SaltString::from_b64(b64_salt.as_ref()).map_err(|err| anyhow!("{}", err))?;
        let hash_string = argon2
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify<T: AsRef<str>>(plain_pw: &[u8], target_hash: T) -> Result<bool> {
        let argon2 = Argon2::default();
        let password_hash =
            PasswordHash::new(target_hash.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(argon2.verify_password(plain_pw, &password_hash).is_ok())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub enum RamadanflowHasher {
    Argon2,
    /// Fast test-only hasher - DO NOT use in production!
    /// Stores the password hex-encoded behind a marker prefix.
    #[cfg(feature = "test-fast-hasher")]
    TestFast,
}

impl RamadanflowHasher {
    /// The hasher new credentials are written with.
    pub fn current() -> Self {
        #[cfg(feature = "test-fast-hasher")]
        return RamadanflowHasher::TestFast;
        #[cfg(not(feature = "test-fast-hasher"))]
        RamadanflowHasher::Argon2
    }

    pub fn generate_b64_salt(&self) -> String {
        match self {
            RamadanflowHasher::Argon2 => ramadanflow_argon2::generate_b64_salt(),
            #[cfg(feature = "test-fast-hasher")]
            RamadanflowHasher::TestFast => "test_salt".to_string(),
        }
    }

    pub fn hash<T: AsRef<str>>(&self, plain: &[u8], b64_salt: T) -> Result<String> {
        match self {
            RamadanflowHasher::Argon2 => ramadanflow_argon2::hash(plain, b64_salt),
            #[cfg(feature = "test-fast-hasher")]
            RamadanflowHasher::TestFast => {
                let hex: String = plain.iter().map(|b| format!("{:02x}", b)).collect();
                Ok(format!("$testfast${}${}", b64_salt.as_ref(), hex))
            }
        }
    }

    pub fn verify<T: AsRef<str>>(&self, plain_pw: T, target_hash: T) -> Result<bool> {
        match self {
            RamadanflowHasher::Argon2 => {
                ramadanflow_argon2::verify(plain_pw.as_ref().as_bytes(), target_hash)
            }
            #[cfg(feature = "test-fast-hasher")]
            RamadanflowHasher::TestFast => {
                let expected_hex: String = plain_pw
                    .as_ref()
                    .bytes()
                    .map(|b| format!("{:02x}", b))
                    .collect();
                let stored_hex = target_hash
                    .as_ref()
                    .strip_prefix("$testfast$")
                    .and_then(|s| s.split('$').nth(1));
                Ok(stored_hex == Some(expected_hex.as_str()))
            }
        }
    }
}

impl FromStr for RamadanflowHasher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(RamadanflowHasher::Argon2),
            #[cfg(feature = "test-fast-hasher")]
            "test_fast" => Ok(RamadanflowHasher::TestFast),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl std::fmt::Display for RamadanflowHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RamadanflowHasher::Argon2 => write!(f, "argon2"),
            #[cfg(feature = "test-fast-hasher")]
            RamadanflowHasher::TestFast => write!(f, "test_fast"),
        }
    }
}

/// A stored password: salt, hash and the hasher that produced it, so old
/// rows keep verifying after the default hasher changes.
#[derive(Clone, Debug)]
pub struct SaltedPassword {
    pub salt: String,
    pub hash: String,
    pub hasher: RamadanflowHasher,
}

impl SaltedPassword {
    pub fn new(plain: &str) -> Result<Self> {
        let hasher = RamadanflowHasher::current();
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(plain.as_bytes(), &salt)?;
        Ok(SaltedPassword { salt, hash, hasher })
    }

    pub fn verify(&self, plain: &str) -> Result<bool> {
        self.hasher.verify(plain, self.hash.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    /// User id.
    pub sub: i64,
    pub username: String,
    pub role: String,
    pub iat: i64,
    pub exp: i64,
}

/// JWT signing/verification keys derived from the server secret.
#[derive(Clone)]
pub struct AuthKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl AuthKeys {
    pub fn new(secret: &str) -> Self {
        AuthKeys {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    pub fn issue_token(&self, user: &UserAccount) -> Result<String> {
        let now = Utc::now();
        let claims = TokenClaims {
            sub: user.id,
            username: user.username.clone(),
            role: user.role.as_str().to_string(),
            iat: now.timestamp(),
            exp: (now + chrono::Duration::days(TOKEN_TTL_DAYS)).timestamp(),
        };
        jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)
            .map_err(|err| anyhow!("Failed to sign token: {}", err))
    }

    pub fn verify_token(&self, token: &str) -> Result<TokenClaims> {
        let data = jsonwebtoken::decode::<TokenClaims>(token, &self.decoding, &Validation::default())
            .map_err(|err| anyhow!("Invalid token: {}", err))?;
        Ok(data.claims)
    }
}

/// Reads the JWT secret from `path`, generating and persisting a fresh one
/// on first boot.
pub fn load_or_generate_secret(path: &Path) -> Result<String> {
    if path.exists() {
        let secret = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read secret file {:?}", path))?;
        let secret = secret.trim().to_string();
        if secret.is_empty() {
            bail!("Secret file {:?} is empty", path);
        }
        return Ok(secret);
    }

    let secret: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(64)
        .map(char::from)
        .collect();
    std::fs::write(path, &secret)
        .with_context(|| format!("Failed to write secret file {:?}", path))?;
    warn!("Generated new JWT secret at {:?}", path);
    Ok(secret)
}
