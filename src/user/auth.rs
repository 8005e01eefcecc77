//! Password hashing and session tokens.

use anyhow::{bail, Result};
use rand::Rng;
use rand_distr::Alphanumeric;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::SystemTime;

#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Debug)]
pub struct AuthTokenValue(pub String);

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct AuthToken {
    pub user_id: usize,
    pub created: SystemTime,
    pub last_used: Option<SystemTime>,
    pub value: AuthTokenValue,
}

impl AuthTokenValue {
    pub fn generate() -> AuthTokenValue {
        let rng = rand::rng();
        let random_string: String = rng
            .sample_iter(&Alphanumeric)
            .take(64)
            .map(char::from)
            .collect();
        AuthTokenValue(random_string)
    }
}

mod argon2_hashing {
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
        let salt = SaltString::from_b64(b64_salt.as_ref()).map_err(|err| anyhow!("{}", err))?;
        let hash_string = Argon2::default()
            .hash_password(plain, &salt)
            .map_err(|err| anyhow!("{}", err))?
            .to_string();
        Ok(hash_string)
    }

    pub fn verify<T: AsRef<str>>(plain_pw: &[u8], target_hash: T) -> Result<bool> {
        let password_hash =
            PasswordHash::new(target_hash.as_ref()).map_err(|err| anyhow!("{}", err))?;
        Ok(Argon2::default()
            .verify_password(plain_pw, &password_hash)
            .is_ok())
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, PartialEq, Eq)]
pub enum CredentialsHasher {
    Argon2,
    /// Test-only hasher, DO NOT use in production!
    /// Stores the hex encoded password behind a marker prefix.
    #[cfg(feature = "test-fast-hasher")]
    TestFast,
}

impl Default for CredentialsHasher {
    #[cfg(not(feature = "test-fast-hasher"))]
    fn default() -> Self {
        CredentialsHasher::Argon2
    }

    #[cfg(feature = "test-fast-hasher")]
    fn default() -> Self {
        CredentialsHasher::TestFast
    }
}

impl FromStr for CredentialsHasher {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "argon2" => Ok(CredentialsHasher::Argon2),
            #[cfg(feature = "test-fast-hasher")]
            "test_fast" => Ok(CredentialsHasher::TestFast),
            _ => bail!("Unknown hasher {}", s),
        }
    }
}

impl std::fmt::Display for CredentialsHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialsHasher::Argon2 => write!(f, "argon2"),
            #[cfg(feature = "test-fast-hasher")]
            CredentialsHasher::TestFast => write!(f, "test_fast"),
        }
    }
}

impl CredentialsHasher {
    pub fn generate_b64_salt(&self) -> String {
        match self {
            CredentialsHasher::Argon2 => argon2_hashing::generate_b64_salt(),
            #[cfg(feature = "test-fast-hasher")]
            CredentialsHasher::TestFast => "test_salt".to_string(),
        }
    }

    pub fn hash<T: AsRef<str>>(&self, plain: &[u8], b64_salt: T) -> Result<String> {
        match self {
            CredentialsHasher::Argon2 => argon2_hashing::hash(plain, b64_salt),
            #[cfg(feature = "test-fast-hasher")]
            CredentialsHasher::TestFast => {
                let hex: String = plain.iter().map(|b| format!("{:02x}", b)).collect();
                Ok(format!("$testfast${}${}", b64_salt.as_ref(), hex))
            }
        }
    }

    pub fn verify<T: AsRef<str>>(&self, plain_pw: T, target_hash: T) -> Result<bool> {
        match self {
            CredentialsHasher::Argon2 => {
                argon2_hashing::verify(plain_pw.as_ref().as_bytes(), target_hash)
            }
            #[cfg(feature = "test-fast-hasher")]
            CredentialsHasher::TestFast => {
                let hash = target_hash.as_ref();
                let Some(hex) = hash
                    .strip_prefix("$testfast$")
                    .and_then(|s| s.split('$').nth(1))
                else {
                    return Ok(false);
                };
                let decoded: Vec<u8> = (0..hex.len())
                    .step_by(2)
                    .filter_map(|i| hex.get(i..i + 2))
                    .filter_map(|pair| u8::from_str_radix(pair, 16).ok())
                    .collect();
                Ok(decoded == plain_pw.as_ref().as_bytes())
            }
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug)]
pub struct PasswordCredentials {
    pub user_id: usize,
    pub salt: String,
    pub hash: String,
    pub hasher: CredentialsHasher,

    pub created: SystemTime,
    pub last_tried: Option<SystemTime>,
    pub last_used: Option<SystemTime>,
}

impl PasswordCredentials {
    pub fn create(user_id: usize, password: &str) -> Result<Self> {
        let hasher = CredentialsHasher::default();
        let salt = hasher.generate_b64_salt();
        let hash = hasher.hash(password.as_bytes(), &salt)?;
        Ok(PasswordCredentials {
            user_id,
            salt,
            hash,
            hasher,
            created: SystemTime::now(),
            last_tried: None,
            last_used: None,
        })
    }

    pub fn verify(&self, password: &str) -> Result<bool> {
        self.hasher.verify(password, self.hash.as_str())
    }
}
