//! Loading of the deployer's signing keys from the environment

use std::{env, fmt};

use crate::errors::ConfigError;

/// The name of the environment variable holding the deployer's private key
pub const PRIVATE_KEY_ENV_VAR: &str = "PRIVATE_KEY";

/// The private keys available for signing transactions.
///
/// Holds exactly one key; key material is never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SigningKeys(Vec<String>);

impl SigningKeys {
    /// The keys, in the order they were supplied
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// The key used to sign deployment transactions
    pub fn deployer(&self) -> &str {
        // Construction guarantees exactly one entry
        &self.0[0]
    }

    /// The number of keys
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether there are no keys
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SigningKeys {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SigningKeys([{} redacted])", self.0.len())
    }
}

/// Read the signing keys from the process environment, loading a `.env`
/// file from the working directory first if one exists
pub fn load_signing_keys() -> Result<SigningKeys, ConfigError> {
    dotenv::dotenv().ok();
    signing_keys_from(|var| env::var(var).ok())
}

/// Build the signing key list using the given variable lookup
pub fn signing_keys_from<F>(lookup: F) -> Result<SigningKeys, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let key = lookup(PRIVATE_KEY_ENV_VAR)
        .map(|key| key.trim().to_string())
        .filter(|key| !key.is_empty())
        .ok_or(ConfigError::MissingPrivateKey(PRIVATE_KEY_ENV_VAR))?;

    Ok(SigningKeys(vec![key]))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A well-known development private key
    const TEST_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn test_single_key_from_env_var() {
        let keys = signing_keys_from(|var| {
            (var == PRIVATE_KEY_ENV_VAR).then(|| TEST_KEY.to_string())
        })
        .unwrap();

        assert_eq!(keys.len(), 1);
        assert_eq!(keys.deployer(), TEST_KEY);
    }

    #[test]
    fn test_key_is_trimmed() {
        let keys = signing_keys_from(|_| Some(format!("  {}\n", TEST_KEY))).unwrap();
        assert_eq!(keys.as_slice(), &[TEST_KEY.to_string()]);
    }

    #[test]
    fn test_missing_key() {
        assert_eq!(
            signing_keys_from(|_| None),
            Err(ConfigError::MissingPrivateKey(PRIVATE_KEY_ENV_VAR))
        );
        assert_eq!(
            signing_keys_from(|_| Some("   ".to_string())),
            Err(ConfigError::MissingPrivateKey(PRIVATE_KEY_ENV_VAR))
        );
    }

    #[test]
    fn test_debug_redacts_keys() {
        let keys = signing_keys_from(|_| Some(TEST_KEY.to_string())).unwrap();
        let debug = format!("{:?}", keys);
        assert!(!debug.contains(&TEST_KEY[2..]));
    }
}
