//! WAMP challenge-response authentication (`wampcra`)
//!
//! The router sends a challenge string; the client answers with
//! `base64(HMAC-SHA256(key, challenge))`. When the challenge carries a
//! `salt`, the key is first derived from the secret with PBKDF2 and the
//! base64 text of the derived key is used as the HMAC key.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::Sha256;

use crate::error::WampError;
use crate::Result;

type HmacSha256 = Hmac<Sha256>;

/// The only challenge method the console answers
pub const WAMPCRA: &str = "wampcra";

const DEFAULT_ITERATIONS: u32 = 1000;
const DEFAULT_KEYLEN: usize = 32;
/// Upper bounds on router-supplied PBKDF2 parameters
const MAX_ITERATIONS: u64 = 1_000_000;
const MAX_KEYLEN: u64 = 1024;

/// Identity presented to the router
#[derive(Clone, Serialize, Deserialize, PartialEq)]
pub struct Credentials {
    pub authid: String,
    pub secret: String,
    pub method: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("authid", &self.authid)
            .field("method", &self.method)
            .finish_non_exhaustive()
    }
}

impl Credentials {
    pub fn new(authid: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            authid: authid.into(),
            secret: secret.into(),
            method: WAMPCRA.to_string(),
        }
    }

    /// Answer a CHALLENGE message
    pub fn respond(&self, method: &str, extra: &Map<String, Value>) -> Result<String> {
        if method != WAMPCRA || self.method != WAMPCRA {
            return Err(WampError::UnsupportedAuthMethod(method.to_string()));
        }

        let challenge = extra
            .get("challenge")
            .and_then(Value::as_str)
            .ok_or_else(|| WampError::Auth("challenge is missing".to_string()))?;

        let signature = match extra.get("salt").and_then(Value::as_str) {
            Some(salt) => {
                let iterations = kdf_param(extra, "iterations", MAX_ITERATIONS)?
                    .map(|n| n as u32)
                    .unwrap_or(DEFAULT_ITERATIONS);
                let keylen = kdf_param(extra, "keylen", MAX_KEYLEN)?
                    .map(|n| n as usize)
                    .unwrap_or(DEFAULT_KEYLEN);
                let key = derive_key(&self.secret, salt, iterations, keylen);
                sign_challenge(key.as_bytes(), challenge)
            }
            None => sign_challenge(self.secret.as_bytes(), challenge),
        }?;

        tracing::debug!(authid = %self.authid, "Answered wampcra challenge");

        Ok(signature)
    }
}

/// A positive integer no larger than `max`, when present
fn kdf_param(extra: &Map<String, Value>, name: &str, max: u64) -> Result<Option<u64>> {
    let Some(value) = extra.get(name) else {
        return Ok(None);
    };

    match value.as_u64() {
        Some(n) if (1..=max).contains(&n) => Ok(Some(n)),
        _ => Err(WampError::Auth(format!(
            "challenge {} must be between 1 and {}, got {}",
            name, max, value
        ))),
    }
}

/// Sign a challenge with the given key
pub fn sign_challenge(key: &[u8], challenge: &str) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(key).map_err(|e| WampError::Auth(e.to_string()))?;
    mac.update(challenge.as_bytes());
    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// PBKDF2-HMAC-SHA256 key derivation for salted secrets, base64 encoded
pub fn derive_key(secret: &str, salt: &str, iterations: u32, keylen: usize) -> String {
    let mut derived = vec![0u8; keylen];
    pbkdf2_hmac::<Sha256>(secret.as_bytes(), salt.as_bytes(), iterations, &mut derived);
    STANDARD.encode(derived)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn extra(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_signature_verifies() {
        let challenge = r#"{"nonce":"abc","authid":"Zeus"}"#;
        let signature = sign_challenge(b"secret", challenge).unwrap();

        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(challenge.as_bytes());
        let raw = STANDARD.decode(&signature).unwrap();
        assert!(mac.verify_slice(&raw).is_ok());
        // 32 byte digest → 44 base64 chars
        assert_eq!(signature.len(), 44);
    }

    #[test]
    fn test_respond_plain_secret() {
        let creds = Credentials::new("Zeus", "secret");
        let answer = creds
            .respond(WAMPCRA, &extra(json!({"challenge": "nonce-1"})))
            .unwrap();
        assert_eq!(answer, sign_challenge(b"secret", "nonce-1").unwrap());
    }

    #[test]
    fn test_respond_salted_secret() {
        let creds = Credentials::new("Zeus", "secret");
        let answer = creds
            .respond(
                WAMPCRA,
                &extra(json!({"challenge": "nonce-1", "salt": "pepper", "iterations": 100, "keylen": 16})),
            )
            .unwrap();

        let key = derive_key("secret", "pepper", 100, 16);
        assert_eq!(answer, sign_challenge(key.as_bytes(), "nonce-1").unwrap());
        assert_ne!(answer, sign_challenge(b"secret", "nonce-1").unwrap());
    }

    #[test]
    fn test_salted_parameters_are_bounded() {
        let creds = Credentials::new("Zeus", "secret");

        for bad in [
            json!({"challenge": "n", "salt": "s", "keylen": 1u64 << 40}),
            json!({"challenge": "n", "salt": "s", "keylen": 0}),
            json!({"challenge": "n", "salt": "s", "iterations": 1u64 << 33}),
            json!({"challenge": "n", "salt": "s", "iterations": "many"}),
        ] {
            let err = creds.respond(WAMPCRA, &extra(bad)).unwrap_err();
            assert!(matches!(err, WampError::Auth(_)));
            assert!(err.is_fatal());
        }
    }

    #[test]
    fn test_unknown_method_is_fatal() {
        let creds = Credentials::new("Zeus", "secret");
        let err = creds
            .respond("ticket", &extra(json!({"challenge": "x"})))
            .unwrap_err();
        assert!(matches!(err, WampError::UnsupportedAuthMethod(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_missing_challenge() {
        let creds = Credentials::new("Zeus", "secret");
        assert!(creds.respond(WAMPCRA, &Map::new()).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let creds = Credentials::new("Zeus", "+Ew~77XrvW");
        assert!(!format!("{:?}", creds).contains("+Ew~77XrvW"));
    }
}
