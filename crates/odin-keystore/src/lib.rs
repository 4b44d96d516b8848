// SPDX-License-Identifier: MIT OR Apache-2.0
//! Ed25519 keypair storage and JWKS publication.
//!
//! Grounded on `original_source/libs/odin_core/odin/jwks.py` (`JWK`,
//! `KeyRegistry`, the hex/base64/base64url pubkey normalization rules) and
//! `apps/gateway/envelope.py`'s `_get_signing_keypair`/`_build_inline_jwks`
//! fallback chain. Key material itself (`keystore.py`) was not present in
//! the retrieved sources, so the on-disk keystore format here is an
//! implementation decision recorded in `DESIGN.md`: a JSON object mapping
//! `kid` to a base64url-nopad-encoded 32-byte Ed25519 seed, plus an
//! `active_kid` marker.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use std::collections::BTreeMap;
use std::path::Path;

use ed25519_dalek::SigningKey;
use odin_codec::{b64u_decode, b64u_encode};
use odin_error::{ErrorCode, OdinError};
use serde::{Deserialize, Serialize};

/// `ODIN_OPE_JWKS` — inline JWKS JSON.
pub const ENV_JWKS_JSON: &str = "ODIN_OPE_JWKS";
/// `ODIN_OPE_JWKS_PATH` — filesystem path to a JWKS JSON file.
pub const ENV_JWKS_PATH: &str = "ODIN_OPE_JWKS_PATH";
/// `ODIN_OPE_PUBKEY` — single Ed25519 public key (hex, base64, or base64url).
pub const ENV_SINGLE_PUBKEY: &str = "ODIN_OPE_PUBKEY";
/// `ODIN_OPE_KID` — `kid` to publish the single pubkey under.
pub const ENV_SINGLE_PUBKEY_KID: &str = "ODIN_OPE_KID";

/// `/.well-known/odin/jwks.json`, the well-known path a verifier resolves a
/// `jwks_url` envelope field against when it is relative.
pub const WELL_KNOWN_JWKS_PATH: &str = "/.well-known/odin/jwks.json";

// ---------------------------------------------------------------------------
// JWK / JwkSet
// ---------------------------------------------------------------------------

/// A single JSON Web Key, restricted to the OKP/Ed25519 shape ODIN signs
/// and verifies with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Jwk {
    /// Always `"OKP"`.
    pub kty: String,
    /// Always `"Ed25519"`.
    pub crv: String,
    /// Base64url-nopad encoded 32-byte public key.
    pub x: String,
    /// Key identifier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kid: Option<String>,
    /// Always `"EdDSA"`.
    #[serde(default = "default_alg")]
    pub alg: String,
    /// Always `"sig"` when present.
    #[serde(default = "default_use", skip_serializing_if = "Option::is_none")]
    pub r#use: Option<String>,
}

fn default_alg() -> String {
    "EdDSA".to_string()
}

fn default_use() -> Option<String> {
    Some("sig".to_string())
}

impl Jwk {
    /// Decode this key's raw 32-byte public key material.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigInvalid`] if `x` is not valid base64url or
    /// does not decode to exactly 32 bytes.
    pub fn public_key_bytes(&self) -> Result<[u8; 32], OdinError> {
        let raw = b64u_decode(&self.x).map_err(|e| {
            OdinError::new(ErrorCode::ConfigInvalid, "JWK.x is not valid base64url")
                .with_context("reason", e.to_string())
        })?;
        <[u8; 32]>::try_from(raw.as_slice()).map_err(|_| {
            OdinError::new(
                ErrorCode::ConfigInvalid,
                "JWK.x must decode to exactly 32 bytes",
            )
            .with_context("len", raw.len())
        })
    }
}

/// A JSON Web Key Set, as served at [`WELL_KNOWN_JWKS_PATH`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwkSet {
    /// The member keys.
    pub keys: Vec<Jwk>,
}

impl JwkSet {
    /// Build a lookup from `kid` to key, dropping keys with no `kid`.
    #[must_use]
    pub fn by_kid(&self) -> BTreeMap<String, &Jwk> {
        self.keys
            .iter()
            .filter_map(|k| k.kid.as_ref().map(|kid| (kid.clone(), k)))
            .collect()
    }

    /// Deterministic form: keys sorted by `(kid, x)`.
    #[must_use]
    pub fn sorted(mut self) -> Self {
        self.keys
            .sort_by(|a, b| (a.kid.clone(), a.x.clone()).cmp(&(b.kid.clone(), b.x.clone())));
        self
    }

    /// Rejects duplicate `kid`s, duplicate `x` key material, or any key
    /// that is not an `OKP`/`Ed25519` point, per spec.md §4.2's load-time
    /// validation.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigInvalid`] describing the first violation
    /// found.
    pub fn validate(&self) -> Result<(), OdinError> {
        for (i, k) in self.keys.iter().enumerate() {
            if k.kty != "OKP" || k.crv != "Ed25519" {
                return Err(OdinError::new(
                    ErrorCode::ConfigInvalid,
                    format!("JWKS keys[{i}] must be OKP/Ed25519"),
                ));
            }
            k.public_key_bytes()
                .map_err(|e| e.with_context("index", i))?;
        }
        let kids: Vec<&str> = self.keys.iter().filter_map(|k| k.kid.as_deref()).collect();
        let mut unique_kids = kids.clone();
        unique_kids.sort_unstable();
        unique_kids.dedup();
        if unique_kids.len() != kids.len() {
            return Err(OdinError::new(
                ErrorCode::ConfigInvalid,
                "duplicate 'kid' values in JWKS",
            ));
        }
        let mut xs: Vec<&str> = self.keys.iter().map(|k| k.x.as_str()).collect();
        let unique_count = {
            let mut sorted = xs.clone();
            sorted.sort_unstable();
            sorted.dedup();
            sorted.len()
        };
        if unique_count != xs.len() {
            return Err(OdinError::new(
                ErrorCode::ConfigInvalid,
                "duplicate key material (x) in JWKS",
            ));
        }
        xs.clear();
        Ok(())
    }
}

/// Normalize a caller-supplied Ed25519 public key (hex, base64, or
/// base64url) to base64url-nopad, enforcing the 32-byte Ed25519 length.
///
/// # Errors
///
/// Returns [`ErrorCode::ConfigInvalid`] if `s` cannot be decoded by any of
/// the three encodings, or does not decode to exactly 32 bytes.
pub fn normalize_pubkey_x(s: &str) -> Result<String, OdinError> {
    let bytes = maybe_hex(s).or_else(|| maybe_b64(s)).ok_or_else(|| {
        OdinError::new(
            ErrorCode::ConfigInvalid,
            "public key must be hex, base64, or base64url",
        )
    })?;
    if bytes.len() != 32 {
        return Err(OdinError::new(
            ErrorCode::ConfigInvalid,
            format!("Ed25519 public key must be 32 bytes; got {}", bytes.len()),
        ));
    }
    Ok(b64u_encode(&bytes))
}

fn maybe_hex(s: &str) -> Option<Vec<u8>> {
    let t = s.trim();
    let t = t.strip_prefix("0x").unwrap_or(t);
    if t.len() % 2 != 0 || t.is_empty() {
        return None;
    }
    if !t.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let mut out = Vec::with_capacity(t.len() / 2);
    let bytes = t.as_bytes();
    for chunk in bytes.chunks_exact(2) {
        let hi = (chunk[0] as char).to_digit(16)?;
        let lo = (chunk[1] as char).to_digit(16)?;
        out.push(((hi << 4) | lo) as u8);
    }
    Some(out)
}

fn maybe_b64(s: &str) -> Option<Vec<u8>> {
    let t = s.trim();
    if let Ok(v) = b64u_decode(t) {
        return Some(v);
    }
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(t).ok()
}

// ---------------------------------------------------------------------------
// KeyRegistry (env-driven JWKS resolution)
// ---------------------------------------------------------------------------

/// Resolves a [`JwkSet`] from environment configuration, mirroring the
/// precedence order of the original gateway:
///
/// 1. [`ENV_JWKS_JSON`] — inline JWKS JSON.
/// 2. [`ENV_JWKS_PATH`] — path to a JWKS JSON file.
/// 3. [`ENV_SINGLE_PUBKEY`] (+ [`ENV_SINGLE_PUBKEY_KID`]) — a single key.
///
/// If none are set, an empty set is returned (served as `{"keys":[]}`).
pub struct KeyRegistry;

impl KeyRegistry {
    /// Resolve the registry from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigInvalid`] if a configured source is
    /// present but malformed.
    pub fn from_env() -> Result<JwkSet, OdinError> {
        if let Ok(inline) = std::env::var(ENV_JWKS_JSON) {
            let inline = inline.trim();
            if !inline.is_empty() {
                let set: JwkSet = serde_json::from_str(inline).map_err(|e| {
                    OdinError::new(
                        ErrorCode::ConfigInvalid,
                        format!("{ENV_JWKS_JSON} is invalid: {e}"),
                    )
                })?;
                set.validate()?;
                return Ok(set);
            }
        }
        if let Ok(path) = std::env::var(ENV_JWKS_PATH) {
            let path = path.trim();
            if !path.is_empty() {
                let content = std::fs::read_to_string(path).map_err(|e| {
                    OdinError::new(
                        ErrorCode::ConfigInvalid,
                        format!("{ENV_JWKS_PATH}={path} is invalid: {e}"),
                    )
                })?;
                let set: JwkSet = serde_json::from_str(&content).map_err(|e| {
                    OdinError::new(
                        ErrorCode::ConfigInvalid,
                        format!("{ENV_JWKS_PATH}={path} is invalid: {e}"),
                    )
                })?;
                set.validate()?;
                return Ok(set);
            }
        }
        if let Ok(single) = std::env::var(ENV_SINGLE_PUBKEY) {
            let single = single.trim();
            if !single.is_empty() {
                let kid = std::env::var(ENV_SINGLE_PUBKEY_KID)
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| "env:default".to_string());
                let x = normalize_pubkey_x(single)?;
                return Ok(JwkSet {
                    keys: vec![Jwk {
                        kty: "OKP".into(),
                        crv: "Ed25519".into(),
                        x,
                        kid: Some(kid),
                        alg: default_alg(),
                        r#use: default_use(),
                    }],
                });
            }
        }
        Ok(JwkSet::default())
    }
}

// ---------------------------------------------------------------------------
// Keypair
// ---------------------------------------------------------------------------

/// An Ed25519 signing keypair bound to a `kid`.
#[derive(Clone)]
pub struct Keypair {
    /// Key identifier.
    pub kid: String,
    signing_key: SigningKey,
}

impl Keypair {
    /// Generate a fresh keypair under `kid` using the OS CSPRNG.
    #[must_use]
    pub fn generate(kid: impl Into<String>) -> Self {
        let mut csprng = rand::rngs::OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        Self {
            kid: kid.into(),
            signing_key,
        }
    }

    /// Reconstruct a keypair from a raw 32-byte seed.
    #[must_use]
    pub fn from_seed(kid: impl Into<String>, seed: &[u8; 32]) -> Self {
        Self {
            kid: kid.into(),
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// This keypair's raw 32-byte seed.
    #[must_use]
    pub fn seed(&self) -> [u8; 32] {
        self.signing_key.to_bytes()
    }

    /// Borrow the underlying Ed25519 signing key.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// This keypair's public verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> ed25519_dalek::VerifyingKey {
        self.signing_key.verifying_key()
    }

    /// Public key, base64url-nopad encoded, as used in JWK `x`.
    #[must_use]
    pub fn public_x_b64u(&self) -> String {
        b64u_encode(self.verifying_key().as_bytes())
    }

    /// This keypair's public key as a [`Jwk`].
    #[must_use]
    pub fn to_jwk(&self) -> Jwk {
        Jwk {
            kty: "OKP".into(),
            crv: "Ed25519".into(),
            x: self.public_x_b64u(),
            kid: Some(self.kid.clone()),
            alg: default_alg(),
            r#use: default_use(),
        }
    }
}

impl std::fmt::Debug for Keypair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Keypair")
            .field("kid", &self.kid)
            .field("public", &self.public_x_b64u())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Keystore (on-disk persistence)
// ---------------------------------------------------------------------------

#[derive(Serialize, Deserialize)]
struct KeystoreFile {
    active_kid: Option<String>,
    #[serde(default)]
    keys: BTreeMap<String, String>,
}

/// A small on-disk collection of Ed25519 keypairs, used as the signing
/// keystore the gateway falls back to when no env-driven key is set.
#[derive(Debug, Default)]
pub struct Keystore {
    keys: BTreeMap<String, Keypair>,
    active_kid: Option<String>,
}

impl Keystore {
    /// An empty keystore with no keys.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert (or replace) a keypair, marking it active if this is the
    /// first key added.
    pub fn insert(&mut self, keypair: Keypair) {
        if self.active_kid.is_none() {
            self.active_kid = Some(keypair.kid.clone());
        }
        self.keys.insert(keypair.kid.clone(), keypair);
    }

    /// Explicitly mark `kid` as the active signing key.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigInvalid`] if `kid` is not present.
    pub fn set_active(&mut self, kid: &str) -> Result<(), OdinError> {
        if !self.keys.contains_key(kid) {
            return Err(OdinError::new(
                ErrorCode::ConfigInvalid,
                format!("keystore has no key with kid '{kid}'"),
            ));
        }
        self.active_kid = Some(kid.to_string());
        Ok(())
    }

    /// The keypair that should be used to sign new envelopes: the active
    /// key if set, else the lexicographically first by `kid`.
    #[must_use]
    pub fn signing_keypair(&self) -> Option<&Keypair> {
        self.active_kid
            .as_deref()
            .and_then(|kid| self.keys.get(kid))
            .or_else(|| self.keys.values().next())
    }

    /// Look up a keypair by `kid`.
    #[must_use]
    pub fn get(&self, kid: &str) -> Option<&Keypair> {
        self.keys.get(kid)
    }

    /// True if the keystore has no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Number of keys held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Build an inline [`JwkSet`] covering every public key held.
    #[must_use]
    pub fn to_jwks(&self) -> JwkSet {
        JwkSet {
            keys: self.keys.values().map(Keypair::to_jwk).collect(),
        }
        .sorted()
    }

    /// Load a keystore from `path`, creating it (with one freshly
    /// generated keypair) if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigInvalid`] on I/O or parse failure.
    pub fn ensure_file(path: &Path) -> Result<Self, OdinError> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::from_json(&content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut ks = Self::new();
                ks.insert(Keypair::generate("k1"));
                ks.save(path)?;
                Ok(ks)
            }
            Err(e) => Err(OdinError::new(
                ErrorCode::ConfigInvalid,
                format!("failed to read keystore file: {e}"),
            )),
        }
    }

    /// Parse a keystore from its JSON file representation.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigInvalid`] on a malformed seed or JSON.
    pub fn from_json(content: &str) -> Result<Self, OdinError> {
        let file: KeystoreFile = serde_json::from_str(content).map_err(|e| {
            OdinError::new(
                ErrorCode::ConfigInvalid,
                format!("invalid keystore file: {e}"),
            )
        })?;
        let mut keys = BTreeMap::new();
        for (kid, seed_b64u) in file.keys {
            let raw = b64u_decode(&seed_b64u).map_err(|e| {
                OdinError::new(
                    ErrorCode::ConfigInvalid,
                    format!("keystore seed for '{kid}' is not valid base64url: {e}"),
                )
            })?;
            let seed = <[u8; 32]>::try_from(raw.as_slice()).map_err(|_| {
                OdinError::new(
                    ErrorCode::ConfigInvalid,
                    format!("keystore seed for '{kid}' must be 32 bytes"),
                )
            })?;
            keys.insert(kid.clone(), Keypair::from_seed(kid, &seed));
        }
        Ok(Self {
            keys,
            active_kid: file.active_kid,
        })
    }

    /// Serialize this keystore to its JSON file representation and write
    /// it to `path`, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorCode::ConfigInvalid`] on I/O failure.
    pub fn save(&self, path: &Path) -> Result<(), OdinError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                OdinError::new(
                    ErrorCode::ConfigInvalid,
                    format!("failed to create keystore directory: {e}"),
                )
            })?;
        }
        let file = KeystoreFile {
            active_kid: self.active_kid.clone(),
            keys: self
                .keys
                .iter()
                .map(|(kid, kp)| (kid.clone(), b64u_encode(&kp.seed())))
                .collect(),
        };
        let content = serde_json::to_string_pretty(&file).map_err(|e| {
            OdinError::new(
                ErrorCode::ConfigInvalid,
                format!("failed to serialize keystore: {e}"),
            )
        })?;
        std::fs::write(path, content).map_err(|e| {
            OdinError::new(
                ErrorCode::ConfigInvalid,
                format!("failed to write keystore file: {e}"),
            )
        })
    }
}
