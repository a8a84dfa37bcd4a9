//! Time-limited signed URLs for stored objects
//!
//! A signed URL grants credential-free read access to one object until
//! its expiry. The signature is HMAC-SHA256 over `key\nexpires`,
//! base64url-encoded; verification recomputes the MAC in constant time.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// TTL applied at every signing call site: 30 minutes
pub const SIGNED_URL_TTL_SECS: i64 = 1800;

#[derive(Clone)]
pub struct UrlSigner {
    secret: Vec<u8>,
}

impl UrlSigner {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            secret: secret.as_ref().to_vec(),
        }
    }

    /// Mint a signed URL path for `key`, valid for `ttl_secs` from now.
    ///
    /// Returns `None` rather than an error when signing is impossible
    /// (unconfigured secret); callers treat a missing URL as a soft
    /// failure and still complete their request.
    pub fn sign(&self, key: &str, ttl_secs: i64) -> Option<String> {
        let expires = Utc::now().timestamp() + ttl_secs;
        let sig = self.signature(key, expires)?;
        Some(format!(
            "/files/{}?expires={}&sig={}",
            urlencoding::encode(key),
            expires,
            sig
        ))
    }

    /// Check a presented signature against `key` and `expires`.
    pub fn verify(&self, key: &str, expires: i64, sig: &str) -> bool {
        if expires < Utc::now().timestamp() {
            return false;
        }
        let Ok(presented) = URL_SAFE_NO_PAD.decode(sig) else {
            return false;
        };
        let Some(mac) = self.mac(key, expires) else {
            return false;
        };
        mac.verify_slice(&presented).is_ok()
    }

    fn signature(&self, key: &str, expires: i64) -> Option<String> {
        let mac = self.mac(key, expires)?;
        Some(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    fn mac(&self, key: &str, expires: i64) -> Option<HmacSha256> {
        if self.secret.is_empty() {
            return None;
        }
        // HMAC accepts any key length, so this only fails on an empty
        // secret, which is caught above.
        let mut mac = HmacSha256::new_from_slice(&self.secret).ok()?;
        mac.update(key.as_bytes());
        mac.update(b"\n");
        mac.update(expires.to_string().as_bytes());
        Some(mac)
    }
}

/// Split a signed URL path back into (key, expires, sig). Used by tests
/// and diagnostics; the serving endpoint gets these from the router.
pub fn parse_signed_url(url: &str) -> Option<(String, i64, String)> {
    let path = url.strip_prefix("/files/")?;
    let (encoded_key, query) = path.split_once('?')?;
    let key = urlencoding::decode(encoded_key).ok()?.into_owned();

    let mut expires = None;
    let mut sig = None;
    for pair in query.split('&') {
        match pair.split_once('=') {
            Some(("expires", v)) => expires = v.parse::<i64>().ok(),
            Some(("sig", v)) => sig = Some(v.to_string()),
            _ => {}
        }
    }
    Some((key, expires?, sig?))
}
