//! Integrity service for tamper-proof form state (resource pointers, deletion requests)
//!
//! Token format: `payload || hex(HMAC-SHA256(secret || scope_prefix, payload))`.
//! The scope prefix is part of the key, so a token minted for one purpose
//! never verifies under another.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{AppError, IntegrityError};
use crate::models::{DeletionRequest, ResourcePointer};

type HmacSha256 = Hmac<Sha256>;

/// Length of the hex-encoded signature appended to every token.
pub const SIGNATURE_HEX_LEN: usize = 64;

/// Purpose a signature is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashScope {
    /// Pointers to previously stored files kept in hidden form fields
    ResourcePointer,
    /// Requests to delete one previously stored file
    DeleteFile,
}

impl HashScope {
    pub fn prefix(&self) -> &'static str {
        match self {
            HashScope::ResourcePointer => "formvault/resource-pointer/",
            HashScope::DeleteFile => "formvault/delete-file/",
        }
    }
}

/// Signs and verifies scoped tokens with a process-wide secret.
#[derive(Clone)]
pub struct IntegrityService {
    secret: Vec<u8>,
}

impl std::fmt::Debug for IntegrityService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntegrityService").finish_non_exhaustive()
    }
}

impl IntegrityService {
    /// Create a service from raw secret bytes (e.g. for tests; avoids env mutation).
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Result<Self, AppError> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(AppError::Configuration(
                "Integrity secret must not be empty".to_string(),
            ));
        }
        Ok(Self {
            secret: secret.to_vec(),
        })
    }

    fn mac(&self, additional_secret: &str) -> HmacSha256 {
        let mut key = Vec::with_capacity(self.secret.len() + additional_secret.len());
        key.extend_from_slice(&self.secret);
        key.extend_from_slice(additional_secret.as_bytes());
        HmacSha256::new_from_slice(&key).expect("HMAC accepts any key size")
    }

    /// Keyed hash of `data`, hex encoded.
    pub fn hmac(&self, data: &str, additional_secret: &str) -> String {
        let mut mac = self.mac(additional_secret);
        mac.update(data.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Append a scoped signature to `payload`.
    pub fn append_hmac(&self, payload: &str, scope: HashScope) -> String {
        format!("{}{}", payload, self.hmac(payload, scope.prefix()))
    }

    /// Verify a token minted by [`append_hmac`](Self::append_hmac) and return its payload.
    pub fn validate_and_strip_hmac(
        &self,
        token: &str,
        scope: HashScope,
    ) -> Result<String, IntegrityError> {
        let split = token
            .len()
            .checked_sub(SIGNATURE_HEX_LEN)
            .filter(|&at| token.is_char_boundary(at))
            .ok_or_else(|| {
                IntegrityError::Malformed("token is shorter than its signature".to_string())
            })?;
        let (payload, signature) = token.split_at(split);
        let signature = hex::decode(signature)
            .map_err(|e| IntegrityError::Malformed(format!("signature is not hex: {}", e)))?;

        let mut mac = self.mac(scope.prefix());
        mac.update(payload.as_bytes());
        mac.verify_slice(&signature)
            .map_err(|_| IntegrityError::SignatureMismatch)?;

        Ok(payload.to_string())
    }

    pub fn sign_pointer(&self, pointer: ResourcePointer) -> String {
        self.append_hmac(&pointer.to_string(), HashScope::ResourcePointer)
    }

    /// Verify a signed pointer; a well-signed payload that is not a pointer is `Malformed`.
    pub fn verify_pointer(&self, token: &str) -> Result<ResourcePointer, IntegrityError> {
        self.validate_and_strip_hmac(token, HashScope::ResourcePointer)?
            .parse()
    }

    pub fn sign_deletion(&self, request: &DeletionRequest) -> Result<String, AppError> {
        let payload = serde_json::to_string(request)?;
        Ok(self.append_hmac(&payload, HashScope::DeleteFile))
    }

    /// Verify and decode a signed deletion request.
    ///
    /// Signature failures yield `AppError::Integrity`; a verified payload
    /// that does not decode into a complete request yields `AppError::Decode`.
    pub fn verify_deletion(&self, token: &str) -> Result<DeletionRequest, AppError> {
        let payload = self.validate_and_strip_hmac(token, HashScope::DeleteFile)?;
        let request = serde_json::from_str(&payload)?;
        Ok(request)
    }
}
