//! Versioned envelope around S3 continuation tokens.
//!
//! The envelope binds the provider token to the bucket, prefix and page size
//! it was issued for, so a resumed listing cannot silently switch location.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ContinuationToken, ListingOptions, MAX_TOKEN_SIZE};
use serde::{Deserialize, Serialize};

/// Current token envelope format version.
pub const TOKEN_VERSION: u8 = 1;

/// Identity of the S3 location a token was issued for.
///
/// A token issued for one bucket, endpoint or prefix is rejected by any
/// other, even when the provider token itself would be accepted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackendIdentity {
    /// Normalized endpoint URL, or the canonical AWS host for the region.
    pub endpoint: String,
    pub region: String,
    /// Bucket name (the container).
    pub bucket: String,
    /// Key prefix inside the bucket.
    pub prefix: Option<String>,
}

/// Versioned continuation token envelope.
///
/// This wraps a backend-specific continuation token with metadata for validation.
/// The envelope ensures that tokens are only used with the same backend configuration
/// and listing parameters they were created with.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenEnvelope {
    /// Envelope format version (currently 1).
    pub version: u8,

    /// Backend identity for validation.
    pub backend: BackendIdentity,

    /// Listing prefix.
    pub prefix: String,

    /// Normalized listing options (page_size after clamping).
    pub page_size: usize,

    /// Backend-specific continuation token (opaque bytes).
    #[serde(with = "serde_bytes")]
    pub provider_token: Vec<u8>,
}

impl TokenEnvelope {
    /// Create a new token envelope.
    ///
    /// # Arguments
    ///
    /// * `backend` - Backend identity
    /// * `prefix` - Listing prefix
    /// * `options` - Normalized listing options
    /// * `provider_token` - Backend-specific token bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the envelope would exceed MAX_TOKEN_SIZE when serialized.
    pub fn new(
        backend: BackendIdentity,
        prefix: String,
        options: &ListingOptions,
        provider_token: Vec<u8>,
    ) -> StorageResult<Self> {
        let envelope = Self {
            version: TOKEN_VERSION,
            backend,
            prefix,
            page_size: options.normalized_page_size(),
            provider_token,
        };

        // Validate size
        envelope.validate_size()?;

        Ok(envelope)
    }

    /// Serialize to ContinuationToken.
    ///
    /// Uses JSON encoding for the envelope structure.
    pub fn to_token(&self) -> StorageResult<ContinuationToken> {
        let json = serde_json::to_vec(self).map_err(|e| {
            StorageError::InvalidContinuationToken(format!(
                "failed to serialize token envelope: {}",
                e
            ))
        })?;

        ContinuationToken::new(json)
    }

    /// Deserialize from ContinuationToken.
    pub fn from_token(token: &ContinuationToken) -> StorageResult<Self> {
        let envelope: Self = serde_json::from_slice(token.as_bytes()).map_err(|e| {
            StorageError::InvalidContinuationToken(format!(
                "failed to deserialize token envelope: {}",
                e
            ))
        })?;

        // Validate version
        if envelope.version != TOKEN_VERSION {
            return Err(StorageError::InvalidContinuationToken(format!(
                "unsupported token version: {} (expected {})",
                envelope.version, TOKEN_VERSION
            )));
        }

        Ok(envelope)
    }

    /// Validate that this token matches the given backend and listing parameters.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Backend identity doesn't match
    /// - Prefix doesn't match
    /// - Normalized page size doesn't match
    pub fn validate(
        &self,
        backend: &BackendIdentity,
        prefix: &str,
        options: &ListingOptions,
    ) -> StorageResult<()> {
        // Check backend identity
        if &self.backend != backend {
            return Err(StorageError::InvalidContinuationToken(format!(
                "backend mismatch: token is for {:?}, but current backend is {:?}",
                self.backend, backend
            )));
        }

        // Check prefix
        if self.prefix != prefix {
            return Err(StorageError::InvalidContinuationToken(format!(
                "prefix mismatch: token is for '{}', but current prefix is '{}'",
                self.prefix, prefix
            )));
        }

        // Check normalized page size
        let normalized_page_size = options.normalized_page_size();
        if self.page_size != normalized_page_size {
            return Err(StorageError::InvalidContinuationToken(format!(
                "page_size mismatch: token is for {}, but current page_size is {}",
                self.page_size, normalized_page_size
            )));
        }

        Ok(())
    }

    /// Validate that the serialized size is within limits.
    fn validate_size(&self) -> StorageResult<()> {
        let json = serde_json::to_vec(self).map_err(|e| {
            StorageError::InvalidContinuationToken(format!(
                "failed to serialize token envelope: {}",
                e
            ))
        })?;

        if json.len() > MAX_TOKEN_SIZE {
            return Err(StorageError::InvalidContinuationToken(format!(
                "token too large: {} bytes (max: {})",
                json.len(),
                MAX_TOKEN_SIZE
            )));
        }

        Ok(())
    }

    /// Get the backend-specific provider token.
    pub fn provider_token(&self) -> &[u8] {
        &self.provider_token
    }
}

// Helper module for serde_bytes
mod serde_bytes {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        use base64::{Engine as _, engine::general_purpose};
        let encoded = general_purpose::STANDARD.encode(bytes);
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Vec<u8>, D::Error>
    where
        D: Deserializer<'de>,
    {
        use base64::{Engine as _, engine::general_purpose};
        let s = String::deserialize(deserializer)?;
        general_purpose::STANDARD
            .decode(&s)
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(bucket: &str) -> BackendIdentity {
        BackendIdentity {
            endpoint: "s3.us-east-1.amazonaws.com".to_string(),
            region: "us-east-1".to_string(),
            bucket: bucket.to_string(),
            prefix: None,
        }
    }

    #[test]
    fn test_envelope_survives_token_encoding() {
        let options = ListingOptions::new(1000);
        let envelope = TokenEnvelope::new(
            identity("tempfiles"),
            String::new(),
            &options,
            b"s3-continuation-token-abc123".to_vec(),
        )
        .unwrap();

        let decoded = TokenEnvelope::from_token(&envelope.to_token().unwrap()).unwrap();

        assert_eq!(decoded.version, TOKEN_VERSION);
        assert_eq!(decoded.backend, identity("tempfiles"));
        assert_eq!(decoded.prefix, "");
        assert_eq!(decoded.provider_token(), b"s3-continuation-token-abc123");
        decoded.validate(&identity("tempfiles"), "", &options).unwrap();
    }

    #[test]
    fn test_validate_rejects_other_bucket() {
        let options = ListingOptions::new(1000);
        let envelope =
            TokenEnvelope::new(identity("tempfiles"), String::new(), &options, b"t".to_vec())
                .unwrap();
        assert!(envelope.validate(&identity("uploads"), "", &options).is_err());
    }

    #[test]
    fn test_validate_rejects_other_prefix_and_page_size() {
        let options = ListingOptions::new(1000);
        let envelope =
            TokenEnvelope::new(identity("tempfiles"), String::new(), &options, b"t".to_vec())
                .unwrap();
        assert!(envelope.validate(&identity("tempfiles"), "archive/", &options).is_err());
        assert!(
            envelope
                .validate(&identity("tempfiles"), "", &ListingOptions::new(500))
                .is_err()
        );
        // Both sizes clamp to the minimum, so the token still matches.
        let small = TokenEnvelope::new(
            identity("tempfiles"),
            String::new(),
            &ListingOptions::new(1),
            b"t".to_vec(),
        )
        .unwrap();
        small.validate(&identity("tempfiles"), "", &ListingOptions::new(50)).unwrap();
    }

    #[test]
    fn test_from_token_rejects_unknown_version() {
        let mut envelope = TokenEnvelope::new(
            identity("tempfiles"),
            String::new(),
            &ListingOptions::default(),
            b"t".to_vec(),
        )
        .unwrap();
        envelope.version = TOKEN_VERSION + 1;
        let token = envelope.to_token().unwrap();
        assert!(matches!(
            TokenEnvelope::from_token(&token),
            Err(StorageError::InvalidContinuationToken(_))
        ));
    }

    #[test]
    fn test_token_size_limit() {
        let result = TokenEnvelope::new(
            identity("tempfiles"),
            String::new(),
            &ListingOptions::default(),
            vec![0u8; MAX_TOKEN_SIZE],
        );
        assert!(result.is_err());
    }
}
