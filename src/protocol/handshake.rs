//! Login encryption negotiation.
//!
//! When the server sends an [`EncryptionRequest`], the client:
//! 1. generates a random 16-byte shared secret,
//! 2. encrypts the secret and the server's verify token with the server's RSA public
//!    key (PKCS#1 v1.5 padding),
//! 3. answers with an [`EncryptionResponse`] carrying both ciphertexts.
//!
//! The secret later keys the AES-128-CFB8 stream in both directions. It is wiped
//! from memory when dropped.

use std::fmt;

use rand_core::{OsRng, RngCore};
use rsa::pkcs1::DecodeRsaPublicKey;
use rsa::pkcs8::DecodePublicKey;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use zeroize::Zeroize;

use tracing::{debug, instrument, warn};

use crate::error::{constants, CryptoError};
use crate::protocol::packets::{EncryptionRequest, EncryptionResponse};
use crate::transport::cipher::KEY_LEN;

/// Symmetric key for the session. Zeroed on drop.
#[derive(Clone)]
pub struct SharedSecret([u8; KEY_LEN]);

impl SharedSecret {
    /// Fresh secret from the OS random number generator.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        let array: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            debug!(len = bytes.len(), "{}", constants::ERR_SHARED_SECRET_LENGTH);
            CryptoError::InvalidKeyLength(bytes.len())
        })?;
        Ok(Self(array))
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }
}

impl Drop for SharedSecret {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SharedSecret(<redacted>)")
    }
}

/// Imports a server public key.
///
/// Servers send DER-encoded SubjectPublicKeyInfo; bare PKCS#1 `RSAPublicKey` DER is
/// accepted as well.
pub fn import_public_key(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    RsaPublicKey::from_public_key_der(der)
        .or_else(|_| RsaPublicKey::from_pkcs1_der(der))
        .map_err(|e| {
            warn!(len = der.len(), "{}", constants::ERR_PUBLIC_KEY_FORMAT);
            CryptoError::InvalidPublicKey(e.to_string())
        })
}

/// RSA PKCS#1 v1.5 encryption of `data`.
pub fn rsa_encrypt(key: &RsaPublicKey, data: &[u8]) -> Result<Vec<u8>, CryptoError> {
    key.encrypt(&mut OsRng, Pkcs1v15Encrypt, data)
        .map_err(|e| CryptoError::Encryption(e.to_string()))
}

/// Outcome of answering an encryption request.
#[derive(Debug)]
pub struct EncryptionNegotiation {
    pub secret: SharedSecret,
    pub response: EncryptionResponse,
}

/// Builds the reply to `request` with a freshly generated secret.
#[instrument(skip(request), fields(server_id = %request.server_id))]
pub fn answer_encryption_request(
    request: &EncryptionRequest,
) -> Result<EncryptionNegotiation, CryptoError> {
    answer_with_secret(request, SharedSecret::generate())
}

/// Builds the reply to `request` for a given secret.
pub fn answer_with_secret(
    request: &EncryptionRequest,
    secret: SharedSecret,
) -> Result<EncryptionNegotiation, CryptoError> {
    let key = import_public_key(&request.public_key)?;
    let response = EncryptionResponse {
        shared_secret: rsa_encrypt(&key, secret.as_bytes())?,
        verify_token: rsa_encrypt(&key, &request.verify_token)?,
    };
    debug!(
        secret_len = response.shared_secret.len(),
        token_len = response.verify_token.len(),
        "encryption response prepared"
    );
    Ok(EncryptionNegotiation { secret, response })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use rsa::pkcs1::EncodeRsaPublicKey;
    use rsa::pkcs8::EncodePublicKey;
    use rsa::RsaPrivateKey;

    fn server_key() -> RsaPrivateKey {
        RsaPrivateKey::new(&mut OsRng, 1024).expect("key generation")
    }

    #[test]
    fn secrets_are_random_and_sized() {
        let a = SharedSecret::generate();
        let b = SharedSecret::generate();
        assert_eq!(a.as_bytes().len(), KEY_LEN);
        assert_ne!(a.as_bytes(), b.as_bytes());
        assert_eq!(format!("{a:?}"), "SharedSecret(<redacted>)");
    }

    #[test]
    fn secret_length_is_checked() {
        assert!(matches!(
            SharedSecret::from_bytes(&[1u8; 8]),
            Err(CryptoError::InvalidKeyLength(8))
        ));
    }

    #[test]
    fn response_decrypts_with_server_key() {
        let private = server_key();
        let der = private.to_public_key().to_public_key_der().unwrap();
        let request = EncryptionRequest {
            server_id: String::new(),
            public_key: Bytes::copy_from_slice(der.as_bytes()),
            verify_token: Bytes::from_static(&[9, 8, 7, 6]),
        };

        let negotiation = answer_encryption_request(&request).unwrap();
        let secret = private
            .decrypt(Pkcs1v15Encrypt, &negotiation.response.shared_secret)
            .unwrap();
        let token = private
            .decrypt(Pkcs1v15Encrypt, &negotiation.response.verify_token)
            .unwrap();

        assert_eq!(&secret[..], negotiation.secret.as_bytes());
        assert_eq!(token, vec![9, 8, 7, 6]);
    }

    #[test]
    fn pkcs1_keys_are_accepted() {
        let private = server_key();
        let der = private.to_public_key().to_pkcs1_der().unwrap();
        assert!(import_public_key(der.as_bytes()).is_ok());
    }

    #[test]
    fn garbage_key_is_rejected() {
        assert!(matches!(
            import_public_key(&[0x30, 0x03, 0x01, 0x02, 0x03]),
            Err(CryptoError::InvalidPublicKey(_))
        ));
    }
}
