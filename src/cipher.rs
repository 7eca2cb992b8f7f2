use chacha20poly1305::{
    ChaCha20Poly1305, Key, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::RngCore;
use rand::rngs::OsRng;
use thiserror::Error;

pub const KEY_LEN: usize = 32;
pub const NONCE_LEN: usize = 12;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CipherError {
    #[error("Encryption failed")]
    EncryptionFailed,
    #[error("Decryption failed")]
    DecryptionFailed,
    #[error("Invalid key: expected {} bytes as hex", KEY_LEN)]
    InvalidKey,
    #[error("Sealed value too short")]
    TooShort,
}

// one key per process, fresh nonce per seal
pub struct UrlCipher {
    cipher: ChaCha20Poly1305,
}

impl UrlCipher {
    pub fn new(key: &[u8; KEY_LEN]) -> Self {
        Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(key)),
        }
    }

    /// Fresh key from the OS RNG
    pub fn random() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self::new(&key)
    }

    /// Parse a 64-char hex key
    pub fn from_hex(hex_key: &str) -> Result<Self, CipherError> {
        let bytes = hex::decode(hex_key.trim()).map_err(|_| CipherError::InvalidKey)?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| CipherError::InvalidKey)?;
        Ok(Self::new(&key))
    }

    /// Returns `nonce || ciphertext || tag`
    pub fn seal(&self, plaintext: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, Payload { msg: plaintext, aad })
            .map_err(|_| CipherError::EncryptionFailed)?;

        let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        sealed.extend_from_slice(&nonce_bytes);
        sealed.extend_from_slice(&ciphertext);
        Ok(sealed)
    }

    pub fn open(&self, sealed: &[u8], aad: &[u8]) -> Result<Vec<u8>, CipherError> {
        if sealed.len() < NONCE_LEN {
            return Err(CipherError::TooShort);
        }
        let (nonce_bytes, ciphertext) = sealed.split_at(NONCE_LEN);

        self.cipher
            .decrypt(Nonce::from_slice(nonce_bytes), Payload { msg: ciphertext, aad })
            .map_err(|_| CipherError::DecryptionFailed)
    }
}

impl std::fmt::Debug for UrlCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UrlCipher").finish_non_exhaustive()
    }
}
