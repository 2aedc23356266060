//! ChaCha20 stream cipher bound to a `CodenameKey` and a 12-byte nonce (§4.D).
//!
//! The cluster format never uses this as an AEAD: encrypt/decrypt are plain
//! keystream XOR, consumed strictly in the order the cluster was written.
//! Confidentiality plus integrity of the header comes from the encrypted
//! BLAKE2s-128 MAC (`cluster.rs`), not from this layer.

use chacha20::cipher::{KeyIvInit, StreamCipher};
use chacha20::{ChaCha20, Key, Nonce};

use crate::kdf::CodenameKey;

/// A keystream bound to one `(key, nonce)` pair. Each byte of keystream is
/// consumed exactly once; encrypt and decrypt are the same XOR operation.
pub struct Cryptographer {
    cipher: ChaCha20,
}

impl Cryptographer {
    /// Open a fresh keystream for `key` seeded with `nonce`.
    pub fn new(key: &CodenameKey, nonce: &[u8; 12]) -> Self {
        let key = Key::from_slice(key.as_bytes());
        let nonce = Nonce::from_slice(nonce);
        let cipher = ChaCha20::new(key, nonce);
        Self { cipher }
    }

    /// XOR `buf` in place with the next `buf.len()` keystream bytes.
    pub fn apply(&mut self, buf: &mut [u8]) {
        self.cipher.apply_keystream(buf);
    }

    /// Encrypt `plaintext` into a freshly allocated `Vec`, advancing the
    /// keystream by `plaintext.len()` bytes.
    pub fn encrypt(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut buf = plaintext.to_vec();
        self.apply(&mut buf);
        buf
    }

    /// Decrypt `ciphertext` into a freshly allocated `Vec`, advancing the
    /// keystream by `ciphertext.len()` bytes. Identical operation to
    /// `encrypt`; kept as a separate name for call-site clarity.
    pub fn decrypt(&mut self, ciphertext: &[u8]) -> Vec<u8> {
        self.encrypt(ciphertext)
    }
}
