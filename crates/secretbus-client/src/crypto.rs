//! Transport encryption for the `dh-ietf1024-sha256-aes128-cbc-pkcs7`
//! algorithm.
//!
//! Diffie-Hellman over the 1024-bit MODP group from RFC 2409, HKDF-SHA256 to
//! turn the shared secret into an AES-128 key, then AES-128-CBC with PKCS#7
//! padding. A fresh random IV travels with every payload.

use aes::Aes128;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use hkdf::Hkdf;
use num_bigint::BigUint;
use once_cell::sync::Lazy;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::{Result, SecretError};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

/// AES-128 key length.
pub const KEY_SIZE: usize = 16;

/// CBC initialization vector length.
pub const IV_SIZE: usize = 16;

const BLOCK_SIZE: usize = 16;

/// Byte length of the group prime; shared secrets are padded to it.
const PRIME_SIZE: usize = 128;

/// RFC 2409 second Oakley group.
const PRIME_HEX: &str = concat!(
    "FFFFFFFFFFFFFFFFC90FDAA22168C234C4C6628B80DC1CD1",
    "29024E088A67CC74020BBEA63B139B22514A08798E3404DD",
    "EF9519B3CD3A431B302B0A6DF25F14374FE1356D6D51C245",
    "E485B576625E7EC6F44C42E9A637ED6B0BFF5CB6F406B7ED",
    "EE386BFB5A899FA5AE9F24117C4B1FE649286651ECE65381",
    "FFFFFFFFFFFFFFFF",
);

static PRIME: Lazy<BigUint> = Lazy::new(|| {
    BigUint::parse_bytes(PRIME_HEX.as_bytes(), 16).expect("group prime is valid hex")
});

static GENERATOR: Lazy<BigUint> = Lazy::new(|| BigUint::from(2u32));

/// Derived session key.
pub type SessionKey = Zeroizing<[u8; KEY_SIZE]>;

/// An ephemeral Diffie-Hellman key pair.
pub struct DhKeypair {
    private: Zeroizing<Vec<u8>>,
    public: Vec<u8>,
}

impl DhKeypair {
    /// Generate a key pair with a random private exponent.
    pub fn generate() -> Self {
        let mut private = Zeroizing::new(vec![0u8; PRIME_SIZE]);
        rand::thread_rng().fill_bytes(&mut private);
        // Keep the exponent below the prime and away from zero.
        private[0] &= 0x7f;
        private[PRIME_SIZE - 1] |= 0x01;

        let exponent = BigUint::from_bytes_be(&private);
        let public = GENERATOR.modpow(&exponent, &PRIME).to_bytes_be();

        Self { private, public }
    }

    /// Big-endian public value to send to the peer.
    pub fn public_bytes(&self) -> &[u8] {
        &self.public
    }

    /// Combine with the peer's public value and derive the AES key.
    pub fn derive_key(&self, peer_public: &[u8]) -> Result<SessionKey> {
        let peer = BigUint::from_bytes_be(peer_public);
        let one = BigUint::from(1u32);
        let upper = &*PRIME - &one;
        if peer <= one || peer >= upper {
            return Err(SecretError::Negotiation(
                "peer public key is out of range".to_string(),
            ));
        }

        let exponent = BigUint::from_bytes_be(&self.private);
        let shared = peer.modpow(&exponent, &PRIME).to_bytes_be();

        let mut ikm = Zeroizing::new(vec![0u8; PRIME_SIZE]);
        ikm[PRIME_SIZE - shared.len()..].copy_from_slice(&shared);

        Ok(hkdf_key(&ikm))
    }
}

/// HKDF-SHA256 with no salt and no info, truncated to an AES-128 key.
fn hkdf_key(ikm: &[u8]) -> SessionKey {
    let hk = Hkdf::<Sha256>::new(None, ikm);
    let mut okm = Zeroizing::new([0u8; KEY_SIZE]);
    // expand cannot fail when output length <= 255 * hash-length
    hk.expand(&[], &mut okm[..])
        .expect("HKDF expand should not fail for 16-byte output");
    okm
}

/// Encrypt `plaintext` under `key`.
///
/// Returns `(iv, ciphertext)`. The IV is random, so the same plaintext
/// encrypted twice produces different output.
pub fn encrypt(key: &[u8; KEY_SIZE], plaintext: &[u8]) -> Result<(Vec<u8>, Vec<u8>)> {
    let mut iv = vec![0u8; IV_SIZE];
    rand::thread_rng().fill_bytes(&mut iv);

    let cipher = Aes128CbcEnc::new_from_slices(key, &iv)
        .map_err(|e| SecretError::Integrity(format!("cipher setup failed: {e}")))?;
    let ciphertext = cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok((iv, ciphertext))
}

/// Decrypt data previously produced by [`encrypt`].
///
/// A wrong IV length, a ciphertext that is not whole blocks, or bad padding
/// is reported as [`SecretError::Integrity`].
pub fn decrypt(key: &[u8; KEY_SIZE], iv: &[u8], ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if iv.len() != IV_SIZE {
        return Err(SecretError::Integrity(format!(
            "expected {IV_SIZE}-byte IV, got {}",
            iv.len()
        )));
    }
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(SecretError::Integrity(format!(
            "ciphertext length {} is not a positive multiple of {BLOCK_SIZE}",
            ciphertext.len()
        )));
    }

    let cipher = Aes128CbcDec::new_from_slices(key, iv)
        .map_err(|e| SecretError::Integrity(format!("cipher setup failed: {e}")))?;
    cipher
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map(Zeroizing::new)
        .map_err(|_| SecretError::Integrity("invalid padding".to_string()))
}
