//! Password-based archive decryption: salted PBKDF2 key derivation and AES-256-CBC.
//!
//! Wire layout: 8-byte magic marker, 8-byte salt, ciphertext. The whole
//! payload is decrypted in memory; peak memory is bounded by archive size.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use tracing::{debug, trace};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{IngestError, IngestResult};

/// 8-byte marker at the start of every encrypted archive.
pub const MAGIC: &[u8; 8] = b"Salted__";
/// Length of the salt following the magic marker.
pub const SALT_LEN: usize = 8;
/// Iteration count fixed by the archive producer.
const KDF_ITERATIONS: u32 = 10_000;
/// AES-256 key length.
const KEY_LEN: usize = 32;
/// CBC initialization vector length.
const IV_LEN: usize = 16;
/// Cipher block size.
const BLOCK_LEN: usize = 16;

type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;

/// Key and IV derived for one archive. Never persisted; zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: [u8; KEY_LEN],
    iv: [u8; IV_LEN],
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyMaterial([REDACTED])")
    }
}

impl KeyMaterial {
    /// Derives 48 bytes of key material from a password and salt via
    /// PBKDF2-HMAC-SHA256: the first 32 are the key, the next 16 the IV.
    pub fn derive(password: &str, salt: &[u8; SALT_LEN]) -> Self {
        let mut okm = [0u8; KEY_LEN + IV_LEN];
        pbkdf2_hmac::<Sha256>(password.as_bytes(), salt, KDF_ITERATIONS, &mut okm);
        let mut key = [0u8; KEY_LEN];
        let mut iv = [0u8; IV_LEN];
        key.copy_from_slice(&okm[..KEY_LEN]);
        iv.copy_from_slice(&okm[KEY_LEN..]);
        okm.zeroize();
        Self { key, iv }
    }
}

/// Decrypts a complete archive payload with the given password.
///
/// The trailing pad length (final plaintext byte) must be 1..=16 and no
/// larger than the plaintext; pad content is not validated.
pub fn decrypt(data: &[u8], password: &str) -> IngestResult<Vec<u8>> {
    let header = MAGIC.len() + SALT_LEN;
    if data.len() < header {
        return Err(IngestError::Truncated {
            expected: header,
            found: data.len(),
        });
    }
    if &data[..MAGIC.len()] != MAGIC {
        return Err(IngestError::BadMagic);
    }

    let mut salt = [0u8; SALT_LEN];
    salt.copy_from_slice(&data[MAGIC.len()..header]);
    let ciphertext = &data[header..];
    if ciphertext.is_empty() || ciphertext.len() % BLOCK_LEN != 0 {
        return Err(IngestError::BadCiphertextLength {
            len: ciphertext.len(),
        });
    }
    trace!(
        salt = %hex::encode(salt),
        ciphertext = ciphertext.len(),
        "decrypting archive payload"
    );

    let material = KeyMaterial::derive(password, &salt);
    let mut plaintext = Aes256CbcDec::new(&material.key.into(), &material.iv.into())
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|_| IngestError::BadCiphertextLength {
            len: ciphertext.len(),
        })?;

    let pad = plaintext.last().copied().unwrap_or(0);
    if pad == 0 || pad as usize > BLOCK_LEN || pad as usize > plaintext.len() {
        return Err(IngestError::BadPadding {
            pad,
            len: plaintext.len(),
        });
    }
    plaintext.truncate(plaintext.len() - pad as usize);
    debug!(plaintext = plaintext.len(), pad, "archive payload decrypted");
    Ok(plaintext)
}

/// Encrypts a payload with the scheme the archive producer uses, under a
/// random salt. The counterpart of [`decrypt`]; used to produce archives.
pub fn encrypt(plaintext: &[u8], password: &str) -> Vec<u8> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    encrypt_with_salt(plaintext, password, &salt)
}

/// Encrypts with a caller-chosen salt. Deterministic for a given
/// (plaintext, password, salt) triple.
pub fn encrypt_with_salt(plaintext: &[u8], password: &str, salt: &[u8; SALT_LEN]) -> Vec<u8> {
    let material = KeyMaterial::derive(password, salt);
    let ciphertext = Aes256CbcEnc::new(&material.key.into(), &material.iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(MAGIC.len() + SALT_LEN + ciphertext.len());
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(salt);
    out.extend_from_slice(&ciphertext);
    out
}
