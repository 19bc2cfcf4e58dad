use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};
use crate::error::{AppError, Result};

/// The size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;
/// The size of the CBC initialization vector in bytes.
pub const IV_SIZE: usize = 16;
/// Byte appended to short secrets until they reach `KEY_SIZE`.
/// Key preparation truncates the shared secret to 32 bytes or right-pads it with `'0'`.
pub const KEY_FILLER: u8 = b'0';

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// A secure key wrapper that ensures the key is zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SecureKey([u8; KEY_SIZE]);

impl SecureKey {
    /// Derives a key from a configured secret string.
    ///
    /// Secrets longer than 32 bytes are truncated, shorter ones are
    /// right-padded with [`KEY_FILLER`].
    ///
    /// # Arguments
    ///
    /// * `secret` - The configured secret.
    pub fn from_secret(secret: &str) -> Self {
        let mut key = [KEY_FILLER; KEY_SIZE];
        let bytes = secret.as_bytes();
        let len = bytes.len().min(KEY_SIZE);
        key[..len].copy_from_slice(&bytes[..len]);
        Self(key)
    }

    /// Returns a reference to the key as a byte slice.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }
}

/// Generates a new random initialization vector.
///
/// # Returns
///
/// A 16-byte array drawn from the OS RNG.
pub fn generate_iv() -> [u8; IV_SIZE] {
    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    iv
}

/// Encrypts a plaintext using AES-256-CBC with PKCS#7 padding.
///
/// # Arguments
///
/// * `key` - The AES-256 key.
/// * `plaintext` - The data to encrypt.
///
/// # Returns
///
/// A tuple containing the ciphertext and the fresh IV used for encryption.
pub fn encrypt(key: &SecureKey, plaintext: &[u8]) -> ([u8; IV_SIZE], Vec<u8>) {
    let iv = generate_iv();
    let ciphertext = Aes256CbcEnc::new(key.as_bytes().into(), &iv.into())
        .encrypt_padded_vec_mut::<Pkcs7>(plaintext);
    (iv, ciphertext)
}

/// Decrypts a ciphertext using AES-256-CBC.
///
/// # Arguments
///
/// * `key` - The AES-256 key.
/// * `iv` - The IV used for encryption.
/// * `ciphertext` - The data to decrypt.
///
/// # Returns
///
/// The decrypted plaintext, or `AppError::Decryption` when the length or
/// padding is invalid.
pub fn decrypt(key: &SecureKey, iv: &[u8; IV_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>> {
    if ciphertext.is_empty() || ciphertext.len() % IV_SIZE != 0 {
        return Err(AppError::Decryption(format!(
            "Ciphertext length {} is not a positive multiple of the block size",
            ciphertext.len()
        )));
    }

    Aes256CbcDec::new(key.as_bytes().into(), iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| AppError::Decryption("Invalid padding".to_string()))
}
