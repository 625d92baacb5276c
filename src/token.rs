//! Channel token codec.
//!
//! A token is `base64(IV || AES-CBC(key, pad(identity)))`. With
//! `deterministic` set the IV is the all-zero block and the same identity
//! always yields the same token, which keeps counter keys stable at the
//! cost of identical plaintexts producing identical ciphertexts. Decoding
//! reads the IV back from the token prefix, so it works for either mode.

use aes::cipher::block_padding::{NoPadding, Pkcs7};
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

type Aes128CbcEnc = cbc::Encryptor<aes::Aes128>;
type Aes128CbcDec = cbc::Decryptor<aes::Aes128>;
type Aes192CbcEnc = cbc::Encryptor<aes::Aes192>;
type Aes192CbcDec = cbc::Decryptor<aes::Aes192>;
type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES block size; also the IV length and the padding modulus.
pub const BLOCK_SIZE: usize = 16;

/// Counter keys are the SHA-256 of the token reduced mod 10^8.
const COUNTER_KEY_MODULUS: u64 = 100_000_000;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("malformed base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("token is shorter than an IV plus one cipher block")]
    TooShort,
    #[error("ciphertext length {0} is not a multiple of the cipher block size")]
    Misaligned(usize),
    #[error("padding byte {0} outside 1..=16")]
    Padding(u8),
    #[error("decoded identity is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("cipher key must be 16, 24, or 32 bytes, got {0}")]
    KeyLength(usize),
}

/// AES key, selected by the length of the raw key material: 16, 24, or
/// 32 bytes.
#[derive(Clone)]
pub enum CipherKey {
    Aes128([u8; 16]),
    Aes192([u8; 24]),
    Aes256([u8; 32]),
}

impl CipherKey {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TokenError> {
        match bytes.len() {
            16 => {
                let mut key = [0u8; 16];
                key.copy_from_slice(bytes);
                Ok(Self::Aes128(key))
            }
            24 => {
                let mut key = [0u8; 24];
                key.copy_from_slice(bytes);
                Ok(Self::Aes192(key))
            }
            32 => {
                let mut key = [0u8; 32];
                key.copy_from_slice(bytes);
                Ok(Self::Aes256(key))
            }
            other => Err(TokenError::KeyLength(other)),
        }
    }

    fn encrypt(&self, iv: [u8; BLOCK_SIZE], plaintext: &[u8]) -> Vec<u8> {
        match self {
            Self::Aes128(key) => Aes128CbcEnc::new(&(*key).into(), &iv.into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            Self::Aes192(key) => Aes192CbcEnc::new(&(*key).into(), &iv.into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
            Self::Aes256(key) => Aes256CbcEnc::new(&(*key).into(), &iv.into())
                .encrypt_padded_vec_mut::<Pkcs7>(plaintext),
        }
    }

    fn decrypt(&self, iv: [u8; BLOCK_SIZE], ciphertext: &[u8]) -> Result<Vec<u8>, TokenError> {
        let result = match self {
            Self::Aes128(key) => Aes128CbcDec::new(&(*key).into(), &iv.into())
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
            Self::Aes192(key) => Aes192CbcDec::new(&(*key).into(), &iv.into())
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
            Self::Aes256(key) => Aes256CbcDec::new(&(*key).into(), &iv.into())
                .decrypt_padded_vec_mut::<NoPadding>(ciphertext),
        };
        result.map_err(|_| TokenError::Misaligned(ciphertext.len()))
    }
}

/// Encodes chat identities into opaque tokens and back.
#[derive(Clone)]
pub struct TokenCipher {
    key: CipherKey,
    deterministic: bool,
}

impl TokenCipher {
    pub fn new(key: CipherKey, deterministic: bool) -> Self {
        Self { key, deterministic }
    }

    /// Encrypt an identity into a token.
    ///
    /// Deterministic mode uses the zero IV, so encoding the same identity
    /// twice returns byte-identical tokens.
    pub fn encode(&self, identity: &[u8]) -> String {
        let mut iv = [0u8; BLOCK_SIZE];
        if !self.deterministic {
            rand::rngs::OsRng.fill_bytes(&mut iv);
        }
        let ciphertext = self.key.encrypt(iv, identity);
        let mut raw = Vec::with_capacity(BLOCK_SIZE + ciphertext.len());
        raw.extend_from_slice(&iv);
        raw.extend_from_slice(&ciphertext);
        BASE64.encode(raw)
    }

    /// Decrypt a token back into identity bytes.
    ///
    /// Unpadding is deliberately lenient: only the trailing pad byte is
    /// inspected (range-checked against 1..=16), interior pad bytes are not
    /// verified. Corrupt input of any shape is a [`TokenError`], never a
    /// panic.
    pub fn decode(&self, token: &str) -> Result<Vec<u8>, TokenError> {
        let raw = BASE64.decode(token)?;
        if raw.len() < BLOCK_SIZE {
            return Err(TokenError::TooShort);
        }
        let (iv, ciphertext) = raw.split_at(BLOCK_SIZE);
        if ciphertext.is_empty() {
            return Err(TokenError::TooShort);
        }
        let mut iv_block = [0u8; BLOCK_SIZE];
        iv_block.copy_from_slice(iv);
        let mut plaintext = self.key.decrypt(iv_block, ciphertext)?;
        let pad = match plaintext.last() {
            Some(&pad) => pad,
            None => return Err(TokenError::TooShort),
        };
        if pad == 0 || pad as usize > BLOCK_SIZE {
            return Err(TokenError::Padding(pad));
        }
        plaintext.truncate(plaintext.len() - pad as usize);
        Ok(plaintext)
    }

    /// Decode a token and require the identity to be valid UTF-8.
    pub fn decode_identity(&self, token: &str) -> Result<String, TokenError> {
        Ok(String::from_utf8(self.decode(token)?)?)
    }
}

/// Derive the counter key for a token: SHA-256, reduced mod 10^8, printed
/// as a fixed-width decimal string. Attempt counts are stored under this
/// key so the store never holds raw tokens.
pub fn counter_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let reduced = digest
        .iter()
        .fold(0u64, |acc, &byte| (acc * 256 + u64::from(byte)) % COUNTER_KEY_MODULUS);
    format!("{reduced:08}")
}
