//! AES-CBC for the AESV2 (128-bit) and AESV3 (256-bit) crypt filters.
//!
//! PDF strings and streams carry a random 16-byte IV followed by PKCS#7 padded
//! ciphertext. Key wrapping for revision 6 (`UE`, `OE`, `Perms`) uses unpadded
//! CBC with a zero IV.

use crate::error::SecurityError;
use aes::cipher::block_padding::NoPadding;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes256};
use rand::Rng;

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

pub const BLOCK_SIZE: usize = 16;

fn cipher_error(message: impl Into<String>) -> SecurityError {
    SecurityError::Cipher(message.into())
}

/// Random initialization vector
pub fn generate_iv() -> [u8; BLOCK_SIZE] {
    let mut iv = [0u8; BLOCK_SIZE];
    rand::thread_rng().fill(&mut iv);
    iv
}

/// CBC-encrypt whole blocks in place; 16- and 32-byte keys select AES-128 or AES-256.
pub fn cbc_encrypt_no_padding(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), SecurityError> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(cipher_error("data is not a whole number of blocks"));
    }
    let len = data.len();
    match key.len() {
        16 => {
            Aes128CbcEnc::new_from_slices(key, iv)
                .map_err(|e| cipher_error(e.to_string()))?
                .encrypt_padded_mut::<NoPadding>(data, len)
                .map_err(|_| cipher_error("AES-128 encryption failed"))?;
        }
        32 => {
            Aes256CbcEnc::new_from_slices(key, iv)
                .map_err(|e| cipher_error(e.to_string()))?
                .encrypt_padded_mut::<NoPadding>(data, len)
                .map_err(|_| cipher_error("AES-256 encryption failed"))?;
        }
        n => return Err(cipher_error(format!("unsupported AES key length {n}"))),
    }
    Ok(())
}

pub fn cbc_decrypt_no_padding(key: &[u8], iv: &[u8], data: &mut [u8]) -> Result<(), SecurityError> {
    if data.len() % BLOCK_SIZE != 0 {
        return Err(cipher_error("ciphertext is not a whole number of blocks"));
    }
    match key.len() {
        16 => {
            Aes128CbcDec::new_from_slices(key, iv)
                .map_err(|e| cipher_error(e.to_string()))?
                .decrypt_padded_mut::<NoPadding>(data)
                .map_err(|_| cipher_error("AES-128 decryption failed"))?;
        }
        32 => {
            Aes256CbcDec::new_from_slices(key, iv)
                .map_err(|e| cipher_error(e.to_string()))?
                .decrypt_padded_mut::<NoPadding>(data)
                .map_err(|_| cipher_error("AES-256 decryption failed"))?;
        }
        n => return Err(cipher_error(format!("unsupported AES key length {n}"))),
    }
    Ok(())
}

/// Encrypt with a fresh IV; output is `IV || ciphertext`.
pub fn encrypt_with_iv(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SecurityError> {
    let iv = generate_iv();
    let padding = BLOCK_SIZE - data.len() % BLOCK_SIZE;

    let mut buffer = Vec::with_capacity(BLOCK_SIZE + data.len() + padding);
    buffer.extend_from_slice(&iv);
    buffer.extend_from_slice(data);
    buffer.extend(std::iter::repeat(padding as u8).take(padding));

    cbc_encrypt_no_padding(key, &iv, &mut buffer[BLOCK_SIZE..])?;
    Ok(buffer)
}

/// Decrypt `IV || ciphertext` and strip PKCS#7 padding.
pub fn decrypt_with_iv(key: &[u8], data: &[u8]) -> Result<Vec<u8>, SecurityError> {
    // Empty strings are sometimes written without an IV
    if data.len() <= BLOCK_SIZE {
        return Ok(Vec::new());
    }
    let (iv, ciphertext) = data.split_at(BLOCK_SIZE);
    let usable = ciphertext.len() - ciphertext.len() % BLOCK_SIZE;
    if usable != ciphertext.len() {
        tracing::warn!(
            "AES ciphertext has {} trailing bytes, ignoring them",
            ciphertext.len() - usable
        );
    }

    let mut buffer = ciphertext[..usable].to_vec();
    cbc_decrypt_no_padding(key, iv, &mut buffer)?;

    let padding = buffer.last().copied().unwrap_or(0) as usize;
    let valid = (1..=BLOCK_SIZE).contains(&padding)
        && padding <= buffer.len()
        && buffer[buffer.len() - padding..]
            .iter()
            .all(|&b| b as usize == padding);
    if !valid {
        return Err(cipher_error("invalid PKCS#7 padding"));
    }
    buffer.truncate(buffer.len() - padding);
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_128_and_256() {
        let cases: [&[u8]; 4] = [b"", b"short", &[0x42; 16], &[0x13; 37]];
        for key in [vec![7u8; 16], vec![9u8; 32]] {
            for plaintext in cases {
                let encrypted = encrypt_with_iv(&key, plaintext).unwrap();
                assert_eq!(encrypted.len() % 16, 0);
                assert!(encrypted.len() > plaintext.len());
                assert_eq!(decrypt_with_iv(&key, &encrypted).unwrap(), plaintext);
            }
        }
    }

    #[test]
    fn test_fresh_iv_each_time() {
        let key = [1u8; 16];
        assert_ne!(
            encrypt_with_iv(&key, b"same").unwrap(),
            encrypt_with_iv(&key, b"same").unwrap()
        );
    }

    #[test]
    fn test_wrong_key_fails_padding_check_or_garbles() {
        let encrypted = encrypt_with_iv(&[1u8; 16], b"secret message").unwrap();
        match decrypt_with_iv(&[2u8; 16], &encrypted) {
            Ok(plain) => assert_ne!(plain, b"secret message"),
            Err(e) => assert!(matches!(e, SecurityError::Cipher(_))),
        }
    }

    #[test]
    fn test_fips_197_aes128_block() {
        // AES-128 single block with a zero IV equals ECB
        let key: Vec<u8> = (0u8..16).collect();
        let mut block: Vec<u8> = (0u8..16).map(|i| i * 0x11).collect();
        cbc_encrypt_no_padding(&key, &[0u8; 16], &mut block).unwrap();
        assert_eq!(
            hex::encode(&block),
            "69c4e0d86a7b0430d8cdb78070b4c55a"
        );
        cbc_decrypt_no_padding(&key, &[0u8; 16], &mut block).unwrap();
        assert_eq!(block[1], 0x11);
    }

    #[test]
    fn test_rejects_bad_key_length_and_partial_blocks() {
        let mut data = [0u8; 16];
        assert!(cbc_encrypt_no_padding(&[0u8; 10], &[0u8; 16], &mut data).is_err());
        let mut partial = [0u8; 15];
        assert!(cbc_encrypt_no_padding(&[0u8; 16], &[0u8; 16], &mut partial).is_err());
    }
}
