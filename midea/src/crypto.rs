//! AES/hash primitives shared by discovery, the V3 session envelope and the
//! cloud client (spec §4.1).

use aes::Aes128;
use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit};
use hmac::{Hmac, Mac};
use md5::{Digest as Md5Digest, Md5};
use sha2::{Digest, Sha256};

use crate::error::CryptoError;

type Aes128EcbEnc = ecb::Encryptor<Aes128>;
type Aes128EcbDec = ecb::Decryptor<Aes128>;
type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;

const ZERO_IV: [u8; 16] = [0u8; 16];

/// Application key used to decrypt V1/V2/V3 discovery payloads.
/// `MD5("ac21b9f9cbfe4ca5a88562ef25e2b768")`, folded to 16 raw bytes.
pub fn app_key() -> [u8; 16] {
    md5(b"ac21b9f9cbfe4ca5a88562ef25e2b768")
}

/// Sign key used by the NetHome+ cloud endpoint to compute request signatures.
pub const NETHOME_SIGN_KEY: &[u8] = b"xhdiwjnchekd4d512chdjx5d8e4c394D2D7S";

pub fn md5(data: &[u8]) -> [u8; 16] {
    let mut hasher = Md5::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn md5_hex(data: &[u8]) -> String {
    hex::encode(md5(data))
}

pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

pub fn hmac_sha256(key: &[u8], data: &[u8]) -> [u8; 32] {
    let mut mac = Hmac::<Sha256>::new_from_slice(key).expect("HMAC accepts keys of any length");
    mac.update(data);
    mac.finalize().into_bytes().into()
}

/// Derive the 16-byte "UDP-ID" used as the V3 handshake identifier:
/// `SHA-256(device_id)` folded to 16 bytes by XORing the two halves.
pub fn udp_id(device_id_bytes: &[u8]) -> [u8; 16] {
    let digest = sha256(device_id_bytes);
    let mut out = [0u8; 16];
    for i in 0..16 {
        out[i] = digest[i] ^ digest[i + 16];
    }
    out
}

fn key16(key: &[u8]) -> [u8; 16] {
    let mut out = [0u8; 16];
    let n = key.len().min(16);
    out[..n].copy_from_slice(&key[..n]);
    out
}

/// AES-128-ECB encrypt with PKCS#7 padding.
pub fn aes_ecb_encrypt(key: &[u8], plaintext: &[u8]) -> Vec<u8> {
    Aes128EcbEnc::new(&key16(key).into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// AES-128-ECB decrypt, trimming PKCS#7 padding. Raises [`CryptoError::BadPadding`]
/// on malformed padding.
pub fn aes_ecb_decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(CryptoError::BadLength(ciphertext.len()));
    }
    Aes128EcbDec::new(&key16(key).into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::BadPadding)
}

/// AES-128-CBC encrypt with a constant all-zero IV and PKCS#7 padding.
pub fn aes_cbc_encrypt(key: &[u8], plaintext: &[u8]) -> Vec<u8> {
    Aes128CbcEnc::new(&key16(key).into(), &ZERO_IV.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)
}

/// AES-128-CBC decrypt with a constant all-zero IV, trimming PKCS#7 padding.
pub fn aes_cbc_decrypt(key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.is_empty() || ciphertext.len() % 16 != 0 {
        return Err(CryptoError::BadLength(ciphertext.len()));
    }
    Aes128CbcDec::new(&key16(key).into(), &ZERO_IV.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::BadPadding)
}

/// Midea's CRC-8 table, polynomial 0x131 (x^8 + x^5 + x^4 + 1), computed over
/// the payload. Some appliances append this *in addition to* the frame
/// checksum; the frame decoder accepts either (spec §3, §4.2).
const CRC8_TABLE: [u8; 256] = build_crc8_table();

const fn build_crc8_table() -> [u8; 256] {
    let mut table = [0u8; 256];
    let mut i = 0;
    while i < 256 {
        let mut crc = i as u8;
        let mut bit = 0;
        while bit < 8 {
            if crc & 0x80 != 0 {
                crc = (crc << 1) ^ 0x31;
            } else {
                crc <<= 1;
            }
            bit += 1;
        }
        table[i] = crc;
        i += 1;
    }
    table
}

pub fn crc8(data: &[u8]) -> u8 {
    let mut crc = 0u8;
    for &byte in data {
        crc = CRC8_TABLE[(crc ^ byte) as usize];
    }
    crc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecb_round_trip() {
        let key = app_key();
        let plaintext = b"hello world, this is a longer message than one block";
        let ct = aes_ecb_encrypt(&key, plaintext);
        let pt = aes_ecb_decrypt(&key, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn cbc_round_trip() {
        let key = sha256(b"some session key material");
        let plaintext = b"session envelope payload";
        let ct = aes_cbc_encrypt(&key, plaintext);
        let pt = aes_cbc_decrypt(&key, &ct).unwrap();
        assert_eq!(pt, plaintext);
    }

    #[test]
    fn ecb_bad_padding_detected() {
        let key = app_key();
        let mut ct = aes_ecb_encrypt(&key, b"0123456789abcdef");
        // Corrupt the last block so the padding bytes no longer match.
        let last = ct.len() - 1;
        ct[last] ^= 0xFF;
        assert!(aes_ecb_decrypt(&key, &ct).is_err());
    }

    #[test]
    fn udp_id_is_16_bytes_and_deterministic() {
        let id_bytes = 147_334_558_165_565u64.to_le_bytes()[..6].to_vec();
        let a = udp_id(&id_bytes);
        let b = udp_id(&id_bytes);
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
    }

    #[test]
    fn crc8_matches_known_table_property() {
        // CRC-8 of an empty slice is 0 regardless of polynomial.
        assert_eq!(crc8(&[]), 0);
        // Running the same input twice gives the same result.
        let data = [0x01, 0x02, 0x03, 0x04];
        assert_eq!(crc8(&data), crc8(&data));
    }
}
