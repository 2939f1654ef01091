//! Symmetric block cipher filter.
//!
//! AES-256-CBC with a PBKDF2-HMAC-SHA256-derived key and IV, PKCS7
//! padding. Like the compression filters, the whole plaintext (or
//! ciphertext) is buffered and the actual cipher operation runs once at
//! end-of-stream, since CBC padding can only be computed once the final
//! block is known. On encrypt, a random salt is generated and prepended
//! to the output so decrypt can re-derive the same key/IV pair from the
//! passphrase alone.

use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;

use super::{Capabilities, IoFilter};
use crate::buffer::ByteBuf;
use crate::error::{PgxError, Result};
use crate::pack::Pack;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const SALT_SIZE: usize = 8;
const KDF_ROUNDS: u32 = 100_000;
const KEY_SIZE: usize = 32;
const IV_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CipherMode {
    Encrypt,
    Decrypt,
}

fn derive_key_iv(passphrase: &str, salt: &[u8]) -> ([u8; KEY_SIZE], [u8; IV_SIZE]) {
    let mut material = [0u8; KEY_SIZE + IV_SIZE];
    pbkdf2::pbkdf2_hmac::<sha2::Sha256>(passphrase.as_bytes(), salt, KDF_ROUNDS, &mut material);
    let mut key = [0u8; KEY_SIZE];
    let mut iv = [0u8; IV_SIZE];
    key.copy_from_slice(&material[..KEY_SIZE]);
    iv.copy_from_slice(&material[KEY_SIZE..]);
    (key, iv)
}

fn encrypt(passphrase: &str, plaintext: &[u8]) -> Vec<u8> {
    let mut salt = [0u8; SALT_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut salt);
    let (key, iv) = derive_key_iv(passphrase, &salt);

    let ciphertext = Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(SALT_SIZE + ciphertext.len());
    out.extend_from_slice(&salt);
    out.extend_from_slice(&ciphertext);
    out
}

fn decrypt(passphrase: &str, input: &[u8]) -> std::result::Result<Vec<u8>, String> {
    if input.len() < SALT_SIZE {
        return Err("ciphertext shorter than salt header".to_string());
    }
    let (salt, ciphertext) = input.split_at(SALT_SIZE);
    let (key, iv) = derive_key_iv(passphrase, salt);

    Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| "invalid passphrase or corrupt ciphertext".to_string())
}

pub struct CipherFilter {
    mode: CipherMode,
    passphrase: String,
    input_buf: Vec<u8>,
    output_buf: Option<Vec<u8>>,
    cipher_error: Option<String>,
    offset: usize,
    flushing: bool,
    done: bool,
}

impl CipherFilter {
    pub fn new(mode: CipherMode, passphrase: impl Into<String>) -> Self {
        Self {
            mode,
            passphrase: passphrase.into(),
            input_buf: Vec::new(),
            output_buf: None,
            cipher_error: None,
            offset: 0,
            flushing: false,
            done: false,
        }
    }
}

impl IoFilter for CipherFilter {
    fn filter_type(&self) -> &'static str {
        match self.mode {
            CipherMode::Encrypt => "cipher-encrypt",
            CipherMode::Decrypt => "cipher-decrypt",
        }
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::in_out()
    }

    fn params(&self) -> Option<Pack> {
        let mut pack = Pack::new();
        pack.write_bool(matches!(self.mode, CipherMode::Encrypt));
        Some(pack)
    }

    fn process_in_out(&mut self, input: Option<&[u8]>, output: &mut ByteBuf) {
        match input {
            Some(bytes) => self.input_buf.extend_from_slice(bytes),
            None => {
                self.flushing = true;
                if self.output_buf.is_none() && self.cipher_error.is_none() {
                    let result = match self.mode {
                        CipherMode::Encrypt => Ok(encrypt(&self.passphrase, &self.input_buf)),
                        CipherMode::Decrypt => decrypt(&self.passphrase, &self.input_buf),
                    };
                    match result {
                        Ok(buf) => self.output_buf = Some(buf),
                        Err(e) => {
                            self.cipher_error = Some(e);
                            self.done = true;
                        }
                    }
                }
                if let Some(buf) = &self.output_buf {
                    let remaining = buf.len() - self.offset;
                    let take = remaining.min(output.remaining());
                    output.cat(buf, self.offset, take);
                    self.offset += take;
                    if self.offset == buf.len() {
                        self.done = true;
                    }
                }
            }
        }
    }

    fn is_input_same(&self) -> bool {
        self.flushing && !self.done
    }

    fn is_done(&self) -> bool {
        self.done
    }

    fn check_format(&self) -> Result<()> {
        match &self.cipher_error {
            Some(msg) => Err(PgxError::Cipher(msg.clone())),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::group::FilterGroup;

    #[test]
    fn encrypt_then_decrypt_with_same_passphrase_round_trips() {
        let input = b"POSTGRESQL.CONF contents go here".to_vec();

        let mut encode_group = FilterGroup::new(vec![Box::new(CipherFilter::new(CipherMode::Encrypt, "s3cret"))]);
        let mut encrypted = Vec::new();
        encode_group.run(&mut input.as_slice(), &mut encrypted).unwrap();
        assert_ne!(encrypted, input);

        let mut decode_group = FilterGroup::new(vec![Box::new(CipherFilter::new(CipherMode::Decrypt, "s3cret"))]);
        let mut decrypted = Vec::new();
        decode_group.run(&mut encrypted.as_slice(), &mut decrypted).unwrap();
        assert_eq!(decrypted, input);
    }

    #[test]
    fn wrong_passphrase_surfaces_as_cipher_error() {
        let input = b"some plaintext that is long enough to span blocks".to_vec();

        let mut encode_group = FilterGroup::new(vec![Box::new(CipherFilter::new(CipherMode::Encrypt, "correct-pass"))]);
        let mut encrypted = Vec::new();
        encode_group.run(&mut input.as_slice(), &mut encrypted).unwrap();

        let mut decode_group = FilterGroup::new(vec![Box::new(CipherFilter::new(CipherMode::Decrypt, "wrong-pass"))]);
        let mut decrypted = Vec::new();
        let result = decode_group.run(&mut encrypted.as_slice(), &mut decrypted);
        assert!(matches!(result, Err(PgxError::Cipher(_))));
    }
}
