use std::io;

use log::{debug, warn};
use rand::{CryptoRng, Rng};

use crate::armor;
use crate::composed::key::SignedSecretKey;
use crate::composed::signature::StandaloneSignature;
use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::line_writer::LineBreak;
use crate::normalize_lines::normalize_lines;
use crate::packet::{
    CompressedData, LiteralData, OnePassSignature, Packet, PublicKeyEncryptedSessionKey,
    Signature, SignatureConfig, SignatureType, SignatureVersionSpecific, SymEncryptedData,
    SymEncryptedProtectedData, SymKeyEncryptedSessionKey,
};
use crate::ser::Serialize;
use crate::types::{
    CompressionAlgorithm, PublicKeyTrait, SecretKeyTrait, SessionKey, StringToKey,
};

/// An encrypted session key packet: one candidate for session-key recovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Esk {
    PublicKeyEncryptedSessionKey(PublicKeyEncryptedSessionKey),
    SymKeyEncryptedSessionKey(SymKeyEncryptedSessionKey),
}

impl Serialize for Esk {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Esk::PublicKeyEncryptedSessionKey(p) => Packet::from(p.clone()).to_writer(w),
            Esk::SymKeyEncryptedSessionKey(p) => Packet::from(p.clone()).to_writer(w),
        }
    }
}

/// The encrypted payload of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edata {
    SymEncryptedData(SymEncryptedData),
    SymEncryptedProtectedData(SymEncryptedProtectedData),
}

impl Edata {
    fn decrypt(&self, session_key: &SessionKey) -> Result<Vec<u8>> {
        match self {
            Edata::SymEncryptedData(d) => {
                d.decrypt(session_key.as_bytes(), session_key.sym_alg())
            }
            Edata::SymEncryptedProtectedData(d) => {
                d.decrypt(session_key.as_bytes(), session_key.sym_alg())
            }
        }
    }
}

impl Serialize for Edata {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Edata::SymEncryptedData(p) => Packet::from(p.clone()).to_writer(w),
            Edata::SymEncryptedProtectedData(p) => Packet::from(p.clone()).to_writer(w),
        }
    }
}

/// An OpenPGP message.
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-openpgp-messages>
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    Literal(LiteralData),
    Compressed(CompressedData),
    Signed {
        /// The signed content. `None` for a bare (detached-style) signature
        /// packet stream.
        message: Option<Box<Message>>,
        one_pass_signature: Option<OnePassSignature>,
        signature: Signature,
    },
    Encrypted {
        esk: Vec<Esk>,
        edata: Edata,
    },
}

impl Serialize for Message {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        match self {
            Message::Literal(data) => Packet::from(data.clone()).to_writer(w),
            Message::Compressed(data) => Packet::from(data.clone()).to_writer(w),
            Message::Signed {
                message,
                one_pass_signature,
                signature,
            } => {
                if let Some(ops) = one_pass_signature {
                    Packet::from(ops.clone()).to_writer(w)?;
                }
                if let Some(message) = message {
                    message.to_writer(w)?;
                }
                Packet::from(signature.clone()).to_writer(w)?;
                Ok(())
            }
            Message::Encrypted { esk, edata } => {
                for esk in esk {
                    esk.to_writer(w)?;
                }
                edata.to_writer(w)?;
                Ok(())
            }
        }
    }
}

impl Message {
    pub fn new_literal(file_name: &[u8], text: &str) -> Self {
        Message::Literal(LiteralData::from_str(file_name, text))
    }

    pub fn new_literal_bytes(file_name: &[u8], data: &[u8]) -> Self {
        Message::Literal(LiteralData::from_bytes(file_name, data.to_vec()))
    }

    /// Parses a message from a binary packet stream.
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        let packets = crate::packet::from_bytes(input)?;
        let mut iter = packets.into_iter();
        let message = Self::from_packets(&mut iter)?;

        if let Some(packet) = iter.next() {
            // an encrypted message must contain exactly one data packet
            ensure!(
                !message.is_encrypted(),
                "malformed encrypted message: trailing {:?} packet",
                packet.tag()
            );
            warn!("trailing packet after message: {:?}", packet.tag());
        }

        Ok(message)
    }

    /// Parses a message from armored text.
    pub fn from_string(input: &str) -> Result<Self> {
        let dearmored = armor::parse(input)?;
        ensure_eq!(
            dearmored.typ,
            armor::BlockType::Message,
            "unexpected armor type"
        );
        Self::from_bytes(&dearmored.body)
    }

    /// Builds a message from a packet sequence, following the message
    /// grammar.
    fn from_packets(packets: &mut impl Iterator<Item = Packet>) -> Result<Self> {
        let Some(packet) = packets.next() else {
            bail!("empty message");
        };

        match packet {
            Packet::LiteralData(data) => Ok(Message::Literal(data)),
            Packet::CompressedData(data) => Ok(Message::Compressed(data)),
            Packet::OnePassSignature(ops) => {
                let message = Self::from_packets(packets)?;
                let Some(Packet::Signature(signature)) = packets.next() else {
                    bail!("missing signature for one pass signature");
                };

                Ok(Message::Signed {
                    message: Some(Box::new(message)),
                    one_pass_signature: Some(ops),
                    signature,
                })
            }
            Packet::Signature(signature) => {
                // prefixed signature form: the signed message follows
                let message = match Self::from_packets(packets) {
                    Ok(message) => Some(Box::new(message)),
                    Err(_) => None,
                };

                Ok(Message::Signed {
                    message,
                    one_pass_signature: None,
                    signature,
                })
            }
            Packet::PublicKeyEncryptedSessionKey(first) => {
                Self::parse_encrypted(Esk::PublicKeyEncryptedSessionKey(first), packets)
            }
            Packet::SymKeyEncryptedSessionKey(first) => {
                Self::parse_encrypted(Esk::SymKeyEncryptedSessionKey(first), packets)
            }
            other => bail!("unexpected packet in message: {:?}", other.tag()),
        }
    }

    fn parse_encrypted(
        first: Esk,
        packets: &mut impl Iterator<Item = Packet>,
    ) -> Result<Self> {
        let mut esk = vec![first];

        for packet in packets.by_ref() {
            match packet {
                Packet::PublicKeyEncryptedSessionKey(p) => {
                    esk.push(Esk::PublicKeyEncryptedSessionKey(p));
                }
                Packet::SymKeyEncryptedSessionKey(p) => {
                    esk.push(Esk::SymKeyEncryptedSessionKey(p));
                }
                Packet::SymEncryptedProtectedData(p) => {
                    return Ok(Message::Encrypted {
                        esk,
                        edata: Edata::SymEncryptedProtectedData(p),
                    });
                }
                Packet::SymEncryptedData(p) => {
                    return Ok(Message::Encrypted {
                        esk,
                        edata: Edata::SymEncryptedData(p),
                    });
                }
                other => {
                    bail!(
                        "unexpected packet in encrypted message: {:?}",
                        other.tag()
                    );
                }
            }
        }

        bail!("missing encrypted data packet");
    }

    /// The literal data, if this message is (or wraps) one.
    pub fn get_literal(&self) -> Option<&LiteralData> {
        match self {
            Message::Literal(data) => Some(data),
            Message::Signed { message, .. } => message.as_ref().and_then(|m| m.get_literal()),
            _ => None,
        }
    }

    pub fn is_encrypted(&self) -> bool {
        matches!(self, Message::Encrypted { .. })
    }

    pub fn is_literal(&self) -> bool {
        self.get_literal().is_some()
    }

    /// The raw data of the contained literal packet.
    pub fn get_content(&self) -> Option<Vec<u8>> {
        self.get_literal().map(|l| l.data().to_vec())
    }

    /// Signs the message with a one-pass signature frame.
    pub fn sign<R, K, F>(self, rng: &mut R, key: &K, key_pw: F, hash: HashAlgorithm) -> Result<Self>
    where
        R: CryptoRng + Rng,
        K: SecretKeyTrait,
        F: FnOnce() -> String,
    {
        let (typ, data) = match self.get_literal() {
            Some(literal) if literal.is_text() => (
                SignatureType::Text,
                canonicalize_text(literal.data())?,
            ),
            Some(literal) => (SignatureType::Binary, literal.data().to_vec()),
            None => bail!("only literal messages can be signed"),
        };

        let mut config = SignatureConfig::from_key(rng, key, typ)?;
        config.set_hash_alg(rng, hash)?;

        let signature = config.sign(key, key_pw, &data)?;

        let mut ops = match signature.version() {
            crate::packet::SignatureVersion::V6 => {
                let SignatureVersionSpecific::V6 { ref salt } = signature.config.version_specific
                else {
                    unreachable!("v6 signature always has a salt")
                };
                OnePassSignature::v6(typ, hash, key.algorithm(), salt.clone(), key.fingerprint())
            }
            _ => OnePassSignature::v3(typ, hash, key.algorithm(), key.key_id()),
        };

        // nesting flag: set on all but the outermost
        if matches!(
            self,
            Message::Signed {
                one_pass_signature: Some(_),
                ..
            }
        ) {
            ops.set_nested();
        }

        Ok(Message::Signed {
            message: Some(Box::new(self)),
            one_pass_signature: Some(ops),
            signature,
        })
    }

    /// Creates a detached signature over the message's literal data.
    pub fn sign_detached<R, K, F>(
        &self,
        rng: &mut R,
        key: &K,
        key_pw: F,
        hash: HashAlgorithm,
    ) -> Result<StandaloneSignature>
    where
        R: CryptoRng + Rng,
        K: SecretKeyTrait,
        F: FnOnce() -> String,
    {
        let (typ, data) = match self.get_literal() {
            Some(literal) if literal.is_text() => (
                SignatureType::Text,
                canonicalize_text(literal.data())?,
            ),
            Some(literal) => (SignatureType::Binary, literal.data().to_vec()),
            None => bail!("only literal messages can be signed"),
        };

        let mut config = SignatureConfig::from_key(rng, key, typ)?;
        config.set_hash_alg(rng, hash)?;

        let signature = config.sign(key, key_pw, &data)?;
        Ok(StandaloneSignature::new(signature))
    }

    /// Verifies the signatures of a signed message against `key`.
    pub fn verify<P>(&self, key: &P) -> Result<()>
    where
        P: PublicKeyTrait,
    {
        match self {
            Message::Signed {
                message, signature, ..
            } => {
                let Some(message) = message else {
                    bail!("no signed content");
                };
                let Some(literal) = message.get_literal() else {
                    bail!("no literal data to verify");
                };

                let data = if signature.typ() == SignatureType::Text {
                    canonicalize_text(literal.data())?
                } else {
                    literal.data().to_vec()
                };
                signature.verify(key, &data)?;

                // nested signatures are all checked
                if let Message::Signed { .. } = &**message {
                    message.verify(key)?;
                }
                Ok(())
            }
            _ => bail!("not a signed message"),
        }
    }

    /// Compresses the message.
    pub fn compress(&self, alg: CompressionAlgorithm) -> Result<Self> {
        let data = self.to_bytes()?;
        Ok(Message::Compressed(CompressedData::compress(alg, &data)?))
    }

    /// Decompresses the message one level.
    pub fn decompress(self) -> Result<Self> {
        match self {
            Message::Compressed(data) => Message::from_bytes(&data.decompress()?),
            _ => Ok(self),
        }
    }

    /// Encrypts the message to the given recipient keys and/or passphrases,
    /// per the session-key protocol: one PKESK per recipient, one SKESK per
    /// passphrase, a single SEIPD v1 payload.
    pub fn encrypt<R, K>(
        &self,
        rng: &mut R,
        keys: &[&K],
        passwords: &[&str],
        sym_alg: SymmetricKeyAlgorithm,
    ) -> Result<Self>
    where
        R: CryptoRng + Rng,
        K: PublicKeyTrait,
    {
        ensure!(
            !keys.is_empty() || !passwords.is_empty(),
            "missing recipients and passphrases"
        );

        let session_key = SessionKey::generate(rng, sym_alg);

        let mut esk = Vec::with_capacity(keys.len() + passwords.len());
        for key in keys {
            esk.push(Esk::PublicKeyEncryptedSessionKey(
                PublicKeyEncryptedSessionKey::from_session_key(rng, &session_key, *key)?,
            ));
        }
        for password in passwords {
            let s2k = StringToKey::new_default(rng);
            esk.push(Esk::SymKeyEncryptedSessionKey(
                SymKeyEncryptedSessionKey::encrypt(password, &session_key, s2k)?,
            ));
        }

        let plaintext = self.to_bytes()?;
        let edata = Edata::SymEncryptedProtectedData(SymEncryptedProtectedData::encrypt_v1(
            rng,
            sym_alg,
            session_key.as_bytes(),
            &plaintext,
        )?);

        Ok(Message::Encrypted { esk, edata })
    }

    /// Like [`Message::encrypt`], with a SEIPD v2 (AEAD) payload and v6
    /// SKESK packets.
    pub fn encrypt_seipd_v2<R, K>(
        &self,
        rng: &mut R,
        keys: &[&K],
        passwords: &[&str],
        sym_alg: SymmetricKeyAlgorithm,
        aead: AeadAlgorithm,
        chunk_size: u8,
    ) -> Result<Self>
    where
        R: CryptoRng + Rng,
        K: PublicKeyTrait,
    {
        ensure!(
            !keys.is_empty() || !passwords.is_empty(),
            "missing recipients and passphrases"
        );

        let session_key = SessionKey::generate(rng, sym_alg);

        let mut esk = Vec::with_capacity(keys.len() + passwords.len());
        for key in keys {
            esk.push(Esk::PublicKeyEncryptedSessionKey(
                PublicKeyEncryptedSessionKey::from_session_key(rng, &session_key, *key)?,
            ));
        }
        for password in passwords {
            let s2k = StringToKey::new_default(rng);
            esk.push(Esk::SymKeyEncryptedSessionKey(
                SymKeyEncryptedSessionKey::encrypt_v6(
                    rng,
                    password,
                    &session_key,
                    s2k,
                    aead,
                )?,
            ));
        }

        let plaintext = self.to_bytes()?;
        let edata = Edata::SymEncryptedProtectedData(SymEncryptedProtectedData::encrypt_v2(
            rng,
            sym_alg,
            aead,
            chunk_size,
            session_key.as_bytes(),
            &plaintext,
        )?);

        Ok(Message::Encrypted { esk, edata })
    }

    /// Recovers the session key: passphrases are tried first (when given),
    /// then each PKESK whose key id and algorithm match an available
    /// decryption key. The first success wins; every failure is recorded and
    /// surfaced when all candidates are exhausted.
    pub fn decrypt_session_key<F>(
        &self,
        key_pw: F,
        keys: &[&SignedSecretKey],
        passwords: &[&str],
    ) -> Result<SessionKey>
    where
        F: Fn() -> String,
    {
        let Message::Encrypted { esk, .. } = self else {
            bail!("not an encrypted message");
        };

        let mut reasons: Vec<String> = Vec::new();

        if !passwords.is_empty() {
            for esk in esk.iter() {
                let Esk::SymKeyEncryptedSessionKey(skesk) = esk else {
                    continue;
                };
                for password in passwords {
                    match skesk.decrypt(password) {
                        Ok(session_key) => return Ok(session_key),
                        Err(err) => {
                            debug!("skesk attempt failed: {:?}", err);
                            reasons.push(format!("skesk: {}", err));
                        }
                    }
                }
            }
        }

        let now = chrono::Utc::now();
        for esk in esk.iter() {
            let Esk::PublicKeyEncryptedSessionKey(pkesk) = esk else {
                continue;
            };

            for key in keys {
                // candidates are matched on key id and algorithm before any
                // crypto is attempted
                let candidates = key.decryption_keys_at(
                    (!pkesk.id().is_wildcard()).then(|| pkesk.id()).copied().as_ref(),
                    now,
                );

                for candidate in candidates {
                    if !pkesk.matches(&candidate) {
                        continue;
                    }

                    let attempt = candidate
                        .decrypt_session_key(&key_pw, pkesk.values())
                        .and_then(|m| pkesk.session_key_from_plain(&m));

                    match attempt {
                        Ok(session_key) => return Ok(session_key),
                        Err(err) => {
                            warn!("pkesk attempt failed: {:?}", err);
                            reasons.push(format!("pkesk {:?}: {}", pkesk.id(), err));
                        }
                    }
                }
            }
        }

        if reasons.is_empty() {
            reasons.push("no matching session key candidates".to_string());
        }

        Err(Error::SessionKeyDecryptionFailed {
            reasons,
            backtrace: None,
        })
    }

    /// Decrypts the message with the given keys and/or passphrases and
    /// parses the contained message.
    pub fn decrypt<F>(
        &self,
        key_pw: F,
        keys: &[&SignedSecretKey],
        passwords: &[&str],
    ) -> Result<Message>
    where
        F: Fn() -> String,
    {
        let Message::Encrypted { edata, .. } = self else {
            bail!("not an encrypted message");
        };

        let session_key = self.decrypt_session_key(key_pw, keys, passwords)?;
        let plaintext = edata.decrypt(&session_key)?;

        let message = Message::from_bytes(&plaintext)?;
        message.decompress()
    }

    pub fn to_armored_writer(&self, writer: &mut impl io::Write) -> Result<()> {
        armor::write(self, armor::BlockType::Message, writer, None, true)
    }

    pub fn to_armored_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf)?;
        Ok(String::from_utf8(buf).map_err(|e| e.utf8_error())?)
    }
}

/// Canonicalizes text for text-mode signature hashing: CRLF line endings,
/// trailing space and tab stripped from each line, no trailing newline
/// after the last line.
pub(crate) fn canonicalize_text(data: &[u8]) -> Result<Vec<u8>> {
    let text = std::str::from_utf8(data)?;
    let text = normalize_lines(text, LineBreak::Crlf);

    let mut lines: Vec<&str> = text.split("\r\n").collect();
    // a trailing line ending does not start a new (empty) line
    if lines.last() == Some(&"") {
        lines.pop();
    }

    let mut out = Vec::with_capacity(data.len());
    let mut first = true;
    for line in lines {
        if !first {
            out.extend_from_slice(b"\r\n");
        }
        first = false;
        out.extend_from_slice(line.trim_end_matches([' ', '\t']).as_bytes());
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_text() {
        assert_eq!(canonicalize_text(b"a \nb\t\r\nc").unwrap(), b"a\r\nb\r\nc");
        // trailing whitespace is stripped, the final newline dropped
        assert_eq!(
            canonicalize_text(b"Line 1  \r\nLine 2\r\n").unwrap(),
            b"Line 1\r\nLine 2"
        );
        assert_eq!(canonicalize_text(b"").unwrap(), b"");
    }

    #[test]
    fn literal_roundtrip_via_armor() {
        let message = Message::new_literal_bytes(b"file", b"hello openpgp");
        let armored = message.to_armored_string().unwrap();
        assert!(armored.starts_with("-----BEGIN PGP MESSAGE-----"));

        let back = Message::from_string(&armored).unwrap();
        assert_eq!(message, back);
    }
}
