use std::io;

use rand::{CryptoRng, Rng};

use crate::armor::{self, BlockType, Headers};
use crate::composed::message::canonicalize_text;
use crate::composed::signature::StandaloneSignature;
use crate::crypto::hash::HashAlgorithm;
use crate::errors::Result;
use crate::packet::{SignatureConfig, SignatureType};
use crate::types::{PublicKeyTrait, SecretKeyTrait};

/// A cleartext signed message: human-readable text together with a
/// signature over its canonical form.
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-cleartext-signature-framewo>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CleartextSignedMessage {
    /// The text, as provided (not dash-escaped, native line endings).
    text: String,
    signatures: Vec<StandaloneSignature>,
}

impl CleartextSignedMessage {
    /// Signs the given text.
    pub fn sign<R, K, F>(
        rng: &mut R,
        text: &str,
        key: &K,
        key_pw: F,
        hash: HashAlgorithm,
    ) -> Result<Self>
    where
        R: CryptoRng + Rng,
        K: SecretKeyTrait,
        F: FnOnce() -> String,
    {
        let mut config = SignatureConfig::from_key(rng, key, SignatureType::Text)?;
        config.set_hash_alg(rng, hash)?;

        let canonical = canonicalize_text(text.as_bytes())?;
        let signature = config.sign(key, key_pw, &canonical)?;

        Ok(CleartextSignedMessage {
            text: text.to_string(),
            signatures: vec![StandaloneSignature::new(signature)],
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn signatures(&self) -> &[StandaloneSignature] {
        &self.signatures
    }

    /// Verifies every signature over the canonical form of the text.
    pub fn verify<P>(&self, key: &P) -> Result<()>
    where
        P: PublicKeyTrait,
    {
        ensure!(!self.signatures.is_empty(), "no signatures");

        let canonical = canonicalize_text(self.text.as_bytes())?;
        for signature in &self.signatures {
            signature.signature.verify(key, &canonical)?;
        }
        Ok(())
    }

    /// Writes the full cleartext framework: signed-message header, `Hash`
    /// armor headers, dash-escaped text, and the armored signatures.
    pub fn to_armored_writer(&self, writer: &mut impl io::Write) -> Result<()> {
        let mut hashes: Vec<String> = self
            .signatures
            .iter()
            .map(|sig| sig.signature.hash_alg().to_string().to_uppercase())
            .collect();
        hashes.sort();
        hashes.dedup();

        let mut headers = Headers::new();
        headers.insert("Hash".to_string(), vec![hashes.join(",")]);

        armor::write_header(writer, BlockType::CleartextMessage, Some(&headers))?;

        for line in self.text.lines() {
            // dash-escape lines starting with a dash
            if line.starts_with('-') {
                writer.write_all(b"- ")?;
            }
            writer.write_all(line.as_bytes())?;
            writer.write_all(b"\n")?;
        }

        for signature in &self.signatures {
            signature.to_armored_writer(writer)?;
        }

        Ok(())
    }

    pub fn to_armored_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf)?;
        Ok(String::from_utf8(buf).map_err(|e| e.utf8_error())?)
    }

    /// Parses the cleartext framework.
    pub fn from_string(input: &str) -> Result<Self> {
        let mut lines = input.lines();

        // the signed message header
        loop {
            let Some(line) = lines.next() else {
                bail!("missing cleartext header");
            };
            if line.trim_end() == "-----BEGIN PGP SIGNED MESSAGE-----" {
                break;
            }
        }

        // headers (typically `Hash`), up to the blank separator
        for line in lines.by_ref() {
            if line.trim_end().is_empty() {
                break;
            }
            ensure!(
                line.contains(": "),
                "invalid cleartext armor header: {:?}",
                line
            );
        }

        // the text, dash-unescaped, up to the signature block
        let mut text_lines = Vec::new();
        let mut in_signature = false;
        let mut signature_text = String::new();
        for line in lines {
            if !in_signature && line.trim_end() == "-----BEGIN PGP SIGNATURE-----" {
                in_signature = true;
            }
            if in_signature {
                signature_text.push_str(line);
                signature_text.push('\n');
            } else {
                let line = line.strip_prefix("- ").unwrap_or(line);
                text_lines.push(line);
            }
        }
        ensure!(in_signature, "missing signature block");

        // the blank line before the signature belongs to the framework, and
        // the text carries no trailing newline
        let text = text_lines.join("\n");
        let text = text.strip_suffix('\n').unwrap_or(&text).to_string();

        let signature = StandaloneSignature::from_string(&signature_text)?;

        Ok(CleartextSignedMessage {
            text,
            signatures: vec![signature],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dash_escape_roundtrip_text() {
        let text = "normal line\n- already dashed\n-----BEGIN something";
        let msg = CleartextSignedMessage {
            text: text.to_string(),
            signatures: vec![],
        };

        let mut out = Vec::new();
        // writing only the text part; no signatures to append
        msg.to_armored_writer(&mut out).unwrap();
        let rendered = String::from_utf8(out).unwrap();

        assert!(rendered.contains("\n- - already dashed\n"));
        assert!(rendered.contains("\n- -----BEGIN something\n"));
    }
}
