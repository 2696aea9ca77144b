use std::io;

use crate::armor;
use crate::composed::message::canonicalize_text;
use crate::errors::Result;
use crate::packet::{Packet, Signature, SignatureType};
use crate::ser::Serialize;
use crate::types::PublicKeyTrait;

/// A detached signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StandaloneSignature {
    pub signature: Signature,
}

impl StandaloneSignature {
    pub fn new(signature: Signature) -> Self {
        StandaloneSignature { signature }
    }

    /// Parses a detached signature from armored text.
    pub fn from_string(input: &str) -> Result<Self> {
        let dearmored = armor::parse(input)?;
        ensure_eq!(
            dearmored.typ,
            armor::BlockType::Signature,
            "unexpected armor type"
        );
        Self::from_bytes(&dearmored.body)
    }

    /// Parses a detached signature from a binary packet stream.
    pub fn from_bytes(input: &[u8]) -> Result<Self> {
        let packets = crate::packet::from_bytes(input)?;
        let mut iter = packets.into_iter();
        let Some(Packet::Signature(signature)) = iter.next() else {
            bail!("expected a signature packet");
        };
        ensure!(iter.next().is_none(), "trailing packets after signature");

        Ok(StandaloneSignature { signature })
    }

    /// Verifies the signature over the given data.
    pub fn verify<P>(&self, key: &P, data: &[u8]) -> Result<()>
    where
        P: PublicKeyTrait,
    {
        if self.signature.typ() == SignatureType::Text {
            self.signature.verify(key, &canonicalize_text(data)?)
        } else {
            self.signature.verify(key, data)
        }
    }

    pub fn to_armored_writer(&self, writer: &mut impl io::Write) -> Result<()> {
        armor::write(self, armor::BlockType::Signature, writer, None, true)
    }

    pub fn to_armored_string(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.to_armored_writer(&mut buf)?;
        Ok(String::from_utf8(buf).map_err(|e| e.utf8_error())?)
    }
}

impl Serialize for StandaloneSignature {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        Packet::from(self.signature.clone()).to_writer(w)
    }
}
