use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};
use chrono::{DateTime, TimeZone, Utc};
use log::debug;
use smallvec::SmallVec;

use crate::crypto::aead::AeadAlgorithm;
use crate::crypto::hash::HashAlgorithm;
use crate::crypto::sym::SymmetricKeyAlgorithm;
use crate::errors::Result;
use crate::packet::signature::types::{Features, KeyFlags, Notation, RevocationCode};
use crate::packet::signature::Signature;
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{CompressionAlgorithm, Fingerprint, KeyId, KeyVersion};

/// Available signature subpacket types.
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-signature-subpacket-specifi>
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum SubpacketType {
    SignatureCreationTime,
    SignatureExpirationTime,
    ExportableCertification,
    TrustSignature,
    Revocable,
    KeyExpirationTime,
    PreferredSymmetricAlgorithms,
    IssuerKeyId,
    Notation,
    PreferredHashAlgorithms,
    PreferredCompressionAlgorithms,
    PreferredKeyServer,
    PrimaryUserId,
    PolicyURI,
    KeyFlags,
    SignersUserID,
    RevocationReason,
    Features,
    EmbeddedSignature,
    IssuerFingerprint,
    PreferredAead,
    Experimental(u8),
    Other(u8),
}

impl SubpacketType {
    pub fn as_u8(&self, is_critical: bool) -> u8 {
        let raw: u8 = match self {
            SubpacketType::SignatureCreationTime => 2,
            SubpacketType::SignatureExpirationTime => 3,
            SubpacketType::ExportableCertification => 4,
            SubpacketType::TrustSignature => 5,
            SubpacketType::Revocable => 7,
            SubpacketType::KeyExpirationTime => 9,
            SubpacketType::PreferredSymmetricAlgorithms => 11,
            SubpacketType::IssuerKeyId => 16,
            SubpacketType::Notation => 20,
            SubpacketType::PreferredHashAlgorithms => 21,
            SubpacketType::PreferredCompressionAlgorithms => 22,
            SubpacketType::PreferredKeyServer => 24,
            SubpacketType::PrimaryUserId => 25,
            SubpacketType::PolicyURI => 26,
            SubpacketType::KeyFlags => 27,
            SubpacketType::SignersUserID => 28,
            SubpacketType::RevocationReason => 29,
            SubpacketType::Features => 30,
            SubpacketType::EmbeddedSignature => 32,
            SubpacketType::IssuerFingerprint => 33,
            SubpacketType::PreferredAead => 39,
            SubpacketType::Experimental(n) => *n,
            SubpacketType::Other(n) => *n,
        };

        if is_critical {
            raw | 0b1000_0000
        } else {
            raw
        }
    }

    #[inline]
    pub fn from_u8(n: u8) -> (Self, bool) {
        let is_critical = (n >> 7) == 1;
        // remove critical bit
        let n = n & 0b0111_1111;

        let m = match n {
            2 => SubpacketType::SignatureCreationTime,
            3 => SubpacketType::SignatureExpirationTime,
            4 => SubpacketType::ExportableCertification,
            5 => SubpacketType::TrustSignature,
            7 => SubpacketType::Revocable,
            9 => SubpacketType::KeyExpirationTime,
            11 => SubpacketType::PreferredSymmetricAlgorithms,
            16 => SubpacketType::IssuerKeyId,
            20 => SubpacketType::Notation,
            21 => SubpacketType::PreferredHashAlgorithms,
            22 => SubpacketType::PreferredCompressionAlgorithms,
            24 => SubpacketType::PreferredKeyServer,
            25 => SubpacketType::PrimaryUserId,
            26 => SubpacketType::PolicyURI,
            27 => SubpacketType::KeyFlags,
            28 => SubpacketType::SignersUserID,
            29 => SubpacketType::RevocationReason,
            30 => SubpacketType::Features,
            32 => SubpacketType::EmbeddedSignature,
            33 => SubpacketType::IssuerFingerprint,
            39 => SubpacketType::PreferredAead,
            100..=110 => SubpacketType::Experimental(n),
            _ => SubpacketType::Other(n),
        };

        (m, is_critical)
    }
}

/// A subpacket length, encoded in one, two or five octets.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum SubpacketLength {
    One(u8),
    Two(u16),
    Five(u32),
}

impl SubpacketLength {
    pub(crate) fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let olen = i.read_u8()?;
        let len = match olen {
            0..=191 => Self::One(olen),
            192..=254 => {
                let a = i.read_u8()?;
                Self::Two(((u16::from(olen) - 192) << 8) + 192 + u16::from(a))
            }
            255 => Self::Five(i.read_be_u32()?),
        };
        Ok(len)
    }

    /// Encodes the given length into the minimal representation.
    pub(crate) fn encode(len: u32) -> Self {
        match len {
            0..=191 => Self::One(len as u8),
            // max 2 byte value: (254, 255) -> 16319
            192..=16319 => Self::Two(len as u16),
            _ => Self::Five(len),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::One(l) => *l as _,
            Self::Two(l) => *l as _,
            Self::Five(l) => *l as _,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Serialize for SubpacketLength {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        match self {
            Self::One(l) => {
                debug_assert!(*l < 192, "inconsistent SubpacketLength::One");
                writer.write_u8(*l)?;
            }
            Self::Two(l) => {
                writer.write_u8((((l - 192) >> 8) + 192) as u8)?;
                writer.write_u8(((l - 192) & 0xFF) as u8)?;
            }
            Self::Five(l) => {
                writer.write_u8(0xFF)?;
                writer.write_u32::<BigEndian>(*l)?;
            }
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        match self {
            Self::One(_) => 1,
            Self::Two(_) => 2,
            Self::Five(_) => 5,
        }
    }
}

/// A typed field in the hashed or unhashed area of a signature.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Subpacket {
    pub is_critical: bool,
    pub data: SubpacketData,
}

impl Subpacket {
    /// Construct a new regular subpacket.
    pub fn regular(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: false,
            data,
        }
    }

    /// Construct a new critical subpacket.
    pub fn critical(data: SubpacketData) -> Self {
        Subpacket {
            is_critical: true,
            data,
        }
    }

    pub fn typ(&self) -> SubpacketType {
        self.data.typ()
    }

    /// Parses a single subpacket, following its length header.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let len = SubpacketLength::try_from_reader(&mut i)?;
        ensure!(!len.is_empty(), "empty subpacket");

        let (typ, is_critical) = SubpacketType::from_u8(i.read_u8()?);
        let body = i.take_bytes(len.len() - 1)?;
        let data = SubpacketData::parse(typ, &body)?;

        Ok(Subpacket { is_critical, data })
    }
}

impl Serialize for Subpacket {
    fn to_writer<W: io::Write>(&self, writer: &mut W) -> Result<()> {
        let body = self.data.body_to_bytes()?;
        let len = SubpacketLength::encode((body.len() + 1).try_into()?);

        len.to_writer(writer)?;
        writer.write_u8(self.typ().as_u8(self.is_critical))?;
        writer.write_all(&body)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        let body_len = self.data.body_to_bytes().map(|b| b.len()).unwrap_or(0);
        SubpacketLength::encode((body_len + 1) as u32).write_len() + 1 + body_len
    }
}

/// The typed payload of a signature subpacket.
#[derive(derive_more::Debug, PartialEq, Eq, Clone)]
pub enum SubpacketData {
    /// The time the signature was made.
    SignatureCreationTime(DateTime<Utc>),
    /// The time the signature will expire, in seconds from creation time.
    SignatureExpirationTime(u32),
    /// When the key is going to expire, in seconds from key creation time.
    KeyExpirationTime(u32),
    /// The OpenPGP Key ID of the key issuing the signature.
    Issuer(KeyId),
    /// List of symmetric algorithms that indicate which algorithms the key
    /// holder prefers to use.
    PreferredSymmetricAlgorithms(SmallVec<[SymmetricKeyAlgorithm; 8]>),
    /// List of hash algorithms that indicate which algorithms the key holder
    /// prefers to use.
    PreferredHashAlgorithms(SmallVec<[HashAlgorithm; 8]>),
    /// List of compression algorithms that indicate which algorithms the key
    /// holder prefers to use.
    PreferredCompressionAlgorithms(SmallVec<[CompressionAlgorithm; 8]>),
    /// Preferred AEAD (cipher, mode) pairs.
    PreferredAeadAlgorithms(SmallVec<[(SymmetricKeyAlgorithm, AeadAlgorithm); 4]>),
    KeyFlags(KeyFlags),
    Features(Features),
    RevocationReason(RevocationCode, #[debug("{:?}", String::from_utf8_lossy(_1))] Vec<u8>),
    IsPrimary(bool),
    Revocable(bool),
    ExportableCertification(bool),
    EmbeddedSignature(Box<Signature>),
    PreferredKeyServer(String),
    Notation(Notation),
    SignersUserID(#[debug("{:?}", String::from_utf8_lossy(_0))] Vec<u8>),
    /// The URI of the policy under which the signature was issued.
    PolicyURI(String),
    TrustSignature(u8, u8),
    IssuerFingerprint(Fingerprint),
    Experimental(u8, #[debug("{}", hex::encode(_1))] Vec<u8>),
    Other(u8, #[debug("{}", hex::encode(_1))] Vec<u8>),
}

impl SubpacketData {
    pub fn typ(&self) -> SubpacketType {
        match self {
            SubpacketData::SignatureCreationTime(_) => SubpacketType::SignatureCreationTime,
            SubpacketData::SignatureExpirationTime(_) => SubpacketType::SignatureExpirationTime,
            SubpacketData::KeyExpirationTime(_) => SubpacketType::KeyExpirationTime,
            SubpacketData::Issuer(_) => SubpacketType::IssuerKeyId,
            SubpacketData::PreferredSymmetricAlgorithms(_) => {
                SubpacketType::PreferredSymmetricAlgorithms
            }
            SubpacketData::PreferredHashAlgorithms(_) => SubpacketType::PreferredHashAlgorithms,
            SubpacketData::PreferredCompressionAlgorithms(_) => {
                SubpacketType::PreferredCompressionAlgorithms
            }
            SubpacketData::PreferredAeadAlgorithms(_) => SubpacketType::PreferredAead,
            SubpacketData::KeyFlags(_) => SubpacketType::KeyFlags,
            SubpacketData::Features(_) => SubpacketType::Features,
            SubpacketData::RevocationReason(_, _) => SubpacketType::RevocationReason,
            SubpacketData::IsPrimary(_) => SubpacketType::PrimaryUserId,
            SubpacketData::Revocable(_) => SubpacketType::Revocable,
            SubpacketData::ExportableCertification(_) => SubpacketType::ExportableCertification,
            SubpacketData::EmbeddedSignature(_) => SubpacketType::EmbeddedSignature,
            SubpacketData::PreferredKeyServer(_) => SubpacketType::PreferredKeyServer,
            SubpacketData::Notation(_) => SubpacketType::Notation,
            SubpacketData::SignersUserID(_) => SubpacketType::SignersUserID,
            SubpacketData::PolicyURI(_) => SubpacketType::PolicyURI,
            SubpacketData::TrustSignature(_, _) => SubpacketType::TrustSignature,
            SubpacketData::IssuerFingerprint(_) => SubpacketType::IssuerFingerprint,
            SubpacketData::Experimental(n, _) => SubpacketType::Experimental(*n),
            SubpacketData::Other(n, _) => SubpacketType::Other(*n),
        }
    }

    fn parse(typ: SubpacketType, body: &[u8]) -> Result<Self> {
        let mut i = body;
        let data = match typ {
            SubpacketType::SignatureCreationTime => {
                let ts = i.read_be_u32()?;
                SubpacketData::SignatureCreationTime(
                    Utc.timestamp_opt(ts.into(), 0)
                        .single()
                        .ok_or_else(|| format_err!("invalid signature creation time"))?,
                )
            }
            SubpacketType::SignatureExpirationTime => {
                SubpacketData::SignatureExpirationTime(i.read_be_u32()?)
            }
            SubpacketType::KeyExpirationTime => SubpacketData::KeyExpirationTime(i.read_be_u32()?),
            SubpacketType::IssuerKeyId => {
                SubpacketData::Issuer(KeyId::from_slice(&i.take_bytes(8)?)?)
            }
            SubpacketType::PreferredSymmetricAlgorithms => {
                SubpacketData::PreferredSymmetricAlgorithms(
                    body.iter().map(|b| (*b).into()).collect(),
                )
            }
            SubpacketType::PreferredHashAlgorithms => {
                SubpacketData::PreferredHashAlgorithms(body.iter().map(|b| (*b).into()).collect())
            }
            SubpacketType::PreferredCompressionAlgorithms => {
                SubpacketData::PreferredCompressionAlgorithms(
                    body.iter().map(|b| (*b).into()).collect(),
                )
            }
            SubpacketType::PreferredAead => {
                ensure!(body.len() % 2 == 0, "invalid preferred AEAD subpacket");
                SubpacketData::PreferredAeadAlgorithms(
                    body.chunks(2)
                        .map(|pair| (pair[0].into(), pair[1].into()))
                        .collect(),
                )
            }
            SubpacketType::KeyFlags => {
                ensure!(!body.is_empty(), "empty key flags subpacket");
                SubpacketData::KeyFlags(body[0].into())
            }
            SubpacketType::Features => {
                ensure!(!body.is_empty(), "empty features subpacket");
                SubpacketData::Features(body[0].into())
            }
            SubpacketType::RevocationReason => {
                let code = RevocationCode::from(i.read_u8()?);
                SubpacketData::RevocationReason(code, i.rest()?)
            }
            SubpacketType::PrimaryUserId => SubpacketData::IsPrimary(i.read_u8()? == 1),
            SubpacketType::Revocable => SubpacketData::Revocable(i.read_u8()? == 1),
            SubpacketType::ExportableCertification => {
                SubpacketData::ExportableCertification(i.read_u8()? == 1)
            }
            SubpacketType::EmbeddedSignature => {
                let sig = Signature::from_reader(&mut i)?;
                SubpacketData::EmbeddedSignature(Box::new(sig))
            }
            SubpacketType::PreferredKeyServer => {
                SubpacketData::PreferredKeyServer(std::str::from_utf8(body)?.to_string())
            }
            SubpacketType::Notation => {
                let flags = i.read_array::<4>()?;
                let name_len = i.read_be_u16()?;
                let value_len = i.read_be_u16()?;
                let name = i.take_bytes(name_len.into())?;
                let value = i.take_bytes(value_len.into())?;
                SubpacketData::Notation(Notation {
                    readable: flags[0] & 0x80 != 0,
                    name,
                    value,
                })
            }
            SubpacketType::SignersUserID => SubpacketData::SignersUserID(body.to_vec()),
            SubpacketType::PolicyURI => {
                SubpacketData::PolicyURI(std::str::from_utf8(body)?.to_string())
            }
            SubpacketType::TrustSignature => {
                let depth = i.read_u8()?;
                let value = i.read_u8()?;
                SubpacketData::TrustSignature(depth, value)
            }
            SubpacketType::IssuerFingerprint => {
                let version = KeyVersion::from(i.read_u8()?);
                let fp = i.rest()?;
                SubpacketData::IssuerFingerprint(Fingerprint::new(version, &fp)?)
            }
            SubpacketType::Experimental(n) => SubpacketData::Experimental(n, body.to_vec()),
            SubpacketType::Other(n) => {
                debug!("unknown subpacket type {}", n);
                SubpacketData::Other(n, body.to_vec())
            }
        };

        Ok(data)
    }

    /// The body octets, without the length and type header.
    fn body_to_bytes(&self) -> Result<Vec<u8>> {
        let mut w = Vec::new();
        match self {
            SubpacketData::SignatureCreationTime(t) => {
                w.write_u32::<BigEndian>(t.timestamp().try_into()?)?;
            }
            SubpacketData::SignatureExpirationTime(d) => {
                w.write_u32::<BigEndian>(*d)?;
            }
            SubpacketData::KeyExpirationTime(d) => {
                w.write_u32::<BigEndian>(*d)?;
            }
            SubpacketData::Issuer(id) => {
                w.extend_from_slice(id.as_ref());
            }
            SubpacketData::PreferredSymmetricAlgorithms(algs) => {
                w.extend(algs.iter().map(|&a| u8::from(a)));
            }
            SubpacketData::PreferredHashAlgorithms(algs) => {
                w.extend(algs.iter().map(|&a| u8::from(a)));
            }
            SubpacketData::PreferredCompressionAlgorithms(algs) => {
                w.extend(algs.iter().map(|&a| u8::from(a)));
            }
            SubpacketData::PreferredAeadAlgorithms(pairs) => {
                for (sym, aead) in pairs {
                    w.push(u8::from(*sym));
                    w.push(u8::from(*aead));
                }
            }
            SubpacketData::KeyFlags(flags) => {
                w.push(u8::from(*flags));
            }
            SubpacketData::Features(features) => {
                w.push(u8::from(*features));
            }
            SubpacketData::RevocationReason(code, reason) => {
                w.push(u8::from(*code));
                w.extend_from_slice(reason);
            }
            SubpacketData::IsPrimary(is_primary) => {
                w.push(u8::from(*is_primary));
            }
            SubpacketData::Revocable(revocable) => {
                w.push(u8::from(*revocable));
            }
            SubpacketData::ExportableCertification(exportable) => {
                w.push(u8::from(*exportable));
            }
            SubpacketData::EmbeddedSignature(sig) => {
                sig.to_writer(&mut w)?;
            }
            SubpacketData::PreferredKeyServer(server) => {
                w.extend_from_slice(server.as_bytes());
            }
            SubpacketData::Notation(notation) => {
                let flags = [if notation.readable { 0x80 } else { 0 }, 0, 0, 0];
                w.extend_from_slice(&flags);
                w.write_u16::<BigEndian>(notation.name.len().try_into()?)?;
                w.write_u16::<BigEndian>(notation.value.len().try_into()?)?;
                w.extend_from_slice(&notation.name);
                w.extend_from_slice(&notation.value);
            }
            SubpacketData::SignersUserID(id) => {
                w.extend_from_slice(id);
            }
            SubpacketData::PolicyURI(uri) => {
                w.extend_from_slice(uri.as_bytes());
            }
            SubpacketData::TrustSignature(depth, value) => {
                w.push(*depth);
                w.push(*value);
            }
            SubpacketData::IssuerFingerprint(fp) => {
                w.push(fp.version().map(u8::from).unwrap_or(0));
                w.extend_from_slice(fp.as_bytes());
            }
            SubpacketData::Experimental(_, data) | SubpacketData::Other(_, data) => {
                w.extend_from_slice(data);
            }
        }
        Ok(w)
    }
}

/// Parses a length-prefixed subpacket area.
pub fn parse_subpacket_area(area: &[u8]) -> Result<Vec<Subpacket>> {
    let mut i = area;
    let mut packets = Vec::new();
    while i.has_remaining()? {
        packets.push(Subpacket::try_from_reader(&mut i)?);
    }
    Ok(packets)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn subpacket_len_edges() {
        const MAX_TWO_BYTE: usize = 16319;

        let len = SubpacketLength::encode(191);
        assert!(matches!(len, SubpacketLength::One(_)));
        assert_eq!(len.len(), 191);

        let len = SubpacketLength::encode(192);
        assert!(matches!(len, SubpacketLength::Two(_)));
        assert_eq!(len.len(), 192);

        let len = SubpacketLength::try_from_reader(&mut &[254u8, 255][..]).unwrap();
        assert!(matches!(len, SubpacketLength::Two(_)));
        assert_eq!(len.len(), MAX_TWO_BYTE);

        let len = SubpacketLength::encode(MAX_TWO_BYTE as u32 + 1);
        assert!(matches!(len, SubpacketLength::Five(_)));
    }

    #[test]
    fn subpacket_roundtrip() {
        let packets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(
                Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
            )),
            Subpacket::regular(SubpacketData::Issuer(KeyId::from([1, 2, 3, 4, 5, 6, 7, 8]))),
            Subpacket::regular(SubpacketData::KeyFlags({
                let mut f = KeyFlags::default();
                f.set_sign(true);
                f
            })),
            Subpacket::critical(SubpacketData::IssuerFingerprint(
                Fingerprint::new(KeyVersion::V4, &[7; 20]).unwrap(),
            )),
            Subpacket::regular(SubpacketData::PreferredSymmetricAlgorithms(
                [
                    SymmetricKeyAlgorithm::Aes128,
                    SymmetricKeyAlgorithm::Aes256,
                ]
                .into_iter()
                .collect(),
            )),
            Subpacket::regular(SubpacketData::Notation(Notation {
                readable: true,
                name: b"test@example.org".to_vec(),
                value: b"1".to_vec(),
            })),
        ];

        let mut area = Vec::new();
        for p in &packets {
            p.to_writer(&mut area).unwrap();
        }

        let back = parse_subpacket_area(&area).unwrap();
        assert_eq!(packets, back);
    }

    proptest! {
        #[test]
        fn subpacket_length_roundtrip(len in 0u32..100_000) {
            let encoded = SubpacketLength::encode(len);
            let mut buf = Vec::new();
            encoded.to_writer(&mut buf).unwrap();
            assert_eq!(buf.len(), encoded.write_len());
            let back = SubpacketLength::try_from_reader(&mut &buf[..]).unwrap();
            assert_eq!(back.len() as u32, len);
        }
    }
}
