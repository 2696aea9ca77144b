mod config;
mod subpacket;
mod types;

use std::io::{self, BufRead};

use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use chrono::{DateTime, Duration, Utc};
use log::debug;

use crate::crypto::hash::{HashAlgorithm, Hasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::{Error, Result};
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::types::{
    Fingerprint, KeyId, Mpi, PublicKeyTrait, SignatureBytes, Tag,
};

pub use self::config::{SignatureConfig, SignatureVersionSpecific};
pub use self::subpacket::{
    parse_subpacket_area, Subpacket, SubpacketData, SubpacketLength, SubpacketType,
};
pub use self::types::{
    Features, KeyFlags, Notation, RevocationCode, SignatureType, SignatureVersion,
};

/// Signature Packet
/// <https://www.rfc-editor.org/rfc/rfc9580.html#name-signature-packet-type-id-2>
#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Signature {
    pub config: SignatureConfig,
    #[debug("{}", hex::encode(signed_hash_value))]
    pub signed_hash_value: [u8; 2],
    pub signature: SignatureBytes,
}

impl Signature {
    pub fn from_config(
        config: SignatureConfig,
        signed_hash_value: [u8; 2],
        signature: SignatureBytes,
    ) -> Self {
        Signature {
            config,
            signed_hash_value,
            signature,
        }
    }

    /// Parses a signature packet body.
    pub fn from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let version = SignatureVersion::from(i.read_u8()?);

        match version {
            SignatureVersion::V4 | SignatureVersion::V6 => {}
            _ => unsupported_err!("signature version {:?}", version),
        }

        let typ = SignatureType::from(i.read_u8()?);
        let pub_alg = PublicKeyAlgorithm::from(i.read_u8()?);
        let hash_alg = HashAlgorithm::from(i.read_u8()?);

        let hashed_len = match version {
            SignatureVersion::V4 => u32::from(i.read_be_u16()?),
            _ => i.read_be_u32()?,
        };
        let hashed_area = i.take_bytes(hashed_len.try_into()?)?;
        let hashed_subpackets = parse_subpacket_area(&hashed_area)?;

        let unhashed_len = match version {
            SignatureVersion::V4 => u32::from(i.read_be_u16()?),
            _ => i.read_be_u32()?,
        };
        let unhashed_area = i.take_bytes(unhashed_len.try_into()?)?;
        let unhashed_subpackets = parse_subpacket_area(&unhashed_area)?;

        let signed_hash_value = i.read_array::<2>()?;

        let version_specific = match version {
            SignatureVersion::V6 => {
                let salt_len = i.read_u8()?;
                let salt = i.take_bytes(salt_len.into())?;
                SignatureVersionSpecific::V6 { salt }
            }
            _ => SignatureVersionSpecific::V4,
        };

        let signature = match pub_alg {
            PublicKeyAlgorithm::RSA
            | PublicKeyAlgorithm::RSAEncrypt
            | PublicKeyAlgorithm::RSASign => {
                SignatureBytes::Mpis(vec![Mpi::try_from_reader(&mut i)?])
            }
            PublicKeyAlgorithm::DSA
            | PublicKeyAlgorithm::ECDSA
            | PublicKeyAlgorithm::EdDSALegacy => SignatureBytes::Mpis(vec![
                Mpi::try_from_reader(&mut i)?,
                Mpi::try_from_reader(&mut i)?,
            ]),
            PublicKeyAlgorithm::Ed25519 => SignatureBytes::Native(i.take_bytes(64)?),
            _ => SignatureBytes::Native(i.rest()?),
        };

        Ok(Signature {
            config: SignatureConfig {
                typ,
                pub_alg,
                hash_alg,
                hashed_subpackets,
                unhashed_subpackets,
                version_specific,
            },
            signed_hash_value,
            signature,
        })
    }

    pub fn version(&self) -> SignatureVersion {
        self.config.version()
    }

    pub fn typ(&self) -> SignatureType {
        self.config.typ
    }

    pub fn hash_alg(&self) -> HashAlgorithm {
        self.config.hash_alg
    }

    pub fn tag(&self) -> Tag {
        Tag::Signature
    }

    /// Signature Creation Time, from the hashed area.
    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.config.created()
    }

    /// Issuer Key IDs, from both areas (the ID is only a hint).
    pub fn issuer(&self) -> Vec<&KeyId> {
        self.config.issuer()
    }

    /// Issuer fingerprints, from both areas.
    pub fn issuer_fingerprint(&self) -> Vec<&Fingerprint> {
        self.config.issuer_fingerprint()
    }

    /// Signature expiration time, in seconds after the creation time.
    pub fn signature_expiration_time(&self) -> Option<u32> {
        self.config.hashed_subpackets().find_map(|p| match p.data {
            SubpacketData::SignatureExpirationTime(d) => Some(d),
            _ => None,
        })
    }

    /// Key expiration time carried by this signature, in seconds after the
    /// key creation time.
    pub fn key_expiration_time(&self) -> Option<u32> {
        self.config.hashed_subpackets().find_map(|p| match p.data {
            SubpacketData::KeyExpirationTime(d) => Some(d),
            _ => None,
        })
    }

    pub fn key_flags(&self) -> KeyFlags {
        self.config
            .hashed_subpackets()
            .find_map(|p| match p.data {
                SubpacketData::KeyFlags(flags) => Some(flags),
                _ => None,
            })
            .unwrap_or_default()
    }

    pub fn is_primary_user_id(&self) -> bool {
        self.config
            .hashed_subpackets()
            .any(|p| matches!(p.data, SubpacketData::IsPrimary(true)))
    }

    pub fn embedded_signature(&self) -> Option<&Signature> {
        self.config
            .hashed_subpackets()
            .chain(self.config.unhashed_subpackets())
            .find_map(|p| match &p.data {
                SubpacketData::EmbeddedSignature(sig) => Some(&**sig),
                _ => None,
            })
    }

    pub fn revocation_reason(&self) -> Option<(RevocationCode, &[u8])> {
        self.config.hashed_subpackets().find_map(|p| match &p.data {
            SubpacketData::RevocationReason(code, reason) => Some((*code, &reason[..])),
            _ => None,
        })
    }

    /// Checks whether the signature is timely at `at`: created in the past
    /// (relative to `at`) and not yet expired.
    pub fn check_validity_at(&self, at: DateTime<Utc>) -> Result<()> {
        let Some(created) = self.created() else {
            return Err(self.invalid("missing signature creation time"));
        };
        if *created > at {
            return Err(self.invalid("signature created in the future"));
        }
        if let Some(expiration) = self.signature_expiration_time() {
            if *created + Duration::seconds(expiration.into()) < at {
                return Err(self.invalid("signature is expired"));
            }
        }
        Ok(())
    }

    /// Checks that the issuer hints and the key algorithm match `key`.
    pub fn check_issuer<P>(&self, key: &P) -> Result<()>
    where
        P: PublicKeyTrait,
    {
        if self.config.pub_alg != key.algorithm() {
            return Err(self.invalid("key algorithm mismatch"));
        }

        let issuers = self.issuer();
        if !issuers.is_empty() && !issuers.contains(&&key.key_id()) {
            return Err(self.invalid("issuer key id mismatch"));
        }

        let fingerprints = self.issuer_fingerprint();
        if !fingerprints.is_empty() && !fingerprints.contains(&&key.fingerprint()) {
            return Err(self.invalid("issuer fingerprint mismatch"));
        }

        Ok(())
    }

    fn invalid(&self, reason: &str) -> Error {
        Error::SignatureInvalid {
            message: reason.to_string(),
            backtrace: None,
        }
    }

    /// Shared verification tail: hash the signature metadata, compare the
    /// signed-digest prefix, dispatch to the algorithm.
    fn finish_verification<P>(&self, key: &P, mut hasher: Box<dyn Hasher>) -> Result<()>
    where
        P: PublicKeyTrait,
    {
        // a critical subpacket of unknown type invalidates the signature
        if self.config.has_unknown_critical_subpacket() {
            return Err(self.invalid("unknown critical subpacket"));
        }

        let len = self.config.hash_signature_data(&mut *hasher)?;
        hasher.update(&self.config.trailer(len)?);

        let digest = hasher.finish();

        if digest[0..2] != self.signed_hash_value {
            debug!(
                "signed hash prefix mismatch: {} != {}",
                hex::encode(&digest[0..2]),
                hex::encode(self.signed_hash_value)
            );
            return Err(self.invalid("signed hash prefix mismatch"));
        }

        key.verify_signature(self.config.hash_alg, &digest, &self.signature)
            .map_err(|err| self.invalid(&format!("cryptographic verification failed: {}", err)))
    }

    fn new_hasher(&self) -> Result<Box<dyn Hasher>> {
        let mut hasher = self.config.hash_alg.new_hasher()?;
        if let SignatureVersionSpecific::V6 { salt } = &self.config.version_specific {
            hasher.update(salt);
        }
        Ok(hasher)
    }

    /// Verify a signature of type Binary or Text over `data`.
    ///
    /// Text-mode input is expected to already be in canonical (CRLF) form.
    pub fn verify<P>(&self, key: &P, data: &[u8]) -> Result<()>
    where
        P: PublicKeyTrait,
    {
        ensure!(
            matches!(self.typ(), SignatureType::Binary | SignatureType::Text),
            "invalid signature type for data verification: {:?}",
            self.typ()
        );
        self.check_issuer(key)?;
        self.check_validity_at(Utc::now())?;

        let mut hasher = self.new_hasher()?;
        hasher.update(data);

        self.finish_verification(key, hasher)
    }

    /// Verify a certification over `key` and the given User ID or attribute
    /// packet. `signer` issued the certification.
    pub fn verify_certification<P, K>(
        &self,
        signer: &P,
        key: &K,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<()>
    where
        P: PublicKeyTrait,
        K: PublicKeyTrait,
    {
        ensure!(
            self.typ().is_certification(),
            "invalid signature type for certification verification: {:?}",
            self.typ()
        );
        self.check_issuer(signer)?;

        let mut hasher = self.new_hasher()?;
        key.serialize_for_hashing(&mut hasher_writer(&mut hasher))?;

        let packet_buf = id.to_bytes()?;
        let prefix = match tag {
            Tag::UserId => 0xB4,
            Tag::UserAttribute => 0xD1,
            _ => bail!("invalid tag for certification: {:?}", tag),
        };

        let mut prefix_buf = [prefix, 0u8, 0, 0, 0];
        BigEndian::write_u32(&mut prefix_buf[1..], packet_buf.len().try_into()?);
        hasher.update(&prefix_buf);
        hasher.update(&packet_buf);

        self.finish_verification(signer, hasher)
    }

    /// Verify a subkey binding (or subkey revocation) signature issued by the
    /// primary key over `primary || subkey`.
    pub fn verify_key_binding<P, S>(&self, primary: &P, subkey: &S) -> Result<()>
    where
        P: PublicKeyTrait,
        S: PublicKeyTrait,
    {
        ensure!(
            matches!(
                self.typ(),
                SignatureType::SubkeyBinding | SignatureType::SubkeyRevocation
            ),
            "invalid signature type for binding verification: {:?}",
            self.typ()
        );
        self.check_issuer(primary)?;

        let mut hasher = self.new_hasher()?;
        {
            let mut w = hasher_writer(&mut hasher);
            primary.serialize_for_hashing(&mut w)?;
            subkey.serialize_for_hashing(&mut w)?;
        }

        self.finish_verification(primary, hasher)
    }

    /// Verify an embedded primary-key binding ("back signature"), issued by
    /// the signing-capable subkey over `primary || subkey`.
    pub fn verify_primary_key_binding<P, S>(&self, primary: &P, subkey: &S) -> Result<()>
    where
        P: PublicKeyTrait,
        S: PublicKeyTrait,
    {
        ensure!(
            self.typ() == SignatureType::KeyBinding,
            "invalid signature type for back signature verification: {:?}",
            self.typ()
        );
        self.check_issuer(subkey)?;

        let mut hasher = self.new_hasher()?;
        {
            let mut w = hasher_writer(&mut hasher);
            primary.serialize_for_hashing(&mut w)?;
            subkey.serialize_for_hashing(&mut w)?;
        }

        self.finish_verification(subkey, hasher)
    }

    /// Verify a direct-key or key-revocation signature over `key` alone,
    /// issued by `signer`.
    pub fn verify_key<P, K>(&self, signer: &P, key: &K) -> Result<()>
    where
        P: PublicKeyTrait,
        K: PublicKeyTrait,
    {
        ensure!(
            matches!(
                self.typ(),
                SignatureType::Key | SignatureType::KeyRevocation
            ),
            "invalid signature type for key verification: {:?}",
            self.typ()
        );
        self.check_issuer(signer)?;

        let mut hasher = self.new_hasher()?;
        key.serialize_for_hashing(&mut hasher_writer(&mut hasher))?;

        self.finish_verification(signer, hasher)
    }
}

/// Adapter to use a `Hasher` where `io::Write` is expected.
struct HasherWriter<'a>(&'a mut dyn Hasher);

impl io::Write for HasherWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn hasher_writer(hasher: &mut Box<dyn Hasher>) -> HasherWriter<'_> {
    HasherWriter(&mut **hasher)
}

impl Serialize for Signature {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        let version = self.config.version();
        w.write_u8(version.into())?;
        w.write_u8(self.config.typ.into())?;
        w.write_u8(self.config.pub_alg.into())?;
        w.write_u8(self.config.hash_alg.into())?;

        let hashed = self.config.hashed_area_to_bytes()?;
        let unhashed = {
            let mut buf = Vec::new();
            for p in &self.config.unhashed_subpackets {
                p.to_writer(&mut buf)?;
            }
            buf
        };

        match version {
            SignatureVersion::V4 => {
                w.write_u16::<BigEndian>(hashed.len().try_into()?)?;
                w.write_all(&hashed)?;
                w.write_u16::<BigEndian>(unhashed.len().try_into()?)?;
            }
            SignatureVersion::V6 => {
                w.write_u32::<BigEndian>(hashed.len().try_into()?)?;
                w.write_all(&hashed)?;
                w.write_u32::<BigEndian>(unhashed.len().try_into()?)?;
            }
            _ => unsupported_err!("writing signature version {:?}", version),
        }
        w.write_all(&unhashed)?;

        w.write_all(&self.signed_hash_value)?;

        if let SignatureVersionSpecific::V6 { salt } = &self.config.version_specific {
            w.write_u8(salt.len().try_into()?)?;
            w.write_all(salt)?;
        }

        self.signature.to_writer(w)?;

        Ok(())
    }
}
