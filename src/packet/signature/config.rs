use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, SubsecRound, Utc};
use log::debug;
use rand::{CryptoRng, Rng};

use crate::crypto::hash::{HashAlgorithm, Hasher};
use crate::crypto::public_key::PublicKeyAlgorithm;
use crate::errors::Result;
use crate::packet::signature::subpacket::{Subpacket, SubpacketData, SubpacketType};
use crate::packet::signature::types::{SignatureType, SignatureVersion};
use crate::packet::signature::Signature;
use crate::ser::Serialize;
use crate::types::{Fingerprint, KeyId, KeyVersion, PublicKeyTrait, SecretKeyTrait, Tag};

/// The metadata of a signature: everything but the signed digest prefix and
/// the algorithm-specific signature octets.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SignatureConfig {
    pub typ: SignatureType,
    pub pub_alg: PublicKeyAlgorithm,
    pub hash_alg: HashAlgorithm,

    pub hashed_subpackets: Vec<Subpacket>,
    pub unhashed_subpackets: Vec<Subpacket>,

    pub version_specific: SignatureVersionSpecific,
}

#[derive(Clone, PartialEq, Eq, derive_more::Debug)]
pub enum SignatureVersionSpecific {
    V4,
    V6 {
        #[debug("{}", hex::encode(salt))]
        salt: Vec<u8>,
    },
}

impl From<&SignatureVersionSpecific> for SignatureVersion {
    fn from(value: &SignatureVersionSpecific) -> Self {
        match value {
            SignatureVersionSpecific::V4 => SignatureVersion::V4,
            SignatureVersionSpecific::V6 { .. } => SignatureVersion::V6,
        }
    }
}

impl SignatureConfig {
    /// Constructor for a v4 signature config.
    pub fn v4(typ: SignatureType, pub_alg: PublicKeyAlgorithm, hash_alg: HashAlgorithm) -> Self {
        Self {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: vec![],
            unhashed_subpackets: vec![],
            version_specific: SignatureVersionSpecific::V4,
        }
    }

    /// Constructor for a v6 signature config. Generates a fresh salt of the
    /// length appropriate for `hash_alg`.
    pub fn v6<R: CryptoRng + Rng>(
        rng: &mut R,
        typ: SignatureType,
        pub_alg: PublicKeyAlgorithm,
        hash_alg: HashAlgorithm,
    ) -> Result<Self> {
        let Some(salt_len) = hash_alg.salt_len() else {
            bail!("unknown v6 signature salt length for {:?}", hash_alg);
        };
        let mut salt = vec![0u8; salt_len];
        rng.fill_bytes(&mut salt);

        Ok(Self {
            typ,
            pub_alg,
            hash_alg,
            hashed_subpackets: vec![],
            unhashed_subpackets: vec![],
            version_specific: SignatureVersionSpecific::V6 { salt },
        })
    }

    /// Creates a config matching the signer key: the signature version
    /// follows the key version, and the issuer subpackets are prefilled
    /// (creation time, issuer fingerprint, and for v4 the issuer key id).
    pub fn from_key<R: CryptoRng + Rng, K>(
        rng: &mut R,
        key: &K,
        typ: SignatureType,
    ) -> Result<Self>
    where
        K: PublicKeyTrait,
    {
        Self::from_key_at(rng, key, typ, Utc::now().trunc_subsecs(0))
    }

    /// Like [`SignatureConfig::from_key`], with an explicit creation time.
    pub fn from_key_at<R: CryptoRng + Rng, K>(
        rng: &mut R,
        key: &K,
        typ: SignatureType,
        at: DateTime<Utc>,
    ) -> Result<Self>
    where
        K: PublicKeyTrait,
    {
        let hash_alg = HashAlgorithm::default();

        let mut config = match key.version() {
            KeyVersion::V4 => Self::v4(typ, key.algorithm(), hash_alg),
            KeyVersion::V6 => Self::v6(rng, typ, key.algorithm(), hash_alg)?,
            v => unsupported_err!("signatures for key version {:?}", v),
        };

        config.hashed_subpackets = vec![
            Subpacket::regular(SubpacketData::SignatureCreationTime(at)),
            Subpacket::regular(SubpacketData::IssuerFingerprint(key.fingerprint())),
        ];
        if key.version() == KeyVersion::V4 {
            config.unhashed_subpackets =
                vec![Subpacket::regular(SubpacketData::Issuer(key.key_id()))];
        }

        Ok(config)
    }

    pub fn version(&self) -> SignatureVersion {
        (&self.version_specific).into()
    }

    /// Changes the hash algorithm, regenerating the v6 salt to the length
    /// the new algorithm requires.
    pub fn set_hash_alg<R: CryptoRng + Rng>(
        &mut self,
        rng: &mut R,
        hash_alg: HashAlgorithm,
    ) -> Result<()> {
        self.hash_alg = hash_alg;

        if let SignatureVersionSpecific::V6 { ref mut salt } = self.version_specific {
            let Some(salt_len) = hash_alg.salt_len() else {
                bail!("unknown v6 signature salt length for {:?}", hash_alg);
            };
            let mut fresh = vec![0u8; salt_len];
            rng.fill_bytes(&mut fresh);
            *salt = fresh;
        }

        Ok(())
    }

    pub fn typ(&self) -> SignatureType {
        self.typ
    }

    fn new_hasher(&self) -> Result<Box<dyn Hasher>> {
        let mut hasher = self.hash_alg.new_hasher()?;
        if let SignatureVersionSpecific::V6 { salt } = &self.version_specific {
            hasher.update(salt);
        }
        Ok(hasher)
    }

    fn finish_signing<K>(
        self,
        key: &K,
        key_pw: impl FnOnce() -> String,
        mut hasher: Box<dyn Hasher>,
    ) -> Result<Signature>
    where
        K: SecretKeyTrait,
    {
        let len = self.hash_signature_data(&mut *hasher)?;
        hasher.update(&self.trailer(len)?);

        let digest = hasher.finish();
        let signed_hash_value = [digest[0], digest[1]];

        let signature = key.create_signature(key_pw, self.hash_alg, &digest)?;

        Ok(Signature::from_config(self, signed_hash_value, signature))
    }

    /// Sign the given binary or canonical-text data.
    pub fn sign<K, F>(self, key: &K, key_pw: F, data: &[u8]) -> Result<Signature>
    where
        K: SecretKeyTrait,
        F: FnOnce() -> String,
    {
        ensure!(
            matches!(self.typ, SignatureType::Binary | SignatureType::Text),
            "incompatible signature type {:?}",
            self.typ
        );
        self.check_signer_version(key)?;

        let mut hasher = self.new_hasher()?;
        hasher.update(data);

        self.finish_signing(key, key_pw, hasher)
    }

    /// Create a certification signature over `signee || id`.
    pub fn sign_certification<K, P, F>(
        self,
        signer: &K,
        signer_pw: F,
        signee: &P,
        tag: Tag,
        id: &impl Serialize,
    ) -> Result<Signature>
    where
        K: SecretKeyTrait,
        P: PublicKeyTrait,
        F: FnOnce() -> String,
    {
        ensure!(
            self.typ.is_certification(),
            "can not sign non certification as certification"
        );
        self.check_signer_version(signer)?;

        debug!("signing certification {:#?}", self.typ);

        let mut hasher = self.new_hasher()?;
        {
            let mut w = HasherWriter(&mut *hasher);
            signee.serialize_for_hashing(&mut w)?;
        }

        let packet_buf = id.to_bytes()?;
        let prefix = match tag {
            Tag::UserId => 0xB4,
            Tag::UserAttribute => 0xD1,
            _ => bail!("invalid tag for certification signature: {:?}", tag),
        };

        let mut prefix_buf = [prefix, 0u8, 0, 0, 0];
        BigEndian::write_u32(&mut prefix_buf[1..], packet_buf.len().try_into()?);
        hasher.update(&prefix_buf);
        hasher.update(&packet_buf);

        self.finish_signing(signer, signer_pw, hasher)
    }

    /// Create a subkey binding (or revocation) signature over
    /// `primary || subkey`.
    pub fn sign_key_binding<K, S, F>(
        self,
        primary: &K,
        key_pw: F,
        subkey: &S,
    ) -> Result<Signature>
    where
        K: SecretKeyTrait,
        S: PublicKeyTrait,
        F: FnOnce() -> String,
    {
        self.check_signer_version(primary)?;
        debug!("signing key binding {:#?}", self.typ);

        let mut hasher = self.new_hasher()?;
        {
            let mut w = HasherWriter(&mut *hasher);
            primary.serialize_for_hashing(&mut w)?;
            subkey.serialize_for_hashing(&mut w)?;
        }

        self.finish_signing(primary, key_pw, hasher)
    }

    /// Create a primary-key binding ("back signature") with the signing
    /// subkey, over `primary || subkey`.
    pub fn sign_primary_key_binding<K, P, F>(
        self,
        subkey: &K,
        key_pw: F,
        primary: &P,
    ) -> Result<Signature>
    where
        K: SecretKeyTrait,
        P: PublicKeyTrait,
        F: FnOnce() -> String,
    {
        ensure!(
            self.typ == SignatureType::KeyBinding,
            "invalid type for a back signature: {:?}",
            self.typ
        );
        self.check_signer_version(subkey)?;

        let mut hasher = self.new_hasher()?;
        {
            let mut w = HasherWriter(&mut *hasher);
            primary.serialize_for_hashing(&mut w)?;
            subkey.serialize_for_hashing(&mut w)?;
        }

        self.finish_signing(subkey, key_pw, hasher)
    }

    /// Create a direct-key or key-revocation signature over `key` alone.
    pub fn sign_key<K, P, F>(self, signer: &K, key_pw: F, key: &P) -> Result<Signature>
    where
        K: SecretKeyTrait,
        P: PublicKeyTrait,
        F: FnOnce() -> String,
    {
        self.check_signer_version(signer)?;
        debug!("signing key {:#?}", self.typ);

        let mut hasher = self.new_hasher()?;
        {
            let mut w = HasherWriter(&mut *hasher);
            key.serialize_for_hashing(&mut w)?;
        }

        self.finish_signing(signer, key_pw, hasher)
    }

    fn check_signer_version<K>(&self, signer: &K) -> Result<()>
    where
        K: PublicKeyTrait,
    {
        ensure!(
            (self.version() == SignatureVersion::V4 && signer.version() == KeyVersion::V4)
                || (self.version() == SignatureVersion::V6 && signer.version() == KeyVersion::V6),
            "signature version {:?} not allowed for signer key version {:?}",
            self.version(),
            signer.version()
        );
        Ok(())
    }

    /// The hashed subpacket area, serialized.
    pub fn hashed_area_to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        for packet in &self.hashed_subpackets {
            packet.to_writer(&mut buf)?;
        }
        Ok(buf)
    }

    /// Feed the signature metadata (version, type, algorithms, hashed
    /// subpackets with their length frame) into the hasher. Returns the
    /// number of hashed metadata octets, as needed for the trailer.
    pub fn hash_signature_data(&self, hasher: &mut dyn Hasher) -> Result<usize> {
        let mut res = vec![
            self.version().into(),
            self.typ.into(),
            self.pub_alg.into(),
            self.hash_alg.into(),
        ];

        let hashed_subpackets = self.hashed_area_to_bytes()?;

        // hashed area length: u16 for v4, u32 for v6
        match self.version() {
            SignatureVersion::V4 => {
                res.extend(u16::try_from(hashed_subpackets.len())?.to_be_bytes())
            }
            SignatureVersion::V6 => {
                res.extend(u32::try_from(hashed_subpackets.len())?.to_be_bytes())
            }
            v => unsupported_err!("hashing signature version {:?}", v),
        }

        res.extend(hashed_subpackets);

        hasher.update(&res);

        Ok(res.len())
    }

    /// The final trailer: version, `0xFF`, and the length of the hashed
    /// metadata as a big-endian u32.
    pub fn trailer(&self, len: usize) -> Result<Vec<u8>> {
        let mut trailer = vec![self.version().into(), 0xFF, 0, 0, 0, 0];
        BigEndian::write_u32(&mut trailer[2..], len.try_into()?);
        Ok(trailer)
    }

    /// Returns an iterator over the hashed subpackets of this signature.
    pub fn hashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.hashed_subpackets.iter()
    }

    /// Returns an iterator over the unhashed subpackets of this signature.
    pub fn unhashed_subpackets(&self) -> impl Iterator<Item = &Subpacket> {
        self.unhashed_subpackets.iter()
    }

    /// Signature Creation Time, from the hashed area only.
    pub fn created(&self) -> Option<&DateTime<Utc>> {
        self.hashed_subpackets().find_map(|p| match p.data {
            SubpacketData::SignatureCreationTime(ref d) => Some(d),
            _ => None,
        })
    }

    /// Issuer Key IDs from both areas. The ID only acts as a hint; the
    /// signature is checked against the purported issuer's material.
    pub fn issuer(&self) -> Vec<&KeyId> {
        self.hashed_subpackets()
            .chain(self.unhashed_subpackets())
            .filter_map(|sp| match sp.data {
                SubpacketData::Issuer(ref id) => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Issuer fingerprints from both areas.
    pub fn issuer_fingerprint(&self) -> Vec<&Fingerprint> {
        self.hashed_subpackets()
            .chain(self.unhashed_subpackets())
            .filter_map(|sp| match &sp.data {
                SubpacketData::IssuerFingerprint(fp) => Some(fp),
                _ => None,
            })
            .collect()
    }

    /// Returns if the signature is a certification or not.
    pub fn is_certification(&self) -> bool {
        self.typ.is_certification()
    }

    fn typ_unknown_critical(&self) -> Option<&Subpacket> {
        self.hashed_subpackets().find(|p| {
            p.is_critical
                && matches!(p.typ(), SubpacketType::Other(_) | SubpacketType::Experimental(_))
        })
    }

    /// Returns true if the hashed area carries a critical subpacket of
    /// unknown type (strict mode treats such signatures as invalid).
    pub fn has_unknown_critical_subpacket(&self) -> bool {
        self.typ_unknown_critical().is_some()
    }
}

/// Adapter to use a `Hasher` where `io::Write` is expected.
struct HasherWriter<'a>(&'a mut dyn Hasher);

impl std::io::Write for HasherWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
