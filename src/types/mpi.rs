use std::io::{self, BufRead};

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::{Error, Result};
use crate::parsing::BufReadParsing;
use crate::ser::Serialize;
use crate::util::strip_leading_zeros;

/// Number of bits we accept when reading or writing MPIs.
/// The value is the same as gnupgs.
const MAX_EXTERN_MPI_BITS: u16 = 16384;

/// An owned, normalized MPI value: stored without leading zero octets,
/// serialized with a two-octet big-endian bit-length prefix.
///
/// Ref: <https://www.rfc-editor.org/rfc/rfc9580.html#name-multiprecision-integers>
#[derive(Default, Clone, PartialEq, Eq, derive_more::Debug)]
pub struct Mpi(#[debug("{}", hex::encode(_0))] Vec<u8>);

impl Mpi {
    /// Parses a length-prefixed MPI from the reader.
    pub fn try_from_reader<B: BufRead>(mut i: B) -> Result<Self> {
        let len_bits = i.read_be_u16()?;

        if len_bits > MAX_EXTERN_MPI_BITS {
            return Err(Error::InvalidInput { backtrace: None });
        }

        let len_bytes = usize::from((len_bits + 7) >> 3);
        let n = i.take_bytes(len_bytes)?;

        Ok(Mpi(strip_leading_zeros(&n).to_vec()))
    }

    /// Represent the data in `raw` as an Mpi.
    /// Note that `raw` is not expected to be length-prefixed.
    pub fn from_slice(raw: &[u8]) -> Self {
        Mpi(strip_leading_zeros(raw).to_vec())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// The value as big-endian bytes, left-padded with zeros to `size`.
    pub fn to_padded(&self, size: usize) -> Result<Vec<u8>> {
        ensure!(self.0.len() <= size, "MPI too large for {} bytes", size);
        Ok(crate::util::pad_left(&self.0, size))
    }
}

/// Returns the bit length of a given slice.
#[inline]
fn bit_size(val: &[u8]) -> usize {
    if val.is_empty() {
        0
    } else {
        (val.len() * 8) - val[0].leading_zeros() as usize
    }
}

impl AsRef<[u8]> for Mpi {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl zeroize::Zeroize for Mpi {
    fn zeroize(&mut self) {
        self.0.zeroize();
    }
}

impl Serialize for Mpi {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_u16::<BigEndian>(bit_size(&self.0) as u16)?;
        w.write_all(&self.0)?;

        Ok(())
    }

    fn write_len(&self) -> usize {
        2 + self.0.len()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    impl Arbitrary for Mpi {
        type Parameters = ();
        type Strategy = BoxedStrategy<Self>;

        fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
            proptest::collection::vec(0u8..255, 1..500)
                .prop_map(|v| Mpi::from_slice(&v))
                .boxed()
        }
    }

    #[test]
    fn test_mpi() {
        // Decode the number `511` (`0x1FF` in hex).
        assert_eq!(
            Mpi::try_from_reader(&mut &[0x00, 0x09, 0x01, 0xFF][..]).unwrap(),
            Mpi::from_slice(&[0x01, 0xFF][..])
        );

        // leading zeros are stripped on ingest
        assert_eq!(
            Mpi::from_slice(&[0x00, 0x00, 0x01]).as_bytes(),
            &[0x01][..]
        );
    }

    #[test]
    fn test_encode() {
        let mpi = Mpi::from_slice(&[0x01, 0xFF]);
        let mut buf = Vec::new();
        mpi.to_writer(&mut buf).unwrap();
        assert_eq!(buf, vec![0x00, 0x09, 0x01, 0xFF]);
    }

    #[test]
    fn rejects_oversized() {
        // 0xFFFF bits is above the acceptance limit
        assert!(Mpi::try_from_reader(&mut &[0xFF, 0xFF, 0x01][..]).is_err());
    }

    proptest! {
        #[test]
        fn mpi_write_len(m: Mpi) {
            let mut buf = Vec::new();
            m.to_writer(&mut buf)?;
            prop_assert_eq!(m.write_len(), buf.len());
        }

        #[test]
        fn mpi_roundtrip(m: Mpi) {
            let mut buf = Vec::new();
            m.to_writer(&mut buf)?;
            let back = Mpi::try_from_reader(&mut &buf[..])?;
            prop_assert_eq!(m, back);
        }
    }
}
