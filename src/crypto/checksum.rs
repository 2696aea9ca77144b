use std::io;

use byteorder::{BigEndian, WriteBytesExt};

use crate::errors::{Error, Result};

/// Two octet checksum: sum of all octets mod 65536.
#[inline]
pub fn simple(actual: &[u8], data: &[u8]) -> Result<()> {
    let expected = calculate_simple(data);

    if actual[..2] != expected.to_be_bytes()[..] {
        return Err(Error::ChecksumMismatch { backtrace: None });
    }

    Ok(())
}

#[inline]
pub fn simple_to_writer<W: io::Write>(data: &[u8], writer: &mut W) -> Result<()> {
    writer.write_u16::<BigEndian>(calculate_simple(data))?;
    Ok(())
}

#[inline]
pub fn calculate_simple(data: &[u8]) -> u16 {
    data.iter()
        .fold(0u16, |acc, b| acc.wrapping_add(u16::from(*b)))
}

/// SHA1 checksum, using sha1_checked, all 20 octets.
///
/// Fails with `Error::Sha1HashCollision` if a SHA1 collision was detected.
#[inline]
pub fn calculate_sha1<I, T>(data: I) -> Result<[u8; 20]>
where
    T: AsRef<[u8]>,
    I: IntoIterator<Item = T>,
{
    use sha1_checked::{CollisionResult, Digest, Sha1};

    let mut digest = Sha1::new();
    for chunk in data {
        digest.update(chunk.as_ref());
    }

    match digest.try_finalize() {
        CollisionResult::Ok(sha1) => Ok(sha1.into()),
        CollisionResult::Collision(_) | CollisionResult::Mitigated(_) => {
            Err(Error::Sha1HashCollision { backtrace: None })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_checksum_wraps() {
        assert_eq!(calculate_simple(&[0xff, 0xff, 0x02]), 0x0200);
        assert_eq!(calculate_simple(&[]), 0);
        assert!(simple(&[0x02, 0x00], &[0xff, 0xff, 0x02]).is_ok());
        assert!(simple(&[0x02, 0x01], &[0xff, 0xff, 0x02]).is_err());
    }
}
