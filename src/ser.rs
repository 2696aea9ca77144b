use std::io;

use crate::errors::Result;

pub trait Serialize {
    fn to_writer<W: io::Write>(&self, _: &mut W) -> Result<()>;

    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.to_writer(&mut buf)?;
        Ok(buf)
    }

    /// The length of the serialized representation, in bytes.
    fn write_len(&self) -> usize {
        // fallback: serialize and count
        self.to_bytes().map(|b| b.len()).unwrap_or(0)
    }
}

impl Serialize for &[u8] {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(self)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.len()
    }
}

impl Serialize for Vec<u8> {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        w.write_all(self)?;
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.len()
    }
}

impl<T: Serialize> Serialize for Vec<T> {
    fn to_writer<W: io::Write>(&self, w: &mut W) -> Result<()> {
        for x in self {
            x.to_writer(w)?;
        }
        Ok(())
    }

    fn write_len(&self) -> usize {
        self.iter().map(Serialize::write_len).sum()
    }
}
