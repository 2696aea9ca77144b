use std::io::{self, BufRead};

/// Extension trait for hand-rolled binary parsing on top of [`BufRead`].
///
/// All reads are big-endian unless stated otherwise, and fail with
/// `UnexpectedEof` when the source runs dry.
pub trait BufReadParsing: BufRead + Sized {
    fn read_u8(&mut self) -> io::Result<u8> {
        let arr = self.read_array::<1>()?;
        Ok(arr[0])
    }

    fn read_be_u16(&mut self) -> io::Result<u16> {
        let arr = self.read_array::<2>()?;
        Ok(u16::from_be_bytes(arr))
    }

    fn read_be_u32(&mut self) -> io::Result<u32> {
        let arr = self.read_array::<4>()?;
        Ok(u32::from_be_bytes(arr))
    }

    fn has_remaining(&mut self) -> io::Result<bool> {
        let has_remaining = !self.fill_buf()?.is_empty();
        Ok(has_remaining)
    }

    fn read_array<const C: usize>(&mut self) -> io::Result<[u8; C]> {
        let mut arr = [0u8; C];
        let mut read = 0;

        while read < arr.len() {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                break;
            }

            let available = (arr.len() - read).min(buf.len());
            arr[read..read + available].copy_from_slice(&buf[..available]);
            read += available;
            self.consume(available);
        }
        if read != arr.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no more data available",
            ));
        }

        Ok(arr)
    }

    fn take_bytes(&mut self, size: usize) -> io::Result<Vec<u8>> {
        let mut out = vec![0u8; size];
        let mut read = 0;

        while read < out.len() {
            let buf = self.fill_buf()?;
            if buf.is_empty() {
                break;
            }

            let available = (out.len() - read).min(buf.len());
            out[read..read + available].copy_from_slice(&buf[..available]);
            read += available;
            self.consume(available);
        }

        if read != out.len() {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "no more data available",
            ));
        }

        Ok(out)
    }

    /// Reads everything that is left in this reader.
    fn rest(&mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        std::io::copy(self, &mut out)?;
        Ok(out)
    }

    /// Drain the data in this reader, to make sure all is consumed.
    fn drain(&mut self) -> io::Result<()> {
        let mut out = std::io::sink();
        std::io::copy(self, &mut out)?;
        Ok(())
    }
}

impl<B: BufRead> BufReadParsing for B {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_fixed_widths() {
        let mut input = &[0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08][..];
        assert_eq!(input.read_u8().unwrap(), 0x01);
        assert_eq!(input.read_be_u16().unwrap(), 0x0203);
        assert_eq!(input.read_be_u32().unwrap(), 0x0405_0607);
        assert_eq!(input.rest().unwrap(), vec![0x08]);
        assert!(!input.has_remaining().unwrap());
    }

    #[test]
    fn take_bytes_eof() {
        let mut input = &[0x01, 0x02][..];
        assert!(input.take_bytes(3).is_err());
    }
}
