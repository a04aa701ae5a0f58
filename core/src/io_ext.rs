use std::io::{
	self,
	Read,
	Result,
	Write
};

pub trait ReadBinExt: Read {
	/// Reads a fixed-size block, such as a reserved area that has to be kept
	#[inline]
	fn read_bytes<const N: usize>(&mut self) -> Result<[u8; N]> {
		let mut buf = [0; N];
		self.read_exact(&mut buf)?;
		Ok(buf)
	}

	/// Discards `count` bytes, failing with `UnexpectedEof` if fewer are available
	#[inline]
	fn skip(&mut self, count: u64) -> Result<()> {
		let skipped = io::copy(&mut self.take(count), &mut io::sink())?;
		if skipped < count {
			return Err(io::Error::new(io::ErrorKind::UnexpectedEof,
				format!("expected {} bytes to skip, found {}", count, skipped)));
		}

		Ok(())
	}
}

impl<R> ReadBinExt for R
where
	R: Read + ?Sized,
{
}

pub trait WriteBinExt: Write {
	/// Writes `count` zero bytes
	#[inline]
	fn write_zeros(&mut self, count: usize) -> Result<()> {
		const ZEROS: [u8; 64] = [0; 64];

		let mut left = count;
		while left > 0 {
			let n = left.min(ZEROS.len());
			self.write_all(&ZEROS[..n])?;
			left -= n;
		}

		Ok(())
	}
}

impl<W> WriteBinExt for W
where
	W: Write + ?Sized,
{
}

#[cfg(test)]
mod tests {
	use std::io::ErrorKind;

	use super::*;

	#[test]
	fn test_read_bytes() {
		let mut data = &b"\x01\x00\x03\x03rest"[..];
		assert_eq!([1, 0, 3, 3], data.read_bytes::<4>().unwrap());
		assert_eq!(b"rest", &data[..]);
	}

	#[test]
	fn test_skip() {
		let mut data = &b"0123456789"[..];
		data.skip(4).unwrap();
		assert_eq!(b"456789", &data[..]);
		assert_eq!(ErrorKind::UnexpectedEof, data.skip(7).unwrap_err().kind());
	}

	#[test]
	fn test_write_zeros() {
		let mut out = vec![0xFF];
		out.write_zeros(100).unwrap();
		assert_eq!(101, out.len());
		assert!(out[1..].iter().all(|b| *b == 0));
	}
}
