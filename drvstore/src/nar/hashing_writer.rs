use std::io::{self, Write};

/// Wraps an existing [Write], and allows querying for the digest of all
/// data written "through" it, as well as its length.
/// The hash function is configurable by type parameter.
pub struct HashingWriter<W, H>
where
    W: Write,
    H: digest::Digest,
{
    inner: W,
    hasher: H,
    bytes_written: u64,
}

impl<W, H> HashingWriter<W, H>
where
    W: Write,
    H: digest::Digest,
{
    pub fn from(w: W) -> Self {
        Self {
            inner: w,
            hasher: H::new(),
            bytes_written: 0,
        }
    }

    /// Returns the number of bytes written so far.
    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Return the inner writer, and the digest.
    pub fn finalize(self) -> (W, digest::Output<H>) {
        (self.inner, self.hasher.finalize())
    }
}

impl<W, H> Write for HashingWriter<W, H>
where
    W: Write,
    H: digest::Digest,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;

        // only hash what the inner writer accepted.
        self.hasher.update(&buf[..n]);
        self.bytes_written += n as u64;

        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}
