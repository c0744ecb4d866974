//! Writes single-file Nix archives (NAR).
//!
//! NAR files can be output to any type that implements [`Write`], and content
//! can be read from any type that implements [`BufRead`].
//!
//! ```rust
//! # use std::io::BufReader;
//! # let some_file: Vec<u8> = vec![0, 1, 2, 3, 4];
//! let mut sink: Vec<u8> = Vec::new();
//!
//! let nar = drvstore::nar::writer::open(&mut sink)?;
//!
//! let size = some_file.len() as u64;
//! let mut reader = BufReader::new(some_file.as_slice());
//! nar.file(size, &mut reader)?;
//! # Ok::<(), std::io::Error>(())
//! ```

use std::io::{
    self, BufRead,
    ErrorKind::{InvalidInput, UnexpectedEof},
    Write,
};

use super::wire;

/// Convenience type alias for types implementing [`Write`].
pub type Writer<'a> = dyn Write + Send + 'a;

/// Create a new NAR, writing the output to the specified writer.
pub fn open<'a, 'w: 'a>(writer: &'a mut Writer<'w>) -> io::Result<Node<'a, 'w>> {
    let mut node = Node { writer };
    node.write(&wire::TOK_NAR)?;
    Ok(node)
}

/// The root node of a NAR file.
pub struct Node<'a, 'w: 'a> {
    writer: &'a mut Writer<'w>,
}

impl<'a, 'w> Node<'a, 'w> {
    fn write(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)
    }

    fn pad(&mut self, n: u64) -> io::Result<()> {
        match (n & 7) as usize {
            0 => Ok(()),
            n => self.write(&[0; 8][n..]),
        }
    }

    /// Make this node a single regular file of `size` bytes, read from
    /// `reader`.
    pub fn file(mut self, size: u64, reader: &mut dyn BufRead) -> io::Result<()> {
        self.write(&wire::TOK_REG)?;
        self.write(&size.to_le_bytes())?;

        let mut need = size;
        while need != 0 {
            let data = reader.fill_buf()?;

            if data.is_empty() {
                return Err(UnexpectedEof.into());
            }

            let n = need.min(data.len() as u64) as usize;
            self.write(&data[..n])?;

            need -= n as u64;
            reader.consume(n);
        }

        // bail if there's still data left in the passed reader.
        if reader.fill_buf().map(|b| !b.is_empty())? {
            return Err(io::Error::new(
                InvalidInput,
                "reader contained more data than specified size",
            ));
        }

        self.pad(size)?;
        self.write(&wire::TOK_PAR)?;

        Ok(())
    }
}
