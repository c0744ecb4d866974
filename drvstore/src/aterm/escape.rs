use bstr::ByteSlice;

/// Escapes a byte sequence. Does not add surrounding quotes.
pub fn escape_bytes<P: AsRef<[u8]>>(s: P) -> Vec<u8> {
    let mut s: Vec<u8> = s.as_ref().to_vec();

    s = s.replace(b"\\", b"\\\\");
    s = s.replace(b"\n", b"\\n");
    s = s.replace(b"\r", b"\\r");
    s = s.replace(b"\t", b"\\t");
    s = s.replace(b"\"", b"\\\"");

    s
}
