//! Implements the slightly odd "base32" encoding that's used for store path
//! digests and output placeholders.
//!
//! The alphabet is custom. Contrary to other implementations (RFC4648),
//! encoding doesn't use any padding, and reads in characters in reverse order.
//!
//! This is also the main reason why we can't use `data_encoding::Encoding` -
//! it gets things wrong if there normally would be a need for padding.

use thiserror::Error;

const ALPHABET: &[u8; 32] = b"0123456789abcdfghijklmnpqrsvwxyz";

/// Errors that can occur while decoding nixbase32-encoded data.
#[derive(Debug, Eq, PartialEq, Error)]
pub enum Nixbase32DecodeError {
    #[error("character {0:x} not in alphabet")]
    CharacterNotInAlphabet(u8),
    #[error("nonzero carry")]
    NonzeroCarry(),
    #[error("invalid length")]
    InvalidLength,
}

/// Returns encoded input
pub fn encode(input: &[u8]) -> String {
    let output_len = encode_len(input.len());
    let mut output = String::with_capacity(output_len);

    for n in (0..output_len).rev() {
        let b = n * 5; // bit offset within the entire input
        let i = b / 8; // input byte index
        let j = b % 8; // bit offset within that input byte

        let mut c = input[i] >> j;
        if i + 1 < input.len() {
            // we want to right shift, and discard shifted out bits (unchecked)
            // To do this without panicing, we need to do the shifting in u16
            // and convert back to u8 afterwards.
            c |= ((input[i + 1] as u16) << (8 - j as u16)) as u8
        }

        output.push(ALPHABET[(c & 0x1f) as usize] as char);
    }

    output
}

/// This maps a nixbase32-encoded character to its binary representation, which
/// is also the index of the character in the alphabet.
fn decode_char(encoded_char: u8) -> Option<u8> {
    Some(match encoded_char {
        b'0'..=b'9' => encoded_char - b'0',
        b'a'..=b'd' => encoded_char - b'a' + 10_u8,
        b'f'..=b'n' => encoded_char - b'f' + 14_u8,
        b'p'..=b's' => encoded_char - b'p' + 23_u8,
        b'v'..=b'z' => encoded_char - b'v' + 27_u8,
        _ => return None,
    })
}

/// Returns decoded input
pub fn decode(input: impl AsRef<[u8]>) -> Result<Vec<u8>, Nixbase32DecodeError> {
    let input = input.as_ref();
    let output_len = decode_len(input.len());
    if encode_len(output_len) != input.len() {
        return Err(Nixbase32DecodeError::InvalidLength);
    }
    let mut output: Vec<u8> = vec![0x00; output_len];

    // loop over all characters in reverse, and keep the iteration count in n.
    for (n, &c) in input.iter().rev().enumerate() {
        let c_decoded = decode_char(c).ok_or(Nixbase32DecodeError::CharacterNotInAlphabet(c))?;

        let b = n * 5;
        let i = b / 8;
        let j = b % 8;

        let val = (c_decoded as u16).rotate_left(j as u32);
        output[i] |= (val & 0x00ff) as u8;
        let carry = ((val & 0xff00) >> 8) as u8;

        // if we're at the end of dst…
        if i == output_len - 1 {
            // but have a nonzero carry, the encoding is invalid.
            if carry != 0 {
                return Err(Nixbase32DecodeError::NonzeroCarry());
            }
        } else {
            output[i + 1] |= carry;
        }
    }

    Ok(output)
}

/// Decodes into a fixed-size array, failing if the input doesn't have the
/// matching encoded length.
pub fn decode_fixed<const N: usize>(input: impl AsRef<[u8]>) -> Result<[u8; N], Nixbase32DecodeError> {
    let input = input.as_ref();
    if input.len() != encode_len(N) {
        return Err(Nixbase32DecodeError::InvalidLength);
    }

    decode(input)?
        .try_into()
        .map_err(|_| Nixbase32DecodeError::InvalidLength)
}

/// Returns the decoded length of an input of length len.
pub const fn decode_len(len: usize) -> usize {
    (len * 5) / 8
}

/// Returns the encoded length of an input of length len
pub const fn encode_len(len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    (len * 8 - 1) / 5 + 1
}
