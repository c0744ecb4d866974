//! This module implements the serialisation of derivations into the
//! [ATerm][] format.
//!
//! All functions here only take care of syntax, fields are expected to be
//! validated and in canonical order already.
//!
//! [ATerm]: http://program-transformation.org/Tools/ATermFormat.html

use std::collections::{BTreeMap, BTreeSet};
use std::io::{self, Write};

use crate::aterm::escape_bytes;
use crate::store_path::StorePath;

pub const DERIVATION_PREFIX: &str = "Derive";
pub const PAREN_OPEN: char = '(';
pub const PAREN_CLOSE: char = ')';
pub const BRACKET_OPEN: char = '[';
pub const BRACKET_CLOSE: char = ']';
pub const COMMA: char = ',';
pub const QUOTE: char = '"';

// Writes a character to the writer.
pub(crate) fn write_char(writer: &mut impl Write, c: char) -> io::Result<()> {
    let mut buf = [0; 4];
    writer.write_all(c.encode_utf8(&mut buf).as_bytes())
}

// Writes a string to the writer (as unicode)
pub(crate) fn write_str(writer: &mut impl Write, s: &str) -> io::Result<()> {
    writer.write_all(s.as_bytes())
}

// Writes a quoted and escaped string field.
pub(crate) fn write_field(writer: &mut impl Write, s: &str) -> io::Result<()> {
    write_char(writer, QUOTE)?;
    writer.write_all(&escape_bytes(s))?;
    write_char(writer, QUOTE)
}

fn write_array_elements<S: AsRef<str>>(
    writer: &mut impl Write,
    open: char,
    closing: char,
    elements: impl IntoIterator<Item = S>,
) -> io::Result<()> {
    write_char(writer, open)?;

    for (index, element) in elements.into_iter().enumerate() {
        if index > 0 {
            write_char(writer, COMMA)?;
        }

        write_field(writer, element.as_ref())?;
    }

    write_char(writer, closing)
}

/// Writes the outputs, each given as name, path, hash algorithm tag and
/// hex digest.
pub fn write_outputs(writer: &mut impl Write, outputs: &[[String; 4]]) -> io::Result<()> {
    write_char(writer, BRACKET_OPEN)?;
    for (ii, output) in outputs.iter().enumerate() {
        if ii > 0 {
            write_char(writer, COMMA)?;
        }

        write_array_elements(writer, PAREN_OPEN, PAREN_CLOSE, output)?;
    }
    write_char(writer, BRACKET_CLOSE)
}

pub fn write_input_derivations(
    writer: &mut impl Write,
    input_derivations: &BTreeMap<StorePath, BTreeSet<String>>,
) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_char(writer, BRACKET_OPEN)?;

    for (ii, (input_derivation_path, output_names)) in input_derivations.iter().enumerate() {
        if ii > 0 {
            write_char(writer, COMMA)?;
        }

        write_char(writer, PAREN_OPEN)?;
        write_field(writer, &input_derivation_path.to_absolute_path())?;
        write_char(writer, COMMA)?;
        write_array_elements(writer, BRACKET_OPEN, BRACKET_CLOSE, output_names)?;
        write_char(writer, PAREN_CLOSE)?;
    }

    write_char(writer, BRACKET_CLOSE)
}

pub fn write_input_sources(
    writer: &mut impl Write,
    input_sources: &BTreeSet<StorePath>,
) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_array_elements(
        writer,
        BRACKET_OPEN,
        BRACKET_CLOSE,
        input_sources.iter().map(StorePath::to_absolute_path),
    )
}

pub fn write_system(writer: &mut impl Write, platform: &str) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_field(writer, platform)
}

pub fn write_builder(writer: &mut impl Write, builder: &str) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_field(writer, builder)
}

pub fn write_arguments(writer: &mut impl Write, arguments: &[String]) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_array_elements(writer, BRACKET_OPEN, BRACKET_CLOSE, arguments)
}

pub fn write_environment(
    writer: &mut impl Write,
    environment: &BTreeMap<String, String>,
) -> io::Result<()> {
    write_char(writer, COMMA)?;
    write_char(writer, BRACKET_OPEN)?;

    for (i, (k, v)) in environment.iter().enumerate() {
        if i > 0 {
            write_char(writer, COMMA)?;
        }

        write_array_elements(writer, PAREN_OPEN, PAREN_CLOSE, [k, v])?;
    }

    write_char(writer, BRACKET_CLOSE)
}
