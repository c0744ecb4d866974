//! This module constructs a [Derivation] by parsing its [ATerm][]
//! serialization.
//!
//! The grammar is parsed by recursive descent over a [TokenSource].
//!
//! [ATerm]: http://program-transformation.org/Tools/ATermFormat.html

use std::collections::{BTreeMap, BTreeSet};

use tracing::instrument;

use super::errors::{Field, ParseError, ParseErrorKind};
use super::output::fixed_ca_from_hex;
use super::{is_valid_output_name, write, Derivation, OutputType};
use crate::aterm::{self, Scanner, Token, TokenKind, TokenSource};
use crate::nixhash::parse_ca_tag;
use crate::store_path::{StoreDirectory, StorePath};

type FieldResult<T> = Result<T, (Field, ParseErrorKind)>;

fn at(field: Field) -> impl FnOnce(ParseErrorKind) -> (Field, ParseErrorKind) {
    move |kind| (field, kind)
}

/// Parses a derivation named `name` (without the `.drv` suffix) in store
/// directory `dir` from its ATerm bytes.
#[instrument(level = "trace", skip_all, fields(drv.name = %name), err)]
pub(crate) fn parse(dir: StoreDirectory, name: String, data: &[u8]) -> Result<Derivation, ParseError> {
    let mut drv = Derivation::new(dir, name);

    let result = match data.strip_prefix(write::DERIVATION_PREFIX.as_bytes()) {
        None => Err((Field::Tuple, ParseErrorKind::MissingConstructor)),
        Some(data) => {
            let mut scanner = Scanner::new(data);
            parse_tuple(&mut drv, &mut scanner).and_then(|()| {
                if scanner.remaining().is_empty() {
                    Ok(())
                } else {
                    Err((Field::Tuple, ParseErrorKind::TrailingData))
                }
            })
        }
    };

    match result {
        Ok(()) => Ok(drv),
        Err((field, kind)) => Err(ParseError {
            name: drv.name,
            field,
            kind,
        }),
    }
}

/// Parses the `(outputs, input derivations, …, env)` tuple into `drv`,
/// whose directory and name are already set.
fn parse_tuple<S: TokenSource>(drv: &mut Derivation, s: &mut S) -> FieldResult<()> {
    expect(s, TokenKind::LParen).map_err(at(Field::Tuple))?;

    drv.outputs = parse_outputs(s).map_err(at(Field::Outputs))?;
    drv.input_derivations =
        parse_input_derivations(s, &drv.dir).map_err(at(Field::InputDerivations))?;
    drv.input_sources = parse_input_sources(s, &drv.dir).map_err(at(Field::InputSources))?;
    drv.system = string(s).map_err(at(Field::System))?;
    drv.builder = string(s).map_err(at(Field::Builder))?;

    let mut arguments = Vec::new();
    parse_string_list(s, |arg| {
        arguments.push(arg);
        Ok(())
    })
    .map_err(at(Field::Args))?;
    drv.arguments = arguments;

    drv.environment = parse_environment(s).map_err(at(Field::Env))?;

    expect(s, TokenKind::RParen).map_err(at(Field::Tuple))?;

    Ok(())
}

fn expect<S: TokenSource>(s: &mut S, kind: TokenKind) -> Result<(), ParseErrorKind> {
    s.expect_token(kind)?;
    Ok(())
}

fn string<S: TokenSource>(s: &mut S) -> Result<String, ParseErrorKind> {
    Ok(s.expect_string()?)
}

/// Reads the next token, and returns true if it closes a list.
/// Otherwise, the token is pushed back.
fn at_list_end<S: TokenSource>(s: &mut S) -> Result<bool, ParseErrorKind> {
    if s.read_token()? == Token::RBracket {
        return Ok(true);
    }
    s.unread_token()?;
    Ok(false)
}

/// Parses a list of strings, passing each to `f`.
fn parse_string_list<S, F>(s: &mut S, mut f: F) -> Result<(), ParseErrorKind>
where
    S: TokenSource,
    F: FnMut(String) -> Result<(), ParseErrorKind>,
{
    expect(s, TokenKind::LBracket)?;
    loop {
        match s.read_token()? {
            Token::String(value) => f(value)?,
            Token::RBracket => return Ok(()),
            found => {
                return Err(aterm::Error::UnexpectedToken {
                    expected: "string or ']'".into(),
                    found,
                }
                .into())
            }
        }
    }
}

fn parse_store_path(dir: &StoreDirectory, path: &str) -> Result<StorePath, ParseErrorKind> {
    dir.parse_path(path)
        .map_err(|source| ParseErrorKind::StorePath {
            path: path.to_string(),
            source,
        })
}

fn parse_outputs<S: TokenSource>(
    s: &mut S,
) -> Result<BTreeMap<String, Option<OutputType>>, ParseErrorKind> {
    expect(s, TokenKind::LBracket)?;

    let mut outputs = BTreeMap::new();
    while !at_list_end(s)? {
        let (output_name, output) = parse_output(s)?;
        if outputs.contains_key(&output_name) {
            return Err(ParseErrorKind::DuplicateOutput(output_name));
        }
        outputs.insert(output_name, output);
    }

    Ok(outputs)
}

/// Parse one output. This is 4 string fields inside parens:
/// output name, output path, hash algorithm (and method), hex digest.
fn parse_output<S: TokenSource>(
    s: &mut S,
) -> Result<(String, Option<OutputType>), ParseErrorKind> {
    expect(s, TokenKind::LParen)?;

    let output_name = string(s)?;
    if !is_valid_output_name(&output_name) {
        return Err(ParseErrorKind::InvalidOutputName(output_name));
    }

    let path = string(s)?;
    let ca_tag = string(s)?;
    let hash_hex = string(s)?;
    expect(s, TokenKind::RParen)?;

    // the unspecified output type.
    if path.is_empty() && ca_tag.is_empty() && hash_hex.is_empty() {
        return Ok((output_name, None));
    }

    let (method, algo) = match parse_ca_tag(&ca_tag) {
        Ok(v) => v,
        Err(source) => {
            return Err(ParseErrorKind::HashAlgo {
                output: output_name,
                source,
            })
        }
    };

    let output = if !hash_hex.is_empty() {
        match fixed_ca_from_hex(method, algo, &hash_hex) {
            Ok(ca) => OutputType::Fixed(ca),
            Err(source) => {
                return Err(ParseErrorKind::Hash {
                    output: output_name,
                    source,
                })
            }
        }
    } else if path.is_empty() {
        OutputType::Floating { method, algo }
    } else {
        return Err(ParseErrorKind::UnknownOutputType(output_name));
    };

    Ok((output_name, Some(output)))
}

fn parse_input_derivations<S: TokenSource>(
    s: &mut S,
    dir: &StoreDirectory,
) -> Result<BTreeMap<StorePath, BTreeSet<String>>, ParseErrorKind> {
    expect(s, TokenKind::LBracket)?;

    let mut input_derivations = BTreeMap::new();
    while !at_list_end(s)? {
        expect(s, TokenKind::LParen)?;
        let drv_path = string(s)?;

        // duplicate output names are merged.
        let mut output_names = BTreeSet::new();
        parse_string_list(s, |output_name| {
            output_names.insert(output_name);
            Ok(())
        })?;
        expect(s, TokenKind::RParen)?;

        let drv_path = parse_store_path(dir, &drv_path)?;
        if input_derivations.contains_key(&drv_path) {
            return Err(ParseErrorKind::DuplicateInputDerivation(drv_path));
        }
        input_derivations.insert(drv_path, output_names);
    }

    Ok(input_derivations)
}

fn parse_input_sources<S: TokenSource>(
    s: &mut S,
    dir: &StoreDirectory,
) -> Result<BTreeSet<StorePath>, ParseErrorKind> {
    let mut input_sources = BTreeSet::new();
    parse_string_list(s, |path| {
        input_sources.insert(parse_store_path(dir, &path)?);
        Ok(())
    })?;

    Ok(input_sources)
}

fn parse_environment<S: TokenSource>(
    s: &mut S,
) -> Result<BTreeMap<String, String>, ParseErrorKind> {
    expect(s, TokenKind::LBracket)?;

    let mut environment = BTreeMap::new();
    loop {
        match s.read_token()? {
            Token::RBracket => return Ok(environment),
            Token::LParen => {}
            found => {
                return Err(aterm::Error::UnexpectedToken {
                    expected: "']' or '('".into(),
                    found,
                }
                .into())
            }
        }

        let key = string(s)?;
        if environment.contains_key(&key) {
            return Err(ParseErrorKind::DuplicateEnv(key));
        }
        let value = string(s)?;
        expect(s, TokenKind::RParen)?;

        environment.insert(key, value);
    }
}
