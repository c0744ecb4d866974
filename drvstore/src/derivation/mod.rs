use crate::store_path::{build_ca_path, References, StoreDirectory, StorePath};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::io;
use tracing::instrument;

mod errors;
mod export;
mod output;
mod output_reference;
mod parser;
mod placeholder;
pub(crate) mod write;

#[cfg(test)]
mod tests;

// Public API of the crate.
pub use errors::{
    DerivationError, Field, Operation, OutputPathError, OutputReferenceError, ParseError,
    ParseErrorKind,
};
pub use export::ExportTrailer;
pub use output::OutputType;
pub use output_reference::OutputReference;
pub use placeholder::{hash_placeholder, unknown_ca_output_placeholder};

/// The suffix of the store object name of a serialized derivation.
pub const DERIVATION_EXT: &str = ".drv";

/// The name of the output that is elided from store object names.
pub const DEFAULT_OUTPUT_NAME: &str = "out";

/// Checks an output name.
///
/// Output names only reject the characters used to separate them from
/// derivation paths (`!`) or from each other (`^`). Everything else is
/// accepted for now.
pub fn is_valid_output_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(|c| c == '^' || c == '!')
}

/// A store derivation, describing a single build action.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct Derivation {
    /// The store directory all paths in this derivation live in.
    #[serde(rename = "storeDir")]
    pub dir: StoreDirectory,

    /// The name, without the `.drv` suffix.
    pub name: String,

    #[serde(rename = "args")]
    pub arguments: Vec<String>,

    pub builder: String,

    #[serde(rename = "env")]
    pub environment: BTreeMap<String, String>,

    #[serde(rename = "inputDrvs")]
    pub input_derivations: BTreeMap<StorePath, BTreeSet<String>>,

    #[serde(rename = "inputSrcs")]
    pub input_sources: BTreeSet<StorePath>,

    /// The outputs by name. [None] leaves the type of an output
    /// unspecified.
    pub outputs: BTreeMap<String, Option<OutputType>>,

    pub system: String,
}

impl Derivation {
    /// Returns an empty derivation with the given store directory and name.
    pub fn new(dir: StoreDirectory, name: impl Into<String>) -> Self {
        Self {
            dir,
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parses a derivation from its ATerm serialization.
    /// `name` is the derivation name without the `.drv` suffix, it is not
    /// part of the serialization.
    pub fn from_aterm_bytes(
        dir: StoreDirectory,
        name: impl Into<String>,
        b: &[u8],
    ) -> Result<Self, ParseError> {
        parser::parse(dir, name.into(), b)
    }

    /// Returns the canonical ATerm serialization.
    pub fn to_aterm_bytes(&self) -> Result<Vec<u8>, DerivationError> {
        let mut buffer: Vec<u8> = Vec::new();
        self.serialize(&mut buffer)?;
        Ok(buffer)
    }

    /// Writes the canonical ATerm serialization to `writer`.
    ///
    /// The derivation is validated first, nothing is written if that fails.
    #[instrument(level = "trace", skip_all, fields(drv.name = %self.name), err)]
    pub fn serialize(&self, writer: &mut impl io::Write) -> Result<(), DerivationError> {
        let outputs = self.output_fields()?;
        self.check_input_dirs()?;

        self.write_aterm(writer, &outputs)
            .map_err(|source| DerivationError::Write {
                name: self.name.clone(),
                source,
            })
    }

    fn write_aterm(&self, writer: &mut impl io::Write, outputs: &[[String; 4]]) -> io::Result<()> {
        write::write_str(writer, write::DERIVATION_PREFIX)?;
        write::write_char(writer, write::PAREN_OPEN)?;

        write::write_outputs(writer, outputs)?;
        write::write_input_derivations(writer, &self.input_derivations)?;
        write::write_input_sources(writer, &self.input_sources)?;
        write::write_system(writer, &self.system)?;
        write::write_builder(writer, &self.builder)?;
        write::write_arguments(writer, &self.arguments)?;
        write::write_environment(writer, &self.environment)?;

        write::write_char(writer, write::PAREN_CLOSE)
    }

    /// Returns name, path, hash algorithm tag and hex digest of each
    /// output, in output name order.
    fn output_fields(&self) -> Result<Vec<[String; 4]>, DerivationError> {
        if self.name.is_empty() {
            return Err(DerivationError::MissingName(Operation::Marshal));
        }

        let mut fields = Vec::with_capacity(self.outputs.len());
        for (output_name, output) in &self.outputs {
            if !is_valid_output_name(output_name) {
                return Err(DerivationError::InvalidOutputName {
                    name: self.name.clone(),
                    output: output_name.clone(),
                });
            }

            fields.push(match output {
                None => [output_name.clone(), String::new(), String::new(), String::new()],
                Some(output @ OutputType::Fixed(_)) => {
                    let path = self.output_path(output_name).map_err(|source| {
                        DerivationError::OutputPath {
                            name: self.name.clone(),
                            source,
                        }
                    })?;
                    [
                        output_name.clone(),
                        path.to_absolute_path(),
                        output.ca_tag(),
                        output.hash_hex(),
                    ]
                }
                Some(output @ OutputType::Floating { .. }) => [
                    output_name.clone(),
                    String::new(),
                    output.ca_tag(),
                    String::new(),
                ],
            });
        }

        Ok(fields)
    }

    /// Ensures input derivations and input sources live in [Derivation::dir].
    fn check_input_dirs(&self) -> Result<(), DerivationError> {
        let foreign = self
            .input_derivations
            .keys()
            .chain(self.input_sources.iter())
            .find(|path| path.dir() != &self.dir);

        match foreign {
            None => Ok(()),
            Some(path) => Err(DerivationError::UnexpectedStoreDir {
                name: self.name.clone(),
                expected: self.dir.clone(),
                got: path.dir().clone(),
            }),
        }
    }

    /// Returns the store object name of an output: the derivation name,
    /// suffixed with `-$output_name` unless it's the default output.
    fn output_object_name(&self, output_name: &str) -> String {
        if output_name == DEFAULT_OUTPUT_NAME {
            self.name.clone()
        } else {
            format!("{}-{}", self.name, output_name)
        }
    }

    /// Returns the store path of a fixed output.
    ///
    /// Paths of floating outputs are only known after they have been
    /// built.
    pub fn output_path(&self, output_name: &str) -> Result<StorePath, OutputPathError> {
        let ca_hash = match self.outputs.get(output_name) {
            None => return Err(OutputPathError::NoSuchOutput(output_name.to_string())),
            Some(output) => output
                .as_ref()
                .and_then(OutputType::fixed_ca)
                .ok_or_else(|| OutputPathError::NotFixed(output_name.to_string()))?,
        };

        build_ca_path(
            &self.dir,
            &self.output_object_name(output_name),
            ca_hash,
            &References::default(),
        )
        .map_err(|e| OutputPathError::BuildStorePath(output_name.to_string(), e))
    }

    /// Returns the references of the serialized derivation: all input
    /// sources and input derivation paths.
    pub fn references(&self) -> References {
        let mut others = self.input_sources.clone();
        others.extend(self.input_derivations.keys().cloned());

        References {
            self_reference: false,
            others,
        }
    }

    /// Iterates over the outputs of input derivations this derivation
    /// depends on, ordered by derivation path and output name.
    pub fn input_derivation_outputs(&self) -> impl Iterator<Item = OutputReference> + '_ {
        self.input_derivations
            .iter()
            .flat_map(|(drv_path, output_names)| {
                output_names.iter().map(move |output_name| OutputReference {
                    drv_path: drv_path.clone(),
                    output_name: output_name.clone(),
                })
            })
    }
}
