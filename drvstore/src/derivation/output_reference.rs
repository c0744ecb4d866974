use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::{is_valid_output_name, OutputReferenceError};
use crate::store_path::StorePath;

/// A reference to one output of a derivation.
///
/// Its string form is the derivation path and the output name, separated
/// by `!`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OutputReference {
    pub drv_path: StorePath,
    pub output_name: String,
}

/// Splits an output reference on the last `!`.
pub(crate) fn split_output_reference(s: &str) -> Option<(&str, &str)> {
    s.rsplit_once('!')
}

impl FromStr for OutputReference {
    type Err = OutputReferenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (drv_path, output_name) = split_output_reference(s)
            .ok_or_else(|| OutputReferenceError::MissingSeparator(s.to_string()))?;

        if !is_valid_output_name(output_name) {
            return Err(OutputReferenceError::InvalidOutputName {
                reference: s.to_string(),
                output: output_name.to_string(),
            });
        }

        let drv_path = StorePath::from_absolute_path(drv_path).map_err(|source| {
            OutputReferenceError::InvalidPath {
                reference: s.to_string(),
                source,
            }
        })?;

        if drv_path.derivation_name().is_none() {
            return Err(OutputReferenceError::NotDerivation(s.to_string()));
        }

        Ok(Self {
            drv_path,
            output_name: output_name.to_string(),
        })
    }
}

impl fmt::Display for OutputReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}!{}", self.drv_path, self.output_name)
    }
}

impl Serialize for OutputReference {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        if !is_valid_output_name(&self.output_name) {
            return Err(serde::ser::Error::custom(format!(
                "invalid output name {:?}",
                self.output_name
            )));
        }
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for OutputReference {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
