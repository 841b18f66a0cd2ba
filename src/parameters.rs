//! Name-keyed configuration values.
use eyre::eyre;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Parameter {
    Bool(bool),
    Integer(i64),
    Real(f64),
    String(String),
    Parameters(Parameters),
}

impl Parameter {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "a boolean",
            Self::Integer(_) => "an integer",
            Self::Real(_) => "a real",
            Self::String(_) => "a string",
            Self::Parameters(_) => "a parameter set",
        }
    }
}

impl From<bool> for Parameter {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Parameter {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<usize> for Parameter {
    fn from(value: usize) -> Self {
        Self::Integer(value as i64)
    }
}

impl From<f64> for Parameter {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for Parameter {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Parameter {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Parameters> for Parameter {
    fn from(value: Parameters) -> Self {
        Self::Parameters(value)
    }
}

/// A bag of named parameters, possibly nested.
///
/// ```
/// use nlfem::parameters::Parameters;
///
/// let parameters = Parameters::new()
///     .with("YoungModulus", 150e9)
///     .with("PoissonRatio", 0.3);
/// assert_eq!(parameters.get_real("YoungModulus").unwrap(), 150e9);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameters {
    values: BTreeMap<String, Parameter>,
}

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> eyre::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn with(mut self, name: impl Into<String>, value: impl Into<Parameter>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Parameter>) {
        self.values.insert(name.into(), value.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    pub fn get(&self, name: &str) -> eyre::Result<&Parameter> {
        self.values
            .get(name)
            .ok_or_else(|| eyre!("missing parameter '{}'", name))
    }

    fn mismatch(name: &str, expected: &str, actual: &Parameter) -> eyre::Report {
        eyre!("parameter '{}' must be {}, got {}", name, expected, actual.type_name())
    }

    pub fn get_bool(&self, name: &str) -> eyre::Result<bool> {
        match self.get(name)? {
            Parameter::Bool(value) => Ok(*value),
            other => Err(Self::mismatch(name, "a boolean", other)),
        }
    }

    pub fn get_integer(&self, name: &str) -> eyre::Result<i64> {
        match self.get(name)? {
            Parameter::Integer(value) => Ok(*value),
            other => Err(Self::mismatch(name, "an integer", other)),
        }
    }

    /// Gets a non-negative integer.
    pub fn get_usize(&self, name: &str) -> eyre::Result<usize> {
        let value = self.get_integer(name)?;
        usize::try_from(value).map_err(|_| eyre!("parameter '{}' must be non-negative, got {}", name, value))
    }

    /// Gets a real value. Integers are converted.
    pub fn get_real(&self, name: &str) -> eyre::Result<f64> {
        match self.get(name)? {
            Parameter::Real(value) => Ok(*value),
            Parameter::Integer(value) => Ok(*value as f64),
            other => Err(Self::mismatch(name, "a real", other)),
        }
    }

    pub fn get_string(&self, name: &str) -> eyre::Result<&str> {
        match self.get(name)? {
            Parameter::String(value) => Ok(value),
            other => Err(Self::mismatch(name, "a string", other)),
        }
    }

    pub fn get_parameters(&self, name: &str) -> eyre::Result<&Parameters> {
        match self.get(name)? {
            Parameter::Parameters(value) => Ok(value),
            other => Err(Self::mismatch(name, "a parameter set", other)),
        }
    }

    /// Rejects any parameter whose name is not in `allowed`.
    pub fn check_parameters(&self, allowed: &[&str]) -> eyre::Result<()> {
        match self.names().find(|name| !allowed.contains(name)) {
            Some(name) => Err(eyre!(
                "unexpected parameter '{}', expected one of: {}",
                name,
                allowed.join(", ")
            )),
            None => Ok(()),
        }
    }
}
