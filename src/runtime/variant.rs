//! Dynamically typed values used in configuration maps
//!
//! Option and probe maps arrive untyped from the host. Every value carries its
//! own tag, which the option and probe engines check against what the decoder
//! descriptor declares.

use std::collections::HashMap;
use std::fmt;

/// Tagged configuration value
#[derive(Debug, Clone, PartialEq)]
pub enum Variant {
    Str(String),
    I32(i32),
    I64(i64),
    U64(u64),
    Bool(bool),
    F64(f64),
}

/// Tag of a [`Variant`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariantType {
    Str,
    I32,
    I64,
    U64,
    Bool,
    F64,
}

impl Variant {
    pub fn variant_type(&self) -> VariantType {
        match self {
            Variant::Str(_) => VariantType::Str,
            Variant::I32(_) => VariantType::I32,
            Variant::I64(_) => VariantType::I64,
            Variant::U64(_) => VariantType::U64,
            Variant::Bool(_) => VariantType::Bool,
            Variant::F64(_) => VariantType::F64,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Variant::I64(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for VariantType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            VariantType::Str => "string",
            VariantType::I32 => "int32",
            VariantType::I64 => "int64",
            VariantType::U64 => "uint64",
            VariantType::Bool => "boolean",
            VariantType::F64 => "double",
        };
        f.write_str(name)
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Variant::Str(s) => write!(f, "'{}'", s),
            Variant::I32(v) => write!(f, "int32 {}", v),
            Variant::I64(v) => write!(f, "int64 {}", v),
            Variant::U64(v) => write!(f, "uint64 {}", v),
            Variant::Bool(v) => write!(f, "{}", v),
            Variant::F64(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Variant {
    fn from(value: &str) -> Self {
        Variant::Str(value.to_string())
    }
}

impl From<String> for Variant {
    fn from(value: String) -> Self {
        Variant::Str(value)
    }
}

impl From<i32> for Variant {
    fn from(value: i32) -> Self {
        Variant::I32(value)
    }
}

impl From<i64> for Variant {
    fn from(value: i64) -> Self {
        Variant::I64(value)
    }
}

impl From<u64> for Variant {
    fn from(value: u64) -> Self {
        Variant::U64(value)
    }
}

impl From<bool> for Variant {
    fn from(value: bool) -> Self {
        Variant::Bool(value)
    }
}

impl From<f64> for Variant {
    fn from(value: f64) -> Self {
        Variant::F64(value)
    }
}

/// Untyped option input: option id -> value
pub type OptionMap = HashMap<String, Variant>;

/// Untyped probe input: probe id -> channel index (must be [`Variant::I32`])
pub type ProbeMap = HashMap<String, Variant>;
