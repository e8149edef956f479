// SPDX-License-Identifier: MIT
// Copyright 2021 Daniel Vogelbacher <daniel@chaospixel.com>

use serde::{Deserialize, Serialize};

use super::{DataType, Rational, SRational, ValidationError, Value};
use crate::tags::{self, Scope};

/// A single tagged value of a directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
  pub tag: u16,
  pub value: Value,
}

impl std::ops::Deref for Field {
  type Target = Value;

  fn deref(&self) -> &Self::Target {
    &self.value
  }
}

impl Field {
  pub fn new<T: Into<u16>, V: Into<Value>>(tag: T, value: V) -> Self {
    Self {
      tag: tag.into(),
      value: value.into(),
    }
  }

  /// ASCII text, the zero terminator is appended
  pub fn ascii<T: Into<u16>>(tag: T, text: &str) -> Self {
    Self::new(tag, text)
  }

  pub fn byte<T: Into<u16>>(tag: T, values: &[u8]) -> Self {
    Self::new(tag, Value::Byte(values.to_vec()))
  }

  pub fn undefined<T: Into<u16>>(tag: T, data: Vec<u8>) -> Self {
    Self::new(tag, Value::Undefined(data))
  }

  pub fn short<T: Into<u16>>(tag: T, values: &[u16]) -> Self {
    Self::new(tag, Value::Short(values.to_vec()))
  }

  pub fn long<T: Into<u16>>(tag: T, values: &[u32]) -> Self {
    Self::new(tag, Value::Long(values.to_vec()))
  }

  pub fn rational<T: Into<u16>>(tag: T, values: &[Rational]) -> Self {
    Self::new(tag, Value::Rational(values.to_vec()))
  }

  pub fn srational<T: Into<u16>>(tag: T, values: &[SRational]) -> Self {
    Self::new(tag, Value::SRational(values.to_vec()))
  }

  pub fn double<T: Into<u16>>(tag: T, values: &[f64]) -> Self {
    Self::new(tag, Value::Double(values.to_vec()))
  }

  pub fn data_type(&self) -> DataType {
    self.value.data_type()
  }

  /// Check the field against the registry rule for `scope`.
  /// Tags without a rule are accepted.
  pub fn check(&self, scope: Scope) -> std::result::Result<(), ValidationError> {
    match tags::lookup(self.tag, scope) {
      Some(info) => info.check(self.data_type(), self.count()).map_err(|reason| ValidationError::TypeMismatch {
        tag: self.tag,
        scope,
        reason,
      }),
      None => Ok(()),
    }
  }

  /// Registry name of this field in the given scope
  pub fn name(&self, scope: Scope) -> Option<&'static str> {
    tags::lookup(self.tag, scope).map(|info| info.name)
  }
}
