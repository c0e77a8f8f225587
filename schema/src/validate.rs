//! Built-in and user field validators.

use crate::FieldDef;
use entgraph_core::Value;
use regex_lite::Regex;

impl FieldDef {
    /// Run the field's validators against a value about to be written.
    /// Null values are not validated.
    pub fn check_value(&self, value: &Value) -> Result<(), String> {
        if value.is_null() {
            return Ok(());
        }
        self.check_enum(value)?;
        self.check_range(value)?;
        self.check_length(value)?;
        self.check_pattern(value)?;
        for validator in &self.validators {
            validator.check(value)?;
        }
        Ok(())
    }

    fn check_enum(&self, value: &Value) -> Result<(), String> {
        match value.as_str() {
            Some(s) if !self.enum_values.is_empty() && !self.enum_values.iter().any(|v| v == s) => {
                Err(format!("invalid enum value {:?}", s))
            }
            _ => Ok(()),
        }
    }

    fn check_range(&self, value: &Value) -> Result<(), String> {
        let Some(v) = value.as_float() else {
            return Ok(());
        };
        if let Some(min) = self.min.as_ref().and_then(Value::as_float) {
            if v < min {
                return Err(format!("value {} is less than the minimum {}", value, min));
            }
        }
        if let Some(max) = self.max.as_ref().and_then(Value::as_float) {
            if v > max {
                return Err(format!("value {} is greater than the maximum {}", value, max));
            }
        }
        Ok(())
    }

    fn check_length(&self, value: &Value) -> Result<(), String> {
        let len = match value {
            Value::String(s) => s.chars().count(),
            Value::Bytes(b) => b.len(),
            _ => return Ok(()),
        };
        if let Some(min) = self.length_min {
            if len < min {
                return Err(format!("length {} is shorter than {}", len, min));
            }
        }
        if let Some(max) = self.length_max {
            if len > max {
                return Err(format!("length {} is longer than {}", len, max));
            }
        }
        Ok(())
    }

    fn check_pattern(&self, value: &Value) -> Result<(), String> {
        let (Some(pattern), Some(s)) = (self.match_pattern.as_deref(), value.as_str()) else {
            return Ok(());
        };
        let matched = match &self.matcher {
            Some(re) => re.is_match(s),
            None => Regex::new(pattern)
                .map_err(|e| format!("invalid pattern {:?}: {}", pattern, e))?
                .is_match(s),
        };
        if matched {
            Ok(())
        } else {
            Err(format!("value {:?} does not match {:?}", s, pattern))
        }
    }

    /// Compile `match_pattern` once so validation does not recompile it.
    pub(crate) fn compile_pattern(&mut self) -> Result<(), regex_lite::Error> {
        if let Some(pattern) = &self.match_pattern {
            self.matcher = Some(Regex::new(pattern)?);
        }
        Ok(())
    }
}
