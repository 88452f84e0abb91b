//! Parameter context of one macro invocation.

use alloc::string::{String, ToString};

use crate::eval::{self, Bindings, Value};

/// Live parameter bindings: the macro's defaults overlaid with the caller's
/// overrides, updated by `EXEC>` lines while the macro runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    bindings: Bindings,
}

impl Params {
    /// Merge `overrides` over `defaults`.
    ///
    /// Overrides holding an empty string are ignored so that a caller can
    /// leave a field blank and keep the default.
    pub fn new<'a, I>(defaults: &Bindings, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Value)>,
    {
        let mut bindings = defaults.clone();
        for (key, value) in overrides {
            if matches!(&value, Value::Str(s) if s.is_empty()) {
                continue;
            }
            bindings.insert(key.to_string(), value);
        }
        Self { bindings }
    }

    /// Build from JSON overrides, as carried by a command payload.
    ///
    /// Strings are read like `DEFAULT>` literals, so `"false"` and `"5"`
    /// become a boolean and a number. `null` and empty strings are ignored;
    /// arrays and objects are kept as their JSON text.
    pub fn from_json(defaults: &Bindings, overrides: &serde_json::Map<String, serde_json::Value>) -> Self {
        Self::new(
            defaults,
            overrides
                .iter()
                .filter_map(|(k, v)| json_to_value(v).map(|v| (k.as_str(), v))),
        )
    }

    /// Evaluate `expr` as a boolean. Any failure yields `false`.
    #[must_use]
    pub fn get_bool(&self, expr: &str) -> bool {
        match eval::evaluate(expr, &self.bindings) {
            Ok(v) => v.is_truthy(),
            Err(_e) => {
                trace!("bool expression failed");
                false
            }
        }
    }

    /// Evaluate `expr` as an integer. Any failure yields `0`.
    #[must_use]
    pub fn get_int(&self, expr: &str) -> i64 {
        self.get_int_or(expr, 0)
    }

    /// Evaluate `expr` as an integer, rounded half away from zero.
    /// Any failure yields `default`.
    #[must_use]
    pub fn get_int_or(&self, expr: &str, default: i64) -> i64 {
        let number = eval::evaluate(expr, &self.bindings)
            .ok()
            .and_then(|v| match v {
                Value::Str(s) => s.parse::<f64>().ok(),
                other => other.as_number(),
            });
        match number {
            Some(n) if n.is_finite() => round_half_away(n),
            _ => default,
        }
    }

    /// Run `name=expr` statements against the live bindings.
    /// Errors are swallowed; assignments before the failure stick.
    pub fn exec(&mut self, statements: &str) {
        if eval::execute(statements, &mut self.bindings).is_err() {
            debug!("EXEC statement failed");
        }
    }

    /// Look up a bound value.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bindings.get(name)
    }

    #[must_use]
    pub fn bindings(&self) -> &Bindings {
        &self.bindings
    }
}

fn json_to_value(value: &serde_json::Value) -> Option<Value> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(Value::Bool(*b)),
        serde_json::Value::Number(n) => n.as_f64().map(Value::Number),
        serde_json::Value::String(s) => Some(Value::from_literal(s)),
        other => Some(Value::Str(other.to_string())),
    }
}

/// Round half away from zero without `libm`.
fn round_half_away(n: f64) -> i64 {
    let truncated = n as i64;
    let fraction = n - truncated as f64;
    if fraction >= 0.5 {
        truncated.saturating_add(1)
    } else if fraction <= -0.5 {
        truncated.saturating_sub(1)
    } else {
        truncated
    }
}
