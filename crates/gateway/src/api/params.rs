//! Parameter validation for RPC methods.
//!
//! A [`Params`] reader walks one params object and records every problem
//! instead of stopping at the first, so a single `INVALID_REQUEST` can list
//! all failed fields.  Nothing is acted upon until [`Params::finish`]
//! returns `Ok`.

use serde_json::{Map, Value};

use super::error::RpcError;

/// Highest accepted thinking/verbose/reasoning level.
pub const MAX_LEVEL: u64 = 9;

pub struct Params<'a> {
    obj: Option<&'a Map<String, Value>>,
    errors: Vec<String>,
}

impl<'a> Params<'a> {
    /// Start reading `value`, rejecting any field not in `allowed`.  A
    /// `null` params value counts as `{}`.
    pub fn new(value: &'a Value, allowed: &[&str]) -> Self {
        static EMPTY: std::sync::LazyLock<Map<String, Value>> =
            std::sync::LazyLock::new(Map::new);

        let mut errors = Vec::new();
        let obj = match value {
            Value::Object(map) => Some(map),
            Value::Null => Some(&*EMPTY),
            _ => {
                errors.push("params must be an object".to_owned());
                None
            }
        };
        if let Some(map) = obj {
            let mut unknown: Vec<&String> =
                map.keys().filter(|k| !allowed.contains(&k.as_str())).collect();
            unknown.sort();
            for k in unknown {
                errors.push(format!("unknown field `{k}`"));
            }
        }
        Self { obj, errors }
    }

    fn get(&self, name: &str) -> Option<&'a Value> {
        self.obj.and_then(|m| m.get(name))
    }

    fn fail(&mut self, name: &str, msg: &str) {
        self.errors.push(format!("`{name}` {msg}"));
    }

    /// Whether `name` was sent at all (including as `null`).
    pub fn has(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn required_str(&mut self, name: &str) -> Option<String> {
        match self.get(name) {
            None | Some(Value::Null) => {
                self.fail(name, "is required");
                None
            }
            Some(_) => self.opt_str(name),
        }
    }

    pub fn opt_str(&mut self, name: &str) -> Option<String> {
        match self.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_owned()),
            Some(_) => {
                self.fail(name, "must be a non-empty string");
                None
            }
        }
    }

    pub fn opt_bool(&mut self, name: &str) -> Option<bool> {
        match self.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(*b),
            Some(_) => {
                self.fail(name, "must be a boolean");
                None
            }
        }
    }

    /// Whole number `>= min`.
    pub fn opt_u64(&mut self, name: &str, min: u64) -> Option<u64> {
        match self.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_u64() {
                Some(v) if v >= min => Some(v),
                _ => {
                    self.fail(name, &format!("must be an integer >= {min}"));
                    None
                }
            },
            Some(_) => {
                self.fail(name, "must be a number");
                None
            }
        }
    }

    /// Any finite number, floored and clamped to `>= min`.
    pub fn opt_floor(&mut self, name: &str, min: usize) -> Option<usize> {
        match self.get(name) {
            None | Some(Value::Null) => None,
            Some(Value::Number(n)) => match n.as_f64() {
                Some(f) if f.is_finite() => {
                    let floored = f.floor();
                    if floored < min as f64 {
                        Some(min)
                    } else if floored >= usize::MAX as f64 {
                        Some(usize::MAX)
                    } else {
                        Some(floored as usize)
                    }
                }
                _ => {
                    self.fail(name, "must be a finite number");
                    None
                }
            },
            Some(_) => {
                self.fail(name, "must be a number");
                None
            }
        }
    }

    /// Absent → `None`; `null` → `Some(None)` (clear); string → set.
    pub fn nullable_str(&mut self, name: &str) -> Option<Option<String>> {
        match self.get(name) {
            None => None,
            Some(Value::Null) => Some(None),
            Some(Value::String(s)) if !s.trim().is_empty() => Some(Some(s.trim().to_owned())),
            Some(_) => {
                self.fail(name, "must be a non-empty string or null");
                None
            }
        }
    }

    /// Absent → `None`; `null` → clear; `0..=MAX_LEVEL` → set.
    pub fn nullable_level(&mut self, name: &str) -> Option<Option<u8>> {
        match self.get(name) {
            None => None,
            Some(Value::Null) => Some(None),
            Some(v) => match v.as_u64() {
                Some(n) if n <= MAX_LEVEL => Some(Some(n as u8)),
                _ => {
                    self.fail(name, &format!("must be an integer 0..={MAX_LEVEL} or null"));
                    None
                }
            },
        }
    }

    /// Absent → `None`; `null` → clear; one of `choices` → parsed value.
    pub fn nullable_choice<T: serde::de::DeserializeOwned>(
        &mut self,
        name: &str,
        choices: &[&str],
    ) -> Option<Option<T>> {
        match self.get(name) {
            None => None,
            Some(Value::Null) => Some(None),
            Some(v) if v.as_str().is_some_and(|s| choices.contains(&s)) => {
                match serde_json::from_value(v.clone()) {
                    Ok(t) => Some(Some(t)),
                    Err(_) => {
                        self.fail(name, "could not be parsed");
                        None
                    }
                }
            }
            Some(_) => {
                let list = choices
                    .iter()
                    .map(|c| format!("\"{c}\""))
                    .collect::<Vec<_>>()
                    .join(", ");
                self.fail(name, &format!("must be one of {list} or null"));
                None
            }
        }
    }

    /// Record a cross-field problem.
    pub fn error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// `Ok` when every read succeeded; otherwise one `INVALID_REQUEST`
    /// naming all failures.
    pub fn finish(self) -> Result<(), RpcError> {
        if self.errors.is_empty() {
            return Ok(());
        }
        Err(RpcError::invalid_request(format!(
            "invalid params: {}",
            self.errors.join("; ")
        ))
        .with_details(serde_json::json!({ "errors": self.errors })))
    }
}
