//! Template helpers, grouped into named helper APIs.
//!
//! Helpers are plain functions over JSON values so they work with any
//! [`TemplateEngine`](crate::generation::engine::TemplateEngine). A unit names
//! one API in its `helper-api-name`; an unknown name fails that unit.

use crate::error::GenerationError;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Helper function: positional template arguments in, JSON value out.
pub type HelperFn = fn(&[Value]) -> Result<Value, String>;

/// Helpers bound to one render.
#[derive(Clone, Default)]
pub struct HelperSet {
    pub api: String,
    pub helpers: Vec<(&'static str, HelperFn)>,
}

impl HelperSet {
    pub fn names(&self) -> Vec<&'static str> {
        self.helpers.iter().map(|(name, _)| *name).collect()
    }
}

impl fmt::Debug for HelperSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HelperSet")
            .field("api", &self.api)
            .field("helpers", &self.names())
            .finish()
    }
}

/// Named helper APIs available to generation units.
#[derive(Clone)]
pub struct HelperRegistry {
    apis: BTreeMap<String, Vec<(&'static str, HelperFn)>>,
}

impl fmt::Debug for HelperRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.apis.keys()).finish()
    }
}

impl Default for HelperRegistry {
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("zcl-helper", zcl_helpers());
        registry.register("string-helper", string_helpers());
        registry
    }
}

impl HelperRegistry {
    pub fn empty() -> Self {
        Self {
            apis: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, api: &str, helpers: Vec<(&'static str, HelperFn)>) {
        self.apis.insert(api.to_string(), helpers);
    }

    pub fn api_names(&self) -> Vec<&str> {
        self.apis.keys().map(String::as_str).collect()
    }

    pub fn resolve(&self, api: &str) -> Result<HelperSet, GenerationError> {
        self.apis
            .get(api)
            .map(|helpers| HelperSet {
                api: api.to_string(),
                helpers: helpers.clone(),
            })
            .ok_or_else(|| GenerationError::HelperResolution(api.to_string()))
    }
}

fn zcl_helpers() -> Vec<(&'static str, HelperFn)> {
    vec![
        ("asHex", as_hex as HelperFn),
        ("asMacro", as_macro as HelperFn),
        ("asCamelCase", as_camel_case as HelperFn),
        ("asTypeSize", as_type_size as HelperFn),
        ("isClient", is_client as HelperFn),
        ("isServer", is_server as HelperFn),
    ]
}

fn string_helpers() -> Vec<(&'static str, HelperFn)> {
    vec![
        ("toUpperCase", to_upper_case as HelperFn),
        ("toLowerCase", to_lower_case as HelperFn),
        ("asCamelCase", as_camel_case as HelperFn),
        ("asSnakeCase", as_snake_case as HelperFn),
        ("join", join as HelperFn),
    ]
}

fn arg<'a>(args: &'a [Value], index: usize) -> Result<&'a Value, String> {
    args.get(index)
        .ok_or_else(|| format!("missing argument {}", index + 1))
}

fn text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn words(s: &str) -> Vec<String> {
    s.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// `{{asHex code 4}}` -> `0x0006`. Width defaults to 4 digits.
fn as_hex(args: &[Value]) -> Result<Value, String> {
    let value = match arg(args, 0)? {
        Value::Number(n) => n.as_u64().ok_or_else(|| format!("not an unsigned code: {}", n))?,
        Value::String(s) => u64::from(crate::types::parse_code(s)?),
        other => return Err(format!("not a code: {}", other)),
    };
    let width = match args.get(1) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(4) as usize,
        _ => 4,
    };
    Ok(Value::String(format!("0x{:0width$X}", value, width = width)))
}

/// `On/off` -> `ON_OFF`.
fn as_macro(args: &[Value]) -> Result<Value, String> {
    let joined = words(&text(arg(args, 0)?))
        .iter()
        .map(|w| w.to_uppercase())
        .collect::<Vec<_>>()
        .join("_");
    Ok(Value::String(joined))
}

/// `on/off switch` -> `onOffSwitch`.
fn as_camel_case(args: &[Value]) -> Result<Value, String> {
    let mut out = String::new();
    for (i, word) in words(&text(arg(args, 0)?)).iter().enumerate() {
        let lower = word.to_lowercase();
        if i == 0 {
            out.push_str(&lower);
        } else {
            let mut chars = lower.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        }
    }
    Ok(Value::String(out))
}

fn as_snake_case(args: &[Value]) -> Result<Value, String> {
    let joined = words(&text(arg(args, 0)?))
        .iter()
        .map(|w| w.to_lowercase())
        .collect::<Vec<_>>()
        .join("_");
    Ok(Value::String(joined))
}

/// Size of an enriched attribute row (`typeSize`), 0 when unknown.
fn as_type_size(args: &[Value]) -> Result<Value, String> {
    let size = arg(args, 0)?
        .get("typeSize")
        .and_then(Value::as_u64)
        .unwrap_or(0);
    Ok(Value::from(size))
}

fn is_client(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(text(arg(args, 0)?).eq_ignore_ascii_case("client")))
}

fn is_server(args: &[Value]) -> Result<Value, String> {
    Ok(Value::Bool(text(arg(args, 0)?).eq_ignore_ascii_case("server")))
}

fn to_upper_case(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(text(arg(args, 0)?).to_uppercase()))
}

fn to_lower_case(args: &[Value]) -> Result<Value, String> {
    Ok(Value::String(text(arg(args, 0)?).to_lowercase()))
}

/// `{{join items ", "}}` over an array of scalars.
fn join(args: &[Value]) -> Result<Value, String> {
    let items = arg(args, 0)?
        .as_array()
        .ok_or_else(|| "join expects an array".to_string())?;
    let sep = args.get(1).map(text).unwrap_or_else(|| ", ".to_string());
    Ok(Value::String(
        items.iter().map(text).collect::<Vec<_>>().join(&sep),
    ))
}
