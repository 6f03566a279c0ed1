//! Interface templates describing how each class is put on the wire.

use std::path::Path;

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

const BUILTIN_CATALOG: &str = include_str!("../catalog/tinyusb.json");

/// Value shape a template property accepts.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Array,
    Scalar,
}

impl PropertyType {
    pub fn accepts(&self, value: &Value) -> bool {
        match self {
            PropertyType::String => value.is_string(),
            PropertyType::Array => value.is_array(),
            PropertyType::Scalar => value.is_number() || value.is_boolean(),
        }
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", match self {
            PropertyType::String => "a string",
            PropertyType::Array => "an array",
            PropertyType::Scalar => "a number or boolean"})
    }
}

/// Schema of one template property.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Property {
    #[serde(rename = "type")]
    pub kind: PropertyType,
    /// Value used when the instance omits the property. Without one the
    /// property is mandatory.
    #[serde(default)]
    pub default: Option<Value>,
    /// Whether the value feeds a stack-wide `CFG_TUD_<CLASS>_<NAME>` macro.
    #[serde(default)]
    pub global: bool,
    /// Prefix applied to each element when building the `.mask` key.
    #[serde(default)]
    pub mask: Option<String>,
}

/// How a descriptor field obtains its value.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "Value")]
pub enum FieldExpr {
    /// Passed through unchanged.
    Literal(Value),
    /// Allocates an endpoint address.
    Endpoint,
    /// Registers a string descriptor; holds the expression after `@`.
    StringRef(String),
    /// Substitution expression.
    Text(String),
}

impl From<Value> for FieldExpr {
    fn from(value: Value) -> FieldExpr {
        match value {
            Value::String(text) if text == "#endpoint" => FieldExpr::Endpoint,
            Value::String(text) => match text.strip_prefix('@') {
                Some(expression) => FieldExpr::StringRef(expression.to_string()),
                None => FieldExpr::Text(text),
            },
            other => FieldExpr::Literal(other),
        }
    }
}

/// One argument of a descriptor macro call.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(from = "(String, FieldExpr)")]
pub struct Field {
    pub name: String,
    pub expr: FieldExpr,
}

impl From<(String, FieldExpr)> for Field {
    fn from((name, expr): (String, FieldExpr)) -> Field {
        Field { name, expr }
    }
}

fn one() -> u8 {
    1
}

/// A device interface class as it appears in a configuration descriptor.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    /// Stack class name, used for `CFG_TUD_<CLASS>` macros.
    pub class: String,
    /// C++ namespace of the runtime class, when it differs from `class`.
    #[serde(default)]
    pub namespace: Option<String>,
    /// Descriptor macro invoked for each instance.
    pub descriptor: String,
    /// Expression giving the byte length of one instance's descriptors.
    pub length: String,
    /// Interface numbers consumed by one instance.
    #[serde(default = "one")]
    pub interfaces: u8,
    /// Property listing HID report names, for HID-like templates.
    #[serde(default)]
    pub reports: Option<String>,
    #[serde(default)]
    pub properties: IndexMap<String, Property>,
    pub fields: Vec<Field>,
}

impl Template {
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(&self.class)
    }
}

/// A host-side class driver.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostClass {
    pub class: String,
    #[serde(default)]
    pub namespace: Option<String>,
}

impl HostClass {
    pub fn namespace(&self) -> &str {
        self.namespace.as_deref().unwrap_or(&self.class)
    }
}

/// All templates and host classes known to the generator.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Catalog {
    pub templates: IndexMap<String, Template>,
    #[serde(default)]
    pub host: IndexMap<String, HostClass>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    pub fn builtin() -> Result<Catalog, Error> {
        Catalog::from_json(BUILTIN_CATALOG)
    }

    pub fn from_json(text: &str) -> Result<Catalog, Error> {
        let catalog: Catalog = serde_json::from_str(text)
            .map_err(|e| Error::Catalog(e.to_string()))?;
        for (tag, template) in &catalog.templates {
            if let Some(reports) = &template.reports {
                match template.properties.get(reports) {
                    Some(property) if property.kind == PropertyType::Array => {}
                    _ => return Err(Error::Catalog(format!(
                        "template '{tag}' takes reports from '{reports}', \
                         which is not an array property"))),
                }
            }
            for (name, property) in &template.properties {
                if let Some(default) = &property.default {
                    if !property.kind.accepts(default) {
                        return Err(Error::Catalog(format!(
                            "default for '{tag}.{name}' must be {}",
                            property.kind)));
                    }
                }
            }
        }
        Ok(catalog)
    }

    pub fn load(path: &Path) -> Result<Catalog, Error> {
        let text = std::fs::read_to_string(path)?;
        Catalog::from_json(&text)
    }

    pub fn template(&self, tag: &str, template: &str) -> Result<&Template, Error> {
        self.templates.get(template).ok_or_else(|| Error::UnknownTemplate {
            tag: tag.to_string(),
            template: template.to_string(),
        })
    }

    pub fn host_class(&self, name: &str) -> Result<&HostClass, Error> {
        self.host.get(name).ok_or_else(|| Error::UnknownClassName {
            kind: "host class",
            name: name.to_string(),
        })
    }
}
