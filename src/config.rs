//! The hardware configuration document and its validation.

use indexmap::IndexMap;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::catalog::Catalog;
use crate::error::{Error, Violation};
use crate::expr::identifier;
use crate::usb::{BCDVersion, MAX_STRING_BYTES, UTF16ByteVec};

/// Vendor or product id, either numeric or a symbol/literal string.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum IdValue {
    Number(u16),
    Text(String),
}

impl std::fmt::Display for IdValue {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            IdValue::Number(id) => write!(f, "0x{id:04x}"),
            IdValue::Text(text) => write!(f, "{text}"),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigAttribute {
    RemoteWakeup,
    SelfPowered,
}

impl ConfigAttribute {
    const NAMES: [&'static str; 2] = ["remote_wakeup", "self_powered"];

    pub fn symbol(&self) -> &'static str {
        match self {
            ConfigAttribute::RemoteWakeup => "TUSB_DESC_CONFIG_ATT_REMOTE_WAKEUP",
            ConfigAttribute::SelfPowered => "TUSB_DESC_CONFIG_ATT_SELF_POWERED",
        }
    }
}

fn default_class() -> String { "misc".to_string() }
fn default_subclass() -> String { "common".to_string() }
fn default_protocol() -> String { "iad".to_string() }
fn default_version() -> f64 { 1.0 }
fn default_power() -> u16 { 100 }
fn default_count() -> u8 { 1 }

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Device {
    pub vendor: IdValue,
    /// Product id; the stack's `USB_PID` auto-assignment when absent.
    #[serde(default)]
    pub pid: Option<IdValue>,
    #[serde(default = "default_class")]
    pub class: String,
    #[serde(default = "default_subclass")]
    pub subclass: String,
    #[serde(default = "default_protocol")]
    pub protocol: String,
    #[serde(default = "default_version")]
    pub version: f64,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub serial: String,
    pub configurations: IndexMap<String, Configuration>,
}

impl Device {
    pub fn bcd_version(&self) -> BCDVersion {
        // Range is checked during validation.
        BCDVersion::from_decimal(self.version).unwrap_or_default()
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub description: Option<String>,
    /// Maximum bus power draw in mA.
    #[serde(default = "default_power")]
    pub power: u16,
    #[serde(default)]
    pub attributes: Vec<ConfigAttribute>,
    #[serde(default)]
    pub interfaces: IndexMap<String, Interface>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Interface {
    pub template: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(flatten)]
    pub properties: IndexMap<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HostSection {
    #[serde(default = "default_count")]
    pub count: u8,
}

/// A validated configuration document.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Document {
    #[serde(rename = "$schema", default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub devices: IndexMap<String, Device>,
    #[serde(default)]
    pub host: IndexMap<String, HostSection>,
}

impl Document {
    pub fn from_json(text: &str, catalog: &Catalog) -> Result<Document, Error> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| invalid("", format!("not valid JSON: {e}")))?;
        Document::from_value(value, catalog)
    }

    /// Check `value` against the catalog and convert it.
    ///
    /// Every violation found is reported, not just the first.
    pub fn from_value(value: Value, catalog: &Catalog) -> Result<Document, Error> {
        let mut validator = Validator::new(catalog);
        validator.document(&value);
        if !validator.violations.is_empty() {
            return Err(Error::SchemaValidation(validator.violations));
        }
        serde_json::from_value(value).map_err(|e| invalid("", e.to_string()))
    }
}

fn invalid(path: &str, message: String) -> Error {
    Error::SchemaValidation(vec![Violation::new(path, message)])
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}/{key}")
    }
}

fn is_c_identifier(tag: &str) -> bool {
    let mut chars = tag.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_') &&
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

struct Validator<'c> {
    catalog: &'c Catalog,
    violations: Vec<Violation>,
    /// Path of the first use of each tag identifier.
    tags: IndexMap<String, String>,
}

impl<'c> Validator<'c> {
    fn new(catalog: &'c Catalog) -> Self {
        Validator {
            catalog,
            violations: Vec::new(),
            tags: IndexMap::new(),
        }
    }

    fn violation(&mut self, path: &str, message: impl Into<String>) {
        self.violations.push(Violation::new(path, message));
    }

    fn object<'v>(&mut self, path: &str, value: &'v Value)
        -> Option<&'v Map<String, Value>>
    {
        let object = value.as_object();
        if object.is_none() {
            self.violation(path, "must be an object");
        }
        object
    }

    fn keys(&mut self, path: &str, object: &Map<String, Value>, allowed: &[&str]) {
        for key in object.keys() {
            if !allowed.contains(&key.as_str()) {
                self.violation(&join(path, key), "unexpected key");
            }
        }
    }

    fn tag(&mut self, path: &str, tag: &str, symbol: bool) {
        if tag.is_empty() {
            self.violation(path, "tag must not be empty");
            return;
        }
        if symbol && !is_c_identifier(tag) {
            self.violation(path, "tag must be a C identifier");
        }
        let id = identifier(tag);
        match self.tags.get(&id) {
            Some(first) => {
                let message = format!("tag '{tag}' clashes with '{first}'");
                self.violation(path, message);
            }
            None => {
                self.tags.insert(id, path.to_string());
            }
        }
    }

    fn string(&mut self, path: &str, object: &Map<String, Value>, key: &str) {
        if let Some(value) = object.get(key) {
            if !value.is_string() {
                self.violation(&join(path, key), "must be a string");
            }
        }
    }

    /// A string that ends up in a string descriptor.
    fn descriptor_string(&mut self, path: &str, object: &Map<String, Value>, key: &str) {
        match object.get(key) {
            None => {}
            Some(Value::String(text)) => if UTF16ByteVec::encode(text).is_none() {
                self.violation(&join(path, key), format!(
                    "must be at most {MAX_STRING_BYTES} bytes in UTF-16 ({} characters)",
                    MAX_STRING_BYTES / 2));
            }
            Some(_) => self.violation(&join(path, key), "must be a string"),
        }
    }

    fn integer(&mut self, path: &str, object: &Map<String, Value>, key: &str,
               min: u64, max: u64)
    {
        if let Some(value) = object.get(key) {
            match value.as_u64() {
                Some(n) if (min..=max).contains(&n) => {}
                _ => self.violation(&join(path, key),
                    format!("must be an integer from {min} to {max}")),
            }
        }
    }

    fn id_value(&mut self, path: &str, object: &Map<String, Value>, key: &str) {
        match object.get(key) {
            None | Some(Value::String(_)) => {}
            Some(value) if value.as_u64().is_some_and(|n| n <= 0xFFFF) => {}
            Some(_) => self.violation(&join(path, key),
                "must be a string or an integer from 0 to 65535"),
        }
    }

    fn document(&mut self, value: &Value) {
        let Some(root) = self.object("", value) else { return };
        self.keys("", root, &["$schema", "devices", "host"]);
        self.string("", root, "$schema");
        if let Some(devices) = root.get("devices") {
            if let Some(devices) = self.object("devices", devices) {
                for (tag, device) in devices {
                    self.device(&join("devices", tag), tag, device);
                }
            }
        }
        if let Some(host) = root.get("host") {
            if let Some(host) = self.object("host", host) {
                for (name, section) in host {
                    self.host(&join("host", name), name, section);
                }
            }
        }
    }

    fn device(&mut self, path: &str, tag: &str, value: &Value) {
        self.tag(path, tag, false);
        let Some(device) = self.object(path, value) else { return };
        self.keys(path, device, &[
            "vendor", "pid", "class", "subclass", "protocol", "version",
            "manufacturer", "product", "serial", "configurations"]);
        if !device.contains_key("vendor") {
            self.violation(path, "missing required key 'vendor'");
        }
        self.id_value(path, device, "vendor");
        self.id_value(path, device, "pid");
        for key in ["class", "subclass", "protocol"] {
            self.string(path, device, key);
        }
        for key in ["manufacturer", "product", "serial"] {
            self.descriptor_string(path, device, key);
        }
        if let Some(version) = device.get("version") {
            match version.as_f64() {
                Some(v) if BCDVersion::from_decimal(v).is_some() => {}
                _ => self.violation(&join(path, "version"),
                    "must be a number at least 0 and below 100"),
            }
        }
        let configs_path = join(path, "configurations");
        match device.get("configurations") {
            None => self.violation(path, "missing required key 'configurations'"),
            Some(configs) => {
                let Some(configs) = self.object(&configs_path, configs) else { return };
                if configs.is_empty() {
                    self.violation(&configs_path, "at least one configuration is required");
                }
                for (tag, config) in configs {
                    self.configuration(&join(&configs_path, tag), tag, config);
                }
            }
        }
    }

    fn configuration(&mut self, path: &str, tag: &str, value: &Value) {
        self.tag(path, tag, false);
        let Some(config) = self.object(path, value) else { return };
        self.keys(path, config, &["description", "power", "attributes", "interfaces"]);
        self.descriptor_string(path, config, "description");
        self.integer(path, config, "power", 0, 500);
        if let Some(attributes) = config.get("attributes") {
            let attributes_path = join(path, "attributes");
            match attributes.as_array() {
                None => self.violation(&attributes_path, "must be an array"),
                Some(items) => for (i, item) in items.iter().enumerate() {
                    let known = item.as_str()
                        .is_some_and(|name| ConfigAttribute::NAMES.contains(&name));
                    if !known {
                        self.violation(&join(&attributes_path, &i.to_string()),
                            format!("must be one of {:?}", ConfigAttribute::NAMES));
                    }
                }
            }
        }
        if let Some(interfaces) = config.get("interfaces") {
            let interfaces_path = join(path, "interfaces");
            if let Some(interfaces) = self.object(&interfaces_path, interfaces) {
                for (tag, interface) in interfaces {
                    self.interface(&join(&interfaces_path, tag), tag, interface);
                }
            }
        }
    }

    fn interface(&mut self, path: &str, tag: &str, value: &Value) {
        self.tag(path, tag, true);
        let Some(interface) = self.object(path, value) else { return };
        self.descriptor_string(path, interface, "description");
        let template = match interface.get("template") {
            None => {
                self.violation(path, "missing required key 'template'");
                return;
            }
            Some(Value::String(name)) => name,
            Some(_) => {
                self.violation(&join(path, "template"), "must be a string");
                return;
            }
        };
        // Unknown templates are reported when the interface is resolved.
        let catalog = self.catalog;
        let Some(template) = catalog.templates.get(template) else { return };
        for (key, value) in interface {
            if key == "template" || key == "description" {
                continue;
            }
            match template.properties.get(key) {
                None => self.violation(&join(path, key),
                    format!("unknown property for template '{}'",
                        interface["template"].as_str().unwrap_or_default())),
                Some(property) if !property.kind.accepts(value) => self.violation(
                    &join(path, key), format!("must be {}", property.kind)),
                Some(_) => {}
            }
        }
    }

    fn host(&mut self, path: &str, name: &str, value: &Value) {
        self.tag(path, name, true);
        let Some(section) = self.object(path, value) else { return };
        self.keys(path, section, &["count"]);
        self.integer(path, section, "count", 1, 255);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<Document, Error> {
        Document::from_value(value, &Catalog::builtin().unwrap())
    }

    fn violations(value: Value) -> Vec<Violation> {
        match parse(value) {
            Err(Error::SchemaValidation(violations)) => violations,
            other => panic!("Expected SchemaValidation but got {:?}", other),
        }
    }

    #[test]
    fn test_defaults() {
        let doc = parse(json!({
            "devices": {
                "dev0": {
                    "vendor": 0xCAFE,
                    "configurations": {
                        "config1": {
                            "interfaces": {
                                "cdc0": { "template": "cdc", "ep_size": 32 }
                            }
                        }
                    }
                }
            }
        })).unwrap();
        let device = &doc.devices["dev0"];
        assert!(device.vendor.to_string() == "0xcafe");
        assert!(device.pid.is_none());
        assert!(device.class == "misc");
        assert!(device.subclass == "common");
        assert!(device.protocol == "iad");
        assert!(device.bcd_version().literal() == "0x0100");
        assert!(device.manufacturer.is_empty());
        let config = &device.configurations["config1"];
        assert!(config.power == 100);
        assert!(config.attributes.is_empty());
        let cdc = &config.interfaces["cdc0"];
        assert!(cdc.template == "cdc");
        assert!(cdc.properties["ep_size"] == json!(32));
        assert!(doc.host.is_empty());
    }

    #[test]
    fn test_host_section() {
        let doc = parse(json!({ "host": { "hid": { "count": 2 }, "msc": {} } })).unwrap();
        assert!(doc.devices.is_empty());
        assert!(doc.host["hid"].count == 2);
        assert!(doc.host["msc"].count == 1);
    }

    #[test]
    fn test_all_violations_reported() {
        let found = violations(json!({
            "devices": {
                "dev0": {
                    "version": 100.0,
                    "configurations": {
                        "config1": {
                            "power": 1000,
                            "attributes": ["remote_wakeup", "turbo"],
                            "interfaces": {
                                "hid0": { "template": "hid", "reports": "keyboard" },
                                "cdc0": { "template": "cdc", "colour": "red" }
                            }
                        }
                    }
                }
            },
            "extra": true
        }));
        let paths: Vec<&str> = found.iter().map(|v| v.path.as_str()).collect();
        itertools::assert_equal(paths, [
            "extra",
            "devices/dev0",
            "devices/dev0/version",
            "devices/dev0/configurations/config1/power",
            "devices/dev0/configurations/config1/attributes/1",
            "devices/dev0/configurations/config1/interfaces/hid0/reports",
            "devices/dev0/configurations/config1/interfaces/cdc0/colour",
        ]);
    }

    #[test]
    fn test_duplicate_tags() {
        let found = violations(json!({
            "devices": {
                "dev0": {
                    "vendor": "0xCAFE",
                    "configurations": {
                        "config1": {
                            "interfaces": { "hid": { "template": "hid", "reports": [] } }
                        }
                    }
                }
            },
            "host": { "hid": {} }
        }));
        assert!(found.len() == 1);
        assert!(found[0].path == "host/hid");
        assert!(found[0].message.contains("devices/dev0/configurations/config1/interfaces/hid"));
    }

    #[test]
    fn test_bad_identifiers() {
        let found = violations(json!({ "host": { "2nd-hid": {} } }));
        assert!(found.len() == 1);
        assert!(found[0].message == "tag must be a C identifier");
    }

    #[test]
    fn test_missing_configurations() {
        let found = violations(json!({
            "devices": { "dev0": { "vendor": "0x1234", "configurations": {} } }
        }));
        assert!(found.len() == 1);
        assert!(found[0].path == "devices/dev0/configurations");
    }

    #[test]
    fn test_string_length() {
        let long = "x".repeat(127);
        let found = violations(json!({
            "devices": {
                "dev0": {
                    "vendor": 1,
                    "product": long,
                    "serial": "x".repeat(126),
                    "configurations": {
                        "config1": {
                            "description": long,
                            "interfaces": {
                                "cdc0": { "template": "cdc", "description": long }
                            }
                        }
                    }
                }
            }
        }));
        let paths: Vec<&str> = found.iter().map(|v| v.path.as_str()).collect();
        itertools::assert_equal(paths, [
            "devices/dev0/product",
            "devices/dev0/configurations/config1/description",
            "devices/dev0/configurations/config1/interfaces/cdc0/description",
        ]);
        assert!(found[0].message == "must be at most 253 bytes in UTF-16 (126 characters)");
    }
}
