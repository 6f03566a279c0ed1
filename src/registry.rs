//! C++ class instances wiring interfaces to the runtime library.

use std::fmt::Write;

use indexmap::IndexMap;

/// One runtime object to be declared and constructed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClassEntry {
    pub namespace: String,
    pub tag: String,
    pub host: bool,
    /// Instance number passed to the constructor.
    pub ordinal: usize,
}

impl ClassEntry {
    pub fn label(&self) -> &'static str {
        if self.host { "HostDevice" } else { "Device" }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ClassRegistry {
    entries: Vec<ClassEntry>,
}

impl ClassRegistry {
    pub fn new() -> ClassRegistry {
        ClassRegistry::default()
    }

    /// Add a device interface; `ordinal` is its instance number among the
    /// interfaces of its class in the same configuration.
    pub fn add_device(&mut self, namespace: &str, tag: &str, ordinal: usize) {
        self.add(namespace, tag, false, ordinal);
    }

    pub fn add_host(&mut self, namespace: &str, tag: &str) {
        let ordinal = self.entries
            .iter()
            .filter(|entry| entry.host && entry.namespace == namespace)
            .count();
        self.add(namespace, tag, true, ordinal);
    }

    fn add(&mut self, namespace: &str, tag: &str, host: bool, ordinal: usize) {
        self.entries.push(ClassEntry {
            namespace: namespace.to_string(),
            tag: tag.to_string(),
            host,
            ordinal,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries grouped by namespace, in first-encounter order.
    fn groups(&self) -> IndexMap<&str, Vec<&ClassEntry>> {
        let mut groups: IndexMap<&str, Vec<&ClassEntry>> = IndexMap::new();
        for entry in &self.entries {
            groups.entry(entry.namespace.as_str()).or_default().push(entry);
        }
        groups
    }

    /// `extern` declarations for the header.
    pub fn render_declarations(&self) -> String {
        if self.is_empty() {
            return "// none\n".to_string();
        }
        let mut text = String::new();
        for (i, (namespace, entries)) in self.groups().into_iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            writeln!(text, "// {namespace}").unwrap();
            for entry in entries {
                writeln!(text, "extern {namespace}::{} {};", entry.label(), entry.tag).unwrap();
            }
        }
        text
    }

    /// Constructed instances and the per-namespace lookup arrays.
    pub fn render_definitions(&self) -> String {
        if self.is_empty() {
            return "// none\n".to_string();
        }
        let mut text = String::new();
        for (i, (namespace, entries)) in self.groups().into_iter().enumerate() {
            if i > 0 {
                text.push('\n');
            }
            let (hosts, devices): (Vec<&ClassEntry>, Vec<&ClassEntry>) =
                entries.into_iter().partition(|entry| entry.host);
            for entry in devices.iter().chain(&hosts) {
                writeln!(text, "{namespace}::{} {}({}, \"{}\");",
                         entry.label(), entry.tag, entry.ordinal, entry.tag).unwrap();
            }
            writeln!(text, "\nnamespace {namespace}\n{{").unwrap();
            for (list, label, array) in [
                (&devices, "Device", "devices"),
                (&hosts, "HostDevice", "host_devices"),
            ] {
                if list.is_empty() {
                    continue;
                }
                writeln!(text, "{label}* {array}[]{{").unwrap();
                for entry in list.iter() {
                    writeln!(text, "\t&{},", entry.tag).unwrap();
                }
                text.push_str("};\n");
            }
            writeln!(text, "}} // namespace {namespace}").unwrap();
        }
        text
    }
}
