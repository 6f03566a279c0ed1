//! Stack-wide configuration macros collected across all interfaces.

use std::fmt::Write;

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::Error;
use crate::expr::identifier;

/// Which side of the stack a class count belongs to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Bus {
    Device,
    Host,
}

impl Bus {
    fn prefix(&self) -> &'static str {
        match self {
            Bus::Device => "CFG_TUD",
            Bus::Host => "CFG_TUH",
        }
    }
}

#[derive(Clone, Debug)]
struct GlobalValue {
    value: String,
    tag: String,
}

/// Macros set by `global` template properties.
#[derive(Clone, Debug, Default)]
pub struct GlobalMacros {
    values: IndexMap<String, GlobalValue>,
}

impl GlobalMacros {
    pub fn new() -> GlobalMacros {
        GlobalMacros::default()
    }

    pub fn macro_name(class: &str, property: &str) -> String {
        format!("CFG_TUD_{}_{}", identifier(class), identifier(property))
    }

    /// Record `value` for `name` as set by interface `tag`.
    ///
    /// Setting the same value again is fine; a different one is an error.
    pub fn record(&mut self, name: &str, value: &str, tag: &str) -> Result<(), Error> {
        match self.values.entry(name.to_string()) {
            Entry::Vacant(entry) => {
                entry.insert(GlobalValue {
                    value: value.to_string(),
                    tag: tag.to_string(),
                });
                Ok(())
            }
            Entry::Occupied(entry) if entry.get().value == value => Ok(()),
            Entry::Occupied(entry) => Err(Error::GlobalConflict {
                name: name.to_string(),
                first_tag: entry.get().tag.clone(),
                first_value: entry.get().value.clone(),
                second_tag: tag.to_string(),
                second_value: value.to_string(),
            }),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(|global| global.value.as_str())
    }

    pub fn render(&self) -> String {
        render_defines(self.values.iter().map(|(name, global)| (name.as_str(), global.value.as_str())))
    }
}

/// Number of instances of each class, per bus.
#[derive(Clone, Debug, Default)]
pub struct ClassCounts {
    device: IndexMap<String, usize>,
    host: IndexMap<String, usize>,
}

impl ClassCounts {
    pub fn new() -> ClassCounts {
        ClassCounts::default()
    }

    pub fn add(&mut self, bus: Bus, class: &str, count: usize) {
        let counts = match bus {
            Bus::Device => &mut self.device,
            Bus::Host => &mut self.host,
        };
        let name = format!("{}_{}", bus.prefix(), identifier(class));
        *counts.entry(name).or_insert(0) += count;
    }

    /// Raise each count to at least the one in `other`.
    ///
    /// Only one configuration is active at a time, so the stack needs as
    /// many instances of a class as the busiest configuration uses.
    pub fn merge_max(&mut self, other: &ClassCounts) {
        for (counts, others) in [
            (&mut self.device, &other.device),
            (&mut self.host, &other.host),
        ] {
            for (name, count) in others {
                let entry = counts.entry(name.clone()).or_insert(0);
                *entry = (*entry).max(*count);
            }
        }
    }

    pub fn get(&self, bus: Bus, class: &str) -> usize {
        let counts = match bus {
            Bus::Device => &self.device,
            Bus::Host => &self.host,
        };
        let name = format!("{}_{}", bus.prefix(), identifier(class));
        counts.get(&name).copied().unwrap_or(0)
    }

    pub fn render(&self, bus: Bus) -> String {
        let counts = match bus {
            Bus::Device => &self.device,
            Bus::Host => &self.host,
        };
        let lines: Vec<(&str, String)> = counts
            .iter()
            .map(|(name, count)| (name.as_str(), count.to_string()))
            .collect();
        render_defines(lines.iter().map(|(name, count)| (*name, count.as_str())))
    }
}

/// `#define` lines, or a `// none` placeholder when there are none.
pub fn render_defines<'a>(defines: impl Iterator<Item = (&'a str, &'a str)>) -> String {
    let mut text = String::new();
    for (name, value) in defines {
        writeln!(text, "#define {name} {value}").unwrap();
    }
    if text.is_empty() {
        text.push_str("// none\n");
    }
    text
}
