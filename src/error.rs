//! Errors raised while generating descriptors.

use itertools::Itertools;
use thiserror::Error;

/// A single schema problem found in the input document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Violation {
    /// Slash-separated path to the offending value, e.g. `devices/dev0/version`.
    pub path: String,
    pub message: String,
}

impl Violation {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Violation { path: path.into(), message: message.into() }
    }
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "(root): {}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

fn list_violations(violations: &[Violation]) -> String {
    violations.iter().map(|v| format!("  {v}")).join("\n")
}

/// Error type returned by generation.
#[derive(Debug, Error)]
pub enum Error {
    /// The document does not match the schema derived from the catalog.
    #[error("configuration is invalid:\n{}", list_violations(.0))]
    SchemaValidation(Vec<Violation>),
    /// An interface refers to a template the catalog does not define.
    #[error("interface '{tag}' uses unknown template '{template}'")]
    UnknownTemplate {
        tag: String,
        template: String,
    },
    /// A class, subclass, protocol or host class name is not recognised.
    #[error("unknown {kind} '{name}'")]
    UnknownClassName {
        kind: &'static str,
        name: String,
    },
    /// A HID interface names a report the generator has no table for.
    #[error("interface '{tag}' uses unknown HID report '{report}'")]
    UnknownReport {
        tag: String,
        report: String,
    },
    /// A template property without a default was not given a value.
    #[error("interface '{tag}' is missing required property '{property}'")]
    MissingRequiredProperty {
        tag: String,
        property: String,
    },
    /// Two interfaces set the same global macro to different values.
    #[error("global '{name}' is {first_value} for '{first_tag}' \
             but {second_value} for '{second_tag}'")]
    GlobalConflict {
        name: String,
        first_tag: String,
        first_value: String,
        second_tag: String,
        second_value: String,
    },
    /// HID interfaces appear in more than one configuration of a device.
    ///
    /// The report descriptor callback only knows the interface instance,
    /// so report tables cannot differ between configurations.
    #[error("device '{device}' has HID interfaces in configurations '{first}' \
             and '{second}', only one configuration may use HID")]
    HidConfigurations {
        device: String,
        first: String,
        second: String,
    },
    /// A configuration needs more endpoint slots than the hardware has.
    #[error("configuration '{config}' needs {slots} endpoints, \
             only {max} are available")]
    TooManyEndpoints {
        config: String,
        slots: usize,
        max: usize,
    },
    /// An endpoint field name does not end in `IN` or `OUT`.
    #[error("endpoint field '{field}' in template '{template}' \
             must end with IN or OUT")]
    BadEndpointFieldName {
        template: String,
        field: String,
    },
    /// A string is too long to fit in a string descriptor.
    #[error("string {id} is {length} bytes in UTF-16, \
             a string descriptor holds at most {max}")]
    StringTooLong {
        id: String,
        length: usize,
        max: usize,
    },
    /// A substitution expression refers to an unknown variable.
    #[error("undefined variable '{key}' in \"{expression}\"")]
    UndefinedVariable {
        key: String,
        expression: String,
    },
    /// The template catalog could not be used.
    #[error("invalid catalog: {0}")]
    Catalog(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
