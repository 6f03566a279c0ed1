//! Output file templates and writing of generated files.

use std::path::Path;

use indexmap::IndexMap;
use log::{debug, info};

use crate::error::Error;
use crate::expr::{self, Context};

pub const DESCRIPTOR_SOURCE: &str = "usb_descriptors.c";
pub const DESCRIPTOR_HEADER: &str = "usb_descriptors.h";
pub const CLASSDEFS_HEADER: &str = "usb_classdefs.h";
pub const CLASSDEFS_SOURCE: &str = "usb_classdefs.cpp";
pub const STACK_CONFIG: &str = "tusb_config.h";

const BUILTIN_TEMPLATES: [(&str, &str); 5] = [
    (DESCRIPTOR_SOURCE, include_str!("../templates/usb_descriptors.c")),
    (DESCRIPTOR_HEADER, include_str!("../templates/usb_descriptors.h")),
    (CLASSDEFS_HEADER, include_str!("../templates/usb_classdefs.h")),
    (CLASSDEFS_SOURCE, include_str!("../templates/usb_classdefs.cpp")),
    (STACK_CONFIG, include_str!("../templates/tusb_config.h")),
];

/// Text templates for each output file, keyed by file name.
#[derive(Clone, Debug)]
pub struct Templates {
    texts: IndexMap<&'static str, String>,
}

impl Default for Templates {
    fn default() -> Self {
        Templates::builtin()
    }
}

impl Templates {
    pub fn builtin() -> Templates {
        Templates {
            texts: BUILTIN_TEMPLATES
                .iter()
                .map(|(name, text)| (*name, text.to_string()))
                .collect(),
        }
    }

    /// Built-in templates, replaced by any same-named file in `dir`.
    pub fn with_overrides(dir: &Path) -> Result<Templates, Error> {
        let mut templates = Templates::builtin();
        for (name, text) in templates.texts.iter_mut() {
            let path = dir.join(name);
            if path.is_file() {
                debug!("Using template '{}'", path.display());
                *text = std::fs::read_to_string(&path)?;
            }
        }
        Ok(templates)
    }

    pub fn names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.texts.keys().copied()
    }

    pub fn render(&self, name: &str, context: &Context) -> Result<String, Error> {
        let text = self.texts
            .get(name)
            .ok_or_else(|| Error::Catalog(format!("no template named '{name}'")))?;
        expr::substitute(text, context)
    }
}

/// Generated files, fully assembled in memory.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Output {
    pub files: IndexMap<String, String>,
}

impl Output {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.files.get(name).map(String::as_str)
    }

    /// Write every file into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path) -> Result<(), Error> {
        std::fs::create_dir_all(dir)?;
        for (name, text) in &self.files {
            let path = dir.join(name);
            info!("Writing '{}'", path.display());
            std::fs::write(&path, text)?;
        }
        Ok(())
    }
}
