//! Version information.

use std::fmt::Write;

use crate::built::*;

pub fn version() -> String {
   PKG_VERSION.to_string()
}

pub fn version_info(with_dependencies: bool) -> String {
   #[allow(clippy::const_is_empty)]
   const FEATURE_LIST: &str = if FEATURES.is_empty() {
      "(none)"
   } else {
      FEATURES_LOWERCASE_STR
   };

   const DEBUG_STR: &str = if DEBUG {"yes"} else {"no"};

   let output = format!("\
usbconfig build information:
  Cargo package version: {PKG_VERSION}
  Enabled features: {FEATURE_LIST}

Rust compiler:
  Version: {RUSTC_VERSION}
  Target: {TARGET} ({CFG_ENDIAN}-endian, {CFG_POINTER_WIDTH}-bit)
  Optimization level: {OPT_LEVEL}
  Debug build: {DEBUG_STR}");

  if with_dependencies {
     DEPENDENCIES
        .iter()
        .fold(
            format!("{output}\n\nBuilt with dependencies:"),
            |mut string, (pkg, ver)| {
                write!(string, "\n  {pkg} {ver}").unwrap();
                string
            }
        )
   } else {
      output
   }
}
