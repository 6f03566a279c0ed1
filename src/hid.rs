//! HID report descriptor tables.

use std::fmt::Write;

use crate::error::Error;
use crate::expr::identifier;

/// Report names with a stock TinyUSB report descriptor macro.
const REPORT_MACROS: &[(&str, &str)] = &[
    ("keyboard", "TUD_HID_REPORT_DESC_KEYBOARD"),
    ("mouse", "TUD_HID_REPORT_DESC_MOUSE"),
    ("consumer", "TUD_HID_REPORT_DESC_CONSUMER"),
    ("system_control", "TUD_HID_REPORT_DESC_SYSTEM_CONTROL"),
    ("gamepad", "TUD_HID_REPORT_DESC_GAMEPAD"),
];

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub name: String,
    /// `REPORT_ID_<TAG>_<NAME>`.
    pub id_symbol: String,
    pub descriptor_macro: &'static str,
}

/// Report descriptor of one HID interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReportTable {
    pub tag: String,
    pub reports: Vec<Report>,
}

impl ReportTable {
    pub fn new(tag: &str, names: &[String]) -> Result<ReportTable, Error> {
        let tag_id = identifier(tag);
        let reports = names
            .iter()
            .map(|name| {
                let descriptor_macro = REPORT_MACROS
                    .iter()
                    .find(|(known, _)| *known == name.as_str())
                    .map(|(_, descriptor_macro)| *descriptor_macro)
                    .ok_or_else(|| Error::UnknownReport {
                        tag: tag.to_string(),
                        report: name.clone(),
                    })?;
                Ok(Report {
                    name: name.clone(),
                    id_symbol: format!("REPORT_ID_{tag_id}_{}", identifier(name)),
                    descriptor_macro,
                })
            })
            .collect::<Result<Vec<Report>, Error>>()?;
        Ok(ReportTable { tag: tag.to_string(), reports })
    }

    /// Name of the C array holding this table.
    pub fn symbol(&self) -> String {
        format!("desc_hid_report_{}", identifier(&self.tag))
    }

    pub fn render_source(&self) -> String {
        let mut text = String::new();
        writeln!(text, "// {}", self.tag).unwrap();
        writeln!(text, "static const uint8_t {}[] = {{", self.symbol()).unwrap();
        for report in &self.reports {
            writeln!(text, "\t{}(HID_REPORT_ID({})),",
                     report.descriptor_macro, report.id_symbol).unwrap();
        }
        text.push_str("};\n");
        text
    }

    /// Report id enumeration; ids start at 1.
    pub fn render_header(&self) -> String {
        let mut text = String::new();
        writeln!(text, "// {}", self.tag).unwrap();
        text.push_str("enum {\n");
        for (i, report) in self.reports.iter().enumerate() {
            if i == 0 {
                writeln!(text, "\t{} = 1,", report.id_symbol).unwrap();
            } else {
                writeln!(text, "\t{},", report.id_symbol).unwrap();
            }
        }
        text.push_str("};\n");
        text
    }
}
