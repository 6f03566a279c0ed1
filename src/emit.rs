//! Assembly of descriptor source and header text.
//!
//! Blocks are emitted in a fixed order: device descriptors, HID report
//! descriptors, configuration descriptors, then the string table.

use std::fmt::Write;

use itertools::Itertools;

use crate::config::{Configuration, Device};
use crate::expr::identifier;
use crate::hid::ReportTable;
use crate::resolve::EvaluatedInterface;
use crate::strings::StringTable;
use crate::usb::DeviceClassCodes;

fn banner(text: &mut String, title: &str) {
    text.push_str("//--------------------------------------------------------------------+\n");
    writeln!(text, "// {title}").unwrap();
    text.push_str("//--------------------------------------------------------------------+\n\n");
}

/// String identifiers used by a device descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeviceStrings {
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
}

/// Descriptors for one configuration of a device.
#[derive(Clone, Debug)]
pub struct ConfigBlock {
    pub tag: String,
    /// 1-based `bConfigurationValue`.
    pub number: usize,
    pub description: String,
    pub attributes: String,
    pub power: u16,
    pub interfaces: Vec<EvaluatedInterface>,
}

impl ConfigBlock {
    pub fn new(tag: &str, number: usize, config: &Configuration, description: String,
               interfaces: Vec<EvaluatedInterface>) -> ConfigBlock
    {
        let attributes = if config.attributes.is_empty() {
            "0".to_string()
        } else {
            config.attributes.iter().map(|a| a.symbol()).join(" | ")
        };
        ConfigBlock {
            tag: tag.to_string(),
            number,
            description,
            attributes,
            power: config.power,
            interfaces,
        }
    }

    pub fn symbol(&self) -> String {
        format!("desc_config_{}", identifier(&self.tag))
    }

    pub fn total_len_symbol(&self) -> String {
        format!("{}_TOTAL_LEN", identifier(&self.tag))
    }

    pub fn interface_total_symbol(&self) -> String {
        format!("ITF_NUM_TOTAL_{}", identifier(&self.tag))
    }

    /// Interface numbers used, counting multi-interface classes fully.
    pub fn interface_count(&self) -> usize {
        self.interfaces.iter().map(|itf| itf.interface_numbers.len()).sum()
    }

    pub fn endpoint_count(&self) -> usize {
        self.interfaces.iter().map(|itf| itf.endpoints.len()).sum()
    }

    pub fn render_source(&self) -> String {
        let mut text = String::new();
        banner(&mut text, &format!("Configuration Descriptor: {}", self.tag));
        writeln!(text, "static const uint8_t {}[] = {{", self.symbol()).unwrap();
        text.push_str("\t// Config number, interface count, string index, total length, attribute, power in mA\n");
        writeln!(text, "\tTUD_CONFIG_DESCRIPTOR({}, {}, {}, {}, {}, {}),",
                 self.number, self.interface_total_symbol(), self.description,
                 self.total_len_symbol(), self.attributes, self.power).unwrap();
        for interface in &self.interfaces {
            writeln!(text, "\n\t// {}\n\t{},", interface.tag, interface.statement).unwrap();
        }
        text.push_str("};\n");
        text
    }

    pub fn render_header(&self) -> String {
        let mut text = String::new();
        writeln!(text, "// {}", self.tag).unwrap();
        text.push_str("enum {\n");
        for number in self.interfaces.iter().flat_map(|itf| &itf.interface_numbers) {
            writeln!(text, "\t{number},").unwrap();
        }
        writeln!(text, "\t{},", self.interface_total_symbol()).unwrap();
        text.push_str("};\n\n");

        let lengths = std::iter::once("TUD_CONFIG_DESC_LEN")
            .chain(self.interfaces.iter().map(|itf| itf.length.as_str()))
            .join(" + ");
        writeln!(text, "#define {} ({lengths})", self.total_len_symbol()).unwrap();

        if self.endpoint_count() > 0 {
            text.push_str("\nenum {\n");
            for endpoint in self.interfaces.iter().flat_map(|itf| &itf.endpoints) {
                writeln!(text, "\t{} = {},", endpoint.symbol, endpoint.addr).unwrap();
            }
            text.push_str("};\n");
        }
        text
    }
}

/// A device descriptor and its configurations.
#[derive(Clone, Debug)]
pub struct DeviceBlock {
    pub tag: String,
    pub descriptor: String,
    pub configs: Vec<ConfigBlock>,
}

impl DeviceBlock {
    pub fn new(tag: &str, device: &Device, codes: &DeviceClassCodes,
               strings: &DeviceStrings, configs: Vec<ConfigBlock>) -> DeviceBlock
    {
        let pid = device.pid
            .as_ref()
            .map(|pid| pid.to_string())
            .unwrap_or_else(|| "USB_PID".to_string());
        let mut text = String::new();
        writeln!(text, "static const tusb_desc_device_t {} = {{", DeviceBlock::symbol_for(tag)).unwrap();
        let fields = [
            ("bLength", "sizeof(tusb_desc_device_t)".to_string()),
            ("bDescriptorType", "TUSB_DESC_DEVICE".to_string()),
            ("bcdUSB", "USB_BCD".to_string()),
            ("bDeviceClass", codes.class.to_string()),
            ("bDeviceSubClass", codes.subclass.to_string()),
            ("bDeviceProtocol", codes.protocol.to_string()),
            ("bMaxPacketSize0", "CFG_TUD_ENDPOINT0_SIZE".to_string()),
            ("idVendor", device.vendor.to_string()),
            ("idProduct", pid),
            ("bcdDevice", device.bcd_version().literal()),
            ("iManufacturer", strings.manufacturer.clone()),
            ("iProduct", strings.product.clone()),
            ("iSerialNumber", strings.serial.clone()),
            ("bNumConfigurations", configs.len().to_string()),
        ];
        for (name, value) in fields {
            writeln!(text, "\t.{name:<18} = {value},").unwrap();
        }
        text.push_str("};\n");
        DeviceBlock {
            tag: tag.to_string(),
            descriptor: text,
            configs,
        }
    }

    fn symbol_for(tag: &str) -> String {
        format!("desc_device_{}", identifier(tag))
    }

    pub fn symbol(&self) -> String {
        DeviceBlock::symbol_for(&self.tag)
    }

    fn configurations_symbol(&self) -> String {
        format!("desc_configurations_{}", identifier(&self.tag))
    }
}

/// Device descriptors, with the stack callback serving the first device.
pub fn render_devices(devices: &[DeviceBlock]) -> String {
    let Some(first) = devices.first() else {
        return "// none\n".to_string();
    };
    let mut text = String::new();
    banner(&mut text, "Device Descriptors");
    for device in devices {
        writeln!(text, "// {}", device.tag).unwrap();
        text.push_str(&device.descriptor);
        text.push('\n');
    }
    text.push_str("// Invoked when received GET DEVICE DESCRIPTOR\n");
    text.push_str("const uint8_t* tud_descriptor_device_cb(void)\n{\n");
    writeln!(text, "\treturn (const uint8_t*)&{};", first.symbol()).unwrap();
    text.push_str("}\n");
    text
}

/// HID report descriptors and the per-instance lookup callback.
///
/// Every table is emitted; the callback looks up `served`, the tables of
/// the device the stack callbacks serve.
pub fn render_hid_reports(tables: &[ReportTable], served: &[ReportTable]) -> String {
    if tables.is_empty() {
        return "// none\n".to_string();
    }
    let mut text = String::new();
    banner(&mut text, "HID Report Descriptors");
    for table in tables {
        text.push_str(&table.render_source());
        text.push('\n');
    }
    if !served.is_empty() {
        writeln!(text, "static const uint8_t* const hid_reports[] = {{{}}};\n",
                 served.iter().map(ReportTable::symbol).join(", ")).unwrap();
    }
    text.push_str("// Invoked when received GET HID REPORT DESCRIPTOR\n");
    text.push_str("const uint8_t* tud_hid_descriptor_report_cb(uint8_t inst)\n{\n");
    if served.is_empty() {
        text.push_str("\t(void)inst;\n\treturn NULL;\n");
    } else {
        text.push_str("\treturn (inst < TU_ARRAY_SIZE(hid_reports)) ? hid_reports[inst] : NULL;\n");
    }
    text.push_str("}\n");
    text
}

/// Configuration descriptors of every device.
pub fn render_configurations(devices: &[DeviceBlock]) -> String {
    let Some(first) = devices.first() else {
        return "// none\n".to_string();
    };
    let mut text = String::new();
    for device in devices {
        for config in &device.configs {
            text.push_str(&config.render_source());
            text.push('\n');
        }
        writeln!(text, "static const uint8_t* const {}[] = {{", device.configurations_symbol()).unwrap();
        for config in &device.configs {
            writeln!(text, "\t{},", config.symbol()).unwrap();
        }
        text.push_str("};\n\n");
    }
    let configurations = first.configurations_symbol();
    text.push_str("// Invoked when received GET CONFIGURATION DESCRIPTOR\n");
    text.push_str("const uint8_t* tud_descriptor_configuration_cb(uint8_t index)\n{\n");
    writeln!(text, "\treturn (index < TU_ARRAY_SIZE({configurations})) ? {configurations}[index] : NULL;").unwrap();
    text.push_str("}\n");
    text
}

/// Value of `STRING_DESC_MAX_LENGTH`; room for the language record at least.
pub fn string_max_length(strings: &StringTable) -> usize {
    strings.max_length().max(2)
}

/// String descriptor records and the lookup callback.
pub fn render_strings(strings: &StringTable) -> String {
    let mut text = String::new();
    banner(&mut text, "String Descriptors");
    text.push_str("static const char* const string_desc_arr[] = {\n");
    text.push_str(&strings.render_records());
    text.push_str("};\n\n");
    text.push_str("// Invoked when received GET STRING DESCRIPTOR request\n");
    text.push_str("const uint16_t* tud_descriptor_string_cb(uint8_t index, uint16_t langid)\n{\n");
    text.push_str("\t(void)langid;\n");
    text.push_str("\tstatic uint16_t desc_str[1 + STRING_DESC_MAX_LENGTH / 2];\n\n");
    text.push_str("\tif(index >= TU_ARRAY_SIZE(string_desc_arr) || string_desc_arr[index] == NULL) {\n");
    text.push_str("\t\treturn NULL;\n\t}\n\n");
    text.push_str("\tconst char* record = string_desc_arr[index];\n");
    text.push_str("\tmemcpy(desc_str, record, (uint8_t)record[0]);\n");
    text.push_str("\treturn desc_str;\n");
    text.push_str("}\n");
    text
}

/// Interface and endpoint numbering for every configuration.
pub fn render_config_enums(devices: &[DeviceBlock]) -> String {
    let blocks: Vec<String> = devices
        .iter()
        .flat_map(|device| &device.configs)
        .map(ConfigBlock::render_header)
        .collect();
    if blocks.is_empty() {
        "// none\n".to_string()
    } else {
        blocks.join("\n")
    }
}

pub fn render_report_enums(tables: &[ReportTable]) -> String {
    if tables.is_empty() {
        "// none\n".to_string()
    } else {
        tables.iter().map(ReportTable::render_header).join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::endpoint::Endpoint;
    use crate::usb::EndpointAddr;

    fn cdc() -> EvaluatedInterface {
        EvaluatedInterface {
            tag: "cdc0".to_string(),
            class: "CDC".to_string(),
            namespace: "CDC".to_string(),
            statement: "TUD_CDC_DESCRIPTOR(ITF_NUM_CDC0)".to_string(),
            length: "TUD_CDC_DESC_LEN".to_string(),
            interface_numbers: vec!["ITF_NUM_CDC0".to_string(), "ITF_NUM_CDC0_1".to_string()],
            endpoints: vec![
                Endpoint { symbol: "EPNUM_CDC0_NOTIF_IN".to_string(), addr: EndpointAddr(0x81) },
            ],
        }
    }

    fn config(value: serde_json::Value) -> Configuration {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_config_block() {
        let block = ConfigBlock::new(
            "config1", 1,
            &config(json!({ "attributes": ["remote_wakeup"], "power": 200 })),
            "STRING_INDEX_CONFIG1_DESCRIPTION".to_string(),
            vec![cdc()]);
        assert!(block.interface_count() == 2);
        let source = block.render_source();
        assert!(source.contains(
            "\tTUD_CONFIG_DESCRIPTOR(1, ITF_NUM_TOTAL_CONFIG1, STRING_INDEX_CONFIG1_DESCRIPTION, \
             CONFIG1_TOTAL_LEN, TUSB_DESC_CONFIG_ATT_REMOTE_WAKEUP, 200),\n"));
        assert!(source.contains("\n\t// cdc0\n\tTUD_CDC_DESCRIPTOR(ITF_NUM_CDC0),\n};\n"));
        assert!(block.render_header() ==
            "// config1\n\
             enum {\n\
             \tITF_NUM_CDC0,\n\
             \tITF_NUM_CDC0_1,\n\
             \tITF_NUM_TOTAL_CONFIG1,\n\
             };\n\
             \n\
             #define CONFIG1_TOTAL_LEN (TUD_CONFIG_DESC_LEN + TUD_CDC_DESC_LEN)\n\
             \n\
             enum {\n\
             \tEPNUM_CDC0_NOTIF_IN = 0x81,\n\
             };\n");
    }

    #[test]
    fn test_empty_config() {
        let block = ConfigBlock::new("cfg", 2, &config(json!({})),
                                     "STRING_INDEX_CFG_DESCRIPTION".to_string(), vec![]);
        let header = block.render_header();
        assert!(header.ends_with("#define CFG_TOTAL_LEN (TUD_CONFIG_DESC_LEN)\n"));
        assert!(block.render_source().contains(", 0, 100),\n};\n"));
    }

    #[test]
    fn test_device_block() {
        let device: Device = serde_json::from_value(json!({
            "vendor": "0xCAFE",
            "version": 1.23,
            "configurations": {}
        })).unwrap();
        let codes = DeviceClassCodes::lookup("misc", "common", "iad").unwrap();
        let strings = DeviceStrings {
            manufacturer: "STRING_INDEX_DEV0_MANUFACTURER".to_string(),
            product: "STRING_INDEX_DEV0_PRODUCT".to_string(),
            serial: "STRING_INDEX_DEV0_SERIAL".to_string(),
        };
        let block = DeviceBlock::new("dev0", &device, &codes, &strings, vec![]);
        assert!(block.descriptor.starts_with("static const tusb_desc_device_t desc_device_DEV0 = {\n"));
        assert!(block.descriptor.contains("\t.idVendor           = 0xCAFE,\n"));
        assert!(block.descriptor.contains("\t.idProduct          = USB_PID,\n"));
        assert!(block.descriptor.contains("\t.bcdDevice          = 0x0123,\n"));
        assert!(block.descriptor.contains("\t.bDeviceClass       = TUSB_CLASS_MISC,\n"));
        let text = render_devices(&[block]);
        assert!(text.contains("return (const uint8_t*)&desc_device_DEV0;"));
    }

    #[test]
    fn test_empty_sections() {
        assert!(render_devices(&[]) == "// none\n");
        assert!(render_hid_reports(&[], &[]) == "// none\n");
        assert!(render_configurations(&[]) == "// none\n");
        assert!(render_config_enums(&[]) == "// none\n");
        assert!(render_report_enums(&[]) == "// none\n");
        let strings = StringTable::new();
        assert!(string_max_length(&strings) == 2);
        assert!(render_strings(&strings).contains("\"\\x04\\x03\\x09\\x04\""));
    }
}
