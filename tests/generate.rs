use serde_json::{Value, json};

use usbconfig::{Catalog, Document, Error, Generator, Templates, generate};
use usbconfig::output::{
    CLASSDEFS_HEADER,
    CLASSDEFS_SOURCE,
    DESCRIPTOR_HEADER,
    DESCRIPTOR_SOURCE,
    STACK_CONFIG,
};

fn keyboard_and_serial() -> Value {
    json!({
        "devices": {
            "sming": {
                "vendor": "0xCAFE",
                "version": 1.23,
                "manufacturer": "",
                "product": "Sming keyboard",
                "configurations": {
                    "config1": {
                        "description": "Default configuration",
                        "attributes": ["remote_wakeup"],
                        "interfaces": {
                            "hid0": {
                                "template": "hid",
                                "description": "Keyboard",
                                "reports": ["keyboard"],
                                "protocol": "keyboard"
                            },
                            "cdc0": {
                                "template": "cdc",
                                "description": "Serial port"
                            }
                        }
                    }
                }
            }
        },
        "host": {
            "msc": { "count": 2 }
        }
    })
}

fn document(value: Value) -> (Document, Catalog) {
    let catalog = Catalog::builtin().unwrap();
    let doc = Document::from_value(value, &catalog).unwrap();
    (doc, catalog)
}

fn files(value: Value) -> Result<usbconfig::Output, Error> {
    let (doc, catalog) = document(value);
    generate(&doc, &catalog, &Templates::builtin())
}

#[test]
fn test_keyboard_and_serial() {
    let (doc, catalog) = document(keyboard_and_serial());
    let generated = Generator::new(&catalog).run(&doc).unwrap();
    let config = &generated.devices[0].configs[0];
    assert!(config.interface_count() == 3);
    let with_endpoints = config.interfaces
        .iter()
        .filter(|itf| !itf.endpoints.is_empty())
        .count();
    assert!(with_endpoints == 2);
    itertools::assert_equal(
        config.interfaces.iter().flat_map(|itf| &itf.endpoints).map(|ep| ep.addr.0),
        [0x81, 0x82, 0x02, 0x83]);

    let output = generated.render(&Templates::builtin()).unwrap();
    let source = output.get(DESCRIPTOR_SOURCE).unwrap();
    assert!(source.matches("TUD_HID_REPORT_DESC_KEYBOARD").count() == 1);
    assert!(source.matches("EPNUM_").count() == 4);
    assert!(source.contains(
        "TUD_HID_DESCRIPTOR(ITF_NUM_HID0, STRING_INDEX_HID0_DESCRIPTION, \
         HID_ITF_PROTOCOL_KEYBOARD, sizeof(desc_hid_report_HID0), EPNUM_HID0_EP_IN, 16, 5)"));
    assert!(source.contains("\t.bcdDevice          = 0x0123,\n"));
    assert!(source.contains("\tNULL, // STRING_INDEX_SMING_MANUFACTURER: ''\n"));

    // Descriptor source order: device, HID reports, configuration, strings.
    let positions: Vec<usize> = [
        "tusb_desc_device_t desc_device_SMING",
        "desc_hid_report_HID0[] = {",
        "desc_config_CONFIG1[] = {",
        "string_desc_arr[] = {",
    ].iter().map(|marker| source.find(marker).unwrap()).collect();
    assert!(positions.windows(2).all(|pair| pair[0] < pair[1]));

    let header = output.get(DESCRIPTOR_HEADER).unwrap();
    assert!(header.contains(
        "enum {\n\tITF_NUM_HID0,\n\tITF_NUM_CDC0,\n\tITF_NUM_CDC0_1,\n\tITF_NUM_TOTAL_CONFIG1,\n};\n"));
    assert!(header.contains(
        "#define CONFIG1_TOTAL_LEN (TUD_CONFIG_DESC_LEN + TUD_HID_DESC_LEN + TUD_CDC_DESC_LEN)\n"));
    assert!(header.contains("\tREPORT_ID_HID0_KEYBOARD = 1,\n"));
    assert!(header.contains("\tEPNUM_CDC0_DATA_OUT = 0x02,\n"));

    let config = output.get(STACK_CONFIG).unwrap();
    assert!(config.contains("#define CFG_TUD_ENABLED 1\n"));
    assert!(config.contains("#define CFG_TUH_ENABLED 1\n"));
    assert!(config.contains("#define CFG_TUD_HID 1\n#define CFG_TUD_CDC 1\n"));
    assert!(config.contains("#define CFG_TUD_HID_EP_BUFSIZE 16\n"));
    assert!(config.contains("#define CFG_TUH_MSC 2\n"));

    let classdefs = output.get(CLASSDEFS_HEADER).unwrap();
    assert!(classdefs.contains("extern HID::Device hid0;\n"));
    assert!(classdefs.contains("extern MSC::HostDevice msc;\n"));
    let classdefs = output.get(CLASSDEFS_SOURCE).unwrap();
    assert!(classdefs.contains("CDC::Device cdc0(0, \"cdc0\");\n"));
}

#[test]
fn test_deterministic() {
    let first = files(keyboard_and_serial()).unwrap();
    let second = files(keyboard_and_serial()).unwrap();
    assert!(first == second);

    let a = tempfile::tempdir().unwrap();
    let b = tempfile::tempdir().unwrap();
    first.write(a.path()).unwrap();
    second.write(b.path()).unwrap();
    for name in first.files.keys() {
        let a = std::fs::read(a.path().join(name)).unwrap();
        let b = std::fs::read(b.path().join(name)).unwrap();
        assert!(a == b, "{name} differs between runs");
    }
}

#[test]
fn test_too_many_endpoints_writes_nothing() {
    // Eight CDC ports need 17 endpoint numbers, including EP0.
    let interfaces: serde_json::Map<String, Value> = (0..8)
        .map(|n| (format!("cdc{n}"), json!({ "template": "cdc" })))
        .collect();
    let value = json!({
        "devices": {
            "dev0": {
                "vendor": 1,
                "configurations": { "config1": { "interfaces": interfaces } }
            }
        }
    });
    let dir = tempfile::tempdir().unwrap();
    let target = dir.path().join("out");
    let result = files(value).and_then(|output| output.write(&target));
    match result {
        Err(Error::TooManyEndpoints { config, slots, .. }) => {
            assert!(config == "config1");
            assert!(slots == 17);
        }
        other => panic!("Expected TooManyEndpoints but got {:?}", other),
    }
    assert!(!target.exists());
}

#[test]
fn test_globals() {
    let two_hids = |second: Value| json!({
        "devices": {
            "dev0": {
                "vendor": 1,
                "configurations": {
                    "config1": {
                        "interfaces": {
                            "hid0": { "template": "hid", "reports": ["mouse"] },
                            "hid1": second
                        }
                    }
                }
            }
        }
    });

    let output = files(two_hids(json!({
        "template": "hid", "reports": ["gamepad"], "ep_bufsize": 16
    }))).unwrap();
    let config = output.get(STACK_CONFIG).unwrap();
    assert!(config.matches("#define CFG_TUD_HID_EP_BUFSIZE").count() == 1);
    assert!(config.contains("#define CFG_TUD_HID 2\n"));
    let source = output.get(DESCRIPTOR_SOURCE).unwrap();
    assert!(source.contains("hid_reports[] = {desc_hid_report_HID0, desc_hid_report_HID1};"));

    match files(two_hids(json!({
        "template": "hid", "reports": ["gamepad"], "ep_bufsize": 64
    }))) {
        Err(Error::GlobalConflict { name, first_tag, second_tag, .. }) => {
            assert!(name == "CFG_TUD_HID_EP_BUFSIZE");
            assert!(first_tag == "hid0");
            assert!(second_tag == "hid1");
        }
        other => panic!("Expected GlobalConflict but got {:?}", other),
    }
}

#[test]
fn test_shared_endpoint_slot() {
    let output = files(json!({
        "devices": {
            "dev0": {
                "vendor": 1,
                "configurations": {
                    "config1": { "interfaces": { "vendor0": { "template": "vendor" } } }
                }
            }
        }
    })).unwrap();
    let header = output.get(DESCRIPTOR_HEADER).unwrap();
    assert!(header.contains(
        "\tEPNUM_VENDOR0_DATA_OUT = 0x01,\n\tEPNUM_VENDOR0_DATA_IN = 0x81,\n"));
}

#[test]
fn test_no_devices() {
    let output = files(json!({})).unwrap();
    let config = output.get(STACK_CONFIG).unwrap();
    assert!(config.contains("#define CFG_TUD_ENABLED 0\n"));
    assert!(config.contains("#define CFG_TUH_ENABLED 0\n"));
    assert!(config.contains("//------------- CLASS -------------//\n// none\n"));
    let classdefs = output.get(CLASSDEFS_SOURCE).unwrap();
    assert!(classdefs.contains("namespace USB\n{\n// none\n"));
}

#[test]
fn test_schema_violation() {
    let catalog = Catalog::builtin().unwrap();
    let text = r#"{ "devices": { "dev0": { "vendor": "0x1", "version": 123,
                   "configurations": { "c": {} } } } }"#;
    match Document::from_json(text, &catalog) {
        Err(Error::SchemaValidation(violations)) => {
            assert!(violations.len() == 1);
            assert!(violations[0].path == "devices/dev0/version");
        }
        other => panic!("Expected SchemaValidation but got {:?}", other.map(|_| ())),
    }
    assert!(matches!(Document::from_json("{", &catalog), Err(Error::SchemaValidation(_))));
}

#[test]
fn test_long_strings_rejected() {
    let catalog = Catalog::builtin().unwrap();
    let mut value = keyboard_and_serial();
    value["devices"]["sming"]["product"] = Value::from("x".repeat(127));
    match Document::from_value(value, &catalog) {
        Err(Error::SchemaValidation(violations)) => {
            assert!(violations.len() == 1);
            assert!(violations[0].path == "devices/sming/product");
        }
        other => panic!("Expected SchemaValidation but got {:?}", other.map(|_| ())),
    }

    let mut value = keyboard_and_serial();
    value["devices"]["sming"]["product"] = Value::from("x".repeat(126));
    let output = files(value).unwrap();
    let source = output.get(DESCRIPTOR_SOURCE).unwrap();
    assert!(source.contains("\t\"\\xfe\\x03\\x78\\x00"));
}

#[test]
fn test_configurations_share_class_instances() {
    let output = files(json!({
        "devices": {
            "dev0": {
                "vendor": 1,
                "configurations": {
                    "a": { "interfaces": { "kbd": { "template": "hid", "reports": ["keyboard"] } } },
                    "b": { "interfaces": { "cdc0": { "template": "cdc" } } }
                }
            }
        }
    })).unwrap();
    let config = output.get(STACK_CONFIG).unwrap();
    assert!(config.contains("#define CFG_TUD_HID 1\n#define CFG_TUD_CDC 1\n"));

    let result = files(json!({
        "devices": {
            "dev0": {
                "vendor": 1,
                "configurations": {
                    "a": { "interfaces": { "kbd": { "template": "hid", "reports": ["keyboard"] } } },
                    "b": { "interfaces": { "mouse": { "template": "hid", "reports": ["mouse"] } } }
                }
            }
        }
    }));
    assert!(matches!(result, Err(Error::HidConfigurations { .. })));
}
