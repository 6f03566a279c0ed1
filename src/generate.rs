//! Generation driver: one run from a validated document to output text.

use log::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::{Configuration, Device, Document};
use crate::emit::{self, ConfigBlock, DeviceBlock, DeviceStrings};
use crate::endpoint::EndpointAllocator;
use crate::error::Error;
use crate::expr::Context;
use crate::globals::{Bus, ClassCounts, GlobalMacros};
use crate::hid::ReportTable;
use crate::output::{
    Output,
    Templates,
    CLASSDEFS_HEADER,
    CLASSDEFS_SOURCE,
    DESCRIPTOR_HEADER,
    DESCRIPTOR_SOURCE,
    STACK_CONFIG,
};
use crate::registry::ClassRegistry;
use crate::resolve::{self, ResolvedInterface, Scope};
use crate::strings::StringTable;
use crate::usb::DeviceClassCodes;

struct InterfacePlan<'a> {
    resolved: ResolvedInterface<'a>,
    reports: Option<ReportTable>,
}

struct ConfigPlan<'a> {
    tag: &'a str,
    config: &'a Configuration,
    interfaces: Vec<InterfacePlan<'a>>,
}

struct DevicePlan<'a> {
    tag: &'a str,
    device: &'a Device,
    codes: DeviceClassCodes,
    configs: Vec<ConfigPlan<'a>>,
}

/// Look up everything the document names before any text is produced.
fn plan<'a>(doc: &'a Document, catalog: &'a Catalog) -> Result<Vec<DevicePlan<'a>>, Error> {
    let mut devices = Vec::new();
    for (tag, device) in &doc.devices {
        let codes = DeviceClassCodes::lookup(&device.class, &device.subclass, &device.protocol)?;
        let mut configs = Vec::new();
        let mut hid_config: Option<&str> = None;
        for (config_tag, config) in &device.configurations {
            let mut interfaces = Vec::new();
            for (itf_tag, interface) in &config.interfaces {
                let resolved = ResolvedInterface::new(itf_tag, interface, catalog)?;
                let reports = match &resolved.template.reports {
                    Some(_) => {
                        let names = resolved.report_names();
                        if names.is_empty() {
                            warn!("Interface '{itf_tag}' declares no HID reports");
                        }
                        Some(ReportTable::new(itf_tag, &names)?)
                    }
                    None => None,
                };
                interfaces.push(InterfacePlan { resolved, reports });
            }
            if interfaces.iter().any(|itf| itf.reports.is_some()) {
                match hid_config {
                    Some(first) => return Err(Error::HidConfigurations {
                        device: tag.clone(),
                        first: first.to_string(),
                        second: config_tag.clone(),
                    }),
                    None => hid_config = Some(config_tag.as_str()),
                }
            }
            configs.push(ConfigPlan { tag: config_tag, config, interfaces });
        }
        devices.push(DevicePlan { tag, device, codes, configs });
    }
    for name in doc.host.keys() {
        catalog.host_class(name)?;
    }
    Ok(devices)
}

/// State accumulated over one generation run.
pub struct Generator<'a> {
    catalog: &'a Catalog,
    strings: StringTable,
    globals: GlobalMacros,
    counts: ClassCounts,
    registry: ClassRegistry,
    reports: Vec<ReportTable>,
}

/// Everything computed by a run, ready to be rendered into files.
#[derive(Debug)]
pub struct Generated {
    pub devices: Vec<DeviceBlock>,
    pub reports: Vec<ReportTable>,
    /// Number of leading `reports` belonging to the first device, which the
    /// stack callbacks serve.
    pub served_reports: usize,
    pub strings: StringTable,
    pub globals: GlobalMacros,
    pub counts: ClassCounts,
    pub registry: ClassRegistry,
    pub device_enabled: bool,
    pub host_enabled: bool,
}

impl<'a> Generator<'a> {
    pub fn new(catalog: &'a Catalog) -> Generator<'a> {
        Generator {
            catalog,
            strings: StringTable::new(),
            globals: GlobalMacros::new(),
            counts: ClassCounts::new(),
            registry: ClassRegistry::new(),
            reports: Vec::new(),
        }
    }

    pub fn run(mut self, doc: &Document) -> Result<Generated, Error> {
        let plans = plan(doc, self.catalog)?;

        if plans.len() > 1 {
            warn!("{} devices defined; descriptor callbacks serve '{}'",
                  plans.len(), plans[0].tag);
        }
        let mut devices = Vec::with_capacity(plans.len());
        let mut served_reports = 0;
        for device in plans {
            devices.push(self.device(device)?);
            if devices.len() == 1 {
                served_reports = self.reports.len();
            }
        }

        for (name, section) in &doc.host {
            let class = self.catalog.host_class(name)?;
            debug!("Host class '{}': {} instance(s)", name, section.count);
            self.counts.add(Bus::Host, &class.class, usize::from(section.count));
            self.registry.add_host(class.namespace(), name);
        }

        Ok(Generated {
            devices,
            reports: self.reports,
            served_reports,
            strings: self.strings,
            globals: self.globals,
            counts: self.counts,
            registry: self.registry,
            device_enabled: !doc.devices.is_empty(),
            host_enabled: !doc.host.is_empty(),
        })
    }

    fn device(&mut self, plan: DevicePlan) -> Result<DeviceBlock, Error> {
        let DevicePlan { tag, device, codes, configs } = plan;
        info!("Device '{}': {} configuration(s)", tag, configs.len());
        let strings = DeviceStrings {
            manufacturer: self.strings.add(tag, "manufacturer", Some(device.manufacturer.as_str()))?,
            product: self.strings.add(tag, "product", Some(device.product.as_str()))?,
            serial: self.strings.add(tag, "serial", Some(device.serial.as_str()))?,
        };
        let mut blocks = Vec::with_capacity(configs.len());
        for (i, config) in configs.into_iter().enumerate() {
            blocks.push(self.configuration(tag, i + 1, config)?);
        }
        Ok(DeviceBlock::new(tag, device, &codes, &strings, blocks))
    }

    fn configuration(&mut self, device: &str, number: usize, plan: ConfigPlan)
        -> Result<ConfigBlock, Error>
    {
        let ConfigPlan { tag, config, interfaces } = plan;
        let description = self.strings.add(tag, "description", config.description.as_deref())?;
        let mut endpoints = EndpointAllocator::new();
        let mut instances = ClassCounts::new();
        let mut evaluated = Vec::with_capacity(interfaces.len());
        for InterfacePlan { resolved, reports } in interfaces {
            let mut scope = Scope {
                device,
                config: tag,
                strings: &mut self.strings,
                endpoints: &mut endpoints,
                globals: &mut self.globals,
            };
            let interface = resolve::evaluate(&resolved, &mut scope)?;
            debug!("{}: {}", interface.tag, interface.statement);
            let ordinal = instances.get(Bus::Device, &interface.class);
            instances.add(Bus::Device, &interface.class, 1);
            self.registry.add_device(&interface.namespace, &interface.tag, ordinal);
            if let Some(table) = reports {
                self.reports.push(table);
            }
            evaluated.push(interface);
        }
        endpoints.finish(tag)?;
        self.counts.merge_max(&instances);
        let block = ConfigBlock::new(tag, number, config, description, evaluated);
        info!("Configuration '{}': {} interface(s), {} endpoint(s)",
              tag, block.interface_count(), block.endpoint_count());
        Ok(block)
    }
}

impl Generated {
    /// Variables available to the output templates.
    pub fn context(&self) -> Context {
        let flag = |enabled: bool| if enabled { "1" } else { "0" };
        let mut context = Context::new();
        context.insert("device_descriptors", emit::render_devices(&self.devices));
        context.insert("hid_reports", emit::render_hid_reports(
            &self.reports, &self.reports[..self.served_reports]));
        context.insert("configurations", emit::render_configurations(&self.devices));
        context.insert("strings", emit::render_strings(&self.strings));
        context.insert("config_enums", emit::render_config_enums(&self.devices));
        context.insert("report_enums", emit::render_report_enums(&self.reports));
        context.insert("string_enum", self.strings.render_enum());
        context.insert("string_max_length", emit::string_max_length(&self.strings).to_string());
        context.insert("declarations", self.registry.render_declarations());
        context.insert("definitions", self.registry.render_definitions());
        context.insert("device_enabled", flag(self.device_enabled));
        context.insert("host_enabled", flag(self.host_enabled));
        context.insert("device_classes", self.counts.render(Bus::Device));
        context.insert("host_classes", self.counts.render(Bus::Host));
        context.insert("globals", self.globals.render());
        context
    }

    pub fn render(&self, templates: &Templates) -> Result<Output, Error> {
        let context = self.context();
        let mut output = Output::default();
        for name in [
            DESCRIPTOR_SOURCE,
            DESCRIPTOR_HEADER,
            CLASSDEFS_HEADER,
            CLASSDEFS_SOURCE,
            STACK_CONFIG,
        ] {
            output.files.insert(name.to_string(), templates.render(name, &context)?);
        }
        Ok(output)
    }
}

/// Produce all output files for `doc` in memory.
pub fn generate(doc: &Document, catalog: &Catalog, templates: &Templates)
    -> Result<Output, Error>
{
    Generator::new(catalog).run(doc)?.render(templates)
}
