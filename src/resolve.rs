//! Merge interface instances with their templates and evaluate the
//! descriptor fields.

use indexmap::IndexMap;
use log::debug;
use serde_json::Value;

use crate::catalog::{Catalog, FieldExpr, Template};
use crate::config::Interface;
use crate::endpoint::{Endpoint, EndpointAllocator};
use crate::error::Error;
use crate::expr::{self, Context, identifier};
use crate::globals::GlobalMacros;
use crate::strings::StringTable;
use crate::usb::Direction;

/// An interface instance with every template property filled in.
#[derive(Clone, Debug)]
pub struct ResolvedInterface<'a> {
    pub tag: &'a str,
    pub template_name: &'a str,
    pub template: &'a Template,
    pub description: Option<&'a str>,
    /// Properties in template declaration order.
    pub properties: IndexMap<String, Value>,
}

impl<'a> ResolvedInterface<'a> {
    /// Apply defaults and check mandatory properties.
    pub fn new(tag: &'a str, interface: &'a Interface, catalog: &'a Catalog)
        -> Result<ResolvedInterface<'a>, Error>
    {
        let template = catalog.template(tag, &interface.template)?;
        let mut properties = IndexMap::new();
        for (name, property) in &template.properties {
            let value = interface.properties
                .get(name)
                .or(property.default.as_ref())
                .ok_or_else(|| Error::MissingRequiredProperty {
                    tag: tag.to_string(),
                    property: name.clone(),
                })?;
            properties.insert(name.clone(), value.clone());
        }
        Ok(ResolvedInterface {
            tag,
            template_name: &interface.template,
            template,
            description: interface.description.as_deref(),
            properties,
        })
    }

    /// Interface number symbols, one per interface the template consumes.
    pub fn interface_numbers(&self) -> Vec<String> {
        let base = format!("ITF_NUM_{}", identifier(self.tag));
        (0..self.template.interfaces.max(1))
            .map(|n| if n == 0 { base.clone() } else { format!("{base}_{n}") })
            .collect()
    }

    /// HID report names, for templates that carry reports.
    pub fn report_names(&self) -> Vec<String> {
        let Some(reports) = &self.template.reports else {
            return Vec::new();
        };
        match self.properties.get(reports) {
            Some(Value::Array(items)) => items.iter().map(expr::render_value).collect(),
            _ => Vec::new(),
        }
    }
}

/// Per-run state touched while evaluating fields.
pub struct Scope<'s> {
    pub device: &'s str,
    pub config: &'s str,
    pub strings: &'s mut StringTable,
    pub endpoints: &'s mut EndpointAllocator,
    pub globals: &'s mut GlobalMacros,
}

/// Descriptor text and side products of one interface.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EvaluatedInterface {
    pub tag: String,
    pub class: String,
    pub namespace: String,
    /// Complete macro call, e.g. `TUD_HID_DESCRIPTOR(...)`.
    pub statement: String,
    pub length: String,
    pub interface_numbers: Vec<String>,
    pub endpoints: Vec<Endpoint>,
}

fn context(interface: &ResolvedInterface, scope: &Scope) -> Context {
    let mut context = Context::new();
    context.insert("tag", interface.tag);
    context.insert("tag.id", identifier(interface.tag));
    context.insert("description", interface.description.unwrap_or_default());
    context.insert("itfnum", format!("ITF_NUM_{}", identifier(interface.tag)));
    context.insert("device", scope.device);
    context.insert("config", scope.config);
    for (name, value) in &interface.properties {
        let mask = interface.template.properties
            .get(name)
            .and_then(|property| property.mask.as_deref());
        context.insert_property(name, value, mask);
    }
    context
}

/// Evaluate every descriptor field of `interface`.
///
/// Endpoints and strings are registered in field order, which fixes the
/// endpoint numbering and string table order.
pub fn evaluate(interface: &ResolvedInterface, scope: &mut Scope)
    -> Result<EvaluatedInterface, Error>
{
    let template = interface.template;
    let context = context(interface, scope);
    let mut values = Vec::with_capacity(template.fields.len());
    let mut endpoints = Vec::new();

    for field in &template.fields {
        let value = match &field.expr {
            FieldExpr::Literal(value) => expr::render_value(value),
            FieldExpr::Endpoint => {
                let direction = Direction::from_field_name(&field.name)
                    .ok_or_else(|| Error::BadEndpointFieldName {
                        template: interface.template_name.to_string(),
                        field: field.name.clone(),
                    })?;
                let addr = scope.endpoints.allocate(direction);
                let symbol = format!("EPNUM_{}_{}",
                    identifier(interface.tag), identifier(&field.name));
                debug!("{}: {} endpoint {} = {}", interface.tag, direction, symbol, addr);
                endpoints.push(Endpoint { symbol: symbol.clone(), addr });
                symbol
            }
            FieldExpr::StringRef(expression) => {
                let text = expr::substitute(expression, &context)?;
                match expr::parse_list(&text) {
                    Some(items) if !items.is_empty() => {
                        let mut first = None;
                        for (n, item) in items.iter().enumerate() {
                            let property = if n == 0 {
                                field.name.clone()
                            } else {
                                format!("{}_{n}", field.name)
                            };
                            let id = scope.strings.add(interface.tag, &property, Some(item.as_str()))?;
                            first.get_or_insert(id);
                        }
                        first.unwrap_or_default()
                    }
                    Some(_) => scope.strings.add(interface.tag, &field.name, None)?,
                    None => scope.strings.add(interface.tag, &field.name, Some(text.as_str()))?,
                }
            }
            FieldExpr::Text(expression) => expr::substitute(expression, &context)?,
        };
        values.push(value);
    }

    for (name, property) in &template.properties {
        if property.global {
            let macro_name = GlobalMacros::macro_name(&template.class, name);
            let value = expr::render_value(&interface.properties[name]);
            scope.globals.record(&macro_name, &value, interface.tag)?;
        }
    }

    Ok(EvaluatedInterface {
        tag: interface.tag.to_string(),
        class: template.class.clone(),
        namespace: template.namespace().to_string(),
        statement: format!("{}({})",
            expr::substitute(&template.descriptor, &context)?,
            values.join(", ")),
        length: expr::substitute(&template.length, &context)?,
        interface_numbers: interface.interface_numbers(),
        endpoints,
    })
}
