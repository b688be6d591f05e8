//! Reference resolution and flattening of nested response schemas.
//!
//! Response schemas arrive as untyped JSON. They are parsed once into the
//! closed [`SchemaNode`] set and then flattened into dot-qualified
//! [`ParameterInfo`] rows: `items`, `items.item`, `items.item.name`, ...

use std::collections::HashMap;

use serde_json::Value;

use crate::error::SchemaError;
use crate::model::ParameterInfo;

/// Prefix of a reference into the document's local definitions table.
pub const DEFINITIONS_PREFIX: &str = "#/definitions/";

/// Deepest nesting the flattener will expand.
pub const MAX_DEPTH: usize = 32;

/// Most fields one schema may flatten into. Shared definitions are expanded
/// at every use, so a shallow schema can still fan out without bound.
pub const MAX_FIELDS: usize = 2_000;

/// One node of a response schema.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaNode {
    /// `{"$ref": "..."}`, holding the raw reference string.
    Reference(String),
    Object {
        properties: Vec<(String, SchemaNode)>,
        description: Option<String>,
    },
    Array {
        items: Option<Box<SchemaNode>>,
        description: Option<String>,
    },
    Scalar {
        type_name: Option<String>,
        description: Option<String>,
    },
}

impl SchemaNode {
    pub fn from_value(value: &Value) -> Self {
        if let Some(target) = value.get("$ref").and_then(Value::as_str) {
            return SchemaNode::Reference(target.to_string());
        }

        let type_name = text_of(value, "type");
        let description = text_of(value, "description");

        if type_name.as_deref() == Some("array") {
            return SchemaNode::Array {
                items: value
                    .get("items")
                    .filter(|v| !v.is_null())
                    .map(|v| Box::new(SchemaNode::from_value(v))),
                description,
            };
        }

        let is_object_type = type_name.is_none() || type_name.as_deref() == Some("object");
        match value.get("properties").and_then(Value::as_object) {
            Some(props) if is_object_type => SchemaNode::Object {
                properties: props
                    .iter()
                    .map(|(name, v)| (name.clone(), SchemaNode::from_value(v)))
                    .collect(),
                description,
            },
            _ => SchemaNode::Scalar {
                type_name,
                description,
            },
        }
    }

    /// The type label reported for this node when it is emitted as a field.
    fn type_label(&self) -> Option<String> {
        match self {
            SchemaNode::Reference(_) => None,
            SchemaNode::Object { .. } => Some("object".to_string()),
            SchemaNode::Array { .. } => Some("array".to_string()),
            SchemaNode::Scalar { type_name, .. } => type_name.clone(),
        }
    }

    fn description(&self) -> Option<String> {
        match self {
            SchemaNode::Reference(_) => None,
            SchemaNode::Object { description, .. }
            | SchemaNode::Array { description, .. }
            | SchemaNode::Scalar { description, .. } => description.clone(),
        }
    }
}

/// The document's local definitions table.
#[derive(Debug, Clone, Default)]
pub struct Definitions {
    nodes: HashMap<String, SchemaNode>,
}

impl Definitions {
    /// Parse the `definitions` object of a specification document.
    pub fn from_value(value: Option<&Value>) -> Self {
        let nodes = value
            .and_then(Value::as_object)
            .map(|defs| {
                defs.iter()
                    .map(|(name, v)| (name.clone(), SchemaNode::from_value(v)))
                    .collect()
            })
            .unwrap_or_default();
        Self { nodes }
    }

    /// Substitute a local reference with its definition, once.
    ///
    /// Returns the node unchanged when it is not a reference or the target is
    /// unknown. A definition that is itself a reference is not chased.
    pub fn resolve<'a>(&'a self, node: &'a SchemaNode) -> &'a SchemaNode {
        self.resolve_named(node).0
    }

    fn resolve_named<'a>(&'a self, node: &'a SchemaNode) -> (&'a SchemaNode, Option<&'a str>) {
        if let SchemaNode::Reference(target) = node {
            if let Some(name) = target.strip_prefix(DEFINITIONS_PREFIX) {
                if let Some((key, resolved)) = self.nodes.get_key_value(name) {
                    return (resolved, Some(key.as_str()));
                }
            }
        }
        (node, None)
    }
}

/// Flatten `node` into dot-qualified fields.
///
/// Arrays descend into their items without adding a name segment; object
/// properties that are objects descend without emitting a row; array
/// properties emit one `array` row and then descend under their own name.
pub fn flatten(node: &SchemaNode, definitions: &Definitions) -> Result<Vec<ParameterInfo>, SchemaError> {
    let mut flattener = Flattener {
        definitions,
        expanding: Vec::new(),
        fields: Vec::new(),
    };
    flattener.walk(node, "", 0)?;
    Ok(flattener.fields)
}

struct Flattener<'a> {
    definitions: &'a Definitions,
    /// Definitions currently being expanded, outermost first.
    expanding: Vec<&'a str>,
    fields: Vec<ParameterInfo>,
}

impl<'a> Flattener<'a> {
    fn walk(&mut self, node: &'a SchemaNode, prefix: &str, depth: usize) -> Result<(), SchemaError> {
        if depth > MAX_DEPTH {
            return Err(SchemaError::DepthExceeded(MAX_DEPTH));
        }
        let (resolved, name) = self.definitions.resolve_named(node);
        self.enter(name)?;

        match resolved {
            SchemaNode::Array { items: Some(items), .. } => {
                self.walk(items, prefix, depth + 1)?;
            }
            SchemaNode::Object { properties, .. } => {
                for (prop_name, prop) in properties {
                    let full_name = join(prefix, prop_name);
                    self.property(prop, full_name, depth)?;
                }
            }
            _ => {}
        }

        self.leave(name);
        Ok(())
    }

    fn property(&mut self, prop: &'a SchemaNode, full_name: String, depth: usize) -> Result<(), SchemaError> {
        let (field, name) = self.definitions.resolve_named(prop);
        match field {
            SchemaNode::Object { properties, .. } if !properties.is_empty() => {
                self.enter(name)?;
                self.walk(field, &full_name, depth + 1)?;
                self.leave(name);
            }
            SchemaNode::Array { items: Some(items), description } => {
                self.emit(&full_name, Some("array".to_string()), description.clone())?;
                self.enter(name)?;
                self.walk(items, &full_name, depth + 1)?;
                self.leave(name);
            }
            other => {
                self.emit(&full_name, other.type_label(), other.description())?;
            }
        }
        Ok(())
    }

    fn enter(&mut self, name: Option<&'a str>) -> Result<(), SchemaError> {
        if let Some(name) = name {
            if self.expanding.contains(&name) {
                return Err(SchemaError::ReferenceCycle(name.to_string()));
            }
            self.expanding.push(name);
        }
        Ok(())
    }

    fn leave(&mut self, name: Option<&str>) {
        if name.is_some() {
            self.expanding.pop();
        }
    }

    fn emit(
        &mut self,
        full_name: &str,
        size: Option<String>,
        description: Option<String>,
    ) -> Result<(), SchemaError> {
        if self.fields.len() >= MAX_FIELDS {
            return Err(SchemaError::TooManyFields(MAX_FIELDS));
        }
        self.fields.push(ParameterInfo {
            name_eng: Some(full_name.to_string()),
            size,
            description,
            ..Default::default()
        });
        Ok(())
    }
}

/// Flatten a portal-proprietary response field list whose entries may nest
/// further entries under `subParam`. Same emit-then-descend rule as
/// [`flatten`], without reference resolution. Entries without a name are skipped.
pub fn flatten_sub_params(list: &[Value], prefix: &str, fields: &mut Vec<ParameterInfo>) {
    for entry in list {
        let Some(name) = text_of(entry, "paramtrNm") else {
            continue;
        };
        let full_name = join(prefix, &name);
        fields.push(ParameterInfo {
            name_eng: Some(full_name.clone()),
            size: text_of(entry, "paramtrTy"),
            description: text_of(entry, "paramtrDc"),
            ..Default::default()
        });

        if let Some(sub) = entry.get("subParam").and_then(Value::as_array) {
            if !sub.is_empty() {
                flatten_sub_params(sub, &full_name, fields);
            }
        }
    }
}

fn join(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Text of `value[key]`: strings trimmed, numbers and booleans rendered,
/// blanks, nulls, arrays and objects reported as absent.
pub fn text_of(value: &Value, key: &str) -> Option<String> {
    let text = match value.get(key)? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
