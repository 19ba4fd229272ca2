//! Input schema advertised for each tool.

use serde_json::{Map, Value, json};
use umcp_primitives::{ArgType, ToolDefinition};

/// Builds the JSON-Schema-like `inputSchema` descriptor for a tool.
///
/// Array arguments advertise string items. `required` is omitted when no
/// argument is required.
#[must_use]
pub fn input_schema(tool: &ToolDefinition) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();

    for arg in tool.arguments() {
        let mut property = Map::new();
        property.insert("type".into(), json!(arg.arg_type().json_schema_type()));
        if arg.arg_type() == ArgType::Array {
            property.insert("items".into(), json!({ "type": "string" }));
        }
        if let Some(description) = arg.description() {
            property.insert("description".into(), json!(description));
        }
        if let Some(default) = arg.default_value() {
            property.insert("default".into(), default.clone());
        }
        if let Some(min) = arg.min() {
            property.insert("minimum".into(), json!(min));
        }
        if let Some(max) = arg.max() {
            property.insert("maximum".into(), json!(max));
        }
        properties.insert(arg.name().to_owned(), Value::Object(property));

        if arg.is_required() {
            required.push(json!(arg.name()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".into(), json!("object"));
    schema.insert("properties".into(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".into(), Value::Array(required));
    }
    Value::Object(schema)
}
