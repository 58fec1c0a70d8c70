use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use std::collections::BTreeSet;
use std::error::Error as StdError;

use schemars::JsonSchema;

use crate::error::ToolExecutionError;

/// Flattened object schema as sent to the model's `function.parameters`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSchema {
    pub properties: serde_json::Map<String, Value>,
    pub required: Vec<String>,
    #[serde(rename = "type")]
    pub schema_type: String,
}

impl InputSchema {
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "type": self.schema_type,
            "properties": self.properties,
            "required": self.required,
        })
    }
}

impl From<schemars::Schema> for InputSchema {
    fn from(schema: schemars::Schema) -> Self {
        let schema_value = serde_json::to_value(&schema).unwrap_or(Value::Null);
        let summary = SchemaSummary::from_value(&schema_value);
        Self {
            properties: summary.properties,
            required: summary.required.into_iter().collect(),
            schema_type: summary.schema_type,
        }
    }
}

struct SchemaSummary {
    properties: serde_json::Map<String, Value>,
    required: BTreeSet<String>,
    schema_type: String,
}

impl SchemaSummary {
    fn from_value(schema: &Value) -> Self {
        let schema_type = schema
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("object")
            .to_string();

        let mut summary = Self {
            properties: serde_json::Map::new(),
            required: BTreeSet::new(),
            schema_type,
        };
        summary.merge(schema);
        summary
    }

    fn merge(&mut self, schema: &Value) {
        let Some(obj) = schema.as_object() else {
            return;
        };

        if let Some(props) = obj.get("properties").and_then(Value::as_object) {
            for (key, value) in props {
                self.properties
                    .entry(key.clone())
                    .or_insert_with(|| value.clone());
            }
        }

        if let Some(req) = obj.get("required").and_then(Value::as_array) {
            self.required
                .extend(req.iter().filter_map(Value::as_str).map(str::to_string));
        }

        if let Some(all_of) = obj.get("allOf").and_then(Value::as_array) {
            for sub in all_of {
                self.merge(sub);
            }
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolSchema {
    pub name: String,
    #[serde(default)]
    pub display_name: String,
    pub description: String,
    pub input_schema: InputSchema,
}

pub trait ToolSpec {
    type Params: DeserializeOwned + JsonSchema + Send;
    type Result: Into<crate::result::ToolResult> + Send;
    type Error: StdError + Send + Sync + 'static;

    const NAME: &'static str;
    const DISPLAY_NAME: &'static str;
    const DESCRIPTION: &'static str;

    fn execution_error(error: Self::Error) -> ToolExecutionError;
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCall {
    pub name: String,
    pub parameters: Value,
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::InputSchema;
    use schemars::schema_for;

    #[test]
    fn weather_schema_requires_location() {
        let schema = schema_for!(crate::tools::weather::WeatherParams);
        let input_schema: InputSchema = schema.into();

        assert_eq!(input_schema.schema_type, "object");
        assert!(input_schema.properties.contains_key("location"));
        assert_eq!(input_schema.required, vec!["location".to_string()]);
    }

    #[test]
    fn conversion_schema_types_temperature_as_number() {
        let schema = schema_for!(crate::tools::convert::ConvertFahrenheitToCelsiusParams);
        let input_schema: InputSchema = schema.into();

        let temperature = input_schema.properties.get("temperature").unwrap();
        assert_eq!(temperature.get("type").unwrap(), "number");

        let json = input_schema.to_json();
        assert_eq!(json["required"][0], "temperature");
    }
}
