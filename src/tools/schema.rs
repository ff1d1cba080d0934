//! 工具参数 JSON Schema 生成（schemars 自动生成工具 Schema）
//!
//! 每个工具用一个 `#[derive(Deserialize, JsonSchema)]` 参数结构体同时描述 schema 与解析。

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::tools::ToolError;

/// 生成参数结构体的 JSON Schema（去掉 $schema / title，供模型端使用）
pub fn input_schema<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    let mut value = serde_json::to_value(schema)
        .unwrap_or_else(|_| serde_json::json!({ "type": "object", "properties": {} }));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}

/// 将模型传入的 args 解析为参数结构体
pub fn parse_args<T: DeserializeOwned>(args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments(e.to_string()))
}
