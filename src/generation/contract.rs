use std::sync::Arc;

use jsonschema::JSONSchema;
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde_json::Value;
use validator::Validate;

use crate::generation::error::GenerationError;

/// A structured output the generation client can be asked for.
///
/// The JSON schema comes from `schemars`; bounds that JSON schema expresses
/// poorly (list lengths, numeric ranges) are re-checked with `validator`.
pub trait OutputContract: DeserializeOwned + JsonSchema + Validate + Send + 'static {
    const NAME: &'static str;
}

pub struct CompiledContract {
    pub name: &'static str,
    pub schema: Value,
    validator: JSONSchema,
}

impl CompiledContract {
    pub fn compile<T: OutputContract>() -> Result<Arc<Self>, GenerationError> {
        let schema = serde_json::to_value(schema_for!(T)).map_err(|err| {
            GenerationError::InvalidContract {
                contract: T::NAME,
                message: format!("schema serialization failed: {err}"),
            }
        })?;
        let validator =
            JSONSchema::compile(&schema).map_err(|err| GenerationError::InvalidContract {
                contract: T::NAME,
                message: err.to_string(),
            })?;
        Ok(Arc::new(Self {
            name: T::NAME,
            schema,
            validator,
        }))
    }

    /// Returns every violation as `path: message`, joined with `; `.
    pub fn check(&self, instance: &Value) -> Result<(), String> {
        match self.validator.validate(instance) {
            Ok(()) => Ok(()),
            Err(errors) => {
                let messages = errors
                    .map(|error| {
                        let path = error.instance_path.to_string();
                        if path.is_empty() {
                            error.to_string()
                        } else {
                            format!("{path}: {error}")
                        }
                    })
                    .collect::<Vec<_>>();
                Err(messages.join("; "))
            }
        }
    }

    /// The schema without the draft marker and title, for embedding in prompts.
    pub fn prompt_schema(&self) -> String {
        let mut schema = self.schema.clone();
        if let Some(object) = schema.as_object_mut() {
            object.remove("$schema");
            object.remove("title");
        }
        serde_json::to_string(&schema).unwrap_or_else(|_| "{}".to_string())
    }
}
