use serde_json::{Map, Value};
use std::collections::BTreeMap;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("unknown capability `{name}`")]
    UnknownCapability { name: String },
    #[error("missing required argument `{arg}` for `{capability}`")]
    MissingArg { capability: String, arg: String },
    #[error("unknown argument `{arg}` for `{capability}`")]
    UnknownArg { capability: String, arg: String },
    #[error("invalid argument type for `{capability}.{arg}`; expected {expected}")]
    InvalidArgType {
        capability: String,
        arg: String,
        expected: String,
    },
    #[error("invalid value for `{capability}.{arg}`; allowed: {allowed}")]
    InvalidArgValue {
        capability: String,
        arg: String,
        allowed: String,
    },
    #[error("capability `{capability}` failed: {reason}")]
    Invocation { capability: String, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParameterKind {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
}

impl ParameterKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ParameterKind::String => "string",
            ParameterKind::Integer => "integer",
            ParameterKind::Number => "number",
            ParameterKind::Boolean => "boolean",
            ParameterKind::Object => "object",
            ParameterKind::Array => "array",
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            ParameterKind::String => value.is_string(),
            ParameterKind::Integer => value.is_i64() || value.is_u64(),
            ParameterKind::Number => value.is_number(),
            ParameterKind::Boolean => value.is_boolean(),
            ParameterKind::Object => value.is_object(),
            ParameterKind::Array => value.is_array(),
        }
    }
}

/// One argument of a capability: name, type, whether it is required and an
/// optional enum constraint for string arguments.
#[derive(Debug, Clone)]
pub struct ParameterSpec {
    pub name: String,
    pub description: String,
    pub kind: ParameterKind,
    pub required: bool,
    pub allowed: Vec<String>,
}

impl ParameterSpec {
    pub fn new(name: &str, description: &str, kind: ParameterKind) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            kind,
            required: false,
            allowed: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn allowed(mut self, values: &[&str]) -> Self {
        self.allowed = values.iter().map(|v| v.to_string()).collect();
        self
    }
}

/// Schema describing a callable capability, presented to the chat completion
/// collaborator for function calling.
#[derive(Debug, Clone)]
pub struct CapabilityDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterSpec>,
}

/// A named, schema-described unit of behaviour invocable with a keyword
/// argument bundle, returning a text result for the conversation.
pub trait Capability {
    fn descriptor(&self) -> CapabilityDescriptor;

    fn invoke(&self, args: &Map<String, Value>) -> Result<String, RegistryError>;
}

/// Callable capabilities keyed by name. The orchestrator needs no
/// compile-time knowledge of the concrete implementations behind it.
pub struct AgentRegistry {
    capabilities: BTreeMap<String, Box<dyn Capability>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self {
            capabilities: BTreeMap::new(),
        }
    }

    pub fn register(&mut self, capability: Box<dyn Capability>) {
        self.capabilities
            .insert(capability.descriptor().name, capability);
    }

    pub fn descriptors(&self) -> Vec<CapabilityDescriptor> {
        self.capabilities
            .values()
            .map(|capability| capability.descriptor())
            .collect()
    }

    /// Validates the argument bundle against the capability's schema and
    /// invokes it.
    pub fn invoke(&self, name: &str, args: &Map<String, Value>) -> Result<String, RegistryError> {
        let capability =
            self.capabilities
                .get(name)
                .ok_or_else(|| RegistryError::UnknownCapability {
                    name: name.to_string(),
                })?;
        let descriptor = capability.descriptor();
        validate_args(&descriptor, args)?;
        capability.invoke(args)
    }
}

impl Default for AgentRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_args(
    descriptor: &CapabilityDescriptor,
    args: &Map<String, Value>,
) -> Result<(), RegistryError> {
    for spec in &descriptor.parameters {
        match args.get(&spec.name) {
            None if spec.required => {
                return Err(RegistryError::MissingArg {
                    capability: descriptor.name.clone(),
                    arg: spec.name.clone(),
                })
            }
            None | Some(Value::Null) => {}
            Some(value) => {
                if !spec.kind.matches(value) {
                    return Err(RegistryError::InvalidArgType {
                        capability: descriptor.name.clone(),
                        arg: spec.name.clone(),
                        expected: spec.kind.as_str().to_string(),
                    });
                }
                if !spec.allowed.is_empty() {
                    let matches_enum = value
                        .as_str()
                        .is_some_and(|v| spec.allowed.iter().any(|allowed| allowed == v));
                    if !matches_enum {
                        return Err(RegistryError::InvalidArgValue {
                            capability: descriptor.name.clone(),
                            arg: spec.name.clone(),
                            allowed: spec.allowed.join(", "),
                        });
                    }
                }
            }
        }
    }
    for arg in args.keys() {
        if !descriptor.parameters.iter().any(|spec| &spec.name == arg) {
            return Err(RegistryError::UnknownArg {
                capability: descriptor.name.clone(),
                arg: arg.clone(),
            });
        }
    }
    Ok(())
}
