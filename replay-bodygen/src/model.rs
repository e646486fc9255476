//! Intermediate model types — the deserialized form of the API description.
//!
//! Everything here is immutable once loaded: call-body generation only reads
//! these descriptors, so the order in which functions are processed cannot
//! affect the output.

use std::collections::HashSet;
use std::path::Path;

use anyhow::Result;
use serde::Deserialize;

/// A fully loaded API description ready for body generation.
#[derive(Debug, Deserialize)]
pub struct ApiDescription {
    pub api: ApiInfo,
    /// Opaque API-managed object types requiring identity remapping.
    #[serde(default)]
    pub handle_types: HashSet<String>,
    /// Opaque foreign types resolved through the external-object hooks
    /// rather than the handle registry.
    #[serde(default)]
    pub external_object_types: HashSet<String>,
    #[serde(default, rename = "struct")]
    pub structs: Vec<StructDef>,
    #[serde(default, rename = "function")]
    pub functions: Vec<FunctionDef>,
}

/// Naming conventions of the described API.
#[derive(Debug, Deserialize)]
pub struct ApiInfo {
    /// Return type that carries a replayable status code (e.g. `VkResult`).
    pub status_type: String,
    /// Prefix stripped from type names for registry info types
    /// (`VkSampler` → `MapHandle<SamplerInfo>`).
    #[serde(default)]
    pub type_prefix: String,
    /// Prefix stripped from function names for dispatch-table methods
    /// (`vkCreateSampler` → `->CreateSampler`).
    #[serde(default)]
    pub call_prefix: String,
    /// Function-pointer typedefs are recognized by this name prefix.
    #[serde(default = "default_function_pointer_prefix")]
    pub function_pointer_prefix: String,
    /// Struct type whose recorded value is replaced by the replay
    /// allocator callbacks instead of being decoded.
    pub allocation_callback_type: Option<String>,
    /// Object mapper class addressed by the emitted map/add calls.
    pub object_mapper: String,
    /// Dispatchable types routed to the instance-level table; everything
    /// else is device-level.
    #[serde(default)]
    pub instance_table_types: HashSet<String>,
    /// Constructor-like functions that have no dispatch table yet.
    #[serde(default)]
    pub no_dispatch: HashSet<String>,
}

fn default_function_pointer_prefix() -> String {
    "PFN_".to_string()
}

/// A structure definition. Members share the parameter attribute shape.
#[derive(Debug, Deserialize)]
pub struct StructDef {
    pub name: String,
    /// Tag constant identifying this struct behind a generic extension
    /// pointer; present only for structs with the type+next header pair.
    pub discriminant: Option<String>,
    #[serde(default, rename = "member")]
    pub members: Vec<ParamDef>,
}

/// A function declaration. Parameter order is call-site order.
#[derive(Debug, Deserialize)]
pub struct FunctionDef {
    pub name: String,
    pub return_type: String,
    #[serde(default, rename = "param")]
    pub params: Vec<ParamDef>,
}

/// One parameter (or struct member).
#[derive(Debug, Deserialize)]
pub struct ParamDef {
    pub name: String,
    /// Underlying named type, qualifiers and pointers stripped.
    pub base_type: String,
    /// Declared type, including const/pointer qualifiers.
    pub full_type: String,
    /// Platform-specific replacement for `full_type` (e.g. `Display*` for a
    /// parameter surfaced to the API description as `void*`).
    pub platform_full_type: Option<String>,
    #[serde(default)]
    pub is_pointer: bool,
    #[serde(default)]
    pub is_array: bool,
    /// Array length is a runtime value rather than a compile-time constant.
    #[serde(default)]
    pub is_dynamic: bool,
    /// Sibling parameter name, or a `param->member` path, supplying the
    /// element count. Empty for non-array values.
    #[serde(default)]
    pub array_length: String,
}

impl ApiDescription {
    pub fn is_handle(&self, type_name: &str) -> bool {
        self.handle_types.contains(type_name)
    }

    pub fn is_external_object(&self, type_name: &str) -> bool {
        self.external_object_types.contains(type_name)
    }

    pub fn is_struct(&self, type_name: &str) -> bool {
        self.structs.iter().any(|s| s.name == type_name)
    }

    pub fn is_function_pointer(&self, type_name: &str) -> bool {
        type_name.starts_with(&self.api.function_pointer_prefix)
    }

    /// Derived parameter direction. Input pointers are const-qualified;
    /// platform handle types surface as non-const external pointers but are
    /// pure inputs resolved through the external-object pre-process hook.
    pub fn is_input_pointer(&self, value: &ParamDef) -> bool {
        if value.full_type.contains("const") {
            return true;
        }
        value.platform_full_type.is_some()
            && self.is_external_object(&value.base_type)
            && !value.is_array
    }

    /// True when `name` supplies the element count of a sibling parameter,
    /// making it an in/out value during replay.
    pub fn is_array_length(&self, name: &str, params: &[ParamDef]) -> bool {
        params.iter().any(|p| p.array_length == name)
    }

    /// `VkSampler` → `Sampler`, for `MapHandle<SamplerInfo>` style names.
    pub fn strip_type_prefix<'a>(&self, type_name: &'a str) -> &'a str {
        type_name
            .strip_prefix(&self.api.type_prefix)
            .unwrap_or(type_name)
    }

    /// `vkCreateSampler` → `CreateSampler`, the dispatch-table member name.
    pub fn dispatch_method<'a>(&self, function_name: &'a str) -> &'a str {
        function_name
            .strip_prefix(&self.api.call_prefix)
            .unwrap_or(function_name)
    }
}

/// Load and parse an API description TOML file.
pub fn load_description(path: &Path) -> Result<ApiDescription> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        anyhow::anyhow!("failed to read api description {}: {}", path.display(), e)
    })?;
    let description: ApiDescription = toml::from_str(&content).map_err(|e| {
        anyhow::anyhow!("failed to parse api description {}: {}", path.display(), e)
    })?;
    Ok(description)
}
