//! Marshalling rule engine — per-parameter decisions for one call body.
//!
//! For each parameter, decides what happens before the call (decode,
//! allocate, remap), which token appears in the argument list, and what
//! happens after the call (handle registration, output propagation,
//! external-object post-processing). Parameters are processed strictly in
//! declaration order: an in/out count parameter registers an alias that
//! later array parameters resolve their length through.

use std::collections::HashMap;

use tracing::warn;

use crate::index::StructIndexes;
use crate::model::{ApiDescription, FunctionDef, ParamDef};

/// Structured result of marshalling one call: ordered pre-statements, one
/// argument token per supported parameter, and ordered post-statements.
/// Rendering is the assembler's job; nothing here is formatted output.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct CallPlan {
    pub args: Vec<String>,
    pub pre: Vec<String>,
    pub post: Vec<String>,
}

/// Build the call plan for `func`.
///
/// `is_override` selects the override calling convention: pointer parameters
/// are passed as their decoded-value carriers rather than unwrapped
/// temporaries, except external objects which always marshal through a
/// temporary for the pre/post hooks.
pub fn marshal_call(
    api: &ApiDescription,
    indexes: &StructIndexes,
    func: &FunctionDef,
    is_override: bool,
) -> CallPlan {
    let mut marshaller = Marshaller {
        api,
        indexes,
        func,
        is_override,
        array_lengths: HashMap::new(),
        plan: CallPlan::default(),
    };

    for value in &func.params {
        if value.is_pointer || value.is_array {
            marshaller.pointer(value);
        } else if api.is_handle(&value.base_type) {
            marshaller.handle(value);
        } else if api.is_function_pointer(&value.base_type) {
            // Function pointers are recorded as raw addresses; there is no
            // replay-side value to reconstruct. The argument list is left
            // with a gap rather than an invalid token.
            warn!(
                function = %func.name,
                parameter = %value.name,
                "function pointer parameter is not supported, skipping argument"
            );
        } else {
            marshaller.plan.args.push(value.name.clone());
        }
    }

    marshaller.plan
}

/// Classified shape of one pointer/array parameter, shared by the input and
/// output rule sets.
struct PointerShape {
    full_type: String,
    arg_name: String,
    length_name: String,
    is_external: bool,
    need_temp: bool,
}

struct Marshaller<'a> {
    api: &'a ApiDescription,
    indexes: &'a StructIndexes,
    func: &'a FunctionDef,
    is_override: bool,
    /// Output counts that feed later array allocations: original parameter
    /// name → the intermediate expression holding the live value.
    array_lengths: HashMap<String, String>,
    plan: CallPlan,
}

impl Marshaller<'_> {
    /// A non-pointer handle: map the recorded id to a live handle.
    fn handle(&mut self, value: &ParamDef) {
        let arg_name = format!("in_{}", value.name);
        if self.is_override {
            // Overrides receive the mapper's info object; auto lets the
            // override signature pick const-ness.
            self.plan.pre.push(format!(
                "auto {arg_name} = GetObjectMapper().Map{}({});",
                value.base_type, value.name
            ));
        } else {
            self.plan.pre.push(format!(
                "{} {arg_name} = MapHandle<{}Info>({}, &{}::Map{});",
                value.full_type,
                self.api.strip_type_prefix(&value.base_type),
                value.name,
                self.api.api.object_mapper,
                value.base_type
            ));
        }
        self.plan.args.push(arg_name);
    }

    fn pointer(&mut self, value: &ParamDef) {
        let mut full_type = value
            .platform_full_type
            .clone()
            .unwrap_or_else(|| value.full_type.clone());
        let is_input = self.api.is_input_pointer(value);
        // Arrays of external object types are byte blobs decoded as plain
        // input data; only a non-array value is a pointer to an external
        // object.
        let is_external =
            self.api.is_external_object(&value.base_type) && !value.is_array;
        // Overrides consume the decoder object directly, so no unwrapped
        // temporary is declared. External objects still need one for the
        // pre/post hooks.
        let need_temp = !self.is_override || is_external;

        if value.is_array && !value.is_dynamic {
            // Static arrays decay to dynamic pointer syntax.
            full_type.push('*');
        }

        let mut length_name = value.array_length.clone();
        if !length_name.is_empty() {
            if let Some(alias) = self.array_lengths.get(&length_name) {
                // The count is an in/out parameter declared earlier; its
                // live value is in the intermediate, not the recorded input.
                length_name = alias.clone();
            } else if length_name.contains("->") {
                // The count is a member of another parameter's struct; read
                // it through that parameter's decoded value.
                length_name = if need_temp {
                    format!("in_{length_name}")
                } else {
                    length_name.replace("->", ".GetPointer()->")
                };
            }
        }

        let arg_name = if is_input {
            format!("in_{}", value.name)
        } else {
            format!("out_{}", value.name)
        };

        let mut expr = String::new();
        if need_temp {
            self.plan.args.push(arg_name.clone());
            expr = format!("{full_type} {arg_name} = ");
        } else {
            self.plan.args.push(value.name.clone());
        }

        let shape = PointerShape {
            full_type,
            arg_name,
            length_name,
            is_external,
            need_temp,
        };

        if is_input {
            self.input_pointer(value, &shape, &mut expr);
        } else {
            self.output_pointer(value, &shape, &mut expr);
        }

        if !expr.is_empty() {
            self.plan.pre.push(expr);
        }
    }

    fn input_pointer(&mut self, value: &ParamDef, shape: &PointerShape, expr: &mut String) {
        let mapper = &self.api.api.object_mapper;

        if shape.is_external {
            // The recorded value is an opaque id; resolve it to a live
            // pointer through the pre-process hook, with a representation
            // cast for platform-typed parameters.
            if let Some(platform_type) = &value.platform_full_type {
                expr.push_str(&format!(
                    "static_cast<{platform_type}>(PreProcessExternalObject({}, format::ApiCallId::ApiCall_{name}, \"{name}\"));",
                    value.name,
                    name = self.func.name
                ));
            } else {
                expr.push_str(&format!(
                    "PreProcessExternalObject({}, format::ApiCallId::ApiCall_{name}, \"{name}\");",
                    value.name,
                    name = self.func.name
                ));
            }
        } else if Some(value.base_type.as_str())
            == self.api.api.allocation_callback_type.as_deref()
        {
            if shape.need_temp {
                // Replay substitutes its own callbacks for the recorded
                // ones; overrides receive the recorded decoder object as-is.
                expr.push_str(&format!("GetAllocationCallbacks({});", value.name));
            }
        } else if self.api.is_handle(&value.base_type) {
            // The decoder holds recorded 64-bit ids; map the whole array.
            let info = self.api.strip_type_prefix(&value.base_type);
            if shape.need_temp {
                let mutable_type = shape.full_type.replace("const", "");
                self.plan.pre.push(format!(
                    "{} {} = {}.GetHandlePointer();",
                    mutable_type.trim(),
                    shape.arg_name,
                    value.name
                ));
                *expr = format!(
                    "MapHandles<{info}Info>({p}.GetPointer(), {p}.GetLength(), {}, {}, &{mapper}::Map{});",
                    shape.arg_name,
                    shape.length_name,
                    value.base_type,
                    p = value.name
                );
            } else {
                *expr = format!(
                    "MapHandles<{info}Info>({p}.GetPointer(), {p}.GetLength(), {p}.GetHandlePointer(), {}, &{mapper}::Map{});",
                    shape.length_name,
                    value.base_type,
                    p = value.name
                );
            }
        } else {
            if shape.need_temp {
                expr.push_str(&format!("{}.GetPointer();", value.name));
            }
            if self.indexes.has_handles(&value.base_type) {
                // Remap the ids embedded in the decoded payload before the
                // call reads it.
                if !expr.is_empty() {
                    self.plan.pre.push(expr.clone());
                }
                *expr = if value.is_array {
                    format!(
                        "MapStructArrayHandles({p}.GetMetaStructPointer(), {p}.GetLength(), GetObjectMapper());",
                        p = value.name
                    )
                } else {
                    format!(
                        "MapStructHandles({}.GetMetaStructPointer(), GetObjectMapper());",
                        value.name
                    )
                };
            }
        }
    }

    fn output_pointer(&mut self, value: &ParamDef, shape: &PointerShape, expr: &mut String) {
        if value.is_array {
            self.output_array(value, shape, expr);
        } else if shape.is_external {
            self.output_external(value, shape, expr);
        } else if self.api.is_handle(&value.base_type) {
            self.output_handle(value, shape, expr);
        } else if self
            .api
            .is_array_length(&value.name, &self.func.params)
        {
            // In/out count: seed the output slot from the recorded value and
            // expose the live intermediate to later array parameters.
            expr.push_str(&format!(
                "{p}->AllocateOutputData(1, {p}->IsNull() ? static_cast<{base}>(0) : (*{p}->GetPointer()));",
                base = value.base_type,
                p = value.name
            ));
            let alias = if shape.need_temp {
                format!("*{}", shape.arg_name)
            } else {
                format!("*{}->GetOutputPointer()", value.name)
            };
            self.array_lengths.insert(value.name.clone(), alias);
        } else if self.api.is_struct(&value.base_type) {
            self.output_struct(value, shape, expr);
        } else {
            expr.push_str(&format!(
                "{}->AllocateOutputData(1, static_cast<{}>(0));",
                value.name, value.base_type
            ));
        }
    }

    fn output_array(&mut self, value: &ParamDef, shape: &PointerShape, expr: &mut String) {
        let mapper = &self.api.api.object_mapper;
        let length_name = &shape.length_name;

        if self.api.is_external_object(&value.base_type) {
            // Byte-blob output; allocate the backing storage only.
            if shape.need_temp {
                expr.push_str(&format!(
                    "{p}->IsNull() ? nullptr : {p}->AllocateOutputData({length_name});",
                    p = value.name
                ));
            } else {
                *expr = format!(
                    "if (!{p}->IsNull()) {{ {p}->AllocateOutputData({length_name}); }}",
                    p = value.name
                );
            }
        } else if self.api.is_handle(&value.base_type) {
            if shape.need_temp {
                expr.push_str(&format!("{}->GetHandlePointer();", value.name));
                self.plan.post.push(format!(
                    "AddHandles<{base}>({p}->GetPointer(), {p}->GetLength(), {}, {length_name}, &{mapper}::Add{base});",
                    shape.arg_name,
                    base = value.base_type,
                    p = value.name
                ));
            } else {
                self.plan.post.push(format!(
                    "AddHandles<{base}>({p}->GetPointer(), {p}->GetLength(), {p}->GetHandlePointer(), {length_name}, &{mapper}::Add{base});",
                    base = value.base_type,
                    p = value.name
                ));
            }
        } else if self.api.is_struct(&value.base_type) {
            // Structs with a discriminant header get the tag pre-set so the
            // API can recognize the type; the extension pointer stays null.
            let init = match self.indexes.discriminant(&value.base_type) {
                Some(tag) => format!(
                    "{length_name}, {base}{{ {tag}, nullptr }}",
                    base = value.base_type
                ),
                None => length_name.clone(),
            };
            if shape.need_temp {
                expr.push_str(&format!(
                    "{p}->IsNull() ? nullptr : {p}->AllocateOutputData({init});",
                    p = value.name
                ));
                if self.indexes.has_handles(&value.base_type) {
                    self.plan.post.push(format!(
                        "AddStructArrayHandles<Decoded_{base}>({p}->GetMetaStructPointer(), {p}->GetLength(), {}, {length_name}, GetObjectMapper());",
                        shape.arg_name,
                        base = value.base_type,
                        p = value.name
                    ));
                }
            } else {
                expr.push_str(&format!(
                    "if (!{p}->IsNull()) {{ {p}->AllocateOutputData({init}); }}",
                    p = value.name
                ));
                if self.indexes.has_handles(&value.base_type) {
                    self.plan.post.push(format!(
                        "AddStructArrayHandles<Decoded_{base}>({p}->GetMetaStructPointer(), {p}->GetLength(), {p}->GetOutputPointer(), {length_name}, GetObjectMapper());",
                        base = value.base_type,
                        p = value.name
                    ));
                }
            }
        } else if shape.need_temp {
            expr.push_str(&format!(
                "{p}->IsNull() ? nullptr : {p}->AllocateOutputData({length_name});",
                p = value.name
            ));
        } else {
            *expr = format!(
                "if (!{p}->IsNull()) {{ {p}->AllocateOutputData({length_name}); }}",
                p = value.name
            );
        }
    }

    /// Allocate the output slot now; once the call has produced the live
    /// value, hand it to the post-process hook so future calls can resolve
    /// the recorded id again.
    fn output_external(&mut self, value: &ParamDef, shape: &PointerShape, expr: &mut String) {
        if value.platform_full_type.is_some() {
            expr.push_str(&format!(
                "reinterpret_cast<{}>({}->AllocateOutputData(1));",
                shape.full_type, value.name
            ));
            self.plan.post.push(format!(
                "PostProcessExternalObject(replay_result, (*{p}->GetPointer()), static_cast<void*>(*{}), format::ApiCallId::ApiCall_{name}, \"{name}\");",
                shape.arg_name,
                p = value.name,
                name = self.func.name
            ));
        } else {
            expr.push_str(&format!("{}->AllocateOutputData(1);", value.name));
            self.plan.post.push(format!(
                "PostProcessExternalObject(replay_result, (*{p}->GetPointer()), *{p}->GetOutputPointer(), format::ApiCallId::ApiCall_{name}, \"{name}\");",
                p = value.name,
                name = self.func.name
            ));
        }
    }

    fn output_handle(&mut self, value: &ParamDef, shape: &PointerShape, expr: &mut String) {
        let mapper = &self.api.api.object_mapper;
        if shape.need_temp {
            expr.push_str(&format!("{}->GetHandlePointer();", value.name));
            self.plan.post.push(format!(
                "AddHandles<{base}>({p}->GetPointer(), 1, {}, 1, &{mapper}::Add{base});",
                shape.arg_name,
                base = value.base_type,
                p = value.name
            ));
        } else {
            self.plan.post.push(format!(
                "AddHandles<{base}>({p}->GetPointer(), 1, {p}->GetHandlePointer(), 1, &{mapper}::Add{base});",
                base = value.base_type,
                p = value.name
            ));
        }
    }

    fn output_struct(&mut self, value: &ParamDef, shape: &PointerShape, expr: &mut String) {
        match self.indexes.discriminant(&value.base_type) {
            Some(tag) => expr.push_str(&format!(
                "{}->AllocateOutputData(1, {{ {tag}, nullptr }});",
                value.name
            )),
            None => expr.push_str(&format!("{}->AllocateOutputData(1);", value.name)),
        }
        if self.indexes.has_handles(&value.base_type) {
            if shape.need_temp {
                self.plan.post.push(format!(
                    "AddStructHandles<Decoded_{base}>({p}->GetMetaStructPointer(), {}, GetObjectMapper());",
                    shape.arg_name,
                    base = value.base_type,
                    p = value.name
                ));
            } else {
                self.plan.post.push(format!(
                    "AddStructHandles<Decoded_{base}>({p}->GetMetaStructPointer(), {p}->GetOutputPointer(), GetObjectMapper());",
                    base = value.base_type,
                    p = value.name
                ));
            }
        }
    }
}
