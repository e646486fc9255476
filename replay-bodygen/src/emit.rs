//! Emission — consumer declarations, file scaffolding, and the generator
//! visitor interface.

use tracing::debug;

use crate::assemble;
use crate::config::{Overrides, OutputConfig};
use crate::index::StructIndexes;
use crate::marshal;
use crate::model::{ApiDescription, FunctionDef, ParamDef, StructDef};

/// Column the parameter name starts at in generated declarations.
const PARAM_NAME_COLUMN: usize = 44;

/// Generation hooks driven once per output file.
pub trait Generator {
    fn begin_file(&mut self, out: &mut String);
    fn visit_struct(&mut self, s: &StructDef, out: &mut String);
    fn visit_call(&mut self, func: &FunctionDef, out: &mut String);
    fn end_file(&mut self, out: &mut String);
}

/// Drive a generator over the whole description: file prologue, every
/// struct, every function in description order, file epilogue.
pub fn generate_source(api: &ApiDescription, generator: &mut impl Generator) -> String {
    let mut out = String::new();
    generator.begin_file(&mut out);
    for s in &api.structs {
        generator.visit_struct(s, &mut out);
    }
    for f in &api.functions {
        generator.visit_call(f, &mut out);
    }
    generator.end_file(&mut out);
    out
}

/// The replay consumer body generator. One member definition per function;
/// struct knowledge comes from the prebuilt indexes, so struct visits emit
/// nothing.
pub struct ReplayBodyGenerator<'a> {
    api: &'a ApiDescription,
    indexes: &'a StructIndexes,
    overrides: &'a Overrides,
    output: &'a OutputConfig,
    first_call: bool,
}

impl<'a> ReplayBodyGenerator<'a> {
    pub fn new(
        api: &'a ApiDescription,
        indexes: &'a StructIndexes,
        overrides: &'a Overrides,
        output: &'a OutputConfig,
    ) -> Self {
        Self {
            api,
            indexes,
            overrides,
            output,
            first_call: true,
        }
    }
}

impl Generator for ReplayBodyGenerator<'_> {
    fn begin_file(&mut self, out: &mut String) {
        if let Some((first, rest)) = self.output.includes.split_first() {
            out.push_str(&format!("#include \"{first}\"\n\n"));
            for include in rest {
                out.push_str(&format!("#include \"{include}\"\n"));
            }
            if !rest.is_empty() {
                out.push('\n');
            }
        }
        for ns in &self.output.namespaces {
            out.push_str(&format!("namespace {ns} {{\n"));
        }
        if !self.output.namespaces.is_empty() {
            out.push('\n');
        }
    }

    fn visit_struct(&mut self, _s: &StructDef, _out: &mut String) {}

    fn visit_call(&mut self, func: &FunctionDef, out: &mut String) {
        let is_override = self.overrides.is_overridden(&func.name);
        let plan = marshal::marshal_call(self.api, self.indexes, func, is_override);

        if !self.first_call {
            out.push('\n');
        }
        self.first_call = false;

        out.push_str(&make_consumer_decl(self.api, &self.output.class, func));
        out.push_str("{\n");
        out.push_str(&assemble::make_function_body(
            self.api,
            self.overrides,
            func,
            &plan,
        ));
        out.push_str("}\n");

        debug!(name = %func.name, params = func.params.len(), overridden = is_override, "generated call body");
    }

    fn end_file(&mut self, out: &mut String) {
        if !self.output.namespaces.is_empty() {
            out.push('\n');
        }
        for ns in self.output.namespaces.iter().rev() {
            out.push_str(&format!("}}  // namespace {ns}\n"));
        }
    }
}

/// Render the `Process_<fn>` member signature: the recorded status first
/// when the function returns one, then each parameter as its decoded type.
fn make_consumer_decl(api: &ApiDescription, class: &str, func: &FunctionDef) -> String {
    let mut params: Vec<(String, String)> = Vec::new();
    if func.return_type == api.api.status_type {
        params.push((api.api.status_type.clone(), "returnValue".to_string()));
    }
    for value in &func.params {
        params.push((decoded_param_type(api, value), value.name.clone()));
    }

    let mut decl = format!("void {class}::Process_{}(", func.name);
    if params.is_empty() {
        decl.push_str(")\n");
        return decl;
    }
    decl.push('\n');
    let lines: Vec<String> = params
        .iter()
        .map(|(ty, name)| {
            if ty.len() >= PARAM_NAME_COLUMN {
                format!("    {ty} {name}")
            } else {
                format!("    {ty:<width$}{name}", width = PARAM_NAME_COLUMN)
            }
        })
        .collect();
    decl.push_str(&lines.join(",\n"));
    decl.push_str(")\n");
    decl
}

/// The decoded type a parameter is received as by the consumer. Input
/// decoders arrive by const reference, output decoders by pointer, matching
/// the accessor style the marshalling engine emits.
fn decoded_param_type(api: &ApiDescription, value: &ParamDef) -> String {
    if value.is_pointer || value.is_array {
        let base = &value.base_type;
        let decoder = if api.is_struct(base) {
            format!("StructPointerDecoder<Decoded_{base}>")
        } else if base == "char" {
            "StringDecoder".to_string()
        } else if api.is_handle(base) {
            format!("HandlePointerDecoder<{base}>")
        } else if api.is_external_object(base) {
            if value.is_array {
                // Byte-blob data.
                "PointerDecoder<uint8_t>".to_string()
            } else if api.is_input_pointer(value) {
                // A recorded opaque id, passed through by value.
                return "uint64_t".to_string();
            } else {
                "PointerDecoder<uint64_t>".to_string()
            }
        } else {
            format!("PointerDecoder<{base}>")
        };
        if api.is_input_pointer(value) {
            format!("const {decoder}&")
        } else {
            format!("{decoder}*")
        }
    } else if api.is_handle(&value.base_type) {
        "format::HandleId".to_string()
    } else if api.is_function_pointer(&value.base_type) {
        // Recorded as a raw address.
        "uint64_t".to_string()
    } else {
        value.full_type.clone()
    }
}
