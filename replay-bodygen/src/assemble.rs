//! Call plan assembly — dispatch resolution, call expression, and body
//! rendering for one function.

use crate::config::Overrides;
use crate::marshal::CallPlan;
use crate::model::{ApiDescription, FunctionDef};

/// Render the statements of one `Process_<fn>` body from its call plan.
///
/// Ordering is fixed: pre-statements, a blank line, the call (captured and
/// checked against the recorded status when the return type carries one),
/// a blank line, post-statements.
pub fn make_function_body(
    api: &ApiDescription,
    overrides: &Overrides,
    func: &FunctionDef,
    plan: &CallPlan,
) -> String {
    let info = &api.api;
    let arglist = plan.args.join(", ");
    let override_target = overrides.name_for(&func.name);

    let dispatch = make_dispatch_target(api, func, plan, override_target.is_some());

    let is_status = func.return_type == info.status_type;
    let call_expr = match override_target {
        Some(target) => {
            if info.no_dispatch.contains(&func.name) {
                // Constructor-like functions have no dispatch table yet; the
                // override only needs the recorded result.
                format!("{target}(returnValue, {arglist})")
            } else if is_status {
                format!("{target}({dispatch}, returnValue, {arglist})")
            } else {
                format!("{target}({dispatch}, {arglist})")
            }
        }
        None => {
            if info.no_dispatch.contains(&func.name) {
                format!("{}({arglist})", func.name)
            } else {
                format!("{dispatch}({arglist})")
            }
        }
    };

    let mut body = String::new();
    if !plan.pre.is_empty() {
        for stmt in &plan.pre {
            body.push_str("    ");
            body.push_str(stmt);
            body.push('\n');
        }
        body.push('\n');
    }
    if is_status {
        body.push_str(&format!(
            "    {} replay_result = {call_expr};\n",
            info.status_type
        ));
        body.push_str(&format!(
            "    CheckResult(\"{}\", returnValue, replay_result);\n",
            func.name
        ));
    } else {
        body.push_str(&format!("    {call_expr};\n"));
    }
    if !plan.post.is_empty() {
        body.push('\n');
        for stmt in &plan.post {
            body.push_str("    ");
            body.push_str(stmt);
            body.push('\n');
        }
    }
    body
}

/// Resolve the dispatch-table expression the call is issued through.
///
/// The table is keyed off the first parameter: instance-level for the named
/// dispatchable exceptions, device-level for everything else. Overrides map
/// the first argument themselves, so the table is addressed through the
/// mapped object's handle.
fn make_dispatch_target(
    api: &ApiDescription,
    func: &FunctionDef,
    plan: &CallPlan,
    is_override: bool,
) -> String {
    if api.api.no_dispatch.contains(&func.name) {
        return String::new();
    }

    let instance_level = func
        .params
        .first()
        .is_some_and(|p| api.api.instance_table_types.contains(&p.base_type));
    let table = if instance_level {
        "GetInstanceTable"
    } else {
        "GetDeviceTable"
    };
    let method = api.dispatch_method(&func.name);
    let target = plan.args.first().map(String::as_str).unwrap_or_default();

    if is_override {
        format!("{table}({target}->handle)->{method}")
    } else {
        format!("{table}({target})->{method}")
    }
}
