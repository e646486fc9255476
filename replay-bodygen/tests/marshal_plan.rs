//! Plan-level tests: the marshalling engine's structured output, checked
//! against the fixture description without rendering text.

use replay_bodygen::index::StructIndexes;
use replay_bodygen::marshal::marshal_call;
use replay_bodygen::model::ApiDescription;

fn fixture() -> ApiDescription {
    toml::from_str(include_str!("fixtures/vulkan_api.toml")).expect("parse fixture description")
}

/// Every call plan has exactly one argument token per parameter, minus the
/// unsupported function-pointer parameters.
#[test]
fn argument_count_matches_parameter_count() {
    let api = fixture();
    let indexes = StructIndexes::build(&api);

    for func in &api.functions {
        let unsupported = func
            .params
            .iter()
            .filter(|p| {
                !(p.is_pointer || p.is_array) && api.is_function_pointer(&p.base_type)
            })
            .count();
        for is_override in [false, true] {
            let plan = marshal_call(&api, &indexes, func, is_override);
            assert_eq!(
                plan.args.len(),
                func.params.len() - unsupported,
                "wrong argument count for {} (override: {is_override})",
                func.name
            );
        }
    }
}

#[test]
fn arguments_preserve_parameter_order() {
    let api = fixture();
    let indexes = StructIndexes::build(&api);

    let func = api
        .functions
        .iter()
        .find(|f| f.name == "vkCreateSampler")
        .expect("fixture function");
    let plan = marshal_call(&api, &indexes, func, false);
    assert_eq!(
        plan.args,
        vec!["in_device", "in_pCreateInfo", "in_pAllocator", "out_pSampler"]
    );
}

/// An in/out count parameter seeds its output slot from the recorded value
/// and later array parameters resolve their length through the intermediate.
#[test]
fn inout_count_aliases_to_intermediate() {
    let api = fixture();
    let indexes = StructIndexes::build(&api);

    let func = api
        .functions
        .iter()
        .find(|f| f.name == "vkEnumeratePhysicalDevices")
        .expect("fixture function");
    let plan = marshal_call(&api, &indexes, func, false);

    assert!(plan.pre.iter().any(|s| s.contains(
        "pPhysicalDeviceCount->AllocateOutputData(1, pPhysicalDeviceCount->IsNull() ? static_cast<uint32_t>(0) : (*pPhysicalDeviceCount->GetPointer()))"
    )));
    assert!(
        plan.post[0].contains("*out_pPhysicalDeviceCount"),
        "registration must use the live count: {}",
        plan.post[0]
    );
    assert!(
        !plan.post[0].contains("pPhysicalDeviceCount->GetPointer()"),
        "registration must not reread the recorded count: {}",
        plan.post[0]
    );
}

/// The override path swaps unwrapped temporaries for decoder carriers on
/// every pointer parameter that is not an external object.
#[test]
fn override_passes_decoder_carriers() {
    let api = fixture();
    let indexes = StructIndexes::build(&api);

    let func = api
        .functions
        .iter()
        .find(|f| f.name == "vkWaitForFences")
        .expect("fixture function");

    let generated = marshal_call(&api, &indexes, func, false);
    assert_eq!(
        generated.args,
        vec!["in_device", "fenceCount", "in_pFences", "waitAll", "timeout"]
    );

    let overridden = marshal_call(&api, &indexes, func, true);
    assert_eq!(
        overridden.args,
        vec!["in_device", "fenceCount", "pFences", "waitAll", "timeout"]
    );
}

/// External objects marshal through a temporary even on the override path,
/// because the pre/post hooks run either way.
#[test]
fn override_keeps_external_object_temporary() {
    let api = fixture();
    let indexes = StructIndexes::build(&api);

    let func = api
        .functions
        .iter()
        .find(|f| f.name == "vkAcquireXlibDisplayEXT")
        .expect("fixture function");
    let plan = marshal_call(&api, &indexes, func, true);

    assert!(plan.args.contains(&"in_dpy".to_string()));
    assert!(
        plan.pre
            .iter()
            .any(|s| s.contains("PreProcessExternalObject(dpy"))
    );
}

/// Handle-bearing input structs get a remap pre-statement; handle-bearing
/// output structs get a registration post-statement.
#[test]
fn struct_handle_statements_pair_with_direction() {
    let api = fixture();
    let indexes = StructIndexes::build(&api);

    let submit = api
        .functions
        .iter()
        .find(|f| f.name == "vkQueueSubmit")
        .expect("fixture function");
    let plan = marshal_call(&api, &indexes, submit, false);
    assert!(
        plan.pre
            .iter()
            .any(|s| s.starts_with("MapStructArrayHandles(pSubmits.GetMetaStructPointer()"))
    );
    assert!(plan.post.is_empty());
}

#[test]
fn function_pointer_parameter_emits_nothing() {
    let api = fixture();
    let indexes = StructIndexes::build(&api);

    let func = api
        .functions
        .iter()
        .find(|f| f.name == "vkRegisterDeviceCallbackEXT")
        .expect("fixture function");
    let plan = marshal_call(&api, &indexes, func, false);

    assert_eq!(plan.args, vec!["in_device"]);
    assert_eq!(plan.pre.len(), 1);
    assert!(plan.post.is_empty());
}
