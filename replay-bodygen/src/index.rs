//! Whole-description pre-pass over structure definitions.
//!
//! Call bodies may reference structs declared anywhere in the description,
//! so both indexes are computed in full before any body generation starts
//! and never mutated afterwards.

use std::collections::{HashMap, HashSet};

use crate::model::{ApiDescription, ParamDef};

/// Derived struct facts: which types carry handles (directly or through
/// nested members) and which carry a discriminant header.
#[derive(Debug)]
pub struct StructIndexes {
    with_handles: HashSet<String>,
    discriminants: HashMap<String, String>,
}

impl StructIndexes {
    /// Compute both indexes for the whole description.
    ///
    /// Handle membership is a fixed point: a struct joins the set when any
    /// member is a handle type, an external-object pointer, or a struct
    /// already in the set. Iterating until the set stops growing makes the
    /// result independent of declaration order. Circular by-value membership
    /// is undefined input and not detected.
    pub fn build(api: &ApiDescription) -> Self {
        let mut with_handles: HashSet<String> = HashSet::new();
        loop {
            let mut changed = false;
            for s in &api.structs {
                if with_handles.contains(&s.name) {
                    continue;
                }
                if s.members
                    .iter()
                    .any(|m| member_has_handles(api, &with_handles, m))
                {
                    with_handles.insert(s.name.clone());
                    changed = true;
                }
            }
            if !changed {
                break;
            }
        }

        let discriminants = api
            .structs
            .iter()
            .filter_map(|s| s.discriminant.clone().map(|d| (s.name.clone(), d)))
            .collect();

        Self {
            with_handles,
            discriminants,
        }
    }

    pub fn has_handles(&self, type_name: &str) -> bool {
        self.with_handles.contains(type_name)
    }

    /// Tag constant for structs that need their header pre-initialized in
    /// output position.
    pub fn discriminant(&self, type_name: &str) -> Option<&str> {
        self.discriminants.get(type_name).map(String::as_str)
    }
}

fn member_has_handles(api: &ApiDescription, with_handles: &HashSet<String>, m: &ParamDef) -> bool {
    // Platform-typed external pointers are remappable state; an untyped
    // void* member (extension chain, user data, byte blob) is not.
    api.is_handle(&m.base_type)
        || (m.is_pointer
            && api.is_external_object(&m.base_type)
            && m.platform_full_type.is_some())
        || with_handles.contains(&m.base_type)
}
