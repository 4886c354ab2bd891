//! Mapping between [`TaskDescriptor`] and the flat string fields of its registry hash.
use std::collections::HashMap;

use taskdock_model::{
    DEFAULT_CATEGORY, DEFAULT_QUEUE, DEFAULT_RETURN_TYPE, DescriptorPatch, TaskDescriptor,
    Timestamp, decode_params, encode_params,
};
use tracing::debug;

pub const FIELD_NAME: &str = "name";
pub const FIELD_DESCRIPTION: &str = "description";
pub const FIELD_PARAMETERS: &str = "parameters";
pub const FIELD_RETURN_TYPE: &str = "return_type";
pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_QUEUE: &str = "queue";
pub const FIELD_CREATED_AT: &str = "created_at";
pub const FIELD_LAST_UPDATED: &str = "last_updated";

/// Every field except `created_at`, which the store sets only on first insert.
pub fn encode_descriptor(d: &TaskDescriptor, now: Timestamp) -> Vec<(String, String)> {
    vec![
        (FIELD_NAME.into(), d.name.clone()),
        (FIELD_DESCRIPTION.into(), d.description.clone()),
        (FIELD_PARAMETERS.into(), encode_params(&d.parameters)),
        (FIELD_RETURN_TYPE.into(), d.return_type.clone()),
        (FIELD_CATEGORY.into(), d.category.clone()),
        (FIELD_QUEUE.into(), d.queue.clone()),
        (FIELD_LAST_UPDATED.into(), now.to_rfc3339()),
    ]
}

/// Only the fields a patch carries, plus `last_updated`.
pub fn encode_patch(patch: &DescriptorPatch, now: Timestamp) -> Vec<(String, String)> {
    let mut out = Vec::with_capacity(6);
    if let Some(v) = &patch.description {
        out.push((FIELD_DESCRIPTION.into(), v.clone()));
    }
    if let Some(v) = &patch.parameters {
        out.push((FIELD_PARAMETERS.into(), encode_params(v)));
    }
    if let Some(v) = &patch.return_type {
        out.push((FIELD_RETURN_TYPE.into(), v.clone()));
    }
    if let Some(v) = &patch.category {
        out.push((FIELD_CATEGORY.into(), v.clone()));
    }
    if let Some(v) = &patch.queue {
        out.push((FIELD_QUEUE.into(), v.clone()));
    }
    out.push((FIELD_LAST_UPDATED.into(), now.to_rfc3339()));
    out
}

/// Rebuild a descriptor from hash fields. `None` for an empty (absent) hash.
///
/// Missing fields take the registry defaults; `key_name` stands in for a missing
/// `name` field. Unparseable timestamps are dropped.
pub fn decode_descriptor(key_name: &str, mut fields: HashMap<String, String>) -> Option<TaskDescriptor> {
    if fields.is_empty() {
        return None;
    }
    let mut take = |field: &str, default: &str| {
        fields
            .remove(field)
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| default.to_string())
    };

    let name = take(FIELD_NAME, key_name);
    let description = take(FIELD_DESCRIPTION, "");
    let parameters = decode_params(&take(FIELD_PARAMETERS, "[]"));
    let return_type = take(FIELD_RETURN_TYPE, DEFAULT_RETURN_TYPE);
    let category = take(FIELD_CATEGORY, DEFAULT_CATEGORY);
    let queue = take(FIELD_QUEUE, DEFAULT_QUEUE);
    let created_at = parse_ts(&name, FIELD_CREATED_AT, fields.remove(FIELD_CREATED_AT));
    let last_updated = parse_ts(&name, FIELD_LAST_UPDATED, fields.remove(FIELD_LAST_UPDATED));

    Some(TaskDescriptor {
        name,
        description,
        parameters,
        return_type,
        category,
        queue,
        created_at,
        last_updated,
    })
}

fn parse_ts(task: &str, field: &str, raw: Option<String>) -> Option<Timestamp> {
    let raw = raw?;
    match raw.parse() {
        Ok(ts) => Some(ts),
        Err(e) => {
            debug!(task, field, error = %e, "ignoring unparseable timestamp");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdock_model::ParamSpec;

    fn to_map(fields: Vec<(String, String)>) -> HashMap<String, String> {
        fields.into_iter().collect()
    }

    #[test]
    fn descriptor_fields_roundtrip() {
        let d = TaskDescriptor::new("resize_image")
            .with_description("Resize an image")
            .with_parameter(ParamSpec::new("path", "str"))
            .with_parameter(ParamSpec::new("width", "int").optional())
            .with_return_type("str")
            .with_category("media")
            .with_queue("images");
        let now = Timestamp::now();

        let back = decode_descriptor("resize_image", to_map(encode_descriptor(&d, now))).unwrap();

        assert_eq!(back.parameters, d.parameters);
        assert_eq!(back.category, "media");
        assert_eq!(back.queue, "images");
        assert_eq!(back.last_updated, Some(now));
        assert!(back.created_at.is_none());
    }

    #[test]
    fn sparse_hash_takes_defaults() {
        let mut fields = HashMap::new();
        fields.insert("description".to_string(), "legacy".to_string());
        fields.insert("created_at".to_string(), "2024-01-02T03:04:05.678901".to_string());

        let d = decode_descriptor("old_task", fields).unwrap();
        assert_eq!(d.name, "old_task");
        assert_eq!(d.return_type, "Any");
        assert_eq!(d.category, "general");
        assert_eq!(d.queue, "celery");
        assert!(d.created_at.is_some());
    }

    #[test]
    fn empty_hash_is_absent() {
        assert!(decode_descriptor("x", HashMap::new()).is_none());
    }

    #[test]
    fn bad_timestamp_is_dropped_not_fatal() {
        let mut fields = HashMap::new();
        fields.insert("name".to_string(), "t".to_string());
        fields.insert("last_updated".to_string(), "not a date".to_string());

        let d = decode_descriptor("t", fields).unwrap();
        assert!(d.last_updated.is_none());
    }

    #[test]
    fn patch_encodes_only_present_fields() {
        let patch = DescriptorPatch {
            parameters: Some(vec![ParamSpec::new("x", "int")]),
            ..Default::default()
        };
        let fields = encode_patch(&patch, Timestamp::now());
        let names: Vec<_> = fields.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(names, vec!["parameters", "last_updated"]);
    }
}
