use serde::{Deserialize, Serialize};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::{ParamSpec, TaskDescriptor, error::ModelResult, task::check_key_part};

/// Partial update of a stored descriptor. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct DescriptorPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters: Option<Vec<ParamSpec>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue: Option<String>,
}

impl DescriptorPatch {
    pub fn is_empty(&self) -> bool {
        self.description.is_none()
            && self.parameters.is_none()
            && self.return_type.is_none()
            && self.category.is_none()
            && self.queue.is_none()
    }

    pub fn validate(&self) -> ModelResult<()> {
        if let Some(category) = &self.category {
            check_key_part("category", category)?;
        }
        if let Some(queue) = &self.queue {
            check_key_part("queue", queue)?;
        }
        Ok(())
    }

    /// Apply the patch to a descriptor in place.
    pub fn apply_to(&self, d: &mut TaskDescriptor) {
        if let Some(v) = &self.description {
            d.description = v.clone();
        }
        if let Some(v) = &self.parameters {
            d.parameters = v.clone();
        }
        if let Some(v) = &self.return_type {
            d.return_type = v.clone();
        }
        if let Some(v) = &self.category {
            d.category = v.clone();
        }
        if let Some(v) = &self.queue {
            d.queue = v.clone();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apply_only_touches_present_fields() {
        let mut d = TaskDescriptor::new("t")
            .with_description("old")
            .with_category("media");
        let patch = DescriptorPatch {
            queue: Some("images".into()),
            ..Default::default()
        };

        patch.apply_to(&mut d);

        assert_eq!(d.description, "old");
        assert_eq!(d.category, "media");
        assert_eq!(d.queue, "images");
    }

    #[test]
    fn empty_patch_is_detected() {
        assert!(DescriptorPatch::default().is_empty());
        let p: DescriptorPatch = serde_json::from_str(r#"{"description":"x"}"#).unwrap();
        assert!(!p.is_empty());
    }

    #[test]
    fn validate_rejects_blank_category() {
        let p = DescriptorPatch {
            category: Some(String::new()),
            ..Default::default()
        };
        assert!(p.validate().is_err());
    }
}
