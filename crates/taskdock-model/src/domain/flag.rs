use serde::{Deserialize, Serialize};

/// Boolean that defaults to enabled when absent from serialized input.
///
/// Used for parameter `required` markers, which default to `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(schemars::JsonSchema))]
#[serde(transparent)]
pub struct Flag(bool);

impl Flag {
    pub const fn enabled() -> Self {
        Self(true)
    }

    pub const fn disabled() -> Self {
        Self(false)
    }

    pub const fn is_enabled(&self) -> bool {
        self.0
    }
}

impl Default for Flag {
    fn default() -> Self {
        Self::enabled()
    }
}

impl From<bool> for Flag {
    fn from(b: bool) -> Self {
        Self(b)
    }
}

impl From<Flag> for bool {
    fn from(f: Flag) -> Self {
        f.0
    }
}

#[cfg(test)]
mod tests {
    use super::Flag;

    #[test]
    fn default_is_enabled() {
        assert!(Flag::default().is_enabled());
    }

    #[test]
    fn serializes_as_bare_bool() {
        assert_eq!(serde_json::to_string(&Flag::disabled()).unwrap(), "false");
        let back: Flag = serde_json::from_str("true").unwrap();
        assert!(back.is_enabled());
    }
}
