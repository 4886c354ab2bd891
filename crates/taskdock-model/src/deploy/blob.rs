use std::{collections::BTreeMap, fmt, str::FromStr};

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize, Serializer};

#[cfg(feature = "schema")]
use schemars::JsonSchema;

use crate::error::{ModelError, ModelResult};

/// Relative path → file content of one deployment.
pub type Manifest = BTreeMap<String, FileBlob>;

/// How a blob's `content` string is to be read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub enum FileKind {
    /// UTF-8 text, written as is.
    #[default]
    Text,
    /// Base64 encoded bytes.
    Binary,
}

impl FromStr for FileKind {
    type Err = ModelError;
    fn from_str(s: &str) -> ModelResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(FileKind::Text),
            "binary" => Ok(FileKind::Binary),
            other => Err(ModelError::UnknownFileKind(other.to_string())),
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileKind::Text => "text",
            FileKind::Binary => "binary",
        })
    }
}

impl Serialize for FileKind {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FileKind {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::from_str(&s).map_err(serde::de::Error::custom)
    }
}

/// Content of one file in a deployment manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "schema", derive(JsonSchema))]
pub struct FileBlob {
    pub content: String,
    #[serde(rename = "type", default)]
    pub kind: FileKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    /// Decoded size in bytes as reported by the producer.
    #[serde(default)]
    pub size: u64,
}

impl FileBlob {
    pub fn text(content: impl Into<String>) -> Self {
        let content = content.into();
        Self {
            size: content.len() as u64,
            content,
            kind: FileKind::Text,
            encoding: Some("utf-8".to_string()),
        }
    }

    pub fn binary(bytes: &[u8]) -> Self {
        Self {
            content: STANDARD.encode(bytes),
            kind: FileKind::Binary,
            encoding: Some("base64".to_string()),
            size: bytes.len() as u64,
        }
    }

    /// Text when `bytes` is valid UTF-8, binary otherwise.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => Self::text(text),
            Err(e) => Self::binary(e.as_bytes()),
        }
    }

    /// Bytes to write to disk. `path` only labels errors.
    pub fn decode(&self, path: &str) -> ModelResult<Vec<u8>> {
        match self.kind {
            FileKind::Text => Ok(self.content.as_bytes().to_vec()),
            FileKind::Binary => {
                match self.encoding.as_deref().map(str::to_ascii_lowercase).as_deref() {
                    None | Some("base64") => {}
                    Some(other) => {
                        return Err(ModelError::InvalidContent {
                            path: path.to_string(),
                            reason: format!("unsupported binary encoding '{other}'"),
                        });
                    }
                }
                STANDARD
                    .decode(self.content.trim())
                    .map_err(|e| ModelError::InvalidContent {
                        path: path.to_string(),
                        reason: format!("invalid base64: {e}"),
                    })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_decodes_base64() {
        let blob = FileBlob::binary(&[0xff, 0x00, 0x10]);
        assert_eq!(blob.size, 3);
        assert_eq!(blob.decode("logo.png").unwrap(), vec![0xff, 0x00, 0x10]);
    }

    #[test]
    fn text_is_written_verbatim() {
        let blob = FileBlob::text("print('hi')\n");
        assert_eq!(blob.decode("app.py").unwrap(), b"print('hi')\n".to_vec());
    }

    #[test]
    fn invalid_base64_names_the_path() {
        let blob = FileBlob {
            content: "***".into(),
            kind: FileKind::Binary,
            encoding: Some("base64".into()),
            size: 0,
        };
        match blob.decode("assets/model.bin") {
            Err(ModelError::InvalidContent { path, .. }) => assert_eq!(path, "assets/model.bin"),
            other => panic!("expected InvalidContent, got {other:?}"),
        }
    }

    #[test]
    fn unknown_binary_encoding_is_rejected() {
        let mut blob = FileBlob::binary(b"abc");
        blob.encoding = Some("hex".into());
        assert!(blob.decode("x").is_err());
    }

    #[test]
    fn from_bytes_picks_kind() {
        assert_eq!(FileBlob::from_bytes(b"hello".to_vec()).kind, FileKind::Text);
        assert_eq!(
            FileBlob::from_bytes(vec![0xc3, 0x28]).kind,
            FileKind::Binary
        );
    }

    #[test]
    fn wire_shape_uses_type_field() {
        let json = r#"{"content":"aGk=","type":"binary","encoding":"base64","size":2}"#;
        let blob: FileBlob = serde_json::from_str(json).unwrap();
        assert_eq!(blob.kind, FileKind::Binary);
        assert_eq!(blob.decode("f").unwrap(), b"hi".to_vec());

        let minimal: FileBlob = serde_json::from_str(r#"{"content":"x"}"#).unwrap();
        assert_eq!(minimal.kind, FileKind::Text);
    }
}
