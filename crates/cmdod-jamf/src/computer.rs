//! Computer records from the Jamf Classic API

use serde::{Deserialize, Serialize};

/// A named extension attribute on a computer record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionAttribute {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

/// Identity fields of a computer record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct General {
    /// Jamf's internal numeric id, used to address commands
    pub id: i64,
    pub udid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub serial_number: String,
}

/// A computer record as returned by `GET /JSSResource/computers/udid/{udid}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Computer {
    pub general: General,
    #[serde(default)]
    pub extension_attributes: Vec<ExtensionAttribute>,
}

impl Computer {
    /// Value of the first extension attribute called `name`
    pub fn extension_attribute(&self, name: &str) -> Option<&str> {
        self.extension_attributes
            .iter()
            .find(|ea| ea.name == name)
            .map(|ea| ea.value.as_str())
    }
}

/// Wrapper object the Classic API puts around a record
#[derive(Debug, Deserialize)]
pub(crate) struct ComputerEnvelope {
    pub computer: Computer,
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECORD: &str = r#"{
        "computer": {
            "general": {
                "id": 42,
                "name": "Studio-Mac",
                "udid": "5E6C8F2A-1B3D-4C5E-9F70-A1B2C3D4E5F6",
                "serial_number": "C02XYZ",
                "platform": "Mac"
            },
            "extension_attributes": [
                {"id": 1, "name": "Department", "type": "String", "value": "Design"},
                {"id": 7, "name": "Wipe Code", "type": "String", "value": "abc123"}
            ]
        }
    }"#;

    #[test]
    fn test_decode_classic_record() {
        let envelope: ComputerEnvelope = serde_json::from_str(RECORD).unwrap();
        let computer = envelope.computer;
        assert_eq!(computer.general.id, 42);
        assert_eq!(computer.general.serial_number, "C02XYZ");
        assert_eq!(computer.extension_attribute("Wipe Code"), Some("abc123"));
        assert_eq!(computer.extension_attribute("Missing"), None);
    }

    #[test]
    fn test_record_without_attributes() {
        let computer: Computer = serde_json::from_str(
            r#"{"general": {"id": 3, "udid": "X"}}"#,
        )
        .unwrap();
        assert!(computer.extension_attributes.is_empty());
        assert_eq!(computer.extension_attribute("Wipe Code"), None);
    }
}
