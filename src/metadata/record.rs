//! Descriptive records joined onto search candidates.
//!
//! The shape follows the relational layout of the catalog:
//! `product_images -> product_variants -> products -> brands`. Every
//! nested level is optional because the foreign keys are nullable.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Primary key of a catalog row. Tables use either integer or text keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    Int(i64),
    Text(String),
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityId::Int(id) => write!(f, "{id}"),
            EntityId::Text(id) => f.write_str(id),
        }
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        EntityId::Text(id.to_string())
    }
}

impl From<i64> for EntityId {
    fn from(id: i64) -> Self {
        EntityId::Int(id)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Brand {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "brands")]
    pub brand: Option<Brand>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    #[serde(default)]
    pub id: Option<EntityId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub model_number: Option<String>,
    #[serde(default, rename = "products")]
    pub product: Option<Product>,
}

/// One `product_images` row with its embedded parents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: EntityId,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default, rename = "product_variants")]
    pub variant: Option<Variant>,
}

impl MetadataRecord {
    pub fn new(id: impl Into<EntityId>) -> Self {
        Self {
            id: id.into(),
            image_url: None,
            variant: None,
        }
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = Some(url.into());
        self
    }

    pub fn with_variant(mut self, variant: Variant) -> Self {
        self.variant = Some(variant);
        self
    }

    /// The key candidates are joined on.
    pub fn key(&self) -> String {
        self.id.to_string()
    }

    pub fn product(&self) -> Option<&Product> {
        self.variant.as_ref()?.product.as_ref()
    }

    pub fn brand(&self) -> Option<&Brand> {
        self.product()?.brand.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_embedded_row() {
        let json = r#"{
            "id": "img-1",
            "image_url": "https://cdn/x.jpg",
            "product_variants": {
                "id": 12,
                "name": "Black / 42",
                "model_number": "AB-42",
                "products": {"id": 3, "name": "Runner", "brands": {"id": 9, "name": "Acme"}}
            }
        }"#;
        let record: MetadataRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.key(), "img-1");
        assert_eq!(record.variant.as_ref().unwrap().id, Some(EntityId::Int(12)));
        assert_eq!(record.product().unwrap().name.as_deref(), Some("Runner"));
        assert_eq!(record.brand().unwrap().name.as_deref(), Some("Acme"));
    }

    #[test]
    fn test_parse_missing_parents() {
        let record: MetadataRecord =
            serde_json::from_str(r#"{"id": 5, "product_variants": null}"#).unwrap();
        assert_eq!(record.key(), "5");
        assert!(record.image_url.is_none());
        assert!(record.product().is_none());
        assert!(record.brand().is_none());
    }
}
