use serde::{Deserialize, Serialize};

/// A data object discovered while listing a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataObjectDescriptor {
    pub path: String,
    pub size: Option<u64>,
}

/// Direct children of one collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionListing {
    pub path: String,
    pub data_objects: Vec<DataObjectDescriptor>,
    pub sub_collections: Vec<String>,
}
