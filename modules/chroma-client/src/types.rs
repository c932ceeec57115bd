use serde::{Deserialize, Serialize};

pub type Metadata = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Deserialize)]
pub struct Collection {
    pub id: String,
    pub name: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateCollectionRequest<'a> {
    pub name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<&'a Metadata>,
    pub get_or_create: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct AddRequest<'a> {
    pub ids: &'a [String],
    pub embeddings: &'a [Vec<f32>],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadatas: Option<&'a [Metadata]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub documents: Option<&'a [String]>,
}

#[derive(Debug, Default, Serialize)]
pub(crate) struct GetRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    pub include: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct UpdateRequest<'a> {
    pub ids: &'a [String],
    pub metadatas: &'a [Metadata],
}

#[derive(Debug, Serialize)]
pub(crate) struct DeleteRequest<'a> {
    pub ids: &'a [String],
}

#[derive(Debug, Serialize)]
pub(crate) struct QueryRequest<'a> {
    pub query_embeddings: &'a [Vec<f32>],
    pub n_results: usize,
    pub include: Vec<&'static str>,
}

/// Result of a `get`: parallel arrays, one entry per stored record.
#[derive(Debug, Default, Deserialize)]
pub struct GetResult {
    pub ids: Vec<String>,
    #[serde(default)]
    pub metadatas: Option<Vec<Option<Metadata>>>,
    #[serde(default)]
    pub documents: Option<Vec<Option<String>>>,
}

/// Result of a `query`: parallel arrays nested one level per query vector.
#[derive(Debug, Default, Deserialize)]
pub struct QueryResult {
    pub ids: Vec<Vec<String>>,
    #[serde(default)]
    pub distances: Option<Vec<Vec<f32>>>,
    #[serde(default)]
    pub metadatas: Option<Vec<Vec<Option<Metadata>>>>,
    #[serde(default)]
    pub documents: Option<Vec<Vec<Option<String>>>>,
}
