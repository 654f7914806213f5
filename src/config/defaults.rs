//! Default values for configuration

/// Default Qdrant gRPC URL for local development (port 6334, not 6333 REST)
pub fn default_qdrant_url() -> String {
    std::env::var("QDRANT_URL").unwrap_or_else(|_| "http://127.0.0.1:6334".to_string())
}

/// Default environment variable name for Qdrant API key
pub fn default_qdrant_api_key_env() -> String {
    "".to_string()
}

/// Default collection name
pub fn default_collection_name() -> String {
    "docent_fragments".to_string()
}

/// Default embedding endpoint (OpenAI-compatible)
pub fn default_embedding_endpoint() -> String {
    std::env::var("DOCENT_EMBEDDING_ENDPOINT")
        .unwrap_or_else(|_| "https://api.openai.com/v1/embeddings".to_string())
}

/// Default embedding model
pub fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

/// Default embedding dimension (text-embedding-3-small)
pub fn default_embedding_dimension() -> usize {
    1536
}

/// Default batch size for embedding
pub fn default_embedding_batch_size() -> usize {
    32
}

/// Default environment variable name for the embedding API key
pub fn default_embedding_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

/// Default request timeout for external calls in seconds
pub fn default_request_timeout() -> u64 {
    30
}

/// Default retry count for external calls
pub fn default_request_retries() -> usize {
    2
}

/// Default maximum tokens per fragment
pub fn default_fragment_max_tokens() -> usize {
    250
}

/// Default number of matches fetched per search
pub fn default_search_top_k() -> usize {
    15
}

/// Default minimum similarity score for a match
pub fn default_search_min_score() -> f32 {
    0.4
}

/// Default relaxed score used when too few matches clear the minimum
pub fn default_search_fallback_score() -> f32 {
    0.3
}

/// Default match count below which the relaxed score applies
pub fn default_search_min_results() -> usize {
    5
}

/// Default Drive API base URL
pub fn default_drive_base_url() -> String {
    "https://www.googleapis.com/drive/v3/files".to_string()
}

/// Default environment variable name for the Drive access token
pub fn default_drive_token_env() -> String {
    "DRIVE_ACCESS_TOKEN".to_string()
}

/// Default tracking blob name
pub fn default_tracking_blob() -> String {
    "documentTracking.json".to_string()
}

/// Default vector registry blob name
pub fn default_registry_blob() -> String {
    "vectorRegistry.json".to_string()
}
