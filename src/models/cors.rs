//! CORS rule applied to the bucket so browsers can use presigned URLs directly.

/// Methods a browser may use against the bucket.
pub const ALLOWED_METHODS: [&str; 3] = ["GET", "PUT", "POST"];

/// Preflight cache lifetime advertised by the bucket.
pub const MAX_AGE_SECONDS: i32 = 3000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorsPolicy {
    pub allowed_origins: Vec<String>,
    pub allowed_methods: Vec<String>,
    pub allowed_headers: Vec<String>,
    pub max_age_seconds: i32,
}

impl CorsPolicy {
    /// The single rule the gateway installs: any header, `GET`/`PUT`/`POST`,
    /// from one configured origin.
    pub fn for_origin(origin: impl Into<String>) -> Self {
        Self {
            allowed_origins: vec![origin.into()],
            allowed_methods: ALLOWED_METHODS.iter().map(|m| m.to_string()).collect(),
            allowed_headers: vec!["*".into()],
            max_age_seconds: MAX_AGE_SECONDS,
        }
    }
}
