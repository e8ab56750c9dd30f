use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provider {
    pub id: i64,
    pub name: String,
    pub owner_id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderService {
    pub id: i64,
    pub provider_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub duration_minutes: i32,
}
