use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account held by the credential store collaborator. The core never
/// reads `password`; it only sees the store's verify result.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserAccount {
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub role: String,
    pub created_at: DateTime<Utc>,
}
