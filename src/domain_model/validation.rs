use serde::{Deserialize, Serialize};

/// Topic names and the correlation header are fixed constants shared by
/// both halves of the existence-check protocol.
pub const USER_EXISTENCE_REQUEST_TOPIC: &str = "user-existence-request";
pub const USER_EXISTENCE_RESPONSE_TOPIC: &str = "user-existence-response";
pub const CORRELATION_HEADER: &str = "correlation_id";

/// Broker payload asking "do all of these user ids exist?".
///
/// The correlation id rides in the message headers as well; keeping it in
/// the body lets either side log a self-contained record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserValidationRequest {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "userIds")]
    pub user_ids: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserValidationResponse {
    #[serde(rename = "correlationId")]
    pub correlation_id: String,
    #[serde(rename = "allExist")]
    pub all_exist: bool,
    pub message: String,
}
