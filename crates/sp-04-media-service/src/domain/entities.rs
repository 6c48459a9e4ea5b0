//! Upload input.

use shared_types::entities::UserId;
use shared_types::errors::ValidationError;

/// A file received from a user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    pub user_id: UserId,
    pub original_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl UploadRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.bytes.is_empty() {
            return Err(ValidationError::Empty { field: "file" });
        }
        if self.original_name.trim().is_empty() {
            return Err(ValidationError::Empty {
                field: "originalName",
            });
        }
        if self.mime_type.trim().is_empty() {
            return Err(ValidationError::Empty { field: "mimeType" });
        }
        Ok(())
    }
}
