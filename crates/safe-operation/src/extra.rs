use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use uuid::Uuid;

use crate::error::OperationError;

/// Wrap a memo for delivery to the app `app_id` on Mixin.
pub fn encode_mixin_extra(app_id: &str, memo: &str) -> Result<String, OperationError> {
    let app = Uuid::parse_str(app_id).map_err(|_| OperationError::InvalidUuid(app_id.into()))?;
    let mut data = Vec::with_capacity(16 + memo.len());
    data.extend_from_slice(app.as_bytes());
    data.extend_from_slice(memo.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(data))
}
