use crate::error::RelayError;
use crate::metrics::gather_text;

pub async fn metrics_handler() -> Result<String, RelayError> {
    gather_text().map_err(|e| RelayError::Internal(format!("metrics encoding: {e}")))
}
