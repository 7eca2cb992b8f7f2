use serde::{Deserialize, Serialize};

// POST /register body; `url` stays optional so a missing field is a 400 we
// produce ourselves instead of a deserializer rejection
#[derive(Deserialize, Serialize, Clone, Debug, Default)]
pub struct RegisterRequest {
    #[serde(default)]
    pub url: Option<String>,
}

// POST /register response
#[derive(Deserialize, Serialize, Clone, Debug)]
pub struct RegisterResponse {
    pub id: String,
}

// GET /redirect?url=
#[derive(Deserialize, Clone, Debug, Default)]
pub struct RedirectQuery {
    #[serde(default)]
    pub url: Option<String>,
}
