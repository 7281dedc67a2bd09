use serde::{Deserialize, Serialize};

/// Body of a `PUBLIC_KEY` envelope. Cleartext.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKeyBody {
    pub public_key: String,
}

/// Body of an `ADVERTISEMENT` envelope. Encrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvertisementBody {
    pub group: String,
    pub token: String,
}

/// Body of a `CONVERSATION` envelope. Encrypted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationBody {
    pub sender: (String, u16),
    pub content: String,
    pub timestamp: f64,
    pub group: String,
    pub group_token: String,
}
