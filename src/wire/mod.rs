//! Wire framing: the fixed 256-byte header plus key/nonce/body regions
//! framing, and the JSON body payloads carried inside it.

pub mod body;
pub mod envelope;
pub mod header;

pub use body::{AdvertisementBody, ConversationBody, PublicKeyBody};
pub use envelope::RawEnvelope;
pub use header::{Header, MessageId, MessageType, HEADER_LEN};
