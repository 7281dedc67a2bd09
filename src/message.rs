/// A single conversation message as it sits in a group's ordered sequence
/// sequence.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sender: (String, u16),
    pub content: String,
    pub sent_at: f64,
    pub received_at: f64,
}

impl Message {
    /// A message originated locally: `sent_at == received_at`.
    pub fn originated(sender: (String, u16), content: String, now: f64) -> Self {
        Self {
            sender,
            content,
            sent_at: now,
            received_at: now,
        }
    }
}

/// Seconds since the Unix epoch, as an `f64` to match the wire's
/// `timestamp` field.
pub fn now_secs() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("system clock is before the Unix epoch")
        .as_secs_f64()
}
