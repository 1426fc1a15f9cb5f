use base58::ToBase58;
use careflow_common::prelude::*;
use uuid::Uuid;

/// Identifiers for tasks and jobs minted locally (in-memory broker, test doubles). Ids received
/// from the broker or a remote runner are used verbatim.
pub struct IdGenerator;

impl IdGenerator {
    pub fn generate() -> InlineStr {
        Uuid::new_v4().as_bytes().to_base58().into()
    }
}
