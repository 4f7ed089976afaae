pub mod background;
pub mod message;
pub mod narrow;

pub use background::{BackgroundData, StreamInfo};
pub use message::{Message, MessageId, Recipient, StreamId, UserId};
pub use narrow::Narrow;
