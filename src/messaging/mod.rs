mod source;
mod kafka;

pub use source::{MessageSource, RawMessage, SourceError};
pub use kafka::KafkaMessageSource;
