// ============================================================================
// Event Envelope & Decoder
// ============================================================================
//
// Wire-level model of the orders channel. Payload types live with the
// order domain; this module owns the envelope, the discriminator table
// and the tagged-union decode.
//
// ============================================================================

mod envelope;
mod codec;

pub use envelope::{Envelope, EventType};
pub use codec::{decode, encode, DecodeError};
