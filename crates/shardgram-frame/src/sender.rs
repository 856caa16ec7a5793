use shardgram_transport::DatagramChannel;
use tracing::{debug, trace};

use crate::config::FragmentConfig;
use crate::error::{Result, SendError};
use crate::fragmenter::Fragmenter;

/// Sends whole messages as fragment datagrams over a [`DatagramChannel`].
#[derive(Debug)]
pub struct FragmentSender<C> {
    channel: C,
    fragmenter: Fragmenter,
}

impl<C: DatagramChannel> FragmentSender<C> {
    /// Create a sender over `channel`.
    pub fn new(channel: C, config: FragmentConfig) -> Result<Self> {
        Ok(Self {
            channel,
            fragmenter: Fragmenter::new(config)?,
        })
    }

    /// Create a sender around an existing fragmenter.
    pub fn with_fragmenter(channel: C, fragmenter: Fragmenter) -> Self {
        Self {
            channel,
            fragmenter,
        }
    }

    /// Fragment and transmit `payload`, returning its message id.
    ///
    /// Fragments go out in sequence order. The first transport failure aborts
    /// the message; fragments already sent are not recalled.
    pub fn send(&self, payload: &[u8]) -> std::result::Result<u64, SendError> {
        let fragments =
            self.fragmenter
                .fragments(payload)
                .map_err(|_| SendError::MessageTooLarge {
                    size: payload.len(),
                    max: self.fragmenter.max_message_size(),
                })?;
        let message_id = fragments.message_id();
        let total = fragments.total_fragments();

        for (sequence, datagram) in (0u16..).zip(fragments) {
            if let Err(source) = self.channel.send(&datagram) {
                debug!(message_id, sequence, total, error = %source, "fragment send failed");
                return Err(SendError::Partial {
                    sent: sequence,
                    total,
                    source,
                });
            }
            trace!(message_id, sequence, total, "fragment sent");
        }

        Ok(message_id)
    }

    pub fn fragmenter(&self) -> &Fragmenter {
        &self.fragmenter
    }

    /// Borrow the underlying channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Consume the sender and return the inner channel.
    pub fn into_inner(self) -> C {
        self.channel
    }
}
