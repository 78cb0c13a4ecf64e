use super::types::DeliveryStatus;

/// State transition input for outgoing-message delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryEvent {
    Delivered,
    Read,
    Fail(String),
}

/// Rejection reason for illegal delivery transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryRejection {
    /// Read and failed messages never move again.
    AlreadyTerminal { current: DeliveryStatus },
    /// A message must be delivered before it can be read.
    NotYetDelivered,
    /// Delivery confirmations are not repeated.
    AlreadyDelivered,
}

pub type DeliveryTransitionResult = Result<DeliveryStatus, DeliveryRejection>;

impl DeliveryStatus {
    /// Applies one transition deterministically.
    ///
    /// The happy path is `Sending -> Delivered -> Read`. Any non-terminal state may fail.
    pub fn apply(&self, event: DeliveryEvent) -> DeliveryTransitionResult {
        match (self, event) {
            (Self::Read | Self::Failed(_), _) => Err(DeliveryRejection::AlreadyTerminal {
                current: self.clone(),
            }),
            (_, DeliveryEvent::Fail(reason)) => Ok(Self::Failed(reason)),
            (Self::Sending, DeliveryEvent::Delivered) => Ok(Self::Delivered),
            (Self::Sending, DeliveryEvent::Read) => Err(DeliveryRejection::NotYetDelivered),
            (Self::Delivered, DeliveryEvent::Delivered) => {
                Err(DeliveryRejection::AlreadyDelivered)
            }
            (Self::Delivered, DeliveryEvent::Read) => Ok(Self::Read),
        }
    }
}
