//! Outbound delivery seam for coordinator notifications.

use crate::error::DeliveryError;
use crate::protocol::{Notification, Target};

/// Targeted, fire-and-forget delivery. Implementations report failures but the
/// coordinator never lets one interrupt a state transition.
pub trait Messenger {
    fn deliver(
        &mut self,
        target: Target,
        notification: &Notification,
    ) -> Result<(), DeliveryError>;
}
