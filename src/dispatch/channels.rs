use tracing::{info, warn};

use crate::error::{AppError, Result};
use crate::types::{PriceAlert, User};

/// A notification channel to attempt delivery on. Channel order is
/// user's declared primary → email → messaging-channel → webhook, skipping
/// any whose credentials/address are absent (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Email,
    Messaging,
    Webhook,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Messaging => "messaging",
            Channel::Webhook => "webhook",
        }
    }
}

/// Builds the ordered, availability-filtered channel list for a user.
/// "Primary" is simply email-first here since the data model carries no
/// separate primary-channel preference field; email is always attempted
/// first when present, per the declared fallback order.
pub fn ordered_channels(user: &User) -> Vec<Channel> {
    let mut channels = Vec::new();
    if !user.email.is_empty() {
        channels.push(Channel::Email);
    }
    if user.messaging_channel_address.is_some() {
        channels.push(Channel::Messaging);
    }
    if user.webhook_url.is_some() {
        channels.push(Channel::Webhook);
    }
    channels
}

/// Transport stub: the outbound notification transport (SMTP/webhook
/// specifics) is out of scope; this models only the policy-visible
/// success/failure outcome (§1 Out of scope).
pub async fn deliver(channel: Channel, user: &User, alert: &PriceAlert) -> Result<()> {
    match channel {
        Channel::Email => {
            info!(email = %user.email, alert_id = %alert.id, "dispatched alert via email");
            Ok(())
        }
        Channel::Messaging => match &user.messaging_channel_address {
            Some(addr) => {
                info!(address = %addr, alert_id = %alert.id, "dispatched alert via messaging channel");
                Ok(())
            }
            None => Err(AppError::DispatchChannelFailed("no messaging address".into())),
        },
        Channel::Webhook => match &user.webhook_url {
            Some(url) => {
                info!(url = %url, alert_id = %alert.id, "dispatched alert via webhook");
                Ok(())
            }
            None => Err(AppError::DispatchChannelFailed("no webhook url".into())),
        },
    }
}

pub fn log_permanent_failure(alert: &PriceAlert) {
    warn!(alert_id = %alert.id, "alert exhausted all channels, marking FAILED");
}
