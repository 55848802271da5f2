//! Per-kind flow metadata.
//!
//! Metadata is stored as an opaque JSON document next to each flow and is only
//! read back to render a human-readable description. Every field defaults so a
//! partial document still describes something sensible.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::FlowKind;

/// Longest cheer/subscription message kept with a flow, in bytes.
pub const MAX_STORED_MESSAGE_LEN: usize = 128;

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ManualCreditMetadata {
    pub note: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheerMetadata {
    pub message: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubscriptionMetadata {
    pub message: String,
    pub is_initial: bool,
    pub is_gift: bool,
    pub credit_multiplier: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GiftSubMetadata {
    pub num_subscriptions: i64,
    pub credit_multiplier: f64,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertRedemptionMetadata {
    #[serde(rename = "type")]
    pub alert_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Renders the description shown in history and notifications.
pub fn describe(kind: FlowKind, metadata: &Value) -> String {
    match kind {
        FlowKind::ManualCredit => match parse::<ManualCreditMetadata>(metadata) {
            Some(md) => format!("Manual credit: {}", md.note),
            None => "Manual credit".to_string(),
        },
        FlowKind::AlertRedemption => match parse::<AlertRedemptionMetadata>(metadata) {
            Some(md) => format!("Redeemed alert of type '{}'", md.alert_type),
            None => "Redeemed alert".to_string(),
        },
        FlowKind::Cheer => {
            let mut s = "Thank you for cheering".to_string();
            if let Some(md) = parse::<CheerMetadata>(metadata)
                && !md.message.is_empty()
            {
                s.push_str(&format!(" with the message '{}'", md.message));
            }
            s.push('!');
            s
        }
        FlowKind::Subscription => {
            let Some(md) = parse::<SubscriptionMetadata>(metadata) else {
                return "Thank you for being a subscriber!".to_string();
            };
            let mut s = if md.is_gift {
                "You received a gift sub".to_string()
            } else if md.is_initial {
                "Thank you for becoming a subscriber".to_string()
            } else {
                "Thank you for renewing your subscription".to_string()
            };
            push_multiplier(&mut s, md.credit_multiplier);
            if !md.message.is_empty() {
                s.push_str(&format!(" with the message '{}'", md.message));
            }
            s.push('!');
            s
        }
        FlowKind::GiftSub => {
            let Some(md) = parse::<GiftSubMetadata>(metadata) else {
                return "Thank you for gifting subs!".to_string();
            };
            let mut s = if md.num_subscriptions == 1 {
                "Thank you for gifting a sub".to_string()
            } else {
                format!("Thank you for gifting {} subs", md.num_subscriptions)
            };
            push_multiplier(&mut s, md.credit_multiplier);
            s.push('!');
            s
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(metadata: &Value) -> Option<T> {
    if !metadata.is_object() {
        return None;
    }
    serde_json::from_value(metadata.clone()).ok()
}

fn push_multiplier(s: &mut String, credit_multiplier: f64) {
    if credit_multiplier > 1.001 {
        s.push_str(&format!(" (at a tier with {credit_multiplier:.0}x credit)"));
    }
}

/// Truncates a message to [`MAX_STORED_MESSAGE_LEN`] bytes without splitting a
/// character.
pub(crate) fn truncate_message(message: &str) -> String {
    if message.len() <= MAX_STORED_MESSAGE_LEN {
        return message.to_string();
    }
    let mut end = MAX_STORED_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
