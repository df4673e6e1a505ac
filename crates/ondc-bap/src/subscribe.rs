//! Registry onboarding: the `/on_subscribe` callback reply, the
//! `/subscribe` request body, and the lookup signing string.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::challenge::ChallengeCrypto;
use crate::config::OndcConfig;
use crate::environment::Environment;
use crate::error::{OndcError, Result};
use crate::time::to_ondc_timestamp;

// ── on_subscribe ──────────────────────────────────────────────────────────────

/// Reply to a registry `/on_subscribe` callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OnSubscribeResponse {
    /// The decrypted challenge, echoed back to prove key ownership.
    Answer { answer: String },
    Ack {
        status: String,
        message: String,
        timestamp: String,
    },
}

impl OnSubscribeResponse {
    fn ack(message: &str, now: DateTime<Utc>) -> Self {
        OnSubscribeResponse::Ack {
            status: "ACK".to_string(),
            message: message.to_string(),
            timestamp: to_ondc_timestamp(now),
        }
    }
}

/// Build the reply to an `/on_subscribe` body.
///
/// - `{subscriber_id, challenge}`: decrypt the challenge with the key
///   shared with `env`'s registry and answer with the plaintext.
/// - `{status, ..}`: acknowledge the status update.
/// - anything else: acknowledge receipt.
///
/// A challenge that cannot be decrypted is an error; no answer is
/// invented, so the registry sees the failure.
pub fn respond_on_subscribe(
    crypto: &ChallengeCrypto,
    env: Environment,
    body: &Value,
) -> Result<OnSubscribeResponse> {
    respond_on_subscribe_at(crypto, env, body, Utc::now())
}

/// [`respond_on_subscribe`] with an explicit clock.
pub fn respond_on_subscribe_at(
    crypto: &ChallengeCrypto,
    env: Environment,
    body: &Value,
    now: DateTime<Utc>,
) -> Result<OnSubscribeResponse> {
    let Some(obj) = body.as_object() else {
        return Err(OndcError::MalformedInput(
            "on_subscribe body must be a JSON object".into(),
        ));
    };

    if let Some(challenge) = obj.get("challenge") {
        let challenge = challenge
            .as_str()
            .ok_or_else(|| OndcError::MalformedInput("challenge must be a string".into()))?;
        let subscriber_id = obj
            .get("subscriber_id")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                OndcError::MalformedInput("challenge received without subscriber_id".into())
            })?;

        log::info!("processing ONDC challenge for subscriber {subscriber_id} ({env})");
        if let Some(ours) = crypto.subscriber_id() {
            if ours != subscriber_id {
                log::warn!("challenge addressed to {subscriber_id}, configured as {ours}");
            }
        }

        let answer = crypto.decrypt_challenge(challenge, env)?;
        return Ok(OnSubscribeResponse::Answer { answer });
    }

    if let Some(status) = obj.get("status") {
        log::info!("subscription status update: {status}");
        return Ok(OnSubscribeResponse::ack("Status update received", now));
    }

    log::warn!("unrecognised subscription callback: {body}");
    Ok(OnSubscribeResponse::ack("Callback received", now))
}

// ── subscribe ─────────────────────────────────────────────────────────────────

/// Registry operation codes for `/subscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// 1: buyer app, new entity.
    BuyerApp,
    /// 2: seller app, new entity.
    SellerApp,
    /// 4: buyer and seller app.
    BuyerAndSellerApp,
}

impl Operation {
    pub fn ops_no(&self) -> u8 {
        match self {
            Operation::BuyerApp => 1,
            Operation::SellerApp => 2,
            Operation::BuyerAndSellerApp => 4,
        }
    }

    fn participant_types(&self) -> &'static [&'static str] {
        match self {
            Operation::BuyerApp => &["buyerApp"],
            Operation::SellerApp => &["sellerApp"],
            Operation::BuyerAndSellerApp => &["buyerApp", "sellerApp"],
        }
    }
}

impl TryFrom<u8> for Operation {
    type Error = OndcError;

    fn try_from(ops_no: u8) -> Result<Self> {
        match ops_no {
            1 => Ok(Operation::BuyerApp),
            2 => Ok(Operation::SellerApp),
            4 => Ok(Operation::BuyerAndSellerApp),
            n => Err(OndcError::MalformedInput(format!(
                "invalid ops_no {n}; use 1 (buyer), 2 (seller) or 4 (both)"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribePayload {
    pub context: SubscribeContext,
    pub message: SubscribeMessage,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeContext {
    pub operation: OperationCode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationCode {
    pub ops_no: u8,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscribeMessage {
    pub request_id: String,
    pub timestamp: String,
    pub entity: Entity,
    pub network_participant: Vec<NetworkParticipant>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub gst: Gst,
    pub pan: Pan,
    pub name_of_authorised_signatory: String,
    pub address_of_authorised_signatory: String,
    pub email_id: String,
    pub mobile_no: u64,
    pub country: String,
    pub subscriber_id: String,
    pub callback_url: String,
    pub unique_key_id: String,
    pub key_pair: KeyPairInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gst {
    pub legal_entity_name: String,
    pub business_address: String,
    pub city_code: Vec<String>,
    pub gst_no: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pan {
    pub name_as_per_pan: String,
    pub pan_no: String,
    pub date_of_incorporation: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPairInfo {
    pub signing_public_key: String,
    pub encryption_public_key: String,
    pub valid_from: String,
    pub valid_until: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkParticipant {
    pub subscriber_url: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub participant_type: String,
    pub msn: bool,
    pub city_code: Vec<String>,
}

impl SubscribePayload {
    /// Build the `/subscribe` body from configuration and loaded keys.
    ///
    /// # Errors
    ///
    /// `Unavailable` when the public keys, unique key id or request id
    /// are missing from the credentials.
    pub fn build(
        config: &OndcConfig,
        crypto: &ChallengeCrypto,
        operation: Operation,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        let need = |value: Option<&str>, what: &str| {
            value.map(str::to_string).ok_or_else(|| {
                OndcError::Unavailable(format!("{what} missing; generate keys first"))
            })
        };
        let signing_public_key = need(crypto.signing_public_key(), "signing public key")?;
        let encryption_public_key = need(crypto.encryption_public_key(), "encryption public key")?;
        let unique_key_id = need(crypto.unique_key_id(), "unique key id")?;
        let request_id = need(crypto.request_id(), "request id")?;

        let timestamp = to_ondc_timestamp(now);
        let valid_until =
            to_ondc_timestamp(now + Duration::days(i64::from(config.key_validity_days)));
        let entity_cfg = &config.entity;

        let network_participant = operation
            .participant_types()
            .iter()
            .map(|kind| NetworkParticipant {
                subscriber_url: "/".to_string(),
                domain: config.domain.clone(),
                participant_type: (*kind).to_string(),
                msn: false,
                city_code: config.city_codes.clone(),
            })
            .collect();

        Ok(SubscribePayload {
            context: SubscribeContext {
                operation: OperationCode {
                    ops_no: operation.ops_no(),
                },
            },
            message: SubscribeMessage {
                request_id,
                timestamp: timestamp.clone(),
                entity: Entity {
                    gst: Gst {
                        legal_entity_name: entity_cfg.legal_entity_name.clone(),
                        business_address: entity_cfg.business_address.clone(),
                        city_code: config.city_codes.clone(),
                        gst_no: entity_cfg.gst_no.clone(),
                    },
                    pan: Pan {
                        name_as_per_pan: entity_cfg.name_as_per_pan.clone(),
                        pan_no: entity_cfg.pan_no.clone(),
                        date_of_incorporation: entity_cfg.date_of_incorporation.clone(),
                    },
                    name_of_authorised_signatory: entity_cfg.name_of_authorised_signatory.clone(),
                    address_of_authorised_signatory: entity_cfg
                        .address_of_authorised_signatory
                        .clone(),
                    email_id: entity_cfg.email_id.clone(),
                    mobile_no: entity_cfg.mobile_no,
                    country: config.country.clone(),
                    subscriber_id: config.subscriber_id.clone(),
                    callback_url: config.callback_url.clone(),
                    unique_key_id,
                    key_pair: KeyPairInfo {
                        signing_public_key,
                        encryption_public_key,
                        valid_from: timestamp,
                        valid_until,
                    },
                },
                network_participant,
            },
        })
    }
}

// ── lookup ────────────────────────────────────────────────────────────────────

/// Registry lookup parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LookupParameters {
    pub country: String,
    pub domain: String,
    #[serde(rename = "type")]
    pub participant_type: String,
    pub city: String,
    pub subscriber_id: String,
}

/// The string signed in a registry lookup request:
/// `country|domain|type|city|subscriber_id`.
pub fn lookup_signing_string(params: &LookupParameters) -> String {
    format!(
        "{}|{}|{}|{}|{}",
        params.country, params.domain, params.participant_type, params.city, params.subscriber_id
    )
}
