// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Encoding Strategies
//!
//! An [`Encoding`] turns a payload type into a message body and back, and tags
//! the body with a content type. Producers and consumers of a queue agree on
//! the encoding by convention; nothing is negotiated at runtime.
//!
//! Two strategies are provided:
//! - [`Cbor`]: strict binary. Malformed or trailing input is always an error,
//!   and by default a body that fails to decode is dead-lettered.
//! - [`Json`]: lenient text. Unknown fields are ignored so producers can add
//!   fields without breaking older consumers, and by default a body that fails
//!   to decode is dropped.

use crate::{ack::AckDecision, configs::DEFAULT_PREFETCH, errors::EncodingError};
use serde::{de::DeserializeOwned, Serialize};

pub const CBOR_CONTENT_TYPE: &str = "application/cbor";
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// What a subscription does with a delivery whose body cannot be decoded.
///
/// The handler is never invoked for such a delivery. Requeueing is not an
/// option: a body that cannot be decoded now will not decode on redelivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFailurePolicy {
    /// Reject without requeue, so the body lands on the dead-letter exchange.
    DeadLetter,
    /// Acknowledge and forget the body.
    Drop,
}

impl DecodeFailurePolicy {
    /// Acknowledgment decision carried out for an undecodable delivery.
    pub fn decision(self) -> AckDecision {
        match self {
            DecodeFailurePolicy::DeadLetter => AckDecision::RejectDiscard,
            DecodeFailurePolicy::Drop => AckDecision::Accept,
        }
    }
}

/// A serialization strategy for message payloads.
pub trait Encoding: Send + Sync + 'static {
    /// Content type attached to every published body.
    fn content_type(&self) -> &'static str;

    /// Prefetch window used by subscriptions that don't set one. Zero means
    /// unbounded.
    fn default_prefetch(&self) -> u16;

    /// Decode failure handling used by subscriptions that don't set one.
    fn decode_failure_policy(&self) -> DecodeFailurePolicy;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodingError>;

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, EncodingError>;
}

/// Strict binary encoding backed by CBOR.
#[derive(Debug, Clone, Copy, Default)]
pub struct Cbor;

impl Encoding for Cbor {
    fn content_type(&self) -> &'static str {
        CBOR_CONTENT_TYPE
    }

    fn default_prefetch(&self) -> u16 {
        DEFAULT_PREFETCH
    }

    fn decode_failure_policy(&self) -> DecodeFailurePolicy {
        DecodeFailurePolicy::DeadLetter
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodingError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(value, &mut bytes)
            .map_err(|e| EncodingError::Encode(e.to_string()))?;
        Ok(bytes)
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, EncodingError> {
        let mut reader = data;
        let value = ciborium::from_reader(&mut reader)
            .map_err(|e| EncodingError::Decode(e.to_string()))?;

        if !reader.is_empty() {
            return Err(EncodingError::Decode(format!(
                "{} trailing bytes after payload",
                reader.len()
            )));
        }

        Ok(value)
    }
}

/// Lenient, human-inspectable encoding backed by JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct Json;

impl Encoding for Json {
    fn content_type(&self) -> &'static str {
        JSON_CONTENT_TYPE
    }

    fn default_prefetch(&self) -> u16 {
        0
    }

    fn decode_failure_policy(&self) -> DecodeFailurePolicy {
        DecodeFailurePolicy::Drop
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, EncodingError> {
        serde_json::to_vec(value).map_err(|e| EncodingError::Encode(e.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, EncodingError> {
        serde_json::from_slice(data).map_err(|e| EncodingError::Decode(e.to_string()))
    }
}
