// Copyright (c) 2025, The Ruskit Authors
// MIT License
// All rights reserved.

//! # Message Codecs
//!
//! A codec turns values into message bodies and back, and names the content
//! type stamped on published messages. The content type is advisory: consumers
//! never check it before decoding.

use crate::errors::AmqpError;
use serde::{
    de::{
        value::{Error as ValueError, StrDeserializer},
        DeserializeOwned, IntoDeserializer,
    },
    Deserialize, Serialize,
};
use serde_json::Value;

/// Default content type for JSON messages
pub const JSON_CONTENT_TYPE: &str = "application/json";
/// Content type for bodies passed through as text
pub const TEXT_CONTENT_TYPE: &str = "text/plain";

/// Pluggable body serialization used by producers and consumers.
pub trait Codec: Send + Sync {
    /// Content type written to the message properties.
    fn content_type(&self) -> &str;

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, AmqpError>;

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, AmqpError>;
}

/// Encodes any serde value as a JSON document.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn content_type(&self) -> &str {
        JSON_CONTENT_TYPE
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, AmqpError> {
        serde_json::to_vec(value).map_err(|err| AmqpError::SerializePayloadError(err.to_string()))
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, AmqpError> {
        serde_json::from_slice(data).map_err(|err| AmqpError::ParsePayloadError(err.to_string()))
    }
}

/// Passes message bodies through as UTF-8 text.
///
/// Decoding into a `String` yields the body exactly as published, whatever
/// codec the producer used. Encoding a string writes it unchanged; any other
/// value is written as its JSON text. This is the codec for inputs of a JSON
/// worker, which parses each body itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextCodec;

impl Codec for TextCodec {
    fn content_type(&self) -> &str {
        TEXT_CONTENT_TYPE
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<Vec<u8>, AmqpError> {
        match serde_json::to_value(value) {
            Ok(Value::String(text)) => Ok(text.into_bytes()),
            Ok(other) => Ok(other.to_string().into_bytes()),
            Err(err) => Err(AmqpError::SerializePayloadError(err.to_string())),
        }
    }

    fn decode<T: DeserializeOwned>(&self, data: &[u8]) -> Result<T, AmqpError> {
        let text = std::str::from_utf8(data)
            .map_err(|err| AmqpError::ParsePayloadError(err.to_string()))?;

        let deserializer: StrDeserializer<'_, ValueError> = text.into_deserializer();
        Deserialize::deserialize(deserializer)
            .map_err(|err: ValueError| AmqpError::ParsePayloadError(err.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Job {
        id: u64,
        url: String,
        tags: Vec<String>,
        attempts: Option<u8>,
    }

    #[test]
    fn round_trips_nested_values() {
        let codec = JsonCodec;
        let value = json!({"a": 1, "nested": {"list": [1.5, "x", null, true]}});

        let body = codec.encode(&value).unwrap();
        let decoded: Value = codec.decode(&body).unwrap();

        assert_eq!(decoded, value);
    }

    #[test]
    fn round_trips_plain_and_typed_values() {
        let codec = JsonCodec;

        let text: String = codec.decode(&codec.encode("x").unwrap()).unwrap();
        assert_eq!(text, "x");

        let number: i64 = codec.decode(&codec.encode(&-42i64).unwrap()).unwrap();
        assert_eq!(number, -42);

        let map = BTreeMap::from([("k".to_owned(), vec![1u8, 2, 3])]);
        let decoded: BTreeMap<String, Vec<u8>> = codec.decode(&codec.encode(&map).unwrap()).unwrap();
        assert_eq!(decoded, map);

        let job = Job {
            id: 7,
            url: "http://example.org/a".to_owned(),
            tags: vec!["img".to_owned()],
            attempts: None,
        };
        let decoded: Job = codec.decode(&codec.encode(&job).unwrap()).unwrap();
        assert_eq!(decoded, job);
    }

    #[test]
    fn decode_failure_is_a_parse_error() {
        let err = JsonCodec.decode::<Value>(b"\x80not json").unwrap_err();
        assert!(matches!(err, AmqpError::ParsePayloadError(_)));
    }

    #[test]
    fn reports_json_content_type() {
        assert_eq!(JsonCodec.content_type(), "application/json");
    }

    #[test]
    fn text_codec_reads_json_bodies_verbatim() {
        let body = JsonCodec.encode(&json!({"a": 1})).unwrap();

        let text: String = TextCodec.decode(&body).unwrap();
        assert_eq!(text, r#"{"a":1}"#);
        assert_eq!(TextCodec.encode(&text).unwrap(), body);

        let quoted: String = TextCodec.decode(&JsonCodec.encode("x").unwrap()).unwrap();
        assert_eq!(quoted, r#""x""#);
    }

    #[test]
    fn text_codec_writes_strings_unchanged() {
        assert_eq!(TextCodec.encode("not json {").unwrap(), b"not json {".to_vec());
        assert_eq!(TextCodec.encode(&json!([1, 2])).unwrap(), b"[1,2]".to_vec());
        assert_eq!(TextCodec.content_type(), TEXT_CONTENT_TYPE);
    }

    #[test]
    fn text_codec_rejects_invalid_utf8() {
        let err = TextCodec.decode::<String>(b"\xff\xfe").unwrap_err();
        assert!(matches!(err, AmqpError::ParsePayloadError(_)));
    }
}
