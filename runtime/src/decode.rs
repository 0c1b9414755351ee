//! Response body decoding.

use fetchkit_core::error::ApiError;
use fetchkit_core::request::EmptyResponse;
use serde::de::DeserializeOwned;
use std::any::Any;

/// `Some(EmptyResponse)` when `T` is [`EmptyResponse`], `None` otherwise.
pub(crate) fn empty_response<T: 'static>() -> Option<T> {
    let empty: Box<dyn Any> = Box::new(EmptyResponse::default());
    empty.downcast::<T>().ok().map(|value| *value)
}

/// Decode a JSON body into `T`.
///
/// [`EmptyResponse`] decodes from any body, including an empty or malformed one.
///
/// # Errors
///
/// Returns [`ApiError::DecodeError`] with the decoder's message if the body
/// does not match `T`.
pub fn decode<T: DeserializeOwned + 'static>(body: &[u8]) -> Result<T, ApiError> {
    if let Some(empty) = empty_response::<T>() {
        return Ok(empty);
    }
    serde_json::from_slice(body).map_err(|e| ApiError::DecodeError(e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::panic)]

    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Profile {
        id: String,
    }

    #[test]
    fn test_decode_typed_body() {
        let profile: Profile = decode(br#"{"id":"1"}"#).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(profile, Profile { id: "1".to_string() });
    }

    #[test]
    fn test_decode_error_carries_detail() {
        let result: Result<Profile, _> = decode(b"{\"name\":1}");
        match result {
            Err(ApiError::DecodeError(detail)) => assert!(detail.contains("missing field")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_empty_response_ignores_body() {
        for body in [&b""[..], b"not json", br#"{"anything":true}"#] {
            assert_eq!(decode::<EmptyResponse>(body), Ok(EmptyResponse::default()));
        }
        assert!(empty_response::<Profile>().is_none());
    }
}
