// Copyright 2025 The mqtt-vars Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! String payload conversion for the supported variable types.
//!
//! MQTT payloads carry plain UTF-8 text. A malformed inbound payload is an
//! error; the handler logs it and drops the message.

use anyhow::{bail, Context, Result};

/// Convert a value into the UTF-8 payload string published to the broker.
pub trait ToPayload {
    fn to_payload(&self) -> String;
}

/// Parse a value out of an inbound UTF-8 payload string.
pub trait FromPayload: Sized {
    fn from_payload(payload: &str) -> Result<Self>;
}

macro_rules! numeric_payload {
    ($($ty:ty),* $(,)?) => {
        $(
            impl ToPayload for $ty {
                fn to_payload(&self) -> String {
                    self.to_string()
                }
            }

            impl FromPayload for $ty {
                fn from_payload(payload: &str) -> Result<Self> {
                    payload.trim().parse().with_context(|| {
                        format!("invalid {} payload: {payload:?}", stringify!($ty))
                    })
                }
            }
        )*
    };
}

numeric_payload!(i16, i32, i64, u16, u32, u64, f32, f64);

impl ToPayload for bool {
    fn to_payload(&self) -> String {
        if *self { "true" } else { "false" }.to_string()
    }
}

impl FromPayload for bool {
    /// Accepts `true`/`false` in any case, or an integer where nonzero
    /// means true.
    fn from_payload(payload: &str) -> Result<Self> {
        let trimmed = payload.trim();
        if trimmed.eq_ignore_ascii_case("true") {
            return Ok(true);
        }
        if trimmed.eq_ignore_ascii_case("false") {
            return Ok(false);
        }
        match trimmed.parse::<i64>() {
            Ok(n) => Ok(n != 0),
            Err(_) => bail!("invalid bool payload: {payload:?}"),
        }
    }
}

impl ToPayload for String {
    fn to_payload(&self) -> String {
        self.clone()
    }
}

impl FromPayload for String {
    fn from_payload(payload: &str) -> Result<Self> {
        Ok(payload.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_accepts_case_insensitive_words() {
        assert!(bool::from_payload("TRUE").unwrap());
        assert!(bool::from_payload("true").unwrap());
        assert!(!bool::from_payload("False").unwrap());
    }

    #[test]
    fn test_bool_accepts_nonzero_integers() {
        assert!(bool::from_payload("1").unwrap());
        assert!(bool::from_payload("-3").unwrap());
        assert!(!bool::from_payload("0").unwrap());
    }

    #[test]
    fn test_bool_rejects_garbage() {
        assert!(bool::from_payload("maybe").is_err());
    }

    #[test]
    fn test_numeric_parse_trims_whitespace() {
        assert_eq!(i32::from_payload(" 42\n").unwrap(), 42);
        assert_eq!(f32::from_payload(" 25.5 ").unwrap(), 25.5);
    }

    #[test]
    fn test_numeric_parse_rejects_garbage() {
        assert!(i64::from_payload("fortytwo").is_err());
        assert!(u32::from_payload("-1").is_err());
    }

    #[test]
    fn test_string_is_identity() {
        // Strings keep their whitespace; only numeric payloads are trimmed.
        assert_eq!(String::from_payload("  hello  ").unwrap(), "  hello  ");
        assert_eq!("hello".to_string().to_payload(), "hello");
    }

    #[test]
    fn test_round_trips() {
        assert_eq!(i64::from_payload(&(-7i64).to_payload()).unwrap(), -7);
        assert_eq!(f64::from_payload(&3.25f64.to_payload()).unwrap(), 3.25);
        assert!(bool::from_payload(&true.to_payload()).unwrap());
    }
}
