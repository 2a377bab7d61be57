//! Opaque cursor tokens / 游标编解码
//!
//! A token is URL-safe base64 (no padding) over a compact JSON payload:
//!
//! ```text
//! { "m": "field", "f": "createdAt", "d": "desc", "k": [1700000000000, 42], "s": "9f1c..." }
//! { "m": "relevance", "k": [17], "s": "9f1c..." }
//! ```
//!
//! `k` holds the boundary keys, `s` a fingerprint of the query the token was
//! minted for. Decoding is pure: no I/O, no clock.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::error::{PagerError, Result};
use crate::models::{CursorMode, SortDirection, SortField};

/// Tokens longer than this are rejected before decoding
const MAX_TOKEN_LEN: usize = 512;

/// Hex chars of the scope fingerprint kept in each token
const SCOPE_LEN: usize = 16;

/// Last-seen position in the ordering / 分页边界
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Boundary {
    /// `(field value, id)` of the boundary row
    Field {
        field: SortField,
        direction: SortDirection,
        value: i64,
        id: i64,
    },
    /// Zero-based position in the caller's ordered id list
    Relevance { position: i64 },
}

impl Boundary {
    pub fn mode(&self) -> CursorMode {
        match self {
            Boundary::Field { .. } => CursorMode::Field,
            Boundary::Relevance { .. } => CursorMode::Relevance,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CursorPayload {
    m: CursorMode,
    #[serde(default)]
    f: Option<SortField>,
    #[serde(default)]
    d: Option<SortDirection>,
    k: Vec<i64>,
    s: String,
}

/// Codec bound to one (filters, sort) scope / 游标编解码器
#[derive(Debug, Clone)]
pub struct CursorCodec {
    scope: String,
}

impl CursorCodec {
    /// `scope_source` is any stable description of the filters and sort order
    pub fn new(scope_source: &str) -> Self {
        let digest = Sha256::digest(scope_source.as_bytes());
        let mut scope = hex::encode(digest);
        scope.truncate(SCOPE_LEN);
        Self { scope }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    pub fn encode(&self, boundary: &Boundary) -> String {
        let payload = match boundary {
            Boundary::Field { field, direction, value, id } => serde_json::json!({
                "m": CursorMode::Field,
                "f": field,
                "d": direction,
                "k": [value, id],
                "s": self.scope,
            }),
            Boundary::Relevance { position } => serde_json::json!({
                "m": CursorMode::Relevance,
                "k": [position],
                "s": self.scope,
            }),
        };
        URL_SAFE_NO_PAD.encode(payload.to_string())
    }

    /// Decode a token minted for `expected` mode under this codec's scope
    pub fn decode(&self, token: &str, expected: CursorMode) -> Result<Boundary> {
        if token.is_empty() || token.len() > MAX_TOKEN_LEN {
            return Err(PagerError::invalid_cursor("token length out of range"));
        }

        let bytes = URL_SAFE_NO_PAD
            .decode(token)
            .map_err(|_| PagerError::invalid_cursor("malformed encoding"))?;
        let payload: CursorPayload = serde_json::from_slice(&bytes)
            .map_err(|_| PagerError::invalid_cursor("malformed payload"))?;

        if payload.m != expected {
            return Err(PagerError::invalid_cursor(format!(
                "cursor minted for {} mode, request is {} mode",
                payload.m, expected
            )));
        }
        if payload.s != self.scope {
            return Err(PagerError::invalid_cursor("cursor minted for different filters or sort"));
        }

        match payload.m {
            CursorMode::Field => {
                let (field, direction) = match (payload.f, payload.d) {
                    (Some(f), Some(d)) => (f, d),
                    _ => return Err(PagerError::invalid_cursor("field cursor without sort field")),
                };
                match payload.k.as_slice() {
                    [value, id] => Ok(Boundary::Field { field, direction, value: *value, id: *id }),
                    keys => Err(PagerError::invalid_cursor(format!("field cursor expects 2 keys, got {}", keys.len()))),
                }
            }
            CursorMode::Relevance => match payload.k.as_slice() {
                [position] if *position >= 0 => Ok(Boundary::Relevance { position: *position }),
                [_] => Err(PagerError::invalid_cursor("negative relevance position")),
                keys => Err(PagerError::invalid_cursor(format!("relevance cursor expects 1 key, got {}", keys.len()))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(json: &str) -> String {
        URL_SAFE_NO_PAD.encode(json)
    }

    #[test]
    fn test_round_trip_both_modes() {
        let codec = CursorCodec::new("scope-a");

        let field = Boundary::Field {
            field: SortField::Popularity,
            direction: SortDirection::Asc,
            value: -5,
            id: 77,
        };
        let token = codec.encode(&field);
        assert_eq!(field.mode(), CursorMode::Field);
        assert_eq!(codec.decode(&token, CursorMode::Field).unwrap(), field);

        let relevance = Boundary::Relevance { position: 0 };
        let token = codec.encode(&relevance);
        assert_eq!(codec.decode(&token, CursorMode::Relevance).unwrap(), relevance);
    }

    #[test]
    fn test_token_is_url_safe() {
        let codec = CursorCodec::new("scope-a");
        let token = codec.encode(&Boundary::Field {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
            value: i64::MAX,
            id: i64::MAX,
        });
        assert!(token.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_garbage_rejected() {
        let codec = CursorCodec::new("scope-a");
        for token in ["not-a-real-token", "", "%%%", "e30"] {
            let err = codec.decode(token, CursorMode::Field).unwrap_err();
            assert!(err.is_invalid_cursor(), "token {:?}", token);
        }
    }

    #[test]
    fn test_padded_token_rejected() {
        let codec = CursorCodec::new("scope-a");
        let token = codec.encode(&Boundary::Relevance { position: 2 });
        for padded in [format!(" {}", token), format!("{}\n", token), format!("{} ", token)] {
            assert!(codec.decode(&padded, CursorMode::Relevance).unwrap_err().is_invalid_cursor());
        }
        assert!(codec.decode(&token, CursorMode::Relevance).is_ok());
    }

    #[test]
    fn test_mode_mismatch_rejected() {
        let codec = CursorCodec::new("scope-a");
        let token = codec.encode(&Boundary::Relevance { position: 3 });
        assert!(codec.decode(&token, CursorMode::Field).unwrap_err().is_invalid_cursor());
    }

    #[test]
    fn test_scope_mismatch_rejected() {
        let token = CursorCodec::new("scope-a").encode(&Boundary::Relevance { position: 3 });
        let err = CursorCodec::new("scope-b").decode(&token, CursorMode::Relevance).unwrap_err();
        assert!(err.is_invalid_cursor());
    }

    #[test]
    fn test_wrong_arity_rejected() {
        let codec = CursorCodec::new("scope-a");
        let scope = codec.scope().to_string();

        let token = raw(&format!(r#"{{"m":"field","f":"createdAt","d":"desc","k":[1],"s":"{}"}}"#, scope));
        assert!(codec.decode(&token, CursorMode::Field).unwrap_err().is_invalid_cursor());

        let token = raw(&format!(r#"{{"m":"relevance","k":[1,2],"s":"{}"}}"#, scope));
        assert!(codec.decode(&token, CursorMode::Relevance).unwrap_err().is_invalid_cursor());

        let token = raw(&format!(r#"{{"m":"relevance","k":[-1],"s":"{}"}}"#, scope));
        assert!(codec.decode(&token, CursorMode::Relevance).unwrap_err().is_invalid_cursor());

        let token = raw(&format!(r#"{{"m":"field","k":[1,2],"s":"{}"}}"#, scope));
        assert!(codec.decode(&token, CursorMode::Field).unwrap_err().is_invalid_cursor());
    }
}
