//! Uniform response envelope.

use serde::{Deserialize, Serialize};

/// Response payload: a single document (or null) or a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Data<T> {
    /// List result.
    Many(Vec<T>),
    /// Single-document lookup result.
    One(Option<T>),
}

impl<T> Data<T> {
    /// Number of documents carried.
    pub fn len(&self) -> usize {
        match self {
            Data::One(doc) => usize::from(doc.is_some()),
            Data::Many(docs) => docs.len(),
        }
    }

    /// Check if no document is carried.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get the list, if this is a list result.
    pub fn as_many(&self) -> Option<&[T]> {
        match self {
            Data::Many(docs) => Some(docs),
            Data::One(_) => None,
        }
    }

    /// Get the single document, if this is a lookup result.
    pub fn as_one(&self) -> Option<&T> {
        match self {
            Data::One(doc) => doc.as_ref(),
            Data::Many(_) => None,
        }
    }
}

/// Envelope metadata.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Meta {
    /// Number of documents matching the query, ignoring pagination.
    pub total: u64,
}

/// `{data, meta, error?}` response body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub data: Data<T>,
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ResponseEnvelope<T> {
    /// Envelope with no documents and a zero total.
    pub fn empty() -> Self {
        Self {
            data: Data::Many(Vec::new()),
            meta: Meta::default(),
            error: None,
        }
    }

    /// Attach an error message.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error = Some(message.into());
        self
    }
}

/// A response envelope paired with a status code.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse<T> {
    pub status: u16,
    pub body: ResponseEnvelope<T>,
}

impl<T> QueryResponse<T> {
    pub const OK: u16 = 200;
    pub const INTERNAL_ERROR: u16 = 500;

    /// Successful single-document response.
    pub fn one(doc: Option<T>, total: u64) -> Self {
        Self {
            status: Self::OK,
            body: ResponseEnvelope {
                data: Data::One(doc),
                meta: Meta { total },
                error: None,
            },
        }
    }

    /// Successful list response.
    pub fn many(docs: Vec<T>, total: u64) -> Self {
        Self {
            status: Self::OK,
            body: ResponseEnvelope {
                data: Data::Many(docs),
                meta: Meta { total },
                error: None,
            },
        }
    }

    /// `{data: [], meta: {total: 0}}` with status 500.
    pub fn internal_error() -> Self {
        Self::failure(Self::INTERNAL_ERROR)
    }

    /// Empty envelope with the given status.
    pub fn failure(status: u16) -> Self {
        Self {
            status,
            body: ResponseEnvelope::empty(),
        }
    }

    /// Attach an error message to the body.
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.body = self.body.with_error(message);
        self
    }

    pub fn is_2xx(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_5xx(&self) -> bool {
        (500..600).contains(&self.status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_serialize_list() {
        let response = QueryResponse::many(vec![json!({"a": 1})], 3);
        assert!(response.is_2xx());
        assert_eq!(
            serde_json::to_value(&response.body).unwrap(),
            json!({"data": [{"a": 1}], "meta": {"total": 3}})
        );
    }

    #[test]
    fn test_serialize_one_and_null() {
        let found = QueryResponse::one(Some(json!({"a": 1})), 1);
        assert_eq!(
            serde_json::to_value(&found.body).unwrap(),
            json!({"data": {"a": 1}, "meta": {"total": 1}})
        );

        let missing = QueryResponse::<serde_json::Value>::one(None, 0);
        assert_eq!(
            serde_json::to_value(&missing.body).unwrap(),
            json!({"data": null, "meta": {"total": 0}})
        );
        assert!(missing.body.data.is_empty());
    }

    #[test]
    fn test_internal_error() {
        let response = QueryResponse::<serde_json::Value>::internal_error();
        assert!(response.is_5xx());
        assert_eq!(
            serde_json::to_value(&response.body).unwrap(),
            json!({"data": [], "meta": {"total": 0}})
        );

        let rejected = QueryResponse::<serde_json::Value>::failure(403).with_error("forbidden");
        assert_eq!(rejected.status, 403);
        assert!(!rejected.is_2xx() && !rejected.is_5xx());
        assert_eq!(rejected.body.error.as_deref(), Some("forbidden"));
    }
}
