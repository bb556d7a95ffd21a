//! Shared response envelopes.

use serde::{Deserialize, Serialize};

/// Plain acknowledgement body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Pagination metadata echoed back on list endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageMeta {
    pub limit: i64,
    pub offset: i64,
}

/// Paginated list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub data: Vec<T>,
    pub meta: PageMeta,
}

/// Pagination query parameters
#[derive(Debug, Clone, Deserialize, Default)]
pub struct PageQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl PageQuery {
    /// Clamp to sane bounds: limit defaults to 20 (max 100), offset to 0
    pub fn clamp(&self) -> (i64, i64) {
        let limit = self.limit.unwrap_or(20).clamp(1, 100);
        let offset = self.offset.unwrap_or(0).max(0);
        (limit, offset)
    }
}
