// Parse cache keyed by content hash
// Owned by the caller; re-uploading identical bytes skips the parse.

use crate::order::{Channel, OrderTable};
use crate::parser::{parse_or_empty, ChannelParser};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// SHA-256 of an export's bytes, hex encoded
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[derive(Debug, Default)]
pub struct ParseCache {
    entries: HashMap<(Channel, String), Arc<OrderTable>>,
    hits: usize,
    misses: usize,
}

impl ParseCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse through the cache. Failed parses are cached as rejected
    /// tables too, since the same bytes fail the same way.
    pub fn parse(&mut self, parser: &dyn ChannelParser, bytes: &[u8]) -> Arc<OrderTable> {
        let key = (parser.channel(), content_hash(bytes));

        if let Some(table) = self.entries.get(&key) {
            self.hits += 1;
            let short = &key.1[..12];
            debug!(channel = %key.0, hash = short, "parse cache hit");
            return Arc::clone(table);
        }

        self.misses += 1;
        let table = Arc::new(parse_or_empty(parser, bytes));
        self.entries.insert(key, Arc::clone(&table));
        table
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }
}
