//! Attribute filter over decoded TXT records
//!
//! A [`TxtQuery`] is built once from the configured TXT pattern and then
//! evaluated against every candidate service.

use crate::service::ServiceRecord;
use crate::txt::{TxtRecord, TxtValue};
use std::collections::BTreeMap;

/// Requirement on a single TXT key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxtMatch {
    /// Key present with exactly this text value
    Equals(String),
    /// Key present with any value
    Present,
    /// Key must not appear
    Absent,
}

/// Conjunction of per-key requirements
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TxtQuery {
    terms: BTreeMap<String, TxtMatch>,
}

impl TxtQuery {
    /// Build a query from a TXT pattern
    ///
    /// `Text(v)` requires the value `v`, `Flag(true)` requires presence and
    /// `Flag(false)` requires absence. Binary values never take part in
    /// matching and are dropped here.
    pub fn from_pattern(pattern: &TxtRecord) -> Self {
        let terms = pattern
            .iter()
            .filter_map(|(key, value)| {
                let term = match value {
                    TxtValue::Text(v) => TxtMatch::Equals(v.clone()),
                    TxtValue::Flag(true) => TxtMatch::Present,
                    TxtValue::Flag(false) => TxtMatch::Absent,
                    TxtValue::Binary(_) => return None,
                };
                Some((key.to_lowercase(), term))
            })
            .collect();

        Self { terms }
    }

    /// Add a single requirement
    pub fn with(mut self, key: impl Into<String>, term: TxtMatch) -> Self {
        self.terms.insert(key.into().to_lowercase(), term);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Evaluate the query against decoded TXT content
    pub fn matches(&self, txt: &TxtRecord) -> bool {
        self.terms.iter().all(|(key, term)| match (term, txt.get(key)) {
            (TxtMatch::Absent, found) => found.is_none(),
            (TxtMatch::Present, found) => found.is_some(),
            (TxtMatch::Equals(expected), Some(TxtValue::Text(actual))) => expected == actual,
            (TxtMatch::Equals(_), _) => false,
        })
    }
}

/// Whether a service is admissible under an optional query
pub fn filter_service(service: &ServiceRecord, query: Option<&TxtQuery>) -> bool {
    query.is_none_or(|q| q.matches(&service.txt))
}
