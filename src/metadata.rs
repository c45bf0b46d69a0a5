//! Routing label parser.
//!
//! The label value is a comma separated list of `hostname:port` entries.
//! Entries that do not split into exactly two parts are reported and
//! skipped; the rest of the label is still honoured.

use log::warn;

use crate::types::Route;

const LIST_DELIMITER: char = ',';
const FIELD_DELIMITER: char = ':';

/// A change to the desired state derived from one label entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    Upsert(Route),
    Remove(String),
}

/// Parses a container's routing label into mutations.
///
/// With `adding` set every valid entry maps its hostname to
/// `container:port`. Otherwise the hostname is removed outright, even if
/// another container still advertises it.
pub fn parse(container: &str, metadata: &str, adding: bool) -> Vec<Mutation> {
    let mut mutations = Vec::new();
    for entry in metadata.split(LIST_DELIMITER) {
        let entry = entry.trim();
        let parts: Vec<&str> = entry.split(FIELD_DELIMITER).collect();
        let [hostname, port] = parts.as_slice() else {
            warn!("invalid entry {:?} in label of {}", entry, container);
            continue;
        };
        if adding {
            mutations.push(Mutation::Upsert(Route::new(
                *hostname,
                format!("{}:{}", container, port),
            )));
        } else {
            mutations.push(Mutation::Remove(hostname.to_string()));
        }
    }
    mutations
}
