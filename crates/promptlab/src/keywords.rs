//! Keyword liveness tracking.
//!
//! A keyword exists exactly as long as at least one live message references
//! it. [`Keywords`] keeps a per-message list of referenced names (the
//! tracker) and the global name → value map, and maintains:
//!
//! > the key set of `values` equals the union of all tracker entries.
//!
//! Every [`observe`](Keywords::observe) call recomputes the union from
//! scratch. Removing a message must be reported as an observation with an
//! empty list; the tracker never collects entries on its own.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use tracing::trace;

/// The global keyword map together with the per-message tracker it is
/// derived from.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
pub struct Keywords {
    /// Current value of every live keyword.
    #[serde(rename = "keywords")]
    values: BTreeMap<String, String>,
    /// Message id → ordered variable names referenced by that message.
    #[serde(rename = "keyword_tracker")]
    tracker: BTreeMap<String, Vec<String>>,
}

impl Keywords {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the variables a message currently references.
    ///
    /// An empty list drops the message's entry; a non-empty list replaces it
    /// wholesale. Names that become live get an empty value; names that are
    /// no longer referenced anywhere are removed along with their value.
    pub fn observe(&mut self, message_id: &str, names: Vec<String>) {
        if names.is_empty() {
            self.tracker.remove(message_id);
        } else {
            let mut seen = BTreeSet::new();
            let names: Vec<String> = names.into_iter().filter(|n| seen.insert(n.clone())).collect();
            self.tracker.insert(message_id.to_string(), names);
        }

        let live: BTreeSet<&str> = self
            .tracker
            .values()
            .flat_map(|names| names.iter().map(String::as_str))
            .collect();

        for name in &live {
            if !self.values.contains_key(*name) {
                self.values.insert((*name).to_string(), String::new());
            }
        }
        self.values.retain(|name, _| live.contains(name.as_str()));

        trace!(
            message_id,
            live = self.values.len(),
            tracked = self.tracker.len(),
            "keywords recomputed"
        );
    }

    /// Shorthand for observing an empty list.
    pub fn forget(&mut self, message_id: &str) {
        self.observe(message_id, Vec::new());
    }

    /// Set the value of a live keyword. Returns `false` (and changes
    /// nothing) when no live message references `name`.
    pub fn set_value(&mut self, name: &str, value: impl Into<String>) -> bool {
        match self.values.get_mut(name) {
            Some(slot) => {
                *slot = value.into();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.values.get(name).map(String::as_str)
    }

    /// The name → value map.
    pub fn values(&self) -> &BTreeMap<String, String> {
        &self.values
    }

    /// Live keyword names, sorted.
    pub fn names(&self) -> Vec<&str> {
        self.values.keys().map(String::as_str).collect()
    }

    /// Names tracked for one message.
    pub fn referenced_by(&self, message_id: &str) -> &[String] {
        self.tracker.get(message_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Message ids with at least one tracked reference.
    pub fn tracked_messages(&self) -> impl Iterator<Item = &str> {
        self.tracker.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn union_of_tracker(k: &Keywords) -> BTreeSet<String> {
        k.tracker.values().flatten().cloned().collect()
    }

    #[test]
    fn observe_adds_with_empty_default() {
        let mut k = Keywords::new();
        k.observe("m1", names(&["topic", "tone"]));
        assert_eq!(k.names(), vec!["tone", "topic"]);
        assert_eq!(k.get("topic"), Some(""));
    }

    #[test]
    fn observe_replaces_rather_than_merges() {
        let mut k = Keywords::new();
        k.observe("m1", names(&["a", "b"]));
        k.observe("m1", names(&["b", "c"]));
        assert_eq!(k.referenced_by("m1"), names(&["b", "c"]).as_slice());
        assert_eq!(k.names(), vec!["b", "c"]);
    }

    #[test]
    fn shared_keyword_survives_until_last_reference_goes() {
        let mut k = Keywords::new();
        k.observe("m1", names(&["topic"]));
        k.observe("m2", names(&["topic"]));
        assert!(k.set_value("topic", "rust"));

        k.forget("m1");
        assert_eq!(k.get("topic"), Some("rust"));

        k.forget("m2");
        assert_eq!(k.get("topic"), None);
        assert_eq!(k.tracked_messages().count(), 0);
    }

    #[test]
    fn re_added_keyword_resets_to_empty() {
        let mut k = Keywords::new();
        k.observe("m1", names(&["topic"]));
        k.set_value("topic", "old value");
        k.forget("m1");
        k.observe("m1", names(&["topic"]));
        assert_eq!(k.get("topic"), Some(""));
    }

    #[test]
    fn set_value_on_unknown_name_is_noop() {
        let mut k = Keywords::new();
        assert!(!k.set_value("ghost", "boo"));
        assert!(k.is_empty());
    }

    #[test]
    fn duplicate_names_in_one_event_collapse() {
        let mut k = Keywords::new();
        k.observe("m1", names(&["x", "x", "y"]));
        assert_eq!(k.referenced_by("m1"), names(&["x", "y"]).as_slice());
    }

    #[test]
    fn converges_to_union_regardless_of_order() {
        let events: Vec<(&str, Vec<String>)> = vec![
            ("m1", names(&["a", "b"])),
            ("m2", names(&["b", "c"])),
            ("m3", names(&["d"])),
            ("m1", names(&[])),
            ("m3", names(&["a"])),
            ("m4", names(&["e"])),
            ("m4", names(&[])),
        ];

        let mut forward = Keywords::new();
        for (id, list) in events.iter().cloned() {
            forward.observe(id, list);
            let keys: BTreeSet<String> = forward.values().keys().cloned().collect();
            assert_eq!(keys, union_of_tracker(&forward));
        }

        // Final per-message state applied in a different order converges to
        // the same key set.
        let mut shuffled = Keywords::new();
        shuffled.observe("m3", names(&["a"]));
        shuffled.observe("m2", names(&["b", "c"]));
        assert_eq!(shuffled.names(), forward.names());
    }
}
