//! Ordered callbacks that may rewrite the bootstrap payload sent to the admin UI.

use std::fmt;

use serde_json::Value;

type ClientDataFilter = Box<dyn Fn(Value) -> Value + Send + Sync>;

/// Filters applied in registration order to the bootstrap payload.
#[derive(Default)]
pub struct ClientDataFilters {
    filters: Vec<ClientDataFilter>,
}

impl fmt::Debug for ClientDataFilters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientDataFilters")
            .field("filters", &self.filters.len())
            .finish()
    }
}

impl ClientDataFilters {
    /// Empty filter chain.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a filter.
    pub fn add<F>(&mut self, filter: F)
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.filters.push(Box::new(filter));
    }

    /// Run every filter over `payload`.
    #[must_use]
    pub fn apply(&self, payload: Value) -> Value {
        self.filters
            .iter()
            .fold(payload, |payload, filter| filter(payload))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filters_run_in_order() {
        let mut filters = ClientDataFilters::new();
        filters.add(|mut payload| {
            payload["steps"] = json!(["first"]);
            payload
        });
        filters.add(|mut payload| {
            if let Some(steps) = payload["steps"].as_array_mut() {
                steps.push(json!("second"));
            }
            payload
        });
        let out = filters.apply(json!({"version": "1"}));
        assert_eq!(out, json!({"version": "1", "steps": ["first", "second"]}));
    }

    #[test]
    fn empty_chain_is_identity() {
        let payload = json!({"a": 1});
        assert_eq!(ClientDataFilters::default().apply(payload.clone()), payload);
    }
}
