use serde::{Deserialize, Serialize};

/// Query string of the list call. The mock API spells the limit `_limit`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(rename = "_limit", default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

impl ListQuery {
    pub fn limited(limit: Option<u32>) -> Self {
        Self { limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_query_uses_mock_api_limit_name() {
        let json = serde_json::to_value(ListQuery::limited(Some(10))).expect("json");
        assert_eq!(json, serde_json::json!({ "_limit": 10 }));

        let json = serde_json::to_value(ListQuery::limited(None)).expect("json");
        assert_eq!(json, serde_json::json!({}));
    }
}
