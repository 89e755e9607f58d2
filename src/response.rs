use serde::Serialize;
use utoipa::ToSchema;

/// Item count for list endpoints. Non-list responses omit `meta` entirely.
#[derive(Debug, Serialize, ToSchema, Clone)]
pub struct Meta {
    pub total: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub message: String,
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<Meta>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta: None,
        }
    }

    pub fn list(message: impl Into<String>, data: T, total: u64) -> Self {
        Self {
            message: message.into(),
            data: Some(data),
            meta: Some(Meta { total }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_omits_meta_from_the_body() {
        let resp = ApiResponse::success("Ok", serde_json::json!({"id": 1}));
        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body["message"], "Ok");
        assert!(body.get("meta").is_none());
    }

    #[test]
    fn list_carries_the_item_count() {
        let resp = ApiResponse::list("Products", vec![1, 2, 3], 3);
        let body = serde_json::to_value(&resp).unwrap();
        assert_eq!(body["meta"]["total"], 3);
        assert_eq!(body["data"].as_array().unwrap().len(), 3);
    }
}
