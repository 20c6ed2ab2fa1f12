//! Commerce Layer request and response types

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ============================================================================
// OAUTH TYPES
// ============================================================================

#[derive(Debug, Serialize)]
pub struct TokenRequest {
    pub grant_type: &'static str,
    pub client_id: String,
    #[serde(serialize_with = "expose")]
    pub client_secret: SecretString,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

fn expose<S: Serializer>(secret: &SecretString, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

/// Successful token exchange.
#[derive(Clone, PartialEq, Eq, Deserialize)]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

impl std::fmt::Debug for TokenGrant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGrant")
            .field("access_token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .field("token_type", &self.token_type)
            .field("scope", &self.scope)
            .finish()
    }
}

// ============================================================================
// STOCK ITEM TYPES (JSON:API)
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct StockItemsDocument {
    #[serde(default)]
    pub data: Vec<StockItemResource>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StockItemResource {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub attributes: StockItem,
}

/// Stock held for one SKU at one stock location.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct StockItem {
    #[serde(default)]
    pub sku_code: Option<String>,
    /// Missing and `null` both read as 0.
    #[serde(default, deserialize_with = "null_as_zero")]
    pub quantity: i64,
}

fn null_as_zero<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(Option::<i64>::deserialize(deserializer)?.unwrap_or(0))
}

impl StockItem {
    pub fn with_quantity(quantity: i64) -> Self {
        Self {
            sku_code: None,
            quantity,
        }
    }
}

impl StockItemsDocument {
    pub fn into_items(self) -> Vec<StockItem> {
        self.data.into_iter().map(|resource| resource.attributes).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_request_serializes_secret() {
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: "id".to_string(),
            client_secret: SecretString::from("shh"),
            scope: None,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "grant_type": "client_credentials",
                "client_id": "id",
                "client_secret": "shh"
            })
        );
    }

    #[test]
    fn test_token_request_debug_hides_secret() {
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: "id".to_string(),
            client_secret: SecretString::from("shh-secret"),
            scope: Some("market:1234".to_string()),
        };
        assert!(!format!("{:?}", request).contains("shh-secret"));
    }

    #[test]
    fn test_token_grant_parses_minimal_body() {
        let grant: TokenGrant =
            serde_json::from_str(r#"{"access_token":"abc","expires_in":14400}"#).unwrap();
        assert_eq!(grant.access_token, "abc");
        assert_eq!(grant.expires_in, 14400);
        assert!(!format!("{:?}", grant).contains("abc"));
    }

    #[test]
    fn test_stock_items_document_parses_quantities() {
        let doc: StockItemsDocument = serde_json::from_str(
            r#"{
                "data": [
                    {"id": "a", "type": "stock_items", "attributes": {"sku_code": "X", "quantity": 3}},
                    {"id": "b", "type": "stock_items", "attributes": {"sku_code": "X", "quantity": 0}},
                    {"id": "c", "type": "stock_items", "attributes": {"sku_code": "X", "quantity": 7}}
                ],
                "meta": {"record_count": 3}
            }"#,
        )
        .unwrap();
        let quantities: Vec<i64> = doc.into_items().iter().map(|i| i.quantity).collect();
        assert_eq!(quantities, vec![3, 0, 7]);
    }

    #[test]
    fn test_stock_items_document_without_data_is_empty() {
        let doc: StockItemsDocument = serde_json::from_str(r#"{"meta": {}}"#).unwrap();
        assert!(doc.into_items().is_empty());
    }

    #[test]
    fn test_stock_item_missing_quantity_is_zero() {
        let doc: StockItemsDocument =
            serde_json::from_str(r#"{"data": [{"attributes": {}}, {"id": "z"}]}"#).unwrap();
        let items = doc.into_items();
        assert_eq!(items.len(), 2);
        assert!(items.iter().all(|i| i.quantity == 0));
    }

    #[test]
    fn test_stock_item_null_quantity_is_zero() {
        let doc: StockItemsDocument = serde_json::from_str(
            r#"{"data": [
                {"attributes": {"sku_code": "X", "quantity": null}},
                {"attributes": {"sku_code": "X", "quantity": 5}}
            ]}"#,
        )
        .unwrap();
        let quantities: Vec<i64> = doc.into_items().iter().map(|i| i.quantity).collect();
        assert_eq!(quantities, vec![0, 5]);
    }
}
