use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, RwLock};
use tracing::{info, instrument, warn};
use utoipa::ToSchema;

use crate::entities::app_setting::Model as AppSettingModel;
use crate::entities::purchase::PaymentMethod;
use crate::errors::ServiceError;
use crate::repositories::SettingsStore;

pub const PAYMENT_CATEGORY: &str = "payment";
pub const SITE_CATEGORY: &str = "site";
pub const QRIS_KEY: &str = "payment.qris";
pub const BANK_TRANSFER_KEY: &str = "payment.bank_transfer";
pub const EWALLETS_KEY: &str = "payment.ewallets";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct QrisSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub merchant_name: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BankAccount {
    pub bank_name: String,
    pub account_number: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct BankTransferSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub accounts: Vec<BankAccount>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EwalletAccount {
    pub provider: String,
    pub number: String,
    pub account_name: String,
    #[serde(default = "wallet_enabled_default")]
    pub enabled: bool,
}

fn wallet_enabled_default() -> bool {
    true
}

impl QrisSettings {
    /// Enabled and carrying something the customer can scan or pay to.
    pub fn is_configured(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.trim().is_empty());
        self.enabled && (filled(&self.image_url) || filled(&self.merchant_name))
    }
}

impl BankTransferSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled && !self.accounts.is_empty()
    }
}

impl EwalletSettings {
    pub fn is_configured(&self) -> bool {
        self.enabled && self.wallets.iter().any(|w| w.enabled)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct EwalletSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub wallets: Vec<EwalletAccount>,
}

/// Admin-configured payment methods and their display details
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct PaymentSettings {
    pub qris: QrisSettings,
    pub bank_transfer: BankTransferSettings,
    pub ewallets: EwalletSettings,
}

impl PaymentSettings {
    /// Used when nothing has ever been loaded: no method is offered.
    pub fn fallback() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: &[AppSettingModel]) -> Self {
        let mut settings = Self::default();
        for row in rows {
            match row.key.as_str() {
                QRIS_KEY => settings.qris = parse_or_disabled(row),
                BANK_TRANSFER_KEY => settings.bank_transfer = parse_or_disabled(row),
                EWALLETS_KEY => settings.ewallets = parse_or_disabled(row),
                _ => {}
            }
        }
        settings
    }

    /// Methods that are switched on and have details a customer can pay to.
    pub fn available_methods(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|method| match method {
                PaymentMethod::Qris => self.qris.is_configured(),
                PaymentMethod::BankTransfer => self.bank_transfer.is_configured(),
                PaymentMethod::Ewallet => self.ewallets.is_configured(),
            })
            .collect()
    }

    pub fn is_available(&self, method: PaymentMethod) -> bool {
        self.available_methods().contains(&method)
    }
}

fn parse_or_disabled<T: DeserializeOwned + Default>(row: &AppSettingModel) -> T {
    serde_json::from_value(row.value.clone()).unwrap_or_else(|e| {
        warn!(key = %row.key, error = %e, "malformed payment setting; treating as disabled");
        T::default()
    })
}

/// Cache state. `StaleFallback` serves the last good value (or the empty
/// fallback) after a failed or timed-out fetch.
#[derive(Debug, Clone)]
enum CacheState {
    Loading,
    Loaded {
        settings: PaymentSettings,
        fetched_at: Instant,
    },
    StaleFallback {
        settings: PaymentSettings,
        since: Instant,
    },
}

impl CacheState {
    fn fresh(&self, ttl: Duration) -> Option<PaymentSettings> {
        match self {
            CacheState::Loaded {
                settings,
                fetched_at,
            } if fetched_at.elapsed() < ttl => Some(settings.clone()),
            // Back off from a failing store for one TTL before retrying.
            CacheState::StaleFallback { settings, since } if since.elapsed() < ttl => {
                Some(settings.clone())
            }
            _ => None,
        }
    }

    fn last_known(&self) -> Option<PaymentSettings> {
        match self {
            CacheState::Loaded { settings, .. } | CacheState::StaleFallback { settings, .. } => {
                Some(settings.clone())
            }
            CacheState::Loading => None,
        }
    }
}

/// Settings access with a TTL cache in front of the payment settings
pub struct SettingsService {
    store: Arc<dyn SettingsStore>,
    state: RwLock<CacheState>,
    refresh: Mutex<()>,
    ttl: Duration,
    fetch_timeout: Duration,
}

impl SettingsService {
    pub fn new(store: Arc<dyn SettingsStore>, ttl: Duration, fetch_timeout: Duration) -> Self {
        Self {
            store,
            state: RwLock::new(CacheState::Loading),
            refresh: Mutex::new(()),
            ttl,
            fetch_timeout,
        }
    }

    /// Never fails; a store outage degrades to the last known or empty settings.
    pub async fn payment_settings(&self) -> PaymentSettings {
        if let Some(settings) = self.state.read().await.fresh(self.ttl) {
            return settings;
        }

        let _guard = self.refresh.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(settings) = self.state.read().await.fresh(self.ttl) {
            return settings;
        }

        let fetched = tokio::time::timeout(
            self.fetch_timeout,
            self.store.list(Some(PAYMENT_CATEGORY.to_string())),
        )
        .await;

        let mut state = self.state.write().await;
        match fetched {
            Ok(Ok(rows)) => {
                let settings = PaymentSettings::from_rows(&rows);
                *state = CacheState::Loaded {
                    settings: settings.clone(),
                    fetched_at: Instant::now(),
                };
                settings
            }
            Ok(Err(e)) => {
                warn!(error = %e, "payment settings fetch failed; serving fallback");
                Self::fall_back(&mut state)
            }
            Err(_) => {
                warn!(
                    timeout_ms = self.fetch_timeout.as_millis() as u64,
                    "payment settings fetch timed out; serving fallback"
                );
                Self::fall_back(&mut state)
            }
        }
    }

    fn fall_back(state: &mut CacheState) -> PaymentSettings {
        let settings = state.last_known().unwrap_or_else(PaymentSettings::fallback);
        *state = CacheState::StaleFallback {
            settings: settings.clone(),
            since: Instant::now(),
        };
        settings
    }

    pub async fn available_methods(&self) -> Vec<PaymentMethod> {
        self.payment_settings().await.available_methods()
    }

    pub async fn invalidate(&self) {
        *self.state.write().await = CacheState::Loading;
    }

    pub async fn list_all(&self) -> Result<Vec<AppSettingModel>, ServiceError> {
        self.store.list(None).await
    }

    /// Public site content as a flat `key -> value` object.
    pub async fn site_content(&self) -> Result<Map<String, Value>, ServiceError> {
        let rows = self.store.list(Some(SITE_CATEGORY.to_string())).await?;
        Ok(rows.into_iter().map(|row| (row.key, row.value)).collect())
    }

    #[instrument(skip(self, value))]
    pub async fn upsert(
        &self,
        key: &str,
        value: Value,
        category: Option<String>,
        description: Option<String>,
    ) -> Result<AppSettingModel, ServiceError> {
        let key = key.trim();
        if key.is_empty() || key.len() > 100 {
            return Err(ServiceError::field("key", "Kunci pengaturan tidak valid"));
        }

        let category = category
            .filter(|c| !c.trim().is_empty())
            .unwrap_or_else(|| infer_category(key));
        validate_known_value(key, &value)?;

        let saved = self
            .store
            .upsert(AppSettingModel {
                key: key.to_string(),
                value,
                category,
                description,
                updated_at: Utc::now(),
            })
            .await?;

        if saved.category == PAYMENT_CATEGORY {
            self.invalidate().await;
        }
        info!(key = %saved.key, category = %saved.category, "setting saved");
        Ok(saved)
    }
}

fn infer_category(key: &str) -> String {
    key.split_once('.')
        .map(|(prefix, _)| prefix.to_string())
        .unwrap_or_else(|| "general".to_string())
}

fn validate_known_value(key: &str, value: &Value) -> Result<(), ServiceError> {
    let result = match key {
        QRIS_KEY => serde_json::from_value::<QrisSettings>(value.clone()).map(|_| ()),
        BANK_TRANSFER_KEY => {
            serde_json::from_value::<BankTransferSettings>(value.clone()).map(|_| ())
        }
        EWALLETS_KEY => serde_json::from_value::<EwalletSettings>(value.clone()).map(|_| ()),
        _ => Ok(()),
    };
    result.map_err(|e| ServiceError::field("value", format!("Format pengaturan tidak valid: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repositories::MockSettingsStore;
    use serde_json::json;

    fn row(key: &str, value: Value) -> AppSettingModel {
        AppSettingModel {
            key: key.into(),
            value,
            category: PAYMENT_CATEGORY.into(),
            description: None,
            updated_at: Utc::now(),
        }
    }

    fn rows() -> Vec<AppSettingModel> {
        vec![
            row(QRIS_KEY, json!({ "enabled": true, "merchant_name": "Kedai Kopi" })),
            row(BANK_TRANSFER_KEY, json!({ "enabled": false, "accounts": [] })),
            row(EWALLETS_KEY, json!({ "enabled": true, "wallets": [
                { "provider": "OVO", "number": "0812", "account_name": "Kedai" }
            ] })),
        ]
    }

    #[test]
    fn available_methods_follow_enabled_flags() {
        let settings = PaymentSettings::from_rows(&rows());
        assert_eq!(
            settings.available_methods(),
            vec![PaymentMethod::Qris, PaymentMethod::Ewallet]
        );
    }

    #[test]
    fn enabled_but_unconfigured_methods_are_not_offered() {
        let settings = PaymentSettings::from_rows(&[
            row(QRIS_KEY, json!({ "enabled": true, "merchant_name": "  " })),
            row(BANK_TRANSFER_KEY, json!({ "enabled": true, "accounts": [] })),
            row(EWALLETS_KEY, json!({ "enabled": true, "wallets": [
                { "provider": "OVO", "number": "0812", "account_name": "Kedai", "enabled": false }
            ] })),
        ]);
        assert!(settings.available_methods().is_empty());
        assert!(!settings.is_available(PaymentMethod::BankTransfer));
    }

    #[test]
    fn qris_image_alone_is_enough() {
        let settings = PaymentSettings::from_rows(&[row(
            QRIS_KEY,
            json!({ "enabled": true, "image_url": "https://cdn.kedai.example/qris.png" }),
        )]);
        assert_eq!(settings.available_methods(), vec![PaymentMethod::Qris]);
    }

    #[test]
    fn malformed_rows_are_disabled() {
        let settings = PaymentSettings::from_rows(&[row(QRIS_KEY, json!("yes"))]);
        assert!(settings.available_methods().is_empty());
    }

    #[tokio::test]
    async fn loaded_settings_are_cached_within_ttl() {
        let mut store = MockSettingsStore::new();
        store.expect_list().times(1).returning(|_| Ok(rows()));

        let service = SettingsService::new(
            Arc::new(store),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        assert_eq!(service.available_methods().await.len(), 2);
        assert_eq!(service.available_methods().await.len(), 2);
    }

    #[tokio::test]
    async fn first_failure_falls_back_to_no_methods() {
        let mut store = MockSettingsStore::new();
        store
            .expect_list()
            .times(1)
            .returning(|_| Err(ServiceError::ServiceUnavailable("down".into())));

        let service = SettingsService::new(
            Arc::new(store),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        assert!(service.available_methods().await.is_empty());
        // Within the back-off window the store is not hit again.
        assert!(service.available_methods().await.is_empty());
    }

    #[tokio::test]
    async fn failure_after_success_keeps_last_known_settings() {
        let mut store = MockSettingsStore::new();
        let mut seq = mockall::Sequence::new();
        store
            .expect_list()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(rows()));
        store
            .expect_list()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ServiceError::ServiceUnavailable("down".into())));

        let service = SettingsService::new(
            Arc::new(store),
            Duration::from_millis(0),
            Duration::from_secs(1),
        );
        assert_eq!(service.available_methods().await.len(), 2);
        assert_eq!(service.available_methods().await.len(), 2);
    }

    #[tokio::test]
    async fn invalid_payment_setting_is_rejected_before_write() {
        let mut store = MockSettingsStore::new();
        store.expect_upsert().times(0);

        let service = SettingsService::new(
            Arc::new(store),
            Duration::from_secs(60),
            Duration::from_secs(1),
        );
        let err = service
            .upsert(QRIS_KEY, json!({ "enabled": "maybe" }), None, None)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::FieldValidation { ref field, .. } if field == "value"));
    }

    #[test]
    fn category_is_inferred_from_key_prefix() {
        assert_eq!(infer_category("site.hero_title"), "site");
        assert_eq!(infer_category("opening_hours"), "general");
    }
}
