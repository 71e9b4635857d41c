use crate::model::credential::DdnsCredential;
use crate::model::record::{RecordData, RecordType};
use crate::repository::cache::LookupCache;
use crate::service::database::{Error as DatabaseError, Pool, Transaction};
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::net::Ipv4Addr;
use std::sync::Arc;

/// Hex SHA-256 of an opaque token, the only form that ever reaches the
/// store.
pub fn hash_token(token: &str) -> String {
    let result = Sha256::new().chain_update(token).finalize();
    base16ct::lower::encode_string(&result)
}

#[derive(Debug)]
pub enum DdnsError {
    /// Unknown or disabled credential: an authentication failure.
    InvalidToken,
    /// The effective address is not an IPv4 literal: a client error.
    InvalidAddress(String),
    Database(DatabaseError),
}

impl Display for DdnsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidToken => write!(f, "invalid or disabled token"),
            Self::InvalidAddress(value) => write!(f, "invalid ipv4 address {value:?}"),
            Self::Database(error) => write!(f, "database error: {error}"),
        }
    }
}

impl std::error::Error for DdnsError {}

impl From<DatabaseError> for DdnsError {
    fn from(value: DatabaseError) -> Self {
        Self::Database(value)
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub fqdn: String,
    pub ip: Ipv4Addr,
    pub changed: bool,
}

/// The dynamic-DNS update path: the only externally driven mutation of
/// record rows. The replace runs in one transaction and ends with a
/// whole-cache clear so the next query sees the new address.
pub struct DdnsService {
    pool: Pool,
    cache: Arc<LookupCache>,
}

impl DdnsService {
    pub fn new(pool: Pool, cache: Arc<LookupCache>) -> Self {
        Self { pool, cache }
    }

    #[tracing::instrument(skip(self, token, ip, forwarded_for, real_ip))]
    pub async fn update(
        &self,
        token: &str,
        ip: Option<&str>,
        forwarded_for: Option<&str>,
        real_ip: Option<&str>,
        user_agent: &str,
    ) -> Result<UpdateOutcome, DdnsError> {
        let token_hash = hash_token(token);
        let credential: Option<DdnsCredential> = sqlx::query_as(
            r#"SELECT id, user_id, zone_id, fqdn, ttl, enabled
FROM ddns_credentials
WHERE token_hash = $1"#,
        )
        .bind(&token_hash)
        .fetch_optional(&self.pool)
        .await?;
        let credential = credential
            .filter(|credential| credential.enabled)
            .ok_or(DdnsError::InvalidToken)?;

        // explicit argument wins, then the proxy headers
        let raw = ip
            .or_else(|| forwarded_for.and_then(|header| header.split(',').next()))
            .or(real_ip)
            .unwrap_or_default()
            .trim();
        let address: Ipv4Addr = raw
            .parse()
            .map_err(|_| DdnsError::InvalidAddress(raw.to_string()))?;
        let new_value = address.to_string();

        let mut tx = self.pool.begin().await?;
        let previous: Option<String> = sqlx::query_scalar(
            r#"SELECT value FROM records
WHERE zone_id = $1 AND fqdn = $2 AND type = 'A'
ORDER BY id
LIMIT 1"#,
        )
        .bind(credential.zone_id)
        .bind(&credential.fqdn)
        .fetch_optional(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM records WHERE zone_id = $1 AND fqdn = $2 AND type = 'A'")
            .bind(credential.zone_id)
            .bind(&credential.fqdn)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"INSERT INTO records (zone_id, fqdn, type, ttl, value)
VALUES ($1, $2, 'A', $3, $4)"#,
        )
        .bind(credential.zone_id)
        .bind(&credential.fqdn)
        .bind(credential.ttl)
        .bind(&new_value)
        .execute(&mut *tx)
        .await?;

        bump_soa_serial(&mut tx, credential.zone_id).await?;

        sqlx::query(
            r#"INSERT INTO ddns_audit (credential_id, ip, previous_value, new_value, user_agent)
VALUES ($1, $2, $3, $4, $5)"#,
        )
        .bind(credential.id)
        .bind(&new_value)
        .bind(&previous)
        .bind(&new_value)
        .bind(user_agent)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.cache.clear();

        let changed = previous.as_deref() != Some(new_value.as_str());
        tracing::info!(
            "ddns update of {}: {} (changed: {changed})",
            credential.fqdn,
            new_value
        );
        Ok(UpdateOutcome {
            fqdn: credential.fqdn,
            ip: address,
            changed,
        })
    }
}

/// Secondaries watching the zone only notice the mutation if the SOA
/// serial moves, so the apex row is rewritten in the same transaction.
async fn bump_soa_serial(tx: &mut Transaction<'_>, zone_id: i64) -> Result<(), DatabaseError> {
    let row: Option<(i64, String)> = sqlx::query_as(
        r#"SELECT records.id, records.value
FROM records
JOIN zones ON zones.id = records.zone_id
WHERE records.zone_id = $1 AND records.type = 'SOA' AND records.fqdn = zones.name || '.'"#,
    )
    .bind(zone_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((record_id, value)) = row else {
        return Ok(());
    };
    match RecordData::parse(RecordType::SOA, &value) {
        Ok(RecordData::SOA {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        }) => {
            let bumped = RecordData::SOA {
                mname,
                rname,
                serial: serial.wrapping_add(1),
                refresh,
                retry,
                expire,
                minimum,
            };
            sqlx::query("UPDATE records SET value = $2, updated_at = UNIXEPOCH() WHERE id = $1")
                .bind(record_id)
                .bind(bumped.to_value())
                .execute(&mut *tx)
                .await?;
        }
        _ => tracing::warn!("soa of zone {zone_id} does not parse, serial not bumped"),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{hash_token, DdnsError, DdnsService};
    use crate::repository::cache;
    use crate::service::database::Pool;
    use std::sync::Arc;

    const TOKEN: &str = "very-opaque-secret";

    async fn seeded() -> (Pool, DdnsService, Arc<cache::LookupCache>) {
        let pool = crate::service::database::memory().await.unwrap();
        crate::service::database::migrate(&pool).await.unwrap();
        let zone_id: i64 = sqlx::query_scalar("INSERT INTO zones (name) VALUES ('z') RETURNING id")
            .fetch_one(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"INSERT INTO records (zone_id, fqdn, type, ttl, value)
VALUES ($1, 'z.', 'SOA', 3600, 'ns1.z. hostmaster.z. 41 7200 3600 1209600 300')"#,
        )
        .bind(zone_id)
        .execute(&pool)
        .await
        .unwrap();
        sqlx::query(
            r#"INSERT INTO ddns_credentials (user_id, zone_id, fqdn, token_hash, ttl)
VALUES (1, $1, 'home.z.', $2, 60)"#,
        )
        .bind(zone_id)
        .bind(hash_token(TOKEN))
        .execute(&pool)
        .await
        .unwrap();
        let lookup_cache = Arc::new(cache::Config::default().build());
        let service = DdnsService::new(pool.clone(), lookup_cache.clone());
        (pool, service, lookup_cache)
    }

    #[tokio::test]
    async fn should_reject_unknown_token() {
        let (_pool, service, _cache) = seeded().await;
        let error = service
            .update("nope", Some("5.6.7.8"), None, None, "test")
            .await
            .unwrap_err();
        assert!(matches!(error, DdnsError::InvalidToken));
    }

    #[tokio::test]
    async fn should_reject_disabled_credential() {
        let (pool, service, _cache) = seeded().await;
        sqlx::query("UPDATE ddns_credentials SET enabled = 0")
            .execute(&pool)
            .await
            .unwrap();
        let error = service
            .update(TOKEN, Some("5.6.7.8"), None, None, "test")
            .await
            .unwrap_err();
        assert!(matches!(error, DdnsError::InvalidToken));
    }

    #[tokio::test]
    async fn should_reject_bad_address() {
        let (_pool, service, _cache) = seeded().await;
        let error = service
            .update(TOKEN, Some("fe80::1"), None, None, "test")
            .await
            .unwrap_err();
        assert!(matches!(error, DdnsError::InvalidAddress(_)));
    }

    #[tokio::test]
    async fn should_create_record_and_audit_row() {
        let (pool, service, cache) = seeded().await;
        cache.persist("home.z.", Vec::new()).await;

        let outcome = service
            .update(TOKEN, Some("5.6.7.8"), None, None, "test-agent")
            .await
            .unwrap();
        assert_eq!(outcome.fqdn, "home.z.");
        assert!(outcome.changed);

        let (ttl, value): (u32, String) =
            sqlx::query_as("SELECT ttl, value FROM records WHERE fqdn = 'home.z.'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(ttl, 60);
        assert_eq!(value, "5.6.7.8");

        let (previous, new_value, agent): (Option<String>, String, String) = sqlx::query_as(
            "SELECT previous_value, new_value, user_agent FROM ddns_audit ORDER BY id DESC LIMIT 1",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(previous, None);
        assert_eq!(new_value, "5.6.7.8");
        assert_eq!(agent, "test-agent");

        // the mutation wiped the lookup cache
        assert!(cache.request("home.z.").await.is_none());
    }

    #[tokio::test]
    async fn should_report_unchanged_on_same_address() {
        let (pool, service, _cache) = seeded().await;
        let first = service
            .update(TOKEN, Some("5.6.7.8"), None, None, "test")
            .await
            .unwrap();
        assert!(first.changed);
        let second = service
            .update(TOKEN, Some("5.6.7.8"), None, None, "test")
            .await
            .unwrap();
        assert!(!second.changed);

        let count: i64 = sqlx::query_scalar("SELECT COUNT(id) FROM records WHERE fqdn = 'home.z.'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn should_fall_back_to_proxy_headers() {
        let (pool, service, _cache) = seeded().await;
        let outcome = service
            .update(TOKEN, None, Some("9.9.9.9, 10.0.0.1"), None, "test")
            .await
            .unwrap();
        assert_eq!(outcome.ip.to_string(), "9.9.9.9");

        let outcome = service
            .update(TOKEN, None, None, Some("8.8.8.8"), "test")
            .await
            .unwrap();
        assert_eq!(outcome.ip.to_string(), "8.8.8.8");

        let value: String = sqlx::query_scalar("SELECT value FROM records WHERE fqdn = 'home.z.'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(value, "8.8.8.8");
    }

    #[tokio::test]
    async fn should_bump_zone_soa_serial() {
        let (pool, service, _cache) = seeded().await;
        service
            .update(TOKEN, Some("5.6.7.8"), None, None, "test")
            .await
            .unwrap();
        let soa: String = sqlx::query_scalar("SELECT value FROM records WHERE type = 'SOA'")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(soa, "ns1.z. hostmaster.z. 42 7200 3600 1209600 300");
    }
}
