use crate::model::record::StoredRecord;
use crate::model::zone::{candidate_zone_names, Zone};
use crate::service::database::{Error, Pool};

/// Column list shared by every query returning record rows, in the
/// order `StoredRecord::from_row` expects.
const RECORD_COLUMNS: &str =
    "id, zone_id, fqdn, type, ttl, value, weight, geo_cidrs, enabled, healthcheck_url, healthy";

/// An enabled record with a probe URL, as the health checker sees it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthTarget {
    pub record_id: i64,
    pub url: String,
}

/// Read surface of the durable store, plus the single write the health
/// checker needs. Everything else that mutates rows belongs to the
/// control plane.
#[async_trait::async_trait]
pub trait RecordStore {
    /// All rows for the exact canonical name, unfiltered, CNAME rows
    /// first, then A/AAAA, then the rest.
    async fn lookup(&self, fqdn: &str) -> Result<Vec<StoredRecord>, Error>;

    /// The longest zone equal to `fqdn` or a proper suffix of it on a
    /// label boundary.
    async fn resolve_zone(&self, fqdn: &str) -> Result<Option<Zone>, Error>;

    /// SOA and NS rows at the zone apex, SOA first.
    async fn authority(&self, zone: &Zone) -> Result<Vec<StoredRecord>, Error>;

    async fn health_targets(&self) -> Result<Vec<HealthTarget>, Error>;

    async fn update_health(
        &self,
        record_id: i64,
        healthy: bool,
        error: Option<&str>,
    ) -> Result<(), Error>;
}

pub struct SqliteRecordStore {
    pool: Pool,
}

impl SqliteRecordStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait::async_trait]
impl RecordStore for SqliteRecordStore {
    #[tracing::instrument(skip(self))]
    async fn lookup(&self, fqdn: &str) -> Result<Vec<StoredRecord>, Error> {
        let sql = format!(
            r#"SELECT {RECORD_COLUMNS}
FROM records
WHERE fqdn = $1
ORDER BY CASE type WHEN 'CNAME' THEN 0 WHEN 'A' THEN 1 WHEN 'AAAA' THEN 1 ELSE 2 END, id"#,
        );
        sqlx::query_as::<_, StoredRecord>(&sql)
            .bind(fqdn)
            .fetch_all(&self.pool)
            .await
    }

    #[tracing::instrument(skip(self))]
    async fn resolve_zone(&self, fqdn: &str) -> Result<Option<Zone>, Error> {
        let candidates = candidate_zone_names(fqdn);
        if candidates.is_empty() {
            return Ok(None);
        }
        let placeholders = (1..=candidates.len())
            .map(|index| format!("${index}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"SELECT id, name
FROM zones
WHERE name IN ({placeholders})
ORDER BY LENGTH(name) DESC
LIMIT 1"#,
        );
        let mut query = sqlx::query_as::<_, Zone>(&sql);
        for name in &candidates {
            query = query.bind(name);
        }
        query.fetch_optional(&self.pool).await
    }

    #[tracing::instrument(skip(self, zone), fields(zone = %zone.name))]
    async fn authority(&self, zone: &Zone) -> Result<Vec<StoredRecord>, Error> {
        let sql = format!(
            r#"SELECT {RECORD_COLUMNS}
FROM records
WHERE zone_id = $1 AND fqdn = $2 AND type IN ('SOA', 'NS')
ORDER BY CASE type WHEN 'SOA' THEN 0 ELSE 1 END, id"#,
        );
        sqlx::query_as::<_, StoredRecord>(&sql)
            .bind(zone.id)
            .bind(zone.apex())
            .fetch_all(&self.pool)
            .await
    }

    async fn health_targets(&self) -> Result<Vec<HealthTarget>, Error> {
        let rows: Vec<(i64, String)> = sqlx::query_as(
            r#"SELECT id, healthcheck_url
FROM records
WHERE enabled = 1 AND healthcheck_url IS NOT NULL AND healthcheck_url != ''
ORDER BY id"#,
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(record_id, url)| HealthTarget { record_id, url })
            .collect())
    }

    #[tracing::instrument(skip(self, error))]
    async fn update_health(
        &self,
        record_id: i64,
        healthy: bool,
        error: Option<&str>,
    ) -> Result<(), Error> {
        sqlx::query(
            r#"UPDATE records
SET healthy = $2, last_health_error = $3, last_health_check_at = UNIXEPOCH(), updated_at = UNIXEPOCH()
WHERE id = $1"#,
        )
        .bind(record_id)
        .bind(healthy)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default)]
pub struct MockRecordStore {
    zones: Vec<Zone>,
    records: Vec<StoredRecord>,
    broken: bool,
}

#[cfg(test)]
impl MockRecordStore {
    pub fn with_zone(mut self, id: i64, name: &str) -> Self {
        self.zones.push(Zone {
            id,
            name: name.to_string(),
        });
        self
    }

    pub fn with_record(mut self, record: StoredRecord) -> Self {
        self.records.push(record);
        self
    }

    pub fn broken() -> Self {
        Self {
            broken: true,
            ..Default::default()
        }
    }
}

#[cfg(test)]
#[async_trait::async_trait]
impl RecordStore for MockRecordStore {
    async fn lookup(&self, fqdn: &str) -> Result<Vec<StoredRecord>, Error> {
        if self.broken {
            return Err(Error::PoolClosed);
        }
        let mut records: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|record| record.fqdn == fqdn)
            .cloned()
            .collect();
        records.sort_by_key(|record| {
            let group = match record.rtype {
                crate::model::record::RecordType::CNAME => 0,
                crate::model::record::RecordType::A | crate::model::record::RecordType::AAAA => 1,
                _ => 2,
            };
            (group, record.id)
        });
        Ok(records)
    }

    async fn resolve_zone(&self, fqdn: &str) -> Result<Option<Zone>, Error> {
        if self.broken {
            return Err(Error::PoolClosed);
        }
        let mut found: Option<&Zone> = None;
        for candidate in candidate_zone_names(fqdn) {
            if let Some(zone) = self.zones.iter().find(|zone| zone.name == candidate) {
                match found {
                    Some(previous) if previous.name.len() >= zone.name.len() => {}
                    _ => found = Some(zone),
                }
            }
        }
        Ok(found.cloned())
    }

    async fn authority(&self, zone: &Zone) -> Result<Vec<StoredRecord>, Error> {
        let apex = zone.apex();
        let mut records: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|record| {
                record.zone_id == zone.id
                    && record.fqdn == apex
                    && matches!(
                        record.rtype,
                        crate::model::record::RecordType::SOA
                            | crate::model::record::RecordType::NS
                    )
            })
            .cloned()
            .collect();
        records.sort_by_key(|record| {
            let group = match record.rtype {
                crate::model::record::RecordType::SOA => 0,
                _ => 1,
            };
            (group, record.id)
        });
        Ok(records)
    }

    async fn health_targets(&self) -> Result<Vec<HealthTarget>, Error> {
        Ok(self
            .records
            .iter()
            .filter(|record| record.enabled && record.health_checked())
            .map(|record| HealthTarget {
                record_id: record.id,
                url: record.healthcheck_url.clone().unwrap_or_default(),
            })
            .collect())
    }

    async fn update_health(
        &self,
        _record_id: i64,
        _healthy: bool,
        _error: Option<&str>,
    ) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordStore, SqliteRecordStore};
    use crate::service::database::Pool;

    async fn seeded_pool() -> Pool {
        let pool = crate::service::database::memory().await.unwrap();
        crate::service::database::migrate(&pool).await.unwrap();
        pool
    }

    async fn insert_zone(pool: &Pool, name: &str) -> i64 {
        sqlx::query_scalar("INSERT INTO zones (name) VALUES ($1) RETURNING id")
            .bind(name)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    async fn insert_record(pool: &Pool, zone_id: i64, fqdn: &str, rtype: &str, value: &str) -> i64 {
        sqlx::query_scalar(
            r#"INSERT INTO records (zone_id, fqdn, type, ttl, value)
VALUES ($1, $2, $3, 60, $4)
RETURNING id"#,
        )
        .bind(zone_id)
        .bind(fqdn)
        .bind(rtype)
        .bind(value)
        .fetch_one(pool)
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn should_sort_cname_before_addresses() {
        let pool = seeded_pool().await;
        let zone_id = insert_zone(&pool, "example.com").await;
        insert_record(&pool, zone_id, "www.example.com.", "TXT", "hello").await;
        insert_record(&pool, zone_id, "www.example.com.", "A", "10.0.0.1").await;
        insert_record(&pool, zone_id, "www.example.com.", "CNAME", "example.com.").await;

        let store = SqliteRecordStore::new(pool);
        let records = store.lookup("www.example.com.").await.unwrap();
        let types: Vec<&str> = records.iter().map(|r| r.rtype.as_str()).collect();
        assert_eq!(types, vec!["CNAME", "A", "TXT"]);
    }

    #[tokio::test]
    async fn should_resolve_longest_zone_suffix() {
        let pool = seeded_pool().await;
        insert_zone(&pool, "example.com").await;
        insert_zone(&pool, "internal.example.com").await;

        let store = SqliteRecordStore::new(pool);
        let zone = store
            .resolve_zone("db.internal.example.com.")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(zone.name, "internal.example.com");

        let zone = store.resolve_zone("www.example.com.").await.unwrap().unwrap();
        assert_eq!(zone.name, "example.com");
    }

    #[tokio::test]
    async fn should_resolve_zone_on_label_boundary_only() {
        let pool = seeded_pool().await;
        insert_zone(&pool, "evil.com").await;

        let store = SqliteRecordStore::new(pool);
        assert!(store.resolve_zone("xevil.com.").await.unwrap().is_none());
        assert!(store.resolve_zone("evil.com.").await.unwrap().is_some());
        assert!(store.resolve_zone("a.evil.com.").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn should_return_authority_soa_before_ns() {
        let pool = seeded_pool().await;
        let zone_id = insert_zone(&pool, "example.com").await;
        insert_record(&pool, zone_id, "example.com.", "NS", "ns1.example.com.").await;
        insert_record(&pool, zone_id, "example.com.", "NS", "ns2.example.com.").await;
        insert_record(
            &pool,
            zone_id,
            "example.com.",
            "SOA",
            "ns1.example.com. hostmaster.example.com. 1 7200 3600 1209600 300",
        )
        .await;

        let store = SqliteRecordStore::new(pool);
        let zone = store.resolve_zone("example.com.").await.unwrap().unwrap();
        let records = store.authority(&zone).await.unwrap();
        let types: Vec<&str> = records.iter().map(|r| r.rtype.as_str()).collect();
        assert_eq!(types, vec!["SOA", "NS", "NS"]);
    }

    #[tokio::test]
    async fn should_list_and_update_health_targets() {
        let pool = seeded_pool().await;
        let zone_id = insert_zone(&pool, "example.com").await;
        insert_record(&pool, zone_id, "app.example.com.", "A", "10.0.0.1").await;
        let checked: i64 = sqlx::query_scalar(
            r#"INSERT INTO records (zone_id, fqdn, type, ttl, value, healthcheck_url)
VALUES ($1, 'app.example.com.', 'A', 60, '10.0.0.2', 'http://10.0.0.2/health')
RETURNING id"#,
        )
        .bind(zone_id)
        .fetch_one(&pool)
        .await
        .unwrap();

        let store = SqliteRecordStore::new(pool);
        let targets = store.health_targets().await.unwrap();
        assert_eq!(targets.len(), 1);
        assert_eq!(targets[0].record_id, checked);

        store
            .update_health(checked, false, Some("status 503"))
            .await
            .unwrap();
        let records = store.lookup("app.example.com.").await.unwrap();
        let row = records.iter().find(|r| r.id == checked).unwrap();
        assert!(!row.healthy);
    }
}
