use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// A dynamic-DNS credential: bound to a single fqdn within a zone, it
/// can only replace that name's A-record. Only the SHA-256 of the opaque
/// secret is ever stored.
#[derive(Clone, Debug)]
pub struct DdnsCredential {
    pub id: i64,
    pub user_id: i64,
    pub zone_id: i64,
    pub fqdn: String,
    pub ttl: u32,
    pub enabled: bool,
}

impl FromRow<'_, SqliteRow> for DdnsCredential {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get(0)?,
            user_id: row.try_get(1)?,
            zone_id: row.try_get(2)?,
            fqdn: row.try_get(3)?,
            ttl: row.try_get(4)?,
            enabled: row.try_get(5)?,
        })
    }
}
