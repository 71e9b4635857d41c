use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// A zone this server is authoritative for. The name is stored in bare
/// form (`example.com`); queries compare against the fully-qualified
/// form.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Zone {
    pub id: i64,
    pub name: String,
}

impl FromRow<'_, SqliteRow> for Zone {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get(0)?,
            name: row.try_get(1)?,
        })
    }
}

impl Zone {
    /// The fully-qualified name of the zone apex.
    pub fn apex(&self) -> String {
        format!("{}.", self.name)
    }
}

/// Every name a zone could have so that it covers `fqdn`: the name
/// itself and each suffix starting at a label boundary. `xevil.com`
/// never yields `evil.com`, which rules out the classic suffix-match
/// confusion.
pub fn candidate_zone_names(fqdn: &str) -> Vec<String> {
    let bare = fqdn.trim_end_matches('.');
    let mut candidates = Vec::new();
    let mut rest = bare;
    loop {
        if !rest.is_empty() {
            candidates.push(rest.to_string());
        }
        match rest.split_once('.') {
            Some((_, tail)) => rest = tail,
            None => break,
        }
    }
    candidates
}
