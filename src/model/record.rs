use ipnet::IpNet;
use shepherd_proto::packet::record::Record;
use shepherd_proto::packet::QueryType;
use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};
use std::fmt::Display;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// The closed set of record types the store accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    A,
    AAAA,
    CNAME,
    NS,
    SOA,
    MX,
    TXT,
    CAA,
    SRV,
    PTR,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::AAAA => "AAAA",
            Self::CNAME => "CNAME",
            Self::NS => "NS",
            Self::SOA => "SOA",
            Self::MX => "MX",
            Self::TXT => "TXT",
            Self::CAA => "CAA",
            Self::SRV => "SRV",
            Self::PTR => "PTR",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "A" => Some(Self::A),
            "AAAA" => Some(Self::AAAA),
            "CNAME" => Some(Self::CNAME),
            "NS" => Some(Self::NS),
            "SOA" => Some(Self::SOA),
            "MX" => Some(Self::MX),
            "TXT" => Some(Self::TXT),
            "CAA" => Some(Self::CAA),
            "SRV" => Some(Self::SRV),
            "PTR" => Some(Self::PTR),
            _ => None,
        }
    }

    pub fn from_qtype(qtype: QueryType) -> Option<Self> {
        match qtype {
            QueryType::A => Some(Self::A),
            QueryType::AAAA => Some(Self::AAAA),
            QueryType::CNAME => Some(Self::CNAME),
            QueryType::NS => Some(Self::NS),
            QueryType::SOA => Some(Self::SOA),
            QueryType::MX => Some(Self::MX),
            QueryType::TXT => Some(Self::TXT),
            QueryType::CAA => Some(Self::CAA),
            QueryType::SRV => Some(Self::SRV),
            QueryType::PTR => Some(Self::PTR),
            QueryType::ANY | QueryType::Unknown(_) => None,
        }
    }
}

impl Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum ValueError {
    Address(String),
    Name(String),
    Number(String),
    Fields { expected: usize, found: usize },
}

impl Display for ValueError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Address(value) => write!(f, "invalid address {value:?}"),
            Self::Name(value) => write!(f, "invalid domain name {value:?}"),
            Self::Number(value) => write!(f, "invalid number {value:?}"),
            Self::Fields { expected, found } => {
                write!(f, "expected {expected} fields, found {found}")
            }
        }
    }
}

impl std::error::Error for ValueError {}

fn parse_name(value: &str) -> Result<String, ValueError> {
    let bare = value.trim_end_matches('.');
    if bare.is_empty() || bare.split('.').any(|label| label.is_empty() || label.len() > 63) {
        return Err(ValueError::Name(value.to_string()));
    }
    Ok(format!("{}.", bare.to_lowercase()))
}

fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, ValueError> {
    value
        .parse()
        .map_err(|_| ValueError::Number(value.to_string()))
}

/// The type-specific payload of a record. The textual representation
/// only exists at the store boundary: it is validated into this union on
/// ingest and encoded straight to wire form at query time.
#[derive(Clone, Debug, PartialEq, Eq)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordData {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),
    CNAME(String),
    NS(String),
    PTR(String),
    SOA {
        mname: String,
        rname: String,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    MX {
        preference: u16,
        exchange: String,
    },
    TXT(String),
    CAA {
        flags: u8,
        tag: String,
        value: String,
    },
    SRV {
        priority: u16,
        weight: u16,
        port: u16,
        target: String,
    },
}

impl RecordData {
    pub fn parse(rtype: RecordType, value: &str) -> Result<Self, ValueError> {
        match rtype {
            RecordType::A => value
                .parse()
                .map(Self::A)
                .map_err(|_| ValueError::Address(value.to_string())),
            RecordType::AAAA => value
                .parse()
                .map(Self::AAAA)
                .map_err(|_| ValueError::Address(value.to_string())),
            RecordType::CNAME => parse_name(value).map(Self::CNAME),
            RecordType::NS => parse_name(value).map(Self::NS),
            RecordType::PTR => parse_name(value).map(Self::PTR),
            RecordType::SOA => {
                let fields: Vec<&str> = value.split_whitespace().collect();
                if fields.len() != 7 {
                    return Err(ValueError::Fields {
                        expected: 7,
                        found: fields.len(),
                    });
                }
                Ok(Self::SOA {
                    mname: parse_name(fields[0])?,
                    rname: parse_name(fields[1])?,
                    serial: parse_number(fields[2])?,
                    refresh: parse_number(fields[3])?,
                    retry: parse_number(fields[4])?,
                    expire: parse_number(fields[5])?,
                    minimum: parse_number(fields[6])?,
                })
            }
            RecordType::MX => {
                let fields: Vec<&str> = value.split_whitespace().collect();
                if fields.len() != 2 {
                    return Err(ValueError::Fields {
                        expected: 2,
                        found: fields.len(),
                    });
                }
                Ok(Self::MX {
                    preference: parse_number(fields[0])?,
                    exchange: parse_name(fields[1])?,
                })
            }
            RecordType::TXT => Ok(Self::TXT(value.to_string())),
            RecordType::CAA => {
                let mut fields = value.splitn(3, char::is_whitespace);
                let flags = fields.next().unwrap_or_default();
                let tag = fields
                    .next()
                    .filter(|tag| !tag.is_empty() && tag.chars().all(|c| c.is_ascii_alphanumeric()))
                    .ok_or_else(|| ValueError::Name(value.to_string()))?;
                let rest = fields.next().unwrap_or_default();
                Ok(Self::CAA {
                    flags: parse_number(flags)?,
                    tag: tag.to_string(),
                    value: rest.trim_matches('"').to_string(),
                })
            }
            RecordType::SRV => {
                let fields: Vec<&str> = value.split_whitespace().collect();
                if fields.len() != 4 {
                    return Err(ValueError::Fields {
                        expected: 4,
                        found: fields.len(),
                    });
                }
                Ok(Self::SRV {
                    priority: parse_number(fields[0])?,
                    weight: parse_number(fields[1])?,
                    port: parse_number(fields[2])?,
                    target: parse_name(fields[3])?,
                })
            }
        }
    }

    pub fn rtype(&self) -> RecordType {
        match self {
            Self::A(_) => RecordType::A,
            Self::AAAA(_) => RecordType::AAAA,
            Self::CNAME(_) => RecordType::CNAME,
            Self::NS(_) => RecordType::NS,
            Self::PTR(_) => RecordType::PTR,
            Self::SOA { .. } => RecordType::SOA,
            Self::MX { .. } => RecordType::MX,
            Self::TXT(_) => RecordType::TXT,
            Self::CAA { .. } => RecordType::CAA,
            Self::SRV { .. } => RecordType::SRV,
        }
    }

    /// The textual form stored in the `value` column.
    pub fn to_value(&self) -> String {
        match self {
            Self::A(addr) => addr.to_string(),
            Self::AAAA(addr) => addr.to_string(),
            Self::CNAME(name) | Self::NS(name) | Self::PTR(name) => name.clone(),
            Self::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => format!("{mname} {rname} {serial} {refresh} {retry} {expire} {minimum}"),
            Self::MX {
                preference,
                exchange,
            } => format!("{preference} {exchange}"),
            Self::TXT(text) => text.clone(),
            Self::CAA { flags, tag, value } => format!("{flags} {tag} {value}"),
            Self::SRV {
                priority,
                weight,
                port,
                target,
            } => format!("{priority} {weight} {port} {target}"),
        }
    }

    /// Wire-form record for an answer or authority section. Names lose
    /// their trailing dot here; the codec writes label form either way.
    pub fn into_record(self, fqdn: &str, ttl: u32) -> Record {
        let domain = fqdn.trim_end_matches('.').to_string();
        match self {
            Self::A(addr) => Record::A { domain, addr, ttl },
            Self::AAAA(addr) => Record::AAAA { domain, addr, ttl },
            Self::CNAME(host) => Record::CNAME {
                domain,
                host: host.trim_end_matches('.').to_string(),
                ttl,
            },
            Self::NS(host) => Record::NS {
                domain,
                host: host.trim_end_matches('.').to_string(),
                ttl,
            },
            Self::PTR(host) => Record::PTR {
                domain,
                host: host.trim_end_matches('.').to_string(),
                ttl,
            },
            Self::SOA {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => Record::SOA {
                domain,
                mname: mname.trim_end_matches('.').to_string(),
                rname: rname.trim_end_matches('.').to_string(),
                serial,
                refresh,
                retry,
                expire,
                minimum,
                ttl,
            },
            Self::MX {
                preference,
                exchange,
            } => Record::MX {
                domain,
                priority: preference,
                host: exchange.trim_end_matches('.').to_string(),
                ttl,
            },
            Self::TXT(data) => Record::TXT { domain, data, ttl },
            Self::CAA { flags, tag, value } => Record::CAA {
                domain,
                flags,
                tag,
                value,
                ttl,
            },
            Self::SRV {
                priority,
                weight,
                port,
                target,
            } => Record::SRV {
                domain,
                priority,
                weight,
                port,
                target: target.trim_end_matches('.').to_string(),
                ttl,
            },
        }
    }
}

/// A record row as the store returns it: unfiltered, with the routing
/// attributes the selection engine works from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredRecord {
    pub id: i64,
    pub zone_id: i64,
    pub fqdn: String,
    pub rtype: RecordType,
    pub ttl: u32,
    pub value: String,
    pub weight: u32,
    pub geo_cidrs: String,
    pub enabled: bool,
    pub healthcheck_url: Option<String>,
    pub healthy: bool,
}

impl FromRow<'_, SqliteRow> for StoredRecord {
    fn from_row(row: &SqliteRow) -> Result<Self, sqlx::Error> {
        let rtype: String = row.try_get(3)?;
        let rtype =
            RecordType::from_str(&rtype).ok_or(sqlx::Error::TypeNotFound { type_name: rtype })?;
        Ok(Self {
            id: row.try_get(0)?,
            zone_id: row.try_get(1)?,
            fqdn: row.try_get(2)?,
            rtype,
            ttl: row.try_get(4)?,
            value: row.try_get(5)?,
            weight: row.try_get(6)?,
            geo_cidrs: row.try_get(7)?,
            enabled: row.try_get(8)?,
            healthcheck_url: row.try_get(9)?,
            healthy: row.try_get(10)?,
        })
    }
}

impl StoredRecord {
    pub fn data(&self) -> Result<RecordData, ValueError> {
        RecordData::parse(self.rtype, &self.value)
    }

    /// Wire-form record, or `None` when the stored value does not parse.
    /// The control plane validates on ingest so this only happens on a
    /// corrupted row; the caller logs and skips it.
    pub fn to_record(&self) -> Option<Record> {
        self.data()
            .ok()
            .map(|data| data.into_record(&self.fqdn, self.ttl))
    }

    pub fn has_geo(&self) -> bool {
        self.geo_cidrs.split(',').any(|cidr| !cidr.trim().is_empty())
    }

    /// Whether any of the record's CIDRs contains the client address.
    pub fn matches_client(&self, client: &IpAddr) -> bool {
        self.geo_cidrs
            .split(',')
            .filter_map(|cidr| cidr.trim().parse::<IpNet>().ok())
            .any(|net| net.contains(client))
    }

    /// Whether the record is subject to health checking at all.
    pub fn health_checked(&self) -> bool {
        self.healthcheck_url
            .as_deref()
            .map(|url| !url.is_empty())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::{RecordData, RecordType, ValueError};
    use shepherd_proto::packet::record::Record;
    use std::net::{IpAddr, Ipv4Addr};

    fn stored(rtype: RecordType, value: &str, geo: &str) -> super::StoredRecord {
        super::StoredRecord {
            id: 1,
            zone_id: 1,
            fqdn: "www.example.com.".into(),
            rtype,
            ttl: 60,
            value: value.into(),
            weight: 100,
            geo_cidrs: geo.into(),
            enabled: true,
            healthcheck_url: None,
            healthy: true,
        }
    }

    #[test]
    fn should_parse_address_records() {
        assert_eq!(
            RecordData::parse(RecordType::A, "127.0.0.1"),
            Ok(RecordData::A(Ipv4Addr::LOCALHOST))
        );
        assert!(matches!(
            RecordData::parse(RecordType::AAAA, "fe80::1"),
            Ok(RecordData::AAAA(_))
        ));
        assert_eq!(
            RecordData::parse(RecordType::A, "999.0.0.1"),
            Err(ValueError::Address("999.0.0.1".into()))
        );
    }

    #[test]
    fn should_canonicalize_names() {
        assert_eq!(
            RecordData::parse(RecordType::CNAME, "API.Example.COM"),
            Ok(RecordData::CNAME("api.example.com.".into()))
        );
        assert_eq!(
            RecordData::parse(RecordType::NS, "ns1.example.com."),
            Ok(RecordData::NS("ns1.example.com.".into()))
        );
        assert!(RecordData::parse(RecordType::CNAME, "a..b").is_err());
    }

    #[test]
    fn should_parse_soa_and_keep_textual_form() {
        let value = "ns1.example.com. hostmaster.example.com. 2023010101 7200 3600 1209600 300";
        let data = RecordData::parse(RecordType::SOA, value).unwrap();
        assert_eq!(data.to_value(), value);
        assert!(matches!(
            RecordData::parse(RecordType::SOA, "ns1.example.com. 42"),
            Err(ValueError::Fields { expected: 7, .. })
        ));
    }

    #[test]
    fn should_parse_mx_srv_caa() {
        assert_eq!(
            RecordData::parse(RecordType::MX, "10 mail.example.com"),
            Ok(RecordData::MX {
                preference: 10,
                exchange: "mail.example.com.".into(),
            })
        );
        assert_eq!(
            RecordData::parse(RecordType::SRV, "10 60 5060 sip.example.com"),
            Ok(RecordData::SRV {
                priority: 10,
                weight: 60,
                port: 5060,
                target: "sip.example.com.".into(),
            })
        );
        assert_eq!(
            RecordData::parse(RecordType::CAA, "0 issue letsencrypt.org"),
            Ok(RecordData::CAA {
                flags: 0,
                tag: "issue".into(),
                value: "letsencrypt.org".into(),
            })
        );
    }

    #[test]
    fn should_convert_to_wire_record() {
        let record = stored(RecordType::A, "10.0.0.1", "").to_record().unwrap();
        assert_eq!(
            record,
            Record::A {
                domain: "www.example.com".into(),
                addr: Ipv4Addr::new(10, 0, 0, 1),
                ttl: 60,
            }
        );
    }

    #[test]
    fn should_match_geo_cidrs_strictly() {
        let record = stored(RecordType::A, "10.0.0.1", "10.0.0.0/24");
        assert!(record.matches_client(&IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5))));
        assert!(!record.matches_client(&IpAddr::V4(Ipv4Addr::new(10, 0, 1, 5))));
        assert!(record.has_geo());
        assert!(!stored(RecordType::A, "10.0.0.1", "").has_geo());
    }

    #[test]
    fn should_match_any_of_multiple_cidrs() {
        let record = stored(RecordType::A, "10.0.0.1", "10.0.0.0/24, 192.0.2.0/25");
        assert!(record.matches_client(&IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5))));
        assert!(!record.matches_client(&IpAddr::V4(Ipv4Addr::new(192, 0, 2, 200))));
    }
}
