use crate::model::record::{RecordType, StoredRecord};
use rand::Rng;
use shepherd_proto::packet::QueryType;
use std::net::IpAddr;

/// Picks the answer set for a query out of the unfiltered rows of a
/// name. Address-like types (A, AAAA, CNAME) are narrowed to a single
/// row by geo, health and weight; every other supported type answers
/// with all rows of the exact type.
pub fn select<R: Rng>(
    rows: &[StoredRecord],
    qtype: QueryType,
    client: Option<IpAddr>,
    rng: &mut R,
) -> Vec<StoredRecord> {
    let pool: Vec<&StoredRecord> = rows.iter().filter(|row| row.enabled).collect();
    if pool.is_empty() {
        return Vec::new();
    }

    match qtype {
        QueryType::ANY => {
            let mut answers = Vec::new();
            for rtype in [RecordType::CNAME, RecordType::A, RecordType::AAAA] {
                let candidates: Vec<&StoredRecord> = pool
                    .iter()
                    .filter(|row| row.rtype == rtype)
                    .copied()
                    .collect();
                if let Some(winner) = pick_one(candidates, client.as_ref(), rng) {
                    answers.push(winner.clone());
                }
            }
            answers.extend(
                pool.iter()
                    .filter(|row| {
                        !matches!(
                            row.rtype,
                            RecordType::CNAME | RecordType::A | RecordType::AAAA
                        )
                    })
                    .map(|row| (*row).clone()),
            );
            answers
        }
        QueryType::A | QueryType::AAAA | QueryType::CNAME => {
            // an alias shadows address rows for the same name
            let cnames: Vec<&StoredRecord> = pool
                .iter()
                .filter(|row| row.rtype == RecordType::CNAME)
                .copied()
                .collect();
            let candidates = if cnames.is_empty() {
                let wanted = match qtype {
                    QueryType::A => RecordType::A,
                    QueryType::AAAA => RecordType::AAAA,
                    _ => RecordType::CNAME,
                };
                pool.iter()
                    .filter(|row| row.rtype == wanted)
                    .copied()
                    .collect()
            } else {
                cnames
            };
            pick_one(candidates, client.as_ref(), rng)
                .map(|winner| vec![winner.clone()])
                .unwrap_or_default()
        }
        other => match RecordType::from_qtype(other) {
            Some(wanted) => pool
                .iter()
                .filter(|row| row.rtype == wanted)
                .map(|row| (*row).clone())
                .collect(),
            None => Vec::new(),
        },
    }
}

/// Geo filter, health filter, then a weighted draw.
fn pick_one<'r, R: Rng>(
    candidates: Vec<&'r StoredRecord>,
    client: Option<&IpAddr>,
    rng: &mut R,
) -> Option<&'r StoredRecord> {
    if candidates.is_empty() {
        return None;
    }

    // rows pinned to the client's networks beat unpinned rows; rows
    // pinned elsewhere only serve when nothing else is left
    let scope = match client {
        Some(client) => {
            let matched: Vec<&StoredRecord> = candidates
                .iter()
                .filter(|row| row.has_geo() && row.matches_client(client))
                .copied()
                .collect();
            if !matched.is_empty() {
                matched
            } else {
                let unpinned: Vec<&StoredRecord> = candidates
                    .iter()
                    .filter(|row| !row.has_geo())
                    .copied()
                    .collect();
                if !unpinned.is_empty() {
                    unpinned
                } else {
                    candidates
                }
            }
        }
        None => candidates,
    };

    // fail-open: an all-unhealthy pool serves anyway
    let alive: Vec<&StoredRecord> = scope
        .iter()
        .filter(|row| !(row.health_checked() && !row.healthy))
        .copied()
        .collect();
    let mut scope = if alive.is_empty() { scope } else { alive };

    scope.sort_by_key(|row| row.id);
    weighted_draw(&scope, rng)
}

fn weighted_draw<'r, R: Rng>(rows: &[&'r StoredRecord], rng: &mut R) -> Option<&'r StoredRecord> {
    if rows.is_empty() {
        return None;
    }
    let total: u64 = rows.iter().map(|row| u64::from(row.weight.max(1))).sum();
    let mut draw = rng.gen_range(0..total);
    for row in rows {
        let weight = u64::from(row.weight.max(1));
        if draw < weight {
            return Some(row);
        }
        draw -= weight;
    }
    rows.last().copied()
}

#[cfg(test)]
mod tests {
    use super::select;
    use crate::model::record::{RecordType, StoredRecord};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use shepherd_proto::packet::QueryType;
    use std::net::{IpAddr, Ipv4Addr};

    fn row(id: i64, rtype: RecordType, value: &str) -> StoredRecord {
        StoredRecord {
            id,
            zone_id: 1,
            fqdn: "app.z.".into(),
            rtype,
            ttl: 60,
            value: value.into(),
            weight: 100,
            geo_cidrs: String::new(),
            enabled: true,
            healthcheck_url: None,
            healthy: true,
        }
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(42)
    }

    #[test]
    fn should_return_single_weighted_answer() {
        let rows = vec![
            row(1, RecordType::A, "1.1.1.1"),
            row(2, RecordType::A, "2.2.2.2"),
        ];
        let answers = select(&rows, QueryType::A, None, &mut rng());
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].rtype, RecordType::A);
        assert!(rows.contains(&answers[0]));
    }

    #[test]
    fn should_skip_disabled_rows() {
        let mut disabled = row(1, RecordType::A, "1.1.1.1");
        disabled.enabled = false;
        let rows = vec![disabled, row(2, RecordType::A, "2.2.2.2")];
        let answers = select(&rows, QueryType::A, None, &mut rng());
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].id, 2);

        let mut both_disabled = rows.clone();
        both_disabled[1].enabled = false;
        assert!(select(&both_disabled, QueryType::A, None, &mut rng()).is_empty());
    }

    #[test]
    fn should_prefer_cname_over_addresses() {
        let rows = vec![
            row(1, RecordType::A, "1.1.1.1"),
            row(2, RecordType::CNAME, "other.z."),
        ];
        let answers = select(&rows, QueryType::A, None, &mut rng());
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].rtype, RecordType::CNAME);
    }

    #[test]
    fn should_return_all_rows_for_multi_valued_types() {
        let rows = vec![
            row(1, RecordType::NS, "ns1.z."),
            row(2, RecordType::NS, "ns2.z."),
            row(3, RecordType::A, "1.1.1.1"),
        ];
        let answers = select(&rows, QueryType::NS, None, &mut rng());
        assert_eq!(answers.len(), 2);
        assert!(answers.iter().all(|r| r.rtype == RecordType::NS));
    }

    #[test]
    fn should_return_empty_for_unsupported_qtype() {
        let rows = vec![row(1, RecordType::A, "1.1.1.1")];
        assert!(select(&rows, QueryType::Unknown(99), None, &mut rng()).is_empty());
    }

    #[test]
    fn should_group_any_queries() {
        let rows = vec![
            row(1, RecordType::A, "1.1.1.1"),
            row(2, RecordType::A, "2.2.2.2"),
            row(3, RecordType::AAAA, "::1"),
            row(4, RecordType::TXT, "hello"),
            row(5, RecordType::TXT, "world"),
        ];
        let answers = select(&rows, QueryType::ANY, None, &mut rng());
        let a_count = answers.iter().filter(|r| r.rtype == RecordType::A).count();
        let aaaa_count = answers
            .iter()
            .filter(|r| r.rtype == RecordType::AAAA)
            .count();
        let txt_count = answers
            .iter()
            .filter(|r| r.rtype == RecordType::TXT)
            .count();
        assert_eq!((a_count, aaaa_count, txt_count), (1, 1, 2));
    }

    #[test]
    fn should_converge_to_weight_ratio() {
        let mut first = row(1, RecordType::A, "1.1.1.1");
        first.weight = 60;
        let mut second = row(2, RecordType::A, "2.2.2.2");
        second.weight = 40;
        let rows = vec![first, second];

        let mut rng = rng();
        let mut hits = 0usize;
        for _ in 0..10_000 {
            let answers = select(&rows, QueryType::A, None, &mut rng);
            if answers[0].id == 1 {
                hits += 1;
            }
        }
        let ratio = hits as f64 / 10_000.0;
        assert!((0.58..=0.62).contains(&ratio), "ratio was {ratio}");
    }

    #[test]
    fn should_route_by_client_subnet() {
        let mut pinned = row(1, RecordType::A, "1.1.1.1");
        pinned.geo_cidrs = "10.0.0.0/24".into();
        let rows = vec![pinned, row(2, RecordType::A, "2.2.2.2")];

        let mut rng = rng();
        let inside = IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5));
        let outside = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5));
        for _ in 0..100 {
            assert_eq!(select(&rows, QueryType::A, Some(inside), &mut rng)[0].id, 1);
            assert_eq!(
                select(&rows, QueryType::A, Some(outside), &mut rng)[0].id,
                2
            );
        }
    }

    #[test]
    fn should_keep_pinned_rows_when_nothing_else_matches() {
        let mut pinned = row(1, RecordType::A, "1.1.1.1");
        pinned.geo_cidrs = "10.0.0.0/24".into();
        let rows = vec![pinned];
        let outside = IpAddr::V4(Ipv4Addr::new(192, 0, 2, 5));
        let answers = select(&rows, QueryType::A, Some(outside), &mut rng());
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].id, 1);
    }

    #[test]
    fn should_drop_unhealthy_rows() {
        let mut sick = row(1, RecordType::A, "1.1.1.1");
        sick.healthcheck_url = Some("http://1.1.1.1/health".into());
        sick.healthy = false;
        let rows = vec![sick, row(2, RecordType::A, "2.2.2.2")];

        let mut rng = rng();
        for _ in 0..100 {
            assert_eq!(select(&rows, QueryType::A, None, &mut rng)[0].id, 2);
        }
    }

    #[test]
    fn should_fail_open_when_every_row_is_unhealthy() {
        let mut sick = row(1, RecordType::A, "1.1.1.1");
        sick.healthcheck_url = Some("http://1.1.1.1/health".into());
        sick.healthy = false;
        let rows = vec![sick];
        let answers = select(&rows, QueryType::A, None, &mut rng());
        assert_eq!(answers.len(), 1);
        assert_eq!(answers[0].id, 1);
    }

    #[test]
    fn should_stay_closed_over_input_rows() {
        let rows = vec![
            row(1, RecordType::A, "1.1.1.1"),
            row(2, RecordType::AAAA, "::1"),
            row(3, RecordType::MX, "10 mail.z."),
        ];
        let mut rng = rng();
        for qtype in [
            QueryType::A,
            QueryType::AAAA,
            QueryType::MX,
            QueryType::TXT,
            QueryType::ANY,
        ] {
            for answer in select(&rows, qtype, None, &mut rng) {
                assert!(rows.contains(&answer));
            }
        }
    }
}
