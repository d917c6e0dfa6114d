//! Authoritative answer construction for the cluster domain.
//!
//! The functions here are pure: they take the published [`RecordSet`] and a
//! question and produce the record sections for the response. Transport and
//! counting happen in [`crate::handler`].

use hickory_proto::op::ResponseCode;
use hickory_proto::rr::rdata::{A, NS, SOA, SRV};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use rand::seq::SliceRandom;
use tracing::warn;

use crate::records::RecordSet;

/// The sections and flags of an authoritative response.
#[derive(Debug, Default)]
pub struct InDomainAnswer {
    /// Answer section.
    pub answers: Vec<Record>,
    /// Authority section.
    pub authorities: Vec<Record>,
    /// Additional section.
    pub additionals: Vec<Record>,
    /// Response code.
    pub response_code: ResponseCode,
    /// Whether the AA flag is set.
    pub authoritative: bool,
}

/// Answer a question for a name inside the cluster domain.
///
/// `query_name` is the name exactly as the client sent it; answers echo its
/// case while lookups use the folded form. Answers are shuffled so clients
/// get primitive load balancing for free.
pub fn resolve(rs: &RecordSet, query_name: &Name, qtype: RecordType) -> InDomainAnswer {
    let qname = fqdn_string(query_name);
    let lookup = clean_wild(&qname.to_lowercase());

    let mut answer = InDomainAnswer::default();

    match qtype {
        RecordType::A => {
            append_a_records(&mut answer.answers, rs, &lookup, query_name);
        }
        RecordType::AAAA => {
            // No IPv6 task data exists; fall through to NODATA or NXDOMAIN.
        }
        RecordType::SRV => {
            append_srv_records(&mut answer, rs, &lookup, query_name);
        }
        RecordType::ANY => {
            append_a_records(&mut answer.answers, rs, &lookup, query_name);
            let mut srv = InDomainAnswer::default();
            append_srv_records(&mut srv, rs, &lookup, query_name);
            answer.answers.extend(srv.answers);
        }
        RecordType::SOA => {
            answer.answers.push(soa_record(rs));
            if let Some(ns) = ns_record(rs) {
                answer.authorities.push(ns);
            }
        }
        RecordType::NS => {
            if let Some(ns) = ns_record(rs) {
                answer.answers.push(ns);
            }
        }
        _ => {
            // Types this server has no data for; NODATA or NXDOMAIN below.
        }
    }

    if !answer.answers.is_empty() {
        answer.answers.shuffle(&mut rand::thread_rng());
        answer.authoritative = true;
        answer.response_code = ResponseCode::NoError;
    } else if rs.has_name(&lookup) {
        // NODATA: the name exists, just not for this type.
        answer.authorities.push(soa_record(rs));
        answer.response_code = ResponseCode::NoError;
    } else {
        answer.authorities.push(soa_record(rs));
        answer.response_code = ResponseCode::NXDomain;
    }

    answer
}

fn append_a_records(answers: &mut Vec<Record>, rs: &RecordSet, lookup: &str, query_name: &Name) {
    for ip in rs.lookup_a(lookup).unwrap_or_default() {
        match ip.parse::<std::net::Ipv4Addr>() {
            Ok(addr) => {
                let mut record =
                    Record::from_rdata(query_name.clone(), rs.ttl, RData::A(A(addr)));
                record.set_dns_class(DNSClass::IN);
                answers.push(record);
            }
            Err(_) => warn!(name = %lookup, value = %ip, "unparseable A value"),
        }
    }
}

fn append_srv_records(
    answer: &mut InDomainAnswer,
    rs: &RecordSet,
    lookup: &str,
    query_name: &Name,
) {
    for value in rs.lookup_srv(lookup).unwrap_or_default() {
        let Some((host, port)) = value.rsplit_once(':') else {
            warn!(name = %lookup, value = %value, "malformed SRV value");
            continue;
        };
        let Ok(port) = port.parse::<u16>() else {
            warn!(name = %lookup, value = %value, "unparseable SRV port");
            continue;
        };
        let Ok(target) = Name::from_ascii(host) else {
            warn!(name = %lookup, target = %host, "unparseable SRV target");
            continue;
        };

        let mut record = Record::from_rdata(
            query_name.clone(),
            rs.ttl,
            RData::SRV(SRV::new(0, 0, port, target.clone())),
        );
        record.set_dns_class(DNSClass::IN);
        answer.answers.push(record);

        // Glue: the target's A records ride along in the additional section.
        append_a_records(&mut answer.additionals, rs, host, &target);
    }
}

fn soa_record(rs: &RecordSet) -> Record {
    let apex = zone_apex(rs);
    let mname = Name::from_ascii(&rs.mname).unwrap_or_else(|_| Name::root());
    let rname = Name::from_ascii(&rs.email).unwrap_or_else(|_| Name::root());

    let soa = SOA::new(mname, rname, rs.serial, rs.refresh_seconds as i32, 600, 86400, rs.ttl);
    let mut record = Record::from_rdata(apex, rs.ttl, RData::SOA(soa));
    record.set_dns_class(DNSClass::IN);
    record
}

fn ns_record(rs: &RecordSet) -> Option<Record> {
    let ns_name = Name::from_ascii(&rs.mname).ok()?;
    let mut record = Record::from_rdata(zone_apex(rs), rs.ttl, RData::NS(NS(ns_name)));
    record.set_dns_class(DNSClass::IN);
    Some(record)
}

fn zone_apex(rs: &RecordSet) -> Name {
    Name::from_ascii(format!("{}.", rs.domain)).unwrap_or_else(|_| Name::root())
}

/// Strip the literal `.*` wildcard convention some callers use, mapping
/// `bob.*.mesos.` back to `bob.mesos.`.
pub fn clean_wild(name: &str) -> String {
    if name.contains(".*") {
        name.replace(".*", "")
    } else {
        name.to_string()
    }
}

fn fqdn_string(name: &Name) -> String {
    let mut s = name.to_string();
    if !s.ends_with('.') {
        s.push('.');
    }
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn test_record_set() -> RecordSet {
        let mut a_records: HashMap<String, Vec<String>> = HashMap::new();
        a_records.insert(
            "chronos.marathon-0.6.0.mesos.".to_string(),
            vec!["10.141.141.10".to_string()],
        );
        a_records.insert(
            "liquor-store.marathon-0.6.0.mesos.".to_string(),
            vec![
                "10.141.141.10".to_string(),
                "10.141.141.10".to_string(),
                "10.141.141.11".to_string(),
            ],
        );

        let mut srv_records: HashMap<String, Vec<String>> = HashMap::new();
        srv_records.insert(
            "_liquor-store._udp.marathon-0.6.0.mesos.".to_string(),
            vec![
                "liquor-store.marathon-0.6.0.mesos.:31000".to_string(),
                "liquor-store.marathon-0.6.0.mesos.:31001".to_string(),
                "liquor-store.marathon-0.6.0.mesos.:31002".to_string(),
            ],
        );

        RecordSet {
            a_records,
            srv_records,
            domain: "mesos".to_string(),
            mname: "mesos-dns.mesos.".to_string(),
            email: "root.mesos-dns.mesos.".to_string(),
            ttl: 60,
            refresh_seconds: 60,
            serial: 3,
            ..RecordSet::default()
        }
    }

    fn name(s: &str) -> Name {
        Name::from_ascii(s).unwrap()
    }

    #[test]
    fn test_a_answer() {
        let rs = test_record_set();
        let answer = resolve(&rs, &name("chronos.marathon-0.6.0.mesos."), RecordType::A);
        assert_eq!(answer.response_code, ResponseCode::NoError);
        assert!(answer.authoritative);
        assert_eq!(answer.answers.len(), 1);
        assert_eq!(
            answer.answers[0].data(),
            &RData::A(A("10.141.141.10".parse().unwrap()))
        );
    }

    #[test]
    fn test_a_answer_echoes_request_case() {
        let rs = test_record_set();
        let answer = resolve(&rs, &name("cHrOnOs.MARATHON-0.6.0.mesoS."), RecordType::A);
        assert_eq!(answer.answers.len(), 1);
        assert_eq!(
            answer.answers[0].name().to_string(),
            "cHrOnOs.MARATHON-0.6.0.mesoS."
        );
    }

    #[test]
    fn test_srv_answer_with_glue() {
        let rs = test_record_set();
        let answer = resolve(
            &rs,
            &name("_liquor-store._udp.marathon-0.6.0.mesos."),
            RecordType::SRV,
        );
        assert_eq!(answer.answers.len(), 3);
        let mut ports: Vec<u16> = answer
            .answers
            .iter()
            .filter_map(|r| match r.data() {
                RData::SRV(srv) => Some(srv.port()),
                _ => None,
            })
            .collect();
        ports.sort();
        assert_eq!(ports, vec![31000, 31001, 31002]);
        // Three targets, three A values each lookup: 3 * 3 glue records.
        assert_eq!(answer.additionals.len(), 9);
    }

    #[test]
    fn test_nxdomain_includes_soa() {
        let rs = test_record_set();
        let answer = resolve(&rs, &name("missing.mesos."), RecordType::A);
        assert_eq!(answer.response_code, ResponseCode::NXDomain);
        assert!(!answer.authoritative);
        assert_eq!(answer.authorities.len(), 1);
        assert!(matches!(answer.authorities[0].data(), RData::SOA(_)));
    }

    #[test]
    fn test_aaaa_nodata_for_existing_name() {
        let rs = test_record_set();
        let answer = resolve(&rs, &name("chronos.marathon-0.6.0.mesos."), RecordType::AAAA);
        assert_eq!(answer.response_code, ResponseCode::NoError);
        assert!(answer.answers.is_empty());
        assert!(matches!(answer.authorities[0].data(), RData::SOA(_)));
    }

    #[test]
    fn test_aaaa_nxdomain_for_missing_name() {
        let rs = test_record_set();
        let answer = resolve(&rs, &name("missing.mesos."), RecordType::AAAA);
        assert_eq!(answer.response_code, ResponseCode::NXDomain);
    }

    #[test]
    fn test_soa_always_answerable() {
        let rs = test_record_set();
        let answer = resolve(&rs, &name("non-existing.mesos."), RecordType::SOA);
        assert_eq!(answer.response_code, ResponseCode::NoError);
        assert_eq!(answer.answers.len(), 1);
        let RData::SOA(soa) = answer.answers[0].data() else {
            panic!("expected SOA");
        };
        assert_eq!(soa.mname().to_string(), "mesos-dns.mesos.");
        assert_eq!(soa.serial(), 3);
        assert_eq!(soa.refresh(), 60);
        assert_eq!(soa.retry(), 600);
        assert_eq!(soa.expire(), 86400);
        assert_eq!(soa.minimum(), 60);
        assert!(!answer.authorities.is_empty());
    }

    #[test]
    fn test_ns_answer() {
        let rs = test_record_set();
        let answer = resolve(&rs, &name("mesos."), RecordType::NS);
        assert_eq!(answer.answers.len(), 1);
        let RData::NS(ns) = answer.answers[0].data() else {
            panic!("expected NS");
        };
        assert_eq!(ns.0.to_string(), "mesos-dns.mesos.");
    }

    #[test]
    fn test_any_unions_a_and_srv() {
        let rs = test_record_set();
        let answer = resolve(
            &rs,
            &name("liquor-store.marathon-0.6.0.mesos."),
            RecordType::ANY,
        );
        // Only A records exist at this name.
        assert_eq!(answer.answers.len(), 3);
    }

    #[test]
    fn test_shuffle_preserves_multiset() {
        let rs = test_record_set();
        let mut all: Vec<Vec<String>> = Vec::new();
        for _ in 0..16 {
            let answer = resolve(
                &rs,
                &name("liquor-store.marathon-0.6.0.mesos."),
                RecordType::A,
            );
            let mut values: Vec<String> = answer
                .answers
                .iter()
                .map(|r| format!("{:?}", r.data()))
                .collect();
            values.sort();
            all.push(values);
        }
        // Sorted contents identical across runs regardless of order.
        assert!(all.windows(2).all(|w| w[0] == w[1]));
    }

    #[test]
    fn test_clean_wild() {
        assert_eq!(clean_wild("bob.*.mesos."), "bob.mesos.");
        assert_eq!(clean_wild("bob.mesos."), "bob.mesos.");
        assert_eq!(clean_wild("a.*.b.*.mesos."), "a.b.mesos.");
    }

    #[test]
    fn test_wildcard_lookup_resolves() {
        let rs = test_record_set();
        let answer = resolve(
            &rs,
            &name("chronos.*.marathon-0.6.0.mesos."),
            RecordType::A,
        );
        assert_eq!(answer.response_code, ResponseCode::NoError);
        assert_eq!(answer.answers.len(), 1);
    }

    #[test]
    fn test_unhandled_type_nodata() {
        let rs = test_record_set();
        let answer = resolve(&rs, &name("chronos.marathon-0.6.0.mesos."), RecordType::TXT);
        assert_eq!(answer.response_code, ResponseCode::NoError);
        assert!(answer.answers.is_empty());
    }
}
