//! Shared test infrastructure for resolver integration tests.

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use hickory_proto::op::{Message, MessageType, OpCode, Query, ResponseCode};
use hickory_proto::rr::{DNSClass, Name, RData, Record, RecordType};
use hickory_proto::serialize::binary::{BinDecodable, BinDecoder, BinEncoder};
use hickory_server::authority::{MessageRequest, MessageResponse};
use hickory_server::proto::xfer::Protocol;
use hickory_server::server::{Request, RequestHandler, ResponseHandler, ResponseInfo};

use mesos_dns::config::Config;
use mesos_dns::counters::Counters;
use mesos_dns::forward::Forwarder;
use mesos_dns::handler::DnsHandler;
use mesos_dns::records::RecordSet;
use mesos_dns::state::State;
use mesos_dns::store::RecordStore;

// --- Constants ---

pub const DOMAIN: &str = "mesos";
pub const LEADER_IP: &str = "144.76.157.37";

// --- TestResponseHandler ---

/// Captures the serialized DNS response for inspection in tests.
///
/// Implements `ResponseHandler` so it can be passed to
/// `RequestHandler::handle_request()`. The response is serialized via
/// `MessageResponse::destructive_emit()` and stored as raw wire-format
/// bytes, which can then be parsed with `Message::from_vec()`.
#[derive(Clone)]
pub struct TestResponseHandler {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl TestResponseHandler {
    pub fn new() -> Self {
        Self {
            buf: Arc::new(Mutex::new(Vec::with_capacity(512))),
        }
    }

    /// Parse the captured wire bytes into a `Message` for assertions.
    pub fn into_message(self) -> Message {
        let buf = self.buf.lock().unwrap();
        assert!(!buf.is_empty(), "no response was captured");
        Message::from_vec(&buf).expect("failed to parse captured DNS response")
    }
}

#[async_trait]
impl ResponseHandler for TestResponseHandler {
    async fn send_response<'a>(
        &mut self,
        response: MessageResponse<
            '_,
            'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
            impl Iterator<Item = &'a Record> + Send + 'a,
        >,
    ) -> io::Result<ResponseInfo> {
        let mut buf = self.buf.lock().unwrap();
        buf.clear();
        let mut encoder = BinEncoder::new(&mut *buf);
        encoder.set_max_size(u16::MAX);
        let info = response
            .destructive_emit(&mut encoder)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        Ok(info)
    }
}

// --- Fixture state ---

/// Cluster state mirroring a small Marathon deployment: one `chronos`
/// instance and three `liquor-store` instances with one port each.
pub fn fixture_state() -> State {
    let body = r#"{
        "leader": "master@144.76.157.37:5050",
        "frameworks": [
            {
                "name": "marathon-0.6.0",
                "tasks": [
                    {
                        "name": "chronos",
                        "id": "chronos.0001",
                        "state": "TASK_RUNNING",
                        "slave_id": "S0",
                        "resources": {"ports": "[31383-31383]"},
                        "statuses": [{"state": "TASK_RUNNING", "timestamp": 1.0}]
                    },
                    {
                        "name": "liquor-store",
                        "id": "liquor-store.0001",
                        "state": "TASK_RUNNING",
                        "slave_id": "S0",
                        "resources": {"ports": "[31000-31000]"},
                        "statuses": [{"state": "TASK_RUNNING", "timestamp": 1.0}]
                    },
                    {
                        "name": "liquor-store",
                        "id": "liquor-store.0002",
                        "state": "TASK_RUNNING",
                        "slave_id": "S1",
                        "resources": {"ports": "[31001-31001]"},
                        "statuses": [{"state": "TASK_RUNNING", "timestamp": 1.0}]
                    },
                    {
                        "name": "liquor-store",
                        "id": "liquor-store.0003",
                        "state": "TASK_RUNNING",
                        "slave_id": "S2",
                        "resources": {"ports": "[31002-31002]"},
                        "statuses": [{"state": "TASK_RUNNING", "timestamp": 1.0}]
                    }
                ]
            }
        ],
        "slaves": [
            {"id": "S0", "hostname": "10.141.141.10"},
            {"id": "S1", "hostname": "10.141.141.11"},
            {"id": "S2", "hostname": "10.141.141.12"}
        ]
    }"#;
    serde_json::from_str(body).expect("fixture state must parse")
}

pub fn test_config() -> Config {
    let mut config = Config {
        masters: vec![format!("{}:5050", LEADER_IP)],
        resolvers: vec!["8.8.8.8".to_string()],
        listener: "127.0.0.1".parse().unwrap(),
        ..Config::default()
    };
    config.check().unwrap();
    config
}

pub fn fixture_record_set() -> RecordSet {
    RecordSet::generate(&fixture_state(), LEADER_IP, &test_config(), 1)
}

// --- Handler construction ---

/// Build a handler over the fixture records. Returns the counters so tests
/// can assert on them.
pub fn build_handler(resolvers: &[String], timeout: Duration) -> (DnsHandler, Arc<Counters>) {
    let counters = Arc::new(Counters::default());
    let handler = DnsHandler::new(
        DOMAIN,
        RecordStore::new(fixture_record_set()),
        counters.clone(),
        Arc::new(Forwarder::new(resolvers, timeout)),
    );
    (handler, counters)
}

// --- Query/Request construction ---

/// Build wire-format bytes for a DNS query.
pub fn build_query_bytes(name: &str, record_type: RecordType, id: u16) -> Vec<u8> {
    let mut msg = Message::new();
    msg.set_id(id);
    msg.set_message_type(MessageType::Query);
    msg.set_op_code(OpCode::Query);
    msg.set_recursion_desired(true);
    let mut query = Query::new();
    query.set_name(Name::from_ascii(name).unwrap());
    query.set_query_type(record_type);
    query.set_query_class(DNSClass::IN);
    msg.add_query(query);
    msg.to_vec().unwrap()
}

/// Parse wire bytes into a MessageRequest.
pub fn parse_message_request(bytes: &[u8]) -> MessageRequest {
    let mut decoder = BinDecoder::new(bytes);
    MessageRequest::read(&mut decoder).expect("failed to parse MessageRequest")
}

/// Build a full `Request` for the given transport.
pub fn build_request(name: &str, record_type: RecordType, protocol: Protocol, id: u16) -> Request {
    let bytes = build_query_bytes(name, record_type, id);
    let msg = parse_message_request(&bytes);
    let src: SocketAddr = "10.0.0.99:54321".parse().unwrap();
    Request::new(msg, src, protocol)
}

// --- Response helpers ---

/// Execute a query through the handler and return the parsed response.
pub async fn execute_query(
    handler: &DnsHandler,
    name: &str,
    record_type: RecordType,
    id: u16,
) -> Message {
    execute_query_with_protocol(handler, name, record_type, Protocol::Udp, id).await
}

pub async fn execute_query_with_protocol(
    handler: &DnsHandler,
    name: &str,
    record_type: RecordType,
    protocol: Protocol,
    id: u16,
) -> Message {
    let request = build_request(name, record_type, protocol, id);
    let capture = TestResponseHandler::new();
    handler.handle_request(&request, capture.clone()).await;
    capture.into_message()
}

/// Extract A addresses from the answer section, as strings.
pub fn extract_a_ips(msg: &Message) -> Vec<String> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::A(a) => Some(a.0.to_string()),
            _ => None,
        })
        .collect()
}

/// Extract SRV ports from the answer section.
pub fn extract_srv_ports(msg: &Message) -> Vec<u16> {
    msg.answers()
        .iter()
        .filter_map(|r| match r.data() {
            RData::SRV(srv) => Some(srv.port()),
            _ => None,
        })
        .collect()
}

/// The SOA record in the authority section, if any.
pub fn authority_soa(msg: &Message) -> Option<&hickory_proto::rr::rdata::SOA> {
    msg.name_servers().iter().find_map(|r| match r.data() {
        RData::SOA(soa) => Some(soa),
        _ => None,
    })
}

/// Assert response code.
pub fn assert_response_code(msg: &Message, expected: ResponseCode) {
    assert_eq!(
        msg.response_code(),
        expected,
        "expected {:?}, got {:?}",
        expected,
        msg.response_code()
    );
}
