//! Request dispatch.
//!
//! One handler serves both listener transports. Each request is classified
//! by query-name suffix: names under the cluster domain are answered
//! authoritatively from the published record set, everything else is
//! forwarded upstream. The whole path runs behind a fault barrier that
//! turns any panic into SERVFAIL so a single bad query can never take the
//! server down.

use async_trait::async_trait;
use futures::FutureExt;
use hickory_proto::op::{Header, ResponseCode};
use hickory_server::authority::MessageResponseBuilder;
use hickory_server::server::{Request, RequestHandler, RequestInfo, ResponseHandler, ResponseInfo};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, warn};

use crate::authority;
use crate::counters::Counters;
use crate::forward::Forwarder;
use crate::metrics::{self, QueryOrigin, QueryResult, Timer};
use crate::store::RecordStore;

/// DNS request handler dispatching between the authoritative and the
/// forwarding path.
pub struct DnsHandler {
    store: RecordStore,
    counters: Arc<Counters>,
    forwarder: Arc<Forwarder>,
    apex: String,
    suffix: String,
}

impl DnsHandler {
    /// Create a handler for the given cluster domain.
    pub fn new(
        domain: &str,
        store: RecordStore,
        counters: Arc<Counters>,
        forwarder: Arc<Forwarder>,
    ) -> Self {
        Self {
            store,
            counters,
            forwarder,
            apex: format!("{}.", domain),
            suffix: format!(".{}.", domain),
        }
    }

    fn is_in_domain(&self, qname_lower: &str) -> bool {
        qname_lower == self.apex || qname_lower.ends_with(&self.suffix)
    }

    async fn dispatch<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let request_info = match request.request_info() {
            Ok(info) => info,
            Err(e) => {
                warn!(src = %request.src(), error = %e, "malformed query");
                let mut header = Header::response_from_request(request.header());
                header.set_response_code(ResponseCode::FormErr);
                let builder = MessageResponseBuilder::from_message_request(request);
                return match response_handle
                    .send_response(builder.build_no_records(header))
                    .await
                {
                    Ok(info) => info,
                    Err(_) => serve_failed(),
                };
            }
        };

        // LowerName renders case-folded, so the suffix check is on the
        // folded form while answers echo the original casing.
        let qname = fqdn(&request_info.query.name().to_string());
        if self.is_in_domain(&qname) {
            self.handle_in_domain(request, &request_info, response_handle)
                .await
        } else {
            self.handle_forward(request, &request_info, response_handle)
                .await
        }
    }

    async fn handle_in_domain<R: ResponseHandler>(
        &self,
        request: &Request,
        request_info: &RequestInfo<'_>,
        mut response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();
        self.counters.inc_in_domain_requests();

        let rtype = request_info.query.query_type();
        let rtype_str = format!("{:?}", rtype);
        let rs = self.store.current();
        let answer = authority::resolve(&rs, request_info.query.original().name(), rtype);

        let mut header = Header::response_from_request(request_info.header);
        header.set_authoritative(answer.authoritative);
        header.set_response_code(answer.response_code);
        header.set_recursion_available(false);

        let builder = MessageResponseBuilder::from_message_request(request);
        let response = builder.build(
            header,
            answer.answers.iter(),
            answer.authorities.iter(),
            std::iter::empty(),
            answer.additionals.iter(),
        );

        match response_handle.send_response(response).await {
            Ok(info) => {
                let result = if answer.response_code == ResponseCode::NXDomain {
                    self.counters.inc_in_domain_nxdomain();
                    QueryResult::NxDomain
                } else {
                    self.counters.inc_in_domain_success();
                    QueryResult::Success
                };
                metrics::record_query(QueryOrigin::InDomain, &rtype_str, result, timer.elapsed());
                info
            }
            Err(e) => {
                error!(error = %e, "failed to send authoritative response");
                self.counters.inc_in_domain_failed();
                metrics::record_query(
                    QueryOrigin::InDomain,
                    &rtype_str,
                    QueryResult::Failed,
                    timer.elapsed(),
                );
                serve_failed()
            }
        }
    }

    async fn handle_forward<R: ResponseHandler>(
        &self,
        request: &Request,
        request_info: &RequestInfo<'_>,
        mut response_handle: R,
    ) -> ResponseInfo {
        let timer = Timer::start();
        self.counters.inc_forwarded_requests();

        let rtype_str = format!("{:?}", request_info.query.query_type());
        let builder = MessageResponseBuilder::from_message_request(request);

        if !self.forwarder.has_upstreams() {
            self.counters.inc_forwarded_failed();
            metrics::record_query(
                QueryOrigin::Forwarded,
                &rtype_str,
                QueryResult::Failed,
                timer.elapsed(),
            );
            let mut header = Header::response_from_request(request_info.header);
            header.set_response_code(ResponseCode::ServFail);
            return match response_handle
                .send_response(builder.build_no_records(header))
                .await
            {
                Ok(info) => info,
                Err(_) => serve_failed(),
            };
        }

        self.counters.inc_recursed();
        let query = request_info.query.original().clone();
        match self.forwarder.forward(&query, request_info.protocol).await {
            Ok(upstream) => {
                // Relay the upstream response as-is, rewriting only the id
                // to match the client's transaction.
                let mut header = upstream.header().clone();
                header.set_id(request_info.header.id());

                let response = builder.build(
                    header,
                    upstream.answers().iter(),
                    upstream.name_servers().iter(),
                    std::iter::empty(),
                    upstream.additionals().iter(),
                );

                match response_handle.send_response(response).await {
                    Ok(info) => {
                        let result = if upstream.response_code() == ResponseCode::NXDomain {
                            self.counters.inc_forwarded_nxdomain();
                            QueryResult::NxDomain
                        } else {
                            self.counters.inc_forwarded_success();
                            QueryResult::Success
                        };
                        metrics::record_query(
                            QueryOrigin::Forwarded,
                            &rtype_str,
                            result,
                            timer.elapsed(),
                        );
                        info
                    }
                    Err(e) => {
                        error!(error = %e, "failed to relay forwarded response");
                        self.counters.inc_forwarded_failed();
                        metrics::record_query(
                            QueryOrigin::Forwarded,
                            &rtype_str,
                            QueryResult::Failed,
                            timer.elapsed(),
                        );
                        serve_failed()
                    }
                }
            }
            Err(e) => {
                warn!(name = %query.name(), error = %e, "forwarding failed");
                self.counters.inc_forwarded_failed();
                metrics::record_query(
                    QueryOrigin::Forwarded,
                    &rtype_str,
                    QueryResult::Failed,
                    timer.elapsed(),
                );
                let mut header = Header::response_from_request(request_info.header);
                header.set_response_code(ResponseCode::ServFail);
                match response_handle
                    .send_response(builder.build_no_records(header))
                    .await
                {
                    Ok(info) => info,
                    Err(_) => serve_failed(),
                }
            }
        }
    }
}

#[async_trait]
impl RequestHandler for DnsHandler {
    async fn handle_request<R: ResponseHandler>(
        &self,
        request: &Request,
        mut response_handle: R,
    ) -> ResponseInfo {
        let handled = AssertUnwindSafe(self.dispatch(request, response_handle.clone()))
            .catch_unwind()
            .await;

        match handled {
            Ok(info) => info,
            Err(_) => {
                error!(src = %request.src(), "request handler panicked, responding SERVFAIL");
                match request.request_info() {
                    Ok(info) if self.is_in_domain(&fqdn(&info.query.name().to_string())) => {
                        self.counters.inc_in_domain_failed()
                    }
                    _ => self.counters.inc_forwarded_failed(),
                }

                let mut header = Header::response_from_request(request.header());
                header.set_response_code(ResponseCode::ServFail);
                let builder = MessageResponseBuilder::from_message_request(request);
                match response_handle
                    .send_response(builder.build_no_records(header))
                    .await
                {
                    Ok(info) => info,
                    Err(e) => {
                        error!(error = %e, "failed to send SERVFAIL after panic");
                        serve_failed()
                    }
                }
            }
        }
    }
}

fn serve_failed() -> ResponseInfo {
    let mut header = Header::new();
    header.set_response_code(ResponseCode::ServFail);
    header.into()
}

fn fqdn(name: &str) -> String {
    if name.ends_with('.') {
        name.to_string()
    } else {
        format!("{}.", name)
    }
}
