//! Query exchanges driven by fake transports.

mod common;

use common::*;
use domain_egress::base::iana::{Class, Rcode, Rtype};
use domain_egress::base::message::Message;
use domain_egress::base::header::Header;
use domain_egress::base::record::Section;
use domain_egress::net::client::config::Config;
use domain_egress::net::client::dispatch::{Dispatcher, Request};
use domain_egress::net::client::error::Error;
use domain_egress::net::client::outcome::ResultKind;
use domain_egress::net::client::pool::PooledConnection;
use domain_egress::net::client::telemetry::{Protocol, SinkError};
use rstest::rstest;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

const ID: u16 = 0x4711;

fn udp_dispatcher(dgram: FakeDgram) -> Dispatcher<FakeDgram, FakeStream> {
    init_logging();
    let stream = FakeStream::new(responder(|_| None));
    Dispatcher::new(Config::default(), dgram, stream)
        .with_random(FakeRandom::new(ID))
}

fn tcp_dispatcher(stream: FakeStream) -> Dispatcher<FakeDgram, FakeStream> {
    init_logging();
    let dgram = FakeDgram::new(responder(|_| None));
    Dispatcher::new(Config::default(), dgram, stream)
        .with_random(FakeRandom::new(ID))
}

fn request(port: u16, qname: &str) -> Request {
    Request::new(server(port), name(qname), Rtype::A)
}

fn tcp_request(port: u16, qname: &str) -> Request {
    let mut res = request(port, qname);
    res.tcp = true;
    res
}

//------------ UDP -----------------------------------------------------------

#[tokio::test]
async fn udp_success() {
    let dgram = FakeDgram::new(responder(|query| Some(a_response(query))));
    let queries = dgram.queries();
    let disp = udp_dispatcher(dgram);
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::Success);
    assert!(res.valid_packet);
    assert!(res.is_usable());
    assert_eq!(res.rcode, Rcode::NOERROR);
    assert!(res.have_edns);
    assert!(!res.chained);
    assert_eq!(res.subnet, None);
    assert_eq!(res.records.len(), 1);
    assert_eq!(res.records[0].owner(), &name("example.com"));
    assert_eq!(res.records[0].rtype(), Rtype::A);
    assert_eq!(&res.records[0].data()[..], &[192, 0, 2, 10]);

    let queries = queries.lock();
    assert_eq!(queries.len(), 1);
    let query = Message::from_slice(&queries[0]).unwrap();
    assert_eq!(query.header().id(), ID);
    assert!(!query.header().qr());
    assert_eq!(query.question().unwrap().qname(), &name("example.com"));
    assert!(query.opt().is_some());
}

#[tokio::test]
async fn udp_without_edns() {
    let dgram = FakeDgram::new(responder(|query| {
        let mut res = response_to(query);
        add_opt(&mut res, None);
        Some(res.finish())
    }));
    let queries = dgram.queries();
    let disp = udp_dispatcher(dgram);
    let mut req = request(53, "example.com");
    req.edns_level = 0;
    let res = disp.resolve(&req).await;

    assert!(res.is_usable());
    assert!(!res.have_edns);
    assert!(res.records.is_empty());
    let query = Message::from_slice(&queries.lock()[0]).unwrap();
    assert!(query.opt().is_none());
}

#[tokio::test]
async fn records_of_all_sections() {
    let dgram = FakeDgram::new(responder(|query| {
        let mut res = response_to(query);
        let owner = name("example.com");
        add_a(&mut res, &owner, [192, 0, 2, 1]);
        res.start_record(
            &name("example.com"),
            Rtype::NS,
            3600,
            Class::IN,
            Section::Authority,
            true,
        );
        res.compose_name(&name("ns.example.com"), true);
        res.commit();
        add_opt(&mut res, None);
        Some(res.finish())
    }));
    let disp = udp_dispatcher(dgram);
    let res = disp.resolve(&request(53, "example.com")).await;

    assert!(res.is_usable());
    assert_eq!(res.records.len(), 2);
    assert_eq!(res.records[1].rtype(), Rtype::NS);
    assert!(res.records.iter().all(|record| record.rtype() != Rtype::OPT));
}

#[tokio::test]
async fn header_bits() {
    let dgram = FakeDgram::new(responder(|query| {
        let mut res = response_to(query);
        res.header_mut().set_aa(true);
        res.header_mut().set_tc(true);
        res.header_mut().set_rcode(Rcode::NXDOMAIN);
        Some(res.finish())
    }));
    let disp = udp_dispatcher(dgram);
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::Success);
    assert!(res.valid_packet);
    assert!(res.aa);
    assert!(res.tc);
    assert_eq!(res.rcode, Rcode::NXDOMAIN);
}

#[tokio::test(start_paused = true)]
async fn udp_timeout() {
    let logger = RecordingLogger::new();
    let mut disp = udp_dispatcher(FakeDgram::new(responder(|_| None)));
    disp.add_logger(logger.clone());
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::Timeout);
    assert!(!res.valid_packet);
    assert!(res.usec >= 1_500_000);
    assert_eq!(logger.queries.lock().len(), 1);
    let responses = logger.responses.lock();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].rcode, None);
    assert_eq!(responses[0].bytes, 0);
}

#[tokio::test]
async fn udp_send_failure() {
    let logger = RecordingLogger::new();
    let mut disp = udp_dispatcher(FakeDgram::failing(Error::UdpShortSend));
    disp.add_logger(logger.clone());
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::PermanentError);
    assert_eq!(logger.queries.lock().len(), 1);
    assert!(logger.responses.lock().is_empty());
}

#[tokio::test]
async fn udp_bind_failure_is_os_limit() {
    let err = Error::UdpBind(Arc::new(std::io::Error::from(
        std::io::ErrorKind::AddrInUse,
    )));
    let disp = udp_dispatcher(FakeDgram::failing(err));
    let res = disp.resolve(&request(53, "example.com")).await;
    assert_eq!(res.kind, ResultKind::OsLimitError);
}

//------------ Validation ----------------------------------------------------

#[tokio::test]
async fn qname_mismatch() {
    let dgram = FakeDgram::new(responder(|query| {
        let evil = name("evil.com");
        let mut res = response_with_question(query, &evil, Rtype::A);
        add_a(&mut res, &evil, [198, 51, 100, 1]);
        Some(res.finish())
    }));
    let logger = RecordingLogger::new();
    let mut disp = udp_dispatcher(dgram);
    disp.add_logger(logger.clone());
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::PermanentError);
    assert!(!res.valid_packet);
    assert_eq!(res.rcode, Rcode::SERVFAIL);
    assert!(res.records.is_empty());
    assert!(logger.responses.lock().is_empty());
}

#[tokio::test]
async fn qname_mismatch_keeps_error_rcode() {
    let dgram = FakeDgram::new(responder(|query| {
        let mut res =
            response_with_question(query, &name("evil.com"), Rtype::A);
        res.header_mut().set_rcode(Rcode::REFUSED);
        Some(res.finish())
    }));
    let disp = udp_dispatcher(dgram);
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::PermanentError);
    assert_eq!(res.rcode, Rcode::REFUSED);
}

#[tokio::test]
async fn qname_compared_without_case() {
    let dgram = FakeDgram::new(responder(|query| {
        let qname = name("ExAmPlE.CoM");
        let mut res = response_with_question(query, &qname, Rtype::A);
        add_a(&mut res, &qname, [192, 0, 2, 1]);
        Some(res.finish())
    }));
    let disp = udp_dispatcher(dgram);
    let res = disp.resolve(&request(53, "example.com")).await;
    assert!(res.is_usable());
}

#[tokio::test]
async fn parse_failure() {
    let dgram = FakeDgram::new(responder(|query| {
        let mut res = response_to(query).finish();
        res.truncate(res.len() - 3);
        Some(res)
    }));
    let logger = RecordingLogger::new();
    let mut disp = udp_dispatcher(dgram);
    disp.add_logger(logger.clone());
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::Success);
    assert!(!res.valid_packet);
    assert!(!res.is_usable());
    assert_eq!(res.rcode, Rcode::FORMERR);
    assert!(res.records.is_empty());
    assert_eq!(disp.counters().server_parse_errors(), 1);
    let responses = logger.responses.lock();
    assert_eq!(responses.len(), 1);
    assert_eq!(responses[0].rcode, Some(Rcode::FORMERR));
}

#[tokio::test]
async fn formerr_without_question() {
    let dgram = FakeDgram::new(responder(|query| {
        Some(header_only(query, Rcode::FORMERR))
    }));
    let logger = RecordingLogger::new();
    let mut disp = udp_dispatcher(dgram);
    disp.add_logger(logger.clone());
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::Success);
    assert!(res.valid_packet);
    assert_eq!(res.rcode, Rcode::FORMERR);
    assert!(!res.have_edns);
    assert!(res.records.is_empty());
    assert_eq!(logger.responses.lock().len(), 1);
}

#[tokio::test]
async fn empty_question_is_mismatch() {
    let dgram = FakeDgram::new(responder(|query| {
        Some(header_only(query, Rcode::NOERROR))
    }));
    let disp = udp_dispatcher(dgram);
    let res = disp.resolve(&request(53, "example.com")).await;

    assert_eq!(res.kind, ResultKind::PermanentError);
    assert_eq!(res.rcode, Rcode::SERVFAIL);
}

//------------ Client Subnet -------------------------------------------------

fn ecs_dgram(echo: Option<(&'static str, u8)>) -> FakeDgram {
    FakeDgram::new(responder(move |query| {
        let mut res = response_to(query);
        add_a(&mut res, &name("example.com"), [192, 0, 2, 1]);
        add_opt(&mut res, echo.map(|(source, scope)| (mask(source), scope)));
        Some(res.finish())
    }))
}

fn ecs_request(tcp: bool) -> Request {
    let mut res = request(53, "example.com");
    res.tcp = tcp;
    res.source_mask = Some(mask("192.168.0.0/24"));
    res
}

#[tokio::test]
async fn ecs_is_sent() {
    let dgram = ecs_dgram(None);
    let queries = dgram.queries();
    let disp = udp_dispatcher(dgram);
    disp.resolve(&ecs_request(false)).await;
    assert_eq!(
        query_subnet(&queries.lock()[0]),
        Some(mask("192.168.0.0/24"))
    );
}

#[tokio::test]
async fn ecs_spoofed() {
    let logger = RecordingLogger::new();
    let mut disp = udp_dispatcher(ecs_dgram(Some(("10.0.0.0/24", 0))));
    disp.add_logger(logger.clone());
    let res = disp.resolve(&ecs_request(false)).await;

    assert_eq!(res.kind, ResultKind::Spoofed);
    assert!(!res.valid_packet);
    assert!(res.records.is_empty());
    assert_eq!(res.subnet, None);
    assert_eq!(logger.queries.lock().len(), 1);
    assert!(logger.responses.lock().is_empty());
}

#[rstest]
#[case(Some(("192.168.0.0/24", 16)), Some("192.168.0.0/16"))]
#[case(Some(("192.168.0.0/24", 28)), Some("192.168.0.0/24"))]
#[case(Some(("192.168.0.0/24", 0)), None)]
#[case(None, None)]
#[tokio::test]
async fn ecs_scope(
    #[case] echo: Option<(&'static str, u8)>,
    #[case] expected: Option<&'static str>,
) {
    let disp = udp_dispatcher(ecs_dgram(echo));
    let res = disp.resolve(&ecs_request(false)).await;

    assert!(res.is_usable());
    assert_eq!(res.subnet, expected.map(mask));
}

#[tokio::test]
async fn ecs_not_checked_over_tcp() {
    let stream = FakeStream::new(responder(|query| {
        let mut res = response_to(query);
        add_opt(&mut res, Some((mask("10.0.0.0/24"), 8)));
        Some(res.finish())
    }));
    let disp = tcp_dispatcher(stream);
    let res = disp.resolve(&ecs_request(true)).await;

    assert_eq!(res.kind, ResultKind::Success);
    assert!(res.valid_packet);
    assert_eq!(res.subnet, Some(mask("192.0.0.0/8")));
}

//------------ TCP -----------------------------------------------------------

#[tokio::test]
async fn tcp_success_and_reuse() {
    let stream = FakeStream::new(responder(|query| Some(a_response(query))));
    let connects = stream.connects();
    let disp = tcp_dispatcher(stream);

    let res = disp.resolve(&tcp_request(53, "example.com")).await;
    assert!(res.is_usable());
    assert_eq!(res.records.len(), 1);
    assert_eq!(disp.pool().len(), 1);

    let res = disp.resolve(&tcp_request(53, "example.net")).await;
    assert!(res.is_usable());
    assert_eq!(connects.lock().len(), 1);
    assert_eq!(disp.pool().len(), 1);
}

#[tokio::test]
async fn stale_pooled_connection() {
    let stream = FakeStream::new(responder(|query| Some(a_response(query))));
    let connects = stream.connects();
    let disp = tcp_dispatcher(stream);
    disp.pool()
        .release(server(53), PooledConnection::new(dead_stream(), false));

    let res = disp.resolve(&tcp_request(53, "example.com")).await;
    assert!(res.is_usable());
    assert_eq!(connects.lock().len(), 1);
    assert_eq!(disp.pool().len(), 1);
}

#[tokio::test]
async fn new_connection_failure_is_final() {
    let stream = FakeStream::new(responder(|_| None));
    let connects = stream.connects();
    let disp = tcp_dispatcher(stream);

    let res = disp.resolve(&tcp_request(53, "example.com")).await;
    assert_eq!(res.kind, ResultKind::PermanentError);
    assert_eq!(connects.lock().len(), 1);
    assert!(disp.pool().is_empty());
}

#[tokio::test]
async fn refused_connection() {
    let stream = FakeStream::new(responder(|_| None)).refusing();
    let connects = stream.connects();
    let disp = tcp_dispatcher(stream);
    disp.pool()
        .release(server(53), PooledConnection::new(dead_stream(), false));

    let res = disp.resolve(&tcp_request(53, "example.com")).await;
    assert_eq!(res.kind, ResultKind::PermanentError);
    assert_eq!(connects.lock().len(), 1);
    assert!(disp.pool().is_empty());
}

#[tokio::test]
async fn invalid_answer_closes_connection() {
    let stream = FakeStream::new(responder(|query| {
        Some(query[..query.len() - 1].to_vec())
    }));
    let disp = tcp_dispatcher(stream);

    let res = disp.resolve(&tcp_request(53, "example.com")).await;
    assert_eq!(res.kind, ResultKind::Success);
    assert!(!res.valid_packet);
    assert!(disp.pool().is_empty());
}

//------------ DNS-over-TLS --------------------------------------------------

#[tokio::test]
async fn dot_with_padding() {
    let stream = FakeStream::new(responder(|query| Some(a_response(query))))
        .with_tls();
    let connects = stream.connects();
    let queries = stream.queries();
    let logger = RecordingLogger::new();
    let mut disp = tcp_dispatcher(stream);
    disp.add_logger(logger.clone());
    let mut req = tcp_request(853, "example.com");
    req.context.ns_name = Some(name("ns1.example.net"));

    let res = disp.resolve(&req).await;
    assert!(res.is_usable());
    assert_eq!(
        connects.lock().as_slice(),
        &[(true, Some(name("ns1.example.net")))]
    );
    assert_eq!(queries.lock()[0].len() % 128, 0);
    assert_eq!(logger.queries.lock()[0].protocol, Protocol::Dot);
    assert_eq!(disp.counters().dot_unavailable(), 0);
}

#[tokio::test]
async fn dot_unavailable() {
    let stream = FakeStream::new(responder(|query| Some(a_response(query))));
    let connects = stream.connects();
    let queries = stream.queries();
    let logger = RecordingLogger::new();
    let mut disp = tcp_dispatcher(stream);
    disp.add_logger(logger.clone());

    let res = disp.resolve(&tcp_request(853, "example.com")).await;
    assert!(res.is_usable());
    assert!(!connects.lock()[0].0);
    assert_ne!(queries.lock()[0].len() % 128, 0);
    assert_eq!(logger.queries.lock()[0].protocol, Protocol::Tcp);
    assert_eq!(disp.counters().dot_unavailable(), 1);
}

#[tokio::test]
async fn plain_tcp_to_853_if_disabled() {
    let stream = FakeStream::new(responder(|query| Some(a_response(query))))
        .with_tls();
    let connects = stream.connects();
    let mut config = Config::default();
    config.set_dot_to_port_853(false);
    let disp = Dispatcher::new(
        config,
        FakeDgram::new(responder(|_| None)),
        stream,
    )
    .with_random(FakeRandom::new(ID));

    let res = disp.resolve(&tcp_request(853, "example.com")).await;
    assert!(res.is_usable());
    assert!(!connects.lock()[0].0);
}

//------------ Chained Queries -----------------------------------------------

#[tokio::test(start_paused = true)]
async fn chained_jitter() {
    let random = FakeRandom::with_jitter(ID, 300);
    let dgram = FakeDgram::new(responder(|query| Some(a_response(query))))
        .chained()
        .with_delay(Duration::from_millis(1200));
    init_logging();
    let disp = Dispatcher::new(
        Config::default(),
        dgram,
        FakeStream::new(responder(|_| None)),
    )
    .with_random(random.clone());

    let started = Instant::now();
    let res = disp.resolve(&request(53, "example.com")).await;
    let total = started.elapsed();

    assert!(res.is_usable());
    assert!(res.chained);
    assert!(res.usec >= 1_200_000 && res.usec < 1_300_000);
    assert!(total >= Duration::from_millis(1500));
    assert_eq!(random.bounds(), vec![1200]);
}

#[rstest]
#[case::fast_chained(true, 900)]
#[case::slow_unchained(false, 1200)]
#[tokio::test(start_paused = true)]
async fn no_jitter(#[case] chained: bool, #[case] delay: u64) {
    let random = FakeRandom::with_jitter(ID, 300);
    let mut dgram = FakeDgram::new(responder(|query| Some(a_response(query))))
        .with_delay(Duration::from_millis(delay));
    if chained {
        dgram = dgram.chained();
    }
    init_logging();
    let disp = Dispatcher::new(
        Config::default(),
        dgram,
        FakeStream::new(responder(|_| None)),
    )
    .with_random(random.clone());

    let started = Instant::now();
    let res = disp.resolve(&request(53, "example.com")).await;

    assert!(res.is_usable());
    assert_eq!(res.chained, chained);
    assert!(started.elapsed() < Duration::from_millis(delay + 100));
    assert!(random.bounds().is_empty());
}

//------------ Telemetry -----------------------------------------------------

#[tokio::test]
async fn telemetry_events() {
    let dgram = FakeDgram::new(responder(|query| {
        let qname = name("example.com");
        let mut res = response_to(query);
        add_a(&mut res, &qname, [192, 0, 2, 1]);
        let mut v6 = [0u8; 16];
        v6[..4].copy_from_slice(&[0x20, 0x01, 0x0d, 0xb8]);
        v6[15] = 1;
        add_aaaa(&mut res, &qname, v6);
        Some(res.finish())
    }));
    let logger = RecordingLogger::new();
    let mut disp = udp_dispatcher(dgram);
    disp.add_logger(logger.clone());
    disp.set_export_types([Rtype::AAAA]);
    let mut req = request(53, "example.com");
    req.context.ns_name = Some(name("ns1.example.net"));
    let res = disp.resolve(&req).await;
    assert_eq!(res.records.len(), 2);

    let queries = logger.queries.lock();
    let responses = logger.responses.lock();
    assert_eq!(queries.len(), 1);
    assert_eq!(responses.len(), 1);
    assert_eq!(queries[0].message_id, responses[0].message_id);
    assert_eq!(queries[0].protocol, Protocol::Udp);
    assert_eq!(queries[0].id, ID);
    assert_eq!(queries[0].family(), 1);
    assert_eq!(queries[0].ns_name, Some(name("ns1.example.net")));
    assert_eq!(responses[0].rcode, Some(Rcode::NOERROR));
    assert_eq!(responses[0].records.len(), 1);
    assert_eq!(responses[0].records[0].rtype(), Rtype::AAAA);
    assert!(responses[0].bytes > 12);
}

#[tokio::test]
async fn query_events_only_for_sinks_wanting_them() {
    let logger = RecordingLogger::responses_only();
    let mut disp = udp_dispatcher(FakeDgram::new(responder(|query| {
        Some(a_response(query))
    })));
    disp.add_logger(logger.clone());
    let res = disp.resolve(&request(53, "example.com")).await;

    assert!(res.is_usable());
    assert!(logger.queries.lock().is_empty());
    assert_eq!(logger.responses.lock().len(), 1);
}

#[rstest]
#[case(SinkError::PipeFull)]
#[case(SinkError::TooLarge)]
#[case(SinkError::Other("broken".into()))]
#[tokio::test]
async fn sink_errors_are_ignored(#[case] error: SinkError) {
    let logger = RecordingLogger::failing(error);
    let mut disp = udp_dispatcher(FakeDgram::new(responder(|query| {
        Some(a_response(query))
    })));
    disp.add_logger(logger.clone());
    let res = disp.resolve(&request(53, "example.com")).await;

    assert!(res.is_usable());
    assert_eq!(logger.queries.lock().len(), 1);
    assert_eq!(logger.responses.lock().len(), 1);
}

#[tokio::test]
async fn query_flags() {
    let dgram = FakeDgram::new(responder(|query| Some(a_response(query))));
    let queries = dgram.queries();
    let disp = udp_dispatcher(dgram);
    let mut req = request(53, "example.com");
    req.recursion_desired = true;
    disp.resolve(&req).await;

    let queries = queries.lock();
    let header = Header::for_message(queries[0].as_slice()).unwrap();
    assert!(header.rd());
    assert!(header.cd());
}
