//! Discovery contract tests
//!
//! These tests verify how the Browser admits and removes services:
//! - One `Up` per newly seen instance, with every field populated from the packet
//! - Goodbye PTRs remove a known service exactly once
//! - Incomplete instances (no SRV) are never reported
//! - The TXT filter gates admission
//! - Wildcard browsing queries each announced type exactly once

mod common;

use common::*;
use dnssd_core::traits::{Referrer, ResourceRecord, ResponsePacket};
use dnssd_core::txt::TxtValue;
use dnssd_core::{BrowseEvent, Browser, BrowserConfig};
use std::net::{IpAddr, Ipv4Addr};
use std::sync::{Arc, Mutex};

fn started(config: BrowserConfig) -> (Browser, tokio::sync::mpsc::Receiver<BrowseEvent>, RecordingSource) {
    let source = RecordingSource::new();
    let shared = RecordingSource::sharing_counters_with(&source);
    let (mut browser, rx) = Browser::new(Box::new(shared), config).expect("valid config");
    browser.start();
    (browser, rx, source)
}

#[test]
fn test_printer_announcement_yields_single_up() {
    let (mut browser, mut rx, source) = started(BrowserConfig::for_type("http"));
    assert_eq!(source.queried_names(), vec![HTTP.to_string()]);

    let printer = Announce::http("myprinter")
        .host("printer.local")
        .port(631)
        .txt(&[("path", "/")])
        .addresses(&["192.168.1.20"]);
    browser.process_response_at(&printer.packet(), t0());

    let events = drain(&mut rx);
    assert_eq!(names(&events), vec!["up"]);

    let service = events[0].service();
    assert_eq!(service.fqdn, "myprinter._http._tcp.local");
    assert_eq!(service.name, "myprinter");
    assert_eq!(service.service_type, "http");
    assert_eq!(service.protocol.as_deref(), Some("tcp"));
    assert_eq!(service.host, "printer.local");
    assert_eq!(service.port, 631);
    assert_eq!(service.addresses, vec![IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20))]);
    assert_eq!(service.txt.get("path"), Some(&TxtValue::from("/")));
    assert_eq!(service.last_seen, t0());
    assert_eq!(browser.services(), vec![service.clone()]);
}

fn referrer(address: &str, size: usize) -> Referrer {
    Referrer {
        address: address.parse().unwrap(),
        size,
    }
}

#[test]
fn test_service_carries_packet_referrer() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let printer = Announce::http("myprinter");
    let first = referrer("192.168.1.20:5353", 312);

    browser.process_response_at(&printer.packet().with_referrer(first), t0());

    let events = drain(&mut rx);
    assert_eq!(names(&events), vec!["up"]);
    assert_eq!(events[0].service().referrer, Some(first));

    // a silent refresh records the packet that last confirmed the service
    let second = referrer("[fe80::1]:5353", 298);
    browser.process_response_at(&printer.packet().with_referrer(second), t0() + secs(30));

    assert!(drain(&mut rx).is_empty());
    assert_eq!(browser.service(&printer.fqdn()).unwrap().referrer, Some(second));
}

#[test]
fn test_reannouncement_is_silent() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let printer = Announce::http("myprinter");

    browser.process_response_at(&printer.packet(), t0());
    let generation = browser.generation();
    drain(&mut rx);

    browser.process_response_at(&printer.packet(), t0() + secs(60));

    assert!(drain(&mut rx).is_empty());
    assert_eq!(browser.generation(), generation);
    assert_eq!(browser.service(&printer.fqdn()).unwrap().last_seen, t0() + secs(60));
}

#[test]
fn test_goodbye_removes_once() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let printer = Announce::http("myprinter");
    browser.process_response(&printer.packet());
    drain(&mut rx);

    let goodbye = ResponsePacket::new(vec![printer.goodbye()], Vec::new());
    browser.process_response(&goodbye);
    browser.process_response(&goodbye);

    let events = drain(&mut rx);
    assert_eq!(names(&events), vec!["down"]);
    assert_eq!(events[0].service().fqdn, printer.fqdn());
    assert!(browser.is_empty());
}

#[test]
fn test_goodbye_for_unknown_service_is_ignored() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let stranger = Announce::http("stranger");

    browser.process_response(&ResponsePacket::new(vec![stranger.goodbye()], Vec::new()));

    assert!(drain(&mut rx).is_empty());
    assert_eq!(browser.generation(), 0);
}

#[test]
fn test_restart_in_one_packet_yields_down_then_up() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let printer = Announce::http("myprinter");
    browser.process_response(&printer.packet());
    drain(&mut rx);

    let mut restart = printer.clone().port(8080).packet();
    restart.answers.push(printer.goodbye());
    browser.process_response(&restart);

    let events = drain(&mut rx);
    assert_eq!(names(&events), vec!["down", "up"]);
    assert_eq!(events[1].service().port, 8080);
    assert_eq!(browser.len(), 1);
}

#[test]
fn test_instance_without_srv_is_not_reported() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let printer = Announce::http("myprinter");

    let ptr_only = ResponsePacket::new(printer.records().0, Vec::new());
    browser.process_response(&ptr_only);
    assert!(drain(&mut rx).is_empty());

    // a later complete packet still admits it
    browser.process_response(&printer.packet());
    assert_eq!(names(&drain(&mut rx)), vec!["up"]);
}

#[test]
fn test_addresses_only_come_from_the_same_packet() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let printer = Announce::http("myprinter").addresses(&[]);
    browser.process_response(&printer.packet());

    let late_address = ResponsePacket::new(
        Vec::new(),
        vec![ResourceRecord::a(&printer.host, Ipv4Addr::new(192, 168, 1, 20), TTL)],
    );
    browser.process_response(&late_address);

    assert_eq!(names(&drain(&mut rx)), vec!["up"]);
    assert!(browser.service(&printer.fqdn()).unwrap().addresses.is_empty());
}

#[test]
fn test_other_types_are_ignored() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let mut ipp = Announce::http("office");
    ipp.service_type = "_ipp._tcp.local".to_string();

    browser.process_response(&ipp.packet());

    assert!(drain(&mut rx).is_empty());
}

#[test]
fn test_several_instances_in_one_packet() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let packet = packet_of(&[Announce::http("alpha"), Announce::http("beta")]);

    browser.process_response(&packet);

    let events = drain(&mut rx);
    assert_eq!(names(&events), vec!["up", "up"]);
    assert_eq!(events[0].service().name, "alpha");
    assert_eq!(events[1].service().name, "beta");
}

#[test]
fn test_names_compare_case_insensitively() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let mut shouting = Announce::http("MyPrinter");
    shouting.service_type = "_HTTP._TCP.LOCAL.".to_string();
    browser.process_response(&shouting.packet());
    assert_eq!(names(&drain(&mut rx)), vec!["up"]);

    let goodbye = Announce::http("myprinter").goodbye();
    browser.process_response(&ResponsePacket::new(vec![goodbye], Vec::new()));
    assert_eq!(names(&drain(&mut rx)), vec!["down"]);
}

#[test]
fn test_txt_filter_gates_admission() {
    let config = BrowserConfig::for_type("http").with_txt(txt_of(&[("color", "true")]));
    let (mut browser, mut rx, _source) = started(config);

    let mono = Announce::http("mono").txt(&[("color", "false")]);
    let color = Announce::http("color").txt(&[("color", "true"), ("duplex", "yes")]);
    browser.process_response(&packet_of(&[mono, color]));

    let events = drain(&mut rx);
    assert_eq!(names(&events), vec!["up"]);
    assert_eq!(events[0].service().name, "color");
    assert_eq!(browser.len(), 1);
}

#[test]
fn test_subtypes_are_collected() {
    let (mut browser, mut rx, _source) = started(BrowserConfig::for_type("http"));
    let printer = Announce::http("myprinter");
    let mut packet = printer.packet();
    packet.answers.push(ResourceRecord::ptr(
        "_printer._sub._http._tcp.local",
        printer.fqdn(),
        4500,
    ));

    browser.process_response(&packet);

    let events = drain(&mut rx);
    assert_eq!(events[0].service().subtypes, vec!["printer".to_string()]);
}

#[test]
fn test_named_browse_tracks_single_instance() {
    let config = BrowserConfig::for_type("http").with_name("myprinter");
    let (mut browser, mut rx, source) = started(config);
    assert_eq!(source.queried_names(), vec!["myprinter._http._tcp.local".to_string()]);

    let printer = Announce::http("myprinter");
    let mut packet = printer.packet();
    packet
        .answers
        .push(ResourceRecord::ptr("myprinter._http._tcp.local", printer.fqdn(), 4500));
    browser.process_response(&packet);

    assert_eq!(names(&drain(&mut rx)), vec!["up"]);
}

#[test]
fn test_up_callback_sees_every_admission() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let source = RecordingSource::new();
    let (browser, _rx) = Browser::new(Box::new(source), BrowserConfig::for_type("http")).unwrap();
    let mut browser = browser.with_up_callback(move |service| sink.lock().unwrap().push(service.name.clone()));
    browser.start();

    browser.process_response(&packet_of(&[Announce::http("alpha"), Announce::http("beta")]));
    browser.process_response(&Announce::http("alpha").packet());

    assert_eq!(*seen.lock().unwrap(), vec!["alpha".to_string(), "beta".to_string()]);
}

#[test]
fn test_wildcard_queries_each_type_once() {
    let (mut browser, mut rx, source) = started(BrowserConfig::wildcard());
    assert!(browser.is_wildcard());
    assert_eq!(source.queried_names(), vec![WILDCARD.to_string()]);

    let types = type_announcement(&[HTTP, "_ipp._tcp.local"]);
    browser.process_response(&types);
    browser.process_response(&types);
    browser.process_response(&type_announcement(&["_HTTP._tcp.local."]));

    assert_eq!(source.query_count(HTTP), 1);
    assert_eq!(source.query_count("_ipp._tcp.local"), 1);
    assert_eq!(browser.tracked_names().len(), 2);

    let mut ipp = Announce::http("office");
    ipp.service_type = "_ipp._tcp.local".to_string();
    browser.process_response(&packet_of(&[Announce::http("web"), ipp]));

    let events = drain(&mut rx);
    assert_eq!(names(&events), vec!["up", "up"]);
    assert_eq!(events[0].service().service_type, "http");
    assert_eq!(events[1].service().service_type, "ipp");
}

#[test]
fn test_wildcard_forgets_types_after_restart() {
    let (mut browser, _rx, source) = started(BrowserConfig::wildcard());
    browser.process_response(&type_announcement(&[HTTP]));

    browser.stop();
    assert!(browser.tracked_names().is_empty());
    browser.start();
    browser.process_response(&type_announcement(&[HTTP]));

    assert_eq!(source.query_count(HTTP), 2);
    assert_eq!(source.query_count(WILDCARD), 2);
}
