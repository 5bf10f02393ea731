//! Minimal embedding example for dnssd-core
//!
//! This example demonstrates using dnssd-core as a library in a custom application.
//! The application owns the transport: a simulated responder answers the
//! browser's PTR queries over a `ChannelRecordSource`, and the browser's
//! events are printed as they arrive.

use dnssd_core::traits::{OutboundQuery, ResourceRecord, ResponsePacket};
use dnssd_core::txt::{self, TxtRecord, TxtValue};
use dnssd_core::{BrowseEvent, Browser, BrowserConfig, ChannelRecordSource, EngineConfig};
use std::net::Ipv4Addr;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, sleep};
use tracing::info;

const SERVICE_TYPE: &str = "_http._tcp.local";

/// Fake responder advertising one printer
struct SimulatedResponder {
    injector: ChannelRecordSource,
    port: u16,
    path: &'static str,
}

impl SimulatedResponder {
    fn new(injector: ChannelRecordSource) -> Self {
        Self {
            injector,
            port: 631,
            path: "/",
        }
    }

    fn fqdn(&self) -> String {
        format!("myprinter.{}", SERVICE_TYPE)
    }

    fn announcement(&self, ttl: u32) -> ResponsePacket {
        let mut txt = TxtRecord::new();
        txt.insert("path".to_string(), TxtValue::from(self.path));

        ResponsePacket::new(
            vec![ResourceRecord::ptr(SERVICE_TYPE, self.fqdn(), ttl)],
            vec![
                ResourceRecord::srv(self.fqdn(), "printer.local", self.port, ttl),
                ResourceRecord::txt(self.fqdn(), txt::encode(&txt), ttl),
                ResourceRecord::a("printer.local", Ipv4Addr::new(192, 168, 1, 20), ttl),
            ],
        )
    }

    /// Answer a query for our type
    fn answer(&self, query: &OutboundQuery) {
        if query.name.eq_ignore_ascii_case(SERVICE_TYPE) {
            println!("[Responder] Answering {} {}", query.kind, query.name);
            self.injector.inject(self.announcement(120));
        }
    }

    fn goodbye(&self) {
        println!("[Responder] Sending goodbye");
        self.injector.inject(ResponsePacket::new(
            vec![ResourceRecord::ptr(SERVICE_TYPE, self.fqdn(), 0)],
            Vec::new(),
        ));
    }
}

async fn respond(responder: &SimulatedResponder, queries: &mut mpsc::UnboundedReceiver<OutboundQuery>) {
    if let Some(query) = queries.recv().await {
        responder.answer(&query);
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    println!("=== Embedded dnssd-core Example ===\n");

    let (source, mut queries) = ChannelRecordSource::new(64);
    let mut responder = SimulatedResponder::new(source.clone());

    let config = BrowserConfig::for_type("http").with_engine(EngineConfig {
        event_channel_capacity: 100,
        refresh_interval_secs: 0,
        expire_interval_secs: 1,
    });
    println!("Configuration: {}", serde_json::to_string(&config)?);

    println!("1. Creating browser...");
    let (browser, mut event_rx) = Browser::new(Box::new(source), config)?;
    let mut browser = browser.with_up_callback(|service| {
        info!("Callback: {} is up", service.name);
    });

    let event_listener = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match &event {
                BrowseEvent::Up(service) | BrowseEvent::Down(service) => {
                    println!("[Event] {} {}", event.name(), service.fqdn);
                }
                BrowseEvent::SrvUpdate { service, previous }
                | BrowseEvent::TxtUpdate { service, previous } => {
                    println!(
                        "[Event] {} {} ({}:{} -> {}:{}, txt {:?} -> {:?})",
                        event.name(),
                        service.fqdn,
                        previous.host,
                        previous.port,
                        service.host,
                        service.port,
                        previous.txt,
                        service.txt
                    );
                }
            }
        }
    });

    println!("2. Running browser in background...");
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let browser_handle = tokio::spawn(async move {
        browser.run_with_shutdown(Some(shutdown_rx)).await?;
        Ok::<_, dnssd_core::Error>(browser)
    });

    // initial query
    respond(&responder, &mut queries).await;
    sleep(Duration::from_millis(100)).await;

    println!("3. Printer changes its port and metadata...");
    responder.port = 8631;
    responder.path = "/ipp";
    responder.injector.inject(responder.announcement(120));
    sleep(Duration::from_millis(100)).await;

    println!("4. Printer leaves the network...");
    responder.goodbye();
    sleep(Duration::from_millis(100)).await;

    println!("5. Stopping browser...");
    let _ = shutdown_tx.send(());
    let browser = browser_handle.await??;
    println!("   Known services after stop: {}", browser.len());

    drop(browser);
    let _ = tokio::time::timeout(Duration::from_millis(100), event_listener).await;

    println!("\n=== Embedding Successful ===");
    Ok(())
}
