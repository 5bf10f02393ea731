//! Core discovery engine
//!
//! The Browser is responsible for:
//! - Issuing PTR queries for the configured service type (or the meta-query)
//! - Correlating each response packet's records into candidate services
//! - Maintaining the set of known services, keyed by fully-qualified name
//! - Classifying changes into up / down / srv-update / txt-update events
//! - Expiring services whose TTL lapsed, when asked to
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐
//! │ RecordSource │─── ResponsePacket ───┐
//! └──────────────┘                      │
//!        ▲                              ▼
//!        │ query(PTR)           ┌──────────────┐
//!        └──────────────────────│   Browser    │
//!                               └──────────────┘
//!                                       │
//!                   ┌───────────────────┴───────────────────┐
//!                   ▼                                       ▼
//!           ┌──────────────┐                        ┌──────────────┐
//!           │ Known set    │                        │   Events     │
//!           │ (by fqdn)    │                        │  (notify)    │
//!           └──────────────┘                        └──────────────┘
//! ```
//!
//! ## Packet Flow
//!
//! 1. In wildcard mode, newly announced service types become tracked names
//!    and are queried once
//! 2. For each tracked name, goodbye PTRs remove known services
//! 3. Candidates are built and diffed against the known set
//! 4. Events are emitted for every change
//!
//! SRV-derived and TXT-derived changes are evaluated independently, so a
//! single packet may produce both a `SrvUpdate` and a `TxtUpdate` for the
//! same service. They are never coalesced.

mod matching;

use crate::config::{BrowserConfig, EngineConfig};
use crate::error::Result;
use crate::filter::{self, TxtQuery};
use crate::names::dns_eq;
use crate::service::ServiceRecord;
use crate::traits::{PacketStream, RecordKind, RecordSource, ResponsePacket};
use chrono::{DateTime, Utc};
use matching::{MatchContext, PacketIndex};
use std::collections::HashSet;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{Duration, Instant, Interval};
use tokio_stream::StreamExt;
use tracing::{debug, info, trace, warn};

/// Events emitted by the Browser
#[derive(Debug, Clone, PartialEq)]
pub enum BrowseEvent {
    /// A new service was admitted
    Up(ServiceRecord),

    /// A service went away (goodbye, expiry, or no longer matching the TXT filter)
    Down(ServiceRecord),

    /// Host, port, type, protocol, instance name or address set changed
    SrvUpdate {
        service: ServiceRecord,
        previous: ServiceRecord,
    },

    /// Decoded TXT content changed
    TxtUpdate {
        service: ServiceRecord,
        previous: ServiceRecord,
    },
}

impl BrowseEvent {
    /// The service the event is about (the new one for updates)
    pub fn service(&self) -> &ServiceRecord {
        match self {
            BrowseEvent::Up(service)
            | BrowseEvent::Down(service)
            | BrowseEvent::SrvUpdate { service, .. }
            | BrowseEvent::TxtUpdate { service, .. } => service,
        }
    }

    /// Short event name, e.g. "srv-update"
    pub fn name(&self) -> &'static str {
        match self {
            BrowseEvent::Up(_) => "up",
            BrowseEvent::Down(_) => "down",
            BrowseEvent::SrvUpdate { .. } => "srv-update",
            BrowseEvent::TxtUpdate { .. } => "txt-update",
        }
    }
}

type UpCallback = Box<dyn FnMut(&ServiceRecord) + Send>;

/// Core discovery engine
///
/// ## Lifecycle
///
/// 1. Create with [`Browser::new()`]
/// 2. [`start()`](Browser::start) subscribes to the record source and sends the first query
/// 3. Feed packets with [`process_response()`](Browser::process_response), or let
///    [`run()`](Browser::run) do it
/// 4. [`stop()`](Browser::stop) unsubscribes; the known set is kept
///
/// ## Threading
///
/// The browser is not internally synchronized. Every operation takes
/// `&mut self`, so it must live on a single task (or behind one lock) that
/// also receives the packets. It never schedules work on its own:
/// [`refresh_query()`](Browser::refresh_query) and [`expire()`](Browser::expire)
/// are driven by the owner, which is what the hosting loop in `run()` does.
///
/// ## Events
///
/// Events are sent with `try_send`. When the channel is full the event is
/// dropped with a warning, but the known set is still updated. A consumer
/// that mirrors the known set from events is out of sync after a drop (a
/// lost `Down` leaves a service it still believes is up) and should
/// resynchronise from [`services()`](Browser::services), using
/// [`generation()`](Browser::generation) to notice that the set moved on.
pub struct Browser {
    /// Transport for queries and inbound packets
    source: Box<dyn RecordSource>,

    /// Name to PTR-query (None = disabled)
    query_name: Option<String>,

    /// Enumerating all service types
    wildcard: bool,

    /// Compiled TXT filter
    txt_query: Option<TxtQuery>,

    /// Keep TXT values as bytes
    txt_binary: bool,

    /// Subtypes of interest (informational)
    subtypes: Vec<String>,

    /// Hosting loop settings
    settings: EngineConfig,

    /// Known services in discovery order
    services: Vec<ServiceRecord>,

    /// Bumped on every change to the known set
    generation: u64,

    /// Names whose PTR records are processed
    tracked: Vec<String>,

    /// Service types already queried in wildcard mode (lower-cased)
    queried_types: HashSet<String>,

    /// Live subscription; `Some` while listening
    packets: Option<PacketStream>,

    /// Event sender for consumers
    event_tx: mpsc::Sender<BrowseEvent>,

    /// Convenience callback for `Up` events
    on_up: Option<UpCallback>,
}

impl Browser {
    /// Create a new browser
    ///
    /// # Parameters
    ///
    /// - `source`: Record source implementation
    /// - `config`: Browser configuration
    ///
    /// # Returns
    ///
    /// A tuple of (browser, event_receiver) where event_receiver yields browse events
    pub fn new(
        source: Box<dyn RecordSource>,
        config: BrowserConfig,
    ) -> Result<(Self, mpsc::Receiver<BrowseEvent>)> {
        config.validate()?;

        let query_name = config.query_name();
        if query_name.is_none() {
            warn!(
                "No service type configured (type: {:?}, name: {:?}); browser disabled",
                config.service_type, config.name
            );
        }

        let (tx, rx) = mpsc::channel(config.engine.event_channel_capacity);

        let browser = Self {
            source,
            wildcard: config.is_wildcard(),
            query_name,
            txt_query: config.txt.as_ref().map(TxtQuery::from_pattern),
            txt_binary: config.txt_binary,
            subtypes: config.subtypes,
            settings: config.engine,
            services: Vec::new(),
            generation: 0,
            tracked: Vec::new(),
            queried_types: HashSet::new(),
            packets: None,
            event_tx: tx,
            on_up: None,
        };

        Ok((browser, rx))
    }

    /// Register a callback invoked for every `Up` event
    pub fn with_up_callback(mut self, callback: impl FnMut(&ServiceRecord) + Send + 'static) -> Self {
        self.on_up = Some(Box::new(callback));
        self
    }

    /// Start listening
    ///
    /// Subscribes to the record source and sends the initial PTR query.
    /// Does nothing if already listening or if the browser is disabled.
    pub fn start(&mut self) {
        if self.packets.is_some() {
            return;
        }
        let Some(name) = self.query_name.clone() else {
            debug!("Browser disabled, start ignored");
            return;
        };

        self.packets = Some(self.source.subscribe());
        self.tracked.clear();
        self.queried_types.clear();
        if !self.wildcard {
            self.tracked.push(name.clone());
        }

        info!(
            "Browsing {} via {}{}",
            name,
            self.source.source_name(),
            if self.wildcard { " (wildcard)" } else { "" }
        );
        self.send_query(&name);
    }

    /// Stop listening
    ///
    /// Drops the subscription and forgets the wildcard bookkeeping. Known
    /// services are kept.
    pub fn stop(&mut self) {
        if self.packets.take().is_none() {
            return;
        }
        self.tracked.clear();
        self.queried_types.clear();
        info!("Browser stopped ({} known services kept)", self.services.len());
    }

    /// Re-send the PTR query without touching the listener
    pub fn refresh_query(&self) {
        if let Some(name) = &self.query_name {
            self.send_query(name);
        }
    }

    /// Remove every service whose TTL lapsed, emitting `Down` for each
    ///
    /// # Returns
    ///
    /// The number of services removed
    pub fn expire(&mut self) -> usize {
        self.expire_at(Utc::now())
    }

    /// [`expire()`](Browser::expire) against an explicit clock
    pub fn expire_at(&mut self, now: DateTime<Utc>) -> usize {
        let (expired, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.services)
            .into_iter()
            .partition(|service| service.is_expired(now));
        self.services = kept;

        if expired.is_empty() {
            return 0;
        }

        self.generation += 1;
        let count = expired.len();
        for service in expired {
            info!("Service expired: {}", service.fqdn);
            self.emit_event(BrowseEvent::Down(service));
        }
        count
    }

    /// Handle one inbound packet, stamped with the current time
    pub fn process_response(&mut self, packet: &ResponsePacket) {
        self.process_response_at(packet, Utc::now());
    }

    /// Handle one inbound packet
    ///
    /// Packets received while not listening are ignored.
    pub fn process_response_at(&mut self, packet: &ResponsePacket, seen_at: DateTime<Utc>) {
        if self.packets.is_none() {
            trace!("Not listening, packet ignored");
            return;
        }

        if self.wildcard {
            self.track_announced_types(packet);
        }

        let index = PacketIndex::new(packet);
        let ctx = MatchContext {
            seen_at,
            txt_binary: self.txt_binary,
            referrer: packet.referrer,
        };

        for name in self.tracked.clone() {
            // goodbyes first, so a restart announced in one burst yields down + up
            for fqdn in matching::goodbyes(packet, &name) {
                self.remove_service(fqdn);
            }

            for candidate in index.candidates(&name, ctx) {
                match self.position(&candidate.fqdn) {
                    Some(pos) => {
                        let txt_seen = index.has_txt(&candidate.fqdn);
                        self.update_service(pos, candidate, txt_seen)
                    }
                    None => self.add_service(candidate),
                }
            }
        }
    }

    /// Snapshot of the known services, in discovery order
    pub fn services(&self) -> Vec<ServiceRecord> {
        self.services.clone()
    }

    /// Look up a known service by fully-qualified name
    pub fn service(&self, fqdn: &str) -> Option<&ServiceRecord> {
        self.position(fqdn).map(|pos| &self.services[pos])
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Version of the known set; changes whenever a service is added,
    /// replaced or removed
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The name this browser queries, if enabled
    pub fn query_name(&self) -> Option<&str> {
        self.query_name.as_deref()
    }

    pub fn is_wildcard(&self) -> bool {
        self.wildcard
    }

    pub fn is_listening(&self) -> bool {
        self.packets.is_some()
    }

    /// Names currently processed on each packet
    pub fn tracked_names(&self) -> &[String] {
        &self.tracked
    }

    /// Subtypes given in the configuration
    pub fn subtypes(&self) -> &[String] {
        &self.subtypes
    }

    /// Run the browser until Ctrl-C
    ///
    /// Starts listening, feeds every packet from the subscription into the
    /// engine and drives `refresh_query()` / `expire()` on the configured
    /// intervals. Stops listening before returning.
    pub async fn run(&mut self) -> Result<()> {
        self.run_internal(None).await
    }

    /// Run the browser until `shutdown_rx` fires (or Ctrl-C when `None`)
    pub async fn run_with_shutdown(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.run_internal(shutdown_rx).await
    }

    async fn run_internal(&mut self, shutdown_rx: Option<oneshot::Receiver<()>>) -> Result<()> {
        self.start();
        if !self.is_listening() {
            warn!("Browser disabled, nothing to run");
            return Ok(());
        }

        let mut refresh = periodic(self.settings.refresh_interval_secs);
        let mut expiry = periodic(self.settings.expire_interval_secs);

        let shutdown = async move {
            match shutdown_rx {
                Some(rx) => {
                    let _ = rx.await;
                }
                None => {
                    let _ = tokio::signal::ctrl_c().await;
                }
            }
        };
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                packet = next_packet(&mut self.packets) => match packet {
                    Some(packet) => self.process_response(&packet),
                    None => {
                        warn!("Record source closed the packet stream");
                        break;
                    }
                },

                _ = tick(&mut refresh) => self.refresh_query(),

                _ = tick(&mut expiry) => {
                    self.expire();
                }

                _ = &mut shutdown => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        self.stop();
        Ok(())
    }

    /// Add newly announced service types to the tracked set and query each once
    fn track_announced_types(&mut self, packet: &ResponsePacket) {
        for service_type in matching::announced_types(packet) {
            let key = service_type.trim_end_matches('.').to_ascii_lowercase();
            if !self.queried_types.insert(key) {
                continue;
            }

            info!("Discovered service type: {}", service_type);
            self.tracked.push(service_type.to_string());
            self.send_query(service_type);
        }
    }

    fn position(&self, fqdn: &str) -> Option<usize> {
        self.services.iter().position(|s| dns_eq(&s.fqdn, fqdn))
    }

    fn add_service(&mut self, service: ServiceRecord) {
        if !filter::filter_service(&service, self.txt_query.as_ref()) {
            debug!("Service {} rejected by TXT filter", service.fqdn);
            return;
        }

        info!("Service up: {} at {}:{}", service.fqdn, service.host, service.port);
        self.services.push(service.clone());
        self.generation += 1;

        if let Some(callback) = self.on_up.as_mut() {
            callback(&service);
        }
        self.emit_event(BrowseEvent::Up(service));
    }

    fn update_service(&mut self, pos: usize, mut candidate: ServiceRecord, txt_seen: bool) {
        let previous = self.services[pos].clone();
        if !txt_seen {
            // no TXT record in this packet: what we know still stands
            candidate.txt = previous.txt.clone();
            candidate.raw_txt = previous.raw_txt.clone();
        }
        {
            let stored = &mut self.services[pos];
            stored.last_seen = candidate.last_seen;
            stored.ttl = candidate.ttl;
            stored.referrer = candidate.referrer;
        }

        if previous.srv_differs(&candidate) {
            info!("Service connection changed: {}", candidate.fqdn);
            self.services[pos] = candidate.clone();
            self.generation += 1;
            self.emit_event(BrowseEvent::SrvUpdate {
                service: candidate.clone(),
                previous: previous.clone(),
            });
        }

        if previous.txt_differs(&candidate) {
            if !filter::filter_service(&candidate, self.txt_query.as_ref()) {
                debug!("Service {} no longer matches TXT filter", candidate.fqdn);
                self.remove_at(pos);
                return;
            }

            debug!("Service metadata changed: {}", candidate.fqdn);
            self.services[pos] = candidate.clone();
            self.generation += 1;
            self.emit_event(BrowseEvent::TxtUpdate {
                service: candidate,
                previous,
            });
        }
    }

    fn remove_service(&mut self, fqdn: &str) {
        match self.position(fqdn) {
            Some(pos) => self.remove_at(pos),
            None => trace!("Goodbye for unknown service {}", fqdn),
        }
    }

    fn remove_at(&mut self, pos: usize) {
        let service = self.services.remove(pos);
        self.generation += 1;
        info!("Service down: {}", service.fqdn);
        self.emit_event(BrowseEvent::Down(service));
    }

    fn send_query(&self, name: &str) {
        debug!("Querying {} {}", name, RecordKind::Ptr);
        if let Err(e) = self.source.query(name, RecordKind::Ptr) {
            warn!("Failed to send query for {}: {}", name, e);
        }
    }

    /// Emit a browse event
    fn emit_event(&self, event: BrowseEvent) {
        match self.event_tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                warn!(
                    "Event channel full, dropping {} event for {}. Consider increasing event_channel_capacity.",
                    event.name(),
                    event.service().fqdn
                );
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                trace!("Event receiver dropped");
            }
        }
    }
}

/// Interval that first fires one period from now; `None` when disabled
fn periodic(secs: u64) -> Option<Interval> {
    (secs > 0).then(|| {
        let period = Duration::from_secs(secs);
        tokio::time::interval_at(Instant::now() + period, period)
    })
}

async fn tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn next_packet(packets: &mut Option<PacketStream>) -> Option<ResponsePacket> {
    match packets {
        Some(stream) => stream.next().await,
        None => std::future::pending().await,
    }
}
