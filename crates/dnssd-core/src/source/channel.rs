// # Channel Record Source
//
// In-process implementation of RecordSource.
//
// ## Purpose
//
// Decouples the engine from any particular transport. Whoever owns the
// real socket (or a test) publishes decoded packets with `inject()` and
// drains outbound queries from the receiver returned by `new()`.
//
// ## Delivery
//
// - Responses fan out over a broadcast channel; every `subscribe()` gets
//   its own stream starting at the next published packet
// - A subscriber that falls more than `capacity` packets behind loses the
//   oldest ones (logged)
// - Queries are queued on an unbounded channel and never block

use tokio::sync::{broadcast, mpsc};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::warn;

use crate::Error;
use crate::traits::record_source::{
    OutboundQuery, PacketStream, RecordKind, RecordSource, ResponsePacket,
};

/// In-process record source backed by tokio channels
///
/// # Example
///
/// ```rust,no_run
/// use dnssd_core::{Browser, BrowserConfig, ChannelRecordSource};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let (source, mut queries) = ChannelRecordSource::new(64);
///     let injector = source.clone();
///
///     let (mut browser, _events) = Browser::new(Box::new(source), BrowserConfig::for_type("http"))?;
///     browser.start();
///
///     let query = queries.recv().await.expect("initial query");
///     assert_eq!(query.name, "_http._tcp.local");
///
///     // hand decoded responses to the browser's subscription
///     injector.inject(Default::default());
///     Ok(())
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ChannelRecordSource {
    responses: broadcast::Sender<ResponsePacket>,
    queries: mpsc::UnboundedSender<OutboundQuery>,
}

impl ChannelRecordSource {
    /// Create a source buffering up to `capacity` packets per subscriber
    ///
    /// Returns the source and the receiver of outbound queries.
    pub fn new(capacity: usize) -> (Self, mpsc::UnboundedReceiver<OutboundQuery>) {
        let (responses, _) = broadcast::channel(capacity.max(1));
        let (queries, rx) = mpsc::unbounded_channel();
        (Self { responses, queries }, rx)
    }

    /// Publish a response packet to every subscriber
    ///
    /// # Returns
    ///
    /// The number of subscribers that will see the packet
    pub fn inject(&self, packet: ResponsePacket) -> usize {
        self.responses.send(packet).unwrap_or(0)
    }

    /// Number of live subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.responses.receiver_count()
    }
}

impl RecordSource for ChannelRecordSource {
    fn query(&self, name: &str, kind: RecordKind) -> Result<(), Error> {
        self.queries
            .send(OutboundQuery {
                name: name.to_string(),
                kind,
            })
            .map_err(|_| Error::source("query receiver dropped"))
    }

    fn subscribe(&self) -> PacketStream {
        let stream = BroadcastStream::new(self.responses.subscribe()).filter_map(|item| match item {
            Ok(packet) => Some(packet),
            Err(BroadcastStreamRecvError::Lagged(missed)) => {
                warn!("Subscriber lagged, {} packets dropped", missed);
                None
            }
        });
        Box::pin(stream)
    }

    fn source_name(&self) -> &'static str {
        "channel"
    }
}
