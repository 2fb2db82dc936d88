//! TLS TCP room relay **client**.
//!
//! # Lifecycle
//!
//! ```text
//! 1. RelayClient::connect("relay.local:7900")
//! 2. client.join(room, local_participant)
//!       └─ returns participants already in the room
//! 3. let (writer, events) = client.start_recv_loop()
//!       ├─ writer: RelayWriter (MessageChannel) for gesture broadcasts
//!       └─ events: RoomEvent channel (peer joined/left, gestures)
//! 4. writer.close()  ← sends leave and shuts the stream
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use async_trait::async_trait;
use gesturecall_core::{GestureLabel, GestureMessage, Participant, ParticipantId, TransportError};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, ReadHalf, WriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::framing::{read_frame, write_frame};
use crate::{MessageChannel, RoomConnector, RoomEvent, RoomLink, RELAY_PORT, ROOM_EVENT_CAPACITY};

// ── Internal alias ────────────────────────────────────────────────────────────

type TlsClientStream = tokio_rustls::client::TlsStream<TcpStream>;

// ── Relay wire types ──────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub(crate) enum MessageType {
    Join,
    JoinAck,
    PeerJoined,
    PeerLeft,
    Gesture,
    Leave,
}

#[derive(Debug, Deserialize, Serialize)]
pub(crate) struct RelayMessage {
    #[serde(rename = "type")]
    pub msg_type: MessageType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    #[serde(rename = "participantId", skip_serializing_if = "Option::is_none")]
    pub participant_id: Option<ParticipantId>,
    #[serde(rename = "displayName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub participants: Option<Vec<Participant>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gesture: Option<GestureLabel>,
    /// Sender id, stamped by the relay on forwarded gestures.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<ParticipantId>,
}

impl RelayMessage {
    fn empty(msg_type: MessageType) -> Self {
        Self {
            msg_type,
            room: None,
            participant_id: None,
            display_name: None,
            accepted: None,
            reason: None,
            participants: None,
            gesture: None,
            from: None,
        }
    }

    pub(crate) fn join(room: &str, local: &Participant) -> Self {
        Self {
            room: Some(room.to_owned()),
            participant_id: Some(local.id.clone()),
            display_name: Some(local.name.clone()),
            ..Self::empty(MessageType::Join)
        }
    }

    pub(crate) fn gesture(message: &GestureMessage) -> Self {
        Self {
            gesture: Some(message.label().clone()),
            ..Self::empty(MessageType::Gesture)
        }
    }

    pub(crate) fn leave() -> Self {
        Self::empty(MessageType::Leave)
    }

    /// Map an inbound relay frame to a room event, if it carries one.
    fn into_room_event(self) -> Option<RoomEvent> {
        match self.msg_type {
            MessageType::PeerJoined => {
                let id = self.participant_id?;
                let name = self.display_name.unwrap_or_else(|| id.to_string());
                Some(RoomEvent::PeerJoined(Participant::new(id, name)))
            }
            MessageType::PeerLeft => Some(RoomEvent::PeerLeft(self.participant_id?)),
            MessageType::Gesture => Some(RoomEvent::Message {
                from: self.from?,
                message: GestureMessage::gesture(self.gesture?),
            }),
            _ => None,
        }
    }
}

// ── TOFU certificate verifier ────────────────────────────────────────────────

/// Trust-on-first-use: the first certificate the relay presents is pinned,
/// and later handshakes through the same verifier must present exactly
/// that certificate. Relays use self-signed certificates, so there is no
/// chain to validate.
#[derive(Debug, Default)]
pub struct TofuCertVerifier {
    pinned: StdMutex<Option<rustls::pki_types::CertificateDer<'static>>>,
}

impl TofuCertVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a certificate has been pinned yet.
    pub fn is_pinned(&self) -> bool {
        self.pinned.lock().map(|p| p.is_some()).unwrap_or(false)
    }
}

impl rustls::client::danger::ServerCertVerifier for TofuCertVerifier {
    fn verify_server_cert(
        &self,
        end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        let mut pinned = self
            .pinned
            .lock()
            .map_err(|_| rustls::Error::General("certificate pin lock poisoned".into()))?;
        let matches_pin = pinned.as_ref().map(|known| known[..] == end_entity[..]);
        match matches_pin {
            None => {
                info!("Pinning relay certificate for {:?} ({} bytes)", server_name, end_entity.len());
                *pinned = Some(end_entity.clone().into_owned());
            }
            Some(true) => {}
            Some(false) => {
                warn!("Relay {:?} presented a different certificate than the pinned one", server_name);
                return Err(rustls::Error::InvalidCertificate(
                    rustls::CertificateError::ApplicationVerificationFailure,
                ));
            }
        }
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &rustls::pki_types::CertificateDer<'_>,
        dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &rustls::crypto::ring::default_provider().signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}

/// Split `host[:port]`, defaulting to [`RELAY_PORT`].
fn split_host_port(addr: &str) -> Result<(&str, u16), TransportError> {
    match addr.rsplit_once(':') {
        Some((host, port)) if !host.is_empty() && !host.ends_with(':') => {
            let port = port.parse().map_err(|_| TransportError::ConnectionFailed {
                reason: format!("invalid port in relay address {addr:?}"),
            })?;
            Ok((host.trim_start_matches('[').trim_end_matches(']'), port))
        }
        _ if !addr.is_empty() => Ok((addr, RELAY_PORT)),
        _ => Err(TransportError::ConnectionFailed { reason: "empty relay address".into() }),
    }
}

// ── RelayClient ───────────────────────────────────────────────────────────────

/// Connection to a room relay, before the receive loop starts.
pub struct RelayClient<S = TlsClientStream> {
    stream: S,
}

impl RelayClient<TlsClientStream> {
    /// Open a TLS connection to `addr` (`host` or `host:port`), pinning
    /// whatever certificate the relay presents.
    pub async fn connect(addr: &str) -> Result<Self, TransportError> {
        Self::connect_pinned(addr, Arc::new(TofuCertVerifier::new())).await
    }

    /// Like [`connect`](Self::connect), but checks the relay certificate
    /// against `verifier`, which keeps its pin across connections.
    pub async fn connect_pinned(
        addr: &str,
        verifier: Arc<TofuCertVerifier>,
    ) -> Result<Self, TransportError> {
        let (host, port) = split_host_port(addr)?;
        if verifier.is_pinned() {
            debug!("Reconnecting to {}; expecting the pinned certificate", addr);
        }

        // Install ring crypto provider (ignored if already installed)
        let _ = rustls::crypto::ring::default_provider().install_default();

        let client_config = rustls::ClientConfig::builder()
            .dangerous()
            .with_custom_certificate_verifier(verifier)
            .with_no_client_auth();

        let connector = tokio_rustls::TlsConnector::from(Arc::new(client_config));

        let tcp = TcpStream::connect((host, port)).await.map_err(|e| {
            TransportError::ConnectionFailed { reason: format!("TCP connect to {host}:{port}: {e}") }
        })?;
        tcp.set_nodelay(true)?;

        let server_name: rustls::pki_types::ServerName =
            if let Ok(ip) = host.parse::<std::net::IpAddr>() {
                rustls::pki_types::ServerName::IpAddress(ip.into())
            } else {
                rustls::pki_types::ServerName::try_from(host.to_owned()).map_err(|_| {
                    TransportError::ConnectionFailed { reason: format!("invalid hostname: {host}") }
                })?
            };

        let tls = connector.connect(server_name, tcp).await.map_err(|e| {
            TransportError::ConnectionFailed { reason: format!("TLS handshake with {host}:{port}: {e}") }
        })?;

        info!("Relay connected to {}:{}", host, port);
        Ok(Self { stream: tls })
    }
}

impl<S> RelayClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    /// Wrap an already-established stream.
    pub fn from_stream(stream: S) -> Self {
        Self { stream }
    }

    /// Send `join` and wait for `join_ack`.
    ///
    /// Returns the participants already present in the room.
    pub async fn join(
        &mut self,
        room: &str,
        local: &Participant,
    ) -> Result<Vec<Participant>, TransportError> {
        write_frame(&mut self.stream, &RelayMessage::join(room, local)).await?;
        info!("Sent join (room={}, participant={})", room, local.id);

        loop {
            let reply: RelayMessage = read_frame(&mut self.stream).await?;
            match reply.msg_type {
                MessageType::JoinAck => {
                    if reply.accepted.unwrap_or(false) {
                        let participants: Vec<Participant> = reply
                            .participants
                            .unwrap_or_default()
                            .into_iter()
                            .filter(|p| p.id != local.id)
                            .collect();
                        info!("join_ack: accepted ({} already in room)", participants.len());
                        return Ok(participants);
                    }
                    let reason = reply.reason.unwrap_or_else(|| "no reason given".into());
                    warn!("join_ack: rejected: {}", reason);
                    return Err(TransportError::JoinRejected { reason });
                }
                other => {
                    debug!("Ignoring {:?} while waiting for join_ack", other);
                }
            }
        }
    }

    /// Consume this client, spawning a background receive task.
    ///
    /// Returns:
    /// - [`RelayWriter`]: outbound gesture channel
    /// - `Receiver<RoomEvent>`: peer and gesture events from the room
    pub fn start_recv_loop(self) -> (RelayWriter<S>, mpsc::Receiver<RoomEvent>) {
        let (event_tx, event_rx) = mpsc::channel::<RoomEvent>(ROOM_EVENT_CAPACITY);
        let (read_half, write_half) = tokio::io::split(self.stream);

        let recv_task = tokio::spawn(recv_loop(read_half, event_tx));

        let writer = RelayWriter {
            writer: Mutex::new(write_half),
            closed: AtomicBool::new(false),
            recv_task,
        };
        (writer, event_rx)
    }
}

// ── Background receive loop ───────────────────────────────────────────────────

async fn recv_loop<S: AsyncRead + Send>(mut reader: ReadHalf<S>, event_tx: mpsc::Sender<RoomEvent>) {
    loop {
        match read_frame::<RelayMessage>(&mut reader).await {
            Ok(msg) => {
                let msg_type = msg.msg_type.clone();
                match msg.into_room_event() {
                    Some(event) => {
                        if event_tx.send(event).await.is_err() {
                            debug!("Room event channel closed; stopping recv loop");
                            return;
                        }
                    }
                    None => debug!("Recv loop: ignoring {:?}", msg_type),
                }
            }
            Err(TransportError::ConnectionClosed) => {
                info!("Relay closed the connection");
                break;
            }
            Err(e) => {
                warn!("Relay receive error: {}", e);
                break;
            }
        }
    }
    let _ = event_tx.send(RoomEvent::Closed).await;
}

// ── RelayWriter ───────────────────────────────────────────────────────────────

/// Write half of the relay connection, returned by
/// [`RelayClient::start_recv_loop`].
pub struct RelayWriter<S = TlsClientStream> {
    writer: Mutex<WriteHalf<S>>,
    closed: AtomicBool,
    /// Receive loop; stopped on close so a silent relay cannot keep it alive.
    recv_task: JoinHandle<()>,
}

#[async_trait]
impl<S> MessageChannel for RelayWriter<S>
where
    S: AsyncRead + AsyncWrite + Send + 'static,
{
    async fn send(&self, message: &GestureMessage) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::ConnectionClosed);
        }
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &RelayMessage::gesture(message))
            .await
            .map_err(|e| match e {
                TransportError::Io(io) => TransportError::SendFailed { reason: io.to_string() },
                other => other,
            })
    }

    async fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.recv_task.abort();
        let mut writer = self.writer.lock().await;
        write_frame(&mut *writer, &RelayMessage::leave()).await?;
        writer.shutdown().await?;
        Ok(())
    }
}

// ── RelayConnector ────────────────────────────────────────────────────────────

/// [`RoomConnector`] backed by a TLS room relay.
///
/// The relay certificate seen on the first connection is pinned for every
/// later connection made through this connector.
#[derive(Debug, Clone)]
pub struct RelayConnector {
    addr: String,
    verifier: Arc<TofuCertVerifier>,
}

impl RelayConnector {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into(), verifier: Arc::new(TofuCertVerifier::new()) }
    }
}

#[async_trait]
impl RoomConnector for RelayConnector {
    async fn connect(&self, room: &str, local: &Participant) -> Result<RoomLink, TransportError> {
        let mut client = RelayClient::connect_pinned(&self.addr, self.verifier.clone()).await?;
        let participants = client.join(room, local).await?;
        let (writer, events) = client.start_recv_loop();
        Ok(RoomLink {
            channel: Arc::new(writer),
            events,
            participants,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::DuplexStream;

    fn local() -> Participant {
        Participant::new(ParticipantId::new("me"), "Me")
    }

    async fn ack(server: &mut DuplexStream, accepted: bool, participants: Vec<Participant>) {
        let join: RelayMessage = read_frame(server).await.unwrap();
        assert_eq!(join.msg_type, MessageType::Join);
        assert_eq!(join.room.as_deref(), Some("lobby"));
        let reply = RelayMessage {
            accepted: Some(accepted),
            reason: (!accepted).then(|| "room full".to_owned()),
            participants: Some(participants),
            ..RelayMessage::empty(MessageType::JoinAck)
        };
        write_frame(server, &reply).await.unwrap();
    }

    #[test]
    fn parses_relay_addresses() {
        assert_eq!(split_host_port("10.0.0.2:9000").unwrap(), ("10.0.0.2", 9000));
        assert_eq!(split_host_port("relay.local").unwrap(), ("relay.local", RELAY_PORT));
        assert_eq!(split_host_port("[::1]:7000").unwrap(), ("::1", 7000));
        assert!(split_host_port("host:port").is_err());
        assert!(split_host_port("").is_err());
    }

    #[test]
    fn gesture_frame_matches_data_channel_shape() {
        let msg = RelayMessage::gesture(&GestureMessage::gesture(GestureLabel::sign("D")));
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json, serde_json::json!({"type": "gesture", "gesture": "D"}));
    }

    #[tokio::test]
    async fn join_returns_existing_participants() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let mut client = RelayClient::from_stream(client_end);
        let peers = vec![
            Participant::new(ParticipantId::new("me"), "Me"),
            Participant::new(ParticipantId::new("p1"), "Bea"),
        ];

        let server_task = tokio::spawn(async move {
            ack(&mut server, true, peers).await;
            server
        });
        let participants = client.join("lobby", &local()).await.unwrap();
        server_task.await.unwrap();

        assert_eq!(participants, vec![Participant::new(ParticipantId::new("p1"), "Bea")]);
    }

    #[tokio::test]
    async fn join_rejection_is_an_error() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let mut client = RelayClient::from_stream(client_end);
        let server_task = tokio::spawn(async move {
            ack(&mut server, false, vec![]).await;
            server
        });
        let err = client.join("lobby", &local()).await.unwrap_err();
        let _server = server_task.await.unwrap();
        assert!(matches!(err, TransportError::JoinRejected { ref reason } if reason == "room full"));
    }

    #[tokio::test]
    async fn recv_loop_forwards_room_events() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let client = RelayClient::from_stream(client_end);
        let (writer, mut events) = client.start_recv_loop();

        let joined = RelayMessage {
            participant_id: Some(ParticipantId::new("p2")),
            display_name: Some("Caio".into()),
            ..RelayMessage::empty(MessageType::PeerJoined)
        };
        let gesture = RelayMessage {
            from: Some(ParticipantId::new("p2")),
            ..RelayMessage::gesture(&GestureMessage::gesture(GestureLabel::sign("7R")))
        };
        let left = RelayMessage {
            participant_id: Some(ParticipantId::new("p2")),
            ..RelayMessage::empty(MessageType::PeerLeft)
        };
        for msg in [joined, gesture, left] {
            write_frame(&mut server, &msg).await.unwrap();
        }

        assert_eq!(
            events.recv().await,
            Some(RoomEvent::PeerJoined(Participant::new(ParticipantId::new("p2"), "Caio")))
        );
        assert_eq!(
            events.recv().await,
            Some(RoomEvent::Message {
                from: ParticipantId::new("p2"),
                message: GestureMessage::gesture(GestureLabel::sign("7R")),
            })
        );
        assert_eq!(events.recv().await, Some(RoomEvent::PeerLeft(ParticipantId::new("p2"))));

        // Outbound gesture reaches the relay
        writer.send(&GestureMessage::gesture(GestureLabel::sign("A"))).await.unwrap();
        let sent: RelayMessage = read_frame(&mut server).await.unwrap();
        assert_eq!(sent.msg_type, MessageType::Gesture);
        assert_eq!(sent.gesture, Some(GestureLabel::sign("A")));

        writer.close().await.unwrap();
        let leave: RelayMessage = read_frame(&mut server).await.unwrap();
        assert_eq!(leave.msg_type, MessageType::Leave);
        assert!(matches!(
            writer.send(&GestureMessage::gesture(GestureLabel::NoGesture)).await,
            Err(TransportError::ConnectionClosed)
        ));
    }

    #[tokio::test]
    async fn relay_hangup_reports_closed() {
        let (client_end, server) = tokio::io::duplex(4096);
        let (writer, mut events) = RelayClient::from_stream(client_end).start_recv_loop();
        drop(server);
        assert_eq!(events.recv().await, Some(RoomEvent::Closed));
        assert!(matches!(
            writer.send(&GestureMessage::gesture(GestureLabel::sign("A"))).await,
            Err(TransportError::SendFailed { .. })
        ));
    }

    #[tokio::test]
    async fn close_stops_recv_loop_while_relay_stays_silent() {
        let (client_end, mut server) = tokio::io::duplex(4096);
        let (writer, mut events) = RelayClient::from_stream(client_end).start_recv_loop();

        writer.close().await.unwrap();
        let leave: RelayMessage = read_frame(&mut server).await.unwrap();
        assert_eq!(leave.msg_type, MessageType::Leave);

        // The relay keeps the connection open; the loop must still be gone.
        let ended = tokio::time::timeout(std::time::Duration::from_secs(1), events.recv())
            .await
            .expect("recv loop still running after close");
        assert_eq!(ended, None);
        drop(server);
    }

    #[test]
    fn tofu_verifier_pins_first_certificate() {
        use rustls::client::danger::ServerCertVerifier;
        use rustls::pki_types::{CertificateDer, ServerName, UnixTime};

        let verifier = TofuCertVerifier::new();
        let name = ServerName::try_from("relay.local").unwrap();
        let first = CertificateDer::from(vec![1u8, 2, 3]);
        let other = CertificateDer::from(vec![9u8, 9, 9]);
        let verify = |cert: &CertificateDer<'_>| {
            verifier.verify_server_cert(cert, &[], &name, &[], UnixTime::now())
        };

        assert!(!verifier.is_pinned());
        assert!(verify(&first).is_ok());
        assert!(verifier.is_pinned());
        assert!(verify(&first).is_ok());
        assert!(matches!(
            verify(&other),
            Err(rustls::Error::InvalidCertificate(
                rustls::CertificateError::ApplicationVerificationFailure
            ))
        ));
    }
}
