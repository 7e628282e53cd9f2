//! IPC server implementation

use pomo_api::{ClientInfo, ClientRole, Command, Event, Request, Response, API_VERSION};
use pomo_util::{ClientId, PomoError};
use std::collections::HashMap;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::{IpcError, IpcResult};

const EVENT_BUFFER: usize = 256;

/// Message from a client connection to the daemon loop
#[derive(Debug)]
pub enum ServerMessage {
    Request {
        client_id: ClientId,
        request: Request,
    },
    ClientConnected {
        client_id: ClientId,
        info: ClientInfo,
    },
    ClientDisconnected {
        client_id: ClientId,
    },
}

type ClientMap = Arc<RwLock<HashMap<ClientId, ClientHandle>>>;

struct ClientHandle {
    info: ClientInfo,
    response_tx: mpsc::UnboundedSender<String>,
    subscribed: bool,
    /// Requests forwarded to the daemon and not yet answered
    pending: usize,
    /// Set at EOF; the handle goes once `pending` reaches zero
    reader_done: bool,
}

/// IPC Server
pub struct IpcServer {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    clients: ClientMap,
    event_tx: broadcast::Sender<Event>,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
    message_rx: Mutex<Option<mpsc::UnboundedReceiver<ServerMessage>>>,
}

impl IpcServer {
    pub fn new(socket_path: impl AsRef<Path>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_BUFFER);
        let (message_tx, message_rx) = mpsc::unbounded_channel();

        Self {
            socket_path: socket_path.as_ref().to_path_buf(),
            listener: None,
            clients: Arc::new(RwLock::new(HashMap::new())),
            event_tx,
            message_tx,
            message_rx: Mutex::new(Some(message_rx)),
        }
    }

    pub fn socket_path(&self) -> &Path {
        &self.socket_path
    }

    /// Bind the socket, replacing a stale one. Only the owner may connect.
    pub async fn start(&mut self) -> IpcResult<()> {
        if self.socket_path.exists() {
            std::fs::remove_file(&self.socket_path)?;
        }

        if let Some(parent) = self.socket_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let listener = UnixListener::bind(&self.socket_path)?;
        std::fs::set_permissions(&self.socket_path, std::fs::Permissions::from_mode(0o600))?;

        info!(path = %self.socket_path.display(), "IPC server listening");
        self.listener = Some(listener);
        Ok(())
    }

    /// Take the receiver for client messages. Only the first call gets it.
    pub async fn take_message_receiver(&self) -> Option<mpsc::UnboundedReceiver<ServerMessage>> {
        self.message_rx.lock().await.take()
    }

    /// Accept connections until the task is dropped
    pub async fn run(&self) -> IpcResult<()> {
        let listener = self
            .listener
            .as_ref()
            .ok_or_else(|| IpcError::ServerError("Server not started".into()))?;

        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let client_id = ClientId::new();
                    let uid = peer_uid(&stream);
                    let role = role_for_uid(uid, nix::unistd::getuid().as_raw());

                    let mut info = ClientInfo::new(role);
                    info.client_id = client_id.clone();
                    if let Some(u) = uid {
                        info = info.with_uid(u);
                    }

                    debug!(client_id = %client_id, uid = ?uid, role = ?role, "Accepted connection");
                    self.handle_client(stream, client_id, info).await;
                }
                Err(e) => {
                    error!(error = %e, "Failed to accept connection");
                }
            }
        }
    }

    async fn handle_client(&self, stream: UnixStream, client_id: ClientId, info: ClientInfo) {
        let (read_half, write_half) = stream.into_split();
        let (response_tx, response_rx) = mpsc::unbounded_channel::<String>();

        self.clients.write().await.insert(
            client_id.clone(),
            ClientHandle {
                info: info.clone(),
                response_tx,
                subscribed: false,
                pending: 0,
                reader_done: false,
            },
        );

        let _ = self.message_tx.send(ServerMessage::ClientConnected {
            client_id: client_id.clone(),
            info,
        });

        tokio::spawn(read_requests(
            read_half,
            client_id.clone(),
            self.clients.clone(),
            self.message_tx.clone(),
        ));

        tokio::spawn(write_responses(
            write_half,
            client_id,
            response_rx,
            self.event_tx.subscribe(),
            self.clients.clone(),
            self.message_tx.clone(),
        ));
    }

    /// Send a response to a specific client
    pub async fn send_response(&self, client_id: &ClientId, response: Response) -> IpcResult<()> {
        let json = serde_json::to_string(&response)?;

        let mut clients = self.clients.write().await;
        let Some(handle) = clients.get_mut(client_id) else {
            return Err(IpcError::ConnectionClosed);
        };

        let sent = handle.response_tx.send(json);
        handle.pending = handle.pending.saturating_sub(1);
        if handle.reader_done && handle.pending == 0 {
            // dropping the sender lets the writer flush and finish
            clients.remove(client_id);
        }

        sent.map_err(|_| IpcError::ConnectionClosed)
    }

    /// Broadcast an event to all subscribed clients
    pub fn broadcast_event(&self, event: Event) {
        let _ = self.event_tx.send(event);
    }

    /// Sender for broadcasting from outside the server (e.g. a notification sink)
    pub fn event_sender(&self) -> broadcast::Sender<Event> {
        self.event_tx.clone()
    }

    pub async fn get_client_info(&self, client_id: &ClientId) -> Option<ClientInfo> {
        let clients = self.clients.read().await;
        clients.get(client_id).map(|h| h.info.clone())
    }

    pub async fn client_count(&self) -> usize {
        self.clients.read().await.len()
    }

    /// Remove the socket file
    pub fn shutdown(&self) {
        if self.socket_path.exists() {
            let _ = std::fs::remove_file(&self.socket_path);
        }
    }
}

impl Drop for IpcServer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn read_requests(
    read_half: OwnedReadHalf,
    client_id: ClientId,
    clients: ClientMap,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    let mut reader = BufReader::new(read_half);
    let mut line = String::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!(client_id = %client_id, "Client disconnected (EOF)");
                break;
            }
            Ok(_) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                let request = match parse_request(line) {
                    Ok(request) => request,
                    Err((request_id, err)) => {
                        warn!(client_id = %client_id, error = %err, "Invalid request");
                        reject(&clients, &client_id, request_id, err).await;
                        continue;
                    }
                };

                // subscription state lives here so the writer sees it before
                // the daemon has answered
                let subscribed = match request.command {
                    Command::SubscribeEvents => Some(true),
                    Command::UnsubscribeEvents => Some(false),
                    _ => None,
                };
                if let Some(handle) = clients.write().await.get_mut(&client_id) {
                    if let Some(subscribed) = subscribed {
                        handle.subscribed = subscribed;
                    }
                    handle.pending += 1;
                }

                let _ = message_tx.send(ServerMessage::Request {
                    client_id: client_id.clone(),
                    request,
                });
            }
            Err(e) => {
                debug!(client_id = %client_id, error = %e, "Read error");
                break;
            }
        }
    }

    // keep the handle until every forwarded request has been answered
    let mut clients = clients.write().await;
    let idle = match clients.get_mut(&client_id) {
        Some(handle) => {
            handle.reader_done = true;
            handle.pending == 0
        }
        None => false,
    };
    if idle {
        // dropping the sender ends the writer task
        clients.remove(&client_id);
    }
}

/// Decode one request line. On failure, returns the request id to answer
/// with (0 when the line has none) and the reason.
fn parse_request(line: &str) -> Result<Request, (u64, PomoError)> {
    let value: serde_json::Value = serde_json::from_str(line)
        .map_err(|e| (0, PomoError::invalid_request(e.to_string())))?;
    let request_id = value
        .get("request_id")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);

    let request: Request = serde_json::from_value(value)
        .map_err(|e| (request_id, PomoError::invalid_request(e.to_string())))?;
    if request.api_version != API_VERSION {
        return Err((
            request_id,
            PomoError::invalid_request(format!(
                "unsupported api_version {} (expected {})",
                request.api_version, API_VERSION
            )),
        ));
    }

    Ok(request)
}

async fn reject(clients: &ClientMap, client_id: &ClientId, request_id: u64, err: PomoError) {
    let response = Response::error(request_id, err.into());
    let Ok(json) = serde_json::to_string(&response) else {
        return;
    };
    if let Some(handle) = clients.read().await.get(client_id) {
        let _ = handle.response_tx.send(json);
    }
}

async fn write_responses(
    mut writer: OwnedWriteHalf,
    client_id: ClientId,
    mut response_rx: mpsc::UnboundedReceiver<String>,
    mut event_rx: broadcast::Receiver<Event>,
    clients: ClientMap,
    message_tx: mpsc::UnboundedSender<ServerMessage>,
) {
    loop {
        tokio::select! {
            response = response_rx.recv() => {
                let Some(response) = response else { break };
                if let Err(e) = write_line(&mut writer, response).await {
                    debug!(client_id = %client_id, error = %e, "Write error");
                    break;
                }
            }

            event = event_rx.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(client_id = %client_id, skipped, "Client lagging, events dropped");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                let is_subscribed = clients
                    .read()
                    .await
                    .get(&client_id)
                    .map(|h| h.subscribed)
                    .unwrap_or(false);
                if !is_subscribed {
                    continue;
                }

                match serde_json::to_string(&event) {
                    Ok(json) => {
                        if let Err(e) = write_line(&mut writer, json).await {
                            debug!(client_id = %client_id, error = %e, "Event write error");
                            break;
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to encode event"),
                }
            }
        }
    }

    clients.write().await.remove(&client_id);
    let _ = message_tx.send(ServerMessage::ClientDisconnected { client_id });
}

async fn write_line(writer: &mut OwnedWriteHalf, mut line: String) -> std::io::Result<()> {
    line.push('\n');
    writer.write_all(line.as_bytes()).await
}

/// Same user as the daemon (or root) may drive the timer; anyone else only
/// watches.
pub fn role_for_uid(peer_uid: Option<u32>, daemon_uid: u32) -> ClientRole {
    match peer_uid {
        Some(0) => ClientRole::Controller,
        Some(u) if u == daemon_uid => ClientRole::Controller,
        _ => ClientRole::Observer,
    }
}

fn peer_uid(stream: &UnixStream) -> Option<u32> {
    use std::os::unix::io::AsFd;

    let fd = stream.as_fd();
    nix::sys::socket::getsockopt(&fd, nix::sys::socket::sockopt::PeerCredentials)
        .ok()
        .map(|cred| cred.uid())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IpcClient;
    use pomo_api::{ErrorCode, ErrorInfo, EventPayload, ResponsePayload, ResponseResult};
    use tempfile::tempdir;

    #[test]
    fn roles_by_uid() {
        assert_eq!(role_for_uid(Some(0), 1000), ClientRole::Controller);
        assert_eq!(role_for_uid(Some(1000), 1000), ClientRole::Controller);
        assert_eq!(role_for_uid(Some(1001), 1000), ClientRole::Observer);
        assert_eq!(role_for_uid(None, 1000), ClientRole::Observer);
    }

    #[tokio::test]
    async fn server_start_creates_private_socket() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("run").join("test.sock");

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();

        let mode = std::fs::metadata(&socket_path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);

        server.shutdown();
        assert!(!socket_path.exists());
    }

    #[tokio::test]
    async fn request_response_and_events() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");

        let mut server = IpcServer::new(&socket_path);
        server.start().await.unwrap();
        let server = Arc::new(server);
        let mut messages = server.take_message_receiver().await.unwrap();

        let accept = server.clone();
        tokio::spawn(async move {
            let _ = accept.run().await;
        });

        // answer every request with Pong / Subscribed
        let responder = server.clone();
        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                if let ServerMessage::Request { client_id, request } = msg {
                    let payload = match request.command {
                        Command::SubscribeEvents => ResponsePayload::Subscribed {
                            client_id: client_id.clone(),
                        },
                        _ => ResponsePayload::Pong,
                    };
                    let _ = responder
                        .send_response(&client_id, Response::success(request.request_id, payload))
                        .await;
                }
            }
        });

        let mut client = IpcClient::connect(&socket_path).await.unwrap();
        let response = client.send(Command::Ping).await.unwrap();
        assert_eq!(response.request_id, 1);
        assert!(matches!(
            response.result,
            ResponseResult::Ok(ResponsePayload::Pong)
        ));

        let mut events = IpcClient::connect(&socket_path)
            .await
            .unwrap()
            .subscribe()
            .await
            .unwrap();
        server.broadcast_event(Event::new(EventPayload::StatisticsReset));

        let event = events.next().await.unwrap();
        assert!(matches!(event.payload, EventPayload::StatisticsReset));
    }

    /// Started server whose responder answers every request with `Pong`
    async fn pong_server(socket_path: &Path) -> Arc<IpcServer> {
        let mut server = IpcServer::new(socket_path);
        server.start().await.unwrap();
        let server = Arc::new(server);
        let mut messages = server.take_message_receiver().await.unwrap();

        let accept = server.clone();
        tokio::spawn(async move {
            let _ = accept.run().await;
        });

        let responder = server.clone();
        tokio::spawn(async move {
            while let Some(msg) = messages.recv().await {
                if let ServerMessage::Request { client_id, request } = msg {
                    // answer late, after a half-closing client has hit EOF
                    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
                    let _ = responder
                        .send_response(
                            &client_id,
                            Response::success(request.request_id, ResponsePayload::Pong),
                        )
                        .await;
                }
            }
        });

        server
    }

    async fn exchange(socket_path: &Path, line: &str, half_close: bool) -> Response {
        let stream = UnixStream::connect(socket_path).await.unwrap();
        let (read_half, mut write_half) = stream.into_split();
        write_half.write_all(line.as_bytes()).await.unwrap();
        if half_close {
            write_half.shutdown().await.unwrap();
        }

        let mut reader = BufReader::new(read_half);
        let mut reply = String::new();
        tokio::time::timeout(
            std::time::Duration::from_secs(2),
            reader.read_line(&mut reply),
        )
        .await
        .expect("no reply from server")
        .unwrap();
        serde_json::from_str(&reply).unwrap()
    }

    #[tokio::test]
    async fn unknown_command_is_answered_with_invalid_request() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let _server = pong_server(&socket_path).await;

        let response = exchange(
            &socket_path,
            "{\"request_id\":1,\"api_version\":1,\"command\":{\"type\":\"bogus\"}}\n",
            false,
        )
        .await;

        assert_eq!(response.request_id, 1);
        let ResponseResult::Err(info) = response.result else {
            panic!("expected an error response");
        };
        assert_eq!(info.code, ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn garbage_and_wrong_version_are_rejected() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let _server = pong_server(&socket_path).await;

        let response = exchange(&socket_path, "not json\n", false).await;
        assert_eq!(response.request_id, 0);
        assert!(matches!(
            response.result,
            ResponseResult::Err(ErrorInfo { code: ErrorCode::InvalidRequest, .. })
        ));

        let response = exchange(
            &socket_path,
            "{\"request_id\":4,\"api_version\":99,\"command\":{\"type\":\"ping\"}}\n",
            false,
        )
        .await;
        assert_eq!(response.request_id, 4);
        let ResponseResult::Err(info) = response.result else {
            panic!("expected an error response");
        };
        assert_eq!(info.code, ErrorCode::InvalidRequest);
        assert!(info.message.contains("api_version"));
    }

    #[tokio::test]
    async fn half_closed_client_still_gets_its_response() {
        let dir = tempdir().unwrap();
        let socket_path = dir.path().join("test.sock");
        let server = pong_server(&socket_path).await;

        let line = format!(
            "{}\n",
            serde_json::to_string(&Request::new(9, Command::Ping)).unwrap()
        );
        let response = exchange(&socket_path, &line, true).await;

        assert_eq!(response.request_id, 9);
        assert!(matches!(
            response.result,
            ResponseResult::Ok(ResponsePayload::Pong)
        ));

        // the handle goes once the answer is out
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        assert_eq!(server.client_count().await, 0);
    }
}
