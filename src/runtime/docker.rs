use std::collections::BTreeMap;
use std::io;
use std::path::Path;
use std::pin::Pin;
use std::str::FromStr;

use bytes::Bytes;
use futures::StreamExt;
use http_body_util::{BodyExt, BodyStream, Empty};
use hyper::body::Incoming;
use hyper::{Method, Request, Response};
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::io::AsyncRead;
use tokio_util::io::StreamReader;

use super::connector::UnixConnector;
use super::error::is_cut_off;
use super::{
    Action, Error, EventStream, Filters, LifecycleEvent, ListOptions, MetricsStream, Result,
    RuntimeClient, WorkloadSummary,
};
use crate::stats::FrameDecoder;
use crate::workload::{OsFamily, WorkloadID};

/// The address used when `DOCKER_HOST` is not set.
pub const DEFAULT_HOST: &str = "unix:///var/run/docker.sock";

const EVENT_CHANNEL_CAPACITY: usize = 32;

/// A [`RuntimeClient`] talking to the Docker Engine API over a unix socket.
#[derive(Debug, Clone)]
pub struct DockerClient {
    client: Client<UnixConnector, Empty<Bytes>>,
}

impl DockerClient {
    /// Creates a client for a `unix://` daemon address.
    ///
    /// # Errors
    ///
    /// Returns [`Error::UnsupportedHost`] for any other scheme.
    pub fn new(host: &str) -> Result<Self> {
        let path = host
            .strip_prefix("unix://")
            .filter(|path| !path.is_empty())
            .ok_or_else(|| Error::UnsupportedHost(host.to_owned()))?;
        Ok(Self::with_socket(path))
    }

    /// Creates a client for the daemon socket at `path`.
    pub fn with_socket(path: impl AsRef<Path>) -> Self {
        let connector = UnixConnector::new(path);
        log::debug!("Using daemon socket {}", connector.path().display());
        let client = Client::builder(TokioExecutor::new()).build(connector);
        Self { client }
    }

    async fn get(&self, path_and_query: &str) -> Result<Response<Incoming>> {
        let request = Request::builder()
            .method(Method::GET)
            .uri(format!("http://docker{path_and_query}"))
            .header(hyper::header::HOST, "docker")
            .body(Empty::new())?;
        log::trace!("GET {path_and_query}");

        let response = self.client.request(request).await.map_err(Error::Transport)?;
        if !response.status().is_success() {
            return Err(api_error(response).await);
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T> {
        let body = self
            .get(path_and_query)
            .await?
            .into_body()
            .collect()
            .await
            .map_err(Error::Body)?
            .to_bytes();
        serde_json::from_slice(&body).map_err(Error::Decode)
    }
}

#[derive(Debug, Deserialize)]
struct Version {
    #[serde(rename = "Os", default)]
    os: String,
}

#[derive(Debug, Deserialize)]
struct ContainerSummary {
    #[serde(rename = "Id")]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventMessage {
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "Actor")]
    actor: EventActor,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct EventActor {
    #[serde(rename = "ID")]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiErrorBody {
    message: String,
}

impl RuntimeClient for DockerClient {
    async fn server_os(&self) -> Result<OsFamily> {
        let version: Version = self.get_json("/version").await?;
        Ok(OsFamily::from_str(&version.os)?)
    }

    async fn list_workloads(&self, options: &ListOptions) -> Result<Vec<WorkloadSummary>> {
        let mut query = format!("/containers/json?all={}", options.all);
        if !options.filters.is_empty() {
            query.push_str("&filters=");
            query.push_str(&urlencoding::encode(&filters_json(&options.filters, None)));
        }
        let containers: Vec<ContainerSummary> = self.get_json(&query).await?;
        containers
            .into_iter()
            .map(|c| {
                Ok(WorkloadSummary {
                    id: WorkloadID::new(&c.id)?,
                })
            })
            .collect()
    }

    async fn subscribe_events(&self, filters: &Filters) -> Result<EventStream> {
        let query = format!(
            "/events?filters={}",
            urlencoding::encode(&filters_json(filters, Some(("type", "container"))))
        );
        let response = self.get(&query).await?;
        let (tx, rx) = tokio::sync::mpsc::channel(EVENT_CHANNEL_CAPACITY);
        tokio::spawn(forward_events(body_reader(response.into_body()), tx));
        Ok(rx)
    }

    async fn open_metrics_stream(&self, id: &WorkloadID, stream: bool) -> Result<MetricsStream> {
        let query = format!(
            "/containers/{}/stats?stream={stream}",
            urlencoding::encode(id.as_str())
        );
        let response = self.get(&query).await?;
        let os = response
            .headers()
            .get("ostype")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| OsFamily::from_str(value).ok());
        Ok(MetricsStream {
            os,
            body: body_reader(response.into_body()),
        })
    }
}

/// Reads the event stream until it ends or the subscriber goes away.
async fn forward_events(
    body: Pin<Box<dyn AsyncRead + Send>>,
    tx: tokio::sync::mpsc::Sender<Result<LifecycleEvent>>,
) {
    let mut decoder = FrameDecoder::new(body);
    loop {
        let item = match decoder.next_frame::<EventMessage>().await {
            None => Err(Error::StreamClosed),
            Some(Ok(msg)) => match to_lifecycle_event(msg) {
                Some(event) => Ok(event),
                None => continue,
            },
            Some(Err(err)) if err.is_recoverable() => {
                log::warn!("skipping malformed event: {err}");
                continue;
            }
            Some(Err(err)) => Err(Error::Stream(err)),
        };
        let terminal = item.is_err();
        if tx.send(item).await.is_err() || terminal {
            return;
        }
    }
}

fn to_lifecycle_event(msg: EventMessage) -> Option<LifecycleEvent> {
    if msg.kind != "container" {
        return None;
    }
    let action = Action::from(msg.action.as_str());
    if action == Action::Other {
        return None;
    }
    match WorkloadID::new(&msg.actor.id) {
        Ok(workload_id) => Some(LifecycleEvent {
            action,
            workload_id,
        }),
        Err(err) => {
            log::warn!("ignoring `{}` event: {err}", msg.action);
            None
        }
    }
}

/// Serializes filters the way the daemon expects them: `{"key":{"value":true}}`.
fn filters_json(filters: &Filters, extra: Option<(&str, &str)>) -> String {
    let mut map: BTreeMap<&str, BTreeMap<&str, bool>> = BTreeMap::new();
    for (key, value) in filters.iter().chain(extra) {
        map.entry(key).or_default().insert(value, true);
    }
    serde_json::to_string(&map).unwrap_or_default()
}

fn body_reader(body: Incoming) -> Pin<Box<dyn AsyncRead + Send>> {
    let frames = BodyStream::new(body).filter_map(|frame| async move {
        match frame {
            Ok(frame) => frame.into_data().ok().map(Ok),
            Err(err) => Some(Err(body_error(err))),
        }
    });
    Box::pin(StreamReader::new(Box::pin(frames)))
}

/// Keeps a cut-off body recognizable as [`io::ErrorKind::UnexpectedEof`] once it is
/// read through [`StreamReader`].
fn body_error(err: hyper::Error) -> io::Error {
    if is_cut_off(&err) {
        io::Error::new(io::ErrorKind::UnexpectedEof, err)
    } else {
        io::Error::other(err)
    }
}

async fn api_error(response: Response<Incoming>) -> Error {
    let status = response.status();
    let message = match response.into_body().collect().await {
        Ok(body) => {
            let body = body.to_bytes();
            serde_json::from_slice::<ApiErrorBody>(&body)
                .map(|b| b.message)
                .unwrap_or_else(|_| String::from_utf8_lossy(&body).trim().to_owned())
        }
        Err(err) => err.to_string(),
    };
    Error::Api {
        status: status.as_u16(),
        message: if message.is_empty() {
            status.to_string()
        } else {
            message
        },
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::UnixListener;

    use super::*;

    #[test]
    fn test_new_rejects_non_unix_hosts() {
        assert!(DockerClient::new("tcp://127.0.0.1:2375").is_err());
        assert!(DockerClient::new("unix://").is_err());
    }

    #[test]
    fn test_filters_json() {
        let mut filters = Filters::default();
        filters.add("label", "a=b").add("label", "c");
        assert_eq!(
            filters_json(&filters, Some(("type", "container"))),
            r#"{"label":{"a=b":true,"c":true},"type":{"container":true}}"#
        );
        assert_eq!(filters_json(&Filters::default(), None), "{}");
    }

    #[test]
    fn test_to_lifecycle_event() {
        let msg: EventMessage = serde_json::from_str(
            r#"{"Type":"container","Action":"start","Actor":{"ID":"abc","Attributes":{}}}"#,
        )
        .unwrap();
        let event = to_lifecycle_event(msg).unwrap();
        assert_eq!(event.action, Action::Start);
        assert_eq!(event.workload_id.as_str(), "abc");

        let msg: EventMessage =
            serde_json::from_str(r#"{"Type":"network","Action":"create","Actor":{"ID":"n"}}"#)
                .unwrap();
        assert!(to_lifecycle_event(msg).is_none());

        let msg: EventMessage =
            serde_json::from_str(r#"{"Type":"container","Action":"exec_start: sh","Actor":{"ID":"c"}}"#)
                .unwrap();
        assert!(to_lifecycle_event(msg).is_none());
    }

    /// Serves each accepted connection with the next canned response.
    fn serve(listener: UnixListener, responses: Vec<&'static str>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            for response in responses {
                let (mut conn, _) = listener.accept().await.unwrap();
                let mut buf = [0u8; 4096];
                let _ = conn.read(&mut buf).await.unwrap();
                conn.write_all(response.as_bytes()).await.unwrap();
                conn.shutdown().await.unwrap();
            }
        })
    }

    #[tokio::test]
    async fn test_server_os_and_metrics_stream_over_unix_socket() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = serve(
            listener,
            vec![
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 14\r\nConnection: close\r\n\r\n{\"Os\":\"linux\"}",
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nOstype: windows\r\nConnection: close\r\n\r\n{\"name\":\"/a\"}\n{\"name\":\"/b\"}\n",
            ],
        );

        let client = DockerClient::with_socket(&socket);
        assert_eq!(client.server_os().await.unwrap(), OsFamily::Linux);

        let id = WorkloadID::new("abc").unwrap();
        let stream = client.open_metrics_stream(&id, true).await.unwrap();
        assert_eq!(stream.os, Some(OsFamily::Windows));
        let mut decoder = FrameDecoder::new(stream.body);
        let first: crate::stats::StatsFrame = decoder.next_frame().await.unwrap().unwrap();
        let second: crate::stats::StatsFrame = decoder.next_frame().await.unwrap().unwrap();
        assert_eq!(first.name, "/a");
        assert_eq!(second.name, "/b");
        assert!(decoder.next_frame::<crate::stats::StatsFrame>().await.is_none());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_api_error_message() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        let listener = UnixListener::bind(&socket).unwrap();
        let server = serve(
            listener,
            vec![
                "HTTP/1.1 404 Not Found\r\nContent-Type: application/json\r\nContent-Length: 39\r\nConnection: close\r\n\r\n{\"message\":\"No such container: nope1\"}\n",
            ],
        );

        let client = DockerClient::with_socket(&socket);
        let err = client
            .open_metrics_stream(&WorkloadID::new("nope1").unwrap(), false)
            .await
            .unwrap_err();
        match err {
            Error::Api { status, message } => {
                assert_eq!(status, 404);
                assert_eq!(message, "No such container: nope1");
            }
            other => panic!("expected Api error, got {other:?}"),
        }

        server.await.unwrap();
    }

    const CUT_OFF_EVENTS: &str = concat!(
        "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nTransfer-Encoding: chunked\r\n\r\n",
        "39\r\n",
        "{\"Type\":\"container\",\"Action\":\"die\",\"Actor\":{\"ID\":\"abc\"}}\n",
        "\r\n",
    );

    #[tokio::test]
    async fn test_cut_off_event_stream_is_unexpected_eof() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        let server = serve(UnixListener::bind(&socket).unwrap(), vec![CUT_OFF_EVENTS]);

        let client = DockerClient::with_socket(&socket);
        let mut events = client.subscribe_events(&Filters::default()).await.unwrap();

        let event = events.recv().await.unwrap().unwrap();
        assert_eq!(event.action, Action::Die);
        assert_eq!(event.workload_id.as_str(), "abc");

        let err = events.recv().await.unwrap().unwrap_err();
        assert!(err.is_unexpected_eof(), "{err:?}");
        assert!(events.recv().await.is_none());

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_daemon_restart_ends_watch_session() {
        let dir = tempfile::tempdir().unwrap();
        let socket = dir.path().join("docker.sock");
        let server = serve(
            UnixListener::bind(&socket).unwrap(),
            vec![
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 14\r\nConnection: close\r\n\r\n{\"Os\":\"linux\"}",
                CUT_OFF_EVENTS,
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: 2\r\nConnection: close\r\n\r\n[]",
            ],
        );

        let client = std::sync::Arc::new(DockerClient::with_socket(&socket));
        let mut out = Vec::new();
        crate::engine::run_stats(
            client,
            &crate::StatsOptions::default(),
            &mut out,
            tokio_util::sync::CancellationToken::new(),
        )
        .await
        .unwrap();

        assert!(String::from_utf8(out).unwrap().contains("CONTAINER ID"));
        server.await.unwrap();
    }
}
