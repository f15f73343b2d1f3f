//! Recording fakes for the external collaborators, shared by unit tests.

use std::cell::RefCell;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

use crate::connector::{Connection, Connector, QueryResult};
use crate::data::model::Value;
use crate::error::{Result, ScoringError};
use crate::sink::ObjectStore;

/// Shared, ordered trace of collaborator calls across fakes.
pub type Events = Rc<RefCell<Vec<String>>>;

/// What a [`RecordingConnector`] has seen so far.
#[derive(Debug, Clone, Default)]
pub struct ConnLog {
    pub connects: usize,
    pub closes: usize,
    /// Connections currently open.
    pub open: usize,
    /// Highest number of simultaneously open connections.
    pub max_open: usize,
    pub statements: Vec<(String, Vec<Value>)>,
}

#[derive(Clone, Default)]
pub struct RecordingConnector {
    log: Rc<RefCell<ConnLog>>,
    events: Events,
    result: QueryResult,
    fail_on: Option<usize>,
    unreachable: bool,
}

impl RecordingConnector {
    /// Every statement returns `result`.
    pub fn returning(result: QueryResult) -> Self {
        Self {
            result,
            ..Self::default()
        }
    }

    /// The `n`-th statement (0-based, across connections) fails with a query error.
    pub fn failing_on(n: usize) -> Self {
        Self {
            fail_on: Some(n),
            ..Self::default()
        }
    }

    /// `connect` always fails.
    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: Events) -> Self {
        self.events = events;
        self
    }

    pub fn log(&self) -> ConnLog {
        self.log.borrow().clone()
    }
}

impl Connector for RecordingConnector {
    fn connect(&self) -> Result<Box<dyn Connection>> {
        if self.unreachable {
            return Err(ScoringError::connectivity("fake:0", "connection refused"));
        }
        {
            let mut log = self.log.borrow_mut();
            log.connects += 1;
            log.open += 1;
            log.max_open = log.max_open.max(log.open);
        }
        self.events.borrow_mut().push("connect".to_string());
        Ok(Box::new(RecordingConnection {
            log: Rc::clone(&self.log),
            events: Rc::clone(&self.events),
            result: self.result.clone(),
            fail_on: self.fail_on,
            closed: false,
        }))
    }
}

struct RecordingConnection {
    log: Rc<RefCell<ConnLog>>,
    events: Events,
    result: QueryResult,
    fail_on: Option<usize>,
    closed: bool,
}

impl Connection for RecordingConnection {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<QueryResult> {
        let n = {
            let mut log = self.log.borrow_mut();
            log.statements.push((sql.to_string(), params.to_vec()));
            log.statements.len() - 1
        };
        self.events.borrow_mut().push(format!("execute:{sql}"));
        if self.fail_on == Some(n) {
            return Err(ScoringError::Query(format!("statement {n} rejected")));
        }
        Ok(self.result.clone())
    }

    fn close(&mut self) -> Result<()> {
        let mut log = self.log.borrow_mut();
        log.closes += 1;
        if !self.closed {
            self.closed = true;
            log.open -= 1;
            self.events.borrow_mut().push("close".to_string());
        }
        Ok(())
    }
}

/// One recorded `put`.
#[derive(Debug, Clone, PartialEq)]
pub struct Put {
    pub bucket: String,
    pub key: String,
    pub body: Vec<u8>,
    pub content_type: String,
}

/// Object store that keeps every upload in memory.
#[derive(Clone, Default)]
pub struct MemoryStore {
    puts: Rc<RefCell<Vec<Put>>>,
    events: Events,
    fail: bool,
}

impl MemoryStore {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn with_events(mut self, events: Events) -> Self {
        self.events = events;
        self
    }

    pub fn puts(&self) -> Vec<Put> {
        self.puts.borrow().clone()
    }
}

impl ObjectStore for MemoryStore {
    fn put(&self, bucket: &str, key: &str, body: Vec<u8>, content_type: &str) -> Result<()> {
        self.events.borrow_mut().push(format!("put:{bucket}/{key}"));
        if self.fail {
            return Err(ScoringError::write(format!("{bucket}/{key}"), "access denied"));
        }
        self.puts.borrow_mut().push(Put {
            bucket: bucket.to_string(),
            key: key.to_string(),
            body,
            content_type: content_type.to_string(),
        });
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Loopback HTTP server
// ---------------------------------------------------------------------------

/// One request as received by an [`HttpStub`].
#[derive(Debug, Clone, Default)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    /// Header names lower-cased.
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        let name = name.to_ascii_lowercase();
        self.headers
            .iter()
            .find(|(k, _)| *k == name)
            .map(|(_, v)| v.as_str())
    }

    /// `"METHOD /path"`
    pub fn line(&self) -> String {
        format!("{} {}", self.method, self.path)
    }
}

/// HTTP/1.1 server on `127.0.0.1` answering each connection with the next
/// canned `(status, body)` and then closing it.
///
/// `{base}` in a body is replaced by the server's own `http://127.0.0.1:port`.
/// A request is recorded before its response is written, so once the client
/// has a reply the request is visible through [`HttpStub::requests`].
pub struct HttpStub {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl HttpStub {
    pub fn serve(responses: Vec<(u16, String)>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let port = listener.local_addr().expect("local addr").port();
        let requests = Arc::new(Mutex::new(Vec::new()));

        let base = format!("http://127.0.0.1:{port}");
        let seen = Arc::clone(&requests);
        std::thread::spawn(move || {
            for (status, body) in responses {
                let body = body.replace("{base}", &base);
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                if answer(stream, status, &body, &seen).is_err() {
                    return;
                }
            }
        });

        Self { port, requests }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://127.0.0.1:{}{path}", self.port)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().expect("request log").clone()
    }
}

fn answer(
    stream: TcpStream,
    status: u16,
    body: &str,
    seen: &Mutex<Vec<RecordedRequest>>,
) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let mut request = RecordedRequest {
        method: parts.next().unwrap_or_default().to_string(),
        path: parts.next().unwrap_or_default().to_string(),
        ..RecordedRequest::default()
    };

    loop {
        let mut line = String::new();
        reader.read_line(&mut line)?;
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            request
                .headers
                .push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
        }
    }

    let length = request
        .header("content-length")
        .and_then(|v| v.parse::<usize>().ok())
        .unwrap_or(0);
    let mut raw = vec![0u8; length];
    reader.read_exact(&mut raw)?;
    request.body = String::from_utf8_lossy(&raw).into_owned();
    seen.lock().expect("request log").push(request);

    let reason = match status {
        200 => "OK",
        204 => "No Content",
        400 => "Bad Request",
        403 => "Forbidden",
        500 => "Internal Server Error",
        _ => "Status",
    };
    let mut stream = reader.into_inner();
    write!(
        stream,
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )?;
    stream.flush()
}
