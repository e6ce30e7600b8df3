//! In-process FluxDB stand-in for integration tests
//!
//! Speaks the line protocol over a real loopback socket. Either backed by a
//! tiny in-memory document store, or scripted to send canned replies
//! (optionally split into segments written [`SEGMENT_GAP`] apart).

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use fluxdb::{ClientConfig, FramingMode};
use serde_json::{Map, Value};

/// Pause between the segments of one reply
pub const SEGMENT_GAP: Duration = Duration::from_millis(50);

/// Produces a reply as the segments to write, in order
type Handler = dyn Fn(&str) -> Vec<String> + Send + Sync;

pub struct MockServer {
    addr: SocketAddr,
    stop: Arc<AtomicBool>,
    streams: Arc<Mutex<Vec<TcpStream>>>,
    commands: Arc<Mutex<Vec<String>>>,
    accept_thread: Option<JoinHandle<()>>,
}

impl MockServer {
    /// Server backed by an in-memory document store
    pub fn start() -> Self {
        let store = Arc::new(Mutex::new(Store::default()));
        Self::with_handler(move |line| store.lock().unwrap().handle(line))
    }

    /// Server that answers the n-th command with `replies[n]` (bytes sent
    /// as-is), and with the last reply once the script runs out
    pub fn scripted(replies: Vec<&str>) -> Self {
        let replies: Vec<String> = replies.into_iter().map(String::from).collect();
        let next = AtomicUsize::new(0);
        Self::with_handler(move |_| {
            let i = next.fetch_add(1, Ordering::SeqCst).min(replies.len() - 1);
            replies[i].clone()
        })
    }

    /// Server that answers the n-th command with the segments of
    /// `replies[n]`, sleeping [`SEGMENT_GAP`] between segments
    pub fn segmented(replies: Vec<Vec<&str>>) -> Self {
        let replies: Vec<Vec<String>> = replies
            .into_iter()
            .map(|segments| segments.into_iter().map(String::from).collect())
            .collect();
        let next = AtomicUsize::new(0);
        Self::with_segment_handler(move |_| {
            let i = next.fetch_add(1, Ordering::SeqCst).min(replies.len() - 1);
            replies[i].clone()
        })
    }

    pub fn with_handler(handler: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self::with_segment_handler(move |line| vec![handler(line)])
    }

    fn with_segment_handler(
        handler: impl Fn(&str) -> Vec<String> + Send + Sync + 'static,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stop = Arc::new(AtomicBool::new(false));
        let streams = Arc::new(Mutex::new(Vec::new()));
        let commands = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let accept_thread = {
            let stop = Arc::clone(&stop);
            let streams = Arc::clone(&streams);
            let commands = Arc::clone(&commands);
            thread::spawn(move || {
                for stream in listener.incoming() {
                    if stop.load(Ordering::SeqCst) {
                        break;
                    }
                    let Ok(stream) = stream else { continue };
                    streams.lock().unwrap().push(stream.try_clone().unwrap());
                    let handler = Arc::clone(&handler);
                    let commands = Arc::clone(&commands);
                    thread::spawn(move || serve(stream, handler, commands));
                }
            })
        };

        Self {
            addr,
            stop,
            streams,
            commands,
            accept_thread: Some(accept_thread),
        }
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn config(&self) -> ClientConfig {
        ClientConfig::builder()
            .port(self.port())
            .read_timeout_ms(2000)
            .body_idle_ms(300)
            .build()
    }

    pub fn heuristic_config(&self, read_buffer_size: usize) -> ClientConfig {
        ClientConfig::builder()
            .port(self.port())
            .read_timeout_ms(200)
            .read_buffer_size(read_buffer_size)
            .framing(FramingMode::Heuristic)
            .build()
    }

    /// Close every accepted connection from the server side
    pub fn drop_connections(&self) {
        for stream in self.streams.lock().unwrap().drain(..) {
            let _ = stream.shutdown(Shutdown::Both);
        }
    }

    /// Number of connections accepted so far that are still tracked
    pub fn open_connections(&self) -> usize {
        self.streams.lock().unwrap().len()
    }

    /// Command lines received, in order
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        self.drop_connections();
        // Wake the accept loop so it sees the stop flag and drops the listener
        let _ = TcpStream::connect(self.addr);
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

fn serve(stream: TcpStream, handler: Arc<Handler>, commands: Arc<Mutex<Vec<String>>>) {
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(_) => return,
    };
    let _ = writer.set_nodelay(true);
    let reader = BufReader::new(stream);

    for line in reader.lines() {
        let Ok(line) = line else { break };
        let line = line.trim_end_matches('\r').to_string();
        if line.is_empty() {
            continue;
        }
        commands.lock().unwrap().push(line.clone());
        for (i, segment) in handler(&line).iter().enumerate() {
            if i > 0 {
                thread::sleep(SEGMENT_GAP);
            }
            if !segment.is_empty() && writer.write_all(segment.as_bytes()).is_err() {
                return;
            }
        }
    }
}

/// Minimal document store with the server's reply grammar
#[derive(Default)]
struct Store {
    next_id: u64,
    docs: BTreeMap<u64, Map<String, Value>>,
}

impl Store {
    fn handle(&mut self, line: &str) -> String {
        let (verb, args) = line.split_once(' ').unwrap_or((line, ""));
        match verb {
            "INSERT" => match parse_object(args) {
                Some(doc) => {
                    self.next_id += 1;
                    self.docs.insert(self.next_id, doc);
                    format!("OK ID={}\n", self.next_id)
                }
                None => "ERROR INVALID_JSON\n".to_string(),
            },
            "FIND" => match parse_object(args) {
                Some(query) if query.is_empty() => "ERROR EMPTY_QUERY\n".to_string(),
                Some(query) => {
                    let ids: Vec<u64> = self
                        .docs
                        .iter()
                        .filter(|(_, doc)| matches(doc, &query))
                        .map(|(id, _)| *id)
                        .collect();
                    self.listing(ids)
                }
                None => "ERROR INVALID_JSON\n".to_string(),
            },
            "UPDATE" => {
                let Some((id, json)) = args.split_once(' ') else {
                    return "ERROR MISSING_JSON\n".to_string();
                };
                match (id.parse::<u64>(), parse_object(json)) {
                    (Ok(id), Some(doc)) if self.docs.contains_key(&id) => {
                        self.docs.insert(id, doc);
                        "OK UPDATED\n".to_string()
                    }
                    (Ok(_), Some(_)) => "ERROR NOT_FOUND\n".to_string(),
                    _ => "ERROR INVALID_FORMAT\n".to_string(),
                }
            }
            "DELETE" => match args.trim().parse::<u64>() {
                Ok(id) if self.docs.remove(&id).is_some() => "OK DELETED\n".to_string(),
                Ok(_) => "ERROR NOT_FOUND\n".to_string(),
                Err(_) => "ERROR INVALID_ID\n".to_string(),
            },
            "INDEX" => "OK INDEX_CREATED\n".to_string(),
            "GET" => self.get(args.trim()),
            "FLUSHDB" => {
                self.docs.clear();
                "OK FLUSHED\n".to_string()
            }
            "CHECKPOINT" => "OK CHECKPOINT_COMPLETE\n".to_string(),
            "CONFIG" => match args.split_once(' ') {
                Some((param, "1")) => format!("OK CONFIG_UPDATED {}=ON\n", param),
                Some((param, "0")) => format!("OK CONFIG_UPDATED {}=OFF\n", param),
                _ => "ERROR INVALID_VALUE (Use 0 or 1)\n".to_string(),
            },
            "USE" => format!("OK SWITCHED_TO {}\n", args.trim()),
            "SHOW" if args == "DBS" => "OK [\"default\", \"users\"]\n".to_string(),
            "DROP" => match args.strip_prefix("DATABASE ") {
                Some(name) if name == "users" => format!("OK DROPPED {} (Please USE a database)\n", name),
                _ => "ERROR DB_NOT_FOUND\n".to_string(),
            },
            "STATS" => format!(
                "OK {{\"database\": \"default\", \"documents\": {}, \"adaptive_mode\": false, \"fields\": []}}\n",
                self.docs.len()
            ),
            "EXPIRE" => "OK TTL_SET\n".to_string(),
            "PUBLISH" => "OK RECEIVERS=2\n".to_string(),
            "HELP" => "OK \n=== FluxDB Commands ===\nINSERT <json>\n".to_string(),
            _ => "UNKNOWN_COMMAND\n".to_string(),
        }
    }

    fn get(&self, args: &str) -> String {
        if args.is_empty() {
            return self.listing(self.docs.keys().copied().collect());
        }
        if let Some((start, end)) = args.split_once('-') {
            return match (start.parse::<u64>(), end.parse::<u64>()) {
                (Ok(start), Ok(end)) => {
                    self.listing(self.docs.range(start..=end).map(|(id, _)| *id).collect())
                }
                _ => "ERROR INVALID_RANGE\n".to_string(),
            };
        }
        match args.parse::<u64>() {
            Ok(id) => match self.docs.get(&id) {
                Some(doc) => format!("OK {}\n", Value::Object(doc.clone())),
                None => "ERROR NOT_FOUND\n".to_string(),
            },
            Err(_) => "ERROR INVALID_ID\n".to_string(),
        }
    }

    fn listing(&self, ids: Vec<u64>) -> String {
        let mut reply = format!("OK COUNT={}\n", ids.len());
        for id in ids {
            let doc = Value::Object(self.docs[&id].clone());
            reply.push_str(&format!("ID {} {}\n", id, doc));
        }
        reply
    }
}

fn parse_object(text: &str) -> Option<Map<String, Value>> {
    match serde_json::from_str(text.trim()).ok()? {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn matches(doc: &Map<String, Value>, query: &Map<String, Value>) -> bool {
    query.iter().all(|(field, constraint)| {
        let Some(value) = doc.get(field) else {
            return false;
        };
        match constraint {
            Value::Object(ops) => ops.iter().all(|(op, bound)| {
                match (value.as_f64(), bound.as_f64()) {
                    (Some(v), Some(b)) if op == "$gt" => v > b,
                    (Some(v), Some(b)) if op == "$lt" => v < b,
                    _ => false,
                }
            }),
            literal => value == literal,
        }
    })
}
