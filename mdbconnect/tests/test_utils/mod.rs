// advisable because not all test modules use all functions of this module:
#![allow(dead_code)]

use bson::{doc, Bson, Document};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use flexi_logger::{opt_format, Logger, LoggerHandle};
use mdbconnect::{
    ClusterId, ConnectParams, ConnectionConfiguration, MdbResult, Server, ServerAddress,
    ServerId, ServerSettings,
};
use std::{
    io::{BufRead, Cursor, Read, Write},
    net::{TcpListener, TcpStream},
    sync::{Arc, Mutex, OnceLock},
    thread,
    time::Duration,
};

const OP_REPLY: i32 = 1;
const OP_INSERT: i32 = 2002;
const OP_QUERY: i32 = 2004;
const OP_GET_MORE: i32 = 2005;

static LOGGER: OnceLock<LoggerHandle> = OnceLock::new();

// Returns the logger that prints out all info, warn and error messages.
//
// The logger can only be started once per process, and all tests of a file share
// one process.
pub fn init_logger() -> &'static LoggerHandle {
    LOGGER.get_or_init(|| {
        Logger::try_with_env_or_str("info")
            .unwrap()
            .format(opt_format)
            .start()
            .unwrap_or_else(|e| panic!("Logger initialization failed with {e}"))
    })
}

// What the fake server has seen so far.
#[derive(Debug, Default)]
pub struct Recorded {
    pub connections: usize,
    pub commands: Vec<String>,
    pub insert_batches: Vec<usize>,
    pub legacy_inserts: usize,
    pub documents: Vec<Document>,
}

#[derive(Debug)]
struct Behavior {
    max_wire_version: i32,
    max_write_batch_size: i32,
}

// A server on a loopback port that speaks just enough of the wire protocol for the tests.
//
// It answers `isMaster`, `buildInfo`, `ping`, `insert` and `getlasterror`, takes legacy
// inserts, returns all inserted documents for any query, and hangs up on `hangUp`.
#[derive(Debug, Clone)]
pub struct FakeServer {
    address: ServerAddress,
    recorded: Arc<Mutex<Recorded>>,
}
impl FakeServer {
    pub fn start() -> Self {
        Self::start_with(6, 1000)
    }

    pub fn start_with(max_wire_version: i32, max_write_batch_size: i32) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let recorded = Arc::new(Mutex::new(Recorded::default()));
        let behavior = Arc::new(Behavior {
            max_wire_version,
            max_write_batch_size,
        });
        let recorded2 = Arc::clone(&recorded);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { return };
                recorded2.lock().unwrap().connections += 1;
                let recorded = Arc::clone(&recorded2);
                let behavior = Arc::clone(&behavior);
                thread::spawn(move || {
                    if let Err(e) = serve(stream, &recorded, &behavior) {
                        log::debug!("fake server connection ended with {e}");
                    }
                });
            }
        });
        Self {
            address: ServerAddress::new("127.0.0.1", port),
            recorded,
        }
    }

    pub fn address(&self) -> &ServerAddress {
        &self.address
    }

    pub fn recorded<T>(&self, f: impl FnOnce(&Recorded) -> T) -> T {
        f(&self.recorded.lock().unwrap())
    }

    pub fn start_client(&self, settings: ServerSettings) -> MdbResult<Server> {
        Server::start(
            ServerId::new(ClusterId::new(), self.address.clone()),
            ConnectParams::new(self.address.clone()).with_application_name("mdbconnect-tests"),
            ConnectionConfiguration::default().with_read_timeout(Some(Duration::from_secs(10))),
            settings,
        )
    }
}

fn serve(mut stream: TcpStream, recorded: &Mutex<Recorded>, behavior: &Behavior) -> std::io::Result<()> {
    loop {
        let Ok(length) = stream.read_i32::<LittleEndian>() else {
            return Ok(()); // client hung up
        };
        let request_id = stream.read_i32::<LittleEndian>()?;
        let _response_to = stream.read_i32::<LittleEndian>()?;
        let op_code = stream.read_i32::<LittleEndian>()?;
        let mut body = vec![0_u8; usize::try_from(length).unwrap() - 16];
        stream.read_exact(&mut body)?;
        let body_length = body.len() as u64;
        let mut rdr = Cursor::new(body);

        match op_code {
            OP_QUERY => {
                let _flags = rdr.read_i32::<LittleEndian>()?;
                let namespace = read_cstring(&mut rdr)?;
                let _skip = rdr.read_i32::<LittleEndian>()?;
                let _number_to_return = rdr.read_i32::<LittleEndian>()?;
                let query = Document::from_reader(&mut rdr).unwrap();
                let Some(documents) = answer(&namespace, &query, recorded, behavior) else {
                    return Ok(());
                };
                write_reply(&mut stream, request_id, &documents)?;
            }
            OP_INSERT => {
                let _flags = rdr.read_i32::<LittleEndian>()?;
                let _namespace = read_cstring(&mut rdr)?;
                let mut recorded = recorded.lock().unwrap();
                recorded.legacy_inserts += 1;
                while rdr.position() < body_length {
                    recorded
                        .documents
                        .push(Document::from_reader(&mut rdr).unwrap());
                }
            }
            OP_GET_MORE => write_reply(&mut stream, request_id, &[])?,
            // kill cursors and legacy updates and deletes are not answered
            _ => {}
        }
    }
}

fn answer(
    namespace: &str,
    query: &Document,
    recorded: &Mutex<Recorded>,
    behavior: &Behavior,
) -> Option<Vec<Document>> {
    let mut recorded = recorded.lock().unwrap();
    if !namespace.ends_with(".$cmd") {
        return Some(recorded.documents.clone());
    }
    let command = query.keys().next().cloned().unwrap_or_default();
    recorded.commands.push(command.clone());
    let reply = match command.as_str() {
        "isMaster" | "ismaster" => doc! {
            "ismaster": true,
            "maxBsonObjectSize": 16_777_216,
            "maxMessageSizeBytes": 48_000_000,
            "maxWriteBatchSize": behavior.max_write_batch_size,
            "minWireVersion": 0,
            "maxWireVersion": behavior.max_wire_version,
            "ok": 1.0,
        },
        "buildInfo" => doc! { "version": "3.6.0", "versionArray": [3, 6, 0, 0], "ok": 1.0 },
        "ping" => doc! { "ok": 1.0 },
        "insert" => {
            let documents: Vec<Document> = query
                .get_array("documents")
                .unwrap()
                .iter()
                .filter_map(|b| match b {
                    Bson::Document(d) => Some(d.clone()),
                    _ => None,
                })
                .collect();
            let n = i32::try_from(documents.len()).unwrap();
            recorded.insert_batches.push(documents.len());
            recorded.documents.extend(documents);
            doc! { "n": n, "ok": 1 }
        }
        "getlasterror" => doc! { "n": 0, "err": Bson::Null, "ok": 1.0 },
        "hangUp" => return None,
        _ => doc! { "ok": 0.0, "code": 59, "errmsg": format!("no such command: '{command}'") },
    };
    Some(vec![reply])
}

fn read_cstring(rdr: &mut Cursor<Vec<u8>>) -> std::io::Result<String> {
    let mut bytes = Vec::new();
    rdr.read_until(0, &mut bytes)?;
    bytes.pop();
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn write_reply(stream: &mut TcpStream, response_to: i32, documents: &[Document]) -> std::io::Result<()> {
    let mut buf = Vec::new();
    buf.write_i32::<LittleEndian>(0)?; // length, patched below
    buf.write_i32::<LittleEndian>(response_to + 1_000_000)?;
    buf.write_i32::<LittleEndian>(response_to)?;
    buf.write_i32::<LittleEndian>(OP_REPLY)?;
    buf.write_i32::<LittleEndian>(0)?; // response flags
    buf.write_i64::<LittleEndian>(0)?; // cursor id
    buf.write_i32::<LittleEndian>(0)?; // starting from
    buf.write_i32::<LittleEndian>(i32::try_from(documents.len()).unwrap())?;
    for document in documents {
        document.to_writer(&mut buf).unwrap();
    }
    let length = i32::try_from(buf.len()).unwrap();
    buf[0..4].copy_from_slice(&length.to_le_bytes());
    stream.write_all(&buf)
}
