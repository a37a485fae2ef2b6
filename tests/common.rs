#![allow(dead_code)]

use bytes::BytesMut;
use s7_client::SessionConfig;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, Once,
    },
    time::Duration,
};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream},
    task::JoinHandle,
};
use tracing::Level;

static INIT_TRACING: Once = Once::new();

/// Install a compact DEBUG subscriber once per test binary.
pub fn init_tracing() {
    INIT_TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_max_level(Level::DEBUG)
            .with_target(false)
            .without_time()
            .try_init();
    });
}

/// What the simulated PLC sends back for one request
pub enum Reply {
    /// One S7 PDU in a single Data TPDU
    Pdu(Vec<u8>),
    /// One S7 PDU split over Data TPDUs of at most `n` bytes each
    Segmented(Vec<u8>, usize),
    /// Bytes written as they are
    Raw(Vec<u8>),
    /// No answer at all
    Silent,
    /// Drop the connection
    Close,
}

pub type Handler = Arc<dyn Fn(&[u8]) -> Reply + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MockOptions {
    /// PDU size granted in the SetupCommunication ack
    pub granted_pdu: u16,
    /// Answer the COTP CR with a DR carrying this reason
    pub refuse: Option<u8>,
    /// Pause before answering each request
    pub reply_delay: Duration,
}

impl Default for MockOptions {
    fn default() -> Self {
        Self {
            granted_pdu: 480,
            refuse: None,
            reply_delay: Duration::ZERO,
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    connection_requests: Mutex<Vec<Vec<u8>>>,
    setups: Mutex<Vec<Vec<u8>>>,
    requests: Mutex<Vec<Vec<u8>>>,
    overlaps: AtomicUsize,
    connections: AtomicUsize,
}

/// In-process PLC speaking TPKT/COTP/S7 on a loopback port.
pub struct MockPlc {
    pub addr: SocketAddr,
    state: Arc<MockState>,
    task: JoinHandle<()>,
}

impl MockPlc {
    pub async fn start<H>(options: MockOptions, handler: H) -> Self
    where
        H: Fn(&[u8]) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState::default());
        let handler: Handler = Arc::new(handler);
        let task = tokio::spawn({
            let state = Arc::clone(&state);
            async move {
                while let Ok((stream, _)) = listener.accept().await {
                    state.connections.fetch_add(1, Ordering::SeqCst);
                    tokio::spawn(serve(
                        stream,
                        options.clone(),
                        Arc::clone(&handler),
                        Arc::clone(&state),
                    ));
                }
            }
        });
        Self { addr, state, task }
    }

    /// Session options pointing at this PLC with short timeouts.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            socket_addr: self.addr,
            connect_timeout: Duration::from_secs(2),
            read_timeout: Duration::from_secs(2),
            write_timeout: Duration::from_secs(2),
            ..SessionConfig::default()
        }
    }

    /// Raw COTP connection request frames, one per connection
    pub fn connection_requests(&self) -> Vec<Vec<u8>> {
        self.state.connection_requests.lock().unwrap().clone()
    }

    /// SetupCommunication PDUs
    pub fn setups(&self) -> Vec<Vec<u8>> {
        self.state.setups.lock().unwrap().clone()
    }

    /// S7 PDUs received after negotiation
    pub fn requests(&self) -> Vec<Vec<u8>> {
        self.state.requests.lock().unwrap().clone()
    }

    /// Requests that arrived while another one was still unanswered
    pub fn overlaps(&self) -> usize {
        self.state.overlaps.load(Ordering::SeqCst)
    }

    pub fn connections(&self) -> usize {
        self.state.connections.load(Ordering::SeqCst)
    }
}

impl Drop for MockPlc {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn read_frame(stream: &mut TcpStream, buf: &mut BytesMut) -> Option<Vec<u8>> {
    loop {
        if buf.len() >= 4 {
            let len = u16::from_be_bytes([buf[2], buf[3]]) as usize;
            if buf.len() >= len {
                return Some(buf.split_to(len).to_vec());
            }
        }
        match stream.read_buf(buf).await {
            Ok(0) | Err(_) => return None,
            Ok(_) => {}
        }
    }
}

async fn serve(
    mut stream: TcpStream,
    options: MockOptions,
    handler: Handler,
    state: Arc<MockState>,
) {
    let mut buf = BytesMut::with_capacity(4096);
    let Some(cr) = read_frame(&mut stream, &mut buf).await else {
        return;
    };
    state.connection_requests.lock().unwrap().push(cr.clone());
    if let Some(reason) = options.refuse {
        let dr = [0x03, 0x00, 0x00, 0x0B, 0x06, 0x80, 0x00, 0x01, 0x00, 0x01, reason];
        let _ = stream.write_all(&dr).await;
        return;
    }
    let cc = [
        0x03, 0x00, 0x00, 0x16, 0x11, 0xD0, 0x00, 0x01, 0x00, 0x01, 0x00, 0xC0, 0x01, 0x0A, 0xC1,
        0x02, cr[16], cr[17], 0xC2, 0x02, cr[20], cr[21],
    ];
    if stream.write_all(&cc).await.is_err() {
        return;
    }

    loop {
        let Some(frame) = read_frame(&mut stream, &mut buf).await else {
            return;
        };
        // TPKT (4) + COTP DT (3)
        let pdu = frame[7..].to_vec();
        if pdu.len() >= 18 && pdu[1] == 0x01 && pdu[10] == 0xF0 {
            state.setups.lock().unwrap().push(pdu.clone());
            let param = [
                0xF0,
                0x00,
                0x00,
                0x01,
                0x00,
                0x01,
                (options.granted_pdu >> 8) as u8,
                options.granted_pdu as u8,
            ];
            let ack = ack_data(pdu_ref(&pdu), &param, &[]);
            if stream.write_all(&data_frame(&ack, true)).await.is_err() {
                return;
            }
            continue;
        }

        state.requests.lock().unwrap().push(pdu.clone());
        if !options.reply_delay.is_zero() {
            tokio::time::sleep(options.reply_delay).await;
        }
        let pending = !buf.is_empty() || matches!(stream.try_read_buf(&mut buf), Ok(n) if n > 0);
        if pending {
            state.overlaps.fetch_add(1, Ordering::SeqCst);
        }

        let written = match handler(&pdu) {
            Reply::Pdu(p) => stream.write_all(&data_frame(&p, true)).await,
            Reply::Segmented(p, n) => {
                let chunks: Vec<&[u8]> = p.chunks(n).collect();
                let mut out = Vec::new();
                for (idx, chunk) in chunks.iter().enumerate() {
                    out.extend(data_frame(chunk, idx + 1 == chunks.len()));
                }
                stream.write_all(&out).await
            }
            Reply::Raw(bytes) => stream.write_all(&bytes).await,
            Reply::Silent => Ok(()),
            Reply::Close => return,
        };
        if written.is_err() {
            return;
        }
    }
}

/// TPKT + COTP Data TPDU around `pdu`
pub fn data_frame(pdu: &[u8], eot: bool) -> Vec<u8> {
    let len = 7 + pdu.len();
    let mut out = vec![
        0x03,
        0x00,
        (len >> 8) as u8,
        len as u8,
        0x02,
        0xF0,
        if eot { 0x80 } else { 0x00 },
    ];
    out.extend_from_slice(pdu);
    out
}

pub fn pdu_ref(request: &[u8]) -> u16 {
    u16::from_be_bytes([request[4], request[5]])
}

fn header(pdu_type: u8, pdu_ref: u16, param: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = vec![0x32, pdu_type, 0x00, 0x00];
    out.extend_from_slice(&pdu_ref.to_be_bytes());
    out.extend_from_slice(&(param.len() as u16).to_be_bytes());
    out.extend_from_slice(&(data.len() as u16).to_be_bytes());
    out
}

pub fn ack_data(pdu_ref: u16, param: &[u8], data: &[u8]) -> Vec<u8> {
    ack_data_error(pdu_ref, param, data, 0x0000)
}

/// AckData with error class/code `error`
pub fn ack_data_error(pdu_ref: u16, param: &[u8], data: &[u8], error: u16) -> Vec<u8> {
    let mut out = header(0x03, pdu_ref, param, data);
    out.extend_from_slice(&error.to_be_bytes());
    out.extend_from_slice(param);
    out.extend_from_slice(data);
    out
}

pub fn user_data(pdu_ref: u16, param: &[u8], data: &[u8]) -> Vec<u8> {
    let mut out = header(0x07, pdu_ref, param, data);
    out.extend_from_slice(param);
    out.extend_from_slice(data);
    out
}

/// UserData response parameter block for `group`/`subfunction` with error `code`
pub fn user_data_response_param(group: u8, subfunction: u8, code: u16) -> Vec<u8> {
    let mut param = vec![0x00, 0x01, 0x12, 0x08, 0x12, 0x80 | group, subfunction, 0x00, 0x00, 0x00];
    param.extend_from_slice(&code.to_be_bytes());
    param
}

/// ReadVar ack: `Ok(data)` as byte data, `Err(code)` as a failed item
pub fn read_response(pdu_ref: u16, items: &[Result<Vec<u8>, u8>]) -> Vec<u8> {
    let mut data = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        match item {
            Ok(bytes) => {
                data.push(0xFF);
                data.push(0x04);
                data.extend_from_slice(&((bytes.len() * 8) as u16).to_be_bytes());
                data.extend_from_slice(bytes);
                if bytes.len() % 2 == 1 && idx + 1 < items.len() {
                    data.push(0x00);
                }
            }
            Err(code) => data.extend_from_slice(&[*code, 0x00, 0x00, 0x00]),
        }
    }
    ack_data(pdu_ref, &[0x04, items.len() as u8], &data)
}

pub fn write_response(pdu_ref: u16, codes: &[u8]) -> Vec<u8> {
    ack_data(pdu_ref, &[0x05, codes.len() as u8], codes)
}

/// One S7ANY variable specification of a ReadVar/WriteVar job
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VarRequest {
    pub transport: u8,
    pub count: u16,
    pub db: u16,
    pub area: u8,
    pub address: u32,
}

impl VarRequest {
    pub fn byte_offset(&self) -> usize {
        (self.address >> 3) as usize
    }
}

pub fn function(request: &[u8]) -> u8 {
    request[10]
}

pub fn var_requests(request: &[u8]) -> Vec<VarRequest> {
    let count = request[11] as usize;
    (0..count)
        .map(|i| {
            let s = &request[12 + i * 12..24 + i * 12];
            assert_eq!(&s[..3], &[0x12, 0x0A, 0x10]);
            VarRequest {
                transport: s[3],
                count: u16::from_be_bytes([s[4], s[5]]),
                db: u16::from_be_bytes([s[6], s[7]]),
                area: s[8],
                address: u32::from_be_bytes([0, s[9], s[10], s[11]]),
            }
        })
        .collect()
}

/// Data items of a WriteVar job as (tag, data)
pub fn write_data(request: &[u8]) -> Vec<(u8, Vec<u8>)> {
    let param_len = u16::from_be_bytes([request[6], request[7]]) as usize;
    let count = request[11] as usize;
    let mut data = &request[10 + param_len..];
    let mut out = Vec::with_capacity(count);
    for idx in 0..count {
        let tag = data[1];
        let len = u16::from_be_bytes([data[2], data[3]]) as usize;
        let bytes = match tag {
            0x03 | 0x09 => len,
            _ => len / 8,
        };
        out.push((tag, data[4..4 + bytes].to_vec()));
        let mut used = 4 + bytes;
        if bytes % 2 == 1 && idx + 1 < count {
            used += 1;
        }
        data = &data[used..];
    }
    out
}

/// Handler serving byte-oriented ReadVar/WriteVar from one shared memory image.
pub fn memory_handler(memory: Arc<Mutex<Vec<u8>>>) -> impl Fn(&[u8]) -> Reply + Send + Sync {
    move |request| {
        let specs = var_requests(request);
        let mut mem = memory.lock().unwrap();
        match function(request) {
            0x04 => {
                let items: Vec<Result<Vec<u8>, u8>> = specs
                    .iter()
                    .map(|s| {
                        let start = s.byte_offset();
                        let end = start + s.count as usize;
                        mem.get(start..end).map(<[u8]>::to_vec).ok_or(0x05)
                    })
                    .collect();
                Reply::Pdu(read_response(pdu_ref(request), &items))
            }
            0x05 => {
                let codes: Vec<u8> = specs
                    .iter()
                    .zip(write_data(request))
                    .map(|(s, (_, data))| {
                        let start = s.byte_offset();
                        match mem.get_mut(start..start + data.len()) {
                            Some(dst) => {
                                dst.copy_from_slice(&data);
                                0xFF
                            }
                            None => 0x05,
                        }
                    })
                    .collect();
                Reply::Pdu(write_response(pdu_ref(request), &codes))
            }
            _ => Reply::Close,
        }
    }
}
