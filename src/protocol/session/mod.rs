mod handshake;
mod state;
mod system;

pub use state::{ConnectionState, PduReference, SessionConfig};

use super::{
    codec::Codec,
    error::{Error, ItemFailure, Result},
    frame::{
        build_read_var, build_write_var, padded_len, parse_read_var_response,
        parse_write_var_response, ReadItemResult, S7Area, S7Pdu, S7ReturnCode, S7VarSpec,
        S7WriteItem, SetupAck, DATA_ITEM_HEADER_LEN, MAX_BYTE_ADDRESS, MAX_ITEMS_PER_REQUEST,
        READ_REQUEST_OVERHEAD, READ_RESPONSE_OVERHEAD, VAR_SPEC_WIRE_LEN, WRITE_REQUEST_OVERHEAD,
        WRITE_RESPONSE_OVERHEAD,
    },
    item::{DataItem, VarType},
    value::S7Value,
};
use arc_swap::ArcSwapOption;
use bytes::Bytes;
use std::{
    ops::Range,
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc,
    },
};
use tokio::{
    net::TcpStream,
    select,
    sync::{mpsc, oneshot, watch, Mutex},
    task::JoinHandle,
    time::timeout,
};
use tokio_util::{codec::Framed, sync::CancellationToken};
use tracing::{debug, info, warn};

/// Type-erased completion of one exchange.
///
/// `check` runs inside the worker before the next request is put on the wire,
/// so a response that invalidates the connection faults it first.
trait Completion: Send {
    /// Parse the outcome; returns the reason when it invalidates the connection.
    fn check(&mut self, outcome: Result<S7Pdu>) -> Option<String>;

    /// Hand the parsed result to the waiting caller.
    fn deliver(self: Box<Self>);

    fn fail(mut self: Box<Self>, error: Error) {
        self.check(Err(error));
        self.deliver();
    }
}

struct Pending<T, F> {
    parse: Option<F>,
    result: Option<Result<T>>,
    tx: oneshot::Sender<Result<T>>,
}

impl<T, F> Completion for Pending<T, F>
where
    T: Send,
    F: FnOnce(&S7Pdu) -> Result<T> + Send,
{
    fn check(&mut self, outcome: Result<S7Pdu>) -> Option<String> {
        let result = match (outcome, self.parse.take()) {
            (Ok(pdu), Some(parse)) => parse(&pdu),
            (Ok(_), None) => Err(Error::ErrUseClosedConnection),
            (Err(e), _) => Err(e),
        };
        let fatal = match &result {
            Err(e) if e.is_connection_fatal() => Some(e.to_string()),
            _ => None,
        };
        self.result = Some(result);
        fatal
    }

    fn deliver(self: Box<Self>) {
        let Pending { result, tx, .. } = *self;
        // caller may have given up waiting
        let _ = tx.send(result.unwrap_or(Err(Error::ErrUseClosedConnection)));
    }
}

/// Request message for the session worker
struct SessionRequest {
    /// Request PDU; the worker stamps the PDU reference
    pdu: S7Pdu,
    completion: Box<dyn Completion>,
}

#[derive(Debug)]
struct Worker {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Which message of a ReadVar/WriteVar exchange limits the batch size
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Read,
    Write,
}

impl Direction {
    /// Larger of request and response length for `count` items carrying
    /// `data` bytes (fill bytes included).
    fn message_len(self, count: usize, data: usize) -> usize {
        match self {
            Direction::Read => (READ_REQUEST_OVERHEAD + count * VAR_SPEC_WIRE_LEN)
                .max(READ_RESPONSE_OVERHEAD + count * DATA_ITEM_HEADER_LEN + data),
            Direction::Write => (WRITE_REQUEST_OVERHEAD
                + count * (VAR_SPEC_WIRE_LEN + DATA_ITEM_HEADER_LEN)
                + data)
                .max(WRITE_RESPONSE_OVERHEAD + count),
        }
    }

    /// Largest single item that fits one exchange of `pdu_size`
    fn max_item_len(self, pdu_size: usize) -> usize {
        let fixed = match self {
            Direction::Read => READ_RESPONSE_OVERHEAD + DATA_ITEM_HEADER_LEN,
            Direction::Write => WRITE_REQUEST_OVERHEAD + VAR_SPEC_WIRE_LEN + DATA_ITEM_HEADER_LEN,
        };
        pdu_size.saturating_sub(fixed)
    }
}

/// Split consecutive items with data lengths `lens` into runs that each fit
/// one request/response pair of `pdu_size` bytes and at most 20 items.
fn plan_batches(lens: &[usize], pdu_size: usize, direction: Direction) -> Result<Vec<Range<usize>>> {
    let mut batches = Vec::new();
    let mut start = 0;
    // data bytes of the current run, each item padded to even length
    let mut padded = 0;
    for (idx, &len) in lens.iter().enumerate() {
        let count = idx - start + 1;
        if idx > start
            && (count > MAX_ITEMS_PER_REQUEST
                || direction.message_len(count, padded + len) > pdu_size)
        {
            batches.push(start..idx);
            start = idx;
            padded = 0;
        }
        if idx == start && direction.message_len(1, len) > pdu_size {
            return Err(Error::ItemTooLarge { index: idx, len });
        }
        padded += padded_len(len);
    }
    if start < lens.len() {
        batches.push(start..lens.len());
    }
    Ok(batches)
}

/// Every returned item must carry exactly the bytes its specification asked for.
fn check_item_lens(items: &[ReadItemResult], lens: &[usize]) -> Result<()> {
    let mismatch = items.iter().zip(lens).any(|(item, &len)| match item {
        Ok(data) => data.len() != len,
        Err(_) => false,
    });
    if mismatch {
        return Err(Error::ProtocolViolation {
            context: "read item length differs from request",
        });
    }
    Ok(())
}

/// Reject a byte range that leaves the 24-bit address space.
fn check_range(start: u32, len: usize) -> Result<()> {
    if start as usize + len > MAX_BYTE_ADDRESS as usize + 1 {
        return Err(Error::ErrInvalidAddress(format!(
            "range {start}+{len} beyond 24-bit address space"
        )));
    }
    Ok(())
}

/// S7 session: one TCP connection, one request on the wire at a time.
///
/// Requests are queued FIFO on a bounded channel drained by a single worker
/// task that owns the socket. All mutation of the socket and of the
/// connection state happens in `open`, in that worker, and in `close`.
#[derive(Debug)]
pub struct Session {
    config: Arc<SessionConfig>,
    /// Request channel into the worker, present while a worker runs
    request_tx: ArcSwapOption<mpsc::Sender<SessionRequest>>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    /// Negotiated PDU size, 0 while not open
    pdu_size: AtomicU16,
    /// Serializes open and close
    worker: Mutex<Option<Worker>>,
}

impl std::fmt::Debug for SessionRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRequest")
            .field("pdu", &self.pdu)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(config: SessionConfig) -> Self {
        let (state_tx, _) = watch::channel(ConnectionState::Closed);
        Self {
            config: Arc::new(config),
            request_tx: ArcSwapOption::from(None),
            state_tx: Arc::new(state_tx),
            pdu_size: AtomicU16::new(0),
            worker: Mutex::new(None),
        }
    }

    #[inline]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[inline]
    pub fn state(&self) -> ConnectionState {
        *self.state_tx.borrow()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_tx.subscribe()
    }

    /// PDU size granted for the current connection.
    pub fn negotiated_pdu_size(&self) -> Option<u16> {
        match self.pdu_size.load(Ordering::Acquire) {
            0 => None,
            v => Some(v),
        }
    }

    fn publish(&self, state: ConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Connect, run the COTP handshake and negotiate the PDU size.
    ///
    /// Only valid from `Closed`. On failure the socket is released and the
    /// state is `Faulted` until `close()`.
    pub async fn open(&self) -> Result<()> {
        let mut worker = self.worker.lock().await;
        let state = self.state();
        if state != ConnectionState::Closed {
            return Err(Error::InvalidState(state));
        }

        self.publish(ConnectionState::CotpConnecting);
        let (framed, pdu_ref, ack) = match self.establish().await {
            Ok(v) => v,
            Err(e) => {
                warn!(addr = %self.config.socket_addr, error = %e, "open failed");
                self.publish(ConnectionState::Faulted);
                return Err(e);
            }
        };

        let (request_tx, request_rx) = mpsc::channel(self.config.send_queue_capacity.max(1));
        self.request_tx.store(Some(Arc::new(request_tx)));
        self.pdu_size.store(ack.pdu_len, Ordering::Release);

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_worker(
            framed,
            request_rx,
            pdu_ref,
            Arc::clone(&self.config),
            Arc::clone(&self.state_tx),
            cancel.clone(),
        ));
        *worker = Some(Worker { cancel, handle });
        self.publish(ConnectionState::Open);
        info!(addr = %self.config.socket_addr, pdu_size = ack.pdu_len, "connection open");
        Ok(())
    }

    async fn establish(&self) -> Result<(Framed<TcpStream, Codec>, PduReference, SetupAck)> {
        let config = &*self.config;
        let stream = timeout(config.connect_timeout, TcpStream::connect(config.socket_addr))
            .await
            .map_err(|_| Error::ErrConnectTimeout)??;
        stream.set_nodelay(config.tcp_nodelay)?;
        debug!(addr = %config.socket_addr, "tcp connected");

        let mut framed = Framed::new(stream, Codec::default());
        handshake::iso_connect(&mut framed, config).await?;
        self.publish(ConnectionState::CotpConnected);

        let mut pdu_ref = PduReference::new();
        self.publish(ConnectionState::NegotiatingPdu);
        let ack = handshake::negotiation(&mut framed, config, &mut pdu_ref).await?;
        Ok((framed, pdu_ref, ack))
    }

    /// Release the socket and return to `Closed` from any state.
    ///
    /// Queued requests fail with `ErrUseClosedConnection`.
    pub async fn close(&self) {
        let mut worker = self.worker.lock().await;
        if let Some(Worker { cancel, handle }) = worker.take() {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "session worker ended abnormally");
            }
        }
        self.request_tx.store(None);
        self.pdu_size.store(0, Ordering::Release);
        if self.state() != ConnectionState::Closed {
            info!(addr = %self.config.socket_addr, "connection closed");
        }
        self.publish(ConnectionState::Closed);
    }

    fn sender(&self) -> Result<Arc<mpsc::Sender<SessionRequest>>> {
        if !self.state().is_open() {
            return Err(Error::ErrUseClosedConnection);
        }
        self.request_tx
            .load_full()
            .ok_or(Error::ErrUseClosedConnection)
    }

    /// Negotiated PDU size of the open connection
    fn budget(&self) -> Result<usize> {
        if !self.state().is_open() {
            return Err(Error::ErrUseClosedConnection);
        }
        self.negotiated_pdu_size()
            .map(usize::from)
            .ok_or(Error::ErrUseClosedConnection)
    }

    /// Queue `pdu` behind earlier requests and parse its response with `parse`.
    ///
    /// Dropping the returned future does not abort an exchange already on the wire.
    pub async fn submit<T, F>(&self, pdu: S7Pdu, parse: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&S7Pdu) -> Result<T> + Send + 'static,
    {
        let request_tx = self.sender()?;
        let (tx, rx) = oneshot::channel();
        let completion = Box::new(Pending {
            parse: Some(parse),
            result: None,
            tx,
        });
        request_tx
            .send(SessionRequest { pdu, completion })
            .await
            .map_err(|_| Error::ErrUseClosedConnection)?;
        rx.await.map_err(|_| Error::ErrUseClosedConnection)?
    }

    /// One ReadVar exchange for up to 20 specifications, `lens` being the
    /// data length each one must return.
    async fn read_specs(&self, specs: &[S7VarSpec], lens: Vec<usize>) -> Result<Vec<ReadItemResult>> {
        let pdu = build_read_var(specs)?;
        self.submit(pdu, move |resp| {
            let items = parse_read_var_response(resp, lens.len())?;
            check_item_lens(&items, &lens)?;
            Ok(items)
        })
        .await
    }

    /// One WriteVar exchange for up to 20 items.
    async fn write_batch(&self, items: &[S7WriteItem]) -> Result<Vec<S7ReturnCode>> {
        let expected = items.len();
        let pdu = build_write_var(items)?;
        self.submit(pdu, move |resp| parse_write_var_response(resp, expected))
            .await
    }

    /// Read `items`, in as many requests as the PDU size requires.
    ///
    /// The outer error is operation or connection level; each inner result
    /// holds the decoded value or that item's failure, in input order.
    pub async fn read_items(&self, items: &[DataItem]) -> Result<Vec<Result<S7Value>>> {
        let specs = items
            .iter()
            .map(DataItem::var_spec)
            .collect::<Result<Vec<_>>>()?;
        let budget = self.budget()?;
        let lens: Vec<usize> = items.iter().map(DataItem::byte_length).collect();

        let mut values = Vec::with_capacity(items.len());
        for range in plan_batches(&lens, budget, Direction::Read)? {
            let results = self
                .read_specs(&specs[range.clone()], lens[range.clone()].to_vec())
                .await?;
            for (item, result) in items[range].iter().zip(results) {
                values.push(match result {
                    Ok(data) => S7Value::decode(item.var_type, item.count, &data),
                    Err(code) => Err(Error::ItemFailed { code }),
                });
            }
        }
        Ok(values)
    }

    /// Write `items`, in as many requests as the PDU size requires.
    ///
    /// Every value is encoded before the first request is sent. Item failures
    /// of all batches are reported together as `WriteFailed`.
    pub async fn write_items(&self, items: &[DataItem]) -> Result<()> {
        let writes = items
            .iter()
            .map(|item| {
                item.validate_write()?;
                let value = item
                    .value
                    .as_ref()
                    .ok_or(Error::ErrInvalidParam("write item without value"))?;
                Ok(S7WriteItem {
                    spec: item.var_spec()?,
                    data: value.encode(item.var_type, item.count)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;
        let budget = self.budget()?;
        let lens: Vec<usize> = writes.iter().map(|w| w.data.len()).collect();

        let mut failures = Vec::new();
        for range in plan_batches(&lens, budget, Direction::Write)? {
            let offset = range.start;
            let codes = self.write_batch(&writes[range]).await?;
            failures.extend(
                codes
                    .into_iter()
                    .enumerate()
                    .filter(|(_, code)| *code != S7ReturnCode::Success)
                    .map(|(idx, code)| ItemFailure {
                        index: offset + idx,
                        code,
                    }),
            );
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Error::WriteFailed { failures })
        }
    }

    /// Read `len` raw bytes, split into requests of at most `pdu - 18` bytes.
    pub async fn read_bytes(
        &self,
        area: S7Area,
        db_number: u16,
        start: u32,
        len: usize,
    ) -> Result<Vec<u8>> {
        check_range(start, len)?;
        let chunk = Direction::Read.max_item_len(self.budget()?);
        let mut out = Vec::with_capacity(len);
        while out.len() < len {
            let n = chunk.min(len - out.len());
            let item = DataItem::new(
                area,
                db_number,
                start + out.len() as u32,
                VarType::Byte,
                n as u16,
            );
            let spec = item.var_spec()?;
            let mut results = self
                .read_specs(std::slice::from_ref(&spec), vec![n])
                .await?;
            match results.pop() {
                Some(Ok(data)) => out.extend_from_slice(&data),
                Some(Err(code)) => return Err(Error::ItemFailed { code }),
                None => {
                    return Err(Error::ProtocolViolation {
                        context: "read response without items",
                    })
                }
            }
        }
        Ok(out)
    }

    /// Write `data`, split into requests of at most `pdu - 28` bytes.
    pub async fn write_bytes(
        &self,
        area: S7Area,
        db_number: u16,
        start: u32,
        data: &[u8],
    ) -> Result<()> {
        check_range(start, data.len())?;
        let chunk = Direction::Write.max_item_len(self.budget()?);
        for (idx, part) in data.chunks(chunk).enumerate() {
            let item = DataItem::new(
                area,
                db_number,
                start + (idx * chunk) as u32,
                VarType::Byte,
                part.len() as u16,
            );
            let write = S7WriteItem {
                spec: item.var_spec()?,
                data: Bytes::copy_from_slice(part),
            };
            let codes = self.write_batch(std::slice::from_ref(&write)).await?;
            match codes.first() {
                Some(S7ReturnCode::Success) => {}
                Some(&code) => return Err(Error::ItemFailed { code }),
                None => {
                    return Err(Error::ProtocolViolation {
                        context: "write response without items",
                    })
                }
            }
        }
        Ok(())
    }
}

/// Fail every request still queued.
async fn reject_pending(request_rx: &mut mpsc::Receiver<SessionRequest>) {
    request_rx.close();
    while let Some(request) = request_rx.recv().await {
        request.completion.fail(Error::ErrUseClosedConnection);
    }
}

/// Session worker: owns the socket and runs one exchange at a time.
async fn run_worker(
    mut framed: Framed<TcpStream, Codec>,
    mut request_rx: mpsc::Receiver<SessionRequest>,
    mut pdu_ref: PduReference,
    config: Arc<SessionConfig>,
    state_tx: Arc<watch::Sender<ConnectionState>>,
    cancel: CancellationToken,
) {
    loop {
        let SessionRequest {
            pdu,
            mut completion,
        } = select! {
            biased;
            _ = cancel.cancelled() => break,
            req = request_rx.recv() => match req {
                Some(request) => request,
                None => break,
            },
        };

        let outcome = select! {
            biased;
            _ = cancel.cancelled() => Err(Error::ErrUseClosedConnection),
            res = handshake::exchange(&mut framed, &config, &mut pdu_ref, pdu) => res,
        };
        if cancel.is_cancelled() {
            completion.fail(Error::ErrUseClosedConnection);
            break;
        }

        // any failed exchange leaves the stream position unknown
        let fatal = match outcome {
            Err(e) => {
                let reason = e.to_string();
                completion.check(Err(e));
                Some(reason)
            }
            Ok(pdu) => completion.check(Ok(pdu)),
        };
        match fatal {
            None => completion.deliver(),
            Some(reason) => {
                warn!(
                    addr = %config.socket_addr,
                    pdu_ref = pdu_ref.current(),
                    reason = %reason,
                    "connection faulted"
                );
                state_tx.send_replace(ConnectionState::Faulted);
                completion.deliver();
                reject_pending(&mut request_rx).await;
                return;
            }
        }
    }
    reject_pending(&mut request_rx).await;
    debug!(addr = %config.socket_addr, "session worker stopped");
}
