//! UCI engine session (async I/O)

use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tracing::debug;

use crate::config::WorkerConfig;
use crate::error::WorkerError;
use crate::uci::{parse_line, EngineLine, EvaluationInfo};

/// Cancellation signal shared by everything working for one job.
/// The search stops once the value becomes `true`.
pub type CancelSignal = watch::Receiver<bool>;

/// Callback receiving every intermediate line of a search
pub type ProgressFn<'a> = dyn for<'e> Fn(&'e EvaluationInfo) + Send + Sync + 'a;

/// A receiver that is never cancelled
pub fn never_cancelled() -> CancelSignal {
    let (_tx, rx) = watch::channel(false);
    rx
}

pub fn is_cancelled(signal: &CancelSignal) -> bool {
    *signal.borrow()
}

/// Resolves once the signal turns `true`; never resolves if the sender is
/// dropped first
pub async fn cancelled(mut signal: CancelSignal) {
    if signal.wait_for(|stop| *stop).await.is_err() {
        std::future::pending::<()>().await;
    }
}

/// One search: position, depth and optional restrictions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub fen: String,
    pub depth: u32,
    /// Number of lines to report (MultiPV)
    pub multipv: u32,
    /// Restrict the root to these UCI moves
    pub searchmoves: Vec<String>,
}

impl SearchRequest {
    pub fn new(fen: &str, depth: u32) -> Self {
        Self {
            fen: fen.to_string(),
            depth,
            multipv: 1,
            searchmoves: Vec::new(),
        }
    }

    pub fn with_lines(mut self, multipv: u32) -> Self {
        self.multipv = multipv.max(1);
        self
    }

    pub fn restricted_to(mut self, uci: &str) -> Self {
        self.searchmoves = vec![uci.to_string()];
        self
    }
}

/// A running engine that handles one search at a time
#[async_trait]
pub trait EngineSession: Send {
    /// Run a search to the requested depth. Returns one evaluation per line
    /// (exactly one for single-line searches), each the deepest seen.
    async fn search(
        &mut self,
        request: &SearchRequest,
        cancel: CancelSignal,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<EvaluationInfo>, WorkerError>;

    /// False once the session hit a fatal protocol error
    fn is_alive(&self) -> bool;

    async fn quit(&mut self);
}

/// Options sent to the engine at handshake
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub threads: u32,
    pub hash_mb: u32,
    pub timeout: Duration,
}

impl EngineOptions {
    pub fn from_config(config: &WorkerConfig) -> Self {
        Self {
            threads: config.engine_threads,
            hash_mb: config.engine_hash_mb,
            timeout: config.engine_timeout(),
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            threads: 1,
            hash_mb: 256,
            timeout: Duration::from_secs(30),
        }
    }
}

type EngineReader = BufReader<Box<dyn AsyncRead + Send + Unpin>>;
type EngineWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Engine session speaking UCI over a pair of byte streams
pub struct UciSession {
    process: Option<Child>,
    reader: EngineReader,
    writer: EngineWriter,
    /// Bytes of a line whose read was interrupted (cancel or timeout)
    pending: Vec<u8>,
    timeout: Duration,
    multipv: u32,
    alive: bool,
}

impl UciSession {
    /// Spawn an engine process and perform the UCI handshake
    pub async fn spawn(path: &str, options: &EngineOptions) -> Result<Self, WorkerError> {
        let mut process = Command::new(path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::null())
            .spawn()
            .map_err(|e| WorkerError::Engine(format!("Failed to spawn engine {path}: {e}")))?;

        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| WorkerError::Engine("Engine stdin unavailable".into()))?;
        let stdout = process
            .stdout
            .take()
            .ok_or_else(|| WorkerError::Engine("Engine stdout unavailable".into()))?;

        let mut session = Self::unstarted(Box::new(stdout), Box::new(stdin), options);
        session.process = Some(process);
        session.handshake(options).await?;
        Ok(session)
    }

    /// Handshake with an engine reachable over arbitrary streams
    pub async fn connect(
        reader: Box<dyn AsyncRead + Send + Unpin>,
        writer: EngineWriter,
        options: &EngineOptions,
    ) -> Result<Self, WorkerError> {
        let mut session = Self::unstarted(reader, writer, options);
        session.handshake(options).await?;
        Ok(session)
    }

    fn unstarted(
        reader: Box<dyn AsyncRead + Send + Unpin>,
        writer: EngineWriter,
        options: &EngineOptions,
    ) -> Self {
        Self {
            process: None,
            reader: BufReader::new(reader),
            writer,
            pending: Vec::new(),
            timeout: options.timeout,
            multipv: 1,
            alive: true,
        }
    }

    async fn handshake(&mut self, options: &EngineOptions) -> Result<(), WorkerError> {
        self.send("uci").await?;
        self.wait_for(EngineLine::UciOk).await?;

        self.send(&format!("setoption name Threads value {}", options.threads)).await?;
        self.send(&format!("setoption name Hash value {}", options.hash_mb)).await?;
        self.send("isready").await?;
        self.wait_for(EngineLine::ReadyOk).await
    }

    /// Send a command to the engine
    async fn send(&mut self, cmd: &str) -> Result<(), WorkerError> {
        debug!(cmd, "ENGINE <");
        let result = async {
            self.writer.write_all(format!("{cmd}\n").as_bytes()).await?;
            self.writer.flush().await
        }
        .await;
        result.map_err(|e| {
            self.alive = false;
            if e.kind() == std::io::ErrorKind::BrokenPipe {
                WorkerError::EngineCrashed
            } else {
                WorkerError::EngineIo(format!("write: {e}"))
            }
        })
    }

    /// Read one complete line, bounded by the session timeout. Safe to drop
    /// mid-read: `read_until` leaves partial bytes in `pending`.
    async fn read_line(&mut self) -> Result<String, WorkerError> {
        let read =
            tokio::time::timeout(self.timeout, self.reader.read_until(b'\n', &mut self.pending)).await;
        match read {
            Err(_) => {
                self.alive = false;
                Err(WorkerError::EngineTimeout(self.timeout.as_secs()))
            }
            Ok(Err(e)) => {
                self.alive = false;
                Err(WorkerError::EngineIo(format!("read: {e}")))
            }
            Ok(Ok(0)) => {
                self.alive = false;
                Err(WorkerError::EngineCrashed)
            }
            Ok(Ok(_)) => {
                let bytes = std::mem::take(&mut self.pending);
                let line = String::from_utf8_lossy(&bytes).into_owned();
                debug!(line = line.trim(), "ENGINE >");
                Ok(line)
            }
        }
    }

    /// Wait for a specific response line
    async fn wait_for(&mut self, expected: EngineLine) -> Result<(), WorkerError> {
        loop {
            let line = self.read_line().await?;
            if parse_line(&line) == expected {
                return Ok(());
            }
        }
    }
}

#[async_trait]
impl EngineSession for UciSession {
    async fn search(
        &mut self,
        request: &SearchRequest,
        mut cancel: CancelSignal,
        progress: Option<&ProgressFn<'_>>,
    ) -> Result<Vec<EvaluationInfo>, WorkerError> {
        if is_cancelled(&cancel) {
            return Err(WorkerError::SearchCancelled);
        }

        let lines_wanted = request.multipv.max(1);
        if lines_wanted != self.multipv {
            self.send(&format!("setoption name MultiPV value {lines_wanted}")).await?;
            self.multipv = lines_wanted;
        }
        self.send(&format!("position fen {}", request.fen)).await?;
        let mut go = format!("go depth {}", request.depth);
        if !request.searchmoves.is_empty() {
            go.push_str(" searchmoves ");
            go.push_str(&request.searchmoves.join(" "));
        }
        self.send(&go).await?;

        let mut lines: Vec<Option<EvaluationInfo>> = vec![None; lines_wanted as usize];
        let mut watching = true;
        let mut stopped = false;

        let best_move = loop {
            let raw = if watching && !stopped {
                tokio::select! {
                    line = self.read_line() => line?,
                    changed = cancel.changed() => {
                        match changed {
                            Ok(()) if is_cancelled(&cancel) => {
                                self.send("stop").await?;
                                stopped = true;
                            }
                            Ok(()) => {}
                            // Sender gone: nobody can cancel any more
                            Err(_) => watching = false,
                        }
                        continue;
                    }
                }
            } else {
                self.read_line().await?
            };

            match parse_line(&raw) {
                EngineLine::Info(info) => {
                    let idx = info.multipv.saturating_sub(1) as usize;
                    let Some(slot) = lines.get_mut(idx) else {
                        continue;
                    };
                    let eval = EvaluationInfo::from_info(&info);
                    if let Some(callback) = progress {
                        callback(&eval);
                    }
                    if slot.as_ref().map(|s| eval.depth >= s.depth).unwrap_or(true) {
                        *slot = Some(eval);
                    }
                }
                EngineLine::BestMove(token) => break token,
                _ => {}
            }
        };

        if stopped {
            return Err(WorkerError::SearchCancelled);
        }

        // Position without progress lines (already mated or stalemated)
        let first = lines[0].take().unwrap_or_else(|| EvaluationInfo {
            best_move: best_move.clone(),
            ..EvaluationInfo::default()
        });
        let first = EvaluationInfo {
            best_move: if best_move.is_empty() { first.best_move } else { best_move },
            ..first
        };

        let mut results = vec![first];
        results.extend(lines.into_iter().skip(1).flatten());
        Ok(results)
    }

    fn is_alive(&self) -> bool {
        self.alive
    }

    /// Send quit command and wait for process to exit
    async fn quit(&mut self) {
        let _ = self.send("quit").await;
        if let Some(process) = self.process.as_mut() {
            let _ = tokio::time::timeout(Duration::from_secs(2), process.wait()).await;
        }
        self.alive = false;
    }
}

impl Drop for UciSession {
    fn drop(&mut self) {
        if let Some(process) = self.process.as_mut() {
            let _ = process.start_kill();
        }
    }
}
