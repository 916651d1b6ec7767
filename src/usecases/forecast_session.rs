//! Forecast Session - Per-connection Read → Predict → Push Loop
//!
//! One session per connected client, fully independent of every other:
//! its own log handle, its own cursor, optionally its own OFI window.
//!
//! State machine: `Connecting → Streaming → Closed`.
//! - Connecting: resolve the starting cursor (beginning or current tail).
//! - Streaming: bounded blocking read; per entry parse, resolve features,
//!   predict, serialize, push, then advance the cursor.
//! - Closed: terminal. Reached on client disconnect, cancellation,
//!   transport loss or an unrecoverable entry. Nothing is read, pushed
//!   or advanced after that point.
//!
//! Cancellation is observed through a `watch` channel and raced against
//! both blocking points (the read and the push), so closing a connection
//! unblocks the session immediately.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use super::predictor_service::PredictorService;
use crate::domain::entry::{Cursor, EntryId, RawEntry, StartFrom, StreamEntry};
use crate::domain::error::TransportUnavailableError;
use crate::domain::features::FeatureVector;
use crate::domain::frame::ForecastFrame;
use crate::domain::ofi::OfiWindow;
use crate::domain::predictor::heuristic;
use crate::ports::frame_sink::FrameSink;
use crate::ports::stream_log::StreamLog;
use crate::ports::telemetry::Telemetry;

/// Consumer label used for telemetry.
const CONSUMER: &str = "gateway";

/// Static parameters of a session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
  /// Stream to read (trades or features).
  pub stream: String,
  pub start_from: StartFrom,
  /// Max entries per read.
  pub batch_size: usize,
  /// Max wait per read.
  pub block: Duration,
  /// Window capacity when the session keeps its own OFI; `None` = off.
  pub local_window: Option<usize>,
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
  /// The client went away (push failed).
  ClientDisconnected,
  /// The connection or the process asked the session to stop.
  Cancelled,
  /// The log store could not be reached.
  TransportLost(String),
  /// An entry could not be handled safely (out-of-order id, frame encoding).
  Unrecoverable(String),
}

impl fmt::Display for CloseReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::ClientDisconnected => write!(f, "client disconnected"),
      Self::Cancelled => write!(f, "cancelled"),
      Self::TransportLost(msg) => write!(f, "transport lost: {msg}"),
      Self::Unrecoverable(msg) => write!(f, "unrecoverable: {msg}"),
    }
  }
}

/// Lifecycle of one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
  Connecting,
  Streaming,
  Closed(CloseReason),
}

/// Outcome of a finished session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionReport {
  pub session_id: String,
  pub reason: CloseReason,
  /// Final cursor; `last` is the newest id fully handled (pushed or skipped).
  pub cursor: Option<Cursor>,
  /// Ids of delivered frames, in push order.
  pub frames_pushed: u64,
  pub last_pushed: Option<EntryId>,
  /// Malformed entries skipped.
  pub skipped: u64,
  /// Model failures answered by the heuristic.
  pub fallbacks: u64,
  /// Reads issued against the log.
  pub reads: u64,
}

/// Result of handling one entry.
enum Step {
  Continue,
  Close(CloseReason),
}

/// Per-connection forecast loop.
pub struct ForecastSession<L: StreamLog, S: FrameSink> {
  id: String,
  log: L,
  sink: S,
  predictor: Arc<PredictorService>,
  telemetry: Arc<dyn Telemetry>,
  settings: SessionSettings,
  window: Option<OfiWindow>,
  state: SessionState,
  cursor: Option<Cursor>,
  report: Counters,
}

#[derive(Debug, Default)]
struct Counters {
  frames_pushed: u64,
  last_pushed: Option<EntryId>,
  skipped: u64,
  fallbacks: u64,
  reads: u64,
}

impl<L: StreamLog, S: FrameSink> ForecastSession<L, S> {
  pub fn new(
    id: impl Into<String>,
    log: L,
    sink: S,
    predictor: Arc<PredictorService>,
    telemetry: Arc<dyn Telemetry>,
    settings: SessionSettings,
  ) -> Self {
    let window = settings.local_window.map(OfiWindow::new);
    Self {
      id: id.into(),
      log,
      sink,
      predictor,
      telemetry,
      settings,
      window,
      state: SessionState::Connecting,
      cursor: None,
      report: Counters::default(),
    }
  }

  pub fn state(&self) -> &SessionState {
    &self.state
  }

  /// Drive the session to completion.
  ///
  /// `closed` flips to `true` (or its sender is dropped) when the
  /// connection or the process wants the session to stop.
  #[instrument(skip_all, fields(session = %self.id, stream = %self.settings.stream))]
  pub async fn run(mut self, mut closed: watch::Receiver<bool>) -> SessionReport {
    self.telemetry.session_opened();

    let reason = match self.connect(&mut closed).await {
      Ok(()) => self.stream(&mut closed).await,
      Err(reason) => reason,
    };

    match &reason {
      CloseReason::ClientDisconnected | CloseReason::Cancelled => {
        info!(reason = %reason, frames = self.report.frames_pushed, "Forecast session closed");
      }
      CloseReason::TransportLost(msg) => {
        error!(error = %msg, "Forecast session lost the stream transport");
      }
      CloseReason::Unrecoverable(msg) => {
        warn!(error = %msg, "Forecast session closed on unrecoverable entry");
      }
    }

    self.state = SessionState::Closed(reason.clone());
    self.telemetry.session_closed();

    SessionReport {
      session_id: self.id,
      reason,
      cursor: self.cursor,
      frames_pushed: self.report.frames_pushed,
      last_pushed: self.report.last_pushed,
      skipped: self.report.skipped,
      fallbacks: self.report.fallbacks,
      reads: self.report.reads,
    }
  }

  /// Connecting → Streaming: resolve the starting cursor once.
  async fn connect(&mut self, closed: &mut watch::Receiver<bool>) -> Result<(), CloseReason> {
    let stream = self.settings.stream.clone();
    let cursor = match self.settings.start_from {
      StartFrom::Beginning => Cursor::beginning(stream),
      StartFrom::Latest => {
        let latest = tokio::select! {
          biased;
          () = cancelled(closed) => return Err(CloseReason::Cancelled),
          res = self.log.latest_id(&stream) => res,
        };
        let latest = latest.map_err(transport_lost)?;
        Cursor::after(stream, latest)
      }
    };

    debug!(start = ?cursor.last(), "Forecast session streaming");
    self.cursor = Some(cursor);
    self.state = SessionState::Streaming;
    Ok(())
  }

  async fn stream(&mut self, closed: &mut watch::Receiver<bool>) -> CloseReason {
    loop {
      let after = self.cursor.as_ref().and_then(Cursor::last);

      let read = tokio::select! {
        biased;
        () = cancelled(closed) => return CloseReason::Cancelled,
        res = self.log.read(
          &self.settings.stream,
          after,
          self.settings.batch_size,
          self.settings.block,
        ) => res,
      };
      self.report.reads += 1;

      let entries = match read {
        Ok(entries) => entries,
        Err(e) => return transport_lost(e),
      };

      // Empty read: the bounded wait elapsed, go round again.
      let received_at = Instant::now();
      for raw in &entries {
        if *closed.borrow() {
          return CloseReason::Cancelled;
        }
        if let Step::Close(reason) = self.handle(raw, received_at, closed).await {
          return reason;
        }
      }
    }
  }

  /// Parse, predict and push one entry, then advance the cursor.
  async fn handle(
    &mut self,
    raw: &RawEntry,
    received_at: Instant,
    closed: &mut watch::Receiver<bool>,
  ) -> Step {
    if self
      .cursor
      .as_ref()
      .and_then(Cursor::last)
      .is_some_and(|last| raw.id <= last)
    {
      return Step::Close(CloseReason::Unrecoverable(format!(
        "entry {} is not after the cursor",
        raw.id
      )));
    }

    let entry = match StreamEntry::try_from(raw) {
      Ok(entry) => entry,
      Err(e) => {
        warn!(id = %raw.id, error = %e, "Skipping malformed entry");
        self.telemetry.malformed_event(CONSUMER);
        self.report.skipped += 1;
        self.advance(raw.id);
        return Step::Continue;
      }
    };

    let trade = entry.payload.trade();
    let local_ofi = self.window.as_mut().map(|w| w.observe(trade.side));
    let features = FeatureVector::resolve(trade, entry.payload.upstream_ofi(), local_ofi);

    let prediction = match self.predictor.predict(&features) {
      Ok(prediction) => prediction,
      Err(e) => {
        warn!(id = %entry.id, error = %e, "Model prediction failed, using heuristic for this event");
        self.telemetry.prediction_fallback();
        self.report.fallbacks += 1;
        heuristic(&features)
      }
    };

    let frame = match ForecastFrame::new(entry.id, &features, &prediction).to_json() {
      Ok(json) => json,
      Err(e) => return Step::Close(CloseReason::Unrecoverable(e.to_string())),
    };

    let pushed = tokio::select! {
      biased;
      () = cancelled(closed) => return Step::Close(CloseReason::Cancelled),
      res = self.sink.push(frame) => res,
    };
    if pushed.is_err() {
      return Step::Close(CloseReason::ClientDisconnected);
    }

    self.advance(entry.id);
    self.report.frames_pushed += 1;
    self.report.last_pushed = Some(entry.id);
    self.telemetry.frame_pushed(prediction.source, received_at.elapsed());
    Step::Continue
  }

  fn advance(&mut self, id: EntryId) {
    if let Some(cursor) = self.cursor.as_mut() {
      cursor.advance(id);
    }
  }
}

/// Resolves once the connection is closed or its owner is gone.
async fn cancelled(closed: &mut watch::Receiver<bool>) {
  let _ = closed.wait_for(|closed| *closed).await;
}

fn transport_lost(e: TransportUnavailableError) -> CloseReason {
  CloseReason::TransportLost(e.0)
}
