//! The task that owns a session's state.
//!
//! Commands, inbound transport events and scheduler ticks are all handled
//! here, one at a time. Commands win ties, so a stop or cancel is applied
//! before any tick that became due in the meantime.

use bytes::Bytes;
use tokio::sync::{mpsc, oneshot};

use crate::error::{Error, Result, TransportError};
use crate::event::{Event, EventDispatcher};
use crate::protocol::parse_status;
use crate::scheduler::{
    PeriodicTask, PointStream, SchedulerKind, SchedulerMode, SchedulerStatus, StreamPhase,
    StreamStep, percent,
};
use crate::transport::{SerialConfig, Transport, TransportEvent};
use crate::types::SessionStats;

use super::SessionState;

/// Capacity of the per-open inbound channel.
const INBOUND_CHANNEL_SIZE: usize = 256;

/// Requests sent from a [`super::Session`] handle.
pub(crate) enum Command {
    Open {
        config: SerialConfig,
        reply: oneshot::Sender<Result<()>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Write {
        data: Bytes,
        reply: oneshot::Sender<Result<usize>>,
    },
    Pause {
        paused: bool,
        reply: oneshot::Sender<()>,
    },
    FlowControl {
        rts: bool,
        dtr: bool,
        reply: oneshot::Sender<Result<()>>,
    },
    ResetStats {
        reply: oneshot::Sender<()>,
    },
    State {
        reply: oneshot::Sender<SessionState>,
    },
    StartPeriodic {
        task: PeriodicTask,
        reply: oneshot::Sender<Result<()>>,
    },
    StopPeriodic {
        reply: oneshot::Sender<()>,
    },
    StartPointStream {
        stream: PointStream,
        reply: oneshot::Sender<Result<()>>,
    },
    CancelPointStream {
        reply: oneshot::Sender<()>,
    },
}

pub(crate) struct Actor<T> {
    transport: T,
    dispatcher: EventDispatcher,
    commands: mpsc::Receiver<Command>,
    inbound: Option<mpsc::Receiver<TransportEvent>>,
    mode: SchedulerMode,
    stream_phase: StreamPhase,
    stats: SessionStats,
    open: bool,
    paused: bool,
    lines: Option<(bool, bool)>,
}

async fn next_inbound(
    inbound: &mut Option<mpsc::Receiver<TransportEvent>>,
) -> Option<TransportEvent> {
    match inbound {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl<T: Transport> Actor<T> {
    pub(crate) fn new(
        transport: T,
        dispatcher: EventDispatcher,
        commands: mpsc::Receiver<Command>,
    ) -> Self {
        Self {
            transport,
            dispatcher,
            commands,
            inbound: None,
            mode: SchedulerMode::Idle,
            stream_phase: StreamPhase::Idle,
            stats: SessionStats::default(),
            open: false,
            paused: false,
            lines: None,
        }
    }

    /// Runs until every handle is dropped, then releases the port.
    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                biased;
                command = self.commands.recv() => {
                    let Some(command) = command else {
                        break;
                    };
                    self.handle_command(command).await;
                }
                event = next_inbound(&mut self.inbound) => self.handle_inbound(event).await,
                kind = self.mode.next_tick() => self.handle_tick(kind).await,
            }
        }

        tracing::debug!("session handle dropped, shutting down");
        self.close().await;
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Open { config, reply } => {
                let _ = reply.send(self.open(config).await);
            }
            Command::Close { reply } => {
                self.close().await;
                let _ = reply.send(());
            }
            Command::Write { data, reply } => {
                let _ = reply.send(self.write(data).await);
            }
            Command::Pause { paused, reply } => {
                if self.paused != paused {
                    tracing::debug!("receive {}", if paused { "paused" } else { "resumed" });
                }
                self.paused = paused;
                let _ = reply.send(());
            }
            Command::FlowControl { rts, dtr, reply } => {
                let _ = reply.send(self.set_flow_control(rts, dtr).await);
            }
            Command::ResetStats { reply } => {
                self.stats.reset();
                let _ = reply.send(());
            }
            Command::State { reply } => {
                let _ = reply.send(self.state());
            }
            Command::StartPeriodic { task, reply } => {
                let _ = reply.send(self.start_periodic(task));
            }
            Command::StopPeriodic { reply } => {
                if matches!(self.mode, SchedulerMode::Periodic { .. }) {
                    self.stop_scheduler();
                }
                let _ = reply.send(());
            }
            Command::StartPointStream { stream, reply } => {
                let _ = reply.send(self.start_point_stream(stream));
            }
            Command::CancelPointStream { reply } => {
                if matches!(self.mode, SchedulerMode::PointStream { .. }) {
                    self.stop_scheduler();
                }
                let _ = reply.send(());
            }
        }
    }

    fn state(&self) -> SessionState {
        let stream_progress = match &self.mode {
            SchedulerMode::PointStream { stream, .. } => Some((stream.sent(), stream.total())),
            _ => None,
        };
        SessionState {
            open: self.open,
            paused: self.paused,
            stats: self.stats,
            scheduler: SchedulerStatus {
                active: self.mode.kind(),
                stream_phase: self.stream_phase,
                stream_progress,
            },
        }
    }

    async fn open(&mut self, mut config: SerialConfig) -> Result<()> {
        if let Some(active) = self.mode.kind() {
            return Err(Error::SchedulerBusy { active });
        }
        if self.open {
            tracing::debug!("reopening, closing current port first");
            self.close().await;
        }
        if let Some((rts, dtr)) = self.lines {
            config = config.lines(rts, dtr);
        }

        let (tx, rx) = mpsc::channel(INBOUND_CHANNEL_SIZE);
        self.transport.open(&config, tx).await?;
        self.inbound = Some(rx);
        self.open = true;

        tracing::info!("session open on {}", config.port);
        self.dispatcher.dispatch(Event::PortOpened);
        Ok(())
    }

    /// Releases the transport without dispatching anything.
    ///
    /// Returns true if the port was open.
    async fn release_port(&mut self) -> bool {
        self.inbound = None;
        if !self.open {
            return false;
        }
        self.open = false;
        if let Err(e) = self.transport.close().await {
            tracing::warn!("error closing transport: {}", e);
        }
        true
    }

    async fn close(&mut self) {
        self.stop_scheduler();
        if self.release_port().await {
            tracing::info!("session closed");
            self.dispatcher.dispatch(Event::PortClosed);
        }
    }

    fn stop_scheduler(&mut self) {
        match self.mode.take() {
            SchedulerMode::Idle => {}
            SchedulerMode::Periodic { .. } => {
                tracing::debug!("periodic send stopped");
                self.dispatcher.dispatch(Event::PeriodicStopped);
            }
            SchedulerMode::PointStream { stream, .. } => {
                tracing::info!(
                    "point stream cancelled after {}/{} samples",
                    stream.sent(),
                    stream.total()
                );
                self.stream_phase = StreamPhase::Cancelled;
                self.dispatcher.dispatch(Event::SendCancelled);
            }
        }
    }

    /// Writes to the transport and counts accepted bytes.
    async fn send_raw(&mut self, data: Bytes) -> Result<usize, TransportError> {
        if !self.open {
            return Err(TransportError::NotOpen);
        }
        let len = data.len();
        let accepted = self.transport.write(data).await?;
        if accepted == 0 {
            return Err(TransportError::WriteFailed(format!(
                "device accepted 0 of {len} bytes"
            )));
        }
        tracing::trace!("sent {} bytes", accepted);
        self.stats.record_sent(accepted);
        Ok(accepted)
    }

    async fn write(&mut self, data: Bytes) -> Result<usize> {
        match self.send_raw(data).await {
            Ok(n) => Ok(n),
            Err(e) => {
                if e.is_fatal() {
                    tracing::error!("fatal write error: {}", e);
                    self.close().await;
                }
                Err(e.into())
            }
        }
    }

    async fn set_flow_control(&mut self, rts: bool, dtr: bool) -> Result<()> {
        self.lines = Some((rts, dtr));
        if !self.open {
            tracing::debug!("port closed, RTS={} DTR={} applied on next open", rts, dtr);
            return Ok(());
        }
        if let Err(e) = self.transport.set_flow_control(rts, dtr).await {
            if e.is_fatal() {
                self.close().await;
            }
            return Err(e.into());
        }
        Ok(())
    }

    fn start_periodic(&mut self, task: PeriodicTask) -> Result<()> {
        if !self.open {
            return Err(TransportError::NotOpen.into());
        }
        if let SchedulerMode::PointStream { .. } = self.mode {
            return Err(Error::SchedulerBusy {
                active: SchedulerKind::PointStream,
            });
        }

        let interval_ms = task.interval_ms();
        self.mode = SchedulerMode::periodic(task);
        tracing::info!("periodic send every {}ms", interval_ms);
        self.dispatcher
            .dispatch(Event::PeriodicStarted { interval_ms });
        Ok(())
    }

    fn start_point_stream(&mut self, stream: PointStream) -> Result<()> {
        if !self.open {
            return Err(TransportError::NotOpen.into());
        }
        if let SchedulerMode::Periodic { .. } = self.mode {
            return Err(Error::SchedulerBusy {
                active: SchedulerKind::Periodic,
            });
        }

        let total = stream.total();
        let interval_ms = stream.interval_ms();
        self.mode = SchedulerMode::point_stream(stream);
        self.stream_phase = StreamPhase::Running;
        tracing::info!("streaming {} points every {}ms", total, interval_ms);
        self.dispatcher
            .dispatch(Event::PointStreamStarted { total, interval_ms });
        Ok(())
    }

    async fn handle_tick(&mut self, kind: SchedulerKind) {
        tracing::trace!("{} tick", kind);
        match &mut self.mode {
            SchedulerMode::Idle => {}
            SchedulerMode::Periodic { task, .. } => {
                let payload = match task.payload() {
                    Ok(payload) => payload,
                    Err(e) => {
                        tracing::warn!("periodic payload unavailable: {}", e);
                        self.dispatcher.dispatch(Event::Error {
                            message: e.to_string(),
                            fatal: false,
                        });
                        return;
                    }
                };
                if let Err(e) = self.send_raw(payload).await {
                    self.report(&e).await;
                }
            }
            SchedulerMode::PointStream { stream, .. } => match stream.advance() {
                StreamStep::Completed => {
                    self.mode = SchedulerMode::Idle;
                    self.stream_phase = StreamPhase::Completed;
                    tracing::info!("point stream completed");
                    self.dispatcher.dispatch(Event::SendCompleted);
                }
                StreamStep::Send {
                    payload,
                    current,
                    total,
                } => match self.send_raw(payload).await {
                    Ok(_) => self.dispatcher.dispatch(Event::SendProgress {
                        current,
                        total,
                        percent: percent(current, total),
                    }),
                    Err(e) => self.report(&e).await,
                },
            },
        }
    }

    async fn handle_inbound(&mut self, event: Option<TransportEvent>) {
        match event {
            Some(TransportEvent::Data(data)) => self.receive(data),
            Some(TransportEvent::Error(err)) => self.report(&err).await,
            None => {
                self.inbound = None;
                if self.open {
                    self.report(&TransportError::ResourceLost("transport stopped".into()))
                        .await;
                }
            }
        }
    }

    fn receive(&mut self, data: Bytes) {
        if !self.open || self.paused {
            tracing::trace!("dropping {} bytes while paused", data.len());
            return;
        }
        self.stats.record_received(data.len());
        let status = parse_status(&data);
        self.dispatcher.dispatch(Event::DataReceived(data));
        if let Some(status) = status {
            self.dispatcher.dispatch(Event::Telemetry(status));
        }
    }

    /// Dispatches an error that has no caller waiting for it.
    ///
    /// Fatal errors close the session first, so subscribers observe the port
    /// as closed once the error arrives.
    async fn report(&mut self, err: &TransportError) {
        let fatal = err.is_fatal();
        let was_open = if fatal {
            tracing::error!("fatal transport error: {}", err);
            self.stop_scheduler();
            self.release_port().await
        } else {
            tracing::warn!("transport error: {}", err);
            false
        };

        self.dispatcher.dispatch(Event::Error {
            message: err.to_string(),
            fatal,
        });
        if was_open {
            self.dispatcher.dispatch(Event::PortClosed);
        }
    }
}
