//! Bounded outgoing bus queue.
//!
//! Uses an `embassy-sync` bounded MPMC channel to decouple the control
//! loop (which runs under the pack lock and must never block) from the
//! CAN transmitter (which may).
//!
//! ```text
//! ┌──────────────┐  BusMessage  ┌──────────────┐   frames   ┌─────────┐
//! │ Control Loop │────────────▶│  Dispatcher   │──────────▶│   CAN   │
//! │ (try_send)   │   depth 16   │ (try_receive) │  blocking  │         │
//! └──────────────┘              └──────────────┘            └─────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use super::can_frame;
use crate::app::commands::AppCommand;
use crate::app::events::{AppEvent, BusMessage};
use crate::app::ports::{BusTransmit, EventSink};
use crate::error::{Error, Result};

/// Channel depth for outgoing bus messages.
pub const BUS_QUEUE_DEPTH: usize = 16;

pub type BusChannel = Channel<CriticalSectionRawMutex, BusMessage, BUS_QUEUE_DEPTH>;

/// Outgoing channel: control loop → dispatcher.
pub static BUS_OUTGOING: BusChannel = Channel::new();

/// Channel depth for inbound commands.
pub const COMMAND_DEPTH: usize = 4;

pub type CommandChannel = Channel<CriticalSectionRawMutex, AppCommand, COMMAND_DEPTH>;

/// Inbound channel: bus receive → control loop.
pub static BUS_INCOMING: CommandChannel = Channel::new();

// ───────────────────────────────────────────────────────────────
// Producer side
// ───────────────────────────────────────────────────────────────

/// Non-blocking producer handle.  Full queue ⇒ message dropped.
pub struct BusQueue<'a> {
    channel: &'a BusChannel,
    dropped: u32,
}

impl<'a> BusQueue<'a> {
    pub fn new(channel: &'a BusChannel) -> Self {
        Self {
            channel,
            dropped: 0,
        }
    }

    /// Enqueue `msg` without blocking.
    pub fn send(&mut self, msg: BusMessage) -> Result<()> {
        if self.channel.try_send(msg).is_err() {
            self.dropped = self.dropped.saturating_add(1);
            warn!("BUS: outgoing queue full, dropping {msg:?}");
            return Err(Error::QueueFull);
        }
        Ok(())
    }

    /// Messages dropped since creation.
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    pub fn pending(&self) -> usize {
        self.channel.len()
    }
}

/// Fault-timer notices are mirrored onto the bus; every other event is
/// ignored here.
impl EventSink for BusQueue<'_> {
    fn emit(&mut self, event: &AppEvent) {
        if let AppEvent::FaultTimer(e) = event {
            // Drop already logged and counted.
            let _ = self.send(BusMessage::FaultTimer(*e));
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Inbound commands
// ───────────────────────────────────────────────────────────────

/// Control-loop reader for inbound commands.
///
/// A command that could not be applied is held here and handed out
/// again before anything newer, so deferral never reorders commands.
pub struct CommandInbox<'a> {
    channel: &'a CommandChannel,
    held: Option<AppCommand>,
}

impl<'a> CommandInbox<'a> {
    pub fn new(channel: &'a CommandChannel) -> Self {
        Self {
            channel,
            held: None,
        }
    }

    /// The oldest command not yet applied, if any.
    pub fn next(&mut self) -> Option<AppCommand> {
        self.held.take().or_else(|| self.channel.try_receive().ok())
    }

    /// Put `cmd` back at the front.  Only one command is held; call this
    /// at most once between `next` calls.
    pub fn defer(&mut self, cmd: AppCommand) {
        debug!("BUS: command {cmd:?} deferred");
        self.held = Some(cmd);
    }

    pub fn has_deferred(&self) -> bool {
        self.held.is_some()
    }
}

// ───────────────────────────────────────────────────────────────
// Consumer side
// ───────────────────────────────────────────────────────────────

/// Drains the channel into a [`BusTransmit`].
pub struct BusDispatcher<'a, T: BusTransmit> {
    channel: &'a BusChannel,
    tx: T,
    sent: u64,
    failed: u32,
}

impl<'a, T: BusTransmit> BusDispatcher<'a, T> {
    pub fn new(channel: &'a BusChannel, tx: T) -> Self {
        Self {
            channel,
            tx,
            sent: 0,
            failed: 0,
        }
    }

    /// Transmit everything currently queued.  Returns how many messages
    /// were taken off the queue.
    pub fn drain(&mut self) -> usize {
        let mut taken = 0;
        while let Ok(msg) = self.channel.try_receive() {
            taken += 1;
            match self.tx.transmit(&msg) {
                Ok(()) => self.sent += 1,
                Err(e) => {
                    self.failed = self.failed.saturating_add(1);
                    warn!("BUS: transmit failed: {e}");
                }
            }
        }
        taken
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn failed(&self) -> u32 {
        self.failed
    }

    pub fn transmitter(&self) -> &T {
        &self.tx
    }
}

// ───────────────────────────────────────────────────────────────
// Host transmitter
// ───────────────────────────────────────────────────────────────

/// Encodes each message to CAN frames and logs them.  Stands in for the
/// CAN peripheral on the host.
#[derive(Debug, Default)]
pub struct LogTransmit {
    frames: u64,
}

impl LogTransmit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl BusTransmit for LogTransmit {
    fn transmit(&mut self, msg: &BusMessage) -> Result<()> {
        for frame in can_frame::encode(msg) {
            self.frames += 1;
            debug!(
                "CAN TX | id=0x{:X}{} | {:02X?}",
                frame.id,
                if frame.extended { " (ext)" } else { "" },
                frame.data.as_slice()
            );
        }
        Ok(())
    }
}
