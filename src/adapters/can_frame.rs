//! CAN frame encoding for outgoing bus messages.
//!
//! | Message        | ID           | Layout (big-endian)                             |
//! |----------------|--------------|-------------------------------------------------|
//! | Charger        | `0x1806E5F4` | u16 V×10, u16 A×10, u8 ctrl (00 on, FF off), 3 pad |
//! | MC discharge   | `0x156`      | u16 A×10, 6 pad                                 |
//! | MC charge      | `0x176`      | i16 −A×10, 6 pad                                |
//! | Fault timer    | `0x6F9`      | u8 kind, u8 fault bit index, f32 value          |
//!
//! The charger uses a 29-bit extended identifier; everything else is
//! standard 11-bit.

use heapless::Vec;

use crate::app::events::{BusMessage, FaultTimerEvent, FaultTimerKind};
use crate::app::ports::{ChargeCommand, DriveLimits};

pub const CHARGER_CANID: u32 = 0x1806_E5F4;
pub const DISCHARGE_CANID: u32 = 0x156;
pub const CHARGE_CANID: u32 = 0x176;
pub const FAULT_TIMER_CANID: u32 = 0x6F9;

/// Classic CAN payload limit.
pub const MAX_DLC: usize = 8;

/// One classic CAN frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanFrame {
    pub id: u32,
    pub extended: bool,
    pub data: Vec<u8, MAX_DLC>,
}

impl CanFrame {
    fn new(id: u32, extended: bool, payload: &[u8]) -> Self {
        let mut data = Vec::new();
        // Payloads below are all built at or under MAX_DLC.
        let _ = data.extend_from_slice(&payload[..payload.len().min(MAX_DLC)]);
        Self { id, extended, data }
    }
}

/// Frames for one bus message; drive limits split into two.
pub fn encode(msg: &BusMessage) -> Vec<CanFrame, 2> {
    let mut frames = Vec::new();
    match msg {
        BusMessage::Charge(cmd) => {
            let _ = frames.push(charger_frame(cmd));
        }
        BusMessage::DriveLimits(limits) => {
            let [discharge, charge] = drive_limit_frames(limits);
            let _ = frames.push(discharge);
            let _ = frames.push(charge);
        }
        BusMessage::FaultTimer(event) => {
            let _ = frames.push(fault_timer_frame(event));
        }
    }
    frames
}

fn scale_tenths(value: f32) -> u16 {
    // `as` saturates: negative → 0, overflow → u16::MAX.
    (value * 10.0) as u16
}

fn charger_frame(cmd: &ChargeCommand) -> CanFrame {
    let mut payload = [0u8; MAX_DLC];
    payload[0..2].copy_from_slice(&scale_tenths(cmd.voltage).to_be_bytes());
    payload[2..4].copy_from_slice(&scale_tenths(cmd.current).to_be_bytes());
    payload[4] = if cmd.enabled { 0x00 } else { 0xFF };
    CanFrame::new(CHARGER_CANID, true, &payload)
}

fn drive_limit_frames(limits: &DriveLimits) -> [CanFrame; 2] {
    let mut discharge = [0u8; MAX_DLC];
    discharge[0..2].copy_from_slice(&scale_tenths(limits.discharge_limit).to_be_bytes());

    let mut charge = [0u8; MAX_DLC];
    let regen = (-10.0 * limits.charge_limit) as i16;
    charge[0..2].copy_from_slice(&regen.to_be_bytes());

    [
        CanFrame::new(DISCHARGE_CANID, false, &discharge),
        CanFrame::new(CHARGE_CANID, false, &charge),
    ]
}

fn fault_timer_frame(event: &FaultTimerEvent) -> CanFrame {
    let mut payload = [0u8; 6];
    payload[0] = match event.kind {
        FaultTimerKind::Cleared => 0,
        FaultTimerKind::Started => 1,
        FaultTimerKind::Faulted => 2,
    };
    payload[1] = event.code.bit_index();
    payload[2..6].copy_from_slice(&event.value.to_be_bytes());
    CanFrame::new(FAULT_TIMER_CANID, false, &payload)
}
