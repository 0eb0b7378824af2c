//! Production [`OutputPort`]: bus messages into the outgoing queue, the
//! fault signal onto the relay pin.

use embedded_hal::digital::OutputPin;

use super::bus_queue::BusQueue;
use super::fault_pin::FaultRelay;
use crate::app::events::BusMessage;
use crate::app::ports::{ChargeCommand, DriveLimits, OutputPort};

pub struct ControlOutputs<'a, P: OutputPin> {
    pub bus: BusQueue<'a>,
    pub fault: FaultRelay<P>,
}

impl<'a, P: OutputPin> ControlOutputs<'a, P> {
    pub fn new(bus: BusQueue<'a>, fault: FaultRelay<P>) -> Self {
        Self { bus, fault }
    }
}

impl<P: OutputPin> OutputPort for ControlOutputs<'_, P> {
    fn send_charge_command(&mut self, cmd: ChargeCommand) {
        // A full queue is logged and counted by the queue itself.
        let _ = self.bus.send(BusMessage::Charge(cmd));
    }

    fn send_drive_limits(&mut self, limits: DriveLimits) {
        let _ = self.bus.send(BusMessage::DriveLimits(limits));
    }

    fn set_fault_signal(&mut self, asserted: bool) {
        self.fault.set(asserted);
    }
}
