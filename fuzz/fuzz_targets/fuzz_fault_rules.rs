//! Fuzz target: fault table + state machine
//!
//! Interprets the input as a stream of 8-byte ticks (time step, pack
//! current, min cell voltage, max temperature, charger flag) and checks:
//! - No panics for any reading, including NaN and infinities
//! - A tick never ends in `Faulted` with the critical mask clear
//! - `Faulted` never has charging or balancing enabled
//!
//! cargo fuzz run fuzz_fault_rules

#![no_main]

use bms_core::app::events::AppEvent;
use bms_core::app::ports::{ChargeCommand, DriveLimits, EventSink, OutputPort};
use bms_core::app::service::BmsController;
use bms_core::config::BmsConfig;
use bms_core::fsm::StateId;
use bms_core::pack::PackSnapshot;
use libfuzzer_sys::fuzz_target;

struct Null;

impl OutputPort for Null {
    fn send_charge_command(&mut self, _cmd: ChargeCommand) {}
    fn send_drive_limits(&mut self, _limits: DriveLimits) {}
    fn set_fault_signal(&mut self, _asserted: bool) {}
}

impl EventSink for Null {
    fn emit(&mut self, _event: &AppEvent) {}
}

fn reading(bytes: [u8; 2], scale: f32) -> f32 {
    f32::from(i16::from_le_bytes(bytes)) * scale
}

fuzz_target!(|data: &[u8]| {
    let config = BmsConfig {
        over_current_ms: 500,
        under_volt_ms: 500,
        high_temp_ms: 500,
        ..BmsConfig::default()
    };
    let Ok(mut ctl) = BmsController::new(config) else {
        return;
    };
    let mut pack = PackSnapshot::new();
    pack.cont_discharge_limit = 200.0;
    pack.cont_charge_limit = 40.0;
    let mut now = 0u64;

    for chunk in data.chunks_exact(8) {
        now += u64::from(chunk[0]) * 10;
        pack.pack_current = reading([chunk[1], chunk[2]], 0.1);
        pack.min_voltage.val = reading([chunk[3], chunk[4]], 0.001);
        pack.max_voltage.val = pack.min_voltage.val;
        pack.max_temp.val = reading([chunk[5], chunk[6]], 0.01);
        if chunk[7] & 1 == 1 {
            pack.note_charger_detected();
        }

        ctl.handle_tick(&mut pack, now, &mut Null, &mut Null);

        if pack.current_state == StateId::Faulted {
            assert_ne!(pack.fault_code_crit, 0);
            assert!(!pack.is_charging_enabled);
            assert!(!pack.should_balance);
        }
    }
});
