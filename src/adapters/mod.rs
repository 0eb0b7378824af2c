//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter       | Implements          | Connects to                     |
//! |---------------|---------------------|---------------------------------|
//! | `bus_queue`   | EventSink           | Outgoing CAN queue + dispatcher |
//! |               | BusTransmit         | (`LogTransmit`, host stand-in)  |
//! | `can_frame`   | -                   | CAN wire layouts                |
//! | `config_file` | ConfigPort          | JSON / postcard config file     |
//! | `fault_pin`   | -                   | embedded-hal fault line         |
//! | `log_sink`    | EventSink           | `log` facade                    |
//! | `outputs`     | OutputPort          | Bus queue + fault line          |
//! | `sim`         | -                   | Synthetic analytics (host)      |
//! | `time`        | Clock               | `std::time::Instant`            |

pub mod bus_queue;
pub mod can_frame;
pub mod config_file;
pub mod fault_pin;
pub mod log_sink;
pub mod outputs;
pub mod sim;
pub mod time;
