//! Hardware backends for the cart-pole controller.
//!
//! The simulated rig is the default backend for development and tests; the
//! stdio transport binds the serial protocol to a terminal or a pipe. Real
//! drive electronics (TMC driver, AS5600, endstop GPIOs) are external
//! collaborators reached through the `cartpole_traits` seams and live with
//! the board support code, not here.

pub mod error;
pub mod sim;
pub mod stdio;

pub use error::HwError;
pub use sim::{RigCfg, ScriptedAngleSensor, SimAngleSensor, SimDriver, SimRig, SimSwitches};
pub use stdio::StdioTransport;
