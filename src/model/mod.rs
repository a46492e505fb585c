//! Persistent data model.
//!
//! Entities are owned by the configuration store; the engine reads them each
//! phase and writes back only the runtime fields (`Point.read_value`,
//! `Point.write_value`, FBD runtime maps, script execution metadata).

mod device;
mod history;
mod point;
mod program;

pub use device::{Device, FunctionClass, Protocol, Register, RegisterStatus, SignalClass};
pub use history::{Alarm, AlarmSeverity, Event, EventSeverity, Fault, Log};
pub use point::{DataType, IoDirection, Point, PointGroup, PointType, PointValue};
pub use program::{BindDirection, FbdProgram, ScriptBinding, ScriptProgram};
