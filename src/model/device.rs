//! Field devices and their raw registers.

use chrono::{DateTime, Utc};
use core::fmt;
use serde::{Deserialize, Serialize};

/// Field protocol a device speaks. The protocol driver is a separate
/// process; the engine only ever sees the register values it maintains.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Protocol {
    #[serde(rename = "ModbusTCP")]
    ModbusTcp,
    #[serde(rename = "ModbusRTU")]
    ModbusRtu,
    #[serde(rename = "BACnetIP")]
    BacnetIp,
    #[serde(rename = "BACnetMSTP")]
    BacnetMstp,
    #[serde(rename = "MQTT")]
    Mqtt,
}

/// A physical endpoint on the field bus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Device {
    pub id: i64,
    pub name: String,
    pub protocol: Protocol,
    pub address: String,
    pub port: Option<u16>,
    /// Serial parameters (ModbusRTU / BACnet MSTP only).
    pub baud_rate: Option<u32>,
    pub parity: Option<String>,
    pub stop_bits: Option<u8>,
    /// BACnet object instance.
    pub object_instance: Option<u32>,
    pub is_online: bool,
    pub last_communication: Option<DateTime<Utc>>,
}

/// Modbus function-code class of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FunctionClass {
    Read,
    Write,
}

/// Signal class of a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalClass {
    Digital,
    Analog,
    Pulse,
    Multistate,
}

/// Health of a register as reported by the field driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum RegisterStatus {
    #[default]
    #[serde(rename = "OK")]
    Ok,
    #[serde(rename = "FAULT")]
    Fault,
    #[serde(rename = "COMM_ERROR")]
    CommError,
    #[serde(rename = "RANGE_ERROR")]
    RangeError,
}

impl RegisterStatus {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for RegisterStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Ok => "OK",
            Self::Fault => "FAULT",
            Self::CommError => "COMM_ERROR",
            Self::RangeError => "RANGE_ERROR",
        };
        f.write_str(s)
    }
}

/// A raw addressable item on a device. The field driver owns
/// `current_value` and `error_status`; the engine only reads them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Register {
    pub id: i64,
    pub device_id: i64,
    pub address: u32,
    pub function_class: FunctionClass,
    pub signal_class: SignalClass,
    pub direction: super::IoDirection,
    pub data_type: super::DataType,
    /// Last value the driver read, as text.
    pub current_value: Option<String>,
    /// Free-text calibration hint carried for the commissioning UI.
    pub calibration: Option<String>,
    pub is_active: bool,
    pub error_status: RegisterStatus,
    pub error_message: Option<String>,
    pub last_updated: Option<DateTime<Utc>>,
}
