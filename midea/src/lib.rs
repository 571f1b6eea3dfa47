//! Library for talking directly to Midea-protocol LAN appliances: discovery,
//! the V3 session handshake/envelope, per-appliance wire codecs, a cloud
//! client for devices that need a cloud-issued token, and a state machine per
//! appliance type.
//!
//! No CLI or daemon ships from this crate; callers own the event loop,
//! logging configuration, and persistence (spec §1).

pub mod capability;
pub mod cloud;
pub mod command;
pub mod crypto;
pub mod device;
pub mod discover;
pub mod error;
pub mod frame;
pub mod property;
pub mod session;
pub mod transport;

pub use device::{AirConditioner, CommercialCooler, HeatPump};
pub use discover::{authenticate_v3_devices, discover, DeviceDescriptor, DiscoveryOptions, ProtocolVersion};
pub use error::{Error, Result};
pub use frame::{DeviceType, Frame, FrameType};
pub use session::{Handshake, SessionKey, V3Envelope};
pub use transport::Transport;
