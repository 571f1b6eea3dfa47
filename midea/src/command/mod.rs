//! Per-appliance-type payload codecs, addressed by `(device_type,
//! frame_type, payload[0])` (spec §4.3, §9 "Polymorphism over appliance
//! types").

pub mod ac;
pub mod c3;
pub mod cc;
