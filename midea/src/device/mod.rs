//! Per-appliance-type state containers: `refresh`/`apply`/`get_capabilities`
//! orchestration over a [`Transport`] (spec §4.8 "Device model").

pub mod ac;
pub mod c3;
pub mod cc;

pub use ac::AirConditioner;
pub use c3::HeatPump;
pub use cc::CommercialCooler;
