// Domain layer: site and surface models, host command values, and the ports the core drives.

pub mod command;
pub mod model;
pub mod ports;
