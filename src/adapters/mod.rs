// Adapters layer: concrete implementations of the domain ports.

pub mod grass;

pub use grass::ProcessRunner;
