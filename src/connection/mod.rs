//! Async handle to a running sensor session

mod sensor;


pub use sensor::SensorConnection;
