/// PRMS parameter sets.
///
/// - `set`: parameter metadata, the immutable base set and copy-on-write overlays
/// - `file`: reader and writer for the PRMS text parameter format
pub mod file;
pub mod set;

pub use file::{read_parameter_file, write_parameter_file};
pub use set::{Parameter, ParameterOverlay, ParameterSet, ValueType};
