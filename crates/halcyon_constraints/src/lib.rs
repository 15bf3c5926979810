//! Constraint file parsers.
//!
//! Four dialects feed attributes and clock constraints into a context:
//! XDC (a Tcl subset), QSF (three assignment commands), PDC (Lattice-style
//! `ldc_*` commands), and PCF (line-oriented, with regex-pattern prohibit
//! commands). Each parser is line-based over the shared Tcl-ish tokenizer
//! and reports unknown commands as warnings rather than failing the run.

#![warn(missing_docs)]

pub mod pcf;
pub mod pdc;
pub mod qsf;
pub mod tcl;
pub mod xdc;

pub use pcf::parse_pcf;
pub use pdc::parse_pdc;
pub use qsf::parse_qsf;
pub use xdc::parse_xdc;
