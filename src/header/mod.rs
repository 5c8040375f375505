//! The textual header shared by ASCII and binary files.
//!
//! A header is the `SDDS<n>` banner, optional `!` comment lines (some of
//! which declare byte order or fixed row counts) and a sequence of
//! namelists ending with `&data`:
//!
//! ```text
//! SDDS5
//! ! # little-endian
//! &parameter name=Energy, units=GeV, type=double, &end
//! &column name=x, units=mm, type=double, &end
//! &data mode=binary, column_major_order=1, &end
//! ```
//!
//! [`lexer`] splits and unescapes namelists, [`namelist`] maps them onto
//! definition records through each record's field table, and [`reader`] /
//! [`writer`] handle whole headers.

pub mod lexer;
pub mod namelist;
pub mod reader;
pub mod writer;

pub use reader::read_header;
pub use writer::{render_header, write_header};
