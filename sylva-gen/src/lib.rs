//! Copyright (c) 2005–2025 IKH Software, Inc.
//!
//! Released under the terms of the GNU Lesser General Public License, version 3.0
//! or (at your option) any later version (LGPL-3.0-or-later).
//!
//! Grammar table compiler for the `sylva` parsing runtime.
//!
//! A grammar is written in Rust with the combinators of [`grammar`] and
//! compiled ahead of time, usually from a `build.rs`:
//!  * **normalization**: rules are split into terminals and flat productions,
//!    repetitions become hidden helper rules;
//!  * **SLR(1) construction**: LR(0) item sets with FIRST/FOLLOW lookaheads;
//!  * **conflicts**: precedence and associativity settle what they can, the
//!    rest stays in the table for the GLR runtime to fork on.
//!
//! ```no_run
//! use sylva_gen::grammar::*;
//!
//! let g = Grammar::new("sum")
//!     .rule("source", repeat(sym("num")))
//!     .rule("num", pattern("[0-9]+"));
//! let out = std::env::var("OUT_DIR").unwrap();
//! sylva_gen::write_table(&g, format!("{out}/sum.bin")).unwrap();
//! ```

mod compile;
pub mod grammar;
mod lr;
mod prepare;

pub use compile::{build, compile, write_table};
pub use grammar::{Grammar, Rule};
