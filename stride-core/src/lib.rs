#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, rust_2018_idioms)]
#![deny(unreachable_pub)]

//! stride-core

pub mod code;
pub mod common;
pub mod email;
pub mod flow;
