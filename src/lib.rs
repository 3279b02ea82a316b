#![doc(html_root_url = "https://docs.rs/sapwood/0.1.0")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! A virtual node reconciler with keyed diffing, components, lifecycle hooks and failure containment.
//!
//! Build a tree with [`node`] and friends, then hand it to [`Renderer::render`] (or [`Renderer::mount`] a view
//! that is redrawn on demand). The live document is reached through a [`Host`](`host::Host`):
//! [`MemoryHost`](`mem::MemoryHost`) in-process or [`WebHost`](`web::WebHost`) in the browser.
//!
//! The crate also contains a path-template [`router`], [`tracked`] collections for asynchronous removal and
//! [`rate`] limiters.

#[cfg(doctest)]
pub mod readme {
	doc_comment::doctest!("../README.md");
}

pub mod attrs;
mod closure_map;
pub mod context;
mod diff;
pub mod error;
pub mod host;
pub mod mem;
mod patch;
pub mod rate;
mod render;
pub mod router;
mod selector;
pub mod signal;
pub mod tracked;
pub mod vnode;
pub mod web;

pub use attrs::{Attrs, Handler, Reaction, Value};
pub use context::Context;
pub use error::{Error, ViewError};
pub use render::{RenderOptions, Redraw, Renderer, Scheduler, DEFAULT_DEPTH_LIMIT};
pub use signal::{AbortController, Signal};
pub use vnode::{
	entry, fragment, gate, inline, keyed, keyed_pairs, layout, node, normalize, on_remove, retain, set_context, text, Child, Component, Init, Key, ViewCx,
	ViewResult, Vnode,
};
