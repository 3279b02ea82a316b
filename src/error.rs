use crate::{host::HostError, router::RouteError, vnode::Key};

/// Error returned by user view code: component bodies, inline views and hooks.
pub type ViewError = Box<dyn std::error::Error>;

/// Everything that can go wrong while building or reconciling a tree.
///
/// Usage errors and structural violations are [fatal](`Error::is_fatal`) and always reach the caller of
/// [`Renderer::render`](`crate::Renderer::render`). Attribute and view errors are contained to their subtree
/// unless [`RenderOptions::remove_on_throw`](`crate::RenderOptions::remove_on_throw`) is set.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("invalid selector {0:?}")]
	Selector(String),
	#[error("the render target overlaps a region that is currently being rendered")]
	Locked,
	#[error("duplicate key {0} in keyed group")]
	DuplicateKey(Key),
	#[error("vnode was already committed by a previous render and cannot be reused")]
	NodeReused,
	#[error("attributes of <{0}> were reused across renders; attribute sets must be fresh snapshots")]
	AttrsReused(String),
	#[error("reconciliation depth limit of {0} reached")]
	DepthLimit(usize),
	#[error("failed to apply attribute {name:?}: {source}")]
	Attribute { name: String, source: HostError },
	#[error("host operation failed: {0}")]
	Host(#[from] HostError),
	#[error("view failed: {0}")]
	View(#[source] ViewError),
	#[error(transparent)]
	Route(#[from] RouteError),
}

impl Error {
	/// Whether this error indicates a caller bug rather than a runtime condition.
	///
	/// Fatal errors propagate regardless of error policy.
	#[must_use]
	pub fn is_fatal(&self) -> bool {
		match self {
			Error::Selector(_) | Error::Locked | Error::DuplicateKey(_) | Error::NodeReused | Error::AttrsReused(_) | Error::DepthLimit(_) | Error::Route(_) => true,
			Error::Attribute { .. } | Error::Host(_) => false,
			Error::View(inner) => inner.downcast_ref::<Error>().map_or(false, Error::is_fatal),
		}
	}
}
