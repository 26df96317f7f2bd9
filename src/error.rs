//! Module containing all error types.

use thiserror::Error;

/// Errors that can be returned while building or querying an [`crate::EcEngine`].
///
/// Internal invariant violations (a computed overlap turning out empty when a prior intersection
/// test reported non-empty, a negative volume, a cycle in the difference-of-cubes DAG) are
/// programmer errors and are not represented here: they are asserted against directly instead.
#[derive(Debug, Error)]
pub enum EcError {
    /// A topology edge or interface ACL referenced a router that was never declared.
    #[error("Router not found: {0}")]
    UnknownRouter(String),
    /// A FIB row referenced an interface that does not exist on its router.
    #[error("Interface {1} not found on router {0}")]
    UnknownInterface(String, String),
    /// An ACL was attached twice (same direction) to the same interface.
    #[error("Interface {0}:{1} already has a {2:?} ACL")]
    DuplicateAcl(String, String, crate::graph::AclDirection),
}
