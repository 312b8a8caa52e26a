//! Concrete moderation flows built on the wizard engine
//!
//! Each flow owns one namespace and registers its steps on a
//! [`RouterBuilder`]. Entry buttons are `purge:button:start` and
//! `roles:button:start`.

mod common;
mod purge;
mod roles;

use crate::router::{RouteError, Router, RouterBuilder};

/// Register every flow's routes on `builder`.
pub fn register_all(builder: &mut RouterBuilder) -> Result<(), RouteError> {
    purge::register(builder)?;
    roles::register(builder)?;
    Ok(())
}

/// Router with every flow registered
pub fn router() -> Result<Router, RouteError> {
    let mut builder = Router::builder();
    register_all(&mut builder)?;
    Ok(builder.build())
}
