//! Stateless wizard engine for chat-platform moderation flows
//!
//! Every multi-step interaction carries its whole state inside the control
//! tokens it renders. The engine decodes a clicked token, routes it to a step
//! handler, and for bulk actions plans, guards and executes the work against
//! collaborator traits supplied by the platform adapter.

pub mod adapter;
pub mod config;
pub mod error;
pub mod execute;
pub mod flows;
pub mod guard;
pub mod pagination;
pub mod plan;
pub mod resource;
pub mod router;
pub mod token;
pub mod wizard;
