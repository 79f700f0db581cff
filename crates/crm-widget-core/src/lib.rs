//! Session, realtime and coordination logic for the CRM chat widget.
//!
//! This crate defines the "ports" (storage, backend API, realtime transport)
//! that the infrastructure layer implements, plus the logic built on them.
//! It depends only on `crm-widget-types` -- never on `crm-widget-infra` or
//! any network/IO crate.

pub mod api;
pub mod realtime;
pub mod storage;
pub mod widget;

#[cfg(test)]
pub(crate) mod test_support;
