//! # certinstall
//!
//! Installs a new SSL/TLS server certificate, supplied as a PKCS#12 bundle,
//! into the directory server and/or the web server of an
//! identity-management deployment. The heavy lifting (PKCS#12 validation,
//! certificate database manipulation, renewal tracking) is delegated to the
//! platform NSS and certmonger tools; this crate orchestrates the swap with
//! validate-before-mutate ordering and consistent bookkeeping.

pub mod certdb;
pub mod common;
pub mod context;
pub mod directive;
pub mod directory;
pub mod installer;
pub mod request;
