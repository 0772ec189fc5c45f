//! Registry persistence for nfo-ingest
//!
//! Issuer and invoice tables live in a shared SQLite file created by
//! `nfo_common::db::init_database`; this module holds the queries.

pub mod invoices;
pub mod issuers;

pub use invoices::{
    NewInvoice, Registration, RegistrationStore, RegistrySummary, UniqueConflict,
};
