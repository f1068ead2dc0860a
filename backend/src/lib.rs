//! Core decision engine of the leave management system.
//!
//! The crate is consumed as a library by thin controllers: they open a
//! [`repositories::UnitOfWork`], call the engines with its connection, and
//! commit on success. Engines enforce the domain rules, repositories are
//! typed CRUD that audit every mutation, and the error taxonomy maps onto
//! HTTP at the boundary.

pub mod config;
pub mod db;
pub mod engines;
pub mod error;
pub mod logging;
pub mod models;
pub mod repositories;
pub mod types;
