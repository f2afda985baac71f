#![doc = "conductdoc-core: extraction, caching and generation pipeline for conductdoc."]

//! This crate holds everything that does not depend on a concrete network
//! backend, template engine or HTTP surface. Those live in the `conductdoc`
//! binary crate and plug in through the traits in [`contract`].
//!
//! # Usage
//! Build a [`generate::Generator`] from implementations of the [`contract`]
//! traits and call [`generate::Generator::generate`] with a repository URL.

pub mod acquire;
pub mod architecture;
pub mod cache;
pub mod config;
pub mod contract;
pub mod discover;
pub mod extract;
pub mod generate;
pub mod model;
pub mod prompts;
