//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls and analytics into use-case level APIs.
//! - Keep the CLI decoupled from storage details.

pub mod portfolio_service;

pub use portfolio_service::{PortfolioService, ProjectAssessment, ServiceError, ServiceResult};
