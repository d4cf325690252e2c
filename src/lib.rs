// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Assurly: insurance document analysis
//!
//! This crate provides the backend API for uploading insurance policies,
//! running AI coverage analyses and competitor comparisons, and selling
//! tiered access to the results.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::MemoryDb;
use models::AdminRole;
use services::{AnalysisProcessor, AnalystClient, Mailer, StripeClient};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: MemoryDb,
    pub analyst: AnalystClient,
    pub stripe: StripeClient,
    pub mailer: Mailer,
}

impl AppState {
    /// Build state and the outbound API clients from `config`.
    pub fn new(config: Config, db: MemoryDb) -> Self {
        Self {
            analyst: AnalystClient::new(&config),
            stripe: StripeClient::new(&config),
            mailer: Mailer::new(&config),
            config,
            db,
        }
    }

    pub fn analysis_processor(&self) -> AnalysisProcessor {
        AnalysisProcessor::new(self.analyst.clone(), self.db.clone())
    }

    /// Create the configured bootstrap admin if it does not exist yet.
    ///
    /// Returns whether an admin was created.
    pub fn bootstrap_admin(&self) -> anyhow::Result<bool> {
        let (Some(email), Some(password)) = (&self.config.admin_email, &self.config.admin_password)
        else {
            return Ok(false);
        };

        if self.db.get_admin_user_by_email(email).is_some() {
            return Ok(false);
        }

        let password_hash = services::password::hash_password(password)?;
        self.db.create_admin_user(
            email,
            password_hash,
            &self.config.admin_name,
            AdminRole::SuperAdmin,
        )?;
        Ok(true)
    }
}
