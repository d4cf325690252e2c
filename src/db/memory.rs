// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store with typed operations.
//!
//! Provides high-level operations for:
//! - Users and admin users (unique email index)
//! - Documents and analyses (with expiry cleanup)
//! - Payments, discount codes and their usage
//! - Email report delivery log
//! - Anonymous insurance market data
//!
//! Each table is a `DashMap` keyed by a per-table sequence id. Updates to a
//! single record run under that record's entry lock.

use crate::error::AppError;
use crate::models::{
    AdminRole, AdminUser, Analysis, AnalysisStatus, Customer, DiscountCode, DiscountUsage,
    DiscountUsageReport, Document, EmailReport, EmailReportStatus, InsuranceData,
    InsuranceDataStats, Payment, PaymentStatus, Tier, User,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// One table: rows plus the id sequence that feeds them.
struct Table<T> {
    rows: DashMap<u64, T>,
    next_id: AtomicU64,
}

impl<T: Clone> Table<T> {
    fn new() -> Self {
        Self {
            rows: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    fn get(&self, id: u64) -> Option<T> {
        self.rows.get(&id).map(|row| row.clone())
    }

    /// Apply `f` to a row while holding its entry lock.
    fn update<R>(&self, id: u64, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.rows.get_mut(&id).map(|mut row| f(&mut row))
    }

    fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.rows
            .iter()
            .filter(|row| pred(row.value()))
            .map(|row| row.value().clone())
            .collect()
    }

    /// Remove rows matching `pred`, returning how many were removed.
    fn remove_where(&self, pred: impl Fn(&T) -> bool) -> usize {
        let before = self.rows.len();
        self.rows.retain(|_, row| !pred(row));
        before.saturating_sub(self.rows.len())
    }
}

struct Tables {
    users: Table<User>,
    user_emails: DashMap<String, u64>,
    admin_users: Table<AdminUser>,
    admin_emails: DashMap<String, u64>,
    documents: Table<Document>,
    analyses: Table<Analysis>,
    payments: Table<Payment>,
    discount_codes: Table<DiscountCode>,
    discount_code_index: DashMap<String, u64>,
    discount_usage: Table<DiscountUsage>,
    email_reports: Table<EmailReport>,
    insurance_data: Table<InsuranceData>,
}

/// Filters for the discount usage report.
#[derive(Debug, Clone, Default)]
pub struct DiscountUsageFilter {
    /// Exact code, case-insensitive
    pub code: Option<String>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

/// Records removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupStats {
    pub documents_deleted: usize,
    pub analyses_deleted: usize,
}

/// Process-local database. Cloning shares the same tables.
#[derive(Clone)]
pub struct MemoryDb {
    tables: Arc<Tables>,
}

impl Default for MemoryDb {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize an email or code for the unique indexes.
fn index_key(value: &str) -> String {
    value.trim().to_lowercase()
}

impl MemoryDb {
    pub fn new() -> Self {
        Self {
            tables: Arc::new(Tables {
                users: Table::new(),
                user_emails: DashMap::new(),
                admin_users: Table::new(),
                admin_emails: DashMap::new(),
                documents: Table::new(),
                analyses: Table::new(),
                payments: Table::new(),
                discount_codes: Table::new(),
                discount_code_index: DashMap::new(),
                discount_usage: Table::new(),
                email_reports: Table::new(),
                insurance_data: Table::new(),
            }),
        }
    }

    // ─── User Operations ─────────────────────────────────────────

    /// Create a user. Fails with `Conflict` if the email is taken.
    pub fn create_user(&self, email: &str, password_hash: String) -> Result<User, AppError> {
        let t = &self.tables;
        match t.user_emails.entry(index_key(email)) {
            Entry::Occupied(_) => Err(AppError::Conflict("Email already registered".to_string())),
            Entry::Vacant(slot) => {
                let user = User {
                    id: t.users.next_id(),
                    email: slot.key().clone(),
                    password_hash,
                    stripe_customer_id: None,
                    stripe_subscription_id: None,
                    subscription_tier: Tier::Free,
                    subscription_expires_at: None,
                    created_at: Utc::now(),
                };
                t.users.rows.insert(user.id, user.clone());
                slot.insert(user.id);
                Ok(user)
            }
        }
    }

    pub fn get_user(&self, id: u64) -> Option<User> {
        self.tables.users.get(id)
    }

    pub fn get_user_by_email(&self, email: &str) -> Option<User> {
        let id = *self.tables.user_emails.get(&index_key(email))?;
        self.get_user(id)
    }

    /// Set a user's subscription tier and expiry.
    pub fn update_user_subscription(
        &self,
        id: u64,
        tier: Tier,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<User, AppError> {
        self.tables
            .users
            .update(id, |user| {
                user.subscription_tier = tier;
                user.subscription_expires_at = expires_at;
                user.clone()
            })
            .ok_or_else(|| AppError::NotFound(format!("User {}", id)))
    }

    // ─── Admin Operations ────────────────────────────────────────

    /// Create an admin account. Fails with `Conflict` if the email is taken.
    pub fn create_admin_user(
        &self,
        email: &str,
        password_hash: String,
        name: &str,
        role: AdminRole,
    ) -> Result<AdminUser, AppError> {
        let t = &self.tables;
        match t.admin_emails.entry(index_key(email)) {
            Entry::Occupied(_) => Err(AppError::Conflict("Admin already exists".to_string())),
            Entry::Vacant(slot) => {
                let admin = AdminUser {
                    id: t.admin_users.next_id(),
                    email: slot.key().clone(),
                    password_hash,
                    name: name.to_string(),
                    role,
                    last_login_at: None,
                    reset_token: None,
                    reset_token_expires_at: None,
                    created_at: Utc::now(),
                    is_active: true,
                };
                t.admin_users.rows.insert(admin.id, admin.clone());
                slot.insert(admin.id);
                Ok(admin)
            }
        }
    }

    pub fn get_admin_user(&self, id: u64) -> Option<AdminUser> {
        self.tables.admin_users.get(id)
    }

    pub fn get_admin_user_by_email(&self, email: &str) -> Option<AdminUser> {
        let id = *self.tables.admin_emails.get(&index_key(email))?;
        self.get_admin_user(id)
    }

    pub fn update_admin_last_login(&self, id: u64, at: DateTime<Utc>) {
        self.tables.admin_users.update(id, |admin| {
            admin.last_login_at = Some(at);
        });
    }

    /// Store a password reset token for an admin.
    pub fn set_admin_reset_token(&self, id: u64, token: String, expires_at: DateTime<Utc>) {
        self.tables.admin_users.update(id, |admin| {
            admin.reset_token = Some(token);
            admin.reset_token_expires_at = Some(expires_at);
        });
    }

    /// Find the active admin holding an unexpired `token`.
    pub fn get_admin_by_reset_token(&self, token: &str, now: DateTime<Utc>) -> Option<AdminUser> {
        self.tables
            .admin_users
            .filter(|admin| admin.is_active && admin.reset_token_valid(token, now))
            .into_iter()
            .next()
    }

    /// Replace an admin's password and clear any reset token.
    pub fn update_admin_password(&self, id: u64, password_hash: String) -> Result<(), AppError> {
        self.tables
            .admin_users
            .update(id, |admin| {
                admin.password_hash = password_hash;
                admin.reset_token = None;
                admin.reset_token_expires_at = None;
            })
            .ok_or_else(|| AppError::NotFound(format!("Admin {}", id)))
    }

    // ─── Document Operations ─────────────────────────────────────

    /// Insert a document, assigning its id.
    pub fn create_document(&self, mut document: Document) -> Document {
        document.id = self.tables.documents.next_id();
        self.tables
            .documents
            .rows
            .insert(document.id, document.clone());
        document
    }

    pub fn get_document(&self, id: u64) -> Option<Document> {
        self.tables.documents.get(id)
    }

    /// Fetch documents in the order of `ids`, skipping missing ones.
    pub fn get_documents(&self, ids: &[u64]) -> Vec<Document> {
        ids.iter()
            .filter_map(|id| self.tables.documents.get(*id))
            .collect()
    }

    pub fn get_documents_by_session(&self, session_id: &str) -> Vec<Document> {
        let mut docs = self
            .tables
            .documents
            .filter(|doc| doc.session_id == session_id);
        docs.sort_by_key(|doc| doc.id);
        docs
    }

    pub fn update_document_status(&self, id: u64, status: AnalysisStatus) {
        self.tables.documents.update(id, |doc| {
            doc.analysis_status = status;
        });
    }

    /// Delete documents whose retention has passed.
    pub fn delete_expired_documents(&self, now: DateTime<Utc>) -> usize {
        self.tables
            .documents
            .remove_where(|doc| doc.expires_at.is_some_and(|exp| exp <= now))
    }

    // ─── Analysis Operations ─────────────────────────────────────

    /// Insert an analysis, assigning its id.
    pub fn create_analysis(&self, mut analysis: Analysis) -> Analysis {
        analysis.id = self.tables.analyses.next_id();
        self.tables
            .analyses
            .rows
            .insert(analysis.id, analysis.clone());
        analysis
    }

    pub fn get_analysis(&self, id: u64) -> Option<Analysis> {
        self.tables.analyses.get(id)
    }

    /// Analyses owned by a user, newest first.
    pub fn get_analyses_by_user(&self, user_id: u64) -> Vec<Analysis> {
        let mut analyses = self
            .tables
            .analyses
            .filter(|a| a.user_id == Some(user_id));
        analyses.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        analyses
    }

    /// Read-modify-write an analysis under its entry lock.
    ///
    /// Returns `NotFound` if the analysis does not exist, otherwise whatever
    /// `f` returns.
    pub fn update_analysis<R>(
        &self,
        id: u64,
        f: impl FnOnce(&mut Analysis) -> Result<R, AppError>,
    ) -> Result<R, AppError> {
        self.tables
            .analyses
            .update(id, f)
            .unwrap_or_else(|| Err(AppError::NotFound(format!("Analysis {}", id))))
    }

    /// Delete analyses whose retention has passed.
    pub fn delete_expired_analyses(&self, now: DateTime<Utc>) -> usize {
        self.tables
            .analyses
            .remove_where(|a| a.expires_at.is_some_and(|exp| exp <= now))
    }

    /// Delete every document and analysis whose retention has passed.
    pub fn cleanup_expired(&self, now: DateTime<Utc>) -> CleanupStats {
        CleanupStats {
            documents_deleted: self.delete_expired_documents(now),
            analyses_deleted: self.delete_expired_analyses(now),
        }
    }

    /// Customers grouped by session, most recent activity first.
    pub fn customer_summaries(&self) -> Vec<Customer> {
        let mut by_session: HashMap<String, Customer> = HashMap::new();

        for analysis in self.tables.analyses.filter(|_| true) {
            let entry = by_session
                .entry(analysis.session_id.clone())
                .or_insert_with(|| Customer {
                    session_id: analysis.session_id.clone(),
                    email: format!("{}@customer.assurly.io", analysis.session_id),
                    analyses_count: 0,
                    policies_uploaded: 0,
                    last_analysis: analysis.created_at,
                });

            entry.analyses_count += 1;
            entry.policies_uploaded += analysis.document_ids.len();
            if analysis.created_at > entry.last_analysis {
                entry.last_analysis = analysis.created_at;
            }
            if let Some(user) = analysis.user_id.and_then(|id| self.get_user(id)) {
                entry.email = user.email;
            }
        }

        let mut customers: Vec<Customer> = by_session.into_values().collect();
        customers.sort_by(|a, b| b.last_analysis.cmp(&a.last_analysis));
        customers
    }

    // ─── Payment Operations ──────────────────────────────────────

    /// Insert a payment, assigning its id.
    pub fn create_payment(&self, mut payment: Payment) -> Payment {
        payment.id = self.tables.payments.next_id();
        self.tables
            .payments
            .rows
            .insert(payment.id, payment.clone());
        payment
    }

    pub fn get_payment_by_intent(&self, intent_id: &str) -> Option<Payment> {
        self.tables
            .payments
            .filter(|p| p.stripe_payment_intent_id == intent_id)
            .into_iter()
            .next()
    }

    /// Set a payment's status, returning the updated payment and its
    /// previous status.
    pub fn update_payment_status(
        &self,
        intent_id: &str,
        status: PaymentStatus,
    ) -> Option<(Payment, PaymentStatus)> {
        let id = self.get_payment_by_intent(intent_id)?.id;
        self.tables.payments.update(id, |payment| {
            let previous = payment.status;
            payment.status = status;
            (payment.clone(), previous)
        })
    }

    /// Mark a payment failed unless it has already succeeded. The check
    /// and the write happen under the same row lock. Returns the payment
    /// and whether it changed.
    pub fn mark_payment_failed(&self, intent_id: &str) -> Option<(Payment, bool)> {
        let id = self.get_payment_by_intent(intent_id)?.id;
        self.tables.payments.update(id, |payment| {
            if payment.status == PaymentStatus::Succeeded {
                return (payment.clone(), false);
            }
            payment.status = PaymentStatus::Failed;
            (payment.clone(), true)
        })
    }

    /// Whether a succeeded payment for this tier exists for the analysis.
    pub fn has_succeeded_payment_for_analysis(&self, analysis_id: u64, tier: Tier) -> bool {
        self.tables.payments.rows.iter().any(|p| {
            p.analysis_id == Some(analysis_id)
                && p.analysis_type == tier
                && p.status == PaymentStatus::Succeeded
        })
    }

    // ─── Discount Code Operations ────────────────────────────────

    /// Create a discount code. Codes are stored uppercase and are unique
    /// regardless of case.
    pub fn create_discount_code(
        &self,
        code: &str,
        discount_percentage: f64,
        description: Option<String>,
        created_by: Option<u64>,
    ) -> Result<DiscountCode, AppError> {
        let t = &self.tables;
        match t.discount_code_index.entry(index_key(code)) {
            Entry::Occupied(_) => Err(AppError::Conflict(format!(
                "Discount code {} already exists",
                code.trim().to_uppercase()
            ))),
            Entry::Vacant(slot) => {
                let discount = DiscountCode {
                    id: t.discount_codes.next_id(),
                    code: code.trim().to_uppercase(),
                    discount_percentage,
                    is_active: true,
                    description,
                    created_at: Utc::now(),
                    created_by,
                };
                t.discount_codes.rows.insert(discount.id, discount.clone());
                slot.insert(discount.id);
                Ok(discount)
            }
        }
    }

    pub fn get_discount_code(&self, id: u64) -> Option<DiscountCode> {
        self.tables.discount_codes.get(id)
    }

    pub fn get_discount_code_by_code(&self, code: &str) -> Option<DiscountCode> {
        let id = *self.tables.discount_code_index.get(&index_key(code))?;
        self.get_discount_code(id)
    }

    /// All discount codes, newest first.
    pub fn list_discount_codes(&self) -> Vec<DiscountCode> {
        let mut codes = self.tables.discount_codes.filter(|_| true);
        codes.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        codes
    }

    pub fn set_discount_code_active(
        &self,
        id: u64,
        is_active: bool,
    ) -> Result<DiscountCode, AppError> {
        self.tables
            .discount_codes
            .update(id, |code| {
                code.is_active = is_active;
                code.clone()
            })
            .ok_or_else(|| AppError::NotFound(format!("Discount code {}", id)))
    }

    pub fn delete_discount_code(&self, id: u64) -> Result<(), AppError> {
        let (_, code) = self
            .tables
            .discount_codes
            .rows
            .remove(&id)
            .ok_or_else(|| AppError::NotFound(format!("Discount code {}", id)))?;
        self.tables
            .discount_code_index
            .remove(&index_key(&code.code));
        Ok(())
    }

    /// Record a redemption, assigning its id.
    pub fn record_discount_usage(&self, mut usage: DiscountUsage) -> DiscountUsage {
        usage.id = self.tables.discount_usage.next_id();
        self.tables
            .discount_usage
            .rows
            .insert(usage.id, usage.clone());
        usage
    }

    /// Usage rows joined with their code, newest first.
    pub fn discount_usage_report(&self, filter: &DiscountUsageFilter) -> Vec<DiscountUsageReport> {
        let wanted_code = filter.code.as_deref().map(index_key);

        let mut rows: Vec<DiscountUsageReport> = self
            .tables
            .discount_usage
            .filter(|usage| {
                filter.start.map_or(true, |start| start <= usage.used_at)
                    && filter.end.map_or(true, |end| usage.used_at <= end)
            })
            .into_iter()
            .filter_map(|usage| {
                // Usage of a deleted code is reported without its code.
                let code = self.get_discount_code(usage.discount_code_id);
                let code_str = code.as_ref().map(|c| c.code.clone()).unwrap_or_default();
                if let Some(wanted) = &wanted_code {
                    if index_key(&code_str) != *wanted {
                        return None;
                    }
                }
                Some(DiscountUsageReport {
                    usage,
                    code: code_str,
                    description: code.and_then(|c| c.description),
                })
            })
            .collect();

        rows.sort_by(|a, b| b.usage.used_at.cmp(&a.usage.used_at));
        rows
    }

    // ─── Email Report Operations ─────────────────────────────────

    pub fn create_email_report(&self, analysis_id: u64, email: &str) -> EmailReport {
        let report = EmailReport {
            id: self.tables.email_reports.next_id(),
            analysis_id,
            email: email.to_string(),
            status: EmailReportStatus::Pending,
            sent_at: None,
            created_at: Utc::now(),
        };
        self.tables
            .email_reports
            .rows
            .insert(report.id, report.clone());
        report
    }

    pub fn update_email_report_status(&self, id: u64, status: EmailReportStatus) {
        self.tables.email_reports.update(id, |report| {
            report.status = status;
            if status == EmailReportStatus::Sent {
                report.sent_at = Some(Utc::now());
            }
        });
    }

    pub fn get_email_reports_for_analysis(&self, analysis_id: u64) -> Vec<EmailReport> {
        let mut reports = self
            .tables
            .email_reports
            .filter(|r| r.analysis_id == analysis_id);
        reports.sort_by_key(|r| r.id);
        reports
    }

    // ─── Insurance Data Operations ───────────────────────────────

    /// Insert an anonymous data point, assigning its id.
    pub fn create_insurance_data(&self, mut data: InsuranceData) -> InsuranceData {
        data.id = self.tables.insurance_data.next_id();
        self.tables
            .insurance_data
            .rows
            .insert(data.id, data.clone());
        data
    }

    pub fn insurance_data_by_postcode(&self, postcode: &str) -> Vec<InsuranceData> {
        self.sorted_insurance_data(|d| d.postcode == postcode)
    }

    pub fn insurance_data_by_type(&self, insurance_type: &str) -> Vec<InsuranceData> {
        self.sorted_insurance_data(|d| d.insurance_type == insurance_type)
    }

    /// Premium statistics, optionally narrowed by postcode and type.
    pub fn insurance_data_stats(
        &self,
        postcode: Option<&str>,
        insurance_type: Option<&str>,
    ) -> InsuranceDataStats {
        let rows = self.tables.insurance_data.filter(|d| {
            postcode.map_or(true, |p| p == d.postcode)
                && insurance_type.map_or(true, |t| t == d.insurance_type)
        });
        InsuranceDataStats::from_premiums(rows.iter().filter_map(|d| d.annual_premium))
    }

    fn sorted_insurance_data(&self, pred: impl Fn(&InsuranceData) -> bool) -> Vec<InsuranceData> {
        let mut rows = self.tables.insurance_data.filter(pred);
        rows.sort_by(|a, b| b.collected_at.cmp(&a.collected_at).then(b.id.cmp(&a.id)));
        rows
    }
}
