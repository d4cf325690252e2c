// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Analysis processing service.
//!
//! Handles the core workflow:
//! 1. Move the analysis to `processing` (rejecting concurrent runs)
//! 2. Analyze the current policy
//! 3. Compare every other document against it and rank by impact
//! 4. Cut the ranking down to the analysis tier
//! 5. Store results and mark `completed`, or mark `error` on any failure

use crate::db::MemoryDb;
use crate::error::{AppError, Result};
use crate::models::{
    Analysis, AnalysisStatus, ComparisonReport, CoverageAnalysis, Document, DocumentType,
};
use crate::services::ranking;
use crate::services::AnalystClient;

/// Runs analyses end to end.
pub struct AnalysisProcessor {
    analyst: AnalystClient,
    db: MemoryDb,
}

/// What happened when an analysis run was requested.
#[derive(Debug)]
pub enum RunOutcome {
    /// The analysis was processed by this call.
    Completed(Analysis),
    /// The analysis had already completed; stored results are returned.
    AlreadyCompleted(Analysis),
}

impl RunOutcome {
    pub fn into_analysis(self) -> Analysis {
        match self {
            RunOutcome::Completed(a) | RunOutcome::AlreadyCompleted(a) => a,
        }
    }
}

impl AnalysisProcessor {
    pub fn new(analyst: AnalystClient, db: MemoryDb) -> Self {
        Self { analyst, db }
    }

    /// Run an analysis by ID.
    pub async fn run(&self, analysis_id: u64) -> Result<RunOutcome> {
        let analysis = match self.begin(analysis_id)? {
            Begin::Started(analysis) => analysis,
            Begin::AlreadyCompleted(analysis) => {
                tracing::debug!(analysis_id, "Analysis already completed");
                return Ok(RunOutcome::AlreadyCompleted(analysis));
            }
        };

        tracing::info!(
            analysis_id,
            tier = %analysis.analysis_type,
            documents = analysis.document_ids.len(),
            "Processing analysis"
        );

        let documents = self.db.get_documents(&analysis.document_ids);
        self.set_document_status(&documents, AnalysisStatus::Processing);

        match self.process(&analysis, &documents).await {
            Ok((coverage, report)) => {
                let comparisons_shown = report.comparisons.len();
                let hidden = report.hidden_count;
                let stored = self.db.update_analysis(analysis_id, |a| {
                    a.analysis_data = Some(coverage);
                    a.comparison_data = Some(report);
                    a.status = AnalysisStatus::Completed;
                    Ok(a.clone())
                })?;
                self.set_document_status(&documents, AnalysisStatus::Completed);

                tracing::info!(
                    analysis_id,
                    comparisons_shown,
                    hidden,
                    "Analysis completed"
                );
                Ok(RunOutcome::Completed(stored))
            }
            Err(e) => {
                if e.is_ai_rate_limit() {
                    tracing::warn!(analysis_id, "Analysis failed: AI rate limit");
                } else {
                    tracing::error!(analysis_id, error = %e, "Analysis failed");
                }

                self.record_failure(analysis_id, &documents);
                Err(e)
            }
        }
    }

    /// Atomically claim the analysis for processing.
    fn begin(&self, analysis_id: u64) -> Result<Begin> {
        self.db.update_analysis(analysis_id, |a| match a.status {
            AnalysisStatus::Completed => Ok(Begin::AlreadyCompleted(a.clone())),
            AnalysisStatus::Processing => Err(AppError::Conflict(
                "Analysis is already being processed".to_string(),
            )),
            AnalysisStatus::Pending | AnalysisStatus::Error => {
                a.status = AnalysisStatus::Processing;
                Ok(Begin::Started(a.clone()))
            }
        })
    }

    async fn process(
        &self,
        analysis: &Analysis,
        documents: &[Document],
    ) -> Result<(CoverageAnalysis, ComparisonReport)> {
        let current = documents
            .iter()
            .find(|d| d.document_type == DocumentType::CurrentPolicy)
            .ok_or_else(|| AppError::BadRequest("No policy documents found".to_string()))?;

        let coverage = self.analyst.analyze_document(&current.extracted_text).await?;

        let mut comparisons = Vec::with_capacity(documents.len().saturating_sub(1));
        for other in documents.iter().filter(|d| d.id != current.id) {
            let comparison = self
                .analyst
                .compare_policies(&current.extracted_text, &other.extracted_text)
                .await?;
            let scored = ranking::score_comparison(other.id, &other.original_name, comparison);
            tracing::debug!(
                analysis_id = analysis.id,
                document_id = other.id,
                impact_score = scored.impact_score,
                "Comparison scored"
            );
            comparisons.push(scored);
        }

        let ranked = ranking::rank(comparisons);
        let report = ranking::reveal(ranked, analysis.analysis_type, documents.len());
        Ok((coverage, report))
    }

    /// Flip the analysis to `error`. No partial results are kept.
    fn record_failure(&self, analysis_id: u64, documents: &[Document]) {
        let cleared = self.db.update_analysis(analysis_id, |a| {
            a.analysis_data = None;
            a.comparison_data = None;
            a.status = AnalysisStatus::Error;
            Ok(())
        });
        if let Err(err) = cleared {
            tracing::warn!(analysis_id, error = %err, "Could not record analysis failure");
        }
        self.set_document_status(documents, AnalysisStatus::Error);
    }

    fn set_document_status(&self, documents: &[Document], status: AnalysisStatus) {
        for doc in documents {
            self.db.update_document_status(doc.id, status);
        }
    }
}

enum Begin {
    Started(Analysis),
    AlreadyCompleted(Analysis),
}
