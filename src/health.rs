//! Health check system for basketrec
//!
//! Provides diagnostics for a deployed catalog:
//! - Database file, integrity and schema
//! - Catalog statistics
//! - Content model artifact freshness
//! - Demographic coverage for clustering

use crate::config::ServiceConfig;
use crate::engine::{ArtifactStatus, ContentModelStore, CONTENT_ARTIFACT};
use crate::error::Result;
use crate::storage::sqlite::{SqliteCatalog, REQUIRED_TABLES};
use crate::storage::CatalogStore;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Health check status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Pass,
    Warn,
    Fail,
}

impl CheckStatus {
    /// Process exit code for the doctor command
    pub fn exit_code(self) -> i32 {
        match self {
            CheckStatus::Pass => 0,
            CheckStatus::Warn => 1,
            CheckStatus::Fail => 2,
        }
    }
}

/// Individual health check result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckResult {
    pub name: String,
    pub status: CheckStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl CheckResult {
    pub fn pass(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Pass, message)
    }

    pub fn warn(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Warn, message)
    }

    pub fn fail(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(name, CheckStatus::Fail, message)
    }

    fn new(name: impl Into<String>, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

/// Overall health check summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthSummary {
    pub status: CheckStatus,
    pub checks: Vec<CheckResult>,
    pub summary: HealthStats,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStats {
    pub total_checks: usize,
    pub passed: usize,
    pub warnings: usize,
    pub errors: usize,
}

impl HealthSummary {
    pub fn from_checks(checks: Vec<CheckResult>) -> Self {
        let count = |status| checks.iter().filter(|c| c.status == status).count();
        let passed = count(CheckStatus::Pass);
        let warnings = count(CheckStatus::Warn);
        let errors = count(CheckStatus::Fail);

        let status = if errors > 0 {
            CheckStatus::Fail
        } else if warnings > 0 {
            CheckStatus::Warn
        } else {
            CheckStatus::Pass
        };

        Self {
            status,
            summary: HealthStats {
                total_checks: checks.len(),
                passed,
                warnings,
                errors,
            },
            checks,
        }
    }
}

/// Run all health checks
///
/// A missing database file fails immediately; the doctor never creates one.
pub async fn run_health_checks(
    db_path: &Path,
    artifact_dir: &Path,
    config: &ServiceConfig,
) -> Result<HealthSummary> {
    info!("Starting basketrec health checks...");

    if !db_path.exists() {
        return Ok(HealthSummary::from_checks(vec![CheckResult::fail(
            "database_exists",
            format!("Database file not found: {}", db_path.display()),
        )]));
    }

    let mut checks = vec![CheckResult::pass(
        "database_exists",
        format!("Database file exists: {}", db_path.display()),
    )];

    let catalog = SqliteCatalog::open_existing(db_path)?;

    // Phase 1: Database Health (CRITICAL)
    checks.push(check_integrity(&catalog).await);

    // Phase 2: Schema Validation (HIGH)
    checks.extend(check_schema(&catalog).await);

    // Phase 3: Catalog Statistics (MEDIUM)
    checks.extend(check_catalog_statistics(&catalog).await);

    // Phase 4: Content Model (MEDIUM)
    checks.push(check_content_artifact(&catalog, artifact_dir).await);

    // Phase 5: Demographics (LOW)
    checks.push(check_demographic_coverage(&catalog, config).await);

    Ok(HealthSummary::from_checks(checks))
}

async fn check_integrity(catalog: &SqliteCatalog) -> CheckResult {
    debug!("Checking database integrity...");
    match catalog.check_integrity().await {
        Ok(true) => CheckResult::pass("database_integrity", "Database integrity check passed"),
        Ok(false) => CheckResult::fail(
            "database_integrity",
            "Database integrity check failed - database may be corrupted",
        ),
        Err(e) => CheckResult::fail("database_integrity", "Failed to check database integrity")
            .with_details(serde_json::json!({ "error": e.to_string() })),
    }
}

async fn check_schema(catalog: &SqliteCatalog) -> Vec<CheckResult> {
    debug!("Checking schema...");
    let mut results = Vec::new();
    for table in REQUIRED_TABLES {
        let name = format!("table_{}", table);
        results.push(match catalog.table_exists(table).await {
            Ok(true) => CheckResult::pass(name, format!("Table '{}' exists", table)),
            Ok(false) => CheckResult::fail(name, format!("Required table '{}' not found", table)),
            Err(e) => CheckResult::fail(name, format!("Failed to check table '{}'", table))
                .with_details(serde_json::json!({ "error": e.to_string() })),
        });
    }
    results
}

async fn check_catalog_statistics(catalog: &SqliteCatalog) -> Vec<CheckResult> {
    debug!("Checking catalog statistics...");
    let stats = match catalog.stats().await {
        Ok(stats) => stats,
        Err(e) => {
            return vec![CheckResult::fail("catalog_stats", "Failed to count catalog rows")
                .with_details(serde_json::json!({ "error": e.to_string() }))]
        }
    };

    let mut results = vec![CheckResult::pass(
        "catalog_stats",
        format!(
            "{} users, {} products, {} events",
            stats.users, stats.products, stats.events
        ),
    )
    .with_details(serde_json::json!(stats))];

    if stats.products == 0 {
        results.push(CheckResult::warn(
            "catalog_products",
            "No products found - seed the catalog before serving",
        ));
    }
    if stats.events == 0 {
        results.push(CheckResult::warn(
            "catalog_events",
            "No events found - collaborative signals will be empty",
        ));
    }
    results
}

async fn check_content_artifact(catalog: &SqliteCatalog, artifact_dir: &Path) -> CheckResult {
    debug!("Checking content model artifact...");
    let artifact_path = artifact_dir.join(CONTENT_ARTIFACT);
    let path = artifact_path.display().to_string();

    // Opening the store creates its directory
    let status = if artifact_path.exists() {
        let loaded = async {
            let products = catalog.list_products().await?;
            let content = ContentModelStore::open(artifact_dir).await?;
            Ok::<_, crate::error::RecommendError>(content.artifact_status(&products).await)
        };
        match loaded.await {
            Ok(status) => status,
            Err(e) => {
                return CheckResult::fail("content_model", "Failed to inspect content model")
                    .with_details(serde_json::json!({ "error": e.to_string() }))
            }
        }
    } else {
        ArtifactStatus::Missing
    };

    let details = serde_json::json!(status);
    match status {
        ArtifactStatus::InSync { products } => CheckResult::pass(
            "content_model",
            format!("Content model in sync ({} products)", products),
        ),
        ArtifactStatus::Stale { indexed, catalog } => CheckResult::warn(
            "content_model",
            format!(
                "Content model indexes {} products but the catalog has {} - run `basketrec retrain`",
                indexed, catalog
            ),
        ),
        ArtifactStatus::Missing => CheckResult::warn(
            "content_model",
            format!("No content model at {} - run `basketrec retrain`", path),
        ),
        ArtifactStatus::Corrupt { .. } => CheckResult::fail(
            "content_model",
            format!("Content model at {} is unreadable", path),
        ),
    }
    .with_details(details)
}

async fn check_demographic_coverage(catalog: &SqliteCatalog, config: &ServiceConfig) -> CheckResult {
    debug!("Checking demographic coverage...");
    let users = match catalog.list_users().await {
        Ok(users) => users,
        Err(e) => {
            return CheckResult::fail("demographics", "Failed to list users")
                .with_details(serde_json::json!({ "error": e.to_string() }))
        }
    };

    let with_demographics = users.iter().filter(|u| u.has_demographics()).count();
    let k = config.models.clustering.clusters;
    let details = serde_json::json!({
        "users": users.len(),
        "with_demographics": with_demographics,
        "clusters": k,
    });

    if with_demographics < k {
        CheckResult::warn(
            "demographics",
            format!(
                "Only {} users have age, weight or height; clustering wants at least {}",
                with_demographics, k
            ),
        )
        .with_details(details)
    } else {
        CheckResult::pass(
            "demographics",
            format!("{} of {} users have demographics", with_demographics, users.len()),
        )
        .with_details(details)
    }
}

/// Print a human-readable summary
pub fn print_health_summary(summary: &HealthSummary, verbose: bool) {
    println!("Basketrec Health Check");
    println!("----------------------");
    println!();

    for check in &summary.checks {
        let (icon, status_text) = match check.status {
            CheckStatus::Pass => ("✓", "PASS"),
            CheckStatus::Warn => ("!", "WARN"),
            CheckStatus::Fail => ("✗", "FAIL"),
        };

        println!("{} {} - {}", icon, check.name, status_text);

        if verbose || check.status != CheckStatus::Pass {
            println!("   {}", check.message);
            if let (true, Some(details)) = (verbose, &check.details) {
                println!("   Details: {}", details);
            }
        }
    }

    println!();
    println!(
        "Overall: {} ({} passed, {} warnings, {} errors)",
        match summary.status {
            CheckStatus::Pass => "HEALTHY",
            CheckStatus::Warn => "WARNINGS",
            CheckStatus::Fail => "ERRORS",
        },
        summary.summary.passed,
        summary.summary.warnings,
        summary.summary.errors
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Event, EventType, ObjectId, Product, User, UserId};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_database_fails_without_creating_it() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("absent.db");

        let summary = run_health_checks(&db_path, temp.path(), &ServiceConfig::default())
            .await
            .unwrap();
        assert_eq!(summary.status, CheckStatus::Fail);
        assert_eq!(summary.status.exit_code(), 2);
        assert!(!db_path.exists());
    }

    #[tokio::test]
    async fn test_foreign_database_reports_missing_tables() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("other.db");
        let conn = rusqlite::Connection::open(&db_path).unwrap();
        conn.execute_batch("CREATE TABLE users (userid TEXT PRIMARY KEY);")
            .unwrap();
        drop(conn);

        let summary = run_health_checks(&db_path, temp.path(), &ServiceConfig::default())
            .await
            .unwrap();
        assert_eq!(summary.status, CheckStatus::Fail);
        let failed: Vec<&str> = summary
            .checks
            .iter()
            .filter(|c| c.status == CheckStatus::Fail)
            .map(|c| c.name.as_str())
            .collect();
        assert!(failed.contains(&"table_products"));
        assert!(!failed.contains(&"table_users"));
    }

    #[tokio::test]
    async fn test_empty_catalog_warns() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("catalog.db");
        SqliteCatalog::open(&db_path).await.unwrap();

        let summary = run_health_checks(&db_path, &temp.path().join("models"), &ServiceConfig::default())
            .await
            .unwrap();
        assert_eq!(summary.status, CheckStatus::Warn);
        assert!(summary
            .checks
            .iter()
            .any(|c| c.name == "catalog_products" && c.status == CheckStatus::Warn));
        assert!(summary
            .checks
            .iter()
            .any(|c| c.name == "content_model" && c.status == CheckStatus::Warn));
        // The doctor only reads, so no artifact directory appears
        assert!(!temp.path().join("models").exists());
    }

    #[tokio::test]
    async fn test_healthy_catalog_passes() {
        let temp = TempDir::new().unwrap();
        let db_path = temp.path().join("catalog.db");
        let artifact_dir = temp.path().join("models");
        let catalog = SqliteCatalog::open(&db_path).await.unwrap();

        let product = ObjectId::parse("65f1a2b3c4d5e6f7a8b9c0d1").unwrap();
        catalog.upsert_product(&Product::new(product.clone(), "Oats")).await.unwrap();
        let mut config = ServiceConfig::default();
        config.models.clustering.clusters = 1;
        let mut user = User::new(UserId::parse("alice").unwrap());
        user.age = Some(30.0);
        catalog.upsert_user(&user).await.unwrap();
        catalog
            .insert_event(&Event::new(user.id.clone(), product, EventType::View, 1.0))
            .await
            .unwrap();

        let content = ContentModelStore::open(&artifact_dir).await.unwrap();
        content.retrain_if_changed(&catalog, false).await.unwrap();

        let summary = run_health_checks(&db_path, &artifact_dir, &config).await.unwrap();
        assert_eq!(summary.status, CheckStatus::Pass, "{:?}", summary.checks);
        assert_eq!(summary.summary.errors, 0);
    }
}
