use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::cli::Role;
use crate::client::ClientReport;
use crate::session::{SessionEnd, SessionSummary};
use crate::utils::{format_duration, format_message_rate, messages_per_second};

/// Outcome of one stress session, as written to the JSON report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    pub role: Role,
    /// Deliveries requested; the client does not know this and reports none
    pub target_count: Option<u32>,
    /// `deliver_sm` written (server) or received (client)
    pub deliveries: u32,
    /// `deliver_sm_resp` received; server only
    pub responses: Option<u32>,
    pub unbind_sent: bool,
    pub end: SessionEnd,
    pub elapsed: Duration,
    pub messages_per_second: f64,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl SessionReport {
    /// Report for the flooding side
    pub fn from_summary(summary: &SessionSummary, target_count: u32) -> Self {
        Self {
            role: Role::Server,
            target_count: Some(target_count),
            deliveries: summary.sent,
            responses: Some(summary.responses),
            unbind_sent: summary.unbind_sent,
            end: summary.end,
            elapsed: summary.elapsed,
            messages_per_second: messages_per_second(summary.sent, summary.elapsed),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Report for the acknowledging side
    pub fn from_client(report: &ClientReport) -> Self {
        Self {
            role: Role::Client,
            target_count: None,
            deliveries: report.delivered,
            responses: None,
            unbind_sent: report.unbind_sent,
            end: report.end,
            elapsed: report.elapsed,
            messages_per_second: messages_per_second(report.delivered, report.elapsed),
            timestamp: chrono::Utc::now(),
        }
    }

    /// Print the human-readable figures
    pub fn log_summary(&self) {
        info!("{} session ended: {:?}", self.role, self.end);
        match self.target_count {
            Some(target) => info!("  Deliveries: {} of {}", self.deliveries, target),
            None => info!("  Deliveries: {}", self.deliveries),
        }
        if let Some(responses) = self.responses {
            info!("  Responses:  {}", responses);
        }
        info!("  Elapsed:    {}", format_duration(self.elapsed));
        info!("  Rate:       {}", format_message_rate(self.messages_per_second));
    }
}

/// Collects session reports and writes them out as one JSON document
pub struct ResultsManager {
    output_file: PathBuf,
    reports: Vec<SessionReport>,
}

/// Top-level JSON document
#[derive(Debug, Serialize, Deserialize)]
pub struct FinalReport {
    pub metadata: ReportMetadata,
    pub sessions: Vec<SessionReport>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub os: String,
    pub architecture: String,
}

impl ResultsManager {
    pub fn new(output_file: &Path) -> Self {
        Self {
            output_file: output_file.to_path_buf(),
            reports: Vec::new(),
        }
    }

    pub fn add_report(&mut self, report: SessionReport) {
        debug!("Adding {} session report", report.role);
        self.reports.push(report);
    }

    /// Write all collected reports to the output file
    pub fn finalize(&self) -> Result<()> {
        let document = FinalReport {
            metadata: ReportMetadata {
                version: crate::VERSION.to_string(),
                timestamp: chrono::Utc::now(),
                os: std::env::consts::OS.to_string(),
                architecture: std::env::consts::ARCH.to_string(),
            },
            sessions: self.reports.clone(),
        };

        let json = serde_json::to_string_pretty(&document)?;
        std::fs::write(&self.output_file, json)
            .with_context(|| format!("Failed to write report to {:?}", self.output_file))?;

        info!("Results written to: {:?}", self.output_file);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    fn summary() -> SessionSummary {
        SessionSummary {
            sent: 10_000,
            responses: 9_998,
            elapsed: Duration::from_secs(2),
            unbind_sent: true,
            end: SessionEnd::UnbindAcknowledged,
        }
    }

    #[test]
    fn test_report_from_summary() {
        let report = SessionReport::from_summary(&summary(), 10_000);
        assert_eq!(report.role, Role::Server);
        assert_eq!(report.target_count, Some(10_000));
        assert_eq!(report.deliveries, 10_000);
        assert_eq!(report.responses, Some(9_998));
        assert_eq!(report.messages_per_second, 5000.0);
    }

    #[test]
    fn test_report_from_client() {
        let report = SessionReport::from_client(&ClientReport {
            delivered: 40,
            elapsed: Duration::from_millis(500),
            end: SessionEnd::PeerUnbind,
            unbind_sent: false,
            server_system_id: "recv_stresser".to_string(),
        });
        assert_eq!(report.role, Role::Client);
        assert!(report.target_count.is_none());
        assert!(report.responses.is_none());
        assert!(!report.unbind_sent);
        assert_eq!(report.messages_per_second, 80.0);
    }

    #[test]
    fn test_finalize_writes_json() {
        let temp_file = NamedTempFile::new().unwrap();
        let mut manager = ResultsManager::new(temp_file.path());
        manager.add_report(SessionReport::from_summary(&summary(), 10_000));
        manager.finalize().unwrap();

        let written = std::fs::read_to_string(temp_file.path()).unwrap();
        let parsed: FinalReport = serde_json::from_str(&written).unwrap();
        assert_eq!(parsed.metadata.version, crate::VERSION);
        assert_eq!(parsed.sessions.len(), 1);
        assert_eq!(parsed.sessions[0].end, SessionEnd::UnbindAcknowledged);

        let raw: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(raw["sessions"][0]["role"], "server");
        assert_eq!(raw["sessions"][0]["end"], "unbind_acknowledged");
    }

    #[test]
    fn test_finalize_reports_bad_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = ResultsManager::new(&dir.path().join("missing").join("report.json"));
        assert!(manager.finalize().is_err());
    }
}
