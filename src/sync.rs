use crate::domain::{ArcModel, Contract, ContractDto, DtoType, Operation, SpreadsheetCodec};
use crate::fs::FileStore;
use std::io;
use std::path::Path;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum SyncIssue {
    /// Create-exclusive write hit an existing file.
    #[error("target already exists")]
    CreateConflict,
    /// CREATE or UPDATE with a dto type the synchronizer cannot write.
    #[error("unable to resolve write contract")]
    UnresolvedContract,
    #[error("unknown contract operation")]
    UnknownOperation,
    #[error("contract carries no usable payload")]
    MissingPayload,
    #[error("codec failure: {0:#}")]
    Codec(anyhow::Error),
    #[error("domain model rejected contracts: {0:#}")]
    Model(anyhow::Error),
    /// External tool reported failure through its success flag.
    #[error("{0}")]
    Tool(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

#[derive(Debug)]
pub struct Diagnostic {
    /// Human-readable contract description (operation, path, dto type).
    pub contract: String,
    pub issue: SyncIssue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Clean,
    WithDiagnostics,
    /// Nothing ran because a precondition was missing.
    Skipped,
}

/// Result of one batch application. The batch itself never fails; individual
/// contract problems are collected here so callers can distinguish a clean
/// run from a degraded one without the process aborting.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub applied: usize,
    pub diagnostics: Vec<Diagnostic>,
}

impl SyncReport {
    pub fn outcome(&self) -> SyncOutcome {
        if self.diagnostics.is_empty() {
            SyncOutcome::Clean
        } else {
            SyncOutcome::WithDiagnostics
        }
    }

    fn record(&mut self, contract: &Contract, issue: SyncIssue) {
        warn!(contract = %contract.describe(), %issue, "contract not applied");
        self.diagnostics.push(Diagnostic {
            contract: contract.describe(),
            issue,
        });
    }
}

/// Applies a contract batch in list order. Best effort by design: there is
/// no rollback, a failed contract is recorded and the batch moves on, and a
/// crash mid-batch leaves whatever was already written.
pub fn apply_contracts(
    fs: &dyn FileStore,
    codec: &dyn SpreadsheetCodec,
    model: &mut dyn ArcModel,
    root: &Path,
    contracts: &[Contract],
) -> SyncReport {
    model.update_file_system();

    let mut report = SyncReport::default();
    for contract in contracts {
        match &contract.operation {
            Operation::Delete => match fs.remove(&root.join(&contract.path)) {
                Ok(()) => report.applied += 1,
                // Deleting what is already gone is success, not a fault.
                Err(err) if err.kind() == io::ErrorKind::NotFound => report.applied += 1,
                Err(err) => report.record(contract, SyncIssue::Io(err)),
            },
            Operation::Create | Operation::Update => {
                apply_write(fs, codec, root, contract, &mut report);
            }
            Operation::Rename => match &contract.dto {
                Some(ContractDto::Target(target)) => {
                    match fs.rename(&root.join(&contract.path), &root.join(target)) {
                        Ok(()) => report.applied += 1,
                        Err(err) => report.record(contract, SyncIssue::Io(err)),
                    }
                }
                _ => report.record(contract, SyncIssue::MissingPayload),
            },
            Operation::Unknown(_) => report.record(contract, SyncIssue::UnknownOperation),
        }
    }

    report
}

fn apply_write(
    fs: &dyn FileStore,
    codec: &dyn SpreadsheetCodec,
    root: &Path,
    contract: &Contract,
    report: &mut SyncReport,
) {
    let target = root.join(&contract.path);

    if contract.dto_type.is_spreadsheet() {
        let Some(ContractDto::Workbook(workbook)) = &contract.dto else {
            report.record(contract, SyncIssue::MissingPayload);
            return;
        };
        match codec.to_bytes(workbook) {
            Ok(bytes) => match fs.write(&target, &bytes) {
                Ok(()) => report.applied += 1,
                Err(err) => report.record(contract, SyncIssue::Io(err)),
            },
            Err(err) => report.record(contract, SyncIssue::Codec(err)),
        }
        return;
    }

    if contract.dto_type == DtoType::PlainText {
        let body = match &contract.dto {
            Some(ContractDto::Text(text)) => text.as_str(),
            _ => "",
        };
        match fs.write_new(&target, body.as_bytes()) {
            Ok(()) => report.applied += 1,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                report.record(contract, SyncIssue::CreateConflict);
            }
            Err(err) => report.record(contract, SyncIssue::Io(err)),
        }
        return;
    }

    report.record(contract, SyncIssue::UnresolvedContract);
}
