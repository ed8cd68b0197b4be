use anyhow::Result;
use std::fmt;

pub const INVESTIGATION_FILE: &str = "isa.investigation.xlsx";
pub const STUDY_FILE: &str = "isa.study.xlsx";
pub const ASSAY_FILE: &str = "isa.assay.xlsx";
pub const SPREADSHEET_EXT: &str = ".xlsx";

pub const STUDIES_DIR: &str = "studies";
pub const ASSAYS_DIR: &str = "assays";
pub const PROTOCOLS_DIR: &str = "protocols";
pub const DATASET_DIR: &str = "dataset";
pub const RUNS_DIR: &str = "runs";
pub const WORKFLOWS_DIR: &str = "workflows";

/// Raw two-character porcelain status code (index column, worktree column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusCode {
    pub index: char,
    pub worktree: char,
}

impl StatusCode {
    pub fn parse(raw: &str) -> Self {
        let mut chars = raw.chars();
        Self {
            index: chars.next().unwrap_or(' '),
            worktree: chars.next().unwrap_or(' '),
        }
    }

    pub fn has(self, flag: char) -> bool {
        self.index == flag || self.worktree == flag
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.index, self.worktree)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Icon {
    Added,
    Modified,
    Removed,
}

impl Icon {
    pub fn for_code(code: StatusCode) -> Self {
        if code.has('D') {
            Self::Removed
        } else if code.has('M') {
            Self::Modified
        } else {
            Self::Added
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Added => "added",
            Self::Modified => "modified",
            Self::Removed => "removed",
        }
    }
}

/// One record of `git status -z -u` output plus the file size on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusEntry {
    pub code: StatusCode,
    pub path: String,
    pub size_bytes: u64,
}

impl StatusEntry {
    pub fn new(code: &str, path: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            code: StatusCode::parse(code),
            path: path.into(),
            size_bytes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    Delete,
    Rename,
    Unknown(String),
}

impl Operation {
    pub fn label(&self) -> &str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
            Self::Rename => "RENAME",
            Self::Unknown(raw) => raw,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DtoType {
    IsaInvestigation,
    IsaStudy,
    IsaAssay,
    IsaDatamap,
    PlainText,
    Other(String),
}

impl DtoType {
    pub fn is_spreadsheet(&self) -> bool {
        matches!(
            self,
            Self::IsaInvestigation | Self::IsaStudy | Self::IsaAssay | Self::IsaDatamap
        )
    }

    pub fn label(&self) -> &str {
        match self {
            Self::IsaInvestigation => "ISA_Investigation",
            Self::IsaStudy => "ISA_Study",
            Self::IsaAssay => "ISA_Assay",
            Self::IsaDatamap => "ISA_Datamap",
            Self::PlainText => "PlainText",
            Self::Other(raw) => raw,
        }
    }
}

/// In-memory spreadsheet handed to the codec. The engine never looks inside;
/// the value shape is whatever the codec produced or accepts.
#[derive(Debug, Clone, PartialEq)]
pub struct Workbook(pub serde_json::Value);

#[derive(Debug, Clone, PartialEq)]
pub enum ContractDto {
    Workbook(Workbook),
    Text(String),
    /// Destination relative path, carried by RENAME contracts only.
    Target(String),
}

/// A declarative file-level instruction produced by the domain model and
/// consumed once by the synchronizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Contract {
    pub operation: Operation,
    pub path: String,
    pub dto_type: DtoType,
    pub dto: Option<ContractDto>,
}

impl Contract {
    pub fn create_text(path: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            operation: Operation::Create,
            path: path.into(),
            dto_type: DtoType::PlainText,
            dto: Some(ContractDto::Text(body.into())),
        }
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            operation: Operation::Delete,
            path: path.into(),
            dto_type: DtoType::PlainText,
            dto: None,
        }
    }

    pub fn rename(path: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            operation: Operation::Rename,
            path: path.into(),
            dto_type: DtoType::PlainText,
            dto: Some(ContractDto::Target(target.into())),
        }
    }

    pub fn describe(&self) -> String {
        format!(
            "{} {} ({})",
            self.operation.label(),
            self.path,
            self.dto_type.label()
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Investigation,
    Study,
    Assay,
}

impl EntityKind {
    pub fn label(self) -> &'static str {
        match self {
            Self::Investigation => "investigation",
            Self::Study => "study",
            Self::Assay => "assay",
        }
    }
}

pub trait SpreadsheetCodec: Send + Sync {
    fn to_bytes(&self, workbook: &Workbook) -> Result<Vec<u8>>;
    fn from_bytes(&self, bytes: &[u8]) -> Result<Workbook>;
}

/// The domain model the engine keeps in sync with the filesystem. Contract
/// generation stays on the model side; the engine only applies the batches.
pub trait ArcModel: Send {
    /// Refreshes the model's internal dirty and contract bookkeeping.
    fn update_file_system(&mut self);
    fn read_contracts(&self) -> Vec<Contract>;
    fn update_contracts(&self) -> Vec<Contract>;
    fn write_contracts(&self) -> Vec<Contract>;
    fn set_isa_from_contracts(&mut self, contracts: Vec<Contract>) -> Result<()>;
    fn delete_contracts(&mut self, kind: EntityKind, identifier: &str) -> Vec<Contract>;
    fn rename_contracts(
        &mut self,
        kind: EntityKind,
        old_identifier: &str,
        new_identifier: &str,
    ) -> Vec<Contract>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn status_code_parses_both_columns() {
        let code = StatusCode::parse(" M");
        assert_eq!(code.index, ' ');
        assert_eq!(code.worktree, 'M');
        assert!(code.has('M'));
        assert!(!code.has('D'));
    }

    #[test]
    fn status_code_pads_short_input() {
        let code = StatusCode::parse("?");
        assert_eq!(code.to_string(), "? ");
    }

    #[test]
    fn icon_prefers_removed_over_modified() {
        assert_eq!(Icon::for_code(StatusCode::parse(" D")), Icon::Removed);
        assert_eq!(Icon::for_code(StatusCode::parse("MD")), Icon::Removed);
        assert_eq!(Icon::for_code(StatusCode::parse(" M")), Icon::Modified);
        assert_eq!(Icon::for_code(StatusCode::parse("??")), Icon::Added);
        assert_eq!(Icon::for_code(StatusCode::parse("A ")), Icon::Added);
    }

    #[test]
    fn spreadsheet_dto_types_are_grouped() {
        assert!(DtoType::IsaStudy.is_spreadsheet());
        assert!(DtoType::IsaDatamap.is_spreadsheet());
        assert!(!DtoType::PlainText.is_spreadsheet());
        assert!(!DtoType::Other("Cli".to_string()).is_spreadsheet());
    }

    #[test]
    fn contract_describe_names_operation_path_and_kind() {
        let contract = Contract::rename("studies/Old", "studies/New");
        assert_eq!(contract.describe(), "RENAME studies/Old (PlainText)");
    }
}
