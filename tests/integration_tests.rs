//! Integration tests for statement-import

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use statement_import::{
    utils::{MemoryJournal, MemoryStorage},
    Attachment, CompletionOutcome, DefaultAccounts, FileType, ImportError, ImportResult,
    Importer, LineValues, ParserRegistry, Profile, RawRow, SchemaError, Statement,
    StatementCompleter, StatementLine, StatementParser, StatementStorage, COMMISSION_REFERENCE,
    GENERIC_CSVXLS_SO,
};
use std::str::FromStr;
use std::sync::{Arc, Mutex};

const THREE_ROWS: &str = "date,amount,ref\n\
                          2024-03-01,100.00,SO001\n\
                          2024-03-02,-25.50,SO002\n\
                          2024-03-03,42.00,SO003\n";

const THREE_ROWS_WITH_COMMISSION: &str = "date,amount,ref,commission_amount\n\
                                          2024-03-01,100.00,SO001,5.00\n\
                                          2024-03-02,-25.50,SO002,\n\
                                          2024-03-03,42.00,SO003,7.50\n";

fn default_accounts() -> DefaultAccounts {
    DefaultAccounts {
        receivable: Some("411000".to_string()),
        payable: Some("401000".to_string()),
    }
}

fn shop_profile() -> Profile {
    let mut profile = Profile::new(
        "shop".to_string(),
        "Web shop".to_string(),
        GENERIC_CSVXLS_SO.to_string(),
    );
    profile.partner_id = Some("payment_provider".to_string());
    profile.commission_account_id = Some("627000".to_string());
    profile.commission_analytic_id = Some("sales".to_string());
    profile
}

async fn setup(profile: Profile) -> MemoryStorage {
    let mut storage = MemoryStorage::with_default_accounts(default_accounts());
    storage.save_profile(&profile).await.unwrap();
    storage
}

async fn assert_nothing_persisted(storage: &MemoryStorage) {
    assert!(storage.list_statements(None).await.unwrap().is_empty());
    assert_eq!(storage.line_count().unwrap(), 0);
    assert_eq!(storage.attachment_count().unwrap(), 0);
}

/// Storage that fails on the n-th saved line (1-based)
#[derive(Clone)]
struct FailingStorage {
    inner: MemoryStorage,
    fail_on_line: usize,
    saved_lines: Arc<Mutex<usize>>,
    fail_attachment: bool,
}

impl FailingStorage {
    fn on_line(inner: MemoryStorage, fail_on_line: usize) -> Self {
        Self {
            inner,
            fail_on_line,
            saved_lines: Arc::new(Mutex::new(0)),
            fail_attachment: false,
        }
    }

    fn on_attachment(inner: MemoryStorage) -> Self {
        Self {
            fail_attachment: true,
            ..Self::on_line(inner, usize::MAX)
        }
    }
}

#[async_trait]
impl StatementStorage for FailingStorage {
    async fn save_profile(&mut self, profile: &Profile) -> ImportResult<()> {
        self.inner.save_profile(profile).await
    }

    async fn get_profile(&self, profile_id: &str) -> ImportResult<Option<Profile>> {
        self.inner.get_profile(profile_id).await
    }

    async fn save_statement(&mut self, statement: &Statement) -> ImportResult<()> {
        self.inner.save_statement(statement).await
    }

    async fn get_statement(&self, statement_id: &str) -> ImportResult<Option<Statement>> {
        self.inner.get_statement(statement_id).await
    }

    async fn list_statements(&self, profile_id: Option<&str>) -> ImportResult<Vec<Statement>> {
        self.inner.list_statements(profile_id).await
    }

    async fn delete_statement(&mut self, statement_id: &str) -> ImportResult<()> {
        self.inner.delete_statement(statement_id).await
    }

    async fn save_line(&mut self, line: &StatementLine) -> ImportResult<()> {
        let count = {
            let mut saved = self.saved_lines.lock().unwrap();
            *saved += 1;
            *saved
        };
        if count == self.fail_on_line {
            return Err(ImportError::Storage("connection lost".to_string()));
        }
        self.inner.save_line(line).await
    }

    async fn update_line(&mut self, line: &StatementLine) -> ImportResult<()> {
        self.inner.update_line(line).await
    }

    async fn get_statement_lines(&self, statement_id: &str) -> ImportResult<Vec<StatementLine>> {
        self.inner.get_statement_lines(statement_id).await
    }

    async fn save_attachment(&mut self, attachment: &Attachment) -> ImportResult<()> {
        if self.fail_attachment {
            return Err(ImportError::Storage("attachment store unavailable".to_string()));
        }
        self.inner.save_attachment(attachment).await
    }

    async fn get_attachments(&self, statement_id: &str) -> ImportResult<Vec<Attachment>> {
        self.inner.get_attachments(statement_id).await
    }

    async fn default_accounts(&self) -> ImportResult<DefaultAccounts> {
        self.inner.default_accounts().await
    }
}

/// Completer that marks every line of the statement as completed
#[derive(Clone)]
struct MarkCompleted {
    storage: MemoryStorage,
    calls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl StatementCompleter for MarkCompleted {
    async fn complete_statement(&mut self, statement_id: &str) -> ImportResult<()> {
        self.calls.lock().unwrap().push(statement_id.to_string());
        for mut line in self.storage.get_statement_lines(statement_id).await? {
            if !line.already_completed {
                line.already_completed = true;
                self.storage.update_line(&line).await?;
            }
        }
        Ok(())
    }
}

struct BrokenCompleter;

#[async_trait]
impl StatementCompleter for BrokenCompleter {
    async fn complete_statement(&mut self, _statement_id: &str) -> ImportResult<()> {
        Err(ImportError::Completion("no rules configured".to_string()))
    }
}

/// Parser returning fixed line values, for parsers outside the generic format
struct FixedParser {
    rows: Vec<LineValues>,
}

impl StatementParser for FixedParser {
    fn parse(&mut self, _data: &[u8]) -> ImportResult<Vec<RawRow>> {
        Ok((0..self.rows.len())
            .map(|index| RawRow::from([("index".to_string(), index.to_string())]))
            .collect())
    }

    fn line_values(&self, row: &RawRow) -> ImportResult<LineValues> {
        let index: usize = row["index"].parse().unwrap();
        Ok(self.rows[index].clone())
    }

    fn commission(&self) -> Option<BigDecimal> {
        None
    }
}

#[tokio::test]
async fn test_import_three_rows_without_commission() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());

    let summary = importer
        .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await
        .unwrap();

    assert_eq!(summary.line_count, 3);
    assert_eq!(summary.commission_line_id, None);

    let statement = storage
        .get_statement(&summary.statement_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(statement.profile_id, "shop");

    let lines = storage
        .get_statement_lines(&summary.statement_id)
        .await
        .unwrap();
    assert_eq!(lines.len(), 3);
    assert!(lines
        .iter()
        .all(|line| line.reference.as_deref() != Some(COMMISSION_REFERENCE)));
    assert_eq!(lines[1].amount, BigDecimal::from_str("-25.50").unwrap());
    assert_eq!(lines[1].account_id.as_deref(), Some("401000"));
    assert_eq!(lines[2].reference.as_deref(), Some("SO003"));

    let attachments = storage
        .get_attachments(&summary.statement_id)
        .await
        .unwrap();
    assert_eq!(attachments.len(), 1);
    assert_eq!(attachments[0].id, summary.attachment_id);
    assert_eq!(attachments[0].data, THREE_ROWS.as_bytes());
    assert!(attachments[0].file_name.ends_with(".csv"));
}

#[tokio::test]
async fn test_import_with_commission_line() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());

    let summary = importer
        .import(
            Some("shop"),
            THREE_ROWS_WITH_COMMISSION.as_bytes(),
            FileType::Csv,
        )
        .await
        .unwrap();

    let lines = storage
        .get_statement_lines(&summary.statement_id)
        .await
        .unwrap();
    assert_eq!(summary.line_count, 3);
    assert_eq!(lines.len(), 4);

    let commission = &lines[3];
    assert_eq!(summary.commission_line_id.as_deref(), Some(commission.id.as_str()));
    assert_eq!(commission.amount, BigDecimal::from_str("12.50").unwrap());
    assert_eq!(commission.reference.as_deref(), Some(COMMISSION_REFERENCE));
    assert!(commission.already_completed);
    assert_eq!(commission.partner_id.as_deref(), Some("payment_provider"));
    assert_eq!(commission.account_id.as_deref(), Some("627000"));
    assert_eq!(commission.analytic_account_id.as_deref(), Some("sales"));

    let commission_lines = lines
        .iter()
        .filter(|line| line.reference.as_deref() == Some(COMMISSION_REFERENCE))
        .count();
    assert_eq!(commission_lines, 1);
    assert_eq!(
        lines[0].commission_amount,
        Some(BigDecimal::from_str("5.00").unwrap())
    );
    assert_eq!(lines[1].commission_amount, None);
}

#[tokio::test]
async fn test_import_without_profile() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());

    let result = importer
        .import(None, THREE_ROWS.as_bytes(), FileType::Csv)
        .await;
    assert!(matches!(result, Err(ImportError::Configuration(_))));

    let result = importer
        .import(Some(""), THREE_ROWS.as_bytes(), FileType::Csv)
        .await;
    assert!(matches!(result, Err(ImportError::Configuration(_))));

    assert_nothing_persisted(&storage).await;
}

#[tokio::test]
async fn test_import_unknown_column() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());

    let result = importer
        .import(
            Some("shop"),
            b"date,amount,ref,foo\n2024-03-01,1.00,SO001,bar\n",
            FileType::Csv,
        )
        .await;

    match result {
        Err(ImportError::Schema(SchemaError::UnknownColumn(column))) => assert_eq!(column, "foo"),
        other => panic!("expected unknown column error, got {other:?}"),
    }
    assert_nothing_persisted(&storage).await;
}

#[tokio::test]
async fn test_unknown_field_on_later_row() {
    let mut first = LineValues::new();
    first.insert(
        "date".to_string(),
        statement_import::FieldValue::Text("2024-03-01".to_string()),
    );
    first.insert(
        "amount".to_string(),
        statement_import::FieldValue::Text("10".to_string()),
    );
    let mut second = first.clone();
    second.insert(
        "foo".to_string(),
        statement_import::FieldValue::Text("bar".to_string()),
    );

    let mut registry = ParserRegistry::new();
    registry.register("fixed", "Fixed rows", move |_| {
        Ok(Box::new(FixedParser {
            rows: vec![first.clone(), second.clone()],
        }) as Box<dyn StatementParser>)
    });

    let profile = Profile::new("fixed".to_string(), "Fixed".to_string(), "fixed".to_string());
    let storage = setup(profile).await;
    let mut importer = Importer::new(storage.clone()).with_registry(registry);

    let result = importer.import(Some("fixed"), b"", FileType::Csv).await;

    assert!(matches!(
        result,
        Err(ImportError::Schema(SchemaError::UnknownColumn(_)))
    ));
    assert_nothing_persisted(&storage).await;
}

#[tokio::test]
async fn test_line_failure_rolls_back_statement() {
    let memory = setup(shop_profile()).await;
    let mut importer = Importer::new(FailingStorage::on_line(memory.clone(), 2));

    let result = importer
        .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await;

    match result {
        Err(ImportError::StatementCreation {
            kind,
            message,
            source,
        }) => {
            assert_eq!(kind, "Storage");
            assert!(message.contains("connection lost"));
            assert!(matches!(*source, ImportError::Storage(_)));
        }
        other => panic!("expected statement creation error, got {other:?}"),
    }

    // The first line was saved before the failure and must be gone too
    assert_nothing_persisted(&memory).await;
    assert_eq!(*importer.storage().saved_lines.lock().unwrap(), 2);
}

#[tokio::test]
async fn test_attachment_failure_rolls_back_statement() {
    let memory = setup(shop_profile()).await;
    let mut importer = Importer::new(FailingStorage::on_attachment(memory.clone()));

    let result = importer
        .import(
            Some("shop"),
            THREE_ROWS_WITH_COMMISSION.as_bytes(),
            FileType::Csv,
        )
        .await;

    assert!(matches!(
        result,
        Err(ImportError::StatementCreation { kind: "Storage", .. })
    ));
    assert_nothing_persisted(&memory).await;
}

#[tokio::test]
async fn test_empty_file_is_rejected() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());

    let result = importer
        .import(Some("shop"), b"date,amount,ref\n", FileType::Csv)
        .await;

    assert!(matches!(
        result,
        Err(ImportError::Schema(SchemaError::NoRows))
    ));
    assert_nothing_persisted(&storage).await;
}

#[tokio::test]
async fn test_parse_error_creates_nothing() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());

    let result = importer
        .import(
            Some("shop"),
            b"date,amount\n2024-03-01,ten\n",
            FileType::Csv,
        )
        .await;

    assert!(matches!(result, Err(ImportError::Parse { line: Some(1), .. })));
    assert_nothing_persisted(&storage).await;
}

#[tokio::test]
async fn test_import_twice_creates_two_statements() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());

    let first = importer
        .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await
        .unwrap();
    let second = importer
        .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await
        .unwrap();

    assert_ne!(first.statement_id, second.statement_id);
    assert_eq!(storage.list_statements(Some("shop")).await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_completion_runs_when_requested() {
    let mut profile = shop_profile();
    profile.launch_import_completion = true;
    let storage = setup(profile).await;
    let completer = MarkCompleted {
        storage: storage.clone(),
        calls: Arc::new(Mutex::new(Vec::new())),
    };
    let mut importer = Importer::new(storage.clone()).with_completer(completer.clone());

    let summary = importer
        .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await
        .unwrap();

    assert_eq!(summary.completion, CompletionOutcome::Completed);
    assert_eq!(
        *completer.calls.lock().unwrap(),
        vec![summary.statement_id.clone()]
    );
    let lines = storage
        .get_statement_lines(&summary.statement_id)
        .await
        .unwrap();
    assert!(lines.iter().all(|line| line.already_completed));
}

#[tokio::test]
async fn test_completion_not_run_unless_requested() {
    let storage = setup(shop_profile()).await;
    let completer = MarkCompleted {
        storage: storage.clone(),
        calls: Arc::new(Mutex::new(Vec::new())),
    };
    let mut importer = Importer::new(storage.clone()).with_completer(completer.clone());

    let summary = importer
        .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await
        .unwrap();

    assert_eq!(summary.completion, CompletionOutcome::NotRequested);
    assert!(completer.calls.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_completion_failure_keeps_statement() {
    let mut profile = shop_profile();
    profile.launch_import_completion = true;
    let storage = setup(profile).await;
    let journal = MemoryJournal::new();
    let mut importer = Importer::new(storage.clone())
        .with_completer(BrokenCompleter)
        .with_journal(journal.clone());

    let summary = importer
        .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await
        .unwrap();

    assert!(matches!(summary.completion, CompletionOutcome::Failed(_)));
    assert_eq!(
        storage
            .get_statement_lines(&summary.statement_id)
            .await
            .unwrap()
            .len(),
        3
    );
    assert_eq!(journal.messages("shop").len(), 1);
}

#[tokio::test]
async fn test_journal_records_each_import() {
    let storage = setup(shop_profile()).await;
    let journal = MemoryJournal::new();
    let mut importer = Importer::new(storage).with_journal(journal.clone());

    let summary = importer
        .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await
        .unwrap();
    let failed = importer
        .import(Some("shop"), b"date,amount\n", FileType::Csv)
        .await;

    assert!(failed.is_err());
    assert_eq!(
        journal.messages("shop"),
        vec![format!(
            "Statement ID {} has been imported with 3 lines.",
            summary.statement_id
        )]
    );
}

#[tokio::test]
async fn test_unsupported_import_type() {
    let profile = Profile::new(
        "other".to_string(),
        "Other bank".to_string(),
        "bank_specific".to_string(),
    );
    let storage = setup(profile).await;
    let mut importer = Importer::new(storage.clone());

    let result = importer
        .import(Some("other"), THREE_ROWS.as_bytes(), FileType::Csv)
        .await;

    assert!(matches!(result, Err(ImportError::Configuration(_))));
    assert_nothing_persisted(&storage).await;
}

#[test]
fn test_profile_configuration_from_json() {
    let profile: Profile = serde_json::from_str(
        r#"{
            "id": "shop",
            "name": "Web shop",
            "import_type": "generic_csvxls_so",
            "launch_import_completion": true,
            "commission_account_id": "627000"
        }"#,
    )
    .unwrap();

    assert!(profile.launch_import_completion);
    assert_eq!(profile.commission_account_id.as_deref(), Some("627000"));
    assert_eq!(profile.partner_id, None);

    let registry = ParserRegistry::default();
    assert!(registry
        .import_types()
        .iter()
        .any(|(key, _)| *key == profile.import_type));
}

#[tokio::test]
async fn test_import_runs_on_spawned_task() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());

    let summary = tokio::spawn(async move {
        importer
            .import(Some("shop"), THREE_ROWS.as_bytes(), FileType::Csv)
            .await
    })
    .await
    .unwrap()
    .unwrap();

    assert_eq!(summary.line_count, 3);
    assert_eq!(
        storage
            .get_statement_lines(&summary.statement_id)
            .await
            .unwrap()
            .len(),
        3
    );
}

#[cfg(feature = "xls")]
#[tokio::test]
async fn test_import_xlsx_workbook() {
    let storage = setup(shop_profile()).await;
    let mut importer = Importer::new(storage.clone());
    let data = include_bytes!("fixtures/statement.xlsx");

    let summary = importer
        .import(Some("shop"), data, FileType::Xlsx)
        .await
        .unwrap();

    // Two data rows (the blank sheet row is skipped) plus the commission line
    let lines = storage
        .get_statement_lines(&summary.statement_id)
        .await
        .unwrap();
    assert_eq!(summary.line_count, 2);
    assert_eq!(lines.len(), 3);

    assert_eq!(lines[0].name, "Order 1001");
    assert_eq!(lines[0].reference.as_deref(), Some("SO1001"));
    assert_eq!(lines[0].date, chrono::NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    assert_eq!(lines[0].amount, BigDecimal::from_str("149.9").unwrap());
    assert_eq!(lines[0].account_id.as_deref(), Some("411000"));

    assert_eq!(lines[1].date, chrono::NaiveDate::from_ymd_opt(2024, 4, 2).unwrap());
    assert_eq!(lines[1].amount, BigDecimal::from(-25));
    assert_eq!(lines[1].account_id.as_deref(), Some("401000"));

    assert_eq!(summary.commission_line_id.as_deref(), Some(lines[2].id.as_str()));
    assert_eq!(lines[2].amount, BigDecimal::from(-3));
    assert_eq!(lines[2].reference.as_deref(), Some(COMMISSION_REFERENCE));

    let attachments = storage.get_attachments(&summary.statement_id).await.unwrap();
    assert_eq!(attachments.len(), 1);
    assert!(attachments[0].file_name.ends_with(".xlsx"));
    assert_eq!(attachments[0].data, data.to_vec());
}
