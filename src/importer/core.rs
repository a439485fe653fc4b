//! Import orchestrator: profile, parser, lines, commission and attachment

use chrono::NaiveDate;

use crate::importer::commission::build_commission_line;
use crate::importer::mapper::map_row;
use crate::importer::schema;
use crate::parser::ParserRegistry;
use crate::traits::*;
use crate::types::*;
use crate::utils::memory_journal::MemoryJournal;

/// Deepest cause chain written to the log when an import is rolled back
pub const MAX_CAUSE_DEPTH: usize = 30;

/// Everything needed to fill a freshly created statement
struct StatementContents<'a> {
    statement: &'a Statement,
    profile: &'a Profile,
    parser: &'a dyn StatementParser,
    rows: &'a [RawRow],
    values: &'a [LineValues],
    data: &'a [u8],
    file_type: FileType,
    today: NaiveDate,
}

/// Ids of the records created besides the statement lines
struct CreatedRecords {
    commission_line_id: Option<String>,
    attachment_id: String,
}

/// Imports bank statement files into a storage backend
pub struct Importer<S: StatementStorage> {
    storage: S,
    registry: ParserRegistry,
    completer: Option<Box<dyn StatementCompleter>>,
    journal: Box<dyn ImportJournal>,
}

impl<S: StatementStorage> Importer<S> {
    /// Create an importer with the default parsers and an in-memory journal
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            registry: ParserRegistry::default(),
            completer: None,
            journal: Box::new(MemoryJournal::new()),
        }
    }

    /// Use a custom parser registry
    pub fn with_registry(mut self, registry: ParserRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Completion engine run after imports whose profile asks for it
    pub fn with_completer(mut self, completer: impl StatementCompleter + 'static) -> Self {
        self.completer = Some(Box::new(completer));
        self
    }

    /// Journal receiving one message per successful import
    pub fn with_journal(mut self, journal: impl ImportJournal + 'static) -> Self {
        self.journal = Box::new(journal);
        self
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Import one statement file with the given profile
    ///
    /// The file is parsed and checked before anything is written. Once the
    /// statement exists, any failure while creating its lines, commission
    /// line or attachment deletes it again and is returned as
    /// [`ImportError::StatementCreation`]. Completion and the journal entry
    /// come after that point and never undo the import.
    pub async fn import(
        &mut self,
        profile_id: Option<&str>,
        data: &[u8],
        file_type: FileType,
    ) -> ImportResult<ImportSummary> {
        let profile = self.resolve_profile(profile_id).await?;
        tracing::info!(
            profile = %profile.id,
            import_type = %profile.import_type,
            %file_type,
            bytes = data.len(),
            "Importing bank statement"
        );

        let mut parser = self.registry.parser_for(&profile.import_type, file_type)?;
        let rows = parser.parse(data)?;
        let values = rows
            .iter()
            .map(|row| parser.line_values(row))
            .collect::<ImportResult<Vec<_>>>()?;
        schema::validate_rows(&values)?;

        let statement = Statement::new(profile.id.clone());
        self.storage
            .save_statement(&statement)
            .await
            .map_err(ImportError::statement_creation)?;

        let contents = StatementContents {
            statement: &statement,
            profile: &profile,
            parser: &*parser,
            rows: &rows,
            values: &values,
            data,
            file_type,
            today: chrono::Utc::now().date_naive(),
        };
        let created = match self.fill_statement(&contents).await {
            Ok(created) => created,
            Err(cause) => {
                self.roll_back(&statement.id, &cause).await;
                return Err(ImportError::statement_creation(cause));
            }
        };

        let completion = self.run_completion(&profile, &statement.id).await;

        let log_message = format!(
            "Statement ID {} has been imported with {} lines.",
            statement.id,
            rows.len()
        );
        if let Err(error) = self.journal.post_log(&profile.id, &log_message).await {
            tracing::warn!(profile = %profile.id, %error, "Could not write import journal");
        }

        tracing::info!(
            profile = %profile.id,
            statement = %statement.id,
            lines = rows.len(),
            commission = created.commission_line_id.is_some(),
            "Bank statement imported"
        );

        Ok(ImportSummary {
            statement_id: statement.id,
            line_count: rows.len(),
            commission_line_id: created.commission_line_id,
            attachment_id: created.attachment_id,
            completion,
            log_message,
        })
    }

    async fn resolve_profile(&self, profile_id: Option<&str>) -> ImportResult<Profile> {
        let profile_id = profile_id
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                ImportError::Configuration(
                    "No profile: you must provide a valid profile to import a bank statement"
                        .to_string(),
                )
            })?;

        self.storage
            .get_profile(profile_id)
            .await?
            .ok_or_else(|| {
                ImportError::Configuration(format!("Profile '{}' does not exist", profile_id))
            })
    }

    async fn fill_statement(
        &mut self,
        contents: &StatementContents<'_>,
    ) -> ImportResult<CreatedRecords> {
        let statement_id = contents.statement.id.as_str();
        let accounts = self.storage.default_accounts().await?;

        for values in contents.values {
            let line = map_row(values, &accounts, statement_id, &self.storage)?;
            self.storage.save_line(&line).await?;
            tracing::debug!(
                statement = %statement_id,
                line = %line.id,
                amount = %line.amount,
                "Created statement line"
            );
        }

        let commission_line_id = match build_commission_line(
            contents.parser,
            contents.rows,
            contents.profile,
            statement_id,
            contents.today,
        ) {
            Some(line) => {
                self.storage.save_line(&line).await?;
                Some(line.id)
            }
            None => None,
        };

        let attachment = Attachment::statement_file(
            statement_id.to_string(),
            contents.data.to_vec(),
            contents.today,
            contents.file_type,
        );
        self.storage.save_attachment(&attachment).await?;

        Ok(CreatedRecords {
            commission_line_id,
            attachment_id: attachment.id,
        })
    }

    async fn roll_back(&mut self, statement_id: &str, cause: &ImportError) {
        tracing::error!(
            statement = %statement_id,
            kind = cause.kind(),
            cause = %error_chain(cause, MAX_CAUSE_DEPTH),
            "Statement import failed, deleting statement"
        );
        if let Err(error) = self.storage.delete_statement(statement_id).await {
            tracing::error!(
                statement = %statement_id,
                %error,
                "Could not delete partially imported statement"
            );
        }
    }

    async fn run_completion(&mut self, profile: &Profile, statement_id: &str) -> CompletionOutcome {
        if !profile.launch_import_completion {
            return CompletionOutcome::NotRequested;
        }

        let Some(completer) = self.completer.as_mut() else {
            tracing::warn!(
                profile = %profile.id,
                "Completion requested but no completion engine is configured"
            );
            return CompletionOutcome::Failed("no completion engine configured".to_string());
        };

        match completer.complete_statement(statement_id).await {
            Ok(()) => CompletionOutcome::Completed,
            Err(error) => {
                tracing::warn!(statement = %statement_id, %error, "Completion failed after import");
                CompletionOutcome::Failed(error.to_string())
            }
        }
    }
}
