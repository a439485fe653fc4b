//! Basic statement import example

use statement_import::utils::{MemoryJournal, MemoryStorage};
use statement_import::{
    DefaultAccounts, FileType, ImportError, Importer, Profile, StatementStorage, GENERIC_CSVXLS_SO,
};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt, Layer};

const STATEMENT: &str = "ref,label,date,amount,commission_amount\n\
                         SO1001,Order 1001,2024-04-02,149.90,2.25\n\
                         SO1002,Order 1002,2024-04-02,89.00,1.40\n\
                         RF0007,Refund 7,2024-04-03,-25.00,\n";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_filter(filter::LevelFilter::INFO))
        .init();

    println!("🏦 Statement Import - Basic Example\n");

    // 1. Storage with default accounts and one import profile
    let mut storage = MemoryStorage::with_default_accounts(DefaultAccounts {
        receivable: Some("411000".to_string()),
        payable: Some("401000".to_string()),
    });

    let mut profile = Profile::new(
        "webshop".to_string(),
        "Web shop payments".to_string(),
        GENERIC_CSVXLS_SO.to_string(),
    );
    profile.commission_account_id = Some("627000".to_string());
    storage.save_profile(&profile).await?;

    let journal = MemoryJournal::new();
    let mut importer = Importer::new(storage.clone()).with_journal(journal.clone());

    println!("📋 Available import types:");
    for (key, label) in importer.registry().import_types() {
        println!("  • {} - {}", key, label);
    }
    println!();

    // 2. Import a CSV statement
    println!("📥 Importing statement file...\n");
    let summary = importer
        .import(Some(&profile.id), STATEMENT.as_bytes(), FileType::Csv)
        .await?;

    for line in storage.get_statement_lines(&summary.statement_id).await? {
        println!(
            "  ✓ {} {:>10} {:<8} account {}{}",
            line.date,
            line.amount,
            line.reference.unwrap_or_default(),
            line.account_id.unwrap_or_else(|| "-".to_string()),
            if line.already_completed { " (completed)" } else { "" }
        );
    }
    println!();

    for message in journal.messages(&profile.id) {
        println!("📝 {}", message);
    }

    // 3. A file with an unknown column is refused before anything is stored
    println!("\n🚫 Importing a file with an unknown column...");
    match importer
        .import(
            Some(&profile.id),
            b"date,amount,iban\n2024-04-04,10.00,FR76\n",
            FileType::Csv,
        )
        .await
    {
        Err(ImportError::Schema(error)) => println!("  ✗ {}", error),
        other => println!("  unexpected result: {:?}", other),
    }

    println!(
        "\n📊 Statements stored: {}",
        storage.list_statements(None).await?.len()
    );

    Ok(())
}
