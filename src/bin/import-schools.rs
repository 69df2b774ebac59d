//! Bulk-import schools from a CSV file with a `name,address,city` header.
//!
//! Usage: import-schools --file schools.csv [--status approved|pending]
//!
//! Rows matching an existing school on (name, city), case-insensitively,
//! update its address and status instead of creating a duplicate.

use clap::Parser;
use serde::Deserialize;
use sqlx::postgres::PgPoolOptions;

use sitterlink_api::models::profile::ApprovalStatus;

#[derive(Parser)]
#[command(name = "import-schools", about = "Import schools into the sitterlink database")]
struct Args {
    /// CSV file with a header row: name,address,city
    #[arg(long)]
    file: std::path::PathBuf,

    /// Status given to imported schools
    #[arg(long, default_value = "approved")]
    status: String,

    /// Parse and validate the file without writing
    #[arg(long)]
    dry_run: bool,
}

#[derive(Debug, Deserialize)]
struct SchoolRow {
    name: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    city: Option<String>,
}

fn clean(s: Option<String>) -> Option<String> {
    s.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Read rows, dropping those without a name.
fn read_rows<R: std::io::Read>(reader: R) -> anyhow::Result<Vec<SchoolRow>> {
    let mut csv = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut rows = Vec::new();
    for (i, record) in csv.deserialize::<SchoolRow>().enumerate() {
        let row = record.map_err(|e| anyhow::anyhow!("line {}: {}", i + 2, e))?;
        if row.name.trim().is_empty() {
            tracing::warn!("Skipping line {}: empty name", i + 2);
            continue;
        }
        rows.push(SchoolRow {
            name: row.name.trim().to_string(),
            address: clean(row.address),
            city: clean(row.city),
        });
    }
    Ok(rows)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args = Args::parse();
    let status: ApprovalStatus = args.status.parse()?;

    let file = std::fs::File::open(&args.file)?;
    let rows = read_rows(file)?;
    tracing::info!("Read {} school(s) from {}", rows.len(), args.file.display());

    if args.dry_run {
        return Ok(());
    }

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable not set"))?;
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await?;

    let mut tx = pool.begin().await?;
    for row in &rows {
        sqlx::query(
            "INSERT INTO schools (name, address, city, status)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT ((LOWER(name)), (LOWER(COALESCE(city, ''))))
             DO UPDATE SET address = COALESCE(EXCLUDED.address, schools.address),
                           status = EXCLUDED.status,
                           updated_at = NOW()",
        )
        .bind(&row.name)
        .bind(&row.address)
        .bind(&row.city)
        .bind(status.to_string())
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    tracing::info!("Imported {} school(s) as {}", rows.len(), status);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_rows_trims_and_skips_blank_names() {
        let data = "name,address,city\n  Lycee Victor Hugo , 1 rue A ,Paris\n,2 rue B,Lyon\nCollege Sud,,\n";
        let rows = read_rows(data.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Lycee Victor Hugo");
        assert_eq!(rows[0].city.as_deref(), Some("Paris"));
        assert_eq!(rows[1].address, None);
        assert_eq!(rows[1].city, None);
    }

    #[test]
    fn test_read_rows_reports_bad_line() {
        let data = "name,address,city\nA,B,C,D\n";
        let err = read_rows(data.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }
}
