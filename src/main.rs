use std::collections::BTreeMap;
use std::path::PathBuf;

use clap::Parser;

use formpack_pdf::{
    assemble_form, assemble_package, document_filename, package_filename, AssetFetcher,
    CredentialChain, FetcherConfig, FormRecord, FormType, StaticToken,
};

/// Assemble onboarding form packages into PDF documents.
#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// JSON file mapping form-type keys to their field records
    input: PathBuf,

    /// Output path; defaults to the generated filename in the current directory
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Generate a single form (by its camelCase key) instead of the whole package
    #[arg(long)]
    form: Option<String>,

    /// Origin carrying the storage proxy endpoint
    #[arg(long, default_value = "")]
    base_url: String,

    /// Bearer token for proxied asset requests
    #[arg(long)]
    token: Option<String>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    let raw = std::fs::read_to_string(&cli.input)?;
    let by_key: BTreeMap<String, FormRecord> = serde_json::from_str(&raw)?;
    let mut forms: BTreeMap<FormType, FormRecord> = BTreeMap::new();
    for (key, record) in by_key {
        forms.insert(FormType::from_key(&key)?, record);
    }

    let mut credentials = CredentialChain::new();
    if let Some(token) = cli.token {
        credentials = credentials.with(Box::new(StaticToken(token)));
    }
    let fetcher = AssetFetcher::new(FetcherConfig {
        base_url: cli.base_url,
        ..FetcherConfig::default()
    })
    .with_credentials(Box::new(credentials));

    let (first, last) = signer_names(&forms);

    let (doc, filename) = match cli.form {
        Some(key) => {
            let form_type = FormType::from_key(&key)?;
            let record = forms
                .get(&form_type)
                .ok_or_else(|| format!("input has no record for form '{key}'"))?;
            let doc = assemble_form(form_type, record, &fetcher).await?;
            (doc, document_filename(form_type, &first, &last))
        }
        None => {
            let doc = assemble_package(&forms, &fetcher).await?;
            (doc, package_filename(&first, &last))
        }
    };

    let out_path = cli.out.unwrap_or_else(|| PathBuf::from(&filename));
    std::fs::write(&out_path, &doc.bytes)?;
    println!(
        "{} ({} pages) -> {}",
        filename,
        doc.page_count,
        out_path.display()
    );
    Ok(())
}

/// Signer names for the filename policy, taken from the first form
/// that records them.
fn signer_names(forms: &BTreeMap<FormType, FormRecord>) -> (String, String) {
    for ft in [FormType::BrokerInformation, FormType::UnlicensedInformation] {
        if let Some(record) = forms.get(&ft) {
            let first = record.text("firstName").unwrap_or_default();
            let last = record.text("lastName").unwrap_or_default();
            if !first.is_empty() || !last.is_empty() {
                return (first.to_string(), last.to_string());
            }
        }
    }
    (String::new(), String::new())
}
