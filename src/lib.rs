mod error;
mod fetch;
mod format;
mod layout;
mod model;
mod overlay;
mod package;
mod pdf;

pub use error::{Error, Result};
pub use fetch::{
    Anonymous, AssetFetcher, CredentialChain, CredentialProvider, FetchOptions, FetchedAsset,
    FetcherConfig, StaticToken,
};
pub use format::{document_filename, format_value, humanize, package_filename};
pub use layout::{template, FieldDef, FieldPlacement, FieldRole, LayoutTemplate, PageSize, LETTER};
pub use model::{
    AssetRef, Dimensions, FormRecord, FormType, FormValue, RenderedDocument, SignerAssets,
};
pub use overlay::{overlay_contract, page_role, resolve_signing_date, PageRole};
pub use package::{assemble_all, assemble_one, merge_documents, CANONICAL_ORDER};
pub use pdf::{notice_document, render};

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;

/// Assemble the whole-package document for a user's completed forms in
/// canonical order.
pub async fn assemble_package(
    forms: &BTreeMap<FormType, FormRecord>,
    fetcher: &AssetFetcher,
) -> Result<RenderedDocument> {
    let t0 = Instant::now();

    let doc = assemble_all(forms, &CANONICAL_ORDER, fetcher).await?;

    log::info!(
        "Package: {} forms in, {} pages out, {} bytes, {:.1}ms",
        forms.len(),
        doc.page_count,
        doc.bytes.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(doc)
}

/// Assemble the package and write it to `output`.
pub async fn assemble_package_to_file(
    forms: &BTreeMap<FormType, FormRecord>,
    fetcher: &AssetFetcher,
    output: &Path,
) -> Result<RenderedDocument> {
    let doc = assemble_package(forms, fetcher).await?;
    std::fs::write(output, &doc.bytes).map_err(Error::Io)?;
    Ok(doc)
}

/// Render a single form's document.
pub async fn assemble_form(
    form_type: FormType,
    record: &FormRecord,
    fetcher: &AssetFetcher,
) -> Result<RenderedDocument> {
    let t0 = Instant::now();

    let doc = assemble_one(form_type, record, fetcher).await?;

    log::info!(
        "Form {form_type}: {} pages, {} bytes, {:.1}ms",
        doc.page_count,
        doc.bytes.len(),
        t0.elapsed().as_secs_f64() * 1000.0,
    );

    Ok(doc)
}
