//! Package assembler: renders every completed form in canonical order
//! and concatenates the results into one downloadable document.

use std::collections::BTreeMap;

use lopdf::{dictionary, Document, Object, ObjectId};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Date, OffsetDateTime};

use crate::error::{Error, Result};
use crate::fetch::{AssetFetcher, FetchOptions};
use crate::format::humanize;
use crate::layout;
use crate::model::{FormRecord, FormType, RenderedDocument, SignerAssets};
use crate::overlay::{overlay_contract, resolve_signing_date, FALLBACK_TITLE};
use crate::pdf::{notice_document, render};

/// The fixed order forms appear in the assembled package.
pub const CANONICAL_ORDER: [FormType; 9] = [
    FormType::BrokerInformation,
    FormType::UnlicensedInformation,
    FormType::BusinessCard,
    FormType::WebsiteInformation,
    FormType::MpcApplication,
    FormType::PaymentAuthorization,
    FormType::PoliciesAcknowledgement,
    FormType::Photos,
    FormType::ContractAndSchedule,
];

/// Produce the document for a single form.
///
/// The contract-and-schedule form is backed by an uploaded PDF and goes
/// through the overlay composer; everything else is rendered from its
/// layout template.
pub async fn assemble_one(
    form_type: FormType,
    record: &FormRecord,
    fetcher: &AssetFetcher,
) -> Result<RenderedDocument> {
    if form_type == FormType::ContractAndSchedule {
        return assemble_contract(record, fetcher).await;
    }
    let template = layout::template(form_type)?;
    render(&template, record, fetcher).await
}

/// Assemble every form present in `forms`, following `order` and
/// skipping absent types, into one concatenated document.
///
/// A single form's failure becomes a substituted error page in its
/// slot; only a missing layout (a programmer error) aborts assembly.
pub async fn assemble_all(
    forms: &BTreeMap<FormType, FormRecord>,
    order: &[FormType],
    fetcher: &AssetFetcher,
) -> Result<RenderedDocument> {
    let mut documents = Vec::new();
    for &form_type in order {
        let Some(record) = forms.get(&form_type) else {
            continue;
        };
        match assemble_one(form_type, record, fetcher).await {
            Ok(doc) => documents.push(doc),
            Err(e @ Error::LayoutNotFound(_)) => return Err(e),
            Err(e) => {
                log::warn!("form {form_type} failed: {e}; substituting error page");
                documents.push(notice_document(
                    &format!("Could not generate {}", humanize(form_type.key())),
                    &e.to_string(),
                ));
            }
        }
    }

    if documents.is_empty() {
        return Ok(notice_document(
            "No completed forms",
            "None of the requested form types had a completed record to render.",
        ));
    }

    merge_documents(documents)
}

async fn assemble_contract(
    record: &FormRecord,
    fetcher: &AssetFetcher,
) -> Result<RenderedDocument> {
    let contract_bytes = match record.asset("contractDocument") {
        Some(asset) => match fetcher.fetch(asset, &FetchOptions::default()).await {
            Ok(fetched) => fetched.bytes,
            Err(e) => {
                // The contract's own bytes are unrecoverable; take the
                // composer's fallback path so the slot still downloads.
                log::warn!("contract fetch failed: {e}");
                return Ok(notice_document(FALLBACK_TITLE, &e.to_string()));
            }
        },
        None => {
            return Ok(notice_document(
                FALLBACK_TITLE,
                "no contract document was uploaded for this member",
            ));
        }
    };

    let signature_ref = record.asset("brokerSignature");
    let assets = SignerAssets {
        broker_signature: fetch_optional(fetcher, record, "brokerSignature").await,
        broker_initials: fetch_optional(fetcher, record, "brokerInitials").await,
        employer_signature: fetch_optional(fetcher, record, "employerSignature").await,
        broker_name: broker_display_name(record),
    };

    let signing_date = resolve_signing_date(
        record.text("signatureDate").and_then(parse_date),
        signature_ref.and_then(|a| a.created_at),
    );

    Ok(overlay_contract(&contract_bytes, &assets, signing_date))
}

async fn fetch_optional(
    fetcher: &AssetFetcher,
    record: &FormRecord,
    field: &str,
) -> Option<Vec<u8>> {
    let asset = record.asset(field)?;
    match fetcher.fetch(asset, &FetchOptions::default()).await {
        Ok(fetched) => Some(fetched.bytes),
        Err(e) => {
            log::warn!("signer asset '{field}' unavailable: {e}");
            None
        }
    }
}

fn broker_display_name(record: &FormRecord) -> String {
    if let Some(name) = record.text("brokerName") {
        return name.to_string();
    }
    let first = record.text("firstName").unwrap_or_default();
    let last = record.text("lastName").unwrap_or_default();
    format!("{first} {last}").trim().to_string()
}

/// Accept both a bare calendar date and a full RFC 3339 timestamp for
/// the user-recorded signature date.
fn parse_date(raw: &str) -> Option<Date> {
    if let Ok(ts) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Some(ts.date());
    }
    Date::parse(raw, format_description!("[year]-[month]-[day]")).ok()
}

/// Concatenate finished documents into one, purely positionally: pages
/// keep their order within each part and parts follow `documents`
/// order.
pub fn merge_documents(mut documents: Vec<RenderedDocument>) -> Result<RenderedDocument> {
    if documents.is_empty() {
        return Err(Error::Pdf("no documents to merge".to_string()));
    }
    if documents.len() == 1 {
        return Ok(documents.remove(0));
    }

    let mut max_id = 1u32;
    let mut merged_pages: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut merged_objects: BTreeMap<ObjectId, Object> = BTreeMap::new();
    let mut merged = Document::with_version("1.5");

    for (i, part) in documents.iter().enumerate() {
        let mut doc = Document::load_mem(&part.bytes)
            .map_err(|e| Error::Pdf(format!("failed to reload part {}: {e}", i + 1)))?;
        doc.renumber_objects_with(max_id);
        max_id = doc.max_id + 1;

        for &page_id in doc.get_pages().values() {
            let page = doc.get_object(page_id)?.to_owned();
            merged_pages.insert(page_id, page);
        }

        for (object_id, object) in doc.objects {
            match object.type_name().unwrap_or(b"") {
                b"Catalog" | b"Pages" | b"Page" | b"Outlines" | b"Outline" => {}
                _ => {
                    merged_objects.insert(object_id, object);
                }
            }
        }
    }

    for (object_id, object) in merged_objects {
        merged.objects.insert(object_id, object);
    }

    let pages_id = merged.new_object_id();
    for (page_id, object) in &merged_pages {
        if let Object::Dictionary(dict) = object {
            let mut dict = dict.clone();
            dict.set("Parent", Object::Reference(pages_id));
            merged.objects.insert(*page_id, Object::Dictionary(dict));
        }
    }

    let kids: Vec<Object> = merged_pages.keys().map(|&id| Object::Reference(id)).collect();
    let page_count = merged_pages.len();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
        }),
    );

    let catalog_id = merged.new_object_id();
    merged.objects.insert(
        catalog_id,
        Object::Dictionary(dictionary! {
            "Type" => "Catalog",
            "Pages" => Object::Reference(pages_id),
        }),
    );
    merged.trailer.set("Root", Object::Reference(catalog_id));
    merged.max_id = merged.objects.len() as u32;
    merged.renumber_objects();
    merged.compress();

    let mut out = Vec::new();
    merged
        .save_to(&mut out)
        .map_err(|e| Error::Pdf(format!("failed to save merged package: {e}")))?;
    Ok(RenderedDocument::new(out, page_count))
}
