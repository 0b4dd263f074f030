//! Layout catalog: declarative page templates, one per form type.
//!
//! Every placement is a pre-computed constant in PDF user space
//! (bottom-left origin, points). The renderer walks `fields` in order,
//! so field order here is also the asset fetch order. Adding a form
//! type means adding a template function and a match arm in
//! [`template`]; the renderer and assembler need no changes.

use crate::error::{Error, Result};
use crate::model::FormType;

/// US Letter, the page size every onboarding document uses.
pub const LETTER: PageSize = PageSize {
    width: 612.0,
    height: 792.0,
};

const MARGIN: f32 = 54.0;
const COL2: f32 = 320.0;
const BODY_WIDTH: f32 = 504.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

/// How the renderer treats a field's value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldRole {
    /// Label + formatted value pair.
    Text,
    /// Embedded raster asset, fetched on demand.
    Image,
    /// Horizontal section divider; the record value is ignored.
    Line,
}

#[derive(Clone, Copy, Debug)]
pub struct FieldPlacement {
    /// Zero-based page index within the template.
    pub page: usize,
    pub x: f32,
    pub y: f32,
    pub font_size: f32,
    pub max_width: f32,
    /// Fixed display size for images; when absent the image is scaled
    /// to `max_width` preserving its source aspect ratio.
    pub width: Option<f32>,
    pub height: Option<f32>,
    pub role: FieldRole,
}

impl FieldPlacement {
    fn text(page: usize, x: f32, y: f32) -> Self {
        FieldPlacement {
            page,
            x,
            y,
            font_size: 10.0,
            max_width: 240.0,
            width: None,
            height: None,
            role: FieldRole::Text,
        }
    }

    fn image(page: usize, x: f32, y: f32, max_width: f32) -> Self {
        FieldPlacement {
            page,
            x,
            y,
            font_size: 0.0,
            max_width,
            width: None,
            height: None,
            role: FieldRole::Image,
        }
    }

    fn line(page: usize, x: f32, y: f32, length: f32) -> Self {
        FieldPlacement {
            page,
            x,
            y,
            font_size: 0.0,
            max_width: length,
            width: None,
            height: None,
            role: FieldRole::Line,
        }
    }

    fn wide(mut self, max_width: f32) -> Self {
        self.max_width = max_width;
        self
    }

    fn fixed(mut self, width: f32, height: f32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }
}

#[derive(Clone, Debug)]
pub struct FieldDef {
    /// Logical field name, matching the form record key.
    pub name: &'static str,
    /// Printed label; values are formatted separately.
    pub label: &'static str,
    pub placement: FieldPlacement,
}

fn field(name: &'static str, label: &'static str, placement: FieldPlacement) -> FieldDef {
    FieldDef {
        name,
        label,
        placement,
    }
}

#[derive(Clone, Debug)]
pub struct LayoutTemplate {
    pub title: &'static str,
    pub page_size: PageSize,
    pub page_count: usize,
    pub fields: Vec<FieldDef>,
}

/// Look up the template for a form type.
///
/// Contract-and-schedule documents are produced by the overlay
/// composer, not from a template; asking for one is a programming
/// error and reported as such.
pub fn template(form_type: FormType) -> Result<LayoutTemplate> {
    match form_type {
        FormType::BrokerInformation => Ok(broker_information()),
        FormType::UnlicensedInformation => Ok(unlicensed_information()),
        FormType::BusinessCard => Ok(business_card()),
        FormType::WebsiteInformation => Ok(website_information()),
        FormType::MpcApplication => Ok(mpc_application()),
        FormType::PaymentAuthorization => Ok(payment_authorization()),
        FormType::PoliciesAcknowledgement => Ok(policies_acknowledgement()),
        FormType::Photos => Ok(photos()),
        FormType::ContractAndSchedule => {
            Err(Error::LayoutNotFound(form_type.key().to_string()))
        }
    }
}

fn broker_information() -> LayoutTemplate {
    LayoutTemplate {
        title: "Broker Information",
        page_size: LETTER,
        page_count: 2,
        fields: vec![
            field("firstName", "First Name", FieldPlacement::text(0, MARGIN, 676.0)),
            field("lastName", "Last Name", FieldPlacement::text(0, COL2, 676.0)),
            field("dateOfBirth", "Date of Birth", FieldPlacement::text(0, MARGIN, 632.0)),
            field("phoneNumber", "Phone Number", FieldPlacement::text(0, COL2, 632.0)),
            field(
                "homeAddress",
                "Home Address",
                FieldPlacement::text(0, MARGIN, 588.0).wide(BODY_WIDTH),
            ),
            field("city", "City", FieldPlacement::text(0, MARGIN, 544.0)),
            field("province", "Province", FieldPlacement::text(0, COL2, 544.0)),
            field("postalCode", "Postal Code", FieldPlacement::text(0, MARGIN, 500.0)),
            field("workEmail", "Work Email", FieldPlacement::text(0, COL2, 500.0)),
            field("licensing", "", FieldPlacement::line(0, MARGIN, 472.0, BODY_WIDTH)),
            field("licenseNumber", "License Number", FieldPlacement::text(0, MARGIN, 440.0)),
            field("licenseClass", "License Class", FieldPlacement::text(0, COL2, 440.0)),
            field("brokerageName", "Brokerage Name", FieldPlacement::text(0, MARGIN, 396.0)),
            field("yearsLicensed", "Years Licensed", FieldPlacement::text(0, COL2, 396.0)),
            field(
                "errorsOmissionsProvider",
                "E&O Insurance Provider",
                FieldPlacement::text(0, MARGIN, 352.0).wide(BODY_WIDTH),
            ),
            field(
                "bankruptcyDeclared",
                "Bankruptcy Declared",
                FieldPlacement::text(1, MARGIN, 676.0),
            ),
            field(
                "creditCheckConsent",
                "Credit Check Consent",
                FieldPlacement::text(1, COL2, 676.0),
            ),
            field(
                "criminalConvictions",
                "Criminal Convictions",
                FieldPlacement::text(1, MARGIN, 632.0),
            ),
            field(
                "disciplinaryAction",
                "Prior Disciplinary Action",
                FieldPlacement::text(1, COL2, 632.0),
            ),
            field(
                "declarationDetails",
                "Declaration Details",
                FieldPlacement::text(1, MARGIN, 588.0).wide(BODY_WIDTH),
            ),
            field("declarations", "", FieldPlacement::line(1, MARGIN, 560.0, BODY_WIDTH)),
            field(
                "signature",
                "Signature",
                FieldPlacement::image(1, MARGIN, 460.0, 180.0),
            ),
            field("signatureDate", "Date Signed", FieldPlacement::text(1, MARGIN, 420.0)),
        ],
    }
}

fn unlicensed_information() -> LayoutTemplate {
    LayoutTemplate {
        title: "Unlicensed Information",
        page_size: LETTER,
        page_count: 1,
        fields: vec![
            field("firstName", "First Name", FieldPlacement::text(0, MARGIN, 676.0)),
            field("lastName", "Last Name", FieldPlacement::text(0, COL2, 676.0)),
            field("position", "Position", FieldPlacement::text(0, MARGIN, 632.0)),
            field("startDate", "Start Date", FieldPlacement::text(0, COL2, 632.0)),
            field(
                "supervisorName",
                "Supervising Broker",
                FieldPlacement::text(0, MARGIN, 588.0),
            ),
            field("workEmail", "Work Email", FieldPlacement::text(0, COL2, 588.0)),
            field("phoneNumber", "Phone Number", FieldPlacement::text(0, MARGIN, 544.0)),
            field("sig", "", FieldPlacement::line(0, MARGIN, 516.0, BODY_WIDTH)),
            field(
                "signature",
                "Signature",
                FieldPlacement::image(0, MARGIN, 420.0, 180.0),
            ),
        ],
    }
}

fn business_card() -> LayoutTemplate {
    LayoutTemplate {
        title: "Business Card",
        page_size: LETTER,
        page_count: 1,
        fields: vec![
            field("displayName", "Name on Card", FieldPlacement::text(0, MARGIN, 676.0)),
            field("designation", "Designation", FieldPlacement::text(0, COL2, 676.0)),
            field("phoneNumber", "Phone Number", FieldPlacement::text(0, MARGIN, 632.0)),
            field("workEmail", "Work Email", FieldPlacement::text(0, COL2, 632.0)),
            field(
                "websiteUrl",
                "Website",
                FieldPlacement::text(0, MARGIN, 588.0).wide(BODY_WIDTH),
            ),
            field(
                "officeAddress",
                "Office Address",
                FieldPlacement::text(0, MARGIN, 544.0).wide(BODY_WIDTH),
            ),
            field("cardStyle", "Card Style", FieldPlacement::text(0, MARGIN, 500.0)),
            field(
                "photo",
                "Headshot",
                FieldPlacement::image(0, COL2, 380.0, 160.0).fixed(120.0, 150.0),
            ),
        ],
    }
}

fn website_information() -> LayoutTemplate {
    LayoutTemplate {
        title: "Website Information",
        page_size: LETTER,
        page_count: 1,
        fields: vec![
            field("displayName", "Display Name", FieldPlacement::text(0, MARGIN, 676.0)),
            field("websiteSlug", "Profile URL", FieldPlacement::text(0, COL2, 676.0)),
            field(
                "biography",
                "Biography",
                FieldPlacement::text(0, MARGIN, 632.0).wide(BODY_WIDTH),
            ),
            field("facebookUrl", "Facebook", FieldPlacement::text(0, MARGIN, 588.0)),
            field("linkedinUrl", "LinkedIn", FieldPlacement::text(0, COL2, 588.0)),
            field("instagramUrl", "Instagram", FieldPlacement::text(0, MARGIN, 544.0)),
            field(
                "photo",
                "Profile Photo",
                FieldPlacement::image(0, MARGIN, 380.0, 160.0),
            ),
        ],
    }
}

fn mpc_application() -> LayoutTemplate {
    LayoutTemplate {
        title: "MPC Application",
        page_size: LETTER,
        page_count: 2,
        fields: vec![
            field("memberId", "Member ID", FieldPlacement::text(0, MARGIN, 676.0)),
            field("firstName", "First Name", FieldPlacement::text(0, COL2, 676.0)),
            field("lastName", "Last Name", FieldPlacement::text(0, MARGIN, 632.0)),
            field("brokerageName", "Brokerage Name", FieldPlacement::text(0, COL2, 632.0)),
            field("licenseNumber", "License Number", FieldPlacement::text(0, MARGIN, 588.0)),
            field("province", "Province", FieldPlacement::text(0, COL2, 588.0)),
            field("workEmail", "Work Email", FieldPlacement::text(0, MARGIN, 544.0)),
            field("phoneNumber", "Phone Number", FieldPlacement::text(0, COL2, 544.0)),
            field("priorMember", "Prior Member", FieldPlacement::text(1, MARGIN, 676.0)),
            field(
                "priorMemberNumber",
                "Prior Member Number",
                FieldPlacement::text(1, COL2, 676.0),
            ),
            field("consent", "", FieldPlacement::line(1, MARGIN, 648.0, BODY_WIDTH)),
            field(
                "initials",
                "Initials",
                FieldPlacement::image(1, COL2, 540.0, 80.0),
            ),
            field(
                "signature",
                "Signature",
                FieldPlacement::image(1, MARGIN, 540.0, 180.0),
            ),
            field("signatureDate", "Date Signed", FieldPlacement::text(1, MARGIN, 500.0)),
        ],
    }
}

fn payment_authorization() -> LayoutTemplate {
    LayoutTemplate {
        title: "Payment Authorization",
        page_size: LETTER,
        page_count: 1,
        fields: vec![
            field(
                "accountHolderName",
                "Account Holder",
                FieldPlacement::text(0, MARGIN, 676.0),
            ),
            field("payFrequency", "Pay Frequency", FieldPlacement::text(0, COL2, 676.0)),
            field(
                "institutionNumber",
                "Institution Number",
                FieldPlacement::text(0, MARGIN, 632.0),
            ),
            field("transitNumber", "Transit Number", FieldPlacement::text(0, COL2, 632.0)),
            field("accountNumber", "Account Number", FieldPlacement::text(0, MARGIN, 588.0)),
            field(
                "authorizationAccepted",
                "Authorization Accepted",
                FieldPlacement::text(0, COL2, 588.0),
            ),
            field("auth", "", FieldPlacement::line(0, MARGIN, 560.0, BODY_WIDTH)),
            field(
                "signature",
                "Signature",
                FieldPlacement::image(0, MARGIN, 460.0, 180.0),
            ),
        ],
    }
}

fn policies_acknowledgement() -> LayoutTemplate {
    LayoutTemplate {
        title: "Policies Acknowledgement",
        page_size: LETTER,
        page_count: 1,
        fields: vec![
            field(
                "privacyPolicyAccepted",
                "Privacy Policy",
                FieldPlacement::text(0, MARGIN, 676.0),
            ),
            field(
                "codeOfConductAccepted",
                "Code of Conduct",
                FieldPlacement::text(0, COL2, 676.0),
            ),
            field(
                "antiSpamPolicyAccepted",
                "Anti-Spam Policy",
                FieldPlacement::text(0, MARGIN, 632.0),
            ),
            field(
                "acknowledgementDate",
                "Acknowledged On",
                FieldPlacement::text(0, COL2, 632.0),
            ),
            field("ack", "", FieldPlacement::line(0, MARGIN, 604.0, BODY_WIDTH)),
            field(
                "signature",
                "Signature",
                FieldPlacement::image(0, MARGIN, 500.0, 180.0),
            ),
        ],
    }
}

fn photos() -> LayoutTemplate {
    LayoutTemplate {
        title: "Photos",
        page_size: LETTER,
        page_count: 1,
        fields: vec![
            field("photo", "Headshot", FieldPlacement::image(0, MARGIN, 420.0, 280.0)),
            field(
                "teamPhoto",
                "Team Photo",
                FieldPlacement::image(0, MARGIN, 120.0, 280.0),
            ),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RENDERABLE: [FormType; 8] = [
        FormType::BrokerInformation,
        FormType::UnlicensedInformation,
        FormType::BusinessCard,
        FormType::WebsiteInformation,
        FormType::MpcApplication,
        FormType::PaymentAuthorization,
        FormType::PoliciesAcknowledgement,
        FormType::Photos,
    ];

    #[test]
    fn every_renderable_form_type_has_a_template() {
        for ft in RENDERABLE {
            let tpl = template(ft).unwrap();
            assert!(tpl.page_count >= 1, "{ft} has no pages");
            assert!(!tpl.fields.is_empty(), "{ft} has no fields");
        }
    }

    #[test]
    fn contract_form_has_no_template() {
        assert!(matches!(
            template(FormType::ContractAndSchedule),
            Err(Error::LayoutNotFound(_))
        ));
    }

    #[test]
    fn placements_stay_within_declared_pages_and_bounds() {
        for ft in RENDERABLE {
            let tpl = template(ft).unwrap();
            for f in &tpl.fields {
                let p = &f.placement;
                assert!(p.page < tpl.page_count, "{ft}/{} page out of range", f.name);
                assert!(p.x >= 0.0 && p.x < tpl.page_size.width, "{ft}/{}", f.name);
                assert!(p.y >= 0.0 && p.y < tpl.page_size.height, "{ft}/{}", f.name);
                assert!(p.x + p.max_width <= tpl.page_size.width + 1.0, "{ft}/{}", f.name);
            }
        }
    }

    #[test]
    fn field_names_are_unique_per_template() {
        for ft in RENDERABLE {
            let tpl = template(ft).unwrap();
            let mut names: Vec<_> = tpl.fields.iter().map(|f| f.name).collect();
            names.sort_unstable();
            let before = names.len();
            names.dedup();
            assert_eq!(before, names.len(), "duplicate field name in {ft}");
        }
    }

    #[test]
    fn two_page_forms_declare_fields_on_both_pages() {
        for ft in [FormType::BrokerInformation, FormType::MpcApplication] {
            let tpl = template(ft).unwrap();
            assert_eq!(tpl.page_count, 2);
            assert!(tpl.fields.iter().any(|f| f.placement.page == 0));
            assert!(tpl.fields.iter().any(|f| f.placement.page == 1));
        }
    }
}
